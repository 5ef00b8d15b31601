//! In-memory accelerator used by the session tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::DecodeError;

use super::accelerator::{
    Accelerator, BufferFlags, OutputFormat, OutputInfo, OutputStatus, Platform, VideoFormat,
};

/// Render target stand-in
#[derive(Debug)]
pub(crate) struct MockSurface {
    pub valid: bool,
}

impl MockSurface {
    pub fn new() -> Self {
        Self { valid: true }
    }
}

/// Everything the decoder saw, shared with the test
#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub format: Option<VideoFormat>,
    pub started: bool,
    pub stopped: bool,
    pub released: u32,
    pub submitted: Vec<(Vec<u8>, u64, BufferFlags)>,
    pub input_waits: Vec<Duration>,
    pub rendered: u32,
}

/// Knobs for failure injection
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Behaviour {
    pub no_decoder: bool,
    pub fail_start: bool,
    pub saturated: bool,
    pub low_latency: bool,
    /// Report a format change before the first picture
    pub format_change: Option<(u32, u32)>,
}

#[derive(Clone, Default)]
pub(crate) struct MockPlatform {
    pub journal: Arc<Mutex<Journal>>,
    pub behaviour: Behaviour,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            ..Default::default()
        }
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

impl Platform for MockPlatform {
    type Surface = MockSurface;
    type Decoder = MockDecoder;

    fn create_decoder(&self, mime: &str) -> Result<MockDecoder, DecodeError> {
        if self.behaviour.no_decoder {
            return Err(DecodeError::NoDecoder(mime.to_string()));
        }
        Ok(MockDecoder {
            journal: Arc::clone(&self.journal),
            behaviour: self.behaviour,
            slot: vec![0; 256],
            output: VecDeque::new(),
            announced_format: false,
        })
    }
}

pub(crate) struct MockDecoder {
    journal: Arc<Mutex<Journal>>,
    behaviour: Behaviour,
    slot: Vec<u8>,
    output: VecDeque<OutputStatus>,
    announced_format: bool,
}

impl Accelerator for MockDecoder {
    type Surface = MockSurface;

    fn supports_low_latency(&self) -> bool {
        self.behaviour.low_latency
    }

    fn configure(&mut self, format: &VideoFormat, surface: &MockSurface) -> Result<(), DecodeError> {
        if !surface.valid {
            return Err(DecodeError::SurfaceBinding("surface destroyed".into()));
        }
        self.journal.lock().unwrap().format = Some(format.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), DecodeError> {
        if self.behaviour.fail_start {
            return Err(DecodeError::Start("codec in error state".into()));
        }
        self.journal.lock().unwrap().started = true;
        Ok(())
    }

    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<usize>, DecodeError> {
        self.journal.lock().unwrap().input_waits.push(timeout);
        if self.behaviour.saturated {
            Ok(None)
        } else {
            Ok(Some(0))
        }
    }

    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8], DecodeError> {
        if index != 0 {
            return Err(DecodeError::Accelerator(format!("bad input slot {}", index)));
        }
        Ok(&mut self.slot)
    }

    fn queue_input(
        &mut self,
        index: usize,
        len: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), DecodeError> {
        let data = self.input_buffer(index)?[..len].to_vec();
        self.journal
            .lock()
            .unwrap()
            .submitted
            .push((data, presentation_time_us, flags));

        if !flags.contains(BufferFlags::CODEC_CONFIG) {
            if let (Some((width, height)), false) = (self.behaviour.format_change, self.announced_format) {
                self.announced_format = true;
                self.output
                    .push_back(OutputStatus::FormatChanged(OutputFormat { width, height }));
            }
            self.output.push_back(OutputStatus::Ready {
                index: 0,
                info: OutputInfo {
                    presentation_time_us,
                    size: len,
                },
            });
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputStatus, DecodeError> {
        Ok(self.output.pop_front().unwrap_or(OutputStatus::TryAgainLater))
    }

    fn release_output(&mut self, _index: usize, render: bool) -> Result<(), DecodeError> {
        if render {
            self.journal.lock().unwrap().rendered += 1;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DecodeError> {
        self.journal.lock().unwrap().stopped = true;
        Ok(())
    }

    fn release(&mut self) {
        self.journal.lock().unwrap().released += 1;
    }
}

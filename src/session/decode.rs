//! Hardware decode session
//!
//! Owns one accelerator from `configure` to `release` and pushes NAL units
//! through it with low latency:
//!
//! 1. units shorter than start code + header byte are rejected
//! 2. SPS/PPS are tagged as codec configuration
//! 3. an input slot is awaited for a bounded time, otherwise the unit is dropped
//! 4. the unit (start code included) is copied in and queued
//! 5. every ready output buffer is released straight to the surface
//!
//! The surface is borrowed for the session's lifetime, so it cannot be
//! destroyed while the accelerator still renders into it. Dropping the
//! session releases the accelerator.

use std::time::{Duration, Instant};

use crate::client::DecoderConfig;
use crate::error::{DecodeError, Result};
use crate::media::h264::{NalUnit, H264_MIME, START_CODE_LEN};
use crate::stats::DecodeStats;

use super::accelerator::{Accelerator, BufferFlags, OutputFormat, OutputStatus, Platform, VideoFormat};
use super::state::DecodeState;

/// Smallest unit worth submitting: start code plus the NAL header byte
pub const MIN_NAL_LEN: usize = START_CODE_LEN + 1;

/// What happened to a fed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Session not configured or already released
    NotRunning,
    /// Shorter than [`MIN_NAL_LEN`]
    TooSmall,
    /// No input slot within the bounded wait
    Dropped,
    /// Queued; `rendered` output buffers were released afterwards
    Submitted { rendered: usize },
    /// Accelerator fault while queueing
    Failed,
}

enum Binding<'s, D, S: ?Sized> {
    Unconfigured,
    Running { decoder: D, surface: &'s S },
    Released,
}

/// Decode session bound to a render surface
pub struct DecodeSession<'s, P: Platform> {
    platform: P,
    config: DecoderConfig,
    binding: Binding<'s, P::Decoder, P::Surface>,
    width: u32,
    height: u32,
    output_format: Option<OutputFormat>,
    stats: DecodeStats,
    /// Zero point of default presentation times
    epoch: Instant,
}

impl<'s, P: Platform> DecodeSession<'s, P> {
    /// Create an unconfigured session
    pub fn new(platform: P, config: DecoderConfig) -> Self {
        Self {
            platform,
            width: config.width,
            height: config.height,
            config,
            binding: Binding::Unconfigured,
            output_format: None,
            stats: DecodeStats::new(),
            epoch: Instant::now(),
        }
    }

    /// Create a decoder, bind it to `surface` and start it.
    ///
    /// Any failure releases whatever was acquired and leaves the session
    /// `Released`; the caller must not feed it.
    pub fn configure(&mut self, width: u32, height: u32, surface: &'s P::Surface) -> Result<()> {
        if !matches!(self.binding, Binding::Unconfigured) {
            return Err(DecodeError::InvalidState(self.state()).into());
        }

        let mut decoder = match self.platform.create_decoder(H264_MIME) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::error!(error = %e, mime = H264_MIME, "Failed to create decoder");
                self.binding = Binding::Released;
                return Err(e.into());
            }
        };

        let format = VideoFormat {
            mime: H264_MIME.to_string(),
            width,
            height,
            low_latency: self.config.low_latency && decoder.supports_low_latency(),
            max_input_size: self.config.max_input_size,
        };

        let started = decoder
            .configure(&format, surface)
            .and_then(|_| decoder.start());
        if let Err(e) = started {
            tracing::error!(error = %e, width, height, "Failed to configure decoder");
            decoder.release();
            self.binding = Binding::Released;
            return Err(e.into());
        }

        self.width = width;
        self.height = height;
        self.binding = Binding::Running { decoder, surface };

        tracing::info!(
            width,
            height,
            low_latency = format.low_latency,
            "Decoder configured"
        );
        Ok(())
    }

    /// Submit one unit and drain ready output.
    ///
    /// Never fails: every problem is logged, counted and reported in the
    /// returned outcome. `presentation_time_us` defaults to monotonic time
    /// since the session was created.
    pub fn feed(&mut self, nal: &NalUnit, presentation_time_us: Option<u64>) -> FeedOutcome {
        let Binding::Running { decoder, .. } = &mut self.binding else {
            tracing::warn!(state = ?self.state(), "Decoder not configured, ignoring unit");
            self.stats.not_running += 1;
            return FeedOutcome::NotRunning;
        };

        if nal.len() < MIN_NAL_LEN {
            tracing::debug!(len = nal.len(), "NAL unit too small to classify");
            self.stats.too_small += 1;
            return FeedOutcome::TooSmall;
        }

        let flags = if nal.is_parameter_set() {
            BufferFlags::CODEC_CONFIG
        } else {
            BufferFlags::NONE
        };
        let pts = presentation_time_us.unwrap_or_else(|| elapsed_us(self.epoch));

        let outcome = match submit(decoder, nal.as_bytes(), pts, flags, self.config.input_timeout) {
            Ok(true) => {
                self.stats.submitted += 1;
                if flags.contains(BufferFlags::CODEC_CONFIG) {
                    self.stats.codec_config += 1;
                }
                FeedOutcome::Submitted { rendered: 0 }
            }
            Ok(false) => {
                tracing::warn!(
                    len = nal.len(),
                    nal_type = ?nal.nal_type(),
                    "No input buffer available, dropping unit"
                );
                self.stats.dropped += 1;
                FeedOutcome::Dropped
            }
            Err(e) => {
                tracing::error!(error = %e, "Error queueing unit");
                self.stats.errors += 1;
                FeedOutcome::Failed
            }
        };

        let rendered = drain(decoder, &mut self.stats, &mut self.output_format);

        match outcome {
            FeedOutcome::Submitted { .. } => FeedOutcome::Submitted { rendered },
            other => other,
        }
    }

    /// [`configure`](Self::configure) at the geometry from [`DecoderConfig`]
    pub fn configure_surface(&mut self, surface: &'s P::Surface) -> Result<()> {
        self.configure(self.config.width, self.config.height, surface)
    }

    /// Stop and free the accelerator. Safe to call in any state, repeatedly.
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.binding, Binding::Released) {
            Binding::Running { mut decoder, .. } => {
                if let Err(e) = decoder.stop() {
                    tracing::warn!(error = %e, "Error stopping decoder");
                }
                decoder.release();
                tracing::info!(
                    rendered = self.stats.rendered,
                    dropped = self.stats.dropped,
                    "Decoder released"
                );
            }
            Binding::Unconfigured => tracing::debug!("Releasing unconfigured decode session"),
            Binding::Released => {}
        }
    }

    pub fn state(&self) -> DecodeState {
        match self.binding {
            Binding::Unconfigured => DecodeState::Unconfigured,
            Binding::Running { .. } => DecodeState::Running,
            Binding::Released => DecodeState::Released,
        }
    }

    /// Configured and holding an accelerator
    pub fn is_ready(&self) -> bool {
        matches!(self.binding, Binding::Running { .. })
    }

    /// The bound surface, while running
    pub fn surface(&self) -> Option<&'s P::Surface> {
        match self.binding {
            Binding::Running { surface, .. } => Some(surface),
            _ => None,
        }
    }

    /// Requested geometry: the configured one once `configure` succeeded,
    /// the [`DecoderConfig`] one before
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Latest geometry reported by the decoder. The surface is not resized.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }
}

impl<P: Platform> Drop for DecodeSession<'_, P> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copy `data` into a free input slot and queue it. `Ok(false)` means no
/// slot freed up within `timeout`.
fn submit<A: Accelerator>(
    decoder: &mut A,
    data: &[u8],
    pts: u64,
    flags: BufferFlags,
    timeout: Duration,
) -> std::result::Result<bool, DecodeError> {
    let Some(index) = decoder.dequeue_input(timeout)? else {
        return Ok(false);
    };

    let capacity = decoder.input_buffer(index)?.len();
    if capacity < data.len() {
        // Hand the slot back empty so the decoder does not leak it
        decoder.queue_input(index, 0, pts, BufferFlags::NONE)?;
        return Err(DecodeError::Accelerator(format!(
            "input slot holds {} bytes, unit needs {}",
            capacity,
            data.len()
        )));
    }
    decoder.input_buffer(index)?[..data.len()].copy_from_slice(data);

    decoder.queue_input(index, data.len(), pts, flags)?;
    Ok(true)
}

/// Release every ready output buffer to the surface without waiting
fn drain<A: Accelerator>(
    decoder: &mut A,
    stats: &mut DecodeStats,
    output_format: &mut Option<OutputFormat>,
) -> usize {
    let mut rendered = 0;
    loop {
        match decoder.dequeue_output(Duration::ZERO) {
            Ok(OutputStatus::Ready { index, info }) => {
                if let Err(e) = decoder.release_output(index, true) {
                    tracing::error!(error = %e, index, "Error releasing output buffer");
                    stats.errors += 1;
                    break;
                }
                tracing::trace!(pts = info.presentation_time_us, "Rendered frame");
                stats.rendered += 1;
                rendered += 1;
            }
            Ok(OutputStatus::FormatChanged(format)) => {
                tracing::info!(
                    width = format.width,
                    height = format.height,
                    "Output format changed"
                );
                *output_format = Some(format);
                stats.format_changes += 1;
            }
            Ok(OutputStatus::TryAgainLater) => break,
            Err(e) => {
                tracing::error!(error = %e, "Error draining decoder output");
                stats.errors += 1;
                break;
            }
        }
    }
    rendered
}

fn elapsed_us(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_micros()).unwrap_or(u64::MAX)
}

//! Recorder - receives the mirroring stream and records it to an .h264 file
//!
//! Run with: cargo run --example recorder -- [output.h264] [HOST:PORT]
//!
//! Start the test stream first:
//!   cargo run --example test_stream_server
//!
//! Or forward a device stream:
//!   adb reverse tcp:27183 tcp:27183
//!
//! The recording is a plain Annex-B stream and plays back with:
//!   ffplay -f h264 output.h264
//!
//! This example demonstrates:
//! - Implementing `Platform`/`Accelerator` for a custom decode target
//! - Wiring `NalReceiver` events into a `Player`
//! - Clean shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//!   test_stream_server ──TCP──► NalReceiver ──events──► Player
//!                                                         │ feed()
//!                                                         ▼
//!                                                   FileDecoder ──► output.h264
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use annexb_mirror::error::DecodeError;
use annexb_mirror::session::{
    Accelerator, BufferFlags, OutputInfo, OutputStatus, Platform, VideoFormat,
};
use annexb_mirror::{DecodeSession, DecoderConfig, NalReceiver, Player, ReceiverConfig};

/// Default input slot size when the format carries no hint
const DEFAULT_INPUT_SIZE: usize = 1024 * 1024;

/// Where the "decoder" renders to
struct FileSurface {
    path: PathBuf,
}

struct FilePlatform;

impl Platform for FilePlatform {
    type Surface = FileSurface;
    type Decoder = FileDecoder;

    fn create_decoder(&self, mime: &str) -> Result<FileDecoder, DecodeError> {
        if mime != "video/avc" {
            return Err(DecodeError::NoDecoder(mime.to_string()));
        }
        Ok(FileDecoder {
            writer: None,
            slot: Vec::new(),
            ready: VecDeque::new(),
        })
    }
}

/// Pass-through accelerator that writes every submitted unit to a file
struct FileDecoder {
    writer: Option<BufWriter<File>>,
    slot: Vec<u8>,
    ready: VecDeque<OutputInfo>,
}

impl Accelerator for FileDecoder {
    type Surface = FileSurface;

    fn configure(&mut self, format: &VideoFormat, surface: &FileSurface) -> Result<(), DecodeError> {
        let file = File::create(&surface.path)
            .map_err(|e| DecodeError::SurfaceBinding(format!("{}: {}", surface.path.display(), e)))?;
        self.writer = Some(BufWriter::new(file));
        self.slot = vec![0; format.max_input_size.unwrap_or(DEFAULT_INPUT_SIZE)];
        Ok(())
    }

    fn start(&mut self) -> Result<(), DecodeError> {
        if self.writer.is_none() {
            return Err(DecodeError::Start("not configured".into()));
        }
        Ok(())
    }

    fn dequeue_input(&mut self, _timeout: Duration) -> Result<Option<usize>, DecodeError> {
        Ok(Some(0))
    }

    fn input_buffer(&mut self, _index: usize) -> Result<&mut [u8], DecodeError> {
        Ok(&mut self.slot)
    }

    fn queue_input(
        &mut self,
        _index: usize,
        len: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), DecodeError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DecodeError::Accelerator("not configured".into()))?;
        writer
            .write_all(&self.slot[..len])
            .map_err(|e| DecodeError::Accelerator(e.to_string()))?;

        if !flags.contains(BufferFlags::CODEC_CONFIG) {
            self.ready.push_back(OutputInfo {
                presentation_time_us,
                size: len,
            });
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputStatus, DecodeError> {
        Ok(match self.ready.pop_front() {
            Some(info) => OutputStatus::Ready { index: 0, info },
            None => OutputStatus::TryAgainLater,
        })
    }

    fn release_output(&mut self, _index: usize, render: bool) -> Result<(), DecodeError> {
        if render {
            if let Some(writer) = self.writer.as_mut() {
                writer
                    .flush()
                    .map_err(|e| DecodeError::Accelerator(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DecodeError> {
        self.ready.clear();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("annexb_mirror=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let output = PathBuf::from(args.next().unwrap_or_else(|| "output.h264".to_string()));
    let config = match args.next() {
        Some(addr) => ReceiverConfig::with_addr(addr.parse::<SocketAddr>()?),
        None => ReceiverConfig::default(),
    };

    println!("Recording {} to {}", config.endpoint(), output.display());

    let surface = FileSurface { path: output };
    let mut session = DecodeSession::new(FilePlatform, DecoderConfig::default());
    session.configure_surface(&surface)?;
    let mut player = Player::new(session);

    let (mut receiver, mut events) = NalReceiver::new(config);
    if !receiver.connect().await {
        eprintln!("Could not connect, is the stream server running?");
        return Ok(());
    }
    receiver.start();

    tokio::select! {
        _ = player.run(&mut events) => {}
        _ = tokio::signal::ctrl_c() => println!("\nStopping..."),
    }

    receiver.disconnect().await;

    let stats = player.session().stats();
    println!(
        "Units: {} received, {} submitted, {} dropped, {} rendered in {}",
        player.stats().frames,
        stats.submitted,
        stats.dropped,
        stats.rendered,
        player.stats().elapsed_hms(),
    );
    if let Some(rx) = receiver.last_stats() {
        println!("Bytes: {} ({} bps)", rx.bytes_received, rx.bitrate());
    }

    // Release before the surface goes away
    drop(player);
    Ok(())
}

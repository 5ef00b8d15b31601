//! Test stream server - emits a synthetic H.264 Annex-B stream
//!
//! Run with: cargo run --example test_stream_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example test_stream_server                  # binds to 127.0.0.1:27183
//!   cargo run --example test_stream_server 127.0.0.1:27200  # custom port
//!
//! Each client gets SPS and PPS, then one picture unit every 1/30 s: an IDR
//! every 30 frames and P-slices in between. The units are tiny but well
//! formed enough to exercise framing and codec-config flagging end to end.
//!
//! With a device attached, forward the port first:
//!   adb reverse tcp:27183 tcp:27183

use std::net::SocketAddr;
use std::time::Duration;

use annexb_mirror::client::{DEFAULT_HOST, DEFAULT_PORT};
use annexb_mirror::media::START_CODE;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Baseline profile SPS, 1920x1080
const SPS: &[u8] = &[
    0x67, 0x42, 0xC0, 0x1E, 0xD9, 0x00, 0xF0, 0x04, 0x4F, 0xCB, 0x80, 0xB5, 0x01, 0x01, 0x01,
    0x40,
];

const PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];

/// IDR slice header
const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x00, 0x33, 0xFF];

/// Non-IDR slice header
const P_SLICE: &[u8] = &[0x41, 0x9A, 0x21, 0x8C, 0x48];

/// Frames between keyframes
const GOP_LENGTH: u64 = 30;

const FRAME_INTERVAL: Duration = Duration::from_micros(1_000_000 / 30);

fn annexb(nal: &[u8]) -> Vec<u8> {
    let mut unit = Vec::with_capacity(START_CODE.len() + nal.len());
    unit.extend_from_slice(&START_CODE);
    unit.extend_from_slice(nal);
    unit
}

async fn send_test_stream(socket: &mut TcpStream) -> std::io::Result<()> {
    socket.write_all(&annexb(SPS)).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    socket.write_all(&annexb(PPS)).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut frame_count = 0u64;
    loop {
        ticker.tick().await;

        if frame_count % GOP_LENGTH == 0 {
            socket.write_all(&annexb(IDR)).await?;
            tracing::info!(frame = frame_count, "Sent I-frame");
        } else {
            socket.write_all(&annexb(P_SLICE)).await?;
            if frame_count % 10 == 0 {
                tracing::debug!(frame = frame_count, "Sent P-frame");
            }
        }
        frame_count += 1;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_stream_server=info".parse()?),
        )
        .init();

    let bind_addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT).parse()?,
    };

    let listener = TcpListener::bind(bind_addr).await?;
    println!("Test stream server listening on {}", bind_addr);
    println!("Press Ctrl+C to stop");

    loop {
        let (mut socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down server...");
                return Ok(());
            }
        };
        socket.set_nodelay(true)?;
        tracing::info!(peer = %peer, "Client connected");

        // One client at a time, like the device link
        tokio::select! {
            result = send_test_stream(&mut socket) => {
                if let Err(e) = result {
                    tracing::info!(peer = %peer, error = %e, "Client disconnected");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping stream...");
                return Ok(());
            }
        }
        println!("Waiting for next connection...");
    }
}

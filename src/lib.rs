//! # annexb-mirror
//!
//! Receiving half of a screen-mirroring link: reads a raw H.264 Annex-B
//! elementary stream from a loopback TCP socket, reconstructs NAL unit
//! boundaries, and drives a hardware decode accelerator that renders straight
//! to a platform surface.
//!
//! ```text
//!   TCP 127.0.0.1:27183
//!          │  64 KiB chunks
//!          ▼
//!   ┌──────────────┐   NalUnit   ┌──────────────┐  events  ┌────────┐
//!   │ NalReceiver  │──► framer ─►│ mpsc channel │─────────►│ Player │
//!   │ (read loop)  │             └──────────────┘          └───┬────┘
//!   └──────────────┘                                           │ feed()
//!                                                              ▼
//!                                                      ┌───────────────┐
//!                                                      │ DecodeSession │──► surface
//!                                                      └───────────────┘
//! ```
//!
//! The platform-specific decoder is plugged in through the
//! [`session::Platform`] and [`session::Accelerator`] traits.
//!
//! # Example
//! ```no_run
//! use annexb_mirror::client::{NalReceiver, ReceiverConfig};
//!
//! # async fn example() {
//! let (mut receiver, mut events) = NalReceiver::new(ReceiverConfig::default());
//!
//! if receiver.connect().await {
//!     receiver.start();
//! }
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

pub mod client;
pub mod error;
pub mod media;
pub mod session;
pub mod stats;

pub use client::{DecoderConfig, NalReceiver, ReceiverConfig, ReceiverEvent};
pub use error::{Error, Result};
pub use media::{NalFramer, NalUnit, NaluType};
pub use session::{Accelerator, DecodeSession, Platform, Player};

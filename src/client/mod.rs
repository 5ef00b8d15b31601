//! Stream receiving
//!
//! Connects to the mirroring endpoint and turns the Annex-B byte stream into
//! a channel of NAL unit and connection events.

pub mod config;
pub mod receiver;

pub use config::{DecoderConfig, ReceiverConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use receiver::{NalReceiver, ReceiverEvent, StopHandle};

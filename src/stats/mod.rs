//! Session-scoped counters

pub mod metrics;

pub use metrics::{DecodeStats, PlaybackStats, ReceiverStats};

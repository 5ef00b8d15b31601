//! Statistics for receive and decode sessions
//!
//! Counters are owned by the session that updates them. A reconnect starts
//! from fresh counters.

use std::time::{Duration, Instant};

use crate::media::NalUnit;

/// Receive loop statistics
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    /// Total bytes read from the socket
    pub bytes_received: u64,
    /// Number of non-empty reads
    pub chunks: u64,
    /// NAL units delivered to the consumer
    pub nal_units: u64,
    /// SPS/PPS units delivered
    pub parameter_sets: u64,
    /// IDR units delivered
    pub keyframes: u64,
    /// Units emitted by the end-of-stream flush
    pub flushed_units: u64,
    /// Time spent in the receive loop
    pub duration: Duration,
}

impl ReceiverStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes_received += len as u64;
    }

    pub fn record_unit(&mut self, unit: &NalUnit) {
        self.nal_units += 1;
        if unit.is_parameter_set() {
            self.parameter_sets += 1;
        } else if unit.is_keyframe() {
            self.keyframes += 1;
        }
    }

    /// Average bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

/// Decode session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Buffers queued to the accelerator
    pub submitted: u64,
    /// Of those, buffers flagged as codec configuration
    pub codec_config: u64,
    /// Units dropped because no input slot freed up in time
    pub dropped: u64,
    /// Units rejected as too short to classify
    pub too_small: u64,
    /// Feeds ignored because the session was not running
    pub not_running: u64,
    /// Output buffers released to the surface
    pub rendered: u64,
    /// Output format changes seen
    pub format_changes: u64,
    /// Accelerator faults
    pub errors: u64,
}

impl DecodeStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Playback statistics kept by the player
#[derive(Debug, Clone, Default)]
pub struct PlaybackStats {
    /// NAL units received from the pipeline
    pub frames: u64,
    /// When the connection came up
    pub started_at: Option<Instant>,
    /// When the stream stopped
    pub stopped_at: Option<Instant>,
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streaming time so far, or total once stopped
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Elapsed time as `HH:MM:SS`
    pub fn elapsed_hms(&self) -> String {
        let secs = self.elapsed().as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_stats_new() {
        let stats = ReceiverStats::new();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.nal_units, 0);
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_receiver_stats_record() {
        let mut stats = ReceiverStats::new();
        stats.record_chunk(100);
        stats.record_chunk(28);
        stats.record_unit(&NalUnit::new(vec![0, 0, 0, 1, 0x67, 0x42]));
        stats.record_unit(&NalUnit::new(vec![0, 0, 0, 1, 0x65, 0x88]));
        stats.record_unit(&NalUnit::new(vec![0, 0, 0, 1, 0x41, 0x9A]));

        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.bytes_received, 128);
        assert_eq!(stats.nal_units, 3);
        assert_eq!(stats.parameter_sets, 1);
        assert_eq!(stats.keyframes, 1);
    }

    #[test]
    fn test_receiver_stats_bitrate() {
        let mut stats = ReceiverStats::new();
        stats.bytes_received = 1_000_000;
        stats.duration = Duration::from_secs(10);

        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_playback_elapsed() {
        let mut stats = PlaybackStats::new();
        assert_eq!(stats.elapsed(), Duration::ZERO);
        assert_eq!(stats.elapsed_hms(), "00:00:00");

        let start = Instant::now();
        stats.started_at = Some(start);
        stats.stopped_at = Some(start + Duration::from_secs(3725));
        assert_eq!(stats.elapsed(), Duration::from_secs(3725));
        assert_eq!(stats.elapsed_hms(), "01:02:05");
    }
}

//! Hardware decode accelerator seam
//!
//! The decode session never talks to a platform API directly. A platform
//! supplies decoders through [`Platform`], and each decoder exposes the
//! buffer-queue model common to hardware video decoders:
//!
//! ```text
//!   dequeue_input ─► input_buffer ─► queue_input        (caller fills slots)
//!   dequeue_output ─► release_output(render = true)     (decoder fills slots)
//! ```
//!
//! Input and output slot indices are not safe for concurrent use, so every
//! method takes `&mut self`.

use std::time::Duration;

use crate::error::DecodeError;

/// Submission flags for an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// Ordinary picture data
    pub const NONE: BufferFlags = BufferFlags(0);
    /// Stream metadata (SPS/PPS), not a picture to render
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(0x2);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Format requested when configuring a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    /// Codec MIME type, e.g. `video/avc`
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Ask the decoder to release output as early as possible
    pub low_latency: bool,
    /// Input buffer size hint (`None` = platform default)
    pub max_input_size: Option<usize>,
}

/// Output geometry reported by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
}

/// Metadata of a decoded output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    pub presentation_time_us: u64,
    pub size: usize,
}

/// Result of polling for decoded output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    /// A decoded picture is ready in slot `index`
    Ready { index: usize, info: OutputInfo },
    /// Output geometry changed; poll again for pictures
    FormatChanged(OutputFormat),
    /// Nothing ready within the timeout
    TryAgainLater,
}

/// A hardware video decoder instance
pub trait Accelerator {
    /// Render target handle, owned by the windowing layer
    type Surface: ?Sized;

    /// Whether the decoder honours [`VideoFormat::low_latency`]
    fn supports_low_latency(&self) -> bool {
        false
    }

    /// Apply the format and bind decoded output to `surface`
    fn configure(&mut self, format: &VideoFormat, surface: &Self::Surface)
        -> Result<(), DecodeError>;

    /// Start accepting input
    fn start(&mut self) -> Result<(), DecodeError>;

    /// Wait up to `timeout` for a free input slot
    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<usize>, DecodeError>;

    /// Writable memory of input slot `index`
    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8], DecodeError>;

    /// Submit the first `len` bytes of slot `index`
    fn queue_input(
        &mut self,
        index: usize,
        len: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), DecodeError>;

    /// Poll for decoded output, waiting up to `timeout`
    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputStatus, DecodeError>;

    /// Hand output slot `index` back, rendering it to the surface if `render`
    fn release_output(&mut self, index: usize, render: bool) -> Result<(), DecodeError>;

    /// Stop decoding; buffers are returned to the decoder
    fn stop(&mut self) -> Result<(), DecodeError>;

    /// Free the decoder and drop the surface binding. Must not fail.
    fn release(&mut self);
}

/// Source of hardware decoders
pub trait Platform {
    type Surface: ?Sized;
    type Decoder: Accelerator<Surface = Self::Surface>;

    /// Create a decoder for `mime`, or fail with [`DecodeError::NoDecoder`]
    fn create_decoder(&self, mime: &str) -> Result<Self::Decoder, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_flags() {
        assert_eq!(BufferFlags::default(), BufferFlags::NONE);
        assert_eq!(BufferFlags::NONE.bits(), 0);
        assert!(BufferFlags::CODEC_CONFIG.contains(BufferFlags::CODEC_CONFIG));
        assert!(!BufferFlags::NONE.contains(BufferFlags::CODEC_CONFIG));
        assert_eq!(BufferFlags::CODEC_CONFIG.bits(), 0x2);
    }
}

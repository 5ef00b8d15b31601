//! H.264 Annex-B NAL units
//!
//! The mirroring link carries a raw Annex-B byte stream: every NAL unit is
//! preceded by a 4-byte start code and there is no length field.
//!
//! ```text
//! +-------------+-----------------------------------+------------------+
//! | 00 00 00 01 | F(1) | NRI(2) | Type(5) | payload  | 00 00 00 01 ...  |
//! +-------------+-----------------------------------+------------------+
//! ```
//!
//! A [`NalUnit`] keeps its start code. Hardware decoders are fed the prefixed
//! bytes as-is.

use bytes::Bytes;

/// The 4-byte Annex-B start code
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Length of [`START_CODE`]
pub const START_CODE_LEN: usize = START_CODE.len();

/// MIME type requested from the platform decoder
pub const H264_MIME: &str = "video/avc";

/// NAL unit types the mirroring stream carries.
///
/// Anything else passes through to the decoder untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NaluType {
    /// Non-IDR slice (P-slice)
    Slice = 1,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
}

impl NaluType {
    /// Classify a NAL header byte; only the low 5 bits are looked at
    pub fn from_byte(header: u8) -> Option<Self> {
        Some(match header & 0x1F {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            _ => return None,
        })
    }

    pub fn is_keyframe(self) -> bool {
        self == Self::Idr
    }

    /// Stream metadata the decoder needs before any picture
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

/// One NAL unit as it appeared in the byte stream, start code included.
///
/// Cheap to clone: the bytes are reference counted and were split off the
/// framer's accumulator without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    data: Bytes,
}

impl NalUnit {
    /// Wrap raw bytes. No validation is done.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Raw bytes, start code included
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the raw bytes
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the unit begins with `00 00 00 01`.
    ///
    /// Always true for units the framer confirmed; an end-of-stream flush can
    /// produce a unit without one.
    pub fn has_start_code(&self) -> bool {
        self.data.starts_with(&START_CODE)
    }

    /// Raw 5-bit type taken from the byte after the start code
    pub fn nal_type(&self) -> Option<u8> {
        self.data.get(START_CODE_LEN).map(|b| b & 0x1F)
    }

    /// Decoded type, `None` for other types or units too short to carry one
    pub fn kind(&self) -> Option<NaluType> {
        self.data.get(START_CODE_LEN).copied().and_then(NaluType::from_byte)
    }

    /// SPS or PPS
    pub fn is_parameter_set(&self) -> bool {
        self.kind().is_some_and(NaluType::is_parameter_set)
    }

    pub fn is_keyframe(&self) -> bool {
        self.kind().is_some_and(NaluType::is_keyframe)
    }

    /// Bytes after the start code
    pub fn payload(&self) -> &[u8] {
        self.data.get(START_CODE_LEN..).unwrap_or(&[])
    }
}

impl AsRef<[u8]> for NalUnit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<NalUnit> for Bytes {
    fn from(unit: NalUnit) -> Self {
        unit.data
    }
}

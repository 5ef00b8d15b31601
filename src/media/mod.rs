//! Media handling for the mirroring stream
//!
//! This module provides:
//! - H.264 NAL unit types and the Annex-B start code
//! - The stream framer that rebuilds NAL unit boundaries from TCP chunks

pub mod framer;
pub mod h264;

pub use framer::NalFramer;
pub use h264::{NalUnit, NaluType, H264_MIME, START_CODE};

//! Hardware decode session
//!
//! - [`accelerator`]: the traits a platform decoder implements
//! - [`decode`]: the session that feeds NAL units through an accelerator
//! - [`player`]: applies receiver events to a session on its owning thread
//! - [`state`]: decode and connection lifecycle states

pub mod accelerator;
pub mod decode;
pub mod player;
pub mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use accelerator::{
    Accelerator, BufferFlags, OutputFormat, OutputInfo, OutputStatus, Platform, VideoFormat,
};
pub use decode::{DecodeSession, FeedOutcome, MIN_NAL_LEN};
pub use player::Player;
pub use state::{ConnectionState, DecodeState};

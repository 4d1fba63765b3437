//! Streaming MPEG-2 Transport Stream demultiplexer with DTS-paced
//! elementary-stream emission and an RFC 4566 SDP producer/consumer.
//!
//! Bytes flow framer → reassembler → {PSI decoder, PES decoder} → the
//! pacing scheduler, which delivers `audio`/`video`/`end` events against
//! a wall-clock anchor. The [`sdp`] module builds and parses the session
//! descriptor advertising the demuxed streams.

pub mod aac;
pub mod bitreader;
pub mod constants;
pub mod demuxer;
pub mod error;
pub mod framer;
pub mod pacer;
pub mod pes;
pub mod psi;
pub mod reassembler;
pub mod sdp;

pub use demuxer::{Demuxer, MediaEvent};
pub use error::{DemuxError, Result};
pub use pes::StreamKind;

#[cfg(test)]
pub(crate) mod testutil;

//! RFC 4566 session descriptions: generation for the demuxed streams and
//! a standalone parser for inbound descriptors.
//!
//! Generated documents are CRLF-terminated throughout; the parser accepts
//! both LF and CRLF line endings.

mod build;
mod options;
mod parse;
mod types;

pub use build::create_sdp;
pub use options::{AudioTrackOptions, SdpOptions, VideoTrackOptions};
pub use parse::parse_sdp;
pub use types::{
    AddrType, Bandwidth, ConnectionData, MediaKind, MediaSection, Origin, SessionDescription,
    Timing,
};

use thiserror::Error;

use crate::error::DemuxError;

#[derive(Debug, Error)]
pub enum SdpError {
    /// A conditionally required build option was not provided.
    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    /// A parsed line does not match `<key>=<value>`.
    #[error("invalid SDP line: {0:?}")]
    InvalidLine(String),

    #[error("invalid {0}")]
    Invalid(&'static str),

    #[error("invalid number in SDP field")]
    ParseInt(#[from] std::num::ParseIntError),

    /// AudioSpecificConfig serialization failed.
    #[error("audio config: {0}")]
    AudioConfig(#[from] DemuxError),
}

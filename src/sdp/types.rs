//! Parsed session-description model.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::SdpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrType {
    Ip4,
    Ip6,
}

impl fmt::Display for AddrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ip4 => "IP4",
            Self::Ip6 => "IP6",
        })
    }
}

impl FromStr for AddrType {
    type Err = SdpError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IP4" => Ok(Self::Ip4),
            "IP6" => Ok(Self::Ip6),
            _ => Err(SdpError::Invalid("address type")),
        }
    }
}

/// `o=` line, fields kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub sess_id: String,
    pub sess_version: String,
    pub nettype: String,
    pub addrtype: String,
    pub unicast_address: String,
}

/// `c=` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionData {
    pub nettype: String,
    pub addrtype: String,
    pub connection_address: String,
}

/// `t=` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub start_time: u64,
    pub stop_time: u64,
}

/// `b=` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bandwidth {
    pub bwtype: String,
    pub bandwidth: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Other(String),
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MediaKind {
    fn from(s: &str) -> Self {
        match s {
            "audio" => Self::Audio,
            "video" => Self::Video,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One `m=` section and the lines attached to it.
#[derive(Debug, Clone)]
pub struct MediaSection {
    pub kind: MediaKind,
    pub port: u16,
    pub proto: String,
    pub fmt: String,
    /// `fmt` coerced to an integer for RTP/AVP and RTP/SAVP.
    pub payload_type: Option<u16>,
    pub connection: Option<ConnectionData>,
    pub bandwidth: Option<Bandwidth>,
    pub clock_rate: Option<u32>,
    pub audio_channels: Option<u8>,
    /// `a=` lines; flag attributes map to `None`.
    pub attributes: HashMap<String, Option<String>>,
    /// `a=fmtp` parameters, keys lower-cased.
    pub fmtp_params: HashMap<String, String>,
}

impl MediaSection {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionDescription {
    pub version: u8,
    pub origin: Option<Origin>,
    pub session_name: Option<String>,
    pub connection: Option<ConnectionData>,
    pub timing: Option<Timing>,
    pub bandwidth: Option<Bandwidth>,
    pub attributes: HashMap<String, Option<String>>,
    pub media: Vec<MediaSection>,
}

impl SessionDescription {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_deref())
    }
}

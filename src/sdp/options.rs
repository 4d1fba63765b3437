//! Options driving session-descriptor generation.

use super::types::AddrType;

#[derive(Debug, Clone)]
pub struct SdpOptions {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub address_type: AddrType,
    pub unicast_address: String,
    /// Presentation length for the `a=range` line; open-ended when absent.
    pub duration_seconds: Option<f64>,
    pub audio: Option<AudioTrackOptions>,
    pub video: Option<VideoTrackOptions>,
}

impl SdpOptions {
    pub fn new(
        username: impl Into<String>,
        session_id: impl Into<String>,
        session_version: impl Into<String>,
        address_type: AddrType,
        unicast_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            session_id: session_id.into(),
            session_version: session_version.into(),
            address_type,
            unicast_address: unicast_address.into(),
            duration_seconds: None,
            audio: None,
            video: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioTrackOptions {
    pub payload_type: u16,
    pub encoding_name: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
    pub sample_rate: Option<u32>,
    pub object_type: Option<u8>,
    /// Pre-built AudioSpecificConfig; generated from the fields above
    /// when absent.
    pub specific_config: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct VideoTrackOptions {
    pub payload_type: u16,
    pub encoding_name: String,
    pub clock_rate: u32,
    /// Hex profile-level-id, e.g. "42C015".
    pub profile_level_id: Option<String>,
    /// Comma-separated base64 SPS,PPS.
    pub sprop_parameter_sets: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
}

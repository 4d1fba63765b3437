//! Session-descriptor parsing.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::types::{
    Bandwidth, ConnectionData, MediaKind, MediaSection, Origin, SessionDescription, Timing,
};
use super::SdpError;

/// Parses a session descriptor. Accepts LF and CRLF line endings; empty
/// lines are skipped, any other line must read `<key>=<value>`.
pub fn parse_sdp(input: &str) -> Result<SessionDescription, SdpError> {
    let mut sdp = SessionDescription::default();

    for raw in input.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        if line.len() < 2 || line.as_bytes()[1] != b'=' {
            return Err(SdpError::InvalidLine(line.to_string()));
        }
        let key = line.as_bytes()[0];
        let value = &line[2..];

        match key {
            b'v' => sdp.version = value.trim().parse()?,
            b'o' => sdp.origin = Some(parse_origin(line, value)?),
            b's' => sdp.session_name = Some(value.to_string()),
            b'c' => {
                let connection = parse_connection(line, value)?;
                match sdp.media.last_mut() {
                    Some(media) => media.connection = Some(connection),
                    None => sdp.connection = Some(connection),
                }
            }
            b't' => sdp.timing = Some(parse_timing(line, value)?),
            b'm' => sdp.media.push(parse_media_line(line, value)?),
            b'a' => apply_attribute(&mut sdp, value),
            b'b' => {
                let bandwidth = parse_bandwidth(line, value)?;
                match sdp.media.last_mut() {
                    Some(media) => media.bandwidth = Some(bandwidth),
                    None => sdp.bandwidth = Some(bandwidth),
                }
            }
            other => debug!(key = %(other as char), "ignoring SDP line"),
        }
    }
    Ok(sdp)
}

fn parse_origin(line: &str, value: &str) -> Result<Origin, SdpError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(SdpError::InvalidLine(line.to_string()));
    }
    if fields.len() > 6 {
        warn!(extra = fields.len() - 6, "origin line has extra fields");
    }
    Ok(Origin {
        username: fields[0].to_string(),
        sess_id: fields[1].to_string(),
        sess_version: fields[2].to_string(),
        nettype: fields[3].to_string(),
        addrtype: fields[4].to_string(),
        unicast_address: fields[5].to_string(),
    })
}

fn parse_connection(line: &str, value: &str) -> Result<ConnectionData, SdpError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(SdpError::InvalidLine(line.to_string()));
    }
    if fields.len() > 3 {
        warn!(extra = fields.len() - 3, "connection line has extra fields");
    }
    Ok(ConnectionData {
        nettype: fields[0].to_string(),
        addrtype: fields[1].to_string(),
        connection_address: fields[2].to_string(),
    })
}

fn parse_timing(line: &str, value: &str) -> Result<Timing, SdpError> {
    let mut fields = value.split_whitespace();
    let (Some(start), Some(stop)) = (fields.next(), fields.next()) else {
        return Err(SdpError::InvalidLine(line.to_string()));
    };
    Ok(Timing {
        start_time: start.parse()?,
        stop_time: stop.parse()?,
    })
}

fn parse_bandwidth(line: &str, value: &str) -> Result<Bandwidth, SdpError> {
    let Some((bwtype, bandwidth)) = value.split_once(':') else {
        return Err(SdpError::InvalidLine(line.to_string()));
    };
    Ok(Bandwidth {
        bwtype: bwtype.to_string(),
        bandwidth: bandwidth.trim().parse()?,
    })
}

fn parse_media_line(line: &str, value: &str) -> Result<MediaSection, SdpError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(SdpError::InvalidLine(line.to_string()));
    }
    let proto = fields[2].to_string();
    let fmt = fields[3..].join(" ");
    let payload_type = if matches!(proto.as_str(), "RTP/AVP" | "RTP/SAVP") {
        match fields[3].parse() {
            Ok(pt) => Some(pt),
            Err(_) => {
                warn!(fmt = fields[3], "cannot coerce RTP payload format to an integer");
                None
            }
        }
    } else {
        None
    };
    Ok(MediaSection {
        kind: MediaKind::from(fields[0]),
        port: fields[1].parse()?,
        proto,
        fmt,
        payload_type,
        connection: None,
        bandwidth: None,
        clock_rate: None,
        audio_channels: None,
        attributes: HashMap::new(),
        fmtp_params: HashMap::new(),
    })
}

/// Attaches an `a=` line to the open media section, or to the session
/// when none is open yet.
fn apply_attribute(sdp: &mut SessionDescription, value: &str) {
    let (key, rest) = match value.split_once(':') {
        Some((key, rest)) => (key.to_string(), Some(rest.to_string())),
        None => (value.to_string(), None),
    };

    if let Some(media) = sdp.media.last_mut() {
        if let Some(rest) = rest.as_deref() {
            match key.as_str() {
                "rtpmap" => apply_rtpmap(media, rest),
                "fmtp" => apply_fmtp(media, rest),
                _ => {}
            }
        }
        media.attributes.insert(key, rest);
    } else {
        sdp.attributes.insert(key, rest);
    }
}

/// `<pt> <encoding>/<clock>[/<channels>]`
fn apply_rtpmap(media: &mut MediaSection, value: &str) {
    let Some((_pt, codec)) = value.split_once(' ') else {
        warn!(value, "malformed rtpmap attribute");
        return;
    };
    let mut parts = codec.split('/');
    let _encoding = parts.next();
    if let Some(rate) = parts.next() {
        media.clock_rate = rate.trim().parse().ok();
    }
    if let Some(channels) = parts.next() {
        media.audio_channels = channels.trim().parse().ok();
    }
}

/// `<pt> key=value;key=value;...`, keys lower-cased.
fn apply_fmtp(media: &mut MediaSection, value: &str) {
    let Some((_pt, params)) = value.split_once(' ') else {
        warn!(value, "malformed fmtp attribute");
        return;
    };
    for param in params.split(';') {
        let param = param.trim_start();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((key, val)) => {
                media
                    .fmtp_params
                    .insert(key.to_lowercase(), val.to_string());
            }
            None => {
                media.fmtp_params.insert(param.to_lowercase(), String::new());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::build::create_sdp;
    use super::super::options::{SdpOptions, VideoTrackOptions};
    use super::super::types::{AddrType, MediaKind};
    use super::*;

    #[test]
    fn build_then_parse_round_trips() {
        let mut options = SdpOptions::new("-", "0", "0", AddrType::Ip4, "127.0.0.1");
        options.video = Some(VideoTrackOptions {
            payload_type: 96,
            encoding_name: "H264".into(),
            clock_rate: 90_000,
            profile_level_id: None,
            sprop_parameter_sets: Some("Z0IAFbtA,aM4H".into()),
            width: None,
            height: None,
            frame_rate: None,
        });
        let text = create_sdp(&options).unwrap();
        let sdp = parse_sdp(&text).unwrap();

        assert_eq!(sdp.version, 0);
        let origin = sdp.origin.as_ref().unwrap();
        assert_eq!(origin.username, "-");
        assert_eq!(origin.addrtype, "IP4");
        assert_eq!(origin.unicast_address, "127.0.0.1");
        assert_eq!(sdp.attribute("control"), Some("*"));
        assert_eq!(sdp.attribute("sdplang"), Some("en"));

        assert_eq!(sdp.media.len(), 1);
        let media = &sdp.media[0];
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.payload_type, Some(96));
        assert_eq!(media.clock_rate, Some(90_000));
        assert_eq!(media.fmtp_params["packetization-mode"], "1");
        assert_eq!(media.fmtp_params["sprop-parameter-sets"], "Z0IAFbtA,aM4H");
        assert_eq!(media.attribute("control"), Some("trackID=2"));
    }

    #[test]
    fn parse_is_stable_across_reparses() {
        let text = "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\ns=x\r\nt=0 0\r\nm=audio 0 RTP/AVP 97\r\na=rtpmap:97 MPEG4-GENERIC/48000/2\r\n";
        let first = parse_sdp(text).unwrap();
        let second = parse_sdp(text).unwrap();
        assert_eq!(first.origin, second.origin);
        assert_eq!(first.media[0].clock_rate, second.media[0].clock_rate);
        assert_eq!(first.media[0].audio_channels, Some(2));
        assert_eq!(first.media[0].payload_type, Some(97));
    }

    #[test]
    fn accepts_bare_lf_line_endings() {
        let text = "v=0\no=- 0 0 IN IP4 10.0.0.1\ns= \nt=0 0\n";
        let sdp = parse_sdp(text).unwrap();
        assert_eq!(sdp.session_name.as_deref(), Some(" "));
        assert_eq!(sdp.timing, Some(Timing { start_time: 0, stop_time: 0 }));
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(matches!(
            parse_sdp("v=0\nnota line\n"),
            Err(SdpError::InvalidLine(line)) if line == "nota line"
        ));
    }

    #[test]
    fn origin_with_extra_fields_keeps_the_first_six() {
        let sdp = parse_sdp("o=user 1 2 IN IP4 host extra junk\n").unwrap();
        let origin = sdp.origin.unwrap();
        assert_eq!(origin.username, "user");
        assert_eq!(origin.unicast_address, "host");
    }

    #[test]
    fn flag_attributes_and_unknown_keys() {
        let text = "v=0\na=recvonly\nx=ignored\nm=video 0 RTP/AVP 96\nb=AS:512\na=sendonly\n";
        let sdp = parse_sdp(text).unwrap();
        assert!(sdp.attributes.contains_key("recvonly"));
        assert_eq!(sdp.attribute("recvonly"), None);
        let media = &sdp.media[0];
        assert!(media.attributes.contains_key("sendonly"));
        assert_eq!(
            media.bandwidth,
            Some(Bandwidth { bwtype: "AS".into(), bandwidth: 512 })
        );
    }

    #[test]
    fn non_rtp_fmt_is_not_coerced() {
        let sdp = parse_sdp("m=application 5000 udp mystream\n").unwrap();
        assert_eq!(sdp.media[0].payload_type, None);
        assert_eq!(sdp.media[0].fmt, "mystream");
    }
}

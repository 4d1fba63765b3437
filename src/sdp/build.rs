//! Session-descriptor generation.

use std::fmt::Write as _;

use crate::aac::create_audio_specific_config;

use super::options::{AudioTrackOptions, SdpOptions, VideoTrackOptions};
use super::SdpError;

const AAC_FRAME_LENGTH: u16 = 1024;

/// Builds the session descriptor advertising the configured streams.
/// Every line of the output ends with CRLF.
pub fn create_sdp(options: &SdpOptions) -> Result<String, SdpError> {
    let mut out = String::new();
    let at = options.address_type;
    let addr = &options.unicast_address;

    let _ = writeln!(out, "v=0");
    let _ = writeln!(
        out,
        "o={} {} {} IN {} {}",
        options.username, options.session_id, options.session_version, at, addr
    );
    let _ = writeln!(out, "s= ");
    let _ = writeln!(out, "c=IN {} {}", at, addr);
    let _ = writeln!(out, "t=0 0");
    let _ = writeln!(out, "a=sdplang:en");
    match options.duration_seconds {
        Some(duration) => {
            let _ = writeln!(out, "a=range:npt=0.0-{}", duration);
        }
        None => {
            let _ = writeln!(out, "a=range:npt=0.0-");
        }
    }
    let _ = writeln!(out, "a=control:*");

    if let Some(audio) = &options.audio {
        write_audio_section(&mut out, audio)?;
    }
    if let Some(video) = &options.video {
        write_video_section(&mut out, video);
    }

    Ok(out.replace('\n', "\r\n"))
}

fn write_audio_section(out: &mut String, audio: &AudioTrackOptions) -> Result<(), SdpError> {
    let pt = audio.payload_type;
    let _ = writeln!(out, "m=audio 0 RTP/AVP {pt}");
    match audio.channels {
        Some(channels) => {
            let _ = writeln!(
                out,
                "a=rtpmap:{pt} {}/{}/{}",
                audio.encoding_name, audio.clock_rate, channels
            );
        }
        None => {
            let _ = writeln!(out, "a=rtpmap:{pt} {}/{}", audio.encoding_name, audio.clock_rate);
        }
    }
    let mut fmtp = format!(
        "a=fmtp:{pt} profile-level-id=1;mode=AAC-hbr;sizeLength=13;indexLength=3;indexDeltaLength=3"
    );
    if let Some(config) = audio_specific_config(audio)? {
        let _ = write!(fmtp, ";config={}", to_hex(&config));
    }
    let _ = writeln!(out, "{fmtp}");
    let _ = writeln!(out, "a=control:trackID=1");
    Ok(())
}

/// The embedded config: taken verbatim when provided, otherwise built
/// from the codec parameters; omitted when neither source is usable.
fn audio_specific_config(audio: &AudioTrackOptions) -> Result<Option<Vec<u8>>, SdpError> {
    if let Some(config) = &audio.specific_config {
        return Ok(Some(config.clone()));
    }
    if audio.object_type.is_none() && audio.sample_rate.is_none() {
        return Ok(None);
    }
    let object_type = audio
        .object_type
        .ok_or(SdpError::MissingOption("audio_object_type"))?;
    let sample_rate = audio
        .sample_rate
        .ok_or(SdpError::MissingOption("audio_sample_rate"))?;
    let channels = audio
        .channels
        .ok_or(SdpError::MissingOption("audio_channels"))?;
    let config =
        create_audio_specific_config(object_type, sample_rate, channels, AAC_FRAME_LENGTH)?;
    Ok(Some(config))
}

fn write_video_section(out: &mut String, video: &VideoTrackOptions) {
    let pt = video.payload_type;
    let _ = writeln!(out, "m=video 0 RTP/AVP {pt}");
    let _ = writeln!(out, "a=rtpmap:{pt} {}/{}", video.encoding_name, video.clock_rate);

    let mut fmtp = format!("a=fmtp:{pt} packetization-mode=1");
    if let Some(plid) = &video.profile_level_id {
        let _ = write!(fmtp, ";profile-level-id={plid}");
    }
    if let Some(sprop) = &video.sprop_parameter_sets {
        let _ = write!(fmtp, ";sprop-parameter-sets={sprop}");
    }
    let _ = writeln!(out, "{fmtp}");

    if let (Some(width), Some(height)) = (video.width, video.height) {
        let _ = writeln!(out, "a=cliprect:0,0,{height},{width}");
        let _ = writeln!(out, "a=framesize:{pt} {width}-{height}");
    }
    if let Some(frame_rate) = video.frame_rate {
        let _ = writeln!(out, "a=framerate:{frame_rate}");
    }
    let _ = writeln!(out, "a=control:trackID=2");
}

fn to_hex(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(s, "{byte:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::super::options::{AudioTrackOptions, SdpOptions, VideoTrackOptions};
    use super::super::types::AddrType;
    use super::*;

    fn base_options() -> SdpOptions {
        SdpOptions::new("-", "0", "0", AddrType::Ip4, "127.0.0.1")
    }

    fn audio_options() -> AudioTrackOptions {
        AudioTrackOptions {
            payload_type: 97,
            encoding_name: "MPEG4-GENERIC".into(),
            clock_rate: 44_100,
            channels: Some(2),
            sample_rate: Some(44_100),
            object_type: Some(2),
            specific_config: None,
        }
    }

    #[test]
    fn every_line_ends_with_crlf() {
        let mut options = base_options();
        options.audio = Some(audio_options());
        let sdp = create_sdp(&options).unwrap();
        assert!(sdp.ends_with("\r\n"));
        assert!(!sdp.replace("\r\n", "").contains('\n'));
        assert!(sdp.contains("s= \r\n"));
    }

    #[test]
    fn audio_section_embeds_the_config_blob() {
        let mut options = base_options();
        options.audio = Some(audio_options());
        let sdp = create_sdp(&options).unwrap();
        assert!(sdp.contains("m=audio 0 RTP/AVP 97\r\n"));
        assert!(sdp.contains("a=rtpmap:97 MPEG4-GENERIC/44100/2\r\n"));
        assert!(sdp.contains(
            "a=fmtp:97 profile-level-id=1;mode=AAC-hbr;sizeLength=13;indexLength=3;indexDeltaLength=3;config=1210\r\n"
        ));
        assert!(sdp.contains("a=control:trackID=1\r\n"));
    }

    #[test]
    fn provided_config_wins_over_derivation() {
        let mut options = base_options();
        options.audio = Some(AudioTrackOptions {
            specific_config: Some(vec![0x11, 0x90]),
            ..audio_options()
        });
        let sdp = create_sdp(&options).unwrap();
        assert!(sdp.contains(";config=1190\r\n"));
    }

    #[test]
    fn partial_codec_parameters_are_missing_options() {
        let mut options = base_options();
        options.audio = Some(AudioTrackOptions {
            sample_rate: None,
            specific_config: None,
            ..audio_options()
        });
        assert!(matches!(
            create_sdp(&options),
            Err(SdpError::MissingOption("audio_sample_rate"))
        ));
    }

    #[test]
    fn video_section_with_geometry_and_rate() {
        let mut options = base_options();
        options.duration_seconds = Some(12.5);
        options.video = Some(VideoTrackOptions {
            payload_type: 96,
            encoding_name: "H264".into(),
            clock_rate: 90_000,
            profile_level_id: Some("42C015".into()),
            sprop_parameter_sets: Some("Z0IAFbtA,aM4H".into()),
            width: Some(1280),
            height: Some(720),
            frame_rate: Some(25.0),
        });
        let sdp = create_sdp(&options).unwrap();
        assert!(sdp.contains("a=range:npt=0.0-12.5\r\n"));
        assert!(sdp.contains("m=video 0 RTP/AVP 96\r\n"));
        assert!(sdp.contains(
            "a=fmtp:96 packetization-mode=1;profile-level-id=42C015;sprop-parameter-sets=Z0IAFbtA,aM4H\r\n"
        ));
        assert!(sdp.contains("a=cliprect:0,0,720,1280\r\n"));
        assert!(sdp.contains("a=framesize:96 1280-720\r\n"));
        assert!(sdp.contains("a=framerate:25\r\n"));
        assert!(sdp.contains("a=control:trackID=2\r\n"));
    }
}

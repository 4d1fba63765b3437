//! Descriptor-loop decoding for PMT program and elementary-stream loops.

use tracing::warn;

use crate::error::{DemuxError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageEntry {
    /// ISO 639-2 code, e.g. b"eng".
    pub code: [u8; 3],
    pub audio_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// tag 9
    Ca {
        system_id: u16,
        ca_pid: u16,
        private: Vec<u8>,
    },
    /// tag 10
    Iso639Language { entries: Vec<LanguageEntry> },
    /// tag 0x48
    DvbService {
        service_type: u8,
        provider: String,
        name: String,
    },
    /// tag 0x52
    DvbStreamIdentifier { component_tag: u8 },
    /// tags 193, 200, 246, 253: recognized but not decoded
    Opaque { tag: u8, data: Vec<u8> },
}

impl Descriptor {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Ca { .. } => 9,
            Self::Iso639Language { .. } => 10,
            Self::DvbService { .. } => 0x48,
            Self::DvbStreamIdentifier { .. } => 0x52,
            Self::Opaque { tag, .. } => *tag,
        }
    }
}

/// Parses one descriptor, returning it together with its total length
/// (`descriptor_length + 2`).
pub fn parse_descriptor(buf: &[u8]) -> Result<(Descriptor, usize)> {
    if buf.len() < 2 {
        return Err(DemuxError::ReadPastEnd);
    }
    let tag = buf[0];
    let length = buf[1] as usize;
    let total = length + 2;
    let body = buf.get(2..total).ok_or(DemuxError::ReadPastEnd)?;

    let descriptor = match tag {
        9 => {
            if body.len() < 4 {
                return Err(DemuxError::InvalidStructural("CA descriptor too short"));
            }
            Descriptor::Ca {
                system_id: u16::from_be_bytes([body[0], body[1]]),
                ca_pid: u16::from_be_bytes([body[2] & 0x1F, body[3]]),
                private: body[4..].to_vec(),
            }
        }
        10 => {
            let mut entries = Vec::with_capacity(body.len() / 4);
            for chunk in body.chunks_exact(4) {
                entries.push(LanguageEntry {
                    code: [chunk[0], chunk[1], chunk[2]],
                    audio_type: chunk[3],
                });
            }
            Descriptor::Iso639Language { entries }
        }
        0x48 => {
            // service_type, then two length-prefixed strings
            if body.is_empty() {
                return Err(DemuxError::InvalidStructural("service descriptor too short"));
            }
            let service_type = body[0];
            let (provider, rest) = read_dvb_string(&body[1..])?;
            let (name, _rest) = read_dvb_string(rest)?;
            Descriptor::DvbService {
                service_type,
                provider,
                name,
            }
        }
        0x52 => {
            let component_tag = *body
                .first()
                .ok_or(DemuxError::InvalidStructural("empty stream identifier"))?;
            Descriptor::DvbStreamIdentifier { component_tag }
        }
        193 | 200 | 246 | 253 => Descriptor::Opaque {
            tag,
            data: body.to_vec(),
        },
        _ => return Err(DemuxError::UnsupportedDescriptor(tag)),
    };
    Ok((descriptor, total))
}

fn read_dvb_string(buf: &[u8]) -> Result<(String, &[u8])> {
    let len = *buf.first().ok_or(DemuxError::ReadPastEnd)? as usize;
    let bytes = buf
        .get(1..1 + len)
        .ok_or(DemuxError::InvalidStructural("DVB string crosses descriptor"))?;
    Ok((String::from_utf8_lossy(bytes).into_owned(), &buf[1 + len..]))
}

/// Walks a descriptor loop. Descriptors that fail to parse are skipped by
/// their declared length with a warning.
pub fn parse_descriptor_loop(mut buf: &[u8]) -> Vec<Descriptor> {
    let mut out = Vec::new();
    while buf.len() >= 2 {
        match parse_descriptor(buf) {
            Ok((descriptor, total)) => {
                out.push(descriptor);
                buf = &buf[total..];
            }
            Err(err) => {
                let total = (buf[1] as usize + 2).min(buf.len());
                warn!(error = %err, tag = buf[0], "skipping descriptor");
                buf = &buf[total..];
            }
        }
    }
    out
}

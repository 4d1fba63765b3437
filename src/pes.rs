//! PES header decoding per ISO/IEC 13818-1, including the full
//! optional-field matrix and 33-bit 90 kHz timestamp recovery.

use crate::bitreader::BitReader;
use crate::constants::{PES_START_CODE_PREFIX, PTS_WRAP, UNBOUNDED_PES_CAP};
use crate::error::{DemuxError, Result};
use crate::framer::AdaptationField;

// Stream ids that carry no optional header; the payload follows the
// 6-byte packet prologue directly.
const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xBC;
const STREAM_ID_PADDING: u8 = 0xBE;
const STREAM_ID_PRIVATE_2: u8 = 0xBF;
const STREAM_ID_ECM: u8 = 0xF0;
const STREAM_ID_EMM: u8 = 0xF1;
const STREAM_ID_DSMCC: u8 = 0xF2;
const STREAM_ID_H222_1_TYPE_E: u8 = 0xF8;
const STREAM_ID_PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

const PACK_START_CODE: u32 = 0x0000_01BA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// Classifies a stream_id; ids outside the audio/video ranges surface
/// without a kind and are dropped by the scheduler.
pub fn stream_kind(stream_id: u8) -> Option<StreamKind> {
    if stream_id & 0xF0 == 0xE0 {
        Some(StreamKind::Video)
    } else if stream_id & 0xE0 == 0xC0 {
        Some(StreamKind::Audio)
    } else {
        None
    }
}

fn has_standard_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING
            | STREAM_ID_PRIVATE_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_1_TYPE_E
            | STREAM_ID_PROGRAM_STREAM_DIRECTORY
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickMode {
    FastForward {
        field_id: u8,
        intra_slice_refresh: bool,
        frequency_truncation: u8,
    },
    SlowMotion {
        rep_cntrl: u8,
    },
    FreezeFrame {
        field_id: u8,
    },
    FastReverse {
        field_id: u8,
        intra_slice_refresh: bool,
        frequency_truncation: u8,
    },
    SlowReverse {
        rep_cntrl: u8,
    },
    Reserved {
        control: u8,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PesExtension {
    pub private_data: Option<[u8; 16]>,
    pub pack_header: Option<Vec<u8>>,
    /// (counter, mpeg1_mpeg2_identifier, original_stuff_length)
    pub packet_sequence_counter: Option<(u8, bool, u8)>,
    /// (scale, size)
    pub p_std_buffer: Option<(bool, u16)>,
    pub stream_id_extension: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct PesHeader {
    pub stream_id: u8,
    pub packet_length: u16,
    pub scrambling_control: u8,
    pub priority: bool,
    pub data_alignment: bool,
    pub copyright: bool,
    pub original: bool,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    /// (base, extension)
    pub escr: Option<(u64, u16)>,
    pub es_rate: Option<u32>,
    pub trick_mode: Option<TrickMode>,
    pub additional_copy_info: Option<u8>,
    pub crc: Option<u16>,
    pub extension: Option<PesExtension>,
}

#[derive(Debug, Clone)]
pub struct PesPacket {
    pub pid: u16,
    pub header: PesHeader,
    pub payload: Vec<u8>,
    pub adaptation_field: Option<AdaptationField>,
}

/// Decodes an assembled PES packet.
pub fn parse_pes(
    pid: u16,
    data: &[u8],
    adaptation_field: Option<AdaptationField>,
) -> Result<PesPacket> {
    let mut r = BitReader::new(data);
    if r.read_bits(24)? != PES_START_CODE_PREFIX {
        return Err(DemuxError::InvalidStructural("packet_start_code_prefix"));
    }
    let stream_id = r.read_byte()?;
    let packet_length = r.read_bits(16)? as u16;

    let mut header = PesHeader {
        stream_id,
        packet_length,
        ..Default::default()
    };

    if has_standard_header(stream_id) {
        parse_optional_header(&mut r, &mut header)?;
    }

    let consumed = r.position();
    let payload_len = if packet_length == 0 {
        // unbounded length, legal only for video
        if stream_kind(stream_id) != Some(StreamKind::Video) {
            return Err(DemuxError::InvalidStructural(
                "unbounded PES_packet_length on a non-video stream",
            ));
        }
        (data.len() - consumed).min(UNBOUNDED_PES_CAP)
    } else {
        // PES_packet_length counts the bytes after its own field
        let total = 6 + packet_length as usize;
        let want = total
            .checked_sub(consumed)
            .ok_or(DemuxError::InvalidStructural("PES header exceeds packet_length"))?;
        if consumed + want > data.len() {
            return Err(DemuxError::ReadPastEnd);
        }
        want
    };
    let payload = data[consumed..consumed + payload_len].to_vec();

    Ok(PesPacket {
        pid,
        header,
        payload,
        adaptation_field,
    })
}

fn parse_optional_header(r: &mut BitReader<&[u8]>, header: &mut PesHeader) -> Result<()> {
    if r.read_bits(2)? != 0b10 {
        return Err(DemuxError::InvalidStructural("PES optional header marker"));
    }
    header.scrambling_control = r.read_bits(2)? as u8;
    header.priority = r.read_bit()?;
    header.data_alignment = r.read_bit()?;
    header.copyright = r.read_bit()?;
    header.original = r.read_bit()?;
    let pts_dts_flags = r.read_bits(2)? as u8;
    if pts_dts_flags == 0b01 {
        return Err(DemuxError::InvalidStructural("forbidden PTS_DTS_flags value"));
    }
    let escr_flag = r.read_bit()?;
    let es_rate_flag = r.read_bit()?;
    let dsm_trick_mode_flag = r.read_bit()?;
    let additional_copy_info_flag = r.read_bit()?;
    let crc_flag = r.read_bit()?;
    let extension_flag = r.read_bit()?;
    let header_data_length = r.read_byte()? as usize;
    let header_end = r.position() + header_data_length;
    if header_end > r.len() {
        return Err(DemuxError::ReadPastEnd);
    }

    if pts_dts_flags & 0b10 != 0 {
        let prefix = if pts_dts_flags == 0b11 { 0b0011 } else { 0b0010 };
        header.pts = Some(read_timestamp(r, prefix)?);
        if pts_dts_flags == 0b11 {
            header.dts = Some(read_timestamp(r, 0b0001)?);
        }
    }
    if escr_flag {
        r.read_bits(2)?; // reserved
        let hi = u64::from(r.read_bits(3)?);
        expect_marker(r)?;
        let mid = u64::from(r.read_bits(15)?);
        expect_marker(r)?;
        let lo = u64::from(r.read_bits(15)?);
        expect_marker(r)?;
        let extension = r.read_bits(9)? as u16;
        expect_marker(r)?;
        header.escr = Some((hi << 30 | mid << 15 | lo, extension));
    }
    if es_rate_flag {
        expect_marker(r)?;
        header.es_rate = Some(r.read_bits(22)?);
        expect_marker(r)?;
    }
    if dsm_trick_mode_flag {
        header.trick_mode = Some(parse_trick_mode(r)?);
    }
    if additional_copy_info_flag {
        expect_marker(r)?;
        header.additional_copy_info = Some(r.read_bits(7)? as u8);
    }
    if crc_flag {
        header.crc = Some(r.read_bits(16)? as u16);
    }
    if extension_flag {
        header.extension = Some(parse_pes_extension(r)?);
    }

    if r.position() > header_end || (r.position() == header_end && !r.is_byte_aligned()) {
        return Err(DemuxError::InvalidStructural(
            "PES header fields overrun PES_header_data_length",
        ));
    }
    // remaining bytes up to PES_header_data_length are stuffing
    r.seek(header_end);
    Ok(())
}

fn parse_trick_mode(r: &mut BitReader<&[u8]>) -> Result<TrickMode> {
    let control = r.read_bits(3)? as u8;
    Ok(match control {
        0b000 | 0b011 => {
            let field_id = r.read_bits(2)? as u8;
            let intra_slice_refresh = r.read_bit()?;
            let frequency_truncation = r.read_bits(2)? as u8;
            if control == 0b000 {
                TrickMode::FastForward {
                    field_id,
                    intra_slice_refresh,
                    frequency_truncation,
                }
            } else {
                TrickMode::FastReverse {
                    field_id,
                    intra_slice_refresh,
                    frequency_truncation,
                }
            }
        }
        0b001 => TrickMode::SlowMotion {
            rep_cntrl: r.read_bits(5)? as u8,
        },
        0b010 => {
            let field_id = r.read_bits(2)? as u8;
            r.read_bits(3)?; // reserved
            TrickMode::FreezeFrame { field_id }
        }
        0b100 => TrickMode::SlowReverse {
            rep_cntrl: r.read_bits(5)? as u8,
        },
        _ => {
            r.read_bits(5)?;
            TrickMode::Reserved { control }
        }
    })
}

fn parse_pes_extension(r: &mut BitReader<&[u8]>) -> Result<PesExtension> {
    let mut ext = PesExtension::default();
    let private_data_flag = r.read_bit()?;
    let pack_header_field_flag = r.read_bit()?;
    let sequence_counter_flag = r.read_bit()?;
    let p_std_buffer_flag = r.read_bit()?;
    r.read_bits(3)?; // reserved
    let extension_2_flag = r.read_bit()?;

    if private_data_flag {
        let mut private = [0u8; 16];
        private.copy_from_slice(r.read_bytes(16)?);
        ext.private_data = Some(private);
    }
    if pack_header_field_flag {
        let length = r.read_byte()? as usize;
        if length >= 4 {
            // probe the pack_start_code, then rewind
            let start_code = r.read_bits(32)?;
            r.push_back_bits(32);
            if start_code != PACK_START_CODE {
                return Err(DemuxError::InvalidStructural("pack_start_code"));
            }
        }
        ext.pack_header = Some(r.read_bytes(length)?.to_vec());
    }
    if sequence_counter_flag {
        expect_marker(r)?;
        let counter = r.read_bits(7)? as u8;
        expect_marker(r)?;
        let mpeg1_mpeg2_identifier = r.read_bit()?;
        let original_stuff_length = r.read_bits(6)? as u8;
        ext.packet_sequence_counter = Some((counter, mpeg1_mpeg2_identifier, original_stuff_length));
    }
    if p_std_buffer_flag {
        if r.read_bits(2)? != 0b01 {
            return Err(DemuxError::InvalidStructural("P-STD buffer marker"));
        }
        let scale = r.read_bit()?;
        let size = r.read_bits(13)? as u16;
        ext.p_std_buffer = Some((scale, size));
    }
    if extension_2_flag {
        expect_marker(r)?;
        let field_length = r.read_bits(7)? as usize;
        if field_length == 0 {
            return Err(DemuxError::InvalidStructural("empty PES extension-2 field"));
        }
        let stream_id_extension_flag = r.read_bit()?;
        if stream_id_extension_flag {
            return Err(DemuxError::ReservedValue("stream_id_extension_flag"));
        }
        ext.stream_id_extension = Some(r.read_bits(7)? as u8);
        r.skip_bytes(field_length - 1)?;
    }
    Ok(ext)
}

/// Reads a 5-byte PES timestamp: a 4-bit prefix, then
/// `bits(3)<<30 | bits(15)<<15 | bits(15)` with a marker bit after each
/// group.
pub(crate) fn read_timestamp<B: AsRef<[u8]>>(r: &mut BitReader<B>, prefix: u8) -> Result<u64> {
    if r.read_bits(4)? as u8 != prefix {
        return Err(DemuxError::InvalidStructural("timestamp prefix"));
    }
    let hi = u64::from(r.read_bits(3)?);
    expect_marker(r)?;
    let mid = u64::from(r.read_bits(15)?);
    expect_marker(r)?;
    let lo = u64::from(r.read_bits(15)?);
    expect_marker(r)?;
    Ok(hi << 30 | mid << 15 | lo)
}

/// Encodes a 33-bit timestamp into the 5-byte PES pattern.
pub fn encode_timestamp(prefix: u8, value: u64) -> [u8; 5] {
    let v = value & (PTS_WRAP - 1);
    [
        (prefix << 4) | (((v >> 30) as u8 & 0x07) << 1) | 1,
        (v >> 22) as u8,
        (((v >> 15) as u8 & 0x7F) << 1) | 1,
        (v >> 7) as u8,
        ((v as u8 & 0x7F) << 1) | 1,
    ]
}

fn expect_marker<B: AsRef<[u8]>>(r: &mut BitReader<B>) -> Result<()> {
    if !r.read_bit()? {
        return Err(DemuxError::InvalidStructural("marker bit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pes_bytes;

    #[test]
    fn timestamps_round_trip() {
        // xorshift over the 33-bit space
        let mut state: u64 = 0x9E37_79B9;
        for _ in 0..200 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let value = state & (PTS_WRAP - 1);
            let bytes = encode_timestamp(0b0010, value);
            let mut r = BitReader::new(&bytes[..]);
            assert_eq!(read_timestamp(&mut r, 0b0010).unwrap(), value);
        }
        for value in [0u64, 1, PTS_WRAP - 1, 90_000] {
            let bytes = encode_timestamp(0b0011, value);
            let mut r = BitReader::new(&bytes[..]);
            assert_eq!(read_timestamp(&mut r, 0b0011).unwrap(), value);
        }
    }

    #[test]
    fn broken_marker_is_structural() {
        let mut bytes = encode_timestamp(0b0010, 90_000);
        bytes[2] &= 0xFE; // clear the marker after the first 15-bit group
        let mut r = BitReader::new(&bytes[..]);
        assert!(matches!(
            read_timestamp(&mut r, 0b0010),
            Err(DemuxError::InvalidStructural("marker bit"))
        ));
    }

    #[test]
    fn video_pes_with_pts_and_dts() {
        let data = pes_bytes(0xE0, Some(180_000), Some(90_000), b"\xDE\xAD\xBE\xEF", false);
        let pes = parse_pes(0x101, &data, None).unwrap();
        assert_eq!(pes.header.stream_id, 0xE0);
        assert_eq!(pes.header.pts, Some(180_000));
        assert_eq!(pes.header.dts, Some(90_000));
        assert_eq!(pes.payload, b"\xDE\xAD\xBE\xEF");
        assert_eq!(stream_kind(pes.header.stream_id), Some(StreamKind::Video));
    }

    #[test]
    fn audio_pes_with_pts_only() {
        let data = pes_bytes(0xC0, Some(90_000), None, b"adts", false);
        let pes = parse_pes(0x102, &data, None).unwrap();
        assert_eq!(pes.header.pts, Some(90_000));
        assert_eq!(pes.header.dts, None);
        assert_eq!(stream_kind(pes.header.stream_id), Some(StreamKind::Audio));
    }

    #[test]
    fn unbounded_length_is_video_only() {
        let data = pes_bytes(0xE0, Some(0), None, &[0x11; 64], true);
        let pes = parse_pes(0x101, &data, None).unwrap();
        assert_eq!(pes.header.packet_length, 0);
        assert_eq!(pes.payload, vec![0x11; 64]);

        let data = pes_bytes(0xC0, Some(0), None, &[0x11; 64], true);
        assert!(matches!(
            parse_pes(0x102, &data, None),
            Err(DemuxError::InvalidStructural(_))
        ));
    }

    #[test]
    fn unbounded_payload_is_capped() {
        let data = pes_bytes(0xE0, Some(0), None, &vec![0x22; UNBOUNDED_PES_CAP + 512], true);
        let pes = parse_pes(0x101, &data, None).unwrap();
        assert_eq!(pes.payload.len(), UNBOUNDED_PES_CAP);
    }

    #[test]
    fn bad_start_code_prefix() {
        let data = [0x00, 0x00, 0x02, 0xE0, 0x00, 0x00];
        assert!(matches!(
            parse_pes(0x101, &data, None),
            Err(DemuxError::InvalidStructural("packet_start_code_prefix"))
        ));
    }

    #[test]
    fn stuffing_after_header_fields_is_skipped() {
        // PTS present, header_data_length padded with 3 stuffing bytes
        let payload = b"xyz";
        let mut data = vec![0x00, 0x00, 0x01, 0xE0];
        let header_data_len = 5 + 3;
        let packet_length = 3 + header_data_len + payload.len();
        data.extend((packet_length as u16).to_be_bytes());
        data.extend([0x80, 0x80, header_data_len as u8]);
        data.extend(encode_timestamp(0b0010, 1234));
        data.extend([0xFF; 3]);
        data.extend(payload);

        let pes = parse_pes(0x101, &data, None).unwrap();
        assert_eq!(pes.header.pts, Some(1234));
        assert_eq!(pes.payload, payload);
    }

    #[test]
    fn truncated_bounded_payload_reads_past_end() {
        let mut data = pes_bytes(0xE0, Some(90_000), None, b"full payload", false);
        data.truncate(data.len() - 4);
        assert!(matches!(
            parse_pes(0x101, &data, None),
            Err(DemuxError::ReadPastEnd)
        ));
    }

    #[test]
    fn extension_2_stream_id_extension_flag_is_reserved() {
        // header with PES_extension_flag and extension-2 carrying flag=1
        let mut data = vec![0x00, 0x00, 0x01, 0xE0];
        let ext_bytes = [
            0x01, // only extension_2_flag among the sub-flags
            0x81, // marker + field_length 1
            0x80, // stream_id_extension_flag = 1
        ];
        let header_data_len = ext_bytes.len();
        let packet_length = 3 + header_data_len;
        data.extend((packet_length as u16).to_be_bytes());
        data.extend([0x80, 0x01, header_data_len as u8]);
        data.extend(ext_bytes);
        assert!(matches!(
            parse_pes(0x101, &data, None),
            Err(DemuxError::ReservedValue("stream_id_extension_flag"))
        ));
    }

    #[test]
    fn trick_mode_sub_decodes() {
        // freeze-frame, field_id 2
        let mut data = vec![0x00, 0x00, 0x01, 0xE0];
        let header_data_len = 1;
        let packet_length = 3 + header_data_len;
        data.extend((packet_length as u16).to_be_bytes());
        data.extend([0x80, 0x08, header_data_len as u8]);
        data.push(0b010_10_000);
        let pes = parse_pes(0x101, &data, None).unwrap();
        assert_eq!(
            pes.header.trick_mode,
            Some(TrickMode::FreezeFrame { field_id: 2 })
        );
    }
}

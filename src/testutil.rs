//! Builders for synthetic transport streams used across the test modules.

use crc::{Crc, CRC_32_MPEG_2};

use crate::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::pes::encode_timestamp;

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// One 188-byte transport packet; payloads under 184 bytes are padded
/// with adaptation-field stuffing.
pub fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 184, "payload must fit one packet");
    let mut pkt = Vec::with_capacity(TS_PACKET_SIZE);
    pkt.push(TS_SYNC_BYTE);
    pkt.push(((pusi as u8) << 6) | ((pid >> 8) as u8 & 0x1F));
    pkt.push((pid & 0xFF) as u8);
    if payload.len() == 184 {
        pkt.push(0x10 | (cc & 0x0F)); // payload only
    } else {
        pkt.push(0x30 | (cc & 0x0F)); // adaptation + payload
        let af_len = 183 - payload.len();
        pkt.push(af_len as u8);
        if af_len > 0 {
            pkt.push(0x00); // no flags
            pkt.extend(std::iter::repeat(0xFF).take(af_len - 1));
        }
    }
    pkt.extend_from_slice(payload);
    assert_eq!(pkt.len(), TS_PACKET_SIZE);
    pkt
}

/// Splits a PES across as many transport packets as it needs.
pub fn ts_packets_for(pid: u16, pes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, chunk) in pes.chunks(184).enumerate() {
        out.extend(ts_packet(pid, i == 0, i as u8, chunk));
    }
    out
}

/// A long-form PSI section with a valid CRC, preceded by a zero
/// pointer_field.
pub fn psi_section(table_id: u8, id_field: u16, version: u8, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut sec = vec![
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        (section_length & 0xFF) as u8,
        (id_field >> 8) as u8,
        (id_field & 0xFF) as u8,
        0xC0 | ((version & 0x1F) << 1) | 0x01,
        0x00,
        0x00,
    ];
    sec.extend_from_slice(body);
    let crc = CRC_MPEG.checksum(&sec);
    sec.extend_from_slice(&crc.to_be_bytes());

    let mut payload = vec![0x00]; // pointer_field
    payload.extend(sec);
    payload
}

/// PAT payload mapping each `(program_number, pid)` pair.
pub fn pat_payload(programs: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(program, pid) in programs {
        body.extend(program.to_be_bytes());
        body.push(0xE0 | ((pid >> 8) as u8 & 0x1F));
        body.push((pid & 0xFF) as u8);
    }
    psi_section(0x00, 0x0001, 0, &body)
}

/// PMT payload declaring the given `(stream_type, elementary_pid)`
/// streams with empty descriptor loops.
pub fn pmt_payload(program: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let with_desc: Vec<(u8, u16, &[u8])> = streams
        .iter()
        .map(|&(st, pid)| (st, pid, &[] as &[u8]))
        .collect();
    pmt_payload_with_descriptors(program, pcr_pid, &with_desc)
}

pub fn pmt_payload_with_descriptors(
    program: u16,
    pcr_pid: u16,
    streams: &[(u8, u16, &[u8])],
) -> Vec<u8> {
    let mut body = vec![
        0xE0 | ((pcr_pid >> 8) as u8 & 0x1F),
        (pcr_pid & 0xFF) as u8,
        0xF0,
        0x00, // program_info_length = 0
    ];
    for &(stream_type, pid, descriptors) in streams {
        body.push(stream_type);
        body.push(0xE0 | ((pid >> 8) as u8 & 0x1F));
        body.push((pid & 0xFF) as u8);
        body.push(0xF0 | ((descriptors.len() >> 8) as u8 & 0x0F));
        body.push((descriptors.len() & 0xFF) as u8);
        body.extend_from_slice(descriptors);
    }
    psi_section(0x02, program, 0, &body)
}

/// A PES packet with the standard optional header and the given
/// timestamps. `unbounded` emits PES_packet_length = 0.
pub fn pes_bytes(
    stream_id: u8,
    pts: Option<u64>,
    dts: Option<u64>,
    payload: &[u8],
    unbounded: bool,
) -> Vec<u8> {
    let mut header_data = Vec::new();
    let pts_dts_flags = match (pts, dts) {
        (Some(p), Some(d)) => {
            header_data.extend(encode_timestamp(0b0011, p));
            header_data.extend(encode_timestamp(0b0001, d));
            0b11
        }
        (Some(p), None) => {
            header_data.extend(encode_timestamp(0b0010, p));
            0b10
        }
        (None, _) => 0b00,
    };

    let mut out = vec![0x00, 0x00, 0x01, stream_id];
    let packet_length = if unbounded {
        0
    } else {
        3 + header_data.len() + payload.len()
    };
    out.extend((packet_length as u16).to_be_bytes());
    out.push(0x80);
    out.push(pts_dts_flags << 6);
    out.push(header_data.len() as u8);
    out.extend(header_data);
    out.extend_from_slice(payload);
    out
}

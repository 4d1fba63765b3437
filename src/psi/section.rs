//! Generic PSI section reader with CRC-32 (MPEG-2) validation.

use crc::{Crc, CRC_32_MPEG_2};

use crate::error::{DemuxError, Result};

pub(crate) const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

const MAX_SECTION_LENGTH: usize = 1021;

/// A validated long-form section: pointer field skipped, header checked,
/// CRC verified, `body` holding the bytes between header and CRC.
pub struct Section<'a> {
    pub table_id: u8,
    pub section_length: usize,
    /// transport_stream_id in a PAT, program_number in a PMT.
    pub id_field: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub body: &'a [u8],
    pub crc: u32,
}

impl<'a> Section<'a> {
    /// Parses a section from a PSI payload whose first byte is the
    /// pointer_field.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let pointer = *payload.first().ok_or(DemuxError::ReadPastEnd)? as usize;
        let start = 1 + pointer;
        if payload.len() < start + 8 {
            return Err(DemuxError::ReadPastEnd);
        }

        let table_id = payload[start];
        let b1 = payload[start + 1];
        if b1 & 0x80 == 0 {
            return Err(DemuxError::InvalidStructural("section_syntax_indicator"));
        }
        if b1 & 0x40 != 0 {
            return Err(DemuxError::InvalidStructural("bit after syntax indicator"));
        }
        let section_length = ((b1 & 0x0F) as usize) << 8 | payload[start + 2] as usize;
        if section_length < 9 || section_length > MAX_SECTION_LENGTH {
            return Err(DemuxError::InvalidStructural("section_length out of range"));
        }
        let end = start + 3 + section_length;
        if end > payload.len() {
            return Err(DemuxError::ReadPastEnd);
        }

        let crc = u32::from_be_bytes(
            payload[end - 4..end]
                .try_into()
                .map_err(|_| DemuxError::ReadPastEnd)?,
        );
        if CRC_MPEG.checksum(&payload[start..end - 4]) != crc {
            return Err(DemuxError::InvalidStructural("section CRC mismatch"));
        }

        Ok(Self {
            table_id,
            section_length,
            id_field: u16::from_be_bytes([payload[start + 3], payload[start + 4]]),
            version: (payload[start + 5] & 0x3E) >> 1,
            current_next: payload[start + 5] & 0x01 != 0,
            section_number: payload[start + 6],
            last_section_number: payload[start + 7],
            body: &payload[start + 8..end - 4],
            crc,
        })
    }
}

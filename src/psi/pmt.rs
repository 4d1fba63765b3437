//! Program Map Table.

use crate::error::{DemuxError, Result};
use crate::psi::descriptor::{parse_descriptor_loop, Descriptor};
use crate::psi::section::Section;

#[derive(Debug, Clone)]
pub struct EsEntry {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone)]
pub struct Pmt {
    pub version: u8,
    pub program_number: u16,
    pub pcr_pid: u16,
    pub program_descriptors: Vec<Descriptor>,
    pub streams: Vec<EsEntry>,
}

pub fn parse_pmt(payload: &[u8]) -> Result<Pmt> {
    let sec = Section::parse(payload)?;
    if sec.table_id != 0x02 {
        return Err(DemuxError::InvalidStructural("table_id is not PMT"));
    }
    if sec.section_number != 0 || sec.last_section_number != 0 {
        return Err(DemuxError::InvalidStructural("multi-section PMT"));
    }

    let body = sec.body;
    if body.len() < 4 {
        return Err(DemuxError::ReadPastEnd);
    }
    let pcr_pid = u16::from_be_bytes([body[0] & 0x1F, body[1]]);
    let program_info_length = ((body[2] & 0x0F) as usize) << 8 | body[3] as usize;

    let program_info = body
        .get(4..4 + program_info_length)
        .ok_or(DemuxError::InvalidStructural("program_info_length overrun"))?;
    let program_descriptors = parse_descriptor_loop(program_info);

    let mut remaining = sec
        .section_length
        .checked_sub(9 + program_info_length + 4)
        .ok_or(DemuxError::InvalidStructural("program_info_length overrun"))?;
    let mut idx = 4 + program_info_length;
    let mut streams = Vec::new();
    while remaining > 0 {
        let entry = body
            .get(idx..idx + 5)
            .ok_or(DemuxError::InvalidStructural("truncated ES loop entry"))?;
        let stream_type = entry[0];
        let elementary_pid = u16::from_be_bytes([entry[1] & 0x1F, entry[2]]);
        let es_info_length = ((entry[3] & 0x0F) as usize) << 8 | entry[4] as usize;
        let es_info = body
            .get(idx + 5..idx + 5 + es_info_length)
            .ok_or(DemuxError::InvalidStructural("ES_info_length overrun"))?;
        streams.push(EsEntry {
            stream_type,
            elementary_pid,
            descriptors: parse_descriptor_loop(es_info),
        });
        let consumed = 5 + es_info_length;
        idx += consumed;
        remaining = remaining
            .checked_sub(consumed)
            .ok_or(DemuxError::InvalidStructural("ES loop crosses section end"))?;
    }

    Ok(Pmt {
        version: sec.version,
        program_number: sec.id_field,
        pcr_pid,
        program_descriptors,
        streams,
    })
}

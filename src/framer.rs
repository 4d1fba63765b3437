//! TS packet framing: sync-byte acquisition and 188-byte packet decode.
//!
//! Sync acquisition scans forward one byte at a time; a candidate 0x47 is
//! accepted only when the following packet boundaries also hold 0x47. Once
//! locked, a boundary mismatch is fatal.

use tracing::debug;

use crate::bitreader::BitReader;
use crate::constants::{SYNC_CHECK_PACKETS, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::{DemuxError, Result};

/// PCR/OPCR value: 33-bit base on the 90 kHz clock plus a 9-bit extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRef {
    pub base: u64,
    pub extension: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptationExtension {
    /// legal_time_window: (valid flag, offset)
    pub ltw: Option<(bool, u16)>,
    pub piecewise_rate: Option<u32>,
    /// (splice_type, DTS_next_AU)
    pub seamless_splice: Option<(u8, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationField {
    pub length: u8,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub pcr: Option<ClockRef>,
    pub opcr: Option<ClockRef>,
    pub splice_countdown: Option<i8>,
    pub private_data: Option<Vec<u8>>,
    pub extension: Option<AdaptationExtension>,
}

#[derive(Debug, Clone)]
pub struct TsPacket {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    pub adaptation_field: Option<AdaptationField>,
    pub payload: Option<Vec<u8>>,
}

pub struct TsFramer {
    reader: BitReader<Vec<u8>>,
    sync_locked: bool,
    skipped_bytes: Option<usize>,
}

impl TsFramer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            reader: BitReader::new(data),
            sync_locked: false,
            skipped_bytes: None,
        }
    }

    pub fn sync_locked(&self) -> bool {
        self.sync_locked
    }

    /// Bytes discarded before lock, once acquired.
    pub fn skipped_bytes(&self) -> Option<usize> {
        self.skipped_bytes
    }

    /// Scans for a sync byte whose following packet boundaries also hold
    /// 0x47, then rewinds so the next read starts at the sync byte.
    fn acquire_sync(&mut self) -> Result<()> {
        let scan_start = self.reader.position();
        loop {
            let byte = self.reader.read_byte()?;
            if byte != TS_SYNC_BYTE {
                continue;
            }
            let candidate = self.reader.position() - 1;
            if !self.verify_candidate(candidate) {
                continue;
            }
            self.reader.push_back_byte();
            self.sync_locked = true;
            let skipped = candidate - scan_start;
            self.skipped_bytes = Some(skipped);
            debug!(skipped, "acquired TS sync");
            return Ok(());
        }
    }

    /// A candidate needs one full packet in the buffer and 0x47 at each of
    /// the next boundaries that still fit.
    fn verify_candidate(&self, candidate: usize) -> bool {
        if candidate + TS_PACKET_SIZE > self.reader.len() {
            return false;
        }
        for k in 1..=SYNC_CHECK_PACKETS {
            let offset = candidate + k * TS_PACKET_SIZE;
            if offset >= self.reader.len() {
                break;
            }
            // cursor sits one past the candidate
            match self.reader.get_byte_at(offset - candidate - 1) {
                Ok(TS_SYNC_BYTE) => {}
                _ => return false,
            }
        }
        true
    }

    /// Decodes the next transport packet, or `None` at end of input.
    ///
    /// On a structural error inside one packet the cursor is moved to the
    /// next boundary, so the caller can log and keep going.
    pub fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        if !self.sync_locked {
            self.acquire_sync()?;
        }
        if !self.reader.has_more_data() {
            return Ok(None);
        }
        let start = self.reader.position();
        if self.reader.len() - start < TS_PACKET_SIZE {
            return Err(DemuxError::ReadPastEnd);
        }
        match self.decode_packet(start) {
            Ok(packet) => Ok(Some(packet)),
            Err(err) => {
                if !err.is_terminal() {
                    self.reader.seek(start + TS_PACKET_SIZE);
                }
                Err(err)
            }
        }
    }

    fn decode_packet(&mut self, start: usize) -> Result<TsPacket> {
        let r = &mut self.reader;
        let sync = r.read_byte()?;
        if sync != TS_SYNC_BYTE {
            return Err(DemuxError::SyncLost {
                offset: start,
                found: sync,
            });
        }
        let transport_error = r.read_bit()?;
        let payload_unit_start = r.read_bit()?;
        let transport_priority = r.read_bit()?;
        let pid = r.read_bits(13)? as u16;
        let scrambling_control = r.read_bits(2)? as u8;
        let adaptation_field_control = r.read_bits(2)? as u8;
        let continuity_counter = r.read_bits(4)? as u8;

        let adaptation_field = if adaptation_field_control & 0b10 != 0 {
            Some(parse_adaptation_field(r)?)
        } else {
            None
        };
        let consumed = self.reader.position() - start;
        if consumed > TS_PACKET_SIZE {
            return Err(DemuxError::InvalidStructural(
                "adaptation field overruns packet",
            ));
        }

        let payload = if adaptation_field_control & 0b01 != 0 {
            let remaining = TS_PACKET_SIZE - consumed;
            Some(self.reader.read_bytes(remaining)?.to_vec())
        } else {
            // adaptation-only or reserved control value: skip to the boundary
            self.reader.seek(start + TS_PACKET_SIZE);
            None
        };

        Ok(TsPacket {
            transport_error,
            payload_unit_start,
            transport_priority,
            pid,
            scrambling_control,
            adaptation_field_control,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }
}

/// Decodes an adaptation field. Field reads never cross
/// `adaptation_field_length`; trailing bytes are stuffing.
fn parse_adaptation_field(r: &mut BitReader<Vec<u8>>) -> Result<AdaptationField> {
    let length = r.read_byte()?;
    let mut field = AdaptationField {
        length,
        ..Default::default()
    };
    if length == 0 {
        return Ok(field);
    }
    let end = r.position() + length as usize;
    if end > r.len() {
        return Err(DemuxError::ReadPastEnd);
    }

    field.discontinuity = r.read_bit()?;
    field.random_access = r.read_bit()?;
    field.es_priority = r.read_bit()?;
    let pcr_flag = r.read_bit()?;
    let opcr_flag = r.read_bit()?;
    let splicing_point_flag = r.read_bit()?;
    let private_data_flag = r.read_bit()?;
    let extension_flag = r.read_bit()?;

    if pcr_flag {
        field.pcr = Some(read_clock_ref(r, end)?);
    }
    if opcr_flag {
        field.opcr = Some(read_clock_ref(r, end)?);
    }
    if splicing_point_flag {
        check_bound(r, end, 1)?;
        field.splice_countdown = Some(r.read_byte()? as i8);
    }
    if private_data_flag {
        check_bound(r, end, 1)?;
        let n = r.read_byte()? as usize;
        check_bound(r, end, n)?;
        field.private_data = Some(r.read_bytes(n)?.to_vec());
    }
    if extension_flag {
        field.extension = Some(parse_adaptation_extension(r, end)?);
    }
    if r.position() > end {
        return Err(DemuxError::InvalidStructural("adaptation field overrun"));
    }
    r.seek(end); // stuffing
    Ok(field)
}

fn parse_adaptation_extension(
    r: &mut BitReader<Vec<u8>>,
    field_end: usize,
) -> Result<AdaptationExtension> {
    check_bound(r, field_end, 1)?;
    let length = r.read_byte()? as usize;
    let end = r.position() + length;
    if end > field_end {
        return Err(DemuxError::InvalidStructural(
            "adaptation extension overruns field",
        ));
    }
    let mut ext = AdaptationExtension::default();
    let ltw_flag = r.read_bit()?;
    let piecewise_rate_flag = r.read_bit()?;
    let seamless_splice_flag = r.read_bit()?;
    r.read_bits(5)?; // reserved

    if ltw_flag {
        let valid = r.read_bit()?;
        let offset = r.read_bits(15)? as u16;
        ext.ltw = Some((valid, offset));
    }
    if piecewise_rate_flag {
        r.read_bits(2)?; // reserved
        ext.piecewise_rate = Some(r.read_bits(22)?);
    }
    if seamless_splice_flag {
        let splice_type = r.read_bits(4)? as u8;
        let hi = u64::from(r.read_bits(3)?);
        r.read_bit()?;
        let mid = u64::from(r.read_bits(15)?);
        r.read_bit()?;
        let lo = u64::from(r.read_bits(15)?);
        r.read_bit()?;
        ext.seamless_splice = Some((splice_type, hi << 30 | mid << 15 | lo));
    }
    if r.position() > end {
        return Err(DemuxError::InvalidStructural("adaptation extension overrun"));
    }
    r.seek(end);
    Ok(ext)
}

fn read_clock_ref(r: &mut BitReader<Vec<u8>>, field_end: usize) -> Result<ClockRef> {
    check_bound(r, field_end, 6)?;
    let base = (u64::from(r.read_bit()? as u32) << 32) | u64::from(r.read_bits(32)?);
    r.read_bits(6)?; // reserved
    let extension = r.read_bits(9)? as u16;
    Ok(ClockRef { base, extension })
}

fn check_bound<B: AsRef<[u8]>>(r: &BitReader<B>, end: usize, need: usize) -> Result<()> {
    if r.position() + need > end {
        return Err(DemuxError::InvalidStructural(
            "adaptation field item crosses its length",
        ));
    }
    Ok(())
}

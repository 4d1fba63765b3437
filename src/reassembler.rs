//! Per-PID reassembly of PES payload fragments.
//!
//! A PES packet spans the transport payloads between two packets carrying
//! the payload_unit_start_indicator on the same PID, or between the last
//! such packet and end of input.

use std::collections::{btree_map::Entry, BTreeMap};

use tracing::debug;

use crate::framer::{AdaptationField, TsPacket};

/// Assembled PES bytes for one PID, not yet header-decoded.
#[derive(Debug, Clone)]
pub struct RawPes {
    pub pid: u16,
    pub data: Vec<u8>,
    /// Adaptation field of the transport packet that opened this PES.
    pub adaptation_field: Option<AdaptationField>,
    /// Set on packets flushed at end of input.
    pub is_last: bool,
}

#[derive(Default)]
struct Accumulation {
    fragments: Vec<Vec<u8>>,
    adaptation_field: Option<AdaptationField>,
}

impl Accumulation {
    fn start(payload: Vec<u8>, adaptation_field: Option<AdaptationField>) -> Self {
        Self {
            fragments: vec![payload],
            adaptation_field,
        }
    }

    fn into_raw(self, pid: u16, is_last: bool) -> RawPes {
        let total = self.fragments.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for fragment in &self.fragments {
            data.extend_from_slice(fragment);
        }
        RawPes {
            pid,
            data,
            adaptation_field: self.adaptation_field,
            is_last,
        }
    }
}

#[derive(Default)]
pub struct PesReassembler {
    buffering: BTreeMap<u16, Accumulation>,
}

impl PesReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport packet; returns the PES it completed, if any.
    pub fn feed(&mut self, packet: TsPacket) -> Option<RawPes> {
        let payload = packet.payload?;
        if payload.is_empty() {
            return None;
        }
        match self.buffering.entry(packet.pid) {
            Entry::Vacant(slot) => {
                if !packet.payload_unit_start {
                    debug!(pid = packet.pid, "dropping fragment without a unit start");
                    return None;
                }
                slot.insert(Accumulation::start(payload, packet.adaptation_field));
                None
            }
            Entry::Occupied(mut slot) => {
                if packet.payload_unit_start {
                    let done = std::mem::replace(
                        slot.get_mut(),
                        Accumulation::start(payload, packet.adaptation_field),
                    );
                    Some(done.into_raw(packet.pid, false))
                } else {
                    slot.get_mut().fragments.push(payload);
                    None
                }
            }
        }
    }

    /// Drains every pending accumulation, in ascending PID order.
    pub fn flush(&mut self) -> Vec<RawPes> {
        std::mem::take(&mut self.buffering)
            .into_iter()
            .filter(|(_, acc)| !acc.fragments.is_empty())
            .map(|(pid, acc)| acc.into_raw(pid, true))
            .collect()
    }
}

//! Program Association Table.

use std::collections::BTreeMap;

use crate::error::{DemuxError, Result};
use crate::psi::section::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramEntry {
    /// program_number 0 points at the network information PID.
    Network(u16),
    /// Any other program_number points at its program map PID.
    Map(u16),
}

#[derive(Debug, Clone, Default)]
pub struct Pat {
    pub version: u8,
    pub current_next: bool,
    pub programs: BTreeMap<u16, ProgramEntry>,
}

impl Pat {
    pub fn map_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.programs.values().filter_map(|entry| match entry {
            ProgramEntry::Map(pid) => Some(*pid),
            ProgramEntry::Network(_) => None,
        })
    }
}

pub fn parse_pat(payload: &[u8]) -> Result<Pat> {
    let sec = Section::parse(payload)?;
    if sec.table_id != 0x00 {
        return Err(DemuxError::InvalidStructural("table_id is not PAT"));
    }

    let count = (sec.section_length - 9) / 4;
    if count * 4 > sec.body.len() {
        return Err(DemuxError::ReadPastEnd);
    }
    let mut programs = BTreeMap::new();
    for chunk in sec.body[..count * 4].chunks_exact(4) {
        let program_number = u16::from_be_bytes([chunk[0], chunk[1]]);
        let pid = u16::from_be_bytes([chunk[2] & 0x1F, chunk[3]]);
        let entry = if program_number == 0 {
            ProgramEntry::Network(pid)
        } else {
            ProgramEntry::Map(pid)
        };
        programs.insert(program_number, entry);
    }

    Ok(Pat {
        version: sec.version,
        current_next: sec.current_next,
        programs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pat_payload;

    #[test]
    fn single_program() {
        let payload = pat_payload(&[(1, 0x1000)]);
        let pat = parse_pat(&payload).unwrap();
        assert_eq!(pat.programs.len(), 1);
        assert_eq!(pat.programs[&1], ProgramEntry::Map(0x1000));
        assert_eq!(pat.map_pids().collect::<Vec<_>>(), vec![0x1000]);
    }

    #[test]
    fn network_pid_entry() {
        let payload = pat_payload(&[(0, 0x0010), (2, 0x1001)]);
        let pat = parse_pat(&payload).unwrap();
        assert_eq!(pat.programs[&0], ProgramEntry::Network(0x0010));
        assert_eq!(pat.programs[&2], ProgramEntry::Map(0x1001));
        assert_eq!(pat.map_pids().collect::<Vec<_>>(), vec![0x1001]);
    }

    #[test]
    fn rejects_other_tables() {
        let payload = crate::testutil::psi_section(0x02, 1, 0, &[0; 9]);
        assert!(matches!(
            parse_pat(&payload),
            Err(DemuxError::InvalidStructural("table_id is not PAT"))
        ));
    }
}

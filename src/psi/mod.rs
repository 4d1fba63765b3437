//! Program-specific information: PAT and PMT sections plus the
//! descriptor loops they carry.

mod descriptor;
mod pat;
mod pmt;
mod section;

pub use descriptor::{parse_descriptor, parse_descriptor_loop, Descriptor, LanguageEntry};
pub use pat::{parse_pat, Pat, ProgramEntry};
pub use pmt::{parse_pmt, EsEntry, Pmt};
pub use section::Section;

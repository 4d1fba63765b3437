//! Error kinds of the demux pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemuxError {
    /// A packet boundary did not hold 0x47 after lock. Terminal.
    #[error("sync lost at offset {offset}: found {found:#04x}")]
    SyncLost { offset: usize, found: u8 },

    /// A read would cross the end of the input buffer.
    #[error("read past end of input")]
    ReadPastEnd,

    /// Malformed table or header structure; fatal for the current packet only.
    #[error("invalid structure: {0}")]
    InvalidStructural(&'static str),

    #[error("unsupported descriptor tag {0:#04x}")]
    UnsupportedDescriptor(u8),

    #[error("reserved value: {0}")]
    ReservedValue(&'static str),

    /// An audio/video PES surfaced without a presentation timestamp.
    #[error("audio/video PES without PTS on PID {0:#06x}")]
    MissingPts(u16),

    /// A pacing helper was called before the first timestamp was observed.
    #[error("no timestamp anchor yet")]
    NoAnchorYet,

    #[error("no stream open")]
    NotOpen,

    #[error("input of {0} bytes exceeds the 1 GiB preload cap")]
    InputTooLarge(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DemuxError {
    /// Terminal errors end the stream: queues drain, then `end` fires.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SyncLost { .. } | Self::ReadPastEnd | Self::MissingPts(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;

//! Constants for MPEG-TS demultiplexing and paced emission.

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Further packet boundaries verified before accepting a sync candidate.
pub const SYNC_CHECK_PACKETS: usize = 4;

/// PES packet constants
pub const PES_START_CODE_PREFIX: u32 = 0x00_0001;

/// Well-known PIDs
pub const PAT_PID: u16 = 0x0000;
pub const NULL_PID: u16 = 0x1FFF;

/// PMT stream types handled by the demuxer
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_AAC_ADTS: u8 = 0x0F;

/// PTS/DTS constants
pub const PTS_CLOCK_HZ: u64 = 90_000;
pub const PTS_TICKS_PER_MS: u64 = PTS_CLOCK_HZ / 1000;
pub const PTS_WRAP: u64 = 1u64 << 33;

/// Cap applied to a PES packet advertised with PES_packet_length == 0.
pub const UNBOUNDED_PES_CAP: usize = 200 * 1024;

/// Look-ahead depth per media kind before the producer yields.
pub const PENDING_QUEUE_DEPTH: usize = 2;

/// Timer advance for paced emission, in milliseconds.
pub const EMIT_ADVANCE_MS: u64 = 20;

/// `open()` refuses inputs larger than this.
pub const MAX_INPUT_BYTES: u64 = 1 << 30;

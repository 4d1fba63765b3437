//! Wall-clock pacing against the first observed decoding timestamp.
//!
//! Emission time for a packet with DTS `d` is
//! `streaming_start_time + (d - first_dts) / 90` milliseconds; the timer
//! fires `EMIT_ADVANCE_MS` early to absorb delivery overhead.

use std::time::Duration;

use tokio::time::Instant;

use crate::constants::{EMIT_ADVANCE_MS, PTS_TICKS_PER_MS};
use crate::error::{DemuxError, Result};

pub struct Pacer {
    streaming_start: Option<Instant>,
    first_dts: Option<u64>,
    advance: Duration,
}

impl Pacer {
    pub fn new() -> Self {
        Self {
            streaming_start: None,
            first_dts: None,
            advance: Duration::from_millis(EMIT_ADVANCE_MS),
        }
    }

    /// Anchors the wall clock, optionally skipping into the presentation.
    pub fn begin(&mut self, initial_skip_ms: u64) {
        self.streaming_start = Some(Instant::now() - Duration::from_millis(initial_skip_ms));
        self.first_dts = None;
    }

    /// Records the first timestamp seen; later calls are no-ops.
    pub fn observe(&mut self, dts: u64) {
        if self.first_dts.is_none() {
            self.first_dts = Some(dts);
        }
    }

    pub fn first_dts(&self) -> Option<u64> {
        self.first_dts
    }

    pub fn reset(&mut self) {
        self.streaming_start = None;
        self.first_dts = None;
    }

    fn emit_at(&self, dts: u64) -> Result<Instant> {
        let start = self.streaming_start.ok_or(DemuxError::NoAnchorYet)?;
        let first = self.first_dts.ok_or(DemuxError::NoAnchorYet)?;
        Ok(start + Duration::from_millis(dts.saturating_sub(first) / PTS_TICKS_PER_MS))
    }

    /// How long to sleep before emitting a packet with the given DTS,
    /// already shortened by the advance. Zero when overdue.
    pub fn sleep_for(&self, dts: u64) -> Result<Duration> {
        let due = self.emit_at(dts)?;
        Ok(due
            .saturating_duration_since(Instant::now())
            .saturating_sub(self.advance))
    }

    /// Signed milliseconds until the due time of `dts`; negative when past.
    pub fn time_until_dts(&self, dts: u64) -> Result<i64> {
        let due = self.emit_at(dts)?;
        let now = Instant::now();
        if due >= now {
            Ok(due.duration_since(now).as_millis() as i64)
        } else {
            Ok(-(now.duration_since(due).as_millis() as i64))
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

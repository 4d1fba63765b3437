//! The demuxer session: transport framing through paced emission.
//!
//! A `Demuxer` owns the input buffer, the PID tables, the bounded pending
//! queues and the listener registry. The producer side (framer →
//! reassembler → PSI/PES decode) never suspends; only the emitter sleeps,
//! between the head packet's due time and now.

use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::constants::{MAX_INPUT_BYTES, NULL_PID, PAT_PID, PENDING_QUEUE_DEPTH,
    PTS_TICKS_PER_MS, STREAM_TYPE_AAC_ADTS, STREAM_TYPE_H264};
use crate::error::{DemuxError, Result};
use crate::framer::{AdaptationField, TsFramer};
use crate::pacer::Pacer;
use crate::pes::{parse_pes, stream_kind, StreamKind};
use crate::psi::{parse_pat, parse_pmt, Pat, Pmt};
use crate::reassembler::{PesReassembler, RawPes};

/// Decoded access unit delivered to `audio`/`video` listeners.
#[derive(Debug, Clone)]
pub struct MediaEvent {
    pub pid: u16,
    pub kind: StreamKind,
    pub pts: u64,
    pub dts: u64,
    pub payload: Vec<u8>,
    pub adaptation_field: Option<AdaptationField>,
}

type MediaListener = Box<dyn FnMut(&MediaEvent) + Send>;
type EndListener = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Events {
    audio: Vec<MediaListener>,
    video: Vec<MediaListener>,
    end: Vec<EndListener>,
}

impl Events {
    fn emit_media(&mut self, event: &MediaEvent) {
        let listeners = match event.kind {
            StreamKind::Audio => &mut self.audio,
            StreamKind::Video => &mut self.video,
        };
        for listener in listeners {
            listener(event);
        }
    }

    fn emit_end(&mut self) {
        for listener in &mut self.end {
            listener();
        }
    }
}

/// Per-stream state, torn down by `close()`.
struct Session {
    framer: TsFramer,
    reassembler: PesReassembler,
    program_table: Option<Pat>,
    program_map: Option<Pmt>,
    audio_pid: Option<u16>,
    video_pid: Option<u16>,
    unparsed_pes: VecDeque<RawPes>,
    flushed: VecDeque<RawPes>,
    ready: VecDeque<MediaEvent>,
    last_pts: Option<u64>,
    is_eof: bool,
}

impl Session {
    fn new(data: Vec<u8>) -> Self {
        Self {
            framer: TsFramer::new(data),
            reassembler: PesReassembler::new(),
            program_table: None,
            program_map: None,
            audio_pid: None,
            video_pid: None,
            unparsed_pes: VecDeque::new(),
            flushed: VecDeque::new(),
            ready: VecDeque::new(),
            last_pts: None,
            is_eof: false,
        }
    }

    fn is_map_pid(&self, pid: u16) -> bool {
        self.program_table
            .as_ref()
            .is_some_and(|pat| pat.map_pids().any(|map_pid| map_pid == pid))
    }

    /// Pulls the next audio/video access unit, advancing the pipeline as
    /// far as needed. `Ok(None)` once the input and all buffers drained.
    fn next_media_unit(&mut self) -> Result<Option<MediaEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            match self.next_pes_packet()? {
                Some(raw) => self.dispatch(raw)?,
                None => return Ok(None),
            }
        }
    }

    fn mark_eof(&mut self) {
        self.is_eof = true;
        self.flushed.extend(self.reassembler.flush());
    }

    /// The next assembled PES for any PID, or `None` once the input and
    /// all reassembly buffers are drained.
    fn next_pes_packet(&mut self) -> Result<Option<RawPes>> {
        loop {
            if let Some(raw) = self.flushed.pop_front() {
                return Ok(Some(raw));
            }
            if self.is_eof {
                return Ok(None);
            }
            match self.framer.next_packet() {
                Ok(Some(packet)) => {
                    if packet.pid == NULL_PID {
                        continue;
                    }
                    if let Some(raw) = self.reassembler.feed(packet) {
                        return Ok(Some(raw));
                    }
                }
                Ok(None) => self.mark_eof(),
                Err(err @ DemuxError::SyncLost { .. }) => {
                    error!(error = %err, "terminating stream");
                    self.mark_eof();
                }
                Err(DemuxError::ReadPastEnd) => {
                    warn!("input truncated mid-packet");
                    self.mark_eof();
                }
                Err(err) => {
                    warn!(error = %err, "skipping transport packet");
                }
            }
        }
    }

    /// Routes an assembled PES to the PSI decoder, the media path, or the
    /// deferred list.
    fn dispatch(&mut self, raw: RawPes) -> Result<()> {
        if raw.pid == PAT_PID {
            self.handle_pat(&raw);
            return Ok(());
        }
        if self.is_map_pid(raw.pid) {
            self.handle_pmt(&raw)?;
            return Ok(());
        }
        if Some(raw.pid) == self.audio_pid || Some(raw.pid) == self.video_pid {
            if let Some(event) = self.decode_media(raw)? {
                self.ready.push_back(event);
            }
            return Ok(());
        }
        debug!(pid = raw.pid, "PES ahead of its table, deferring");
        self.unparsed_pes.push_back(raw);
        Ok(())
    }

    fn handle_pat(&mut self, raw: &RawPes) {
        match parse_pat(&raw.data) {
            Ok(pat) => {
                debug!(programs = pat.programs.len(), "PAT updated");
                self.program_table = Some(pat);
            }
            Err(err) => warn!(error = %err, "discarding PAT section"),
        }
    }

    fn handle_pmt(&mut self, raw: &RawPes) -> Result<()> {
        let pmt = match parse_pmt(&raw.data) {
            Ok(pmt) => pmt,
            Err(err) => {
                warn!(error = %err, "discarding PMT section");
                return Ok(());
            }
        };
        self.video_pid = pmt
            .streams
            .iter()
            .find(|s| s.stream_type == STREAM_TYPE_H264)
            .map(|s| s.elementary_pid);
        self.audio_pid = pmt
            .streams
            .iter()
            .find(|s| s.stream_type == STREAM_TYPE_AAC_ADTS)
            .map(|s| s.elementary_pid);
        debug!(
            video_pid = ?self.video_pid,
            audio_pid = ?self.audio_pid,
            "PMT updated"
        );
        self.program_map = Some(pmt);
        self.redispatch_deferred()
    }

    /// Replays the deferred PES list, in arrival order, against the
    /// freshly decoded tables.
    fn redispatch_deferred(&mut self) -> Result<()> {
        let deferred = std::mem::take(&mut self.unparsed_pes);
        for raw in deferred {
            if Some(raw.pid) == self.audio_pid || Some(raw.pid) == self.video_pid {
                if let Some(event) = self.decode_media(raw)? {
                    self.ready.push_back(event);
                }
            } else {
                debug!(pid = raw.pid, "dropping PES that matches no known PID");
            }
        }
        Ok(())
    }

    fn decode_media(&mut self, raw: RawPes) -> Result<Option<MediaEvent>> {
        let pes = match parse_pes(raw.pid, &raw.data, raw.adaptation_field) {
            Ok(pes) => pes,
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => {
                warn!(pid = raw.pid, error = %err, "dropping malformed PES");
                return Ok(None);
            }
        };
        let Some(kind) = stream_kind(pes.header.stream_id) else {
            debug!(
                pid = pes.pid,
                stream_id = pes.header.stream_id,
                "dropping PES without a media kind"
            );
            return Ok(None);
        };
        let pts = pes.header.pts.ok_or(DemuxError::MissingPts(pes.pid))?;
        let dts = pes.header.dts.unwrap_or(pts);
        self.last_pts = Some(pts);
        Ok(Some(MediaEvent {
            pid: pes.pid,
            kind,
            pts,
            dts,
            payload: pes.payload,
            adaptation_field: pes.adaptation_field,
        }))
    }
}

/// Streaming MPEG-TS demultiplexer with paced emission.
#[derive(Default)]
pub struct Demuxer {
    session: Option<Session>,
    events: Events,
    pacer: Pacer,
}

impl Demuxer {
    pub fn new() -> Self {
        Self {
            session: None,
            events: Events::default(),
            pacer: Pacer::new(),
        }
    }

    /// Preloads a TS file. Inputs above 1 GiB are refused.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let len = std::fs::metadata(path.as_ref())?.len();
        if len > MAX_INPUT_BYTES {
            return Err(DemuxError::InputTooLarge(len));
        }
        self.open_buffer(std::fs::read(path)?)
    }

    /// Takes an already loaded byte buffer as the stream input.
    pub fn open_buffer(&mut self, data: Vec<u8>) -> Result<()> {
        if data.len() as u64 > MAX_INPUT_BYTES {
            return Err(DemuxError::InputTooLarge(data.len() as u64));
        }
        self.session = Some(Session::new(data));
        Ok(())
    }

    /// Releases the buffer and all per-stream state.
    pub fn close(&mut self) {
        self.session = None;
        self.pacer.reset();
    }

    pub fn on_audio(&mut self, listener: impl FnMut(&MediaEvent) + Send + 'static) {
        self.events.audio.push(Box::new(listener));
    }

    pub fn on_video(&mut self, listener: impl FnMut(&MediaEvent) + Send + 'static) {
        self.events.video.push(Box::new(listener));
    }

    pub fn on_end(&mut self, listener: impl FnMut() + Send + 'static) {
        self.events.end.push(Box::new(listener));
    }

    /// Runs the stream to completion, delivering `audio`/`video` events at
    /// wall-clock pace and `end` once both queues drain at end of input.
    pub async fn start_streaming(&mut self, initial_skip_ms: u64) -> Result<()> {
        let Self {
            session,
            events,
            pacer,
        } = self;
        let session = session.as_mut().ok_or(DemuxError::NotOpen)?;
        pacer.begin(initial_skip_ms);
        let mut pending_video: VecDeque<MediaEvent> = VecDeque::new();
        let mut pending_audio: VecDeque<MediaEvent> = VecDeque::new();
        let mut drained = false;

        loop {
            // producer: pull while both queues are under the look-ahead depth
            while !drained
                && pending_video.len() < PENDING_QUEUE_DEPTH
                && pending_audio.len() < PENDING_QUEUE_DEPTH
            {
                match session.next_media_unit() {
                    Ok(Some(unit)) => {
                        pacer.observe(unit.dts);
                        match unit.kind {
                            StreamKind::Video => pending_video.push_back(unit),
                            StreamKind::Audio => pending_audio.push_back(unit),
                        }
                    }
                    Ok(None) => drained = true,
                    Err(err) => {
                        error!(error = %err, "terminal decoder error, draining queues");
                        session.is_eof = true;
                        drained = true;
                    }
                }
            }

            // emitter: take whichever head is due first
            let take_video = match (pending_video.front(), pending_audio.front()) {
                (Some(v), Some(a)) => Some(v.dts <= a.dts),
                (Some(_), None) => Some(true),
                (None, Some(_)) => Some(false),
                (None, None) => None,
            };
            let Some(take_video) = take_video else {
                if drained {
                    events.emit_end();
                    return Ok(());
                }
                continue;
            };
            let queue = if take_video {
                &mut pending_video
            } else {
                &mut pending_audio
            };
            if let Some(head) = queue.front() {
                let wait = pacer.sleep_for(head.dts)?;
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            if let Some(unit) = queue.pop_front() {
                events.emit_media(&unit);
            }
        }
    }

    /// 90 kHz ticks to milliseconds.
    pub fn pts_to_ms(pts: u64) -> u64 {
        pts / PTS_TICKS_PER_MS
    }

    /// Most recent PTS observed by the producer.
    pub fn get_current_pts(&self) -> Option<u64> {
        self.session.as_ref().and_then(|s| s.last_pts)
    }

    /// The last decoded program association table, if any.
    pub fn program_table(&self) -> Option<&Pat> {
        self.session.as_ref().and_then(|s| s.program_table.as_ref())
    }

    /// The last decoded program map, if any.
    pub fn program_map(&self) -> Option<&Pmt> {
        self.session.as_ref().and_then(|s| s.program_map.as_ref())
    }

    /// Signed milliseconds until the due time of `dts`. Fails with
    /// `NoAnchorYet` before the first timestamped PES.
    pub fn get_time_until_dts(&self, dts: u64) -> Result<i64> {
        self.pacer.time_until_dts(dts)
    }
}

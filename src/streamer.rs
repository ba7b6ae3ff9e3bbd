//! The live streamer: receiver thread, channel-switch state machine,
//! I-frame gating, signal-loss detection, and per-packet emission (§4.8).
//!
//! Owned exclusively by a `Session`. Drives one `DemuxerBundle` end to end:
//! pulls raw bytes pushed by the tuner device off a shared ring, hands
//! TS-packet-aligned chunks to the bundle, and turns the resulting
//! `StreamPacket`s into framed `MsgPacket`s on the session's `SendQueue`.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::channel_cache::{ChannelCache, ChannelSource};
use crate::demux::{
    bundle::TS_PACKET_SIZE, CodecType, ContentClass, DemuxerBundle, FrameType, RingBuffer, StreamBundle, StreamPacket,
};
use crate::queue::SendQueue;
use crate::wire::{ChannelId, MsgPacket, StreamOpcode};

/// Minimum protocol version at which `MUXPKT` carries an explicit
/// `duration` field (§9 "ambiguity to flag, not guess" — preserved exactly
/// as the source reads it off `LOGIN`).
pub const PROTOCOL_VERSION_DURATION_FIELD: u16 = 5;

/// Classified outcome of a channel-switch attempt (§4.8, §7). These are
/// expected control-flow results, not failures — see
/// [`crate::error::RoboTvError`]'s doc comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Ok,
    Encrypted,
    AllTunersBusy,
    BlockedByRecording,
    Error,
}

/// Status codes carried on `StreamOpcode::Status` (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    SignalLost,
    SignalRestored,
    SwitchFailed(SwitchOutcome),
}

impl StatusCode {
    fn wire_code(self) -> u32 {
        match self {
            StatusCode::SignalLost => 1,
            StatusCode::SignalRestored => 2,
            StatusCode::SwitchFailed(SwitchOutcome::Encrypted) => 10,
            StatusCode::SwitchFailed(SwitchOutcome::AllTunersBusy) => 11,
            StatusCode::SwitchFailed(SwitchOutcome::BlockedByRecording) => 12,
            StatusCode::SwitchFailed(SwitchOutcome::Error) | StatusCode::SwitchFailed(SwitchOutcome::Ok) => 13,
        }
    }
}

/// Channel-switch FSM states (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Detached,
    Switching,
    Attached,
    SignalLost,
    PausedAttached,
}

/// Injected capability: the host's broadcast reception hardware. Tuning,
/// CAM slots, and device priorities are all host-SDK glue, out of scope
/// here (§1) — this crate only needs to classify a switch attempt, learn
/// which PIDs exist, and receive raw bytes.
///
/// A device implementation also derives a `StreamBundle` from its own
/// channel metadata, so it is required to implement `ChannelSource` as the
/// channel cache's cold-miss source of truth (§4.7).
pub trait TunerDevice: ChannelSource + Send {
    /// Attempts to tune to `uid`. May be called repeatedly while retrying.
    fn try_switch(&mut self, uid: crate::demux::ChannelUid) -> SwitchOutcome;

    /// Registers `pid` as part of the current program (§4.8 `AddPid`).
    fn add_pid(&mut self, pid: u16);

    /// Hands the device a sink it can push raw bytes into from its own
    /// thread (§4.8 Ingest, §9 "must not block").
    fn attach_receiver(&mut self, sink: ReceiveSink);

    /// Detaches the device from the current channel and stops delivery.
    fn detach(&mut self);

    /// Upcasts to `&dyn ChannelSource` for the channel cache. Given as a
    /// trait method (rather than relying on trait-object upcasting
    /// coercion) so this compiles on any edition-2021-era toolchain: the
    /// default body runs once per concrete implementor, where `self` is
    /// still sized.
    fn as_channel_source(&self) -> &dyn ChannelSource {
        self
    }
}

/// A cloneable handle the tuner device uses to push raw bytes into the
/// streamer's ring from its own callback thread (§4.8, §9 — modeled as a
/// one-way channel rather than a back-reference into the streamer).
#[derive(Clone)]
pub struct ReceiveSink {
    inner: Arc<(Mutex<RingBuffer>, Condvar)>,
}

impl ReceiveSink {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(RingBuffer::new(capacity)), Condvar::new())),
        }
    }

    /// Called by the device's own thread; must not block beyond the
    /// duration of the internal lock (§9).
    pub fn receive(&self, bytes: &[u8]) {
        let (ring, cv) = &*self.inner;
        let mut ring = ring.lock().unwrap();
        let accepted = ring.put(bytes);
        if accepted < bytes.len() {
            warn!("ingest ring overflow - dropping {} bytes", bytes.len() - accepted);
        }
        cv.notify_all();
    }

    fn pull_packet(&self, timeout: Duration) -> Option<[u8; TS_PACKET_SIZE]> {
        let (ring, cv) = &*self.inner;
        let mut ring = ring.lock().unwrap();
        if ring.len() < TS_PACKET_SIZE {
            let (guard, _) = cv.wait_timeout(ring, timeout).unwrap();
            ring = guard;
        }
        if ring.len() < TS_PACKET_SIZE {
            return None;
        }
        let mut packet = [0u8; TS_PACKET_SIZE];
        packet.copy_from_slice(&ring.get()[..TS_PACKET_SIZE]);
        ring.del(TS_PACKET_SIZE);
        Some(packet)
    }
}

/// Default channel-switch retry interval while `trySwitch` is not `Ok`.
const SWITCH_RETRY_INTERVAL: Duration = Duration::from_millis(10);
/// How often the receiver thread polls the ingest ring for a full packet.
const INGEST_POLL_INTERVAL: Duration = Duration::from_millis(50);
const INGEST_RING_CAPACITY: usize = 4 * 1024 * 1024;

/// Preferences used when reordering streams on a change (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamPreferences {
    pub language: Option<[u8; 3]>,
    pub audio_codec: Option<CodecType>,
}

struct Shared {
    state: Mutex<State>,
    bundle: Mutex<DemuxerBundle>,
    i_frame_gate: AtomicBool,
    i_frame_seen: AtomicBool,
    /// Set on attach, cleared the moment the first audio/video packet is
    /// emitted. While set, non-AV packets (subtitle, teletext) are dropped,
    /// mirroring the original's `IsStarting()` gate (`livestreamer.cpp:345`)
    /// — afterward they flow normally.
    is_starting: AtomicBool,
    request_stream_change: AtomicBool,
    cancel: AtomicBool,
    scan_timeout: Duration,
    raw_pts: bool,
    protocol_version: AtomicU16,
    preferences: Mutex<StreamPreferences>,
    queue: Arc<SendQueue>,
    channel_cache: Arc<ChannelCache>,
}

/// Owns the receiver thread, the channel-switch FSM, and the demuxer bundle
/// for one streaming session (§4.8).
pub struct LiveStreamer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl LiveStreamer {
    pub fn new(
        queue: Arc<SendQueue>,
        channel_cache: Arc<ChannelCache>,
        scan_timeout: Duration,
        raw_pts: bool,
        protocol_version: u16,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Detached),
                bundle: Mutex::new(DemuxerBundle::new()),
                i_frame_gate: AtomicBool::new(false),
                i_frame_seen: AtomicBool::new(false),
                is_starting: AtomicBool::new(true),
                request_stream_change: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                scan_timeout,
                raw_pts,
                protocol_version: AtomicU16::new(protocol_version),
                preferences: Mutex::new(StreamPreferences::default()),
                queue,
                channel_cache,
            }),
            worker: None,
        }
    }

    pub fn state(&self) -> State {
        *self.shared.state.lock().unwrap()
    }

    pub fn set_preferences(&self, preferences: StreamPreferences) {
        *self.shared.preferences.lock().unwrap() = preferences;
    }

    pub fn set_i_frame_gate(&self, enabled: bool) {
        self.shared.i_frame_gate.store(enabled, Ordering::SeqCst);
        self.shared.i_frame_seen.store(!enabled, Ordering::SeqCst);
    }

    /// Updates the client's announced protocol version, read live by the
    /// receiver thread when deciding whether `MUXPKT` carries the
    /// `duration` field (§9). Safe to call after the stream is already
    /// attached — a client only announces its version once, at `LOGIN`,
    /// but the streamer may be constructed before that request arrives.
    pub fn set_protocol_version(&self, version: u16) {
        self.shared.protocol_version.store(version, Ordering::SeqCst);
    }

    pub fn protocol_version(&self) -> u16 {
        self.shared.protocol_version.load(Ordering::SeqCst)
    }

    pub fn pause(&self, paused: bool) {
        let mut state = self.shared.state.lock().unwrap();
        if paused && *state == State::Attached {
            *state = State::PausedAttached;
        } else if !paused && *state == State::PausedAttached {
            *state = State::Attached;
        }
        self.shared.queue.pause(paused);
    }

    /// Attempts to switch to `uid` on `device`, spawning (or re-spawning)
    /// the receiver thread on success. Re-entrant: calling this while
    /// already attached detaches the previous target first (§5).
    pub fn switch(&mut self, mut device: Box<dyn TunerDevice>, uid: crate::demux::ChannelUid) {
        self.detach(device.as_mut());

        *self.shared.state.lock().unwrap() = State::Switching;
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.request_stream_change.store(true, Ordering::SeqCst);
        self.shared.i_frame_seen.store(
            !self.shared.i_frame_gate.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
        self.shared.is_starting.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        self.worker = Some(std::thread::spawn(move || run_receiver(shared, device, uid)));
    }

    /// Detaches from the currently attached device (if any) and stops the
    /// receiver thread, honoring the 5s cancellation grace period (§5).
    ///
    /// Std Rust cannot forcibly terminate a running OS thread; "forced"
    /// here means the grace period elapses and we stop waiting, logging a
    /// warning, rather than actually killing the thread.
    pub fn detach(&mut self, device: &mut dyn TunerDevice) {
        self.shared.cancel.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !worker.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            if !worker.is_finished() {
                warn!("receiver thread did not observe cancellation within grace period");
            }
        }
        device.detach();
        *self.shared.state.lock().unwrap() = State::Detached;
    }
}

fn run_receiver(shared: Arc<Shared>, mut device: Box<dyn TunerDevice>, uid: crate::demux::ChannelUid) {
    let switch_deadline_reset = || Instant::now() + shared.scan_timeout;
    let mut deadline = switch_deadline_reset();

    loop {
        if shared.cancel.load(Ordering::SeqCst) {
            return;
        }

        match device.try_switch(uid) {
            SwitchOutcome::Ok => break,
            outcome => {
                if Instant::now() >= deadline {
                    send_status(&shared, StatusCode::SwitchFailed(outcome));
                    deadline = switch_deadline_reset();
                }
                std::thread::sleep(SWITCH_RETRY_INTERVAL);
            }
        }
    }

    if shared.cancel.load(Ordering::SeqCst) {
        return;
    }

    let resolved = shared.channel_cache.resolve(device.as_channel_source());
    {
        let mut bundle = shared.bundle.lock().unwrap();
        bundle.update_from(&resolved);
    }
    for info in resolved.iter() {
        device.add_pid(info.pid);
    }

    let sink = ReceiveSink::new(INGEST_RING_CAPACITY);
    device.attach_receiver(sink.clone());
    *shared.state.lock().unwrap() = State::Attached;
    info!("attached to channel {:?}", uid.0);

    let mut last_emit = Instant::now();

    while !shared.cancel.load(Ordering::SeqCst) {
        let Some(packet) = sink.pull_packet(INGEST_POLL_INTERVAL) else {
            check_signal_loss(&shared, &mut last_emit);
            continue;
        };

        let packets = {
            let mut bundle = shared.bundle.lock().unwrap();
            match bundle.process_ts_packet(&packet) {
                Ok(packets) => packets,
                Err(_) => continue,
            }
        };

        for stream_packet in packets {
            if dispatch_stream_packet(&shared, uid, &stream_packet) {
                last_emit = Instant::now();
            }
        }

        check_signal_loss(&shared, &mut last_emit);
    }

    device.detach();
}

/// Applies the startup, signal-loss-restore, and I-frame gates to a single
/// demuxed packet, emitting it if it clears all of them. Returns whether
/// anything was emitted (including a `SIGNAL_RESTORED` status), which the
/// caller uses to reset its signal-loss timer.
fn dispatch_stream_packet(shared: &Arc<Shared>, uid: crate::demux::ChannelUid, stream_packet: &StreamPacket) -> bool {
    let is_av = matches!(stream_packet.content_class, ContentClass::Video | ContentClass::Audio);

    // Non-AV streams (subtitle, teletext) are held back only until the
    // first AV packet has gone out, mirroring the original's
    // `IsStarting()` gate (`livestreamer.cpp:345`) — once clear, subtitle
    // and teletext frames flow through like any other.
    if !is_av && shared.is_starting.load(Ordering::SeqCst) {
        return false;
    }

    if is_av {
        let was_signal_lost = *shared.state.lock().unwrap() == State::SignalLost;
        if was_signal_lost {
            *shared.state.lock().unwrap() = State::Attached;
            send_status(shared, StatusCode::SignalRestored);
            shared.request_stream_change.store(true, Ordering::SeqCst);
            // The restoring packet itself is consumed by the transition,
            // not forwarded (§4.8).
            return true;
        }

        if shared.i_frame_gate.load(Ordering::SeqCst) && !shared.i_frame_seen.load(Ordering::SeqCst) {
            if stream_packet.content_class == ContentClass::Video && stream_packet.frame_type == FrameType::I {
                shared.i_frame_seen.store(true, Ordering::SeqCst);
            } else {
                return false;
            }
        }
    }

    maybe_emit_stream_change(shared, uid);
    emit_stream_packet(shared, stream_packet);
    shared.is_starting.store(false, Ordering::SeqCst);
    true
}

fn check_signal_loss(shared: &Arc<Shared>, last_emit: &mut Instant) {
    let mut state = shared.state.lock().unwrap();
    if *state == State::Attached && last_emit.elapsed() >= shared.scan_timeout {
        *state = State::SignalLost;
        drop(state);
        warn!("signal lost - no packets emitted within scan timeout");
        send_status(shared, StatusCode::SignalLost);
    }
}

fn maybe_emit_stream_change(shared: &Arc<Shared>, uid: crate::demux::ChannelUid) {
    if !shared.request_stream_change.load(Ordering::SeqCst) {
        return;
    }

    let ready = shared.bundle.lock().unwrap().is_ready();
    if !ready {
        return;
    }

    let mut bundle = shared.bundle.lock().unwrap();
    let preferences = *shared.preferences.lock().unwrap();
    bundle.reorder_streams(preferences.language, preferences.audio_codec.unwrap_or(CodecType::MpegAudio));

    let mut current = StreamBundle::new();
    for info in bundle.stream_infos() {
        current.insert(info.clone());
    }
    shared.channel_cache.put(uid, current);

    let mut packet = MsgPacket::stream(StreamOpcode::StreamChange);
    packet.put_u32(bundle.len() as u32);
    for info in bundle.stream_infos() {
        packet.put_u16(info.pid);
        packet.put_string(info.codec_type.wire_name());
        let lang = info.language.map(|l| String::from_utf8_lossy(&l).into_owned()).unwrap_or_default();
        packet.put_string(&lang);
        match info.content_class() {
            ContentClass::Audio => {
                packet.put_u32(info.params.sample_rate);
                packet.put_u32(info.params.channels as u32);
            }
            ContentClass::Video => {
                packet.put_u32(info.params.width);
                packet.put_u32(info.params.height);
                packet.put_u32(info.params.aspect_num);
                packet.put_u32(info.params.aspect_den);
                packet.put_u32(info.params.fps_num);
                packet.put_u32(info.params.fps_den);
            }
            _ => {}
        }
    }

    shared.queue.enqueue(ContentClass::StreamInfo, packet.encode().to_vec());
    shared.request_stream_change.store(false, Ordering::SeqCst);
}

fn emit_stream_packet(shared: &Arc<Shared>, stream_packet: &StreamPacket) {
    let mut packet = MsgPacket::stream(StreamOpcode::MuxPkt).with_client_id(frame_type_code(stream_packet.frame_type));
    packet.put_u16(stream_packet.pid);

    let (pts, dts) = if shared.raw_pts {
        (stream_packet.raw_pts, stream_packet.raw_dts)
    } else {
        (stream_packet.norm_pts, stream_packet.norm_dts)
    };
    packet.put_s64(pts);
    packet.put_s64(dts);

    if shared.protocol_version.load(Ordering::SeqCst) >= PROTOCOL_VERSION_DURATION_FIELD {
        packet.put_u32(stream_packet.duration);
    }

    packet.put_u32(stream_packet.payload.len() as u32);
    packet.put_blob(&stream_packet.payload);

    shared.queue.enqueue(stream_packet.content_class, packet.encode().to_vec());
}

fn send_status(shared: &Arc<Shared>, status: StatusCode) {
    let mut packet = MsgPacket::stream(StreamOpcode::Status);
    packet.put_u32(status.wire_code());
    shared.queue.enqueue(ContentClass::StreamInfo, packet.encode().to_vec());
}

fn frame_type_code(frame_type: FrameType) -> u16 {
    match frame_type {
        FrameType::Unknown => 0,
        FrameType::I => 1,
        FrameType::P => 2,
        FrameType::B => 3,
        FrameType::D => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{ChannelUid, StreamInfo};
    use std::sync::atomic::AtomicU32;

    struct FakeDevice {
        uid: ChannelUid,
        bundle: StreamBundle,
        switch_calls: Arc<AtomicU32>,
        outcome_sequence: Vec<SwitchOutcome>,
    }

    impl ChannelSource for FakeDevice {
        fn uid(&self) -> ChannelUid {
            self.uid
        }
        fn stream_bundle(&self) -> StreamBundle {
            self.bundle.clone()
        }
    }

    impl TunerDevice for FakeDevice {
        fn try_switch(&mut self, _uid: ChannelUid) -> SwitchOutcome {
            let call = self.switch_calls.fetch_add(1, Ordering::SeqCst) as usize;
            *self.outcome_sequence.get(call).unwrap_or(&SwitchOutcome::Ok)
        }
        fn add_pid(&mut self, _pid: u16) {}
        fn attach_receiver(&mut self, _sink: ReceiveSink) {}
        fn detach(&mut self) {}
    }

    #[test]
    fn switch_outcome_ok_attaches_immediately() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let mut streamer = LiveStreamer::new(queue, cache, Duration::from_millis(200), false, 6);

        let mut bundle = StreamBundle::new();
        bundle.insert(StreamInfo::new(256, CodecType::H264));
        let device = Box::new(FakeDevice {
            uid: ChannelUid(1),
            bundle,
            switch_calls: Arc::new(AtomicU32::new(0)),
            outcome_sequence: vec![SwitchOutcome::Ok],
        });

        streamer.switch(device, ChannelUid(1));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(streamer.state(), State::Attached);

        let mut detach_device = FakeDevice {
            uid: ChannelUid(1),
            bundle: StreamBundle::new(),
            switch_calls: Arc::new(AtomicU32::new(0)),
            outcome_sequence: vec![],
        };
        streamer.detach(&mut detach_device);
        assert_eq!(streamer.state(), State::Detached);
    }

    #[test]
    fn i_frame_gate_defaults_to_open_when_disabled() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let streamer = LiveStreamer::new(queue, cache, Duration::from_secs(10), false, 6);
        streamer.set_i_frame_gate(false);
        assert!(streamer.shared.i_frame_seen.load(Ordering::SeqCst));
    }

    fn fake_packet(content_class: ContentClass, frame_type: FrameType) -> StreamPacket {
        StreamPacket {
            pid: 256,
            content_class,
            frame_type,
            raw_pts: 0,
            raw_dts: 0,
            norm_pts: 0,
            norm_dts: 0,
            duration: 0,
            payload: vec![0u8; 4],
        }
    }

    #[test]
    fn subtitle_packets_are_dropped_until_the_first_av_packet_passes() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let streamer = LiveStreamer::new(Arc::clone(&queue), cache, Duration::from_secs(10), false, 6);
        let shared = Arc::clone(&streamer.shared);
        let uid = ChannelUid(1);

        assert!(!dispatch_stream_packet(&shared, uid, &fake_packet(ContentClass::Subtitle, FrameType::Unknown)));
        assert!(!dispatch_stream_packet(&shared, uid, &fake_packet(ContentClass::Teletext, FrameType::Unknown)));

        assert!(dispatch_stream_packet(&shared, uid, &fake_packet(ContentClass::Video, FrameType::I)));

        assert!(dispatch_stream_packet(&shared, uid, &fake_packet(ContentClass::Subtitle, FrameType::Unknown)));
        assert!(dispatch_stream_packet(&shared, uid, &fake_packet(ContentClass::Teletext, FrameType::Unknown)));
    }

    #[test]
    fn switch_resets_the_startup_gate_for_a_fresh_attach() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let mut streamer = LiveStreamer::new(queue, cache, Duration::from_secs(10), false, 6);
        streamer.shared.is_starting.store(false, Ordering::SeqCst);

        let device = Box::new(FakeDevice {
            uid: ChannelUid(1),
            bundle: StreamBundle::new(),
            switch_calls: Arc::new(AtomicU32::new(0)),
            outcome_sequence: vec![SwitchOutcome::Ok],
        });
        streamer.switch(device, ChannelUid(1));
        assert!(streamer.shared.is_starting.load(Ordering::SeqCst));

        let mut detach_device = FakeDevice {
            uid: ChannelUid(1),
            bundle: StreamBundle::new(),
            switch_calls: Arc::new(AtomicU32::new(0)),
            outcome_sequence: vec![],
        };
        streamer.detach(&mut detach_device);
    }

    #[test]
    fn emit_stream_packet_omits_duration_for_older_protocol_versions() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let streamer = LiveStreamer::new(Arc::clone(&queue), cache, Duration::from_secs(10), false, 6);
        streamer.set_protocol_version(4);

        let mut packet = fake_packet(ContentClass::Video, FrameType::I);
        packet.duration = 3600;
        emit_stream_packet(&streamer.shared, &packet);

        let sent = queue.frames_for_test();
        let (wire, _) = MsgPacket::decode(&sent[0]).unwrap();
        // pid (2) + pts (8) + dts (8) + payload len (4) + payload (4), no duration field.
        assert_eq!(wire.payload.len(), 2 + 8 + 8 + 4 + 4);
    }

    #[test]
    fn emit_stream_packet_includes_duration_once_login_announces_v5_or_later() {
        let queue = Arc::new(SendQueue::new());
        let cache = Arc::new(ChannelCache::new());
        let streamer = LiveStreamer::new(Arc::clone(&queue), cache, Duration::from_secs(10), false, 0);
        streamer.set_protocol_version(5);

        let mut packet = fake_packet(ContentClass::Video, FrameType::I);
        packet.duration = 3600;
        emit_stream_packet(&streamer.shared, &packet);

        let sent = queue.frames_for_test();
        let (wire, _) = MsgPacket::decode(&sent[0]).unwrap();
        assert_eq!(wire.payload.len(), 2 + 8 + 8 + 4 + 4 + 4);
    }
}

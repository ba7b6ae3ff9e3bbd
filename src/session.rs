//! Per-client request/response session (§4.10 spawns one of these per
//! accepted connection; this module is its body).
//!
//! A `Session` owns exactly one [`LiveStreamer`] and one [`SendQueue`] for
//! the lifetime of the connection (§3 Ownership). It runs a blocking
//! read loop on its own thread, decoding [`MsgPacket`] requests and either
//! handling them directly (`LOGIN`, `CHANNELSTREAM_*`) or forwarding them
//! to an injected [`RequestHandler`] for everything out of scope (§6.3).

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::channel_cache::ChannelCache;
use crate::demux::ChannelUid;
use crate::error::Result;
use crate::queue::SendQueue;
use crate::streamer::{LiveStreamer, StreamPreferences, TunerDevice};
use crate::wire::{ChannelId, MsgPacket, RequestOpcode};

/// Acquires a tuner device for a channel switch. Device selection (which
/// physical tuner, CAM slot assignment, priority arbitration) is host-SDK
/// glue and out of scope (§1) — this crate only needs *a* device to drive
/// through [`TunerDevice`].
pub trait DeviceProvider: Send + Sync {
    fn acquire(&self) -> Box<dyn TunerDevice>;
}

/// Handles every request-group this crate doesn't implement directly
/// (EPG, timers, recordings, artwork, scan — §6.3). Returns `None` to fall
/// back to a generic "not implemented" error response.
pub trait RequestHandler: Send {
    fn handle(&mut self, request: &MsgPacket) -> Option<MsgPacket>;
}

/// A no-op handler used when the embedding host hasn't installed one yet;
/// every out-of-scope request gets the generic not-implemented error.
pub struct NullRequestHandler;
impl RequestHandler for NullRequestHandler {
    fn handle(&mut self, _request: &MsgPacket) -> Option<MsgPacket> {
        None
    }
}

/// Lightweight shared handle an [`crate::accept::AcceptLoop`] keeps per
/// session for housekeeping: liveness and out-of-band notifications,
/// without needing access to the session's private state.
#[derive(Clone)]
pub struct SessionHandle {
    pub client_id: u16,
    queue: Arc<SendQueue>,
    active: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Notifies this client that the host's channel list changed (§4.10 —
    /// delivered immediately, not rate-limited).
    pub fn notify_channels_changed(&self) {
        let packet = MsgPacket::new(ChannelId::Requests, NOTIFY_CHANNELS_CHANGED);
        self.queue.enqueue(crate::demux::ContentClass::StreamInfo, packet.encode().to_vec());
    }

    /// Notifies this client that recordings or timers changed (§4.10 —
    /// rate-limited by the caller to once per 10s).
    pub fn notify_recordings_or_timers_changed(&self) {
        let packet = MsgPacket::new(ChannelId::Requests, NOTIFY_RECORDINGS_TIMERS_CHANGED);
        self.queue.enqueue(crate::demux::ContentClass::StreamInfo, packet.encode().to_vec());
    }

    pub fn shutdown(&self) {
        self.queue.shutdown(false);
        self.active.store(false, Ordering::SeqCst);
    }
}

const NOTIFY_CHANNELS_CHANGED: u16 = 0xFF01;
const NOTIFY_RECORDINGS_TIMERS_CHANGED: u16 = 0xFF02;
/// Generic protocol-error response opcode, carrying the original
/// `request_id` so the client can correlate it (§7).
const ERROR_RESPONSE_OPCODE: u16 = 0xFFFF;

pub struct Session {
    client_id: u16,
    stream: TcpStream,
    queue: Arc<SendQueue>,
    device_provider: Arc<dyn DeviceProvider>,
    request_handler: Box<dyn RequestHandler>,
    streamer: LiveStreamer,
    protocol_version: Arc<AtomicU16>,
    active: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        client_id: u16,
        stream: TcpStream,
        channel_cache: Arc<ChannelCache>,
        device_provider: Arc<dyn DeviceProvider>,
        request_handler: Box<dyn RequestHandler>,
        scan_timeout: Duration,
    ) -> Result<Self> {
        let queue = Arc::new(SendQueue::new());
        let streamer = LiveStreamer::new(Arc::clone(&queue), channel_cache, scan_timeout, false, 6);

        Ok(Self {
            client_id,
            stream,
            queue,
            device_provider,
            request_handler,
            streamer,
            protocol_version: Arc::new(AtomicU16::new(0)),
            active: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A cheap, cloneable handle for the accept loop's housekeeping pass.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            client_id: self.client_id,
            queue: Arc::clone(&self.queue),
            active: Arc::clone(&self.active),
        }
    }

    /// Spawns the writer thread and runs the blocking request-read loop on
    /// the calling thread until the connection closes or a fatal I/O error
    /// occurs (§5 "one session thread per client").
    pub fn run(mut self) {
        let writer_queue = Arc::clone(&self.queue);
        let writer_stream = match self.stream.try_clone() {
            Ok(s) => s,
            Err(err) => {
                warn!("client {}: failed to clone socket for writer thread: {err}", self.client_id);
                return;
            }
        };
        std::thread::spawn(move || writer_queue.run_writer(writer_stream));

        loop {
            match MsgPacket::read_from(&mut self.stream) {
                Ok(request) => {
                    if let Some(response) = self.dispatch(&request) {
                        self.queue.enqueue(crate::demux::ContentClass::StreamInfo, response.encode().to_vec());
                    }
                }
                Err(err) => {
                    info!("client {}: connection closed ({err})", self.client_id);
                    break;
                }
            }
        }

        self.active.store(false, Ordering::SeqCst);
        self.queue.shutdown(true);
        let mut device = self.device_provider.acquire();
        self.streamer.detach(device.as_mut());
    }

    fn dispatch(&mut self, request: &MsgPacket) -> Option<MsgPacket> {
        match request.request_opcode() {
            RequestOpcode::Login => Some(self.handle_login(request)),
            RequestOpcode::ChannelStreamOpen => Some(self.handle_stream_open(request)),
            RequestOpcode::ChannelStreamClose => Some(self.handle_stream_close(request)),
            RequestOpcode::ChannelStreamPause => Some(self.handle_stream_pause(request)),
            RequestOpcode::ChannelStreamRequest => {
                self.queue.request();
                Some(ok_response(request))
            }
            RequestOpcode::ChannelStreamSignal => Some(ok_response(request)),
            RequestOpcode::Other(_) => match self.request_handler.handle(request) {
                Some(response) => Some(response),
                None => Some(not_implemented_response(request)),
            },
        }
    }

    fn handle_login(&mut self, request: &MsgPacket) -> MsgPacket {
        let version = request.payload.first().copied().unwrap_or(0) as u16;
        self.protocol_version.store(version, Ordering::SeqCst);
        self.streamer.set_protocol_version(version);
        ok_response(request)
    }

    /// Payload: `uid (u32) · timeout_secs (u32, informational — the scan
    /// timeout itself is fixed at session-construction time from config)
    /// · wait_i_frame (u8)` (§8 scenario 1).
    fn handle_stream_open(&mut self, request: &MsgPacket) -> MsgPacket {
        if request.payload.len() < 9 {
            return error_response(request, "CHANNELSTREAM_OPEN missing channel uid");
        }
        let uid = u32::from_be_bytes(request.payload[0..4].try_into().unwrap());
        let wait_i_frame = request.payload.get(8).copied().unwrap_or(0) != 0;

        self.streamer.set_i_frame_gate(wait_i_frame);
        self.streamer.set_preferences(StreamPreferences::default());

        let device = self.device_provider.acquire();
        self.streamer.switch(device, ChannelUid(uid));

        ok_response(request)
    }

    fn handle_stream_close(&mut self, request: &MsgPacket) -> MsgPacket {
        let mut device = self.device_provider.acquire();
        self.streamer.detach(device.as_mut());
        self.queue.enqueue(
            crate::demux::ContentClass::StreamInfo,
            MsgPacket::stream(crate::wire::StreamOpcode::Detach).encode().to_vec(),
        );
        ok_response(request)
    }

    fn handle_stream_pause(&mut self, request: &MsgPacket) -> MsgPacket {
        let paused = request.payload.first().copied().unwrap_or(0) != 0;
        self.streamer.pause(paused);
        ok_response(request)
    }
}

fn ok_response(request: &MsgPacket) -> MsgPacket {
    MsgPacket::new(ChannelId::Requests, request.opcode).with_request_id(request.request_id)
}

fn not_implemented_response(request: &MsgPacket) -> MsgPacket {
    let mut response = MsgPacket::new(ChannelId::Requests, ERROR_RESPONSE_OPCODE).with_request_id(request.request_id);
    response.put_string("not implemented");
    response
}

fn error_response(request: &MsgPacket, message: &str) -> MsgPacket {
    let mut response = MsgPacket::new(ChannelId::Requests, ERROR_RESPONSE_OPCODE).with_request_id(request.request_id);
    response.put_string(message);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_cache::ChannelSource;
    use crate::demux::StreamBundle;
    use crate::streamer::{ReceiveSink, SwitchOutcome};

    struct StubDevice;
    impl ChannelSource for StubDevice {
        fn uid(&self) -> ChannelUid {
            ChannelUid(0)
        }
        fn stream_bundle(&self) -> StreamBundle {
            StreamBundle::new()
        }
    }
    impl TunerDevice for StubDevice {
        fn try_switch(&mut self, _uid: ChannelUid) -> SwitchOutcome {
            SwitchOutcome::Error
        }
        fn add_pid(&mut self, _pid: u16) {}
        fn attach_receiver(&mut self, _sink: ReceiveSink) {}
        fn detach(&mut self) {}
    }

    struct StubProvider;
    impl DeviceProvider for StubProvider {
        fn acquire(&self) -> Box<dyn TunerDevice> {
            Box::new(StubDevice)
        }
    }

    fn make_session() -> Session {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(client);

        Session::new(
            1,
            server,
            Arc::new(ChannelCache::new()),
            Arc::new(StubProvider),
            Box::new(NullRequestHandler),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn login_records_protocol_version() {
        let mut session = make_session();
        // Opcode 1 is `RequestOpcode::Login` on the wire (§6.3).
        let mut request = MsgPacket::new(ChannelId::Requests, 1).with_request_id(1);
        request.payload.push(6);
        let response = session.dispatch(&request).unwrap();
        assert_eq!(response.request_id, 1);
        assert_eq!(session.protocol_version.load(Ordering::SeqCst), 6);
        // The version must reach the streamer itself, not just sit in the
        // session's bookkeeping field — `emit_stream_packet` reads it live.
        assert_eq!(session.streamer.protocol_version(), 6);
    }

    #[test]
    fn login_with_older_version_suppresses_duration_field_at_emit_time() {
        let mut session = make_session();
        let mut request = MsgPacket::new(ChannelId::Requests, 1).with_request_id(1);
        request.payload.push(4);
        session.dispatch(&request).unwrap();
        assert_eq!(session.streamer.protocol_version(), 4);
    }

    #[test]
    fn unknown_opcode_gets_not_implemented_response() {
        let mut session = make_session();
        let request = MsgPacket::new(ChannelId::Requests, 9001).with_request_id(42);
        let response = session.dispatch(&request).unwrap();
        assert_eq!(response.opcode, ERROR_RESPONSE_OPCODE);
        assert_eq!(response.request_id, 42);
    }

    #[test]
    fn stream_close_enqueues_a_detach_frame() {
        use crate::wire::StreamOpcode;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();

        let mut session = Session::new(
            1,
            server,
            Arc::new(ChannelCache::new()),
            Arc::new(StubProvider),
            Box::new(NullRequestHandler),
            Duration::from_secs(1),
        )
        .unwrap();

        let writer_queue = Arc::clone(&session.queue);
        let writer_stream = client.try_clone().unwrap();
        std::thread::spawn(move || writer_queue.run_writer(writer_stream));

        let request = MsgPacket::new(ChannelId::Requests, 21).with_request_id(5);
        session.dispatch(&request);

        let received = MsgPacket::read_from(&mut client).unwrap();
        assert_eq!(received.channel().unwrap(), ChannelId::Stream);
        assert_eq!(received.opcode, MsgPacket::stream(StreamOpcode::Detach).opcode);
    }
}

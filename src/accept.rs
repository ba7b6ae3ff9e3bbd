//! The server accept loop: listen socket, host allow-list enforcement, and
//! tick-driven housekeeping (§4.10).

use std::net::{SocketAddr, TcpListener};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};
use socket2::{SockRef, TcpKeepalive};

use crate::channel_cache::ChannelCache;
use crate::config::{AllowList, Config};
use crate::error::Result;
use crate::session::{DeviceProvider, RequestHandler, Session, SessionHandle};

/// How long `accept`/the tick loop blocks waiting for a new connection
/// before running housekeeping (§4.10 "5 s timeout").
const TICK_TIMEOUT: Duration = Duration::from_secs(5);
/// Minimum spacing between recordings/timers change notifications (§4.10).
const RECORDINGS_TIMERS_RATE_LIMIT: Duration = Duration::from_secs(10);

/// `time(now) XOR pid`, assigned once at accept-loop startup (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerId(pub u64);

impl ServerId {
    pub fn generate() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        Self(now ^ process::id() as u64)
    }
}

/// Monotonic state counters the host exposes for its channel/recordings/
/// timer lists, used to detect changes worth fanning out to clients
/// (§4.10). Host-SDK glue; injected.
pub trait HostState: Send + Sync {
    fn channels_version(&self) -> u64;
    fn recordings_version(&self) -> u64;
    fn timers_version(&self) -> u64;
}

/// Constructs a fresh `RequestHandler` for each accepted session. Boxed
/// per-connection since the handler may carry per-client state.
pub trait RequestHandlerFactory: Send + Sync {
    fn create(&self) -> Box<dyn RequestHandler>;
}

struct VersionSnapshot {
    channels: u64,
    recordings: u64,
    timers: u64,
    last_recordings_timers_notify: Instant,
}

/// Owns the listen socket and drives the accept/housekeeping tick (§4.10).
pub struct AcceptLoop {
    listener: TcpListener,
    config: Config,
    server_id: ServerId,
    channel_cache: Arc<ChannelCache>,
    device_provider: Arc<dyn DeviceProvider>,
    handler_factory: Arc<dyn RequestHandlerFactory>,
    host_state: Arc<dyn HostState>,
    sessions: Mutex<Vec<SessionHandle>>,
    next_client_id: AtomicU64,
}

impl AcceptLoop {
    pub fn bind(
        config: Config,
        channel_cache: Arc<ChannelCache>,
        device_provider: Arc<dyn DeviceProvider>,
        handler_factory: Arc<dyn RequestHandlerFactory>,
        host_state: Arc<dyn HostState>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            config,
            server_id: ServerId::generate(),
            channel_cache,
            device_provider,
            handler_factory,
            host_state,
            sessions: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
        })
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Runs the accept/housekeeping loop forever. Intended to be the body
    /// of the process's single accept-loop thread (§5).
    pub fn run(&self) -> ! {
        let mut snapshot = VersionSnapshot {
            channels: self.host_state.channels_version(),
            recordings: self.host_state.recordings_version(),
            timers: self.host_state.timers_version(),
            last_recordings_timers_notify: Instant::now(),
        };

        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.on_accept(stream, addr),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(TICK_TIMEOUT);
                    self.on_tick(&mut snapshot);
                }
                Err(err) => {
                    warn!("accept failed: {err}");
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    fn on_accept(&self, stream: std::net::TcpStream, addr: SocketAddr) {
        let allow_list = AllowList::load(&self.config);
        if !allow_list.allows(&addr.ip()) {
            warn!("rejecting connection from {addr}: not in allow-list");
            drop(stream);
            return;
        }

        if let Err(err) = configure_socket(&stream) {
            warn!("failed to configure socket options for {addr}: {err}");
        }

        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst) as u16;
        let handler = self.handler_factory.create();
        let scan_timeout = Duration::from_secs(self.config.timeout_secs as u64);

        match Session::new(
            client_id,
            stream,
            Arc::clone(&self.channel_cache),
            Arc::clone(&self.device_provider),
            handler,
            scan_timeout,
        ) {
            Ok(session) => {
                info!("client {client_id} connected from {addr}");
                self.sessions.lock().unwrap().push(session.handle());
                std::thread::spawn(move || session.run());
            }
            Err(err) => warn!("failed to create session for {addr}: {err}"),
        }
    }

    fn on_tick(&self, snapshot: &mut VersionSnapshot) {
        self.sessions.lock().unwrap().retain(|s| s.is_active());

        let channels_version = self.host_state.channels_version();
        if channels_version != snapshot.channels {
            snapshot.channels = channels_version;
            self.notify_all(|s| s.notify_channels_changed());
        }

        let recordings_version = self.host_state.recordings_version();
        let timers_version = self.host_state.timers_version();
        let changed = recordings_version != snapshot.recordings || timers_version != snapshot.timers;
        if changed && snapshot.last_recordings_timers_notify.elapsed() >= RECORDINGS_TIMERS_RATE_LIMIT {
            snapshot.recordings = recordings_version;
            snapshot.timers = timers_version;
            snapshot.last_recordings_timers_notify = Instant::now();
            self.notify_all(|s| s.notify_recordings_or_timers_changed());
        }
    }

    fn notify_all(&self, notify: impl Fn(&SessionHandle)) {
        for session in self.sessions.lock().unwrap().iter() {
            notify(session);
        }
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

fn configure_socket(stream: &std::net::TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;

    let sock_ref = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(15));
    #[cfg(not(any(target_os = "windows", target_os = "openbsd")))]
    let keepalive = keepalive.with_retries(5);
    sock_ref.set_tcp_keepalive(&keepalive)?;

    Ok(())
}

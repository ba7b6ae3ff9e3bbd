//! Framed outbound message queue: pacing, backpressure, pause/timeshift
//! buffering (§4.9).
//!
//! A `SendQueue` sits between the producers of outbound frames — the
//! `LiveStreamer`'s per-packet emission and `Session`'s own response/status
//! traffic — and a single background writer thread that drains it to the
//! client socket in arrival order. Producers never touch the socket
//! directly; they call [`SendQueue::enqueue`] and move on.

use std::collections::VecDeque;
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::demux::ContentClass;

/// Once buffered bytes under `Paused` cross this threshold, the queue
/// auto-promotes to `Timeshift` so a slow/absent reader doesn't grow memory
/// without bound (§4.9).
const TIMESHIFT_PROMOTE_BYTES: usize = 8 * 1024 * 1024;

/// Socket write timeout (§5 — 10ms, non-blocking with poll in the original;
/// modeled here as a bounded blocking write so the writer thread can return
/// to the queue periodically to recheck pause/cancel state).
const WRITE_TIMEOUT: Duration = Duration::from_millis(10);

/// Dequeue poll interval when the queue is empty or paused.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Paused,
    Timeshift,
}

struct QueuedFrame {
    content_class: ContentClass,
    bytes: Vec<u8>,
}

struct State {
    frames: VecDeque<QueuedFrame>,
    buffered_bytes: usize,
    mode: Mode,
    request_pacing: bool,
    pending_requests: u32,
    shutdown: Option<bool>,
}

/// FIFO of framed outbound packets with pause/timeshift semantics and
/// optional client-paced (request-one) draining.
pub struct SendQueue {
    state: Mutex<State>,
    cv: Condvar,
    cancelled: AtomicBool,
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SendQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                frames: VecDeque::new(),
                buffered_bytes: 0,
                mode: Mode::Normal,
                request_pacing: false,
                pending_requests: 0,
                shutdown: None,
            }),
            cv: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Appends an already-framed packet. In `Timeshift` mode, non-AV
    /// packets (status/stream-change/signaling) are dropped to reserve
    /// memory for audio/video continuity (§4.9).
    pub fn enqueue(&self, content_class: ContentClass, bytes: Vec<u8>) {
        let mut state = self.state.lock().unwrap();

        if state.mode == Mode::Timeshift && !matches!(content_class, ContentClass::Video | ContentClass::Audio) {
            debug!("timeshift active - dropping non-AV frame of {} bytes", bytes.len());
            return;
        }

        state.buffered_bytes += bytes.len();
        state.frames.push_back(QueuedFrame { content_class, bytes });

        if state.mode == Mode::Paused && state.buffered_bytes > TIMESHIFT_PROMOTE_BYTES {
            warn!("send queue exceeded {TIMESHIFT_PROMOTE_BYTES} bytes while paused - promoting to timeshift");
            state.mode = Mode::Timeshift;
        }

        self.cv.notify_all();
    }

    /// `pause(true)` halts dequeue while producers keep enqueuing;
    /// `pause(false)` resumes draining, including any timeshift backlog.
    pub fn pause(&self, paused: bool) {
        let mut state = self.state.lock().unwrap();
        state.mode = if paused {
            Mode::Paused
        } else {
            Mode::Normal
        };
        self.cv.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        !matches!(self.state.lock().unwrap().mode, Mode::Normal)
    }

    /// Enables or disables client-paced draining: when enabled, the writer
    /// emits exactly one frame per `request()` call instead of draining
    /// freely.
    pub fn set_request_pacing(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.request_pacing = enabled;
        state.pending_requests = 0;
        self.cv.notify_all();
    }

    /// Signals the writer it may emit one more frame (request-pacing mode).
    pub fn request(&self) {
        let mut state = self.state.lock().unwrap();
        state.pending_requests += 1;
        self.cv.notify_all();
    }

    /// Drains pending frames on graceful shutdown; discards them on a
    /// forced shutdown (§5 cancellation semantics).
    pub fn shutdown(&self, graceful: bool) {
        let mut state = self.state.lock().unwrap();
        if !graceful {
            state.frames.clear();
            state.buffered_bytes = 0;
        }
        state.shutdown = Some(graceful);
        self.cancelled.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn frames_for_test(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().frames.iter().map(|f| f.bytes.clone()).collect()
    }

    /// Blocks until a frame is ready to send, pause/pacing allows it, or
    /// the queue has been shut down. Returns `None` once the queue is
    /// drained under a forced (or completed graceful) shutdown.
    fn next_frame(&self) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(graceful) = state.shutdown {
                if !graceful || state.frames.is_empty() {
                    return None;
                }
            }

            let may_drain = state.mode != Mode::Paused && (!state.request_pacing || state.pending_requests > 0);

            if may_drain {
                if let Some(frame) = state.frames.pop_front() {
                    state.buffered_bytes -= frame.bytes.len();
                    if state.request_pacing {
                        state.pending_requests -= 1;
                    }
                    return Some(frame.bytes);
                }
            }

            let (next_state, timed_out) = self.cv.wait_timeout(state, POLL_INTERVAL).unwrap();
            state = next_state;
            let _ = timed_out;
        }
    }

    /// Runs the writer loop on the calling thread, draining frames to
    /// `socket` until cancelled. Intended to be the body of the per-session
    /// writer thread spawned alongside a `Session`.
    pub fn run_writer(&self, mut socket: TcpStream) {
        let _ = socket.set_write_timeout(Some(WRITE_TIMEOUT));

        loop {
            let Some(bytes) = self.next_frame() else {
                break;
            };

            if let Err(err) = socket.write_all(&bytes) {
                warn!("send queue writer: socket write failed: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_halts_dequeue_but_not_enqueue() {
        let queue = SendQueue::new();
        queue.pause(true);
        queue.enqueue(ContentClass::Video, vec![1, 2, 3]);
        assert!(queue.is_paused());

        let state = queue.state.lock().unwrap();
        assert_eq!(state.frames.len(), 1);
    }

    #[test]
    fn pause_promotes_to_timeshift_past_threshold() {
        let queue = SendQueue::new();
        queue.pause(true);
        queue.enqueue(ContentClass::Video, vec![0u8; TIMESHIFT_PROMOTE_BYTES + 1]);

        let state = queue.state.lock().unwrap();
        assert_eq!(state.mode, Mode::Timeshift);
    }

    #[test]
    fn timeshift_drops_non_av_frames_on_enqueue() {
        let queue = SendQueue::new();
        {
            let mut state = queue.state.lock().unwrap();
            state.mode = Mode::Timeshift;
        }
        queue.enqueue(ContentClass::StreamInfo, vec![1, 2, 3]);
        let state = queue.state.lock().unwrap();
        assert!(state.frames.is_empty());
    }

    #[test]
    fn request_pacing_releases_exactly_one_frame_per_request() {
        let queue = SendQueue::new();
        queue.set_request_pacing(true);
        queue.enqueue(ContentClass::Video, vec![1]);
        queue.enqueue(ContentClass::Video, vec![2]);

        queue.request();
        // Draining happens off the writer thread in production; here we
        // exercise the same gate `next_frame` uses directly.
        let mut state = queue.state.lock().unwrap();
        assert_eq!(state.pending_requests, 1);
        state.pending_requests -= 1;
        let frame = state.frames.pop_front().unwrap();
        assert_eq!(frame.bytes, vec![1]);
    }

    #[test]
    fn forced_shutdown_discards_pending_frames() {
        let queue = SendQueue::new();
        queue.enqueue(ContentClass::Video, vec![1, 2, 3]);
        queue.shutdown(false);
        assert!(queue.next_frame().is_none());
    }
}

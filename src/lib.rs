#![deny(rustdoc::missing_crate_level_docs)]

//! # robotv-core
//!
//! `robotv-core` is the streaming core of a DVR-host server plugin: it
//! accepts client connections, demultiplexes the MPEG transport stream a
//! tuner device hands it, and re-frames the result as a live, pausable,
//! timeshift-capable stream over a simple length-prefixed wire protocol.
//!
//! The crate does not talk to any particular DVR host SDK, tuner hardware,
//! or EPG/recording backend directly — those are injected through the
//! [`channel_cache::ChannelSource`], [`streamer::TunerDevice`],
//! [`session::DeviceProvider`], [`session::RequestHandler`], and
//! [`accept::HostState`] traits. An embedding host provides implementations
//! of these and wires up [`accept::AcceptLoop`] to get a running server.
//!
//! ## Module overview
//!
//! - [`error`]: the crate-wide `RoboTvError` type and `Result` alias.
//! - [`config`]: layered configuration (defaults, `robotv.toml`,
//!   environment, CLI flags) and the connection allow-list.
//! - [`wire`]: the length-prefixed `MsgPacket` frame and its opcode tables.
//! - [`demux`]: MPEG-TS demultiplexing, per-PID codec parsing, and the
//!   per-channel stream bundle.
//! - [`channel_cache`]: cross-session caching of a channel's last-known
//!   stream layout, so a switch to an already-seen channel can skip the
//!   re-scan.
//! - [`queue`]: the outbound `SendQueue` — pacing, pause, and timeshift
//!   buffering for one client's framed traffic.
//! - [`streamer`]: the live streamer — channel-switch state machine,
//!   I-frame gating, signal-loss detection, and packet emission.
//! - [`session`]: the per-client request/response loop that owns one
//!   streamer and one send queue.
//! - [`accept`]: the TCP accept loop, host allow-list enforcement, and
//!   periodic housekeeping.
//! - [`utils`]: shared bit-level reading utilities used by the codec
//!   parsers.

/// TCP accept loop, allow-list enforcement, and housekeeping.
pub mod accept;

/// Cross-session cache of a channel's last-known stream layout.
pub mod channel_cache;

/// Layered configuration and the connection allow-list.
pub mod config;

/// MPEG-TS demultiplexing and per-PID codec parsing.
pub mod demux;

/// Crate-wide error type.
pub mod error;

/// Outbound framed send queue: pacing, pause, timeshift.
pub mod queue;

/// Per-client request/response session.
pub mod session;

/// Live streamer: channel-switch FSM, I-frame gating, signal loss.
pub mod streamer;

/// Shared bit-level reading utilities.
pub mod utils;

/// Wire framing: `MsgPacket` and its opcode tables.
pub mod wire;

pub use error::{Result, RoboTvError};

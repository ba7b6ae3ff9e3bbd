//! # Error Types
//!
//! Central error type for the robotv-core crate. Every fallible operation in
//! the crate returns [`Result<T>`], a specialization of `std::result::Result`
//! over [`RoboTvError`].
//!
//! Tuner switch outcomes (`Encrypted`, `AllTunersBusy`, `BlockedByRecording`)
//! are intentionally *not* variants here: they are classified, expected
//! results of a channel switch attempt, not failures. See
//! [`crate::streamer::SwitchOutcome`].

use std::net::IpAddr;
use thiserror::Error;

/// Primary error type for the robotv-core crate
#[derive(Error, Debug)]
pub enum RoboTvError {
    /// I/O errors from sockets, files, or the ring buffer's backing store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A request frame was malformed, used an unknown opcode, or failed a
    /// protocol-version check
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A TS packet, PES header, or elementary-stream frame failed to parse
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration could not be resolved (bad CLI flag, malformed config
    /// file, unreadable allow-list)
    #[error("config error: {0}")]
    Config(String),

    /// A peer address was rejected by the allow-list
    #[error("connection from {0} is not allowed")]
    NotAllowed(IpAddr),
}

/// A specialized `Result` type for robotv-core operations
pub type Result<T> = std::result::Result<T, RoboTvError>;

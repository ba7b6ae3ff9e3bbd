//! # Configuration
//!
//! Layered configuration, resolved once at process start: built-in defaults,
//! then an optional `robotv.toml` in the configuration directory, then
//! `ROBOTV_*` environment variables, then CLI flags — each layer overriding
//! the last. The resolved [`Config`] is published into a process-wide
//! [`lazy_static`] slot the same way the teacher crate publishes its own
//! singleton, so collaborators that are not handed a `Config` explicitly
//! (e.g. the allow-list loader) can still read it.

use lazy_static::lazy_static;
use clap::Parser;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Result, RoboTvError};

/// Default TCP port the accept loop listens on
pub const DEFAULT_PORT: u16 = 34892;
/// Default channel-switch / signal-loss timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Command-line surface for the server binary embedding this crate
#[derive(Debug, Parser)]
#[command(name = "robotv", about = "RoboTV-compatible live streaming server")]
pub struct CliArgs {
    /// TCP port to listen on
    #[arg(short = 'p', long, env = "ROBOTV_PORT")]
    pub port: Option<u16>,

    /// Channel-switch / signal-loss timeout in seconds
    #[arg(short = 't', long, env = "ROBOTV_TIMEOUT")]
    pub timeout: Option<u32>,

    /// Directory holding `allowed_hosts.conf` and `robotv.toml`
    #[arg(short = 'c', long, env = "ROBOTV_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,
}

/// On-disk `robotv.toml` layer; every field optional so a partial file only
/// overrides what it names
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    port: Option<u16>,
    timeout: Option<u32>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port for the accept loop
    pub port: u16,
    /// Channel-switch retry / signal-loss timeout, in seconds
    pub timeout_secs: u32,
    /// Directory holding `allowed_hosts.conf` (and `robotv.toml`, if present)
    pub config_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            config_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Resolves configuration from defaults, an optional `robotv.toml` in
    /// `args.config_dir` (or `.` if unset), then environment (already folded
    /// into `args` via clap's `env` attribute), then explicit CLI flags.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let mut config = Config::default();

        let config_dir = args.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if let Ok(text) = std::fs::read_to_string(config_dir.join("robotv.toml")) {
            let file: FileConfig = toml::from_str(&text)
                .map_err(|e| RoboTvError::Config(format!("robotv.toml: {e}")))?;
            if let Some(port) = file.port {
                config.port = port;
            }
            if let Some(timeout) = file.timeout {
                config.timeout_secs = timeout;
            }
        }
        config.config_dir = config_dir;

        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(timeout) = args.timeout {
            config.timeout_secs = timeout;
        }

        Ok(config)
    }

    /// Publishes `self` as the process-wide configuration singleton
    pub fn install(self) {
        *CONFIG.write().unwrap() = self;
    }

    /// Path to the primary allow-list file, `allowed_hosts.conf` under the
    /// configuration directory
    pub fn allow_list_path(&self) -> PathBuf {
        self.config_dir.join("allowed_hosts.conf")
    }

    /// Path to the legacy fallback allow-list, `svdrphosts.conf` next to
    /// `allowed_hosts.conf`
    pub fn legacy_allow_list_path(&self) -> PathBuf {
        self.config_dir.join("svdrphosts.conf")
    }
}

/// Returns a clone of the process-wide configuration singleton
pub fn current() -> Config {
    CONFIG.read().unwrap().clone()
}

/// An allow-list of CIDR prefixes restricting which peer addresses may
/// connect, loaded fresh per connection per §4.10.
///
/// Falls back from `allowed_hosts.conf` to a neighboring `svdrphosts.conf`,
/// and ultimately to `127.0.0.1` only, matching the host's own convention.
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: Vec<(IpAddr, u8)>,
}

impl AllowList {
    /// Loads the allow-list for `config`, trying `allowed_hosts.conf` first,
    /// then `svdrphosts.conf`, then defaulting to loopback-only.
    pub fn load(config: &Config) -> Self {
        for path in [config.allow_list_path(), config.legacy_allow_list_path()] {
            if let Ok(text) = std::fs::read_to_string(&path) {
                return Self::parse(&text);
            }
        }
        Self {
            entries: vec![("127.0.0.1".parse().unwrap(), 32)],
        }
    }

    fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(entry) = parse_cidr(line) {
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            entries.push(("127.0.0.1".parse().unwrap(), 32));
        }
        Self { entries }
    }

    /// Tests whether `addr` matches any entry in the allow-list
    pub fn allows(&self, addr: &IpAddr) -> bool {
        self.entries.iter().any(|(net, bits)| matches_cidr(addr, net, *bits))
    }
}

fn parse_cidr(line: &str) -> Option<(IpAddr, u8)> {
    let mut parts = line.splitn(2, '/');
    let addr: IpAddr = parts.next()?.parse().ok()?;
    let bits = match parts.next() {
        Some(bits) => bits.parse().ok()?,
        None => match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        },
    };
    Some((addr, bits))
}

fn matches_cidr(addr: &IpAddr, net: &IpAddr, prefix_bits: u8) -> bool {
    match (addr, net) {
        (IpAddr::V4(a), IpAddr::V4(n)) => {
            let mask = if prefix_bits == 0 { 0 } else { u32::MAX << (32 - prefix_bits.min(32)) };
            (u32::from_be_bytes(a.octets()) & mask) == (u32::from_be_bytes(n.octets()) & mask)
        }
        (IpAddr::V6(a), IpAddr::V6(n)) => {
            let mask = if prefix_bits == 0 { 0 } else { u128::MAX << (128 - prefix_bits.min(128)) };
            (u128::from_be_bytes(a.octets()) & mask) == (u128::from_be_bytes(n.octets()) & mask)
        }
        _ => false,
    }
}

/// Creates a default `robotv.toml` template at `path` if it doesn't exist yet
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = format!(
            "# RoboTV server configuration\nport = {DEFAULT_PORT}\ntimeout = {DEFAULT_TIMEOUT_SECS}\n"
        );
        std::fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_defaults_to_loopback() {
        let list = AllowList::parse("");
        assert!(list.allows(&"127.0.0.1".parse().unwrap()));
        assert!(!list.allows(&"10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn allow_list_matches_cidr_prefix() {
        let list = AllowList::parse("10.0.0.0/24\n# a comment\n192.168.1.1\n");
        assert!(list.allows(&"10.0.0.42".parse().unwrap()));
        assert!(!list.allows(&"10.0.1.42".parse().unwrap()));
        assert!(list.allows(&"192.168.1.1".parse().unwrap()));
        assert!(!list.allows(&"192.168.1.2".parse().unwrap()));
    }

    #[test]
    fn cli_overrides_file_which_overrides_default() {
        let args = CliArgs { port: Some(9999), timeout: None, config_dir: None };
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}

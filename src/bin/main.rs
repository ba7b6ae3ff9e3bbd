//! Example binary wiring `robotv-core` into a standalone process. A real
//! DVR host embeds the library directly and supplies its own
//! `DeviceProvider`/`RequestHandler`/`HostState`; this binary stands in for
//! that host with stub implementations so the crate is runnable on its own.

use std::sync::Arc;

use clap::Parser;
use log::info;

use robotv_core::accept::{AcceptLoop, HostState, RequestHandlerFactory};
use robotv_core::channel_cache::{ChannelCache, ChannelSource};
use robotv_core::config::{CliArgs, Config};
use robotv_core::demux::{ChannelUid, StreamBundle};
use robotv_core::error::Result;
use robotv_core::session::{DeviceProvider, NullRequestHandler, RequestHandler};
use robotv_core::streamer::{ReceiveSink, SwitchOutcome, TunerDevice};

/// Stands in for the host's real tuner integration until one is wired up.
struct UnavailableDevice;

impl ChannelSource for UnavailableDevice {
    fn uid(&self) -> ChannelUid {
        ChannelUid(0)
    }
    fn stream_bundle(&self) -> StreamBundle {
        StreamBundle::new()
    }
}

impl TunerDevice for UnavailableDevice {
    fn try_switch(&mut self, _uid: ChannelUid) -> SwitchOutcome {
        SwitchOutcome::AllTunersBusy
    }
    fn add_pid(&mut self, _pid: u16) {}
    fn attach_receiver(&mut self, _sink: ReceiveSink) {}
    fn detach(&mut self) {}
}

struct StubDeviceProvider;
impl DeviceProvider for StubDeviceProvider {
    fn acquire(&self) -> Box<dyn TunerDevice> {
        Box::new(UnavailableDevice)
    }
}

struct NullRequestHandlerFactory;
impl RequestHandlerFactory for NullRequestHandlerFactory {
    fn create(&self) -> Box<dyn RequestHandler> {
        Box::new(NullRequestHandler)
    }
}

/// Reports no changes. A real host updates these counters as its own
/// channel/recording/timer lists mutate.
struct StaticHostState;
impl HostState for StaticHostState {
    fn channels_version(&self) -> u64 {
        0
    }
    fn recordings_version(&self) -> u64 {
        0
    }
    fn timers_version(&self) -> u64 {
        0
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("ROBOTV_LOG", "info")).init();

    let args = CliArgs::parse();
    let config = Config::resolve(&args)?;
    config.clone().install();

    let channel_cache = Arc::new(ChannelCache::new());
    let accept_loop = AcceptLoop::bind(
        config.clone(),
        channel_cache,
        Arc::new(StubDeviceProvider),
        Arc::new(NullRequestHandlerFactory),
        Arc::new(StaticHostState),
    )?;

    info!("listening on port {} (server id {:?})", config.port, accept_loop.server_id());
    accept_loop.run();
}

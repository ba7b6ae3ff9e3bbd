//! Process-wide cache of the last known stream layout per channel (§4.7).
//!
//! Lives for the whole process lifetime: entries are created on first tune,
//! replaced when a freshly observed bundle differs (`StreamBundle::is_meta_of`),
//! and never evicted. A single mutex guards the whole map — contention is
//! negligible since entries are only touched on channel switch and stream
//! change, not per packet.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::demux::{ChannelUid, StreamBundle};

/// A trait for whatever the host exposes as channel metadata (service type,
/// PIDs, languages) — kept abstract since deriving a `StreamBundle` from a
/// live channel lineup is host-SDK glue, out of scope here (§1).
pub trait ChannelSource {
    fn uid(&self) -> ChannelUid;
    fn stream_bundle(&self) -> StreamBundle;
}

#[derive(Default)]
pub struct ChannelCache {
    entries: Mutex<HashMap<ChannelUid, StreamBundle>>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the cached bundle for `uid`, or an empty bundle
    /// if nothing has been cached yet.
    pub fn get(&self, uid: ChannelUid) -> StreamBundle {
        self.entries.lock().unwrap().get(&uid).cloned().unwrap_or_default()
    }

    pub fn put(&self, uid: ChannelUid, bundle: StreamBundle) {
        self.entries.lock().unwrap().insert(uid, bundle);
    }

    /// Derives a bundle from the host's channel metadata and caches it.
    pub fn add_from_channel(&self, channel: &dyn ChannelSource) -> StreamBundle {
        let bundle = channel.stream_bundle();
        self.put(channel.uid(), bundle.clone());
        bundle
    }

    /// Ensures `uid` has a cached bundle, populating it from `channel` on a
    /// cold miss, and returns the one to use (cached, unless the freshly
    /// observed bundle differs, in which case it replaces the cache entry).
    pub fn resolve(&self, channel: &dyn ChannelSource) -> StreamBundle {
        let uid = channel.uid();
        let cached = self.get(uid);

        if cached.is_empty() {
            return self.add_from_channel(channel);
        }

        let current = channel.stream_bundle();
        if !current.is_meta_of(&cached) {
            self.put(uid, current.clone());
            return current;
        }

        cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{CodecType, StreamInfo};

    struct FakeChannel {
        uid: ChannelUid,
        bundle: StreamBundle,
    }

    impl ChannelSource for FakeChannel {
        fn uid(&self) -> ChannelUid {
            self.uid
        }
        fn stream_bundle(&self) -> StreamBundle {
            self.bundle.clone()
        }
    }

    #[test]
    fn get_returns_empty_bundle_for_unknown_uid() {
        let cache = ChannelCache::new();
        assert!(cache.get(ChannelUid(1)).is_empty());
    }

    #[test]
    fn resolve_populates_cache_on_cold_miss() {
        let cache = ChannelCache::new();
        let mut bundle = StreamBundle::new();
        bundle.insert(StreamInfo::new(256, CodecType::H264));
        let channel = FakeChannel { uid: ChannelUid(42), bundle };

        let resolved = cache.resolve(&channel);
        assert_eq!(resolved.len(), 1);
        assert_eq!(cache.get(ChannelUid(42)).len(), 1);
    }

    #[test]
    fn resolve_replaces_cache_when_bundle_differs() {
        let cache = ChannelCache::new();
        let mut old = StreamBundle::new();
        old.insert(StreamInfo::new(256, CodecType::H264));
        cache.put(ChannelUid(42), old);

        let mut fresh = StreamBundle::new();
        fresh.insert(StreamInfo::new(256, CodecType::Hevc));
        let channel = FakeChannel { uid: ChannelUid(42), bundle: fresh };

        let resolved = cache.resolve(&channel);
        assert_eq!(resolved.get(256).unwrap().codec_type, CodecType::Hevc);
    }
}

//! Data model shared by the demultiplexer: stream descriptors, bundles, and
//! the assembled packets each [`super::parser::StreamParser`] emits (§3).

use std::collections::BTreeMap;

/// Stable 32-bit fingerprint of a channel, derived by the host from source,
/// transponder, and service identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelUid(pub u32);

/// Coarse category a `StreamInfo` belongs to, used for I-frame gating,
/// timeshift backpressure, and reorder weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Video,
    Audio,
    Subtitle,
    Teletext,
    /// Internal stream-info / signaling packets, never produced by a
    /// `StreamParser`; used for `STREAMCHANGE`/`SIGNALINFO` bookkeeping.
    StreamInfo,
    None,
}

/// Closed set of elementary-stream codecs this crate can parse (§4.5, §9 —
/// a closed enum dispatched by match, not a parser trait hierarchy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Mpeg2Video,
    H264,
    Hevc,
    MpegAudio,
    Ac3,
    Eac3,
    AacAdts,
    AacLatm,
    DvbSubtitle,
    Teletext,
}

impl CodecType {
    pub fn content_class(self) -> ContentClass {
        match self {
            CodecType::Mpeg2Video | CodecType::H264 | CodecType::Hevc => ContentClass::Video,
            CodecType::MpegAudio | CodecType::Ac3 | CodecType::Eac3 | CodecType::AacAdts | CodecType::AacLatm => {
                ContentClass::Audio
            }
            CodecType::DvbSubtitle => ContentClass::Subtitle,
            CodecType::Teletext => ContentClass::Teletext,
        }
    }

    /// Name used on the wire in `STREAMCHANGE` payloads (§6.2).
    pub fn wire_name(self) -> &'static str {
        match self {
            CodecType::Mpeg2Video => "MPEG2VIDEO",
            CodecType::H264 => "H264",
            CodecType::Hevc => "HEVC",
            CodecType::MpegAudio => "MPEGAUDIO",
            CodecType::Ac3 => "AC3",
            CodecType::Eac3 => "EAC3",
            CodecType::AacAdts => "AACADTS",
            CodecType::AacLatm => "AACLATM",
            CodecType::DvbSubtitle => "SUBTITLE",
            CodecType::Teletext => "TELETEXT",
        }
    }
}

/// Frame type, as recovered from the codec-specific syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameType {
    #[default]
    Unknown,
    I,
    P,
    B,
    D,
}

/// Parsed elementary-stream parameters, codec-family specific.
#[derive(Debug, Clone, Default)]
pub struct CodecParams {
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: u32,
    pub frame_duration: u32,
    pub width: u32,
    pub height: u32,
    pub aspect_num: u32,
    pub aspect_den: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

/// Describes one elementary stream carried at a given PID (§3 `StreamInfo`).
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub pid: u16,
    pub codec_type: CodecType,
    /// ISO-639 3-letter language code, audio/subtitle streams only
    pub language: Option<[u8; 3]>,
    pub audio_type: u8,
    pub params: CodecParams,
}

impl StreamInfo {
    pub fn new(pid: u16, codec_type: CodecType) -> Self {
        Self {
            pid,
            codec_type,
            language: None,
            audio_type: 0,
            params: CodecParams::default(),
        }
    }

    pub fn content_class(&self) -> ContentClass {
        self.codec_type.content_class()
    }

    /// A stream is parsed once its mandatory codec parameters are non-zero
    /// (§3 invariant).
    pub fn is_parsed(&self) -> bool {
        match self.content_class() {
            ContentClass::Video => self.params.width != 0 && self.params.height != 0,
            ContentClass::Audio => self.params.sample_rate != 0 && self.params.channels != 0,
            ContentClass::Subtitle | ContentClass::Teletext => true,
            ContentClass::StreamInfo | ContentClass::None => true,
        }
    }
}

/// Ordered mapping PID → `StreamInfo` describing everything known about the
/// program currently tuned (§3 `StreamBundle`).
#[derive(Debug, Clone, Default)]
pub struct StreamBundle {
    streams: BTreeMap<u16, StreamInfo>,
}

impl StreamBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: StreamInfo) {
        self.streams.insert(info.pid, info);
    }

    pub fn get(&self, pid: u16) -> Option<&StreamInfo> {
        self.streams.get(&pid)
    }

    pub fn get_mut(&mut self, pid: u16) -> Option<&mut StreamInfo> {
        self.streams.get_mut(&pid)
    }

    pub fn remove(&mut self, pid: u16) -> Option<StreamInfo> {
        self.streams.remove(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.values()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// True iff `self` and `other` describe the same set of `(PID, codec
    /// type)` pairs, regardless of parsed parameters (§3).
    pub fn is_meta_of(&self, other: &StreamBundle) -> bool {
        if self.streams.len() != other.streams.len() {
            return false;
        }
        self.streams.iter().all(|(pid, info)| {
            other
                .streams
                .get(pid)
                .is_some_and(|o| o.codec_type == info.codec_type)
        })
    }
}

/// An assembled elementary-stream payload with recovered timestamps (§3
/// `StreamPacket`). The payload is handed off by value once assembled: it
/// crosses a thread boundary (parser thread → session writer) on its way
/// out, so it is owned rather than borrowed from the ring buffer.
#[derive(Debug, Clone)]
pub struct StreamPacket {
    pub pid: u16,
    pub content_class: ContentClass,
    pub frame_type: FrameType,
    /// Raw 33-bit broadcast-clock PTS, sign-extended to 64 bits
    pub raw_pts: i64,
    pub raw_dts: i64,
    /// PTS/DTS monotonized across 33-bit wraps
    pub norm_pts: i64,
    pub norm_dts: i64,
    pub duration: u32,
    pub payload: Vec<u8>,
}

/// 33-bit PTS/DTS sentinel meaning "not present", matching the broadcast
/// convention carried over from the MPEG-TS source material.
pub const NO_PTS: i64 = -1;

/// Adds `duration` to a possibly-wrapped 33-bit PTS/DTS value.
pub fn pts_add(pts: i64, duration: u32) -> i64 {
    if pts == NO_PTS {
        return NO_PTS;
    }
    (pts + duration as i64) & 0x1_FFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_meta_of_ignores_parsed_parameters() {
        let mut a = StreamBundle::new();
        a.insert(StreamInfo::new(256, CodecType::H264));
        let mut b = StreamBundle::new();
        let mut info = StreamInfo::new(256, CodecType::H264);
        info.params.width = 1920;
        info.params.height = 1080;
        b.insert(info);

        assert!(a.is_meta_of(&b));
    }

    #[test]
    fn is_meta_of_detects_pid_or_codec_change() {
        let mut a = StreamBundle::new();
        a.insert(StreamInfo::new(256, CodecType::H264));
        let mut b = StreamBundle::new();
        b.insert(StreamInfo::new(256, CodecType::Hevc));
        assert!(!a.is_meta_of(&b));

        let mut c = StreamBundle::new();
        c.insert(StreamInfo::new(257, CodecType::H264));
        assert!(!a.is_meta_of(&c));
    }

    #[test]
    fn stream_is_parsed_once_mandatory_params_nonzero() {
        let mut info = StreamInfo::new(256, CodecType::AacAdts);
        assert!(!info.is_parsed());
        info.params.sample_rate = 44100;
        info.params.channels = 2;
        assert!(info.is_parsed());
    }
}

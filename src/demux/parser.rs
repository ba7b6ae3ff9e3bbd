//! Per-PID elementary-stream parser: PES unwrapping, frame-boundary
//! synchronization, and payload parsing for the ten codecs this crate
//! understands (§4.4, §4.5).
//!
//! Every parser shares one state machine (`StreamParser`): buffer incoming
//! bytes in a [`RingBuffer`], look for a codec-specific alignment header,
//! and once a full frame plus the start of the next one is visible, emit a
//! [`StreamPacket`]. What differs per codec is only `check_alignment_header`
//! (does the buffer start with a valid frame, and how long is it) and
//! `parse_payload` (what does this frame tell us about the stream). Both are
//! dispatched through the closed `CodecType` enum rather than a trait
//! object hierarchy, so adding a codec means adding a match arm, not a new
//! type.

use log::warn;

use super::pes::parse_pes_header;
use super::ring::RingBuffer;
use super::types::{pts_add, CodecParams, CodecType, ContentClass, FrameType, StreamPacket, NO_PTS};
use crate::utils::BitReader;

const VIDEO_RING_CAPACITY: usize = 2 * 1024 * 1024;
const AUDIO_RING_CAPACITY: usize = 64 * 1024;

fn ring_capacity(codec_type: CodecType) -> usize {
    match codec_type.content_class() {
        ContentClass::Video => VIDEO_RING_CAPACITY,
        _ => AUDIO_RING_CAPACITY,
    }
}

/// Minimum number of trailing buffered bytes a parser needs before it will
/// even attempt `check_alignment_header` (roughly the fixed header size of
/// each codec's sync pattern).
fn header_size(codec_type: CodecType) -> usize {
    match codec_type {
        CodecType::Mpeg2Video => 6,
        CodecType::H264 => 5,
        CodecType::Hevc => 6,
        CodecType::MpegAudio => 4,
        CodecType::Ac3 => 6,
        CodecType::Eac3 => 6,
        CodecType::AacAdts => 9,
        CodecType::AacLatm => 3,
        CodecType::DvbSubtitle | CodecType::Teletext => 0,
    }
}

/// Per-PID parser state: one instance per entry in a `StreamBundle` (§4.4).
pub struct StreamParser {
    pid: u16,
    codec_type: CodecType,
    ring: RingBuffer,
    header_size: usize,
    startup: bool,
    cur_pts: i64,
    cur_dts: i64,
    last_pts: i64,
    last_dts: i64,
    pts_wraps: i64,
    dts_wraps: i64,
    duration: u32,
    params: CodecParams,
}

/// One past the maximum 33-bit PTS/DTS value; the broadcast clock wraps
/// back to 0 on reaching this (§9 "Endianness"/§3 `StreamPacket`).
const PTS_MODULO: i64 = 1 << 33;
/// A raw PTS/DTS dropping by more than this from the last one seen is
/// treated as a wrap rather than a (nonsensical) large jump backwards (§8
/// invariant: "wrap is expected when `pts + 2³² < lastPts`").
const PTS_WRAP_THRESHOLD: i64 = 1 << 32;

impl StreamParser {
    pub fn new(pid: u16, codec_type: CodecType) -> Self {
        Self {
            pid,
            codec_type,
            ring: RingBuffer::new(ring_capacity(codec_type)),
            header_size: header_size(codec_type),
            startup: true,
            cur_pts: NO_PTS,
            cur_dts: NO_PTS,
            last_pts: NO_PTS,
            last_dts: NO_PTS,
            pts_wraps: 0,
            dts_wraps: 0,
            duration: 0,
            params: CodecParams::default(),
        }
    }

    /// Monotonizes a raw 33-bit PTS against the last raw PTS seen, carrying
    /// an accumulated wrap count so the normalized value only ever
    /// increases (§3 `StreamPacket`, §8 invariant).
    fn normalize_pts(&mut self, raw: i64) -> i64 {
        if raw == NO_PTS {
            return NO_PTS;
        }
        if self.last_pts != NO_PTS && self.last_pts - raw > PTS_WRAP_THRESHOLD {
            self.pts_wraps += 1;
        }
        raw + self.pts_wraps * PTS_MODULO
    }

    fn normalize_dts(&mut self, raw: i64) -> i64 {
        if raw == NO_PTS {
            return NO_PTS;
        }
        if self.last_dts != NO_PTS && self.last_dts - raw > PTS_WRAP_THRESHOLD {
            self.dts_wraps += 1;
        }
        raw + self.dts_wraps * PTS_MODULO
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    /// Feeds one TS packet's payload bytes into the parser and drains every
    /// complete frame the buffer now contains, in order.
    ///
    /// Unlike a single-frame-per-call design, this recurses on the
    /// unconsumed remainder of the ring until no further complete frame can
    /// be extracted, so one call may yield several packets when several
    /// frames were queued up.
    pub fn parse(&mut self, data: &[u8], pusi: bool) -> Vec<StreamPacket> {
        self.put_data(data, pusi);

        let mut packets = Vec::new();
        loop {
            match self.try_extract_frame() {
                Step::Emitted(packet) => packets.push(packet),
                Step::Resynced => continue,
                Step::Idle => break,
            }
        }
        packets
    }

    fn put_data(&mut self, data: &[u8], pusi: bool) {
        let mut data = data;

        if pusi {
            match parse_pes_header(data) {
                Ok(header) => {
                    if self.cur_dts == NO_PTS {
                        self.cur_dts = header.dts;
                    }
                    if self.cur_pts == NO_PTS {
                        self.cur_pts = header.pts;
                    }
                    data = &data[header.payload_offset.min(data.len())..];
                    self.startup = false;
                }
                Err(_) => {
                    // Not every PUSI-marked packet on every content class carries a
                    // fully-formed PES header (DVB subtitle/teletext payloads are
                    // raw PES with no timestamps at all); fall through and buffer
                    // the whole thing.
                    self.startup = false;
                }
            }
        }

        if self.startup || data.is_empty() {
            return;
        }

        let accepted = self.ring.put(data);
        if accepted < data.len() {
            warn!("parser buffer overflow on pid {} - resetting", self.pid);
            self.ring.clear();
        }
    }

    fn try_extract_frame(&mut self) -> Step {
        let available = self.ring.get();
        if available.len() <= self.header_size {
            return Step::Idle;
        }

        let framesize = match self.check_alignment_header(available) {
            Some(size) if size > 0 && available.len() >= size + self.header_size => size,
            _ => return self.resync(available),
        };

        // Eliminate false positives by confirming a second valid header
        // follows immediately, the way the teacher's dispatcher does.
        if self.check_alignment_header(&available[framesize..]).is_none() {
            warn!("pid {}: next frame not found at expected position, resyncing", self.pid);
            return self.resync(available);
        }

        if self.cur_pts == NO_PTS {
            self.cur_pts = pts_add(self.last_pts, self.duration);
        }
        if self.cur_dts == NO_PTS {
            self.cur_dts = pts_add(self.last_dts, self.duration);
        }

        let frame = &self.ring.get()[..framesize];
        let (consumed, frame_type) = self.parse_payload(frame);
        let payload = self.ring.get()[..consumed].to_vec();

        // Normalize against the *previous* raw pts/dts before overwriting
        // them below, so a wrap is detected against the last frame's raw
        // value, not this one's.
        let norm_pts = self.normalize_pts(self.cur_pts);
        let norm_dts = self.normalize_dts(self.cur_dts);

        let packet = StreamPacket {
            pid: self.pid,
            content_class: self.codec_type.content_class(),
            frame_type,
            raw_pts: self.cur_pts,
            raw_dts: self.cur_dts,
            norm_pts,
            norm_dts,
            duration: self.duration,
            payload,
        };

        self.last_pts = self.cur_pts;
        self.last_dts = self.cur_dts;
        self.cur_pts = NO_PTS;
        self.cur_dts = NO_PTS;

        self.ring.del(framesize);
        Step::Emitted(packet)
    }

    fn resync(&mut self, available: &[u8]) -> Step {
        let offset = self.find_alignment_offset(available);
        match offset {
            Some(0) => Step::Idle,
            Some(offset) => {
                self.ring.del(offset);
                Step::Resynced
            }
            None if available.len() > self.header_size => {
                self.ring.del(available.len() - self.header_size);
                Step::Resynced
            }
            None => Step::Idle,
        }
    }

    fn find_alignment_offset(&self, buffer: &[u8]) -> Option<usize> {
        let mut offset = 1;
        while offset < buffer.len().saturating_sub(self.header_size) {
            if self.check_alignment_header(&buffer[offset..]).is_some() {
                return Some(offset);
            }
            offset += 1;
        }
        None
    }

    /// Returns `Some(framesize)` if `buffer` starts with a valid frame
    /// header for this codec, dispatched on the closed `CodecType` enum
    /// (§4.5, §9).
    fn check_alignment_header(&self, buffer: &[u8]) -> Option<usize> {
        match self.codec_type {
            CodecType::Mpeg2Video => mpeg2video_framesize(buffer),
            CodecType::H264 => nal_framesize(buffer, 3),
            CodecType::Hevc => nal_framesize(buffer, 3),
            CodecType::MpegAudio => mpeg_audio_framesize(buffer),
            CodecType::Ac3 => ac3_framesize(buffer),
            CodecType::Eac3 => eac3_framesize(buffer),
            CodecType::AacAdts => adts_framesize(buffer).map(|(size, _, _)| size),
            CodecType::AacLatm => latm_framesize(buffer),
            CodecType::DvbSubtitle | CodecType::Teletext => Some(buffer.len()),
        }
    }

    /// Parses one already-bounded frame, updating codec parameters and
    /// `duration` as a side effect, and returns the number of bytes to hand
    /// off as payload (almost always the whole frame).
    fn parse_payload(&mut self, frame: &[u8]) -> (usize, FrameType) {
        match self.codec_type {
            CodecType::Mpeg2Video => self.parse_mpeg2video(frame),
            CodecType::H264 => self.parse_h264(frame),
            CodecType::Hevc => self.parse_hevc(frame),
            CodecType::MpegAudio => self.parse_mpeg_audio(frame),
            CodecType::Ac3 => self.parse_ac3(frame),
            CodecType::Eac3 => self.parse_eac3(frame),
            CodecType::AacAdts => self.parse_adts(frame),
            CodecType::AacLatm => self.parse_latm(frame),
            CodecType::DvbSubtitle | CodecType::Teletext => (frame.len(), FrameType::Unknown),
        }
    }

    fn parse_mpeg2video(&mut self, frame: &[u8]) -> (usize, FrameType) {
        let frame_type = if frame.len() > 5 {
            match (frame[5] >> 3) & 0x07 {
                1 => FrameType::I,
                2 => FrameType::P,
                3 => FrameType::B,
                4 => FrameType::D,
                _ => FrameType::Unknown,
            }
        } else {
            FrameType::Unknown
        };
        (frame.len(), frame_type)
    }

    fn parse_h264(&mut self, frame: &[u8]) -> (usize, FrameType) {
        let mut frame_type = FrameType::Unknown;
        let mut offset = 0;
        while offset + 3 < frame.len() {
            if frame[offset] == 0 && frame[offset + 1] == 0 && frame[offset + 2] == 1 {
                let nal_type = frame[offset + 3] & 0x1F;
                match nal_type {
                    5 => frame_type = FrameType::I,
                    1 => {
                        if frame_type == FrameType::Unknown {
                            frame_type = FrameType::P;
                        }
                    }
                    7 => self.parse_h264_sps(&frame[offset + 4..]),
                    _ => {}
                }
                offset += 3;
            } else {
                offset += 1;
            }
        }
        (frame.len(), frame_type)
    }

    fn parse_h264_sps(&mut self, data: &[u8]) {
        let parse = || -> crate::error::Result<(u32, u32)> {
            let mut reader = BitReader::new(data);
            let profile_idc = reader.read_bits(8)?;
            reader.skip_bits(16)?;
            reader.read_golomb()?;

            if matches!(profile_idc, 100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138) {
                let chroma_format_idc = reader.read_golomb()?;
                if chroma_format_idc == 3 {
                    reader.skip_bits(1)?;
                }
                reader.read_golomb()?;
                reader.read_golomb()?;
                reader.skip_bits(1)?;
                if reader.read_bits(1)? == 1 {
                    let count = if chroma_format_idc != 3 { 8 } else { 12 };
                    for i in 0..count {
                        if reader.read_bits(1)? == 1 {
                            skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                        }
                    }
                }
            }

            reader.read_golomb()?;
            let pic_order_cnt_type = reader.read_golomb()?;
            if pic_order_cnt_type == 0 {
                reader.read_golomb()?;
            } else if pic_order_cnt_type == 1 {
                reader.skip_bits(1)?;
                reader.read_signed_golomb()?;
                reader.read_signed_golomb()?;
                let n = reader.read_golomb()?;
                for _ in 0..n {
                    reader.read_signed_golomb()?;
                }
            }

            reader.read_golomb()?;
            reader.skip_bits(1)?;
            let width_in_mbs = reader.read_golomb()? + 1;
            let height_in_map_units = reader.read_golomb()? + 1;
            let frame_mbs_only = reader.read_bits(1)?;

            let width = width_in_mbs * 16;
            let height = (2 - frame_mbs_only) * height_in_map_units * 16;
            Ok((width, height))
        };

        if let Ok((width, height)) = parse() {
            self.params.width = width;
            self.params.height = height;
        }
    }

    fn parse_hevc(&mut self, frame: &[u8]) -> (usize, FrameType) {
        let mut frame_type = FrameType::Unknown;
        let mut offset = 0;
        while offset + 4 < frame.len() {
            if frame[offset] == 0 && frame[offset + 1] == 0 && frame[offset + 2] == 1 {
                let nal_type = (frame[offset + 3] >> 1) & 0x3F;
                if (16..=21).contains(&nal_type) {
                    frame_type = FrameType::I;
                } else if nal_type <= 9 && frame_type == FrameType::Unknown {
                    frame_type = FrameType::P;
                }
                offset += 3;
            } else {
                offset += 1;
            }
        }
        (frame.len(), frame_type)
    }

    fn parse_mpeg_audio(&mut self, frame: &[u8]) -> (usize, FrameType) {
        if let Some((size, sample_rate, channels)) = mpeg_audio_header(frame) {
            self.params.sample_rate = sample_rate;
            self.params.channels = channels;
            self.duration = 1152 * 90_000 / sample_rate.max(1);
            return (size, FrameType::Unknown);
        }
        (frame.len(), FrameType::Unknown)
    }

    fn parse_ac3(&mut self, frame: &[u8]) -> (usize, FrameType) {
        if let Some((size, sample_rate, channels)) = ac3_header(frame) {
            self.params.sample_rate = sample_rate;
            self.params.channels = channels;
            self.duration = 1536 * 90_000 / sample_rate.max(1);
            return (size, FrameType::Unknown);
        }
        (frame.len(), FrameType::Unknown)
    }

    fn parse_eac3(&mut self, frame: &[u8]) -> (usize, FrameType) {
        if let Some((size, sample_rate, channels)) = eac3_header(frame) {
            self.params.sample_rate = sample_rate;
            self.params.channels = channels;
            self.duration = 1536 * 90_000 / sample_rate.max(1);
            return (size, FrameType::Unknown);
        }
        (frame.len(), FrameType::Unknown)
    }

    fn parse_adts(&mut self, frame: &[u8]) -> (usize, FrameType) {
        if let Some((size, sample_rate, channels)) = adts_framesize(frame) {
            self.params.sample_rate = sample_rate;
            self.params.channels = channels;
            self.duration = 1024 * 90_000 / sample_rate.max(1);
        }
        (frame.len(), FrameType::Unknown)
    }

    fn parse_latm(&mut self, frame: &[u8]) -> (usize, FrameType) {
        (frame.len(), FrameType::Unknown)
    }
}

enum Step {
    Emitted(StreamPacket),
    Resynced,
    Idle,
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> crate::error::Result<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_signed_golomb()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// Scans for the next MPEG-2 video start code (`00 00 01 xx`) after the one
/// at the front of `buffer`, returning its offset as the current frame's
/// size. `None` means not enough data has arrived yet to know where the
/// frame ends.
fn mpeg2video_framesize(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < 4 || buffer[0] != 0 || buffer[1] != 0 || buffer[2] != 1 {
        return None;
    }
    find_start_code(buffer, 3)
}

/// Scans for the next Annex-B start code after `min_header` bytes,
/// returning its offset as the current NAL unit's size.
fn nal_framesize(buffer: &[u8], min_header: usize) -> Option<usize> {
    if buffer.len() < min_header || buffer[0] != 0 || buffer[1] != 0 || buffer[2] != 1 {
        return None;
    }
    find_start_code(buffer, 3)
}

fn find_start_code(buffer: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 2 < buffer.len() {
        if buffer[i] == 0 && buffer[i + 1] == 0 && buffer[i + 2] == 1 {
            return Some(i);
        }
        i += 1;
    }
    None
}

const MPEG_AUDIO_BITRATES: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const MPEG_AUDIO_SAMPLERATES: [u32; 3] = [44100, 48000, 32000];

fn mpeg_audio_header(buffer: &[u8]) -> Option<(usize, u32, u8)> {
    mpeg_audio_framesize(buffer).and_then(|size| {
        let channel_mode = (buffer[3] >> 6) & 0x03;
        let channels = if channel_mode == 3 { 1 } else { 2 };
        let sr_index = (buffer[2] >> 2) & 0x03;
        if sr_index == 3 {
            return None;
        }
        Some((size, MPEG_AUDIO_SAMPLERATES[sr_index as usize], channels))
    })
}

fn mpeg_audio_framesize(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < 4 {
        return None;
    }
    if buffer[0] != 0xFF || (buffer[1] & 0xE0) != 0xE0 {
        return None;
    }
    let layer = (buffer[1] >> 1) & 0x03;
    if layer == 0 {
        return None;
    }
    let bitrate_index = (buffer[2] >> 4) & 0x0F;
    let sr_index = (buffer[2] >> 2) & 0x03;
    if bitrate_index == 0 || bitrate_index == 15 || sr_index == 3 {
        return None;
    }
    let padding = (buffer[2] >> 1) & 0x01;
    let bitrate = MPEG_AUDIO_BITRATES[bitrate_index as usize] * 1000;
    let sample_rate = MPEG_AUDIO_SAMPLERATES[sr_index as usize];

    // 2-bit layer field: 01 = Layer III, 10 = Layer II, 11 = Layer I.
    let size = if layer == 3 {
        ((12 * bitrate / sample_rate) + padding as u32) * 4
    } else {
        (144 * bitrate / sample_rate) + padding as u32
    };

    if size == 0 {
        None
    } else {
        Some(size as usize)
    }
}

/// ATSC A/52 frame size table, words by `[frmsizecod][fscod]` for
/// 48 kHz / 44.1 kHz / 32 kHz. Byte length is `words * 2`.
const AC3_FRAME_SIZE_WORDS: [[u32; 3]; 38] = [
    [64, 69, 96], [64, 70, 96], [80, 87, 120], [80, 88, 120], [96, 104, 144], [96, 105, 144],
    [112, 121, 168], [112, 122, 168], [128, 139, 192], [128, 140, 192], [160, 174, 240],
    [160, 175, 240], [192, 208, 288], [192, 209, 288], [224, 243, 336], [224, 244, 336],
    [256, 278, 384], [256, 279, 384], [320, 348, 480], [320, 349, 480], [384, 417, 576],
    [384, 418, 576], [448, 487, 672], [448, 488, 672], [512, 557, 768], [512, 558, 768],
    [640, 696, 960], [640, 697, 960], [768, 835, 1152], [768, 836, 1152], [896, 975, 1344],
    [896, 976, 1344], [1024, 1114, 1536], [1024, 1115, 1536], [1152, 1253, 1728],
    [1152, 1254, 1728], [1280, 1393, 1920], [1280, 1394, 1920],
];
const AC3_SAMPLERATES: [u32; 3] = [48000, 44100, 32000];
const AC3_CHANNELS: [u8; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

fn ac3_header(buffer: &[u8]) -> Option<(usize, u32, u8)> {
    let size = ac3_framesize(buffer)?;
    let fscod = (buffer[4] >> 6) & 0x03;
    let acmod = buffer[6] >> 5;
    let sample_rate = *AC3_SAMPLERATES.get(fscod as usize)?;
    let channels = *AC3_CHANNELS.get(acmod as usize)?;
    Some((size, sample_rate, channels))
}

fn ac3_framesize(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < 6 || buffer[0] != 0x0B || buffer[1] != 0x77 {
        return None;
    }
    let fscod = (buffer[4] >> 6) & 0x03;
    let frmsizecod = (buffer[4] & 0x3F) as usize;
    if fscod == 3 || frmsizecod >= AC3_FRAME_SIZE_WORDS.len() {
        return None;
    }
    let words = AC3_FRAME_SIZE_WORDS[frmsizecod][fscod as usize];
    Some((words * 2) as usize)
}

const EAC3_SAMPLERATES: [u32; 3] = [48000, 44100, 32000];

fn eac3_header(buffer: &[u8]) -> Option<(usize, u32, u8)> {
    let size = eac3_framesize(buffer)?;
    let fscod = (buffer[4] >> 6) & 0x03;
    let sample_rate = if fscod == 3 {
        EAC3_SAMPLERATES[((buffer[4] >> 4) & 0x03) as usize] / 2
    } else {
        EAC3_SAMPLERATES[fscod as usize]
    };
    let acmod = (buffer[4] >> 1) & 0x07;
    let channels = *AC3_CHANNELS.get(acmod as usize)?;
    Some((size, sample_rate, channels))
}

fn eac3_framesize(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < 6 || buffer[0] != 0x0B || buffer[1] != 0x77 {
        return None;
    }
    let frmsiz = (((buffer[2] as u16 & 0x07) << 8) | buffer[3] as u16) as usize;
    Some((frmsiz + 1) * 2)
}

const AAC_SAMPLERATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];
const AAC_CHANNELS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 8];

/// ADTS header check, faithful to the original demuxer's field layout
/// (§4.6): `channelindex == 7` is a valid (8-channel) configuration, only
/// values above 7 are rejected, and although the nominal header is 9 bytes
/// (room for the optional CRC), only the first 7 bytes of fixed fields are
/// actually read here.
fn adts_framesize(buffer: &[u8]) -> Option<(usize, u32, u8)> {
    if buffer.len() < 7 {
        return None;
    }
    let mut reader = BitReader::new(&buffer[..7]);
    if reader.read_bits(12).ok()? != 0xFFF {
        return None;
    }
    reader.skip_bits(1).ok()?; // MPEG version
    if reader.read_bits(2).ok()? != 0 {
        return None;
    }
    reader.skip_bits(1).ok()?; // protection absent
    reader.skip_bits(2).ok()?; // AOT
    let sample_rate_index = reader.read_bits(4).ok()?;
    if sample_rate_index == 15 {
        return None;
    }
    reader.skip_bits(1).ok()?; // private bit
    let channel_index = reader.read_bits(3).ok()?;
    if channel_index > 7 {
        return None;
    }
    reader.skip_bits(4).ok()?; // original/copy/copyright/home
    let frame_length = reader.read_bits(13).ok()? as usize;

    let sample_rate = *AAC_SAMPLERATES.get(sample_rate_index as usize)?;
    let channels = AAC_CHANNELS[channel_index as usize];
    Some((frame_length, sample_rate, channels))
}

/// LOAS/LATM sync check: 11-bit sync word `0x2B7` followed by a 13-bit
/// `AudioMuxLengthBytes` field.
fn latm_framesize(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < 3 {
        return None;
    }
    let sync = ((buffer[0] as u16) << 3) | (buffer[1] >> 5) as u16;
    if sync != 0x2B7 {
        return None;
    }
    let length = (((buffer[1] & 0x1F) as usize) << 8) | buffer[2] as usize;
    Some(length + 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adts_frame(sample_rate_index: u8, channel_index: u8, frame_length: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 9];
        bytes[0] = 0xFF;
        bytes[1] = 0xF1; // MPEG-4, layer 0, protection absent
        bytes[2] = (sample_rate_index << 2) | (channel_index >> 2);
        bytes[3] = ((channel_index & 0x3) << 6) | ((frame_length >> 11) as u8 & 0x3);
        bytes[4] = ((frame_length >> 3) & 0xFF) as u8;
        bytes[5] = ((frame_length & 0x7) as u8) << 5;
        bytes
    }

    #[test]
    fn adts_accepts_eight_channel_configuration() {
        let header = adts_frame(3, 7, 200);
        let (size, rate, channels) = adts_framesize(&header).unwrap();
        assert_eq!(size, 200);
        assert_eq!(rate, 48000);
        assert_eq!(channels, 8);
    }

    #[test]
    fn adts_rejects_channel_index_above_seven() {
        let mut header = adts_frame(3, 0, 200);
        header[3] |= 0b0010_0000; // push channel_index field to 8 (invalid)
        assert!(adts_framesize(&header).is_none());
    }

    #[test]
    fn ac3_framesize_looks_up_standard_table() {
        let mut header = vec![0u8; 6];
        header[0] = 0x0B;
        header[1] = 0x77;
        header[4] = 0x00; // fscod=0 (48kHz), frmsizecod=0
        assert_eq!(ac3_framesize(&header), Some(64 * 2));
    }

    #[test]
    fn eac3_framesize_from_frmsiz_field() {
        let mut header = vec![0u8; 6];
        header[0] = 0x0B;
        header[1] = 0x77;
        header[2] = 0x00;
        header[3] = 0x09; // frmsiz = 9 -> (9+1)*2 = 20 bytes
        assert_eq!(eac3_framesize(&header), Some(20));
    }

    #[test]
    fn parser_assembles_stream_packet_with_extrapolated_pts() {
        let mut parser = StreamParser::new(256, CodecType::AacAdts);
        // Frame bytes must actually reach the declared `frame_length`, or
        // the boundary check in `try_extract_frame` never sees enough data
        // and falls into resync instead of emitting.
        let mut frame1 = adts_frame(3, 1, 20);
        frame1.resize(20, 0xAB);
        let mut data = vec![
            0x00, 0x00, 0x01, 0xC0, 0x00, 0x00, 0x80, 0x80, 0x00,
        ];
        data.extend_from_slice(&frame1);
        let mut frame2 = adts_frame(3, 1, 20);
        frame2.resize(20, 0xAB);
        data.extend_from_slice(&frame2);

        let packets = parser.parse(&data, true);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].pid, 256);
        assert_eq!(packets[0].payload.len(), 20);
    }

    #[test]
    fn normalize_pts_is_monotonic_across_a_33_bit_wrap() {
        let mut parser = StreamParser::new(256, CodecType::AacAdts);
        let near_max = PTS_MODULO - 10;
        let first = parser.normalize_pts(near_max);
        assert_eq!(first, near_max);

        parser.last_pts = near_max;
        let wrapped_raw = 5; // broadcast clock rolled over past 2^33
        let second = parser.normalize_pts(wrapped_raw);
        assert!(second > first);
        assert_eq!(second, wrapped_raw + PTS_MODULO);
    }

    #[test]
    fn normalize_pts_passes_through_ordinary_increases_unchanged() {
        let mut parser = StreamParser::new(256, CodecType::AacAdts);
        parser.last_pts = 1_000;
        assert_eq!(parser.normalize_pts(1_500), 1_500);
    }
}

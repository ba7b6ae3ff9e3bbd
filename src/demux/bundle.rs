//! TS-packet demultiplexing across a set of per-PID parsers (§4.2, §4.4).
//!
//! `DemuxerBundle` owns one [`StreamParser`] per elementary stream in the
//! currently tuned channel. It strips each arriving 188-byte TS packet down
//! to its payload, routes the payload to the parser for that PID, and
//! tracks readiness (every stream parsed) and reordering (§4.7's weight
//! scheme, used when choosing which audio/subtitle stream a client sees
//! first).

use log::debug;

use super::parser::StreamParser;
use super::types::{CodecType, StreamBundle, StreamInfo, StreamPacket};
use crate::error::{Result, RoboTvError};

pub const TS_PACKET_SIZE: usize = 188;
const TS_SYNC_BYTE: u8 = 0x47;

struct TsHeader {
    pid: u16,
    payload_unit_start: bool,
    payload_offset: usize,
    has_payload: bool,
}

fn parse_ts_header(packet: &[u8]) -> Result<TsHeader> {
    if packet.len() < TS_PACKET_SIZE {
        return Err(RoboTvError::Parse("TS packet shorter than 188 bytes".into()));
    }
    if packet[0] != TS_SYNC_BYTE {
        return Err(RoboTvError::Parse("missing TS sync byte".into()));
    }

    let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
    let payload_unit_start = (packet[1] & 0x40) != 0;
    let adaptation_field_control = (packet[3] >> 4) & 0x03;
    let has_adaptation = adaptation_field_control == 0b10 || adaptation_field_control == 0b11;
    let has_payload = adaptation_field_control == 0b01 || adaptation_field_control == 0b11;

    let mut payload_offset = 4;
    if has_adaptation {
        let adaptation_length = packet[4] as usize;
        payload_offset += 1 + adaptation_length;
    }

    Ok(TsHeader {
        pid,
        payload_unit_start,
        payload_offset: payload_offset.min(TS_PACKET_SIZE),
        has_payload,
    })
}

/// One elementary stream's metadata paired with the parser assembling its
/// frames.
struct DemuxEntry {
    info: StreamInfo,
    parser: StreamParser,
}

/// The set of per-PID parsers backing the channel currently being streamed.
#[derive(Default)]
pub struct DemuxerBundle {
    entries: Vec<DemuxEntry>,
}

impl DemuxerBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn find_index(&self, pid: u16) -> Option<usize> {
        self.entries.iter().position(|e| e.info.pid == pid)
    }

    /// Feeds one 188-byte TS packet to the parser for its PID, returning
    /// any frames the parser completed as a result. Packets for PIDs with
    /// no registered parser are silently dropped.
    pub fn process_ts_packet(&mut self, packet: &[u8]) -> Result<Vec<StreamPacket>> {
        let header = parse_ts_header(packet)?;

        let Some(index) = self.find_index(header.pid) else {
            return Ok(Vec::new());
        };

        if !header.has_payload {
            return Ok(Vec::new());
        }

        let entry = &mut self.entries[index];
        let payload = &packet[header.payload_offset..TS_PACKET_SIZE];
        let packets = entry.parser.parse(payload, header.payload_unit_start);

        if !packets.is_empty() {
            entry.info.params = entry.parser.params().clone();
        }

        Ok(packets)
    }

    /// True once every registered stream has recovered its mandatory codec
    /// parameters (§3 `StreamInfo::is_parsed`).
    pub fn is_ready(&self) -> bool {
        self.entries.iter().all(|e| {
            let parsed = e.info.is_parsed();
            if !parsed {
                debug!("stream with pid {} not parsed yet", e.info.pid);
            }
            parsed
        })
    }

    /// Rebuilds the parser set from a fresh `StreamBundle`, reusing the
    /// previous `StreamInfo` (and its recovered parameters) for any PID
    /// whose codec type is unchanged, so a mere PMT refresh doesn't throw
    /// away parsing progress.
    pub fn update_from(&mut self, bundle: &StreamBundle) {
        let old: Vec<DemuxEntry> = std::mem::take(&mut self.entries);

        self.entries = bundle
            .iter()
            .map(|info| {
                let reused = old
                    .iter()
                    .find(|e| e.info.pid == info.pid && e.info.codec_type == info.codec_type);

                match reused {
                    Some(prior) => DemuxEntry {
                        info: prior.info.clone(),
                        parser: StreamParser::new(info.pid, info.codec_type),
                    },
                    None => DemuxEntry {
                        info: info.clone(),
                        parser: StreamParser::new(info.pid, info.codec_type),
                    },
                }
            })
            .collect();
    }

    /// Reorders streams by the 32-bit weight scheme (§4.7): video first,
    /// then audio (preferred language and preferred codec outranking PID
    /// order), then subtitles, with PID as the final tiebreak.
    pub fn reorder_streams(&mut self, preferred_language: Option<[u8; 3]>, preferred_audio_codec: CodecType) {
        self.entries.sort_by_key(|e| std::cmp::Reverse(stream_weight(&e.info, preferred_language, preferred_audio_codec)));
    }

    pub fn stream_infos(&self) -> impl Iterator<Item = &StreamInfo> {
        self.entries.iter().map(|e| &e.info)
    }
}

const VIDEO_MASK: u32 = 0x8000_0000;
const AUDIO_MASK: u32 = 0x0080_0000;
const SUBTITLE_MASK: u32 = 0x0040_0000;
const LANGUAGE_MASK: u32 = 0x0020_0000;
const STREAMTYPE_MASK: u32 = 0x0010_0000;
const AUDIOTYPE_MASK: u32 = 0x000F_0000;
const PID_MASK: u32 = 0x0000_FFFF;

fn stream_weight(info: &StreamInfo, preferred_language: Option<[u8; 3]>, preferred_audio_codec: CodecType) -> u32 {
    use super::types::ContentClass;

    let mut w = PID_MASK - (info.pid as u32 & PID_MASK);

    match info.content_class() {
        ContentClass::Video => w |= VIDEO_MASK,
        ContentClass::Audio => {
            w |= AUDIO_MASK;
            if info.codec_type == preferred_audio_codec {
                w |= STREAMTYPE_MASK;
            }
            w |= ((4u32.saturating_sub(info.audio_type as u32)) << 16) & AUDIOTYPE_MASK;
        }
        ContentClass::Subtitle => w |= SUBTITLE_MASK,
        ContentClass::Teletext | ContentClass::StreamInfo | ContentClass::None => {}
    }

    if preferred_language.is_some() && info.language == preferred_language {
        w |= LANGUAGE_MASK;
    }

    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::types::StreamBundle;

    fn packet_for(pid: u16, pusi: bool, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0u8; TS_PACKET_SIZE];
        packet[0] = TS_SYNC_BYTE;
        packet[1] = ((pusi as u8) << 6) | ((pid >> 8) as u8 & 0x1F);
        packet[2] = (pid & 0xFF) as u8;
        packet[3] = 0x10; // no adaptation field, payload present
        packet[4..4 + payload.len()].copy_from_slice(payload);
        packet
    }

    #[test]
    fn drops_packets_for_unregistered_pid() {
        let mut bundle = DemuxerBundle::new();
        let packet = packet_for(999, true, &[0, 0, 1, 0xE0]);
        assert!(bundle.process_ts_packet(&packet).unwrap().is_empty());
    }

    #[test]
    fn is_ready_false_until_all_streams_parsed() {
        let mut streams = StreamBundle::new();
        streams.insert(StreamInfo::new(256, CodecType::AacAdts));
        let mut bundle = DemuxerBundle::new();
        bundle.update_from(&streams);
        assert!(!bundle.is_ready());
    }

    #[test]
    fn reorder_streams_puts_video_before_audio_before_subtitle() {
        let mut streams = StreamBundle::new();
        streams.insert(StreamInfo::new(201, CodecType::AacAdts));
        streams.insert(StreamInfo::new(200, CodecType::H264));
        streams.insert(StreamInfo::new(202, CodecType::DvbSubtitle));
        let mut bundle = DemuxerBundle::new();
        bundle.update_from(&streams);
        bundle.reorder_streams(None, CodecType::AacAdts);

        let pids: Vec<u16> = bundle.stream_infos().map(|i| i.pid).collect();
        assert_eq!(pids, vec![200, 201, 202]);
    }

    #[test]
    fn update_from_reuses_parsed_parameters_for_unchanged_pid_and_codec() {
        let mut streams = StreamBundle::new();
        streams.insert(StreamInfo::new(256, CodecType::AacAdts));
        let mut bundle = DemuxerBundle::new();
        bundle.update_from(&streams);

        bundle.entries[0].info.params.sample_rate = 48000;
        bundle.entries[0].info.params.channels = 2;

        bundle.update_from(&streams);
        assert!(bundle.is_ready());
    }
}

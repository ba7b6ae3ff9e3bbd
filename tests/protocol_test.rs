//! End-to-end scenarios spanning more than one module: TS demultiplexing
//! into a per-PID codec parser, stream reordering by preference, and wire
//! framing over an actual socket.

use robotv_core::demux::{ChannelUid, CodecType, DemuxerBundle, StreamBundle, StreamInfo, TS_PACKET_SIZE};
use robotv_core::wire::{ChannelId, MsgPacket, StreamOpcode};

const TS_SYNC_BYTE: u8 = 0x47;

/// A 9-byte ADTS fixed header (`header_size` for `AacAdts` reserves room
/// for the optional CRC) encoding `frame_length` as the total size of the
/// frame it introduces, including itself.
fn adts_header(frame_length: u16) -> [u8; 9] {
    let sample_rate_index: u8 = 3; // 48 kHz
    let channel_index: u8 = 1; // mono
    let mut header = [0u8; 9];
    header[0] = 0xFF;
    header[1] = 0xF1;
    header[2] = (sample_rate_index << 2) | (channel_index >> 2);
    header[3] = ((channel_index & 0x3) << 6) | ((frame_length >> 11) as u8 & 0x3);
    header[4] = ((frame_length >> 3) & 0xFF) as u8;
    header[5] = ((frame_length & 0x7) as u8) << 5;
    header
}

/// Wraps one TS packet's worth of payload bytes on `pid`. The payload
/// region the demuxer reads is always the full 184 bytes after the TS
/// header, so any unused tail is implicitly zero and must not be depended
/// on as real stream content.
fn ts_packet(pid: u16, pusi: bool, payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut packet = [0u8; TS_PACKET_SIZE];
    packet[0] = TS_SYNC_BYTE;
    packet[1] = ((pusi as u8) << 6) | ((pid >> 8) as u8 & 0x1F);
    packet[2] = (pid & 0xFF) as u8;
    packet[3] = 0x10;
    packet[4..4 + payload.len()].copy_from_slice(payload);
    packet
}

#[test]
fn ts_packet_with_pes_wrapped_adts_frame_emits_exactly_one_stream_packet() {
    let mut streams = StreamBundle::new();
    streams.insert(StreamInfo::new(256, CodecType::AacAdts));
    let mut bundle = DemuxerBundle::new();
    bundle.update_from(&streams);

    // A PES-wrapped ADTS frame (header + 31 bytes of payload, 40 bytes
    // total) followed by a second frame's header, so the parser can
    // confirm the first frame's boundary against the next header before
    // trusting it (§4.4). Exercises TS header parsing, PID routing to the
    // right per-PID parser, PES unwrapping, and ADTS frame-length
    // decoding together, the way they actually run in sequence off the
    // wire.
    let mut payload = vec![0x00, 0x00, 0x01, 0xC0, 0x00, 0x00, 0x80, 0x80, 0x00];
    payload.extend_from_slice(&adts_header(40));
    payload.extend_from_slice(&[0xAB; 31]);
    payload.extend_from_slice(&adts_header(9));

    let packet = ts_packet(256, true, &payload);
    let emitted = bundle.process_ts_packet(&packet).unwrap();

    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].pid, 256);
    assert_eq!(emitted[0].payload.len(), 40);
}

#[test]
fn reorder_streams_prefers_requested_language_within_audio() {
    let mut streams = StreamBundle::new();
    let mut english = StreamInfo::new(301, CodecType::AacAdts);
    english.language = Some(*b"eng");
    streams.insert(english);

    let mut german = StreamInfo::new(300, CodecType::AacAdts);
    german.language = Some(*b"deu");
    streams.insert(german);

    streams.insert(StreamInfo::new(200, CodecType::H264));

    let mut bundle = DemuxerBundle::new();
    bundle.update_from(&streams);
    bundle.reorder_streams(Some(*b"deu"), CodecType::AacAdts);

    let pids: Vec<u16> = bundle.stream_infos().map(|i| i.pid).collect();
    // Video always first; within audio, the preferred-language stream
    // outranks the lower-numbered PID it would otherwise lose to.
    assert_eq!(pids, vec![200, 300, 301]);
}

#[test]
fn msgpacket_round_trips_over_a_real_socket() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let writer = std::thread::spawn(move || {
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let mut packet = MsgPacket::stream(StreamOpcode::MuxPkt).with_request_id(77).with_client_id(1);
        packet.put_u16(256);
        packet.put_s64(90_000);
        packet.put_s64(90_000);
        packet.put_blob(&[0xDE, 0xAD, 0xBE, 0xEF]);
        std::io::Write::write_all(&mut client, &packet.encode()).unwrap();
    });

    let (mut server, _) = listener.accept().unwrap();
    let received = MsgPacket::read_from(&mut server).unwrap();
    writer.join().unwrap();

    assert_eq!(received.channel().unwrap(), ChannelId::Stream);
    assert_eq!(received.request_id, 77);
    assert_eq!(received.client_id, 1);
    assert_eq!(received.payload[received.payload.len() - 4..], [0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn channel_uid_is_a_transparent_wrapper_used_as_a_cache_key() {
    let a = ChannelUid(42);
    let b = ChannelUid(42);
    assert_eq!(a, b);
}

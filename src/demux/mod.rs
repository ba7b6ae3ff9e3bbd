//! Live transport-stream demultiplexing: PES reassembly, per-codec frame
//! synchronization, and multi-stream bundling (§3, §4).

pub mod bundle;
pub mod parser;
pub mod pes;
pub mod ring;
pub mod types;

pub use bundle::{DemuxerBundle, TS_PACKET_SIZE};
pub use parser::StreamParser;
pub use ring::RingBuffer;
pub use types::{
    pts_add, ChannelUid, CodecParams, CodecType, ContentClass, FrameType, StreamBundle, StreamInfo,
    StreamPacket, NO_PTS,
};

//! Wire framing: the length-prefixed `MsgPacket` every message on the
//! socket is wrapped in (§6.1), plus the opcode/channel enums for the
//! subset of the protocol this crate implements (§6.2, §6.3).

use std::io::Read;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, RoboTvError};

/// Logical channel a message belongs to (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    Requests,
    Stream,
    Status,
    Osd,
    Scanner,
    Keyboard,
    Artwork,
}

impl ChannelId {
    fn to_wire(self) -> u16 {
        match self {
            ChannelId::Requests => 1,
            ChannelId::Stream => 2,
            ChannelId::Status => 3,
            ChannelId::Osd => 4,
            ChannelId::Scanner => 5,
            ChannelId::Keyboard => 6,
            ChannelId::Artwork => 7,
        }
    }

    fn from_wire(value: u16) -> Result<Self> {
        Ok(match value {
            1 => ChannelId::Requests,
            2 => ChannelId::Stream,
            3 => ChannelId::Status,
            4 => ChannelId::Osd,
            5 => ChannelId::Scanner,
            6 => ChannelId::Keyboard,
            7 => ChannelId::Artwork,
            other => return Err(RoboTvError::Protocol(format!("unknown channel id {other}"))),
        })
    }
}

/// Opcodes carried on `ChannelId::Stream` (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOpcode {
    MuxPkt,
    StreamChange,
    SignalInfo,
    Status,
    Detach,
}

impl StreamOpcode {
    fn to_wire(self) -> u16 {
        match self {
            StreamOpcode::MuxPkt => 1,
            StreamOpcode::StreamChange => 2,
            StreamOpcode::SignalInfo => 3,
            StreamOpcode::Status => 4,
            StreamOpcode::Detach => 5,
        }
    }
}

/// A subset of the session request opcode table (§6.3) — only the groups
/// this crate handles directly. Everything else arrives as
/// `RequestOpcode::Other(raw)` and is routed to a `RequestHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOpcode {
    Login,
    ChannelStreamOpen,
    ChannelStreamClose,
    ChannelStreamPause,
    ChannelStreamRequest,
    ChannelStreamSignal,
    Other(u16),
}

impl RequestOpcode {
    fn to_wire(self) -> u16 {
        match self {
            RequestOpcode::Login => 1,
            RequestOpcode::ChannelStreamOpen => 20,
            RequestOpcode::ChannelStreamClose => 21,
            RequestOpcode::ChannelStreamPause => 22,
            RequestOpcode::ChannelStreamRequest => 23,
            RequestOpcode::ChannelStreamSignal => 24,
            RequestOpcode::Other(raw) => raw,
        }
    }

    fn from_wire(value: u16) -> Self {
        match value {
            1 => RequestOpcode::Login,
            20 => RequestOpcode::ChannelStreamOpen,
            21 => RequestOpcode::ChannelStreamClose,
            22 => RequestOpcode::ChannelStreamPause,
            23 => RequestOpcode::ChannelStreamRequest,
            24 => RequestOpcode::ChannelStreamSignal,
            other => RequestOpcode::Other(other),
        }
    }
}

/// A framed protocol message: fixed header plus an opaque payload.
///
/// `opcode` and `channel_id` are kept as raw `u16`s at this layer — callers
/// translate to/from `StreamOpcode`/`RequestOpcode` since the same frame
/// shape carries both request/response and live-stream traffic.
#[derive(Debug, Clone)]
pub struct MsgPacket {
    pub channel_id: u16,
    pub opcode: u16,
    pub request_id: u32,
    pub user_data: u32,
    pub client_id: u16,
    pub payload_checksum: Option<u16>,
    pub payload: Vec<u8>,
}

impl MsgPacket {
    pub fn new(channel_id: ChannelId, opcode: u16) -> Self {
        Self {
            channel_id: channel_id.to_wire(),
            opcode,
            request_id: 0,
            user_data: 0,
            client_id: 0,
            payload_checksum: None,
            payload: Vec::new(),
        }
    }

    pub fn stream(opcode: StreamOpcode) -> Self {
        Self::new(ChannelId::Stream, opcode.to_wire())
    }

    pub fn with_request_id(mut self, id: u32) -> Self {
        self.request_id = id;
        self
    }

    pub fn with_client_id(mut self, id: u16) -> Self {
        self.client_id = id;
        self
    }

    pub fn put_u16(&mut self, value: u16) {
        self.payload.put_u16(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.payload.put_u32(value);
    }

    pub fn put_s64(&mut self, value: i64) {
        self.payload.put_i64(value);
    }

    pub fn put_string(&mut self, value: &str) {
        self.payload.extend_from_slice(value.as_bytes());
        self.payload.push(0);
    }

    pub fn put_blob(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
    }

    /// Serializes the full frame (header + payload) to bytes.
    pub fn encode(&self) -> BytesMut {
        let mut checksum_present = self.payload_checksum.is_some();
        let checksum = self.payload_checksum.unwrap_or(0);

        // An explicit zero checksum is indistinguishable from "absent" on
        // this wire; callers that care can always recompute it on decode.
        if checksum == 0 {
            checksum_present = false;
        }

        let mut buf = BytesMut::with_capacity(17 + self.payload.len());
        buf.put_u16(self.channel_id);
        buf.put_u16(self.opcode);
        buf.put_u32(self.request_id);
        buf.put_u32(self.user_data);
        buf.put_u16(self.client_id);
        buf.put_u8(checksum_present as u8);
        if checksum_present {
            buf.put_u16(checksum);
        }
        buf.put_u32(self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parses a full frame from `data`, returning the packet and the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = data;
        if cursor.len() < 15 {
            return Err(RoboTvError::Protocol("frame shorter than fixed header".into()));
        }

        let channel_id = cursor.get_u16();
        let opcode = cursor.get_u16();
        let request_id = cursor.get_u32();
        let user_data = cursor.get_u32();
        let client_id = cursor.get_u16();
        let checksum_present = cursor.get_u8() != 0;

        let payload_checksum = if checksum_present {
            if cursor.len() < 2 {
                return Err(RoboTvError::Protocol("truncated checksum field".into()));
            }
            Some(cursor.get_u16())
        } else {
            None
        };

        if cursor.len() < 4 {
            return Err(RoboTvError::Protocol("truncated payload length field".into()));
        }
        let payload_length = cursor.get_u32() as usize;

        if cursor.len() < payload_length {
            return Err(RoboTvError::Protocol("truncated payload".into()));
        }

        let payload = cursor[..payload_length].to_vec();
        let consumed = data.len() - cursor.len() + payload_length;

        Ok((
            Self {
                channel_id,
                opcode,
                request_id,
                user_data,
                client_id,
                payload_checksum,
                payload,
            },
            consumed,
        ))
    }

    pub fn channel(&self) -> Result<ChannelId> {
        ChannelId::from_wire(self.channel_id)
    }

    pub fn request_opcode(&self) -> RequestOpcode {
        RequestOpcode::from_wire(self.opcode)
    }

    /// Reads one full frame off a blocking stream, field by field, rather
    /// than requiring the whole frame to already be buffered (the
    /// counterpart to [`Self::decode`] for a live socket read loop, §5's
    /// "blocking reads" suspension point).
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 15];
        reader.read_exact(&mut fixed)?;
        let mut cursor: &[u8] = &fixed;

        let channel_id = cursor.get_u16();
        let opcode = cursor.get_u16();
        let request_id = cursor.get_u32();
        let user_data = cursor.get_u32();
        let client_id = cursor.get_u16();
        let checksum_present = cursor.get_u8() != 0;

        let payload_checksum = if checksum_present {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            Some(u16::from_be_bytes(buf))
        } else {
            None
        };

        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let payload_length = u32::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; payload_length];
        reader.read_exact(&mut payload)?;

        Ok(Self {
            channel_id,
            opcode,
            request_id,
            user_data,
            client_id,
            payload_checksum,
            payload,
        })
    }
}

// wire.rs — SRT PDU header, command tags, and the packed little-endian
// read/write helpers used by both the transport and the snapshot codec.
//
// The write side keeps the engine's SizeBuf shape (a flat byte Vec plus a
// cursor, msg_write_byte/short/long helpers) from common.rs/qcommon.rs,
// generalized from Quake's big-endian "coord" encoding to this protocol's
// plain little-endian fixed fields (§4.6, §6).

pub const MAX_PAYLOAD: usize = 1400;
pub const PACKET_HEADER_LEN: usize = 1 + 1 + 4 + 4; // command, flags, sequence, data_length

/// Closed set of command tags (§3). Unknown tags on the wire are dropped
/// with a log, never matched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReqQuit = 0x01,
    ReqConnect = 0x02,
    ReqGameStart = 0x03,
    RspGameStart = 0x04,
    Input = 0x05,
    Snapshot = 0x06,
    Leaderboard = 0x07,
    DownloadReq = 0x08,
    DownloadRsp = 0x09,
    DownloadData = 0x0a,
    DownloadErr = 0x0b,
}

impl Command {
    pub fn from_u8(b: u8) -> Option<Command> {
        use Command::*;
        Some(match b {
            0x01 => ReqQuit,
            0x02 => ReqConnect,
            0x03 => ReqGameStart,
            0x04 => RspGameStart,
            0x05 => Input,
            0x06 => Snapshot,
            0x07 => Leaderboard,
            0x08 => DownloadReq,
            0x09 => DownloadRsp,
            0x0a => DownloadData,
            0x0b => DownloadErr,
            _ => return None,
        })
    }
}

pub const FLAG_ACK: u8 = 1 << 0;

/// One SRT PDU: fixed header plus payload (§3, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub command: Command,
    pub flags: u8,
    pub sequence: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn data(command: Command, sequence: u32, payload: Vec<u8>) -> Self {
        assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds MAX_PAYLOAD");
        Self {
            command,
            flags: 0,
            sequence,
            payload,
        }
    }

    pub fn ack(command: Command, sequence: u32) -> Self {
        Self {
            command,
            flags: FLAG_ACK,
            sequence,
            payload: Vec::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PACKET_HEADER_LEN + self.payload.len());
        out.push(self.command as u8);
        out.push(self.flags);
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a received datagram. Returns `None` (caller logs and drops,
    /// per §4.2 "Malformed PDU ... drop and log") on any structural
    /// mismatch: short header, unknown command, or a declared data_length
    /// that disagrees with the bytes actually received.
    pub fn decode(buf: &[u8]) -> Option<Packet> {
        if buf.len() < PACKET_HEADER_LEN {
            return None;
        }
        let command = Command::from_u8(buf[0])?;
        let flags = buf[1];
        let sequence = u32::from_le_bytes(buf[2..6].try_into().unwrap());
        let data_length = u32::from_le_bytes(buf[6..10].try_into().unwrap()) as usize;
        let payload = &buf[PACKET_HEADER_LEN..];
        if data_length > payload.len() || data_length > MAX_PAYLOAD {
            return None;
        }
        Some(Packet {
            command,
            flags,
            sequence,
            payload: payload[..data_length].to_vec(),
        })
    }
}

// ============================================================
// SizeBuf — flat byte buffer with a write cursor, used by the snapshot
// and leaderboard codecs for packed little-endian fixed-layout records.
// ============================================================

#[derive(Debug, Clone)]
pub struct SizeBuf {
    data: Vec<u8>,
}

impl SizeBuf {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for SizeBuf {
    fn default() -> Self {
        Self::new()
    }
}

pub fn msg_write_u16(sb: &mut SizeBuf, v: u16) {
    sb.data.extend_from_slice(&v.to_le_bytes());
}

pub fn msg_write_u32(sb: &mut SizeBuf, v: u32) {
    sb.data.extend_from_slice(&v.to_le_bytes());
}

pub fn msg_write_f32(sb: &mut SizeBuf, v: f32) {
    sb.data.extend_from_slice(&v.to_le_bytes());
}

pub fn msg_write_bytes(sb: &mut SizeBuf, v: &[u8]) {
    sb.data.extend_from_slice(v);
}

/// Read cursor over a decoded payload. Mirrors msg_read_*'s readcount
/// bookkeeping but returns `Option` instead of silently reading past the
/// end of a short buffer.
pub struct MsgReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MsgReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let b = self.take(2)?;
        Some(u16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let b = self.take(4)?;
        Some(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        let b = self.take(4)?;
        Some(f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        self.take(n)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_roundtrips_data() {
        let p = Packet::data(Command::Input, 7, vec![1, 2, 3]);
        let bytes = p.encode();
        let back = Packet::decode(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn packet_roundtrips_ack() {
        let p = Packet::ack(Command::Snapshot, 42);
        let bytes = p.encode();
        let back = Packet::decode(&bytes).unwrap();
        assert!(back.is_ack());
        assert_eq!(back.sequence, 42);
        assert!(back.payload.is_empty());
    }

    #[test]
    fn decode_rejects_short_header() {
        assert!(Packet::decode(&[0u8; 4]).is_none());
    }

    #[test]
    fn decode_rejects_unknown_command() {
        let mut bytes = Packet::data(Command::Input, 1, vec![]).encode();
        bytes[0] = 0xff;
        assert!(Packet::decode(&bytes).is_none());
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut bytes = Packet::data(Command::Input, 1, vec![9, 9]).encode();
        // Claim more data than actually follows.
        bytes[6..10].copy_from_slice(&100u32.to_le_bytes());
        assert!(Packet::decode(&bytes).is_none());
    }

    #[test]
    fn msg_reader_reads_in_order() {
        let mut sb = SizeBuf::new();
        msg_write_u32(&mut sb, 7);
        msg_write_f32(&mut sb, 1.5);
        let bytes = sb.into_bytes();
        let mut r = MsgReader::new(&bytes);
        assert_eq!(r.read_u32(), Some(7));
        assert_eq!(r.read_f32(), Some(1.5));
        assert_eq!(r.read_u32(), None);
    }
}

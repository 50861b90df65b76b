use bytes::Buf;

use crate::error::TransportError;

/// First byte of every MPEG-TS transport packet; a datagram starting with it is a
///  raw elementary stream rather than RTP.
pub const MPEG_TS_SYNC_BYTE: u8 = 0x47;

pub const RTP_HEADER_SIZE: usize = 12;

pub const PROFILE_MPEG_AUDIO: u8 = 0x0E;
pub const PROFILE_MPEG_VIDEO: u8 = 0x20;
pub const PROFILE_MPEG_TS: u8 = 0x21;

/// The payload types accepted by default: MPEG-TS, MPEG video and MPEG audio
///  profiles. Deployments that carry other profiles can widen the allow-list
///  through [`crate::config::TransportConfig::payload_types`].
pub const DEFAULT_PAYLOAD_TYPES: [u8; 3] =
    [PROFILE_MPEG_TS, PROFILE_MPEG_VIDEO, PROFILE_MPEG_AUDIO];

/// The verdict on a received datagram, decided by [`PacketFrame::classify`].
#[derive(Debug, PartialEq, Eq)]
pub enum Classification {
    /// An RTP packet with a supported version and payload type.
    Rtp,
    /// A raw MPEG-TS datagram, to be delivered byte-for-byte.
    Raw,
    /// Neither - the datagram is dropped, with the reason logged.
    Invalid(String),
}

/// One received datagram, owning its MTU-sized backing buffer.
///
/// The readable range is `cursor..limit`; stripping the RTP header advances
///  `cursor` past it (and may shrink `limit` for padding), and the reader advances
///  `cursor` as payload bytes are consumed until the frame is exhausted.
///
/// Invariant: `cursor <= limit <= buf.len()` at all times. A frame is owned by
///  exactly one pipeline stage at a time and moves between them, never shared.
pub struct PacketFrame {
    buf: Vec<u8>,
    cursor: usize,
    limit: usize,
    /// meaningful only after a successful [`PacketFrame::strip_rtp_header`]
    sequence: u16,
}

impl PacketFrame {
    /// Creates an empty frame with the given buffer capacity, typically the MTU.
    pub fn new(capacity: usize) -> PacketFrame {
        PacketFrame {
            buf: vec![0; capacity],
            cursor: 0,
            limit: 0,
            sequence: 0,
        }
    }

    /// The full backing buffer, for the socket to receive into.
    pub fn recv_buf(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Marks the first `len` bytes as received data and resets the cursor.
    pub fn set_received_len(&mut self, len: usize) {
        assert!(len <= self.buf.len());
        self.cursor = 0;
        self.limit = len;
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// The sequence number following this frame's, mod 65536.
    pub fn next_sequence(&self) -> u16 {
        self.sequence.wrapping_add(1)
    }

    /// Number of unconsumed payload bytes.
    pub fn remaining(&self) -> usize {
        self.limit - self.cursor
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[self.cursor..self.limit]
    }

    /// Decides whether this datagram is RTP, a raw MPEG-TS stream, or garbage.
    ///
    /// A leading MPEG-TS sync byte means raw. Otherwise the RTP version must be 2
    ///  and the payload type must be in the allow-list.
    pub fn classify(&self, payload_types: &[u8]) -> Classification {
        if self.limit < RTP_HEADER_SIZE {
            return Classification::Invalid(format!("packet too short: {} bytes", self.limit));
        }

        let signature = self.buf[0];
        if signature == MPEG_TS_SYNC_BYTE {
            return Classification::Raw;
        }

        let version = signature >> 6;
        if version != 2 {
            return Classification::Invalid(format!("unsupported RTP version: {}", version));
        }

        let payload_type = self.buf[1] & 0x7F;
        if payload_types.contains(&payload_type) {
            Classification::Rtp
        }
        else {
            Classification::Invalid(format!("unknown payload profile: {:#04x}", payload_type))
        }
    }

    /// Strips the RTP header in place: reads the sequence number, skips the fixed
    ///  header, CSRC identifiers and any extension block by advancing the cursor,
    ///  and shrinks the limit by the trailing padding count if the padding bit is
    ///  set. No allocation.
    ///
    /// Valid only for frames classified [`Classification::Rtp`]; fails with
    ///  [`TransportError::InvalidPacket`] if the declared header or padding
    ///  lengths would overrun the datagram.
    pub fn strip_rtp_header(&mut self) -> Result<(), TransportError> {
        if self.limit < RTP_HEADER_SIZE {
            return Err(TransportError::InvalidPacket(format!(
                "packet too short: {} bytes", self.limit
            )));
        }

        let mut hdr = &self.buf[..self.limit];
        let signature = hdr.get_u8();
        let _marker_and_payload_type = hdr.get_u8();
        self.sequence = hdr.get_u16();

        let csrc_count = (signature & 0x0F) as usize;
        let mut header_len = RTP_HEADER_SIZE + 4 * csrc_count;

        if signature & 0x10 != 0 {
            // extension block: 2 bytes id + 2 bytes length in 32-bit words
            if header_len + 4 > self.limit {
                return Err(TransportError::InvalidPacket(
                    "extension header past end of packet".to_string(),
                ));
            }
            let ext_words =
                u16::from_be_bytes([self.buf[header_len + 2], self.buf[header_len + 3]]) as usize;
            header_len += 4 + 4 * ext_words;
        }

        let mut limit = self.limit;
        if signature & 0x20 != 0 {
            let padding = self.buf[limit - 1] as usize;
            if padding > limit {
                return Err(TransportError::InvalidPacket(format!(
                    "padding count {} exceeds packet length {}", padding, limit
                )));
            }
            limit -= padding;
        }

        if header_len > limit {
            return Err(TransportError::InvalidPacket(format!(
                "header length {} exceeds payload end {}", header_len, limit
            )));
        }

        self.cursor = header_len;
        self.limit = limit;
        Ok(())
    }

    /// Copies up to `dst.len()` unconsumed bytes into `dst`, advancing the cursor.
    ///  Returns the number of bytes copied; 0 means the frame is exhausted and the
    ///  caller should move on to the next one.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.remaining());
        dst[..count].copy_from_slice(&self.buf[self.cursor..self.cursor + count]);
        self.cursor += count;
        count
    }

    /// Test shortcut: a frame holding exactly the given bytes.
    #[cfg(test)]
    pub fn from_slice(data: &[u8]) -> PacketFrame {
        let mut frame = PacketFrame::new(data.len().max(RTP_HEADER_SIZE));
        frame.recv_buf()[..data.len()].copy_from_slice(data);
        frame.set_received_len(data.len());
        frame
    }
}

impl std::fmt::Debug for PacketFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketFrame")
            .field("cursor", &self.cursor)
            .field("limit", &self.limit)
            .field("sequence", &self.sequence)
            .finish()
    }
}

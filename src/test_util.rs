//! Builders for hand-crafted datagrams used across the test modules.

use crate::packet::PROFILE_MPEG_TS;

/// Builds the raw bytes of an RTP datagram with configurable header features.
pub struct RtpDatagram {
    seq: u16,
    payload_type: u8,
    csrc_count: u8,
    extension_words: Option<u16>,
    padding: u8,
    payload: Vec<u8>,
}

impl RtpDatagram {
    pub fn new(seq: u16) -> RtpDatagram {
        RtpDatagram {
            seq,
            payload_type: PROFILE_MPEG_TS,
            csrc_count: 0,
            extension_words: None,
            padding: 0,
            payload: Vec::new(),
        }
    }

    pub fn payload_type(mut self, payload_type: u8) -> Self {
        self.payload_type = payload_type;
        self
    }

    pub fn csrc_count(mut self, count: u8) -> Self {
        assert!(count <= 0x0F);
        self.csrc_count = count;
        self
    }

    pub fn extension_words(mut self, words: u16) -> Self {
        self.extension_words = Some(words);
        self
    }

    /// Total number of trailing padding bytes, including the count byte itself.
    pub fn padding(mut self, count: u8) -> Self {
        assert!(count >= 1);
        self.padding = count;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut signature = 0x80 | self.csrc_count;
        if self.extension_words.is_some() {
            signature |= 0x10;
        }
        if self.padding > 0 {
            signature |= 0x20;
        }

        let mut data = Vec::new();
        data.push(signature);
        data.push(self.payload_type);
        data.extend_from_slice(&self.seq.to_be_bytes());
        data.extend_from_slice(&0x1234_5678u32.to_be_bytes()); // timestamp
        data.extend_from_slice(&0x8765_4321u32.to_be_bytes()); // SSRC

        for _ in 0..self.csrc_count {
            data.extend_from_slice(&0xAAAA_AAAAu32.to_be_bytes());
        }

        if let Some(words) = self.extension_words {
            data.extend_from_slice(&[0xBE, 0xDE]); // extension id
            data.extend_from_slice(&words.to_be_bytes());
            data.extend(std::iter::repeat(0xEE).take(4 * words as usize));
        }

        data.extend_from_slice(&self.payload);

        if self.padding > 0 {
            data.extend(std::iter::repeat(0).take(self.padding as usize - 1));
            data.push(self.padding);
        }

        data
    }
}

//! Handshake request/response encoding and decoding.
//!
//! Both handshake PDUs open with the flag byte `0x65`
//! (handshake · management · beginning · ending) followed by the management
//! opcode `0x6C`. The request packs up to eight proposed protocol versions
//! into four nibble-pair bytes, in descending preference order; a zero nibble
//! marks an empty slot.

use super::flags::HeaderFlags;
use super::{BTP_HANDSHAKE_OPCODE, HANDSHAKE_REQUEST_SIZE, HANDSHAKE_RESPONSE_SIZE};
use crate::error::CodecError;

/// Handshake request, sent by the peer to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Proposed protocol versions, descending preference (1..=8 entries).
    pub versions: Vec<u8>,
    /// Proposed ATT_MTU; 0 means the peer leaves the choice to us.
    pub att_mtu: u16,
    /// Proposed client window size.
    pub client_window_size: u8,
}

impl HandshakeRequest {
    /// Decode a handshake request from its 9-byte wire form.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HANDSHAKE_REQUEST_SIZE {
            return Err(CodecError::TruncatedFrame {
                needed: HANDSHAKE_REQUEST_SIZE,
                actual: data.len(),
            });
        }
        check_handshake_header(data[0], data[1])?;

        // Four version bytes, high nibble first; zero nibbles are empty slots.
        let mut versions = Vec::with_capacity(8);
        for &byte in &data[2..6] {
            for nibble in [byte >> 4, byte & 0x0f] {
                if nibble != 0 {
                    versions.push(nibble);
                }
            }
        }
        if versions.is_empty() {
            return Err(CodecError::NoVersionsProposed);
        }

        let att_mtu = u16::from_le_bytes([data[6], data[7]]);
        let client_window_size = data[8];

        Ok(Self {
            versions,
            att_mtu,
            client_window_size,
        })
    }

    /// Encode to the 9-byte wire form.
    ///
    /// Only the first eight versions fit; an odd-length version list is
    /// padded with a leading zero nibble, so `[4]` encodes as `04 00 00 00`
    /// and `[4, 5, 6]` as `04 56 00 00`.
    pub fn encode(&self) -> Vec<u8> {
        let mut nibbles = [0u8; 8];
        let count = self.versions.len().min(8);
        let start = count % 2;
        for (slot, &version) in nibbles[start..].iter_mut().zip(&self.versions) {
            *slot = version & 0x0f;
        }

        let mut buf = Vec::with_capacity(HANDSHAKE_REQUEST_SIZE);
        buf.push(handshake_flags().bits());
        buf.push(BTP_HANDSHAKE_OPCODE);
        for pair in nibbles.chunks_exact(2) {
            buf.push(pair[0] << 4 | pair[1]);
        }
        buf.extend_from_slice(&self.att_mtu.to_le_bytes());
        buf.push(self.client_window_size);
        buf
    }
}

/// Handshake response, our reply carrying the negotiated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Chosen protocol version.
    pub version: u8,
    /// Chosen ATT_MTU.
    pub att_mtu: u16,
    /// Chosen window size.
    pub window_size: u8,
}

impl HandshakeResponse {
    /// Encode to the 6-byte wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HANDSHAKE_RESPONSE_SIZE);
        buf.push(handshake_flags().bits());
        buf.push(BTP_HANDSHAKE_OPCODE);
        buf.push(self.version);
        buf.extend_from_slice(&self.att_mtu.to_le_bytes());
        buf.push(self.window_size);
        buf
    }

    /// Decode a handshake response from its 6-byte wire form.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HANDSHAKE_RESPONSE_SIZE {
            return Err(CodecError::TruncatedFrame {
                needed: HANDSHAKE_RESPONSE_SIZE,
                actual: data.len(),
            });
        }
        check_handshake_header(data[0], data[1])?;

        Ok(Self {
            version: data[2],
            att_mtu: u16::from_le_bytes([data[3], data[4]]),
            window_size: data[5],
        })
    }
}

fn handshake_flags() -> HeaderFlags {
    let mut flags = HeaderFlags::new();
    flags.set(HeaderFlags::HANDSHAKE);
    flags.set(HeaderFlags::MANAGEMENT);
    flags.set(HeaderFlags::BEGINNING_SEGMENT);
    flags.set(HeaderFlags::ENDING_SEGMENT);
    flags
}

fn check_handshake_header(flags: u8, opcode: u8) -> Result<(), CodecError> {
    if flags != handshake_flags().bits() || opcode != BTP_HANDSHAKE_OPCODE {
        return Err(CodecError::BadHandshakeHeader { flags, opcode });
    }
    Ok(())
}

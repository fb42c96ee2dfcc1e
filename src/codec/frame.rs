//! Data/ack packet encoding and decoding.
//!
//! Field order on the wire is fixed: flags, optional management opcode,
//! optional ack number, sequence number, optional message length, payload.
//! The codec is bit-transparent in the flag field but enforces that each
//! optional field is present exactly when its announcing flag is set.

use super::flags::HeaderFlags;
use crate::error::CodecError;

/// A BTP data or ack packet.
///
/// `header` carries the raw flag bits as they appear on the wire; the
/// optional fields must agree with them, which [`encode`](BtpFrame::encode)
/// and [`decode`](BtpFrame::decode) both verify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BtpFrame {
    /// Bit-packed flag field.
    pub header: HeaderFlags,
    /// Management opcode, present iff the management flag is set.
    pub management_opcode: Option<u8>,
    /// Ack number, present iff the acknowledgement flag is set.
    pub ack_number: Option<u8>,
    /// Sequence number, always present.
    pub sequence_number: u8,
    /// Total message length, present iff the beginning-segment flag is set.
    pub message_length: Option<u16>,
    /// Segment payload.
    pub payload: Vec<u8>,
}

impl BtpFrame {
    /// Build a data segment frame.
    pub fn segment(
        is_beginning: bool,
        is_ending: bool,
        ack_number: Option<u8>,
        sequence_number: u8,
        message_length: Option<u16>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            header: HeaderFlags::for_segment(is_beginning, is_ending, ack_number.is_some()),
            management_opcode: None,
            ack_number,
            sequence_number,
            message_length,
            payload,
        }
    }

    /// Build a standalone ack frame (no payload).
    pub fn standalone_ack(ack_number: u8, sequence_number: u8) -> Self {
        Self {
            header: HeaderFlags::for_standalone_ack(),
            management_opcode: None,
            ack_number: Some(ack_number),
            sequence_number,
            message_length: None,
            payload: Vec::new(),
        }
    }

    /// Header length in bytes for a data segment with the given options.
    ///
    /// Two bytes (flags + sequence number) plus two for the message length on
    /// a beginning segment plus one for a piggybacked ack.
    pub fn data_header_len(is_beginning: bool, has_ack: bool) -> usize {
        2 + if is_beginning { 2 } else { 0 } + usize::from(has_ack)
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.header.has_ack() != self.ack_number.is_some() {
            return Err(CodecError::AckFlagMismatch);
        }
        if self.header.is_beginning_segment() != self.message_length.is_some() {
            return Err(CodecError::BeginFlagMismatch);
        }
        if self.header.is_management() != self.management_opcode.is_some() {
            return Err(CodecError::ManagementFlagMismatch);
        }

        let mut buf = Vec::with_capacity(
            Self::data_header_len(self.message_length.is_some(), self.ack_number.is_some())
                + usize::from(self.management_opcode.is_some())
                + self.payload.len(),
        );
        buf.push(self.header.bits());
        if let Some(opcode) = self.management_opcode {
            buf.push(opcode);
        }
        if let Some(ack) = self.ack_number {
            buf.push(ack);
        }
        buf.push(self.sequence_number);
        if let Some(length) = self.message_length {
            buf.extend_from_slice(&length.to_le_bytes());
        }
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode from wire bytes.
    ///
    /// Everything after the last header field is the payload; the payload may
    /// be empty (standalone ack frames have none).
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut pos = 0usize;
        let mut next = |needed: usize| -> Result<usize, CodecError> {
            if pos + needed > data.len() {
                return Err(CodecError::TruncatedFrame {
                    needed: pos + needed,
                    actual: data.len(),
                });
            }
            let at = pos;
            pos += needed;
            Ok(at)
        };

        let header = HeaderFlags::from_bits(data[next(1)?]);

        let management_opcode = if header.is_management() {
            Some(data[next(1)?])
        } else {
            None
        };
        let ack_number = if header.has_ack() {
            Some(data[next(1)?])
        } else {
            None
        };
        let sequence_number = data[next(1)?];
        let message_length = if header.is_beginning_segment() {
            let at = next(2)?;
            Some(u16::from_le_bytes([data[at], data[at + 1]]))
        } else {
            None
        };
        let payload = data[pos..].to_vec();

        Ok(Self {
            header,
            management_opcode,
            ack_number,
            sequence_number,
            message_length,
            payload,
        })
    }
}

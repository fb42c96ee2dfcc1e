//! In-memory session record.
//!
//! Owns the negotiated parameters, the wrapping sequence counters, the
//! reassembly buffer, and the outbound message queue. All arithmetic on
//! sequence and ack numbers is serial (mod 256): distances are computed with
//! wrapping subtraction, which stays correct across counter wrap-around as
//! long as fewer than 256 frames are in flight, which the window bound
//! guarantees.

use std::collections::VecDeque;

use crate::error::BtpProtocolError;
use crate::session::ATT_PDU_HEADER_SIZE;

/// Mutable state of one BTP session.
///
/// Counter initialization encodes the handshake: the handshake response
/// implicitly occupies outbound sequence number 0, so `sequence_number`
/// starts at 0 ("last used") with `prev_incoming_ack_number` one behind it
/// at 255. The response is born outstanding, which is why the factory
/// starts the ack-receive timer. The peer's first frame must carry sequence
/// number 0, hence `prev_incoming_sequence_number` also starts at 255.
pub(crate) struct SessionState {
    /// Largest BTP frame we exchange: `att_mtu - 3`.
    pub fragment_size: usize,
    /// Negotiated window size.
    pub window_size: u8,
    /// Last used outbound sequence number.
    sequence_number: u8,
    /// Last inbound sequence number we processed.
    prev_incoming_sequence_number: u8,
    /// Last inbound sequence number we have acknowledged to the peer.
    prev_acked_sequence_number: u8,
    /// Last of our sequence numbers the peer has acknowledged.
    prev_incoming_ack_number: u8,
    /// Reassembly in progress, if a begin frame arrived without its end.
    reassembly: Option<Reassembler>,
    /// Outbound messages not yet fully segmented.
    send_queue: VecDeque<MessageCursor>,
    /// Re-entrancy guard for the send loop.
    pub send_in_progress: bool,
    /// Flips to false exactly once, in close.
    pub is_active: bool,
}

impl SessionState {
    pub fn new(att_mtu: u16, window_size: u8) -> Self {
        Self {
            fragment_size: usize::from(att_mtu - ATT_PDU_HEADER_SIZE),
            window_size,
            sequence_number: 0,
            prev_incoming_sequence_number: 255,
            prev_acked_sequence_number: 255,
            prev_incoming_ack_number: 255,
            reassembly: None,
            send_queue: VecDeque::new(),
            send_in_progress: false,
            is_active: true,
        }
    }

    // === Outbound counters ===

    /// Claim the next outbound sequence number (wraps 255 -> 0).
    pub fn next_sequence_number(&mut self) -> u8 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.sequence_number
    }

    /// Number of our frames the peer has not acknowledged yet.
    pub fn in_flight(&self) -> u8 {
        self.sequence_number
            .wrapping_sub(self.prev_incoming_ack_number)
    }

    /// Whether a new data frame may be emitted without breaking the window
    /// bound of `window_size - 1` unacknowledged frames.
    pub fn window_has_room(&self) -> bool {
        self.in_flight() < self.window_size.saturating_sub(1)
    }

    pub fn has_outstanding_frames(&self) -> bool {
        self.prev_incoming_ack_number != self.sequence_number
    }

    /// Validate and apply an inbound ack number.
    ///
    /// Valid iff `prev_incoming_ack < ack <= sequence_number` read serially:
    /// with `off = ack - prev` and `span = seq - prev` (wrapping), the ack is
    /// inside the window iff `0 < off <= span`. Returns whether frames remain
    /// outstanding afterwards.
    pub fn apply_incoming_ack(&mut self, ack: u8) -> Result<bool, BtpProtocolError> {
        let off = ack.wrapping_sub(self.prev_incoming_ack_number);
        let span = self
            .sequence_number
            .wrapping_sub(self.prev_incoming_ack_number);
        if off == 0 || off > span {
            return Err(BtpProtocolError::InvalidAck {
                ack,
                prev_ack: self.prev_incoming_ack_number,
                sequence_number: self.sequence_number,
            });
        }
        self.prev_incoming_ack_number = ack;
        Ok(self.has_outstanding_frames())
    }

    // === Inbound counters ===

    /// Enforce the strict in-order sequence rule and record the new number.
    pub fn record_incoming_sequence(&mut self, sequence: u8) -> Result<(), BtpProtocolError> {
        let expected = self.prev_incoming_sequence_number.wrapping_add(1);
        if sequence != expected {
            return Err(BtpProtocolError::SequenceGap {
                expected,
                actual: sequence,
            });
        }
        self.prev_incoming_sequence_number = sequence;
        Ok(())
    }

    /// Whether the peer is owed an ack for frames we processed.
    pub fn ack_owed(&self) -> bool {
        self.prev_incoming_sequence_number != self.prev_acked_sequence_number
    }

    /// Consume the owed ack, returning the number to put on the wire.
    pub fn take_owed_ack(&mut self) -> Option<u8> {
        if !self.ack_owed() {
            return None;
        }
        self.prev_acked_sequence_number = self.prev_incoming_sequence_number;
        Some(self.prev_incoming_sequence_number)
    }

    // === Reassembly ===

    /// Open a reassembly for a beginning segment.
    pub fn begin_reassembly(
        &mut self,
        message_length: u16,
        payload: &[u8],
    ) -> Result<(), BtpProtocolError> {
        if self.reassembly.is_some() {
            return Err(BtpProtocolError::UnexpectedBeginningSegment);
        }
        let mut reassembler = Reassembler::new(message_length);
        reassembler.append(payload)?;
        self.reassembly = Some(reassembler);
        Ok(())
    }

    /// Append a continuing (or non-begin ending) segment.
    pub fn continue_reassembly(&mut self, payload: &[u8]) -> Result<(), BtpProtocolError> {
        if payload.is_empty() {
            return Err(BtpProtocolError::UnexpectedContinuingSegment);
        }
        match self.reassembly.as_mut() {
            Some(reassembler) => reassembler.append(payload),
            None => Err(BtpProtocolError::UnexpectedContinuingSegment),
        }
    }

    /// Close the reassembly on an ending segment, yielding the message.
    pub fn finish_reassembly(&mut self) -> Result<Vec<u8>, BtpProtocolError> {
        match self.reassembly.take() {
            Some(reassembler) => reassembler.finish(),
            None => Err(BtpProtocolError::UnexpectedContinuingSegment),
        }
    }

    // === Outbound queue ===

    pub fn enqueue_message(&mut self, message: Vec<u8>) {
        self.send_queue.push_back(MessageCursor::new(message));
    }

    pub fn has_queued_messages(&self) -> bool {
        !self.send_queue.is_empty()
    }

    pub fn front_message(&self) -> Option<&MessageCursor> {
        self.send_queue.front()
    }

    /// Copy up to `max` bytes out of the front message, advancing its cursor.
    pub fn take_front_chunk(&mut self, max: usize) -> Vec<u8> {
        match self.send_queue.front_mut() {
            Some(cursor) => cursor.take(max),
            None => Vec::new(),
        }
    }

    pub fn pop_front_message(&mut self) {
        self.send_queue.pop_front();
    }
}

/// Append-only buffer for one inbound message.
struct Reassembler {
    expected: u16,
    buffer: Vec<u8>,
}

impl Reassembler {
    fn new(expected: u16) -> Self {
        Self {
            expected,
            buffer: Vec::with_capacity(usize::from(expected)),
        }
    }

    fn append(&mut self, payload: &[u8]) -> Result<(), BtpProtocolError> {
        if self.buffer.len() + payload.len() > usize::from(self.expected) {
            return Err(BtpProtocolError::ReassemblyOverflow {
                expected: self.expected,
            });
        }
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, BtpProtocolError> {
        if self.buffer.len() != usize::from(self.expected) {
            return Err(BtpProtocolError::MessageLengthMismatch {
                expected: self.expected,
                actual: self.buffer.len(),
            });
        }
        Ok(self.buffer)
    }
}

/// Position into one queued outbound message.
///
/// The message bytes are retained whole; segmentation reads through the
/// offset instead of pre-splitting the payload.
pub(crate) struct MessageCursor {
    bytes: Vec<u8>,
    offset: usize,
}

impl MessageCursor {
    fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, offset: 0 }
    }

    /// True before the first chunk has been taken.
    pub fn at_start(&self) -> bool {
        self.offset == 0
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, max: usize) -> Vec<u8> {
        let end = (self.offset + max).min(self.bytes.len());
        let chunk = self.bytes[self.offset..end].to_vec();
        self.offset = end;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_counters_mark_handshake_outstanding() {
        let state = SessionState::new(23, 6);
        assert_eq!(state.sequence_number, 0);
        assert_eq!(state.fragment_size, 20);
        // The handshake response (sequence 0) awaits its ack.
        assert_eq!(state.in_flight(), 1);
        assert!(state.has_outstanding_frames());
        assert!(!state.ack_owed());
    }

    #[test]
    fn test_sequence_number_wraps() {
        let mut state = SessionState::new(23, 6);
        for expected in 1..=255u8 {
            assert_eq!(state.next_sequence_number(), expected);
        }
        assert_eq!(state.next_sequence_number(), 0);
        assert_eq!(state.next_sequence_number(), 1);
    }

    #[test]
    fn test_ack_of_handshake_response_is_valid() {
        let mut state = SessionState::new(23, 6);
        let outstanding = state.apply_incoming_ack(0).unwrap();
        assert!(!outstanding);
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_duplicate_ack_is_invalid() {
        let mut state = SessionState::new(23, 6);
        state.apply_incoming_ack(0).unwrap();
        assert!(matches!(
            state.apply_incoming_ack(0),
            Err(BtpProtocolError::InvalidAck { .. })
        ));
    }

    #[test]
    fn test_ack_beyond_sequence_number_is_invalid() {
        let mut state = SessionState::new(23, 6);
        state.next_sequence_number();
        assert!(matches!(
            state.apply_incoming_ack(2),
            Err(BtpProtocolError::InvalidAck { .. })
        ));
    }

    #[test]
    fn test_ack_validation_across_wrap() {
        let mut state = SessionState::new(23, 6);
        // Consume sequence numbers up to the wrap, acking along the way.
        for _ in 0..254 {
            let seq = state.next_sequence_number();
            state.apply_incoming_ack(seq).unwrap();
        }
        assert_eq!(state.sequence_number, 254);
        // Two frames straddling the wrap: 255 and 0.
        state.next_sequence_number();
        state.next_sequence_number();
        assert_eq!(state.sequence_number, 0);
        assert_eq!(state.in_flight(), 2);
        let outstanding = state.apply_incoming_ack(255).unwrap();
        assert!(outstanding);
        let outstanding = state.apply_incoming_ack(0).unwrap();
        assert!(!outstanding);
    }

    #[test]
    fn test_window_room() {
        let mut state = SessionState::new(23, 3);
        // Handshake response in flight: 1 of at most 2 unacked frames.
        assert!(state.window_has_room());
        state.next_sequence_number();
        assert_eq!(state.in_flight(), 2);
        assert!(!state.window_has_room());
        state.apply_incoming_ack(0).unwrap();
        assert!(state.window_has_room());
    }

    #[test]
    fn test_window_size_one_never_has_room() {
        let state = SessionState::new(23, 1);
        assert!(!state.window_has_room());
    }

    #[test]
    fn test_incoming_sequence_strict_order() {
        let mut state = SessionState::new(23, 6);
        state.record_incoming_sequence(0).unwrap();
        state.record_incoming_sequence(1).unwrap();
        assert!(matches!(
            state.record_incoming_sequence(3),
            Err(BtpProtocolError::SequenceGap {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_owed_ack_lifecycle() {
        let mut state = SessionState::new(23, 6);
        assert_eq!(state.take_owed_ack(), None);

        state.record_incoming_sequence(0).unwrap();
        assert!(state.ack_owed());
        assert_eq!(state.take_owed_ack(), Some(0));
        assert!(!state.ack_owed());
        assert_eq!(state.take_owed_ack(), None);
    }

    #[test]
    fn test_reassembly_happy_path() {
        let mut state = SessionState::new(23, 6);
        state.begin_reassembly(5, &[1, 2]).unwrap();
        state.continue_reassembly(&[3, 4]).unwrap();
        state.continue_reassembly(&[5]).unwrap();
        assert_eq!(state.finish_reassembly().unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(state.reassembly.is_none());
    }

    #[test]
    fn test_reassembly_rejects_nested_begin() {
        let mut state = SessionState::new(23, 6);
        state.begin_reassembly(5, &[1]).unwrap();
        assert_eq!(
            state.begin_reassembly(5, &[1]),
            Err(BtpProtocolError::UnexpectedBeginningSegment)
        );
    }

    #[test]
    fn test_reassembly_rejects_orphan_continue() {
        let mut state = SessionState::new(23, 6);
        assert_eq!(
            state.continue_reassembly(&[1]),
            Err(BtpProtocolError::UnexpectedContinuingSegment)
        );
    }

    #[test]
    fn test_reassembly_rejects_overflow() {
        let mut state = SessionState::new(23, 6);
        state.begin_reassembly(3, &[1, 2]).unwrap();
        assert_eq!(
            state.continue_reassembly(&[3, 4]),
            Err(BtpProtocolError::ReassemblyOverflow { expected: 3 })
        );
    }

    #[test]
    fn test_reassembly_rejects_short_finish() {
        let mut state = SessionState::new(23, 6);
        state.begin_reassembly(4, &[1, 2]).unwrap();
        assert_eq!(
            state.finish_reassembly(),
            Err(BtpProtocolError::MessageLengthMismatch {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn test_message_cursor_chunks() {
        let mut state = SessionState::new(23, 6);
        state.enqueue_message(vec![1, 2, 3, 4, 5]);

        let front = state.front_message().unwrap();
        assert!(front.at_start());
        assert_eq!(front.remaining(), 5);

        assert_eq!(state.take_front_chunk(2), vec![1, 2]);
        let front = state.front_message().unwrap();
        assert!(!front.at_start());
        assert_eq!(front.remaining(), 3);

        assert_eq!(state.take_front_chunk(10), vec![3, 4, 5]);
        assert_eq!(state.front_message().unwrap().remaining(), 0);

        state.pop_front_message();
        assert!(!state.has_queued_messages());
    }
}

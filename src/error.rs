//! BTP error types.

use thiserror::Error;

/// Errors produced while encoding or decoding BTP frames.
///
/// A codec error on an inbound buffer is fatal for the session: the engine
/// closes the session before surfacing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Buffer too short: needed {needed} bytes, got {actual}")]
    TruncatedFrame { needed: usize, actual: usize },

    #[error("Not a BTP handshake: flags {flags:#04x}, opcode {opcode:#04x}")]
    BadHandshakeHeader { flags: u8, opcode: u8 },

    #[error("Handshake request proposes no protocol versions")]
    NoVersionsProposed,

    #[error("Acknowledgement flag does not match ack number presence")]
    AckFlagMismatch,

    #[error("Beginning-segment flag does not match message length presence")]
    BeginFlagMismatch,

    #[error("Management flag does not match management opcode presence")]
    ManagementFlagMismatch,
}

/// Protocol-rule violations by the peer.
///
/// Every variant except [`SessionClosed`](BtpProtocolError::SessionClosed) is
/// fatal to the session: the engine disconnects the transport before
/// propagating the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BtpProtocolError {
    // === Handshake ===
    #[error("No common BTP version: peer proposed {proposed:?}")]
    NoCommonVersion { proposed: Vec<u8> },

    #[error("Peer proposed a window size of {0}, outside 1..=255")]
    InvalidWindowSize(u8),

    // === Data path ===
    #[error("Frame of {length} bytes exceeds fragment size {fragment_size} by more than the ATT header")]
    OversizedFrame { length: usize, fragment_size: usize },

    #[error("Unexpected handshake or management frame on an established session")]
    UnexpectedControlFrame,

    #[error("Frame carries neither payload nor acknowledgement")]
    EmptyFrame,

    #[error("Sequence gap: expected {expected}, got {actual}")]
    SequenceGap { expected: u8, actual: u8 },

    #[error("Ack number {ack} outside the window ({prev_ack}, {sequence_number}]")]
    InvalidAck {
        ack: u8,
        prev_ack: u8,
        sequence_number: u8,
    },

    #[error("Peer did not acknowledge outstanding frames within the ack timeout")]
    AckTimeout,

    // === Reassembly ===
    #[error("Beginning segment while a message reassembly is in progress")]
    UnexpectedBeginningSegment,

    #[error("Continuing segment without a reassembly in progress or without payload")]
    UnexpectedContinuingSegment,

    #[error("Reassembled length {actual} does not match announced length {expected}")]
    MessageLengthMismatch { expected: u16, actual: usize },

    #[error("Segment overflows announced message length {expected}")]
    ReassemblyOverflow { expected: u16 },

    // === Lifecycle ===
    #[error("Session is closed")]
    SessionClosed,
}

/// Misuse of the session API by the upper layer.
///
/// Flow errors never close the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BtpFlowError {
    #[error("Cannot send an empty Matter message")]
    EmptyMessage,

    #[error("Message of {0} bytes exceeds the 16-bit length field")]
    MessageTooLong(usize),
}

/// Umbrella error for all BTP operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BtpError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Protocol(#[from] BtpProtocolError),

    #[error(transparent)]
    Flow(#[from] BtpFlowError),

    #[error("BLE transport error: {0}")]
    Transport(String),
}

/// Result type alias for BTP operations.
pub type Result<T> = std::result::Result<T, BtpError>;

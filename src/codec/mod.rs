//! BTP wire format - bit-exact frame encoding and decoding.
//!
//! Pure data transformation: no I/O and no session state. The session engine
//! owns all protocol semantics; this module only maps between byte buffers
//! and typed frames.
//!
//! # Wire Format Structure
//!
//! ```text
//! Handshake request (9 bytes):
//!   [flags: 1]        0x65 (handshake|management|beginning|ending)
//!   [opcode: 1]       0x6C
//!   [versions: 4]     up to 8 version nibbles, zero nibble = empty slot
//!   [att_mtu: 2]      little-endian
//!   [window: 1]       proposed client window size
//!
//! Handshake response (6 bytes):
//!   [flags: 1]        0x65
//!   [opcode: 1]       0x6C
//!   [version: 1]      chosen version
//!   [att_mtu: 2]      little-endian
//!   [window: 1]       chosen window size
//!
//! Data / ack packet:
//!   [flags: 1]
//!   [opcode: 1]       iff management flag (never on data frames)
//!   [ack: 1]          iff acknowledgement flag
//!   [seq: 1]          always
//!   [msg_len: 2]      little-endian, iff beginning-segment flag
//!   [payload: N]      0..fragment_size - header bytes
//! ```
//!
//! # Flag byte
//!
//! | Bit | Mask | Meaning             |
//! |-----|------|---------------------|
//! | 0   | 0x01 | beginning segment   |
//! | 1   | 0x02 | continuing segment  |
//! | 2   | 0x04 | ending segment      |
//! | 3   | 0x08 | acknowledgement     |
//! | 5   | 0x20 | management          |
//! | 6   | 0x40 | handshake           |

mod flags;
mod frame;
mod handshake;

pub use flags::HeaderFlags;
pub use frame::BtpFrame;
pub use handshake::{HandshakeRequest, HandshakeResponse};

/// Management opcode identifying the BTP handshake.
pub const BTP_HANDSHAKE_OPCODE: u8 = 0x6C;

/// Handshake request size on the wire.
pub const HANDSHAKE_REQUEST_SIZE: usize = 9;

/// Handshake response size on the wire.
pub const HANDSHAKE_RESPONSE_SIZE: usize = 6;

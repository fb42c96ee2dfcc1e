//! Header flag definitions for the BTP wire format.
//!
//! Every BTP packet starts with a 1-byte bit-packed flag field. The segment
//! flags describe how the packet participates in message reassembly, the
//! acknowledgement flag announces the optional ack number field, and the
//! handshake/management flags mark control traffic.

/// Bit-packed 1-byte flag field leading every BTP packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    /// Packet carries the first segment of a message (message length follows).
    pub const BEGINNING_SEGMENT: u8 = 1 << 0;
    /// Packet carries a middle segment of a message.
    pub const CONTINUING_SEGMENT: u8 = 1 << 1;
    /// Packet carries the final segment of a message.
    pub const ENDING_SEGMENT: u8 = 1 << 2;
    /// Packet carries an ack number.
    pub const ACKNOWLEDGEMENT: u8 = 1 << 3;
    /// Packet carries a management opcode.
    pub const MANAGEMENT: u8 = 1 << 5;
    /// Packet belongs to the BTP handshake.
    pub const HANDSHAKE: u8 = 1 << 6;

    /// Create new empty flags
    pub fn new() -> Self {
        Self(0)
    }

    /// Create from the raw wire byte
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get the raw wire byte
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Set a flag
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Check if a flag is set
    pub fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Build the flag field for a data segment.
    ///
    /// Continuing is the complement of beginning for engine-emitted frames.
    pub fn for_segment(is_beginning: bool, is_ending: bool, has_ack: bool) -> Self {
        let mut flags = Self::new();
        if is_beginning {
            flags.set(Self::BEGINNING_SEGMENT);
        } else {
            flags.set(Self::CONTINUING_SEGMENT);
        }
        if is_ending {
            flags.set(Self::ENDING_SEGMENT);
        }
        if has_ack {
            flags.set(Self::ACKNOWLEDGEMENT);
        }
        flags
    }

    /// Build the flag field for a standalone ack (no payload).
    pub fn for_standalone_ack() -> Self {
        Self(Self::ACKNOWLEDGEMENT)
    }

    pub fn is_handshake(&self) -> bool {
        self.has(Self::HANDSHAKE)
    }

    pub fn is_management(&self) -> bool {
        self.has(Self::MANAGEMENT)
    }

    pub fn has_ack(&self) -> bool {
        self.has(Self::ACKNOWLEDGEMENT)
    }

    pub fn is_beginning_segment(&self) -> bool {
        self.has(Self::BEGINNING_SEGMENT)
    }

    pub fn is_continuing_segment(&self) -> bool {
        self.has(Self::CONTINUING_SEGMENT)
    }

    pub fn is_ending_segment(&self) -> bool {
        self.has(Self::ENDING_SEGMENT)
    }
}

//! BTP session management.
//!
//! One [`BtpSession`] per BLE connection, created by
//! [`BtpSession::create_from_handshake_request`] once the peer's handshake
//! request arrives over GATT.
//!
//! # Session lifecycle
//!
//! ```text
//!              handshake request
//!                     │
//!                     v
//!          negotiate version/MTU/window ──── no common version ──> disconnect
//!                     │
//!          write handshake response
//!                     │
//!                     v
//!               [ Established ]
//!              │              │
//!   handle_incoming_ble_data  │  send_matter_message
//!   (reassemble, ack, seq)    │  (segment, window, piggyback ack)
//!              │              │
//!              └──── close() / protocol error / ack timeout ──> [ Closed ]
//! ```
//!
//! # Timers
//!
//! | Timer       | Period | Armed while                    | On expiry                    |
//! |-------------|--------|--------------------------------|------------------------------|
//! | ack-receive | 15 s   | own frames are unacknowledged  | close session (ack timeout)  |
//! | send-ack    | 5 s    | peer is owed an ack            | send standalone ack frame    |

pub(crate) mod engine;
mod handshake;
pub(crate) mod state;
pub(crate) mod timer;

pub use engine::BtpSession;

use std::time::Duration;

/// BTP protocol versions this implementation speaks, descending preference.
pub const SUPPORTED_VERSIONS: &[u8] = &[4];

/// Smallest ATT_MTU any BLE link guarantees.
pub const BTP_MINIMUM_ATT_MTU: u16 = 23;

/// Largest ATT_MTU BTP will use, however large the link.
pub const BTP_MAXIMUM_ATT_MTU: u16 = 247;

/// Upper bound on the negotiated window size.
pub const MAX_WINDOW_SIZE: u8 = 255;

/// Size of the GATT PDU header an ATT_MTU includes.
pub const ATT_PDU_HEADER_SIZE: u16 = 3;

/// How long to wait for the peer to acknowledge outstanding frames.
pub const ACK_RECEIVE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// How long an owed ack may ride along before a standalone ack is sent.
/// One third of the peer's ack-receive patience.
pub const SEND_ACK_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Per-session tunables.
///
/// The defaults are the normative BTP timer periods; tests shrink them to
/// keep wall-clock time down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Period of the ack-receive timer.
    pub ack_receive_timeout: Duration,
    /// Period of the send-ack timer.
    pub send_ack_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ack_receive_timeout: ACK_RECEIVE_TIMEOUT,
            send_ack_timeout: SEND_ACK_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_use_normative_periods() {
        let options = SessionOptions::default();
        assert_eq!(options.ack_receive_timeout, Duration::from_millis(15_000));
        assert_eq!(options.send_ack_timeout, Duration::from_millis(5_000));
        // The standalone-ack deadline stays well inside the peer's patience.
        assert_eq!(options.ack_receive_timeout, options.send_ack_timeout * 3);
    }
}

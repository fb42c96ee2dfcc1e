//! # BTP - Bluetooth Transport Protocol session core
//!
//! Carries Matter application messages over a GATT-based BLE link:
//! segmentation and reassembly, windowed flow control, acknowledgements and
//! the two-timer liveness machinery of a single BTP session, together with
//! the bit-exact codec for handshake and data frames.
//!
//! ## Architecture
//!
//! ```text
//!  Matter exchange layer
//!      │ send_matter_message()         ▲ deliver_matter_message()
//!      v                               │
//! ┌─────────────────────────────────────────────┐
//! │                BtpSession                    │
//! │   ┌───────────────┐   ┌──────────────────┐  │
//! │   │ send queue    │   │ reassembly buffer │  │
//! │   │ (cursors)     │   │ (begin..end)      │  │
//! │   └───────┬───────┘   └────────▲─────────┘  │
//! │           │    sequence / ack  │            │
//! │           │      counters      │            │
//! │   ┌───────┴──────────┐  ┌──────┴─────────┐  │
//! │   │ ack-receive 15 s │  │ send-ack 5 s   │  │
//! │   └──────────────────┘  └────────────────┘  │
//! └───────────┬─────────────────────▲───────────┘
//!             │ write_ble()         │ handle_incoming_ble_data()
//!             v                     │
//!        BLE stack (one GATT characteristic pair)
//! ```
//!
//! ## Protocol rules
//!
//! - Frames never exceed the negotiated `att_mtu - 3` bytes.
//! - Sequence numbers are mod-256 counters; inbound frames must arrive
//!   strictly in order, and acks are validated with serial-number
//!   arithmetic.
//! - At most `window - 1` own frames may be unacknowledged; the send queue
//!   stalls while the window is closed and resumes on ack.
//! - Acks piggyback on outbound data frames when possible; the send-ack
//!   timer synthesizes a standalone ack after 5 s otherwise. A peer that
//!   leaves our frames unacknowledged for 15 s ends the session.
//! - There is no retransmission: the link is considered reliable once a
//!   frame is acknowledged. Every protocol violation tears the session down.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use btp::{BleChannel, BtpSession, SessionOptions};
//!
//! // The surrounding BLE stack implements BleChannel (write, disconnect,
//! // deliver). A session comes to life with the peer's handshake request:
//! let session = BtpSession::create_from_handshake_request(
//!     Some(244),              // link payload budget from the BLE stack
//!     &handshake_request,     // bytes from the first GATT write
//!     Arc::clone(&channel),
//!     SessionOptions::default(),
//! )
//! .await?;
//!
//! // Inbound GATT writes feed the engine; reassembled messages surface
//! // through BleChannel::deliver_matter_message.
//! session.handle_incoming_ble_data(&gatt_write).await?;
//!
//! // Outbound messages are segmented and flow-controlled automatically.
//! session.send_matter_message(matter_message).await?;
//!
//! session.close().await;
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: bit-exact frame encoding and decoding (no I/O, no state)
//! - [`session`]: session state machine, timers and handshake negotiation
//! - [`transport`]: the [`BleChannel`] seam to the surrounding BLE stack
//! - [`error`]: error taxonomy and result alias

pub mod codec;
pub mod error;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use codec::{BtpFrame, HandshakeRequest, HandshakeResponse, HeaderFlags};
pub use error::{BtpError, BtpFlowError, BtpProtocolError, CodecError, Result};
pub use session::{
    BtpSession, SessionOptions, ACK_RECEIVE_TIMEOUT, BTP_MAXIMUM_ATT_MTU, BTP_MINIMUM_ATT_MTU,
    SEND_ACK_TIMEOUT, SUPPORTED_VERSIONS,
};
pub use transport::BleChannel;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

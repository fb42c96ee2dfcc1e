//! BLE channel abstraction.
//!
//! The session engine never touches GATT directly; the surrounding stack
//! injects one [`BleChannel`] implementation per session. Keeping the three
//! callbacks on a single trait ties their lifetimes together and rules out
//! partially bound sessions.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Boxed future returned by the async channel methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callbacks a BTP session needs from the surrounding BLE stack.
///
/// Implementations handle the low-level GATT plumbing while the session
/// engine remains transport-agnostic.
pub trait BleChannel: Send + Sync {
    /// Write one BTP frame to the peer.
    ///
    /// The frame never exceeds the negotiated `att_mtu - 3` bytes, so a
    /// single GATT write (or indication) always suffices.
    fn write_ble(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<()>>;

    /// Tear the underlying BLE link down.
    ///
    /// The engine invokes this at most once per session.
    fn disconnect_ble(&self) -> BoxFuture<'_, ()>;

    /// Deliver one fully reassembled Matter message to the exchange layer.
    ///
    /// Called once per inbound message, in inbound order.
    fn deliver_matter_message(&self, message: Vec<u8>);
}

//! Handshake negotiation and session construction.
//!
//! The single entry point into this crate: decode the peer's handshake
//! request, negotiate version, ATT_MTU and window size, write the handshake
//! response, and hand back a running [`BtpSession`].

use std::sync::Arc;

use crate::codec::{HandshakeRequest, HandshakeResponse};
use crate::error::{BtpProtocolError, Result};
use crate::session::engine::BtpSession;
use crate::session::{
    SessionOptions, ATT_PDU_HEADER_SIZE, BTP_MAXIMUM_ATT_MTU, BTP_MINIMUM_ATT_MTU,
    MAX_WINDOW_SIZE, SUPPORTED_VERSIONS,
};
use crate::transport::BleChannel;

impl BtpSession {
    /// Build a session from a peer's handshake request.
    ///
    /// `max_data_size` is the link's advisory payload budget, excluding the
    /// 3-byte GATT PDU header. The handshake response is written before this
    /// returns; a write failure aborts construction. On a failed negotiation
    /// the BLE link is disconnected and the error surfaced.
    pub async fn create_from_handshake_request(
        max_data_size: Option<u16>,
        request: &[u8],
        channel: Arc<dyn BleChannel>,
        options: SessionOptions,
    ) -> Result<BtpSession> {
        let request = HandshakeRequest::decode(request)?;

        let Some(version) = select_version(&request.versions) else {
            channel.disconnect_ble().await;
            return Err(BtpProtocolError::NoCommonVersion {
                proposed: request.versions,
            }
            .into());
        };
        if request.client_window_size == 0 {
            channel.disconnect_ble().await;
            return Err(BtpProtocolError::InvalidWindowSize(0).into());
        }

        let att_mtu = select_att_mtu(max_data_size, request.att_mtu);
        let window_size = request.client_window_size.min(MAX_WINDOW_SIZE);
        tracing::debug!(
            "Negotiated BTP session: version={} att_mtu={} window={}",
            version,
            att_mtu,
            window_size
        );

        let response = HandshakeResponse {
            version,
            att_mtu,
            window_size,
        };
        channel.write_ble(response.encode()).await?;

        Ok(BtpSession::start(channel, att_mtu, window_size, options))
    }
}

/// Pick the highest supported version also proposed by the peer.
fn select_version(proposed: &[u8]) -> Option<u8> {
    SUPPORTED_VERSIONS
        .iter()
        .copied()
        .find(|version| proposed.contains(version))
}

/// Negotiate the session ATT_MTU.
///
/// Without a link budget the floor of 23 stands. Otherwise the peer's
/// proposal (or, absent one, the whole link MTU) is capped by what the link
/// can carry and by the BTP maximum of 247.
fn select_att_mtu(max_data_size: Option<u16>, requested: u16) -> u16 {
    let Some(max_data_size) = max_data_size else {
        return BTP_MINIMUM_ATT_MTU;
    };
    let link_mtu = max_data_size.saturating_add(ATT_PDU_HEADER_SIZE);
    if link_mtu <= BTP_MINIMUM_ATT_MTU {
        return BTP_MINIMUM_ATT_MTU;
    }
    if requested == 0 {
        link_mtu.min(BTP_MAXIMUM_ATT_MTU)
    } else {
        requested.min(max_data_size).min(BTP_MAXIMUM_ATT_MTU)
    }
}

//! BTP session engine.
//!
//! Ingests inbound frames, drains the outbound queue, runs the two session
//! timers and enforces every protocol invariant. All entry points (ingest,
//! send, timer expiries, close) serialize on one per-session mutex, so the
//! engine behaves as if it ran on a single-threaded cooperative scheduler.
//!
//! Error policy: protocol and codec violations close the session (transport
//! disconnected) before the error surfaces; flow errors and transport write
//! failures leave the session alive.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::codec::BtpFrame;
use crate::error::{BtpError, BtpFlowError, BtpProtocolError, Result};
use crate::session::state::SessionState;
use crate::session::timer::Timer;
use crate::session::{SessionOptions, ATT_PDU_HEADER_SIZE};
use crate::transport::BleChannel;

/// A running BTP session.
///
/// Obtain one via [`BtpSession::create_from_handshake_request`]. The handle
/// is cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct BtpSession {
    inner: Arc<SessionInner>,
}

impl BtpSession {
    pub(crate) fn start(
        channel: Arc<dyn BleChannel>,
        att_mtu: u16,
        window_size: u8,
        options: SessionOptions,
    ) -> Self {
        let inner = Arc::new(SessionInner {
            channel,
            state: Mutex::new(SessionState::new(att_mtu, window_size)),
            ack_receive_timer: Timer::new("ack-receive", options.ack_receive_timeout),
            send_ack_timer: Timer::new("send-ack", options.send_ack_timeout),
        });
        // The handshake response occupies sequence number 0 and awaits the
        // peer's first ack.
        inner.start_ack_receive_timer();
        Self { inner }
    }

    /// Ingest one raw BLE frame from the peer.
    ///
    /// Any codec or protocol violation closes the session before the error
    /// is returned.
    pub async fn handle_incoming_ble_data(&self, data: &[u8]) -> Result<()> {
        self.inner.handle_incoming_ble_data(data).await
    }

    /// Queue one Matter message for segmented transmission.
    ///
    /// Transmission starts immediately for as much of the message as the
    /// window allows; the rest follows as the peer acknowledges.
    pub async fn send_matter_message(&self, message: Vec<u8>) -> Result<()> {
        if message.is_empty() {
            return Err(BtpFlowError::EmptyMessage.into());
        }
        if message.len() > usize::from(u16::MAX) {
            return Err(BtpFlowError::MessageTooLong(message.len()).into());
        }
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        if !state.is_active {
            return Err(BtpProtocolError::SessionClosed.into());
        }
        state.enqueue_message(message);
        inner.process_send_queue(&mut state).await
    }

    /// Tear the session down: stop both timers, mark it inactive and
    /// disconnect the BLE link. Idempotent.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.shutdown(&mut state).await;
    }

    /// Whether the session is still alive.
    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.is_active
    }
}

struct SessionInner {
    channel: Arc<dyn BleChannel>,
    state: Mutex<SessionState>,
    ack_receive_timer: Timer,
    send_ack_timer: Timer,
}

impl SessionInner {
    async fn handle_incoming_ble_data(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.is_active {
            return Err(BtpProtocolError::SessionClosed.into());
        }

        // Length preconditions. Some stacks (notably Apple's) treat ATT_MTU
        // as the whole-packet maximum, so up to 3 extra bytes are tolerated.
        if data.len() > state.fragment_size + usize::from(ATT_PDU_HEADER_SIZE) {
            let error = BtpProtocolError::OversizedFrame {
                length: data.len(),
                fragment_size: state.fragment_size,
            };
            return Err(self.fail(&mut state, error).await);
        }
        if data.len() > state.fragment_size {
            tracing::warn!(
                "Accepting over-length frame of {} bytes (fragment size {})",
                data.len(),
                state.fragment_size
            );
        }

        let frame = match BtpFrame::decode(data) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!("Closing BTP session on undecodable frame: {}", error);
                self.shutdown(&mut state).await;
                return Err(error.into());
            }
        };
        tracing::debug!(
            "<- BTP frame seq={} ack={:?} payload={}B",
            frame.sequence_number,
            frame.ack_number,
            frame.payload.len()
        );

        // Handshake is over; control frames are no longer legal.
        if frame.header.is_handshake() || frame.header.is_management() {
            return Err(
                self.fail(&mut state, BtpProtocolError::UnexpectedControlFrame)
                    .await,
            );
        }
        if frame.payload.is_empty() && frame.ack_number.is_none() {
            return Err(self.fail(&mut state, BtpProtocolError::EmptyFrame).await);
        }

        if let Err(error) = state.record_incoming_sequence(frame.sequence_number) {
            return Err(self.fail(&mut state, error).await);
        }
        // The frame just consumed a sequence number we now owe an ack for.
        self.start_send_ack_timer();

        if let Some(ack) = frame.ack_number {
            match state.apply_incoming_ack(ack) {
                Ok(outstanding) => {
                    self.ack_receive_timer.stop();
                    if outstanding {
                        self.start_ack_receive_timer();
                    }
                }
                Err(error) => return Err(self.fail(&mut state, error).await),
            }
        }

        if let Some(message_length) = frame.message_length {
            // Beginning segment; length/flag consistency is codec-enforced.
            if let Err(error) = state.begin_reassembly(message_length, &frame.payload) {
                return Err(self.fail(&mut state, error).await);
            }
        } else if frame.header.is_continuing_segment() || frame.header.is_ending_segment() {
            if let Err(error) = state.continue_reassembly(&frame.payload) {
                return Err(self.fail(&mut state, error).await);
            }
        }
        if frame.header.is_ending_segment() {
            match state.finish_reassembly() {
                Ok(message) => {
                    tracing::debug!("Delivering reassembled message of {}B", message.len());
                    self.channel.deliver_matter_message(message);
                }
                Err(error) => return Err(self.fail(&mut state, error).await),
            }
        }

        // A valid ack may have re-opened the window for queued traffic.
        self.process_send_queue(&mut state).await
    }

    /// Drain the outbound queue while the window is open.
    ///
    /// Guarded against re-entry: a nested call returns immediately and the
    /// outer loop picks the new work up.
    async fn process_send_queue(self: &Arc<Self>, state: &mut SessionState) -> Result<()> {
        if state.send_in_progress {
            return Ok(());
        }
        state.send_in_progress = true;
        let result = self.drain_send_queue(state).await;
        state.send_in_progress = false;
        result
    }

    async fn drain_send_queue(self: &Arc<Self>, state: &mut SessionState) -> Result<()> {
        while state.has_queued_messages() && state.window_has_room() {
            let piggyback_ack = state.take_owed_ack();
            if piggyback_ack.is_some() {
                // The ack rides along; no standalone ack needed anymore.
                self.send_ack_timer.stop();
            }

            let (is_beginning, remaining) = match state.front_message() {
                Some(cursor) => (cursor.at_start(), cursor.remaining()),
                None => break,
            };
            let header_len = BtpFrame::data_header_len(is_beginning, piggyback_ack.is_some());
            let capacity = state.fragment_size - header_len;
            let is_ending = remaining <= capacity;
            let message_length = if is_beginning {
                Some(remaining as u16)
            } else {
                None
            };

            let sequence_number = state.next_sequence_number();
            let payload = state.take_front_chunk(capacity);
            if is_ending {
                state.pop_front_message();
            }

            let frame = BtpFrame::segment(
                is_beginning,
                is_ending,
                piggyback_ack,
                sequence_number,
                message_length,
                payload,
            );
            self.write_frame(&frame).await?;
            self.start_ack_receive_timer();
        }
        Ok(())
    }

    async fn write_frame(&self, frame: &BtpFrame) -> Result<()> {
        let bytes = frame.encode()?;
        tracing::debug!(
            "-> BTP frame seq={} ack={:?} len={}B",
            frame.sequence_number,
            frame.ack_number,
            bytes.len()
        );
        self.channel.write_ble(bytes).await
    }

    /// Close the session over a protocol violation and hand the error back.
    async fn fail(self: &Arc<Self>, state: &mut SessionState, error: BtpProtocolError) -> BtpError {
        tracing::error!("Closing BTP session: {}", error);
        self.shutdown(state).await;
        error.into()
    }

    async fn shutdown(&self, state: &mut SessionState) {
        self.ack_receive_timer.stop();
        self.send_ack_timer.stop();
        if state.is_active {
            state.is_active = false;
            self.channel.disconnect_ble().await;
        }
    }

    fn start_ack_receive_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.ack_receive_timer.start(async move {
            if let Some(inner) = weak.upgrade() {
                inner.on_ack_receive_timeout().await;
            }
        });
    }

    fn start_send_ack_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.send_ack_timer.start(async move {
            if let Some(inner) = weak.upgrade() {
                inner.on_send_ack_timeout().await;
            }
        });
    }

    /// The peer owes us an ack and the grace period ran out.
    async fn on_ack_receive_timeout(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        if !state.is_active {
            return;
        }
        if state.has_outstanding_frames() {
            tracing::error!("Closing BTP session: {}", BtpProtocolError::AckTimeout);
            self.shutdown(&mut state).await;
        }
    }

    /// We owe the peer an ack and no outbound frame carried it in time:
    /// synthesize a standalone ack.
    async fn on_send_ack_timeout(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        if !state.is_active {
            return;
        }
        let Some(ack) = state.take_owed_ack() else {
            return;
        };
        let sequence_number = state.next_sequence_number();
        let frame = BtpFrame::standalone_ack(ack, sequence_number);
        if let Err(error) = self.write_frame(&frame).await {
            tracing::warn!("Failed to write standalone ack: {}", error);
        }
        // The standalone ack consumed a sequence number, so it is itself
        // awaiting acknowledgement now.
        self.start_ack_receive_timer();
    }
}

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::client::client_config::{ClientConfig, RecoveryStrategy};
use crate::client::client_events::{ClientEvent, ClientEventNotifier, MAX_REPORTED_MISSING};
use crate::client::packet_connection::PacketConnection;
use crate::client::transport::Connector;
use crate::output::packet_sink::PacketSink;
use crate::protocol::packet::Packet;
use crate::store::packet_store::PacketStore;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Streaming,
    ClosedComplete,
    ClosedIncomplete,
    Reconnecting,
    Terminated,
}

/// How a session ended. Giving up is an expected outcome rather than an error, so callers have to
///  handle it explicitly.
#[must_use]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionOutcome {
    /// The stream closed normally without gaps in the collected sequence numbers
    Complete,
    /// The reconnect budget is exhausted
    GaveUp { attempts: u32 },
    /// The session was cancelled through a [CancelHandle]
    Cancelled,
}

/// Cancels a running session, also while it waits before reconnecting
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}
impl CancelHandle {
    pub fn cancel(&self) {
        info!("cancelling packet session");
        self.sender.send_replace(true);
    }
}

/// Drives a session against the server: connects, requests packets, feeds received frames into a
///  [PacketStore] and reconnects while the collected data has gaps, up to a configured number of
///  reconnects.
///
/// ```ascii
/// Idle -> Connecting -> Streaming -> ClosedComplete ------------------------> Terminated
///             ^                  \-> ClosedIncomplete -> Reconnecting --(budget exhausted)--^
///             |                                               |
///             \-------------------(after backoff)-------------/
/// ```
///
/// Transport errors are treated like an incomplete close. The store is passed in by the caller
///  and survives reconnects, so recovery only ever adds to the collected data.
pub struct ConnectionManager {
    config: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
    events: Arc<ClientEventNotifier>,
    phase: SessionPhase,
    reconnect_attempts: u32,
    cancel_sender: Arc<watch::Sender<bool>>,
}

impl ConnectionManager {
    pub fn new(config: Arc<ClientConfig>, connector: Arc<dyn Connector>, events: Arc<ClientEventNotifier>) -> ConnectionManager {
        let (cancel_sender, _) = watch::channel(false);

        ConnectionManager {
            config,
            connector,
            events,
            phase: SessionPhase::Idle,
            reconnect_attempts: 0,
            cancel_sender: Arc::new(cancel_sender),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: self.cancel_sender.clone(),
        }
    }

    /// Runs the session to termination. The sink is invoked exactly once if the session completes
    ///  or gives up, and not at all if it is cancelled. An error is returned only if the sink fails.
    #[instrument(name = "packet_session", skip_all, fields(server = %self.connector.server_addr()))]
    pub async fn run(&mut self, store: &mut PacketStore, sink: &mut dyn PacketSink) -> anyhow::Result<SessionOutcome> {
        let mut cancel_receiver = self.cancel_sender.subscribe();

        let outcome = select! {
            outcome = self.run_until_terminated(store) => outcome,
            _ = cancel_receiver.wait_for(|&cancelled| cancelled) => SessionOutcome::Cancelled,
        };
        self.transition(SessionPhase::Terminated);

        match &outcome {
            SessionOutcome::Complete => {
                info!("received all {} packets", store.len());
                self.events.send_event(ClientEvent::Completed { num_packets: store.len() });
            }
            SessionOutcome::GaveUp { attempts } => {
                error!("max reconnect attempts ({}) reached, giving up with {} packets and {} missing sequence numbers", attempts, store.len(), store.num_missing());
                self.events.send_event(ClientEvent::GaveUp { attempts: *attempts, num_packets: store.len() });
            }
            SessionOutcome::Cancelled => {
                info!("session cancelled with {} packets collected", store.len());
                self.events.send_event(ClientEvent::Cancelled);
                return Ok(outcome);
            }
        }

        if let Err(e) = sink.deliver(&outcome, store.packets()) {
            error!(error = ?e, "error delivering packets");
            return Err(e);
        }
        Ok(outcome)
    }

    async fn run_until_terminated(&mut self, store: &mut PacketStore) -> SessionOutcome {
        self.reconnect_attempts = 0;

        loop {
            self.transition(SessionPhase::Connecting);
            let closed_normally = match self.run_connection(store).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "connection failed");
                    self.events.send_event(ClientEvent::TransportError { message: e.to_string() });
                    false
                }
            };

            let num_missing = store.num_missing();
            debug!(num_packets = store.len(), num_missing, "disconnected");
            let is_complete = closed_normally && num_missing == 0;
            self.events.send_event(ClientEvent::Disconnected {
                num_missing,
                first_missing: store.missing_sequences_up_to(MAX_REPORTED_MISSING),
            });

            if is_complete {
                self.transition(SessionPhase::ClosedComplete);
                return SessionOutcome::Complete;
            }
            self.transition(SessionPhase::ClosedIncomplete);

            self.transition(SessionPhase::Reconnecting);
            if self.reconnect_attempts >= self.config.max_reconnect_attempts {
                return SessionOutcome::GaveUp { attempts: self.reconnect_attempts };
            }
            self.reconnect_attempts += 1;

            info!("reconnecting in {:?} (attempt {} of {})", self.config.reconnect_interval, self.reconnect_attempts, self.config.max_reconnect_attempts);
            self.events.send_event(ClientEvent::ReconnectAttempt {
                attempt: self.reconnect_attempts,
                max_attempts: self.config.max_reconnect_attempts,
            });
            sleep(self.config.reconnect_interval).await;
        }
    }

    /// One connection attempt, from opening the transport to the peer closing it. The transport is
    ///  closed when this returns, so attempts never overlap.
    async fn run_connection(&mut self, store: &mut PacketStore) -> anyhow::Result<()> {
        let stream = self.connector.connect().await?;
        let mut connection = PacketConnection::new(stream, self.config.read_buffer_size);
        debug!("connected");
        self.events.send_event(ClientEvent::Connected { attempt: self.reconnect_attempts });

        match self.config.recovery_strategy {
            RecoveryStrategy::ResendMissing { response_timeout } if self.reconnect_attempts > 0 && !store.is_complete() => {
                let missing_sequences = store.missing_sequences_up_to(self.config.max_resend_requests);
                self.resend_missing(&mut connection, store, &missing_sequences, response_timeout).await
            }
            _ => {
                self.stream_all(&mut connection, store).await
            }
        }
    }

    async fn stream_all(&mut self, connection: &mut PacketConnection, store: &mut PacketStore) -> anyhow::Result<()> {
        connection.request_all_packets().await?;
        self.transition(SessionPhase::Streaming);

        while let Some(frame) = connection.next_frame().await? {
            self.accept_frame(&frame, store);
        }
        Ok(())
    }

    /// Requests each of the given sequence numbers once. Gaps that remain afterwards are not an
    ///  error here: the caller classifies the round by checking the store.
    async fn resend_missing(&mut self, connection: &mut PacketConnection, store: &mut PacketStore, missing_sequences: &[i32], response_timeout: Duration) -> anyhow::Result<()> {
        info!("requesting {} of {} missing sequence numbers", missing_sequences.len(), store.num_missing());
        self.events.send_event(ClientEvent::RequestingMissingSequences { sequences: missing_sequences.to_vec() });
        self.transition(SessionPhase::Streaming);

        for &sequence in missing_sequences {
            connection.request_packet(sequence).await?;

            match timeout(response_timeout, connection.next_frame()).await {
                Ok(Ok(Some(frame))) => {
                    if let Some(received) = self.accept_frame(&frame, store) {
                        if received != sequence {
                            debug!("requested sequence number {}, received {}", sequence, received);
                        }
                    }
                }
                Ok(Ok(None)) => {
                    debug!("server closed the connection while resending");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => warn!("no response for sequence number {} within {:?}", sequence, response_timeout),
            }
        }

        Ok(())
    }

    /// Returns the sequence number of the frame if it was valid and recorded
    fn accept_frame(&self, frame: &Bytes, store: &mut PacketStore) -> Option<i32> {
        match Packet::decode(frame) {
            Ok(packet) => {
                let sequence = packet.sequence;
                store.record(packet);
                Some(sequence)
            }
            Err(e) => {
                warn!(error = %e, "invalid packet detected and skipped");
                self.events.send_event(ClientEvent::FrameSkipped { error: e });
                None
            }
        }
    }

    fn transition(&mut self, phase: SessionPhase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

use tokio::sync::broadcast;
use tracing::trace;

use crate::protocol::packet::DecodeError;

pub const MAX_REPORTED_MISSING: usize = 16;

/// Status notifications for whoever presents the client's progress. Sending them is
///  fire-and-forget: a session never waits for or depends on a consumer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientEvent {
    Connected { attempt: u32 },
    /// The transport closed, either normally or after an error. `num_missing` is the number of
    ///  gaps at that point, `first_missing` the lowest of them (at most [MAX_REPORTED_MISSING]).
    Disconnected { num_missing: u64, first_missing: Vec<i32> },
    TransportError { message: String },
    FrameSkipped { error: DecodeError },
    ReconnectAttempt { attempt: u32, max_attempts: u32 },
    RequestingMissingSequences { sequences: Vec<i32> },
    Completed { num_packets: usize },
    GaveUp { attempts: u32, num_packets: usize },
    Cancelled,
}

pub struct ClientEventNotifier {
    sender: broadcast::Sender<ClientEvent>,
}
impl ClientEventNotifier {
    pub fn new() -> ClientEventNotifier {
        let (sender, _) = broadcast::channel(128);

        ClientEventNotifier {
            sender
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn send_event(&self, event: ClientEvent) {
        trace!("event: {:?}", event);
        let _ = self.sender.send(event);
    }
}

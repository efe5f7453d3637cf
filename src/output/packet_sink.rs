use std::fs;
use std::path::PathBuf;

use anyhow::Context;
#[cfg(test)] use mockall::automock;
use tracing::{info, warn};

use crate::client::connection_manager::SessionOutcome;
use crate::protocol::packet::Packet;

/// Receives the collected packets once a session has terminated, either complete or after
///  giving up. What happens to incomplete data is the sink's decision.
#[cfg_attr(test, automock)]
pub trait PacketSink: Send {
    fn deliver(&mut self, outcome: &SessionOutcome, packets: &[Packet]) -> anyhow::Result<()>;
}

/// Writes the packets as a pretty-printed JSON array, in arrival order
pub struct JsonFileSink {
    path: PathBuf,
    persist_incomplete: bool,
}
impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> JsonFileSink {
        JsonFileSink {
            path: path.into(),
            persist_incomplete: false,
        }
    }

    pub fn with_persist_incomplete(mut self, persist_incomplete: bool) -> JsonFileSink {
        self.persist_incomplete = persist_incomplete;
        self
    }
}

impl PacketSink for JsonFileSink {
    fn deliver(&mut self, outcome: &SessionOutcome, packets: &[Packet]) -> anyhow::Result<()> {
        match outcome {
            SessionOutcome::Complete => {}
            SessionOutcome::GaveUp { .. } if self.persist_incomplete => {
                warn!("persisting incomplete data set of {} packets", packets.len());
            }
            _ => {
                warn!("session ended as {:?} - not saving {} collected packets", outcome, packets.len());
                return Ok(());
            }
        }

        let json = serde_json::to_string_pretty(packets)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write packets to {}", self.path.display()))?;

        info!("saved {} packets to {}", packets.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::Side;
    use std::env::temp_dir;

    fn packets() -> Vec<Packet> {
        vec![
            Packet { symbol: "AAPL".to_string(), side: Side::Buy, quantity: 10, price: 20, sequence: 0 },
            Packet { symbol: "MSFT".to_string(), side: Side::Sell, quantity: 30, price: 40, sequence: 1 },
        ]
    }

    fn temp_path(name: &str) -> PathBuf {
        temp_dir().join(format!("packet_sink_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_writes_complete_session() {
        let path = temp_path("complete");
        let mut sink = JsonFileSink::new(&path);

        sink.deliver(&SessionOutcome::Complete, &packets()).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!([
            { "symbol": "AAPL", "buySellIndicator": "B", "quantity": 10, "price": 20, "sequence": 0 },
            { "symbol": "MSFT", "buySellIndicator": "S", "quantity": 30, "price": 40, "sequence": 1 },
        ]));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_skips_incomplete_session_by_default() {
        let path = temp_path("skipped");
        let mut sink = JsonFileSink::new(&path);

        sink.deliver(&SessionOutcome::GaveUp { attempts: 5 }, &packets()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_persists_incomplete_session_if_configured() {
        let path = temp_path("incomplete");
        let mut sink = JsonFileSink::new(&path).with_persist_incomplete(true);

        sink.deliver(&SessionOutcome::GaveUp { attempts: 5 }, &packets()).unwrap();

        let written: Vec<serde_json::Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_failure_is_reported() {
        let path = temp_dir().join("no_such_directory_for_packet_sink").join("out.json");
        let mut sink = JsonFileSink::new(path);

        assert!(sink.deliver(&SessionOutcome::Complete, &packets()).is_err());
    }
}

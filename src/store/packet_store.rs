use rustc_hash::FxHashSet;
use tracing::trace;

use crate::protocol::packet::Packet;

/// Accumulates all packets received during a session, across reconnects.
///
/// Packets are kept in arrival order, and duplicates are kept as separate entries: the store
///  collects everything and leaves analysis to its consumers.
#[derive(Debug, Default)]
pub struct PacketStore {
    packets: Vec<Packet>,
    observed_sequences: FxHashSet<i32>,
}

impl PacketStore {
    pub fn new() -> PacketStore {
        Default::default()
    }

    pub fn record(&mut self, packet: Packet) {
        trace!(sequence = packet.sequence, symbol = %packet.symbol, "recording packet");
        self.observed_sequences.insert(packet.sequence);
        self.packets.push(packet);
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn contains(&self, sequence: i32) -> bool {
        self.observed_sequences.contains(&sequence)
    }

    pub fn observed_sequences(&self) -> &FxHashSet<i32> {
        &self.observed_sequences
    }

    /// All sequence numbers between the lowest and highest observed sequence number (inclusive)
    ///  that were not observed, in ascending order.
    ///
    /// This is recomputed on every call rather than maintained incrementally. The result can be
    ///  huge for sparse sequence numbers, see [PacketStore::missing_sequences_up_to] for a bounded
    ///  variant.
    pub fn missing_sequences(&self) -> Vec<i32> {
        self.missing_sequences_up_to(usize::MAX)
    }

    /// The lowest `limit` missing sequence numbers, ascending
    pub fn missing_sequences_up_to(&self, limit: usize) -> Vec<i32> {
        let Some((min, max)) = self.sequence_range() else {
            return Vec::new();
        };

        (min..=max)
            .filter(|s| !self.observed_sequences.contains(s))
            .take(limit)
            .collect()
    }

    /// Number of gaps in the observed range, without materializing them
    pub fn num_missing(&self) -> u64 {
        match self.sequence_range() {
            Some((min, max)) => (max as i64 - min as i64 + 1) as u64 - self.observed_sequences.len() as u64,
            None => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.num_missing() == 0
    }

    fn sequence_range(&self) -> Option<(i32, i32)> {
        let min = *self.observed_sequences.iter().min()?;
        let max = *self.observed_sequences.iter().max()?;
        Some((min, max))
    }
}

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::protocol::packet::FRAME_LEN;

/// Carries bytes across transport reads and cuts them into aligned [FRAME_LEN] byte frames.
///
/// Transports are free to fragment or coalesce data, so a single read may contain a partial
///  frame, several frames, or both. Frames are emitted strictly in arrival order, and a frame
///  is only emitted once all of its bytes are there.
pub struct Reassembler {
    carry_over: BytesMut,
}
impl Reassembler {
    pub fn new() -> Reassembler {
        Reassembler {
            carry_over: BytesMut::with_capacity(4 * FRAME_LEN),
        }
    }

    /// Appends a chunk and returns all frames that are complete afterwards
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.carry_over.extend_from_slice(chunk);

        let mut frames = Vec::with_capacity(self.carry_over.len() / FRAME_LEN);
        while self.carry_over.len() >= FRAME_LEN {
            frames.push(self.carry_over.split_to(FRAME_LEN).freeze());
        }

        trace!(chunk_len = chunk.len(), num_frames = frames.len(), carry_over = self.carry_over.len(), "reassembled chunk");
        frames
    }

    pub fn pending_len(&self) -> usize {
        self.carry_over.len()
    }

    /// Discards a trailing partial frame - it is not a valid record and is never decoded
    pub fn flush(&mut self) {
        if !self.carry_over.is_empty() {
            debug!("discarding {} bytes of a partial frame at end of stream", self.carry_over.len());
            self.carry_over.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{raw_frame, Packet};
    use rstest::rstest;

    fn stream_of(sequences: &[i32]) -> Vec<u8> {
        sequences.iter()
            .flat_map(|&s| raw_frame(b"AAPL", b'B', 10 + s, 100 + s, s))
            .collect()
    }

    fn reassemble(bytes: &[u8], chunk_size: usize) -> Vec<Packet> {
        let mut reassembler = Reassembler::new();
        let mut result = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            for frame in reassembler.push(chunk) {
                result.push(Packet::decode(&frame).unwrap());
            }
        }
        result
    }

    #[rstest]
    #[case::single_bytes(1)]
    #[case::less_than_frame(5)]
    #[case::almost_frame(16)]
    #[case::exact_frame(17)]
    #[case::just_over_frame(18)]
    #[case::several_frames(40)]
    #[case::everything(1000)]
    fn test_chunk_boundaries_do_not_matter(#[case] chunk_size: usize) {
        let bytes = stream_of(&[0, 1, 2, 3, 4, 5, 6]);
        let expected = reassemble(&bytes, bytes.len());
        assert_eq!(expected.len(), 7);

        assert_eq!(reassemble(&bytes, chunk_size), expected);
    }

    #[test]
    fn test_irregular_chunks() {
        let bytes = stream_of(&[0, 1, 2, 3]);
        let mut reassembler = Reassembler::new();

        let mut frames = Vec::new();
        let mut offset = 0;
        for len in [3, 20, 1, 0, 30, 14] {
            frames.extend(reassembler.push(&bytes[offset..offset + len]));
            offset += len;
        }
        assert_eq!(offset, bytes.len());
        assert_eq!(reassembler.pending_len(), 0);

        let sequences = frames.iter()
            .map(|f| Packet::decode(f).unwrap().sequence)
            .collect::<Vec<_>>();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_partial_frame_is_kept() {
        let bytes = stream_of(&[5]);
        let mut reassembler = Reassembler::new();

        assert!(reassembler.push(&bytes[..10]).is_empty());
        assert_eq!(reassembler.pending_len(), 10);

        let frames = reassembler.push(&bytes[10..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), bytes.as_slice());
        assert_eq!(reassembler.pending_len(), 0);
    }

    #[test]
    fn test_flush_discards_partial_frame() {
        let bytes = stream_of(&[1, 2]);
        let mut reassembler = Reassembler::new();

        assert_eq!(reassembler.push(&bytes[..25]).len(), 1);
        assert_eq!(reassembler.pending_len(), 8);

        reassembler.flush();
        assert_eq!(reassembler.pending_len(), 0);

        // a fresh stream starts aligned again
        let frames = reassembler.push(&stream_of(&[3]));
        assert_eq!(frames.len(), 1);
        assert_eq!(Packet::decode(&frames[0]).unwrap().sequence, 3);
    }
}

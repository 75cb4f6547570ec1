//! Fixed-capacity ring of recent output segments, split on `\n`, replayed to
//! newly connected broadcast clients (spec §4.3).

use std::collections::VecDeque;

pub struct SegmentRing {
    segments: VecDeque<Vec<u8>>,
    capacity: usize,
    partial: Vec<u8>,
}

impl SegmentRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            segments: VecDeque::with_capacity(capacity),
            capacity,
            partial: Vec::new(),
        }
    }

    /// Feed raw bytes, splitting on `\n`. Returns the newly completed
    /// segments (each including its trailing `\n`) for the caller to push to
    /// live subscribers. Trailing partial data without a newline is held
    /// over to the next call.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut completed = Vec::new();
        self.partial.extend_from_slice(data);

        loop {
            let Some(pos) = self.partial.iter().position(|&b| b == b'\n') else {
                break;
            };
            let segment: Vec<u8> = self.partial.drain(..=pos).collect();
            self.store(segment.clone());
            completed.push(segment);
        }

        completed
    }

    fn store(&mut self, segment: Vec<u8>) {
        if self.segments.len() >= self.capacity {
            self.segments.pop_front();
        }
        self.segments.push_back(segment);
    }

    /// Current ring contents concatenated, oldest first (replayed to a
    /// newly connected client).
    pub fn contents(&self) -> Vec<u8> {
        self.segments.iter().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_splits_on_newline_and_holds_partial() {
        let mut ring = SegmentRing::new(10);
        let completed = ring.push(b"hello\nworl");
        assert_eq!(completed, vec![b"hello\n".to_vec()]);
        let completed2 = ring.push(b"d\n");
        assert_eq!(completed2, vec![b"world\n".to_vec()]);
    }

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let mut ring = SegmentRing::new(2);
        ring.push(b"a\n");
        ring.push(b"b\n");
        ring.push(b"c\n");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.contents(), b"b\nc\n".to_vec());
    }

    #[test]
    fn contents_concatenates_in_order() {
        let mut ring = SegmentRing::new(100);
        ring.push(b"one\ntwo\nthree\n");
        assert_eq!(ring.contents(), b"one\ntwo\nthree\n".to_vec());
    }
}

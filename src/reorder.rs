use crate::packet::PacketFrame;
use crate::sequence::compare_seq;

/// Bounded holding area for frames that arrived ahead of the expected sequence,
///  kept sorted by wraparound-aware sequence comparison.
///
/// A sorted `Vec` with binary-search insertion is plenty at the capacities
///  involved (tens to low hundreds of entries); see the eviction contract on
///  [`ReorderBuffer::insert`] for the loss-recovery policy.
pub struct ReorderBuffer {
    frames: Vec<PacketFrame>,
    capacity: usize,
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> ReorderBuffer {
        ReorderBuffer {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Inserts a frame at its sorted position. A frame with the same sequence as
    ///  a buffered one replaces it - newest wins.
    ///
    /// If the buffer reaches its capacity, the lowest-sequence entry is evicted
    ///  and returned: the caller must force-deliver it and advance its expected
    ///  counter past any gap, so that a persistent gap is treated as permanent
    ///  loss instead of stalling the stream forever.
    #[must_use]
    pub fn insert(&mut self, frame: PacketFrame) -> Option<PacketFrame> {
        match self.frames.binary_search_by(|f| compare_seq(f.sequence(), frame.sequence())) {
            Ok(index) => {
                self.frames[index] = frame;
                None
            }
            Err(index) => {
                self.frames.insert(index, frame);
                if self.frames.len() >= self.capacity {
                    Some(self.frames.remove(0))
                }
                else {
                    None
                }
            }
        }
    }

    /// Removes and returns the lowest-sequence frame iff its sequence is exactly
    ///  `expected`. Called in a loop after every in-order delivery, so a single
    ///  arrival can flush a whole run of previously buffered frames.
    pub fn pop_if_next(&mut self, expected: u16) -> Option<PacketFrame> {
        if self.frames.first()?.sequence() == expected {
            Some(self.frames.remove(0))
        }
        else {
            None
        }
    }

    /// Discards all buffered frames. Used when the downstream queue rejected a
    ///  delivery: the buffered run could never be delivered contiguously anyway.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    #[cfg(test)]
    fn sequences(&self) -> Vec<u16> {
        self.frames.iter().map(|f| f.sequence()).collect()
    }
}

use std::collections::VecDeque;

/// One encoded PCM segment at the target rate, 16-bit little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    bytes: Vec<u8>,
}

impl EncodedChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Bounded FIFO of encoded chunks with byte accounting.
///
/// Eviction uses a hysteresis band: nothing is dropped until the total
/// reaches 90% of `max_bytes`, then the oldest chunks go until the total is
/// back at or under 50%. A consumer draining at steady state never sees
/// eviction; it is a degradation-mode safety valve.
pub struct ChunkBuffer {
    queue: VecDeque<EncodedChunk>,
    total_bytes: usize,
    max_bytes: usize,
    evicted_chunks: u64,
    evicted_bytes: u64,
}

impl ChunkBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            total_bytes: 0,
            max_bytes,
            evicted_chunks: 0,
            evicted_bytes: 0,
        }
    }

    /// Append a chunk, evicting oldest-first if the high-water mark is hit.
    /// Returns the number of chunks evicted by this push.
    pub fn push(&mut self, chunk: EncodedChunk) -> u64 {
        self.total_bytes += chunk.len();
        self.queue.push_back(chunk);

        if (self.total_bytes as u64) * 10 < (self.max_bytes as u64) * 9 {
            return 0;
        }

        let low_water = self.max_bytes / 2;
        let before = self.total_bytes;
        let mut dropped = 0u64;
        while self.total_bytes > low_water {
            match self.queue.pop_front() {
                Some(old) => {
                    self.total_bytes -= old.len();
                    dropped += 1;
                }
                None => break,
            }
        }
        if dropped > 0 {
            self.evicted_chunks += dropped;
            self.evicted_bytes += (before - self.total_bytes) as u64;
            tracing::warn!(
                dropped,
                freed_bytes = before - self.total_bytes,
                buffered_bytes = self.total_bytes,
                "chunk buffer passed high-water mark, evicted oldest chunks"
            );
        }
        dropped
    }

    /// Concatenate all buffered chunks in arrival order and empty the queue.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes);
        for chunk in self.queue.drain(..) {
            out.extend_from_slice(chunk.as_bytes());
        }
        self.total_bytes = 0;
        out
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.total_bytes = 0;
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn evicted_chunks(&self) -> u64 {
        self.evicted_chunks
    }

    pub fn evicted_bytes(&self) -> u64 {
        self.evicted_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(len: usize, fill: u8) -> EncodedChunk {
        EncodedChunk::new(vec![fill; len])
    }

    #[test]
    fn accounting_matches_queue_contents() {
        let mut buf = ChunkBuffer::new(1000);
        buf.push(chunk(100, 1));
        buf.push(chunk(50, 2));
        assert_eq!(buf.total_bytes(), 150);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn no_eviction_below_high_water() {
        let mut buf = ChunkBuffer::new(1000);
        // 8 x 100 = 800 bytes, still below the 900-byte mark
        for _ in 0..8 {
            assert_eq!(buf.push(chunk(100, 0)), 0);
        }
        assert_eq!(buf.total_bytes(), 800);
        assert_eq!(buf.evicted_chunks(), 0);
    }

    #[test]
    fn eviction_drains_to_low_water() {
        let mut buf = ChunkBuffer::new(1000);
        for _ in 0..8 {
            buf.push(chunk(100, 0));
        }
        // 9th chunk reaches 900 = 90% and triggers eviction down to <= 500
        let dropped = buf.push(chunk(100, 0));
        assert!(dropped > 0);
        assert!(buf.total_bytes() <= 500);
        assert_eq!(buf.evicted_chunks(), dropped);
    }

    #[test]
    fn eviction_is_oldest_first() {
        let mut buf = ChunkBuffer::new(1000);
        for i in 0..9 {
            buf.push(chunk(100, i));
        }
        // Chunks 0..4 evicted; the drained bytes start with fill value of
        // the oldest survivor.
        let bytes = buf.drain();
        assert_eq!(bytes[0], 4);
        assert_eq!(*bytes.last().unwrap(), 8);
    }

    #[test]
    fn total_never_exceeds_max_after_push() {
        let mut buf = ChunkBuffer::new(1000);
        for _ in 0..100 {
            buf.push(chunk(173, 0));
            assert!(buf.total_bytes() <= 1000);
        }
    }

    #[test]
    fn oversized_single_chunk_empties_queue() {
        let mut buf = ChunkBuffer::new(100);
        // One chunk bigger than the low-water mark: eviction runs until the
        // queue is empty rather than looping forever.
        let dropped = buf.push(chunk(120, 7));
        assert_eq!(dropped, 1);
        assert!(buf.is_empty());
        assert_eq!(buf.total_bytes(), 0);
    }

    #[test]
    fn drain_concatenates_in_arrival_order() {
        let mut buf = ChunkBuffer::new(1000);
        buf.push(EncodedChunk::new(vec![1, 2]));
        buf.push(EncodedChunk::new(vec![3]));
        buf.push(EncodedChunk::new(vec![4, 5, 6]));
        assert_eq!(buf.drain(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(buf.total_bytes(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_empty_returns_empty() {
        let mut buf = ChunkBuffer::new(1000);
        assert!(buf.drain().is_empty());
    }
}

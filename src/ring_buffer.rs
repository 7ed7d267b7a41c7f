use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};

/// Lock-free bounded sample queue between the core thread (writer) and the
/// device callback thread (reader).
///
/// Single producer, single consumer. Overflow drops the oldest samples so
/// the reader always sees the most recent `capacity` samples in FIFO order.
pub struct RingBuffer {
    data: Box<[AtomicI16]>,
    capacity: usize,
    // Monotonic sample counters; the cursor into `data` is `counter % capacity`.
    read: AtomicUsize,
    write: AtomicUsize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        let data = (0..capacity).map(|_| AtomicI16::new(0)).collect();

        Self {
            data,
            capacity,
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples currently queued.
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `samples`, evicting the oldest queued samples when full.
    /// Returns how many samples were evicted.
    pub fn write(&self, samples: &[i16]) -> usize {
        if samples.is_empty() {
            return 0;
        }

        // A burst larger than the whole buffer reduces to its tail.
        let skipped = samples.len().saturating_sub(self.capacity);
        let samples = &samples[skipped..];

        let write = self.write.load(Ordering::Relaxed);
        let mut dropped = skipped;

        loop {
            let read = self.read.load(Ordering::Acquire);
            let free = self.capacity - write.wrapping_sub(read);

            let overflow = samples.len().saturating_sub(free);
            if overflow == 0 {
                break;
            }

            // Evict from the reader side. The CAS can lose to a concurrent
            // read; recompute in that case since the reader freed space.
            if self
                .read
                .compare_exchange(
                    read,
                    read.wrapping_add(overflow),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                dropped += overflow;
                break;
            }
        }

        for (i, &sample) in samples.iter().enumerate() {
            self.data[write.wrapping_add(i) % self.capacity].store(sample, Ordering::Relaxed);
        }

        self.write
            .store(write.wrapping_add(samples.len()), Ordering::Release);

        dropped
    }

    /// Copies up to `out.len()` samples into `out`, returning how many were
    /// available. Never blocks.
    pub fn read(&self, out: &mut [i16]) -> usize {
        if out.is_empty() {
            return 0;
        }

        loop {
            let read = self.read.load(Ordering::Acquire);
            let write = self.write.load(Ordering::Acquire);
            let available = write.wrapping_sub(read);
            let count = available.min(out.len());

            if count == 0 {
                return 0;
            }

            for (i, slot) in out.iter_mut().take(count).enumerate() {
                *slot = self.data[read.wrapping_add(i) % self.capacity].load(Ordering::Relaxed);
            }

            // The writer may have evicted part of what we just copied; retry
            // so the caller never observes a torn sequence.
            if self
                .read
                .compare_exchange(
                    read,
                    read.wrapping_add(count),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return count;
            }
        }
    }

    /// Discards everything queued. Reader-side only.
    pub fn clear(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.store(write, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn fifo_order_within_capacity() {
        let ring = RingBuffer::new(8);
        assert_eq!(ring.write(&[1, 2, 3]), 0);
        assert_eq!(ring.write(&[4, 5]), 0);

        let mut out = [0i16; 8];
        let n = ring.read(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let ring = RingBuffer::new(4);
        ring.write(&[1, 2, 3, 4]);
        let dropped = ring.write(&[5, 6]);
        assert_eq!(dropped, 2);

        let mut out = [0i16; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn burst_larger_than_capacity_keeps_tail() {
        let ring = RingBuffer::new(4);
        ring.write(&[1]);
        ring.write(&[2, 3, 4, 5, 6, 7]);

        let mut out = [0i16; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [4, 5, 6, 7]);
    }

    #[test]
    fn partial_read_and_wraparound() {
        let ring = RingBuffer::new(4);
        ring.write(&[1, 2, 3]);

        let mut out = [0i16; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1, 2]);

        ring.write(&[4, 5, 6]);
        let mut out = [0i16; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn read_from_empty_returns_zero() {
        let ring = RingBuffer::new(4);
        let mut out = [7i16; 4];
        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn spsc_threads_preserve_sequence() {
        let ring = Arc::new(RingBuffer::new(1024));
        let writer_ring = Arc::clone(&ring);

        let writer = std::thread::spawn(move || {
            let mut next = 0i16;
            for _ in 0..100 {
                let chunk: Vec<i16> = (0..64)
                    .map(|_| {
                        let v = next;
                        next = next.wrapping_add(1);
                        v
                    })
                    .collect();
                while writer_ring.len() + chunk.len() > writer_ring.capacity() {
                    std::thread::yield_now();
                }
                writer_ring.write(&chunk);
            }
        });

        let mut received = Vec::new();
        let mut buf = [0i16; 128];
        while received.len() < 6400 {
            let n = ring.read(&mut buf);
            received.extend_from_slice(&buf[..n]);
        }
        writer.join().unwrap();

        for (i, &v) in received.iter().enumerate() {
            assert_eq!(v, i as i16);
        }
    }

    proptest! {
        #[test]
        fn reads_equal_most_recent_writes(
            writes in prop::collection::vec(prop::collection::vec(any::<i16>(), 0..32), 0..16),
            capacity in 1usize..64,
        ) {
            let ring = RingBuffer::new(capacity);
            let mut expected: Vec<i16> = Vec::new();

            for chunk in &writes {
                ring.write(chunk);
                expected.extend_from_slice(chunk);
                if expected.len() > capacity {
                    expected.drain(..expected.len() - capacity);
                }
            }

            let mut out = vec![0i16; capacity];
            let n = ring.read(&mut out);
            prop_assert_eq!(&out[..n], &expected[..]);
        }
    }
}

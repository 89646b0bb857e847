//! Queue set guarded by a single lock.
//!
//! Every kind shares one mutex. Lowest overhead when the consumer touches
//! every queue on each tick.

use parking_lot::Mutex;
use textreel_core::{Frame, FrameHeader, FrameKind, QueueCapacities, Result};

use super::{lanes, Lane, QueueSet, TryEnqueueError};

/// All four frame queues behind one [`Mutex`].
pub struct SharedLockQueues {
    lanes: Mutex<[Lane; 4]>,
    capacities: QueueCapacities,
}

impl SharedLockQueues {
    /// Preallocate queue storage for the given capacities.
    pub fn new(capacities: QueueCapacities) -> Result<Self> {
        Ok(Self {
            lanes: Mutex::new(lanes(&capacities)?),
            capacities,
        })
    }
}

impl QueueSet for SharedLockQueues {
    fn capacity(&self, kind: FrameKind) -> usize {
        self.capacities.get(kind)
    }

    fn try_enqueue(&self, frame: Frame) -> std::result::Result<(), TryEnqueueError> {
        let index = frame.kind().index();
        self.lanes.lock()[index].push(frame)
    }

    fn dequeue(&self, kind: FrameKind) -> Result<Frame> {
        self.lanes.lock()[kind.index()].pop()
    }

    fn peek_front(&self, kind: FrameKind) -> Option<FrameHeader> {
        self.lanes.lock()[kind.index()].front()
    }

    fn count(&self, kind: FrameKind) -> usize {
        self.lanes.lock()[kind.index()].len()
    }

    fn drain_while(
        &self,
        kind: FrameKind,
        keep_dropping: &mut dyn FnMut(&FrameHeader) -> bool,
    ) -> usize {
        let removed = self.lanes.lock()[kind.index()].take_while(keep_dropping);
        removed.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_capacities() {
        let queues = SharedLockQueues::new(QueueCapacities::default()).unwrap();
        assert_eq!(queues.capacity(FrameKind::Audio), 32);
        assert_eq!(queues.capacity(FrameKind::Video), 8);
        assert_eq!(queues.capacity(FrameKind::Void), 8);
        assert_eq!(queues.capacity(FrameKind::WaveSample), 8);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let queues = Arc::new(SharedLockQueues::new(QueueCapacities::default()).unwrap());
        let producer_queues = Arc::clone(&queues);
        let consumer_queues = queues;

        let producer = thread::spawn(move || {
            let mut pts = 0;
            while pts < 2_000 {
                match producer_queues.try_enqueue(Frame::audio(vec![1; 16], pts)) {
                    Ok(()) => pts += 1,
                    Err(_) => thread::yield_now(),
                }
            }
            pts
        });

        let consumer = thread::spawn(move || {
            let mut expected = 0;
            while expected < 2_000 {
                match consumer_queues.dequeue(FrameKind::Audio) {
                    Ok(frame) => {
                        assert_eq!(frame.pts(), expected);
                        expected += 1;
                    }
                    Err(_) => thread::yield_now(),
                }
            }
            expected
        });

        assert_eq!(producer.join().unwrap(), 2_000);
        assert_eq!(consumer.join().unwrap(), 2_000);
    }
}

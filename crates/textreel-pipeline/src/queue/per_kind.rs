//! Queue set with an independent lock per kind.

use parking_lot::Mutex;
use textreel_core::{Frame, FrameHeader, FrameKind, QueueCapacities, Result};

use super::{lanes, Lane, QueueSet, TryEnqueueError};

/// One [`Mutex`] per frame kind.
///
/// The audio callback and the visualization worker never contend with the
/// video path.
pub struct PerKindQueues {
    lanes: [Mutex<Lane>; 4],
    capacities: QueueCapacities,
}

impl PerKindQueues {
    pub fn new(capacities: QueueCapacities) -> Result<Self> {
        let lanes = lanes(&capacities)?.map(Mutex::new);
        Ok(Self { lanes, capacities })
    }

    fn lane(&self, kind: FrameKind) -> &Mutex<Lane> {
        &self.lanes[kind.index()]
    }
}

impl QueueSet for PerKindQueues {
    fn capacity(&self, kind: FrameKind) -> usize {
        self.capacities.get(kind)
    }

    fn try_enqueue(&self, frame: Frame) -> std::result::Result<(), TryEnqueueError> {
        self.lane(frame.kind()).lock().push(frame)
    }

    fn dequeue(&self, kind: FrameKind) -> Result<Frame> {
        self.lane(kind).lock().pop()
    }

    fn peek_front(&self, kind: FrameKind) -> Option<FrameHeader> {
        self.lane(kind).lock().front()
    }

    fn count(&self, kind: FrameKind) -> usize {
        self.lane(kind).lock().len()
    }

    fn drain_while(
        &self,
        kind: FrameKind,
        keep_dropping: &mut dyn FnMut(&FrameHeader) -> bool,
    ) -> usize {
        let removed = self.lane(kind).lock().take_while(keep_dropping);
        removed.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_kinds_progress_independently() {
        let queues = Arc::new(PerKindQueues::new(QueueCapacities::default()).unwrap());

        let handles: Vec<_> = [FrameKind::Audio, FrameKind::WaveSample]
            .into_iter()
            .map(|kind| {
                let queues = Arc::clone(&queues);
                thread::spawn(move || {
                    for round in 0..500 {
                        let frame = Frame::new(kind, round, textreel_core::Payload::Pcm(vec![0; 8]));
                        queues.try_enqueue(frame).unwrap();
                        assert_eq!(queues.dequeue(kind).unwrap().pts(), round);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queues.is_empty(FrameKind::Audio));
        assert!(queues.is_empty(FrameKind::WaveSample));
    }

    #[test]
    fn test_full_rejects_and_returns_frame() {
        let capacities = QueueCapacities {
            video: 1,
            ..QueueCapacities::default()
        };
        let queues = PerKindQueues::new(capacities).unwrap();
        let raster = textreel_core::Raster::new(4, 2).unwrap();
        queues.try_enqueue(Frame::video(raster.clone(), 0)).unwrap();
        let rejected = queues.try_enqueue(Frame::video(raster, 40_000)).unwrap_err();
        assert_eq!(rejected.kind(), FrameKind::Video);
        assert_eq!(rejected.into_inner().pts(), 40_000);
        assert_eq!(queues.count(FrameKind::Video), 1);
    }
}

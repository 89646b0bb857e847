//! Bounded, typed frame queues shared between producer and consumer threads.
//!
//! One FIFO per [`FrameKind`]. Enqueue past capacity is rejected, never
//! blocks and never evicts; dequeue on an empty queue fails fast.

pub mod per_kind;
pub mod shared;

pub use per_kind::PerKindQueues;
pub use shared::SharedLockQueues;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use textreel_core::{Error, Frame, FrameHeader, FrameKind, QueueCapacities, Result};
use tracing::trace;

/// A frame rejected by [`QueueSet::try_enqueue`] because its queue is full.
///
/// The frame is handed back so the producer can retry it later.
pub struct TryEnqueueError(pub Frame);

impl TryEnqueueError {
    pub fn into_inner(self) -> Frame {
        self.0
    }

    pub const fn kind(&self) -> FrameKind {
        self.0.kind()
    }
}

impl fmt::Debug for TryEnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryEnqueueError")
            .field("kind", &self.0.kind())
            .field("pts", &self.0.pts())
            .finish()
    }
}

impl fmt::Display for TryEnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} queue is full", self.0.kind())
    }
}

impl std::error::Error for TryEnqueueError {}

impl From<TryEnqueueError> for Error {
    fn from(err: TryEnqueueError) -> Self {
        Self::QueueFull(err.kind())
    }
}

/// The set of per-kind frame queues.
///
/// Implementations differ only in lock granularity.
pub trait QueueSet: Send + Sync {
    /// Maximum number of frames the queue for `kind` may hold.
    fn capacity(&self, kind: FrameKind) -> usize;

    /// Append `frame` to the tail of its kind's queue.
    fn try_enqueue(&self, frame: Frame) -> std::result::Result<(), TryEnqueueError>;

    /// Remove and return the head frame, or fail with [`Error::QueueEmpty`].
    fn dequeue(&self, kind: FrameKind) -> Result<Frame>;

    /// Inspect the head frame without removing it.
    fn peek_front(&self, kind: FrameKind) -> Option<FrameHeader>;

    fn count(&self, kind: FrameKind) -> usize;

    /// Remove frames from the head while `keep_dropping` holds for them.
    ///
    /// Returns the number of frames removed. Removed frames are destroyed
    /// after the lock is released.
    fn drain_while(&self, kind: FrameKind, keep_dropping: &mut dyn FnMut(&FrameHeader) -> bool)
        -> usize;

    /// Remove and destroy every frame of `kind`.
    fn drain_all(&self, kind: FrameKind) -> usize {
        self.drain_while(kind, &mut |_| true)
    }

    fn is_full(&self, kind: FrameKind) -> bool {
        self.count(kind) >= self.capacity(kind)
    }

    fn is_empty(&self, kind: FrameKind) -> bool {
        self.count(kind) == 0
    }

    /// Pts of the head frame.
    fn front_pts(&self, kind: FrameKind) -> Option<i64> {
        self.peek_front(kind).map(|header| header.pts)
    }
}

/// Thread-safe reference to a queue set.
pub type SharedQueueSet = Arc<dyn QueueSet>;

/// Storage for one kind. Not synchronized; callers wrap it in a lock.
pub(crate) struct Lane {
    kind: FrameKind,
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl Lane {
    pub(crate) fn new(kind: FrameKind, capacities: &QueueCapacities) -> Result<Self> {
        let capacity = capacities.get(kind);
        let mut frames = VecDeque::new();
        frames
            .try_reserve_exact(capacity)
            .map_err(|_| Error::Allocation {
                bytes: capacity * std::mem::size_of::<Frame>(),
            })?;
        Ok(Self {
            kind,
            frames,
            capacity,
        })
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, frame: Frame) -> std::result::Result<(), TryEnqueueError> {
        if self.frames.len() >= self.capacity {
            trace!("{} queue full ({} frames)", self.kind, self.capacity);
            return Err(TryEnqueueError(frame));
        }
        self.frames.push_back(frame);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Frame> {
        self.frames.pop_front().ok_or(Error::QueueEmpty(self.kind))
    }

    pub(crate) fn front(&self) -> Option<FrameHeader> {
        self.frames.front().map(Frame::header)
    }

    pub(crate) fn take_while(
        &mut self,
        keep_dropping: &mut dyn FnMut(&FrameHeader) -> bool,
    ) -> Vec<Frame> {
        let mut removed = Vec::new();
        while self
            .frames
            .front()
            .is_some_and(|frame| keep_dropping(&frame.header()))
        {
            if let Some(frame) = self.frames.pop_front() {
                removed.push(frame);
            }
        }
        removed
    }
}

pub(crate) fn lanes(capacities: &QueueCapacities) -> Result<[Lane; 4]> {
    Ok([
        Lane::new(FrameKind::Audio, capacities)?,
        Lane::new(FrameKind::Video, capacities)?,
        Lane::new(FrameKind::Void, capacities)?,
        Lane::new(FrameKind::WaveSample, capacities)?,
    ])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use proptest::prelude::*;

    fn small_capacities() -> QueueCapacities {
        QueueCapacities {
            audio: 4,
            video: 3,
            void: 2,
            wave_sample: 2,
        }
    }

    fn both_impls() -> Vec<Box<dyn QueueSet>> {
        vec![
            Box::new(SharedLockQueues::new(small_capacities()).unwrap()),
            Box::new(PerKindQueues::new(small_capacities()).unwrap()),
        ]
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(i64),
        Dequeue,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![(0i64..1_000_000).prop_map(Op::Enqueue), Just(Op::Dequeue)]
    }

    proptest! {
        #[test]
        fn prop_fifo_and_bounded(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            for queues in both_impls() {
                let capacity = queues.capacity(FrameKind::Audio);
                let mut model: VecDeque<i64> = VecDeque::new();

                for op in &ops {
                    match *op {
                        Op::Enqueue(pts) => {
                            let result = queues.try_enqueue(Frame::audio(vec![0; 4], pts));
                            if model.len() < capacity {
                                prop_assert!(result.is_ok());
                                model.push_back(pts);
                            } else {
                                let rejected = result.unwrap_err();
                                prop_assert_eq!(rejected.into_inner().pts(), pts);
                            }
                        }
                        Op::Dequeue => match model.pop_front() {
                            Some(expected) => {
                                prop_assert_eq!(queues.dequeue(FrameKind::Audio).unwrap().pts(), expected);
                            }
                            None => {
                                prop_assert!(matches!(
                                    queues.dequeue(FrameKind::Audio),
                                    Err(Error::QueueEmpty(FrameKind::Audio))
                                ));
                            }
                        },
                    }
                    prop_assert!(queues.count(FrameKind::Audio) <= capacity);
                    prop_assert_eq!(queues.count(FrameKind::Audio), model.len());
                    prop_assert_eq!(queues.front_pts(FrameKind::Audio), model.front().copied());
                }
            }
        }

        #[test]
        fn prop_full_enqueue_leaves_state_untouched(extra in 0i64..1_000) {
            for queues in both_impls() {
                for pts in 0..3 {
                    queues.try_enqueue(Frame::video(textreel_core::Raster::new(2, 2).unwrap(), pts)).unwrap();
                }
                let before = queues.peek_front(FrameKind::Video);
                let err: Error = queues
                    .try_enqueue(Frame::video(textreel_core::Raster::new(2, 2).unwrap(), extra))
                    .unwrap_err()
                    .into();
                prop_assert!(matches!(err, Error::QueueFull(FrameKind::Video)));
                prop_assert_eq!(queues.count(FrameKind::Video), 3);
                prop_assert_eq!(queues.peek_front(FrameKind::Video), before);
            }
        }
    }

    #[test]
    fn test_drain_all_only_touches_one_kind() {
        for queues in both_impls() {
            for pts in 0..4 {
                queues.try_enqueue(Frame::audio(vec![1, 2], pts)).unwrap();
            }
            queues.try_enqueue(Frame::wave_sample(vec![3, 4], 0)).unwrap();

            assert_eq!(queues.drain_all(FrameKind::Audio), 4);
            assert_eq!(queues.count(FrameKind::Audio), 0);
            assert_eq!(queues.count(FrameKind::WaveSample), 1);
            assert!(queues.is_empty(FrameKind::Audio));
        }
    }

    #[test]
    fn test_drain_while_stops_at_first_kept() {
        for queues in both_impls() {
            for pts in [0, 10, 5, 20] {
                queues.try_enqueue(Frame::audio(vec![], pts)).unwrap();
            }
            let dropped = queues.drain_while(FrameKind::Audio, &mut |h| h.pts < 8);
            // Non-monotonic pts: 5 stays behind 10
            assert_eq!(dropped, 1);
            assert_eq!(queues.front_pts(FrameKind::Audio), Some(10));
        }
    }

    #[test]
    fn test_peek_does_not_remove() {
        for queues in both_impls() {
            queues
                .try_enqueue(Frame::audio(vec![0; 8], 42).with_play_number(Some(3)))
                .unwrap();
            let header = queues.peek_front(FrameKind::Audio).unwrap();
            assert_eq!(header.pts, 42);
            assert_eq!(header.play_number, Some(3));
            assert_eq!(header.byte_len, 16);
            assert_eq!(queues.count(FrameKind::Audio), 1);
            assert!(queues.peek_front(FrameKind::Video).is_none());
        }
    }

    #[test]
    fn test_is_full() {
        for queues in both_impls() {
            assert!(!queues.is_full(FrameKind::Void));
            for _ in 0..2 {
                queues
                    .try_enqueue(Frame::new(FrameKind::Void, 0, textreel_core::Payload::Empty))
                    .unwrap();
            }
            assert!(queues.is_full(FrameKind::Void));
        }
    }
}

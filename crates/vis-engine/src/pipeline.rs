//! Producer/consumer frame pipeline.
//!
//! A dedicated thread pulls frames from a [`FrameSource`] and hands them to
//! the transfer loop through a [`BoundedQueue`]. Frames are delivered in
//! source order, followed by exactly one end-of-stream or failure marker.
//!
//! Dropping a [`FramePipeline`] stops the producer and joins it, whether or
//! not the stream was consumed to the end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use vis_core::Frame;

use crate::error::TransferError;
use crate::queue::BoundedQueue;

/// Something that yields decoded video frames in presentation order.
pub trait FrameSource: Send + 'static {
    /// Total number of frames, if the container announces it. May be an
    /// estimate.
    fn frame_count(&self) -> Option<u64>;

    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

enum FrameEvent {
    Frame(Frame),
    End,
    Failed(String),
}

pub struct FramePipeline {
    queue: Arc<BoundedQueue<FrameEvent>>,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    frame_count: Option<u64>,
    finished: bool,
}

impl FramePipeline {
    /// Start producing frames from `source` into a queue of `capacity` slots.
    pub fn spawn<S: FrameSource>(source: S, capacity: usize) -> Result<Self, TransferError> {
        let queue = Arc::new(BoundedQueue::new(capacity));
        let stop = Arc::new(AtomicBool::new(false));
        let frame_count = source.frame_count();

        let producer = {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("frame-producer".into())
                .spawn(move || produce(source, &queue, &stop))
                .map_err(|e| TransferError::Source(format!("failed to start frame producer: {e}")))?
        };

        tracing::debug!(capacity = queue.capacity(), ?frame_count, "frame pipeline started");
        Ok(Self {
            queue,
            stop,
            producer: Some(producer),
            frame_count,
            finished: false,
        })
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    /// Frames ready and waiting. Approximate.
    pub fn buffered(&self) -> usize {
        self.queue.approx_len()
    }

    /// The next frame in source order, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, TransferError> {
        if self.finished {
            return Ok(None);
        }
        match self.queue.pop() {
            FrameEvent::Frame(frame) => Ok(Some(frame)),
            FrameEvent::End => {
                self.finished = true;
                Ok(None)
            }
            FrameEvent::Failed(reason) => {
                self.finished = true;
                Err(TransferError::Source(reason))
            }
        }
    }

    fn shutdown(&mut self) {
        let Some(producer) = self.producer.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        // A producer parked on a full queue needs one free slot to observe
        // the stop flag.
        if !self.finished && self.queue.try_pop().is_some() {
            tracing::trace!("released parked frame producer");
        }
        if producer.join().is_err() {
            tracing::warn!("frame producer panicked");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reports a failure if the producer unwinds, so the consumer never waits
/// on a dead thread.
struct PanicGuard<'a> {
    queue: &'a BoundedQueue<FrameEvent>,
    stop: &'a AtomicBool,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() && !self.stop.load(Ordering::Acquire) {
            self.queue
                .push(FrameEvent::Failed("frame producer panicked".into()));
        }
    }
}

fn produce<S: FrameSource>(mut source: S, queue: &BoundedQueue<FrameEvent>, stop: &AtomicBool) {
    let _guard = PanicGuard { queue, stop };
    let mut produced = 0u64;

    loop {
        if stop.load(Ordering::Acquire) {
            tracing::debug!(produced, "frame producer stopped");
            return;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                queue.push(FrameEvent::Frame(frame));
                produced += 1;
            }
            Ok(None) => {
                tracing::debug!(produced, "frame source exhausted");
                queue.push(FrameEvent::End);
                return;
            }
            Err(e) => {
                tracing::debug!(produced, error = %e, "frame source failed");
                queue.push(FrameEvent::Failed(format!("{e:#}")));
                return;
            }
        }
    }
}

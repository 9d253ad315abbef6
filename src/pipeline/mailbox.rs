use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Encoded camera frame stamped at capture time
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub timestamp: Instant,
    pub payload: Bytes,
}

impl FrameSample {
    pub fn new(timestamp: Instant, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
        }
    }

    /// Stamp with the current instant
    pub fn now(payload: impl Into<Bytes>) -> Self {
        Self::new(Instant::now(), payload)
    }
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<FrameSample>,
    closed: bool,
    posted: u64,
    dropped: u64,
}

/// Single-slot, latest-wins hand-off from the camera to the request workers.
///
/// `put` never blocks on worker availability: an unclaimed frame is simply
/// overwritten. `take` blocks until a frame is pending and claims it, so no
/// two workers ever receive the same frame.
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
    available: Condvar,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a frame, replacing any unclaimed one. Ignored after `close`.
    pub fn put(&self, sample: FrameSample) {
        {
            let mut slot = self.slot.lock();
            if slot.closed {
                return;
            }
            slot.posted += 1;
            if slot.pending.replace(sample).is_some() {
                slot.dropped += 1;
            }
        }
        // one pending frame feeds exactly one worker
        self.available.notify_one();
    }

    /// Block until a frame is pending and claim it. Returns `None` once the
    /// mailbox is closed.
    pub fn take(&self) -> Option<FrameSample> {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return None;
            }
            if let Some(sample) = slot.pending.take() {
                return Some(sample);
            }
            self.available.wait(&mut slot);
        }
    }

    /// Claim the pending frame without waiting
    pub fn try_take(&self) -> Option<FrameSample> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return None;
        }
        slot.pending.take()
    }

    /// Wake every blocked worker and refuse further frames
    pub fn close(&self) {
        {
            let mut slot = self.slot.lock();
            slot.closed = true;
            slot.pending = None;
        }
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Frames overwritten before any worker claimed them
    pub fn dropped_frames(&self) -> u64 {
        self.slot.lock().dropped
    }

    pub fn posted_frames(&self) -> u64 {
        self.slot.lock().posted
    }
}

use parking_lot::Mutex;
use std::sync::Arc;

use super::plate::OverlayPlate;

struct Front {
    plate: Arc<OverlayPlate>,
    sequence: u64,
}

/// Front half of an overlay double buffer, shared with readers.
///
/// Readers take an `Arc` snapshot of the front plate; the writer only ever
/// draws into a plate nobody else holds, so a snapshot can never change
/// underneath its reader.
pub struct OverlayDoubleBuffer {
    front: Mutex<Front>,
    width: u32,
    height: u32,
}

impl OverlayDoubleBuffer {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            front: Mutex::new(Front {
                plate: Arc::new(OverlayPlate::new(width, height)),
                sequence: 0,
            }),
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Latest published plate
    pub fn front(&self) -> Arc<OverlayPlate> {
        Arc::clone(&self.front.lock().plate)
    }

    /// Latest published plate together with its publish count
    pub fn snapshot(&self) -> (Arc<OverlayPlate>, u64) {
        let front = self.front.lock();
        (Arc::clone(&front.plate), front.sequence)
    }

    /// Number of publishes so far
    pub fn sequence(&self) -> u64 {
        self.front.lock().sequence
    }

    /// Writer half. There should be exactly one per buffer.
    pub fn writer(self: &Arc<Self>) -> OverlayWriter {
        OverlayWriter {
            shared: Arc::clone(self),
            back: Arc::new(OverlayPlate::new(self.width, self.height)),
            reallocations: 0,
        }
    }
}

/// Owns the back plate of an `OverlayDoubleBuffer`.
pub struct OverlayWriter {
    shared: Arc<OverlayDoubleBuffer>,
    back: Arc<OverlayPlate>,
    reallocations: u64,
}

impl OverlayWriter {
    /// Cleared back plate to draw the next frame on.
    ///
    /// The retired front is reused when no reader still holds it; otherwise
    /// a fresh plate is allocated.
    pub fn begin_frame(&mut self) -> &mut OverlayPlate {
        if Arc::get_mut(&mut self.back).is_none() {
            let (width, height) = self.shared.dimensions();
            self.back = Arc::new(OverlayPlate::new(width, height));
            self.reallocations += 1;
        }
        // unique at this point, so no copy is made
        let plate = Arc::make_mut(&mut self.back);
        plate.clear();
        plate
    }

    /// Swap the drawn back plate to the front. Returns the new sequence.
    pub fn publish(&mut self) -> u64 {
        let mut front = self.shared.front.lock();
        std::mem::swap(&mut front.plate, &mut self.back);
        front.sequence += 1;
        front.sequence
    }

    pub fn buffer(&self) -> &Arc<OverlayDoubleBuffer> {
        &self.shared
    }

    /// Times `begin_frame` had to allocate because a reader held the old front
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }
}

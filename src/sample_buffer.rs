//! Burst buffer shared between the sampling and EKG tasks

use std::sync::{Mutex, MutexGuard};

/// Samples per burst.
pub const BURST_LEN: usize = 256;

/// One burst of raw ADC readings.
pub type Burst = [u16; BURST_LEN];

#[derive(Debug)]
struct Slot {
    samples: Burst,
    generation: u64,
}

/// Most recent complete burst, published by the sampler and copied out by
/// the pipeline. The lock is held only for the bulk copy.
#[derive(Debug)]
pub struct SharedSampleBuffer {
    slot: Mutex<Slot>,
}

impl Default for SharedSampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSampleBuffer {
    pub fn new() -> Self {
        Self { slot: Mutex::new(Slot { samples: [0; BURST_LEN], generation: 0 }) }
    }

    /// Replace the shared burst. Returns the new generation.
    pub fn publish(&self, burst: &Burst) -> u64 {
        let mut slot = self.lock();
        slot.samples.copy_from_slice(burst);
        slot.generation += 1;
        slot.generation
    }

    /// Copy the shared burst into `out`. Returns its generation, 0 if
    /// nothing has been published yet.
    pub fn snapshot(&self, out: &mut Burst) -> u64 {
        let slot = self.lock();
        out.copy_from_slice(&slot.samples);
        slot.generation
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    // Nothing in the critical section can panic mid-copy
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

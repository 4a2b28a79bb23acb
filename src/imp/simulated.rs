// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-process accelerator.

Nothing is executed; the completion counter is advanced either by the caller (possibly from another
thread) or automatically, a fixed number of submissions behind the newest one.  Useful for tests and
for running the pipeline headless.

It can also stand in for more constrained devices: one that may not block the calling thread
([SimulatedAccelerator::non_blocking]), or one with a fixed number of slots or a fixed capacity per
slot.
*/

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::frames::accelerator::{Accelerator, SlotCapacity, SubmitError, WaitError};
use crate::frames::slot::FrameSlot;
use crate::sys::time::Instant;

/// What the accelerator saw when a slot was submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Submission {
    pub slot: usize,
    pub fence_target: u64,
    pub vertices: usize,
    pub objects: usize,
    pub materials: usize,
    pub total_time: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Manual,
    /// Submissions complete once this many newer ones exist.
    Lagging(u64),
}

#[derive(Debug, Default)]
struct Shared {
    completed: Mutex<u64>,
    advanced: Condvar,
    submissions: Mutex<Vec<Submission>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/**
Simulated completion counter.

Clones share the same counter, so a clone can be moved to another thread to play the part of the
device.
*/
#[derive(Debug, Clone)]
pub struct SimulatedAccelerator {
    shared: Arc<Shared>,
    mode: Mode,
    blocking: bool,
    slot_limit: Option<usize>,
    slot_capacity: Option<SlotCapacity>,
}

impl SimulatedAccelerator {
    /// The counter only moves when [Self::complete_through] is called.
    pub fn manual() -> Self {
        Self::with_mode(Mode::Manual)
    }

    fn with_mode(mode: Mode) -> Self {
        SimulatedAccelerator {
            shared: Arc::new(Shared::default()),
            mode,
            blocking: true,
            slot_limit: None,
            slot_capacity: None,
        }
    }

    /// Every submission completes as soon as it is made.
    pub fn immediate() -> Self {
        Self::lagging(0)
    }

    /// Each submission completes when the `frames`-th newer submission is made.
    pub fn lagging(frames: u64) -> Self {
        Self::with_mode(Mode::Lagging(frames))
    }

    /**
    Waits never block.  A target that is not already complete is reported as
    [WaitError::WouldBlock], the way a browser main thread has to behave.
    */
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// Only `slots` slots may be used with this accelerator.
    pub fn with_slot_limit(mut self, slots: usize) -> Self {
        self.slot_limit = Some(slots);
        self
    }

    /// Submissions whose slot holds more than `capacity` are refused.
    pub fn with_slot_capacity(mut self, capacity: SlotCapacity) -> Self {
        self.slot_capacity = Some(capacity);
        self
    }

    /// Advances the counter to `value`.  Values at or below the current count are ignored.
    pub fn complete_through(&self, value: u64) {
        let mut completed = lock(&self.shared.completed);
        if value > *completed {
            *completed = value;
            self.shared.advanced.notify_all();
        }
    }

    /// Every accepted submission, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.shared.submissions).clone()
    }
}

impl Accelerator for SimulatedAccelerator {
    type Commands = ();

    fn completed_value(&self) -> u64 {
        *lock(&self.shared.completed)
    }

    fn wait_for(&self, target: u64, timeout: Duration) -> Result<(), WaitError> {
        let deadline = Instant::now() + timeout;
        let mut completed = lock(&self.shared.completed);
        while *completed < target {
            if !self.blocking {
                return Err(WaitError::WouldBlock {
                    target,
                    completed: *completed,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::TimedOut {
                    target,
                    completed: *completed,
                });
            }
            completed = self
                .shared
                .advanced
                .wait_timeout(completed, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }

    fn submit(&self, slot: &FrameSlot, _commands: (), fence_target: u64) -> Result<(), SubmitError> {
        if self.slot_limit.is_some_and(|limit| slot.index() >= limit) {
            return Err(SubmitError::NoSuchSlot { slot: slot.index() });
        }
        if let Some(capacity) = self.slot_capacity {
            capacity.check(SlotCapacity::of_slot(slot))?;
        }
        lock(&self.shared.submissions).push(Submission {
            slot: slot.index(),
            fence_target,
            vertices: slot.vertices().len(),
            objects: slot.objects().len(),
            materials: slot.materials().len(),
            total_time: slot.pass().total_time,
        });
        if let Mode::Lagging(frames) = self.mode {
            self.complete_through(fence_target.saturating_sub(frames));
        }
        Ok(())
    }

    fn slot_limit(&self) -> Option<usize> {
        self.slot_limit
    }

    fn slot_capacity(&self) -> Option<SlotCapacity> {
        self.slot_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_once_another_thread_completes() {
        let accelerator = SimulatedAccelerator::manual();
        let device = accelerator.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            device.complete_through(4);
        });
        assert_eq!(accelerator.wait_for(4, Duration::from_secs(5)), Ok(()));
        assert_eq!(accelerator.completed_value(), 4);
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out() {
        let accelerator = SimulatedAccelerator::manual();
        accelerator.complete_through(2);
        accelerator.complete_through(1);
        assert_eq!(
            accelerator.wait_for(3, Duration::from_millis(10)),
            Err(WaitError::TimedOut {
                target: 3,
                completed: 2
            })
        );
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn lagging_completes_behind() {
        let accelerator = SimulatedAccelerator::lagging(2);
        for target in 1..=5 {
            accelerator.submit(&FrameSlot::new(0), (), target).unwrap();
        }
        assert_eq!(accelerator.completed_value(), 3);
        assert_eq!(accelerator.submissions().len(), 5);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn non_blocking_wait_returns_at_once() {
        let accelerator = SimulatedAccelerator::manual().non_blocking();
        let start = Instant::now();
        assert_eq!(
            accelerator.wait_for(1, Duration::from_secs(5)),
            Err(WaitError::WouldBlock {
                target: 1,
                completed: 0
            })
        );
        assert!(start.elapsed() < Duration::from_secs(1));
        accelerator.complete_through(1);
        assert_eq!(accelerator.wait_for(1, Duration::from_secs(5)), Ok(()));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn slots_beyond_limit_are_refused() {
        let accelerator = SimulatedAccelerator::immediate().with_slot_limit(2);
        assert_eq!(
            accelerator.submit(&FrameSlot::new(2), (), 1),
            Err(SubmitError::NoSuchSlot { slot: 2 })
        );
        assert_eq!(accelerator.completed_value(), 0);
        assert!(accelerator.submissions().is_empty());
        assert_eq!(accelerator.submit(&FrameSlot::new(1), (), 1), Ok(()));
    }
}

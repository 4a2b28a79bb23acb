// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The seam between the frame pipeline and whatever executes its commands.

An accelerator exposes a single monotonically increasing completion counter.  Work submitted with
fence target `t` is finished once the counter reaches `t`.  The pipeline never asks anything else of
the device: not which submission is running, not how far along it is.

Accelerators that keep their own copy of each slot may have a fixed number of slots and a fixed
capacity per slot.  They report both through [Accelerator::slot_limit] and
[Accelerator::slot_capacity] so the pipeline can refuse a configuration they cannot hold before the
first frame, rather than discovering it on submission.
*/

use std::time::Duration;

use crate::frames::slot::FrameSlot;

/// Why a wait returned before the counter reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WaitError {
    /// The bounded wait expired.  The device is not making progress.
    #[error("completion counter stuck at {completed}, waiting for {target}")]
    TimedOut { target: u64, completed: u64 },
    /**
    The platform cannot block the calling thread, and the target was not reached when polled.

    This is ordinary back-pressure, not a failure of the device.  Try again later.
    */
    #[error("fence {target} not yet reached ({completed} completed) and this thread may not block")]
    WouldBlock { target: u64, completed: u64 },
}

/// How many elements the storage of every slot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCapacity {
    pub vertices: usize,
    pub objects: usize,
    pub materials: usize,
}

impl SlotCapacity {
    /**
    Checks that `needed` fits.

    # Errors
    [SubmitError::CapacityExceeded] naming the first kind of element that does not fit.
    */
    pub fn check(&self, needed: SlotCapacity) -> Result<(), SubmitError> {
        let kinds = [
            ("vertices", needed.vertices, self.vertices),
            ("objects", needed.objects, self.objects),
            ("materials", needed.materials, self.materials),
        ];
        for (what, needed, capacity) in kinds {
            if needed > capacity {
                return Err(SubmitError::CapacityExceeded {
                    what,
                    needed,
                    capacity,
                });
            }
        }
        Ok(())
    }

    /// What the contents of `slot` occupy.
    pub fn of_slot(slot: &FrameSlot) -> Self {
        SlotCapacity {
            vertices: slot.vertices().len(),
            objects: slot.objects().len(),
            materials: slot.materials().len(),
        }
    }
}

/// The accelerator refused a submission.  Nothing was handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("slot {slot} has no storage on the accelerator")]
    NoSuchSlot { slot: usize },
    #[error("{needed} {what} exceed the slot capacity of {capacity}")]
    CapacityExceeded {
        what: &'static str,
        needed: usize,
        capacity: usize,
    },
}

pub trait Accelerator {
    /// Whatever a renderer records for one frame.
    type Commands;

    /// The highest fence target known to be complete.  Never decreases.
    fn completed_value(&self) -> u64;

    /**
    Blocks until `completed_value() >= target`, or `timeout` elapses.

    Returns immediately when the target is already reached.

    # Errors
    * [WaitError::TimedOut] when `timeout` elapsed first.
    * [WaitError::WouldBlock] on platforms where the calling thread may not block, when the target
      was not reached on the first poll.
    */
    fn wait_for(&self, target: u64, timeout: Duration) -> Result<(), WaitError>;

    /**
    Hands the commands recorded against `slot` to the device.  The counter must reach
    `fence_target` once the device has finished with them.

    # Errors
    [SubmitError] if the slot's contents cannot be handed over.  In that case nothing is
    submitted and the counter will never reach `fence_target` on account of this call.
    */
    fn submit(&self, slot: &FrameSlot, commands: Self::Commands, fence_target: u64) -> Result<(), SubmitError>;

    /// The number of slots this accelerator has storage for, or `None` if it takes any number.
    fn slot_limit(&self) -> Option<usize> {
        None
    }

    /// The storage available to each slot, or `None` if it is unbounded.
    fn slot_capacity(&self) -> Option<SlotCapacity> {
        None
    }
}

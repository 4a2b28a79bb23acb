// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A fixed ring of frame slots, each guarded by the fence target of its last submission.

```text
            acquire_next                    publish
  ┌──────────┐  wait until      ┌─────────┐  target = last+1   ┌──────────────┐
  │ slot k   │──completed ≥ f──▶│ CPU     │───────────────────▶│ accelerator  │
  │ target f │                  │ writes  │                    │ reads slot k │
  └──────────┘                  └─────────┘                    └──────────────┘
```

With N slots the CPU may run up to N frames ahead of the device.  The only place the CPU ever
blocks is the fence wait in [FrameSlotRing::acquire_next] (and [FrameSlotRing::drain] at shutdown),
and that wait is bounded: a device that stops making progress is reported as [DeviceLost] rather
than hanging the control thread.

On platforms where the control thread may not block at all, a slot that is still in flight is
reported as [RingError::WouldBlock] instead.  That is not a loss; acquiring again later succeeds
once the device catches up.
*/

use std::time::Duration;

use crate::frames::accelerator::{Accelerator, SubmitError, WaitError};
use crate::frames::config::{FrameConfig, FrameConfigError};
use crate::frames::slot::FrameSlot;
use crate::sys::time::Instant;

/**
The accelerator stopped making progress.

This is fatal: the ring never retries, and its state must be considered lost.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device lost: waited {waited:?} on slot {slot} for fence {target}, but only {completed} completed")]
pub struct DeviceLost {
    pub slot: usize,
    pub target: u64,
    pub completed: u64,
    pub waited: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RingError {
    #[error(transparent)]
    DeviceLost(#[from] DeviceLost),
    #[error("slot {slot} is not the acquired slot")]
    NotAcquired { slot: usize },
    #[error("slot {slot} was acquired but not published")]
    AlreadyAcquired { slot: usize },
    /// The slot is still in flight and the calling thread may not block.  Not fatal.
    #[error("slot {slot} is waiting for fence {target} ({completed} completed)")]
    WouldBlock { slot: usize, target: u64, completed: u64 },
    /// The accelerator refused the slot.  The slot was released unpublished.
    #[error("slot {slot} was not submitted: {error}")]
    Submit { slot: usize, error: SubmitError },
}

pub struct FrameSlotRing<A: Accelerator> {
    accelerator: A,
    slots: Vec<FrameSlot>,
    next: usize,
    acquired: Option<usize>,
    last_issued: u64,
    fence_timeout: Duration,
    blocking_waits: u64,
    last_wait: Duration,
}

impl<A: Accelerator> std::fmt::Debug for FrameSlotRing<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlotRing")
            .field("slots", &self.slots.len())
            .field("next", &self.next)
            .field("acquired", &self.acquired)
            .field("last_issued", &self.last_issued)
            .field("fence_timeout", &self.fence_timeout)
            .finish()
    }
}

impl<A: Accelerator> FrameSlotRing<A> {
    /**
    Creates `config.slot_count` empty slots.

    # Errors
    * Any error of [FrameConfig::validate].
    * [FrameConfigError::SlotLimit] if the accelerator has storage for fewer slots.
    */
    pub fn new(accelerator: A, config: &FrameConfig) -> Result<Self, FrameConfigError> {
        config.validate()?;
        if let Some(available) = accelerator.slot_limit() {
            if available < config.slot_count {
                return Err(FrameConfigError::SlotLimit {
                    slots: config.slot_count,
                    available,
                });
            }
        }
        Ok(FrameSlotRing {
            accelerator,
            slots: (0..config.slot_count).map(FrameSlot::new).collect(),
            next: 0,
            acquired: None,
            last_issued: 0,
            fence_timeout: config.fence_timeout,
            blocking_waits: 0,
            last_wait: Duration::ZERO,
        })
    }

    /**
    Takes the next slot in round-robin order.

    If the slot's previous submission is still in flight, this blocks until the accelerator's
    counter reaches it, for at most the configured fence timeout.

    # Errors
    * [RingError::AlreadyAcquired] if the previously acquired slot was never published.
    * [RingError::DeviceLost] if the wait timed out.  The slot is not handed out.
    * [RingError::WouldBlock] if the slot is in flight and the accelerator cannot block.  The slot
      is not handed out, and the next call tries the same slot again.
    */
    pub fn acquire_next(&mut self) -> Result<&mut FrameSlot, RingError> {
        if let Some(slot) = self.acquired {
            return Err(RingError::AlreadyAcquired { slot });
        }
        let index = self.next;
        let target = self.slots[index].fence_target();
        self.last_wait = Duration::ZERO;
        if target > self.accelerator.completed_value() {
            self.blocking_waits += 1;
            logwise::trace_sync!(
                "slot {slot} waits for fence {target}",
                slot = logwise::privacy::LogIt(&index),
                target = logwise::privacy::LogIt(&target)
            );
            let start = Instant::now();
            let result = self.accelerator.wait_for(target, self.fence_timeout);
            self.last_wait = start.elapsed();
            match result {
                Ok(()) => {}
                Err(WaitError::TimedOut { completed, .. }) => {
                    let lost = DeviceLost {
                        slot: index,
                        target,
                        completed,
                        waited: self.last_wait,
                    };
                    logwise::error_sync!("{lost}", lost = logwise::privacy::LogIt(&lost));
                    return Err(lost.into());
                }
                Err(WaitError::WouldBlock { completed, .. }) => {
                    return Err(RingError::WouldBlock {
                        slot: index,
                        target,
                        completed,
                    });
                }
            }
        }
        self.acquired = Some(index);
        self.next = (index + 1) % self.slots.len();
        Ok(&mut self.slots[index])
    }

    /**
    Submits `commands` recorded against the acquired slot with a fresh fence target.

    Returns the target.  Targets strictly increase over the life of the ring.

    # Errors
    * [RingError::NotAcquired] if `slot_index` is not the acquired slot; nothing is submitted.
    * [RingError::Submit] if the accelerator refused the slot.  No target is consumed and the slot
      is released as if by [Self::release].
    */
    pub fn publish(&mut self, slot_index: usize, commands: A::Commands) -> Result<u64, RingError> {
        if self.acquired != Some(slot_index) {
            return Err(RingError::NotAcquired { slot: slot_index });
        }
        let target = self.last_issued + 1;
        let slot = &mut self.slots[slot_index];
        self.acquired = None;
        if let Err(error) = self.accelerator.submit(slot, commands, target) {
            logwise::error_sync!(
                "slot {slot} refused: {error}",
                slot = logwise::privacy::LogIt(&slot_index),
                error = logwise::privacy::LogIt(&error)
            );
            return Err(RingError::Submit {
                slot: slot_index,
                error,
            });
        }
        slot.set_fence_target(target);
        self.last_issued = target;
        logwise::trace_sync!(
            "published slot {slot} as fence {target}",
            slot = logwise::privacy::LogIt(&slot_index),
            target = logwise::privacy::LogIt(&target)
        );
        Ok(target)
    }

    /**
    Gives back the acquired slot without publishing it.

    The slot keeps the fence target of its previous submission, which is already complete, so it
    can be handed out again without waiting.  Whatever was written into it stays there.
    */
    pub fn release(&mut self, slot_index: usize) -> Result<(), RingError> {
        if self.acquired != Some(slot_index) {
            return Err(RingError::NotAcquired { slot: slot_index });
        }
        self.acquired = None;
        logwise::warn_sync!(
            "slot {slot} released without publishing",
            slot = logwise::privacy::LogIt(&slot_index)
        );
        Ok(())
    }

    /**
    Waits, bounded by the fence timeout, until every published submission has completed.

    After a successful drain no slot is in use by the accelerator.

    # Errors
    * [RingError::DeviceLost] if the wait timed out.
    * [RingError::WouldBlock] if frames are still in flight and the accelerator cannot block.
      Draining again later may succeed.
    */
    pub fn drain(&mut self) -> Result<(), RingError> {
        let target = self.last_issued;
        if target <= self.accelerator.completed_value() {
            return Ok(());
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.fence_target() == target)
            .unwrap_or(0);
        let start = Instant::now();
        match self.accelerator.wait_for(target, self.fence_timeout) {
            Ok(()) => Ok(()),
            Err(WaitError::TimedOut { completed, .. }) => {
                let lost = DeviceLost {
                    slot,
                    target,
                    completed,
                    waited: start.elapsed(),
                };
                logwise::error_sync!("drain failed: {lost}", lost = logwise::privacy::LogIt(&lost));
                Err(lost.into())
            }
            Err(WaitError::WouldBlock { completed, .. }) => Err(RingError::WouldBlock {
                slot,
                target,
                completed,
            }),
        }
    }

    /// Slot `index`, whether or not it is acquired.
    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
    /// The acquired slot, if any.
    pub fn acquired(&self) -> Option<usize> {
        self.acquired
    }
    /// The highest fence target published so far, 0 before the first publish.
    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }
    /// How many acquisitions had to wait on the accelerator.
    pub fn blocking_waits(&self) -> u64 {
        self.blocking_waits
    }
    /// Time spent waiting in the most recent acquisition.
    pub fn last_wait(&self) -> Duration {
        self.last_wait
    }
    /// How long an acquisition may wait before the device is declared lost.
    pub fn fence_timeout(&self) -> Duration {
        self.fence_timeout
    }
    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }
}

impl<A: Accelerator> Drop for FrameSlotRing<A> {
    fn drop(&mut self) {
        let completed = self.accelerator.completed_value();
        if self.last_issued > completed {
            logwise::warn_sync!(
                "frame ring dropped with fences {completed}..{issued} still in flight; drain before dropping",
                completed = logwise::privacy::LogIt(&completed),
                issued = logwise::privacy::LogIt(&self.last_issued)
            );
        }
    }
}

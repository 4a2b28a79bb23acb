// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Frame-resource pipelining.

A [FrameSlotRing] holds N generations of per-frame buffers.  The CPU fills one slot while the
accelerator may still be consuming the others; a single monotonically increasing completion counter
tells the ring when a slot is safe to reuse.  [FrameOrchestrator] drives the ring, the wave
simulation and the replicated scene data once per tick. */

pub mod accelerator;
pub mod config;
pub mod orchestrator;
pub mod reporter;
pub mod ring;
pub mod slot;

pub use accelerator::{Accelerator, SlotCapacity, SubmitError, WaitError};
pub use config::{FENCE_TIMEOUT_VAR, FRAME_SLOTS_VAR, FrameConfig, FrameConfigError};
pub use orchestrator::{FrameOrchestrator, FrameRenderer, TickError};
pub use reporter::{FrameInfo, FrameReporter, FrameStats};
pub use ring::{DeviceLost, FrameSlotRing, RingError};
pub use slot::FrameSlot;

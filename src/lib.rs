// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! waves_and_frames drives an asynchronously executing GPU from a single CPU control thread,
without stalling the CPU on every frame and without writing memory the GPU is still reading.

Two pieces do the work:

| Piece | Module | What it does |
|---|---|---|
| Frame-resource pipelining | [frames] | N generations of per-frame buffers, each guarded by a fence target, so the CPU prepares frame *k+1* while the GPU consumes frame *k* |
| Ripple simulation | [waves] | a damped 2-D wave solver on a grid, advanced at a fixed step and copied into the CPU-owned slot every tick |

Per-object and per-material constants that change only occasionally are kept in
[bindings::ReplicatedResourceSet]s.  An edit is written into each slot in turn, as that slot comes
up, until every slot holds it.

# Pipelining

```text
CPU   ┃ prep 1 ┃ prep 2 ┃ prep 3 ┃ wait ┃ prep 4 ┃
GPU   ┃        ┃ exec 1           ┃ exec 2 ┃ exec 3 ┃
slot  ┃   0    ┃   1    ┃   2    ┃      ┃   0    ┃
```

With three slots the CPU may run up to three frames ahead.  Reusing slot 0 for frame 4 waits until
the GPU's completion counter has reached frame 1's fence target.  That wait is bounded; a device
that stops making progress surfaces as [frames::DeviceLost] instead of hanging the control thread.

# Example

```
use waves_and_frames::bindings::{Material, SceneResources};
use waves_and_frames::frames::{FrameConfig, FrameOrchestrator, FrameSlot};
use waves_and_frames::waves::{HeightField, HeightFieldConfig};
use waves_and_frames::SimulatedAccelerator;

let config = FrameConfig::default();
let waves = HeightField::new(HeightFieldConfig::default()).unwrap();
let mut scene = SceneResources::new(config.slot_count);
let water = scene.add_material("water", Material::default()).unwrap();

let mut orchestrator =
    FrameOrchestrator::new(SimulatedAccelerator::lagging(2), &config, waves, scene).unwrap();
orchestrator.disturb(64, 64, 0.5).unwrap();

let mut renderer = |slot: &FrameSlot, _: &SceneResources, _: &SimulatedAccelerator| {
    assert_eq!(slot.vertices().len(), 128 * 128);
};
for _ in 0..10 {
    orchestrator.animate_material_scroll(water, 0.1, 0.02, 1.0 / 60.0).unwrap();
    orchestrator.tick(1.0 / 60.0, &mut renderer).unwrap();
}
orchestrator.shutdown().unwrap();
```

# Backends

The `backend_wgpu` feature (on by default) provides `WgpuAccelerator`, which uploads each slot to
its own GPU buffers and tracks completion with `Queue::on_submitted_work_done`.
[SimulatedAccelerator] is always available and executes nothing.

# Configuration

| Variable | Effect |
|---|---|
| `WAF_FRAME_SLOTS` | slot count used by [frames::FrameConfig::from_env] |
| `WAF_FENCE_TIMEOUT_MS` | fence wait bound used by [frames::FrameConfig::from_env] |
*/

pub mod bindings;
pub mod frames;
mod imp;
mod sys;
pub mod waves;

pub use imp::simulated::{SimulatedAccelerator, Submission};
#[cfg(feature = "backend_wgpu")]
pub use imp::wgpu::{Error as WgpuError, SlotBuffers, WgpuAccelerator};

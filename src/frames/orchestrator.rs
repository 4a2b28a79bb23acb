// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The per-tick driver.

Every [FrameOrchestrator::tick] runs the same sequence against one slot:

1. acquire the next slot (the only point that may block)
2. advance the height field
3. copy its vertices into the slot
4. flush dirty objects, then dirty materials, into the slot
5. write the pass constants
6. let the renderer record commands against the slot
7. publish the slot with a fresh fence target

All CPU writes for a frame target the acquired slot and happen before it is published, so the
accelerator never observes a partially written slot, and the CPU never writes a slot the
accelerator may still be reading.
*/

use glam::{Mat4, Vec3};

use crate::bindings::constants::{Material, ObjectTransform, PassConstants};
use crate::bindings::dirty_tracking::{UnknownReplica, UnknownResource};
use crate::bindings::scene::{MaterialId, ObjectId, SceneResources};
use crate::frames::accelerator::{Accelerator, SlotCapacity};
use crate::frames::config::{FrameConfig, FrameConfigError};
use crate::frames::reporter::FrameReporter;
use crate::frames::ring::{DeviceLost, FrameSlotRing, RingError};
use crate::frames::slot::FrameSlot;
use crate::waves::height_field::{DisturbError, HeightField};

/**
Records the accelerator commands for one frame.

Implemented for closures taking the same arguments.
*/
pub trait FrameRenderer<A: Accelerator> {
    fn record(&mut self, slot: &FrameSlot, scene: &SceneResources, accelerator: &A) -> A::Commands;
}

impl<A, F> FrameRenderer<A> for F
where
    A: Accelerator,
    F: FnMut(&FrameSlot, &SceneResources, &A) -> A::Commands,
{
    fn record(&mut self, slot: &FrameSlot, scene: &SceneResources, accelerator: &A) -> A::Commands {
        self(slot, scene, accelerator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TickError {
    /// Fatal.  Every later tick fails the same way.
    #[error(transparent)]
    DeviceLost(DeviceLost),
    /**
    The frame was not published.  Not fatal.

    [RingError::WouldBlock] in particular only means the accelerator is behind on a platform that
    cannot block; tick again later.
    */
    #[error(transparent)]
    Ring(RingError),
    /// The scene's replicas do not cover the acquired slot.  The slot was released unpublished.
    #[error(transparent)]
    Replica(#[from] UnknownReplica),
}

impl From<RingError> for TickError {
    fn from(e: RingError) -> Self {
        match e {
            RingError::DeviceLost(lost) => TickError::DeviceLost(lost),
            other => TickError::Ring(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Camera {
    view: Mat4,
    proj: Mat4,
    eye: Vec3,
}

#[derive(Debug)]
pub struct FrameOrchestrator<A: Accelerator> {
    ring: FrameSlotRing<A>,
    waves: HeightField,
    scene: SceneResources,
    camera: Camera,
    total_time: f32,
    current: Option<usize>,
    poisoned: Option<DeviceLost>,
    reporter: FrameReporter,
}

impl<A: Accelerator> FrameOrchestrator<A> {
    /**
    Builds the slots and takes ownership of the simulation and scene.

    `scene` must have been created with `config.slot_count` replicas.

    # Errors
    * [FrameConfigError::ReplicaMismatch] if the scene has a different replica count.
    * [FrameConfigError::SlotLimit] if the accelerator has storage for fewer slots.
    * [FrameConfigError::Capacity] if the wave vertices, objects or materials do not fit the
      accelerator's per-slot storage.
    */
    pub fn new(
        accelerator: A,
        config: &FrameConfig,
        waves: HeightField,
        scene: SceneResources,
    ) -> Result<Self, FrameConfigError> {
        let replicas = scene.objects().replicas();
        if replicas != config.slot_count {
            return Err(FrameConfigError::ReplicaMismatch {
                slots: config.slot_count,
                replicas,
            });
        }
        if let Some(capacity) = accelerator.slot_capacity() {
            capacity.check(SlotCapacity {
                vertices: waves.vertex_count(),
                objects: scene.objects().len(),
                materials: scene.materials().len(),
            })?;
        }
        let ring = FrameSlotRing::new(accelerator, config)?;
        logwise::info_sync!(
            "orchestrating {slots} slots, {vertices} wave vertices, {items} render items",
            slots = logwise::privacy::LogIt(&ring.slot_count()),
            vertices = logwise::privacy::LogIt(&waves.vertex_count()),
            items = logwise::privacy::LogIt(&scene.items().len())
        );
        Ok(FrameOrchestrator {
            ring,
            waves,
            scene,
            camera: Camera {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                eye: Vec3::ZERO,
            },
            total_time: 0.0,
            current: None,
            poisoned: None,
            reporter: FrameReporter::new(),
        })
    }

    /**
    Prepares and publishes one frame.  Returns its fence target.

    A `delta_time` that is negative or not finite advances neither the simulation nor the clock.

    # Errors
    * [TickError::DeviceLost] if the accelerator stopped making progress.  The orchestrator is
      unusable afterwards.
    * [TickError::Ring] if the frame could not be published, for example
      [RingError::WouldBlock] on a platform that cannot wait.  Later ticks may succeed.
    */
    pub fn tick<R: FrameRenderer<A>>(&mut self, delta_time: f32, renderer: &mut R) -> Result<u64, TickError> {
        if let Some(lost) = self.poisoned {
            return Err(TickError::DeviceLost(lost));
        }
        let _interval = logwise::perfwarn_begin!("FrameOrchestrator::tick");
        let mut guard = self.reporter.begin_frame();

        let slot = match self.ring.acquire_next() {
            Ok(slot) => slot,
            Err(RingError::DeviceLost(lost)) => {
                self.poisoned = Some(lost);
                return Err(TickError::DeviceLost(lost));
            }
            Err(other) => return Err(other.into()),
        };
        let index = slot.index();

        let steps = self.waves.step(delta_time);
        self.waves.write_vertices(slot.vertices_mut());

        let flushed = self
            .scene
            .objects_mut()
            .flush(index, slot.objects_mut())
            .and_then(|_| self.scene.materials_mut().flush(index, slot.materials_mut()));
        if let Err(e) = flushed {
            self.ring.release(index)?;
            return Err(e.into());
        }

        let delta_time = if delta_time.is_finite() && delta_time > 0.0 {
            delta_time
        } else {
            0.0
        };
        self.total_time += delta_time;
        slot.set_pass(PassConstants::new(
            self.camera.view,
            self.camera.proj,
            self.camera.eye,
            self.total_time,
            delta_time,
        ));

        guard.mark_acquired(self.ring.last_wait());
        guard.mark_simulated(steps);

        let Some(slot) = self.ring.slot(index) else {
            return Err(RingError::NotAcquired { slot: index }.into());
        };
        let commands = renderer.record(slot, &self.scene, self.ring.accelerator());
        let target = self.ring.publish(index, commands)?;
        self.current = Some(index);
        guard.finish(target);
        Ok(target)
    }

    /// The most recently published slot, or `None` before the first successful tick.
    pub fn current_slot(&self) -> Option<&FrameSlot> {
        self.current.and_then(|i| self.ring.slot(i))
    }

    /// Resends an object's transform to every slot without changing it.
    pub fn mark_object_dirty(&mut self, id: ObjectId) -> Result<(), UnknownResource> {
        self.scene.objects_mut().mark_dirty(id)
    }

    /// Resends a material to every slot without changing it.
    pub fn mark_material_dirty(&mut self, id: MaterialId) -> Result<(), UnknownResource> {
        self.scene.materials_mut().mark_dirty(id)
    }

    /// Edits an object's transform.  The change reaches each slot as that slot comes up.
    pub fn edit_object<R>(&mut self, id: ObjectId, f: impl FnOnce(&mut ObjectTransform) -> R) -> Result<R, UnknownResource> {
        self.scene.objects_mut().edit(id, f)
    }

    pub fn edit_material<R>(&mut self, id: MaterialId, f: impl FnOnce(&mut Material) -> R) -> Result<R, UnknownResource> {
        self.scene.materials_mut().edit(id, f)
    }

    /**
    Scrolls a material's texture transform at `(u_per_second, v_per_second)` for `delta_time`
    seconds.
    */
    pub fn animate_material_scroll(
        &mut self,
        id: MaterialId,
        u_per_second: f32,
        v_per_second: f32,
        delta_time: f32,
    ) -> Result<(), UnknownResource> {
        self.edit_material(id, |m| {
            m.scroll(u_per_second * delta_time, v_per_second * delta_time)
        })
    }

    /// Starts a ripple.  See [HeightField::disturb].
    pub fn disturb(&mut self, row: usize, col: usize, magnitude: f32) -> Result<(), DisturbError> {
        self.waves.disturb(row, col, magnitude)
    }

    /// Takes effect from the next tick.
    pub fn set_camera(&mut self, view: Mat4, proj: Mat4, eye: Vec3) {
        self.camera = Camera { view, proj, eye };
    }

    pub fn total_time(&self) -> f32 {
        self.total_time
    }
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }
    pub fn reporter(&self) -> &FrameReporter {
        &self.reporter
    }
    pub fn waves(&self) -> &HeightField {
        &self.waves
    }
    pub fn scene(&self) -> &SceneResources {
        &self.scene
    }
    pub fn ring(&self) -> &FrameSlotRing<A> {
        &self.ring
    }

    /**
    Waits for every published frame to complete, then releases the slots.

    After a device loss there is nothing to wait for; the loss is returned immediately as
    [TickError::DeviceLost].

    On a platform that cannot block, frames still in flight are reported as
    [RingError::WouldBlock] and the slots are released anyway.  Poll
    [Accelerator::completed_value] until it reaches [FrameSlotRing::last_issued] before shutting
    down to avoid that.
    */
    pub fn shutdown(mut self) -> Result<(), TickError> {
        if let Some(lost) = self.poisoned {
            return Err(TickError::DeviceLost(lost));
        }
        self.ring.drain()?;
        logwise::info_sync!(
            "orchestrator shut down after {frames} frames",
            frames = logwise::privacy::LogIt(&self.ring.last_issued())
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::scene::{Geometry, RenderLayer};
    use crate::frames::accelerator::SubmitError;
    use crate::imp::simulated::SimulatedAccelerator;
    use crate::waves::config::HeightFieldConfig;

    fn small_waves() -> HeightField {
        HeightField::new(HeightFieldConfig {
            rows: 8,
            cols: 8,
            ..HeightFieldConfig::default()
        })
        .unwrap()
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn renderer_sees_prepared_slot() {
        let mut scene = SceneResources::new(3);
        let water = scene.add_material("water", Material::default()).unwrap();
        let grid = scene
            .add_geometry(
                "grid",
                Geometry {
                    index_count: 294,
                    start_index: 0,
                    base_vertex: 0,
                    dynamic: true,
                },
            )
            .unwrap();
        scene
            .add_item(ObjectTransform::default(), water, grid, RenderLayer::Opaque)
            .unwrap();
        let mut orchestrator = FrameOrchestrator::new(
            SimulatedAccelerator::immediate(),
            &FrameConfig::default(),
            small_waves(),
            scene,
        )
        .unwrap();
        let mut recorded = Vec::new();
        let mut renderer = |slot: &FrameSlot, scene: &SceneResources, _: &SimulatedAccelerator| {
            recorded.push((slot.index(), slot.vertices().len(), slot.objects().len(), slot.materials().len()));
            assert_eq!(scene.items().len(), 1);
        };
        for expected in 1..=4 {
            assert_eq!(orchestrator.tick(0.05, &mut renderer), Ok(expected));
        }
        assert_eq!(
            recorded,
            vec![(0, 64, 1, 1), (1, 64, 1, 1), (2, 64, 1, 1), (0, 64, 1, 1)]
        );
        assert_eq!(orchestrator.current_slot().map(FrameSlot::index), Some(0));
        assert!((orchestrator.current_slot().unwrap().pass().total_time - 0.2).abs() < 1e-5);
        assert_eq!(orchestrator.shutdown(), Ok(()));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn replica_mismatch() {
        let result = FrameOrchestrator::new(
            SimulatedAccelerator::immediate(),
            &FrameConfig::default(),
            small_waves(),
            SceneResources::new(2),
        );
        assert!(matches!(
            result,
            Err(FrameConfigError::ReplicaMismatch { slots: 3, replicas: 2 })
        ));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn accelerator_with_fewer_slots() {
        let config = FrameConfig {
            slot_count: 4,
            ..FrameConfig::default()
        };
        let result = FrameOrchestrator::new(
            SimulatedAccelerator::immediate().with_slot_limit(3),
            &config,
            small_waves(),
            SceneResources::new(4),
        );
        assert!(matches!(
            result,
            Err(FrameConfigError::SlotLimit { slots: 4, available: 3 })
        ));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn scene_larger_than_slot_capacity() {
        let mut scene = SceneResources::new(3);
        scene.add_material("water", Material::default()).unwrap();
        scene.add_material("grass", Material::default()).unwrap();
        let capacity = SlotCapacity {
            vertices: 64,
            objects: 8,
            materials: 1,
        };
        let result = FrameOrchestrator::new(
            SimulatedAccelerator::immediate().with_slot_capacity(capacity),
            &FrameConfig::default(),
            small_waves(),
            scene,
        );
        assert!(matches!(
            result,
            Err(FrameConfigError::Capacity(SubmitError::CapacityExceeded {
                what: "materials",
                needed: 2,
                capacity: 1
            }))
        ));

        //the 8x8 grid has 64 vertices
        let tight = SlotCapacity {
            vertices: 63,
            objects: 8,
            materials: 8,
        };
        let result = FrameOrchestrator::new(
            SimulatedAccelerator::immediate().with_slot_capacity(tight),
            &FrameConfig::default(),
            small_waves(),
            SceneResources::new(3),
        );
        assert!(matches!(
            result,
            Err(FrameConfigError::Capacity(SubmitError::CapacityExceeded { what: "vertices", .. }))
        ));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn fitting_scene_runs_on_bounded_accelerator() {
        let capacity = SlotCapacity {
            vertices: 64,
            objects: 0,
            materials: 0,
        };
        let mut orchestrator = FrameOrchestrator::new(
            SimulatedAccelerator::immediate()
                .with_slot_limit(3)
                .with_slot_capacity(capacity),
            &FrameConfig::default(),
            small_waves(),
            SceneResources::new(3),
        )
        .unwrap();
        let mut noop = |_: &FrameSlot, _: &SceneResources, _: &SimulatedAccelerator| {};
        for expected in 1..=6 {
            assert_eq!(orchestrator.tick(0.016, &mut noop), Ok(expected));
        }
        assert_eq!(orchestrator.shutdown(), Ok(()));
    }
}

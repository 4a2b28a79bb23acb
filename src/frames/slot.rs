// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
One generation of per-frame buffers.

A [FrameSlot] is only handed out mutably by [FrameSlotRing](crate::frames::ring::FrameSlotRing)
once the accelerator has finished with everything previously submitted against it.
*/

use crate::bindings::constants::{MaterialConstants, ObjectConstants, PassConstants, WaveVertex};
use crate::bindings::dirty_tracking::ConstantRegion;

/**
Everything the accelerator reads for one frame: the wave vertices, one constant region per kind of
replicated scene data, and the pass constants.

The slot also remembers the fence target of the last submission that read it.
*/
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
    fence_target: u64,
    vertices: Vec<WaveVertex>,
    objects: ConstantRegion<ObjectConstants>,
    materials: ConstantRegion<MaterialConstants>,
    pass: PassConstants,
}

impl FrameSlot {
    pub(crate) fn new(index: usize) -> Self {
        FrameSlot {
            index,
            fence_target: 0,
            vertices: Vec::new(),
            objects: ConstantRegion::with_capacity(0),
            materials: ConstantRegion::with_capacity(0),
            pass: PassConstants::default(),
        }
    }

    /// Position in the ring.  Also the replica index used when flushing scene data into this slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The fence target of the last submission that used this slot, or 0 if it was never submitted.
    pub fn fence_target(&self) -> u64 {
        self.fence_target
    }

    pub(crate) fn set_fence_target(&mut self, target: u64) {
        debug_assert!(target > self.fence_target);
        self.fence_target = target;
    }

    /// The wave vertices written for this frame.
    pub fn vertices(&self) -> &[WaveVertex] {
        &self.vertices
    }
    /**
    The vertex storage, for refilling while the slot is acquired.

    Only reachable through a slot handed out by the ring, so the accelerator is not reading it.
    Its length is uploaded as is; an accelerator with a fixed capacity refuses a slot that grew
    past it.
    */
    pub fn vertices_mut(&mut self) -> &mut Vec<WaveVertex> {
        &mut self.vertices
    }

    /// Per-object constants, indexed by [ObjectId](crate::bindings::ObjectId).
    pub fn objects(&self) -> &ConstantRegion<ObjectConstants> {
        &self.objects
    }
    pub fn objects_mut(&mut self) -> &mut ConstantRegion<ObjectConstants> {
        &mut self.objects
    }

    /// Per-material constants, indexed by [MaterialId](crate::bindings::MaterialId).
    pub fn materials(&self) -> &ConstantRegion<MaterialConstants> {
        &self.materials
    }
    pub fn materials_mut(&mut self) -> &mut ConstantRegion<MaterialConstants> {
        &mut self.materials
    }

    pub fn pass(&self) -> &PassConstants {
        &self.pass
    }
    /// Replaces the per-frame constants.  The orchestrator does this once per tick.
    pub fn set_pass(&mut self, pass: PassConstants) {
        self.pass = pass;
    }
}

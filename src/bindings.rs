// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Data that is replicated into frame slots, and the scene records that reference it. */

pub mod constants;
pub mod dirty_tracking;
pub mod registry;
pub mod scene;

pub use constants::{CRepr, Material, ObjectTransform, PassConstants, WaveVertex};
pub use dirty_tracking::{
    ConstantRegion, Replicate, ReplicatedResourceSet, ResourceId, UnknownReplica, UnknownResource,
};
pub use registry::{Handle, Registry, RegistryError};
pub use scene::{Geometry, MaterialId, ObjectId, RenderItem, RenderLayer, SceneResources};

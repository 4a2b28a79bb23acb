// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU-layout payloads written into frame slots.

Logical values ([ObjectTransform], [Material]) are what scene code edits.  Their physical
representations ([ObjectConstants], [MaterialConstants]) are what a frame slot holds and the GPU
reads: plain `#[repr(C)]` structs with column-major matrices transposed for HLSL-style row-major
consumption.
*/

use glam::{Mat4, Vec3, Vec4};

use crate::bindings::dirty_tracking::Replicate;

/**
Marker for types whose memory layout can be copied directly into a GPU buffer.

# Safety
The type must be `#[repr(C)]`, contain no padding with uninitialized bytes, and contain no
pointers or references.
*/
pub unsafe trait CRepr: Copy + 'static {}

unsafe impl CRepr for f32 {}
unsafe impl CRepr for u16 {}
unsafe impl CRepr for u32 {}

/// Views a slice of [CRepr] values as bytes, for upload.
pub fn as_bytes<T: CRepr>(values: &[T]) -> &[u8] {
    //safety: CRepr guarantees a padding-free, pointer-free layout
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values)) }
}

/// One sample of the water surface as the vertex shader sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}
unsafe impl CRepr for WaveVertex {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub tex_transform: [[f32; 4]; 4],
}
unsafe impl CRepr for ObjectConstants {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub mat_transform: [[f32; 4]; 4],
}
unsafe impl CRepr for MaterialConstants {}

/**
Per-frame constants.  Rewritten into every slot on every tick, so they are not dirty-tracked.
*/
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassConstants {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub eye_position: [f32; 3],
    pub total_time: f32,
    pub delta_time: f32,
    pub _pad: [f32; 3],
}
unsafe impl CRepr for PassConstants {}

impl Default for PassConstants {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        PassConstants {
            view: identity,
            proj: identity,
            view_proj: identity,
            eye_position: [0.0; 3],
            total_time: 0.0,
            delta_time: 0.0,
            _pad: [0.0; 3],
        }
    }
}

impl PassConstants {
    /// Builds the constants for one frame; matrices are stored transposed.
    pub fn new(view: Mat4, proj: Mat4, eye: Vec3, total_time: f32, delta_time: f32) -> Self {
        PassConstants {
            view: view.transpose().to_cols_array_2d(),
            proj: proj.transpose().to_cols_array_2d(),
            view_proj: (proj * view).transpose().to_cols_array_2d(),
            eye_position: eye.to_array(),
            total_time,
            delta_time,
            _pad: [0.0; 3],
        }
    }
}

/// Placement of a render item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    pub world: Mat4,
    pub tex_transform: Mat4,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        ObjectTransform {
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
        }
    }
}

impl Replicate for ObjectTransform {
    type Physical = ObjectConstants;
    fn to_physical(&self) -> ObjectConstants {
        ObjectConstants {
            world: self.world.transpose().to_cols_array_2d(),
            tex_transform: self.tex_transform.transpose().to_cols_array_2d(),
        }
    }
}

/// Surface parameters shared by render items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub transform: Mat4,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            transform: Mat4::IDENTITY,
        }
    }
}

impl Material {
    /**
    Scrolls the texture transform by `(du, dv)`, wrapping the translation into `[0,1)`.

    Used to animate flowing surfaces such as water.
    */
    pub fn scroll(&mut self, du: f32, dv: f32) {
        let translation = &mut self.transform.w_axis;
        translation.x = (translation.x + du).rem_euclid(1.0);
        translation.y = (translation.y + dv).rem_euclid(1.0);
    }
}

impl Replicate for Material {
    type Physical = MaterialConstants;
    fn to_physical(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.diffuse_albedo.to_array(),
            fresnel_r0: self.fresnel_r0.to_array(),
            roughness: self.roughness,
            mat_transform: self.transform.transpose().to_cols_array_2d(),
        }
    }
}

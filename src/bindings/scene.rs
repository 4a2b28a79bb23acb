// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The mutable per-object and per-material data a frame needs, plus the render items that tie them
together.

Render items refer to their transform, material and geometry by index.  Materials and geometries
are registered by name while the scene is built; the names are not consulted afterwards.
*/

use crate::bindings::constants::{Material, ObjectTransform};
use crate::bindings::dirty_tracking::{ReplicatedResourceSet, ResourceId, UnknownResource};
use crate::bindings::registry::{Handle, Registry, RegistryError};

pub type ObjectId = ResourceId<ObjectTransform>;
pub type MaterialId = ResourceId<Material>;

/// Static index range a render item draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    /// The vertex buffer comes from the frame slot rather than a static upload.
    pub dynamic: bool,
}

/// Draw ordering bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    AlphaTested,
    Sprites,
    Transparent,
}

/// One draw: which transform, material and index range to use, and when to draw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// Index of the item's transform in every slot's object region.
    pub object: ObjectId,
    /// Index of the material in every slot's material region.
    pub material: MaterialId,
    pub geometry: Handle<Geometry>,
    pub layer: RenderLayer,
}

#[derive(Debug)]
pub struct SceneResources {
    objects: ReplicatedResourceSet<ObjectTransform>,
    materials: ReplicatedResourceSet<Material>,
    material_names: Registry<MaterialId>,
    geometries: Registry<Geometry>,
    items: Vec<RenderItem>,
}

impl SceneResources {
    /// Creates an empty scene whose data is replicated into `replicas` frame slots.
    pub fn new(replicas: usize) -> Self {
        SceneResources {
            objects: ReplicatedResourceSet::new(replicas),
            materials: ReplicatedResourceSet::new(replicas),
            material_names: Registry::new(),
            geometries: Registry::new(),
            items: Vec::new(),
        }
    }

    /// Registers a material under `name`.  It starts dirty in every slot.
    pub fn add_material(&mut self, name: &str, material: Material) -> Result<MaterialId, RegistryError> {
        //check first so a duplicate does not leave an orphaned entry in the set
        if self.material_names.lookup(name).is_ok() {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = self.materials.register(material);
        self.material_names.insert(name, id)?;
        Ok(id)
    }

    pub fn material_named(&self, name: &str) -> Result<MaterialId, RegistryError> {
        self.material_names
            .lookup(name)
            .and_then(|h| self.material_names.get(h).copied())
    }

    pub fn add_geometry(&mut self, name: &str, geometry: Geometry) -> Result<Handle<Geometry>, RegistryError> {
        self.geometries.insert(name, geometry)
    }

    pub fn geometry_named(&self, name: &str) -> Result<Handle<Geometry>, RegistryError> {
        self.geometries.lookup(name)
    }

    /**
    The geometry behind `handle`.

    # Errors
    [RegistryError::ForeignHandle] if `handle` came from another scene.
    */
    pub fn geometry(&self, handle: Handle<Geometry>) -> Result<&Geometry, RegistryError> {
        self.geometries.get(handle)
    }

    /**
    Adds a render item with its own transform.  The item starts dirty in every slot.

    # Errors
    [UnknownResource] if `material` or `geometry` belongs to another scene.  Nothing is added.
    */
    pub fn add_item(
        &mut self,
        transform: ObjectTransform,
        material: MaterialId,
        geometry: Handle<Geometry>,
        layer: RenderLayer,
    ) -> Result<ObjectId, UnknownResource> {
        self.materials.get(material)?;
        self.geometries
            .get(geometry)
            .map_err(|_| UnknownResource {
                index: geometry.index(),
            })?;
        let object = self.objects.register(transform);
        self.items.push(RenderItem {
            object,
            material,
            geometry,
            layer,
        });
        Ok(object)
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn items_in(&self, layer: RenderLayer) -> impl Iterator<Item = &RenderItem> {
        self.items.iter().filter(move |i| i.layer == layer)
    }

    pub fn objects(&self) -> &ReplicatedResourceSet<ObjectTransform> {
        &self.objects
    }
    pub fn objects_mut(&mut self) -> &mut ReplicatedResourceSet<ObjectTransform> {
        &mut self.objects
    }
    pub fn materials(&self) -> &ReplicatedResourceSet<Material> {
        &self.materials
    }
    pub fn materials_mut(&mut self) -> &mut ReplicatedResourceSet<Material> {
        &mut self.materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn quad() -> Geometry {
        Geometry {
            index_count: 6,
            start_index: 0,
            base_vertex: 0,
            dynamic: false,
        }
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn items_reference_by_index() {
        let mut scene = SceneResources::new(3);
        let water = scene.add_material("water", Material::default()).unwrap();
        let grass = scene.add_material("grass", Material::default()).unwrap();
        let geo = scene.add_geometry("quad", quad()).unwrap();
        let a = scene
            .add_item(ObjectTransform::default(), water, geo, RenderLayer::Transparent)
            .unwrap();
        let b = scene
            .add_item(
                ObjectTransform {
                    world: Mat4::from_scale(glam::Vec3::splat(2.0)),
                    ..ObjectTransform::default()
                },
                grass,
                geo,
                RenderLayer::Opaque,
            )
            .unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(scene.material_named("grass"), Ok(grass));
        assert_eq!(scene.items_in(RenderLayer::Opaque).count(), 1);
        assert_eq!(scene.geometry(geo).map(|g| g.index_count), Ok(6));
        assert_eq!(scene.objects().len(), 2);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn duplicate_material_leaves_no_entry() {
        let mut scene = SceneResources::new(3);
        scene.add_material("water", Material::default()).unwrap();
        assert!(scene.add_material("water", Material::default()).is_err());
        assert_eq!(scene.materials().len(), 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn handles_from_another_scene_are_rejected() {
        let mut other = SceneResources::new(3);
        other.add_geometry("quad", quad()).unwrap();
        let foreign = other.add_geometry("strip", quad()).unwrap();

        let mut scene = SceneResources::new(3);
        let water = scene.add_material("water", Material::default()).unwrap();
        scene.add_geometry("quad", quad()).unwrap();
        assert_eq!(
            scene.geometry(foreign),
            Err(RegistryError::ForeignHandle { index: 1 })
        );
        assert_eq!(
            scene.add_item(ObjectTransform::default(), water, foreign, RenderLayer::Opaque),
            Err(UnknownResource { index: 1 })
        );
        assert!(scene.items().is_empty());
        assert!(scene.objects().is_empty());
    }
}

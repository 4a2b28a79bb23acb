// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Build-time registries.

Names are resolved exactly once, while the scene is being assembled.  After that, everything refers
to resources by [Handle], a stable index into an arena, so render items never own or point at the
geometry they draw.

A handle remembers which registry issued it.  Handing it to any other registry is an error, not an
out-of-bounds read of some unrelated value.
*/

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(0);

/// Index of a value in a [Registry].
pub struct Handle<T> {
    index: u32,
    registry: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Position of the value in its registry.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.registry == other.registry
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.registry.hash(state);
    }
}
impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}#{})", self.registry, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("a resource named {0:?} is already registered")]
    DuplicateName(String),
    #[error("no resource named {0:?}")]
    NoSuchName(String),
    #[error("handle {index} was issued by another registry")]
    ForeignHandle { index: usize },
}

/**
An index-addressed arena with an optional name for each value.
*/
#[derive(Debug)]
pub struct Registry<T> {
    values: Vec<T>,
    names: HashMap<String, u32>,
    registry: u32,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            values: Vec::new(),
            names: HashMap::new(),
            registry: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, index: u32) -> Handle<T> {
        Handle {
            index,
            registry: self.registry,
            _marker: PhantomData,
        }
    }

    /// Adds `value` under `name`.  Names are unique within a registry.
    pub fn insert(&mut self, name: &str, value: T) -> Result<Handle<T>, RegistryError> {
        if self.names.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let index = self.values.len() as u32;
        self.values.push(value);
        self.names.insert(name.to_string(), index);
        Ok(self.handle(index))
    }

    pub fn lookup(&self, name: &str) -> Result<Handle<T>, RegistryError> {
        self.names
            .get(name)
            .map(|&index| self.handle(index))
            .ok_or_else(|| RegistryError::NoSuchName(name.to_string()))
    }

    /**
    The value behind `handle`.

    # Errors
    [RegistryError::ForeignHandle] if `handle` was issued by a different registry.
    */
    pub fn get(&self, handle: Handle<T>) -> Result<&T, RegistryError> {
        if handle.registry != self.registry {
            return Err(RegistryError::ForeignHandle {
                index: handle.index(),
            });
        }
        self.values
            .get(handle.index())
            .ok_or(RegistryError::ForeignHandle {
                index: handle.index(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (self.handle(i as u32), v))
    }
}

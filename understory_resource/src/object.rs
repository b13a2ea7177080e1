// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The object tree that resource lookups ascend.
//!
//! Objects are lightweight: a parent link and an optional resources
//! dictionary. The application object is the root and is created with the
//! context. Handles are generation-checked, so a destroyed object reads as
//! dead rather than aliasing a newer one.

use tracing::debug;

use crate::context::ResourceContext;
use crate::dictionary::DictionaryId;
use crate::error::ResourceError;

/// Identifier for an object in a [`ResourceContext`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32, u32);

impl ObjectId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> u32 {
        self.0
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ObjectData {
    pub(crate) parent: Option<ObjectId>,
    pub(crate) resources: Option<DictionaryId>,
}

impl ResourceContext {
    fn object(&self, id: ObjectId) -> Option<&ObjectData> {
        self.objects.get(id.idx(), id.generation())
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData, ResourceError> {
        self.objects
            .get_mut(id.idx(), id.generation())
            .ok_or(ResourceError::HandleNotFound)
    }

    /// The application object at the root of the tree.
    #[must_use]
    #[inline]
    pub fn application(&self) -> ObjectId {
        self.application
    }

    /// Creates an object under `parent`, or a detached root when `parent` is
    /// `None` or dead.
    pub fn create_object(&mut self, parent: Option<ObjectId>) -> ObjectId {
        let parent = parent.filter(|p| self.is_alive(*p));
        let (idx, generation) = self.objects.insert(ObjectData {
            parent,
            resources: None,
        });
        ObjectId::new(idx, generation)
    }

    /// Returns `true` if `id` refers to a live object.
    #[must_use]
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }

    /// Returns the live parent of an object.
    #[must_use]
    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.object(id)
            .and_then(|data| data.parent)
            .filter(|parent| self.is_alive(*parent))
    }

    /// Returns the resources dictionary of an object, if it has a live one.
    #[must_use]
    pub fn resources_of(&self, id: ObjectId) -> Option<DictionaryId> {
        self.object(id)
            .and_then(|data| data.resources)
            .filter(|dict| self.contains_dictionary(*dict))
    }

    /// Destroys an object.
    ///
    /// Children keep their (now dead) parent link and stop ascending there.
    /// The object's resources dictionary survives but loses its owner. The
    /// application object cannot be destroyed.
    ///
    /// Returns `false` if the object was already dead or is the application.
    pub fn destroy_object(&mut self, id: ObjectId) -> bool {
        if id == self.application {
            return false;
        }
        let Some(data) = self.objects.remove(id.idx(), id.generation()) else {
            return false;
        };
        if let Some(dict) = data.resources {
            self.propagate_owner(dict, None);
        }
        debug!(object = ?id, "destroyed object");
        true
    }

    /// Returns `true` if `id` is `root` or one of its descendants.
    #[must_use]
    pub fn is_within(&self, id: ObjectId, root: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(object) = current {
            if object == root {
                return true;
            }
            current = self.parent_of(object);
        }
        false
    }

    /// Moves an object under a new parent.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::HandleNotFound`] if either object is dead.
    /// - [`ResourceError::ObjectCycle`] if `parent` is `id` or one of its
    ///   descendants.
    pub fn reparent_object(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
    ) -> Result<(), ResourceError> {
        if !self.is_alive(id) {
            return Err(ResourceError::HandleNotFound);
        }
        if let Some(parent) = parent {
            if !self.is_alive(parent) {
                return Err(ResourceError::HandleNotFound);
            }
            let mut current = Some(parent);
            while let Some(ancestor) = current {
                if ancestor == id {
                    return Err(ResourceError::ObjectCycle(id));
                }
                current = self.parent_of(ancestor);
            }
        }
        self.object_mut(id)?.parent = parent;
        debug!(object = ?id, parent = ?parent, "reparented object");
        Ok(())
    }

    /// Sets or clears the resources dictionary of an object.
    ///
    /// The dictionary and everything merged into it become owned by the
    /// object. Returns the previous dictionary, which loses its owner.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] if the object or dictionary is stale.
    pub fn set_resources(
        &mut self,
        id: ObjectId,
        resources: Option<DictionaryId>,
    ) -> Result<Option<DictionaryId>, ResourceError> {
        if let Some(dict) = resources {
            self.dictionary(dict)?;
        }
        let previous = core::mem::replace(&mut self.object_mut(id)?.resources, resources);
        if previous == resources {
            return Ok(previous);
        }

        let mut implicit = false;
        if let Some(old) = previous.filter(|d| self.contains_dictionary(*d)) {
            implicit |= self.has_implicit_styles(old);
            self.propagate_owner(old, None);
        }
        if let Some(new) = resources {
            implicit |= self.has_implicit_styles(new);
            self.propagate_owner(new, Some(id));
        }
        if implicit {
            self.events
                .push(crate::ContextEvent::ImplicitStylesInvalidated { owner: id });
        }
        debug!(object = ?id, resources = ?resources, "set resources");
        Ok(previous)
    }
}

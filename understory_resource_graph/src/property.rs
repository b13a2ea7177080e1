// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property identifiers and type registrations.
//!
//! The dependency graph only needs to know what type of value a property
//! accepts, so that a resolved resource of the wrong type can be recorded as
//! [`Validity::InvalidType`](crate::Validity::InvalidType) instead of being
//! pushed into the property.

use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt;

use hashbrown::HashMap;
use understory_resource::ResourceValue;

/// A runtime property identifier.
///
/// # Example
///
/// ```rust
/// use understory_resource_graph::PropertyId;
///
/// let id = PropertyId::new(42);
/// assert_eq!(id.index(), 42);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Creates a property ID from an index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

/// A registered property: its name and value type.
#[derive(Clone, Debug)]
pub struct PropertyRegistration {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl PropertyRegistration {
    /// Returns the property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the property's value type.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the name of the property's value type.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registry of properties that resources can be assigned to.
///
/// # Example
///
/// ```rust
/// use understory_resource::ResourceValue;
/// use understory_resource_graph::PropertyRegistry;
///
/// let mut registry = PropertyRegistry::new();
/// let width = registry.register::<f64>("Width");
///
/// assert_eq!(registry.name(width), Some("Width"));
/// assert!(registry.accepts(width, &ResourceValue::new(10.0_f64)));
/// assert!(!registry.accepts(width, &ResourceValue::new("wide")));
/// ```
#[derive(Default)]
pub struct PropertyRegistry {
    properties: Vec<PropertyRegistration>,
    by_name: HashMap<&'static str, PropertyId>,
}

impl PropertyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a property whose values are of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if a property with the same name is already registered,
    /// or if more than 65,535 properties are registered.
    pub fn register<T: 'static>(&mut self, name: &'static str) -> PropertyId {
        assert!(
            !self.by_name.contains_key(name),
            "Property '{name}' is already registered"
        );
        assert!(
            self.properties.len() < u16::MAX as usize,
            "Too many properties registered (max {})",
            u16::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = PropertyId::new(self.properties.len() as u16);

        self.properties.push(PropertyRegistration {
            name,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        });
        self.by_name.insert(name, id);
        id
    }

    /// Returns the number of registered properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if no properties are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of a property.
    #[must_use]
    pub fn name(&self, id: PropertyId) -> Option<&'static str> {
        self.get(id).map(PropertyRegistration::name)
    }

    /// Returns the registration for a property.
    #[must_use]
    pub fn get(&self, id: PropertyId) -> Option<&PropertyRegistration> {
        self.properties.get(usize::from(id.index()))
    }

    /// Returns `true` if `value` may be assigned to the property.
    ///
    /// Properties that were never registered accept any value.
    #[must_use]
    pub fn accepts(&self, id: PropertyId, value: &ResourceValue) -> bool {
        self.get(id)
            .is_none_or(|registration| registration.type_id == value.type_id())
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("count", &self.properties.len())
            .field(
                "properties",
                &self.properties.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

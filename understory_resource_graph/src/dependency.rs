// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency records.

use understory_resource::{
    DictionaryId, ObjectId, ResolveRequest, ResolveStart, ResourceKey, ResourceValue,
};

use crate::property::PropertyId;

/// How a property refers to a resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Resolved once; re-resolved only when the resource itself changes.
    Static,
    /// Additionally re-resolved whenever the active theme changes.
    Theme,
}

/// Outcome of the most recent resolution of a dependency.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Validity {
    /// The key resolved to a value the property accepts.
    Resolved,
    /// The key did not resolve.
    NotFound,
    /// The key resolved, but the value's type does not fit the property.
    InvalidType,
}

/// A property of a subscriber that resolved a resource key.
///
/// The record carries everything needed to resolve again later: the key,
/// where the lookup started, and the outcome it produced.
#[derive(Clone, Debug)]
pub struct Dependency {
    /// The object whose property holds the resource.
    pub subscriber: ObjectId,
    /// The property holding the resource.
    pub property: PropertyId,
    /// Static or theme reference.
    pub kind: ResourceKind,
    /// The referenced key.
    pub key: ResourceKey,
    /// Where resolution starts.
    pub origin: ResolveStart,
    /// Outcome of the last resolution.
    pub validity: Validity,
    /// The value pushed into the property, if any.
    pub value: Option<ResourceValue>,
    /// The dictionary the last resolution read from.
    pub read_from: Option<DictionaryId>,
}

impl Dependency {
    /// The request that re-resolves this dependency.
    #[must_use]
    pub fn request(&self) -> ResolveRequest {
        ResolveRequest::new(self.key.clone(), self.origin)
    }

    /// The `(subscriber, property)` pair identifying this dependency.
    #[must_use]
    #[inline]
    pub fn id(&self) -> DependencyId {
        DependencyId {
            subscriber: self.subscriber,
            property: self.property,
        }
    }
}

/// Identifies a dependency: each property holds at most one resource reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId {
    /// The subscribing object.
    pub subscriber: ObjectId,
    /// The subscribing property.
    pub property: PropertyId,
}

/// A validity transition of a dependency, reported to tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidityChange {
    /// The dependency that changed.
    pub dependency: DependencyId,
    /// The referenced key.
    pub key: ResourceKey,
    /// Validity before the re-resolution.
    pub from: Validity,
    /// Validity after the re-resolution.
    pub to: Validity,
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live index of resource dependencies.

use alloc::vec::Vec;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::trace;
use understory_resource::{DictionaryId, ObjectId, ResourceKey};

use crate::dependency::{Dependency, DependencyId, ResourceKind};

/// Records which properties resolved which resource keys.
///
/// Registration is a push onto a pending list, so tracking every resolution
/// costs almost nothing. The hashed index is only built when something needs
/// to ask "what uses this key?"; call
/// [`resolve_all_pending`](Self::resolve_all_pending) first. Each property
/// holds at most one reference: registering a property again replaces its
/// earlier record.
///
/// Queries return snapshots, so callers may mutate the graph while walking
/// the result.
///
/// # Example
///
/// ```rust
/// use understory_resource::{ResolveStart, ResourceContext, ResourceKey};
/// use understory_resource_graph::{
///     Dependency, DependencyGraph, PropertyId, ResourceKind, Validity,
/// };
///
/// let mut cx = ResourceContext::new();
/// let button = cx.create_object(Some(cx.application()));
///
/// let mut graph = DependencyGraph::new();
/// graph.register(Dependency {
///     subscriber: button,
///     property: PropertyId::new(0),
///     kind: ResourceKind::Static,
///     key: ResourceKey::named("Accent"),
///     origin: ResolveStart::Object(button),
///     validity: Validity::NotFound,
///     value: None,
///     read_from: None,
/// });
/// assert_eq!(graph.pending_len(), 1);
///
/// graph.resolve_all_pending();
/// assert_eq!(graph.dependents_of_key(&ResourceKey::named("Accent")).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pending: Vec<Dependency>,
    records: HashMap<DependencyId, Dependency>,
    /// Dependencies per key, in registration order.
    by_key: HashMap<ResourceKey, SmallVec<[DependencyId; 4]>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a dependency record.
    pub fn register(&mut self, dependency: Dependency) {
        self.pending.push(dependency);
    }

    /// Number of records not yet moved into the index.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Moves every pending record into the index.
    pub fn resolve_all_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = core::mem::take(&mut self.pending);
        trace!(count = pending.len(), "indexing pending dependencies");
        for dependency in pending {
            let id = dependency.id();
            self.unindex(id);
            self.by_key
                .entry(dependency.key.clone())
                .or_default()
                .push(id);
            self.records.insert(id, dependency);
        }
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns an indexed record.
    #[must_use]
    pub fn get(&self, id: DependencyId) -> Option<&Dependency> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: DependencyId) -> Option<&mut Dependency> {
        self.records.get_mut(&id)
    }

    /// Removes a record, pending or indexed.
    pub fn remove(&mut self, id: DependencyId) -> Option<Dependency> {
        self.pending.retain(|dependency| dependency.id() != id);
        self.unindex(id)
    }

    /// Snapshot of the dependencies on `key`, in registration order.
    #[must_use]
    pub fn dependents_of_key(&self, key: &ResourceKey) -> SmallVec<[DependencyId; 4]> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    /// Snapshot of the dependencies on `key` whose last resolution read from
    /// `dictionary`.
    #[must_use]
    pub fn dependents_of(&self, dictionary: DictionaryId, key: &ResourceKey) -> Vec<DependencyId> {
        self.dependents_of_key(key)
            .into_iter()
            .filter(|id| {
                self.records
                    .get(id)
                    .is_some_and(|dependency| dependency.read_from == Some(dictionary))
            })
            .collect()
    }

    /// Snapshot of every dependency of the given kind.
    #[must_use]
    pub fn dependents_of_kind(&self, kind: ResourceKind) -> Vec<DependencyId> {
        self.dependents_matching(|dependency| dependency.kind == kind)
    }

    /// Snapshot of every indexed dependency accepted by `filter`, sorted.
    pub fn dependents_matching(&self, mut filter: impl FnMut(&Dependency) -> bool) -> Vec<DependencyId> {
        let mut ids: Vec<DependencyId> = self
            .records
            .values()
            .filter(|dependency| filter(dependency))
            .map(Dependency::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drops every record whose subscriber is no longer alive.
    ///
    /// Returns the number of records dropped.
    pub fn evict(&mut self, is_alive: impl Fn(ObjectId) -> bool) -> usize {
        self.pending.retain(|dependency| is_alive(dependency.subscriber));
        let dead: Vec<DependencyId> = self
            .records
            .keys()
            .filter(|id| !is_alive(id.subscriber))
            .copied()
            .collect();
        for &id in &dead {
            self.unindex(id);
        }
        if !dead.is_empty() {
            trace!(count = dead.len(), "evicted dependencies of dead subscribers");
        }
        dead.len()
    }

    fn unindex(&mut self, id: DependencyId) -> Option<Dependency> {
        let previous = self.records.remove(&id)?;
        if let Some(ids) = self.by_key.get_mut(&previous.key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_key.remove(&previous.key);
            }
        }
        Some(previous)
    }
}

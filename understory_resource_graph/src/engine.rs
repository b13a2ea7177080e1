// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tooling façade: resource mutations with dependency cascades.
//!
//! Every successful mutation re-resolves the dependencies it can affect and
//! pushes changed values through a [`PropertySink`]. A value is pushed only
//! when the resolved resource instance or the dependency's validity actually
//! changed, so each affected property sees exactly one update per mutation.

use alloc::vec::Vec;

use tracing::{debug, warn};
use understory_resource::{
    AddOptions, DictionaryId, ObjectId, ResolveRequest, ResolveStart, Resolved, ResourceContext,
    ResourceKey, ResourceValue, Theme,
};

use crate::dependency::{
    Dependency, DependencyId, ResourceKind, Validity, ValidityChange,
};
use crate::error::ToolingError;
use crate::graph::DependencyGraph;
use crate::property::{PropertyId, PropertyRegistry};
use crate::style::{StyleChainTracker, StyleId};

/// Receives the values the engine resolves for subscriber properties.
///
/// This is the only way resolved values leave the engine.
pub trait PropertySink {
    /// Assigns a resolved value to a property.
    fn set_property_value(&mut self, subscriber: ObjectId, property: PropertyId, value: &ResourceValue);

    /// Clears a property whose resource no longer resolves to a usable value.
    fn clear_property_value(&mut self, subscriber: ObjectId, property: PropertyId);
}

/// A resource reference held by a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceReference {
    /// The object holding the reference.
    pub subscriber: ObjectId,
    /// The property holding the reference.
    pub property: PropertyId,
    /// The referenced key.
    pub key: ResourceKey,
    /// Static or theme reference.
    pub kind: ResourceKind,
    /// Where resolution starts; the subscriber itself unless changed.
    pub origin: ResolveStart,
}

impl ResourceReference {
    /// A reference resolved from the subscriber.
    #[must_use]
    pub fn new(subscriber: ObjectId, property: PropertyId, key: ResourceKey, kind: ResourceKind) -> Self {
        Self {
            subscriber,
            property,
            key,
            kind,
            origin: ResolveStart::Object(subscriber),
        }
    }

    /// Resolves from `origin` instead of the subscriber.
    #[must_use]
    pub fn origin(mut self, origin: ResolveStart) -> Self {
        self.origin = origin;
        self
    }
}

/// Resources, dependencies, and styles driven together.
///
/// # Example
///
/// ```rust
/// use understory_resource::{ObjectId, ResourceContext, ResourceKey, ResourceValue};
/// use understory_resource_graph::{
///     PropertyId, PropertySink, ResourceEngine, ResourceKind, ResourceReference, Validity,
/// };
///
/// #[derive(Default)]
/// struct Log(Vec<(ObjectId, PropertyId, Option<u32>)>);
///
/// impl PropertySink for Log {
///     fn set_property_value(&mut self, s: ObjectId, p: PropertyId, v: &ResourceValue) {
///         self.0.push((s, p, v.downcast_ref::<u32>().copied()));
///     }
///     fn clear_property_value(&mut self, s: ObjectId, p: PropertyId) {
///         self.0.push((s, p, None));
///     }
/// }
///
/// let mut engine = ResourceEngine::new(ResourceContext::new());
/// let fill = engine.properties_mut().register::<u32>("Fill");
///
/// let cx = engine.context_mut();
/// let app = cx.create_dictionary();
/// cx.set_resources(cx.application(), Some(app)).unwrap();
/// let button = cx.create_object(Some(cx.application()));
///
/// let mut log = Log::default();
/// let accent = ResourceKey::named("Accent");
/// let reference = ResourceReference::new(button, fill, accent.clone(), ResourceKind::Static);
/// assert_eq!(engine.resolve_resource(&mut log, reference), Ok(Validity::NotFound));
///
/// engine
///     .add_dictionary_item(&mut log, app, accent, ResourceValue::new(7_u32))
///     .unwrap();
/// assert_eq!(log.0.last(), Some(&(button, fill, Some(7))));
/// ```
#[derive(Debug)]
pub struct ResourceEngine {
    context: ResourceContext,
    graph: DependencyGraph,
    properties: PropertyRegistry,
    styles: StyleChainTracker,
    changes: Vec<ValidityChange>,
}

impl ResourceEngine {
    /// Wraps a resource context.
    #[must_use]
    pub fn new(context: ResourceContext) -> Self {
        Self {
            context,
            graph: DependencyGraph::new(),
            properties: PropertyRegistry::new(),
            styles: StyleChainTracker::new(),
            changes: Vec::new(),
        }
    }

    /// The resource context.
    #[must_use]
    pub fn context(&self) -> &ResourceContext {
        &self.context
    }

    /// Mutable access to the resource context.
    ///
    /// Mutations made here bypass dependency cascades; use the engine's own
    /// mutation methods when dependents must be updated.
    pub fn context_mut(&mut self) -> &mut ResourceContext {
        &mut self.context
    }

    /// The dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The dependency graph with every pending record indexed.
    pub fn indexed_graph(&mut self) -> &DependencyGraph {
        self.graph.resolve_all_pending();
        &self.graph
    }

    /// The property registry.
    #[must_use]
    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    /// Mutable access to the property registry.
    pub fn properties_mut(&mut self) -> &mut PropertyRegistry {
        &mut self.properties
    }

    /// The style chain tracker.
    #[must_use]
    pub fn styles(&self) -> &StyleChainTracker {
        &self.styles
    }

    /// Mutable access to the style chain tracker.
    pub fn styles_mut(&mut self) -> &mut StyleChainTracker {
        &mut self.styles
    }

    /// Drains the validity transitions recorded since the last call.
    pub fn take_validity_changes(&mut self) -> Vec<ValidityChange> {
        core::mem::take(&mut self.changes)
    }

    /// Resolves a reference, pushes the outcome into the property, and
    /// records the dependency.
    ///
    /// A value whose type the property does not accept is not pushed; the
    /// dependency is recorded as [`Validity::InvalidType`] and the property is
    /// cleared.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] if the subscriber is not alive.
    pub fn resolve_resource(
        &mut self,
        sink: &mut dyn PropertySink,
        reference: ResourceReference,
    ) -> Result<Validity, ToolingError> {
        if !self.context.is_alive(reference.subscriber) {
            return Err(ToolingError::HandleNotFound);
        }
        let request = ResolveRequest::new(reference.key.clone(), reference.origin);
        let resolved = self.context.resolve(&request);
        let (validity, value) = self.classify(reference.property, resolved.as_ref());
        if validity == Validity::InvalidType {
            warn!(
                subscriber = ?reference.subscriber,
                property = ?reference.property,
                key = %reference.key,
                "resource has the wrong type for its property"
            );
        }
        match &value {
            Some(value) => sink.set_property_value(reference.subscriber, reference.property, value),
            None => sink.clear_property_value(reference.subscriber, reference.property),
        }
        self.graph.register(Dependency {
            subscriber: reference.subscriber,
            property: reference.property,
            kind: reference.kind,
            key: reference.key,
            origin: reference.origin,
            validity,
            value,
            read_from: resolved.map(|found| found.dictionary),
        });
        Ok(validity)
    }

    /// Re-resolves every dependency on `key` after `key` changed in `dictionary`.
    ///
    /// Dependents whose resolution is unaffected receive nothing; dependents
    /// of dead subscribers met on the way are dropped. Style setters backed
    /// by `key` are re-resolved as well, after dropping those whose origin is
    /// gone. Returns the number of properties updated.
    pub fn on_resource_changed(
        &mut self,
        sink: &mut dyn PropertySink,
        dictionary: DictionaryId,
        key: &ResourceKey,
    ) -> usize {
        self.graph.resolve_all_pending();
        let dependents = self.graph.dependents_of_key(key);
        let mut pushed = self.refresh_all(sink, dependents);
        pushed += self.refresh_extensions(sink, key);
        debug!(dictionary = ?dictionary, key = %key, pushed, "resource changed");
        pushed
    }

    /// Adds or replaces a dictionary entry, then cascades.
    ///
    /// Returns the number of properties updated.
    ///
    /// # Errors
    ///
    /// The dictionary's rejection, mapped through [`ToolingError::from`].
    pub fn add_dictionary_item(
        &mut self,
        sink: &mut dyn PropertySink,
        dictionary: DictionaryId,
        key: ResourceKey,
        value: ResourceValue,
    ) -> Result<usize, ToolingError> {
        self.context
            .add(dictionary, key.clone(), value, AddOptions::default())?;
        Ok(self.on_resource_changed(sink, dictionary, &key))
    }

    /// Removes a dictionary entry, then cascades.
    ///
    /// # Errors
    ///
    /// [`ToolingError::NotFound`] if the key is absent, otherwise the
    /// dictionary's rejection.
    pub fn remove_dictionary_item(
        &mut self,
        sink: &mut dyn PropertySink,
        dictionary: DictionaryId,
        key: &ResourceKey,
    ) -> Result<usize, ToolingError> {
        self.context.remove(dictionary, key)?;
        Ok(self.on_resource_changed(sink, dictionary, key))
    }

    /// Replaces the value of an existing entry, then cascades.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] for a stale dictionary,
    /// [`ToolingError::NotFound`] if the key is absent.
    pub fn replace_resource(
        &mut self,
        sink: &mut dyn PropertySink,
        dictionary: DictionaryId,
        key: ResourceKey,
        value: ResourceValue,
    ) -> Result<usize, ToolingError> {
        if !self.context.contains_dictionary(dictionary) {
            return Err(ToolingError::HandleNotFound);
        }
        if !self.context.contains_key(dictionary, &key) {
            return Err(ToolingError::NotFound);
        }
        self.add_dictionary_item(sink, dictionary, key, value)
    }

    /// Inserts a merged dictionary and replays the keys it shadows.
    ///
    /// Each tracked key defined below `child` is resolved from `parent` before
    /// and after the insert; only keys whose winning value changed are
    /// replayed. Inserting at a position that does not win changes nothing.
    ///
    /// # Errors
    ///
    /// The collection's rejection, e.g. a cycle; nothing is changed then.
    pub fn insert_merged_dictionary(
        &mut self,
        sink: &mut dyn PropertySink,
        parent: DictionaryId,
        index: usize,
        child: DictionaryId,
    ) -> Result<usize, ToolingError> {
        if !self.context.contains_dictionary(parent) || !self.context.contains_dictionary(child) {
            return Err(ToolingError::HandleNotFound);
        }
        self.graph.resolve_all_pending();
        let tracked: Vec<ResourceKey> = self
            .context
            .subtree_keys(child)
            .into_iter()
            .filter(|key| !self.graph.dependents_of_key(key).is_empty())
            .collect();
        let mut before = Vec::with_capacity(tracked.len());
        for key in &tracked {
            before.push(self.probe(parent, key, Some(child)));
        }

        self.context.insert_merged(parent, index, child)?;

        let mut pushed = 0;
        for (key, before) in tracked.iter().zip(before) {
            let after = self.probe(parent, key, None);
            if !ResourceValue::same(before.as_ref(), after.as_ref()) {
                pushed += self.on_resource_changed(sink, parent, key);
            }
        }
        debug!(parent = ?parent, child = ?child, index, pushed, "inserted merged dictionary");
        Ok(pushed)
    }

    /// Removes a merged dictionary and replays every tracked key it defined.
    ///
    /// # Errors
    ///
    /// [`ToolingError::NotFound`] if `child` is not merged into `parent`,
    /// otherwise the collection's rejection.
    pub fn remove_merged_dictionary(
        &mut self,
        sink: &mut dyn PropertySink,
        parent: DictionaryId,
        child: DictionaryId,
    ) -> Result<usize, ToolingError> {
        let keys = self.context.subtree_keys(child);
        if !self.context.remove_merged(parent, child)? {
            return Err(ToolingError::NotFound);
        }
        self.graph.resolve_all_pending();
        let mut pushed = 0;
        for key in &keys {
            if !self.graph.dependents_of_key(key).is_empty() {
                pushed += self.on_resource_changed(sink, parent, key);
            }
        }
        debug!(parent = ?parent, child = ?child, pushed, "removed merged dictionary");
        Ok(pushed)
    }

    /// Moves an object under a new parent and re-resolves every dependency
    /// whose ascent passes through it.
    ///
    /// Returns the number of properties updated.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] for a dead object or parent,
    /// [`ToolingError::InvalidArgument`] if the move would create a cycle.
    pub fn reparent_object(
        &mut self,
        sink: &mut dyn PropertySink,
        object: ObjectId,
        parent: Option<ObjectId>,
    ) -> Result<usize, ToolingError> {
        self.context.reparent_object(object, parent)?;
        let affected = self.dependents_below(object);
        let pushed = self.refresh_all(sink, affected);
        debug!(object = ?object, parent = ?parent, pushed, "replayed reparented subtree");
        Ok(pushed)
    }

    /// Sets or clears an object's resources dictionary and re-resolves every
    /// dependency that searched, or now searches, through that object.
    ///
    /// Returns the number of properties updated.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] if the object or dictionary is stale.
    pub fn set_resources(
        &mut self,
        sink: &mut dyn PropertySink,
        object: ObjectId,
        resources: Option<DictionaryId>,
    ) -> Result<usize, ToolingError> {
        if !self.context.is_alive(object) {
            return Err(ToolingError::HandleNotFound);
        }
        // Dependencies anchored on the old dictionary lose their owner below.
        let mut affected = self.dependents_below(object);
        self.context.set_resources(object, resources)?;
        affected.extend(self.dependents_below(object));
        affected.sort_unstable();
        affected.dedup();
        let pushed = self.refresh_all(sink, affected);
        debug!(object = ?object, resources = ?resources, pushed, "replayed resources change");
        Ok(pushed)
    }

    /// Switches the theme and re-resolves every theme reference.
    ///
    /// Static references keep their values. Returns the number of properties
    /// updated.
    pub fn set_theme(&mut self, sink: &mut dyn PropertySink, theme: Theme) -> usize {
        if !self.context.set_theme(theme) {
            return 0;
        }
        self.graph.resolve_all_pending();
        let context = &self.context;
        self.graph.evict(|object| context.is_alive(object));

        let themed = self.graph.dependents_of_kind(ResourceKind::Theme);
        let pushed = self.refresh_all(sink, themed);
        debug!(theme = ?self.context.theme(), pushed, "replayed theme references");
        pushed
    }

    /// Re-resolves one dependency from its record alone.
    ///
    /// # Errors
    ///
    /// [`ToolingError::NotFound`] if no such dependency is recorded.
    pub fn revalidate(
        &mut self,
        sink: &mut dyn PropertySink,
        id: DependencyId,
    ) -> Result<Validity, ToolingError> {
        self.graph.resolve_all_pending();
        self.refresh(sink, id);
        self.graph
            .get(id)
            .map(|dependency| dependency.validity)
            .ok_or(ToolingError::NotFound)
    }

    /// Changes a style's `BasedOn` and pushes the new effective style value of
    /// every property that may have moved.
    ///
    /// Properties holding a resource reference of their own are skipped:
    /// their local value outranks any style.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] or [`ToolingError::StyleCycle`].
    pub fn set_style_based_on(
        &mut self,
        sink: &mut dyn PropertySink,
        style: StyleId,
        based_on: Option<StyleId>,
    ) -> Result<Vec<DependencyId>, ToolingError> {
        let context = &self.context;
        self.styles.evict(|object| context.is_alive(object));
        let moved = self.styles.set_based_on(style, based_on)?;

        self.graph.resolve_all_pending();
        for id in &moved {
            if self.graph.get(*id).is_none() {
                self.push_style_value(sink, id.subscriber, id.property);
            }
        }
        Ok(moved)
    }

    /// Sets a style setter's value after the resource behind it changed, and
    /// pushes the new effective value to every object whose value moved.
    ///
    /// Returns the number of properties updated.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] if `style` is unknown.
    pub fn on_extension_value_changed(
        &mut self,
        sink: &mut dyn PropertySink,
        style: StyleId,
        property: PropertyId,
        value: Option<ResourceValue>,
    ) -> Result<usize, ToolingError> {
        let consumers = self.styles.consumers_of_style(style);
        let previous: Vec<Option<ResourceValue>> = consumers
            .iter()
            .map(|&object| {
                self.styles
                    .effective_value(object, property)
                    .map(|(_, value)| value.clone())
            })
            .collect();
        self.styles.set_setter(style, property, value)?;

        self.graph.resolve_all_pending();
        let mut pushed = 0;
        for (object, previous) in consumers.into_iter().zip(previous) {
            let id = DependencyId {
                subscriber: object,
                property,
            };
            if !self.context.is_alive(object) || self.graph.get(id).is_some() {
                continue;
            }
            let current = self
                .styles
                .effective_value(object, property)
                .map(|(_, value)| value);
            if ResourceValue::same(previous.as_ref(), current) {
                continue;
            }
            match current {
                Some(value) => sink.set_property_value(object, property, value),
                None => sink.clear_property_value(object, property),
            }
            pushed += 1;
        }
        Ok(pushed)
    }

    fn refresh_extensions(&mut self, sink: &mut dyn PropertySink, key: &ResourceKey) -> usize {
        let context = &self.context;
        self.styles
            .evict_extension_targets(key, |origin| origin_is_live(context, origin));
        let mut pushed = 0;
        for target in self.styles.extension_targets(key) {
            let request = ResolveRequest::new(key.clone(), target.origin);
            let value = self.context.resolve(&request).map(|found| found.value);
            let current = self.styles.setter(target.style, target.property);
            if ResourceValue::same(current, value.as_ref()) {
                continue;
            }
            pushed += self
                .on_extension_value_changed(sink, target.style, target.property, value)
                .unwrap_or(0);
        }
        pushed
    }

    fn push_style_value(&self, sink: &mut dyn PropertySink, object: ObjectId, property: PropertyId) {
        match self.styles.effective_value(object, property) {
            Some((_, value)) => sink.set_property_value(object, property, value),
            None => sink.clear_property_value(object, property),
        }
    }

    /// Indexed dependencies whose subscriber or search origin lies in the
    /// subtree of `root`.
    fn dependents_below(&mut self, root: ObjectId) -> Vec<DependencyId> {
        self.graph.resolve_all_pending();
        let context = &self.context;
        self.graph.dependents_matching(|dependency| {
            let anchor = match dependency.origin {
                ResolveStart::Object(object) => Some(object),
                ResolveStart::Dictionary(dictionary) => context.owner_of(dictionary),
            };
            context.is_within(dependency.subscriber, root)
                || anchor.is_some_and(|object| context.is_within(object, root))
        })
    }

    fn refresh_all(&mut self, sink: &mut dyn PropertySink, ids: impl IntoIterator<Item = DependencyId>) -> usize {
        let mut pushed = 0;
        for id in ids {
            if self.refresh(sink, id) {
                pushed += 1;
            }
        }
        pushed
    }

    fn probe(&mut self, parent: DictionaryId, key: &ResourceKey, skip: Option<DictionaryId>) -> Option<ResourceValue> {
        let mut request = ResolveRequest::new(key.clone(), ResolveStart::Dictionary(parent));
        request.skip = skip;
        self.context.resolve(&request).map(|found| found.value)
    }

    fn classify(
        &self,
        property: PropertyId,
        resolved: Option<&Resolved>,
    ) -> (Validity, Option<ResourceValue>) {
        match resolved {
            None => (Validity::NotFound, None),
            Some(found) if self.properties.accepts(property, &found.value) => {
                (Validity::Resolved, Some(found.value.clone()))
            }
            Some(_) => (Validity::InvalidType, None),
        }
    }

    /// Re-resolves one indexed dependency; returns `true` if a value was pushed.
    fn refresh(&mut self, sink: &mut dyn PropertySink, id: DependencyId) -> bool {
        if !self.context.is_alive(id.subscriber) {
            self.graph.remove(id);
            return false;
        }
        let Some(request) = self.graph.get(id).map(Dependency::request) else {
            return false;
        };
        let resolved = self.context.resolve(&request);
        let (validity, value) = self.classify(id.property, resolved.as_ref());
        let Some(dependency) = self.graph.get_mut(id) else {
            return false;
        };

        let previous = dependency.validity;
        let changed =
            previous != validity || !ResourceValue::same(dependency.value.as_ref(), value.as_ref());
        dependency.validity = validity;
        dependency.value.clone_from(&value);
        dependency.read_from = resolved.map(|found| found.dictionary);

        if previous != validity {
            if validity == Validity::InvalidType {
                warn!(dependency = ?id, key = %dependency.key, "resource has the wrong type for its property");
            }
            self.changes.push(ValidityChange {
                dependency: id,
                key: dependency.key.clone(),
                from: previous,
                to: validity,
            });
        }
        if !changed {
            return false;
        }
        match &value {
            Some(value) => sink.set_property_value(id.subscriber, id.property, value),
            None => sink.clear_property_value(id.subscriber, id.property),
        }
        true
    }
}

fn origin_is_live(context: &ResourceContext, origin: ResolveStart) -> bool {
    match origin {
        ResolveStart::Object(object) => context.is_alive(object),
        ResolveStart::Dictionary(dictionary) => context.contains_dictionary(dictionary),
    }
}

impl Default for ResourceEngine {
    fn default() -> Self {
        Self::new(ResourceContext::new())
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Style `BasedOn` chains and the properties that move when a chain changes.
//!
//! A style holds setters and may be based on another style. An object uses
//! up to two chains: its explicit style and its built-in (template) style.
//! The effective setter for a property is the first one found walking the
//! explicit chain, then the built-in chain.
//!
//! Changing a style's `BasedOn` does not change any dictionary entry, but it
//! can change which setter wins for every object using a chain through that
//! style. [`StyleChainTracker::set_based_on`] reports exactly those
//! `(object, property)` pairs.

use alloc::vec::Vec;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use understory_resource::{ObjectId, ResolveStart, ResourceKey, ResourceValue};

use crate::dependency::DependencyId;
use crate::error::ToolingError;
use crate::property::PropertyId;

/// Identifier for a style in a [`StyleChainTracker`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(u32);

/// Where a property's effective value comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Set directly on the object.
    Local,
    /// A setter in the object's explicit style chain.
    Style,
    /// A setter in the object's built-in style chain.
    BuiltInStyle,
    /// A theme resource reference.
    Theme,
    /// The property's default value.
    Default,
}

/// The styles an object uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStyles {
    /// The style set on the object or found as its implicit style.
    pub explicit: Option<StyleId>,
    /// The style supplied by the object's control template.
    pub built_in: Option<StyleId>,
}

/// A style setter whose value comes from a resource reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionTarget {
    /// The style holding the setter.
    pub style: StyleId,
    /// The property the setter targets.
    pub property: PropertyId,
    /// Where the reference is resolved from.
    pub origin: ResolveStart,
}

#[derive(Clone, Debug, Default)]
struct StyleData {
    /// Sorted by property.
    setters: SmallVec<[(PropertyId, ResourceValue); 8]>,
    based_on: Option<StyleId>,
}

impl StyleData {
    fn setter(&self, property: PropertyId) -> Option<&ResourceValue> {
        self.setters
            .binary_search_by_key(&property, |(p, _)| *p)
            .ok()
            .map(|idx| &self.setters[idx].1)
    }

    fn defines(&self, property: PropertyId) -> bool {
        self.setter(property).is_some()
    }
}

/// Tracks styles, their `BasedOn` links, and the objects using them.
#[derive(Debug, Default)]
pub struct StyleChainTracker {
    styles: Vec<StyleData>,
    consumers: HashMap<ObjectId, ConsumerStyles>,
    extensions: HashMap<ResourceKey, SmallVec<[ExtensionTarget; 2]>>,
}

impl StyleChainTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn style(&self, id: StyleId) -> Option<&StyleData> {
        self.styles.get(id.0 as usize)
    }

    fn style_mut(&mut self, id: StyleId) -> Result<&mut StyleData, ToolingError> {
        self.styles
            .get_mut(id.0 as usize)
            .ok_or(ToolingError::HandleNotFound)
    }

    /// Creates a style without setters.
    pub fn create_style(&mut self) -> StyleId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "more than u32::MAX styles is not supported"
        )]
        let id = StyleId(self.styles.len() as u32);
        self.styles.push(StyleData::default());
        id
    }

    /// Sets or removes a setter on a style.
    ///
    /// # Errors
    ///
    /// [`ToolingError::HandleNotFound`] if `style` is unknown.
    pub fn set_setter(
        &mut self,
        style: StyleId,
        property: PropertyId,
        value: Option<ResourceValue>,
    ) -> Result<(), ToolingError> {
        let data = self.style_mut(style)?;
        match (data.setters.binary_search_by_key(&property, |(p, _)| *p), value) {
            (Ok(idx), Some(value)) => data.setters[idx].1 = value,
            (Ok(idx), None) => {
                data.setters.remove(idx);
            }
            (Err(idx), Some(value)) => data.setters.insert(idx, (property, value)),
            (Err(_), None) => {}
        }
        Ok(())
    }

    /// Returns the value a style sets directly for a property.
    #[must_use]
    pub fn setter(&self, style: StyleId, property: PropertyId) -> Option<&ResourceValue> {
        self.style(style).and_then(|data| data.setter(property))
    }

    /// Returns the style a style is based on.
    #[must_use]
    pub fn based_on(&self, style: StyleId) -> Option<StyleId> {
        self.style(style).and_then(|data| data.based_on)
    }

    /// Properties a style defines directly, in property order.
    #[must_use]
    pub fn direct_properties(&self, style: StyleId) -> SmallVec<[PropertyId; 8]> {
        self.style(style)
            .map(|data| data.setters.iter().map(|(p, _)| *p).collect())
            .unwrap_or_default()
    }

    /// Records which styles an object uses.
    pub fn set_consumer_styles(&mut self, object: ObjectId, styles: ConsumerStyles) {
        if styles == ConsumerStyles::default() {
            self.consumers.remove(&object);
        } else {
            self.consumers.insert(object, styles);
        }
    }

    /// Returns the styles an object uses.
    #[must_use]
    pub fn consumer_styles(&self, object: ObjectId) -> ConsumerStyles {
        self.consumers.get(&object).copied().unwrap_or_default()
    }

    /// Drops consumers that are no longer alive.
    pub fn evict(&mut self, is_alive: impl Fn(ObjectId) -> bool) {
        self.consumers.retain(|object, _| is_alive(*object));
    }

    /// Changes the style a style is based on.
    ///
    /// Returns every `(object, property)` whose effective setter may have
    /// moved: for each object using a chain through `style`, each property
    /// defined directly by the old or the new base (listed once), unless
    /// `style` or a style before it on the object's chain defines it. The
    /// result is sorted.
    ///
    /// # Errors
    ///
    /// - [`ToolingError::HandleNotFound`] if either style is unknown.
    /// - [`ToolingError::StyleCycle`] if `style` is reachable from `based_on`.
    pub fn set_based_on(
        &mut self,
        style: StyleId,
        based_on: Option<StyleId>,
    ) -> Result<Vec<DependencyId>, ToolingError> {
        let old = self.style(style).ok_or(ToolingError::HandleNotFound)?.based_on;
        if let Some(base) = based_on {
            self.style(base).ok_or(ToolingError::HandleNotFound)?;
            if self.chain(base).contains(&style) {
                warn!(style = ?style, based_on = ?base, "BasedOn rejected: cycle");
                return Err(ToolingError::StyleCycle(style));
            }
        }
        if old == based_on {
            return Ok(Vec::new());
        }

        let mut properties: SmallVec<[PropertyId; 8]> = SmallVec::new();
        for base in old.into_iter().chain(based_on) {
            for property in self.direct_properties(base) {
                if !properties.contains(&property) {
                    properties.push(property);
                }
            }
        }

        let mut moved = Vec::new();
        for (&object, styles) in &self.consumers {
            for start in [styles.explicit, styles.built_in].into_iter().flatten() {
                let Some(prefix) = self.prefix_to(start, style) else {
                    continue;
                };
                for &property in &properties {
                    let shadowed = prefix
                        .iter()
                        .any(|s| self.style(*s).is_some_and(|data| data.defines(property)));
                    let id = DependencyId {
                        subscriber: object,
                        property,
                    };
                    if !shadowed && !moved.contains(&id) {
                        moved.push(id);
                    }
                }
            }
        }
        moved.sort_unstable();

        self.style_mut(style)?.based_on = based_on;
        debug!(style = ?style, from = ?old, to = ?based_on, moved = moved.len(), "BasedOn changed");
        Ok(moved)
    }

    /// The first setter for `property` on the chain starting at `style`.
    #[must_use]
    pub fn effective_setter(
        &self,
        style: StyleId,
        property: PropertyId,
    ) -> Option<(StyleId, &ResourceValue)> {
        self.chain(style).into_iter().find_map(|s| {
            self.style(s)
                .and_then(|data| data.setter(property))
                .map(|value| (s, value))
        })
    }

    /// The effective style value of a property for an object and its source.
    #[must_use]
    pub fn effective_value(
        &self,
        object: ObjectId,
        property: PropertyId,
    ) -> Option<(ValueSource, &ResourceValue)> {
        let styles = self.consumer_styles(object);
        if let Some((_, value)) = styles
            .explicit
            .and_then(|style| self.effective_setter(style, property))
        {
            return Some((ValueSource::Style, value));
        }
        styles
            .built_in
            .and_then(|style| self.effective_setter(style, property))
            .map(|(_, value)| (ValueSource::BuiltInStyle, value))
    }

    /// Corrects a reported value source.
    ///
    /// A value reported as coming from [`ValueSource::Style`] is checked
    /// against the object's explicit chain; if only the built-in chain
    /// defines the property, the source is [`ValueSource::BuiltInStyle`].
    /// Other sources are returned unchanged.
    #[must_use]
    pub fn rederive_source(
        &self,
        object: ObjectId,
        property: PropertyId,
        reported: ValueSource,
    ) -> ValueSource {
        if reported != ValueSource::Style {
            return reported;
        }
        match self.effective_value(object, property) {
            Some((source, _)) => source,
            None => reported,
        }
    }

    /// Records that a setter's value comes from resolving `key`.
    pub fn register_extension_target(&mut self, key: ResourceKey, target: ExtensionTarget) {
        let targets = self.extensions.entry(key).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Forgets that a setter's value comes from resolving `key`.
    ///
    /// Returns `false` if the target was not registered.
    pub fn unregister_extension_target(&mut self, key: &ResourceKey, target: &ExtensionTarget) -> bool {
        let Some(targets) = self.extensions.get_mut(key) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|other| *other != *target);
        let removed = targets.len() != before;
        if targets.is_empty() {
            self.extensions.remove(key);
        }
        removed
    }

    /// Drops the targets on `key` whose origin is gone.
    ///
    /// Returns the number of targets dropped.
    pub fn evict_extension_targets(
        &mut self,
        key: &ResourceKey,
        is_live: impl Fn(ResolveStart) -> bool,
    ) -> usize {
        let Some(targets) = self.extensions.get_mut(key) else {
            return 0;
        };
        let before = targets.len();
        targets.retain(|target| is_live(target.origin));
        let dropped = before - targets.len();
        if targets.is_empty() {
            self.extensions.remove(key);
        }
        if dropped > 0 {
            trace!(key = %key, dropped, "evicted extension targets with dead origins");
        }
        dropped
    }

    /// Snapshot of the setters backed by `key`.
    #[must_use]
    pub fn extension_targets(&self, key: &ResourceKey) -> SmallVec<[ExtensionTarget; 2]> {
        self.extensions.get(key).cloned().unwrap_or_default()
    }

    /// Objects whose effective setter for `property` is the one on `style`.
    #[must_use]
    pub fn consumers_of_setter(&self, style: StyleId, property: PropertyId) -> Vec<ObjectId> {
        let mut objects: Vec<ObjectId> = self
            .consumers
            .iter()
            .filter(|(_, styles)| {
                let explicit = styles
                    .explicit
                    .and_then(|s| self.effective_setter(s, property));
                let winner = explicit.or_else(|| {
                    styles
                        .built_in
                        .and_then(|s| self.effective_setter(s, property))
                });
                winner.is_some_and(|(s, _)| s == style)
            })
            .map(|(object, _)| *object)
            .collect();
        objects.sort_unstable();
        objects
    }

    /// Objects using a chain that passes through `style`.
    #[must_use]
    pub fn consumers_of_style(&self, style: StyleId) -> Vec<ObjectId> {
        let mut objects: Vec<ObjectId> = self
            .consumers
            .iter()
            .filter(|(_, styles)| {
                [styles.explicit, styles.built_in]
                    .into_iter()
                    .flatten()
                    .any(|start| self.chain(start).contains(&style))
            })
            .map(|(object, _)| *object)
            .collect();
        objects.sort_unstable();
        objects
    }

    /// `style` followed by its `BasedOn` ancestors; stops at a repeat.
    fn chain(&self, style: StyleId) -> SmallVec<[StyleId; 8]> {
        let mut chain: SmallVec<[StyleId; 8]> = SmallVec::new();
        let mut current = Some(style);
        while let Some(s) = current {
            if chain.contains(&s) || self.style(s).is_none() {
                break;
            }
            chain.push(s);
            current = self.based_on(s);
        }
        chain
    }

    /// The chain from `start` up to and including `target`, or `None` if
    /// `target` is not on that chain.
    fn prefix_to(&self, start: StyleId, target: StyleId) -> Option<SmallVec<[StyleId; 8]>> {
        let mut chain = self.chain(start);
        let pos = chain.iter().position(|s| *s == target)?;
        chain.truncate(pos + 1);
        Some(chain)
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key resolution across dictionaries, objects, and themes.
//!
//! ## Search order
//!
//! Within one dictionary (the *local* search):
//!
//! 1. The override slot for the key.
//! 2. The not-found cache: a recorded miss ends the local search.
//! 3. The dictionary's own entries, materializing a deferred entry if needed.
//! 4. Merged dictionaries, last to first, each searched locally.
//! 5. The active theme dictionary, then the fallback theme dictionary.
//! 6. On a miss covering the whole local subtree, the key is cached as missing.
//!
//! A full resolution searches the starting dictionary, then ascends the object
//! tree searching each ancestor's resources, and finally searches the global
//! theme resources.

use smallvec::SmallVec;
use tracing::trace;

use crate::context::ResourceContext;
use crate::dictionary::{Deferred, DictionaryId};
use crate::key::ResourceKey;
use crate::object::ObjectId;
use crate::scope::LookupScope;
use crate::value::ResourceValue;

/// Where a resolution starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolveStart {
    /// A dictionary; ascent continues from its owning object.
    Dictionary(DictionaryId),
    /// An object; its resources are searched first, then its ancestors'.
    Object(ObjectId),
}

/// A resolution request.
///
/// # Example
///
/// ```rust
/// use understory_resource::{
///     AddOptions, LookupScope, ResolveRequest, ResolveStart, ResourceContext, ResourceKey,
///     ResourceValue,
/// };
///
/// let mut cx = ResourceContext::new();
/// let app_resources = cx.create_dictionary();
/// cx.set_resources(cx.application(), Some(app_resources)).unwrap();
/// cx.add(
///     app_resources,
///     ResourceKey::named("Accent"),
///     ResourceValue::new(0x0078D4_u32),
///     AddOptions::default(),
/// )
/// .unwrap();
///
/// let button = cx.create_object(Some(cx.application()));
/// let request = ResolveRequest::new(ResourceKey::named("Accent"), ResolveStart::Object(button));
/// let found = cx.resolve(&request).unwrap();
/// assert_eq!(found.dictionary, app_resources);
///
/// // Without ascent the button's own (absent) resources are all that is searched.
/// let local = request.clone().ascend(false).scope(LookupScope::LOCAL_ONLY);
/// assert!(cx.resolve(&local).is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveRequest {
    /// The key to resolve.
    pub key: ResourceKey,
    /// Which parts of each dictionary are searched.
    pub scope: LookupScope,
    /// Where the search starts.
    pub start: ResolveStart,
    /// Whether to ascend the object tree past the starting point.
    pub ascend: bool,
    /// A dictionary excluded from the search, e.g. the one being replaced.
    pub skip: Option<DictionaryId>,
}

impl ResolveRequest {
    /// A full-scope, ascending request.
    #[must_use]
    pub fn new(key: ResourceKey, start: ResolveStart) -> Self {
        Self {
            key,
            scope: LookupScope::ALL,
            start,
            ascend: true,
            skip: None,
        }
    }

    /// Sets the lookup scope.
    #[must_use]
    pub fn scope(mut self, scope: LookupScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets whether the object tree is ascended.
    #[must_use]
    pub fn ascend(mut self, ascend: bool) -> Self {
        self.ascend = ascend;
        self
    }

    /// Excludes a dictionary from the search.
    #[must_use]
    pub fn skip(mut self, dictionary: DictionaryId) -> Self {
        self.skip = Some(dictionary);
        self
    }
}

/// A successful resolution.
#[derive(Clone, Debug)]
pub struct Resolved {
    /// The winning value.
    pub value: ResourceValue,
    /// The dictionary the value was read from.
    pub dictionary: DictionaryId,
}

enum Local {
    Found(Resolved),
    /// `complete` is false when part of the subtree could not be searched,
    /// which makes the miss unfit for caching.
    Missing { complete: bool },
}

impl ResourceContext {
    /// Resolves a key.
    ///
    /// Returns `None` when no dictionary on the search path holds the key,
    /// or when the only holder is a deferred entry currently being built.
    pub fn resolve(&mut self, request: &ResolveRequest) -> Option<Resolved> {
        let key = &request.key;
        let use_cache = request.skip.is_none();
        let mut visited: SmallVec<[DictionaryId; 8]> = SmallVec::new();

        let (first, mut next) = match request.start {
            ResolveStart::Dictionary(dict) => (Some(dict), self.owner_of(dict)),
            ResolveStart::Object(object) => (self.resources_of(object), self.parent_of(object)),
        };
        if let Some(dict) = first {
            visited.push(dict);
            if let Local::Found(found) =
                self.lookup_local(dict, key, request.scope.local(), request.skip, use_cache)
            {
                return Some(found);
            }
        }

        if request.ascend {
            while let Some(object) = next {
                if let Some(dict) = self.resources_of(object)
                    && !visited.contains(&dict)
                {
                    visited.push(dict);
                    if let Local::Found(found) =
                        self.lookup_local(dict, key, LookupScope::LOCAL_ONLY, request.skip, use_cache)
                    {
                        return Some(found);
                    }
                }
                next = self.parent_of(object);
            }
        }

        if request.scope.contains(LookupScope::GLOBAL_THEME)
            && let Some(global) = self.global_theme_resources()
            && !visited.contains(&global)
            && let Local::Found(found) =
                self.lookup_local(global, key, LookupScope::LOCAL_ONLY, request.skip, use_cache)
        {
            return Some(found);
        }

        trace!(key = %key, start = ?request.start, "resource not found");
        None
    }

    /// Resolves a key within one dictionary's subtree, without ascending.
    ///
    /// [`LookupScope::GLOBAL_THEME`] in `scope` additionally searches the
    /// global theme resources.
    pub fn resolve_in(
        &mut self,
        dictionary: DictionaryId,
        key: &ResourceKey,
        scope: LookupScope,
    ) -> Option<Resolved> {
        let request = ResolveRequest::new(key.clone(), ResolveStart::Dictionary(dictionary))
            .scope(scope)
            .ascend(false);
        self.resolve(&request)
    }

    /// Resolves the implicit style for a type, i.e. the [`ResourceKey::for_type`] key.
    pub fn resolve_implicit_style(&mut self, start: ResolveStart, type_name: &str) -> Option<Resolved> {
        self.resolve(&ResolveRequest::new(ResourceKey::for_type(type_name), start))
    }

    fn lookup_local(
        &mut self,
        id: DictionaryId,
        key: &ResourceKey,
        scope: LookupScope,
        skip: Option<DictionaryId>,
        use_cache: bool,
    ) -> Local {
        if skip == Some(id) {
            return Local::Missing { complete: false };
        }
        let Ok(data) = self.dictionary(id) else {
            return Local::Missing { complete: false };
        };
        if let Some(value) = data.overrides.get(key) {
            return found(value.clone(), id);
        }
        if use_cache && data.not_found.contains(key) {
            trace!(dictionary = ?id, key = %key, "not-found cache hit");
            return Local::Missing { complete: true };
        }

        let mut complete = true;
        if scope.contains(LookupScope::SELF_ONLY) {
            if let Some(value) = data.entries.get(key) {
                return found(value.clone(), id);
            }
            match self.load_deferred(id, key) {
                Deferred::Loaded(value) => return found(value, id),
                Deferred::InProgress => complete = false,
                Deferred::Absent => {}
            }
        }

        if scope.contains(LookupScope::MERGED) {
            let merged: SmallVec<[DictionaryId; 8]> = self.merged(id).iter().copied().collect();
            for child in merged.into_iter().rev() {
                match self.lookup_local(child, key, LookupScope::LOCAL_ONLY, skip, false) {
                    hit @ Local::Found(_) => return hit,
                    Local::Missing { complete: c } => complete &= c,
                }
            }
        }

        if scope.contains(LookupScope::LOCAL_THEME)
            && let Some(theme) = self.active_theme_dictionary(id)
        {
            match self.lookup_local(theme, key, LookupScope::LOCAL_ONLY, skip, false) {
                hit @ Local::Found(_) => return hit,
                Local::Missing { complete: c } => complete &= c,
            }
        }

        if use_cache
            && complete
            && scope.contains(LookupScope::LOCAL_ONLY)
            && let Ok(data) = self.dictionary_mut(id)
            && data.not_found.insert(key.clone())
        {
            trace!(dictionary = ?id, key = %key, "cached miss");
        }
        Local::Missing { complete }
    }
}

fn found(value: ResourceValue, dictionary: DictionaryId) -> Local {
    Local::Found(Resolved { value, dictionary })
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource dictionaries: entries, overrides, and deferred entries.
//!
//! A dictionary is addressed by a generation-checked [`DictionaryId`] and
//! lives in a [`ResourceContext`]. Its entries keep insertion order; the
//! winning entry for each key is found by hash.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::DefaultHashBuilder;
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::cache::NotFoundCache;
use crate::context::{ContextEvent, ResourceContext};
use crate::error::ResourceError;
use crate::key::ResourceKey;
use crate::object::ObjectId;
use crate::options::Theme;
use crate::value::ResourceValue;

/// Identifier for a dictionary in a [`ResourceContext`].
///
/// This is a small, copyable handle consisting of a slot index and a
/// generation counter. Once the dictionary is destroyed the handle is stale and
/// never aliases a dictionary created later; operations on a stale handle
/// report [`ResourceError::HandleNotFound`] or simply find nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DictionaryId(u32, u32);

impl DictionaryId {
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

bitflags::bitflags! {
    /// Role and mutability flags of a dictionary.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DictionaryFlags: u8 {
        /// The dictionary is one theme's dictionary inside a theme-dictionaries container.
        const THEME_DICTIONARY             = 0b0000_0001;
        /// The dictionary maps theme names to theme dictionaries.
        const THEME_DICTIONARIES_CONTAINER = 0b0000_0010;
        /// The dictionary is part of the global theme resources.
        const GLOBAL                       = 0b0000_0100;
        /// The dictionary rejects every mutation.
        const READ_ONLY                    = 0b0000_1000;
    }
}

/// Options for [`ResourceContext::add`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Store the value in the override slot, which outranks the ordinary entry
    /// for the same key without replacing it.
    pub is_override: bool,
    /// Add even while the dictionary is not accepting items.
    pub ignore_allow_items: bool,
}

impl AddOptions {
    /// Options for an override write.
    pub const OVERRIDE: Self = Self {
        is_override: true,
        ignore_allow_items: false,
    };
}

/// A deferred entry: invoked at most once, on first access to its key.
///
/// The loader receives the context so that it can resolve the resources it
/// references. Returning `None` leaves the key absent.
pub type DeferredLoader = Box<dyn FnOnce(&mut ResourceContext) -> Option<ResourceValue>>;

pub(crate) type KeyMap<V> = IndexMap<ResourceKey, V, DefaultHashBuilder>;

pub(crate) struct DictionaryData {
    /// Materialized entries in insertion order.
    pub(crate) entries: KeyMap<ResourceValue>,
    pub(crate) overrides: KeyMap<ResourceValue>,
    pub(crate) deferred: KeyMap<DeferredLoader>,
    pub(crate) merged: Vec<DictionaryId>,
    /// Dictionaries whose merged list or theme container holds this one.
    pub(crate) parents: SmallVec<[DictionaryId; 2]>,
    pub(crate) theme_dictionaries: Option<DictionaryId>,
    /// Theme dictionary selected for a theme, recomputed when the theme changes.
    pub(crate) active_theme: Option<(Theme, Option<DictionaryId>)>,
    pub(crate) not_found: NotFoundCache,
    pub(crate) flags: DictionaryFlags,
    pub(crate) owner: Option<ObjectId>,
    pub(crate) allows_items: bool,
    /// Number of type keys, including deferred ones.
    pub(crate) implicit_styles: usize,
}

impl DictionaryData {
    pub(crate) fn new(flags: DictionaryFlags, not_found_capacity: usize) -> Self {
        Self {
            entries: KeyMap::default(),
            overrides: KeyMap::default(),
            deferred: KeyMap::default(),
            merged: Vec::new(),
            parents: SmallVec::new(),
            theme_dictionaries: None,
            active_theme: None,
            not_found: NotFoundCache::new(not_found_capacity),
            flags,
            owner: None,
            allows_items: true,
            implicit_styles: 0,
        }
    }
}

impl fmt::Debug for DictionaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryData")
            .field("entries", &self.entries)
            .field("overrides", &self.overrides)
            .field("deferred", &self.deferred.keys().collect::<Vec<_>>())
            .field("merged", &self.merged)
            .field("parents", &self.parents)
            .field("theme_dictionaries", &self.theme_dictionaries)
            .field("active_theme", &self.active_theme)
            .field("not_found", &self.not_found)
            .field("flags", &self.flags)
            .field("owner", &self.owner)
            .field("allows_items", &self.allows_items)
            .field("implicit_styles", &self.implicit_styles)
            .finish()
    }
}

/// Outcome of a deferred-entry load.
#[derive(Debug)]
pub(crate) enum Deferred {
    Loaded(ResourceValue),
    /// The key's loader is running further up the stack.
    InProgress,
    Absent,
}

impl ResourceContext {
    pub(crate) fn dictionary(&self, id: DictionaryId) -> Result<&DictionaryData, ResourceError> {
        self.dictionaries
            .get(id.idx(), id.generation())
            .ok_or(ResourceError::HandleNotFound)
    }

    pub(crate) fn dictionary_mut(
        &mut self,
        id: DictionaryId,
    ) -> Result<&mut DictionaryData, ResourceError> {
        self.dictionaries
            .get_mut(id.idx(), id.generation())
            .ok_or(ResourceError::HandleNotFound)
    }

    pub(crate) fn writable_dictionary(&self, id: DictionaryId) -> Result<&DictionaryData, ResourceError> {
        let data = self.dictionary(id)?;
        if data.flags.contains(DictionaryFlags::READ_ONLY) {
            warn!(dictionary = ?id, "mutation rejected: dictionary is read-only");
            return Err(ResourceError::ReadOnlyDictionary(id));
        }
        Ok(data)
    }

    /// Creates an empty dictionary.
    pub fn create_dictionary(&mut self) -> DictionaryId {
        self.create_dictionary_with_flags(DictionaryFlags::empty())
    }

    pub(crate) fn create_dictionary_with_flags(&mut self, flags: DictionaryFlags) -> DictionaryId {
        let data = DictionaryData::new(flags, self.options.not_found_cache_capacity());
        let (idx, generation) = self.dictionaries.insert(data);
        DictionaryId::new(idx, generation)
    }

    /// Returns `true` if `id` refers to a live dictionary.
    #[must_use]
    pub fn contains_dictionary(&self, id: DictionaryId) -> bool {
        self.dictionary(id).is_ok()
    }

    /// Returns the number of live dictionaries.
    #[must_use]
    pub fn dictionary_count(&self) -> usize {
        self.dictionaries.len()
    }

    /// Returns the flags of a dictionary.
    #[must_use]
    pub fn flags(&self, id: DictionaryId) -> Option<DictionaryFlags> {
        self.dictionary(id).ok().map(|data| data.flags)
    }

    /// Makes a dictionary read-only or writable again.
    pub fn set_read_only(&mut self, id: DictionaryId, read_only: bool) -> Result<(), ResourceError> {
        let data = self.dictionary_mut(id)?;
        data.flags.set(DictionaryFlags::READ_ONLY, read_only);
        Ok(())
    }

    /// Controls whether ordinary adds are accepted.
    ///
    /// A dictionary stops accepting items while its deferred content is being
    /// parsed; [`AddOptions::ignore_allow_items`] bypasses the check.
    pub fn set_allows_items(&mut self, id: DictionaryId, allows: bool) -> Result<(), ResourceError> {
        self.dictionary_mut(id)?.allows_items = allows;
        Ok(())
    }

    /// Returns the live object owning this dictionary, directly or through a
    /// parent dictionary.
    #[must_use]
    pub fn owner_of(&self, id: DictionaryId) -> Option<ObjectId> {
        self.dictionary(id)
            .ok()
            .and_then(|data| data.owner)
            .filter(|owner| self.is_alive(*owner))
    }

    /// Returns the keys of a dictionary: materialized entries in insertion
    /// order, then deferred keys, then keys that only have an override.
    #[must_use]
    pub fn keys(&self, id: DictionaryId) -> Vec<ResourceKey> {
        let Ok(data) = self.dictionary(id) else {
            return Vec::new();
        };
        let mut keys: Vec<ResourceKey> = data.entries.keys().cloned().collect();
        keys.extend(data.deferred.keys().cloned());
        keys.extend(
            data.overrides
                .keys()
                .filter(|k| !data.entries.contains_key(*k) && !data.deferred.contains_key(*k))
                .cloned(),
        );
        keys
    }

    /// Returns the number of keys in a dictionary, counting deferred entries.
    #[must_use]
    pub fn len(&self, id: DictionaryId) -> usize {
        self.keys(id).len()
    }

    /// Returns `true` if the dictionary holds the key locally, materialized,
    /// deferred, or as an override. No loader is run.
    #[must_use]
    pub fn contains_key(&self, id: DictionaryId, key: &ResourceKey) -> bool {
        self.dictionary(id).is_ok_and(|data| {
            data.entries.contains_key(key)
                || data.deferred.contains_key(key)
                || data.overrides.contains_key(key)
        })
    }

    /// Returns the number of keys currently in the dictionary's not-found cache.
    #[must_use]
    pub fn cached_misses(&self, id: DictionaryId) -> usize {
        self.dictionary(id).map_or(0, |data| data.not_found.len())
    }

    /// Adds or replaces an entry.
    ///
    /// An ordinary add replaces any existing entry for the key in place and
    /// drops a pending deferred entry for it. An override add only writes the
    /// override slot. Every cached miss of this key on the path from this
    /// dictionary up through its parents is forgotten.
    ///
    /// Adding to a theme-dictionaries container requires a dictionary value,
    /// which becomes that theme's dictionary.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::HandleNotFound`] if `id` is stale.
    /// - [`ResourceError::ReadOnlyDictionary`] if the dictionary is read-only.
    /// - [`ResourceError::ItemsNotAllowed`] if the dictionary is not accepting
    ///   items and `ignore_allow_items` is not set.
    /// - [`ResourceError::NotADictionary`] / [`ResourceError::CycleDetected`]
    ///   for invalid theme-dictionary values.
    pub fn add(
        &mut self,
        id: DictionaryId,
        key: ResourceKey,
        value: ResourceValue,
        options: AddOptions,
    ) -> Result<(), ResourceError> {
        let data = self.writable_dictionary(id)?;
        if !options.ignore_allow_items && !data.allows_items {
            return Err(ResourceError::ItemsNotAllowed(id));
        }
        let is_container = data.flags.contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER);
        let theme_child = if is_container {
            let child = value.as_dictionary().ok_or(ResourceError::NotADictionary {
                type_name: value.type_name(),
            })?;
            self.validate_merge(id, child)?;
            Some(child)
        } else {
            None
        };

        // A key whose loader is running is already counted.
        let loading = self.undeferring.contains(&(id, key.clone()));
        let data = self.dictionary_mut(id)?;
        let mut replaced = None;
        let mut implicit_added = false;
        if options.is_override {
            data.overrides.insert(key.clone(), value);
        } else {
            let was_deferred = data.deferred.shift_remove(&key).is_some() || loading;
            replaced = data.entries.insert(key.clone(), value);
            if key.is_type_key() && replaced.is_none() && !was_deferred {
                data.implicit_styles += 1;
                implicit_added = true;
            }
        }

        if let Some(child) = theme_child {
            if let Some(old) = replaced.as_ref().and_then(ResourceValue::as_dictionary)
                && old != child
            {
                self.detach_child(id, old);
            }
            self.attach_child(id, child);
            self.reset_active_theme(id);
            self.invalidate_not_found_all(id);
        } else {
            self.invalidate_not_found_key(id, &key);
        }

        if implicit_added {
            self.notify_implicit_styles(id);
        }
        debug!(
            dictionary = ?id,
            key = %key,
            is_override = options.is_override,
            replaced = replaced.is_some(),
            "added resource"
        );
        Ok(())
    }

    /// Registers a deferred entry whose loader runs on first access.
    ///
    /// Deferred entries come from the parser, so they are accepted even while
    /// the dictionary is not accepting ordinary items.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] or [`ResourceError::ReadOnlyDictionary`].
    pub fn add_deferred(
        &mut self,
        id: DictionaryId,
        key: ResourceKey,
        loader: impl FnOnce(&mut Self) -> Option<ResourceValue> + 'static,
    ) -> Result<(), ResourceError> {
        self.writable_dictionary(id)?;
        let loading = self.undeferring.contains(&(id, key.clone()));
        let data = self.dictionary_mut(id)?;
        let replaced = data.entries.shift_remove(&key).is_some();
        let was_deferred = data.deferred.insert(key.clone(), Box::new(loader)).is_some() || loading;
        let implicit_added = key.is_type_key() && !replaced && !was_deferred;
        if implicit_added {
            data.implicit_styles += 1;
        }
        self.invalidate_not_found_key(id, &key);
        if implicit_added {
            self.notify_implicit_styles(id);
        }
        trace!(dictionary = ?id, key = %key, "registered deferred resource");
        Ok(())
    }

    /// Removes a key, returning the value that was winning lookups for it.
    ///
    /// Both the ordinary entry and any override for the key are removed. A
    /// deferred entry is materialized first so the caller receives its value.
    /// Removal never needs to touch not-found caches: it can only turn a hit
    /// into a miss, which the next lookup discovers on its own.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::HandleNotFound`] if `id` is stale.
    /// - [`ResourceError::ReadOnlyDictionary`] if the dictionary is read-only.
    /// - [`ResourceError::KeyNotFound`] if the key is not present.
    pub fn remove(
        &mut self,
        id: DictionaryId,
        key: &ResourceKey,
    ) -> Result<ResourceValue, ResourceError> {
        self.writable_dictionary(id)?;
        if let Deferred::InProgress = self.load_deferred(id, key) {
            return Err(ResourceError::KeyNotFound(key.clone()));
        }

        let data = self.dictionary_mut(id)?;
        let removed_override = data.overrides.shift_remove(key);
        let removed_entry = data.entries.shift_remove(key);
        let is_container = data.flags.contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER);
        let implicit_removed = key.is_type_key() && removed_entry.is_some();
        if implicit_removed {
            data.implicit_styles = data.implicit_styles.saturating_sub(1);
        }

        if is_container
            && let Some(child) = removed_entry.as_ref().and_then(ResourceValue::as_dictionary)
        {
            self.detach_child(id, child);
            self.reset_active_theme(id);
        }
        if implicit_removed {
            self.notify_implicit_styles(id);
        }

        let removed = removed_override
            .or(removed_entry)
            .ok_or_else(|| ResourceError::KeyNotFound(key.clone()))?;
        debug!(dictionary = ?id, key = %key, "removed resource");
        Ok(removed)
    }

    /// Materializes a deferred entry on first access.
    ///
    /// Returns the value now stored for the key, or `None` if the key has no
    /// deferred entry. A key whose loader is already running further up the
    /// stack (a resource that refers to itself while being built) also
    /// returns `None`; this is a soft miss, not an error.
    pub fn try_load_deferred(&mut self, id: DictionaryId, key: &ResourceKey) -> Option<ResourceValue> {
        match self.load_deferred(id, key) {
            Deferred::Loaded(value) => Some(value),
            Deferred::InProgress | Deferred::Absent => None,
        }
    }

    pub(crate) fn load_deferred(&mut self, id: DictionaryId, key: &ResourceKey) -> Deferred {
        let guard = (id, key.clone());
        if self.undeferring.contains(&guard) {
            trace!(dictionary = ?id, key = %key, "deferred resource is mid-construction");
            return Deferred::InProgress;
        }
        let Ok(data) = self.dictionary_mut(id) else {
            return Deferred::Absent;
        };
        let Some(loader) = data.deferred.shift_remove(key) else {
            return Deferred::Absent;
        };

        self.undeferring.insert(guard.clone());
        let produced = loader(self);
        self.undeferring.remove(&guard);

        let Ok(data) = self.dictionary_mut(id) else {
            return Deferred::Absent;
        };
        // An explicit add made while the loader ran wins over the loaded value.
        if let Some(existing) = data.entries.get(key) {
            return Deferred::Loaded(existing.clone());
        }
        let Some(value) = produced else {
            // The loader may have registered a new deferred entry for the key.
            if key.is_type_key() && !data.deferred.contains_key(key) {
                data.implicit_styles = data.implicit_styles.saturating_sub(1);
                self.notify_implicit_styles(id);
            }
            trace!(dictionary = ?id, key = %key, "deferred loader produced nothing");
            return Deferred::Absent;
        };
        data.entries.insert(key.clone(), value.clone());
        let is_container = data.flags.contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER);
        if is_container && let Some(child) = value.as_dictionary() {
            self.attach_child(id, child);
        }
        trace!(dictionary = ?id, key = %key, "materialized deferred resource");
        Deferred::Loaded(value)
    }

    /// Materializes every deferred entry of a dictionary.
    ///
    /// Returns the number of entries that were loaded.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] if `id` is stale.
    pub fn ensure_all(&mut self, id: DictionaryId) -> Result<usize, ResourceError> {
        let pending: Vec<ResourceKey> = self.dictionary(id)?.deferred.keys().cloned().collect();
        let mut loaded = 0;
        for key in &pending {
            if let Deferred::Loaded(_) = self.load_deferred(id, key) {
                loaded += 1;
            }
        }
        debug!(dictionary = ?id, loaded, "materialized all deferred resources");
        Ok(loaded)
    }

    /// Returns `true` while the loader for `key` in `id` is running.
    #[must_use]
    pub fn is_undeferring(&self, id: DictionaryId, key: &ResourceKey) -> bool {
        self.undeferring.contains(&(id, key.clone()))
    }

    /// Returns `true` if the dictionary or any merged dictionary below it holds
    /// a type key.
    #[must_use]
    pub fn has_implicit_styles(&self, id: DictionaryId) -> bool {
        let mut stack: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        let mut visited: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        stack.push(id);
        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            let Ok(data) = self.dictionary(current) else {
                continue;
            };
            if data.implicit_styles > 0 {
                return true;
            }
            stack.extend(data.merged.iter().copied());
        }
        false
    }

    /// Queues an implicit-style invalidation for the dictionary's owner.
    pub(crate) fn notify_implicit_styles(&mut self, id: DictionaryId) {
        if let Some(owner) = self.owner_of(id) {
            self.events
                .push(ContextEvent::ImplicitStylesInvalidated { owner });
        }
    }

    /// Forgets a cached miss of `key` in `id` and every dictionary above it.
    pub(crate) fn invalidate_not_found_key(&mut self, id: DictionaryId, key: &ResourceKey) {
        for current in self.self_and_ancestors(id) {
            if let Ok(data) = self.dictionary_mut(current) {
                data.not_found.remove(key);
            }
        }
    }

    /// Clears the not-found caches of `id` and every dictionary above it.
    pub(crate) fn invalidate_not_found_all(&mut self, id: DictionaryId) {
        for current in self.self_and_ancestors(id) {
            if let Ok(data) = self.dictionary_mut(current) {
                data.not_found.clear();
            }
        }
    }

    /// `id` followed by every dictionary that (transitively) contains it.
    pub(crate) fn self_and_ancestors(&self, id: DictionaryId) -> SmallVec<[DictionaryId; 8]> {
        let mut visited: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        let mut stack: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        stack.push(id);
        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            if let Ok(data) = self.dictionary(current) {
                stack.extend(data.parents.iter().copied());
            }
        }
        visited
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Merged dictionaries, theme dictionaries, and dictionary lifetime.
//!
//! Dictionaries form a DAG: a dictionary's children are its merged
//! dictionaries, its theme-dictionaries container, and (for a container) the
//! theme dictionaries it maps to. Every structural mutation checks for cycles
//! before it changes anything, so lookups can recurse without a guard.

use alloc::vec::Vec;

use hashbrown::HashSet;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::context::ResourceContext;
use crate::dictionary::{AddOptions, DictionaryFlags, DictionaryId};
use crate::error::ResourceError;
use crate::key::ResourceKey;
use crate::object::ObjectId;
use crate::value::ResourceValue;

impl ResourceContext {
    /// Returns the merged dictionaries of `id` in order (lowest priority first).
    #[must_use]
    pub fn merged(&self, id: DictionaryId) -> &[DictionaryId] {
        self.dictionary(id).map_or(&[], |data| data.merged.as_slice())
    }

    /// Returns `true` if making `child` a child of `parent` would close a
    /// cycle, i.e. `parent` is `child` or is reachable from it.
    #[must_use]
    pub fn would_create_cycle(&self, parent: DictionaryId, child: DictionaryId) -> bool {
        child == parent || self.subtree(child).contains(&parent)
    }

    /// Inserts `child` into the merged list of `parent` at `index`.
    ///
    /// Later merged dictionaries take precedence, so inserting at `0` adds the
    /// lowest-priority dictionary. An out-of-range index appends. All cached
    /// misses of `parent` and the dictionaries above it are dropped.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::HandleNotFound`] if either handle is stale.
    /// - [`ResourceError::ReadOnlyDictionary`] if `parent` is read-only.
    /// - [`ResourceError::CycleDetected`] if `parent` is reachable from `child`.
    pub fn insert_merged(
        &mut self,
        parent: DictionaryId,
        index: usize,
        child: DictionaryId,
    ) -> Result<(), ResourceError> {
        self.validate_merge(parent, child)?;
        let data = self.dictionary_mut(parent)?;
        let index = index.min(data.merged.len());
        data.merged.insert(index, child);

        self.attach_child(parent, child);
        self.invalidate_not_found_all(parent);
        if self.has_implicit_styles(child) {
            self.notify_implicit_styles(parent);
        }
        debug!(parent = ?parent, child = ?child, index, "merged dictionary");
        Ok(())
    }

    /// Appends `child` to the merged list of `parent`, giving it the highest priority.
    ///
    /// # Errors
    ///
    /// See [`insert_merged`](Self::insert_merged).
    pub fn append_merged(
        &mut self,
        parent: DictionaryId,
        child: DictionaryId,
    ) -> Result<(), ResourceError> {
        self.insert_merged(parent, usize::MAX, child)
    }

    /// Removes the first occurrence of `child` from the merged list of `parent`.
    ///
    /// Returns `false` if `child` was not merged into `parent`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] or [`ResourceError::ReadOnlyDictionary`].
    pub fn remove_merged(
        &mut self,
        parent: DictionaryId,
        child: DictionaryId,
    ) -> Result<bool, ResourceError> {
        self.writable_dictionary(parent)?;
        let data = self.dictionary_mut(parent)?;
        let Some(pos) = data.merged.iter().position(|d| *d == child) else {
            return Ok(false);
        };
        data.merged.remove(pos);

        let implicit = self.has_implicit_styles(child);
        self.detach_child(parent, child);
        if implicit {
            self.notify_implicit_styles(parent);
        }
        debug!(parent = ?parent, child = ?child, "removed merged dictionary");
        Ok(true)
    }

    /// Removes every merged dictionary of `parent` and returns them in their
    /// former order.
    ///
    /// Each removed dictionary's subtree forgets its cached misses and its
    /// owner.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] or [`ResourceError::ReadOnlyDictionary`].
    pub fn clear_merged(&mut self, parent: DictionaryId) -> Result<Vec<DictionaryId>, ResourceError> {
        self.writable_dictionary(parent)?;
        let members = core::mem::take(&mut self.dictionary_mut(parent)?.merged);

        let mut implicit = false;
        for &member in &members {
            implicit |= self.has_implicit_styles(member);
            for dict in self.subtree(member) {
                if let Ok(data) = self.dictionary_mut(dict) {
                    data.not_found.clear();
                }
            }
            self.detach_child(parent, member);
        }
        if implicit {
            self.notify_implicit_styles(parent);
        }
        debug!(parent = ?parent, removed = members.len(), "cleared merged dictionaries");
        Ok(members)
    }

    /// Returns the theme-dictionaries container of `id`, if it has one.
    #[must_use]
    pub fn theme_dictionaries(&self, id: DictionaryId) -> Option<DictionaryId> {
        self.dictionary(id).ok().and_then(|data| data.theme_dictionaries)
    }

    /// Returns the theme-dictionaries container of `id`, creating it if needed.
    ///
    /// The container maps theme names to dictionaries; add entries with
    /// [`set_theme_dictionary`](Self::set_theme_dictionary) or plain
    /// [`add`](Self::add) with [`ResourceValue::dictionary`] values.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] or [`ResourceError::ReadOnlyDictionary`].
    pub fn ensure_theme_dictionaries(&mut self, id: DictionaryId) -> Result<DictionaryId, ResourceError> {
        if let Some(existing) = self.dictionary(id)?.theme_dictionaries {
            return Ok(existing);
        }
        self.writable_dictionary(id)?;
        let container = self.create_dictionary_with_flags(DictionaryFlags::THEME_DICTIONARIES_CONTAINER);
        self.dictionary_mut(id)?.theme_dictionaries = Some(container);
        self.attach_child(id, container);
        debug!(dictionary = ?id, container = ?container, "created theme dictionaries");
        Ok(container)
    }

    /// Registers `dictionary` as the theme dictionary of `id` for `theme_key`.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add) on the container, including
    /// [`ResourceError::CycleDetected`].
    pub fn set_theme_dictionary(
        &mut self,
        id: DictionaryId,
        theme_key: &str,
        dictionary: DictionaryId,
    ) -> Result<(), ResourceError> {
        let container = self.ensure_theme_dictionaries(id)?;
        let options = AddOptions {
            ignore_allow_items: true,
            ..AddOptions::default()
        };
        self.add(
            container,
            ResourceKey::named(theme_key),
            ResourceValue::dictionary(dictionary),
            options,
        )
    }

    /// Returns the theme dictionary of `id` for the current theme.
    ///
    /// Falls back to the configured fallback key (`"Default"` unless changed)
    /// when the current theme has no entry. The selection is cached per
    /// dictionary until the theme or the container changes.
    pub fn active_theme_dictionary(&mut self, id: DictionaryId) -> Option<DictionaryId> {
        let data = self.dictionary(id).ok()?;
        let container = data.theme_dictionaries?;
        if let Some((theme, selected)) = &data.active_theme
            && *theme == self.theme
        {
            return selected.filter(|d| self.contains_dictionary(*d));
        }

        let theme = self.theme.clone();
        let fallback = ResourceKey::named(self.options.fallback_theme_key());
        let selected = self
            .container_entry(container, &ResourceKey::named(theme.name()))
            .or_else(|| self.container_entry(container, &fallback));
        if let Ok(data) = self.dictionary_mut(id) {
            data.active_theme = Some((theme, selected));
        }
        selected
    }

    fn container_entry(&mut self, container: DictionaryId, key: &ResourceKey) -> Option<DictionaryId> {
        let existing = self.dictionary(container).ok()?.entries.get(key).cloned();
        let value = match existing {
            Some(value) => value,
            None => self.try_load_deferred(container, key)?,
        };
        let dict = value.as_dictionary()?;
        if self.contains_dictionary(dict) {
            Some(dict)
        } else {
            warn!(container = ?container, key = %key, "theme dictionary entry is stale");
            None
        }
    }

    /// Installs the global theme resources searched after every local chain.
    ///
    /// The dictionary and everything below it are marked global and
    /// read-only. Returns the previously installed dictionary.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] if `resources` is stale.
    pub fn install_global_theme_resources(
        &mut self,
        resources: Option<DictionaryId>,
    ) -> Result<Option<DictionaryId>, ResourceError> {
        if let Some(dict) = resources {
            self.dictionary(dict)?;
            self.mark_subtree(dict, DictionaryFlags::GLOBAL | DictionaryFlags::READ_ONLY);
        }
        let previous = core::mem::replace(&mut self.global_theme_resources, resources);
        self.clear_not_found_caches();
        debug!(resources = ?resources, "installed global theme resources");
        Ok(previous)
    }

    /// Returns the installed global theme resources.
    #[must_use]
    pub fn global_theme_resources(&self) -> Option<DictionaryId> {
        self.global_theme_resources
            .filter(|dict| self.contains_dictionary(*dict))
    }

    /// Destroys a dictionary, detaching it from every parent and child.
    ///
    /// Objects using it as their resources lose it; children that are no
    /// longer attached anywhere lose their owner.
    ///
    /// # Errors
    ///
    /// [`ResourceError::HandleNotFound`] if `id` is stale.
    pub fn destroy_dictionary(&mut self, id: DictionaryId) -> Result<(), ResourceError> {
        let children = self.children_of(id);
        let data = self
            .dictionaries
            .remove(id.idx(), id.generation())
            .ok_or(ResourceError::HandleNotFound)?;

        for &parent in &data.parents {
            let Ok(parent_data) = self.dictionary_mut(parent) else {
                continue;
            };
            parent_data.merged.retain(|d| *d != id);
            if parent_data.theme_dictionaries == Some(id) {
                parent_data.theme_dictionaries = None;
                parent_data.active_theme = None;
            }
            if parent_data
                .flags
                .contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER)
            {
                parent_data
                    .entries
                    .retain(|_, value| value.as_dictionary() != Some(id));
                self.reset_active_theme(parent);
            }
        }
        for child in children {
            self.detach_child(id, child);
        }

        if self.global_theme_resources == Some(id) {
            self.global_theme_resources = None;
        }
        for (_, _, object) in self.objects.iter_mut() {
            if object.resources == Some(id) {
                object.resources = None;
            }
        }
        self.undeferring.retain(|(dict, _)| *dict != id);
        debug!(dictionary = ?id, "destroyed dictionary");
        Ok(())
    }

    /// Every resource key defined in `id` or a dictionary below it, each
    /// listed once. Theme names in theme-dictionaries containers are not
    /// resource keys and are left out.
    #[must_use]
    pub fn subtree_keys(&self, id: DictionaryId) -> Vec<ResourceKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for dict in self.subtree(id) {
            let is_container = self.flags(dict).is_some_and(|flags| {
                flags.contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER)
            });
            if is_container {
                continue;
            }
            for key in self.keys(dict) {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    pub(crate) fn validate_merge(
        &self,
        parent: DictionaryId,
        child: DictionaryId,
    ) -> Result<(), ResourceError> {
        self.writable_dictionary(parent)?;
        self.dictionary(child)?;
        if self.would_create_cycle(parent, child) {
            warn!(parent = ?parent, child = ?child, "merge rejected: cycle");
            return Err(ResourceError::CycleDetected { parent, child });
        }
        Ok(())
    }

    /// Direct children of a dictionary in the dictionary DAG.
    pub(crate) fn children_of(&self, id: DictionaryId) -> SmallVec<[DictionaryId; 8]> {
        let Ok(data) = self.dictionary(id) else {
            return SmallVec::new();
        };
        let mut children: SmallVec<[DictionaryId; 8]> = data.merged.iter().copied().collect();
        children.extend(data.theme_dictionaries);
        if data
            .flags
            .contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER)
        {
            children.extend(data.entries.values().filter_map(ResourceValue::as_dictionary));
        }
        children
    }

    /// `root` and every dictionary reachable from it.
    pub(crate) fn subtree(&self, root: DictionaryId) -> SmallVec<[DictionaryId; 8]> {
        let mut visited: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        let mut stack: SmallVec<[DictionaryId; 8]> = SmallVec::new();
        stack.push(root);
        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            stack.extend(self.children_of(current));
        }
        visited
    }

    pub(crate) fn attach_child(&mut self, parent: DictionaryId, child: DictionaryId) {
        let Ok(parent_data) = self.dictionary(parent) else {
            return;
        };
        let owner = parent_data.owner;
        let global = parent_data.flags.contains(DictionaryFlags::GLOBAL);
        let is_container = parent_data
            .flags
            .contains(DictionaryFlags::THEME_DICTIONARIES_CONTAINER);

        if let Ok(data) = self.dictionary_mut(child) {
            if !data.parents.contains(&parent) {
                data.parents.push(parent);
            }
            if is_container {
                data.flags.insert(DictionaryFlags::THEME_DICTIONARY);
            }
        }
        self.propagate_owner(child, owner);
        if global {
            self.mark_subtree(child, DictionaryFlags::GLOBAL);
        }
    }

    /// Drops the parent link from `child` unless `parent` still references it.
    pub(crate) fn detach_child(&mut self, parent: DictionaryId, child: DictionaryId) {
        if self.children_of(parent).contains(&child) {
            return;
        }
        let Ok(data) = self.dictionary_mut(child) else {
            return;
        };
        data.parents.retain(|p| *p != parent);
        let remaining = data.parents.first().copied();
        let owner = remaining
            .and_then(|p| self.dictionary(p).ok())
            .and_then(|data| data.owner);
        self.propagate_owner(child, owner);
    }

    pub(crate) fn propagate_owner(&mut self, root: DictionaryId, owner: Option<ObjectId>) {
        for dict in self.subtree(root) {
            if let Ok(data) = self.dictionary_mut(dict) {
                data.owner = owner;
            }
        }
    }

    fn mark_subtree(&mut self, root: DictionaryId, flags: DictionaryFlags) {
        for dict in self.subtree(root) {
            if let Ok(data) = self.dictionary_mut(dict) {
                data.flags.insert(flags);
            }
        }
    }

    /// Forgets the theme selection of a container's owning dictionaries.
    pub(crate) fn reset_active_theme(&mut self, container: DictionaryId) {
        let Ok(data) = self.dictionary(container) else {
            return;
        };
        let parents = data.parents.clone();
        for parent in parents {
            if let Ok(data) = self.dictionary_mut(parent) {
                data.active_theme = None;
            }
        }
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The resource context: owner of every dictionary and object.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashSet;
use tracing::debug;

use crate::dictionary::{DictionaryData, DictionaryId};
use crate::key::ResourceKey;
use crate::object::{ObjectData, ObjectId};
use crate::options::{ContextOptions, Theme};
use crate::slots::Slots;

/// A notification produced by a context mutation.
///
/// Events are queued and drained with [`ResourceContext::take_events`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextEvent {
    /// Type keys visible from `owner`'s resources changed; implicit styles of
    /// `owner` and its descendants must be looked up again.
    ImplicitStylesInvalidated {
        /// The object whose resources changed.
        owner: ObjectId,
    },
    /// The active theme changed.
    ThemeChanged {
        /// The new theme.
        theme: Theme,
    },
}

/// Owns the dictionaries, the object tree, and the active theme.
///
/// All resource operations go through a context; dictionaries and objects are
/// addressed by copyable handles.
pub struct ResourceContext {
    pub(crate) options: ContextOptions,
    pub(crate) dictionaries: Slots<DictionaryData>,
    pub(crate) objects: Slots<ObjectData>,
    pub(crate) application: ObjectId,
    pub(crate) theme: Theme,
    pub(crate) global_theme_resources: Option<DictionaryId>,
    /// Deferred entries whose loaders are running.
    pub(crate) undeferring: HashSet<(DictionaryId, ResourceKey)>,
    pub(crate) events: Vec<ContextEvent>,
}

impl ResourceContext {
    /// Creates a context with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    /// Creates a context with the given options.
    #[must_use]
    pub fn with_options(options: ContextOptions) -> Self {
        let mut objects = Slots::default();
        let (idx, generation) = objects.insert(ObjectData::default());
        Self {
            theme: options.initial_theme().clone(),
            options,
            dictionaries: Slots::default(),
            objects,
            application: ObjectId::new(idx, generation),
            global_theme_resources: None,
            undeferring: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// Returns the options this context was created with.
    #[must_use]
    #[inline]
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Returns the active theme.
    #[must_use]
    #[inline]
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Switches the active theme.
    ///
    /// Every not-found cache is cleared, since theme dictionaries take part in
    /// local lookups, and a [`ContextEvent::ThemeChanged`] is queued. Returns
    /// `false` if `theme` is already active.
    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if self.theme == theme {
            return false;
        }
        debug!(from = ?self.theme, to = ?theme, "theme changed");
        self.theme = theme.clone();
        self.clear_not_found_caches();
        self.events.push(ContextEvent::ThemeChanged { theme });
        true
    }

    /// Drains the queued events.
    pub fn take_events(&mut self) -> Vec<ContextEvent> {
        core::mem::take(&mut self.events)
    }

    pub(crate) fn clear_not_found_caches(&mut self) {
        for (_, _, data) in self.dictionaries.iter_mut() {
            data.not_found.clear();
        }
    }
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("theme", &self.theme)
            .field("dictionaries", &self.dictionaries.len())
            .field("objects", &self.objects.len())
            .field("global_theme_resources", &self.global_theme_resources)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

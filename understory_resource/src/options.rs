// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Themes and context configuration.

use alloc::borrow::Cow;
use core::fmt;

/// Default capacity of each dictionary's not-found cache.
pub const DEFAULT_NOT_FOUND_CACHE_CAPACITY: usize = 8;

/// The name of a visual theme, used to select theme dictionaries.
///
/// # Example
///
/// ```rust
/// use understory_resource::Theme;
///
/// assert_eq!(Theme::DARK.name(), "Dark");
/// assert_eq!(Theme::custom("Sepia").name(), "Sepia");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Theme(Cow<'static, str>);

impl Theme {
    /// The light theme.
    pub const LIGHT: Self = Self(Cow::Borrowed("Light"));
    /// The dark theme.
    pub const DARK: Self = Self(Cow::Borrowed("Dark"));
    /// The high-contrast theme.
    pub const HIGH_CONTRAST: Self = Self(Cow::Borrowed("HighContrast"));

    /// Creates a theme with an application-defined name.
    #[must_use]
    pub fn custom(name: &str) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the theme name, which is also its theme-dictionary key.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Theme").field(&self.name()).finish()
    }
}

/// Configuration for a [`ResourceContext`](crate::ResourceContext).
///
/// Use [`ContextOptionsBuilder`] to construct non-default options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextOptions {
    not_found_cache_capacity: usize,
    initial_theme: Theme,
    fallback_theme_key: Cow<'static, str>,
}

impl ContextOptions {
    /// Capacity of each dictionary's not-found cache. Zero disables caching.
    #[must_use]
    #[inline]
    pub fn not_found_cache_capacity(&self) -> usize {
        self.not_found_cache_capacity
    }

    /// The theme active when the context is created.
    #[must_use]
    #[inline]
    pub fn initial_theme(&self) -> &Theme {
        &self.initial_theme
    }

    /// Theme-dictionary key used when the active theme has no dictionary.
    #[must_use]
    #[inline]
    pub fn fallback_theme_key(&self) -> &str {
        &self.fallback_theme_key
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptionsBuilder::new().build()
    }
}

/// Builder for [`ContextOptions`].
///
/// # Example
///
/// ```rust
/// use understory_resource::{ContextOptionsBuilder, ResourceContext, Theme};
///
/// let options = ContextOptionsBuilder::new()
///     .initial_theme(Theme::DARK)
///     .not_found_cache_capacity(16)
///     .build();
///
/// let cx = ResourceContext::with_options(options);
/// assert_eq!(cx.theme(), &Theme::DARK);
/// ```
#[derive(Clone, Debug)]
pub struct ContextOptionsBuilder {
    options: ContextOptions,
}

impl ContextOptionsBuilder {
    /// Creates a builder holding the default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ContextOptions {
                not_found_cache_capacity: DEFAULT_NOT_FOUND_CACHE_CAPACITY,
                initial_theme: Theme::LIGHT,
                fallback_theme_key: Cow::Borrowed("Default"),
            },
        }
    }

    /// Sets the capacity of each dictionary's not-found cache.
    #[must_use]
    pub fn not_found_cache_capacity(mut self, capacity: usize) -> Self {
        self.options.not_found_cache_capacity = capacity;
        self
    }

    /// Sets the theme active when the context is created.
    #[must_use]
    pub fn initial_theme(mut self, theme: Theme) -> Self {
        self.options.initial_theme = theme;
        self
    }

    /// Sets the fallback theme-dictionary key.
    #[must_use]
    pub fn fallback_theme_key(mut self, key: &str) -> Self {
        self.options.fallback_theme_key = Cow::Owned(key.into());
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> ContextOptions {
        self.options
    }
}

impl Default for ContextOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

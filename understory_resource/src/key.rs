// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource keys.
//!
//! This module provides [`ResourceKey`], the identifier used to look up
//! entries in a resource dictionary.

use alloc::rc::Rc;
use core::fmt;

/// A key for looking up entries in a resource dictionary.
///
/// There are two kinds of key:
///
/// - **Named** keys, used by ordinary `StaticResource` and `ThemeResource`
///   references.
/// - **Type** keys, named after a type's full name and used to find the
///   implicit style for instances of that type.
///
/// A named key and a type key with the same text are distinct. Cloning a key
/// is cheap (the name is reference counted).
///
/// # Example
///
/// ```rust
/// use understory_resource::ResourceKey;
///
/// let brush = ResourceKey::named("AccentBrush");
/// let button = ResourceKey::for_type("Controls.Button");
///
/// assert!(!brush.is_type_key());
/// assert!(button.is_type_key());
/// assert_ne!(ResourceKey::named("Controls.Button"), button);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    name: Rc<str>,
    is_type_key: bool,
}

impl ResourceKey {
    /// Creates a named resource key.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            is_type_key: false,
        }
    }

    /// Creates an implicit-style key for the type with the given full name.
    #[must_use]
    pub fn for_type(type_name: &str) -> Self {
        Self {
            name: Rc::from(type_name),
            is_type_key: true,
        }
    }

    /// Returns the key text.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this key identifies an implicit style.
    #[must_use]
    #[inline]
    pub fn is_type_key(&self) -> bool {
        self.is_type_key
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_type_key {
            f.debug_tuple("TypeKey").field(&&*self.name).finish()
        } else {
            f.debug_tuple("ResourceKey").field(&&*self.name).finish()
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_type_key {
            write!(f, "{{x:Type {}}}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl From<&str> for ResourceKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

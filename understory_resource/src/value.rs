// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased, shared resource values.
//!
//! This module provides [`ResourceValue`] for storing resources of any type
//! in a dictionary.

use alloc::rc::Rc;
use core::any::{Any, TypeId};
use core::fmt;

use crate::dictionary::DictionaryId;

/// A type-erased resource value.
///
/// Resources are shared: every consumer that resolves a key receives a handle
/// to the same instance, so cloning a `ResourceValue` only bumps a reference
/// count. Two values are the *same resource* when [`ResourceValue::ptr_eq`]
/// holds, which is how dependents detect that a re-resolution produced a
/// different value.
///
/// # Example
///
/// ```rust
/// use understory_resource::ResourceValue;
///
/// let value = ResourceValue::new(0x0078D4_u32);
/// assert!(value.is::<u32>());
/// assert_eq!(value.downcast_ref::<u32>(), Some(&0x0078D4));
///
/// let shared = value.clone();
/// assert!(value.ptr_eq(&shared));
/// assert!(!value.ptr_eq(&ResourceValue::new(0x0078D4_u32)));
/// ```
#[derive(Clone)]
pub struct ResourceValue {
    inner: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ResourceValue {
    /// Creates a new resource value from a concrete value.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Wraps a dictionary handle, as stored in a theme-dictionaries container.
    #[must_use]
    pub fn dictionary(id: DictionaryId) -> Self {
        Self::new(id)
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the contained value, for diagnostics.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    ///
    /// Returns `None` if the contained value is not of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_ref().downcast_ref()
    }

    /// Returns the dictionary handle if this value wraps one.
    #[must_use]
    pub fn as_dictionary(&self) -> Option<DictionaryId> {
        self.downcast_ref::<DictionaryId>().copied()
    }

    /// Returns `true` if both handles refer to the same resource instance.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Compares two optional values by resource identity.
    ///
    /// Two absent values are the same; an absent and a present value are not.
    #[must_use]
    pub fn same(a: Option<&Self>, b: Option<&Self>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    #[test]
    fn resource_value_downcast() {
        let value = ResourceValue::new(42_i32);
        assert!(value.is::<i32>());
        assert!(!value.is::<f64>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_ref::<f64>(), None);
        assert_eq!(value.type_id(), TypeId::of::<i32>());
    }

    #[test]
    fn resource_value_string() {
        let value = ResourceValue::new(String::from("#0078D4"));
        assert_eq!(
            value.downcast_ref::<String>().map(String::as_str),
            Some("#0078D4")
        );
    }

    #[test]
    fn clones_share_identity() {
        let value = ResourceValue::new(1_u8);
        let clone = value.clone();
        assert!(value.ptr_eq(&clone));
        assert!(ResourceValue::same(Some(&value), Some(&clone)));
        assert!(!ResourceValue::same(Some(&value), None));
        assert!(ResourceValue::same(None, None));
    }

    #[test]
    fn resource_value_debug() {
        let debug = format!("{:?}", ResourceValue::new(42_i32));
        assert!(debug.contains("ResourceValue"), "{debug}");
        assert!(debug.contains("i32"), "{debug}");
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by dictionary mutations.

use thiserror::Error;

use crate::dictionary::DictionaryId;
use crate::key::ResourceKey;
use crate::object::ObjectId;

/// Errors returned by [`ResourceContext`](crate::ResourceContext) mutations.
///
/// Every mutation validates before it writes, so an `Err` leaves the
/// dictionaries exactly as they were. Ordinary lookups never produce these:
/// a missing key is `None`, not an error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// Merging `child` into `parent` would make `parent` reachable from itself.
    #[error("merging {child:?} into {parent:?} would create a cycle")]
    CycleDetected {
        /// The dictionary whose merged list was being extended.
        parent: DictionaryId,
        /// The dictionary being merged.
        child: DictionaryId,
    },
    /// A mutation was attempted on a read-only (system or global theme) dictionary.
    #[error("dictionary {0:?} is read-only")]
    ReadOnlyDictionary(DictionaryId),
    /// The handle does not refer to a live dictionary or object.
    #[error("stale or unknown handle")]
    HandleNotFound,
    /// The dictionary is not accepting items, e.g. while its deferred content is parsed.
    #[error("dictionary {0:?} does not accept items right now")]
    ItemsNotAllowed(DictionaryId),
    /// A theme-dictionaries container was given something other than a dictionary.
    #[error("theme dictionaries may only contain dictionaries, got {type_name}")]
    NotADictionary {
        /// Type name of the rejected value.
        type_name: &'static str,
    },
    /// An explicit removal or replacement named a key that is not present.
    #[error("key {0} not found")]
    KeyNotFound(ResourceKey),
    /// Reparenting would make an object its own ancestor.
    #[error("object {0:?} cannot become its own ancestor")]
    ObjectCycle(ObjectId),
}

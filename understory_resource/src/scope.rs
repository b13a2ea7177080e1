// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lookup scopes.

bitflags::bitflags! {
    /// Which parts of a dictionary's reach a lookup may search.
    ///
    /// A lookup always checks the dictionary's override entries first; the
    /// remaining steps are gated by these bits, in this order:
    ///
    /// 1. [`SELF_ONLY`](Self::SELF_ONLY): the dictionary's own entries.
    /// 2. [`MERGED`](Self::MERGED): merged dictionaries, last added first.
    /// 3. [`LOCAL_THEME`](Self::LOCAL_THEME): the active theme dictionary.
    /// 4. [`GLOBAL_THEME`](Self::GLOBAL_THEME): the process-wide theme resources,
    ///    consulted only after the owner chain has been exhausted.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LookupScope: u8 {
        /// The dictionary's own entries.
        const SELF_ONLY    = 0b0000_0001;
        /// The dictionary's merged dictionaries.
        const MERGED       = 0b0000_0010;
        /// The dictionary's active theme dictionary.
        const LOCAL_THEME  = 0b0000_0100;
        /// The global theme resources.
        const GLOBAL_THEME = 0b0000_1000;
        /// Everything a dictionary can reach without leaving its own subtree.
        const LOCAL_ONLY   = Self::SELF_ONLY.bits() | Self::MERGED.bits() | Self::LOCAL_THEME.bits();
        /// Local scope plus the global theme resources.
        const ALL          = Self::LOCAL_ONLY.bits() | Self::GLOBAL_THEME.bits();
    }
}

impl Default for LookupScope {
    fn default() -> Self {
        Self::ALL
    }
}

impl LookupScope {
    /// Returns this scope without the global theme bit.
    #[must_use]
    #[inline]
    pub const fn local(self) -> Self {
        self.difference(Self::GLOBAL_THEME)
    }
}

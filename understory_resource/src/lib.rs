// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Resource: scoped resource dictionaries with merged and theme lookup.
//!
//! This crate stores named and typed resources in dictionaries and resolves
//! keys the way a declarative UI does:
//!
//! - **Dictionaries** hold entries in insertion order, an override slot per
//!   key, and deferred entries that are built on first access.
//! - **Merged dictionaries** contribute entries to their parent; later merged
//!   dictionaries shadow earlier ones.
//! - **Theme dictionaries** are selected by the active [`Theme`], falling
//!   back to a `"Default"` entry.
//! - **Objects** form a tree; a lookup that misses an object's resources
//!   ascends to its parent, ending at the application object and then the
//!   global theme resources.
//!
//! A small not-found cache on each dictionary short-circuits repeated misses.
//! Every mutation that could turn a cached miss into a hit invalidates the
//! affected caches.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_resource::{
//!     AddOptions, ResolveRequest, ResolveStart, ResourceContext, ResourceKey, ResourceValue,
//!     Theme,
//! };
//!
//! let mut cx = ResourceContext::new();
//!
//! // Application resources merge a control library with light and dark themes.
//! let app = cx.create_dictionary();
//! let library = cx.create_dictionary();
//! let light = cx.create_dictionary();
//! let dark = cx.create_dictionary();
//! cx.append_merged(app, library).unwrap();
//! cx.set_theme_dictionary(app, "Light", light).unwrap();
//! cx.set_theme_dictionary(app, "Dark", dark).unwrap();
//! cx.set_resources(cx.application(), Some(app)).unwrap();
//!
//! let fg = ResourceKey::named("Foreground");
//! cx.add(light, fg.clone(), ResourceValue::new("black"), AddOptions::default()).unwrap();
//! cx.add(dark, fg.clone(), ResourceValue::new("white"), AddOptions::default()).unwrap();
//!
//! let button = cx.create_object(Some(cx.application()));
//! let request = ResolveRequest::new(fg, ResolveStart::Object(button));
//!
//! let found = cx.resolve(&request).unwrap();
//! assert_eq!(found.value.downcast_ref::<&str>(), Some(&"black"));
//!
//! cx.set_theme(Theme::DARK);
//! let found = cx.resolve(&request).unwrap();
//! assert_eq!(found.dictionary, dark);
//! ```
//!
//! ## Deferred entries
//!
//! ```rust
//! use understory_resource::{LookupScope, ResourceContext, ResourceKey, ResourceValue};
//!
//! let mut cx = ResourceContext::new();
//! let dict = cx.create_dictionary();
//! cx.add_deferred(dict, ResourceKey::named("Heavy"), |_| {
//!     Some(ResourceValue::new([0_u8; 64]))
//! })
//! .unwrap();
//!
//! // The loader runs on the first lookup; the value is stored from then on.
//! let found = cx.resolve_in(dict, &ResourceKey::named("Heavy"), LookupScope::LOCAL_ONLY);
//! assert!(found.is_some());
//! ```
//!
//! ## Errors
//!
//! Mutations return [`ResourceError`] and never leave a partial change behind.
//! Lookups return `Option`: a missing key is not an error.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. Values are shared with
//! [`Rc`](alloc::rc::Rc), so a context is single-threaded.

#![no_std]

extern crate alloc;

mod cache;
mod collection;
mod context;
mod dictionary;
mod error;
mod key;
mod object;
mod options;
mod resolve;
mod scope;
mod slots;
mod value;

pub use context::{ContextEvent, ResourceContext};
pub use dictionary::{AddOptions, DeferredLoader, DictionaryFlags, DictionaryId};
pub use error::ResourceError;
pub use key::ResourceKey;
pub use object::ObjectId;
pub use options::{ContextOptions, ContextOptionsBuilder, DEFAULT_NOT_FOUND_CACHE_CAPACITY, Theme};
pub use resolve::{ResolveRequest, ResolveStart, Resolved};
pub use scope::LookupScope;
pub use value::ResourceValue;

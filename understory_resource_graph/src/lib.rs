// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Resource Graph: live dependency tracking for resolved resources.
//!
//! This crate sits on top of [`understory_resource`] and keeps properties
//! that resolved a resource up to date when the resource changes:
//!
//! - **Dependencies** ([`Dependency`], [`DependencyGraph`]): which property of
//!   which object resolved which key, from where, and with what outcome.
//!   Registration is cheap; the index is built lazily.
//! - **Validity** ([`Validity`], [`ValidityChange`]): whether a dependency
//!   resolved, missed, or found a value of the wrong type. Tooling is told
//!   about transitions only.
//! - **Styles** ([`StyleChainTracker`]): `BasedOn` chains, and which
//!   properties move when a chain changes.
//! - **Engine** ([`ResourceEngine`]): the tooling entry points (add, remove,
//!   and replace entries; insert and remove merged dictionaries; switch the
//!   theme) with their cascades, pushing values into a [`PropertySink`].
//!
//! ## Shadowing
//!
//! ```rust
//! use understory_resource::{AddOptions, ObjectId, ResourceContext, ResourceKey, ResourceValue};
//! use understory_resource_graph::{
//!     PropertyId, PropertySink, ResourceEngine, ResourceKind, ResourceReference,
//! };
//!
//! #[derive(Default)]
//! struct Count(usize);
//!
//! impl PropertySink for Count {
//!     fn set_property_value(&mut self, _: ObjectId, _: PropertyId, _: &ResourceValue) {
//!         self.0 += 1;
//!     }
//!     fn clear_property_value(&mut self, _: ObjectId, _: PropertyId) {
//!         self.0 += 1;
//!     }
//! }
//!
//! let mut engine = ResourceEngine::default();
//! let brush = ResourceKey::named("Brush");
//! let cx = engine.context_mut();
//! let app = cx.create_dictionary();
//! let lib = cx.create_dictionary();
//! let low = cx.create_dictionary();
//! cx.add(lib, brush.clone(), ResourceValue::new("lib"), AddOptions::default()).unwrap();
//! cx.add(low, brush.clone(), ResourceValue::new("low"), AddOptions::default()).unwrap();
//! cx.append_merged(app, lib).unwrap();
//! cx.set_resources(cx.application(), Some(app)).unwrap();
//! let button = cx.create_object(Some(cx.application()));
//!
//! let mut sink = Count::default();
//! let reference = ResourceReference::new(button, PropertyId::new(0), brush, ResourceKind::Static);
//! engine.resolve_resource(&mut sink, reference).unwrap();
//! assert_eq!(sink.0, 1);
//!
//! // `low` is inserted with the lowest priority, so `lib` still wins.
//! assert_eq!(engine.insert_merged_dictionary(&mut sink, app, 0, low), Ok(0));
//! assert_eq!(sink.0, 1);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod dependency;
mod engine;
mod error;
mod graph;
mod property;
mod style;

pub use dependency::{Dependency, DependencyId, ResourceKind, Validity, ValidityChange};
pub use engine::{PropertySink, ResourceEngine, ResourceReference};
pub use error::{ToolingError, ToolingStatus};
pub use graph::DependencyGraph;
pub use property::{PropertyId, PropertyRegistration, PropertyRegistry};
pub use style::{ConsumerStyles, ExtensionTarget, StyleChainTracker, StyleId, ValueSource};

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for resource resolution in `understory_resource`.
//!
//! These cover shadowing between merged dictionaries, overrides, the
//! not-found cache, deferred entries, object-tree ascent, and the global
//! theme resources.

use std::cell::Cell;
use std::rc::Rc;

use understory_resource::{
    AddOptions, ContextEvent, ContextOptionsBuilder, LookupScope, ResolveRequest, ResolveStart,
    ResourceContext, ResourceError, ResourceKey, ResourceValue, Theme,
};

fn key(name: &str) -> ResourceKey {
    ResourceKey::named(name)
}

fn add(cx: &mut ResourceContext, dict: understory_resource::DictionaryId, name: &str, value: &'static str) {
    cx.add(dict, key(name), ResourceValue::new(value), AddOptions::default())
        .unwrap();
}

fn text(found: Option<understory_resource::Resolved>) -> Option<&'static str> {
    found.and_then(|r| r.value.downcast_ref::<&'static str>().copied())
}

#[test]
fn later_merged_dictionary_wins_and_removal_falls_back() {
    let mut cx = ResourceContext::new();
    let app = cx.create_dictionary();
    let lib1 = cx.create_dictionary();
    let lib2 = cx.create_dictionary();
    add(&mut cx, lib1, "Brush", "lib1");
    add(&mut cx, lib2, "Brush", "lib2");
    cx.append_merged(app, lib1).unwrap();
    cx.append_merged(app, lib2).unwrap();

    assert_eq!(text(cx.resolve_in(app, &key("Brush"), LookupScope::MERGED)), Some("lib2"));

    cx.remove(lib2, &key("Brush")).unwrap();
    assert_eq!(text(cx.resolve_in(app, &key("Brush"), LookupScope::MERGED)), Some("lib1"));
}

#[test]
fn own_entry_beats_merged_entries() {
    let mut cx = ResourceContext::new();
    let app = cx.create_dictionary();
    let lib = cx.create_dictionary();
    add(&mut cx, lib, "Brush", "lib");
    add(&mut cx, app, "Brush", "app");
    cx.append_merged(app, lib).unwrap();

    assert_eq!(text(cx.resolve_in(app, &key("Brush"), LookupScope::ALL)), Some("app"));
}

#[test]
fn override_outranks_entries_added_before_and_after() {
    let mut cx = ResourceContext::new();
    let dict = cx.create_dictionary();
    add(&mut cx, dict, "Brush", "before");
    cx.add(dict, key("Brush"), ResourceValue::new("override"), AddOptions::OVERRIDE)
        .unwrap();
    add(&mut cx, dict, "Brush", "after");

    assert_eq!(text(cx.resolve_in(dict, &key("Brush"), LookupScope::ALL)), Some("override"));
    assert_eq!(cx.keys(dict), [key("Brush")]);
}

#[test]
fn rejected_cycle_leaves_lists_untouched() {
    let mut cx = ResourceContext::new();
    let a = cx.create_dictionary();
    let b = cx.create_dictionary();
    let c = cx.create_dictionary();
    cx.append_merged(a, b).unwrap();
    cx.append_merged(b, c).unwrap();
    let page = cx.create_object(Some(cx.application()));
    cx.set_resources(page, Some(c)).unwrap();

    let result = cx.insert_merged(c, 0, a);
    assert_eq!(result, Err(ResourceError::CycleDetected { parent: c, child: a }));
    assert_eq!(cx.merged(a), [b]);
    assert_eq!(cx.merged(b), [c]);
    assert!(cx.merged(c).is_empty());
    assert_eq!(cx.owner_of(a), None, "owner must not leak into a rejected child");
}

#[test]
fn cached_miss_is_invalidated_by_add_deep_in_the_tree() {
    let mut cx = ResourceContext::new();
    let app = cx.create_dictionary();
    let lib = cx.create_dictionary();
    let inner = cx.create_dictionary();
    cx.append_merged(app, lib).unwrap();
    cx.append_merged(lib, inner).unwrap();

    assert!(cx.resolve_in(app, &key("Late"), LookupScope::LOCAL_ONLY).is_none());
    assert!(cx.cached_misses(app) > 0);

    add(&mut cx, inner, "Late", "late");
    assert_eq!(text(cx.resolve_in(app, &key("Late"), LookupScope::LOCAL_ONLY)), Some("late"));
}

#[test]
fn cache_capacity_evicts_oldest_miss() {
    let options = ContextOptionsBuilder::new().not_found_cache_capacity(2).build();
    let mut cx = ResourceContext::with_options(options);
    let dict = cx.create_dictionary();
    for name in ["A", "B", "C"] {
        assert!(cx.resolve_in(dict, &key(name), LookupScope::LOCAL_ONLY).is_none());
    }
    assert_eq!(cx.cached_misses(dict), 2);
}

#[test]
fn deferred_thunk_runs_once_under_reentrant_lookups() {
    let mut cx = ResourceContext::new();
    let dict = cx.create_dictionary();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    cx.add_deferred(dict, key("Style"), move |cx| {
        counter.set(counter.get() + 1);
        // The resource looks itself up while being built: a soft miss.
        for _ in 0..3 {
            assert!(cx.resolve_in(dict, &key("Style"), LookupScope::ALL).is_none());
            assert!(cx.is_undeferring(dict, &key("Style")));
        }
        Some(ResourceValue::new("built"))
    })
    .unwrap();

    assert_eq!(text(cx.resolve_in(dict, &key("Style"), LookupScope::ALL)), Some("built"));
    assert_eq!(text(cx.resolve_in(dict, &key("Style"), LookupScope::ALL)), Some("built"));
    assert_eq!(calls.get(), 1);
    assert!(!cx.is_undeferring(dict, &key("Style")));
}

#[test]
fn deferred_loader_can_resolve_other_resources() {
    let mut cx = ResourceContext::new();
    let dict = cx.create_dictionary();
    add(&mut cx, dict, "Color", "blue");
    cx.add_deferred(dict, key("Brush"), move |cx| {
        let color = cx.resolve_in(dict, &key("Color"), LookupScope::ALL)?;
        let color = *color.value.downcast_ref::<&'static str>()?;
        Some(ResourceValue::new(format!("{color} brush")))
    })
    .unwrap();

    let found = cx.resolve_in(dict, &key("Brush"), LookupScope::ALL).unwrap();
    assert_eq!(found.value.downcast_ref::<String>().map(String::as_str), Some("blue brush"));
}

#[test]
fn lookup_ascends_the_object_tree() {
    let mut cx = ResourceContext::new();
    let app_dict = cx.create_dictionary();
    let page_dict = cx.create_dictionary();
    add(&mut cx, app_dict, "Accent", "app");
    add(&mut cx, page_dict, "Margin", "page");
    cx.set_resources(cx.application(), Some(app_dict)).unwrap();
    let page = cx.create_object(Some(cx.application()));
    cx.set_resources(page, Some(page_dict)).unwrap();
    let button = cx.create_object(Some(page));

    let accent = ResolveRequest::new(key("Accent"), ResolveStart::Object(button));
    let found = cx.resolve(&accent).unwrap();
    assert_eq!(found.dictionary, app_dict);

    // Starting from a dictionary ascends from its owner.
    let from_dict = ResolveRequest::new(key("Accent"), ResolveStart::Dictionary(page_dict));
    assert_eq!(cx.resolve(&from_dict).unwrap().dictionary, app_dict);
    assert!(cx.resolve(&from_dict.clone().ascend(false)).is_none());
}

#[test]
fn ascent_stops_at_a_destroyed_ancestor() {
    let mut cx = ResourceContext::new();
    let app_dict = cx.create_dictionary();
    add(&mut cx, app_dict, "Accent", "app");
    cx.set_resources(cx.application(), Some(app_dict)).unwrap();
    let page = cx.create_object(Some(cx.application()));
    let button = cx.create_object(Some(page));

    let request = ResolveRequest::new(key("Accent"), ResolveStart::Object(button));
    assert!(cx.resolve(&request).is_some());

    cx.destroy_object(page);
    assert!(cx.resolve(&request).is_none());

    cx.reparent_object(button, Some(cx.application())).unwrap();
    assert!(cx.resolve(&request).is_some());
}

#[test]
fn global_theme_resources_are_searched_last() {
    let mut cx = ResourceContext::new();
    let global = cx.create_dictionary();
    let light = cx.create_dictionary();
    let dark = cx.create_dictionary();
    add(&mut cx, light, "SystemAccent", "light-global");
    add(&mut cx, dark, "SystemAccent", "dark-global");
    cx.set_theme_dictionary(global, "Light", light).unwrap();
    cx.set_theme_dictionary(global, "Dark", dark).unwrap();
    cx.install_global_theme_resources(Some(global)).unwrap();

    let app_dict = cx.create_dictionary();
    cx.set_resources(cx.application(), Some(app_dict)).unwrap();
    let button = cx.create_object(Some(cx.application()));

    let request = ResolveRequest::new(key("SystemAccent"), ResolveStart::Object(button));
    assert_eq!(text(cx.resolve(&request)), Some("light-global"));
    let local_only = request.clone().scope(LookupScope::LOCAL_ONLY);
    assert!(cx.resolve(&local_only).is_none());

    cx.set_theme(Theme::DARK);
    assert_eq!(text(cx.resolve(&request)), Some("dark-global"));

    // An application value shadows the global one.
    add(&mut cx, app_dict, "SystemAccent", "app");
    assert_eq!(text(cx.resolve(&request)), Some("app"));
}

#[test]
fn skipped_dictionary_is_not_searched() {
    let mut cx = ResourceContext::new();
    let global = cx.create_dictionary();
    add(&mut cx, global, "K", "global");
    cx.install_global_theme_resources(Some(global)).unwrap();
    let app_dict = cx.create_dictionary();
    cx.set_resources(cx.application(), Some(app_dict)).unwrap();

    let request = ResolveRequest::new(key("K"), ResolveStart::Dictionary(app_dict));
    assert_eq!(text(cx.resolve(&request)), Some("global"));
    assert!(cx.resolve(&request.clone().skip(global)).is_none());
}

#[test]
fn implicit_style_changes_are_reported_to_the_owner() {
    let mut cx = ResourceContext::new();
    let page = cx.create_object(Some(cx.application()));
    let dict = cx.create_dictionary();
    let lib = cx.create_dictionary();
    cx.set_resources(page, Some(dict)).unwrap();
    assert!(cx.take_events().is_empty());

    cx.add(lib, ResourceKey::for_type("Button"), ResourceValue::new("style"), AddOptions::default())
        .unwrap();
    assert!(cx.take_events().is_empty(), "unowned dictionary reports nothing");

    cx.append_merged(dict, lib).unwrap();
    assert_eq!(cx.take_events(), [ContextEvent::ImplicitStylesInvalidated { owner: page }]);

    let style = cx
        .resolve_implicit_style(ResolveStart::Object(page), "Button")
        .unwrap();
    assert_eq!(style.dictionary, lib);

    cx.clear_merged(dict).unwrap();
    assert_eq!(cx.take_events(), [ContextEvent::ImplicitStylesInvalidated { owner: page }]);
    assert!(cx.resolve_implicit_style(ResolveStart::Object(page), "Button").is_none());
}

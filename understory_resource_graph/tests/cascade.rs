// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for dependency cascades in `understory_resource_graph`.
//!
//! A recording sink captures every value the engine pushes, so each test can
//! assert exactly which properties were updated by a mutation.

use understory_resource::{
    AddOptions, DictionaryId, ObjectId, ResolveStart, ResourceKey, ResourceValue, Theme,
};
use understory_resource_graph::{
    ConsumerStyles, DependencyId, ExtensionTarget, PropertyId, PropertySink, ResourceEngine,
    ResourceKind, ResourceReference, ToolingError, ToolingStatus, Validity, ValidityChange,
};

#[derive(Debug, Default)]
struct Recorder {
    updates: Vec<(ObjectId, PropertyId, Option<&'static str>)>,
}

impl Recorder {
    fn take(&mut self) -> Vec<(ObjectId, PropertyId, Option<&'static str>)> {
        std::mem::take(&mut self.updates)
    }
}

impl PropertySink for Recorder {
    fn set_property_value(&mut self, subscriber: ObjectId, property: PropertyId, value: &ResourceValue) {
        let text = value.downcast_ref::<&'static str>().copied();
        self.updates.push((subscriber, property, text));
    }

    fn clear_property_value(&mut self, subscriber: ObjectId, property: PropertyId) {
        self.updates.push((subscriber, property, None));
    }
}

fn key(name: &str) -> ResourceKey {
    ResourceKey::named(name)
}

fn text(value: &'static str) -> ResourceValue {
    ResourceValue::new(value)
}

/// `App` with merged `[Lib1, Lib2]`, both defining `Brush`, installed as the
/// application resources.
struct Fixture {
    engine: ResourceEngine,
    sink: Recorder,
    app: DictionaryId,
    lib1: DictionaryId,
    lib2: DictionaryId,
    fill: PropertyId,
}

impl Fixture {
    fn new() -> Self {
        let mut engine = ResourceEngine::default();
        let fill = engine.properties_mut().register::<&'static str>("Fill");
        let cx = engine.context_mut();
        let app = cx.create_dictionary();
        let lib1 = cx.create_dictionary();
        let lib2 = cx.create_dictionary();
        cx.add(lib1, key("Brush"), text("lib1"), AddOptions::default())
            .unwrap();
        cx.add(lib2, key("Brush"), text("lib2"), AddOptions::default())
            .unwrap();
        cx.append_merged(app, lib1).unwrap();
        cx.append_merged(app, lib2).unwrap();
        cx.set_resources(cx.application(), Some(app)).unwrap();
        Self {
            engine,
            sink: Recorder::default(),
            app,
            lib1,
            lib2,
            fill,
        }
    }

    fn object(&mut self) -> ObjectId {
        let cx = self.engine.context_mut();
        cx.create_object(Some(cx.application()))
    }

    fn track(&mut self, subscriber: ObjectId, name: &str, kind: ResourceKind) -> Validity {
        let reference = ResourceReference::new(subscriber, self.fill, key(name), kind);
        self.engine
            .resolve_resource(&mut self.sink, reference)
            .unwrap()
    }
}

#[test]
fn removal_falls_back_to_the_earlier_merged_dictionary() {
    let mut fx = Fixture::new();
    let button = fx.object();
    assert_eq!(fx.track(button, "Brush", ResourceKind::Static), Validity::Resolved);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("lib2"))]);

    let pushed = fx
        .engine
        .remove_dictionary_item(&mut fx.sink, fx.lib2, &key("Brush"))
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("lib1"))]);
}

#[test]
fn replacing_a_value_updates_only_its_dependents_once() {
    let mut fx = Fixture::new();
    let fx_app = fx.app;
    fx.engine
        .context_mut()
        .add(fx_app, key("Margin"), text("4"), AddOptions::default())
        .unwrap();
    let a = fx.object();
    let b = fx.object();
    fx.track(a, "Brush", ResourceKind::Static);
    fx.track(b, "Margin", ResourceKind::Static);
    fx.sink.take();

    fx.engine
        .replace_resource(&mut fx.sink, fx.lib2, key("Brush"), text("new"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(a, fx.fill, Some("new"))]);
}

#[test]
fn replacing_a_shadowed_value_pushes_nothing() {
    let mut fx = Fixture::new();
    let button = fx.object();
    fx.track(button, "Brush", ResourceKind::Static);
    fx.sink.take();

    let pushed = fx
        .engine
        .replace_resource(&mut fx.sink, fx.lib1, key("Brush"), text("hidden"))
        .unwrap();
    assert_eq!(pushed, 0);
    assert!(fx.sink.take().is_empty());
}

#[test]
fn lowest_priority_insert_does_not_replay() {
    let mut fx = Fixture::new();
    let button = fx.object();
    fx.track(button, "Brush", ResourceKind::Static);
    fx.sink.take();

    let lib3 = fx.engine.context_mut().create_dictionary();
    fx.engine
        .context_mut()
        .add(lib3, key("Brush"), text("lib3"), AddOptions::default())
        .unwrap();
    let pushed = fx
        .engine
        .insert_merged_dictionary(&mut fx.sink, fx.app, 0, lib3)
        .unwrap();
    assert_eq!(pushed, 0);
    assert!(fx.sink.take().is_empty());
    assert_eq!(fx.engine.context().merged(fx.app), [lib3, fx.lib1, fx.lib2]);
}

#[test]
fn highest_priority_insert_replays_shadowed_keys() {
    let mut fx = Fixture::new();
    let button = fx.object();
    fx.track(button, "Brush", ResourceKind::Static);
    fx.sink.take();

    let lib3 = fx.engine.context_mut().create_dictionary();
    fx.engine
        .context_mut()
        .add(lib3, key("Brush"), text("lib3"), AddOptions::default())
        .unwrap();
    let pushed = fx
        .engine
        .insert_merged_dictionary(&mut fx.sink, fx.app, usize::MAX, lib3)
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("lib3"))]);

    let pushed = fx
        .engine
        .remove_merged_dictionary(&mut fx.sink, fx.app, lib3)
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("lib2"))]);
}

#[test]
fn rejected_insert_changes_nothing() {
    let mut fx = Fixture::new();
    let result = fx
        .engine
        .insert_merged_dictionary(&mut fx.sink, fx.lib1, 0, fx.app);
    assert!(matches!(result, Err(ToolingError::InvalidArgument(_))));
    assert_eq!(result.unwrap_err().status(), ToolingStatus::InvalidArgument);
    assert!(fx.engine.context().merged(fx.lib1).is_empty());
}

#[test]
fn missing_key_becomes_resolved_and_reports_a_transition() {
    let mut fx = Fixture::new();
    let button = fx.object();
    assert_eq!(fx.track(button, "Accent", ResourceKind::Static), Validity::NotFound);
    assert_eq!(fx.sink.take(), [(button, fx.fill, None)]);

    fx.engine
        .add_dictionary_item(&mut fx.sink, fx.app, key("Accent"), text("blue"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("blue"))]);
    assert_eq!(
        fx.engine.take_validity_changes(),
        [ValidityChange {
            dependency: DependencyId {
                subscriber: button,
                property: fx.fill,
            },
            key: key("Accent"),
            from: Validity::NotFound,
            to: Validity::Resolved,
        }]
    );

    // Same validity, new value: pushed, but no transition.
    fx.engine
        .replace_resource(&mut fx.sink, fx.app, key("Accent"), text("teal"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("teal"))]);
    assert!(fx.engine.take_validity_changes().is_empty());
}

#[test]
fn wrong_type_is_recorded_and_revalidated() {
    let mut fx = Fixture::new();
    let button = fx.object();
    fx.track(button, "Brush", ResourceKind::Static);
    fx.sink.take();

    fx.engine
        .replace_resource(&mut fx.sink, fx.lib2, key("Brush"), ResourceValue::new(3_u32))
        .unwrap();
    assert_eq!(fx.sink.take(), [(button, fx.fill, None)]);
    let changes = fx.engine.take_validity_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].to, Validity::InvalidType);

    let id = DependencyId {
        subscriber: button,
        property: fx.fill,
    };
    let lib2 = fx.lib2;
    fx.engine
        .context_mut()
        .add(lib2, key("Brush"), text("fixed"), AddOptions::default())
        .unwrap();
    assert_eq!(fx.engine.revalidate(&mut fx.sink, id), Ok(Validity::Resolved));
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("fixed"))]);
}

#[test]
fn theme_switch_replays_theme_references_only() {
    let mut fx = Fixture::new();
    let cx = fx.engine.context_mut();
    let light = cx.create_dictionary();
    let dark = cx.create_dictionary();
    cx.add(light, key("Fg"), text("black"), AddOptions::default())
        .unwrap();
    cx.add(dark, key("Fg"), text("white"), AddOptions::default())
        .unwrap();
    cx.set_theme_dictionary(fx.app, "Light", light).unwrap();
    cx.set_theme_dictionary(fx.app, "Dark", dark).unwrap();

    let themed = fx.object();
    let fixed = fx.object();
    fx.track(themed, "Fg", ResourceKind::Theme);
    fx.track(fixed, "Fg", ResourceKind::Static);
    fx.sink.take();

    assert_eq!(fx.engine.set_theme(&mut fx.sink, Theme::DARK), 1);
    assert_eq!(fx.sink.take(), [(themed, fx.fill, Some("white"))]);
    assert_eq!(fx.engine.set_theme(&mut fx.sink, Theme::DARK), 0);
}

#[test]
fn dead_subscribers_are_evicted_silently() {
    let mut fx = Fixture::new();
    let a = fx.object();
    let b = fx.object();
    fx.track(a, "Brush", ResourceKind::Static);
    fx.track(b, "Brush", ResourceKind::Static);
    fx.sink.take();

    fx.engine.context_mut().destroy_object(a);
    fx.engine
        .replace_resource(&mut fx.sink, fx.lib2, key("Brush"), text("next"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(b, fx.fill, Some("next"))]);
    assert_eq!(fx.engine.graph().len(), 1);
}

#[test]
fn tooling_errors_map_to_status_codes() {
    let mut fx = Fixture::new();
    let missing = fx
        .engine
        .remove_dictionary_item(&mut fx.sink, fx.app, &key("Nope"))
        .unwrap_err();
    assert_eq!(missing, ToolingError::NotFound);

    let replace = fx
        .engine
        .replace_resource(&mut fx.sink, fx.app, key("Nope"), text("x"))
        .unwrap_err();
    assert_eq!(replace.status(), ToolingStatus::NotFound);

    let cx = fx.engine.context_mut();
    let stale = cx.create_dictionary();
    cx.destroy_dictionary(stale).unwrap();
    let err = fx
        .engine
        .add_dictionary_item(&mut fx.sink, stale, key("K"), text("x"))
        .unwrap_err();
    assert_eq!(err, ToolingError::HandleNotFound);

    let app = fx.app;
    fx.engine.context_mut().set_read_only(app, true).unwrap();
    let err = fx
        .engine
        .add_dictionary_item(&mut fx.sink, app, key("K"), text("x"))
        .unwrap_err();
    assert_eq!(err.status(), ToolingStatus::InvalidArgument);
}

#[test]
fn based_on_change_pushes_moved_style_values() {
    let mut fx = Fixture::new();
    let button = fx.object();
    let fill = fx.fill;
    let styles = fx.engine.styles_mut();
    let old_base = styles.create_style();
    let new_base = styles.create_style();
    let style = styles.create_style();
    styles.set_setter(old_base, fill, Some(text("old"))).unwrap();
    styles.set_setter(new_base, fill, Some(text("new"))).unwrap();
    styles.set_based_on(style, Some(old_base)).unwrap();
    styles.set_consumer_styles(
        button,
        ConsumerStyles {
            explicit: Some(style),
            built_in: None,
        },
    );

    let moved = fx
        .engine
        .set_style_based_on(&mut fx.sink, style, Some(new_base))
        .unwrap();
    assert_eq!(moved, [DependencyId { subscriber: button, property: fill }]);
    assert_eq!(fx.sink.take(), [(button, fill, Some("new"))]);

    assert_eq!(
        fx.engine.set_style_based_on(&mut fx.sink, new_base, Some(style)),
        Err(ToolingError::StyleCycle(new_base))
    );
}

#[test]
fn style_setter_backed_by_a_resource_follows_it() {
    let mut fx = Fixture::new();
    let button = fx.object();
    let fill = fx.fill;
    let app = fx.app;
    let style = fx.engine.styles_mut().create_style();
    fx.engine.styles_mut().set_consumer_styles(
        button,
        ConsumerStyles {
            explicit: Some(style),
            built_in: None,
        },
    );
    fx.engine.styles_mut().register_extension_target(
        key("Accent"),
        ExtensionTarget {
            style,
            property: fill,
            origin: ResolveStart::Dictionary(app),
        },
    );

    let pushed = fx
        .engine
        .add_dictionary_item(&mut fx.sink, app, key("Accent"), text("accent"))
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(button, fill, Some("accent"))]);
    assert!(fx.engine.styles().setter(style, fill).is_some());

    fx.engine
        .remove_dictionary_item(&mut fx.sink, app, &key("Accent"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(button, fill, None)]);
}

#[test]
fn destroyed_extension_origin_leaves_live_setters_alone() {
    let mut fx = Fixture::new();
    let fill = fx.fill;
    let app = fx.app;
    let page = fx.object();
    let button = fx.object();
    let cx = fx.engine.context_mut();
    let page_dict = cx.create_dictionary();
    cx.add(page_dict, key("Accent"), text("page"), AddOptions::default())
        .unwrap();
    cx.add(app, key("Accent"), text("app"), AddOptions::default())
        .unwrap();
    cx.set_resources(page, Some(page_dict)).unwrap();

    let style = fx.engine.styles_mut().create_style();
    fx.engine.styles_mut().set_consumer_styles(
        button,
        ConsumerStyles {
            explicit: Some(style),
            built_in: None,
        },
    );
    fx.engine.styles_mut().register_extension_target(
        key("Accent"),
        ExtensionTarget {
            style,
            property: fill,
            origin: ResolveStart::Object(page),
        },
    );
    fx.engine
        .replace_resource(&mut fx.sink, page_dict, key("Accent"), text("page"))
        .unwrap();
    assert_eq!(fx.sink.take(), [(button, fill, Some("page"))]);

    fx.engine.context_mut().destroy_object(page);
    let pushed = fx
        .engine
        .replace_resource(&mut fx.sink, app, key("Accent"), text("app2"))
        .unwrap();
    assert_eq!(pushed, 0);
    assert!(fx.sink.take().is_empty());
    let setter = fx.engine.styles().setter(style, fill);
    assert_eq!(setter.and_then(|v| v.downcast_ref::<&'static str>().copied()), Some("page"));
    assert!(fx.engine.styles().extension_targets(&key("Accent")).is_empty());
}

#[test]
fn extension_update_counts_only_moved_values() {
    let mut fx = Fixture::new();
    let fill = fx.fill;
    let plain = fx.object();
    let shadowed = fx.object();
    let styles = fx.engine.styles_mut();
    let base = styles.create_style();
    let derived = styles.create_style();
    styles.set_setter(derived, fill, Some(text("own"))).unwrap();
    styles.set_based_on(derived, Some(base)).unwrap();
    styles.set_consumer_styles(
        plain,
        ConsumerStyles {
            explicit: Some(base),
            built_in: None,
        },
    );
    styles.set_consumer_styles(
        shadowed,
        ConsumerStyles {
            explicit: Some(derived),
            built_in: None,
        },
    );

    let accent = text("accent");
    let pushed = fx
        .engine
        .on_extension_value_changed(&mut fx.sink, base, fill, Some(accent.clone()))
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(plain, fill, Some("accent"))]);

    let pushed = fx
        .engine
        .on_extension_value_changed(&mut fx.sink, base, fill, Some(accent))
        .unwrap();
    assert_eq!(pushed, 0);
    assert!(fx.sink.take().is_empty());
}

#[test]
fn reparenting_replays_the_new_ascent() {
    let mut fx = Fixture::new();
    let app = fx.app;
    let page = fx.object();
    let cx = fx.engine.context_mut();
    let button = cx.create_object(Some(page));
    let page_dict = cx.create_dictionary();
    cx.add(page_dict, key("Accent"), text("page"), AddOptions::default())
        .unwrap();
    cx.add(app, key("Accent"), text("app"), AddOptions::default())
        .unwrap();
    cx.set_resources(page, Some(page_dict)).unwrap();
    fx.track(button, "Accent", ResourceKind::Static);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("page"))]);

    let application = fx.engine.context().application();
    let pushed = fx
        .engine
        .reparent_object(&mut fx.sink, button, Some(application))
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(button, fx.fill, Some("app"))]);

    let err = fx
        .engine
        .reparent_object(&mut fx.sink, page, Some(page))
        .unwrap_err();
    assert_eq!(err.status(), ToolingStatus::InvalidArgument);
}

#[test]
fn changing_resources_replays_descendants() {
    let mut fx = Fixture::new();
    let app = fx.app;
    let page = fx.object();
    let outside = fx.object();
    let cx = fx.engine.context_mut();
    let label = cx.create_object(Some(page));
    let page_dict = cx.create_dictionary();
    cx.add(page_dict, key("Accent"), text("page"), AddOptions::default())
        .unwrap();
    cx.add(app, key("Accent"), text("app"), AddOptions::default())
        .unwrap();
    fx.track(label, "Accent", ResourceKind::Static);
    fx.track(outside, "Accent", ResourceKind::Static);
    fx.sink.take();

    let pushed = fx
        .engine
        .set_resources(&mut fx.sink, page, Some(page_dict))
        .unwrap();
    assert_eq!(pushed, 1);
    assert_eq!(fx.sink.take(), [(label, fx.fill, Some("page"))]);

    fx.engine.set_resources(&mut fx.sink, page, None).unwrap();
    assert_eq!(fx.sink.take(), [(label, fx.fill, Some("app"))]);
}

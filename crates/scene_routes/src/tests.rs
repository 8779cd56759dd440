//! End-to-end behavior of a running scene.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::Vec3;

use crate::events::{ChannelSink, FnSink};
use crate::field::{FieldType, FieldValue};
use crate::loader::content::{CancelToken, Content, ContentProvider, MemoryProvider};
use crate::node::load::LoadState;
use crate::node::registry::NodeTypeRegistry;
use crate::node::{NodeId, NodeType};
use crate::report::{Severity, VecReporter};
use crate::scene::{FnHook, HookContext};
use crate::space::SpaceKind;
use crate::{Error, Result, RuntimeConfig, Scene, SceneEvent};

const WAIT: Duration = Duration::from_secs(5);

fn scene() -> (Scene, VecReporter) {
    let mut scene = Scene::new(RuntimeConfig::default()).expect("valid config");
    let reports = VecReporter::new();
    scene.set_reporter(reports.clone());
    (scene, reports)
}

fn named(scene: &Scene, name: &str) -> NodeId {
    scene
        .named_node(name)
        .unwrap_or_else(|| panic!("{name} is defined"))
}

fn float(scene: &Scene, node: NodeId, field: &str) -> f32 {
    scene
        .field_value_by_name(node, field)
        .ok()
        .and_then(FieldValue::as_f32)
        .unwrap_or_else(|| panic!("{field} holds a float"))
}

fn strings(scene: &Scene, node: NodeId) -> Vec<String> {
    scene
        .field_value_by_name(node, "value")
        .ok()
        .and_then(FieldValue::as_string_slice)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

fn events(rx: &Receiver<SceneEvent>) -> Vec<SceneEvent> {
    rx.try_iter().collect()
}

fn load_events(rx: &Receiver<SceneEvent>) -> Vec<SceneEvent> {
    events(rx)
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                SceneEvent::ContentStateChanged { .. } | SceneEvent::ContentReady { .. }
            )
        })
        .collect()
}

#[test]
fn field_indices_are_stable_per_type() {
    let (mut s, _) = scene();
    let space = s.main_space();
    let a = s.create_node(space, "Transform").expect("built-in");
    let b = s.create_node(space, "Transform").expect("built-in");
    for name in ["children", "rotation", "translation", "bboxSize"] {
        assert_eq!(s.field_index(a, name).ok(), s.field_index(b, name).ok());
    }
    let t = s.field_index(a, "translation").expect("declared");
    assert_eq!(s.field_index(a, "set_translation").ok(), Some(t));
    assert_eq!(s.field_index(a, "translation_changed").ok(), Some(t));
    let bbox = s.field_index(a, "bboxSize").expect("declared");
    assert!(s.field_index(a, "set_bboxSize").is_err());
    assert_ne!(bbox, t);
}

#[test]
fn every_value_kind_reads_back_what_was_set() {
    let mut registry = NodeTypeRegistry::with_standard_types();
    let mut all_kinds = NodeType::builder("AllKinds");
    let fields = [
        ("b", FieldType::SFBool),
        ("i", FieldType::SFInt32),
        ("f", FieldType::SFFloat),
        ("d", FieldType::SFDouble),
        ("s", FieldType::SFString),
        ("n", FieldType::SFNode),
        ("bs", FieldType::MFBool),
        ("is", FieldType::MFInt32),
        ("fs", FieldType::MFFloat),
        ("ds", FieldType::MFDouble),
        ("ss", FieldType::MFString),
        ("ns", FieldType::MFNode),
    ];
    for (name, ty) in fields {
        all_kinds = all_kinds.exposed_field(name, ty, FieldValue::default_for(ty));
    }
    registry.register(all_kinds.build().expect("all-kinds type builds"));

    let mut s = Scene::with_registry(Arc::new(registry), RuntimeConfig::default())
        .expect("valid config");
    let space = s.main_space();
    let p = s.create_node(space, "AllKinds").expect("registered");
    let other = s.create_node(space, "Group").expect("built-in");
    s.finish_setup(p).expect("exists");
    let idx = |s: &Scene, name: &str| s.field_index(p, name).expect("declared");

    let i = idx(&s, "b");
    s.set_bool(p, i, true).expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_bool), Some(true));
    let i = idx(&s, "i");
    s.set_int(p, i, -7).expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_i32), Some(-7));
    let i = idx(&s, "f");
    s.set_float(p, i, 0.25).expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_f32), Some(0.25));
    let i = idx(&s, "d");
    s.set_double(p, i, 1e-9).expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_f64), Some(1e-9));
    let i = idx(&s, "s");
    s.set_string(p, i, "grass").expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_str), Some("grass"));
    let i = idx(&s, "n");
    s.set_node(p, i, Some(other)).expect("valid");
    assert_eq!(s.field_value(p, i).ok().and_then(FieldValue::as_node), Some(other));

    let i = idx(&s, "bs");
    s.set_value(p, i, vec![true, false]).expect("valid");
    assert_eq!(
        s.field_value(p, i).ok().and_then(FieldValue::as_bool_slice),
        Some(&[true, false][..])
    );
    let i = idx(&s, "is");
    s.set_int_array(p, i, vec![1, 2, 3, 4], 3).expect("valid");
    assert_eq!(
        s.field_value(p, i).ok().and_then(FieldValue::as_i32_slice),
        Some(&[1, 2, 3][..])
    );
    let i = idx(&s, "fs");
    s.set_float_array(p, i, vec![0.5, 1.5], 2).expect("valid");
    assert_eq!(
        s.field_value(p, i).ok().and_then(FieldValue::as_f32_slice),
        Some(&[0.5, 1.5][..])
    );
    let i = idx(&s, "ds");
    s.set_value(p, i, vec![2.0f64]).expect("valid");
    assert_eq!(
        s.field_value(p, i).ok().and_then(FieldValue::as_f64_slice),
        Some(&[2.0][..])
    );
    let i = idx(&s, "ss");
    s.set_string_array(p, i, vec!["a".into(), "b".into(), "c".into()], 1)
        .expect("valid");
    assert_eq!(
        s.field_value(p, i).ok().and_then(FieldValue::as_string_slice),
        Some(&["a".to_owned()][..])
    );
    let i = idx(&s, "ns");
    s.set_node_array(p, i, vec![other, other]).expect("valid");
    assert_eq!(s.field_value(p, i).map(FieldValue::node_refs).ok(), Some(vec![other, other]));
}

#[test]
fn rejected_values_leave_the_field_unchanged() {
    let (mut s, _) = scene();
    let roots = s.load_str("LineSet { vertexCount [2 3] }").expect("valid");
    let line_set = roots[0];
    let vc = s.field_index(line_set, "vertexCount").expect("declared");

    let err = s.set_int_array(line_set, vc, vec![2, 1], 2).expect_err("1 is too short");
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
    assert_eq!(
        s.field_value(line_set, vc).ok().and_then(FieldValue::as_i32_slice),
        Some(&[2, 3][..])
    );
    assert!(!s.has_field_changed(line_set, vc).expect("exists"));

    let err = s.set_value(line_set, vc, "not ints").expect_err("wrong kind");
    assert!(matches!(err, Error::InvalidField { .. }));
}

#[test]
fn vector_widths_are_enforced() {
    let (mut s, _) = scene();
    let roots = s.load_str("Transform {} Coordinate {}").expect("valid");
    let (t, coord) = (roots[0], roots[1]);
    let translation = s.field_index(t, "translation").expect("declared");
    let point = s.field_index(coord, "point").expect("declared");

    let err = s.set_float_array(t, translation, vec![1.0, 2.0], 2).expect_err("needs 3");
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
    let err = s.set_float_array(coord, point, vec![1.0; 4], 4).expect_err("not a multiple of 3");
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
    s.set_float_array(coord, point, vec![1.0; 7], 6).expect("two points");
    assert_eq!(s.field_value(coord, point).map(FieldValue::valid_count).ok(), Some(6));
}

#[test]
fn transform_with_nested_shape_loads_as_one_root() {
    let (mut s, reports) = scene();
    let roots = s
        .load_str("Transform{translation -3 0 0 children Shape{geometry Sphere{}}}")
        .expect("valid content");
    assert_eq!(roots.len(), 1);
    assert_eq!(s.root_nodes(), &roots[..]);
    assert_eq!(s.node(roots[0]).map(|n| n.type_name()), Some("Transform"));
    assert_eq!(
        s.field_value_by_name(roots[0], "translation").ok().and_then(FieldValue::as_vec3),
        Some(Vec3::new(-3.0, 0.0, 0.0))
    );
    assert_eq!(s.num_nodes(), 3);
    assert!(reports.is_empty());
}

#[test]
fn chained_routes_settle_in_one_tick() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {} DEF C MetadataString {}
         ROUTE A.value_changed TO B.set_value
         ROUTE B.value_changed TO C.set_value",
    )
    .expect("valid");
    let (a, c) = (named(&s, "A"), named(&s, "C"));
    s.set_value_by_name(a, "value", FieldValue::strings(["go"])).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.routes_fired, 2);
    assert_eq!(strings(&s, c), vec!["go"]);
    assert_eq!(s.pending_events(), 0);

    let quiet = s.process_routes(0.1).expect("tick");
    assert_eq!(quiet.routes_fired, 0);
}

#[test]
fn cycles_terminate() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {}
         ROUTE A.value_changed TO B.set_value
         ROUTE B.value_changed TO A.set_value",
    )
    .expect("valid");
    let (a, b) = (named(&s, "A"), named(&s, "B"));
    s.set_value_by_name(a, "value", FieldValue::strings(["ping"])).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.routes_fired, 2);
    assert_eq!(stats.loops_broken, 1);
    assert_eq!(strings(&s, a), vec!["ping"]);
    assert_eq!(strings(&s, b), vec!["ping"]);

    // Every tick starts with a fresh set of fired routes.
    s.set_value_by_name(b, "value", FieldValue::strings(["pong"])).expect("valid");
    let stats = s.process_routes(1.0).expect("tick");
    assert_eq!(stats.routes_fired, 2);
    assert_eq!(strings(&s, a), vec!["pong"]);
}

#[test]
fn fan_in_keeps_the_last_delivered_value() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF S ScalarInterpolator { key [0 1] keyValue [0 1] }
         DEF B ScalarInterpolator { key [0 1] keyValue [0 0.25] }
         DEF C ScalarInterpolator { key [0 1] keyValue [0 0.75] }
         DEF D ScalarInterpolator { key [0 1] keyValue [0 1] }
         DEF E Material {}
         ROUTE S.value_changed TO B.set_fraction
         ROUTE S.value_changed TO C.set_fraction
         ROUTE B.value_changed TO D.set_fraction
         ROUTE C.value_changed TO D.set_fraction
         ROUTE D.value_changed TO E.set_transparency",
    )
    .expect("valid");
    let source = named(&s, "S");
    s.set_value_by_name(source, "set_fraction", 1.0f32).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");

    assert_eq!(stats.routes_fired, 5);
    assert_eq!(stats.loops_broken, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(float(&s, named(&s, "D"), "value_changed"), 0.75);
    assert_eq!(float(&s, named(&s, "E"), "transparency"), 0.75);
}

#[test]
fn rejoined_fan_in_leaves_downstream_with_the_first_delivery() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF S ScalarInterpolator { key [0 1] keyValue [0 1] }
         DEF B ScalarInterpolator { key [0 1] keyValue [0 0.25] }
         DEF D ScalarInterpolator { key [0 1] keyValue [0 0.5] }
         DEF E Material {}
         ROUTE S.value_changed TO D.set_fraction
         ROUTE S.value_changed TO B.set_fraction
         ROUTE B.value_changed TO D.set_fraction
         ROUTE D.value_changed TO E.set_transparency",
    )
    .expect("valid");
    let source = named(&s, "S");
    s.set_value_by_name(source, "set_fraction", 1.0f32).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");

    // D is reached directly and again through B; D -> E already fired for the first value.
    assert_eq!(stats.routes_fired, 4);
    assert_eq!(stats.loops_broken, 1);
    assert_eq!(float(&s, named(&s, "D"), "value_changed"), 0.125);
    assert_eq!(float(&s, named(&s, "E"), "transparency"), 0.5);
}

#[test]
fn failing_destinations_do_not_stop_the_cascade() {
    let (mut s, reports) = scene();
    s.load_str(
        "DEF Ramp ScalarInterpolator { key [0 1] keyValue [0 5] }
         DEF Mat Material {}
         DEF Other ScalarInterpolator { key [0 5] keyValue [0 10] }
         ROUTE Ramp.value_changed TO Mat.set_transparency
         ROUTE Ramp.value_changed TO Other.set_fraction",
    )
    .expect("valid");
    let ramp = named(&s, "Ramp");
    s.set_value_by_name(ramp, "set_fraction", 1.0f32).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");

    assert_eq!(stats.routes_fired, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(reports.count(Severity::Error), 1);
    assert_eq!(float(&s, named(&s, "Mat"), "transparency"), 0.0);
    assert_eq!(float(&s, named(&s, "Other"), "value_changed"), 10.0);
}

#[test]
fn root_node_changes_are_visible_immediately() {
    let (mut s, _) = scene();
    let space = s.main_space();
    let group = s.create_node(space, "Group").expect("built-in");
    assert!(s.add_root_node(group).expect("exists"));
    assert_eq!(s.root_nodes(), &[group]);
    assert!(!s.add_root_node(group).expect("exists"));
    assert_eq!(s.root_nodes().len(), 1);
    assert!(s.remove_root_node(group).expect("space exists"));
    assert!(s.root_nodes().is_empty());
    assert!(!s.remove_root_node(group).expect("space exists"));
}

#[test]
fn routes_stay_inside_their_space() {
    let (mut s, _) = scene();
    let main = s.main_space();
    let proto = s.create_space(SpaceKind::Proto, main).expect("parent exists");
    let a = s.create_node(main, "MetadataString").expect("built-in");
    let b = s.create_node(proto, "MetadataString").expect("built-in");
    let route = s.route_by_name(a, "value_changed", b, "set_value").expect("fields exist");
    let err = s.add_route(route).expect_err("different spaces");
    assert!(matches!(err, Error::InvalidRoute(_)));
    assert_eq!(s.space(proto).and_then(|sp| sp.parent()), Some(main));
}

#[test]
fn cascade_finished_is_sent_once_per_tick() {
    let (mut s, _) = scene();
    let seen: Arc<Mutex<Vec<SceneEvent>>> = Arc::default();
    let log = seen.clone();
    s.add_sink(FnSink::new(move |e| {
        if let Ok(mut log) = log.lock() {
            log.push(e);
        }
    }));
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {}
         ROUTE A.value_changed TO B.set_value",
    )
    .expect("valid");
    let a = named(&s, "A");

    for (tick, time) in [0.0, 0.5, 1.0].into_iter().enumerate() {
        if tick != 1 {
            s.set_value_by_name(a, "value", FieldValue::strings([format!("t{tick}")]))
                .expect("valid");
        }
        s.process_routes(time).expect("tick");
        let sent: Vec<SceneEvent> = seen.lock().map(|mut l| l.drain(..).collect()).unwrap_or_default();
        let finished: Vec<_> = sent
            .iter()
            .filter(|e| matches!(e, SceneEvent::CascadeFinished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        let expected_fired = if tick == 1 { 0 } else { 1 };
        assert_eq!(
            sent.last(),
            Some(&SceneEvent::CascadeFinished {
                time,
                routes_fired: expected_fired
            })
        );
    }
}

#[test]
fn hook_writes_reach_routes_that_already_fired() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {}
         ROUTE A.value_changed TO B.set_value",
    )
    .expect("valid");
    let (a, b) = (named(&s, "A"), named(&s, "B"));
    let mut done = false;
    s.add_cascade_hook(FnHook::new(move |ctx: &mut HookContext<'_>| {
        if !done {
            done = true;
            ctx.set_value_by_name(a, "value", FieldValue::strings(["from hook"]))
                .expect("valid");
        }
    }));

    s.set_value_by_name(a, "value", FieldValue::strings(["external"])).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.routes_fired, 2);
    assert_eq!(stats.loops_broken, 0);
    assert_eq!(strings(&s, a), vec!["from hook"]);
    assert_eq!(strings(&s, b), vec!["from hook"]);

    s.process_routes(1.0).expect("tick");
    assert_eq!(strings(&s, b), strings(&s, a));
}

#[test]
fn cycles_started_by_a_hook_still_terminate() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {}
         ROUTE A.value_changed TO B.set_value
         ROUTE B.value_changed TO A.set_value",
    )
    .expect("valid");
    let a = named(&s, "A");
    s.add_cascade_hook(FnHook::new(move |ctx: &mut HookContext<'_>| {
        let tick = format!("t{}", ctx.time());
        ctx.set_value_by_name(a, "value", FieldValue::strings([tick]))
            .expect("valid");
    }));

    s.set_value_by_name(a, "value", FieldValue::strings(["start"])).expect("valid");
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.routes_fired, 4);
    assert_eq!(stats.loops_broken, 2);
    assert!(!stats.truncated);
    assert_eq!(strings(&s, named(&s, "B")), vec!["t0"]);
}

#[test]
fn ticks_must_not_go_back_in_time() {
    let (mut s, _) = scene();
    s.process_routes(1.0).expect("first tick");
    let err = s.process_routes(0.5).expect_err("regression");
    assert!(matches!(
        err,
        Error::TimeRegression {
            previous,
            requested,
        } if previous == 1.0 && requested == 0.5
    ));
    assert_eq!(s.time(), Some(1.0));
    s.process_routes(1.0).expect("same time is fine");
}

#[test]
fn time_sensor_drives_an_interpolation() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF Clock TimeSensor { cycleInterval 2 loop TRUE }
         DEF Ramp ScalarInterpolator { key [0 1] keyValue [0 1] }
         DEF Mat Material {}
         ROUTE Clock.fraction_changed TO Ramp.set_fraction
         ROUTE Ramp.value_changed TO Mat.set_transparency",
    )
    .expect("valid");
    let (clock, mat) = (named(&s, "Clock"), named(&s, "Mat"));

    s.process_routes(1.0).expect("tick");
    assert_eq!(float(&s, mat, "transparency"), 0.5);
    assert_eq!(
        s.field_value_by_name(clock, "isActive").ok().and_then(FieldValue::as_bool),
        Some(true)
    );

    s.process_routes(1.5).expect("tick");
    assert_eq!(float(&s, mat, "transparency"), 0.75);

    s.set_value_by_name(clock, "enabled", false).expect("valid");
    s.process_routes(1.75).expect("tick");
    assert_eq!(float(&s, mat, "transparency"), 0.75);
    assert_eq!(
        s.field_value_by_name(clock, "isActive").ok().and_then(FieldValue::as_bool),
        Some(false)
    );
}

#[test]
fn load_completion_sends_content_ready_not_a_state_change() {
    let (mut s, reports) = scene();
    let (tx, rx) = crossbeam_channel::unbounded();
    s.add_sink(ChannelSink::new(tx));
    s.set_content_provider(MemoryProvider::new().with("brick.png", vec![1u8, 2, 3]))
        .expect("loader starts");

    let roots = s.load_str(r#"ImageTexture { url "brick.png" }"#).expect("valid");
    let tex = roots[0];
    let url = s.field_index(tex, "url").expect("declared");
    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::Loading));

    assert!(s.wait_for_loads(WAIT));
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.loads_completed, 1);
    assert_eq!(
        load_events(&rx),
        vec![
            SceneEvent::ContentStateChanged {
                node: tex,
                field: url,
                state: LoadState::Loading
            },
            SceneEvent::ContentReady {
                node: tex,
                field: url
            },
        ]
    );
    assert_eq!(s.content(tex).map(|c| c.bytes().to_vec()), Some(vec![1, 2, 3]));

    s.set_value(tex, url, FieldValue::strings(["missing.png"])).expect("valid");
    assert!(s.content(tex).is_none());
    assert!(s.wait_for_loads(WAIT));
    s.process_routes(1.0).expect("tick");
    let states: Vec<LoadState> = load_events(&rx)
        .into_iter()
        .filter_map(|e| match e {
            SceneEvent::ContentStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![LoadState::NotLoaded, LoadState::Loading, LoadState::Failed]
    );
    assert_eq!(reports.count(Severity::Warning), 1);
}

#[test]
fn inline_content_lands_in_a_child_space() {
    let (mut s, _) = scene();
    s.set_content_provider(
        MemoryProvider::new().with("world.wrl", "DEF Inner Transform { children Shape {} } Group {}"),
    )
    .expect("loader starts");
    s.load_str(r#"DEF Door Inline { url "world.wrl" }"#).expect("valid");
    let door = named(&s, "Door");

    assert!(s.wait_for_loads(WAIT));
    s.process_routes(0.0).expect("tick");
    assert_eq!(s.node(door).and_then(|n| n.load_state()), Some(LoadState::Complete));
    let inner = s.inline_space(door).expect("content parsed");
    let space = s.space(inner).expect("space exists");
    assert_eq!(space.kind(), SpaceKind::Inline);
    assert_eq!(space.parent(), Some(s.main_space()));
    assert_eq!(space.owner(), Some(door));
    assert_eq!(space.root_nodes().len(), 2);
    assert!(s.named_node_in(inner, "Inner").is_some());
    assert!(s.named_node("Inner").is_none());
    assert_eq!(s.num_nodes(), 4);

    // Switching `load` off drops the content again.
    s.set_value_by_name(door, "load", false).expect("valid");
    assert!(s.space(inner).is_none());
    assert_eq!(s.num_nodes(), 1);
    assert_eq!(s.node(door).and_then(|n| n.load_state()), Some(LoadState::NotLoaded));
}

#[test]
fn malformed_inline_content_fails_the_load_only() {
    let (mut s, reports) = scene();
    s.set_content_provider(MemoryProvider::new().with("bad.wrl", "Group { children [ "))
        .expect("loader starts");
    s.load_str(r#"DEF Door Inline { url "bad.wrl" } DEF Keep Group {}"#)
        .expect("valid");
    assert!(s.wait_for_loads(WAIT));
    s.process_routes(0.0).expect("tick");

    let door = named(&s, "Door");
    assert_eq!(s.node(door).and_then(|n| n.load_state()), Some(LoadState::Failed));
    assert!(s.inline_space(door).is_none());
    assert_eq!(reports.count(Severity::Fatal), 1);
    assert_eq!(s.num_nodes(), 2);
}

struct Blocking(Receiver<()>);

impl ContentProvider for Blocking {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Content> {
        loop {
            cancel.check()?;
            if self.0.recv_timeout(Duration::from_millis(5)).is_ok() {
                return Ok(Content::new(url, Vec::new()));
            }
        }
    }
}

#[test]
fn terminated_loads_return_to_not_loaded() {
    let (mut s, _) = scene();
    let (_release, gate) = crossbeam_channel::unbounded();
    s.set_content_provider(Blocking(gate)).expect("loader starts");
    let roots = s.load_str(r#"ImageTexture { url "slow.png" }"#).expect("valid");
    let tex = roots[0];
    assert_eq!(s.pending_loads(), 1);

    assert_eq!(s.terminate_loads(), 1);
    assert!(s.wait_for_loads(WAIT));
    s.process_routes(0.0).expect("tick");
    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::NotLoaded));
    assert!(s.content(tex).is_none());
}

#[test]
fn cancelled_loads_ignore_late_results() {
    let (mut s, _) = scene();
    let (release, gate) = crossbeam_channel::unbounded();
    s.set_content_provider(Blocking(gate)).expect("loader starts");
    let roots = s.load_str(r#"ImageTexture { url "slow.png" }"#).expect("valid");
    let tex = roots[0];

    s.cancel_load(tex).expect("loading");
    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::NotLoaded));
    release.send(()).expect("worker listening");
    assert!(s.wait_for_loads(WAIT));
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.loads_completed, 0);
    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::NotLoaded));
}

#[test]
fn replacing_the_provider_restarts_running_loads() {
    let (mut s, _) = scene();
    let (tx, rx) = crossbeam_channel::unbounded();
    s.add_sink(ChannelSink::new(tx));
    let (_release, gate) = crossbeam_channel::unbounded();
    s.set_content_provider(Blocking(gate)).expect("loader starts");
    let roots = s.load_str(r#"ImageTexture { url "slow.png" }"#).expect("valid");
    let tex = roots[0];
    let url = s.field_index(tex, "url").expect("declared");
    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::Loading));

    s.set_content_provider(MemoryProvider::new().with("slow.png", vec![7u8]))
        .expect("loader starts");
    assert!(s.wait_for_loads(WAIT));
    s.process_routes(0.0).expect("tick");

    assert_eq!(s.node(tex).and_then(|n| n.load_state()), Some(LoadState::Complete));
    assert_eq!(s.content(tex).map(|c| c.bytes().to_vec()), Some(vec![7]));
    assert_eq!(
        load_events(&rx),
        vec![
            SceneEvent::ContentStateChanged {
                node: tex,
                field: url,
                state: LoadState::Loading
            },
            SceneEvent::ContentStateChanged {
                node: tex,
                field: url,
                state: LoadState::NotLoaded
            },
            SceneEvent::ContentStateChanged {
                node: tex,
                field: url,
                state: LoadState::Loading
            },
            SceneEvent::ContentReady {
                node: tex,
                field: url
            },
        ]
    );
}

#[test]
fn removed_nodes_stop_receiving_events() {
    let (mut s, _) = scene();
    s.load_str(
        "DEF A MetadataString {} DEF B MetadataString {}
         ROUTE A.value_changed TO B.set_value",
    )
    .expect("valid");
    let (a, b) = (named(&s, "A"), named(&s, "B"));
    s.set_value_by_name(a, "value", FieldValue::strings(["x"])).expect("valid");
    s.remove_node(a).expect("exists");
    assert_eq!(s.pending_events(), 0);
    let stats = s.process_routes(0.0).expect("tick");
    assert_eq!(stats.routes_fired, 0);
    assert!(strings(&s, b).is_empty());
    assert!(s.named_node("A").is_none());
}

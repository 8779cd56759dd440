mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene_routes::prelude::{FieldValue, NodeId, Scene};

const CHAIN_LENGTHS: [usize; 5] = [1, 16, 64, 256, 1024];
const FAN_OUTS: [usize; 4] = [4, 32, 128, 512];

fn metadata(scene: &mut Scene) -> NodeId {
    common::ready_node(scene, "MetadataString")
}

fn connect(scene: &mut Scene, from: NodeId, to: NodeId) {
    let route = scene
        .route_by_name(from, "value_changed", to, "set_value")
        .expect("compatible fields");
    scene.add_route(route).expect("valid route");
}

/// A -> B -> C ... with `len` routes.
fn make_chain(len: usize) -> (Scene, NodeId) {
    let mut scene = common::bench_scene();
    let head = metadata(&mut scene);
    let mut prev = head;
    for _ in 0..len {
        let next = metadata(&mut scene);
        connect(&mut scene, prev, next);
        prev = next;
    }
    (scene, head)
}

/// One source routed to `width` sinks.
fn make_fan_out(width: usize) -> (Scene, NodeId) {
    let mut scene = common::bench_scene();
    let head = metadata(&mut scene);
    for _ in 0..width {
        let sink = metadata(&mut scene);
        connect(&mut scene, head, sink);
    }
    (scene, head)
}

/// `nodes` nodes with `edges` random routes between them, cycles included.
fn make_random_graph(nodes: usize, edges: usize, seed: u64) -> (Scene, Vec<NodeId>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scene = common::bench_scene();
    let ids: Vec<NodeId> = (0..nodes).map(|_| metadata(&mut scene)).collect();
    for _ in 0..edges {
        let a = ids[(rng.random::<f32>() * nodes as f32) as usize % nodes];
        let b = ids[(rng.random::<f32>() * nodes as f32) as usize % nodes];
        if a != b {
            connect(&mut scene, a, b);
        }
    }
    (scene, ids)
}

fn poke(scene: &mut Scene, id: NodeId, tick: usize) {
    scene
        .set_value_by_name(id, "value", FieldValue::strings([format!("v{tick}")]))
        .expect("writable field");
}

fn chain_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/chain");

    for &len in &CHAIN_LENGTHS {
        group.throughput(common::elements_throughput(len));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || make_chain(len),
                |(mut scene, head)| {
                    poke(&mut scene, head, 0);
                    let stats = scene.process_routes(0.0).expect("monotonic time");
                    black_box(stats.routes_fired);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn fan_out_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/fan_out");

    for &width in &FAN_OUTS {
        group.throughput(common::elements_throughput(width));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let (mut scene, head) = make_fan_out(width);
            let mut tick = 0usize;
            b.iter(|| {
                tick += 1;
                poke(&mut scene, head, tick);
                let stats = scene.process_routes(tick as f64).expect("monotonic time");
                black_box(stats.routes_fired);
            });
        });
    }

    group.finish();
}

fn random_graph_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/random_graph");

    for &nodes in &[32usize, 256, 1024] {
        let edges = nodes * 3;
        group.throughput(common::elements_throughput(edges));
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &nodes, |b, &nodes| {
            let (mut scene, ids) = make_random_graph(nodes, edges, 0x5eed);
            let mut tick = 0usize;
            b.iter(|| {
                tick += 1;
                poke(&mut scene, ids[tick % ids.len()], tick);
                let stats = scene.process_routes(tick as f64).expect("monotonic time");
                black_box((stats.routes_fired, stats.loops_broken));
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = chain_benches, fan_out_benches, random_graph_benches
}
criterion_main!(benches);

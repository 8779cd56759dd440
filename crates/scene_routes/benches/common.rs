use std::time::Duration;

use criterion::{Criterion, Throughput};
use scene_routes::prelude::{NodeId, Scene};
use scene_routes::RuntimeConfig;

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

/// Route firings or field writes per iteration.
pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// A scene whose cascade never truncates within a benchmark.
pub fn bench_scene() -> Scene {
    Scene::new(RuntimeConfig::default().with_max_cascade_steps(1 << 20)).expect("valid config")
}

/// Creates a node in the main space and ends its setup.
pub fn ready_node(scene: &mut Scene, type_name: &str) -> NodeId {
    let space = scene.main_space();
    let id = scene.create_node(space, type_name).expect("standard type");
    scene.finish_setup(id).expect("node exists");
    id
}

use glam::Vec3;
use scene_routes::prelude::*;
use scene_routes_examples::init_tracing;
use tracing::info;

/// Animates a Transform along a square path with a TimeSensor and a PositionInterpolator,
/// built through the API instead of from text.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut scene = Scene::new(RuntimeConfig::default())?;
    let space = scene.main_space();

    let clock = scene.create_node(space, "TimeSensor")?;
    scene.set_value_by_name(clock, "cycleInterval", 2.0f64)?;
    scene.set_value_by_name(clock, "loop", true)?;

    let path = scene.create_node(space, "PositionInterpolator")?;
    scene.set_value_by_name(path, "key", vec![0.0f32, 0.25, 0.5, 0.75, 1.0])?;
    let corners = vec![
        Vec3::ZERO,
        Vec3::X,
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::Y,
        Vec3::ZERO,
    ];
    scene.set_value_by_name(path, "keyValue", corners)?;

    let mover = scene.create_node(space, "Transform")?;
    for id in [clock, path, mover] {
        scene.finish_setup(id)?;
    }
    scene.add_root_node(mover)?;

    let tick = scene.route_by_name(clock, "fraction_changed", path, "set_fraction")?;
    let place = scene.route_by_name(path, "value_changed", mover, "set_translation")?;
    scene.add_route(tick)?;
    scene.add_route(place)?;

    for frame in 0..=16 {
        let time = f64::from(frame) * 0.125;
        scene.process_routes(time)?;
        let at = scene
            .field_value_by_name(mover, "translation")?
            .as_vec3()
            .unwrap_or_default();
        info!(time, x = at.x, y = at.y, "Frame.");
    }
    Ok(())
}

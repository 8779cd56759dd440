use std::path::PathBuf;

use scene_routes::prelude::*;
use scene_routes_examples::{init_tracing, outline};
use tracing::info;

const SAMPLE: &str = r#"#VRML V2.0 utf8
DEF Spinner Transform {
  translation -3 0 0
  children [
    Shape {
      appearance Appearance { material DEF Paint Material { diffuseColor 0.8 0.2 0.2 } }
      geometry Sphere { radius 0.5 }
    }
  ]
}
DEF Clock TimeSensor { cycleInterval 4 loop TRUE }
DEF Fade ScalarInterpolator { key [0 0.5 1] keyValue [0 0.8 0] }
ROUTE Clock.fraction_changed TO Fade.set_fraction
ROUTE Fade.value_changed TO Paint.set_transparency
"#;

/// Loads a scene file (or a built-in sample) and runs a few ticks.
///
/// Usage: `load-and-tick [scene.wrl]`
fn main() -> anyhow::Result<()> {
    init_tracing();

    let (text, base) = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            let base = path.parent().map(PathBuf::from).unwrap_or_default();
            (text, base)
        }
        None => (SAMPLE.to_owned(), PathBuf::from(".")),
    };

    let mut scene = Scene::new(RuntimeConfig::default())?;
    scene.set_content_provider(FileProvider::new(base))?;
    let roots = scene.load_str(&text)?;
    info!(roots = roots.len(), nodes = scene.num_nodes(), "Loaded.");
    print!("{}", outline(&scene, scene.main_space()));

    let frame = 1.0 / 30.0;
    for i in 0..=60 {
        let stats = scene.process_routes(f64::from(i) * frame)?;
        if i % 15 == 0 {
            info!(
                time = stats.time,
                routes_fired = stats.routes_fired,
                errors = stats.errors,
                loops_broken = stats.loops_broken,
                "Tick."
            );
        }
    }

    if let Some(paint) = scene.named_node("Paint") {
        info!(
            transparency = %scene.field_value_by_name(paint, "transparency")?,
            "Final material state."
        );
    }
    Ok(())
}

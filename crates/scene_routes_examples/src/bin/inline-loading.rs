use std::time::Duration;

use scene_routes::prelude::*;
use scene_routes_examples::{init_tracing, outline};
use tracing::info;

const WORLD: &str = r#"
Group {
  children [
    Inline { url [ "missing.wrl" "house.wrl" ] }
    DEF Sign ImageTexture { url "sign.png" }
  ]
}
"#;

const HOUSE: &str = "DEF Roof Transform { translation 0 2 0 children Shape { geometry Box {} } }";

/// Loads nested content in the background and watches the load events.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let provider = MemoryProvider::new()
        .with("house.wrl", HOUSE)
        .with("sign.png", vec![0x89, b'P', b'N', b'G']);

    let mut scene = Scene::new(RuntimeConfig::default().with_max_loader_threads(2))?;
    let (tx, rx) = crossbeam_channel::unbounded();
    scene.add_sink(ChannelSink::new(tx));
    scene.set_content_provider(provider)?;
    scene.load_str(WORLD)?;

    let mut time = 0.0;
    while scene.pending_loads() > 0 {
        scene.wait_for_loads(Duration::from_millis(50));
        scene.process_routes(time)?;
        time += 0.05;
    }
    scene.process_routes(time)?;

    for event in rx.try_iter() {
        match event {
            SceneEvent::ContentStateChanged { node, state, .. } => {
                info!(?node, %state, "Load state changed.");
            }
            SceneEvent::ContentReady { node, .. } => info!(?node, "Content ready."),
            _ => {}
        }
    }

    if let Some(sign) = scene.named_node("Sign") {
        let bytes = scene.content(sign).map(|c| c.len()).unwrap_or(0);
        info!(bytes, "Sign texture.");
    }
    print!("{}", outline(&scene, scene.main_space()));
    for &space in scene.space(scene.main_space()).map(|s| s.children()).unwrap_or(&[]) {
        println!("inline space:");
        print!("{}", outline(&scene, space));
    }
    Ok(())
}

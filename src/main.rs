#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    let mut config = tree_scene::SceneConfig::default();
    if let Some(root) = std::env::args().nth(1) {
        config = config.with_asset_root(root);
    }
    tree_scene::run(config)
}

#[cfg(target_arch = "wasm32")]
fn main() {}

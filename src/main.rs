use anyhow::Context;
use vibrant::{config::Config, flow};

const DEFAULT_CONFIG: &str = "vibrant.toml";

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let loaded = Config::load_optional(&path)
        .with_context(|| format!("failed to read settings from {path}"))?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    // The log filter comes from the settings
    flow::init_logging(&config.logging);
    if !found {
        log::info!("{path} not found, using default settings");
    }
    log::info!(
        "{}x{} window, buffer scale {}, shaders in {}",
        config.window.width,
        config.window.height,
        config.render.buffer_scale,
        config.shaders.resolved_asset_dir().display()
    );

    flow::run(config)
}

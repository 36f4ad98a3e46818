//! Application settings, read from a TOML file.
//!
//! Every section and field has a default, so a config file only needs to contain what it
//! overrides and a missing file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub shaders: ShaderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vibrant".to_string(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Half the visible height in world units.
    pub ortho_scale: f32,
    /// Resolution of the offscreen buffers relative to the window.
    pub buffer_scale: f32,
    pub buffer_clear_color: [f32; 4],
    pub screen_clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ortho_scale: 10.0,
            buffer_scale: 0.1,
            buffer_clear_color: [0.0, 0.0, 0.0, 1.0],
            screen_clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

/// Where the WGSL sources live, relative to `asset_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub asset_dir: PathBuf,
    pub sprite_vertex: String,
    pub sprite_fragment: String,
    pub deferred_vertex: String,
    pub deferred_fragment: String,
    pub combine_fragment: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            sprite_vertex: "sprite_vertex.wgsl".to_string(),
            sprite_fragment: "sprite_fragment.wgsl".to_string(),
            deferred_vertex: "deferred_vertex.wgsl".to_string(),
            deferred_fragment: "deferred_fragment.wgsl".to_string(),
            combine_fragment: "combine_fragment.wgsl".to_string(),
        }
    }
}

/// Copy of `assets/` made by the build script.
const BUNDLED_ASSETS: &str = concat!(env!("OUT_DIR"), "/assets");

impl ShaderConfig {
    /// `asset_dir`, or the assets bundled at build time when it does not exist.
    pub fn resolved_asset_dir(&self) -> PathBuf {
        if self.asset_dir.exists() {
            self.asset_dir.clone()
        } else {
            PathBuf::from(BUNDLED_ASSETS)
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.resolved_asset_dir().join(file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Like [`load`](Self::load), but a missing file yields `None`.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::load_optional(path)?.unwrap_or_default())
    }
}

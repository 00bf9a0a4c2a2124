use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Window and view settings. Missing fields take their defaults, so `{}` is
/// a valid config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    /// Size of the scene in map pixels before scaling to the window.
    pub logical_width: u32,
    pub logical_height: u32,
    pub enable_fullscreen: bool,
    pub enable_vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            logical_width: 384,
            logical_height: 216,
            enable_fullscreen: false,
            enable_vsync: true,
        }
    }
}

impl WindowConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("Reading window config {}", path.display()))?;
        let config: WindowConfig = serde_json::from_str(&txt)
            .with_context(|| format!("Parsing window config {}", path.display()))?;
        anyhow::ensure!(
            config.logical_width > 0 && config.logical_height > 0,
            "logical size must not be zero"
        );
        Ok(config)
    }
}

use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use proxima_osc::OscConfig;
use proxima_visibility::VisibilitySettings;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "d_log_level")]
    pub log_level: String,
    #[serde(default = "d_stale_after_secs")]
    pub stale_after_secs: f32,
    #[serde(default)]
    pub visibility: VisibilitySettings,
    #[serde(default)]
    pub osc: OscConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
            stale_after_secs: d_stale_after_secs(),
            visibility: VisibilitySettings::default(),
            osc: OscConfig::default(),
        }
    }
}

fn d_log_level() -> String {
    "info".to_string()
}
fn d_stale_after_secs() -> f32 {
    5.0
}

impl AppConfig {
    pub fn stale_after(&self) -> Duration {
        let fallback = proxima_engine::DEFAULT_STALE_AFTER;
        if self.stale_after_secs > 0.0 {
            Duration::try_from_secs_f32(self.stale_after_secs).unwrap_or(fallback)
        } else {
            fallback
        }
    }
}

/// Read and validate a TOML config; missing tables and keys fall back to defaults.
pub fn load_config_from_path(path: &Path) -> Result<AppConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&s)?;
    cfg.visibility.validate()?;
    Ok(cfg)
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use proxima_visibility::{PRESET_NAMES, preset};

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "proxima")]
#[command(about = "Distance-based avatar visibility over OSC")]
pub struct Cli {
    /// TOML config file; `proxima.toml` in the working directory is used when present.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// OSC peer host.
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub recv_port: Option<u16>,

    #[arg(long)]
    pub send_port: Option<u16>,

    /// Built-in visibility preset; replaces the `[visibility]` table.
    #[arg(short, long)]
    pub preset: Option<String>,

    #[arg(long)]
    pub log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Run the engine without opening sockets.
    #[arg(long)]
    pub offline: bool,

    #[arg(long)]
    pub local_user_id: Option<String>,

    /// Reload visibility settings when the config file changes.
    #[arg(long)]
    pub watch_config: bool,

    /// Seconds between stats log lines; 0 disables them.
    #[arg(long, default_value = "10")]
    pub stats_interval: f32,

    /// Exit after this many seconds.
    #[arg(long)]
    pub run_for: Option<f32>,
}

impl Cli {
    /// Layer command-line flags over a loaded config.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) -> Result<(), String> {
        if let Some(name) = &self.preset {
            cfg.visibility = preset(name).ok_or_else(|| {
                format!(
                    "unknown preset '{}'; expected one of: {}",
                    name,
                    PRESET_NAMES.join(", ")
                )
            })?;
        }
        if let Some(host) = &self.host {
            cfg.osc.host = host.clone();
        }
        if let Some(port) = self.recv_port {
            cfg.osc.receive_port = port;
        }
        if let Some(port) = self.send_port {
            cfg.osc.send_port = port;
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = level.clone();
        }
        if let Some(id) = &self.local_user_id {
            cfg.osc.local_user_id = id.clone();
        }
        Ok(())
    }

    /// `--run-for` as a duration; negative, non-finite and unrepresentable values mean no limit.
    pub fn run_for(&self) -> Option<Duration> {
        self.run_for.and_then(|s| Duration::try_from_secs_f32(s).ok())
    }

    /// `--stats-interval` as a duration; `None` turns stats off.
    pub fn stats_every(&self) -> Option<Duration> {
        Duration::try_from_secs_f32(self.stats_interval)
            .ok()
            .filter(|d| !d.is_zero())
    }
}

use std::error::Error;
use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, unbounded};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use proxima_engine::EngineHandle;

use crate::config::{AppConfig, load_config_from_path};

/// Watches the config file's directory and signals when the file itself changes.
pub struct ConfigWatcher {
    path: PathBuf,
    events: Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> notify::Result<Self> {
        let (tx, events) = unbounded::<()>();
        let file_name = path.file_name().map(|n| n.to_os_string());
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                match event.kind {
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any if ours => {
                        let _ = tx.send(());
                    }
                    _ => {}
                }
            })?;
        // Editors often replace the file, so watch the directory.
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log::info!("watching {} for changes", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            events,
            _watcher: watcher,
        })
    }

    /// Fires once per filesystem event touching the file.
    pub fn events(&self) -> &Receiver<()> {
        &self.events
    }

    /// Collapse queued events and reload.
    pub fn reload(&self) -> Result<AppConfig, Box<dyn Error>> {
        while self.events.try_recv().is_ok() {}
        load_config_from_path(&self.path)
    }
}

/// Swap in reloaded settings. Transport and logging changes need a restart.
pub fn apply(engine: &EngineHandle, cfg: &AppConfig) {
    match engine.set_settings(cfg.visibility) {
        Ok(()) => {
            engine.set_stale_after(cfg.stale_after());
            log::info!(
                "settings reloaded: sight {} fade {} update {}s",
                cfg.visibility.sight_distance,
                cfg.visibility.fade_distance,
                cfg.visibility.update_rate
            );
        }
        Err(e) => log::warn!("reloaded settings rejected: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxima_visibility::VisibilitySettings;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn apply_replaces_engine_settings() {
        let engine = EngineHandle::new(VisibilitySettings::default());
        let mut cfg = AppConfig::default();
        cfg.visibility.sight_distance = 30.0;
        cfg.stale_after_secs = 1.0;
        apply(&engine, &cfg);
        assert_eq!(engine.settings().sight_distance, 30.0);
        assert_eq!(engine.with(|e| e.stale_after()), Duration::from_secs(1));
    }

    #[test]
    fn reload_reads_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxima.toml");
        std::fs::write(&path, "[visibility]\nsight_distance = 12.0\n").unwrap();
        let watcher = ConfigWatcher::new(&path).unwrap();

        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[visibility]\nsight_distance = 18.0").unwrap();
        drop(f);

        let cfg = watcher.reload().unwrap();
        assert_eq!(cfg.visibility.sight_distance, 18.0);
    }
}

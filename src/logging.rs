use std::error::Error;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

/// Install the global logger. `RUST_LOG` wins over `level` on the terminal-only path;
/// with a log file, both sinks use `level` (unparseable levels fall back to info).
pub fn init(level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
                .try_init()?;
        }
        Some(path) => {
            let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
            let file = File::create(path)?;
            CombinedLogger::init(vec![
                TermLogger::new(
                    filter,
                    Config::default(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(filter, Config::default(), file),
            ])?;
        }
    }
    Ok(())
}

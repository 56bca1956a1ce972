//! Per-participant fade model: settings, records and the tick-by-tick state machine.
#![forbid(unsafe_code)]

mod presets;
mod settings;
mod state;

pub use presets::{PRESET_NAMES, preset};
pub use settings::{MAX_UPDATE_RATE, SettingsError, VisibilitySettings};
pub use state::{CHANGE_EPSILON, VisibilityRecord, VisibilityState, advance, classify};

use serde::Deserialize;
use std::time::Duration;

/// Longest accepted tick period, in seconds.
pub const MAX_UPDATE_RATE: f32 = 3600.0;

const FALLBACK_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for the fade model. Replaced as a whole, never patched field by field.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct VisibilitySettings {
    /// Full-visibility cutoff in meters, before multiplier and world scale.
    #[serde(default = "d_sight")]
    pub sight_distance: f32,
    /// Width of the transition band, measured inward from the sight distance.
    #[serde(default = "d_fade")]
    pub fade_distance: f32,
    #[serde(default = "d_true")]
    pub use_vertical_distance: bool,
    /// Seconds a fade segment takes to complete.
    #[serde(default = "d_fade_duration")]
    pub fade_duration: f32,
    /// Seconds between engine ticks.
    #[serde(default = "d_update_rate")]
    pub update_rate: f32,
    #[serde(default = "d_true")]
    pub enable_distance_scaling: bool,
    #[serde(default = "d_one")]
    pub distance_multiplier: f32,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            sight_distance: d_sight(),
            fade_distance: d_fade(),
            use_vertical_distance: true,
            fade_duration: d_fade_duration(),
            update_rate: d_update_rate(),
            enable_distance_scaling: true,
            distance_multiplier: d_one(),
        }
    }
}

fn d_sight() -> f32 {
    10.0
}
fn d_fade() -> f32 {
    2.0
}
fn d_fade_duration() -> f32 {
    1.0
}
fn d_update_rate() -> f32 {
    0.1
}
fn d_one() -> f32 {
    1.0
}
fn d_true() -> bool {
    true
}

impl VisibilitySettings {
    pub fn effective_sight_distance(&self, world_scale: f32) -> f32 {
        let base = self.sight_distance * self.distance_multiplier;
        if self.enable_distance_scaling {
            base * world_scale
        } else {
            base
        }
    }

    /// Distance at which fading starts; may be negative when the band is wider than sight.
    pub fn fade_start_distance(&self, world_scale: f32) -> f32 {
        self.effective_sight_distance(world_scale) - self.fade_distance
    }

    /// Tick period. Out-of-range rates that slipped past `validate` fall back to the default.
    pub fn update_interval(&self) -> Duration {
        if !(self.update_rate > 0.0 && self.update_rate <= MAX_UPDATE_RATE) {
            return FALLBACK_UPDATE_INTERVAL;
        }
        Duration::try_from_secs_f32(self.update_rate.max(0.001)).unwrap_or(FALLBACK_UPDATE_INTERVAL)
    }

    /// Fraction of a fade segment completed after `elapsed`, in [0, 1].
    pub fn fade_progress(&self, elapsed: Duration) -> f32 {
        if self.fade_duration <= 0.0 {
            return 1.0;
        }
        (elapsed.as_secs_f32() / self.fade_duration).clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let distances = [
            ("sight_distance", self.sight_distance),
            ("fade_distance", self.fade_distance),
            ("distance_multiplier", self.distance_multiplier),
        ];
        for (field, value) in distances {
            if !value.is_finite() {
                return Err(SettingsError::NonFinite(field));
            }
            if value < 0.0 {
                return Err(SettingsError::Negative { field, value });
            }
        }
        if !self.fade_duration.is_finite() {
            return Err(SettingsError::NonFinite("fade_duration"));
        }
        if self.fade_duration < 0.0 {
            return Err(SettingsError::Negative {
                field: "fade_duration",
                value: self.fade_duration,
            });
        }
        if !(self.update_rate.is_finite()
            && self.update_rate > 0.0
            && self.update_rate <= MAX_UPDATE_RATE)
        {
            return Err(SettingsError::UpdateRate(self.update_rate));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SettingsError {
    NonFinite(&'static str),
    Negative { field: &'static str, value: f32 },
    UpdateRate(f32),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::NonFinite(field) => write!(f, "{} must be finite", field),
            SettingsError::Negative { field, value } => {
                write!(f, "{} must not be negative (got {})", field, value)
            }
            SettingsError::UpdateRate(v) => {
                write!(
                    f,
                    "update_rate must be in (0, {}] seconds (got {})",
                    MAX_UPDATE_RATE, v
                )
            }
        }
    }
}

impl std::error::Error for SettingsError {}

use crate::settings::VisibilitySettings;

pub const PRESET_NAMES: [&str; 4] = ["default", "close-range", "long-range", "performance"];

/// Built-in settings bundles, looked up case-insensitively. Spaces and underscores are
/// accepted in place of dashes ("Close Range" works).
pub fn preset(name: &str) -> Option<VisibilitySettings> {
    let key = name.trim().to_ascii_lowercase().replace([' ', '_'], "-");
    let base = VisibilitySettings::default();
    match key.as_str() {
        "default" => Some(base),
        "close-range" => Some(VisibilitySettings {
            sight_distance: 5.0,
            fade_distance: 1.0,
            ..base
        }),
        "long-range" => Some(VisibilitySettings {
            sight_distance: 25.0,
            fade_distance: 5.0,
            ..base
        }),
        "performance" => Some(VisibilitySettings {
            sight_distance: 10.0,
            fade_distance: 2.0,
            update_rate: 0.2,
            fade_duration: 0.5,
            ..base
        }),
        _ => None,
    }
}

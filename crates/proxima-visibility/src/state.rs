use std::fmt;
use std::time::Instant;

use crate::settings::VisibilitySettings;

/// Fraction movement below this is not reported as a change.
pub const CHANGE_EPSILON: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisibilityState {
    Hidden,
    FadingIn,
    Visible,
    FadingOut,
}

impl VisibilityState {
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, VisibilityState::FadingIn | VisibilityState::FadingOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityState::Hidden => "hidden",
            VisibilityState::FadingIn => "fading_in",
            VisibilityState::Visible => "visible",
            VisibilityState::FadingOut => "fading_out",
        }
    }
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityRecord {
    pub id: String,
    pub state: VisibilityState,
    /// Opacity in [0, 1].
    pub fraction: f32,
    /// Last distance seen by `advance`; infinite until the first evaluation.
    pub distance: f32,
    /// Start of the current fade segment.
    pub fade_started: Instant,
    /// Fraction held when the current fade segment began.
    pub fade_from: f32,
    pub last_update: Instant,
}

impl VisibilityRecord {
    pub fn new(id: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            state: VisibilityState::Hidden,
            fraction: 0.0,
            distance: f32::INFINITY,
            fade_started: now,
            fade_from: 0.0,
            last_update: now,
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.fraction > 0.0
    }
}

/// Target state and fraction for `distance`, given the record's current state.
///
/// Inside the fade band the direction depends on where the record came from: a hidden or
/// fading-in record fades in, anything else fades out. This keeps a participant that is
/// already fading out from snapping back when it re-enters the band.
pub fn classify(
    current: VisibilityState,
    distance: f32,
    settings: &VisibilitySettings,
    world_scale: f32,
) -> (VisibilityState, f32) {
    if !distance.is_finite() {
        return (VisibilityState::Hidden, 0.0);
    }
    let sight = settings.effective_sight_distance(world_scale);
    let fade_start = sight - settings.fade_distance;

    if distance <= fade_start {
        return (VisibilityState::Visible, 1.0);
    }
    if distance > sight || settings.fade_distance <= 0.0 {
        return (VisibilityState::Hidden, 0.0);
    }

    let target = ((sight - distance) / settings.fade_distance).clamp(0.0, 1.0);
    if target <= 0.0 {
        return (VisibilityState::Hidden, 0.0);
    }
    if target >= 1.0 {
        return (VisibilityState::Visible, 1.0);
    }
    let direction = match current {
        VisibilityState::Hidden | VisibilityState::FadingIn => VisibilityState::FadingIn,
        VisibilityState::Visible | VisibilityState::FadingOut => VisibilityState::FadingOut,
    };
    (direction, target)
}

/// Advance `record` by one tick at `distance`. Returns true when the state changed or the
/// fraction moved by more than [`CHANGE_EPSILON`].
pub fn advance(
    record: &mut VisibilityRecord,
    distance: f32,
    settings: &VisibilitySettings,
    world_scale: f32,
    now: Instant,
) -> bool {
    let old_state = record.state;
    let old_fraction = record.fraction;
    let (target_state, target_fraction) = classify(record.state, distance, settings, world_scale);

    record.distance = distance;
    record.last_update = now;

    if record.state != target_state {
        record.state = target_state;
        record.fade_started = now;
        record.fade_from = record.fraction;
    }

    record.fraction = if target_state.is_transient() {
        let t = settings.fade_progress(now.saturating_duration_since(record.fade_started));
        (record.fade_from + (target_fraction - record.fade_from) * t).clamp(0.0, 1.0)
    } else {
        target_fraction
    };

    if old_state != record.state {
        log::trace!(
            target: "visibility",
            "{} {} -> {} (d={:.2}, alpha={:.2})",
            record.id,
            old_state,
            record.state,
            distance,
            record.fraction
        );
    }

    old_state != record.state || (old_fraction - record.fraction).abs() > CHANGE_EPSILON
}

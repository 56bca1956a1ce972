use super::*;
use std::time::{Duration, Instant};

fn settings_10_2() -> VisibilitySettings {
    VisibilitySettings {
        sight_distance: 10.0,
        fade_distance: 2.0,
        fade_duration: 1.0,
        ..VisibilitySettings::default()
    }
}

fn at(id: &str, x: f32, y: f32, z: f32, t: Instant) -> Position {
    Position::new(id, format!("User_{}", id), Vec3::new(x, y, z), t)
}

fn engine_with_observer(t0: Instant) -> ProximityEngine {
    let mut engine = ProximityEngine::new(settings_10_2());
    engine.set_observer_position(at("local", 0.0, 0.0, 0.0, t0));
    engine
}

#[test]
fn new_participant_starts_hidden() {
    let t0 = Instant::now();
    let mut engine = ProximityEngine::new(VisibilitySettings::default());
    engine.upsert_participant(at("a", 1.0, 0.0, 0.0, t0));
    let rec = engine.record("a").unwrap();
    assert_eq!(rec.state, VisibilityState::Hidden);
    assert_eq!(rec.fraction, 0.0);
    assert_eq!(engine.participant_count(), 1);
}

#[test]
fn upsert_replaces_position_but_keeps_record() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    engine.tick(t0);
    engine.upsert_participant(at("a", 4.0, 0.0, 0.0, t0 + Duration::from_millis(10)));
    assert_eq!(engine.participant("a").unwrap().coords.x, 4.0);
    assert_eq!(engine.record("a").unwrap().state, VisibilityState::Visible);
}

#[test]
fn remove_is_idempotent_and_reported_once() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    assert!(engine.remove_participant("a"));
    assert!(!engine.remove_participant("a"));
    assert!(!engine.remove_participant("never-seen"));
    assert!(engine.record("a").is_none());
    assert!(engine.participant("a").is_none());

    let batch = engine.tick(t0);
    assert_eq!(batch.removed, vec!["a".to_string()]);
    assert!(engine.tick(t0).removed.is_empty());
}

#[test]
fn readding_before_tick_cancels_pending_removal() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    engine.remove_participant("a");
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    let batch = engine.tick(t0);
    assert!(batch.removed.is_empty());
    assert_eq!(batch.changed.len(), 1);
}

#[test]
fn tick_without_observer_keeps_everyone_hidden() {
    let t0 = Instant::now();
    let mut engine = ProximityEngine::new(settings_10_2());
    engine.upsert_participant(at("a", 0.5, 0.0, 0.0, t0));
    let batch = engine.tick(t0);
    assert!(batch.is_empty());
    let rec = engine.record("a").unwrap();
    assert_eq!(rec.state, VisibilityState::Hidden);
    assert!(rec.distance.is_infinite());
    assert!(!engine.stats().observer_set);
}

#[test]
fn stale_participants_are_evicted_before_evaluation() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("old", 3.0, 0.0, 0.0, t0));
    engine.upsert_participant(at("fresh", 4.0, 0.0, 0.0, t0 + Duration::from_secs(5)));

    let batch = engine.tick(t0 + Duration::from_millis(4900));
    assert!(batch.removed.is_empty());
    assert!(engine.record("old").is_some());

    let batch = engine.tick(t0 + Duration::from_secs(6));
    assert_eq!(batch.removed, vec!["old".to_string()]);
    assert!(engine.record("old").is_none());
    assert!(engine.participant("old").is_none());
    assert!(engine.record("fresh").is_some());
}

#[test]
fn stale_window_is_configurable() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.set_stale_after(Duration::from_secs(1));
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    engine.tick(t0 + Duration::from_millis(1500));
    assert!(engine.record("a").is_none());
}

#[test]
fn approach_then_retreat_scenario() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));

    let batch = engine.tick(t0);
    assert_eq!(batch.changed.len(), 1);
    let rec = engine.record("a").unwrap();
    assert_eq!(rec.state, VisibilityState::Visible);
    assert_eq!(rec.fraction, 1.0);

    let mut now = t0;
    engine.upsert_participant(at("a", 20.0, 0.0, 0.0, now));
    for _ in 0..15 {
        now += Duration::from_millis(100);
        engine.tick(now);
    }
    let rec = engine.record("a").unwrap();
    assert_eq!(rec.state, VisibilityState::Hidden);
    assert_eq!(rec.fraction, 0.0);
    assert!(engine.visible().is_empty());
}

#[test]
fn horizontal_mode_ignores_height_difference() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("above", 1.0, 30.0, 0.0, t0));
    engine.tick(t0);
    assert_eq!(engine.record("above").unwrap().state, VisibilityState::Hidden);

    engine
        .set_settings(VisibilitySettings {
            use_vertical_distance: false,
            ..settings_10_2()
        })
        .unwrap();
    engine.tick(t0);
    assert_eq!(engine.record("above").unwrap().state, VisibilityState::Visible);
}

#[test]
fn world_scale_changes_reach() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("a", 15.0, 0.0, 0.0, t0));
    engine.tick(t0);
    assert_eq!(engine.record("a").unwrap().state, VisibilityState::Hidden);

    engine.set_world_scale(2.0);
    engine.tick(t0);
    assert_eq!(engine.record("a").unwrap().state, VisibilityState::Visible);

    engine.set_world_scale(f32::NAN);
    engine.set_world_scale(-1.0);
    assert_eq!(engine.world_scale(), 2.0);
}

#[test]
fn invalid_settings_are_rejected() {
    let mut engine = ProximityEngine::new(settings_10_2());
    let bad = VisibilitySettings {
        update_rate: -0.5,
        ..settings_10_2()
    };
    assert!(engine.set_settings(bad).is_err());
    assert_eq!(engine.settings().update_rate, settings_10_2().update_rate);
}

#[test]
fn subscribers_receive_non_empty_batches_in_order() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    let rx = engine.subscribe();
    let dropped = engine.subscribe();
    drop(dropped);

    engine.upsert_participant(at("b", 2.0, 0.0, 0.0, t0));
    engine.upsert_participant(at("a", 3.0, 0.0, 0.0, t0));
    engine.tick(t0);
    engine.tick(t0);

    let batch = rx.try_recv().unwrap();
    let ids: Vec<&str> = batch.changed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(rx.try_recv().is_err());
}

#[test]
fn stats_count_visible_and_hidden() {
    let t0 = Instant::now();
    let mut engine = engine_with_observer(t0);
    engine.upsert_participant(at("near", 1.0, 0.0, 0.0, t0));
    engine.upsert_participant(at("far", 50.0, 0.0, 0.0, t0));
    engine.upsert_participant(at("band", 9.0, 0.0, 0.0, t0));
    engine.tick(t0);
    engine.tick(t0 + Duration::from_millis(500));

    let stats = engine.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.visible, 2);
    assert_eq!(stats.hidden, 1);
    assert_eq!(stats.effective_sight_distance, 10.0);
    assert_eq!(stats.world_scale, 1.0);
    assert!(stats.observer_set);

    let visible: Vec<String> = engine.visible().into_iter().map(|r| r.id).collect();
    assert_eq!(visible, vec!["band".to_string(), "near".to_string()]);
}

mod common;

use common::{token, RecordingSink};
use encore_core::{
    AuthoredNote, ChallengeContext, FallingConfig, FallingEvent, FallingNoteSession, FallingState,
    LiveNoteState, SessionError,
};
use encore_domain_eval::Grade;
use encore_ports::clock::{FrameTick, TickFlow};
use encore_ports::model::ChallengeType;
use encore_ports::note::Instrument;
use encore_ports::storage::GameSettings;
use encore_ports::types::{CompositionId, Difficulty, TrackId, UserId};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn context() -> ChallengeContext {
    ChallengeContext {
        user_id: UserId("player".to_string()),
        original_track_id: TrackId("beat".to_string()),
        composition_id: CompositionId("jam".to_string()),
    }
}

fn config(difficulty: Difficulty) -> FallingConfig {
    let settings = GameSettings {
        difficulty,
        random_seed: Some(7),
        ..GameSettings::default()
    };
    FallingConfig::from_settings(&settings, Instrument::Drums)
}

fn kick(start_ms: f64, duration_ms: f64) -> AuthoredNote {
    AuthoredNote::new(token("kick"), start_ms, duration_ms)
}

fn charted(
    config: FallingConfig,
    notes: Vec<AuthoredNote>,
) -> (FallingNoteSession, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::ready());
    let session = FallingNoteSession::new(config, context(), sink.clone(), Some(notes));
    (session, sink)
}

#[test]
fn difficulty_sets_speed_and_travel_time() {
    let easy = config(Difficulty::Easy);
    assert_eq!(easy.speed(), 150.0);
    assert_eq!(easy.spawn_interval_ms(), 2000.0);
    assert_eq!(easy.miss_after_ms(), 4000.0);
    assert_eq!(config(Difficulty::Medium).miss_after_ms(), 3000.0);
    assert_eq!(config(Difficulty::Hard).speed(), 250.0);
    assert_eq!(easy.lanes, 4);
}

#[test]
fn on_time_kick_scores_a_perfect_run() {
    let (mut session, sink) = charted(config(Difficulty::Easy), vec![kick(0.0, 200.0)]);
    session.start(0.0).unwrap();
    assert_eq!(session.tick(0.0), TickFlow::Continue);
    assert_eq!(session.live_notes().len(), 1);

    let judgment = session.on_lane_activate(0, 0.0).unwrap().unwrap();
    assert_eq!(judgment.grade, Grade::Perfect);
    assert_eq!(sink.played_tokens(), vec!["kick"]);
    assert_eq!(
        session.live_notes()[0].state,
        LiveNoteState::HeldAwaitingRelease
    );

    assert_eq!(session.tick(200.0), TickFlow::Stop);
    assert_eq!(session.state(), FallingState::Completed);

    let score = session.final_score().unwrap();
    assert_eq!(score.timing_score, 100);
    assert_eq!(score.accuracy_score, 100);
    assert_eq!(score.combined_score, 100);
    assert_eq!(score.perfect_hits, 1);
    assert_eq!(score.challenge_type, ChallengeType::FallingNotes);
    assert_eq!(score.original_track_id, TrackId("beat".to_string()));

    // 100 * 1.1 for the first combo step, plus the full hold bonus
    assert_eq!(session.stats().points, 160);
    let events = session.drain_events();
    assert!(events.contains(&FallingEvent::HoldReleased {
        id: 0,
        lane: 0,
        held_ms: 200.0,
        bonus: 50,
    }));
    assert!(matches!(events.last(), Some(FallingEvent::Completed { .. })));
}

#[test]
fn untouched_note_is_missed_after_the_window() {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let mut cfg = config(difficulty);
        cfg.random_session_ms = 1.0;
        let miss_after = cfg.miss_after_ms();
        let sink = Arc::new(RecordingSink::ready());
        let mut session = FallingNoteSession::new(cfg, context(), sink, None);

        session.start(0.0).unwrap();
        session.tick(0.0);
        assert_eq!(session.live_notes().len(), 1);

        assert_eq!(session.tick(miss_after - 1.0), TickFlow::Continue);
        assert_eq!(session.stats().tally.miss, 0);

        assert_eq!(session.tick(miss_after + 1.0), TickFlow::Stop);
        assert_eq!(session.stats().tally.miss, 1);
        assert_eq!(session.final_score().unwrap().combined_score, 0);
    }
}

#[test]
fn tap_on_the_window_edge_still_counts() {
    let mut cfg = config(Difficulty::Easy);
    cfg.random_session_ms = 1.0;
    let edge = cfg.miss_after_ms();
    let mut session =
        FallingNoteSession::new(cfg, context(), Arc::new(RecordingSink::ready()), None);

    session.start(0.0).unwrap();
    session.tick(0.0);
    let lane = session.live_notes()[0].lane;

    assert_eq!(session.tick(edge), TickFlow::Continue);
    assert_eq!(session.stats().tally.miss, 0);
    assert_eq!(session.live_notes()[0].state, LiveNoteState::InFlight);

    let judgment = session.on_lane_activate(lane, edge).unwrap().unwrap();
    assert_eq!(judgment.grade, Grade::Good);
    assert_eq!(session.stats().tally.good, 1);
}

#[test]
fn random_spawns_are_reproducible_with_a_seed() {
    let spawned = |seed: u64| {
        let mut cfg = config(Difficulty::Hard);
        cfg.seed = Some(seed);
        let mut session =
            FallingNoteSession::new(cfg, context(), Arc::new(RecordingSink::ready()), None);
        session.start(0.0).unwrap();
        session.tick(4_500.0);
        session
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                FallingEvent::Spawned { lane, note, .. } => Some((lane, note)),
                _ => None,
            })
            .collect::<Vec<_>>()
    };

    let first = spawned(42);
    assert_eq!(first.len(), 5);
    assert_eq!(first, spawned(42));
    assert!(first
        .iter()
        .all(|(lane, note)| *lane < 4 && Instrument::Drums.palette().contains(note)));
}

#[test]
fn tap_with_nothing_in_reach_is_ignored() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(10_000.0, 0.0)]);
    session.start(0.0).unwrap();
    session.tick(0.0);

    assert_eq!(session.on_lane_activate(0, 0.0).unwrap(), None);
    assert_eq!(session.on_lane_activate(2, 0.0).unwrap(), None);
    assert_eq!(session.stats().tally.total(), 0);
    assert_eq!(session.stats().points, 0);
}

#[test]
fn input_outside_a_running_session_is_ignored() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(0.0, 0.0)]);
    assert_eq!(session.on_lane_activate(0, 0.0).unwrap(), None);
    assert_eq!(session.on_lane_release(0, 0.0).unwrap(), None);
}

#[test]
fn lanes_are_bounded() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(0.0, 0.0)]);
    session.start(0.0).unwrap();
    assert!(matches!(
        session.on_lane_activate(4, 0.0),
        Err(SessionError::LaneOutOfRange { lane: 4, lanes: 4 })
    ));
}

#[test]
fn notes_rotate_through_lanes_and_build_combo() {
    let notes = (0..4).map(|i| kick(i as f64 * 1_000.0, 0.0)).collect();
    let (mut session, _) = charted(config(Difficulty::Medium), notes);
    session.start(0.0).unwrap();

    for i in 0..4u8 {
        let now = f64::from(i) * 1_000.0;
        session.tick(now);
        let judgment = session.on_lane_activate(i, now).unwrap().unwrap();
        assert_eq!(judgment.grade, Grade::Perfect);
    }
    assert_eq!(session.tick(3_000.0), TickFlow::Stop);

    let stats = session.stats();
    assert_eq!(stats.combo, 4);
    assert_eq!(stats.max_combo, 4);
    // 110 + 120 + 130 + 140, zero-length notes earn no hold bonus
    assert_eq!(stats.points, 500);
}

#[test]
fn late_tap_still_counts_but_breaks_the_combo() {
    let notes = vec![kick(0.0, 0.0), kick(1_000.0, 0.0), kick(2_000.0, 0.0)];
    let (mut session, _) = charted(config(Difficulty::Medium), notes);
    session.start(0.0).unwrap();

    session.tick(0.0);
    session.on_lane_activate(0, 0.0).unwrap();
    session.tick(1_000.0);
    session.on_lane_activate(1, 1_000.0).unwrap();
    assert_eq!(session.stats().combo, 2);

    // 450 ms late is 90 units past the line at medium speed, still inside the window
    session.tick(2_450.0);
    let judgment = session.on_lane_activate(2, 2_450.0).unwrap().unwrap();
    assert_eq!(judgment.grade, Grade::Good);
    assert!(judgment.floor);
    assert_eq!(session.stats().combo, 0);
    assert_eq!(session.stats().max_combo, 2);
    assert_eq!(session.stats().tally.good, 1);
    assert_eq!(session.stats().tally.miss, 0);
}

#[test]
fn early_release_earns_a_partial_hold_bonus() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(0.0, 400.0)]);
    session.start(0.0).unwrap();
    session.tick(0.0);
    session.on_lane_activate(0, 0.0).unwrap();

    assert_eq!(session.on_lane_release(0, 320.0).unwrap(), Some(25));
    assert_eq!(session.on_lane_release(0, 330.0).unwrap(), None);
    assert!(session.live_notes().is_empty());
}

#[test]
fn new_hit_releases_the_older_hold_in_that_lane() {
    let mut cfg = config(Difficulty::Easy);
    cfg.lanes = 1;
    let (mut session, _) = charted(cfg, vec![kick(0.0, 1_000.0), kick(500.0, 100.0)]);
    session.start(0.0).unwrap();
    session.tick(0.0);
    session.on_lane_activate(0, 0.0).unwrap();

    session.tick(500.0);
    session.on_lane_activate(0, 500.0).unwrap();

    let held: Vec<_> = session
        .live_notes()
        .iter()
        .filter(|n| n.state == LiveNoteState::HeldAwaitingRelease)
        .map(|n| n.id)
        .collect();
    assert_eq!(held, vec![1]);
    assert!(session.drain_events().contains(&FallingEvent::HoldReleased {
        id: 0,
        lane: 0,
        held_ms: 500.0,
        bonus: 10,
    }));
}

#[test]
fn abort_drops_live_notes_and_stops_ticking() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(0.0, 0.0)]);
    session.start(0.0).unwrap();
    session.tick(0.0);

    session.abort().unwrap();
    assert_eq!(session.state(), FallingState::Aborted);
    assert!(session.live_notes().is_empty());
    assert_eq!(session.tick(16.0), TickFlow::Stop);
    assert!(session.final_score().is_none());
    assert!(matches!(
        session.abort(),
        Err(SessionError::InvalidState { actual: "aborted", .. })
    ));
}

#[test]
fn starting_twice_is_rejected() {
    let (mut session, _) = charted(config(Difficulty::Easy), vec![kick(0.0, 0.0)]);
    session.start(0.0).unwrap();
    assert!(matches!(
        session.start(10.0),
        Err(SessionError::InvalidState { actual: "running", .. })
    ));
}

#[test]
fn authored_notes_come_from_track_seconds() {
    let track = common::track(
        "beat",
        Instrument::Drums,
        vec![common::note("snare", 1.5, 0.25)],
        2.0,
    );
    let authored = AuthoredNote::from_track(&track);
    assert_eq!(authored.len(), 1);
    assert_eq!(authored[0].start_ms, 1_500.0);
    assert_eq!(authored[0].duration_ms, 250.0);
    assert_eq!(authored[0].note, token("snare"));
}

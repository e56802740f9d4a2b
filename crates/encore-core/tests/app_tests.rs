mod common;

use common::{composition, note, token, track, MemoryStore, RecordingSink};
use encore_core::{
    build_challenge_score, AppError, ChallengeContext, Command, Event, FallingSource, GameCore,
    GameServices, ManualClock, ScoreSubmitter,
};
use encore_domain_eval::{HitTally, LetterGrade};
use encore_ports::clock::TickFlow;
use encore_ports::model::ChallengeType;
use encore_ports::note::Instrument;
use encore_ports::playback::{PlaybackPort, PlaybackState};
use encore_ports::storage::{ModeWeights, ScoreStore};
use encore_ports::types::{CompositionId, PostId, TrackId, UserId, Velocity01};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Harness {
    core: GameCore,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
}

fn jam() -> encore_ports::model::Composition {
    composition(
        "jam",
        vec![
            track(
                "beat",
                Instrument::Drums,
                vec![note("kick", 0.0, 0.2), note("snare", 0.5, 0.1)],
                1.0,
            ),
            track(
                "keys",
                Instrument::Piano,
                vec![note("C4", 0.0, 0.25), note("E4", 0.5, 0.25)],
                1.0,
            ),
        ],
    )
}

fn harness(store: MemoryStore) -> Harness {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new());
    let sink = Arc::new(RecordingSink::ready());
    let core = GameCore::new(GameServices {
        audio: sink.clone(),
        clock: clock.clone(),
        compositions: store.clone(),
        scores: store.clone(),
        settings: None,
    });
    Harness {
        core,
        clock,
        store,
        sink,
    }
}

fn loaded() -> Harness {
    let mut h = harness(MemoryStore::with_composition("post-1", jam()));
    h.core
        .handle_command(Command::LoadComposition {
            post_id: PostId("post-1".to_string()),
        })
        .unwrap();
    h.core.drain_events();
    h
}

fn completed(events: &[Event]) -> Option<(LetterGrade, u32, bool)> {
    events.iter().find_map(|event| match event {
        Event::SessionCompleted { summary, submitted } => Some((
            summary.grade,
            summary.score.combined_score,
            *submitted,
        )),
        _ => None,
    })
}

#[test]
fn missing_composition_is_an_event_not_an_error() {
    let mut h = harness(MemoryStore::default());
    h.core
        .handle_command(Command::LoadComposition {
            post_id: PostId("empty-post".to_string()),
        })
        .unwrap();

    assert_eq!(
        h.core.drain_events(),
        vec![Event::CompositionMissing {
            post_id: PostId("empty-post".to_string()),
        }]
    );
    assert!(h.core.composition().is_none());
}

#[test]
fn loading_a_composition_lists_its_layers() {
    let mut h = harness(MemoryStore::with_composition("post-1", jam()));
    h.core
        .handle_command(Command::LoadComposition {
            post_id: PostId("post-1".to_string()),
        })
        .unwrap();

    assert_eq!(
        h.core.drain_events(),
        vec![Event::CompositionLoaded {
            composition_id: CompositionId("jam".to_string()),
            tracks: vec![TrackId("beat".to_string()), TrackId("keys".to_string())],
            duration: 1.0,
        }]
    );
}

#[test]
fn playback_runs_through_ticks_and_stops_at_the_end() {
    let mut h = loaded();
    h.core
        .handle_command(Command::Play { from_offset: 0.0 })
        .unwrap();
    assert_eq!(h.core.tick(0.0), TickFlow::Continue);

    h.clock.set(1_000.0);
    assert_eq!(h.core.tick(1_000.0), TickFlow::Stop);
    let states: Vec<_> = h
        .core
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            Event::PlaybackUpdated { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![PlaybackState::Playing, PlaybackState::Idle]);
}

#[test]
fn replication_run_is_scored_and_submitted() {
    let mut h = loaded();
    h.core
        .handle_command(Command::StartReplication {
            user_id: UserId("player".to_string()),
            track_id: TrackId("keys".to_string()),
        })
        .unwrap();
    h.core.handle_command(Command::StartListening).unwrap();
    for text in ["C4", "E4"] {
        h.core
            .handle_command(Command::NotePlayed {
                note: token(text),
                velocity: Velocity01::new(0.6),
            })
            .unwrap();
    }

    let events = h.core.drain_events();
    assert_eq!(completed(&events), Some((LetterGrade::S, 100, true)));
    assert!(!h.core.has_session());
    assert_eq!(h.store.score_count(), 1);

    h.core.handle_command(Command::LoadLeaderboard).unwrap();
    let Some(Event::LeaderboardUpdated { scores }) = h.core.drain_events().pop() else {
        panic!("expected a leaderboard");
    };
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].challenge_type, ChallengeType::Replication);
}

#[test]
fn falling_notes_run_from_a_layer() {
    let mut h = loaded();
    h.core
        .handle_command(Command::SetDifficulty {
            difficulty: encore_ports::types::Difficulty::Easy,
        })
        .unwrap();
    h.core
        .handle_command(Command::StartFallingNotes {
            user_id: UserId("player".to_string()),
            source: FallingSource::Layer {
                track_id: TrackId("beat".to_string()),
            },
        })
        .unwrap();

    h.core.tick(0.0);
    h.core
        .handle_command(Command::LaneActivate { lane: 0 })
        .unwrap();
    h.clock.set(500.0);
    h.core.tick(500.0);
    h.core
        .handle_command(Command::LaneActivate { lane: 1 })
        .unwrap();
    h.clock.set(600.0);
    assert_eq!(h.core.tick(600.0), TickFlow::Stop);

    let events = h.core.drain_events();
    assert_eq!(completed(&events), Some((LetterGrade::S, 100, true)));
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::NoteJudged { lane: 1, .. })));
}

#[test]
fn aborting_ends_the_session_without_a_score() {
    let mut h = loaded();
    h.core
        .handle_command(Command::StartFallingNotes {
            user_id: UserId("player".to_string()),
            source: FallingSource::Random {
                instrument: Instrument::Bass,
            },
        })
        .unwrap();
    h.core.handle_command(Command::AbortSession).unwrap();

    assert!(h.core.drain_events().contains(&Event::SessionAborted));
    assert!(!h.core.has_session());
    assert_eq!(h.store.score_count(), 0);
    assert!(matches!(
        h.core.handle_command(Command::AbortSession),
        Err(AppError::NoActiveSession)
    ));
}

#[test]
fn aborting_silences_scheduled_playback() {
    let mut h = loaded();
    h.core
        .handle_command(Command::StartFallingNotes {
            user_id: UserId("player".to_string()),
            source: FallingSource::Random {
                instrument: Instrument::Drums,
            },
        })
        .unwrap();
    h.core
        .handle_command(Command::Play { from_offset: 0.0 })
        .unwrap();
    h.core.tick(0.0);
    let before = h.sink.played().len();
    assert_eq!(before, 2);

    h.core.handle_command(Command::AbortSession).unwrap();
    assert_eq!(h.core.playback().state(), PlaybackState::Idle);
    assert_eq!(h.core.playback().pending_count(), 0);

    h.clock.set(600.0);
    assert_eq!(h.core.tick(600.0), TickFlow::Stop);
    assert_eq!(h.sink.played().len(), before);
}

#[test]
fn composition_playback_survives_a_replication_session() {
    let mut h = loaded();
    let start = |h: &mut Harness| {
        h.core
            .handle_command(Command::StartReplication {
                user_id: UserId("player".to_string()),
                track_id: TrackId("beat".to_string()),
            })
            .unwrap();
        h.core.handle_command(Command::PlayReference).unwrap();
    };

    start(&mut h);
    h.core.handle_command(Command::AbortSession).unwrap();
    h.core
        .handle_command(Command::SetMuted {
            track_id: TrackId("keys".to_string()),
            muted: true,
        })
        .unwrap();

    start(&mut h);
    h.core.handle_command(Command::StartListening).unwrap();
    h.core.handle_command(Command::FinishEarly).unwrap();
    assert!(!h.core.has_session());
    h.core
        .handle_command(Command::SetSoloed {
            track_id: TrackId("keys".to_string()),
            soloed: true,
        })
        .unwrap();

    let played = h.sink.played().len();
    h.core
        .handle_command(Command::Play { from_offset: 0.0 })
        .unwrap();
    h.core.tick(0.0);
    let fresh: Vec<String> = h.sink.played_tokens()[played..].to_vec();
    assert_eq!(fresh, vec!["C4"]);
}

#[test]
fn session_input_needs_the_matching_session() {
    let mut h = loaded();
    assert!(matches!(
        h.core.handle_command(Command::LaneActivate { lane: 0 }),
        Err(AppError::NoActiveSession)
    ));
    assert!(matches!(
        h.core.handle_command(Command::StartReplication {
            user_id: UserId("player".to_string()),
            track_id: TrackId("bass".to_string()),
        }),
        Err(AppError::UnknownTrack(_))
    ));
}

#[test]
fn comparing_a_layer_with_itself_is_perfect() {
    let mut h = loaded();
    h.core
        .handle_command(Command::CompareTracks {
            original: TrackId("keys".to_string()),
            recorded: TrackId("keys".to_string()),
        })
        .unwrap();

    let Some(Event::ComparisonReady { report }) = h.core.drain_events().pop() else {
        panic!("expected a comparison");
    };
    assert_eq!(report.overall_score, 100);
    assert_eq!(report.missed_notes, 0);
    assert_eq!(report.extra_notes, 0);
}

#[test]
fn saving_an_invalid_composition_is_rejected() {
    let mut h = harness(MemoryStore::default());
    let bad = composition(
        "bad",
        vec![track(
            "beat",
            Instrument::Drums,
            vec![note("C4", 0.0, 0.1)],
            1.0,
        )],
    );
    assert!(matches!(
        h.core.handle_command(Command::SaveComposition {
            post_id: PostId("post-2".to_string()),
            composition: bad,
        }),
        Err(AppError::Track(_))
    ));
}

#[test]
fn scores_are_submitted_once() {
    let store = Arc::new(MemoryStore::default());
    let mut submitter = ScoreSubmitter::new(store.clone());
    let context = ChallengeContext {
        user_id: UserId("player".to_string()),
        original_track_id: TrackId("beat".to_string()),
        composition_id: CompositionId("jam".to_string()),
    };
    let tally = HitTally {
        perfect: 3,
        great: 1,
        good: 0,
        miss: 0,
    };
    let score = build_challenge_score(
        &context,
        &tally,
        ModeWeights::FALLING_NOTES,
        ChallengeType::FallingNotes,
        1_700_000_000_000,
    );

    assert!(submitter.submit(&context.composition_id, &score).unwrap());
    assert!(!submitter.submit(&context.composition_id, &score).unwrap());
    assert_eq!(
        store.scores_for(&context.composition_id).unwrap(),
        vec![score]
    );
}

mod common;

use common::{note, token, track, RecordingSink};
use encore_core::{
    ChallengeContext, ManualClock, PlaybackEngine, ReplicationEvent, ReplicationSession,
    ReplicationState, SchedulerConfig, SessionError,
};
use encore_domain_eval::MatchStatus;
use encore_ports::model::{ChallengeType, Track};
use encore_ports::note::Instrument;
use encore_ports::playback::{PlaybackPort, PlaybackState};
use encore_ports::storage::ModeWeights;
use encore_ports::types::{CompositionId, TrackId, UserId, Velocity01};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Rig {
    session: ReplicationSession,
    playback: Arc<PlaybackEngine>,
    sink: Arc<RecordingSink>,
}

fn phrase() -> Track {
    track(
        "phrase",
        Instrument::Piano,
        vec![note("C4", 0.0, 0.25), note("D4", 0.5, 0.25), note("E4", 1.0, 0.25)],
        2.0,
    )
}

fn rig(target: Track) -> Rig {
    let sink = Arc::new(RecordingSink::ready());
    let clock = Arc::new(ManualClock::new());
    let playback = Arc::new(PlaybackEngine::new(
        sink.clone(),
        clock,
        SchedulerConfig::default(),
    ));
    let context = ChallengeContext {
        user_id: UserId("player".to_string()),
        original_track_id: target.id.clone(),
        composition_id: CompositionId("jam".to_string()),
    };
    let session = ReplicationSession::new(
        target,
        context,
        ModeWeights::REPLICATION,
        playback.clone(),
        sink.clone(),
    );
    Rig {
        session,
        playback,
        sink,
    }
}

fn play(session: &mut ReplicationSession, text: &str, now: f64) -> MatchStatus {
    session
        .on_note_played(token(text), Velocity01::new(0.7), now)
        .unwrap()
        .status
}

#[test]
fn one_wrong_note_out_of_three_scores_67() {
    let Rig {
        mut session, sink, ..
    } = rig(phrase());
    session.start_listening(0.0).unwrap();

    assert_eq!(play(&mut session, "C4", 100.0), MatchStatus::Correct);
    assert_eq!(play(&mut session, "F4", 900.0), MatchStatus::Missed);
    assert_eq!(session.state(), ReplicationState::Listening);
    assert_eq!(play(&mut session, "E4", 1_500.0), MatchStatus::Correct);

    assert_eq!(session.state(), ReplicationState::Completed);
    let score = session.final_score().unwrap();
    assert_eq!(score.accuracy_score, 67);
    assert_eq!(score.timing_score, 67);
    assert_eq!(score.combined_score, 67);
    assert_eq!(score.perfect_hits, 2);
    assert_eq!(score.missed_notes, 1);
    assert_eq!(score.challenge_type, ChallengeType::Replication);
    assert_eq!(score.original_track_id, TrackId("phrase".to_string()));
    assert!((session.accuracy() - 200.0 / 3.0).abs() < 1e-9);

    // every played note is echoed, right or wrong
    assert_eq!(sink.played_tokens(), vec!["C4", "F4", "E4"]);
}

#[test]
fn progress_is_reported_after_each_note() {
    let Rig { mut session, .. } = rig(phrase());
    session.start_listening(0.0).unwrap();
    play(&mut session, "D4", 10.0);

    let events = session.drain_events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        ReplicationEvent::Progress {
            correct: 0,
            missed: 1,
            remaining: 2,
        }
    );
}

#[test]
fn finishing_early_misses_the_rest() {
    let Rig { mut session, .. } = rig(phrase());
    session.start_listening(0.0).unwrap();
    play(&mut session, "C4", 50.0);

    let score = session.finish_early().unwrap();
    assert_eq!(score.combined_score, 33);
    assert_eq!(score.missed_notes, 2);
    assert_eq!(session.results().len(), 3);
    assert_eq!(session.results()[2].status, MatchStatus::Missed);
    assert!(session.results()[2].played_note.is_none());

    assert!(matches!(
        session.finish_early(),
        Err(SessionError::InvalidState {
            actual: "completed",
            ..
        })
    ));
}

#[test]
fn notes_before_listening_are_rejected() {
    let Rig { mut session, .. } = rig(phrase());
    let err = session
        .on_note_played(token("C4"), Velocity01::new(0.5), 0.0)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            expected: "listening",
            actual: "idle",
        }
    ));

    session.start_listening(0.0).unwrap();
    assert!(session.start_listening(5.0).is_err());
}

#[test]
fn reference_plays_then_stops_when_listening() {
    let Rig {
        mut session,
        playback,
        sink,
    } = rig(phrase());

    session.play_reference().unwrap();
    assert_eq!(playback.state(), PlaybackState::Playing);
    playback.advance(0.0).unwrap();
    assert_eq!(sink.played_tokens(), vec!["C4"]);

    session.start_listening(100.0).unwrap();
    assert_eq!(playback.state(), PlaybackState::Idle);
    assert_eq!(playback.pending_count(), 0);
}

#[test]
fn abort_stops_the_reference() {
    let Rig {
        mut session,
        playback,
        ..
    } = rig(phrase());
    session.play_reference().unwrap();
    session.abort().unwrap();

    assert_eq!(session.state(), ReplicationState::Aborted);
    assert_eq!(playback.state(), PlaybackState::Idle);
    assert_eq!(session.drain_events(), vec![ReplicationEvent::Aborted]);
    assert!(session.play_reference().is_err());
}

#[test]
fn empty_target_completes_at_zero() {
    let empty = track("silence", Instrument::Piano, Vec::new(), 1.0);
    let Rig { mut session, .. } = rig(empty);
    session.start_listening(0.0).unwrap();

    assert_eq!(session.state(), ReplicationState::Completed);
    let score = session.final_score().unwrap();
    assert_eq!(score.combined_score, 0);
    assert_eq!(score.timing_score, 0);
    assert_eq!(session.accuracy(), 0.0);
}

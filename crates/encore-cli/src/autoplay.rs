use encore_core::{FallingNoteSession, FallingStats, FrameLoop, LiveNoteState, ManualClock};
use encore_ports::clock::{FrameTick, TickFlow};
use encore_ports::model::ChallengeScore;
use encore_ports::types::Millis;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Frames after which a simulated run is cut off.
const MAX_FRAMES: u64 = 1_000_000;

/// Taps every note once it reaches the hit line, optionally letting every
/// `skip_every`-th note fall through.
pub struct Autoplayer<'a> {
    session: &'a mut FallingNoteSession,
    skip_every: Option<u32>,
    decided: HashSet<u64>,
    seen: u32,
}

impl<'a> Autoplayer<'a> {
    pub fn new(session: &'a mut FallingNoteSession, skip_every: Option<u32>) -> Self {
        Self {
            session,
            skip_every: skip_every.filter(|n| *n > 0),
            decided: HashSet::new(),
            seen: 0,
        }
    }
}

impl FrameTick for Autoplayer<'_> {
    fn tick(&mut self, now_ms: Millis) -> TickFlow {
        if self.session.tick(now_ms) == TickFlow::Stop {
            return TickFlow::Stop;
        }

        let due: Vec<(u64, u8)> = self
            .session
            .live_notes()
            .iter()
            .filter(|n| n.state == LiveNoteState::InFlight && n.expected_hit_time <= now_ms)
            .filter(|n| !self.decided.contains(&n.id))
            .map(|n| (n.id, n.lane))
            .collect();

        for (id, lane) in due {
            self.decided.insert(id);
            self.seen += 1;
            if self.skip_every.is_some_and(|n| self.seen % n == 0) {
                continue;
            }
            if let Err(err) = self.session.on_lane_activate(lane, now_ms) {
                warn!(%err, lane, "autoplay tap rejected");
            }
        }
        TickFlow::Continue
    }
}

#[derive(Clone, Debug)]
pub struct SimulationOutcome {
    pub stats: FallingStats,
    pub score: Option<ChallengeScore>,
    pub frames: u64,
}

/// Run `session` to completion on a synthetic clock.
pub fn simulate(
    mut session: FallingNoteSession,
    frame_interval: Duration,
    skip_every: Option<u32>,
) -> anyhow::Result<SimulationOutcome> {
    let clock = Arc::new(ManualClock::new());
    session.start(0.0)?;

    let frames = {
        let mut player = Autoplayer::new(&mut session, skip_every);
        FrameLoop::new(clock.clone(), frame_interval)
            .with_max_frames(MAX_FRAMES)
            .run_simulated(&clock, &mut player)
    };

    Ok(SimulationOutcome {
        stats: session.stats(),
        score: session.final_score().cloned(),
        frames,
    })
}

use encore_ports::clock::{Clock, FrameTick, TickFlow};
use encore_ports::types::Millis;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Wall clock; the epoch is the moment of construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// Synthetic clock driven by the caller. Shareable across threads.
#[derive(Debug)]
pub struct ManualClock {
    now_bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn set(&self, now_ms: Millis) {
        self.now_bits.store(now_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: Millis) -> Millis {
        let next = self.now_ms() + delta_ms;
        self.set(next);
        next
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        f64::from_bits(self.now_bits.load(Ordering::Relaxed))
    }
}

/// Drives a `FrameTick` once per refresh until it asks to stop.
pub struct FrameLoop {
    clock: Arc<dyn Clock>,
    frame_interval: Duration,
    max_frames: Option<u64>,
}

impl FrameLoop {
    pub fn new(clock: Arc<dyn Clock>, frame_interval: Duration) -> Self {
        Self {
            clock,
            frame_interval,
            max_frames: None,
        }
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Real-time loop: sleeps between frames. Returns the number of frames run.
    pub fn run(&self, target: &mut dyn FrameTick) -> u64 {
        self.run_with(target, thread::sleep)
    }

    /// Simulated loop: each frame advances `clock` by the frame interval
    /// instead of sleeping.
    pub fn run_simulated(&self, clock: &ManualClock, target: &mut dyn FrameTick) -> u64 {
        self.run_with(target, |interval| {
            clock.advance(interval.as_secs_f64() * 1000.0);
        })
    }

    fn run_with(&self, target: &mut dyn FrameTick, mut wait: impl FnMut(Duration)) -> u64 {
        let mut frames = 0u64;
        loop {
            let now = self.clock.now_ms();
            frames += 1;
            if target.tick(now) == TickFlow::Stop {
                break;
            }
            if self.max_frames.is_some_and(|max| frames >= max) {
                tracing::warn!(frames, "frame loop hit its frame cap");
                break;
            }
            wait(self.frame_interval);
        }
        frames
    }
}

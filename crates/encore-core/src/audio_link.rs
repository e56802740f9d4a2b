use encore_ports::audio::{AudioError, AudioSink, NullAudioSink};
use encore_ports::storage::GameSettings;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioInitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for AudioInitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl From<&GameSettings> for AudioInitPolicy {
    fn from(settings: &GameSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.audio_init_timeout_ms),
            poll_interval: Duration::from_millis(settings.audio_init_poll_ms.max(1)),
        }
    }
}

/// Audio sink a session plays through, and whether it fell back to silence.
#[derive(Clone)]
pub struct AudioLink {
    sink: Arc<dyn AudioSink>,
    degraded: bool,
}

impl AudioLink {
    /// Blocks until `sink` reports ready or the policy times out. Never call
    /// from inside a frame tick.
    pub fn establish(sink: Arc<dyn AudioSink>, policy: AudioInitPolicy) -> Self {
        match ensure_ready(sink.as_ref(), policy) {
            Ok(()) => Self {
                sink,
                degraded: false,
            },
            Err(err) => {
                warn!(%err, "audio unavailable, continuing without sound");
                Self::silent()
            }
        }
    }

    pub fn silent() -> Self {
        Self {
            sink: Arc::new(NullAudioSink),
            degraded: true,
        }
    }

    pub fn sink(&self) -> Arc<dyn AudioSink> {
        self.sink.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Initialize `sink` if needed and poll its state until it is ready.
pub fn ensure_ready(sink: &dyn AudioSink, policy: AudioInitPolicy) -> Result<(), AudioError> {
    if sink.engine_state().is_initialized {
        return Ok(());
    }

    sink.initialize()?;
    let started = Instant::now();
    loop {
        if sink.engine_state().is_initialized {
            info!(
                waited_ms = started.elapsed().as_millis() as u64,
                "audio engine ready"
            );
            return Ok(());
        }
        if started.elapsed() >= policy.timeout {
            return Err(AudioError::InitTimeout(policy.timeout.as_millis() as u64));
        }
        debug!("waiting for audio engine");
        thread::sleep(policy.poll_interval);
    }
}

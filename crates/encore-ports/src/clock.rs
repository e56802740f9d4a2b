use crate::types::Millis;

/// Monotonic millisecond clock with an epoch fixed when the clock is created.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// One cooperative frame step. Must return promptly; returning
/// `TickFlow::Stop` is the only way to cancel.
pub trait FrameTick {
    fn tick(&mut self, now_ms: Millis) -> TickFlow;
}

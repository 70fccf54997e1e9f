//! Platform abstraction for Lazyfeed runtime services.
//!
//! The runtime delegates frame scheduling to the host, so it can be
//! embedded in different environments (desktop event loop, test harness)
//! without depending directly on any windowing API.

/// Schedules work for the Lazyfeed runtime.
///
/// Implementations are responsible for waking the host loop so it calls
/// [`crate::RuntimeHandle::drain_ui`] again. They must be safe to use from
/// multiple threads because async task wakers and cross-thread posts call
/// into them.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host schedule a new drain of the UI queue.
    fn schedule_frame(&self);
}

/// Scheduler that does nothing.
///
/// Suitable for hosts that drain the runtime unconditionally every frame,
/// and for tests that pump [`crate::RuntimeHandle::drain_ui`] by hand.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

//! Platform abstraction traits for the Redact scheduler.
//!
//! The render loop never blocks: it asks the host for an idle callback and,
//! when the host calls back, checks a [`Deadline`] between units of work. These
//! traits let any event loop (a browser's idle callback, a desktop frame loop,
//! a test harness) drive the scheduler without the core depending on `std`
//! timing APIs.

use std::time::Duration;

/// Arranges for the host to call [`Root::work_loop`](crate::Root::work_loop)
/// again when it is idle.
///
/// Implementations must be safe to use from multiple threads so a host can
/// wake its loop from anywhere; the scheduler itself only calls it from the
/// render thread.
pub trait IdleScheduler: Send + Sync {
    /// Request one more idle callback.
    fn request_idle_callback(&self);
}

/// Time budget left in the current idle period.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;
}

impl<F> Deadline for F
where
    F: Fn() -> Duration,
{
    fn time_remaining(&self) -> Duration {
        self()
    }
}

/// Deadline that never runs out. Used to drive a pass to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Provides timing information for host deadlines.
pub trait Clock: Send + Sync {
    /// Instant type produced by this clock implementation.
    type Instant: Copy + Send + Sync;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the time elapsed since `since`.
    fn elapsed(&self, since: Self::Instant) -> Duration;
}

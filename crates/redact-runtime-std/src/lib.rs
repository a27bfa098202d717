//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `redact-core`: an idle scheduler that records callback requests
//! and optionally wakes a host loop, a clock over [`std::time::Instant`] and a
//! per-slice frame deadline. [`StdRuntime`] bundles them and drives a
//! [`Root`] until it has nothing left to do.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use redact_core::{
    Clock, Deadline, IdleScheduler, RenderError, ResourceAdapter, Root, Runtime, RuntimeHandle,
    WorkStatus,
};

/// Default time budget of one host slice, roughly one 60 Hz frame.
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(16);

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Idle scheduler that records callback requests for a host loop to poll.
pub struct StdScheduler {
    callback_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            callback_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a callback has been requested since the last call.
    pub fn take_callback_request(&self) -> bool {
        self.callback_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a callback is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        let mut slot = self.waker.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        let mut slot = self.waker.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "callback_requested",
                &self.callback_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl IdleScheduler for StdScheduler {
    fn request_idle_callback(&self) {
        self.callback_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Deadline of one slice: `budget` measured from the moment it was started.
pub struct FrameDeadline<'a, C: Clock> {
    clock: &'a C,
    started: C::Instant,
    budget: Duration,
}

impl<'a, C: Clock> FrameDeadline<'a, C> {
    pub fn start(clock: &'a C, budget: Duration) -> Self {
        Self {
            clock,
            started: clock.now(),
            budget,
        }
    }
}

impl<C: Clock> Deadline for FrameDeadline<'_, C> {
    fn time_remaining(&self) -> Duration {
        self.budget
            .saturating_sub(self.clock.elapsed(self.started))
    }
}

/// Convenience container bundling the standard scheduler, clock and frame
/// budget.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
    frame_budget: Duration,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            clock: Arc::new(StdClock),
            runtime,
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }

    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Returns a [`redact_core::Runtime`] wired to the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    pub fn take_callback_request(&self) -> bool {
        self.scheduler.take_callback_request()
    }

    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Runs one slice of `root` within the frame budget.
    pub fn run_slice<A: ResourceAdapter>(
        &self,
        root: &mut Root<A>,
    ) -> Result<WorkStatus, RenderError> {
        let deadline = FrameDeadline::start(self.clock.as_ref(), self.frame_budget);
        root.work_loop(&deadline)
    }

    /// Answers idle-callback requests until the root stops asking for them.
    ///
    /// Returns the number of committed passes. A failed pass is logged and
    /// dropped; the loop keeps serving any request made after it.
    pub fn run_until_idle<A: ResourceAdapter>(&self, root: &mut Root<A>) -> usize {
        let mut commits = 0;
        while self.take_callback_request() {
            match self.run_slice(root) {
                Ok(WorkStatus::Committed(summary)) => {
                    log::debug!("host slice committed {summary:?}");
                    commits += 1;
                }
                Ok(WorkStatus::Yielded | WorkStatus::Idle) => {}
                Err(err) => log::error!("render pass failed: {err}"),
            }
        }
        commits
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("frame_budget", &self.frame_budget)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

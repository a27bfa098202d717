use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::IdleScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn IdleScheduler>,
    needs_callback: Cell<bool>,
    update_requested: Cell<bool>,
    update_requests: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            scheduler,
            needs_callback: Cell::new(false),
            update_requested: Cell::new(false),
            update_requests: Cell::new(0),
        }
    }

    fn request_callback(&self) {
        self.needs_callback.set(true);
        self.scheduler.request_idle_callback();
    }

    fn request_update(&self) {
        self.update_requests.set(self.update_requests.get() + 1);
        if !self.update_requested.replace(true) {
            self.request_callback();
        }
    }

    fn take_update_request(&self) -> bool {
        self.update_requested.replace(false)
    }
}

/// Signal shared between a [`Root`](crate::Root) and the hook setters it hands
/// out. Setters never touch the fiber trees directly; they flag an update here
/// and the scheduler picks it up at the next unit boundary.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Whether the scheduler asked for an idle callback that has not been
    /// answered by a quiet `work_loop` yet.
    pub fn needs_callback(&self) -> bool {
        self.inner.needs_callback.get()
    }

    pub fn set_needs_callback(&self, value: bool) {
        self.inner.needs_callback.set(value);
    }

    pub fn has_pending_update(&self) -> bool {
        self.inner.update_requested.get()
    }

    /// Total number of update requests received, including coalesced ones.
    pub fn update_requests(&self) -> u64 {
        self.inner.update_requests.get()
    }

    pub(crate) fn request_callback(&self) {
        self.inner.request_callback();
    }

    pub(crate) fn take_update_request(&self) -> bool {
        self.inner.take_update_request()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl IdleScheduler for DefaultScheduler {
    fn request_idle_callback(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    requests: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl IdleScheduler for TestScheduler {
    fn request_idle_callback(&self) {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Weak handle to a [`Runtime`], held by hook setters.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    /// Ask for a new render pass derived from the last committed tree.
    ///
    /// Requests are coalesced until the scheduler absorbs them. Returns
    /// `false` when the runtime no longer exists.
    pub fn request_update(&self) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                inner.request_update();
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn has_pending_update(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| inner.update_requested.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_requests_coalesce_into_one_callback() {
        let scheduler = Arc::new(TestScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let handle = runtime.handle();

        assert!(handle.request_update());
        assert!(handle.request_update());
        assert_eq!(scheduler.requests(), 1);
        assert_eq!(runtime.update_requests(), 2);
        assert!(runtime.needs_callback());
        assert!(handle.has_pending_update());

        assert!(runtime.take_update_request());
        assert!(!runtime.has_pending_update());
        assert!(handle.request_update());
        assert_eq!(scheduler.requests(), 2);
    }

    #[test]
    fn dropped_runtime_ignores_requests() {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let handle = runtime.handle();
        drop(runtime);
        assert!(!handle.is_alive());
        assert!(!handle.request_update());
        assert!(!handle.has_pending_update());
    }
}

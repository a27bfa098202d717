use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redact_core::{
    CommitSummary, Deadline, Element, Event, IdleScheduler, MemorySurface, RenderError,
    ResourceId, Root, RootOptions, Runtime, RuntimeHandle, SurfaceCall, Unbounded, WorkStatus,
};

/// Idle scheduler that only counts callback requests.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl IdleScheduler for CountingScheduler {
    fn request_idle_callback(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deadline that replays a fixed script of remaining-time answers, then
/// reports no time left.
#[derive(Debug, Default)]
pub struct ScriptedDeadline {
    script: RefCell<VecDeque<Duration>>,
}

impl ScriptedDeadline {
    pub fn new(script: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
        }
    }

    /// A deadline that lets exactly `units` units run in one slice.
    pub fn units(units: usize) -> Self {
        Self::new(std::iter::repeat(Duration::MAX).take(units.saturating_sub(1)))
    }

    /// A deadline that is already spent; a slice still performs one unit.
    pub fn exhausted() -> Self {
        Self::default()
    }
}

impl Deadline for ScriptedDeadline {
    fn time_remaining(&self) -> Duration {
        self.script.borrow_mut().pop_front().unwrap_or(Duration::ZERO)
    }
}

/// Headless harness for exercising render roots in tests.
///
/// `RenderTestRule` owns a root bound to an in-memory surface and a container
/// resource, and exposes helpers for driving passes either to completion or
/// slice by slice.
pub struct RenderTestRule {
    root: Root<MemorySurface>,
    container: ResourceId,
    scheduler: Arc<CountingScheduler>,
}

impl RenderTestRule {
    pub fn new() -> Self {
        Self::with_options(RootOptions::default())
    }

    pub fn with_options(options: RootOptions) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let mut root = Root::with_runtime(MemorySurface::new(), runtime).with_options(options);
        let container = root.adapter_mut().create_container("root");
        Self {
            root,
            container,
            scheduler,
        }
    }

    /// Renders `element` into the container and runs until idle.
    pub fn set_content(&mut self, element: Element) -> Result<Option<CommitSummary>, RenderError> {
        self.install(element);
        self.pump_until_idle()
    }

    /// Starts a render pass without performing any work.
    pub fn install(&mut self, element: Element) {
        self.root.render(element, self.container);
    }

    /// Runs one slice against `deadline`.
    pub fn step(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, RenderError> {
        self.root.work_loop(deadline)
    }

    /// Drives every pending pass to completion and returns the summary of the
    /// last commit.
    pub fn pump_until_idle(&mut self) -> Result<Option<CommitSummary>, RenderError> {
        let mut last = None;
        loop {
            match self.root.work_loop(&Unbounded)? {
                WorkStatus::Idle => return Ok(last),
                WorkStatus::Yielded => {}
                WorkStatus::Committed(summary) => last = Some(summary),
            }
        }
    }

    /// Delivers `event` to the first resource of `kind`. Returns how many
    /// handlers ran; zero when no such resource exists.
    pub fn dispatch(&self, kind: &str, event: &Event) -> usize {
        match self.find(kind).first() {
            Some(&id) => self.root.adapter().dispatch(id, event),
            None => 0,
        }
    }

    pub fn click(&self, kind: &str) -> usize {
        self.dispatch(kind, &Event::new("click"))
    }

    pub fn find(&self, kind: &str) -> Vec<ResourceId> {
        self.root.adapter().find_by_kind(self.container, kind)
    }

    pub fn text(&self) -> String {
        self.root.adapter().text_content(self.container)
    }

    pub fn dump(&self) -> String {
        self.root.adapter().dump_tree(self.container)
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        self.root.adapter().calls()
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        self.root.adapter_mut().take_calls()
    }

    pub fn surface(&self) -> &MemorySurface {
        self.root.adapter()
    }

    pub fn container(&self) -> ResourceId {
        self.container
    }

    pub fn callback_requests(&self) -> usize {
        self.scheduler.requests()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.root.runtime_handle()
    }

    /// Gain access to the raw root for advanced scenarios.
    pub fn root(&mut self) -> &mut Root<MemorySurface> {
        &mut self.root
    }
}

impl Default for RenderTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `RenderTestRule`.
pub fn run_test_render<R>(f: impl FnOnce(&mut RenderTestRule) -> R) -> R {
    let mut rule = RenderTestRule::new();
    f(&mut rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_deadline_allows_the_requested_units() {
        let deadline = ScriptedDeadline::units(3);
        assert_eq!(deadline.time_remaining(), Duration::MAX);
        assert_eq!(deadline.time_remaining(), Duration::MAX);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
        assert_eq!(ScriptedDeadline::exhausted().time_remaining(), Duration::ZERO);
    }

    #[test]
    fn render_test_rule_reports_content() {
        run_test_render(|rule| {
            assert_eq!(rule.text(), "");
            let summary = rule
                .set_content(Element::host("p").child("hi"))
                .expect("render")
                .expect("committed");
            assert_eq!(summary.placements, 2);
            assert_eq!(rule.text(), "hi");
            assert_eq!(rule.find("p").len(), 1);
            assert!(rule.dump().contains("p"));
            assert_eq!(rule.click("p"), 0);
        });
    }
}

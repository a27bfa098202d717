//! Render session: the cooperative unit-of-work scheduler.
//!
//! A [`Root`] owns the committed tree, the pass in progress and the resource
//! adapter. The host drives it by calling [`Root::work_loop`] whenever the
//! idle scheduler fires. Each call performs units of work in pre-order until
//! the deadline runs short, and commits once no unit remains.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::commit::{apply_commit, plan_commit, CommitSummary};
use crate::element::{Element, ElementKind, Props};
use crate::fiber::{Fiber, FiberId, FiberTree};
use crate::hooks::{render_with_hooks, HookError};
use crate::platform::{Deadline, Unbounded};
use crate::reconcile::reconcile_children;
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};
use crate::surface::ResourceAdapter;
use crate::RenderError;

/// Scheduling knobs for a [`Root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootOptions {
    /// Yield once the deadline reports less time than this.
    pub yield_threshold: Duration,
    /// Upper bound on units performed per `work_loop` call.
    pub max_units_per_slice: Option<usize>,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            max_units_per_slice: None,
        }
    }
}

impl RootOptions {
    pub fn with_yield_threshold(mut self, threshold: Duration) -> Self {
        self.yield_threshold = threshold;
        self
    }

    pub fn with_max_units_per_slice(mut self, units: usize) -> Self {
        self.max_units_per_slice = Some(units.max(1));
        self
    }

    fn should_yield(&self, units: usize, deadline: &dyn Deadline) -> bool {
        if let Some(limit) = self.max_units_per_slice {
            if units >= limit {
                return true;
            }
        }
        deadline.time_remaining() < self.yield_threshold
    }
}

/// Outcome of one [`Root::work_loop`] slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing to do; no further callback was requested.
    Idle,
    /// Work remains; another idle callback was requested.
    Yielded,
    /// A pass finished and its mutations reached the surface.
    Committed(CommitSummary),
}

/// The pass being built: its tree, the previous fibers it deletes and the
/// resume point of the walk.
pub struct WorkInProgress<H> {
    tree: FiberTree<H>,
    deletions: Vec<FiberId>,
    next_unit: Option<FiberId>,
    units_performed: usize,
}

impl<H: Clone> WorkInProgress<H> {
    fn new(props: Rc<Props>, container: H, alternate: Option<FiberId>) -> Self {
        let tree = FiberTree::with_root(props, container, alternate);
        let next_unit = Some(tree.root());
        Self {
            tree,
            deletions: Vec::new(),
            next_unit,
            units_performed: 0,
        }
    }

    /// A pass that re-renders from `root` with the same props and container.
    fn from_root(root: &Fiber<H>, alternate: Option<FiberId>) -> Option<Self> {
        let container = root.resource()?.clone();
        Some(Self::new(Rc::clone(&root.props), container, alternate))
    }

    pub fn tree(&self) -> &FiberTree<H> {
        &self.tree
    }

    /// Fibers of the committed tree this pass removes, in discovery order.
    pub fn deletions(&self) -> &[FiberId] {
        &self.deletions
    }

    pub fn next_unit(&self) -> Option<FiberId> {
        self.next_unit
    }

    pub fn units_performed(&self) -> usize {
        self.units_performed
    }

    fn perform_unit(
        &mut self,
        unit: FiberId,
        current: Option<&FiberTree<H>>,
        runtime: &RuntimeHandle,
    ) -> Result<(), HookError> {
        let fiber = &self.tree[unit];
        let props = Rc::clone(&fiber.props);
        let rendered;
        let children: &[Element] = match &fiber.kind {
            ElementKind::Component(component) => {
                let component = component.clone();
                let previous = match (fiber.alternate, current) {
                    (Some(alternate), Some(tree)) => Some(tree[alternate].hooks.clone()),
                    _ => None,
                };
                let (output, hooks) =
                    render_with_hooks(runtime.clone(), previous, || component.render(&props))?;
                self.tree.fiber_mut(unit).hooks = hooks;
                rendered = output;
                &rendered
            }
            ElementKind::Host(_) | ElementKind::Text => props.children(),
        };

        reconcile_children(&mut self.tree, current, unit, children, &mut self.deletions);
        self.next_unit = self.tree.next_unit(unit);
        self.units_performed += 1;
        log::trace!(
            "performed {} ({} children)",
            self.tree[unit].kind().label(),
            self.tree[unit].children().len()
        );
        Ok(())
    }
}

/// One render root bound to a presentation surface.
pub struct Root<A: ResourceAdapter> {
    adapter: A,
    runtime: Runtime,
    options: RootOptions,
    current: Option<FiberTree<A::Handle>>,
    work: Option<WorkInProgress<A::Handle>>,
}

impl<A: ResourceAdapter> Root<A> {
    /// Creates a root whose idle-callback requests go nowhere. Drive it with
    /// [`Root::flush`] or an explicit `work_loop` loop.
    pub fn new(adapter: A) -> Self {
        Self::with_runtime(adapter, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(adapter: A, runtime: Runtime) -> Self {
        Self {
            adapter,
            runtime,
            options: RootOptions::default(),
            current: None,
            work: None,
        }
    }

    pub fn with_options(mut self, options: RootOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> RootOptions {
        self.options
    }

    /// Starts a pass that renders `element` into `container`.
    ///
    /// Replaces any pass still in progress; nothing is committed until the
    /// scheduler finishes the new one.
    pub fn render(&mut self, element: Element, container: A::Handle) {
        let props = Rc::new(Props::with_children(vec![element]));
        let alternate = self.current.as_ref().map(FiberTree::root);
        if self.work.is_some() {
            log::debug!("render replaces the pass in progress");
        }
        self.work = Some(WorkInProgress::new(props, container, alternate));
        self.runtime.request_callback();
    }

    /// Performs work until the pass commits or `deadline` runs short.
    ///
    /// The first unit of a slice always runs. A failed pass is discarded with
    /// the committed tree and the surface left untouched.
    pub fn work_loop(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, RenderError> {
        let mut units = 0usize;
        loop {
            self.absorb_update_request();

            let Some(work) = self.work.as_mut() else {
                self.runtime.set_needs_callback(false);
                return Ok(WorkStatus::Idle);
            };

            let Some(unit) = work.next_unit else {
                let summary = self.commit();
                self.runtime
                    .set_needs_callback(self.runtime.has_pending_update());
                return summary.map(WorkStatus::Committed);
            };

            if units > 0 && self.options.should_yield(units, deadline) {
                log::debug!("yielding after {units} units");
                self.runtime.request_callback();
                return Ok(WorkStatus::Yielded);
            }

            let handle = self.runtime.handle();
            if let Err(error) = work.perform_unit(unit, self.current.as_ref(), &handle) {
                self.work = None;
                self.runtime
                    .set_needs_callback(self.runtime.has_pending_update());
                log::debug!("render pass aborted: {error}");
                return Err(error.into());
            }
            units += 1;
        }
    }

    /// Drives the pending pass, and any pass requested while it runs, to
    /// completion. Returns the summary of the last commit.
    pub fn flush(&mut self) -> Result<Option<CommitSummary>, RenderError> {
        let mut last = None;
        loop {
            match self.work_loop(&Unbounded)? {
                WorkStatus::Idle => return Ok(last),
                WorkStatus::Yielded => {}
                WorkStatus::Committed(summary) => last = Some(summary),
            }
        }
    }

    pub fn has_pending_work(&self) -> bool {
        self.work.is_some() || (self.current.is_some() && self.runtime.has_pending_update())
    }

    pub fn current(&self) -> Option<&FiberTree<A::Handle>> {
        self.current.as_ref()
    }

    pub fn work_in_progress(&self) -> Option<&WorkInProgress<A::Handle>> {
        self.work.as_ref()
    }

    pub fn pending_deletions(&self) -> &[FiberId] {
        self.work
            .as_ref()
            .map(WorkInProgress::deletions)
            .unwrap_or_default()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Turns a pending update request into a pass.
    ///
    /// A pass that has not performed any unit yet already reads the latest
    /// queued state and is kept. A pass in flight is discarded and rebuilt from
    /// its own root, so a pending `render` keeps its element and container.
    fn absorb_update_request(&mut self) {
        if !self.runtime.take_update_request() {
            return;
        }
        let alternate = self.current.as_ref().map(FiberTree::root);
        let restarted = match &self.work {
            Some(work) if work.units_performed == 0 => return,
            Some(work) => {
                log::debug!(
                    "restarting pass after {} units with {} pending deletions",
                    work.units_performed,
                    work.deletions.len()
                );
                WorkInProgress::from_root(&work.tree[work.tree.root()], alternate)
            }
            None => match &self.current {
                Some(current) => {
                    log::debug!("starting update pass");
                    WorkInProgress::from_root(&current[current.root()], alternate)
                }
                None => {
                    log::debug!("update requested before the first commit; ignored");
                    return;
                }
            },
        };
        if restarted.is_some() {
            self.work = restarted;
        }
    }

    fn commit(&mut self) -> Result<CommitSummary, RenderError> {
        let Some(mut work) = self.work.take() else {
            return Ok(CommitSummary::default());
        };
        let plan = match plan_commit(&work.tree, self.current.as_ref(), &work.deletions) {
            Ok(plan) => plan,
            Err(error) => {
                log::debug!("commit aborted: {error}");
                return Err(error);
            }
        };
        let summary = apply_commit(&mut self.adapter, &mut work.tree, plan);
        log::debug!(
            "committed {} fibers: {} placements, {} updates, {} deletions",
            work.tree.len(),
            summary.placements,
            summary.updates,
            summary.deletions
        );
        self.current = Some(work.tree);
        Ok(summary)
    }
}

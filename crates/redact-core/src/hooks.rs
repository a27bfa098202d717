//! Position-ordered local state for function components.
//!
//! While a component runs, a [`HookFrame`] sits on a thread-local stack. Every
//! [`use_state`] call takes the next slot: it reads the record at the same
//! position in the previous render, folds that record's queued actions in
//! enqueue order and stores a fresh record for this render. Previous queues
//! are only read, never drained, so a restarted pass folds the same actions
//! again.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::runtime::RuntimeHandle;

/// One persisted state slot.
pub struct HookCell {
    state: Box<dyn Any>,
    queue: RefCell<Vec<Rc<dyn Any>>>,
}

impl HookCell {
    fn new<T: 'static>(state: T) -> Self {
        Self {
            state: Box::new(state),
            queue: RefCell::new(Vec::new()),
        }
    }

    fn state<T: 'static>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    fn enqueue(&self, action: Rc<dyn Any>) {
        self.queue.borrow_mut().push(action);
    }

    fn queued(&self) -> Vec<Rc<dyn Any>> {
        self.queue.borrow().clone()
    }

    /// Number of actions waiting for the next render.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl fmt::Debug for HookCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookCell")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// A queued state change: a replacement value or a pure `state -> state` step.
pub enum Action<T> {
    Replace(T),
    Update(Rc<dyn Fn(&T) -> T>),
}

impl<T: Clone> Action<T> {
    fn apply(&self, state: T) -> T {
        match self {
            Action::Replace(value) => value.clone(),
            Action::Update(step) => step(&state),
        }
    }
}

impl<T: Clone> Clone for Action<T> {
    fn clone(&self) -> Self {
        match self {
            Action::Replace(value) => Action::Replace(value.clone()),
            Action::Update(step) => Action::Update(Rc::clone(step)),
        }
    }
}

/// A component declared its hooks in a different number or order than in
/// its previous render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// Declaration at `index` has no counterpart among `previous` records.
    ExtraHook { index: usize, previous: usize },
    /// The component declared `declared` hooks where it previously had `previous`.
    MissingHooks { declared: usize, previous: usize },
    /// The record at `index` holds a different state type.
    TypeMismatch { index: usize, expected: &'static str },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::ExtraHook { index, previous } => write!(
                f,
                "hook {index} declared but the previous render only had {previous}"
            ),
            HookError::MissingHooks { declared, previous } => write!(
                f,
                "component declared {declared} hooks but the previous render had {previous}"
            ),
            HookError::TypeMismatch { index, expected } => {
                write!(f, "hook {index} does not hold a {expected}")
            }
        }
    }
}

impl std::error::Error for HookError {}

struct HookFrame {
    previous: Option<Vec<Rc<HookCell>>>,
    hooks: Vec<Rc<HookCell>>,
    runtime: RuntimeHandle,
    error: Option<HookError>,
}

impl HookFrame {
    fn fail(&mut self, error: HookError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

thread_local! {
    static HOOK_FRAMES: RefCell<Vec<HookFrame>> = const { RefCell::new(Vec::new()) };
}

/// Keeps the frame stack balanced when a component panics.
struct FrameGuard {
    armed: bool,
}

impl FrameGuard {
    fn push(frame: HookFrame) -> Self {
        HOOK_FRAMES.with(|frames| frames.borrow_mut().push(frame));
        Self { armed: true }
    }

    fn finish(mut self) -> HookFrame {
        self.armed = false;
        HOOK_FRAMES
            .with(|frames| frames.borrow_mut().pop())
            .expect("hook frame stack is balanced")
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            HOOK_FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

/// Runs `render` with a hook frame installed.
///
/// `previous` is `None` on a fiber's first render and the alternate's records
/// otherwise. Returns the render output and the records declared during it.
pub(crate) fn render_with_hooks<R>(
    runtime: RuntimeHandle,
    previous: Option<Vec<Rc<HookCell>>>,
    render: impl FnOnce() -> R,
) -> Result<(R, Vec<Rc<HookCell>>), HookError> {
    let guard = FrameGuard::push(HookFrame {
        previous,
        hooks: Vec::new(),
        runtime,
        error: None,
    });
    let output = render();
    let frame = guard.finish();
    if let Some(error) = frame.error {
        return Err(error);
    }
    if let Some(previous) = &frame.previous {
        if frame.hooks.len() < previous.len() {
            return Err(HookError::MissingHooks {
                declared: frame.hooks.len(),
                previous: previous.len(),
            });
        }
    }
    Ok((output, frame.hooks))
}

/// Declares a state slot in the running component.
///
/// Returns the settled state for this render and a setter bound to this
/// render's record.
///
/// # Panics
///
/// Panics when called outside of a component render.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, Setter<T>) {
    let (index, previous, runtime) = HOOK_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let frame = frames
            .last_mut()
            .expect("use_state called outside of a component render");
        let index = frame.hooks.len();
        let lookup = frame
            .previous
            .as_ref()
            .map(|records| (records.get(index).cloned(), records.len()));
        let previous = match lookup {
            None => None,
            Some((Some(record), _)) => Some(record),
            Some((None, count)) => {
                frame.fail(HookError::ExtraHook {
                    index,
                    previous: count,
                });
                None
            }
        };
        (index, previous, frame.runtime.clone())
    });

    let mut mismatch = None;
    let state = match previous {
        None => initial,
        Some(record) => match record.state::<T>() {
            None => {
                mismatch = Some(HookError::TypeMismatch {
                    index,
                    expected: type_name::<T>(),
                });
                initial
            }
            Some(settled) => {
                let mut state = settled.clone();
                for action in record.queued() {
                    match action.downcast_ref::<Action<T>>() {
                        Some(action) => state = action.apply(state),
                        None => {
                            mismatch = Some(HookError::TypeMismatch {
                                index,
                                expected: type_name::<T>(),
                            });
                        }
                    }
                }
                state
            }
        },
    };

    let cell = Rc::new(HookCell::new(state.clone()));
    let setter = Setter {
        cell: Rc::downgrade(&cell),
        runtime,
        _marker: PhantomData,
    };
    HOOK_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        if let Some(frame) = frames.last_mut() {
            if let Some(error) = mismatch {
                frame.fail(error);
            }
            frame.hooks.push(cell);
        }
    });
    (state, setter)
}

/// Queues changes for one state slot and asks for a new render.
pub struct Setter<T> {
    cell: Weak<HookCell>,
    runtime: RuntimeHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
            runtime: self.runtime.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("live", &self.is_live())
            .finish()
    }
}

impl<T: Clone + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(value));
    }

    pub fn update(&self, step: impl Fn(&T) -> T + 'static) {
        self.dispatch(Action::Update(Rc::new(step)));
    }

    pub fn dispatch(&self, action: Action<T>) {
        match self.cell.upgrade() {
            Some(cell) => {
                cell.enqueue(Rc::new(action));
                if !self.runtime.request_update() {
                    log::warn!("state update queued after its render root was dropped");
                }
            }
            None => log::warn!(
                "dropping {} update for a discarded hook record",
                type_name::<T>()
            ),
        }
    }
}

impl<T> Setter<T> {
    /// Whether the record this setter writes to is still reachable from a
    /// live render.
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

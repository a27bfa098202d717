#![doc = r"Core of the Redact incremental renderer: element descriptors, the fiber tree, the reconciler, local state hooks, the cooperative scheduler and the commit engine."]

pub mod collections;
pub mod commit;
pub mod element;
pub mod fiber;
pub mod hooks;
pub mod platform;
mod reconcile;
pub mod root;
pub mod runtime;
pub mod surface;

pub use commit::CommitSummary;
pub use element::{
    Attributes, Component, Element, ElementError, ElementKind, Event, EventHandler, IntoChildren,
    Props, StyleMap, Value, EVENT_PREFIX, STYLE, TEXT_VALUE,
};
pub use fiber::{Effect, Fiber, FiberId, FiberTree, ROOT_TAG};
pub use hooks::{use_state, Action, HookCell, HookError, Setter};
pub use platform::{Clock, Deadline, IdleScheduler, Unbounded};
pub use root::{Root, RootOptions, WorkInProgress, WorkStatus};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use surface::{
    AttributeDelta, AttributeOp, MemoryResource, MemorySurface, ResourceAdapter, ResourceId,
    ResourceKind, SurfaceCall,
};

#[cfg(test)]
pub use runtime::TestScheduler;

use std::fmt;

/// Why a render pass was discarded before reaching the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A component declared its hooks inconsistently with its previous render.
    Hook(HookError),
    /// A fiber has no resource-owning ancestor to attach to or detach from.
    DetachedFiber { kind: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Hook(err) => write!(f, "hook error: {err}"),
            RenderError::DetachedFiber { kind } => {
                write!(f, "{kind} has no resource-owning ancestor")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Hook(err) => Some(err),
            RenderError::DetachedFiber { .. } => None,
        }
    }
}

impl From<HookError> for RenderError {
    fn from(err: HookError) -> Self {
        RenderError::Hook(err)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

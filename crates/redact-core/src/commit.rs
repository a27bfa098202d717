//! Commit engine.
//!
//! A finished pass is committed in two steps. [`plan_commit`] walks the
//! deletion list and the finished tree and resolves every mutation, including
//! the resource parent of each placement; a tree that cannot be fully resolved
//! is rejected before the adapter sees a single call. [`apply_commit`] then
//! replays the plan against the adapter without stopping.

use std::rc::Rc;

use crate::element::Props;
use crate::fiber::{Effect, FiberId, FiberTree};
use crate::surface::{AttributeDelta, ResourceAdapter, ResourceKind};
use crate::RenderError;

/// Where a placed resource gets attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParentRef<H> {
    /// A resource that exists before this commit.
    Existing(H),
    /// An ancestor placed earlier in the same commit.
    Placed(FiberId),
}

#[derive(Debug, Clone)]
pub(crate) enum Mutation<H> {
    Remove {
        fiber: FiberId,
        parent: H,
        child: H,
    },
    Place {
        fiber: FiberId,
        parent: ParentRef<H>,
    },
    Update {
        fiber: FiberId,
        handle: H,
        previous: Rc<Props>,
    },
}

impl<H> Mutation<H> {
    pub(crate) fn effect(&self) -> Effect {
        match self {
            Mutation::Remove { .. } => Effect::Deletion,
            Mutation::Place { .. } => Effect::Placement,
            Mutation::Update { .. } => Effect::Update,
        }
    }

    pub(crate) fn fiber(&self) -> FiberId {
        match self {
            Mutation::Remove { fiber, .. }
            | Mutation::Place { fiber, .. }
            | Mutation::Update { fiber, .. } => *fiber,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CommitPlan<H> {
    mutations: Vec<Mutation<H>>,
    deleted_fibers: usize,
    unchanged: usize,
}

impl<H> CommitPlan<H> {
    #[cfg(test)]
    pub(crate) fn mutations(&self) -> &[Mutation<H>] {
        &self.mutations
    }
}

/// Counts reported once a pass has been committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Host and text resources created and attached.
    pub placements: usize,
    /// Resources that received a non-empty attribute delta.
    pub updates: usize,
    /// Reused resources whose attributes did not change.
    pub unchanged: usize,
    /// Previous fibers scheduled for deletion.
    pub deletions: usize,
    /// Resources detached from the surface for those deletions.
    pub removed_resources: usize,
}

impl CommitSummary {
    pub fn is_noop(&self) -> bool {
        self.placements == 0 && self.updates == 0 && self.removed_resources == 0
    }
}

pub(crate) fn plan_commit<H: Clone>(
    wip: &FiberTree<H>,
    current: Option<&FiberTree<H>>,
    deletions: &[FiberId],
) -> Result<CommitPlan<H>, RenderError> {
    let mut mutations = Vec::new();

    if let Some(current) = current {
        for &deleted in deletions {
            plan_removal(current, deleted, &mut mutations)?;
        }
    }

    let mut unchanged = 0;
    for id in wip.preorder(wip.root()) {
        let fiber = &wip[id];
        if ResourceKind::of(&fiber.kind).is_none() {
            continue;
        }
        match fiber.effect {
            Effect::Placement => mutations.push(Mutation::Place {
                fiber: id,
                parent: placement_parent(wip, id)?,
            }),
            Effect::Update => {
                let (Some(handle), Some(alternate)) = (fiber.resource.clone(), fiber.alternate)
                else {
                    return Err(detached(fiber.kind.label()));
                };
                let previous = match current.and_then(|tree| tree.get(alternate)) {
                    Some(previous) => Rc::clone(&previous.props),
                    None => return Err(detached(fiber.kind.label())),
                };
                if AttributeDelta::between(previous.attributes(), fiber.props.attributes())
                    .is_empty()
                {
                    unchanged += 1;
                } else {
                    mutations.push(Mutation::Update {
                        fiber: id,
                        handle,
                        previous,
                    });
                }
            }
            Effect::None | Effect::Deletion => {}
        }
    }

    Ok(CommitPlan {
        mutations,
        deleted_fibers: deletions.len(),
        unchanged,
    })
}

/// Removes the resource of `id`, or of its nearest resource-owning
/// descendants when `id` has none.
fn plan_removal<H: Clone>(
    current: &FiberTree<H>,
    id: FiberId,
    mutations: &mut Vec<Mutation<H>>,
) -> Result<(), RenderError> {
    let fiber = &current[id];
    match &fiber.resource {
        Some(child) => {
            let Some((_, parent)) = current.nearest_resource_ancestor(id) else {
                return Err(detached(fiber.kind.label()));
            };
            mutations.push(Mutation::Remove {
                fiber: id,
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        None => {
            for &child in &fiber.children {
                plan_removal(current, child, mutations)?;
            }
        }
    }
    Ok(())
}

fn placement_parent<H: Clone>(wip: &FiberTree<H>, id: FiberId) -> Result<ParentRef<H>, RenderError> {
    let mut cursor = wip[id].parent;
    while let Some(ancestor) = cursor {
        let fiber = &wip[ancestor];
        if let Some(resource) = &fiber.resource {
            return Ok(ParentRef::Existing(resource.clone()));
        }
        if fiber.is_host() && fiber.effect == Effect::Placement {
            return Ok(ParentRef::Placed(ancestor));
        }
        cursor = fiber.parent;
    }
    Err(detached(wip[id].kind.label()))
}

fn detached(kind: &str) -> RenderError {
    RenderError::DetachedFiber {
        kind: kind.to_owned(),
    }
}

pub(crate) fn apply_commit<A: ResourceAdapter>(
    adapter: &mut A,
    wip: &mut FiberTree<A::Handle>,
    plan: CommitPlan<A::Handle>,
) -> CommitSummary {
    let mut summary = CommitSummary {
        deletions: plan.deleted_fibers,
        unchanged: plan.unchanged,
        ..CommitSummary::default()
    };

    for mutation in plan.mutations {
        log::trace!("commit {:?} of {:?}", mutation.effect(), mutation.fiber());
        match mutation {
            Mutation::Remove { parent, child, .. } => {
                adapter.remove_resource(&parent, &child);
                summary.removed_resources += 1;
            }
            Mutation::Place { fiber, parent } => {
                let parent = match parent {
                    ParentRef::Existing(handle) => handle,
                    ParentRef::Placed(ancestor) => {
                        wip[ancestor].resource.clone().unwrap_or_else(|| {
                            unreachable!("{ancestor:?} is placed before its descendant {fiber:?}")
                        })
                    }
                };
                let node = &wip[fiber];
                let kind = ResourceKind::of(&node.kind)
                    .unwrap_or_else(|| unreachable!("{fiber:?} owns no resource but was planned"));
                let handle = adapter.create_resource(kind, node.props.attributes());
                adapter.attach_resource(&parent, &handle);
                wip.fiber_mut(fiber).resource = Some(handle);
                summary.placements += 1;
            }
            Mutation::Update {
                fiber,
                handle,
                previous,
            } => {
                let delta =
                    AttributeDelta::between(previous.attributes(), wip[fiber].props.attributes());
                adapter.apply_attribute_delta(&handle, &delta);
                summary.updates += 1;
            }
        }
    }

    wip.clear_alternates();
    summary
}

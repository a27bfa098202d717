//! Arena-backed retained tree.
//!
//! Every render pass builds a fresh [`FiberTree`]. Fibers live in a flat
//! vector and refer to each other by [`FiberId`]: a parent index, an ordered
//! list of child indices and their position inside the parent's list, which
//! gives the same traversal as first-child/next-sibling links without any
//! link splicing. The `alternate` of a fiber is an index into the previous
//! committed tree; it is never an owning reference and is cleared once the
//! tree itself is committed.

use std::fmt::Write as _;
use std::ops::Index;
use std::rc::Rc;

use crate::element::{ElementKind, Props, TEXT_VALUE};
use crate::hooks::HookCell;

/// Tag of the synthetic fiber that owns the container handle.
pub const ROOT_TAG: &str = "#root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(usize);

impl FiberId {
    pub const ROOT: FiberId = FiberId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Mutation intent assigned during reconciliation and consumed at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

pub struct Fiber<H> {
    pub(crate) kind: ElementKind,
    pub(crate) props: Rc<Props>,
    pub(crate) resource: Option<H>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) children: Vec<FiberId>,
    pub(crate) index_in_parent: usize,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: Effect,
    pub(crate) hooks: Vec<Rc<HookCell>>,
}

impl<H> Fiber<H> {
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn resource(&self) -> Option<&H> {
        self.resource.as_ref()
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn children(&self) -> &[FiberId] {
        &self.children
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Whether this fiber owns (or will own, once placed) a surface resource.
    pub fn is_host(&self) -> bool {
        !self.kind.is_component()
    }
}

pub struct FiberTree<H> {
    fibers: Vec<Fiber<H>>,
}

impl<H> FiberTree<H> {
    /// Creates a tree holding only the root fiber, which owns `container`.
    pub(crate) fn with_root(props: Rc<Props>, container: H, alternate: Option<FiberId>) -> Self {
        let root = Fiber {
            kind: ElementKind::Host(Rc::from(ROOT_TAG)),
            props,
            resource: Some(container),
            parent: None,
            children: Vec::new(),
            index_in_parent: 0,
            alternate,
            effect: Effect::None,
            hooks: Vec::new(),
        };
        Self { fibers: vec![root] }
    }

    pub fn root(&self) -> FiberId {
        FiberId::ROOT
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        self.fibers.get(id.0)
    }

    pub(crate) fn fiber_mut(&mut self, id: FiberId) -> &mut Fiber<H> {
        &mut self.fibers[id.0]
    }

    /// Appends a new last child under `parent`.
    pub(crate) fn push_child(
        &mut self,
        parent: FiberId,
        kind: ElementKind,
        props: Rc<Props>,
        resource: Option<H>,
        alternate: Option<FiberId>,
        effect: Effect,
    ) -> FiberId {
        let id = FiberId(self.fibers.len());
        let index_in_parent = self.fibers[parent.0].children.len();
        self.fibers.push(Fiber {
            kind,
            props,
            resource,
            parent: Some(parent),
            children: Vec::new(),
            index_in_parent,
            alternate,
            effect,
            hooks: Vec::new(),
        });
        self.fibers[parent.0].children.push(id);
        id
    }

    pub fn next_sibling(&self, id: FiberId) -> Option<FiberId> {
        let fiber = &self[id];
        let parent = fiber.parent?;
        self[parent].children.get(fiber.index_in_parent + 1).copied()
    }

    /// Pre-order successor of `id`: first child, else the next sibling of the
    /// nearest ancestor-or-self that has one. `None` once the walk climbs past
    /// the root.
    pub fn next_unit(&self, id: FiberId) -> Option<FiberId> {
        if let Some(&first) = self[id].children.first() {
            return Some(first);
        }
        let mut cursor = Some(id);
        while let Some(fiber) = cursor {
            if let Some(sibling) = self.next_sibling(fiber) {
                return Some(sibling);
            }
            cursor = self[fiber].parent;
        }
        None
    }

    /// All fibers reachable from `from`, in pre-order.
    pub fn preorder(&self, from: FiberId) -> Vec<FiberId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        order
    }

    /// Nearest strict ancestor of `id` that owns a resource.
    pub fn nearest_resource_ancestor(&self, id: FiberId) -> Option<(FiberId, &H)> {
        let mut cursor = self[id].parent;
        while let Some(ancestor) = cursor {
            if let Some(resource) = self[ancestor].resource.as_ref() {
                return Some((ancestor, resource));
            }
            cursor = self[ancestor].parent;
        }
        None
    }

    pub(crate) fn clear_alternates(&mut self) {
        for fiber in &mut self.fibers {
            fiber.alternate = None;
        }
    }

    /// Indented `kind [effect]` listing of the tree, for logs and test failures.
    pub fn dump(&self) -> String {
        let mut output = String::new();
        self.dump_fiber(&mut output, self.root(), 0);
        output
    }

    fn dump_fiber(&self, output: &mut String, id: FiberId, depth: usize) {
        let fiber = &self[id];
        let indent = "  ".repeat(depth);
        let _ = write!(output, "{indent}{} [{:?}]", fiber.kind.label(), fiber.effect);
        if let Some(text) = fiber.props.get_str(TEXT_VALUE) {
            let _ = write!(output, " {text:?}");
        }
        output.push('\n');
        for &child in &fiber.children {
            self.dump_fiber(output, child, depth + 1);
        }
    }
}

impl<H> Index<FiberId> for FiberTree<H> {
    type Output = Fiber<H>;

    fn index(&self, id: FiberId) -> &Self::Output {
        &self.fibers[id.0]
    }
}

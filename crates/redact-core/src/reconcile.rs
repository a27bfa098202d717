use crate::element::Element;
use crate::fiber::{Effect, FiberId, FiberTree};

/// Pairs the previous children of `parent` (through its alternate in
/// `current`) with `elements`, position by position.
///
/// Equal kinds at the same position become [`Effect::Update`] fibers that reuse
/// the previous resource and link back to the previous fiber. A new element
/// without a matching previous child becomes an [`Effect::Placement`] fiber.
/// A previous child without a matching element is pushed onto `deletions`.
pub(crate) fn reconcile_children<H: Clone>(
    wip: &mut FiberTree<H>,
    current: Option<&FiberTree<H>>,
    parent: FiberId,
    elements: &[Element],
    deletions: &mut Vec<FiberId>,
) {
    let previous: &[FiberId] = match (wip[parent].alternate, current) {
        (Some(alternate), Some(tree)) => tree[alternate].children(),
        _ => &[],
    };

    for index in 0..previous.len().max(elements.len()) {
        let old = current.and_then(|tree| previous.get(index).map(|&id| (id, &tree[id])));
        let element = elements.get(index);

        match (old, element) {
            (Some((old_id, old)), Some(element)) if old.kind == *element.kind() => {
                wip.push_child(
                    parent,
                    element.kind().clone(),
                    element.shared_props(),
                    old.resource.clone(),
                    Some(old_id),
                    Effect::Update,
                );
            }
            (old, element) => {
                if let Some(element) = element {
                    wip.push_child(
                        parent,
                        element.kind().clone(),
                        element.shared_props(),
                        None,
                        None,
                        Effect::Placement,
                    );
                }
                if let Some((old_id, _)) = old {
                    deletions.push(old_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::element::{Component, ElementKind, Props};

    fn tree_with(children: &[Element]) -> FiberTree<u32> {
        let mut tree = FiberTree::with_root(Rc::new(Props::default()), 0, None);
        let mut deletions = Vec::new();
        let root = tree.root();
        reconcile_children(&mut tree, None, root, children, &mut deletions);
        for (offset, id) in tree.preorder(root).into_iter().skip(1).enumerate() {
            tree.fiber_mut(id).resource = Some(offset as u32 + 1);
        }
        tree.clear_alternates();
        tree
    }

    fn next_pass(
        current: &FiberTree<u32>,
        children: &[Element],
    ) -> (FiberTree<u32>, Vec<FiberId>) {
        let mut wip = FiberTree::with_root(Rc::new(Props::default()), 0, Some(current.root()));
        let mut deletions = Vec::new();
        let root = wip.root();
        reconcile_children(&mut wip, Some(current), root, children, &mut deletions);
        (wip, deletions)
    }

    fn effects(tree: &FiberTree<u32>) -> Vec<Effect> {
        tree[tree.root()]
            .children()
            .iter()
            .map(|&id| tree[id].effect())
            .collect()
    }

    #[test]
    fn first_render_places_everything() {
        let tree = {
            let mut tree = FiberTree::with_root(Rc::new(Props::default()), 0u32, None);
            let mut deletions = Vec::new();
            let root = tree.root();
            reconcile_children(
                &mut tree,
                None,
                root,
                &[Element::host("a"), Element::text("b")],
                &mut deletions,
            );
            assert!(deletions.is_empty());
            tree
        };
        assert_eq!(effects(&tree), vec![Effect::Placement, Effect::Placement]);
        assert!(tree[FiberId::ROOT].children().iter().all(|&id| tree[id].alternate().is_none()));
    }

    #[test]
    fn growth_places_the_tail_and_keeps_the_prefix() {
        let current = tree_with(&[Element::host("li"), Element::host("li")]);
        let (wip, deletions) = next_pass(
            &current,
            &[Element::host("li"), Element::host("li"), Element::host("li")],
        );

        assert!(deletions.is_empty());
        assert_eq!(
            effects(&wip),
            vec![Effect::Update, Effect::Update, Effect::Placement]
        );
        let children = wip[wip.root()].children();
        assert_eq!(wip[children[0]].resource(), Some(&1));
        assert_eq!(wip[children[1]].resource(), Some(&2));
        assert_eq!(wip[children[2]].resource(), None);
    }

    #[test]
    fn shrink_deletes_the_tail() {
        let current = tree_with(&[Element::host("li"), Element::host("li"), Element::host("li")]);
        let (wip, deletions) = next_pass(&current, &[Element::host("li")]);

        assert_eq!(effects(&wip), vec![Effect::Update]);
        let old_children = current[current.root()].children();
        assert_eq!(deletions, old_children[1..].to_vec());
    }

    #[test]
    fn kind_change_replaces_instead_of_updating() {
        let current = tree_with(&[Element::host("p"), Element::host("span")]);
        let (wip, deletions) = next_pass(&current, &[Element::host("p"), Element::host("b")]);

        assert_eq!(effects(&wip), vec![Effect::Update, Effect::Placement]);
        assert_eq!(deletions.len(), 1);
        assert_eq!(
            current[deletions[0]].kind(),
            &ElementKind::Host(Rc::from("span"))
        );
        let replacement = wip[wip.root()].children()[1];
        assert_eq!(wip[replacement].alternate(), None);
    }

    #[test]
    fn empty_sequence_deletes_every_previous_child() {
        let widget = Component::new("Widget", |_: &Props| Element::host("div"));
        let current = tree_with(&[Element::component(&widget), Element::text("x")]);
        let (wip, deletions) = next_pass(&current, &[]);

        assert!(wip[wip.root()].children().is_empty());
        assert_eq!(deletions.len(), 2);
    }
}

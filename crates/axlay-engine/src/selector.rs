//! Selector evaluation against a tree.

use axlay_protocol::{Selector, SelectorKind};
use axlay_tree::{NodeRef, Tree, UiNode};
use tracing::trace;

/// Map a signed instance index onto a match set of `len` nodes.
///
/// Non-negative indices select that position; negative ones count back from the end.
/// Anything out of range, and every index into an empty set, yields `None`.
pub fn resolve_instance(index: i32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if index >= 0 {
        let idx = index as usize;
        return (idx < len).then_some(idx);
    }
    let back = index.unsigned_abs() as usize;
    (back <= len).then(|| len - back)
}

/// All nodes under `root` matching `selector`'s predicate, in document order.
///
/// Text and resource-id selectors use the provider's direct lookups; description and
/// class-name selectors walk the whole subtree and compare exactly.
pub fn find_all(tree: &Tree, root: &UiNode, selector: &Selector) -> Vec<NodeRef> {
    let value = selector.value.as_str();
    match selector.kind {
        SelectorKind::Text => tree.find_by_text(root, value),
        SelectorKind::ResourceId => tree.find_by_resource_id(root, value),
        SelectorKind::Description => {
            tree.collect(root, &|n: &UiNode| n.content_description() == Some(value))
        }
        SelectorKind::ClassName => tree.collect(root, &|n: &UiNode| n.class_name() == Some(value)),
    }
}

/// The node `selector` picks under `root`, if any.
///
/// Only the returned node stays acquired; the rest of the match set is released.
pub fn find(tree: &Tree, root: &UiNode, selector: &Selector) -> Option<NodeRef> {
    let mut matches = find_all(tree, root, selector);
    let count = matches.len();
    let Some(idx) = resolve_instance(selector.instance, count) else {
        trace!(%selector, count, "selector index out of range");
        return None;
    };
    trace!(%selector, idx, count, "selector matched");
    Some(matches.swap_remove(idx))
}

/// True when `selector` picks a node under `root`.
pub fn exists(tree: &Tree, root: &UiNode, selector: &Selector) -> bool {
    find(tree, root, selector).is_some()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axlay_tree::{NodeSpec, StaticTree};

    use super::*;

    #[test]
    fn instance_resolution() {
        assert_eq!(resolve_instance(0, 0), None);
        assert_eq!(resolve_instance(-1, 0), None);
        assert_eq!(resolve_instance(0, 3), Some(0));
        assert_eq!(resolve_instance(2, 3), Some(2));
        assert_eq!(resolve_instance(3, 3), None);
        assert_eq!(resolve_instance(-1, 3), Some(2));
        assert_eq!(resolve_instance(-3, 3), Some(0));
        assert_eq!(resolve_instance(-4, 3), None);
        assert_eq!(resolve_instance(i32::MIN, 3), None);
    }

    fn screen() -> NodeSpec {
        NodeSpec::new("android.widget.FrameLayout").children([
            NodeSpec::new("android.widget.Button")
                .text("Login")
                .description("primary")
                .bounds(0, 0, 100, 40),
            NodeSpec::new("android.widget.LinearLayout").children([
                NodeSpec::new("android.widget.Button")
                    .text("Login")
                    .bounds(0, 100, 100, 140),
                NodeSpec::new("android.widget.ImageView")
                    .description("primary")
                    .bounds(0, 200, 50, 250),
            ]),
        ])
    }

    fn with_tree<F: FnOnce(&Tree, &UiNode)>(f: F) -> Arc<StaticTree> {
        let provider = Arc::new(StaticTree::new(&screen()));
        let tree = Tree::new(provider.clone());
        let root = tree.root().unwrap();
        f(&tree, &root);
        drop(root);
        provider
    }

    #[test]
    fn negative_instance_picks_last_text_match() {
        let provider = with_tree(|tree, root| {
            let sel = Selector::parse(r#".text("Login").instance(-1)"#).unwrap();
            let node = find(tree, root, &sel).unwrap();
            assert_eq!(node.bounds().top, 100);
        });
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn description_and_class_use_exact_traversal() {
        let provider = with_tree(|tree, root| {
            let hits = find_all(tree, root, &Selector::description("primary"));
            assert_eq!(hits.len(), 2);
            assert!(find_all(tree, root, &Selector::description("prim")).is_empty());

            let img = find(tree, root, &Selector::class_name("android.widget.ImageView")).unwrap();
            assert_eq!(img.bounds().top, 200);
            let second = Selector::class_name("android.widget.Button").instance(1);
            assert_eq!(find(tree, root, &second).unwrap().bounds().top, 100);
        });
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn out_of_range_is_no_match() {
        let provider = with_tree(|tree, root| {
            assert!(!exists(tree, root, &Selector::text("Login").instance(2)));
            assert!(!exists(tree, root, &Selector::text("Login").instance(-3)));
            assert!(!exists(tree, root, &Selector::resource_id("missing")));
        });
        assert_eq!(provider.outstanding(), 0);
    }
}

use std::{path::Path, sync::Arc};

use axlay_engine::find;
use axlay_protocol::Selector;
use axlay_tree::{StaticTree, Tree, UiNode};

use crate::error::CliError;

/// Evaluate each selector against the dump at `tree_path`, one output line each.
pub fn run(tree_path: &Path, selectors: &[String]) -> Result<(), CliError> {
    let tree = Tree::new(Arc::new(StaticTree::from_path(tree_path)?));
    let Some(root) = tree.root() else {
        println!("empty tree");
        return Ok(());
    };
    for raw in selectors {
        println!("{raw}\t{}", describe(&tree, &root, raw));
    }
    Ok(())
}

/// One-line outcome for a single selector.
fn describe(tree: &Tree, root: &UiNode, raw: &str) -> String {
    let sel = match Selector::parse(raw) {
        Ok(sel) => sel,
        Err(e) => return format!("error: {e}"),
    };
    match find(tree, root, &sel) {
        Some(node) => format!(
            "{}\t{:?}\t{}",
            node.class_name().unwrap_or("?"),
            node.text().unwrap_or_default(),
            node.bounds()
        ),
        None => "no match".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use axlay_tree::NodeSpec;

    use super::*;

    #[test]
    fn describes_matches_misses_and_errors() {
        let tree = Tree::new(Arc::new(StaticTree::new(
            &NodeSpec::new("Root").children([
                NodeSpec::new("Button").text("Login").bounds(0, 0, 10, 10),
                NodeSpec::new("Button").text("Login").bounds(0, 20, 10, 30),
            ]),
        )));
        let root = tree.root().unwrap();
        assert_eq!(
            describe(&tree, &root, r#".text("Login").instance(-1)"#),
            "Button\t\"Login\"\t[0,20][10,30]"
        );
        assert_eq!(describe(&tree, &root, r#".text("Nope")"#), "no match");
        assert!(describe(&tree, &root, ".nope(\"x\")").starts_with("error: "));
    }
}

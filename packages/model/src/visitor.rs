use crate::node::Node;
use crate::tree::Tree;

/// Visitor pattern for traversing the component tree immutably
///
/// The default implementation walks the whole subtree depth-first.
/// Override `visit_node` to act on nodes and call [`walk_node`] to keep
/// descending.
pub trait Visitor: Sized {
    fn visit_node(&mut self, tree: &Tree, node: &Node, depth: usize) {
        walk_node(self, tree, node, depth);
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, tree: &Tree, node: &Node, depth: usize) {
    for child in node.children() {
        if let Some(child) = tree.get(child) {
            visitor.visit_node(tree, child, depth + 1);
        }
    }
}

/// Visit every root of the tree in order
pub fn walk_tree<V: Visitor>(visitor: &mut V, tree: &Tree) {
    for root in tree.roots() {
        if let Some(node) = tree.get(root) {
            visitor.visit_node(tree, node, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeDef;

    struct DepthCollector(Vec<(String, usize)>);

    impl Visitor for DepthCollector {
        fn visit_node(&mut self, tree: &Tree, node: &Node, depth: usize) {
            self.0.push((node.tag_name.clone(), depth));
            walk_node(self, tree, node, depth);
        }
    }

    #[test]
    fn test_walk_reports_depth() {
        let mut tree = Tree::default();
        tree.create(
            &NodeDef::new("body").with_child(NodeDef::new("div").with_child(NodeDef::new("span"))),
        );

        let mut collector = DepthCollector(Vec::new());
        walk_tree(&mut collector, &tree);

        assert_eq!(
            collector.0,
            vec![
                ("body".to_string(), 0),
                ("div".to_string(), 1),
                ("span".to_string(), 2)
            ]
        );
    }
}

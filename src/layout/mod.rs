mod text;
mod tidy;
pub(crate) mod types;
pub use text::{FixedWidthSizer, FontSizer, LabelSizer};
pub use types::*;

use crate::config::LayoutConfig;
use crate::error::TreeError;
use crate::ir::CanonicalNode;
use tidy::Separation;

pub fn layout(root: &CanonicalNode, bounds: Bounds) -> Result<TreeLayout<'_>, TreeError> {
    layout_with_config(root, bounds, &LayoutConfig::default())
}

/// Positions every node of `root` inside `bounds`.
///
/// Depth maps linearly onto `[0, bounds.height]` and horizontal positions are
/// scaled into `[0, bounds.width]` with half a separation unit of padding on
/// the outermost nodes, so a lone root sits at the horizontal centre.
pub fn layout_with_config<'a>(
    root: &'a CanonicalNode,
    bounds: Bounds,
    config: &LayoutConfig,
) -> Result<TreeLayout<'a>, TreeError> {
    if !bounds.is_drawable() {
        return Err(TreeError::InvalidBounds {
            width: bounds.width,
            height: bounds.height,
        });
    }

    let separation = Separation {
        siblings: config.sibling_separation.max(f32::EPSILON),
        cousins: config.subtree_separation.max(f32::EPSILON),
    };
    let mut tidy_nodes = tidy::flatten(root);
    let xs = tidy::place(&mut tidy_nodes, separation);

    let mut left = 0;
    let mut right = 0;
    for (idx, x) in xs.iter().enumerate() {
        if *x < xs[left] {
            left = idx;
        }
        if *x > xs[right] {
            right = idx;
        }
    }
    let max_depth = tidy_nodes.iter().map(|node| node.depth).max().unwrap_or(0);

    let pad = separation.between(tidy_nodes[left].parent, tidy_nodes[right].parent) / 2.0;
    let shift = pad - xs[left];
    let span = xs[right] + pad + shift;
    let depth_span = max_depth.max(1) as f32;

    let nodes: Vec<PositionedNode<'a>> = tidy_nodes
        .into_iter()
        .zip(&xs)
        .map(|(node, x)| PositionedNode {
            node: node.node,
            x: (x + shift) / span * bounds.width,
            y: node.depth as f32 / depth_span * bounds.height,
            depth: node.depth,
            parent: node.parent,
            children: node.children,
        })
        .collect();

    let edges = nodes
        .iter()
        .enumerate()
        .filter_map(|(child, node)| {
            let parent = node.parent?;
            Some(EdgeLayout {
                parent,
                child,
                source: (nodes[parent].x, nodes[parent].y),
                target: (node.x, node.y),
            })
        })
        .collect();

    Ok(TreeLayout {
        bounds,
        nodes,
        edges,
        max_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DisplayName, RawNode};
    use crate::normalize::normalize;
    use proptest::prelude::*;
    use serde_json::json;

    fn branch(name: &str, children: Vec<CanonicalNode>) -> CanonicalNode {
        CanonicalNode {
            display_name: DisplayName::Named(name.to_string()),
            children,
        }
    }

    #[test]
    fn app_with_two_libs_lays_out_three_nodes() {
        let raw = RawNode::from_value(&json!({
            "name": "app",
            "deps": [{"name": "lib-a", "deps": []}, {"ref": "lib-b", "deps": []}]
        }));
        let canonical = normalize(Some(&raw)).unwrap().unwrap();
        let result = layout(&canonical, Bounds::new(760.0, 460.0)).unwrap();
        assert_eq!(result.nodes.len(), 3);
        assert_eq!(result.edges.len(), 2);

        let root = result.root();
        assert_eq!(root.node.label(), "app");
        assert_eq!((root.x, root.y), (380.0, 0.0));
        assert_eq!(result.nodes[1].y, 460.0);
        assert!(result.nodes[1].x < root.x && root.x < result.nodes[2].x);
        assert_eq!(result.edges[0].source, (root.x, root.y));
        assert_eq!(result.edges[1].target, (result.nodes[2].x, result.nodes[2].y));
    }

    #[test]
    fn single_node_is_centred() {
        let leaf = CanonicalNode::leaf("solo");
        let result = layout(&leaf, Bounds::new(600.0, 400.0)).unwrap();
        assert_eq!((result.root().x, result.root().y), (300.0, 0.0));
        assert!(result.edges.is_empty());
        assert_eq!(result.max_depth, 0);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let leaf = CanonicalNode::leaf("solo");
        assert!(matches!(
            layout(&leaf, Bounds::new(0.0, 400.0)),
            Err(TreeError::InvalidBounds { .. })
        ));
        assert!(layout(&leaf, Bounds::new(10.0, f32::NAN)).is_err());
    }

    #[test]
    fn layout_is_deterministic() {
        let tree = branch(
            "r",
            vec![
                branch("a", vec![CanonicalNode::leaf("a1"), CanonicalNode::leaf("a2")]),
                CanonicalNode::leaf("b"),
                branch("c", vec![branch("c1", vec![CanonicalNode::leaf("c11")])]),
            ],
        );
        let bounds = Bounds::new(640.0, 300.0);
        let first = layout(&tree, bounds).unwrap();
        let second = layout(&tree, bounds).unwrap();
        assert_eq!(first.coordinates(), second.coordinates());
        assert_eq!(first.edges, second.edges);
    }

    #[test]
    fn depth_maps_monotonically_to_height() {
        let tree = branch("r", vec![branch("a", vec![branch("b", vec![CanonicalNode::leaf("c")])])]);
        let result = layout(&tree, Bounds::new(100.0, 300.0)).unwrap();
        let ys: Vec<f32> = result.nodes.iter().map(|n| n.y).collect();
        assert_eq!(ys, vec![0.0, 100.0, 200.0, 300.0]);
    }

    fn canonical_tree() -> impl Strategy<Value = CanonicalNode> {
        let leaf = "[a-z]{1,4}".prop_map(|name| CanonicalNode::leaf(&name));
        leaf.prop_recursive(5, 80, 6, |inner| {
            ("[a-z]{1,4}", prop::collection::vec(inner, 0..6))
                .prop_map(|(name, children)| branch(&name, children))
        })
    }

    proptest! {
        #[test]
        fn nodes_stay_inside_bounds(
            tree in canonical_tree(),
            width in 1.0f32..2000.0,
            height in 1.0f32..2000.0,
        ) {
            let result = layout(&tree, Bounds::new(width, height)).unwrap();
            for node in &result.nodes {
                prop_assert!(node.x >= 0.0 && node.x <= width, "x={} width={}", node.x, width);
                prop_assert!(node.y >= 0.0 && node.y <= height, "y={} height={}", node.y, height);
            }
        }

        #[test]
        fn edge_count_is_node_count_minus_one(tree in canonical_tree()) {
            let result = layout(&tree, Bounds::new(800.0, 600.0)).unwrap();
            prop_assert_eq!(result.nodes.len(), tree.node_count());
            prop_assert_eq!(result.edges.len(), tree.node_count() - 1);
        }

        #[test]
        fn same_depth_nodes_never_overlap(tree in canonical_tree()) {
            let result = layout(&tree, Bounds::new(4000.0, 600.0)).unwrap();
            for node in &result.nodes {
                let xs: Vec<f32> = node.children.iter().map(|&c| result.nodes[c].x).collect();
                for pair in xs.windows(2) {
                    prop_assert!(pair[1] > pair[0], "siblings out of order: {:?}", xs);
                }
            }
            for depth in 0..=result.max_depth {
                let mut row: Vec<f32> = result
                    .nodes
                    .iter()
                    .filter(|n| n.depth == depth)
                    .map(|n| n.x)
                    .collect();
                row.sort_by(f32::total_cmp);
                for pair in row.windows(2) {
                    prop_assert!(pair[1] > pair[0], "depth {} collides: {:?}", depth, row);
                }
            }
        }
    }
}

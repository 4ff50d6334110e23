//! Tidy tree placement in separation units.
//!
//! Subtrees are built bottom-up. Each subtree keeps its left and right contour
//! (extreme offsets per depth, relative to the subtree root); a new sibling is
//! pushed right until it clears the accumulated contour of its left siblings at
//! every shared depth. Parents are centred over their first and last child.

use crate::ir::CanonicalNode;

#[derive(Debug, Clone, Copy)]
pub(super) struct Separation {
    pub siblings: f32,
    pub cousins: f32,
}

impl Separation {
    pub fn between(&self, a: Option<usize>, b: Option<usize>) -> f32 {
        if a == b { self.siblings } else { self.cousins }
    }
}

#[derive(Debug)]
pub(super) struct TidyNode<'a> {
    pub node: &'a CanonicalNode,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    offset: f32,
}

/// Flattens the tree in pre-order without recursion.
pub(super) fn flatten(root: &CanonicalNode) -> Vec<TidyNode<'_>> {
    let mut nodes: Vec<TidyNode<'_>> = Vec::with_capacity(root.node_count());
    let mut stack: Vec<(&CanonicalNode, Option<usize>, usize)> = vec![(root, None, 0)];
    while let Some((node, parent, depth)) = stack.pop() {
        let idx = nodes.len();
        if let Some(parent) = parent {
            nodes[parent].children.push(idx);
        }
        nodes.push(TidyNode {
            node,
            depth,
            parent,
            children: Vec::with_capacity(node.children.len()),
            offset: 0.0,
        });
        for child in node.children.iter().rev() {
            stack.push((child, Some(idx), depth + 1));
        }
    }
    nodes
}

/// Horizontal position of every node with the root at 0.
pub(super) fn place(nodes: &mut [TidyNode<'_>], separation: Separation) -> Vec<f32> {
    let mut contours: Vec<Vec<(f32, f32)>> = vec![Vec::new(); nodes.len()];

    // Pre-order puts every child after its parent, so walking backwards
    // finishes all children first.
    for v in (0..nodes.len()).rev() {
        if nodes[v].children.is_empty() {
            contours[v] = vec![(0.0, 0.0)];
            continue;
        }

        let mut merged: Vec<(f32, f32)> = Vec::new();
        let mut positions: Vec<f32> = Vec::with_capacity(nodes[v].children.len());
        for (i, &child) in nodes[v].children.iter().enumerate() {
            let contour = std::mem::take(&mut contours[child]);
            let pos = if i == 0 {
                0.0
            } else {
                merged
                    .iter()
                    .zip(&contour)
                    .enumerate()
                    .map(|(depth, (&(_, right), &(left, _)))| {
                        let gap = if depth == 0 {
                            separation.siblings
                        } else {
                            separation.cousins
                        };
                        right + gap - left
                    })
                    .fold(f32::NEG_INFINITY, f32::max)
            };
            for (depth, &(left, right)) in contour.iter().enumerate() {
                match merged.get_mut(depth) {
                    Some(level) => level.1 = pos + right,
                    None => merged.push((pos + left, pos + right)),
                }
            }
            positions.push(pos);
        }

        let first = positions[0];
        let last = positions[positions.len() - 1];
        let mid = (first + last) / 2.0;
        let children = nodes[v].children.clone();
        for (child, pos) in children.into_iter().zip(positions) {
            nodes[child].offset = pos - mid;
        }

        let mut contour = Vec::with_capacity(merged.len() + 1);
        contour.push((0.0, 0.0));
        contour.extend(merged.into_iter().map(|(left, right)| (left - mid, right - mid)));
        contours[v] = contour;
    }

    let mut xs = vec![0.0f32; nodes.len()];
    for v in 1..nodes.len() {
        if let Some(parent) = nodes[v].parent {
            xs[v] = xs[parent] + nodes[v].offset;
        }
    }
    xs
}

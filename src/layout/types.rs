use crate::ir::CanonicalNode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelSize {
    pub width: f32,
    pub height: f32,
}

/// A canonical node with its position inside the layout bounds.
#[derive(Debug, Clone)]
pub struct PositionedNode<'a> {
    pub node: &'a CanonicalNode,
    pub x: f32,
    pub y: f32,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub parent: usize,
    pub child: usize,
    pub source: (f32, f32),
    pub target: (f32, f32),
}

/// Nodes are stored in pre-order, so the root is always at index 0.
#[derive(Debug, Clone)]
pub struct TreeLayout<'a> {
    pub bounds: Bounds,
    pub nodes: Vec<PositionedNode<'a>>,
    pub edges: Vec<EdgeLayout>,
    pub max_depth: usize,
}

impl<'a> TreeLayout<'a> {
    pub fn root(&self) -> &PositionedNode<'a> {
        &self.nodes[0]
    }

    pub fn coordinates(&self) -> Vec<(f32, f32)> {
        self.nodes.iter().map(|node| (node.x, node.y)).collect()
    }
}

use crate::layout::TreeLayout;
use crate::render::NodeBox;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub max_depth: usize,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub index: usize,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub depth: usize,
    pub parent: Option<usize>,
    pub width: f32,
    pub height: f32,
    pub label_width: f32,
    pub label_height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: usize,
    pub to: usize,
    pub points: [[f32; 2]; 2],
}

impl LayoutDump {
    pub fn from_layout(layout: &TreeLayout<'_>, boxes: &[NodeBox]) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .zip(boxes)
            .enumerate()
            .map(|(index, (node, node_box))| NodeDump {
                index,
                label: node.node.label().to_string(),
                x: node.x,
                y: node.y,
                depth: node.depth,
                parent: node.parent,
                width: node_box.width,
                height: node_box.height,
                label_width: node_box.label.width,
                label_height: node_box.label.height,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                from: edge.parent,
                to: edge.child,
                points: [
                    [edge.source.0, edge.source.1],
                    [edge.target.0, edge.target.1],
                ],
            })
            .collect();

        LayoutDump {
            width: layout.bounds.width,
            height: layout.bounds.height,
            max_depth: layout.max_depth,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &TreeLayout<'_>, boxes: &[NodeBox]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, boxes);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::CanonicalNode;
    use crate::layout::{Bounds, FixedWidthSizer, layout};
    use crate::render::size_boxes;
    use crate::theme::Theme;

    #[test]
    fn dump_mirrors_layout() {
        let tree = CanonicalNode {
            display_name: crate::ir::DisplayName::Named("app".into()),
            children: vec![CanonicalNode::leaf("lib")],
        };
        let result = layout(&tree, Bounds::new(200.0, 100.0)).unwrap();
        let boxes = size_boxes(&result, &FixedWidthSizer::default(), &Theme::dependency_tree());
        let dump = LayoutDump::from_layout(&result, &boxes);

        assert_eq!(dump.nodes.len(), 2);
        assert_eq!(dump.nodes[1].label, "lib");
        assert_eq!(dump.nodes[1].parent, Some(0));
        assert_eq!(dump.nodes[1].y, 100.0);
        assert_eq!(dump.edges.len(), 1);
        assert_eq!(dump.edges[0].points[1], [dump.nodes[1].x, 100.0]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        write_layout_dump(&path, &result, &boxes).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["nodes"][0]["label"], "app");
        assert_eq!(written["max_depth"], 1);
    }
}

use crate::config::Margins;
use crate::layout::{LabelSize, LabelSizer, TreeLayout};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// The box drawn behind one node's label, centred on the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBox {
    pub label: LabelSize,
    pub width: f32,
    pub height: f32,
}

pub fn size_boxes(layout: &TreeLayout<'_>, sizer: &dyn LabelSizer, theme: &Theme) -> Vec<NodeBox> {
    layout
        .nodes
        .iter()
        .map(|node| {
            let label = sizer.measure(node.node.label());
            NodeBox {
                label,
                width: label.width + theme.node_padding_x * 2.0,
                height: label.height + theme.node_padding_y * 2.0,
            }
        })
        .collect()
}

/// Builds the SVG document for one laid-out tree.
///
/// Links come first so every node box is painted over the lines meeting it.
pub fn render_tree_svg(layout: &TreeLayout<'_>, boxes: &[NodeBox], theme: &Theme, margin: &Margins) -> String {
    let width = layout.bounds.width + margin.left + margin.right;
    let height = layout.bounds.height + margin.top + margin.bottom;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<g transform=\"translate({},{})\">",
        margin.left, margin.top
    ));

    for edge in &layout.edges {
        svg.push_str(&format!(
            "<path class=\"link\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            link_path(edge.source, edge.target),
            theme.link_color,
            theme.link_width
        ));
    }

    for (node, node_box) in layout.nodes.iter().zip(boxes) {
        svg.push_str(&format!(
            "<g class=\"node\" transform=\"translate({:.2},{:.2})\">",
            node.x, node.y
        ));
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{r}\" ry=\"{r}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            -node_box.width / 2.0,
            -node_box.height / 2.0,
            node_box.width,
            node_box.height,
            theme.node_fill,
            theme.node_stroke,
            theme.node_stroke_width,
            r = theme.node_corner_radius,
        ));
        svg.push_str(&format!(
            "<text x=\"0\" dy=\"{}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\">{}</text>",
            theme.label_baseline_shift,
            theme.font_family,
            theme.font_size,
            theme.font_weight,
            theme.label_color,
            escape_xml(node.node.label())
        ));
        svg.push_str("</g>");
    }

    svg.push_str("</g></svg>");
    svg
}

/// Vertical cubic link: leaves the parent downwards and enters the child from
/// above, with both control points on the midline.
fn link_path(source: (f32, f32), target: (f32, f32)) -> String {
    let mid_y = (source.1 + target.1) / 2.0;
    format!(
        "M{:.2},{:.2}C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}",
        source.0, source.1, source.0, mid_y, target.0, mid_y, target.0, target.1
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme.font_family.clone();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

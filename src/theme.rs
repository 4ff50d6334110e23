use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: String,
    pub node_fill: String,
    pub node_stroke: String,
    pub node_stroke_width: f32,
    pub node_corner_radius: f32,
    pub node_padding_x: f32,
    pub node_padding_y: f32,
    pub label_color: String,
    pub label_baseline_shift: f32,
    pub link_color: String,
    pub link_width: f32,
    pub page_background: String,
    pub header_color: String,
}

impl Theme {
    /// The fixed presentation used for every dependency diagram.
    pub fn dependency_tree() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 12.0,
            font_weight: "bold".to_string(),
            node_fill: "#bb86fc".to_string(),
            node_stroke: "#e0e0e0".to_string(),
            node_stroke_width: 1.5,
            node_corner_radius: 5.0,
            node_padding_x: 10.0,
            node_padding_y: 5.0,
            label_color: "#ffffff".to_string(),
            label_baseline_shift: 4.0,
            link_color: "#bb86fc".to_string(),
            link_width: 1.5,
            page_background: "#121212".to_string(),
            header_color: "#e0e0e0".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dependency_tree()
    }
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("layout bounds must be positive and finite, got {width}x{height}")]
    InvalidBounds { width: f32, height: f32 },
    #[error("tree nesting exceeds {limit} levels")]
    DepthLimit { limit: usize },
    #[error("circular dependency detected at {node}. Path: [{}]", path.join(", "))]
    CyclicStructure { node: String, path: Vec<String> },
}

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod normalize;
pub mod orchestrator;
pub mod render;
pub mod sbom;
pub mod surface;
pub mod text_metrics;
pub mod theme;
pub mod tree_render;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RetryPolicy, load_config};
pub use error::TreeError;
pub use ir::{CanonicalNode, DisplayName, RawNode};
pub use layout::{Bounds, TreeLayout, layout};
pub use normalize::normalize;
pub use orchestrator::{RenderBatch, TreeOutcome, render_all};
pub use surface::{HostPage, SurfaceSize, TreesContainer};
pub use tree_render::{RenderContext, RenderError, RenderReport, RenderState, render_tree};

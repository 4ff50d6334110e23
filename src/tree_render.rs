//! Per-surface render cycle: wait for the surface to be laid out, measure and
//! lay out the tree, then draw it.

use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{LayoutConfig, RetryPolicy};
use crate::error::TreeError;
use crate::ir::{CanonicalNode, RawNode};
use crate::layout::{Bounds, LabelSizer, layout_with_config};
use crate::render::{render_tree_svg, size_boxes};
use crate::surface::{SurfaceHandle, SurfaceSize};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    AwaitingSurface,
    Measuring,
    Drawn,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Container {id} not found")]
    SurfaceDisposed { id: String },
    #[error("Container {id} never reported a size after {attempts} checks")]
    SurfaceNeverSettled { id: String, attempts: u32 },
    #[error(transparent)]
    Layout(#[from] TreeError),
}

/// Everything a render cycle needs besides the tree itself.
#[derive(Clone)]
pub struct RenderContext {
    pub sizer: Rc<dyn LabelSizer>,
    pub theme: Rc<Theme>,
    pub layout: Rc<LayoutConfig>,
    pub retry: RetryPolicy,
}

impl RenderContext {
    pub fn new(sizer: Rc<dyn LabelSizer>, theme: Theme, layout: LayoutConfig, retry: RetryPolicy) -> Self {
        Self {
            sizer,
            theme: Rc::new(theme),
            layout: Rc::new(layout),
            retry,
        }
    }
}

/// Bookkeeping for one entry of the input collection.
#[derive(Debug, Clone)]
pub struct TreeDescriptor {
    pub raw_root: RawNode,
    pub index: usize,
    pub surface: SurfaceHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub surface_id: String,
    pub transitions: Vec<RenderState>,
    pub bounds: Bounds,
    pub node_count: usize,
    pub edge_count: usize,
    pub coordinates: Vec<(f32, f32)>,
}

/// Content area left inside the surface once the margins are taken off.
pub fn content_bounds(size: SurfaceSize, config: &LayoutConfig) -> Bounds {
    let margin = &config.margin;
    let width = size.width - margin.left - margin.right;
    let height = size.height - margin.top - margin.bottom;
    Bounds::new(
        if width > 0.0 { width } else { config.fallback_width },
        if height > 0.0 { height } else { config.fallback_height },
    )
}

pub async fn render_tree(
    descriptor: &TreeDescriptor,
    canonical: &CanonicalNode,
    ctx: &RenderContext,
) -> Result<RenderReport, RenderError> {
    let surface = &descriptor.surface;
    let token = surface.cancellation();
    let mut transitions = Vec::new();
    let mut attempts: u32 = 0;

    let size = loop {
        if token.is_cancelled() {
            return Err(RenderError::SurfaceDisposed {
                id: surface.id().to_string(),
            });
        }
        let size = surface.client_size();
        if size.is_settled() {
            break size;
        }
        transitions.push(RenderState::AwaitingSurface);
        attempts += 1;
        if let Some(max) = ctx.retry.max_attempts
            && attempts >= max
        {
            return Err(RenderError::SurfaceNeverSettled {
                id: surface.id().to_string(),
                attempts,
            });
        }
        trace!(surface = surface.id(), attempts, "surface not laid out yet");
        tokio::select! {
            _ = tokio::time::sleep(ctx.retry.delay) => {}
            _ = token.cancelled() => {
                return Err(RenderError::SurfaceDisposed {
                    id: surface.id().to_string(),
                });
            }
        }
    };

    transitions.push(RenderState::Measuring);
    surface.clear();
    let bounds = content_bounds(size, &ctx.layout);
    let positioned = layout_with_config(canonical, bounds, &ctx.layout)?;
    let boxes = size_boxes(&positioned, ctx.sizer.as_ref(), &ctx.theme);

    let svg = render_tree_svg(&positioned, &boxes, &ctx.theme, &ctx.layout.margin);
    surface.draw(svg);
    transitions.push(RenderState::Drawn);
    debug!(
        surface = surface.id(),
        nodes = positioned.nodes.len(),
        waited = attempts,
        "tree drawn"
    );

    Ok(RenderReport {
        surface_id: surface.id().to_string(),
        transitions,
        bounds,
        node_count: positioned.nodes.len(),
        edge_count: positioned.edges.len(),
        coordinates: positioned.coordinates(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FixedWidthSizer;
    use crate::surface::{SizeProbe, TreesContainer};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays a fixed sequence of sizes, then repeats the last one.
    struct ScriptedSize {
        sizes: RefCell<VecDeque<SurfaceSize>>,
        checks: std::cell::Cell<usize>,
    }

    impl ScriptedSize {
        fn new(sizes: &[SurfaceSize]) -> Rc<Self> {
            Rc::new(Self {
                sizes: RefCell::new(sizes.iter().copied().collect()),
                checks: std::cell::Cell::new(0),
            })
        }
    }

    impl SizeProbe for ScriptedSize {
        fn client_size(&self) -> SurfaceSize {
            self.checks.set(self.checks.get() + 1);
            let mut sizes = self.sizes.borrow_mut();
            if sizes.len() > 1 {
                sizes.pop_front().unwrap_or(SurfaceSize::ZERO)
            } else {
                sizes.front().copied().unwrap_or(SurfaceSize::ZERO)
            }
        }
    }

    fn context(max_attempts: Option<u32>) -> RenderContext {
        RenderContext::new(
            Rc::new(FixedWidthSizer::default()),
            Theme::dependency_tree(),
            LayoutConfig::default(),
            RetryPolicy {
                delay: Duration::from_millis(50),
                max_attempts,
            },
        )
    }

    fn app_tree() -> (RawNode, CanonicalNode) {
        let raw = RawNode::named("app").with_deps(vec![RawNode::named("lib-a"), RawNode::named("lib-b")]);
        let canonical = crate::normalize::normalize(Some(&raw)).unwrap().unwrap();
        (raw, canonical)
    }

    fn descriptor(container: &TreesContainer, raw: RawNode) -> TreeDescriptor {
        let surface = container.create_section(0, "Dependency Tree: app".into());
        TreeDescriptor {
            raw_root: raw,
            index: 0,
            surface,
        }
    }

    #[test]
    fn content_bounds_subtracts_margins() {
        let config = LayoutConfig::default();
        assert_eq!(
            content_bounds(SurfaceSize::new(800.0, 600.0), &config),
            Bounds::new(760.0, 460.0)
        );
        assert_eq!(
            content_bounds(SurfaceSize::new(30.0, 100.0), &config),
            Bounds::new(600.0, 400.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_surface_then_draws() {
        let zero = SurfaceSize::ZERO;
        let probe = ScriptedSize::new(&[zero, zero, zero, SurfaceSize::new(800.0, 600.0)]);
        let shared = Rc::clone(&probe);
        let container = TreesContainer::new(move |_| Rc::clone(&shared) as Rc<dyn SizeProbe>);
        let (raw, canonical) = app_tree();
        let descriptor = descriptor(&container, raw);

        let started = tokio::time::Instant::now();
        let report = render_tree(&descriptor, &canonical, &context(None)).await.unwrap();

        use RenderState::*;
        assert_eq!(
            report.transitions,
            vec![AwaitingSurface, AwaitingSurface, AwaitingSurface, Measuring, Drawn]
        );
        assert_eq!(report.bounds, Bounds::new(760.0, 460.0));
        assert_eq!(report.node_count, 3);
        assert_eq!(report.edge_count, 2);
        assert_eq!(probe.checks.get(), 4);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(descriptor.surface.document().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let container = TreesContainer::with_fixed_size(SurfaceSize::ZERO);
        let (raw, canonical) = app_tree();
        let descriptor = descriptor(&container, raw);

        let err = render_tree(&descriptor, &canonical, &context(Some(5)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::SurfaceNeverSettled {
                id: "tree-container-0".into(),
                attempts: 5
            }
        );
        assert_eq!(descriptor.surface.draw_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disposal_cancels_a_waiting_render() {
        let container = TreesContainer::with_fixed_size(SurfaceSize::ZERO);
        let (raw, canonical) = app_tree();
        let descriptor = descriptor(&container, raw);
        let ctx = context(None);

        let local = tokio::task::LocalSet::new();
        let result = local
            .run_until(async {
                let render = tokio::task::spawn_local({
                    let descriptor = descriptor.clone();
                    let canonical = canonical.clone();
                    async move { render_tree(&descriptor, &canonical, &ctx).await }
                });
                tokio::time::sleep(Duration::from_millis(120)).await;
                container.clear();
                render.await.unwrap()
            })
            .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Container tree-container-0 not found"
        );
    }

    #[tokio::test]
    async fn rerender_replaces_the_diagram() {
        let container = TreesContainer::with_fixed_size(SurfaceSize::new(800.0, 600.0));
        let (raw, canonical) = app_tree();
        let descriptor = descriptor(&container, raw);
        let ctx = context(None);

        let first = render_tree(&descriptor, &canonical, &ctx).await.unwrap();
        let first_doc = descriptor.surface.document().unwrap();
        let second = render_tree(&descriptor, &canonical, &ctx).await.unwrap();
        let second_doc = descriptor.surface.document().unwrap();

        assert_eq!(first.coordinates, second.coordinates);
        assert_eq!(first.transitions, vec![RenderState::Measuring, RenderState::Drawn]);
        assert_eq!(first_doc, second_doc);
        assert_eq!(second_doc.matches("class=\"node\"").count(), 3);
        assert_eq!(second_doc.matches("class=\"link\"").count(), 2);
    }
}

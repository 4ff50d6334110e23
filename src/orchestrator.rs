use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ir::RawNode;
use crate::normalize::normalize;
use crate::surface::HostPage;
use crate::tree_render::{RenderContext, RenderError, RenderReport, TreeDescriptor, render_tree};

#[derive(Debug)]
pub struct TreeOutcome {
    pub index: usize,
    pub result: Result<RenderReport, RenderError>,
}

/// Renders scheduled by one [`render_all`] call.
///
/// Dropping the batch detaches the tasks; they keep running on the
/// `LocalSet` they were spawned on.
#[derive(Debug)]
pub struct RenderBatch {
    tasks: Vec<(usize, JoinHandle<Result<RenderReport, RenderError>>)>,
}

impl RenderBatch {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every scheduled render. Entries that had nothing to draw were
    /// never scheduled and have no outcome.
    pub async fn join(self) -> Vec<TreeOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (index, task) in self.tasks {
            match task.await {
                Ok(result) => outcomes.push(TreeOutcome { index, result }),
                Err(err) => error!(index, "render task failed: {err}"),
            }
        }
        outcomes
    }
}

pub fn section_header(index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Dependency Tree: {name}"),
        None => format!("Dependency Tree: Tree {}", index + 1),
    }
}

/// Clears the page's trees container and schedules one independent render per
/// entry of `trees`.
///
/// Must be called from inside a [`tokio::task::LocalSet`]. Nothing is touched
/// when the page has no trees container or `trees` is not an array; both cases
/// are logged and `None` is returned.
pub fn render_all(page: &HostPage, trees: &Value, ctx: &RenderContext) -> Option<RenderBatch> {
    let Some(container) = page.trees_container() else {
        error!("Trees container not found");
        return None;
    };
    let Some(entries) = trees.as_array() else {
        error!("Invalid trees data format");
        return None;
    };

    container.clear();
    info!(trees = entries.len(), "rendering dependency trees");

    let mut tasks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() && !entry.is_null() {
            warn!(index, "tree entry is not an object; rendering it as an empty record");
        }
        let raw = (!entry.is_null()).then(|| RawNode::from_value(entry));
        let canonical = match normalize(raw.as_ref()) {
            Ok(canonical) => canonical,
            Err(err) => {
                error!(index, "skipping tree: {err}");
                None
            }
        };
        let header = section_header(
            index,
            canonical.as_ref().and_then(|node| node.display_name.as_label()),
        );
        let surface = container.create_section(index, header);

        let (Some(raw_root), Some(canonical)) = (raw, canonical) else {
            debug!(surface = surface.id(), "nothing to draw");
            continue;
        };
        let descriptor = TreeDescriptor {
            raw_root,
            index,
            surface,
        };
        let ctx = ctx.clone();
        let task = tokio::task::spawn_local(async move {
            // Let the host finish laying out the freshly created sections.
            tokio::task::yield_now().await;
            let result = render_tree(&descriptor, &canonical, &ctx).await;
            if let Err(err) = &result {
                error!(index = descriptor.index, "{err}");
            }
            result
        });
        tasks.push((index, task));
    }

    Some(RenderBatch { tasks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayoutConfig, RetryPolicy};
    use crate::layout::FixedWidthSizer;
    use crate::surface::{SurfaceSize, TreesContainer};
    use crate::theme::Theme;
    use serde_json::json;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn context() -> RenderContext {
        RenderContext::new(
            Rc::new(FixedWidthSizer::default()),
            Theme::dependency_tree(),
            LayoutConfig::default(),
            RetryPolicy::default(),
        )
    }

    fn page() -> HostPage {
        HostPage::with_viewport(SurfaceSize::new(800.0, 600.0))
    }

    #[test]
    fn header_falls_back_to_position() {
        assert_eq!(section_header(0, Some("x")), "Dependency Tree: x");
        assert_eq!(section_header(2, None), "Dependency Tree: Tree 3");
    }

    #[tokio::test]
    async fn single_tree_collection_gets_one_surface() {
        let page = page();
        let outcomes = LocalSet::new()
            .run_until(async {
                render_all(&page, &json!([{"name": "x"}]), &context())
                    .unwrap()
                    .join()
                    .await
            })
            .await;

        let sections = page.trees_container().unwrap().sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, "Dependency Tree: x");
        assert_eq!(sections[0].surface.draw_count(), 1);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result.as_ref().unwrap().node_count, 1);
    }

    #[tokio::test]
    async fn non_array_input_leaves_page_untouched() {
        let page = page();
        LocalSet::new()
            .run_until(async {
                render_all(&page, &json!([{"name": "keep"}]), &context())
                    .unwrap()
                    .join()
                    .await;
                assert!(render_all(&page, &json!({}), &context()).is_none());
            })
            .await;

        let sections = page.trees_container().unwrap().sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, "Dependency Tree: keep");
        assert!(sections[0].surface.document().is_some());
    }

    #[test]
    fn missing_container_renders_nothing() {
        assert!(render_all(&HostPage::detached(), &json!([]), &context()).is_none());
    }

    #[tokio::test]
    async fn null_entries_get_a_section_but_no_render() {
        let page = page();
        let outcomes = LocalSet::new()
            .run_until(async {
                render_all(&page, &json!([null, {"ref": "b"}, {}]), &context())
                    .unwrap()
                    .join()
                    .await
            })
            .await;

        let sections = page.trees_container().unwrap().sections();
        let headers: Vec<&str> = sections.iter().map(|s| s.header.as_str()).collect();
        assert_eq!(
            headers,
            ["Dependency Tree: Tree 1", "Dependency Tree: b", "Dependency Tree: Tree 3"]
        );
        assert_eq!(sections[0].surface.draw_count(), 0);
        let indices: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, [1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_surface_does_not_block_siblings() {
        let container = TreesContainer::new(|index| {
            let size = if index == 0 {
                SurfaceSize::ZERO
            } else {
                SurfaceSize::new(800.0, 600.0)
            };
            Rc::new(size) as Rc<dyn crate::surface::SizeProbe>
        });
        let page = HostPage::new(container);
        let mut ctx = context();
        ctx.retry.max_attempts = Some(3);

        let outcomes = LocalSet::new()
            .run_until(async {
                render_all(&page, &json!([{"name": "stuck"}, {"name": "fine"}]), &ctx)
                    .unwrap()
                    .join()
                    .await
            })
            .await;

        assert!(matches!(
            outcomes[0].result,
            Err(RenderError::SurfaceNeverSettled { attempts: 3, .. })
        ));
        assert!(outcomes[1].result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn new_upload_supersedes_pending_renders() {
        let pending = Rc::new(std::cell::Cell::new(SurfaceSize::ZERO));
        let probe = Rc::clone(&pending);
        let page = HostPage::new(TreesContainer::new(move |_| {
            Rc::clone(&probe) as Rc<dyn crate::surface::SizeProbe>
        }));
        let ctx = context();

        let (stale, fresh) = LocalSet::new()
            .run_until(async {
                let stale = render_all(&page, &json!([{"name": "old"}]), &ctx).unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(75)).await;
                pending.set(SurfaceSize::new(800.0, 600.0));
                let fresh = render_all(&page, &json!([{"name": "new"}]), &ctx).unwrap();
                (stale.join().await, fresh.join().await)
            })
            .await;

        assert!(matches!(
            stale[0].result,
            Err(RenderError::SurfaceDisposed { .. })
        ));
        assert!(fresh[0].result.is_ok());
        let sections = page.trees_container().unwrap().sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, "Dependency Tree: new");
    }
}

//! In-process model of the host page.
//!
//! A [`HostPage`] owns the trees container; the container hands out one
//! [`Surface`] per tree. Callers keep the returned handle instead of looking
//! surfaces up by id, and clearing the container disposes every surface it
//! created, which cancels renders still waiting on them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_settled(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Reports the client size the host has assigned to a surface.
pub trait SizeProbe {
    fn client_size(&self) -> SurfaceSize;
}

impl SizeProbe for SurfaceSize {
    fn client_size(&self) -> SurfaceSize {
        *self
    }
}

impl SizeProbe for Cell<SurfaceSize> {
    fn client_size(&self) -> SurfaceSize {
        self.get()
    }
}

/// Cooperative cancellation shared between a surface and the renders
/// targeting it.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Rc<CancellationInner>,
}

#[derive(Default)]
struct CancellationInner {
    cancelled: Cell<bool>,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.set(true);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct Surface {
    id: String,
    index: usize,
    probe: Rc<dyn SizeProbe>,
    document: RefCell<Option<String>>,
    draws: Cell<usize>,
    token: CancellationToken,
}

pub type SurfaceHandle = Rc<Surface>;

impl Surface {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn client_size(&self) -> SurfaceSize {
        self.probe.client_size()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn clear(&self) {
        self.document.borrow_mut().take();
    }

    /// Replaces whatever the surface currently shows.
    pub fn draw(&self, document: String) {
        *self.document.borrow_mut() = Some(document);
        self.draws.set(self.draws.get() + 1);
    }

    pub fn document(&self) -> Option<String> {
        self.document.borrow().clone()
    }

    pub fn draw_count(&self) -> usize {
        self.draws.get()
    }

    fn dispose(&self) {
        self.clear();
        self.token.cancel();
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("size", &self.client_size())
            .field("draws", &self.draws.get())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TreeSection {
    pub header: String,
    pub surface: SurfaceHandle,
}

type ProbeFactory = dyn Fn(usize) -> Rc<dyn SizeProbe>;

/// Holds one section (header and surface) per rendered tree.
#[derive(Clone)]
pub struct TreesContainer {
    sections: Rc<RefCell<Vec<TreeSection>>>,
    probes: Rc<ProbeFactory>,
}

impl TreesContainer {
    pub fn new(probes: impl Fn(usize) -> Rc<dyn SizeProbe> + 'static) -> Self {
        Self {
            sections: Rc::new(RefCell::new(Vec::new())),
            probes: Rc::new(probes),
        }
    }

    pub fn with_fixed_size(size: SurfaceSize) -> Self {
        Self::new(move |_| Rc::new(size) as Rc<dyn SizeProbe>)
    }

    /// Removes every section, disposing its surface.
    pub fn clear(&self) {
        for section in self.sections.borrow_mut().drain(..) {
            section.surface.dispose();
        }
    }

    pub fn create_section(&self, index: usize, header: String) -> SurfaceHandle {
        let surface = Rc::new(Surface {
            id: format!("tree-container-{index}"),
            index,
            probe: (self.probes)(index),
            document: RefCell::new(None),
            draws: Cell::new(0),
            token: CancellationToken::new(),
        });
        self.sections.borrow_mut().push(TreeSection {
            header,
            surface: Rc::clone(&surface),
        });
        surface
    }

    pub fn sections(&self) -> Vec<TreeSection> {
        self.sections.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.sections.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.borrow().is_empty()
    }
}

impl fmt::Debug for TreesContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreesContainer")
            .field("sections", &self.sections.borrow().len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostPage {
    trees: Option<TreesContainer>,
}

impl HostPage {
    pub fn new(container: TreesContainer) -> Self {
        Self {
            trees: Some(container),
        }
    }

    /// A page where every surface is laid out at `size` right away.
    pub fn with_viewport(size: SurfaceSize) -> Self {
        Self::new(TreesContainer::with_fixed_size(size))
    }

    /// A page without a trees container.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn trees_container(&self) -> Option<&TreesContainer> {
        self.trees.as_ref()
    }

    pub fn to_html(&self, background: &str, header_color: &str) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Dependency Trees</title></head>");
        html.push_str(&format!(
            "<body style=\"background:{background};color:{header_color};font-family:Arial, sans-serif\">"
        ));
        html.push_str("<div id=\"trees-container\">");
        if let Some(container) = &self.trees {
            for section in container.sections() {
                html.push_str("<div class=\"tree-section\">");
                html.push_str(&format!(
                    "<h2 class=\"tree-header\">{}</h2>",
                    crate::render::escape_xml(&section.header)
                ));
                html.push_str(&format!(
                    "<div class=\"tree-container\" id=\"{}\">",
                    section.surface.id()
                ));
                if let Some(document) = section.surface.document() {
                    html.push_str(&document);
                }
                html.push_str("</div></div>");
            }
        }
        html.push_str("</div></body></html>");
        html
    }
}

use crate::render::camera::RenderCamera;
use crate::render::gl_composer::GlBackend;
use crate::render::vnode::VirtualNode;
use std::fmt;
use std::sync::Arc;

/// Composite stage. Background entries draw first, then the depth buffer is
/// cleared and foreground entries draw on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlStage {
    Background,
    Foreground,
}

/// The function an entry renders with. Runs unguarded inside the composite
/// and must not panic.
pub type RenderFunction = Arc<dyn Fn(&RenderCamera, &mut dyn GlBackend) + Send + Sync>;

#[derive(Clone)]
pub struct GlRenderEntry {
    /// Camera tick this entry was produced for. The composite only fires once
    /// every accumulated entry carries the current tick.
    pub frame_id: u64,
    pub needs_render: bool,
    pub stage: GlStage,
    pub render: RenderFunction,
}

impl fmt::Debug for GlRenderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlRenderEntry")
            .field("frame_id", &self.frame_id)
            .field("needs_render", &self.needs_render)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Named payload for the GL channel. `None` removes the name.
#[derive(Debug)]
pub struct GlContribution {
    pub name: &'static str,
    pub entry: Option<GlRenderEntry>,
}

/// Named payload for one of the DOM channels. `None` removes the name.
#[derive(Debug)]
pub struct DomContribution {
    pub name: &'static str,
    pub vnode: Option<VirtualNode>,
}

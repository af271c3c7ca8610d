use crate::graph::node_cache::Mesh;
use crate::io::texture_store::TextureId;
use crate::render::camera::RenderCamera;
use crate::render::contribution::{GlContribution, GlStage};
use glam::Mat4;
use std::sync::Arc;

/// One draw request handed to the backend. `texture` and `mesh` resolve
/// through the stores the entry captured at submission time.
pub struct MeshDraw {
    pub texture: Option<TextureId>,
    pub mesh: Option<Arc<Mesh>>,
    pub transform: Mat4,
    pub label: &'static str,
}

/// The actual GPU surface. Implemented by the embedding; the composer only
/// dictates the clear/stage ordering.
pub trait GlBackend {
    fn clear_color(&mut self);
    fn clear_depth(&mut self);
    fn draw_mesh(&mut self, draw: &MeshDraw);
}

/// The frame barrier over the accumulated GL entries.
///
/// A composite only fires once every entry reports the camera's frame id, so
/// a single straggler holds the whole frame back, and only when some dirty
/// signal exists: the renderer-level flag, a camera change not yet rendered,
/// an entry asking for it, or the eraser set by a removal. Firing clears the
/// color buffer, draws Background entries in accumulation order, clears the
/// depth buffer and draws Foreground entries, so overlays are never
/// depth-occluded by background geometry. Entry flags and the eraser reset
/// after every fire.
#[derive(Default)]
pub struct GlComposer {
    entries: Vec<GlContribution>,
    eraser: bool,
    last_camera_fire: Option<u64>,
}

impl GlComposer {
    pub fn apply(&mut self, contribution: GlContribution) {
        match contribution.entry {
            Some(_) => {
                if let Some(existing) = self
                    .entries
                    .iter_mut()
                    .find(|existing| existing.name == contribution.name)
                {
                    existing.entry = contribution.entry;
                } else {
                    self.entries.push(contribution);
                }
            }
            None => {
                let before = self.entries.len();
                self.entries.retain(|existing| existing.name != contribution.name);
                if self.entries.len() != before {
                    self.eraser = true;
                }
            }
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Runs the barrier and, when it passes, exactly one composite render.
    /// Returns whether one fired.
    pub fn compose(
        &mut self,
        camera: &RenderCamera,
        renderer_needs_render: bool,
        backend: &mut dyn GlBackend,
    ) -> bool {
        if self.entries.is_empty() && !self.eraser {
            return false;
        }
        if !self.all_caught_up(camera) {
            return false;
        }
        if !self.has_dirty_signal(camera, renderer_needs_render) {
            return false;
        }

        log::trace!("Composite render at frame {} with {} entries", camera.frame_id, self.entries.len());
        backend.clear_color();
        self.render_stage(GlStage::Background, camera, backend);
        backend.clear_depth();
        self.render_stage(GlStage::Foreground, camera, backend);

        for contribution in &mut self.entries {
            if let Some(entry) = &mut contribution.entry {
                entry.needs_render = false;
            }
        }
        self.eraser = false;
        self.last_camera_fire = Some(camera.frame_id);
        true
    }

    fn all_caught_up(&self, camera: &RenderCamera) -> bool {
        self.entries
            .iter()
            .filter_map(|contribution| contribution.entry.as_ref())
            .all(|entry| entry.frame_id == camera.frame_id)
    }

    fn has_dirty_signal(&self, camera: &RenderCamera, renderer_needs_render: bool) -> bool {
        // a camera change counts once per frame, later polls of the same
        // frame must not re-fire
        let camera_pending = camera.changed && self.last_camera_fire != Some(camera.frame_id);
        renderer_needs_render
            || camera_pending
            || self.eraser
            || self
                .entries
                .iter()
                .filter_map(|contribution| contribution.entry.as_ref())
                .any(|entry| entry.needs_render)
    }

    fn render_stage(&self, stage: GlStage, camera: &RenderCamera, backend: &mut dyn GlBackend) {
        for contribution in &self.entries {
            if let Some(entry) = &contribution.entry {
                if entry.stage == stage {
                    (entry.render)(camera, backend);
                }
            }
        }
    }
}

use crate::render::adaptive::{RenderMode, ViewportSize};
use crate::render::camera::RenderCamera;
use crate::render::contribution::{DomContribution, GlContribution};
use arc_swap::ArcSwapOption;
use glam::Mat4;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

pub mod adaptive;
pub mod camera;
pub mod contribution;
pub mod dom_composer;
pub mod gl_composer;
pub mod vnode;

/// Receiving ends of the contribution queues. The frame driver owns these
/// and drains them into the composers once per frame.
pub struct ContributionQueues {
    pub dom_fixed: mpsc::UnboundedReceiver<DomContribution>,
    pub dom_adaptive: mpsc::UnboundedReceiver<DomContribution>,
    pub gl: mpsc::UnboundedReceiver<GlContribution>,
}

/// The injection point every visual component publishes through, plus the
/// feeds they react to: the per-frame camera, viewport size and render mode.
///
/// Publishing is fire-and-forget. When the frame driver is gone the queues
/// close and contributions are silently dropped, which only happens during
/// teardown.
pub struct RenderService {
    dom_fixed: mpsc::UnboundedSender<DomContribution>,
    dom_adaptive: mpsc::UnboundedSender<DomContribution>,
    gl: mpsc::UnboundedSender<GlContribution>,

    camera: watch::Sender<RenderCamera>,
    viewport: watch::Sender<ViewportSize>,
    render_mode: watch::Sender<RenderMode>,
    image_aspect: ArcSwapOption<f32>,
    needs_render: AtomicBool,
}

impl RenderService {
    pub fn new() -> (Self, ContributionQueues) {
        let (dom_fixed, dom_fixed_rx) = mpsc::unbounded_channel();
        let (dom_adaptive, dom_adaptive_rx) = mpsc::unbounded_channel();
        let (gl, gl_rx) = mpsc::unbounded_channel();
        let (camera, _) = watch::channel(RenderCamera::default());
        let (viewport, _) = watch::channel(ViewportSize::default());
        let (render_mode, _) = watch::channel(RenderMode::default());

        let service = Self {
            dom_fixed,
            dom_adaptive,
            gl,
            camera,
            viewport,
            render_mode,
            image_aspect: ArcSwapOption::empty(),
            needs_render: AtomicBool::new(false),
        };
        let queues = ContributionQueues {
            dom_fixed: dom_fixed_rx,
            dom_adaptive: dom_adaptive_rx,
            gl: gl_rx,
        };
        (service, queues)
    }

    pub fn publish_dom_fixed(&self, contribution: DomContribution) {
        if self.dom_fixed.send(contribution).is_err() {
            log::trace!("Dropping fixed DOM contribution, the frame driver is gone");
        }
    }

    pub fn publish_dom_adaptive(&self, contribution: DomContribution) {
        if self.dom_adaptive.send(contribution).is_err() {
            log::trace!("Dropping adaptive DOM contribution, the frame driver is gone");
        }
    }

    pub fn publish_gl(&self, contribution: GlContribution) {
        if self.gl.send(contribution).is_err() {
            log::trace!("Dropping GL contribution, the frame driver is gone");
        }
    }

    /// Pushes the removal payload for `name` into every channel. Deactivation
    /// runs through here so no channel keeps a stale contribution.
    pub fn remove_contribution(&self, name: &'static str) {
        self.publish_dom_fixed(DomContribution { name, vnode: None });
        self.publish_dom_adaptive(DomContribution { name, vnode: None });
        self.publish_gl(GlContribution { name, entry: None });
    }

    /// Advances the camera by one frame and notifies every subscriber.
    /// Returns the new camera snapshot.
    pub fn advance_camera(&self, changed: bool, perspective: Mat4) -> RenderCamera {
        self.camera
            .send_modify(|camera| *camera = camera.advance(changed, perspective));
        *self.camera.borrow()
    }

    pub fn camera(&self) -> RenderCamera {
        *self.camera.borrow()
    }

    pub fn camera_stream(&self) -> watch::Receiver<RenderCamera> {
        self.camera.subscribe()
    }

    /// A resize invalidates whatever is on screen, so it arms the
    /// renderer-level needs-render flag as well.
    pub fn set_viewport_size(&self, size: ViewportSize) {
        self.viewport.send_replace(size);
        self.force_render();
    }

    pub fn viewport(&self) -> ViewportSize {
        *self.viewport.borrow()
    }

    pub fn viewport_stream(&self) -> watch::Receiver<ViewportSize> {
        self.viewport.subscribe()
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.render_mode.send_replace(mode);
    }

    pub fn render_mode(&self) -> RenderMode {
        *self.render_mode.borrow()
    }

    pub fn render_mode_stream(&self) -> watch::Receiver<RenderMode> {
        self.render_mode.subscribe()
    }

    /// Aspect ratio of the currently displayed image, fed by whoever installs
    /// imagery and read by the adaptive DOM channel.
    pub fn set_image_aspect(&self, aspect: f32) {
        self.image_aspect.store(Some(Arc::new(aspect)));
    }

    pub fn image_aspect(&self) -> Option<f32> {
        self.image_aspect.load_full().map(|aspect| *aspect)
    }

    pub fn force_render(&self) {
        self.needs_render.store(true, Ordering::Release);
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render.load(Ordering::Acquire)
    }

    /// Called by the frame driver after a composite render fired.
    pub fn clear_needs_render(&self) {
        self.needs_render.store(false, Ordering::Release);
    }
}

use crate::component::ComponentRegistry;
use crate::graph::GraphService;
use crate::render::adaptive::{RenderMode, ViewportSize, render_offset};
use crate::render::camera::RenderCamera;
use crate::render::dom_composer::{DomBackend, DomComposer};
use crate::render::gl_composer::{GlBackend, GlComposer};
use crate::render::{ContributionQueues, RenderService};
use crate::settings::ViewerSettings;
use glam::Mat4;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

#[cfg(test)]
pub mod testing;

/// Which node the viewer is looking at. Components follow this feed; nothing
/// else carries navigation state.
pub struct StateService {
    current: watch::Sender<Option<String>>,
}

impl Default for StateService {
    fn default() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }
}

impl StateService {
    pub fn set_current_node(&self, key: &str) {
        self.current.send_replace(Some(key.to_string()));
    }

    pub fn clear_current_node(&self) {
        self.current.send_replace(None);
    }

    pub fn current_node(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn current_node_stream(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEvent {
    Click { x: f32, y: f32 },
    Move { x: f32, y: f32 },
}

/// Pointer events from the embedding, fanned out to every subscriber. Slow
/// subscribers lag and skip rather than block the feed.
pub struct MouseService {
    events: broadcast::Sender<MouseEvent>,
}

impl Default for MouseService {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self { events }
    }
}

impl MouseService {
    pub fn emit(&self, event: MouseEvent) {
        // no subscribers is fine, events are fire-and-forget
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MouseEvent> {
        self.events.subscribe()
    }
}

/// The shared services components subscribe to during activation.
pub struct Services {
    pub graph: Arc<GraphService>,
    pub render: Arc<RenderService>,
    pub state: Arc<StateService>,
    pub mouse: Arc<MouseService>,
    pub settings: ViewerSettings,
}

impl Services {
    pub fn new(graph: Arc<GraphService>, settings: ViewerSettings) -> (Arc<Self>, ContributionQueues) {
        let (render, queues) = RenderService::new();
        let services = Arc::new(Self {
            graph,
            render: Arc::new(render),
            state: Arc::new(StateService::default()),
            mouse: Arc::new(MouseService::default()),
            settings,
        });
        (services, queues)
    }
}

/// The frame driver: owns the composers, the contribution queues and the
/// component registry.
///
/// The embedding advances the camera with `tick`, lets the event loop run so
/// components catch up, then calls `render_frame` to drain the queues into
/// the composers and produce this frame's DOM patches and, when the barrier
/// passes, one GL composite.
pub struct Viewer {
    services: Arc<Services>,
    registry: ComponentRegistry,
    queues: ContributionQueues,
    dom_fixed: DomComposer,
    dom_adaptive: DomComposer,
    gl: GlComposer,
}

impl Viewer {
    pub fn new(graph: Arc<GraphService>, settings: ViewerSettings) -> Self {
        let (services, queues) = Services::new(graph, settings);
        services.render.set_render_mode(settings.render_mode);
        let registry = ComponentRegistry::new(Arc::clone(&services));
        Self {
            services,
            registry,
            queues,
            dom_fixed: DomComposer::fixed("dom-fixed"),
            dom_adaptive: DomComposer::adaptive("dom-adaptive"),
            gl: GlComposer::default(),
        }
    }

    pub fn services(&self) -> Arc<Services> {
        Arc::clone(&self.services)
    }

    pub fn registry(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn set_current_node(&self, key: &str) {
        self.services.state.set_current_node(key);
    }

    pub fn set_viewport_size(&self, size: ViewportSize) {
        self.services.render.set_viewport_size(size);
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.services.render.set_render_mode(mode);
    }

    /// Advances the camera by one animation frame.
    pub fn tick(&self, changed: bool, perspective: Mat4) -> RenderCamera {
        self.services.render.advance_camera(changed, perspective)
    }

    /// Composes the current frame. DOM channels patch whenever their
    /// accumulation or offset changed; the GL channel runs through the frame
    /// barrier. Returns whether a GL composite fired.
    pub fn render_frame(&mut self, dom_backend: &mut dyn DomBackend, gl_backend: &mut dyn GlBackend) -> bool {
        while let Ok(contribution) = self.queues.dom_fixed.try_recv() {
            self.dom_fixed.apply(contribution);
        }
        while let Ok(contribution) = self.queues.dom_adaptive.try_recv() {
            self.dom_adaptive.apply(contribution);
        }
        while let Ok(contribution) = self.queues.gl.try_recv() {
            self.gl.apply(contribution);
        }

        let render = &self.services.render;
        let aspect = render.image_aspect().unwrap_or(0.0);
        self.dom_adaptive
            .set_offset(render_offset(render.viewport(), aspect, render.render_mode()));

        self.dom_fixed.compose(dom_backend);
        self.dom_adaptive.compose(dom_backend);

        let camera = render.camera();
        let fired = self.gl.compose(&camera, render.needs_render(), gl_backend);
        if fired {
            render.clear_needs_render();
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ActivationContext, Component};
    use crate::render::contribution::{DomContribution, GlContribution, GlRenderEntry, GlStage};
    use crate::render::gl_composer::MeshDraw;
    use crate::render::vnode::VirtualNode;
    use crate::viewer::testing::{RecordingDom, RecordingGl, settle, test_viewer};

    /// Publishes one fixed vnode and one background GL entry per camera tick.
    struct BlockComponent;

    impl Component for BlockComponent {
        const NAME: &'static str = "block";
        type Config = ();

        fn activate(&mut self, ctx: &ActivationContext<()>) {
            let services = Arc::clone(&ctx.services);
            ctx.subscriptions.spawn(async move {
                let mut camera_rx = services.render.camera_stream();
                loop {
                    let camera = *camera_rx.borrow_and_update();
                    services.render.publish_dom_fixed(DomContribution {
                        name: BlockComponent::NAME,
                        vnode: Some(VirtualNode::new("div").class("block")),
                    });
                    services.render.publish_gl(GlContribution {
                        name: BlockComponent::NAME,
                        entry: Some(GlRenderEntry {
                            frame_id: camera.frame_id,
                            needs_render: false,
                            stage: GlStage::Background,
                            render: Arc::new(|_, backend| {
                                backend.draw_mesh(&MeshDraw {
                                    texture: None,
                                    mesh: None,
                                    transform: Mat4::IDENTITY,
                                    label: BlockComponent::NAME,
                                });
                            }),
                        }),
                    });
                    if camera_rx.changed().await.is_err() {
                        break;
                    }
                }
            });
        }

        fn deactivate(&mut self) {}
    }

    #[tokio::test]
    async fn components_render_through_the_frame_driver() {
        let (mut viewer, _transport, _api) = test_viewer();
        let mut dom = RecordingDom::default();
        let mut gl = RecordingGl::default();

        viewer.registry().register(BlockComponent);
        viewer.registry().activate("block");
        settle().await;

        viewer.tick(true, Mat4::IDENTITY);
        settle().await;

        assert!(viewer.render_frame(&mut dom, &mut gl));
        let fixed = dom.patches.last().unwrap();
        assert_eq!(fixed.children[0].classes, vec!["block".to_string()]);
        assert_eq!(gl.ops, vec!["clear-color", "draw:block", "clear-depth"]);

        // same frame again: nothing dirty, no second composite
        assert!(!viewer.render_frame(&mut dom, &mut gl));
    }

    #[tokio::test]
    async fn deactivation_clears_the_composed_output() {
        let (mut viewer, _transport, _api) = test_viewer();
        let mut dom = RecordingDom::default();
        let mut gl = RecordingGl::default();

        viewer.registry().register(BlockComponent);
        viewer.registry().activate("block");
        settle().await;
        viewer.tick(true, Mat4::IDENTITY);
        settle().await;
        viewer.render_frame(&mut dom, &mut gl);

        viewer.registry().deactivate("block");
        settle().await;

        // the removal erases the DOM row and drives one clear-only composite
        assert!(viewer.render_frame(&mut dom, &mut gl));
        assert!(dom.patches.last().unwrap().children.is_empty());
        assert_eq!(&gl.ops[3..], ["clear-color", "clear-depth"]);
    }

    #[tokio::test]
    async fn the_adaptive_channel_follows_viewport_aspect_and_mode() {
        let (mut viewer, _transport, _api) = test_viewer();
        let mut dom = RecordingDom::default();
        let mut gl = RecordingGl::default();

        viewer.set_render_mode(RenderMode::Letterbox);
        viewer.set_viewport_size(ViewportSize { width: 100, height: 100 });
        viewer.services().render.set_image_aspect(2.0);
        viewer
            .services()
            .render
            .publish_dom_adaptive(DomContribution {
                name: "cover",
                vnode: Some(VirtualNode::new("div").class("cover")),
            });

        viewer.render_frame(&mut dom, &mut gl);

        let adaptive = dom.patches.last().unwrap();
        assert_eq!(adaptive.classes, vec!["dom-adaptive".to_string()]);
        assert!(adaptive.attributes[0].1.contains("top: 25px"));

        // switching the mode flips the offset and re-patches
        viewer.set_render_mode(RenderMode::Fill);
        viewer.render_frame(&mut dom, &mut gl);
        assert!(dom.patches.last().unwrap().attributes[0].1.contains("left: -50px"));
    }

    #[tokio::test]
    async fn a_resize_forces_a_composite_without_camera_motion() {
        let (mut viewer, _transport, _api) = test_viewer();
        let mut dom = RecordingDom::default();
        let mut gl = RecordingGl::default();

        viewer.registry().register(BlockComponent);
        viewer.registry().activate("block");
        settle().await;
        viewer.tick(true, Mat4::IDENTITY);
        settle().await;
        assert!(viewer.render_frame(&mut dom, &mut gl));

        viewer.set_viewport_size(ViewportSize { width: 640, height: 480 });
        assert!(viewer.render_frame(&mut dom, &mut gl));

        // the flag was consumed by the fire
        assert!(!viewer.render_frame(&mut dom, &mut gl));
    }
}

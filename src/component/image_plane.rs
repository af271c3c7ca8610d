use crate::component::{ActivationContext, Component};
use crate::graph::node_cache::CachedImage;
use crate::render::contribution::{GlContribution, GlRenderEntry, GlStage};
use crate::render::gl_composer::MeshDraw;
use crate::viewer::Services;
use std::sync::Arc;
use tokio::sync::watch;

/// Draws the current node's image plane as the GL background. Re-submits its
/// entry with the current frame id on every camera tick and flags a render
/// need whenever the node or its installed image changes.
pub struct ImagePlaneComponent;

impl Component for ImagePlaneComponent {
    const NAME: &'static str = "image_plane";
    type Config = ();

    fn activate(&mut self, ctx: &ActivationContext<()>) {
        let services = Arc::clone(&ctx.services);
        ctx.subscriptions.spawn(run(services));
    }

    fn deactivate(&mut self) {}
}

type ImageStream = watch::Receiver<Option<Arc<CachedImage>>>;

async fn run(services: Arc<Services>) {
    let mut camera_rx = services.render.camera_stream();
    let mut node_rx = services.state.current_node_stream();
    let mut image_rx = image_stream(&services, node_rx.borrow_and_update().as_deref());
    let mut dirty = true;

    loop {
        submit(&services, dirty);
        dirty = false;

        tokio::select! {
            changed = camera_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // the node's cache may have come into existence since
                if image_rx.is_none() {
                    image_rx = image_stream(&services, services.state.current_node().as_deref());
                    dirty = image_rx.is_some();
                }
            }
            changed = node_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                image_rx = image_stream(&services, node_rx.borrow_and_update().as_deref());
                dirty = true;
            }
            alive = image_changed(&mut image_rx) => {
                if !alive {
                    // the cache was disposed, its stream closed
                    image_rx = None;
                }
                dirty = true;
            }
        }
    }
}

fn image_stream(services: &Services, key: Option<&str>) -> Option<ImageStream> {
    key.and_then(|key| services.graph.peek(key))
        .map(|cache| cache.image_stream())
}

async fn image_changed(stream: &mut Option<ImageStream>) -> bool {
    match stream {
        Some(receiver) => receiver.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

fn submit(services: &Services, dirty: bool) {
    let camera = services.render.camera();
    let entry = services
        .state
        .current_node()
        .and_then(|key| services.graph.peek(&key))
        .map(|cache| {
            let image = cache.image();
            if let Some(image) = &image {
                if image.height > 0 {
                    services
                        .render
                        .set_image_aspect(image.width as f32 / image.height as f32);
                }
            }
            let texture = image.map(|image| image.texture);
            let mesh = cache.mesh();
            GlRenderEntry {
                frame_id: camera.frame_id,
                needs_render: dirty,
                stage: GlStage::Background,
                render: Arc::new(move |camera, backend| {
                    backend.draw_mesh(&MeshDraw {
                        texture,
                        mesh: mesh.clone(),
                        transform: camera.perspective,
                        label: ImagePlaneComponent::NAME,
                    });
                }),
            }
        });
    services.render.publish_gl(GlContribution {
        name: ImagePlaneComponent::NAME,
        entry,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ImageSize;
    use crate::component::ComponentHost;
    use crate::graph::provider::{NodeInfo, StaticGraphSource};
    use crate::io::testing::{ScriptedResponse, jpeg_fixture};
    use crate::render::gl_composer::GlComposer;
    use crate::viewer::testing::{RecordingGl, settle, test_services_with};
    use glam::Mat4;

    fn single_node_source() -> StaticGraphSource {
        let mut source = StaticGraphSource::default();
        source.insert_node("k0", NodeInfo { pano: false, merged: false });
        source
    }

    #[tokio::test]
    async fn renders_the_current_node_into_the_background() {
        let (services, mut queues, transport, api) = test_services_with(single_node_source());
        transport.script(
            &api.image_url("k0", ImageSize::Size640),
            ScriptedResponse::ok(jpeg_fixture(640, 480)),
        );

        services.state.set_current_node("k0");
        let mut progress = services.graph.cache_node_assets("k0").unwrap();
        progress.wait_for(|progress| progress.is_terminal()).await.unwrap();

        let mut host = ComponentHost::new(ImagePlaneComponent, Arc::clone(&services));
        host.activate();
        settle().await;
        services.render.advance_camera(true, Mat4::IDENTITY);
        settle().await;

        let mut composer = GlComposer::default();
        while let Ok(contribution) = queues.gl.try_recv() {
            composer.apply(contribution);
        }
        let mut gl = RecordingGl::default();
        assert!(composer.compose(&services.render.camera(), false, &mut gl));
        assert_eq!(gl.ops, vec!["clear-color", "draw:image_plane", "clear-depth"]);
        assert_eq!(services.render.image_aspect(), Some(640.0 / 480.0));
    }

    #[tokio::test]
    async fn image_installs_flag_a_render_need() {
        let (services, mut queues, transport, api) = test_services_with(single_node_source());
        transport.script(
            &api.image_url("k0", ImageSize::Size640),
            ScriptedResponse::ok(jpeg_fixture(640, 480)),
        );
        transport.script(
            &api.image_url("k0", ImageSize::Size1024),
            ScriptedResponse::ok(jpeg_fixture(1024, 768)),
        );

        services.state.set_current_node("k0");
        let mut progress = services.graph.cache_node_assets("k0").unwrap();
        progress.wait_for(|progress| progress.is_terminal()).await.unwrap();

        let mut host = ComponentHost::new(ImagePlaneComponent, Arc::clone(&services));
        host.activate();
        settle().await;

        // consume the activation submission
        let mut composer = GlComposer::default();
        while let Ok(contribution) = queues.gl.try_recv() {
            composer.apply(contribution);
        }
        let mut gl = RecordingGl::default();
        assert!(composer.compose(&services.render.camera(), false, &mut gl));

        // a resolution upgrade republishes with needs_render set, so the
        // composite fires again without any camera motion
        services
            .graph
            .node_cache("k0")
            .cache_image(ImageSize::Size1024)
            .await
            .unwrap();
        settle().await;

        while let Ok(contribution) = queues.gl.try_recv() {
            composer.apply(contribution);
        }
        assert!(composer.compose(&services.render.camera(), false, &mut gl));
        assert_eq!(services.render.image_aspect(), Some(1024.0 / 768.0));
    }

    #[tokio::test]
    async fn without_a_current_node_the_contribution_is_withdrawn() {
        let (services, mut queues, _transport, _api) = test_services_with(single_node_source());

        let mut host = ComponentHost::new(ImagePlaneComponent, Arc::clone(&services));
        host.activate();
        settle().await;

        let contribution = queues.gl.try_recv().unwrap();
        assert_eq!(contribution.name, "image_plane");
        assert!(contribution.entry.is_none());
    }
}

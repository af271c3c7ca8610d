use crate::component::{ActivationContext, Component};
use crate::render::contribution::DomContribution;
use crate::render::vnode::VirtualNode;
use crate::viewer::{MouseEvent, Services};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Full-size cover over the adaptive DOM channel. Visible whenever a node is
/// current; a click hides it until the next navigation shows it again.
pub struct CoverComponent;

impl Component for CoverComponent {
    const NAME: &'static str = "cover";
    type Config = ();

    fn activate(&mut self, ctx: &ActivationContext<()>) {
        let services = Arc::clone(&ctx.services);
        ctx.subscriptions.spawn(run(services));
    }

    fn deactivate(&mut self) {}
}

async fn run(services: Arc<Services>) {
    let mut node_rx = services.state.current_node_stream();
    let mut mouse_rx = services.mouse.subscribe();
    let mut visible = true;

    loop {
        submit(&services, visible, node_rx.borrow_and_update().as_deref());

        tokio::select! {
            changed = node_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                visible = true;
            }
            event = mouse_rx.recv() => {
                match event {
                    Ok(MouseEvent::Click { .. }) => visible = false,
                    Ok(MouseEvent::Move { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::trace!("Cover skipped {} mouse events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn submit(services: &Services, visible: bool, key: Option<&str>) {
    let vnode = match (visible, key) {
        (true, Some(key)) => Some(
            VirtualNode::new("div")
                .class("cover")
                .attribute("data-key", key)
                .child(VirtualNode::new("span").class("cover-button").text("Explore")),
        ),
        _ => None,
    };
    services.render.publish_dom_adaptive(DomContribution {
        name: CoverComponent::NAME,
        vnode,
    });
}

use crate::viewer::Services;
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub mod cache;
pub mod cover;
pub mod image_plane;
pub mod navigation;

/// Per-component configuration. `merge` is pure and shallow: a `Some` field
/// in the patch overwrites, a `None` field leaves the current value alone.
pub trait ComponentConfig: Clone + Default + Send + Sync + 'static {
    type Patch;

    fn merge(&self, patch: Self::Patch) -> Self;
}

/// Components without options use the unit config.
impl ComponentConfig for () {
    type Patch = ();

    fn merge(&self, _patch: ()) -> Self {}
}

/// What a component receives for the duration of one activation cycle.
pub struct ActivationContext<C: ComponentConfig> {
    pub services: Arc<Services>,
    /// Replays the seeded configuration and every later `configure` merge.
    pub config: watch::Receiver<C>,
    pub subscriptions: Arc<Subscriptions>,
}

/// A UI component as the lifecycle sees it. The hooks run inside
/// `ComponentHost`, which provides the idempotence and cleanup guarantees;
/// implementations only subscribe in `activate` and may release anything the
/// subscription registrar does not cover in `deactivate`.
pub trait Component: Send + 'static {
    const NAME: &'static str;
    type Config: ComponentConfig;

    fn activate(&mut self, ctx: &ActivationContext<Self::Config>);
    fn deactivate(&mut self);
}

/// Registrar for the tasks a component spawns while active. Everything
/// registered here is aborted on `clear`, so no subscription can outlive the
/// activation cycle it was created in.
#[derive(Default)]
pub struct Subscriptions {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Subscriptions {
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles
            .lock()
            .expect("subscription list poisoned")
            .push(tokio::spawn(future));
    }

    pub fn clear(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .expect("subscription list poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.handles.lock().expect("subscription list poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Drives one component through `Inactive -> Active -> Inactive`.
///
/// Both transitions are idempotent. Activation seeds a fresh config stream
/// with the last-given configuration; deactivation removes the component's
/// named contribution from every render channel and aborts every
/// subscription before the hook runs.
pub struct ComponentHost<C: Component> {
    component: C,
    services: Arc<Services>,
    config: C::Config,
    config_feed: Option<watch::Sender<C::Config>>,
    subscriptions: Arc<Subscriptions>,
    active: bool,
}

impl<C: Component> ComponentHost<C> {
    pub fn new(component: C, services: Arc<Services>) -> Self {
        Self {
            component,
            services,
            config: C::Config::default(),
            config_feed: None,
            subscriptions: Arc::new(Subscriptions::default()),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        log::debug!("Activating component {}", C::NAME);
        self.active = true;

        let (config_tx, config_rx) = watch::channel(self.config.clone());
        self.config_feed = Some(config_tx);

        let ctx = ActivationContext {
            services: Arc::clone(&self.services),
            config: config_rx,
            subscriptions: Arc::clone(&self.subscriptions),
        };
        self.component.activate(&ctx);
    }

    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        log::debug!("Deactivating component {}", C::NAME);
        self.active = false;

        self.services.render.remove_contribution(C::NAME);
        self.subscriptions.clear();
        self.config_feed = None;
        self.component.deactivate();
    }

    /// Merges the patch into the retained configuration. While active the
    /// result is republished immediately; while inactive it seeds the next
    /// activation.
    pub fn configure(&mut self, patch: <C::Config as ComponentConfig>::Patch) {
        self.config = self.config.merge(patch);
        if let Some(feed) = &self.config_feed {
            feed.send_replace(self.config.clone());
        }
    }
}

/// Object-safe view of a host, so the registry can hold a mixed bag.
trait ComponentEntry: Send {
    fn name(&self) -> &'static str;
    fn is_active(&self) -> bool;
    fn activate(&mut self);
    fn deactivate(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ComponentEntry for ComponentHost<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn is_active(&self) -> bool {
        self.is_active()
    }

    fn activate(&mut self) {
        self.activate();
    }

    fn deactivate(&mut self) {
        self.deactivate();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Explicit, instance-owned component registry. Nothing is registered
/// implicitly and construction order carries no meaning.
pub struct ComponentRegistry {
    services: Arc<Services>,
    components: Vec<Box<dyn ComponentEntry>>,
}

impl ComponentRegistry {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            components: Vec::new(),
        }
    }

    pub fn register<C: Component>(&mut self, component: C) {
        if self.components.iter().any(|entry| entry.name() == C::NAME) {
            log::warn!("Component {} is already registered, ignoring the duplicate", C::NAME);
            return;
        }
        self.components
            .push(Box::new(ComponentHost::new(component, Arc::clone(&self.services))));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.components.iter().any(|entry| entry.name() == name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.components
            .iter()
            .any(|entry| entry.name() == name && entry.is_active())
    }

    pub fn activate(&mut self, name: &str) -> bool {
        self.with_entry(name, |entry| entry.activate())
    }

    pub fn deactivate(&mut self, name: &str) -> bool {
        self.with_entry(name, |entry| entry.deactivate())
    }

    pub fn activate_all(&mut self) {
        for entry in &mut self.components {
            entry.activate();
        }
    }

    pub fn deactivate_all(&mut self) {
        for entry in &mut self.components {
            entry.deactivate();
        }
    }

    /// Typed configuration by component type; the patch reaches the host
    /// whether or not the component is currently active.
    pub fn configure<C: Component>(&mut self, patch: <C::Config as ComponentConfig>::Patch) -> bool {
        let Some(entry) = self
            .components
            .iter_mut()
            .find(|entry| entry.name() == C::NAME)
        else {
            log::warn!("No component registered under {}", C::NAME);
            return false;
        };
        match entry.as_any_mut().downcast_mut::<ComponentHost<C>>() {
            Some(host) => {
                host.configure(patch);
                true
            }
            None => {
                log::warn!("Component {} is registered with a different type", C::NAME);
                false
            }
        }
    }

    fn with_entry(&mut self, name: &str, action: impl FnOnce(&mut dyn ComponentEntry)) -> bool {
        match self
            .components
            .iter_mut()
            .find(|entry| entry.name() == name)
        {
            Some(entry) => {
                action(entry.as_mut());
                true
            }
            None => {
                log::warn!("No component registered under {}", name);
                false
            }
        }
    }
}

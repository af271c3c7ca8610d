use crate::render::adaptive::RenderOffset;
use crate::render::contribution::DomContribution;
use crate::render::vnode::VirtualNode;

/// Applies the difference between two virtual trees to the real DOM. The
/// diffing itself lives with the embedding.
pub trait DomBackend {
    fn patch(&mut self, previous: &VirtualNode, next: &VirtualNode);
}

/// Accumulates named vnode contributions into one insertion-ordered tree and
/// patches it through the backend at most once per dirty frame.
///
/// Removal deletes the row; a later upsert of the same name lands at the
/// back. The adaptive flavor additionally carries a pixel offset that marks
/// the channel dirty whenever it changes.
pub struct DomComposer {
    container_class: &'static str,
    offset: Option<RenderOffset>,
    entries: Vec<(&'static str, VirtualNode)>,
    current: VirtualNode,
    dirty: bool,
}

impl DomComposer {
    pub fn fixed(container_class: &'static str) -> Self {
        Self::new(container_class, None)
    }

    pub fn adaptive(container_class: &'static str) -> Self {
        Self::new(container_class, Some(RenderOffset::default()))
    }

    fn new(container_class: &'static str, offset: Option<RenderOffset>) -> Self {
        let mut composer = Self {
            container_class,
            offset,
            entries: Vec::new(),
            current: VirtualNode::default(),
            dirty: false,
        };
        composer.current = composer.render_tree();
        composer
    }

    pub fn apply(&mut self, contribution: DomContribution) {
        match contribution.vnode {
            Some(vnode) => {
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .find(|(name, _)| *name == contribution.name)
                {
                    if entry.1 == vnode {
                        return;
                    }
                    entry.1 = vnode;
                } else {
                    self.entries.push((contribution.name, vnode));
                }
                self.dirty = true;
            }
            None => {
                let before = self.entries.len();
                self.entries.retain(|(name, _)| *name != contribution.name);
                if self.entries.len() != before {
                    self.dirty = true;
                }
            }
        }
    }

    /// Only meaningful on the adaptive flavor; the fixed one has no offset.
    pub fn set_offset(&mut self, offset: RenderOffset) {
        if self.offset.is_some() && self.offset != Some(offset) {
            self.offset = Some(offset);
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn compose(&mut self, backend: &mut dyn DomBackend) {
        if !self.dirty {
            return;
        }
        let next = self.render_tree();
        backend.patch(&self.current, &next);
        self.current = next;
        self.dirty = false;
    }

    fn render_tree(&self) -> VirtualNode {
        let mut container = VirtualNode::new("div").class(self.container_class);
        if let Some(offset) = self.offset {
            container = container.attribute(
                "style",
                &format!(
                    "top: {:.0}px; bottom: {:.0}px; left: {:.0}px; right: {:.0}px;",
                    offset.top, offset.bottom, offset.left, offset.right
                ),
            );
        }
        self.entries
            .iter()
            .fold(container, |parent, (_, vnode)| parent.child(vnode.clone()))
    }
}

/// Plain virtual DOM tree handed to the embedding's patcher. Kept as a value
/// type so composition never touches a real DOM.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VirtualNode {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<VirtualNode>,
}

impl VirtualNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: VirtualNode) -> Self {
        self.children.push(child);
        self
    }
}

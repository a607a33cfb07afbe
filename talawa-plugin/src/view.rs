//! Framework-neutral view model
//!
//! Plugin components render to an [`Element`] tree instead of driving a UI
//! toolkit directly. The host turns the tree into whatever surface it owns;
//! tests inspect it with [`Element::text_content`] and [`Element::find_all`].

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::PluginResult;

/// Props handed to a component
pub type Props = serde_json::Map<String, Value>;

/// Inline style declarations, `property -> value`
pub type Style = BTreeMap<String, String>;

/// Rendered view node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    /// Renders nothing
    Empty,
    /// Text leaf
    Text { text: String },
    /// Tagged node with children
    Node(Node),
}

/// Tagged view node
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Node {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style: Style,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Element>,
}

impl Element {
    /// Text leaf
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Empty node with the given tag
    pub fn node(tag: impl Into<String>) -> Self {
        Self::Node(Node {
            tag: tag.into(),
            ..Default::default()
        })
    }

    /// `div` wrapping a single text child
    pub fn div_text(text: impl Into<String>) -> Self {
        Self::node("div").with_child(Self::text(text))
    }

    pub fn with_key(self, key: impl Into<String>) -> Self {
        self.map_node(|node| node.key = Some(key.into()))
    }

    pub fn with_class(self, class_name: Option<String>) -> Self {
        self.map_node(|node| node.class_name = class_name)
    }

    pub fn with_style(self, style: Style) -> Self {
        self.map_node(|node| node.style = style)
    }

    pub fn with_attr(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.map_node(|node| {
            node.attributes.insert(name.into(), value.into());
        })
    }

    pub fn with_child(self, child: Element) -> Self {
        self.map_node(|node| node.children.push(child))
    }

    pub fn with_children(self, children: impl IntoIterator<Item = Element>) -> Self {
        self.map_node(|node| node.children.extend(children))
    }

    fn map_node(mut self, f: impl FnOnce(&mut Node)) -> Self {
        if let Self::Node(node) = &mut self {
            f(node);
        }
        self
    }

    /// Node data, if this is a tagged node
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Tag of this node
    pub fn tag(&self) -> Option<&str> {
        self.as_node().map(|node| node.tag.as_str())
    }

    /// Key of this node
    pub fn key(&self) -> Option<&str> {
        self.as_node().and_then(|node| node.key.as_deref())
    }

    /// Direct children
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Node(node) => &node.children,
            _ => &[],
        }
    }

    /// Concatenated text of the whole subtree, one line per text leaf
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join("\n")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        match self {
            Self::Empty => {}
            Self::Text { text } => parts.push(text),
            Self::Node(node) => {
                for child in &node.children {
                    child.collect_text(parts);
                }
            }
        }
    }

    /// Whether any text leaf in the subtree contains `needle`
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Self::Empty => false,
            Self::Text { text } => text.contains(needle),
            Self::Node(node) => node.children.iter().any(|c| c.contains_text(needle)),
        }
    }

    /// All nodes in the subtree (self included) carrying the given attribute value
    pub fn find_all<'a>(&'a self, attribute: &str, value: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_matching(attribute, value, &mut found);
        found
    }

    fn collect_matching<'a>(&'a self, attribute: &str, value: &str, found: &mut Vec<&'a Element>) {
        if let Self::Node(node) = self {
            if node.attributes.get(attribute).map(String::as_str) == Some(value) {
                found.push(self);
            }
            for child in &node.children {
                child.collect_matching(attribute, value, found);
            }
        }
    }
}

/// A renderable plugin export
pub trait Component: Send + Sync + fmt::Debug {
    /// Render with the given props
    fn render(&self, props: &Props) -> PluginResult<Element>;

    /// Display name used in logs
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared component handle
pub type ComponentRef = Arc<dyn Component>;

/// Component backed by a closure
pub struct FnComponent<F> {
    name: String,
    render: F,
}

impl<F> fmt::Debug for FnComponent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent").field("name", &self.name).finish()
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&Props) -> PluginResult<Element> + Send + Sync,
{
    fn render(&self, props: &Props) -> PluginResult<Element> {
        (self.render)(props)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a shared component
pub fn component_fn<F>(name: impl Into<String>, render: F) -> ComponentRef
where
    F: Fn(&Props) -> PluginResult<Element> + Send + Sync + 'static,
{
    Arc::new(FnComponent {
        name: name.into(),
        render,
    })
}

/// Component rendering fixed text inside a `div`
pub fn text_component(name: impl Into<String>, text: impl Into<String>) -> ComponentRef {
    let text = text.into();
    component_fn(name, move |_| Ok(Element::div_text(text.clone())))
}

/// Stringify a prop value for display; strings are shown without quotes
pub fn prop_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered attribute map of an element
pub type Attributes = IndexMap<String, PropertyValue>;

/// Start position of a node in its source document (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Value of a semantic-tree attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    /// Multi-valued attribute (`class`, `rel`, `accept`, ...)
    List(Vec<String>),
}

impl PropertyValue {
    /// Plain string form, lists joined by a single space
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::List(items) => items.join(" "),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

/// A node of the framework-independent semantic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SemanticNode {
    Root(Root),
    Element(Element),
    Text(Text),
    RawMarkup(RawMarkup),
    ExpressionFragment(ExpressionFragment),
}

/// Document root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(default)]
    pub children: Vec<SemanticNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Element with a tag name, attributes and children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<SemanticNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Plain text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Raw HTML kept verbatim by the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMarkup {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Where an embedded expression appeared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    /// Block-level `{expression}`
    Flow,
    /// Inline `{expression}`
    Text,
    /// Module-level import/export program
    Esm,
}

/// Source text of an embedded expression with its optional parsed AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estree: Option<serde_json::Value>,
}

/// Embedded expression, only renderable through an evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionFragment {
    pub kind: ExpressionKind,
    pub expression: Expression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl SemanticNode {
    pub fn root(children: Vec<SemanticNode>) -> Self {
        SemanticNode::Root(Root {
            children,
            position: None,
        })
    }

    pub fn element(tag: impl Into<String>) -> Self {
        SemanticNode::Element(Element {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
            position: None,
        })
    }

    pub fn text(value: impl Into<String>) -> Self {
        SemanticNode::Text(Text {
            value: value.into(),
            position: None,
        })
    }

    pub fn raw(value: impl Into<String>) -> Self {
        SemanticNode::RawMarkup(RawMarkup {
            value: value.into(),
            position: None,
        })
    }

    pub fn expression(kind: ExpressionKind, value: impl Into<String>) -> Self {
        SemanticNode::ExpressionFragment(ExpressionFragment {
            kind,
            expression: Expression {
                value: value.into(),
                estree: None,
            },
            position: None,
        })
    }

    /// Builder-style attribute setter; no-op for non-element nodes
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        if let SemanticNode::Element(el) = &mut self {
            el.attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Builder-style children setter; no-op for leaf nodes
    pub fn with_children(mut self, children: Vec<SemanticNode>) -> Self {
        if let Some(slot) = self.children_mut() {
            *slot = children;
        }
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.set_position(Some(position));
        self
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            SemanticNode::Root(n) => n.position,
            SemanticNode::Element(n) => n.position,
            SemanticNode::Text(n) => n.position,
            SemanticNode::RawMarkup(n) => n.position,
            SemanticNode::ExpressionFragment(n) => n.position,
        }
    }

    pub fn set_position(&mut self, position: Option<Position>) {
        match self {
            SemanticNode::Root(n) => n.position = position,
            SemanticNode::Element(n) => n.position = position,
            SemanticNode::Text(n) => n.position = position,
            SemanticNode::RawMarkup(n) => n.position = position,
            SemanticNode::ExpressionFragment(n) => n.position = position,
        }
    }

    /// Tag name for elements
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            SemanticNode::Element(el) => Some(&el.tag),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&PropertyValue> {
        match self {
            SemanticNode::Element(el) => el.attributes.get(name),
            _ => None,
        }
    }

    pub fn children(&self) -> &[SemanticNode] {
        match self {
            SemanticNode::Root(n) => &n.children,
            SemanticNode::Element(n) => &n.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<SemanticNode>> {
        match self {
            SemanticNode::Root(n) => Some(&mut n.children),
            SemanticNode::Element(n) => Some(&mut n.children),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, including the node itself
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(SemanticNode::node_count).sum::<usize>()
    }

    /// Concatenated text content of the subtree
    pub fn text_content(&self) -> String {
        match self {
            SemanticNode::Text(t) => t.value.clone(),
            _ => self.children().iter().map(SemanticNode::text_content).collect(),
        }
    }

    /// Short name of the node kind, used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            SemanticNode::Root(_) => "root",
            SemanticNode::Element(_) => "element",
            SemanticNode::Text(_) => "text",
            SemanticNode::RawMarkup(_) => "raw",
            SemanticNode::ExpressionFragment(_) => "expression",
        }
    }
}

/// Path of the `index`-th child of the node at `parent`
pub fn child_path(parent: &str, index: usize) -> String {
    format!("{}/{}", parent, index)
}

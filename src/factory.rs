//! The renderer-factory seam.
//!
//! The converter never names a UI framework: every element it produces goes
//! through an [`ElementFactory`]. [`DescriptorFactory`] is the reference
//! implementation, building plain serializable [`ElementDescriptor`] trees.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::node::{Position, PropertyValue, SemanticNode};
use crate::style::StyleMap;

/// What kind of element the renderer should create
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum ElementType {
    /// Groups children without a wrapper element
    Fragment,
    /// Built-in element such as `p` or `svg`
    Intrinsic(String),
    /// Caller-registered component, resolved by the factory
    Component(String),
}

impl ElementType {
    pub fn name(&self) -> &str {
        match self {
            ElementType::Fragment => "Fragment",
            ElementType::Intrinsic(name) | ElementType::Component(name) => name,
        }
    }
}

/// Child of a produced element: bare text or another element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child<E> {
    Text(String),
    Element(E),
}

impl<E> Child<E> {
    pub fn as_element(&self) -> Option<&E> {
        match self {
            Child::Element(e) => Some(e),
            Child::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Child::Text(t) => Some(t),
            Child::Element(_) => None,
        }
    }
}

/// Property bag handed to the factory
#[derive(Debug, Clone, PartialEq)]
pub struct Props<E> {
    pub attributes: IndexMap<String, PropertyValue>,
    pub style: Option<StyleMap>,
    pub children: Vec<Child<E>>,
    /// Source node, passed to named components when `passNode` is on
    pub node: Option<SemanticNode>,
}

impl<E> Default for Props<E> {
    fn default() -> Self {
        Self {
            attributes: IndexMap::new(),
            style: None,
            children: Vec::new(),
            node: None,
        }
    }
}

/// Source location attached to elements in development mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    /// 0-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<usize>,
}

impl SourceInfo {
    pub fn new(file_name: Option<String>, position: Option<Position>) -> Self {
        Self {
            file_name,
            line_number: position.map(|p| p.line),
            column_number: position.map(|p| p.column.saturating_sub(1)),
        }
    }
}

/// Capability that turns `(type, props, key)` into a concrete UI element.
pub trait ElementFactory {
    type Element: Clone;

    /// Create an element without a key
    fn create(&self, kind: ElementType, props: Props<Self::Element>) -> Self::Element;

    /// Create an element with an explicit reconciliation key
    fn create_keyed(&self, kind: ElementType, props: Props<Self::Element>, key: &str) -> Self::Element;

    /// Create an element annotated with its source location.
    ///
    /// Factories without development support fall back to the production calls.
    fn create_dev(
        &self,
        kind: ElementType,
        props: Props<Self::Element>,
        key: Option<&str>,
        _source: &SourceInfo,
    ) -> Self::Element {
        match key {
            Some(key) => self.create_keyed(kind, props, key),
            None => self.create(kind, props),
        }
    }
}

impl<F: ElementFactory + ?Sized> ElementFactory for &F {
    type Element = F::Element;

    fn create(&self, kind: ElementType, props: Props<Self::Element>) -> Self::Element {
        (**self).create(kind, props)
    }

    fn create_keyed(&self, kind: ElementType, props: Props<Self::Element>, key: &str) -> Self::Element {
        (**self).create_keyed(kind, props, key)
    }

    fn create_dev(
        &self,
        kind: ElementType,
        props: Props<Self::Element>,
        key: Option<&str>,
        source: &SourceInfo,
    ) -> Self::Element {
        (**self).create_dev(kind, props, key, source)
    }
}

/// Which factory entry point the converter uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateMode {
    Production,
    Development { file_path: Option<String> },
}

impl CreateMode {
    pub fn new(development: bool, file_path: Option<String>) -> Self {
        if development {
            CreateMode::Development { file_path }
        } else {
            CreateMode::Production
        }
    }

    pub fn create<F: ElementFactory>(
        &self,
        factory: &F,
        node: &SemanticNode,
        kind: ElementType,
        props: Props<F::Element>,
        key: Option<&str>,
    ) -> F::Element {
        match self {
            CreateMode::Production => match key {
                Some(key) => factory.create_keyed(kind, props, key),
                None => factory.create(kind, props),
            },
            CreateMode::Development { file_path } => {
                let source = SourceInfo::new(file_path.clone(), node.position());
                factory.create_dev(kind, props, key, &source)
            }
        }
    }
}

// ─── Reference factory ───────────────────────────────────────────────────────

/// Plain `(type, props, children, key)` element description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDescriptor {
    #[serde(rename = "type")]
    pub kind: ElementType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub props: IndexMap<String, PropertyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Child<ElementDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<SemanticNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl ElementDescriptor {
    pub fn tag(&self) -> &str {
        self.kind.name()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.children.iter().filter_map(Child::as_element)
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .map(|child| match child {
                Child::Text(t) => t.clone(),
                Child::Element(e) => e.text_content(),
            })
            .collect()
    }
}

/// Factory producing [`ElementDescriptor`] trees
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorFactory;

impl DescriptorFactory {
    fn build(kind: ElementType, props: Props<ElementDescriptor>, key: Option<&str>, source: Option<SourceInfo>) -> ElementDescriptor {
        ElementDescriptor {
            kind,
            key: key.map(str::to_string),
            props: props.attributes,
            style: props.style,
            children: props.children,
            node: props.node,
            source,
        }
    }
}

impl ElementFactory for DescriptorFactory {
    type Element = ElementDescriptor;

    fn create(&self, kind: ElementType, props: Props<ElementDescriptor>) -> ElementDescriptor {
        Self::build(kind, props, None, None)
    }

    fn create_keyed(&self, kind: ElementType, props: Props<ElementDescriptor>, key: &str) -> ElementDescriptor {
        Self::build(kind, props, Some(key), None)
    }

    fn create_dev(
        &self,
        kind: ElementType,
        props: Props<ElementDescriptor>,
        key: Option<&str>,
        source: &SourceInfo,
    ) -> ElementDescriptor {
        Self::build(kind, props, key, Some(source.clone()))
    }
}

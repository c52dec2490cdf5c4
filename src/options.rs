use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::MARKDOWN_CACHE_CAPACITY;
use crate::error::{MarkdownError, MarkdownResult};
use crate::factory::ElementType;
use crate::schema::{AttributeNameCase, Space};
use crate::style::StylePropertyNameCase;

/// How a cache snapshot is compared with the node now at its path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityMode {
    /// Deep structural comparison of the whole subtree
    #[default]
    Structural,
    /// Compare 64-bit subtree fingerprints computed once per pass.
    ///
    /// Cheaper on large unchanged subtrees but may reuse a stale result on a
    /// hash collision.
    Fingerprint,
}

/// Replacement for an element in the `components` map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentOverride {
    /// Render as another built-in element (`h1: h2`)
    Tag(String),
    /// Render through a named component (`a: { component: ExternalLink }`)
    Component { component: String },
}

impl ComponentOverride {
    pub fn element_type(&self) -> ElementType {
        match self {
            ComponentOverride::Tag(tag) => ElementType::Intrinsic(tag.clone()),
            ComponentOverride::Component { component } => ElementType::Component(component.clone()),
        }
    }
}

/// Options of the tree → element conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeOptions {
    pub components: HashMap<String, ComponentOverride>,
    /// Give every element child a `"{tag}-{n}"` key
    pub pass_keys: bool,
    /// Hand the source node to named components
    pub pass_node: bool,
    /// Drop unparsable `style` attributes instead of failing the pass
    pub ignore_invalid_style: bool,
    pub element_attribute_name_case: AttributeNameCase,
    pub style_property_name_case: StylePropertyNameCase,
    /// Turn `align` on `td`/`th` into a `textAlign` style
    pub table_cell_align_to_style: bool,
    /// Attribute space at the root of the tree
    pub space: Space,
    /// Use the factory's development entry point with source locations
    pub development: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub equality: EqualityMode,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
            pass_keys: true,
            pass_node: false,
            ignore_invalid_style: false,
            element_attribute_name_case: AttributeNameCase::React,
            style_property_name_case: StylePropertyNameCase::Dom,
            table_cell_align_to_style: true,
            space: Space::Html,
            development: false,
            file_path: None,
            equality: EqualityMode::Structural,
        }
    }
}

impl RuntimeOptions {
    /// Element type for `tag`, honoring the `components` map
    pub fn element_type(&self, tag: &str) -> ElementType {
        self.components
            .get(tag)
            .map(ComponentOverride::element_type)
            .unwrap_or_else(|| ElementType::Intrinsic(tag.to_string()))
    }
}

/// Configuration of an [`IncrementalMarkdown`](crate::IncrementalMarkdown) instance.
///
/// Capabilities that cannot be written down as data (element predicate, URL
/// transform, evaluator, factory, parser, transforms) are supplied through the
/// builder instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_elements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disallowed_elements: Option<Vec<String>>,
    /// Drop raw HTML instead of showing it as text
    pub skip_html: bool,
    /// Keep the children of removed elements
    pub unwrap_disallowed: bool,
    /// Reuse converted subtrees across calls
    pub enabled_cache: bool,
    pub cache_capacity: usize,
    /// Wrap the output in a `div` carrying this class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(flatten)]
    pub runtime: RuntimeOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allowed_elements: None,
            disallowed_elements: None,
            skip_html: false,
            unwrap_disallowed: false,
            enabled_cache: false,
            cache_capacity: MARKDOWN_CACHE_CAPACITY,
            class_name: None,
            runtime: RuntimeOptions::default(),
        }
    }
}

impl Options {
    pub fn from_yaml(yaml: &str) -> MarkdownResult<Self> {
        let options: Options = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json(json: &str) -> MarkdownResult<Self> {
        let options: Options = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject combinations that cannot be honored
    pub fn validate(&self) -> MarkdownResult<()> {
        if self.allowed_elements.is_some() && self.disallowed_elements.is_some() {
            return Err(MarkdownError::ConflictingElementFilters);
        }
        Ok(())
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enabled_cache = enabled;
        self
    }

    pub fn with_allowed_elements(mut self, tags: &[&str]) -> Self {
        self.allowed_elements = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_disallowed_elements(mut self, tags: &[&str]) -> Self {
        self.disallowed_elements = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

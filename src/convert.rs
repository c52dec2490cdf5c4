//! Semantic tree → UI element conversion.
//!
//! Conversion is recursive and path aware: every node is addressed by the
//! ordinal path from the root (`""`, `/0`, `/0/2`, ...). With a cache, a node
//! whose snapshot at its path is unchanged is answered from the cache without
//! descending into it, so re-converting a document that only grew at the end
//! only rebuilds the changed spine and the new suffix.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace, warn};

use crate::cache::{NodeCache, PassStats, Snapshot};
use crate::error::{Diagnostic, MarkdownResult};
use crate::factory::{Child, CreateMode, ElementFactory, ElementType, Props};
use crate::node::{child_path, Element, Expression, ExpressionKind, PropertyValue, SemanticNode};
use crate::options::{EqualityMode, RuntimeOptions};
use crate::schema::{self, Space};
use crate::style::{parse_style, StyleMap, StylePropertyNameCase};

/// Elements whose whitespace-only text children are dropped
const TABLE_ELEMENTS: &[&str] = &["table", "tbody", "tfoot", "thead", "tr"];

/// Elements whose `align` attribute becomes a text-align style
const TABLE_CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Evaluates embedded expressions into renderable children.
pub trait Evaluator<E> {
    /// Evaluate an inline or block `{expression}`
    fn evaluate_expression(&self, expression: &Expression) -> MarkdownResult<Option<Child<E>>>;

    /// Evaluate a module-level program; programs render nothing by default
    fn evaluate_program(&self, _program: &Expression) -> MarkdownResult<Option<Child<E>>> {
        Ok(None)
    }
}

/// Converts semantic trees through one factory with fixed options.
pub struct Converter<'a, F: ElementFactory> {
    factory: &'a F,
    options: &'a RuntimeOptions,
    evaluator: Option<&'a dyn Evaluator<F::Element>>,
}

impl<'a, F: ElementFactory> Converter<'a, F> {
    pub fn new(factory: &'a F, options: &'a RuntimeOptions) -> Self {
        Self {
            factory,
            options,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Option<&'a dyn Evaluator<F::Element>>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Convert `tree` into one element.
    ///
    /// With a cache, unchanged subtrees are reused and the pass's new entries
    /// are written back only if the whole pass succeeds.
    pub fn convert(
        &self,
        tree: &SemanticNode,
        cache: Option<&mut NodeCache<F::Element>>,
    ) -> MarkdownResult<(F::Element, PassStats)> {
        let cache = cache.map(|cache| {
            cache.retain_for(self.options);
            cache
        });
        let mut state = State {
            factory: self.factory,
            options: self.options,
            evaluator: self.evaluator,
            create: CreateMode::new(self.options.development, self.options.file_path.clone()),
            schema: self.options.space,
            ancestors: Vec::new(),
            fingerprints: HashMap::new(),
            pending: Vec::new(),
            stats: PassStats::default(),
            cache,
        };

        if state.cache.is_some() && self.options.equality == EqualityMode::Fingerprint {
            fingerprint(tree, "", &mut state.fingerprints);
        }

        let (result, _) = state.one(tree, "", None)?;
        let element = match result {
            Some(Child::Element(element)) => element,
            other => {
                let mut props = Props::default();
                if let Some(text) = other {
                    props.children.push(text);
                }
                state.create.create(state.factory, tree, ElementType::Fragment, props, None)
            }
        };

        state.commit();
        debug!(
            hits = state.stats.hits,
            misses = state.stats.misses,
            reused = state.stats.reused_nodes,
            converted = state.stats.converted_nodes,
            "conversion pass finished"
        );
        Ok((element, state.stats))
    }
}

/// Stateless conversion: every node is converted from scratch.
pub fn to_element_tree<F: ElementFactory>(
    tree: &SemanticNode,
    factory: &F,
    options: &RuntimeOptions,
) -> MarkdownResult<F::Element> {
    Converter::new(factory, options)
        .convert(tree, None)
        .map(|(element, _)| element)
}

/// Per-pass conversion state
struct State<'a, F: ElementFactory> {
    factory: &'a F,
    options: &'a RuntimeOptions,
    evaluator: Option<&'a dyn Evaluator<F::Element>>,
    create: CreateMode,
    schema: Space,
    /// Tag names from the root down to the element being converted
    ancestors: Vec<String>,
    fingerprints: HashMap<String, u64>,
    /// Cache writes held back until the pass succeeds
    pending: Vec<(String, Snapshot, Child<F::Element>)>,
    stats: PassStats,
    cache: Option<&'a mut NodeCache<F::Element>>,
}

impl<'a, F: ElementFactory> State<'a, F> {
    /// Convert one node. Returns the produced child (if any) and the number
    /// of semantic nodes in the subtree.
    fn one(
        &mut self,
        node: &SemanticNode,
        path: &str,
        key: Option<String>,
    ) -> MarkdownResult<(Option<Child<F::Element>>, usize)> {
        if let Some((cached, size)) = self.lookup(node, path, key.as_deref()) {
            return Ok((Some(cached), size));
        }
        self.stats.converted_nodes += 1;

        let (result, size) = match node {
            SemanticNode::Root(_) => {
                let (children, size) = self.children(node, path)?;
                let props = Props {
                    children,
                    ..Props::default()
                };
                let element = self
                    .create
                    .create(self.factory, node, ElementType::Fragment, props, key.as_deref());
                (Some(Child::Element(element)), size + 1)
            }
            SemanticNode::Element(el) => {
                let (child, size) = self.element(node, el, path, key.as_deref())?;
                (Some(child), size)
            }
            SemanticNode::Text(text) => (Some(Child::Text(text.value.clone())), 1),
            SemanticNode::RawMarkup(_) => (None, 1),
            SemanticNode::ExpressionFragment(fragment) => {
                (self.expression(node, fragment.kind, &fragment.expression)?, 1)
            }
        };

        if let (Some(child), Some(_)) = (&result, &self.cache) {
            let snapshot = Snapshot {
                node: node.clone(),
                key,
                size,
                fingerprint: self.fingerprints.get(path).copied(),
                space: self.schema,
            };
            self.pending.push((path.to_string(), snapshot, child.clone()));
        }
        Ok((result, size))
    }

    /// Cached result for `path`, if its snapshot still matches `node`
    fn lookup(
        &mut self,
        node: &SemanticNode,
        path: &str,
        key: Option<&str>,
    ) -> Option<(Child<F::Element>, usize)> {
        let cache = self.cache.as_deref_mut()?;
        let fresh = cache.get(path).and_then(|(snapshot, result)| {
            let same = snapshot.key.as_deref() == key
                && snapshot.space == self.schema
                && match self.options.equality {
                    EqualityMode::Structural => same_node(&snapshot.node, node),
                    EqualityMode::Fingerprint => {
                        snapshot.fingerprint.is_some()
                            && snapshot.fingerprint == self.fingerprints.get(path).copied()
                    }
                };
            same.then(|| (result.clone(), snapshot.size))
        });

        match &fresh {
            Some((_, size)) => {
                trace!(path, size, "cache hit");
                self.stats.hits += 1;
                self.stats.reused_nodes += size;
            }
            None => self.stats.misses += 1,
        }
        fresh
    }

    fn element(
        &mut self,
        node: &SemanticNode,
        el: &Element,
        path: &str,
        key: Option<&str>,
    ) -> MarkdownResult<(Child<F::Element>, usize)> {
        let parent_schema = self.schema;
        if parent_schema == Space::Html && el.tag.eq_ignore_ascii_case("svg") {
            self.schema = Space::Svg;
        }
        self.ancestors.push(el.tag.clone());

        let built = self.build_element(node, el, path, key);

        self.ancestors.pop();
        self.schema = parent_schema;
        built
    }

    fn build_element(
        &mut self,
        node: &SemanticNode,
        el: &Element,
        path: &str,
        key: Option<&str>,
    ) -> MarkdownResult<(Child<F::Element>, usize)> {
        let kind = self.options.element_type(&el.tag);
        let mut props = self.props(node, el)?;
        if self.options.pass_node && matches!(kind, ElementType::Component(_)) {
            props.node = Some(node.clone());
        }

        let (children, size) = self.children(node, path)?;
        props.children = children;

        let element = self.create.create(self.factory, node, kind, props, key);
        Ok((Child::Element(element), size + 1))
    }

    fn props(&self, node: &SemanticNode, el: &Element) -> MarkdownResult<Props<F::Element>> {
        let mut props = Props::default();
        let mut align = None;

        for (name, value) in &el.attributes {
            let info = schema::find(self.schema, name);
            let value = match value {
                PropertyValue::List(tokens) => PropertyValue::Text(schema::join_tokens(&info, tokens)),
                other => other.clone(),
            };

            if info.property == "style" {
                props.style = self.style(node, &value.to_text())?;
                continue;
            }

            let prop = info.name(self.options.element_attribute_name_case);
            if self.options.table_cell_align_to_style
                && prop == "align"
                && TABLE_CELL_ELEMENTS.contains(&el.tag.as_str())
            {
                if let PropertyValue::Text(alignment) = value {
                    align = Some(alignment);
                    continue;
                }
            }
            props.attributes.insert(prop.to_string(), value);
        }

        if let Some(alignment) = align {
            let name = match self.options.style_property_name_case {
                StylePropertyNameCase::Dom => "textAlign",
                StylePropertyNameCase::Css => "text-align",
            };
            props
                .style
                .get_or_insert_with(StyleMap::new)
                .insert(name.to_string(), alignment);
        }
        Ok(props)
    }

    fn style(&self, node: &SemanticNode, source: &str) -> MarkdownResult<Option<StyleMap>> {
        match parse_style(source, self.options.style_property_name_case) {
            Ok(style) => Ok(Some(style)),
            Err(err) if self.options.ignore_invalid_style => {
                warn!(error = %err, "dropping invalid style attribute");
                Ok(None)
            }
            Err(err) => Err(Diagnostic::new("Cannot parse `style` attribute", "style")
                .with_ancestors(&self.ancestors)
                .with_place(node.position())
                .with_file(self.options.file_path.clone())
                .with_cause(err.to_string())
                .into()),
        }
    }

    fn children(
        &mut self,
        parent: &SemanticNode,
        path: &str,
    ) -> MarkdownResult<(Vec<Child<F::Element>>, usize)> {
        let drop_whitespace = parent
            .tag_name()
            .is_some_and(|tag| TABLE_ELEMENTS.contains(&tag));
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut children = Vec::new();
        let mut size = 0;

        for (index, child) in parent.children().iter().enumerate() {
            let key = match child.tag_name() {
                Some(tag) if self.options.pass_keys => {
                    let count = counts.entry(tag).or_insert(0);
                    let key = format!("{}-{}", tag, count);
                    *count += 1;
                    Some(key)
                }
                _ => None,
            };

            if drop_whitespace {
                if let SemanticNode::Text(text) = child {
                    if is_whitespace(&text.value) {
                        self.stats.converted_nodes += 1;
                        size += 1;
                        continue;
                    }
                }
            }

            let (result, child_size) = self.one(child, &child_path(path, index), key)?;
            size += child_size;
            match result {
                // evaluated expressions can produce whitespace too
                Some(Child::Text(text)) if drop_whitespace && is_whitespace(&text) => {}
                other => children.extend(other),
            }
        }
        Ok((children, size))
    }

    fn expression(
        &self,
        node: &SemanticNode,
        kind: ExpressionKind,
        expression: &Expression,
    ) -> MarkdownResult<Option<Child<F::Element>>> {
        match self.evaluator {
            Some(evaluator) if expression.estree.is_some() => match kind {
                ExpressionKind::Esm => evaluator.evaluate_program(expression),
                ExpressionKind::Flow | ExpressionKind::Text => evaluator.evaluate_expression(expression),
            },
            _ => Err(Diagnostic::new(
                "Cannot handle embedded expressions without an evaluator and a parsed expression tree",
                "mdx-estree",
            )
            .with_ancestors(&self.ancestors)
            .with_place(node.position())
            .with_file(self.options.file_path.clone())
            .into()),
        }
    }

    fn commit(&mut self) {
        if let Some(cache) = self.cache.as_deref_mut() {
            for (path, snapshot, element) in self.pending.drain(..) {
                cache.set(path, snapshot, element);
            }
        }
    }
}

/// Equality used to validate a cached snapshot: text by value, everything
/// else by full structure.
fn same_node(cached: &SemanticNode, current: &SemanticNode) -> bool {
    match (cached, current) {
        (SemanticNode::Text(a), SemanticNode::Text(b)) => a.value == b.value,
        _ => cached == current,
    }
}

/// Inter-element whitespace: only spaces, tabs, newlines, form feeds and
/// carriage returns (or nothing).
fn is_whitespace(value: &str) -> bool {
    value
        .chars()
        .all(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c'))
}

/// Record a 64-bit fingerprint for every path of the subtree, post-order.
fn fingerprint(node: &SemanticNode, path: &str, out: &mut HashMap<String, u64>) -> u64 {
    let mut hasher = DefaultHasher::new();
    match node {
        SemanticNode::Text(text) => {
            0u8.hash(&mut hasher);
            text.value.hash(&mut hasher);
        }
        SemanticNode::Root(root) => {
            1u8.hash(&mut hasher);
            root.position.hash(&mut hasher);
        }
        SemanticNode::Element(el) => {
            2u8.hash(&mut hasher);
            el.tag.hash(&mut hasher);
            el.attributes.len().hash(&mut hasher);
            for (name, value) in &el.attributes {
                name.hash(&mut hasher);
                value.hash(&mut hasher);
            }
            el.position.hash(&mut hasher);
        }
        SemanticNode::RawMarkup(raw) => {
            3u8.hash(&mut hasher);
            raw.value.hash(&mut hasher);
            raw.position.hash(&mut hasher);
        }
        SemanticNode::ExpressionFragment(fragment) => {
            4u8.hash(&mut hasher);
            fragment.kind.hash(&mut hasher);
            fragment.expression.value.hash(&mut hasher);
            fragment
                .expression
                .estree
                .as_ref()
                .map(|tree| tree.to_string())
                .hash(&mut hasher);
            fragment.position.hash(&mut hasher);
        }
    }

    let children = node.children();
    children.len().hash(&mut hasher);
    for (index, child) in children.iter().enumerate() {
        fingerprint(child, &child_path(path, index), out).hash(&mut hasher);
    }

    let hash = hasher.finish();
    out.insert(path.to_string(), hash);
    hash
}

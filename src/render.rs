//! The long-lived markdown renderer.
//!
//! An [`IncrementalMarkdown`] owns its pipeline and its cache. Every call runs
//! parse → transforms → optional class wrapper → sanitize → convert, and the
//! cache carries converted subtrees from one call to the next.

use tracing::debug;

use crate::cache::{NodeCache, PassStats};
use crate::convert::{Converter, Evaluator};
use crate::error::{MarkdownError, MarkdownResult};
use crate::factory::ElementFactory;
use crate::markdown::{CmarkParser, MarkdownParser, Pipeline, TreeTransform};
use crate::node::SemanticNode;
use crate::options::Options;
use crate::sanitize::{AllowElement, Sanitizer, UrlTransform};

pub struct IncrementalMarkdown<F: ElementFactory> {
    options: Options,
    factory: F,
    pipeline: Pipeline,
    sanitizer: Sanitizer,
    evaluator: Option<Box<dyn Evaluator<F::Element>>>,
    cache: NodeCache<F::Element>,
    last_stats: Option<PassStats>,
}

impl<F: ElementFactory> IncrementalMarkdown<F> {
    pub fn builder(options: Options) -> IncrementalMarkdownBuilder<F> {
        IncrementalMarkdownBuilder {
            options,
            factory: None,
            parser: None,
            transforms: Vec::new(),
            allow_element: None,
            url_transform: None,
            evaluator: None,
            cache: None,
        }
    }

    /// Render markdown text into one element
    pub fn render(&mut self, text: &str) -> MarkdownResult<F::Element> {
        debug!(bytes = text.len(), "rendering markdown");
        let tree = self.pipeline.run(text)?;
        self.render_tree(tree)
    }

    /// Render an already parsed tree; the parser and transforms are skipped.
    ///
    /// A top node that is raw markup is left alone by the sanitizer and
    /// renders as an empty fragment.
    pub fn render_tree(&mut self, tree: SemanticNode) -> MarkdownResult<F::Element> {
        let mut tree = match &self.options.class_name {
            Some(class_name) => wrap_in_class(tree, class_name),
            None => tree,
        };
        self.sanitizer.sanitize(&mut tree);

        let converter = Converter::new(&self.factory, &self.options.runtime)
            .with_evaluator(self.evaluator.as_deref());
        let cache = if self.options.enabled_cache {
            Some(&mut self.cache)
        } else {
            None
        };
        let (element, stats) = converter.convert(&tree, cache)?;

        self.last_stats = Some(stats);
        Ok(element)
    }

    /// Statistics of the most recent successful pass
    pub fn last_stats(&self) -> Option<PassStats> {
        self.last_stats
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn cache(&self) -> &NodeCache<F::Element> {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Give up the renderer, keeping its cache for another instance
    pub fn into_cache(self) -> NodeCache<F::Element> {
        self.cache
    }
}

impl<F: ElementFactory> std::fmt::Debug for IncrementalMarkdown<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalMarkdown")
            .field("options", &self.options)
            .field("pipeline", &self.pipeline)
            .field("sanitizer", &self.sanitizer)
            .field("cache", &self.cache)
            .finish()
    }
}

/// `div` carrying `class_name` around the tree (or around the root's children)
fn wrap_in_class(tree: SemanticNode, class_name: &str) -> SemanticNode {
    let children = match tree {
        SemanticNode::Root(root) => root.children,
        other => vec![other],
    };
    SemanticNode::element("div")
        .with_attribute("class", class_name)
        .with_children(children)
}

pub struct IncrementalMarkdownBuilder<F: ElementFactory> {
    options: Options,
    factory: Option<F>,
    parser: Option<Box<dyn MarkdownParser>>,
    transforms: Vec<Box<dyn TreeTransform>>,
    allow_element: Option<AllowElement>,
    url_transform: Option<UrlTransform>,
    evaluator: Option<Box<dyn Evaluator<F::Element>>>,
    cache: Option<NodeCache<F::Element>>,
}

impl<F: ElementFactory> IncrementalMarkdownBuilder<F> {
    pub fn factory(mut self, factory: F) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replace the default `pulldown-cmark` parser
    pub fn parser(mut self, parser: impl MarkdownParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn transform(mut self, transform: impl TreeTransform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn allow_element(
        mut self,
        predicate: impl Fn(&SemanticNode, usize, Option<&str>) -> bool + 'static,
    ) -> Self {
        self.allow_element = Some(Box::new(predicate));
        self
    }

    pub fn url_transform(mut self, transform: impl Fn(&str, &str, &SemanticNode) -> String + 'static) -> Self {
        self.url_transform = Some(Box::new(transform));
        self
    }

    pub fn evaluator(mut self, evaluator: impl Evaluator<F::Element> + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    /// Start from an existing cache instead of an empty one.
    ///
    /// Entries are only reused while this instance converts with the same
    /// runtime options as the one that filled the cache.
    pub fn cache(mut self, cache: NodeCache<F::Element>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> MarkdownResult<IncrementalMarkdown<F>> {
        let factory = self.factory.ok_or(MarkdownError::MissingFactory)?;

        let mut sanitizer = Sanitizer::new(&self.options)?;
        if let Some(predicate) = self.allow_element {
            sanitizer = sanitizer.with_allow_element(predicate);
        }
        if let Some(transform) = self.url_transform {
            sanitizer = sanitizer.with_url_transform(transform);
        }

        let mut pipeline = Pipeline::new(
            self.parser
                .unwrap_or_else(|| Box::new(CmarkParser::default())),
        );
        for transform in self.transforms {
            pipeline.push_transform(transform);
        }

        let cache = self
            .cache
            .unwrap_or_else(|| NodeCache::new(self.options.cache_capacity));

        Ok(IncrementalMarkdown {
            options: self.options,
            factory,
            pipeline,
            sanitizer,
            evaluator: self.evaluator,
            cache,
            last_stats: None,
        })
    }
}

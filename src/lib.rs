//! # incremark
//!
//! Incremental markdown → UI element tree conversion.
//!
//! Built for documents that are re-rendered as they grow, such as a reply
//! streamed token by token. Converted subtrees are memoized by their path in
//! the tree, so each update only rebuilds what actually changed.
//!
//! ## Features
//! - `pulldown-cmark` adapter producing a framework-independent semantic tree
//! - Sanitization: element allow/deny lists, URL attribute rewriting, raw HTML policy
//! - Renderer-agnostic conversion through the [`ElementFactory`] trait
//! - Path-keyed LRU memoization with structural or fingerprint validation
//! - Options loadable from YAML or JSON
//!
//! ## Example: streaming render
//! ```ignore
//! use incremark::{DescriptorFactory, IncrementalMarkdown, Options};
//!
//! let mut md = IncrementalMarkdown::builder(Options::default().with_cache(true))
//!     .factory(DescriptorFactory)
//!     .build()?;
//!
//! md.render("# Reply\n\nThe answer")?;
//! let element = md.render("# Reply\n\nThe answer is 42.")?;
//! println!("{:?}", md.last_stats());
//! ```
//!
//! ## Example: one-off conversion
//! ```ignore
//! use incremark::{render_markdown, Options};
//!
//! let element = render_markdown("*hello*", Options::default())?;
//! assert_eq!(element.text_content(), "hello");
//! ```

pub mod cache;
pub mod convert;
pub mod error;
pub mod factory;
pub mod markdown;
pub mod node;
pub mod options;
pub mod render;
pub mod sanitize;
pub mod schema;
pub mod style;

// --- Core types ---
pub use cache::{NodeCache, PassStats, Snapshot};
pub use convert::{to_element_tree, Converter, Evaluator};
pub use error::{Diagnostic, MarkdownError, MarkdownResult};
pub use node::{Expression, ExpressionKind, Position, PropertyValue, SemanticNode};
pub use options::{ComponentOverride, EqualityMode, Options, RuntimeOptions};
pub use render::{IncrementalMarkdown, IncrementalMarkdownBuilder};

// --- Collaborator seams ---
pub use factory::{Child, CreateMode, DescriptorFactory, ElementDescriptor, ElementFactory, ElementType, Props, SourceInfo};
pub use markdown::{CmarkParser, MarkdownParser, Pipeline, TreeTransform};
pub use sanitize::{default_url_transform, Sanitizer};

/// Render markdown once into an [`ElementDescriptor`] tree, without caching
pub fn render_markdown(text: &str, options: Options) -> MarkdownResult<ElementDescriptor> {
    let options = Options {
        enabled_cache: false,
        ..options
    };
    IncrementalMarkdown::builder(options)
        .factory(DescriptorFactory)
        .build()?
        .render(text)
}

/// Sanitize and convert an already parsed tree into an [`ElementDescriptor`] tree
pub fn render_tree(tree: SemanticNode, options: Options) -> MarkdownResult<ElementDescriptor> {
    let options = Options {
        enabled_cache: false,
        ..options
    };
    IncrementalMarkdown::builder(options)
        .factory(DescriptorFactory)
        .build()?
        .render_tree(tree)
}

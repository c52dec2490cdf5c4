//! Tree sanitization before conversion.
//!
//! One pre-order pass rewrites URL-bearing attributes, filters elements by
//! allow/deny list and the caller's predicate, and neutralizes raw markup.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::{MarkdownError, MarkdownResult};
use crate::node::{PropertyValue, SemanticNode, Text};
use crate::options::Options;

/// Predicate deciding whether an element stays: `(node, index, parent_tag)`.
/// Returning `false` removes the element.
pub type AllowElement = Box<dyn Fn(&SemanticNode, usize, Option<&str>) -> bool>;

/// Rewrites a URL attribute: `(value, attribute_name, element)` → new value
pub type UrlTransform = Box<dyn Fn(&str, &str, &SemanticNode) -> String>;

/// Attributes holding URLs, with the tags they apply to (`None` = every element)
pub const URL_ATTRIBUTES: &[(&str, Option<&[&str]>)] = &[
    ("action", Some(&["form"])),
    ("cite", Some(&["blockquote", "del", "ins", "q"])),
    ("data", Some(&["object"])),
    ("formaction", Some(&["button", "input"])),
    ("href", Some(&["a", "area", "base", "link"])),
    ("icon", Some(&["menuitem"])),
    ("itemid", None),
    ("manifest", Some(&["html"])),
    ("ping", Some(&["a", "area"])),
    ("poster", Some(&["video"])),
    (
        "src",
        Some(&["audio", "embed", "iframe", "img", "input", "script", "source", "track", "video"]),
    ),
];

/// Whether `attribute` on `tag` holds a URL
pub fn is_url_attribute(attribute: &str, tag: &str) -> bool {
    URL_ATTRIBUTES.iter().any(|(name, tags)| {
        name.eq_ignore_ascii_case(attribute) && tags.map_or(true, |tags| tags.contains(&tag))
    })
}

/// Keep relative URLs and safe schemes, blank out everything else.
///
/// `javascript:alert(1)` → `""`, `https://example.com` and `/docs:intro` are
/// kept as is.
pub fn default_url_transform(value: &str) -> String {
    static SAFE_PROTOCOL: OnceLock<Regex> = OnceLock::new();
    let re = SAFE_PROTOCOL.get_or_init(|| Regex::new(r"(?i)^(https?|ircs?|mailto|xmpp)$").unwrap());

    let colon = match value.find(':') {
        Some(i) => i,
        None => return value.to_string(),
    };
    let before = |c: char| value.find(c).is_some_and(|i| i < colon);
    if before('/') || before('?') || before('#') || re.is_match(&value[..colon]) {
        return value.to_string();
    }
    String::new()
}

enum Verdict {
    Keep,
    Drop,
    Unwrap,
}

pub struct Sanitizer {
    allowed: Option<HashSet<String>>,
    disallowed: Option<HashSet<String>>,
    allow_element: Option<AllowElement>,
    url_transform: UrlTransform,
    unwrap_disallowed: bool,
    skip_html: bool,
}

impl Sanitizer {
    /// Build from options; both element lists at once is rejected.
    pub fn new(options: &Options) -> MarkdownResult<Self> {
        if options.allowed_elements.is_some() && options.disallowed_elements.is_some() {
            return Err(MarkdownError::ConflictingElementFilters);
        }
        let to_set = |tags: &Vec<String>| tags.iter().cloned().collect::<HashSet<_>>();
        Ok(Self {
            allowed: options.allowed_elements.as_ref().map(to_set),
            disallowed: options.disallowed_elements.as_ref().map(to_set),
            allow_element: None,
            url_transform: Box::new(|value, _, _| default_url_transform(value)),
            unwrap_disallowed: options.unwrap_disallowed,
            skip_html: options.skip_html,
        })
    }

    pub fn with_allow_element(mut self, predicate: AllowElement) -> Self {
        self.allow_element = Some(predicate);
        self
    }

    pub fn with_url_transform(mut self, transform: UrlTransform) -> Self {
        self.url_transform = transform;
        self
    }

    /// Sanitize `tree` in place. The top node itself is never removed.
    pub fn sanitize(&self, tree: &mut SemanticNode) {
        self.rewrite_urls(tree);
        self.visit_children(tree);
    }

    fn visit_children(&self, parent: &mut SemanticNode) {
        let parent_tag = parent.tag_name().map(str::to_string);
        let Some(children) = parent.children_mut() else {
            return;
        };

        let mut index = 0;
        while index < children.len() {
            match self.visit(&mut children[index], index, parent_tag.as_deref()) {
                Verdict::Keep => {
                    self.visit_children(&mut children[index]);
                    index += 1;
                }
                Verdict::Drop => {
                    children.remove(index);
                }
                Verdict::Unwrap => {
                    // Spliced children are visited next, at the same index.
                    let mut removed = children.remove(index);
                    let grandchildren = removed.children_mut().map(std::mem::take).unwrap_or_default();
                    children.splice(index..index, grandchildren);
                }
            }
        }
    }

    fn visit(&self, node: &mut SemanticNode, index: usize, parent_tag: Option<&str>) -> Verdict {
        match node {
            SemanticNode::RawMarkup(raw) => {
                if self.skip_html {
                    return Verdict::Drop;
                }
                *node = SemanticNode::Text(Text {
                    value: std::mem::take(&mut raw.value),
                    position: raw.position,
                });
                Verdict::Keep
            }
            SemanticNode::Element(_) => {
                self.rewrite_urls(node);
                if !self.is_removed(node, index, parent_tag) {
                    return Verdict::Keep;
                }
                trace!(tag = node.tag_name().unwrap_or_default(), index, "removing element");
                if self.unwrap_disallowed {
                    Verdict::Unwrap
                } else {
                    Verdict::Drop
                }
            }
            _ => Verdict::Keep,
        }
    }

    fn is_removed(&self, node: &SemanticNode, index: usize, parent_tag: Option<&str>) -> bool {
        let tag = node.tag_name().unwrap_or_default();
        let listed_out = match (&self.allowed, &self.disallowed) {
            (Some(allowed), _) => !allowed.contains(tag),
            (None, Some(disallowed)) => disallowed.contains(tag),
            (None, None) => false,
        };
        if listed_out {
            return true;
        }
        match &self.allow_element {
            Some(predicate) => !predicate(node, index, parent_tag),
            None => false,
        }
    }

    fn rewrite_urls(&self, node: &mut SemanticNode) {
        let current: &SemanticNode = node;
        let SemanticNode::Element(el) = current else {
            return;
        };
        let updates: Vec<(String, String)> = el
            .attributes
            .iter()
            .filter(|(name, _)| is_url_attribute(name, &el.tag))
            .map(|(name, value)| {
                let value = match value {
                    PropertyValue::Bool(false) => String::new(),
                    other => other.to_text(),
                };
                (name.clone(), (self.url_transform)(&value, name, current))
            })
            .collect();

        if let SemanticNode::Element(el) = node {
            for (name, value) in updates {
                el.attributes.insert(name, PropertyValue::Text(value));
            }
        }
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("allowed", &self.allowed)
            .field("disallowed", &self.disallowed)
            .field("allow_element", &self.allow_element.is_some())
            .field("unwrap_disallowed", &self.unwrap_disallowed)
            .field("skip_html", &self.skip_html)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Position;
    use pretty_assertions::assert_eq;

    fn el(tag: &str, children: Vec<SemanticNode>) -> SemanticNode {
        SemanticNode::element(tag).with_children(children)
    }

    fn text(value: &str) -> SemanticNode {
        SemanticNode::text(value)
    }

    fn tags(node: &SemanticNode) -> Vec<&str> {
        node.children().iter().filter_map(SemanticNode::tag_name).collect()
    }

    #[test]
    fn test_default_url_transform() {
        assert_eq!(default_url_transform("javascript:alert(1)"), "");
        assert_eq!(default_url_transform("JavaScript:alert(1)"), "");
        assert_eq!(default_url_transform("data:text/html,<b>x</b>"), "");
        assert_eq!(default_url_transform("https://example.com"), "https://example.com");
        assert_eq!(default_url_transform("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(default_url_transform("mailto:a@b.c"), "mailto:a@b.c");
        assert_eq!(default_url_transform("ircs://irc.example"), "ircs://irc.example");
        assert_eq!(default_url_transform("/docs/intro"), "/docs/intro");
        assert_eq!(default_url_transform("docs/a:b"), "docs/a:b");
        assert_eq!(default_url_transform("?q=a:b"), "?q=a:b");
        assert_eq!(default_url_transform("#note:1"), "#note:1");
        assert_eq!(default_url_transform(""), "");
    }

    #[test]
    fn test_url_attribute_table() {
        assert!(is_url_attribute("href", "a"));
        assert!(is_url_attribute("HREF", "a"));
        assert!(is_url_attribute("itemid", "div"));
        assert!(is_url_attribute("src", "img"));
        assert!(!is_url_attribute("href", "div"));
        assert!(!is_url_attribute("title", "a"));
    }

    #[test]
    fn test_url_attributes_rewritten() {
        let mut tree = SemanticNode::root(vec![
            SemanticNode::element("a")
                .with_attribute("href", "javascript:alert(1)")
                .with_attribute("title", "javascript:alert(1)"),
            SemanticNode::element("img").with_attribute("src", "https://example.com/a.png"),
            SemanticNode::element("div").with_attribute("href", "javascript:void(0)"),
        ]);
        Sanitizer::new(&Options::default()).unwrap().sanitize(&mut tree);

        let link = &tree.children()[0];
        assert_eq!(link.attribute("href"), Some(&PropertyValue::from("")));
        assert_eq!(link.attribute("title"), Some(&PropertyValue::from("javascript:alert(1)")));
        assert_eq!(
            tree.children()[1].attribute("src"),
            Some(&PropertyValue::from("https://example.com/a.png"))
        );
        // `href` is only a URL attribute on link-like elements
        assert_eq!(
            tree.children()[2].attribute("href"),
            Some(&PropertyValue::from("javascript:void(0)"))
        );
    }

    #[test]
    fn test_custom_url_transform_sees_attribute_and_node() {
        let mut tree = SemanticNode::root(vec![SemanticNode::element("a").with_attribute("href", "/docs")]);
        let sanitizer = Sanitizer::new(&Options::default())
            .unwrap()
            .with_url_transform(Box::new(|value, name, node| {
                format!("https://cdn.example{}#{}-{}", value, name, node.tag_name().unwrap_or_default())
            }));
        sanitizer.sanitize(&mut tree);

        assert_eq!(
            tree.children()[0].attribute("href"),
            Some(&PropertyValue::from("https://cdn.example/docs#href-a"))
        );
    }

    #[test]
    fn test_allow_list_drops_subtree() {
        let mut tree = SemanticNode::root(vec![
            el("p", vec![text("a"), el("strong", vec![text("b")])]),
            el("script", vec![text("alert(1)")]),
        ]);
        let options = Options::default().with_allowed_elements(&["p", "strong"]);
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);

        assert_eq!(tags(&tree), vec!["p"]);
        assert_eq!(tree.text_content(), "ab");
    }

    #[test]
    fn test_unwrap_keeps_children_in_place() {
        let mut tree = SemanticNode::root(vec![
            el("p", vec![text("a")]),
            el("section", vec![el("p", vec![text("b")]), text("c")]),
            el("p", vec![text("d")]),
        ]);
        let mut options = Options::default().with_allowed_elements(&["p"]);
        options.unwrap_disallowed = true;
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);

        assert_eq!(tree.children().len(), 4);
        assert_eq!(tags(&tree), vec!["p", "p", "p"]);
        assert_eq!(tree.text_content(), "abcd");
    }

    #[test]
    fn test_unwrapped_children_are_visited() {
        let mut tree = SemanticNode::root(vec![el(
            "section",
            vec![el("script", vec![text("x")]), el("p", vec![text("y")])],
        )]);
        let mut options = Options::default().with_disallowed_elements(&["section", "script"]);
        options.unwrap_disallowed = true;
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);

        assert_eq!(tree.children(), &[text("x"), el("p", vec![text("y")])]);
    }

    #[test]
    fn test_deny_list() {
        let mut tree = SemanticNode::root(vec![el("p", vec![el("iframe", vec![]), text("ok")])]);
        let options = Options::default().with_disallowed_elements(&["iframe"]);
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);

        assert_eq!(tree.children()[0].children(), &[text("ok")]);
    }

    #[test]
    fn test_allow_element_predicate_gets_index_and_parent() {
        let mut tree = SemanticNode::root(vec![
            el("ul", vec![el("li", vec![text("0")]), el("li", vec![text("1")]), el("li", vec![text("2")])]),
            el("li", vec![text("top")]),
        ]);
        let sanitizer = Sanitizer::new(&Options::default())
            .unwrap()
            .with_allow_element(Box::new(|node, index, parent| {
                !(node.tag_name() == Some("li") && parent == Some("ul") && index == 1)
            }));
        sanitizer.sanitize(&mut tree);

        assert_eq!(tree.children()[0].text_content(), "02");
        assert_eq!(tree.children()[1].text_content(), "top");
    }

    #[test]
    fn test_raw_markup_becomes_text_or_is_skipped() {
        let raw = SemanticNode::raw("<b>x</b>").with_position(Position::new(1, 1));
        let mut tree = SemanticNode::root(vec![el("p", vec![raw.clone(), text("y")])]);
        Sanitizer::new(&Options::default()).unwrap().sanitize(&mut tree);
        assert_eq!(
            tree.children()[0].children()[0],
            text("<b>x</b>").with_position(Position::new(1, 1))
        );

        let mut tree = SemanticNode::root(vec![el("p", vec![raw, text("y")])]);
        let options = Options {
            skip_html: true,
            ..Options::default()
        };
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);
        assert_eq!(tree.children()[0].children(), &[text("y")]);
    }

    #[test]
    fn test_top_level_element_never_removed() {
        let mut tree = el("div", vec![el("script", vec![]), el("p", vec![])])
            .with_attribute("class", "markdown");
        let options = Options::default().with_allowed_elements(&["p"]);
        Sanitizer::new(&options).unwrap().sanitize(&mut tree);

        assert_eq!(tree.tag_name(), Some("div"));
        assert_eq!(tags(&tree), vec!["p"]);
    }

    #[test]
    fn test_conflicting_filters() {
        let options = Options::default()
            .with_allowed_elements(&["p"])
            .with_disallowed_elements(&["script"]);
        assert!(matches!(
            Sanitizer::new(&options),
            Err(MarkdownError::ConflictingElementFilters)
        ));
    }
}

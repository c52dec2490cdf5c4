use incremark::{
    render_markdown, render_tree, Child, DescriptorFactory, ElementDescriptor, ElementType, EqualityMode,
    Evaluator, Expression, IncrementalMarkdown, MarkdownError, MarkdownResult, NodeCache, Options, Position,
    PropertyValue, SemanticNode, Snapshot, SourceInfo,
};
use incremark::schema::{AttributeNameCase, Space};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn get_demo_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("demos");
    path.push(filename);
    path
}

fn read_demo(filename: &str) -> String {
    fs::read_to_string(get_demo_path(filename)).unwrap()
}

fn renderer(options: Options) -> IncrementalMarkdown<DescriptorFactory> {
    IncrementalMarkdown::builder(options)
        .factory(DescriptorFactory)
        .build()
        .unwrap()
}

fn find_all<'a>(element: &'a ElementDescriptor, tag: &str, out: &mut Vec<&'a ElementDescriptor>) {
    if element.tag() == tag {
        out.push(element);
    }
    for child in element.child_elements() {
        find_all(child, tag, out);
    }
}

fn find<'a>(element: &'a ElementDescriptor, tag: &str) -> Vec<&'a ElementDescriptor> {
    let mut out = Vec::new();
    find_all(element, tag, &mut out);
    out
}

fn el(tag: &str, children: Vec<SemanticNode>) -> SemanticNode {
    SemanticNode::element(tag).with_children(children)
}

fn text(value: &str) -> SemanticNode {
    SemanticNode::text(value)
}

/// Every char-boundary prefix of `text`, shortest first
fn prefixes(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .chain(std::iter::once(text.len()))
        .map(|end| &text[..end])
        .collect()
}

// Caching

#[test]
fn test_second_render_reuses_everything() {
    let reply = read_demo("reply.md");
    let mut md = renderer(Options::default().with_cache(true));

    let first = md.render(&reply).unwrap();
    let first_stats = md.last_stats().unwrap();
    let second = md.render(&reply).unwrap();
    let second_stats = md.last_stats().unwrap();

    assert_eq!(first, second);
    assert_eq!(first_stats.hits, 0);
    assert_eq!(second_stats.hits, 1);
    assert_eq!(second_stats.converted_nodes, 0);
    assert_eq!(second_stats.reused_nodes, first_stats.converted_nodes);
}

#[test]
fn test_streaming_matches_fresh_render() {
    let reply = read_demo("reply.md");
    let mut md = renderer(Options::default().with_cache(true));
    let mut reused = 0;

    for prefix in prefixes(&reply) {
        let streamed = md.render(prefix).unwrap();
        let fresh = render_markdown(prefix, Options::default()).unwrap();
        assert_eq!(streamed, fresh, "prefix of {} bytes diverged", prefix.len());
        reused += md.last_stats().unwrap().reused_nodes;
    }
    assert!(reused > 0);
}

#[test]
fn test_streaming_with_tiny_cache_and_fingerprints() {
    let reply = read_demo("reply.md");
    let mut options = Options::default().with_cache(true);
    options.cache_capacity = 8;
    options.runtime.equality = EqualityMode::Fingerprint;
    let mut md = renderer(options);

    for prefix in prefixes(&reply) {
        let streamed = md.render(prefix).unwrap();
        let fresh = render_markdown(prefix, Options::default()).unwrap();
        assert_eq!(streamed, fresh, "prefix of {} bytes diverged", prefix.len());
        assert!(md.cache().len() <= 8);
    }
}

#[test]
fn test_appending_a_block_only_converts_the_new_suffix() {
    let mut md = renderer(Options::default().with_cache(true));
    md.render("# Title\n\nFirst paragraph.").unwrap();
    md.render("# Title\n\nFirst paragraph.\n\nSecond").unwrap();
    let stats = md.last_stats().unwrap();

    // reused: h1 (2 nodes), separator, paragraph (2 nodes)
    assert_eq!(stats.reused_nodes, 5);
    // converted: root, new separator, new paragraph and its text
    assert_eq!(stats.converted_nodes, 4);
}

#[test]
fn test_cache_evicts_least_recently_used() {
    let mut cache: NodeCache<ElementDescriptor> = NodeCache::new(3);
    for path in ["/0", "/1", "/2"] {
        let snapshot = Snapshot {
            node: text(path),
            key: None,
            size: 1,
            fingerprint: None,
            space: Space::Html,
        };
        cache.set(path.to_string(), snapshot, Child::Text(path.to_string()));
    }
    assert!(cache.get("/0").is_some());

    let snapshot = Snapshot {
        node: text("/3"),
        key: None,
        size: 1,
        fingerprint: None,
        space: Space::Html,
    };
    cache.set("/3".to_string(), snapshot, Child::Text("/3".to_string()));

    assert!(!cache.contains("/1"));
    for path in ["/0", "/2", "/3"] {
        assert!(cache.contains(path), "{} should survive", path);
    }
}

#[test]
fn test_handed_over_cache_respects_new_options() {
    let mut md = renderer(Options::default().with_cache(true).with_class_name("x"));
    md.render("hi").unwrap();
    let cache = md.into_cache();
    assert!(!cache.is_empty());

    let mut options = Options::default().with_cache(true).with_class_name("x");
    options.runtime.element_attribute_name_case = AttributeNameCase::Html;
    let mut next = IncrementalMarkdown::builder(options.clone())
        .factory(DescriptorFactory)
        .cache(cache)
        .build()
        .unwrap();

    let out = next.render("hi").unwrap();
    assert_eq!(out, render_markdown("hi", options).unwrap());
    assert_eq!(out.props.get("class"), Some(&PropertyValue::from("x")));
    assert_eq!(next.last_stats().unwrap().hits, 0);
}

#[test]
fn test_failed_pass_leaves_cache_untouched() {
    let invalid: SemanticNode = serde_yaml::from_str(&read_demo("invalid-style.yaml")).unwrap();
    let mut md = renderer(Options::default().with_cache(true));

    md.render("fine").unwrap();
    let entries = md.cache().len();

    let err = md.render_tree(invalid).unwrap_err();
    let diagnostic = err.diagnostic().unwrap();
    assert_eq!(diagnostic.rule_id, "style");
    assert_eq!(diagnostic.source, "incremark");
    assert_eq!(diagnostic.ancestors, vec!["table", "tr", "td"]);
    assert_eq!(diagnostic.place, Some(Position::new(4, 3)));
    assert_eq!(md.cache().len(), entries);

    md.render("fine").unwrap();
    assert_eq!(md.last_stats().unwrap().converted_nodes, 0);
}

// Sanitization

#[test]
fn test_allow_list_removes_script() {
    let tree = SemanticNode::root(vec![el(
        "p",
        vec![el("strong", vec![text("bold")]), el("script", vec![text("alert(1)")])],
    )]);

    let options = Options::default().with_allowed_elements(&["p", "strong"]);
    let out = render_tree(tree.clone(), options.clone()).unwrap();
    assert!(find(&out, "script").is_empty());
    assert_eq!(out.text_content(), "bold");

    let options = Options {
        unwrap_disallowed: true,
        ..options
    };
    let out = render_tree(tree, options).unwrap();
    assert!(find(&out, "script").is_empty());
    assert_eq!(out.text_content(), "boldalert(1)");
}

#[test]
fn test_dangerous_urls_are_blanked() {
    let out = render_markdown("[x](javascript:alert(1)) [y](https://example.com)", Options::default()).unwrap();
    let links = find(&out, "a");

    assert_eq!(links[0].props.get("href"), Some(&PropertyValue::from("")));
    assert_eq!(links[1].props.get("href"), Some(&PropertyValue::from("https://example.com")));
}

#[test]
fn test_custom_url_transform() {
    let mut md = IncrementalMarkdown::builder(Options::default())
        .factory(DescriptorFactory)
        .url_transform(|value, _, _| format!("https://proxy.example/?u={}", value))
        .build()
        .unwrap();

    let out = md.render("![cat](cat.png)").unwrap();
    assert_eq!(
        find(&out, "img")[0].props.get("src"),
        Some(&PropertyValue::from("https://proxy.example/?u=cat.png"))
    );
}

#[test]
fn test_allow_element_predicate() {
    let mut md = IncrementalMarkdown::builder(Options::default())
        .factory(DescriptorFactory)
        .allow_element(|node, _, parent| !(node.tag_name() == Some("h1") && parent.is_none()))
        .build()
        .unwrap();

    let out = md.render("# Gone\n\nkept").unwrap();
    assert!(find(&out, "h1").is_empty());
    assert_eq!(find(&out, "p").len(), 1);
}

#[test]
fn test_raw_html_shown_as_text_unless_skipped() {
    let reply = read_demo("reply.md");

    let out = render_markdown(&reply, Options::default()).unwrap();
    assert!(find(&out, "script").is_empty());
    assert!(out.text_content().contains("<script>alert(\"not rendered\")</script>"));

    let options = Options {
        skip_html: true,
        ..Options::default()
    };
    let out = render_markdown(&reply, options).unwrap();
    assert!(!out.text_content().contains("not rendered"));
}

// Conversion

#[test]
fn test_table_whitespace_and_alignment() {
    let out = render_markdown(&read_demo("reply.md"), Options::default()).unwrap();

    let rows = find(&out, "tr");
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.children.len(), 3, "only cells remain in a row");
    }

    let head = find(&out, "th");
    let aligns: Vec<_> = head
        .iter()
        .map(|cell| cell.style.as_ref().and_then(|s| s.get("textAlign")).cloned())
        .collect();
    assert_eq!(
        aligns,
        vec![Some("left".to_string()), Some("center".to_string()), Some("right".to_string())]
    );
    assert!(head.iter().all(|cell| !cell.props.contains_key("align")));
}

#[test]
fn test_whitespace_text_dropped_inside_rows() {
    let tree = SemanticNode::root(vec![el(
        "table",
        vec![el("tr", vec![el("td", vec![text("a")]), text("  \n"), el("td", vec![text("b")])])],
    )]);
    let out = render_tree(tree, Options::default()).unwrap();
    assert_eq!(find(&out, "tr")[0].children.len(), 2);
}

#[test]
fn test_markdown_structure() {
    let out = render_markdown(&read_demo("reply.md"), Options::default()).unwrap();

    assert_eq!(out.kind, ElementType::Fragment);
    let heading = find(&out, "h1")[0];
    assert_eq!(heading.key.as_deref(), Some("h1-0"));
    assert_eq!(heading.text_content(), "Deploy checklist");

    let code = find(&out, "code")[0];
    assert_eq!(code.props.get("className"), Some(&PropertyValue::from("language-sh")));
    assert_eq!(code.text_content(), "cargo test --workspace\n");

    let checkboxes = find(&out, "input");
    assert_eq!(checkboxes.len(), 2);
    assert_eq!(checkboxes[0].props.get("checked"), Some(&PropertyValue::Bool(true)));
    assert_eq!(checkboxes[1].props.get("checked"), Some(&PropertyValue::Bool(false)));

    assert_eq!(find(&out, "blockquote").len(), 1);
}

#[test]
fn test_options_file() {
    let options = Options::from_yaml(&read_demo("chat.yaml")).unwrap();
    assert_eq!(options.cache_capacity, 256);

    let mut md = renderer(options);
    let out = md.render(&read_demo("reply.md")).unwrap();

    assert_eq!(out.tag(), "div");
    assert_eq!(out.props.get("className"), Some(&PropertyValue::from("reply")));
    assert!(!out.text_content().contains("not rendered"));

    let link = find(&out, "ExternalLink")[0];
    assert_eq!(link.kind, ElementType::Component("ExternalLink".into()));
    assert_eq!(link.props.get("href"), Some(&PropertyValue::from("https://docs.example.com/runbook")));
    assert_eq!(link.node.as_ref().and_then(|n| n.tag_name()), Some("a"));
    assert!(md.cache().len() > 0);
}

#[test]
fn test_svg_attribute_casing() {
    let tree = SemanticNode::root(vec![SemanticNode::element("svg")
        .with_attribute("viewBox", "0 0 24 24")
        .with_attribute("class", "icon")
        .with_children(vec![SemanticNode::element("circle")
            .with_attribute("stroke-width", "2")
            .with_attribute("fill-opacity", "0.5")])]);

    let out = render_tree(tree, Options::default()).unwrap();
    let svg = find(&out, "svg")[0];
    assert_eq!(svg.props.get("className"), Some(&PropertyValue::from("icon")));
    let circle = find(&out, "circle")[0];
    assert_eq!(circle.props.get("strokeWidth"), Some(&PropertyValue::from("2")));
    assert_eq!(circle.props.get("fillOpacity"), Some(&PropertyValue::from("0.5")));
}

#[test]
fn test_development_source_info() {
    let mut options = Options::default();
    options.runtime.development = true;
    options.runtime.file_path = Some("reply.md".into());

    let out = render_markdown("# Title\n\nbody", options).unwrap();
    assert_eq!(
        find(&out, "h1")[0].source,
        Some(SourceInfo {
            file_name: Some("reply.md".into()),
            line_number: Some(1),
            column_number: Some(0),
        })
    );
    assert_eq!(find(&out, "p")[0].source.as_ref().and_then(|s| s.line_number), Some(3));
}

struct Upper;

impl Evaluator<ElementDescriptor> for Upper {
    fn evaluate_expression(&self, expression: &Expression) -> MarkdownResult<Option<Child<ElementDescriptor>>> {
        Ok(Some(Child::Text(expression.value.to_uppercase())))
    }
}

fn expression_tree() -> SemanticNode {
    serde_json::from_str(
        r#"{
            "type": "root",
            "children": [{
                "type": "element",
                "tag": "p",
                "children": [
                    {"type": "text", "value": "Hi "},
                    {
                        "type": "expressionFragment",
                        "kind": "text",
                        "expression": {"value": "name", "estree": {"type": "Program"}},
                        "position": {"line": 1, "column": 4}
                    }
                ]
            }]
        }"#,
    )
    .unwrap()
}

#[test]
fn test_expressions_need_an_evaluator() {
    let err = render_tree(expression_tree(), Options::default()).unwrap_err();
    assert!(matches!(err, MarkdownError::Diagnostic(_)));
    assert_eq!(err.rule_id(), Some("mdx-estree"));
    assert_eq!(err.diagnostic().unwrap().place, Some(Position::new(1, 4)));

    let mut md = IncrementalMarkdown::builder(Options::default())
        .factory(DescriptorFactory)
        .evaluator(Upper)
        .build()
        .unwrap();
    let out = md.render_tree(expression_tree()).unwrap();
    assert_eq!(out.text_content(), "Hi NAME");
}

#[test]
fn test_builder_errors() {
    let err = IncrementalMarkdown::<DescriptorFactory>::builder(Options::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, MarkdownError::MissingFactory));

    let json = r#"{"allowedElements": ["p"], "disallowedElements": ["script"]}"#;
    assert!(matches!(
        Options::from_json(json),
        Err(MarkdownError::ConflictingElementFilters)
    ));
}

//! Markdown text → semantic tree.
//!
//! The grammar lives behind [`MarkdownParser`]; [`CmarkParser`] adapts
//! `pulldown-cmark` events into the semantic tree, laying out block
//! separators the way HTML serializers do (`"\n"` text between blocks, and
//! around the rows and cells of tables and the items of lists).

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser, Tag};

use crate::error::MarkdownResult;
use crate::node::{PropertyValue, Position, SemanticNode};

/// Parses markdown text into a semantic tree
pub trait MarkdownParser {
    fn parse(&self, text: &str) -> MarkdownResult<SemanticNode>;
}

impl<T> MarkdownParser for T
where
    T: Fn(&str) -> MarkdownResult<SemanticNode>,
{
    fn parse(&self, text: &str) -> MarkdownResult<SemanticNode> {
        self(text)
    }
}

/// Rewrites a semantic tree after parsing
pub trait TreeTransform {
    fn transform(&self, tree: SemanticNode) -> MarkdownResult<SemanticNode>;
}

impl<T> TreeTransform for T
where
    T: Fn(SemanticNode) -> MarkdownResult<SemanticNode>,
{
    fn transform(&self, tree: SemanticNode) -> MarkdownResult<SemanticNode> {
        self(tree)
    }
}

/// A parser followed by its transforms, applied in order
pub struct Pipeline {
    parser: Box<dyn MarkdownParser>,
    transforms: Vec<Box<dyn TreeTransform>>,
}

impl Pipeline {
    pub fn new(parser: Box<dyn MarkdownParser>) -> Self {
        Self {
            parser,
            transforms: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Box<dyn TreeTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn push_transform(&mut self, transform: Box<dyn TreeTransform>) {
        self.transforms.push(transform);
    }

    pub fn run(&self, text: &str) -> MarkdownResult<SemanticNode> {
        let mut tree = self.parser.parse(text)?;
        for transform in &self.transforms {
            tree = transform.transform(tree)?;
        }
        Ok(tree)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Box::new(CmarkParser::default()))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// CommonMark + GFM tables, strikethrough and task lists via `pulldown-cmark`
#[derive(Debug, Clone, Copy)]
pub struct CmarkParser {
    options: Options,
}

impl CmarkParser {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

impl Default for CmarkParser {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }
}

impl MarkdownParser for CmarkParser {
    fn parse(&self, text: &str) -> MarkdownResult<SemanticNode> {
        let mut builder = TreeBuilder::new(text);
        for (event, range) in Parser::new_ext(text, self.options).into_offset_iter() {
            builder.event(event, range.start);
        }
        Ok(builder.finish())
    }
}

struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    cell: usize,
}

struct TreeBuilder<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
    /// Open nodes; the root is always at the bottom
    stack: Vec<SemanticNode>,
    table: Option<TableState>,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
            stack: vec![SemanticNode::root(Vec::new()).with_position(Position::new(1, 1))],
            table: None,
        }
    }

    /// 1-based line and column (in chars) of a byte offset
    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset).max(1);
        let start = self.line_starts[line - 1];
        let column = self
            .source
            .get(start..offset)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        Position::new(line, column)
    }

    fn event(&mut self, event: Event<'_>, offset: usize) {
        let position = self.position(offset);
        match event {
            Event::Start(tag) => self.start(tag, position),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.append(SemanticNode::text(text.to_string()).with_position(position)),
            Event::Code(code) => self.append(
                SemanticNode::element("code")
                    .with_position(position)
                    .with_children(vec![SemanticNode::text(code.to_string()).with_position(position)]),
            ),
            Event::Html(html) => self.append(SemanticNode::raw(html.to_string()).with_position(position)),
            Event::FootnoteReference(label) => self.append(
                SemanticNode::element("sup").with_position(position).with_children(vec![
                    SemanticNode::element("a")
                        .with_attribute("href", format!("#fn-{}", label))
                        .with_children(vec![SemanticNode::text(label.to_string())]),
                ]),
            ),
            Event::SoftBreak => self.append(SemanticNode::text("\n").with_position(position)),
            Event::HardBreak => {
                self.append(SemanticNode::element("br").with_position(position));
                self.append(SemanticNode::text("\n"));
            }
            Event::Rule => self.append(SemanticNode::element("hr").with_position(position)),
            Event::TaskListMarker(checked) => {
                if let Some(SemanticNode::Element(item)) = self.stack.last_mut() {
                    item.attributes.insert(
                        "class".to_string(),
                        PropertyValue::List(vec!["task-list-item".to_string()]),
                    );
                }
                self.append(
                    SemanticNode::element("input")
                        .with_attribute("type", "checkbox")
                        .with_attribute("checked", checked)
                        .with_attribute("disabled", true)
                        .with_position(position),
                );
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>, position: Position) {
        let node = match tag {
            Tag::Paragraph => SemanticNode::element("p"),
            Tag::Heading(level, id, classes) => {
                let mut heading = SemanticNode::element(heading_tag(level));
                if let Some(id) = id {
                    heading = heading.with_attribute("id", id);
                }
                if !classes.is_empty() {
                    let classes: Vec<String> = classes.iter().map(|c| c.to_string()).collect();
                    heading = heading.with_attribute("class", classes);
                }
                heading
            }
            Tag::BlockQuote => SemanticNode::element("blockquote"),
            Tag::CodeBlock(kind) => {
                self.open(SemanticNode::element("pre").with_position(position));
                let mut code = SemanticNode::element("code");
                if let CodeBlockKind::Fenced(info) = kind {
                    if let Some(lang) = info.split_whitespace().next() {
                        code = code.with_attribute("class", vec![format!("language-{}", lang)]);
                    }
                }
                code
            }
            Tag::List(Some(start)) => {
                let list = SemanticNode::element("ol");
                if start != 1 {
                    list.with_attribute("start", start as i64)
                } else {
                    list
                }
            }
            Tag::List(None) => SemanticNode::element("ul"),
            Tag::Item => SemanticNode::element("li"),
            Tag::FootnoteDefinition(label) => SemanticNode::element("div")
                .with_attribute("id", format!("fn-{}", label))
                .with_attribute("class", vec!["footnote-definition".to_string()]),
            Tag::Table(alignments) => {
                self.table = Some(TableState {
                    alignments,
                    in_head: false,
                    cell: 0,
                });
                SemanticNode::element("table")
            }
            Tag::TableHead => {
                if let Some(table) = &mut self.table {
                    table.in_head = true;
                    table.cell = 0;
                }
                self.open(SemanticNode::element("thead").with_position(position));
                SemanticNode::element("tr")
            }
            Tag::TableRow => {
                if self.top_tag() == Some("table") {
                    self.open(SemanticNode::element("tbody").with_position(position));
                }
                if let Some(table) = &mut self.table {
                    table.cell = 0;
                }
                SemanticNode::element("tr")
            }
            Tag::TableCell => self.table_cell(),
            Tag::Emphasis => SemanticNode::element("em"),
            Tag::Strong => SemanticNode::element("strong"),
            Tag::Strikethrough => SemanticNode::element("del"),
            Tag::Link(link_type, dest, title) => {
                let href = match link_type {
                    LinkType::Email => format!("mailto:{}", dest),
                    _ => dest.to_string(),
                };
                let link = SemanticNode::element("a").with_attribute("href", href);
                if title.is_empty() {
                    link
                } else {
                    link.with_attribute("title", title.to_string())
                }
            }
            Tag::Image(_, dest, title) => {
                let image = SemanticNode::element("img").with_attribute("src", dest.to_string());
                if title.is_empty() {
                    image
                } else {
                    image.with_attribute("title", title.to_string())
                }
            }
        };
        self.open(node.with_position(position));
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::CodeBlock(_) => {
                self.close();
                self.close();
            }
            Tag::TableHead => {
                self.close();
                self.close();
                if let Some(table) = &mut self.table {
                    table.in_head = false;
                }
            }
            Tag::Table(_) => {
                if self.top_tag() == Some("tbody") {
                    self.close();
                }
                self.close();
                self.table = None;
            }
            Tag::Image(..) => {
                // The image description becomes its alt text.
                if let Some(SemanticNode::Element(image)) = self.stack.last_mut() {
                    let alt: String = image.children.drain(..).map(|c| c.text_content()).collect();
                    let at = image.attributes.len().min(1);
                    image
                        .attributes
                        .shift_insert(at, "alt".to_string(), PropertyValue::Text(alt));
                }
                self.close();
            }
            _ => self.close(),
        }
    }

    fn table_cell(&mut self) -> SemanticNode {
        let Some(table) = &mut self.table else {
            return SemanticNode::element("td");
        };
        let cell = SemanticNode::element(if table.in_head { "th" } else { "td" });
        let align = match table.alignments.get(table.cell) {
            Some(Alignment::Left) => Some("left"),
            Some(Alignment::Center) => Some("center"),
            Some(Alignment::Right) => Some("right"),
            Some(Alignment::None) | None => None,
        };
        table.cell += 1;
        match align {
            Some(align) => cell.with_attribute("align", align),
            None => cell,
        }
    }

    fn top_tag(&self) -> Option<&str> {
        self.stack.last().and_then(SemanticNode::tag_name)
    }

    fn open(&mut self, node: SemanticNode) {
        self.stack.push(node);
    }

    /// Pop the innermost open element into its parent
    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(mut node) = self.stack.pop() else {
            return;
        };
        if let SemanticNode::Element(el) = &mut node {
            let loose = match el.tag.as_str() {
                "blockquote" | "ol" | "ul" | "table" | "thead" | "tbody" | "tr" => true,
                "li" => el.children.iter().any(is_block),
                _ => false,
            };
            if loose {
                el.children = with_line_breaks(std::mem::take(&mut el.children), true);
            }
        }
        self.append(node);
    }

    /// Add a child to the innermost open node, merging adjacent text and
    /// adjacent raw markup
    fn append(&mut self, node: SemanticNode) {
        let Some(children) = self.stack.last_mut().and_then(SemanticNode::children_mut) else {
            return;
        };
        if let Some(last) = children.last_mut() {
            match (last, &node) {
                (SemanticNode::Text(prev), SemanticNode::Text(next)) => {
                    prev.value.push_str(&next.value);
                    return;
                }
                (SemanticNode::RawMarkup(prev), SemanticNode::RawMarkup(next)) => {
                    prev.value.push_str(&next.value);
                    return;
                }
                _ => {}
            }
        }
        children.push(node);
    }

    fn finish(mut self) -> SemanticNode {
        while self.stack.len() > 1 {
            self.close();
        }
        let mut root = self.stack.pop().unwrap_or_else(|| SemanticNode::root(Vec::new()));
        if let Some(children) = root.children_mut() {
            *children = with_line_breaks(std::mem::take(children), false);
        }
        root
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

fn is_block(node: &SemanticNode) -> bool {
    matches!(
        node.tag_name(),
        Some("p" | "ul" | "ol" | "pre" | "blockquote" | "table" | "hr" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    )
}

/// Separate nodes with `"\n"` text; `loose` also pads both ends.
fn with_line_breaks(nodes: Vec<SemanticNode>, loose: bool) -> Vec<SemanticNode> {
    let mut out = Vec::with_capacity(nodes.len() * 2 + 1);
    let non_empty = !nodes.is_empty();
    if loose {
        out.push(SemanticNode::text("\n"));
    }
    for (index, node) in nodes.into_iter().enumerate() {
        if index > 0 {
            out.push(SemanticNode::text("\n"));
        }
        out.push(node);
    }
    if loose && non_empty {
        out.push(SemanticNode::text("\n"));
    }
    out
}

//! A small HTML document tree built from rendered markdown.
//!
//! Markdown is rendered by pulldown-cmark and the resulting HTML, raw HTML
//! blocks included, is read back with a lenient quick-xml reader. Supports
//! what README mining needs: heading lookup by anchor, sections bounded by
//! the next heading of equal or shallower level, subtree copies, node
//! removal/insertion and serialization back to HTML.

use pulldown_cmark::{Options, Parser, html};
use quick_xml::escape::{partial_escape, resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "pre", "blockquote", "table",
    "thead", "tbody", "tr", "hr", "div",
];
/// Elements whose direct children are blocks; whitespace between them is
/// formatting, not content.
const BLOCK_CONTAINERS: &[&str] = &["ul", "ol", "blockquote", "table", "thead", "tbody", "tfoot", "tr"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        self.as_element().and_then(Element::heading_level)
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        let digit = self.tag.strip_prefix('h')?;
        match digit.parse::<u8>() {
            Ok(level @ 1..=6) => Some(level),
            _ => None,
        }
    }

    /// Anchor id of a heading.
    pub fn anchor(&self) -> Option<&str> {
        self.heading_level()?;
        self.attr("id")
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Elements named `tag` below this one, in document order.
    pub fn descendants<'a>(&'a self, tag: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        collect_elements(&self.children, tag, &mut out);
        out
    }
}

/// A sequence of top-level nodes; sections are documents of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn from_markdown(source: &str) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        let mut rendered = String::new();
        html::push_html(&mut rendered, Parser::new_ext(source, options));
        Self::from_html(&rendered)
    }

    /// Reads an HTML fragment. Unclosed elements end with their parent,
    /// stray end tags are ignored and void elements never take children.
    pub fn from_html(source: &str) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut builder = TreeBuilder::default();
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => builder.event(event),
                Err(err) => {
                    tracing::warn!(
                        position = reader.buffer_position(),
                        %err,
                        "stopped reading malformed HTML"
                    );
                    break;
                }
            }
        }
        builder.finish()
    }

    /// The section under the first heading accepted by `matches`: every
    /// following sibling up to, not including, the next heading of equal or
    /// higher rank. `None` when no heading matches.
    pub fn section<F>(&self, matches: F) -> Option<Document>
    where
        F: Fn(&Element) -> bool,
    {
        let (siblings, index) = find_heading(&self.nodes, &matches)?;
        Some(Document::new(section_after(siblings, index)))
    }

    /// The first heading accepted by `matches`, at any depth.
    pub fn heading<F>(&self, matches: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        let (siblings, index) = find_heading(&self.nodes, &matches)?;
        siblings[index].as_element()
    }

    /// Like [`Document::section`], for a heading already located among this
    /// document's top-level nodes.
    pub fn section_at(&self, index: usize) -> Document {
        Document::new(section_after(&self.nodes, index))
    }

    pub fn elements<'a>(&'a self, tag: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        collect_elements(&self.nodes, tag, &mut out);
        out
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.nodes, &mut out);
        out
    }

    pub fn prepend(&mut self, nodes: Vec<Node>) {
        self.nodes.splice(0..0, nodes);
    }

    /// Removes line breaks, pictures that stand alone in a paragraph or
    /// between blocks, and paragraphs left with no content.
    pub fn strip_layout(&mut self) {
        strip_layout(&mut self.nodes, true);
    }

    /// Applies `rewrite` to every `a[href]` and `img[src]`.
    pub fn rewrite_links<F>(&mut self, rewrite: F)
    where
        F: Fn(&str) -> String,
    {
        rewrite_links(&mut self.nodes, &rewrite);
    }

    pub fn to_html(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        write_nodes(&mut writer, &self.nodes);
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }
}

fn find_heading<'a, F>(nodes: &'a [Node], matches: &F) -> Option<(&'a [Node], usize)>
where
    F: Fn(&Element) -> bool,
{
    for (index, node) in nodes.iter().enumerate() {
        let Node::Element(el) = node else { continue };
        if el.heading_level().is_some() && matches(el) {
            return Some((nodes, index));
        }
        if let Some(found) = find_heading(&el.children, matches) {
            return Some(found);
        }
    }
    None
}

fn section_after(siblings: &[Node], index: usize) -> Vec<Node> {
    let Some(level) = siblings.get(index).and_then(Node::heading_level) else {
        return Vec::new();
    };
    siblings[index + 1..]
        .iter()
        .take_while(|node| node.heading_level().is_none_or(|next| next > level))
        .cloned()
        .collect()
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.tag == "img" => {
                out.push_str(el.attr("alt").unwrap_or_default());
            }
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn collect_elements<'a>(nodes: &'a [Node], tag: &str, out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.tag == tag {
                out.push(el);
            }
            collect_elements(&el.children, tag, out);
        }
    }
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn is_picture(node: &Node) -> bool {
    match node {
        Node::Element(el) if el.tag == "img" || el.tag == "br" => true,
        Node::Element(el) if el.tag == "a" => {
            el.children.iter().all(|child| is_picture(child) || child.is_blank_text())
                && !el.children.is_empty()
        }
        other => other.is_blank_text(),
    }
}

fn is_empty_paragraph(node: &Node) -> bool {
    match node {
        Node::Element(el) if el.tag == "p" => el.children.iter().all(Node::is_blank_text),
        _ => false,
    }
}

fn strip_layout(nodes: &mut Vec<Node>, block_level: bool) {
    for node in nodes.iter_mut() {
        let Node::Element(el) = node else { continue };
        if el.tag == "p" && el.children.iter().all(is_picture) {
            el.children.clear();
            continue;
        }
        let holds_blocks = BLOCK_CONTAINERS.contains(&el.tag.as_str());
        strip_layout(&mut el.children, holds_blocks);
    }
    nodes.retain(|node| {
        let is_break = matches!(node, Node::Element(el) if el.tag == "br");
        let stray_picture = block_level && is_picture(node);
        !is_break && !stray_picture && !is_empty_paragraph(node)
    });
}

fn rewrite_links(nodes: &mut [Node], rewrite: &dyn Fn(&str) -> String) {
    for node in nodes {
        let Node::Element(el) = node else { continue };
        let attr = match el.tag.as_str() {
            "a" => Some("href"),
            "img" => Some("src"),
            _ => None,
        };
        if let Some(name) = attr {
            if let Some(value) = el.attr(name) {
                let rewritten = rewrite(value);
                el.set_attr(name, rewritten);
            }
        }
        rewrite_links(&mut el.children, rewrite);
    }
}

fn write_nodes(writer: &mut Writer<Vec<u8>>, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => emit(writer, Event::Text(BytesText::from_escaped(partial_escape(text)))),
            Node::Element(el) => write_element(writer, el),
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) {
    let mut start = BytesStart::new(el.tag.as_str());
    for (name, value) in &el.attrs {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    emit(writer, Event::Start(start));
    if !is_void(&el.tag) {
        write_nodes(writer, &el.children);
        emit(writer, Event::End(BytesEnd::new(el.tag.as_str())));
    }
    if BLOCK_ELEMENTS.contains(&el.tag.as_str()) {
        emit(writer, Event::Text(BytesText::from_escaped("\n")));
    }
}

/// Writes into a `Vec`, which cannot fail.
fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) {
    let _ = writer.write_event(event);
}

/// Lowercased heading text with runs of non-alphanumerics collapsed to `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    root: Vec<Node>,
}

impl TreeBuilder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(start) => {
                let el = open(&start);
                if is_void(&el.tag) {
                    self.push(Node::Element(close(el)));
                } else {
                    self.stack.push(el);
                }
            }
            Event::Empty(start) => {
                let el = open(&start);
                self.push(Node::Element(close(el)));
            }
            Event::End(end) => self.end(&tag_name(end.name().as_ref())),
            Event::Text(text) => self.push_text(&decode(&String::from_utf8_lossy(&*text))),
            Event::CData(data) => self.push_text(&String::from_utf8_lossy(&*data)),
            _ => {}
        }
    }

    /// Closes `tag` along with anything left open inside it.
    fn end(&mut self, tag: &str) {
        if !self.stack.iter().any(|el| el.tag == tag) {
            return;
        }
        while let Some(el) = self.stack.pop() {
            let done = el.tag == tag;
            self.push(Node::Element(close(el)));
            if done {
                break;
            }
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        let (siblings, between_blocks) = match self.stack.last_mut() {
            Some(parent) => {
                let holds_blocks = BLOCK_CONTAINERS.contains(&parent.tag.as_str());
                (&mut parent.children, holds_blocks)
            }
            None => (&mut self.root, true),
        };
        if between_blocks && text.trim().is_empty() {
            return;
        }
        if let Some(Node::Text(previous)) = siblings.last_mut() {
            previous.push_str(text);
        } else {
            siblings.push(Node::Text(text.to_string()));
        }
    }

    fn finish(mut self) -> Document {
        while let Some(el) = self.stack.pop() {
            self.push(Node::Element(close(el)));
        }
        Document::new(self.root)
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Resolves character references, including HTML named entities. Text with
/// a bare `&` that is not a reference is kept as written.
fn decode(raw: &str) -> String {
    match unescape_with(raw, resolve_html5_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn open(start: &BytesStart<'_>) -> Element {
    let mut el = Element::new(tag_name(start.name().as_ref()));
    for attr in start.html_attributes().flatten() {
        let name = tag_name(attr.key.as_ref());
        let value = decode(&String::from_utf8_lossy(&attr.value));
        el.set_attr(&name, value);
    }
    el
}

fn close(mut el: Element) -> Element {
    if el.heading_level().is_some() && el.attr("id").is_none() {
        let slug = slugify(&el.text());
        el.set_attr("id", slug);
    }
    el
}

//! Minimal owned XML element tree.
//!
//! E-utilities `efetch` responses are parsed with `quick-xml` into [`XmlNode`] trees.
//! One `PubmedArticle` subtree is the unit ("blob") handed to the record extractor.
//! The tree keeps element order and mixed text content, which is all the extractor
//! needs; namespaces, comments and processing instructions are dropped.

use crate::error::{OptionExt, PubmedError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Element name of a single article inside an efetch `PubmedArticleSet`.
pub const ARTICLE_ELEMENT: &str = "PubmedArticle";

/// Child of an element: either a nested element or a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

/// An XML element with its attributes and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a complete document and return its root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(start_node(&e)?),
                Event::Empty(e) => {
                    let node = start_node(&e)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_parse("Unbalanced end tag")?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = match t.unescape() {
                            Ok(s) => s.into_owned(),
                            // Unknown DTD entities: keep the raw text rather than failing
                            Err(_) => String::from_utf8_lossy(&t).into_owned(),
                        };
                        parent.push_text(text);
                    }
                }
                Event::CData(c) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(String::from_utf8_lossy(&c.into_inner()).into_owned());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(PubmedError::Parse(format!(
                "Unexpected end of document inside <{}>",
                open.name
            )));
        }

        root.ok_or_parse("Document has no root element")
    }

    /// Append a child element (builder style, handy for constructing trees by hand).
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(XmlChild::Element(child));
        self
    }

    /// Append a text run.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text.into());
        self
    }

    fn push_text(&mut self, text: String) {
        if !text.is_empty() {
            self.children.push(XmlChild::Text(text));
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.elements().find(|e| e.name == name)
    }

    /// All direct child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// Follow a `/`-separated path of child names, taking the first match at each step.
    pub fn path(&self, path: &str) -> Option<&XmlNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Every element reachable through a `/`-separated path of child names.
    pub fn path_all(&self, path: &str) -> Vec<&XmlNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(vec![self], |nodes, step| {
                nodes
                    .into_iter()
                    .flat_map(|n| n.elements().filter(move |e| e.name == step))
                    .collect()
            })
    }

    /// Concatenated text of this element and all descendants, whitespace collapsed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// [`XmlNode::text`], or `None` when it is empty.
    pub fn text_opt(&self) -> Option<String> {
        Some(self.text()).filter(|t| !t.is_empty())
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// Split an efetch document into one blob per `PubmedArticle`.
///
/// Accepts either a `PubmedArticleSet` or a single bare `PubmedArticle` root.
pub fn split_articles(xml: &str) -> Result<Vec<XmlNode>> {
    let root = XmlNode::parse(xml)?;

    if root.name == ARTICLE_ELEMENT {
        return Ok(vec![root]);
    }

    let total_children = root.children.len();
    let articles: Vec<XmlNode> = root
        .children
        .into_iter()
        .filter_map(|c| match c {
            XmlChild::Element(e) if e.name == ARTICLE_ELEMENT => Some(e),
            _ => None,
        })
        .collect();

    debug!(
        root = %root.name,
        children = total_children,
        articles = articles.len(),
        "Split efetch document"
    );

    Ok(articles)
}

fn start_node(e: &BytesStart<'_>) -> Result<XmlNode> {
    let mut node = XmlNode::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());

    for attr in e.attributes() {
        let attr = attr.map_err(|err| PubmedError::Parse(format!("Bad attribute: {}", err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        node.attributes.push((key, value));
    }

    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlChild::Element(node));
        return Ok(());
    }
    if root.is_some() {
        return Err(PubmedError::Parse(format!(
            "Multiple root elements (second: <{}>)",
            node.name
        )));
    }
    *root = Some(node);
    Ok(())
}

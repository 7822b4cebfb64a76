//! Fetched record model.
//!
//! A [`Record`] is the opaque nested structure returned by a fetch call: one
//! article element of a PubMed article set, kept as a generic element tree.
//! Nothing about the presence of any path is guaranteed; field extraction
//! (see [`crate::extract`]) navigates the tree and classifies what it finds.
//!
//! Decoding uses a streaming `quick-xml` reader and builds the tree with an
//! explicit element stack.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;
use tracing::debug;

/// Root element of an efetch response.
const ARTICLE_SET: &str = "PubmedArticleSet";

/// Root element efetch uses to report request errors.
const FETCH_ERROR_ROOT: &str = "eFetchResult";

/// Article element names treated as records.
const ARTICLE_ELEMENTS: &[&str] = &["PubmedArticle", "PubmedBookArticle"];

/// Errors produced while decoding a fetch response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The XML reader rejected the document.
    #[error("XML error at byte {position}: {message}")]
    Xml {
        /// Byte offset reported by the reader.
        position: usize,
        /// Reader error message.
        message: String,
    },

    /// The body ended with elements still open.
    #[error("document truncated inside <{open}>")]
    Truncated {
        /// Innermost element left open.
        open: String,
    },

    /// The body contains no root element.
    #[error("document has no root element")]
    Empty,

    /// More than one top-level element.
    #[error("document has more than one root element (second: <{name}>)")]
    MultipleRoots {
        /// Name of the extra root element.
        name: String,
    },

    /// The root element is not an article set.
    #[error("unexpected root element <{name}>")]
    UnexpectedRoot {
        /// Name of the root element found.
        name: String,
    },

    /// The service returned an error document instead of articles.
    #[error("service reported an error: {message}")]
    Service {
        /// Error text from the response.
        message: String,
    },
}

/// One node of an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A nested element.
    Element(Element),
    /// Character data (already unescaped).
    Text(String),
}

/// A generic XML element: name, attributes and ordered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or content.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: Vec::new(),
        }
    }

    /// Appends a child element (builder style).
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.content.push(Node::Element(child));
        self
    }

    /// Appends character data (builder style).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Node::Text(text.into()));
        self
    }

    /// Adds an attribute (builder style).
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Ordered content nodes.
    #[must_use]
    pub fn content(&self) -> &[Node] {
        &self.content
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given name, in document order.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements().filter(move |element| element.name == name)
    }

    /// First child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children_named(name).next()
    }

    /// Concatenated character data of this element and all descendants.
    ///
    /// Inline markup such as `<i>` or `<sup>` is flattened into its text.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.content {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, RecordError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| RecordError::Xml {
                position: 0,
                message: e.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| RecordError::Xml {
                    position: 0,
                    message: e.to_string(),
                })?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            content: Vec::new(),
        })
    }
}

/// One fetched record: an article element and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    root: Element,
}

impl Record {
    /// Wraps an article element as a record.
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// The article element.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Article kind (`PubmedArticle`, `PubmedBookArticle`, ...).
    #[must_use]
    pub fn kind(&self) -> &str {
        self.root.name()
    }

    /// The record's PMID when present, for diagnostics.
    #[must_use]
    pub fn pmid(&self) -> Option<String> {
        ["MedlineCitation", "BookDocument"]
            .iter()
            .find_map(|container| self.root.child(container)?.child("PMID"))
            .map(|pmid| pmid.text_content().trim().to_string())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pmid() {
            Some(pmid) => write!(f, "{} {pmid}", self.kind()),
            None => write!(f, "{} (no PMID)", self.kind()),
        }
    }
}

/// Parses an XML document into its root element.
///
/// # Errors
///
/// Returns [`RecordError`] for malformed, truncated or empty documents.
pub fn parse_document(xml: &str) -> Result<Element, RecordError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buffer = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buffer)
            .map_err(|e| RecordError::Xml {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;

        match event {
            Event::Start(ref e) => stack.push(Element::from_start(e)?),
            Event::Empty(ref e) => {
                let element = Element::from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| RecordError::Xml {
                    position: reader.buffer_position(),
                    message: "closing tag without matching opening tag".to_string(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| RecordError::Xml {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?;
                    current.content.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .content
                        .push(Node::Text(String::from_utf8_lossy(e).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }

        buffer.clear();
    }

    if let Some(open) = stack.last() {
        return Err(RecordError::Truncated {
            open: open.name.clone(),
        });
    }

    root.ok_or(RecordError::Empty)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), RecordError> {
    if let Some(parent) = stack.last_mut() {
        parent.content.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(RecordError::MultipleRoots { name: element.name });
    }
    *root = Some(element);
    Ok(())
}

/// Decodes an efetch article-set response into records, in document order.
///
/// Article elements (`PubmedArticle`, `PubmedBookArticle`) become records;
/// other children of the set (e.g. `DeleteCitation`) are skipped.
///
/// # Errors
///
/// Returns [`RecordError::Service`] for an efetch error document, and other
/// [`RecordError`] variants when the body is not a well-formed article set.
pub fn parse_article_set(xml: &str) -> Result<Vec<Record>, RecordError> {
    let root = parse_document(xml)?;

    if root.name == FETCH_ERROR_ROOT {
        let message = root
            .child("ERROR")
            .map_or_else(|| root.text_content(), Element::text_content);
        return Err(RecordError::Service {
            message: message.trim().to_string(),
        });
    }

    if root.name != ARTICLE_SET {
        return Err(RecordError::UnexpectedRoot { name: root.name });
    }

    let mut records = Vec::new();
    for node in root.content {
        let Node::Element(element) = node else {
            continue;
        };
        if ARTICLE_ELEMENTS.contains(&element.name.as_str()) {
            records.push(Record::new(element));
        } else {
            debug!(element = %element.name, "skipping non-article element in article set");
        }
    }

    Ok(records)
}

/// Parses a single article element into a record.
///
/// # Errors
///
/// Returns [`RecordError`] when the document is malformed.
pub fn parse_record(xml: &str) -> Result<Record, RecordError> {
    parse_document(xml).map(Record::new)
}

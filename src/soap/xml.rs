//! Minimal element tree over quick-xml events.
//!
//! Replies are small, so they are read into a tree of local names,
//! attributes and text and navigated from there. Namespace prefixes are
//! dropped: OPC XML-DA replies use one namespace per envelope part.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::soap::error::RpcError;

/// One decoded element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Concatenated, unescaped text content.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, RpcError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => open.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let element = Self::open(&start)?;
                    Self::close(&mut open, &mut root, element);
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| RpcError::Decode("unbalanced end tag".into()))?;
                    Self::close(&mut open, &mut root, element);
                }
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !open.is_empty() {
            return Err(RpcError::Decode("unexpected end of document".into()));
        }
        root.ok_or_else(|| RpcError::Decode("empty document".into()))
    }

    fn open(start: &BytesStart<'_>) -> Result<Element, RpcError> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            if key == "xmlns" || attr.key.as_ref().starts_with(b"xmlns:") {
                continue;
            }
            attrs.push((key, attr.unescape_value()?.into_owned()));
        }
        Ok(Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attrs,
            ..Default::default()
        })
    }

    fn close(open: &mut [Element], root: &mut Option<Element>, element: Element) {
        match open.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value or empty text.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or_default()
    }

    /// xsd:boolean attribute; absent reads as false.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.attr(name).map(str::trim), Some("true") | Some("1"))
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child called `name`, or empty.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map_or("", |c| c.text.as_str())
    }
}

/// Append ` name="value"` with the value escaped. Empty values are skipped.
pub fn push_attr(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

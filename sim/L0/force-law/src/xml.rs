//! XML configuration codec.
//!
//! Force law configurations are stored as nested elements whose leaves carry a
//! single scalar as text, e.g.
//!
//! ```xml
//! <PlanarCoulombFriction>
//!   <frictionCoefficient>0.3</frictionCoefficient>
//! </PlanarCoulombFriction>
//! ```
//!
//! The document is read into a small [`XmlElement`] tree, which the
//! [`XmlConfig`] implementations of the laws then interpret. Writing goes the
//! other way. Floats are written with Rust's shortest round-trip formatting, so
//! a value read back compares equal to the value written.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ForceLawError, Result};

/// A parsed XML element: name, concatenated text content and child elements.
///
/// Attributes are ignored; configuration values always live in leaf elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Element name.
    pub name: String,
    /// Trimmed text content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Create a leaf element holding a single value.
    #[must_use]
    pub fn leaf(name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self {
            name: name.into(),
            text: value.to_string(),
            children: Vec::new(),
        }
    }

    /// Create a leaf holding a whitespace separated list of floats.
    #[must_use]
    pub fn float_list(name: impl Into<String>, values: &[f64]) -> Self {
        let text = values
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Self::leaf(name, text)
    }

    /// Append a child element.
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child element in place.
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child element, whatever its name.
    #[must_use]
    pub fn first_child(&self) -> Option<&XmlElement> {
        self.children.first()
    }

    /// Child with the given name, or a [`ForceLawError::MissingElement`].
    pub fn required_child(&self, name: &'static str) -> Result<&XmlElement> {
        self.child(name)
            .ok_or_else(|| ForceLawError::missing_element(name, self.name.clone()))
    }

    /// Interpret the text content as a float.
    pub fn text_f64(&self) -> Result<f64> {
        self.text
            .trim()
            .parse::<f64>()
            .map_err(|_| ForceLawError::invalid_value(&self.name, format!("invalid float: {}", self.text)))
    }

    /// Interpret the text content as a whitespace separated list of floats.
    pub fn text_f64_list(&self) -> Result<Vec<f64>> {
        self.text
            .split_whitespace()
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|_| ForceLawError::invalid_value(&self.name, format!("invalid float: {p}")))
            })
            .collect()
    }

    /// Required float leaf child.
    pub fn f64_child(&self, name: &'static str) -> Result<f64> {
        self.required_child(name)?.text_f64()
    }

    /// Optional float leaf child. `Ok(None)` when absent.
    pub fn opt_f64_child(&self, name: &str) -> Result<Option<f64>> {
        self.child(name).map(XmlElement::text_f64).transpose()
    }

    /// Required text leaf child.
    pub fn text_child(&self, name: &'static str) -> Result<&str> {
        Ok(self.required_child(name)?.text.trim())
    }

    /// Check the element name, reporting an unknown element otherwise.
    pub fn expect_name(&self, name: &str, context: &'static str) -> Result<()> {
        if self.name == name {
            Ok(())
        } else {
            Err(ForceLawError::UnknownElement {
                name: self.name.clone(),
                context,
            })
        }
    }

    /// Parse an XML document and return its root element.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed or has no root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Self::new(element_name(e))),
                Ok(Event::Empty(ref e)) => {
                    let element = Self::new(element_name(e));
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ForceLawError::XmlParse(e.to_string()))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(text.trim());
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ForceLawError::XmlParse("unbalanced end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(ForceLawError::XmlParse(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(ForceLawError::XmlParse("unclosed element at end of input".into()));
        }
        root.ok_or_else(|| ForceLawError::XmlParse("document has no root element".into()))
    }

    /// Write the element as an indented XML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| ForceLawError::XmlWrite(format!("failed to write XML declaration: {e}")))?;
        self.write_into(&mut writer)?;
        String::from_utf8(buffer)
            .map_err(|e| ForceLawError::XmlWrite(format!("invalid UTF-8 in generated XML: {e}")))
    }

    fn write_into<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if self.children.is_empty() && self.text.is_empty() {
            return writer
                .write_event(Event::Empty(BytesStart::new(self.name.as_str())))
                .map_err(|e| ForceLawError::XmlWrite(format!("failed to write {}: {e}", self.name)));
        }
        writer
            .write_event(Event::Start(BytesStart::new(self.name.as_str())))
            .map_err(|e| ForceLawError::XmlWrite(format!("failed to open {}: {e}", self.name)))?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(|e| ForceLawError::XmlWrite(format!("failed to write text of {}: {e}", self.name)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| ForceLawError::XmlWrite(format!("failed to close {}: {e}", self.name)))?;
        Ok(())
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(ForceLawError::XmlParse("multiple root elements".into()))
    }
}

/// Symmetric XML codec for configuration types.
///
/// `from_xml(&x.to_xml()?)` reproduces every configuration parameter of `x`.
/// Optional leaf elements that are absent keep the type's compiled-in default.
pub trait XmlConfig: Sized {
    /// Serialize the configuration into an element tree.
    fn to_xml(&self) -> Result<XmlElement>;

    /// Build the configuration from an element tree.
    fn from_xml(element: &XmlElement) -> Result<Self>;

    /// Serialize into an XML document string.
    fn to_xml_string(&self) -> Result<String> {
        self.to_xml()?.to_xml_string()
    }

    /// Parse from an XML document string.
    fn from_xml_str(xml: &str) -> Result<Self> {
        Self::from_xml(&XmlElement::parse(xml)?)
    }
}

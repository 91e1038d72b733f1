use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

// ─── Namespaces ───────────────────────────────────────────────

pub const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const OMG_DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const OMG_DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Canonical vendor extension namespace. Every configured engine namespace is
/// folded onto this URI while reading, so lookups only ever check one value.
pub const ENGINE_NS: &str = "http://camunda.org/schema/1.0/bpmn";
pub const LEGACY_ENGINE_NS: &str = "http://activiti.org/bpmn";

#[derive(Debug, Clone, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct XmlError {
    pub line: u32,
    pub message: String,
}

// ─── Tree ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// Owned, namespace-resolved element. Text and CDATA content of direct
/// children is concatenated into `text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    /// `xmlns:prefix` declarations made on this element (default namespace under "").
    pub namespace_declarations: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
    /// 1-based line of the start tag.
    pub line: u32,
}

impl XmlElement {
    /// Attribute without a namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Vendor extension attribute (`camunda:name`).
    pub fn engine_attr(&self, name: &str) -> Option<&str> {
        self.attr_ns(ENGINE_NS, name)
    }

    /// Plain attribute, or `None` when absent or blank.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.trim().is_empty())
    }

    pub fn non_empty_engine_attr(&self, name: &str) -> Option<&str> {
        self.engine_attr(name).filter(|v| !v.trim().is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn is_bpmn(&self, name: &str) -> bool {
        self.name == name && self.namespace.as_deref().map_or(true, |ns| ns == BPMN_NS)
    }

    pub fn is_engine(&self, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(ENGINE_NS)
    }

    /// First BPMN child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is_bpmn(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is_bpmn(name))
    }

    pub fn engine_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is_engine(name))
    }

    pub fn engine_children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is_engine(name))
    }

    pub fn child_ns(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace.as_deref() == Some(namespace))
    }

    pub fn children_ns<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name == name && c.namespace.as_deref() == Some(namespace))
    }

    /// `<extensionElements><camunda:NAME/></extensionElements>`, first match.
    pub fn extension(&self, name: &str) -> Option<&XmlElement> {
        self.child("extensionElements")
            .and_then(|ext| ext.engine_child(name))
    }

    pub fn extensions<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child("extensionElements")
            .into_iter()
            .flat_map(move |ext| ext.engine_children(name))
    }

    /// Trimmed text content.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Child text, trimmed; `None` when the child is missing.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text())
    }

    /// Visit this element and every descendant, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a XmlElement)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

// ─── Reader ───────────────────────────────────────────────────

struct Frame {
    element: XmlElement,
    declared: HashMap<String, String>,
}

/// Parse a document into an owned element tree.
///
/// Namespace URIs listed in `engine_namespaces` are rewritten to [`ENGINE_NS`].
pub fn parse_document(xml: &str, engine_namespaces: &[String]) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut lines = LineCounter::new(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let line = lines.line_at(offset);
        let event = reader.read_event().map_err(|e| XmlError {
            line: lines.line_at(reader.buffer_position() as usize),
            message: e.to_string(),
        })?;
        match event {
            Event::Start(start) => {
                let frame = open_element(&start, line, &stack, engine_namespaces)?;
                stack.push(frame);
            }
            Event::Empty(start) => {
                let frame = open_element(&start, line, &stack, engine_namespaces)?;
                close_element(frame.element, &mut stack, &mut root, line)?;
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or_else(|| XmlError {
                    line,
                    message: "unbalanced end tag".to_string(),
                })?;
                close_element(frame.element, &mut stack, &mut root, line)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let value = text.unescape().map_err(|e| XmlError {
                        line,
                        message: e.to_string(),
                    })?;
                    top.element.text.push_str(&value);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.element
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError {
            line: open.element.line,
            message: format!("element '{}' is never closed", open.element.name),
        });
    }
    root.ok_or_else(|| XmlError {
        line: 1,
        message: "document has no root element".to_string(),
    })
}

fn open_element(
    start: &BytesStart<'_>,
    line: u32,
    stack: &[Frame],
    engine_namespaces: &[String],
) -> Result<Frame, XmlError> {
    let xml_err = |message: String| XmlError { line, message };

    let mut declared = HashMap::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_err(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_err(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            declared.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.insert(prefix.to_string(), value);
        } else {
            raw_attributes.push((key, value));
        }
    }

    let lookup = |prefix: &str| -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NS.to_string());
        }
        declared
            .get(prefix)
            .or_else(|| stack.iter().rev().find_map(|f| f.declared.get(prefix)))
            .map(|uri| normalize_namespace(uri, engine_namespaces))
    };

    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (namespace, name) = match qname.split_once(':') {
        Some((prefix, local)) => {
            let uri = lookup(prefix)
                .ok_or_else(|| xml_err(format!("undeclared namespace prefix '{prefix}'")))?;
            (Some(uri), local.to_string())
        }
        None => (lookup("").filter(|uri| !uri.is_empty()), qname.clone()),
    };

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let attribute = match key.split_once(':') {
            Some((prefix, local)) => XmlAttribute {
                namespace: Some(lookup(prefix).ok_or_else(|| {
                    xml_err(format!("undeclared namespace prefix '{prefix}'"))
                })?),
                name: local.to_string(),
                value,
            },
            None => XmlAttribute {
                namespace: None,
                name: key,
                value,
            },
        };
        attributes.push(attribute);
    }

    let mut namespace_declarations: Vec<(String, String)> = declared
        .iter()
        .map(|(p, uri)| (p.clone(), uri.clone()))
        .collect();
    namespace_declarations.sort();

    Ok(Frame {
        element: XmlElement {
            namespace,
            name,
            attributes,
            namespace_declarations,
            children: Vec::new(),
            text: String::new(),
            line,
        },
        declared,
    })
}

fn close_element(
    element: XmlElement,
    stack: &mut [Frame],
    root: &mut Option<XmlElement>,
    line: u32,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.element.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlError {
                line,
                message: "more than one root element".to_string(),
            })
        }
    }
    Ok(())
}

fn normalize_namespace(uri: &str, engine_namespaces: &[String]) -> String {
    if engine_namespaces.iter().any(|ns| ns == uri) {
        ENGINE_NS.to_string()
    } else {
        uri.to_string()
    }
}

/// Maps byte offsets to 1-based line numbers; offsets must be non-decreasing.
struct LineCounter<'a> {
    source: &'a [u8],
    offset: usize,
    line: u32,
}

impl<'a> LineCounter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> u32 {
        let end = offset.min(self.source.len());
        if end > self.offset {
            self.line += self.source[self.offset..end]
                .iter()
                .filter(|b| **b == b'\n')
                .count() as u32;
            self.offset = end;
        }
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engines() -> Vec<String> {
        vec![ENGINE_NS.to_string(), LEGACY_ENGINE_NS.to_string()]
    }

    /// Prefixed elements and attributes resolve to their namespace URI.
    #[test]
    fn t_xml_1_namespaces_resolved() {
        let xml = r#"<?xml version="1.0"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL"
                  xmlns:activiti="http://activiti.org/bpmn">
  <bpmn:process id="p" activiti:async="true">
    <bpmn:documentation>hello &amp; bye</bpmn:documentation>
  </bpmn:process>
</bpmn:definitions>"#;
        let root = parse_document(xml, &engines()).unwrap();
        assert!(root.is_bpmn("definitions"));
        let process = root.child("process").unwrap();
        assert_eq!(process.id(), Some("p"));
        assert_eq!(process.engine_attr("async"), Some("true"));
        assert_eq!(process.line, 4);
        assert_eq!(process.child_text("documentation"), Some("hello & bye"));
    }

    /// The default namespace applies to children; CDATA joins the text.
    #[test]
    fn t_xml_2_default_namespace_and_cdata() {
        let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="p"><scriptTask id="s"><script><![CDATA[a < b]]></script></scriptTask></process>
</definitions>"#;
        let root = parse_document(xml, &engines()).unwrap();
        let script = root
            .child("process")
            .and_then(|p| p.child("scriptTask"))
            .and_then(|s| s.child("script"))
            .unwrap();
        assert_eq!(script.text(), "a < b");
        assert_eq!(script.namespace.as_deref(), Some(BPMN_NS));
    }

    /// Malformed input reports the failing line.
    #[test]
    fn t_xml_3_malformed_reports_line() {
        let xml = "<definitions>\n<process>\n</definitions>";
        let err = parse_document(xml, &engines()).unwrap_err();
        assert!(err.line >= 2, "line was {}", err.line);
    }

    /// An undeclared prefix is a parse error.
    #[test]
    fn t_xml_4_undeclared_prefix_rejected() {
        let xml = "<x:definitions/>";
        assert!(parse_document(xml, &engines()).is_err());
    }
}

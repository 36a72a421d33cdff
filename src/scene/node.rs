//! Minimal SVG node tree and writer.

use std::fmt::Write as _;

/// A node of the emitted scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Text content, written line by line at the node's indentation.
    Text(String),
    /// Markup copied verbatim (inlined asset content).
    Raw(String),
}

impl Node {
    /// Writes the node with two-space indentation per depth level.
    pub fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Element(element) => element.write(out, depth),
            Self::Text(text) => {
                for line in text.lines() {
                    let _ = writeln!(out, "{indent}{line}");
                }
            }
            Self::Raw(markup) => {
                out.push_str(markup);
                out.push('\n');
            }
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

/// An element with ordered attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &'static str, value: impl ToString) -> Self {
        self.attrs.push((key, value.to_string()));
        self
    }

    /// Adds the attribute only when `value` is `Some`.
    pub fn attr_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text and raw nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// This element and all descendant elements, depth first.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = vec![self];
        for child in self.child_elements() {
            found.extend(child.descendants());
        }
        found
    }

    /// Counts this element and its descendants named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.descendants().iter().filter(|e| e.name == name).count()
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}<{}", self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {key}=\"{}\"", escape(value));
        }
        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for child in &self.children {
            child.write(out, depth + 1);
        }
        let _ = writeln!(out, "{indent}</{}>", self.name);
    }

    /// Serializes the element tree.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }
}

/// Escapes text for an attribute value.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Formats a number rounded to four decimals without trailing zeros.
pub fn num(value: f64) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// `url(#id)` reference.
pub fn url(id: &str) -> String {
    format!("url(#{id})")
}

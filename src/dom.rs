use anyhow::{bail, Result};
use quick_xml::events::{BytesStart, Event};

/// One element of the parsed feed: name, attributes in source order,
/// child elements in document order, and the element's own text content.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

/// A parsed feed document. `root` is synthetic; the feed's top-level
/// elements are its children, so `descendants()` covers the whole tree.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    /// All elements of the document in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        self.root.descendants()
    }
}

impl Element {
    /// Attribute value by name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first, left-to-right walk of the subtree, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.children.iter().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// Concatenated text of this element and all descendants, in document
    /// order. Mirrors `XElement.Value` in the feed's reference consumer:
    /// a `<temperature><value>37</value></temperature>` yields "37".
    pub fn value(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.value());
        }
        out
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        self.stack.extend(el.children.iter().rev());
        Some(el)
    }
}

/// Parse an XML string into a `Document` tree.
///
/// Whitespace-only text nodes are dropped (indentation between elements);
/// any text node with visible content is kept verbatim, surrounding
/// padding included — trimming is the sink's job, not the parser's.
pub fn parse(xml: &str) -> Result<Document> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut stack = vec![Element::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                stack.push(open_element(&e)?);
            }
            Event::Empty(e) => {
                let elem = open_element(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => bail!("unbalanced document"),
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if !text.trim().is_empty() {
                    match stack.last_mut() {
                        Some(el) => el.text.push_str(&text),
                        None => bail!("unbalanced document"),
                    }
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                match stack.last_mut() {
                    Some(el) => el.text.push_str(&text),
                    None => bail!("unbalanced document"),
                }
            }
            Event::End(_) => {
                let done = match stack.pop() {
                    Some(el) => el,
                    None => bail!("unbalanced document"),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => bail!("closing tag without matching opening tag"),
                }
            }
            Event::Eof => break,
            _ => {} // declarations, comments, processing instructions
        }
        buf.clear();
    }

    if stack.len() != 1 {
        bail!("document ended with unclosed elements");
    }
    let root = stack.remove(0);
    if root.children.is_empty() {
        bail!("document contains no elements");
    }
    Ok(Document { root })
}

fn open_element(e: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_structure() {
        let doc = parse("<a><b one=\"1\"><c>hi</c></b><b/></a>").unwrap();
        let a = doc.descendants().next().unwrap();
        assert_eq!(a.name, "a");
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].attr("one"), Some("1"));
        assert_eq!(a.children[0].children[0].value(), "hi");
    }

    #[test]
    fn descendants_are_document_order() {
        let doc = parse("<r><a><b/><c/></a><d/></r>").unwrap();
        let names: Vec<&str> = doc.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["r", "a", "b", "c", "d"]);
    }

    #[test]
    fn attribute_entities_unescaped() {
        let doc = parse("<a title=\"rain &amp; snow\"/>").unwrap();
        let a = doc.descendants().next().unwrap();
        assert_eq!(a.attr("title"), Some("rain & snow"));
    }

    #[test]
    fn indentation_dropped_but_padding_kept() {
        let doc = parse("<a>\n  <b>  Cloudy  </b>\n</a>").unwrap();
        let a = doc.descendants().next().unwrap();
        // Whitespace between elements is not part of the value;
        // padding inside a text node survives untouched.
        assert_eq!(a.value(), "  Cloudy  ");
    }

    #[test]
    fn subtree_value_concatenates() {
        let doc = parse("<t><value><visibility>10.00</visibility></value></t>").unwrap();
        let t = doc.descendants().next().unwrap();
        assert_eq!(t.value(), "10.00");
    }

    #[test]
    fn malformed_input_errors() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("").is_err());
    }
}

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::errors::ParseError;

/// A generic XML element tree, used both as the intermediate form fed to entry extraction
/// (§4.1) and as the shape behind the recursive JSON encoding of comments/features/evidence.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub(crate) fn from_start(e: &quick_xml::events::BytesStart) -> Result<Element, ParseError> {
        let tag = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| ParseError::InvalidValue {
                field: "attribute",
                value: err.to_string(),
            })?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value().map_err(ParseError::Xml)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element { tag, attributes, text: None, children: Vec::new() })
    }

    pub(crate) fn push_text(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        match &mut self.text {
            Some(existing) => existing.push_str(chunk),
            None => self.text = Some(chunk.to_string()),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn text_trimmed(&self) -> Option<String> {
        self.text.as_ref().map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }

    /// Parses a single root element (typically one `<entry>`) from a complete, well-formed
    /// XML fragment. The fragment need not include an XML declaration.
    pub fn parse(bytes: &[u8]) -> Result<Element, ParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(ParseError::Xml)? {
                Event::Start(e) => {
                    stack.push(Element::from_start(&e)?);
                }
                Event::Empty(e) => {
                    let el = Element::from_start(&e)?;
                    push_finished(&mut stack, &mut root, el);
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t.unescape().map_err(ParseError::Xml)?.into_owned();
                        top.push_text(&text);
                    }
                }
                Event::CData(t) => {
                    if let Some(top) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                        top.push_text(&text);
                    }
                }
                Event::End(_) => {
                    let el = stack.pop().ok_or_else(|| ParseError::InvalidValue {
                        field: "xml",
                        value: "unbalanced element".to_string(),
                    })?;
                    push_finished(&mut stack, &mut root, el);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        root.ok_or(ParseError::InvalidValue { field: "xml", value: "empty document".to_string() })
    }

    /// Encodes this element as `{"tag", "attributes"?, "text"?, "children"?}`, omitting keys
    /// whose value is empty (§4.1's recursive JSON encoding contract).
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("tag".to_string(), Value::String(self.tag.clone()));

        if !self.attributes.is_empty() {
            let mut attrs = Map::new();
            for (k, v) in &self.attributes {
                attrs.insert(k.clone(), Value::String(v.clone()));
            }
            map.insert("attributes".to_string(), Value::Object(attrs));
        }

        if let Some(text) = self.text_trimmed() {
            map.insert("text".to_string(), Value::String(text));
        }

        if !self.children.is_empty() {
            let children: Vec<Value> = self.children.iter().map(Element::to_json).collect();
            map.insert("children".to_string(), Value::Array(children));
        }

        Value::Object(map)
    }
}

fn push_finished(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

/// Encodes a list of elements as a compact JSON array, or `null` if the list is empty — the
/// empty-list-is-null contract (§4.1) that distinguishes "not collected" from "collected, none
/// present" is enforced by callers passing an empty `Vec` only when the field should be null.
pub fn encode_list(elements: &[&Element]) -> Value {
    if elements.is_empty() {
        return Value::Null;
    }
    Value::Array(elements.iter().map(|e| e.to_json()).collect())
}

pub fn encode_list_to_string(elements: &[&Element]) -> Option<String> {
    match encode_list(elements) {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_attributes_and_text() {
        let xml = br#"<entry created="2024-01-01"><accession>P12345</accession><sequence length="10">MTESTSEQAA</sequence></entry>"#;
        let entry = Element::parse(xml).unwrap();
        assert_eq!(entry.tag, "entry");
        assert_eq!(entry.attr("created"), Some("2024-01-01"));
        assert_eq!(entry.child("accession").and_then(Element::text_trimmed), Some("P12345".to_string()));
        assert_eq!(entry.child("sequence").and_then(|s| s.attr("length")).map(str::to_string), Some("10".to_string()));
    }

    #[test]
    fn empty_element_list_encodes_as_null_not_empty_array() {
        let elements: Vec<&Element> = Vec::new();
        assert_eq!(encode_list(&elements), Value::Null);
        assert_eq!(encode_list_to_string(&elements), None);
    }

    #[test]
    fn non_empty_element_list_round_trips_tag_and_attributes() {
        let comment = Element::parse(br#"<comment type="function"><text>does a thing</text></comment>"#).unwrap();
        let encoded = encode_list(&[&comment]);
        let array = encoded.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["tag"], "comment");
        assert_eq!(array[0]["attributes"]["type"], "function");
        assert_eq!(array[0]["children"][0]["text"], "does a thing");
    }

    #[test]
    fn absent_keys_are_omitted_rather_than_null() {
        let el = Element::parse(b"<keyword>Metal-binding</keyword>").unwrap();
        let json = el.to_json();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("attributes"));
        assert!(!obj.contains_key("children"));
        assert_eq!(obj["text"], "Metal-binding");
    }
}

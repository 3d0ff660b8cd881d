use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::ParseError;
use crate::xml::element::Element;

/// Streams `<entry>` elements out of a UniProt XML document one at a time, discarding
/// everything outside the currently open entry so memory use stays O(1) per entry regardless
/// of file size (§4.1).
pub struct EntryStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> EntryStream<R> {
    pub fn new(inner: R) -> EntryStream<R> {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        EntryStream { reader, buf: Vec::new() }
    }

    /// Returns the next entry element, or `Ok(None)` at end of document.
    pub fn next_entry(&mut self) -> Result<Option<Element>, ParseError> {
        loop {
            match self.reader.read_event_into(&mut self.buf).map_err(ParseError::Xml)? {
                Event::Start(e) if e.local_name().as_ref() == b"entry" => {
                    let element = read_subtree(&mut self.reader, &e)?;
                    self.buf.clear();
                    return Ok(Some(element));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
            self.buf.clear();
        }
    }
}

fn read_subtree<R: BufRead>(
    reader: &mut Reader<R>,
    root_start: &quick_xml::events::BytesStart,
) -> Result<Element, ParseError> {
    let mut stack = vec![Element::from_start(root_start)?];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(ParseError::Xml)? {
            Event::Start(e) => {
                stack.push(Element::from_start(&e)?);
            }
            Event::Empty(e) => {
                let el = Element::from_start(&e)?;
                let parent = stack.last_mut().expect("root entry element is always on the stack");
                parent.children.push(el);
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
                let el = stack.pop().expect("unbalanced xml inside entry");
                if stack.is_empty() {
                    return Ok(el);
                }
                stack.last_mut().unwrap().children.push(el);
            }
            Event::Eof => {
                return Err(ParseError::InvalidValue {
                    field: "xml",
                    value: "unexpected end of file inside <entry>".to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Counts entries in a separate, cheap streaming pass so the caller can size a progress bar
/// before the real (and much more expensive) parallel parse begins.
pub fn count_entries<R: BufRead>(inner: R) -> Result<u64, ParseError> {
    let mut reader = Reader::from_reader(inner);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        match reader.read_event_into(&mut buf).map_err(ParseError::Xml)? {
            Event::Start(e) if e.local_name().as_ref() == b"entry" => count += 1,
            Event::Empty(e) if e.local_name().as_ref() == b"entry" => count += 1,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(count)
}

//! Incremental markup tokenizer.
//!
//! Wraps `quick-xml` so input can arrive in arbitrary chunks. Each call to
//! [`Tokenizer::feed`] tokenizes everything up to the last complete markup
//! construct and keeps the rest for the next chunk, so an element name,
//! attribute value or text run is never split across events.

use std::mem;

use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;

use crate::error::{ParseError, ParseResult};
use crate::value::Attributes;

/// Events delivered to the stack machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Open { tag: String, attributes: Attributes },
    Text(String),
    Close,
}

/// Chunked front end over `quick_xml::Reader`.
#[derive(Debug, Default)]
pub struct Tokenizer {
    pending: String,
    // `pending[..scanned]` is plain text already searched for markup
    scanned: usize,
    open: Vec<String>,
    consumed: u64,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and emit events for every complete construct.
    pub fn feed<F>(&mut self, chunk: &str, sink: &mut F) -> ParseResult<()>
    where
        F: FnMut(Event) -> ParseResult<()>,
    {
        self.pending.push_str(chunk);
        let (cut, scanned) = complete_prefix(&self.pending, self.scanned);
        self.scanned = scanned - cut;
        if cut == 0 {
            return Ok(());
        }
        let ready: String = self.pending.drain(..cut).collect();
        self.tokenize(&ready, sink)?;
        self.consumed += cut as u64;
        Ok(())
    }

    /// Flush the remaining input and check every element was closed.
    pub fn finish<F>(&mut self, sink: &mut F) -> ParseResult<()>
    where
        F: FnMut(Event) -> ParseResult<()>,
    {
        let rest = mem::take(&mut self.pending);
        self.scanned = 0;
        if !rest.is_empty() {
            self.tokenize(&rest, sink)?;
            self.consumed += rest.len() as u64;
        }
        match self.open.last() {
            Some(tag) => Err(ParseError::Markup {
                offset: self.consumed,
                message: format!("element <{}> is never closed", tag),
            }),
            None => Ok(()),
        }
    }

    fn tokenize<F>(&mut self, input: &str, sink: &mut F) -> ParseResult<()>
    where
        F: FnMut(Event) -> ParseResult<()>,
    {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        // End tags may close elements opened by an earlier chunk
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        loop {
            let offset = self.consumed + reader.buffer_position() as u64;
            match reader.read_event()? {
                XmlEvent::Start(e) => {
                    let tag = decode(e.name().as_ref(), offset)?;
                    let mut attributes = Attributes::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        let key = decode(attr.key.as_ref(), offset)?;
                        attributes.insert(key, attr.unescape_value()?.into_owned());
                    }
                    self.open.push(tag.clone());
                    sink(Event::Open { tag, attributes })?;
                }
                XmlEvent::End(e) => {
                    let tag = decode(e.name().as_ref(), offset)?;
                    match self.open.pop() {
                        Some(expected) if expected == tag => {}
                        Some(expected) => {
                            return Err(ParseError::Markup {
                                offset,
                                message: format!("expected </{}>, found </{}>", expected, tag),
                            });
                        }
                        None => return Err(ParseError::StackUnderflow),
                    }
                    sink(Event::Close)?;
                }
                XmlEvent::Text(t) => {
                    let text = t.unescape()?;
                    if !text.is_empty() {
                        sink(Event::Text(text.into_owned()))?;
                    }
                }
                XmlEvent::CData(c) => sink(Event::Text(decode(&c, offset)?))?,
                XmlEvent::Eof => break,
                _ => {}
            }
        }
        Ok(())
    }
}

fn decode(bytes: &[u8], offset: u64) -> ParseResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ParseError::Markup {
            offset,
            message: e.to_string(),
        })
}

/// Length of the longest prefix ending right after a complete markup construct,
/// and where the next scan should resume.
///
/// `input[..from]` must be text containing no `<`. The resume point is the
/// start of the first unfinished construct, or the end of the input.
fn complete_prefix(input: &str, from: usize) -> (usize, usize) {
    let bytes = input.as_bytes();
    let mut cut = 0;
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &input[i..];
        let end = if rest.starts_with("<!--") {
            rest.find("-->").map(|e| e + 3)
        } else if rest.starts_with("<![CDATA[") {
            rest.find("]]>").map(|e| e + 3)
        } else if rest.starts_with("<?") {
            rest.find("?>").map(|e| e + 2)
        } else if "<!--".starts_with(rest) || "<![CDATA[".starts_with(rest) {
            // Too short to tell what kind of construct this is
            None
        } else {
            tag_end(rest)
        };
        match end {
            Some(len) => {
                i += len;
                cut = i;
            }
            None => return (cut, i),
        }
    }
    (cut, bytes.len())
}

/// End of a tag or doctype, skipping quoted values and `[...]` subsets.
fn tag_end(rest: &str) -> Option<usize> {
    let mut quote = None;
    let mut depth = 0usize;
    for (i, b) in rest.bytes().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PlannerError, Result};

/// Coarse XML token, the unit both research parsers consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartDocument,
    EndDocument,
    StartTag {
        name: String,
        /// Value of the `name` attribute, if present.
        name_attr: Option<String>,
        is_empty: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::StartDocument => f.write_str("start of document"),
            Token::EndDocument => f.write_str("end of document"),
            Token::StartTag { name, .. } => write!(f, "<{name}>"),
            Token::EndTag { name } => write!(f, "</{name}>"),
            Token::Text(_) => f.write_str("text"),
        }
    }
}

/// Pull source of [`Token`]s. After `EndDocument` a source keeps returning it.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Token>;
}

/// Pre-built token streams, mostly for tests. Runs out into `EndDocument`.
impl TokenSource for VecDeque<Token> {
    fn next_token(&mut self) -> Result<Token> {
        Ok(self.pop_front().unwrap_or(Token::EndDocument))
    }
}

/// Tokenizes an XML document with `quick-xml`.
///
/// Whitespace-only text is dropped and self-closing elements produce a start tag
/// followed by a matching end tag. Comments, declarations, processing
/// instructions and doctypes produce nothing.
pub struct XmlTokens<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    started: bool,
    finished: bool,
    pending_end: Option<String>,
}

impl<R: BufRead> XmlTokens<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            started: false,
            finished: false,
            pending_end: None,
        }
    }
}

impl<R: BufRead> TokenSource for XmlTokens<R> {
    fn next_token(&mut self) -> Result<Token> {
        if !self.started {
            self.started = true;
            return Ok(Token::StartDocument);
        }
        if let Some(name) = self.pending_end.take() {
            return Ok(Token::EndTag { name });
        }
        if self.finished {
            return Ok(Token::EndDocument);
        }

        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => start_tag(&start, false)?,
                Event::Empty(start) => {
                    let token = start_tag(&start, true)?;
                    self.pending_end = Some(tag_name(start.name().as_ref()));
                    token
                }
                Event::End(end) => Token::EndTag {
                    name: tag_name(end.name().as_ref()),
                },
                Event::Text(text) => Token::Text(text.unescape()?.into_owned()),
                Event::CData(data) => {
                    Token::Text(String::from_utf8_lossy(&data.into_inner()).into_owned())
                }
                Event::Eof => {
                    self.finished = true;
                    Token::EndDocument
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
            };
            return Ok(token);
        }
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn start_tag(start: &BytesStart<'_>, is_empty: bool) -> Result<Token> {
    let name_attr = match start.try_get_attribute("name")? {
        Some(attr) => Some(attr.unescape_value()?.into_owned()),
        None => None,
    };
    Ok(Token::StartTag {
        name: tag_name(start.name().as_ref()),
        name_attr,
        is_empty,
    })
}

/// Elements of the research grammars, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Element {
    ResearchTree,
    ResearchProject,
    Requirements,
    Requires,
    Technologies,
    Technology,
    InitialResearch,
}

impl Element {
    const ALL: [Element; 7] = [
        Element::ResearchTree,
        Element::ResearchProject,
        Element::Requirements,
        Element::Requires,
        Element::Technologies,
        Element::Technology,
        Element::InitialResearch,
    ];

    pub(crate) fn tag(self) -> &'static str {
        match self {
            Element::ResearchTree => "ResearchTree",
            Element::ResearchProject => "ResearchProject",
            Element::Requirements => "Requirements",
            Element::Requires => "Requires",
            Element::Technologies => "Technologies",
            Element::Technology => "Technology",
            Element::InitialResearch => "InitialResearch",
        }
    }

    pub(crate) fn classify(name: &str) -> Option<Element> {
        Element::ALL
            .into_iter()
            .find(|element| element.tag().eq_ignore_ascii_case(name))
    }
}

/// What a research parser reports from `next()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseItem {
    Done,
    Project,
    Dependency,
    Technology,
}

/// A structural token after text has been skipped and tag names classified.
pub(crate) enum Step {
    Begin,
    Finish,
    Open(Element, Option<String>),
    Close(Element),
}

/// Pulls the next structural token. Unknown elements are parse errors.
pub(crate) fn next_step<S: TokenSource>(source: &mut S) -> Result<Step> {
    loop {
        let token = source.next_token()?;
        let step = match token {
            Token::Text(_) => continue,
            Token::StartDocument => Step::Begin,
            Token::EndDocument => Step::Finish,
            Token::StartTag {
                name, name_attr, ..
            } => Step::Open(known(&name)?, name_attr),
            Token::EndTag { name } => Step::Close(known(&name)?),
        };
        return Ok(step);
    }
}

fn known(name: &str) -> Result<Element> {
    Element::classify(name).ok_or_else(|| PlannerError::Parse(format!("unknown element <{name}>")))
}

/// The `name` attribute an element requires.
pub(crate) fn required_name(element: Element, name: Option<String>) -> Result<String> {
    name.ok_or_else(|| {
        PlannerError::Parse(format!("<{}> is missing its name attribute", element.tag()))
    })
}

pub(crate) fn unexpected(what: impl fmt::Display, state: impl fmt::Debug) -> PlannerError {
    PlannerError::Parse(format!("unexpected {what} while in {state:?}"))
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Begin => f.write_str("start of document"),
            Step::Finish => f.write_str("end of document"),
            Step::Open(element, _) => write!(f, "<{}>", element.tag()),
            Step::Close(element) => write!(f, "</{}>", element.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(xml: &str) -> Vec<Token> {
        let mut source = XmlTokens::new(xml.as_bytes());
        let mut out = Vec::new();
        loop {
            let token = source.next_token().unwrap();
            let end = token == Token::EndDocument;
            out.push(token);
            if end {
                return out;
            }
        }
    }

    #[test]
    fn test_self_closing_expands_to_start_and_end() {
        let out = tokens(r#"<?xml version="1.0"?><!-- tree --><Requires name="A &amp; B"/>"#);
        assert_eq!(
            out,
            vec![
                Token::StartDocument,
                Token::StartTag {
                    name: "Requires".into(),
                    name_attr: Some("A & B".into()),
                    is_empty: true,
                },
                Token::EndTag {
                    name: "Requires".into()
                },
                Token::EndDocument,
            ]
        );
    }

    #[test]
    fn test_whitespace_is_dropped_but_text_is_kept() {
        let out = tokens("<a>\n  hello\n</a>");
        assert_eq!(out[2], Token::Text("hello".into()));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_end_document_repeats() {
        let mut source = XmlTokens::new("<a/>".as_bytes());
        for _ in 0..3 {
            source.next_token().unwrap();
        }
        assert_eq!(source.next_token().unwrap(), Token::EndDocument);
        assert_eq!(source.next_token().unwrap(), Token::EndDocument);
    }

    #[test]
    fn test_classify_ignores_case() {
        assert_eq!(Element::classify("researchproject"), Some(Element::ResearchProject));
        assert_eq!(Element::classify("TECHNOLOGY"), Some(Element::Technology));
        assert_eq!(Element::classify("Research"), None);
    }
}

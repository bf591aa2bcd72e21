//! Parses the inline rich text the content API embeds in titles, paragraphs,
//! and keywords (a small HTML subset: `<i>`, `<b>`, `<sub>`, `<sup>`, and
//! `<span>` with a styling class) into an [`Inline`] tree. Both the BibTeX
//! formatter and the HTML renderer walk the same tree, so text runs are
//! always separated from markup before either output format escapes them.

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

/// An inline styling applied to a run of content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Italic,
    Bold,
    Subscript,
    Superscript,
    Underline,
    Monospace,
    SmallCaps,

    /// Any element we don't style (e.g., `<a>` or an unclassed `<span>`).
    /// Only its content is kept.
    Plain,
}

impl Style {
    fn from_element(e: &BytesStart) -> Style {
        match e.name().as_ref() {
            b"i" => Style::Italic,
            b"b" => Style::Bold,
            b"sub" => Style::Subscript,
            b"sup" => Style::Superscript,
            b"span" => span_style(e),
            _ => Style::Plain,
        }
    }
}

fn span_style(e: &BytesStart) -> Style {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"class" {
            continue;
        }
        let classes = String::from_utf8_lossy(attr.value.as_ref()).into_owned();
        for class in classes.split_whitespace() {
            match class {
                "underline" => return Style::Underline,
                "monospace" => return Style::Monospace,
                "small-caps" => return Style::SmallCaps,
                _ => {}
            }
        }
    }
    Style::Plain
}

/// A node of parsed rich text. Text is stored decoded, so `&amp;` arrives
/// here as `&`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Styled(Style, Vec<Inline>),
}

const ROOT: &str = "markup";

/// Elements that never have content or an end tag in HTML.
const VOID_ELEMENTS: &[&[u8]] = &[b"br", b"hr", b"img", b"wbr"];

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

/// An element that is open while parsing.
struct Frame {
    name: Vec<u8>,
    style: Style,
    children: Vec<Inline>,
}

/// Parses `input` into a sequence of [`Inline`] nodes. The input is HTML
/// rather than XML: named entities are resolved against the HTML5 table, an
/// `&` that doesn't start an entity is literal, and void elements (`<br>`)
/// need no end tag.
pub fn parse(input: &str) -> Result<Vec<Inline>> {
    let wrapped = format!("<{root}>{}</{root}>", input, root = ROOT);
    let mut reader = Reader::from_str(&wrapped);

    // End tags are matched against the stack below so void elements can go
    // unclosed.
    reader.config_mut().check_end_names = false;

    // `stack[0]` collects the children of the synthetic root; every open
    // element pushes a frame and is folded into its parent on close.
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Vec<Inline>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if is_void(e.name().as_ref()) => void_element(&mut stack, &e),
            Event::Empty(e) => void_element(&mut stack, &e),
            Event::Start(e) => {
                let style = match stack.is_empty() {
                    true => Style::Plain,
                    false => Style::from_element(&e),
                };
                stack.push(Frame {
                    name: e.name().as_ref().to_vec(),
                    style,
                    children: Vec::new(),
                });
            }
            Event::End(e) => {
                if is_void(e.name().as_ref()) {
                    continue;
                }
                let frame = stack.pop().ok_or(Error::Unbalanced)?;
                if frame.name != e.name().as_ref() {
                    return Err(Error::Unbalanced);
                }
                match stack.last_mut() {
                    Some(parent) => parent
                        .children
                        .push(Inline::Styled(frame.style, frame.children)),
                    None => root = Some(frame.children),
                }
            }
            Event::Text(t) => {
                let text = unescape(&String::from_utf8_lossy(&t));
                if let Some(frame) = stack.last_mut() {
                    push_text(&mut frame.children, &text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                if let Some(frame) = stack.last_mut() {
                    push_text(&mut frame.children, &text);
                }
            }
            Event::Eof => break,

            // Comments and processing instructions carry no text.
            _ => {}
        }
    }

    match stack.is_empty() {
        true => root.ok_or(Error::Unbalanced),
        false => Err(Error::Unbalanced),
    }
}

/// A line break becomes a space so the words either side stay apart in
/// plain text. Other void elements carry no text.
fn void_element(stack: &mut [Frame], e: &BytesStart) {
    if e.name().as_ref().eq_ignore_ascii_case(b"br") {
        if let Some(frame) = stack.last_mut() {
            push_text(&mut frame.children, " ");
        }
    }
}

/// The longest entity name we try to resolve, `&CounterClockwiseContourIntegral;`.
const MAX_ENTITY_LEN: usize = 32;

/// Decodes character and entity references in `raw`. References that don't
/// resolve are kept as written, so a bare `&` is just an ampersand.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match reference(rest) {
            Some((decoded, len)) => {
                out.push_str(&decoded);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolves the reference at the start of `s` (which begins with `&`),
/// returning its text and the length of the reference including `;`.
fn reference(s: &str) -> Option<(String, usize)> {
    let end = s
        .char_indices()
        .take(MAX_ENTITY_LEN + 2)
        .find(|&(_, c)| c == ';')
        .map(|(i, _)| i)?;
    let name = &s[1..end];
    let decoded = match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)?.to_string()
        }
        None => resolve_html5_entity(name)?.to_owned(),
    };
    Some((decoded, end + 1))
}

fn push_text(children: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = children.last_mut() {
        last.push_str(text);
        return;
    }
    children.push(Inline::Text(text.to_owned()));
}

/// Flattens nodes into their text content, dropping all styling. Used for
/// page titles and metadata, where markup isn't allowed.
pub fn plain_text(nodes: &[Inline]) -> String {
    let mut out = String::new();
    collect_text(&mut out, nodes);
    out
}

fn collect_text(out: &mut String, nodes: &[Inline]) {
    for node in nodes {
        match node {
            Inline::Text(text) => out.push_str(text),
            Inline::Styled(_, children) => collect_text(out, children),
        }
    }
}

/// Parses `input` and returns only its text, falling back to the raw input
/// when it isn't well-formed.
pub fn strip(input: &str) -> String {
    match parse(input) {
        Ok(nodes) => plain_text(&nodes),
        Err(_) => input.to_owned(),
    }
}

/// The result of a fallible markup operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents rich text that couldn't be parsed.
#[derive(Debug)]
pub enum Error {
    /// Returned when the markup can't be tokenized (e.g., an unterminated
    /// tag).
    Xml(quick_xml::Error),

    /// Returned when an end tag doesn't close the innermost open element.
    Unbalanced,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Xml(err) => write!(f, "invalid markup: {}", err),
            Error::Unbalanced => write!(f, "invalid markup: unbalanced elements"),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Xml(err) => Some(err),
            Error::Unbalanced => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    /// Converts a [`quick_xml::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator while reading events.
    fn from(err: quick_xml::Error) -> Error {
        Error::Xml(err)
    }
}

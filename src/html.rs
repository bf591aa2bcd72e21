//! Renders API content ([`Inline`] rich text and [`Block`]s) as HTML, and
//! exposes the escaping helpers the templates rely on. `gtmpl` doesn't escape
//! anything itself, so every value handed to a template is either produced
//! here or passed through [`escape`] first.

use crate::markup::{self, Inline, Style};
use crate::model::Block;
use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use std::fmt::{self, Display};
use std::io;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

/// Displays a string escaped for use in an `href` attribute.
pub struct EscapeHref<'a>(pub &'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Displays a string escaped for use in HTML text or attribute values.
pub struct EscapeHtml<'a>(pub &'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Escapes `s` for HTML text and attribute values.
pub fn escape(s: &str) -> String {
    EscapeHtml(s).to_string()
}

/// Escapes `s` for an `href`/`src` attribute.
pub fn escape_url(s: &str) -> String {
    EscapeHref(s).to_string()
}

/// Renders content into HTML. `heading_level` is the level used for
/// top-level section titles; nested sections go one level deeper each.
struct HtmlRenderer {
    heading_level: u8,
}

impl HtmlRenderer {
    fn on_inline<W: StrWrite>(&self, w: &mut W, node: &Inline) -> io::Result<()> {
        match node {
            Inline::Text(text) => escape_html(w, text),
            Inline::Styled(style, children) => {
                let (open, close) = match style {
                    Style::Italic => ("<i>", "</i>"),
                    Style::Bold => ("<b>", "</b>"),
                    Style::Subscript => ("<sub>", "</sub>"),
                    Style::Superscript => ("<sup>", "</sup>"),
                    Style::Underline => (r#"<span class="underline">"#, "</span>"),
                    Style::Monospace => (r#"<span class="monospace">"#, "</span>"),
                    Style::SmallCaps => (r#"<span class="small-caps">"#, "</span>"),
                    Style::Plain => ("", ""),
                };
                w.write_str(open)?;
                for child in children {
                    self.on_inline(w, child)?;
                }
                w.write_str(close)
            }
        }
    }

    fn on_rich_text<W: StrWrite>(&self, w: &mut W, input: &str) -> io::Result<()> {
        match markup::parse(input) {
            Ok(nodes) => {
                for node in &nodes {
                    self.on_inline(w, node)?;
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "rendering malformed rich text as plain text");
                escape_html(w, input)
            }
        }
    }

    fn on_block<W: StrWrite>(&self, w: &mut W, block: &Block, depth: u8) -> io::Result<()> {
        match block {
            Block::Paragraph { text } => {
                w.write_str("<p>")?;
                self.on_rich_text(w, text)?;
                w.write_str("</p>\n")
            }
            Block::Section { title, content } => {
                let level = (self.heading_level + depth).min(6);
                write!(
                    w,
                    r#"<section class="article-section"><h{} class="article-section__title">"#,
                    level
                )?;
                self.on_rich_text(w, title)?;
                write!(w, r#"</h{}><div class="article-section__body">"#, level)?;
                for child in content {
                    self.on_block(w, child, depth + 1)?;
                }
                w.write_str("</div></section>\n")
            }
            Block::Unsupported => Ok(()),
        }
    }
}

/// Renders rich text (inline markup) as HTML. Malformed markup is escaped
/// and rendered as text.
pub fn rich_text(input: &str) -> String {
    let mut out = String::new();
    // Writing to a `String` can't fail.
    let _ = HtmlRenderer { heading_level: 2 }.on_rich_text(&mut out, input);
    out
}

/// Renders content blocks as HTML, starting section headings at
/// `heading_level`.
pub fn blocks(blocks: &[Block], heading_level: u8) -> String {
    let renderer = HtmlRenderer { heading_level };
    let mut out = String::new();
    for block in blocks {
        let _ = renderer.on_block(&mut out, block, 0);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rich_text() {
        assert_eq!(
            r#"<b><i>D<sub>u</sub>i</i>s</b> &amp; <span class="small-caps">c</span>"#,
            rich_text(r#"<b><i>D<sub>u</sub>i</i>s</b> &amp; <span class="small-caps">c</span>"#)
        );
    }

    #[test]
    fn test_rich_text_escapes_decoded_entities() {
        assert_eq!("a &lt;b&gt; c", rich_text("a &lt;b&gt; c"));
    }

    #[test]
    fn test_rich_text_malformed() {
        assert_eq!("&lt;i&gt;x", rich_text("<i>x"));
    }

    #[test]
    fn test_rich_text_drops_unknown_elements() {
        assert_eq!("link", rich_text(r#"<a href="https://example.org">link</a>"#));
    }

    #[test]
    fn test_blocks() {
        let content = vec![
            Block::Paragraph {
                text: "Paragraph 1.".to_owned(),
            },
            Block::Section {
                title: "Section".to_owned(),
                content: vec![Block::Paragraph {
                    text: "Text.".to_owned(),
                }],
            },
            Block::Unsupported,
        ];
        assert_eq!(
            "<p>Paragraph 1.</p>\n<section class=\"article-section\"><h3 class=\"article-section__title\">Section</h3><div class=\"article-section__body\"><p>Text.</p>\n</div></section>\n",
            blocks(&content, 3)
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!("Fish &amp; &quot;Chips&quot;", escape(r#"Fish & "Chips""#));
    }
}

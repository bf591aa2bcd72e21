//! Formats articles as BibTeX records. [`ArticleCitation`] is the validated
//! input (built from an API [`Article`] with [`TryFrom`]) and [`format`] turns
//! it into a [`CitationRecord`]. Formatting is pure: the same citation always
//! produces byte-identical output.
//!
//! Rich text goes through [`crate::markup`] first, so markup becomes LaTeX
//! commands and only the literal text runs between them are escaped.

use crate::markup::{self, Inline, Style};
use crate::model::{Article, Author, Block, Person};
use chrono::{DateTime, Datelike, Utc};
use std::fmt;

/// The fixed bibliographic details of the journal an article belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Journal {
    pub name: &'static str,
    pub issn: &'static str,
    pub publisher: &'static str,

    /// Prefix that turns a DOI into a resolvable URL.
    pub doi_resolver: &'static str,
}

pub const ELIFE: Journal = Journal {
    name: "eLife",
    issn: "2050-084X",
    publisher: "eLife Sciences Publications, Ltd",
    doi_resolver: "https://doi.org/",
};

/// An article with everything a citation requires. Optional parts are
/// omitted from the record rather than rendered empty.
#[derive(Clone, Debug)]
pub struct ArticleCitation {
    pub doi: String,

    /// Rich text; may contain inline markup.
    pub title: String,
    pub title_prefix: Option<String>,
    pub volume: u32,
    pub issue: Option<u32>,
    pub elocation_id: String,
    pub published: DateTime<Utc>,

    /// Carried for completeness; the record is always dated by `published`.
    pub status_date: DateTime<Utc>,
    pub authors: Vec<Author>,
    pub reviewers: Vec<Person>,

    /// Rich text keywords.
    pub keywords: Vec<String>,
    pub abstract_content: Option<Vec<Block>>,
    pub journal: Journal,
}

impl TryFrom<&Article> for ArticleCitation {
    type Error = Error;

    /// Validates an API [`Article`]. Fails with [`Error::MissingField`] for
    /// the first of DOI, title, volume, e-location id, or publication date
    /// that is absent.
    fn try_from(article: &Article) -> Result<ArticleCitation> {
        fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T> {
            value.clone().ok_or(Error::MissingField(field))
        }

        let published = required(&article.published, "published")?;
        Ok(ArticleCitation {
            doi: required(&article.doi, "doi")?,
            title: required(&article.title, "title")?,
            title_prefix: article.title_prefix.clone(),
            volume: required(&article.volume, "volume")?,
            issue: article.issue,
            elocation_id: required(&article.elocation_id, "elocationId")?,
            published,
            status_date: article.status_date.unwrap_or(published),
            authors: article.authors.clone(),
            reviewers: article.reviewers.clone(),
            keywords: article.keywords.clone(),
            abstract_content: article.r#abstract.as_ref().map(|a| a.content.clone()),
            journal: ELIFE,
        })
    }
}

/// A formatted BibTeX entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitationRecord(String);

impl CitationRecord {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CitationRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A field value. Integers are written bare, everything else braced.
enum Value {
    Braced(String),
    Number(i64),
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Formats `article` as a BibTeX `@article` record.
pub fn format(article: &ArticleCitation) -> Result<CitationRecord> {
    let journal = &article.journal;
    let year = article.published.year();
    let mut fields: Vec<(&str, Value)> = Vec::new();

    fields.push(("article_type", Value::Braced("journal".to_owned())));
    fields.push(("title", Value::Braced(title(article)?)));

    let authors = author_tokens(&article.authors);
    if !authors.is_empty() {
        fields.push(("author", Value::Braced(authors.join(" and "))));
    }
    if !article.reviewers.is_empty() {
        let editors: Vec<String> = article
            .reviewers
            .iter()
            .map(|r| escape(&r.name.index))
            .collect();
        fields.push(("editor", Value::Braced(editors.join(" and "))));
    }

    fields.push(("volume", Value::Number(article.volume.into())));
    if let Some(issue) = article.issue {
        fields.push(("number", Value::Number(issue.into())));
    }
    fields.push(("year", Value::Number(year.into())));
    fields.push((
        "month",
        Value::Braced(MONTHS[article.published.month0() as usize].to_owned()),
    ));
    fields.push((
        "pub_date",
        Value::Braced(article.published.format("%Y-%m-%d").to_string()),
    ));
    fields.push(("pages", Value::Braced(escape(&article.elocation_id))));
    fields.push((
        "citation",
        Value::Braced(format!(
            "{} {};{}:{}",
            journal.name,
            year,
            article.volume,
            escape(&article.elocation_id)
        )),
    ));
    fields.push(("doi", Value::Braced(article.doi.clone())));
    fields.push((
        "url",
        Value::Braced(format!("{}{}", journal.doi_resolver, article.doi)),
    ));

    if let Some(content) = &article.abstract_content {
        if let Some(text) = abstract_text(content)? {
            fields.push(("abstract", Value::Braced(text)));
        }
    }
    if !article.keywords.is_empty() {
        let keywords = article
            .keywords
            .iter()
            .map(|k| rich_text("keywords", k))
            .collect::<Result<Vec<String>>>()?;
        fields.push(("keywords", Value::Braced(keywords.join(", "))));
    }

    fields.push(("journal", Value::Braced(journal.name.to_owned())));
    fields.push(("issn", Value::Braced(journal.issn.to_owned())));
    fields.push(("publisher", Value::Braced(journal.publisher.to_owned())));

    let mut out = format!("@article {{{},\n", article.doi);
    for (name, value) in fields {
        match value {
            Value::Braced(v) => out.push_str(&format!("{} = {{{}}},\n", name, v)),
            Value::Number(n) => out.push_str(&format!("{} = {},\n", name, n)),
        }
    }
    out.push_str("}\n");
    Ok(CitationRecord(out))
}

fn title(article: &ArticleCitation) -> Result<String> {
    let title = rich_text("title", &article.title)?;
    Ok(match &article.title_prefix {
        Some(prefix) => format!("{}: {}", escape(prefix), title),
        None => title,
    })
}

// Groups contribute their own name; members and sub-groups are not
// flattened into the list.
fn author_tokens(authors: &[Author]) -> Vec<String> {
    authors
        .iter()
        .filter_map(|author| match author {
            Author::Person { name } => Some(escape(&name.index)),
            Author::Group { name, .. } => Some(escape(name)),
            Author::OnBehalfOf { .. } => None,
        })
        .collect()
}

fn abstract_text(blocks: &[Block]) -> Result<Option<String>> {
    let sectioned = blocks.iter().any(|b| matches!(b, Block::Section { .. }));
    let mut parts = Vec::new();

    if sectioned {
        for block in blocks {
            if let Block::Section { title, content } = block {
                let label = rich_text("abstract", title)?;
                let text = paragraphs(content)?.join(" ");
                parts.push(format!(r"\textbf{{{}}} {}", label, text).trim_end().to_owned());
            }
        }
    } else {
        parts = paragraphs(blocks)?;
    }

    Ok(match parts.is_empty() {
        true => None,
        false => Some(parts.join(" ")),
    })
}

fn paragraphs(blocks: &[Block]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for block in blocks {
        match block {
            Block::Paragraph { text } => out.push(rich_text("abstract", text)?),
            Block::Section { content, .. } => out.extend(paragraphs(content)?),
            Block::Unsupported => {}
        }
    }
    Ok(out)
}

fn rich_text(field: &'static str, input: &str) -> Result<String> {
    let nodes = markup::parse(input).map_err(|err| Error::Markup { field, err })?;
    let mut out = String::new();
    write_latex(&mut out, &nodes);
    Ok(out)
}

fn write_latex(out: &mut String, nodes: &[Inline]) {
    for node in nodes {
        match node {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Styled(style, children) => match command(*style) {
                Some(command) => {
                    out.push('\\');
                    out.push_str(command);
                    out.push('{');
                    write_latex(out, children);
                    out.push('}');
                }
                None => write_latex(out, children),
            },
        }
    }
}

fn command(style: Style) -> Option<&'static str> {
    match style {
        Style::Italic => Some("textit"),
        Style::Bold => Some("textbf"),
        Style::Subscript => Some("textsubscript"),
        Style::Superscript => Some("textsuperscript"),
        Style::Underline => Some("uline"),
        Style::Monospace => Some("texttt"),
        Style::SmallCaps => Some("textsc"),
        Style::Plain => None,
    }
}

/// Escapes the characters BibTeX treats specially. `<` and `>` are left as
/// they are.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\textbraceleft"),
            '}' => out.push_str(r"\textbraceright"),
            '~' => out.push_str(r"\textasciitilde"),
            '^' => out.push_str(r"\textasciicircum"),
            '\\' => out.push_str(r"\textbackslash"),
            _ => out.push(c),
        }
    }
    out
}

/// The result of a fallible citation operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an article that can't be cited.
#[derive(Debug)]
pub enum Error {
    /// Returned when a field every citation needs is absent.
    MissingField(&'static str),

    /// Returned when a rich-text field can't be parsed.
    Markup {
        field: &'static str,
        err: markup::Error,
    },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingField(field) => write!(f, "article has no `{}`", field),
            Error::Markup { field, err } => write!(f, "formatting `{}`: {}", field, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingField(_) => None,
            Error::Markup { field: _, err } => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::{json, Value as Json};

    fn minimum_poa() -> Json {
        json!({
            "status": "poa",
            "id": "00001",
            "version": 1,
            "type": "research-article",
            "doi": "10.7554/eLife.00001",
            "title": "Title",
            "stage": "published",
            "published": "2016-01-02T00:00:00Z",
            "statusDate": "2016-01-02T00:00:00Z",
            "versionDate": "2016-01-02T00:00:00Z",
            "volume": 1,
            "elocationId": "e00001",
            "copyright": {
                "license": "CC0-1.0",
                "statement": "Statement."
            },
            "authorLine": "Foo Bar et al.",
            "authors": [
                {
                    "type": "person",
                    "name": {
                        "preferred": "Foo Bar",
                        "index": "Bar, Foo"
                    }
                }
            ]
        })
    }

    fn complete_vor() -> Json {
        json!({
            "status": "vor",
            "id": "00001",
            "version": 3,
            "type": "research-article",
            "doi": "10.7554/eLife.00001",
            "title": "<i>Title</i>",
            "titlePrefix": "Prefix",
            "stage": "published",
            "published": "2016-01-02T00:00:00Z",
            "statusDate": "2016-02-01T00:00:00Z",
            "versionDate": "2016-03-01T00:00:00Z",
            "volume": 1,
            "issue": 2,
            "elocationId": "e00001",
            "authorLine": "Author One et al.",
            "authors": [
                {
                    "type": "person",
                    "name": {"preferred": "Author One", "index": "One, Author"}
                },
                {
                    "type": "group",
                    "name": "Group One",
                    "people": [
                        {"name": {"preferred": "Author Two", "index": "Two, Author"}}
                    ]
                },
                {
                    "type": "group",
                    "name": "Group Two",
                    "groups": {
                        "Sub-group 1": [
                            {"name": {"preferred": "Author Three", "index": "Three, Author"}}
                        ]
                    }
                },
                {
                    "type": "on-behalf-of",
                    "onBehalfOf": "on behalf of An Organisation"
                }
            ],
            "reviewers": [
                {
                    "name": {"preferred": "Reviewer One", "index": "One, Reviewer"},
                    "role": "Reviewing editor"
                },
                {
                    "name": {"preferred": "Reviewer Two", "index": "Two, Reviewer"},
                    "role": "Reviewing editor"
                }
            ],
            "keywords": ["<i>Keyword one</i>", "Keyword two"],
            "abstract": {
                "doi": "10.7554/eLife.00001.001",
                "content": [
                    {
                        "type": "paragraph",
                        "text": "Lorem <b>ipsum</b> <i>dolor</i> <span class=\"underline\">sit</span> <span class=\"monospace\">amet</span>, <span class=\"small-caps\">consectetur</span> <sub>adipiscing</sub> <sup>elit</sup>."
                    },
                    {
                        "type": "paragraph",
                        "text": r"<b><i>D<sub>u</sub>i</i>s</b> ornare &amp;%$#_{}~^\&gt;&lt; nunc."
                    }
                ]
            },
            "body": [
                {
                    "type": "section",
                    "id": "s-1",
                    "title": "Section",
                    "content": [{"type": "paragraph", "text": "Text."}]
                }
            ]
        })
    }

    fn citation(document: Json) -> ArticleCitation {
        let article: Article = serde_json::from_value(document).unwrap();
        ArticleCitation::try_from(&article).unwrap()
    }

    fn fixture(document: Json, wanted: &str) -> Result<()> {
        assert_eq!(wanted, format(&citation(document))?.as_str());
        Ok(())
    }

    #[test]
    fn test_format_minimum_poa() -> Result<()> {
        fixture(
            minimum_poa(),
            r"@article {10.7554/eLife.00001,
article_type = {journal},
title = {Title},
author = {Bar, Foo},
volume = 1,
year = 2016,
month = {jan},
pub_date = {2016-01-02},
pages = {e00001},
citation = {eLife 2016;1:e00001},
doi = {10.7554/eLife.00001},
url = {https://doi.org/10.7554/eLife.00001},
journal = {eLife},
issn = {2050-084X},
publisher = {eLife Sciences Publications, Ltd},
}
",
        )
    }

    #[test]
    fn test_format_complete_vor() -> Result<()> {
        fixture(
            complete_vor(),
            r"@article {10.7554/eLife.00001,
article_type = {journal},
title = {Prefix: \textit{Title}},
author = {One, Author and Group One and Group Two},
editor = {One, Reviewer and Two, Reviewer},
volume = 1,
number = 2,
year = 2016,
month = {jan},
pub_date = {2016-01-02},
pages = {e00001},
citation = {eLife 2016;1:e00001},
doi = {10.7554/eLife.00001},
url = {https://doi.org/10.7554/eLife.00001},
abstract = {Lorem \textbf{ipsum} \textit{dolor} \uline{sit} \texttt{amet}, \textsc{consectetur} \textsubscript{adipiscing} \textsuperscript{elit}. \textbf{\textit{D\textsubscript{u}i}s} ornare \&\%\$\#\_\textbraceleft\textbraceright\textasciitilde\textasciicircum\textbackslash>< nunc.},
keywords = {\textit{Keyword one}, Keyword two},
journal = {eLife},
issn = {2050-084X},
publisher = {eLife Sciences Publications, Ltd},
}
",
        )
    }

    #[test]
    fn test_format_structured_abstract() -> Result<()> {
        let mut document = minimum_poa();
        document["abstract"] = json!({
            "content": [
                {
                    "type": "section",
                    "title": "Introduction",
                    "content": [{"type": "paragraph", "text": "Abstract 00001."}]
                }
            ]
        });
        fixture(
            document,
            r"@article {10.7554/eLife.00001,
article_type = {journal},
title = {Title},
author = {Bar, Foo},
volume = 1,
year = 2016,
month = {jan},
pub_date = {2016-01-02},
pages = {e00001},
citation = {eLife 2016;1:e00001},
doi = {10.7554/eLife.00001},
url = {https://doi.org/10.7554/eLife.00001},
abstract = {\textbf{Introduction} Abstract 00001.},
journal = {eLife},
issn = {2050-084X},
publisher = {eLife Sciences Publications, Ltd},
}
",
        )
    }

    fn fixture_title(title: &str, wanted: &str) -> Result<()> {
        let mut document = minimum_poa();
        document["title"] = json!(title);
        let record = format(&citation(document))?;
        assert!(
            record.as_str().contains(&format!("\ntitle = {{{}}},\n", wanted)),
            "unexpected record:\n{}",
            record
        );
        Ok(())
    }

    #[test]
    fn test_format_title_with_named_entities() -> Result<()> {
        fixture_title("A&ndash;B&nbsp;C", "A\u{2013}B\u{a0}C")
    }

    #[test]
    fn test_format_title_with_bare_ampersand() -> Result<()> {
        fixture_title("Fish & chips", r"Fish \& chips")
    }

    #[test]
    fn test_format_title_with_line_break() -> Result<()> {
        fixture_title("Line<br>break", "Line break")
    }

    #[test]
    fn test_format_title_with_image() -> Result<()> {
        fixture_title(r#"<i>Icon</i> <img src="icon.png"> key"#, r"\textit{Icon}  key")
    }

    #[test]
    fn test_format_structured_abstract_skips_leading_matter() -> Result<()> {
        let mut document = minimum_poa();
        document["abstract"] = json!({
            "content": [
                {"type": "paragraph", "text": "Unlabeled."},
                {"type": "section", "title": "Background", "content": [
                    {"type": "paragraph", "text": "One."},
                    {"type": "paragraph", "text": "Two."}
                ]},
                {"type": "section", "title": "Results", "content": [
                    {"type": "paragraph", "text": "Three."}
                ]}
            ]
        });
        let record = format(&citation(document))?;
        assert!(record.as_str().contains(
            "abstract = {\\textbf{Background} One. Two. \\textbf{Results} Three.},\n"
        ));
        Ok(())
    }

    #[test]
    fn test_format_is_deterministic() -> Result<()> {
        let article = citation(complete_vor());
        assert_eq!(format(&article)?, format(&article.clone())?);
        Ok(())
    }

    #[test]
    fn test_group_with_subgroups_is_one_token() {
        let article = citation(complete_vor());
        assert_eq!(
            vec!["One, Author", "Group One", "Group Two"],
            author_tokens(&article.authors)
        );
    }

    #[test]
    fn test_format_omits_absent_optional_fields() -> Result<()> {
        let record = format(&citation(minimum_poa()))?;
        for field in &["editor", "number", "abstract", "keywords"] {
            assert!(
                !record.as_str().contains(&format!("\n{} = ", field)),
                "unexpected `{}` field",
                field
            );
        }
        Ok(())
    }

    #[test]
    fn test_format_omits_author_when_only_on_behalf_of() -> Result<()> {
        let mut document = minimum_poa();
        document["authors"] = json!([{"type": "on-behalf-of", "onBehalfOf": "on behalf of X"}]);
        let record = format(&citation(document))?;
        assert!(!record.as_str().contains("author = "));
        Ok(())
    }

    #[test]
    fn test_month_follows_publication_date() -> Result<()> {
        let mut document = complete_vor();
        document["published"] = json!("2017-12-31T23:00:00Z");
        let record = format(&citation(document))?;
        assert!(record.as_str().contains("year = 2017,\nmonth = {dec},\npub_date = {2017-12-31},\n"));
        assert!(record.as_str().contains("citation = {eLife 2017;1:e00001},\n"));
        Ok(())
    }

    #[test]
    fn test_missing_required_field() {
        let mut document = minimum_poa();
        document.as_object_mut().unwrap().remove("elocationId");
        let article: Article = serde_json::from_value(document).unwrap();
        match ArticleCitation::try_from(&article) {
            Err(Error::MissingField(field)) => assert_eq!("elocationId", field),
            other => panic!("expected a missing field, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_markup() {
        let mut document = minimum_poa();
        document["title"] = json!("<i>Title</b>");
        assert!(matches!(
            format(&citation(document)),
            Err(Error::Markup { field: "title", .. })
        ));
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            r"\&\%\$\#\_\textbraceleft\textbraceright\textasciitilde\textasciicircum\textbackslash><",
            escape(r"&%$#_{}~^\><")
        );
    }
}

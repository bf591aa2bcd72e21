//! Converts view models into [`Value`]s for templating. View model strings
//! are already HTML-safe; metadata and URLs are escaped here. Every key is
//! always present (absent values are [`Value::Nil`]) so templates can test
//! them with `if`.

use crate::html::{escape, escape_url};
use crate::metadata::{Metadata, MetaTag};
use crate::page::*;
use gtmpl_value::Value;
use std::collections::HashMap;

fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect::<HashMap<String, Value>>(),
    )
}

fn string(s: &str) -> Value {
    Value::String(s.to_owned())
}

fn optional(opt: &Option<String>) -> Value {
    match opt {
        Some(s) => string(s),
        None => Value::Nil,
    }
}

fn url(s: &str) -> Value {
    Value::String(escape_url(s))
}

fn array<'a, T: 'a>(items: impl IntoIterator<Item = &'a T>) -> Value
where
    Value: From<&'a T>,
{
    Value::Array(items.into_iter().map(Value::from).collect())
}

impl From<&MetaTag> for Value {
    fn from(tag: &MetaTag) -> Value {
        object([
            ("attr", string(tag.attr)),
            ("key", Value::String(escape(&tag.key))),
            ("content", Value::String(escape(&tag.content))),
        ])
    }
}

impl From<&Metadata> for Value {
    fn from(metadata: &Metadata) -> Value {
        object([
            ("title", Value::String(escape(&metadata.title))),
            ("canonical", url(&metadata.canonical)),
            ("tags", array(&metadata.tags())),
            // Already serialized with `</` escaped.
            ("schema_org", optional(&metadata.schema_org)),
        ])
    }
}

impl From<&Link> for Value {
    fn from(link: &Link) -> Value {
        object([("text", string(&link.text)), ("url", url(&link.url))])
    }
}

impl From<&SiteHeader> for Value {
    fn from(header: &SiteHeader) -> Value {
        let profile = match &header.profile {
            Some(profile) => object([
                ("name", string(&profile.name)),
                ("log_out", url(&profile.log_out)),
            ]),
            None => Value::Nil,
        };
        object([
            ("home", url(&header.home)),
            ("title", optional(&header.title)),
            ("profile", profile),
            ("log_in", url(&header.log_in)),
        ])
    }
}

impl From<&InfoBar> for Value {
    fn from(bar: &InfoBar) -> Value {
        object([
            ("class", string(bar.kind.class())),
            ("text", Value::String(escape(&bar.text))),
        ])
    }
}

impl From<&CallToActionView> for Value {
    fn from(cta: &CallToActionView) -> Value {
        object([
            ("id", string(&cta.id)),
            ("text", string(&cta.text)),
            (
                "image",
                object([
                    ("uri", url(&cta.image.uri)),
                    ("width", Value::String(cta.image.width.to_string())),
                    ("height", Value::String(cta.image.height.to_string())),
                ]),
            ),
            ("button", Value::from(&cta.button)),
            ("needs_js", Value::Bool(cta.needs_js)),
            ("cookie_expires", optional(&cta.cookie_expires)),
        ])
    }
}

impl From<&ContentHeader> for Value {
    fn from(header: &ContentHeader) -> Value {
        object([
            ("title", string(&header.title)),
            ("impact_statement", optional(&header.impact_statement)),
            ("meta", optional(&header.meta)),
        ])
    }
}

impl From<&EventView> for Value {
    fn from(event: &EventView) -> Value {
        object([
            ("header", Value::from(&event.header)),
            ("starts", string(&event.starts)),
            ("ends", string(&event.ends)),
            ("body", string(&event.body)),
        ])
    }
}

impl From<&JobAdvertView> for Value {
    fn from(job: &JobAdvertView) -> Value {
        object([
            ("header", Value::from(&job.header)),
            ("closing", optional(&job.closing)),
            ("body", string(&job.body)),
        ])
    }
}

impl From<&Teaser> for Value {
    fn from(teaser: &Teaser) -> Value {
        object([
            ("title", string(&teaser.title)),
            ("url", url(&teaser.url)),
            ("meta", string(&teaser.meta)),
        ])
    }
}

/// Converts a listing. `full` is false for incremental-content requests,
/// which omit the content header.
pub fn listing(listing: &ListingView, full: bool) -> Value {
    let link = |opt: &Option<String>| match opt {
        Some(path) => url(path),
        None => Value::Nil,
    };
    object([
        ("full", Value::Bool(full)),
        ("header", Value::from(&listing.header)),
        ("items", array(&listing.items)),
        ("prev", link(&listing.prev)),
        ("next", link(&listing.next)),
    ])
}

impl From<&AimsAndScope> for Value {
    fn from(subject: &AimsAndScope) -> Value {
        object([
            ("name", string(&subject.name)),
            ("body", string(&subject.body)),
            ("editors", url(&subject.editors)),
        ])
    }
}

impl From<&PublishingView> for Value {
    fn from(publishing: &PublishingView) -> Value {
        object([
            ("header", Value::from(&publishing.header)),
            ("subjects", array(&publishing.subjects)),
        ])
    }
}

impl From<&YearOption> for Value {
    fn from(option: &YearOption) -> Value {
        object([
            ("year", Value::String(option.year.to_string())),
            ("selected", Value::Bool(option.selected)),
        ])
    }
}

impl From<&ArchiveView> for Value {
    fn from(archive: &ArchiveView) -> Value {
        object([
            ("header", Value::from(&archive.header)),
            ("action", url(&archive.action)),
            ("years", array(&archive.years)),
            (
                "months",
                Value::Array(archive.months.iter().map(|month| string(month)).collect()),
            ),
        ])
    }
}

/// Converts everything but the page's main content, which the layout
/// receives already rendered as `main`.
pub fn layout(page: &Page, main: String) -> Value {
    object([
        ("metadata", Value::from(&page.metadata)),
        ("header", Value::from(&page.header)),
        ("info_bars", array(&page.info_bars)),
        ("calls_to_action", array(&page.calls_to_action)),
        ("email_cta", object([("action", url(&page.email_cta.action))])),
        ("footer", object([("subjects", array(&page.footer.subjects))])),
        ("user", optional(&page.user)),
        ("main", Value::String(main)),
    ])
}

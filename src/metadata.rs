//! Builds the `<head>` metadata of a page: its title, canonical link, Open
//! Graph and Twitter card tags, optional Dublin Core, and schema.org JSON-LD.

use crate::page::SocialImage;
use crate::url::UrlGenerator;
use chrono::{DateTime, Datelike, Utc};
use url::ParseError;

const SITE_NAME: &str = "eLife";
const PUBLISHER: &str = "eLife Sciences Publications Limited";
const DOMAIN: &str = "elifesciences.org";

/// A single `<meta>` element. `attr` is `property` for Open Graph tags and
/// `name` for everything else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaTag {
    pub attr: &'static str,
    pub key: String,
    pub content: String,
}

impl MetaTag {
    fn property(key: &str, content: impl Into<String>) -> MetaTag {
        MetaTag {
            attr: "property",
            key: key.to_owned(),
            content: content.into(),
        }
    }

    fn name(key: &str, content: impl Into<String>) -> MetaTag {
        MetaTag {
            attr: "name",
            key: key.to_owned(),
            content: content.into(),
        }
    }
}

/// Dublin Core terms for pages that describe a published item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DublinCore {
    /// E.g. `job-advert/1`.
    pub identifier: String,
    pub title: String,
    pub date: DateTime<Utc>,
}

/// Everything a page puts in its `<head>`. All strings are plain text; the
/// renderer escapes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// The full `<title>`, e.g. `Job advert title | Jobs | eLife`.
    pub title: String,
    pub og_title: String,
    pub og_type: &'static str,
    pub canonical: String,
    pub url: String,
    pub description: Option<String>,
    pub robots: Option<&'static str>,
    pub image: String,
    pub image_width: u32,
    pub image_height: u32,
    pub dublin_core: Option<DublinCore>,

    /// Serialized JSON-LD.
    pub schema_org: Option<String>,
}

impl Metadata {
    /// Creates the metadata shared by every page. `title` is the page's own
    /// (plain text) title and `section` the site section it belongs to, if
    /// any.
    pub fn new(
        urls: &UrlGenerator,
        image: &SocialImage,
        title: &str,
        section: Option<&str>,
        canonical: String,
    ) -> Result<Metadata, ParseError> {
        let full_title = match section {
            Some(section) => format!("{} | {} | {}", title, section, SITE_NAME),
            None => format!("{} | {}", title, SITE_NAME),
        };
        Ok(Metadata {
            title: full_title,
            og_title: title.to_owned(),
            og_type: "article",
            url: urls.absolute(&canonical)?.to_string(),
            canonical,
            description: None,
            robots: None,
            image: urls.absolute(&image.path)?.to_string(),
            image_width: image.width,
            image_height: image.height,
            dublin_core: None,
            schema_org: None,
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Metadata {
        self.description = description;
        self
    }

    /// Asks search engines not to index the page.
    pub fn noindex(mut self) -> Metadata {
        self.robots = Some("noindex");
        self
    }

    pub fn with_dublin_core(mut self, dublin_core: DublinCore) -> Metadata {
        self.dublin_core = Some(dublin_core);
        self
    }

    pub fn with_schema_org(mut self, value: serde_json::Value) -> Metadata {
        self.schema_org = Some(json_ld(&value));
        self
    }

    /// The `<meta>` elements in document order.
    pub fn tags(&self) -> Vec<MetaTag> {
        let mut tags = vec![
            MetaTag::property("og:site_name", SITE_NAME),
            MetaTag::property("og:url", self.url.as_str()),
            MetaTag::property("og:title", self.og_title.as_str()),
            MetaTag::property("og:type", self.og_type),
        ];
        if let Some(description) = &self.description {
            tags.push(MetaTag::property("og:description", description.as_str()));
            tags.push(MetaTag::name("description", description.as_str()));
        }
        tags.push(MetaTag::name("twitter:card", "summary"));
        tags.push(MetaTag::name("twitter:image", self.image.as_str()));
        tags.push(MetaTag::property("og:image", self.image.as_str()));
        tags.push(MetaTag::property("og:image:width", self.image_width.to_string()));
        tags.push(MetaTag::property("og:image:height", self.image_height.to_string()));
        if let Some(robots) = self.robots {
            tags.push(MetaTag::name("robots", robots));
        }
        if let Some(dc) = &self.dublin_core {
            tags.push(MetaTag::name("dc.identifier", dc.identifier.as_str()));
            tags.push(MetaTag::name("dc.relation.ispartof", DOMAIN));
            tags.push(MetaTag::name("dc.title", dc.title.as_str()));
            tags.push(MetaTag::name("dc.date", dc.date.format("%Y-%m-%d").to_string()));
            tags.push(MetaTag::name(
                "dc.rights",
                format!(
                    "© {} {}. This article is distributed under the terms of the Creative Commons Attribution License, which permits unrestricted use and redistribution provided that the original author and source are credited.",
                    dc.date.year(),
                    PUBLISHER
                ),
            ));
        }
        tags
    }
}

/// Serializes JSON-LD for inclusion in a `<script>` element. `</` is escaped
/// so the document can't close the element early.
fn json_ld(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// The schema.org organization that publishes everything on the site.
pub fn publisher() -> serde_json::Value {
    serde_json::json!({
        "@type": "Organization",
        "name": PUBLISHER,
        "sameAs": format!("https://{}", DOMAIN),
    })
}

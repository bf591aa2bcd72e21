//! Defines the documents returned by the content API. Everything here is a
//! plain [`serde`] mirror of the JSON the API serves; conversion into view
//! models happens in [`crate::compose`] and conversion into citations in
//! [`crate::bibtex`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// A person's name as the API reports it. `index` is the sortable form
/// (e.g., `Bar, Foo`) and `preferred` the display form (e.g., `Foo Bar`).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Name {
    pub preferred: String,
    pub index: String,
}

/// A named person, used for group members and reviewers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Person {
    pub name: Name,

    #[serde(default)]
    pub role: Option<String>,
}

/// An entry in an article's author list.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Author {
    Person {
        name: Name,
    },
    Group {
        name: String,

        #[serde(default)]
        people: Vec<Person>,

        /// Sub-groups keyed by label, in document order.
        #[serde(default)]
        groups: IndexMap<String, Vec<Person>>,
    },
    OnBehalfOf {
        #[serde(rename = "onBehalfOf")]
        on_behalf_of: String,
    },
}

/// A block of structured content. Only paragraphs and sections are rendered;
/// anything else is accepted and skipped.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Paragraph {
        text: String,
    },
    Section {
        title: String,

        #[serde(default)]
        content: Vec<Block>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Abstract {
    #[serde(default)]
    pub doi: Option<String>,
    pub content: Vec<Block>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Poa,
    Vor,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Published,
    Preview,
}

/// A research article, in either its PoA or VoR form. Most fields are
/// optional here because preview articles omit them; [`crate::bibtex`]
/// enforces what a citation needs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub status: Status,
    pub id: String,
    pub version: u32,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub title_prefix: Option<String>,

    pub stage: Stage,

    #[serde(default)]
    pub published: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub version_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub volume: Option<u32>,

    #[serde(default)]
    pub issue: Option<u32>,

    #[serde(default)]
    pub elocation_id: Option<String>,

    #[serde(default)]
    pub author_line: Option<String>,

    #[serde(default)]
    pub authors: Vec<Author>,

    #[serde(default)]
    pub reviewers: Vec<Person>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub r#abstract: Option<Abstract>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub starts: DateTime<Utc>,
    pub ends: DateTime<Utc>,

    #[serde(default)]
    pub impact_statement: Option<String>,

    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAdvert {
    pub id: String,
    pub title: String,
    pub published: DateTime<Utc>,
    pub closing_date: DateTime<Utc>,

    #[serde(default)]
    pub impact_statement: Option<String>,

    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub impact_statement: Option<String>,

    #[serde(default)]
    pub aims_and_scope: Vec<Block>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileDetails {
    pub name: Name,
}

/// A signed-in user's profile.
#[derive(Clone, Debug, Deserialize)]
pub struct Profile {
    pub id: String,
    pub details: ProfileDetails,
}

/// The subset of a IIIF `info.json` document needed to size a picture.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// One page of a paginated collection.
#[derive(Clone, Debug, Deserialize)]
pub struct Listing<T> {
    pub total: usize,
    pub items: Vec<T>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deserialize_authors() -> serde_json::Result<()> {
        let authors: Vec<Author> = serde_json::from_str(
            r#"[
                {"type": "person", "name": {"preferred": "Author One", "index": "One, Author"}},
                {"type": "group", "name": "Group Two", "groups": {
                    "Sub-group 2": [{"name": {"preferred": "B", "index": "B"}}],
                    "Sub-group 1": [{"name": {"preferred": "A", "index": "A"}}]
                }},
                {"type": "on-behalf-of", "onBehalfOf": "on behalf of An Organisation"}
            ]"#,
        )?;

        assert_eq!(3, authors.len());
        match &authors[1] {
            Author::Group { name, people, groups } => {
                assert_eq!("Group Two", name);
                assert!(people.is_empty());
                let labels: Vec<&str> = groups.keys().map(String::as_str).collect();
                assert_eq!(vec!["Sub-group 2", "Sub-group 1"], labels);
            }
            other => panic!("expected a group, got {:?}", other),
        }
        assert_eq!(
            Author::OnBehalfOf {
                on_behalf_of: "on behalf of An Organisation".to_owned()
            },
            authors[2]
        );
        Ok(())
    }

    #[test]
    fn test_deserialize_unknown_block() -> serde_json::Result<()> {
        let blocks: Vec<Block> = serde_json::from_str(
            r#"[{"type": "image", "image": {}}, {"type": "paragraph", "text": "Text."}]"#,
        )?;
        assert_eq!(
            vec![
                Block::Unsupported,
                Block::Paragraph {
                    text: "Text.".to_owned()
                }
            ],
            blocks
        );
        Ok(())
    }

    #[test]
    fn test_deserialize_preview_article() -> serde_json::Result<()> {
        let article: Article = serde_json::from_str(
            r#"{
                "status": "poa", "id": "00001", "version": 1, "type": "research-article",
                "doi": "10.7554/eLife.00001", "title": "Title", "stage": "preview",
                "volume": 1, "elocationId": "e00001"
            }"#,
        )?;
        assert_eq!(Stage::Preview, article.stage);
        assert_eq!(None, article.published);
        assert_eq!(Some("e00001".to_owned()), article.elocation_id);
        Ok(())
    }
}

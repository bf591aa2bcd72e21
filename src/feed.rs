//! Support for creating an Atom feed of upcoming events.

use crate::markup;
use crate::model::Event;
use crate::url::UrlGenerator;
use atom_syndication::{Entry, Error as AtomError, Feed, Link, Text};
use chrono::{DateTime, Utc};
use std::fmt;
use url::ParseError;

const FEED_TITLE: &str = "eLife events";

/// Creates the events feed and serializes it. `updated` stamps the feed
/// itself; entries are dated by when their event starts.
pub fn events_feed(urls: &UrlGenerator, events: &[Event], updated: DateTime<Utc>) -> Result<String> {
    let feed = feed(urls, events, updated)?;
    Ok(String::from_utf8(feed.write_to(Vec::new())?)?)
}

fn feed(urls: &UrlGenerator, events: &[Event], updated: DateTime<Utc>) -> Result<Feed> {
    let self_url = urls.absolute(&urls.events_feed())?.to_string();
    let mut feed = Feed::default();
    feed.set_title(FEED_TITLE);
    feed.set_id(self_url.clone());
    feed.set_updated(updated);
    feed.set_links(vec![
        link(urls.absolute(&urls.events(1))?.to_string(), "alternate"),
        link(self_url, "self"),
    ]);
    feed.set_entries(feed_entries(urls, events)?);
    Ok(feed)
}

fn feed_entries(urls: &UrlGenerator, events: &[Event]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(events.len());
    for event in events {
        let url = urls.absolute(&urls.event(&event.id, &event.title))?.to_string();
        let mut entry = Entry::default();
        entry.set_id(url.clone());
        entry.set_title(markup::strip(&event.title));
        entry.set_updated(event.starts);
        entry.set_links(vec![link(url, "alternate")]);
        entry.set_summary(
            event
                .impact_statement
                .as_deref()
                .map(|statement| Text::plain(markup::strip(statement))),
        );
        entries.push(entry);
    }
    Ok(entries)
}

fn link(href: String, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants include Atom, URL, and
/// encoding issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when an entry's absolute URL can't be built.
    Url(ParseError),

    /// Returned when the serialized feed isn't valid UTF-8.
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::Url(err) => err.fmt(f),
            Error::Utf8(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::Url(err) => Some(err),
            Error::Utf8(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator when building entry URLs.
    fn from(err: ParseError) -> Error {
        Error::Url(err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    /// Converts [`std::string::FromUtf8Error`]s into [`Error`].
    fn from(err: std::string::FromUtf8Error) -> Error {
        Error::Utf8(err)
    }
}

use crate::markup;
use url::{ParseError, Url};

/// Generates the paths and URLs of the site's pages. Paths are
/// root-relative (`/events/1/event-title`); [`UrlGenerator::absolute`]
/// resolves them against the public site URL for metadata that must be
/// absolute.
#[derive(Clone, Debug)]
pub struct UrlGenerator {
    site_url: Url,
}

impl UrlGenerator {
    /// Constructs a new `UrlGenerator`
    ///
    /// # Arguments
    ///
    /// * `site_url` - the public root of the site (e.g.
    ///   `https://example.org/`).
    pub fn new(site_url: Url) -> UrlGenerator {
        UrlGenerator { site_url }
    }

    pub fn home(&self) -> String {
        String::from("/")
    }

    /// The canonical path of an event, whose slug is derived from its title.
    pub fn event(&self, id: &str, title: &str) -> String {
        format!("/events/{}/{}", id, slugify(title))
    }

    /// The path of a page of the events listing. The first page has no
    /// `page` parameter.
    pub fn events(&self, page: usize) -> String {
        match page > 1 {
            false => String::from("/events"),
            true => format!("/events?page={}", page),
        }
    }

    pub fn events_feed(&self) -> String {
        String::from("/feeds/events.atom")
    }

    /// The canonical path of a job advert, whose slug is derived from its
    /// title.
    pub fn job_advert(&self, id: &str, title: &str) -> String {
        format!("/jobs/{}/{}", id, slugify(title))
    }

    pub fn article_bibtex(&self, id: &str) -> String {
        format!("/articles/{}.bib", id)
    }

    pub fn subject(&self, id: &str) -> String {
        format!("/subjects/{}", id)
    }

    /// The editors page for a subject.
    pub fn subject_editors(&self, id: &str) -> String {
        format!("/about/people/{}", id)
    }

    pub fn publishing(&self) -> String {
        String::from("/about/publishing-with-elife")
    }

    /// The archive index. It only redirects to a year.
    pub fn archive(&self) -> String {
        String::from("/archive")
    }

    pub fn archive_year(&self, year: i32) -> String {
        format!("/archive/{}", year)
    }

    pub fn log_in(&self) -> String {
        String::from("/log-in")
    }

    pub fn log_out(&self) -> String {
        String::from("/log-out")
    }

    /// Resolves a root-relative `path` against the site URL.
    pub fn absolute(&self, path: &str) -> Result<Url> {
        self.site_url.join(path)
    }
}

/// Appends a raw query string to `path`, if there is one.
pub fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_owned(),
    }
}

/// Converts a (possibly marked-up) title into a URL slug.
pub fn slugify(title: &str) -> String {
    slug::slugify(markup::strip(title))
}

type Result<T> = std::result::Result<T, ParseError>;

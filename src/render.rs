//! Renders composed pages to HTML with `gtmpl` templates. Each kind of content
//! has its own template, rendered first; its output is then handed to the
//! layout template as `main`. The built-in templates are compiled into the
//! binary and can be replaced by theme files.

use crate::page::{Content, Page, View};
use crate::value;
use gtmpl::{Template, Value};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const LAYOUT: &str = include_str!("../templates/layout.html");
const EVENT: &str = include_str!("../templates/event.html");
const JOB_ADVERT: &str = include_str!("../templates/job_advert.html");
const LISTING: &str = include_str!("../templates/listing.html");
const PUBLISHING: &str = include_str!("../templates/publishing.html");
const ARCHIVE: &str = include_str!("../templates/archive.html");

/// Template files from a theme. An empty list selects the built-in template;
/// several files are concatenated so one may `define` templates another uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateFiles {
    pub layout: Vec<PathBuf>,
    pub event: Vec<PathBuf>,
    pub job_advert: Vec<PathBuf>,
    pub listing: Vec<PathBuf>,
    pub publishing: Vec<PathBuf>,
    pub archive: Vec<PathBuf>,
}

/// Holds the parsed templates.
pub struct Renderer {
    layout: Template,
    event: Template,
    job_advert: Template,
    listing: Template,
    publishing: Template,
    archive: Template,
}

impl Renderer {
    pub fn new(files: &TemplateFiles) -> Result<Renderer> {
        Ok(Renderer {
            layout: parse_template(LAYOUT, &files.layout)?,
            event: parse_template(EVENT, &files.event)?,
            job_advert: parse_template(JOB_ADVERT, &files.job_advert)?,
            listing: parse_template(LISTING, &files.listing)?,
            publishing: parse_template(PUBLISHING, &files.publishing)?,
            archive: parse_template(ARCHIVE, &files.archive)?,
        })
    }

    /// Creates a renderer that uses only the built-in templates.
    pub fn builtin() -> Result<Renderer> {
        Renderer::new(&TemplateFiles::default())
    }

    /// Renders a whole page.
    pub fn page(&self, page: &Page) -> Result<String> {
        let main = match &page.content {
            Content::Event(event) => execute(&self.event, Value::from(event))?,
            Content::JobAdvert(job) => execute(&self.job_advert, Value::from(job))?,
            Content::Listing(listing) => execute(&self.listing, value::listing(listing, true))?,
            Content::Publishing(publishing) => {
                execute(&self.publishing, Value::from(publishing))?
            }
            Content::Archive(archive) => execute(&self.archive, Value::from(archive))?,
        };
        execute(&self.layout, value::layout(page, main))
    }

    /// Renders a page, or only its listing for incremental-content requests.
    pub fn view(&self, view: &View) -> Result<String> {
        match view {
            View::Page(page) => self.page(page),
            View::Fragment(listing) => execute(&self.listing, value::listing(listing, false)),
        }
    }
}

fn execute(template: &Template, value: Value) -> Result<String> {
    let mut out: Vec<u8> = Vec::new();
    template.execute(&mut out, &gtmpl::Context::from(value)?)?;
    Ok(String::from_utf8(out)?)
}

// Loads the theme's template files, or falls back to `builtin` when there
// are none, and parses the result into a template.
fn parse_template(builtin: &str, template_files: &[PathBuf]) -> Result<Template> {
    let mut contents = String::new();
    match template_files.is_empty() {
        true => contents.push_str(builtin),
        false => {
            for template_file in template_files {
                read_template_file(template_file, &mut contents)?;
            }
        }
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

fn read_template_file(path: &Path, contents: &mut String) -> Result<()> {
    File::open(path)
        .and_then(|mut file| file.read_to_string(contents))
        .map_err(|err| Error::OpenTemplateFile {
            path: path.to_owned(),
            err,
        })?;
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading or executing templates.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors executing a template.
    Template(String),

    /// Returned when a template produces invalid UTF-8.
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "Parsing template: {}", err),
            Error::Template(err) => write!(f, "Executing template: {}", err),
            Error::Utf8(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
            Error::Utf8(err) => Some(err),
        }
    }
}

impl From<String> for Error {
    /// Converts a [`String`] into an [`Error`]. `gtmpl` reports execution
    /// errors as strings; this allows us to use the `?` operator on them.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    /// Converts a [`std::string::FromUtf8Error`] into an [`Error`]. This
    /// allows us to use the `?` operator on template output.
    fn from(err: std::string::FromUtf8Error) -> Error {
        Error::Utf8(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::Metadata;
    use crate::page::*;
    use crate::url::UrlGenerator;
    use url::Url;

    fn page(content: Content) -> Page {
        let urls = UrlGenerator::new(Url::parse("http://localhost/").unwrap());
        let metadata = Metadata::new(
            &urls,
            &SocialImage::default(),
            "Job advert title",
            Some("Jobs"),
            urls.job_advert("1", "Job advert title"),
        )
        .unwrap()
        .noindex();
        Page {
            metadata,
            header: SiteHeader {
                home: urls.home(),
                title: Some("Job advert title".to_owned()),
                profile: None,
                log_in: urls.log_in(),
            },
            info_bars: vec![InfoBar {
                kind: InfoBarKind::Attention,
                text: "This position is now closed to applications.".to_owned(),
            }],
            calls_to_action: Vec::new(),
            email_cta: EmailCta {
                action: "/jobs/1/job-advert-title?a=1&b=2".to_owned(),
            },
            footer: Footer {
                subjects: vec![Link {
                    text: "Cell Biology".to_owned(),
                    url: urls.subject("cell-biology"),
                }],
            },
            user: None,
            content,
        }
    }

    fn header(title: &str) -> ContentHeader {
        ContentHeader {
            title: title.to_owned(),
            impact_statement: None,
            meta: None,
        }
    }

    fn job_advert() -> Content {
        Content::JobAdvert(JobAdvertView {
            header: header("Job advert title"),
            closing: None,
            body: "<p>Job advert text.</p>\n".to_owned(),
        })
    }

    fn listing() -> ListingView {
        ListingView {
            header: ContentHeader {
                meta: Some("Page 2 of 3".to_owned()),
                ..header("Events")
            },
            items: vec![Teaser {
                title: "Event title".to_owned(),
                url: "/events/1/event-title".to_owned(),
                meta: "January 1, 2030 09:00 UTC".to_owned(),
            }],
            prev: Some("/events".to_owned()),
            next: None,
        }
    }

    #[test]
    fn test_page() -> Result<()> {
        let html = Renderer::builtin()?.page(&page(job_advert()))?;
        assert!(html.contains("<title>Job advert title | Jobs | eLife</title>"));
        assert!(html.contains(r#"<link rel="canonical" href="/jobs/1/job-advert-title">"#));
        assert!(html.contains(
            r#"<meta property="og:url" content="http://localhost/jobs/1/job-advert-title">"#
        ));
        assert!(html.contains(r#"<meta name="robots" content="noindex">"#));
        assert!(html.contains(
            r#"<div class="info-bar info-bar--attention">This position is now closed to applications.</div>"#
        ));
        assert!(html.contains(r#"<h1 class="content-header__title">Job advert title</h1>"#));
        assert!(html.contains("<p>Job advert text.</p>"));
        assert!(html.contains(r#"action="/jobs/1/job-advert-title?a=1&amp;b=2""#));
        assert!(html.contains(r#"<a href="/subjects/cell-biology">Cell Biology</a>"#));
        assert!(html.contains(r#"href="/log-in""#));
        assert!(!html.contains("application/ld+json"));
        Ok(())
    }

    #[test]
    fn test_listing_page() -> Result<()> {
        let html = Renderer::builtin()?.page(&page(Content::Listing(listing())))?;
        assert!(html.contains(r#"<h1 class="content-header__title">Events</h1>"#));
        assert!(html.contains("Page 2 of 3"));
        assert!(html.contains(r#"<a href="/events/1/event-title">Event title</a>"#));
        assert!(html.contains(r#"<a rel="prev" href="/events">"#));
        assert!(!html.contains(r#"rel="next""#));
        Ok(())
    }

    #[test]
    fn test_fragment() -> Result<()> {
        let html = Renderer::builtin()?.view(&View::Fragment(listing()))?;
        assert!(html.contains(r#"<a href="/events/1/event-title">Event title</a>"#));
        assert!(!html.contains("content-header"));
        assert!(!html.contains("<html"));
        Ok(())
    }

    #[test]
    fn test_publishing() -> Result<()> {
        let html = Renderer::builtin()?.page(&page(Content::Publishing(PublishingView {
            header: header("Publishing with eLife"),
            subjects: vec![AimsAndScope {
                name: "Subject 1".to_owned(),
                body: "<p>Paragraph 1.</p>\n".to_owned(),
                editors: "/about/people/subject1".to_owned(),
            }],
        })))?;
        assert!(html.contains("<h2>Aims and Scope</h2>"));
        assert!(html.contains(r#"<h3 class="article-section__title">Subject 1</h3>"#));
        assert!(html.contains(r#"<a href="/about/people/subject1">See editors</a>"#));
        Ok(())
    }

    #[test]
    fn test_archive() -> Result<()> {
        let html = Renderer::builtin()?.page(&page(Content::Archive(ArchiveView {
            header: header("Monthly archive"),
            action: "/archive".to_owned(),
            years: vec![
                YearOption {
                    year: 2015,
                    selected: false,
                },
                YearOption {
                    year: 2014,
                    selected: true,
                },
            ],
            months: vec!["January 2014".to_owned()],
        })))?;
        assert!(html.contains(r#"<h1 class="content-header__title">Monthly archive</h1>"#));
        assert!(html.contains(r#"action="/archive" method="get""#));
        assert!(html.contains(r#"<option value="2015">2015</option>"#));
        assert!(html.contains(r#"<option value="2014" selected>2014</option>"#));
        assert!(html.contains(r#"<h2 class="archive__month">January 2014</h2>"#));
        Ok(())
    }

    #[test]
    fn test_missing_theme_file() {
        let files = TemplateFiles {
            layout: vec![PathBuf::from("/nonexistent/layout.html")],
            ..TemplateFiles::default()
        };
        assert!(matches!(
            Renderer::new(&files),
            Err(Error::OpenTemplateFile { .. })
        ));
    }
}

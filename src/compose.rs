//! Assembles pages from the content API. Each page is made of independent
//! regions (the primary item or listing, the signed-in user's profile, calls
//! to action, the footer) which are fetched concurrently within the request's
//! task. Every region has a recovery policy:
//!
//! * the primary content *hard-fails*: not found becomes
//!   [`Outcome::NotFound`], anything else [`Outcome::Error`];
//! * decorative regions *soft-fail*: the failure is logged and the region is
//!   left empty;
//! * the profile *redirects*: a user whose profile can't be loaded is sent to
//!   the log-out URL.
//!
//! The first region that halts decides the outcome and the others are
//! dropped.

use crate::api::{self, ContentApi};
use crate::bibtex::{self, ArticleCitation, CitationRecord};
use crate::html;
use crate::markup;
use crate::metadata::{self, DublinCore, Metadata};
use crate::model::{Event, ImageInfo, Profile, Stage, Subject};
use crate::page::*;
use crate::url::{slugify, with_query, UrlGenerator};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::future::join_all;
use regex::Regex;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use url::Url;

const SUBJECTS_PER_PAGE: usize = 100;
const CALL_TO_ACTION_IMAGE_WIDTH: u32 = 80;

const PUBLISHING_TITLE: &str = "Publishing with eLife";
const PUBLISHING_DESCRIPTION: &str = "eLife welcomes the submission of Research Articles, Short Reports, Tools and Resources articles, Research Advances, Scientific Correspondence and Review Articles in the subject areas below.";
const EVENT_FINISHED: &str = "This event has finished.";
const POSITION_CLOSED: &str = "This position is now closed to applications.";
const ARCHIVE_TITLE: &str = "Monthly archive";

/// The journal's first year of publication.
const FIRST_ARCHIVE_YEAR: i32 = 2012;

/// The result of composing a page. Redirects and missing content are
/// ordinary outcomes, not errors.
#[derive(Debug)]
pub enum Outcome<T> {
    Rendered(T),
    Redirect { location: String, status: u16 },
    NotFound,
    Error(Error),
}

/// Why a region stopped the composition of its page.
#[derive(Debug)]
pub enum Halt {
    Redirect { location: String, status: u16 },
    NotFound,
    Error(Error),
}

impl<T> From<Result<T, Halt>> for Outcome<T> {
    fn from(result: Result<T, Halt>) -> Outcome<T> {
        match result {
            Ok(value) => Outcome::Rendered(value),
            Err(Halt::Redirect { location, status }) => Outcome::Redirect { location, status },
            Err(Halt::NotFound) => Outcome::NotFound,
            Err(Halt::Error(err)) => Outcome::Error(err),
        }
    }
}

/// The parts of an inbound request the composer needs.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub path: String,

    /// The raw query string, without the leading `?`.
    pub query: Option<String>,

    /// The slug segment of slugged routes.
    pub slug: Option<String>,

    /// The id of the authenticated user.
    pub user: Option<String>,

    /// Set for `X-Requested-With: XMLHttpRequest` requests, which receive
    /// only the listing of a listing page.
    pub fragment: bool,
    pub now: DateTime<Utc>,
}

impl PageRequest {
    pub fn new(path: impl Into<String>) -> PageRequest {
        PageRequest {
            path: path.into(),
            query: None,
            slug: None,
            user: None,
            fragment: false,
            now: Utc::now(),
        }
    }

    /// The request path and query string.
    pub fn uri(&self) -> String {
        with_query(&self.path, self.query.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub path: String,
}

/// A configured call to action.
#[derive(Clone, Debug)]
pub struct CallToAction {
    pub id: String,
    pub text: String,

    /// A IIIF image.
    pub image: Url,
    pub button: Button,

    /// Shown only on request paths matching this expression.
    pub path: Option<Regex>,

    /// Hidden before this time.
    pub from: Option<DateTime<Utc>>,
    pub needs_js: bool,
    pub cookie_expires: Option<DateTime<Utc>>,
}

impl CallToAction {
    fn applies_to(&self, req: &PageRequest) -> bool {
        if let Some(from) = self.from {
            if req.now < from {
                return false;
            }
        }
        match &self.path {
            Some(path) => path.is_match(&req.path),
            None => true,
        }
    }
}

/// The regions shared by every full page.
struct Regions {
    profile: Option<Profile>,
    calls_to_action: Vec<CallToActionView>,
    footer: Footer,
}

/// Composes pages. Holds only immutable collaborators, so one instance is
/// shared by every request.
pub struct Composer {
    api: Arc<dyn ContentApi>,
    urls: UrlGenerator,
    calls_to_action: Vec<CallToAction>,
    social_image: SocialImage,
    events_per_page: usize,
}

impl Composer {
    pub fn new(
        api: Arc<dyn ContentApi>,
        urls: UrlGenerator,
        calls_to_action: Vec<CallToAction>,
    ) -> Composer {
        Composer {
            api,
            urls,
            calls_to_action,
            social_image: SocialImage::default(),
            events_per_page: 10,
        }
    }

    pub fn with_social_image(mut self, social_image: SocialImage) -> Composer {
        self.social_image = social_image;
        self
    }

    pub fn with_events_per_page(mut self, events_per_page: usize) -> Composer {
        self.events_per_page = events_per_page.max(1);
        self
    }

    pub fn urls(&self) -> &UrlGenerator {
        &self.urls
    }

    /// Composes the page of an event.
    pub async fn event(&self, req: &PageRequest, id: &str) -> Outcome<Page> {
        self.event_page(req, id).await.into()
    }

    /// Composes the page of a job advert.
    pub async fn job_advert(&self, req: &PageRequest, id: &str) -> Outcome<Page> {
        self.job_advert_page(req, id).await.into()
    }

    /// Composes a page of the events listing. Pages are 1-based.
    pub async fn events_listing(&self, req: &PageRequest, page: usize) -> Outcome<View> {
        self.events_listing_view(req, page).await.into()
    }

    /// Composes the aims and scope of every subject.
    pub async fn publishing(&self, req: &PageRequest) -> Outcome<Page> {
        self.publishing_page(req).await.into()
    }

    /// Composes the monthly archive of `year`. Only complete years since the
    /// journal launched have an archive.
    pub async fn archive(&self, req: &PageRequest, year: i32) -> Outcome<Page> {
        self.archive_page(req, year).await.into()
    }

    /// Sends the archive's year picker on to the chosen year.
    pub fn archive_index(&self, req: &PageRequest, year: Option<&str>) -> Outcome<Page> {
        match year.and_then(|year| year.trim().parse::<i32>().ok()) {
            Some(year) if archive_years(&req.now).contains(&year) => Outcome::Redirect {
                location: self.urls.archive_year(year),
                status: 302,
            },
            _ => Outcome::NotFound,
        }
    }

    /// Formats an article as BibTeX. Articles that are missing, not yet
    /// published, or lack what a citation needs are not found.
    pub async fn bibtex(&self, id: &str) -> Outcome<CitationRecord> {
        self.citation(id).await.into()
    }

    /// Loads the upcoming events for the events feed.
    pub async fn events_feed(&self) -> Outcome<Vec<Event>> {
        self.api
            .events(1, self.events_per_page)
            .await
            .map(|listing| listing.items)
            .map_err(might_not_exist)
            .into()
    }

    async fn event_page(&self, req: &PageRequest, id: &str) -> Result<Page, Halt> {
        let item = async {
            let event = self.api.event(id).await.map_err(might_not_exist)?;
            check_slug(req, &self.urls.event(&event.id, &event.title), &event.title)?;
            Ok::<_, Halt>(event)
        };
        let (event, regions) = self.with_regions(req, item).await?;

        let title = markup::strip(&event.title);
        let mut metadata = Metadata::new(
            &self.urls,
            &self.social_image,
            &title,
            Some("Events"),
            self.urls.event(&event.id, &event.title),
        )?
        .with_description(event.impact_statement.as_deref().map(markup::strip));
        let schema_org = json!({
            "@context": "https://schema.org",
            "@type": "Event",
            "name": title,
            "startDate": event.starts.to_rfc3339(),
            "endDate": event.ends.to_rfc3339(),
            "url": metadata.url,
            "organizer": metadata::publisher(),
        });
        metadata = metadata.with_schema_org(schema_org);

        let mut info_bars = Vec::new();
        if event.ends < req.now {
            info_bars.push(InfoBar {
                kind: InfoBarKind::Attention,
                text: EVENT_FINISHED.to_owned(),
            });
            metadata = metadata.noindex();
        }

        let content = Content::Event(EventView {
            header: ContentHeader {
                title: html::rich_text(&event.title),
                impact_statement: event.impact_statement.as_deref().map(html::rich_text),
                meta: None,
            },
            starts: date_time(&event.starts),
            ends: date_time(&event.ends),
            body: html::blocks(&event.content, 2),
        });
        Ok(self.assemble(req, regions, Some(&event.title), metadata, info_bars, content))
    }

    async fn job_advert_page(&self, req: &PageRequest, id: &str) -> Result<Page, Halt> {
        let item = async {
            let job = self.api.job_advert(id).await.map_err(might_not_exist)?;
            check_slug(req, &self.urls.job_advert(&job.id, &job.title), &job.title)?;
            Ok::<_, Halt>(job)
        };
        let (job, regions) = self.with_regions(req, item).await?;

        let title = markup::strip(&job.title);
        let description = job.impact_statement.as_deref().map(markup::strip);
        let mut metadata = Metadata::new(
            &self.urls,
            &self.social_image,
            &title,
            Some("Jobs"),
            self.urls.job_advert(&job.id, &job.title),
        )?
        .with_description(description.clone())
        .with_dublin_core(DublinCore {
            identifier: format!("job-advert/{}", job.id),
            title: title.clone(),
            date: job.published,
        });
        let schema_org = json!({
            "@context": "https://schema.org",
            "@type": "JobPosting",
            "name": title,
            "title": title,
            "description": description.unwrap_or_else(|| title.clone()),
            "datePosted": job.published.format("%Y-%m-%d").to_string(),
            "validThrough": job.closing_date.to_rfc3339(),
            "url": metadata.url,
            "hiringOrganization": metadata::publisher(),
        });
        metadata = metadata.with_schema_org(schema_org);

        let mut info_bars = Vec::new();
        let closing = match job.closing_date < req.now {
            true => {
                info_bars.push(InfoBar {
                    kind: InfoBarKind::Attention,
                    text: POSITION_CLOSED.to_owned(),
                });
                metadata = metadata.noindex();
                None
            }
            false => Some(format!(
                "Closing date for applications is {}.",
                date(&job.closing_date)
            )),
        };

        let content = Content::JobAdvert(JobAdvertView {
            header: ContentHeader {
                title: html::rich_text(&job.title),
                impact_statement: job.impact_statement.as_deref().map(html::rich_text),
                meta: None,
            },
            closing,
            body: html::blocks(&job.content, 2),
        });
        Ok(self.assemble(req, regions, Some(&job.title), metadata, info_bars, content))
    }

    async fn events_listing_view(&self, req: &PageRequest, page: usize) -> Result<View, Halt> {
        let listing = async {
            if page == 0 {
                return Err(Halt::NotFound);
            }
            let events = self
                .api
                .events(page, self.events_per_page)
                .await
                .map_err(might_not_exist)?;
            let paginator = Paginator {
                title: String::from("Events"),
                current_page: page,
                per_page: self.events_per_page,
                total: events.total,
            };
            if page > 1 && page > paginator.total_pages() {
                return Err(Halt::NotFound);
            }
            Ok::<_, Halt>(self.event_listing(&paginator, &events.items))
        };

        if req.fragment {
            return Ok(View::Fragment(listing.await?));
        }

        let (listing, regions) = self.with_regions(req, listing).await?;
        let metadata = Metadata::new(
            &self.urls,
            &self.social_image,
            "Events",
            None,
            self.urls.events(page),
        )?;
        let page = self.assemble(
            req,
            regions,
            None,
            metadata,
            Vec::new(),
            Content::Listing(listing),
        );
        Ok(View::Page(Box::new(page)))
    }

    fn event_listing(&self, paginator: &Paginator, events: &[Event]) -> ListingView {
        ListingView {
            header: ContentHeader {
                title: html::escape(&paginator.title),
                impact_statement: None,
                meta: match paginator.current_page > 1 {
                    true => Some(paginator.position()),
                    false => None,
                },
            },
            items: events
                .iter()
                .map(|event| Teaser {
                    title: html::rich_text(&event.title),
                    url: self.urls.event(&event.id, &event.title),
                    meta: date_time(&event.starts),
                })
                .collect(),
            prev: paginator.prev_page().map(|n| self.urls.events(n)),
            next: paginator.next_page().map(|n| self.urls.events(n)),
        }
    }

    async fn publishing_page(&self, req: &PageRequest) -> Result<Page, Halt> {
        let item = async {
            self.api
                .subjects(1, SUBJECTS_PER_PAGE)
                .await
                .map_err(might_not_exist)
        };

        // The footer lists the same subjects, so it is built from the
        // primary content instead of being fetched again.
        let no_footer = async { Ok(Footer::default()) };
        let (subjects, mut regions) = self.with_footer(req, item, no_footer).await?;
        regions.footer = self.footer_links(&subjects.items);

        let metadata = Metadata::new(
            &self.urls,
            &self.social_image,
            PUBLISHING_TITLE,
            Some("About"),
            self.urls.publishing(),
        )?
        .with_description(Some(PUBLISHING_DESCRIPTION.to_owned()));

        let content = Content::Publishing(PublishingView {
            header: ContentHeader {
                title: html::escape(PUBLISHING_TITLE),
                impact_statement: Some(html::escape(PUBLISHING_DESCRIPTION)),
                meta: None,
            },
            subjects: subjects
                .items
                .iter()
                .map(|subject| AimsAndScope {
                    name: html::escape(&subject.name),
                    body: html::blocks(&subject.aims_and_scope, 4),
                    editors: self.urls.subject_editors(&subject.id),
                })
                .collect(),
        });
        Ok(self.assemble(req, regions, None, metadata, Vec::new(), content))
    }

    async fn archive_page(&self, req: &PageRequest, year: i32) -> Result<Page, Halt> {
        let years = archive_years(&req.now);
        if !years.contains(&year) {
            return Err(Halt::NotFound);
        }
        let ((), regions) = self.with_regions(req, async { Ok(()) }).await?;

        let metadata = Metadata::new(
            &self.urls,
            &self.social_image,
            &format!("{} {}", ARCHIVE_TITLE, year),
            None,
            self.urls.archive_year(year),
        )?;
        let content = Content::Archive(ArchiveView {
            header: ContentHeader {
                title: html::escape(ARCHIVE_TITLE),
                impact_statement: None,
                meta: None,
            },
            action: self.urls.archive(),
            years: years
                .rev()
                .map(|option| YearOption {
                    year: option,
                    selected: option == year,
                })
                .collect(),
            months: (1..=12)
                .filter_map(|month| NaiveDate::from_ymd_opt(year, month, 1))
                .map(|first| first.format("%B %Y").to_string())
                .collect(),
        });
        Ok(self.assemble(req, regions, None, metadata, Vec::new(), content))
    }

    async fn citation(&self, id: &str) -> Result<CitationRecord, Halt> {
        let article = self.api.article(id).await.map_err(might_not_exist)?;
        if article.stage != Stage::Published {
            tracing::info!(article = %id, "not exporting an unpublished article");
            return Err(Halt::NotFound);
        }
        let uncitable = |err: bibtex::Error| {
            tracing::info!(article = %id, error = %err, "article can't be cited");
            Halt::NotFound
        };
        let citation = ArticleCitation::try_from(&article).map_err(uncitable)?;
        bibtex::format(&citation).map_err(uncitable)
    }

    /// Polls `item` alongside the shared regions. The first region to halt
    /// wins.
    async fn with_regions<T, F>(&self, req: &PageRequest, item: F) -> Result<(T, Regions), Halt>
    where
        F: Future<Output = Result<T, Halt>>,
    {
        self.with_footer(req, item, self.footer()).await
    }

    async fn with_footer<T, F, G>(
        &self,
        req: &PageRequest,
        item: F,
        footer: G,
    ) -> Result<(T, Regions), Halt>
    where
        F: Future<Output = Result<T, Halt>>,
        G: Future<Output = Result<Footer, Halt>>,
    {
        let (item, profile, calls_to_action, footer) =
            futures::try_join!(item, self.profile(req), self.calls_to_action(req), footer)?;
        Ok((
            item,
            Regions {
                profile,
                calls_to_action,
                footer,
            },
        ))
    }

    fn assemble(
        &self,
        req: &PageRequest,
        regions: Regions,
        item_title: Option<&str>,
        metadata: Metadata,
        info_bars: Vec<InfoBar>,
        content: Content,
    ) -> Page {
        Page {
            metadata,
            header: SiteHeader {
                home: self.urls.home(),
                title: item_title.map(|title| html::escape(&markup::strip(title))),
                profile: regions.profile.map(|profile| ProfileLink {
                    name: html::escape(&profile.details.name.preferred),
                    log_out: self.urls.log_out(),
                }),
                log_in: self.urls.log_in(),
            },
            info_bars,
            calls_to_action: regions.calls_to_action,
            email_cta: EmailCta { action: req.uri() },
            footer: regions.footer,
            user: req.user.clone(),
            content,
        }
    }

    /// Loads the signed-in user's profile. A user whose profile can't be
    /// loaded is logged out.
    async fn profile(&self, req: &PageRequest) -> Result<Option<Profile>, Halt> {
        let user = match &req.user {
            None => return Ok(None),
            Some(user) => user,
        };
        match self.api.profile(user).await {
            Ok(profile) => Ok(Some(profile)),
            Err(err) => {
                tracing::error!(user = %user, error = %err, "Logging user {} out due to {}", user, err);
                let location = self.urls.absolute(&self.urls.log_out())?;
                Err(Halt::Redirect {
                    location: location.to_string(),
                    status: 302,
                })
            }
        }
    }

    /// Selects the calls to action for this request. Only one is shown at a
    /// time.
    async fn calls_to_action(&self, req: &PageRequest) -> Result<Vec<CallToActionView>, Halt> {
        let selected = self
            .calls_to_action
            .iter()
            .filter(|cta| cta.applies_to(req))
            .take(1);
        let views = join_all(selected.map(|cta| async move {
            soft_failure(
                self.call_to_action(cta).await.map(Some),
                "failed to load a call to action image",
            )
        }))
        .await;
        Ok(views.into_iter().flatten().collect())
    }

    async fn call_to_action(&self, cta: &CallToAction) -> api::Result<CallToActionView> {
        let info = self.api.image(&cta.image).await?;
        Ok(CallToActionView {
            id: html::escape(&cta.id),
            text: html::escape(&cta.text),
            image: picture(&cta.image, info, CALL_TO_ACTION_IMAGE_WIDTH),
            button: Link {
                text: html::escape(&cta.button.text),
                url: cta.button.path.clone(),
            },
            needs_js: cta.needs_js,
            cookie_expires: cta.cookie_expires.map(|expires| expires.to_rfc3339()),
        })
    }

    async fn footer(&self) -> Result<Footer, Halt> {
        let subjects = self.api.subjects(1, SUBJECTS_PER_PAGE).await;
        Ok(soft_failure(
            subjects.map(|listing| self.footer_links(&listing.items)),
            "failed to load the footer subjects",
        ))
    }

    fn footer_links(&self, subjects: &[Subject]) -> Footer {
        Footer {
            subjects: subjects
                .iter()
                .map(|subject| Link {
                    text: html::escape(&subject.name),
                    url: self.urls.subject(&subject.id),
                })
                .collect(),
        }
    }
}

/// Hard-fail policy: missing upstream content is a missing page.
fn might_not_exist(err: api::Error) -> Halt {
    match err.is_not_found() {
        true => Halt::NotFound,
        false => Halt::Error(Error::Api(err)),
    }
}

/// The years with an archive: from launch up to, but excluding, the current
/// year.
fn archive_years(now: &DateTime<Utc>) -> Range<i32> {
    FIRST_ARCHIVE_YEAR..now.year()
}

/// Soft-fail policy: logs the failure and carries on with an empty region.
fn soft_failure<T: Default>(result: api::Result<T>, message: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "{}", message);
            T::default()
        }
    }
}

/// Redirects to `canonical` (keeping the query string) unless the request's
/// slug matches the one derived from `title`.
fn check_slug(req: &PageRequest, canonical: &str, title: &str) -> Result<(), Halt> {
    match req.slug.as_deref() == Some(slugify(title).as_str()) {
        true => Ok(()),
        false => Err(Halt::Redirect {
            location: with_query(canonical, req.query.as_deref()),
            status: 301,
        }),
    }
}

/// A IIIF rendition `width` pixels wide, with its height scaled to match.
fn picture(image: &Url, info: ImageInfo, width: u32) -> Picture {
    let height = match info.width {
        0 => width,
        w => u32::try_from(u64::from(info.height) * u64::from(width) / u64::from(w))
            .unwrap_or(u32::MAX),
    };
    Picture {
        uri: format!(
            "{}/full/{},/0/default.jpg",
            image.as_str().trim_end_matches('/'),
            width
        ),
        width,
        height,
    }
}

fn date(d: &DateTime<Utc>) -> String {
    d.format("%B %-d, %Y").to_string()
}

fn date_time(d: &DateTime<Utc>) -> String {
    d.format("%B %-d, %Y %H:%M UTC").to_string()
}

/// Represents a failure to compose a page.
#[derive(Debug)]
pub enum Error {
    /// Returned when the content API fails for the primary content.
    Api(api::Error),

    /// Returned when an absolute URL can't be built.
    Url(url::ParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Api(err) => err.fmt(f),
            Error::Url(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Api(err) => Some(err),
            Error::Url(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Halt {
    /// Converts a [`url::ParseError`] into a [`Halt`]. This allows us to use
    /// the `?` operator when building absolute URLs inside regions.
    fn from(err: url::ParseError) -> Halt {
        Halt::Error(Error::Url(err))
    }
}

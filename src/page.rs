//! View models for composed pages. A [`Page`] is what the composer hands to
//! the renderer: each region as its own field, with every string already
//! safe to drop into HTML (text is escaped, rich text is rendered by
//! [`crate::html`]).

use crate::metadata::Metadata;
use serde::Deserialize;

/// The image shared on social media when a page has none of its own.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SocialImage {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SocialImage {
    fn default() -> Self {
        SocialImage {
            path: String::from("/assets/images/social/icon-600x600@1.png"),
            width: 600,
            height: 600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    /// HTML.
    pub text: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteHeader {
    pub home: String,

    /// The title of the page's main item, if it has one.
    pub title: Option<String>,

    /// Set for signed-in users.
    pub profile: Option<ProfileLink>,
    pub log_in: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileLink {
    pub name: String,
    pub log_out: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoBarKind {
    Attention,
    Info,
}

impl InfoBarKind {
    pub fn class(&self) -> &'static str {
        match self {
            InfoBarKind::Attention => "attention",
            InfoBarKind::Info => "info",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoBar {
    pub kind: InfoBarKind,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    pub uri: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallToActionView {
    pub id: String,
    pub text: String,
    pub image: Picture,
    pub button: Link,
    pub needs_js: bool,

    /// RFC 3339; when set the call to action can be dismissed until then.
    pub cookie_expires: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailCta {
    /// Where the sign-up form posts to (the current page).
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Footer {
    pub subjects: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHeader {
    /// HTML.
    pub title: String,

    /// HTML.
    pub impact_statement: Option<String>,
    pub meta: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventView {
    pub header: ContentHeader,
    pub starts: String,
    pub ends: String,

    /// HTML.
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobAdvertView {
    pub header: ContentHeader,

    /// "Closing date for applications is ...", while the position is open.
    pub closing: Option<String>,

    /// HTML.
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Teaser {
    /// HTML.
    pub title: String,
    pub url: String,
    pub meta: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingView {
    pub header: ContentHeader,
    pub items: Vec<Teaser>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AimsAndScope {
    pub name: String,

    /// HTML.
    pub body: String,
    pub editors: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishingView {
    pub header: ContentHeader,
    pub subjects: Vec<AimsAndScope>,
}

/// A year offered by the archive's year picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YearOption {
    pub year: i32,
    pub selected: bool,
}

/// The monthly archive of one year.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveView {
    pub header: ContentHeader,

    /// Where the year picker submits to.
    pub action: String,

    /// Most recent first.
    pub years: Vec<YearOption>,
    pub months: Vec<String>,
}

/// The main item of a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Event(EventView),
    JobAdvert(JobAdvertView),
    Listing(ListingView),
    Publishing(PublishingView),
    Archive(ArchiveView),
}

/// A fully composed page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub metadata: Metadata,
    pub header: SiteHeader,
    pub info_bars: Vec<InfoBar>,
    pub calls_to_action: Vec<CallToActionView>,
    pub email_cta: EmailCta,
    pub footer: Footer,

    /// The signed-in user's id.
    pub user: Option<String>,
    pub content: Content,
}

/// What a composed request renders: a whole page, or only the listing for
/// an incremental-content request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum View {
    Page(Box<Page>),
    Fragment(ListingView),
}

/// Tracks where a page sits in a paginated listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paginator {
    pub title: String,

    /// 1-based.
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl Paginator {
    pub fn total_pages(&self) -> usize {
        match self.total % self.per_page {
            0 => self.total / self.per_page,
            _ => self.total / self.per_page + 1,
        }
    }

    pub fn prev_page(&self) -> Option<usize> {
        match self.current_page {
            0 | 1 => None,
            n => Some(n - 1),
        }
    }

    pub fn next_page(&self) -> Option<usize> {
        match self.current_page < self.total_pages() {
            false => None,
            true => Some(self.current_page + 1),
        }
    }

    /// "Page 2 of 5", shown on every page after the first.
    pub fn position(&self) -> String {
        format!(
            "Page {} of {}",
            format_number(self.current_page),
            format_number(self.total_pages())
        )
    }
}

/// Formats an integer with comma thousands separators.
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

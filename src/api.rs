//! Defines [`ContentApi`], the typed interface to the remote content API, and
//! [`HttpContentApi`], its live implementation. The API serves JSON documents
//! under versioned media types; every request names the version it expects
//! in its `Accept` header.

use crate::model::{Article, Event, ImageInfo, JobAdvert, Listing, Profile, Subject};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

pub const ARTICLE_MEDIA_TYPE: &str = "application/vnd.elife.article-poa+json; version=3, application/vnd.elife.article-vor+json; version=6";
pub const EVENT_MEDIA_TYPE: &str = "application/vnd.elife.event+json; version=2";
pub const EVENT_LIST_MEDIA_TYPE: &str = "application/vnd.elife.event-list+json; version=1";
pub const JOB_ADVERT_MEDIA_TYPE: &str = "application/vnd.elife.job-advert+json; version=1";
pub const SUBJECT_LIST_MEDIA_TYPE: &str = "application/vnd.elife.subject-list+json; version=1";
pub const PROFILE_MEDIA_TYPE: &str = "application/vnd.elife.profile+json; version=1";

/// The collaborator every page is composed from. Implementations must be
/// safe to share between concurrent requests.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn article(&self, id: &str) -> Result<Article>;

    async fn event(&self, id: &str) -> Result<Event>;

    /// Lists upcoming events, soonest first. `page` is 1-based.
    async fn events(&self, page: usize, per_page: usize) -> Result<Listing<Event>>;

    async fn job_advert(&self, id: &str) -> Result<JobAdvert>;

    /// Lists subjects in ascending order. `page` is 1-based.
    async fn subjects(&self, page: usize, per_page: usize) -> Result<Listing<Subject>>;

    async fn profile(&self, id: &str) -> Result<Profile>;

    /// Fetches the dimensions of a IIIF image.
    async fn image(&self, uri: &Url) -> Result<ImageInfo>;
}

/// Talks to the content API over HTTP.
pub struct HttpContentApi {
    client: reqwest::Client,

    /// The API root, e.g. `https://api.example.org/`. Resources are
    /// addressed beneath its path.
    base_url: Url,
}

impl HttpContentApi {
    pub fn new(base_url: Url) -> HttpContentApi {
        HttpContentApi::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> HttpContentApi {
        HttpContentApi { client, base_url }
    }

    /// Builds the URL of a resource beneath the API root. Each segment is
    /// percent-encoded, so an id can't escape its collection or add a query.
    fn resource(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            return Err(Error::NotFound {
                url: url.to_string(),
                status: 404,
            });
        }
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        media_type: &str,
    ) -> Result<T> {
        let url = self.resource(segments, query)?;
        self.fetch(url, media_type).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url, media_type: &str) -> Result<T> {
        tracing::debug!(%url, "fetching");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, media_type)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(Error::NotFound {
                url: url.to_string(),
                status: response.status().as_u16(),
            }),
            status if !status.is_success() => Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            _ => response.json::<T>().await.map_err(|err| Error::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn article(&self, id: &str) -> Result<Article> {
        self.get(&["articles", id], &[], ARTICLE_MEDIA_TYPE).await
    }

    async fn event(&self, id: &str) -> Result<Event> {
        self.get(&["events", id], &[], EVENT_MEDIA_TYPE).await
    }

    async fn events(&self, page: usize, per_page: usize) -> Result<Listing<Event>> {
        let query = [
            ("page", page.to_string()),
            ("per-page", per_page.to_string()),
            ("type", "open".to_owned()),
            ("order", "asc".to_owned()),
        ];
        self.get(&["events"], &query, EVENT_LIST_MEDIA_TYPE).await
    }

    async fn job_advert(&self, id: &str) -> Result<JobAdvert> {
        self.get(&["job-adverts", id], &[], JOB_ADVERT_MEDIA_TYPE)
            .await
    }

    async fn subjects(&self, page: usize, per_page: usize) -> Result<Listing<Subject>> {
        let query = [
            ("page", page.to_string()),
            ("per-page", per_page.to_string()),
            ("order", "asc".to_owned()),
        ];
        self.get(&["subjects"], &query, SUBJECT_LIST_MEDIA_TYPE).await
    }

    async fn profile(&self, id: &str) -> Result<Profile> {
        self.get(&["profiles", id], &[], PROFILE_MEDIA_TYPE).await
    }

    async fn image(&self, uri: &Url) -> Result<ImageInfo> {
        let mut url = uri.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("info.json");
        self.fetch(url, "application/json").await
    }
}

/// The result of a content API call.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed content API call. [`Error::NotFound`] is the only
/// variant pages treat specially; everything else is an upstream failure.
#[derive(Debug)]
pub enum Error {
    /// Returned for `404 Not Found` and `410 Gone` responses.
    NotFound { url: String, status: u16 },

    /// Returned for any other non-2xx response.
    Status { url: String, status: u16 },

    /// Returned when the response body isn't the expected document.
    Decode { url: String, message: String },

    /// Returned when the request couldn't be made at all.
    Transport(reqwest::Error),

    /// Returned when a resource URL can't be built.
    UrlParse(url::ParseError),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound { url, status } => write!(f, "{} responded {}: not found", url, status),
            Error::Status { url, status } => write!(f, "{} responded {}", url, status),
            Error::Decode { url, message } => write!(f, "decoding {}: {}", url, message),
            Error::Transport(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound { .. } => None,
            Error::Status { .. } => None,
            Error::Decode { .. } => None,
            Error::Transport(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts a [`reqwest::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when sending requests.
    fn from(err: reqwest::Error) -> Error {
        Error::Transport(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}


#[cfg(test)]
mod test {
    use super::stub::StubApi;
    use super::*;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode as Status, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// The requests an upstream has received: path and query, then `Accept`.
    type Seen = Arc<Mutex<Vec<(String, String)>>>;

    async fn upstream(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> Response {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let target = uri.path_and_query().map_or("", |pq| pq.as_str()).to_owned();
        seen.lock().unwrap().push((target, accept));

        match uri.path() {
            "/api/events" => Json(json!({"total": 0, "items": []})).into_response(),
            "/api/events/1" => Json(json!({
                "id": "1",
                "title": "Event title",
                "starts": "2030-01-01T09:00:00Z",
                "ends": "2030-01-01T17:00:00Z"
            }))
            .into_response(),
            "/api/events/2" => Status::SERVICE_UNAVAILABLE.into_response(),
            "/api/events/3" => "{not json".into_response(),
            "/api/job-adverts/1" => Status::GONE.into_response(),
            "/iiif/cta/info.json" => Json(json!({"width": 800, "height": 400})).into_response(),
            _ => Status::NOT_FOUND.into_response(),
        }
    }

    /// Serves [`upstream`] on an ephemeral port and points a client at it.
    async fn serve() -> (HttpContentApi, Url, Seen) {
        let seen = Seen::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let root = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let router = Router::new().fallback(upstream).with_state(seen.clone());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let api = HttpContentApi::with_client(client, root.join("api/").unwrap());
        (api, root, seen)
    }

    fn requests(seen: &Seen) -> Vec<(String, String)> {
        seen.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_http_document() {
        let (api, _, seen) = serve().await;
        assert_eq!("Event title", api.event("1").await.unwrap().title);
        assert_eq!(
            vec![("/api/events/1".to_owned(), EVENT_MEDIA_TYPE.to_owned())],
            requests(&seen)
        );
    }

    #[tokio::test]
    async fn test_http_listing_query() {
        let (api, _, seen) = serve().await;
        assert_eq!(0, api.events(2, 10).await.unwrap().total);
        assert_eq!(
            vec![(
                "/api/events?page=2&per-page=10&type=open&order=asc".to_owned(),
                EVENT_LIST_MEDIA_TYPE.to_owned()
            )],
            requests(&seen)
        );
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let (api, _, _) = serve().await;
        match api.event("9").await {
            Err(Error::NotFound { status, .. }) => assert_eq!(404, status),
            other => panic!("expected not found, got {:?}", other.map(|e| e.id)),
        }
    }

    #[tokio::test]
    async fn test_http_gone_is_not_found() {
        let (api, _, seen) = serve().await;
        match api.job_advert("1").await {
            Err(Error::NotFound { status, .. }) => assert_eq!(410, status),
            other => panic!("expected not found, got {:?}", other.map(|j| j.id)),
        }
        assert_eq!(JOB_ADVERT_MEDIA_TYPE, requests(&seen)[0].1);
    }

    #[tokio::test]
    async fn test_http_upstream_failure() {
        let (api, _, _) = serve().await;
        match api.event("2").await {
            Err(Error::Status { status, .. }) => assert_eq!(503, status),
            other => panic!("expected an upstream failure, got {:?}", other.map(|e| e.id)),
        }
    }

    #[tokio::test]
    async fn test_http_decode_failure() {
        let (api, _, _) = serve().await;
        assert!(matches!(api.event("3").await, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn test_http_id_is_one_segment() {
        let (api, _, seen) = serve().await;
        assert!(api.event("../profiles/x?y").await.unwrap_err().is_not_found());
        assert_eq!("/api/events/..%2Fprofiles%2Fx%3Fy", requests(&seen)[0].0);
    }

    #[tokio::test]
    async fn test_http_dot_segment_is_not_requested() {
        let (api, _, seen) = serve().await;
        assert!(api.profile("..").await.unwrap_err().is_not_found());
        assert!(requests(&seen).is_empty());
    }

    #[tokio::test]
    async fn test_http_image() {
        let (api, root, seen) = serve().await;
        let info = api.image(&root.join("iiif/cta").unwrap()).await.unwrap();
        assert_eq!((800, 400), (info.width, info.height));
        assert_eq!(
            vec![("/iiif/cta/info.json".to_owned(), "application/json".to_owned())],
            requests(&seen)
        );
    }

    #[tokio::test]
    async fn test_stub_not_found() {
        let api = StubApi::new();
        assert!(api.event("1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stub_gone_is_not_found() {
        let api = StubApi::new().failing("job-adverts/1", 410);
        assert!(api.job_advert("1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stub_upstream_failure() {
        let api = StubApi::new().failing("events/1", 503);
        match api.event("1").await {
            Err(Error::Status { status, .. }) => assert_eq!(503, status),
            other => panic!("expected an upstream failure, got {:?}", other.map(|e| e.id)),
        }
    }

    #[tokio::test]
    async fn test_stub_decode_failure() {
        let api = StubApi::new().with("events/1", json!({"id": "1"}));
        assert!(matches!(api.event("1").await, Err(Error::Decode { .. })));
    }
}

//! HTTP server setup and routing. Handlers turn each request into a
//! [`PageRequest`], ask the [`Composer`] for an [`Outcome`], and translate the
//! outcome into a response.

use crate::compose::{Composer, Outcome, PageRequest};
use crate::feed;
use crate::render::{self, Renderer};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

const AUTHENTICATED_USER: &str = "x-authenticated-user";
const REQUESTED_WITH: &str = "x-requested-with";

/// Everything the handlers share.
pub struct Site {
    pub composer: Composer,
    pub renderer: Renderer,
}

type SharedSite = Arc<Site>;

/// Answers with `rendered` for a composed value, or with the redirect, not
/// found, or error the outcome stands for.
fn respond<T>(outcome: Outcome<T>, rendered: impl FnOnce(T) -> Response) -> Response {
    match outcome {
        Outcome::Rendered(value) => rendered(value),
        Outcome::Redirect { location, status } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FOUND);
            (status, [(header::LOCATION, location)]).into_response()
        }
        Outcome::NotFound => not_found(),
        Outcome::Error(err) => {
            tracing::error!(error = %err, "composing page");
            internal_error()
        }
    }
}

fn html(result: Result<String, render::Error>) -> Response {
    match result {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "rendering page");
            internal_error()
        }
    }
}

/// Builds the axum router.
pub fn build_router(site: SharedSite) -> Router {
    Router::new()
        .route("/articles/{file}", get(article_bibtex))
        .route("/events", get(events))
        .route("/events/{id}", get(event))
        .route("/events/{id}/{slug}", get(event_slugged))
        .route("/jobs/{id}", get(job_advert))
        .route("/jobs/{id}/{slug}", get(job_advert_slugged))
        .route("/about/publishing-with-elife", get(publishing))
        .route("/archive", get(archive_index))
        .route("/archive/{year}", get(archive))
        .route("/feeds/events.atom", get(events_feed))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(site)
}

/// Runs the server. This function blocks until the server is shut down.
pub async fn run_server(site: Site, listen: &str) -> std::io::Result<()> {
    let router = build_router(Arc::new(site));
    let listener = TcpListener::bind(listen).await?;
    info!(addr = %listen, "Journal listening");
    axum::serve(listener, router).await
}

fn page_request(uri: &Uri, headers: &HeaderMap, slug: Option<String>) -> PageRequest {
    PageRequest {
        query: uri.query().map(str::to_owned),
        slug,
        user: headers
            .get(AUTHENTICATED_USER)
            .and_then(|value| value.to_str().ok())
            .filter(|user| !user.is_empty())
            .map(str::to_owned),
        fragment: headers.get(REQUESTED_WITH).map_or(false, |value| {
            value.as_bytes().eq_ignore_ascii_case(b"XMLHttpRequest")
        }),
        ..PageRequest::new(uri.path())
    }
}

async fn event(
    State(site): State<SharedSite>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = page_request(&uri, &headers, None);
    respond(site.composer.event(&req, &id).await, |page| {
        html(site.renderer.page(&page))
    })
}

async fn event_slugged(
    State(site): State<SharedSite>,
    Path((id, slug)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = page_request(&uri, &headers, Some(slug));
    respond(site.composer.event(&req, &id).await, |page| {
        html(site.renderer.page(&page))
    })
}

async fn job_advert(
    State(site): State<SharedSite>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = page_request(&uri, &headers, None);
    respond(site.composer.job_advert(&req, &id).await, |page| {
        html(site.renderer.page(&page))
    })
}

async fn job_advert_slugged(
    State(site): State<SharedSite>,
    Path((id, slug)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = page_request(&uri, &headers, Some(slug));
    respond(site.composer.job_advert(&req, &id).await, |page| {
        html(site.renderer.page(&page))
    })
}

/// The events listing. Every response varies on `X-Requested-With`, since
/// incremental-content requests receive only the listing.
async fn events(
    State(site): State<SharedSite>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let response = match params.get("page").map(|page| page.parse::<usize>()) {
        Some(Err(_)) => not_found(),
        page => {
            let page = page.and_then(Result::ok).unwrap_or(1);
            let req = page_request(&uri, &headers, None);
            respond(site.composer.events_listing(&req, page).await, |view| {
                html(site.renderer.view(&view))
            })
        }
    };
    ([(header::VARY, "X-Requested-With")], response).into_response()
}

async fn publishing(State(site): State<SharedSite>, uri: Uri, headers: HeaderMap) -> Response {
    let req = page_request(&uri, &headers, None);
    respond(site.composer.publishing(&req).await, |page| {
        html(site.renderer.page(&page))
    })
}

/// The archive's year picker submits here.
async fn archive_index(
    State(site): State<SharedSite>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let req = page_request(&uri, &headers, None);
    let year = params.get("year").map(String::as_str);
    respond(site.composer.archive_index(&req, year), |page| {
        html(site.renderer.page(&page))
    })
}

async fn archive(
    State(site): State<SharedSite>,
    Path(year): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let year = match year.parse::<i32>() {
        Ok(year) => year,
        Err(_) => return not_found(),
    };
    let req = page_request(&uri, &headers, None);
    respond(site.composer.archive(&req, year).await, |page| {
        html(site.renderer.page(&page))
    })
}

/// Serves `/articles/{id}.bib`.
async fn article_bibtex(State(site): State<SharedSite>, Path(file): Path<String>) -> Response {
    let id = match file.strip_suffix(".bib") {
        Some(id) if !id.is_empty() => id,
        _ => return not_found(),
    };
    respond(site.composer.bibtex(id).await, |record| {
        (
            [(header::CONTENT_TYPE, "application/x-bibtex")],
            record.into_string(),
        )
            .into_response()
    })
}

async fn events_feed(State(site): State<SharedSite>) -> Response {
    respond(site.composer.events_feed().await, |events| {
        match feed::events_feed(site.composer.urls(), &events, Utc::now()) {
            Ok(xml) => (
                [(header::CONTENT_TYPE, "application/atom+xml; charset=utf-8")],
                xml,
            )
                .into_response(),
            Err(err) => {
                tracing::error!(error = %err, "creating events feed");
                internal_error()
            }
        }
    })
}

async fn fallback() -> Response {
    not_found()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>Not found</h1>")).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>Internal server error</h1>"),
    )
        .into_response()
}

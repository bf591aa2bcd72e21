//! The library code for the `journal` presentation tier. It fetches content
//! from a remote content API and turns it into HTML pages, an Atom feed, and
//! BibTeX exports. The architecture can be broken down into three steps:
//!
//! 1. Fetching content documents ([`crate::api`])
//! 2. Composing pages from them ([`crate::compose`])
//! 3. Rendering the composed pages ([`crate::render`]), or serving them
//!    over HTTP ([`crate::server`])
//!
//! The composing step is the more involved. A page is made of regions (the
//! main item, the user's profile, calls to action, the footer) which are
//! fetched concurrently; each region decides for itself whether a failure
//! hides the region, sends the user elsewhere, or fails the whole page.
//!
//! The BibTeX export ([`crate::bibtex`]) is a pure function from a validated
//! article to a citation record.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod api;
pub mod bibtex;
pub mod compose;
pub mod config;
pub mod feed;
pub mod html;
pub mod markup;
pub mod metadata;
pub mod model;
pub mod page;
pub mod render;
pub mod server;
pub mod url;
mod value;

//! Client library for the Shlink URL shortener REST API (v3).
//!
//! # Overview
//! Create, read, update and delete short links. Requests carry the API key
//! in `X-Api-Key`; responses decode into `ShortLink` or into a typed
//! `ApiError` chosen by status code.
//!
//! # Design
//! - `shortlink` builds `HttpRequest` values and parses `HttpResponse` values
//!   without touching the network, so status dispatch is deterministic and
//!   testable from literals.
//! - `Client` owns the transport and a cancellable `Lifetime`, and wires the
//!   two halves together for async callers.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod lifetime;
pub mod shortlink;
pub mod types;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{
    ApiError, CannotDeleteShortlink, InvalidShortlinkDataError, Result, ShortcodeNotFoundError,
    UnknownError,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use lifetime::Lifetime;
pub use types::{
    CreateShortlinkRequest, DeviceLongUrls, ModifyShortlinkRequest, ShortLink, ShortLinkMeta,
    VisitsSummary,
};

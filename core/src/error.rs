//! Error types for the Shlink API client.
//!
//! # Design
//! The server reports failures as problem-details JSON whose extra members
//! depend on the status code. Each shape the client understands gets its own
//! payload struct and its own `ApiError` variant, so callers can match on the
//! failure kind and still reach the server's fields. Anything unrecognised
//! falls back to `UnknownError`.
//!
//! The `NotFound` message is a fixed string; callers match on it verbatim.

use serde::Deserialize;
use thiserror::Error;

/// Body of a 400 response: the request carried invalid fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvalidShortlinkDataError {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    pub invalid_elements: Vec<String>,
}

/// Body of a 404 response: no short link with that code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShortcodeNotFoundError {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    pub short_code: String,
    pub domain: Option<String>,
}

/// Body of a 422 response: deletion refused because the link has too many visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CannotDeleteShortlink {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    pub short_code: String,
    pub threshold: u64,
}

/// Any other problem-details body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UnknownError {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
}

/// Errors returned by `Client` and the `shortlink` build/parse functions.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL could not be parsed or cannot carry a path.
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Required configuration is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The client's lifetime was cancelled before the response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The short code cannot name a single link path segment.
    #[error("invalid short code: {0:?}")]
    InvalidShortCode(String),

    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A success or error body was not the JSON it should have been.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("error occurred with shortlink: [{}] invalid elements: {}", .0.title, .0.invalid_elements.join(","))]
    InvalidData(InvalidShortlinkDataError),

    #[error("error occurred with shortlink: not found")]
    NotFound(ShortcodeNotFoundError),

    #[error("error occurred with shortlink: cannot delete, visits threshold {} reached", .0.threshold)]
    DeleteBlocked(CannotDeleteShortlink),

    #[error("unknown api error: {}", .0.detail)]
    Unknown(UnknownError),
}

impl ApiError {
    /// HTTP status for errors the server reported, `None` for local failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InvalidData(_) => Some(400),
            ApiError::NotFound(_) => Some(404),
            ApiError::DeleteBlocked(_) => Some(422),
            ApiError::Unknown(e) => Some(e.status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

//! Request builders and response parsers for the short-url endpoints.
//!
//! # Design
//! Each operation is split into a `build_*` function that produces an
//! `HttpRequest` and a `parse_*` function that consumes an `HttpResponse`.
//! Neither touches the network; `Client` runs the round-trip in between.
//! Every parser checks its own success status first and hands anything else
//! to `handle_common_errors`.

use serde::de::DeserializeOwned;

use crate::error::{
    ApiError, CannotDeleteShortlink, InvalidShortlinkDataError, Result, ShortcodeNotFoundError,
    UnknownError,
};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateShortlinkRequest, ModifyShortlinkRequest, ShortLink};

pub const SHORT_URLS_PATH: &str = "/rest/v3/short-urls";

/// Path of a single short link.
///
/// Codes that would resolve to the collection or another route are refused.
fn short_url_path(short_code: &str) -> Result<String> {
    let dots_only = short_code.chars().all(|c| c == '.');
    if dots_only || short_code.contains('/') {
        return Err(ApiError::InvalidShortCode(short_code.to_string()));
    }
    Ok(format!("{SHORT_URLS_PATH}/{short_code}"))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(ApiError::Serialization)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(ApiError::Deserialization)
}

pub fn build_create_shortlink(request: &CreateShortlinkRequest) -> Result<HttpRequest> {
    Ok(HttpRequest {
        method: HttpMethod::Post,
        path: SHORT_URLS_PATH.to_string(),
        body: Some(encode(request)?),
    })
}

pub fn build_get_shortlink(short_code: &str) -> Result<HttpRequest> {
    Ok(HttpRequest {
        method: HttpMethod::Get,
        path: short_url_path(short_code)?,
        body: None,
    })
}

pub fn build_update_shortlink(
    short_code: &str,
    request: &ModifyShortlinkRequest,
) -> Result<HttpRequest> {
    Ok(HttpRequest {
        method: HttpMethod::Patch,
        path: short_url_path(short_code)?,
        body: Some(encode(request)?),
    })
}

pub fn build_delete_shortlink(short_code: &str) -> Result<HttpRequest> {
    Ok(HttpRequest {
        method: HttpMethod::Delete,
        path: short_url_path(short_code)?,
        body: None,
    })
}

pub fn parse_create_shortlink(response: &HttpResponse) -> Result<ShortLink> {
    parse_short_link(response)
}

pub fn parse_get_shortlink(response: &HttpResponse) -> Result<ShortLink> {
    parse_short_link(response)
}

pub fn parse_update_shortlink(response: &HttpResponse) -> Result<ShortLink> {
    parse_short_link(response)
}

pub fn parse_delete_shortlink(response: &HttpResponse) -> Result<()> {
    if response.status == 204 {
        return Ok(());
    }
    handle_common_errors(response)
}

fn parse_short_link(response: &HttpResponse) -> Result<ShortLink> {
    if response.status == 200 {
        return decode(&response.body);
    }
    handle_common_errors(response)?;
    // 201 is treated as success by the common map but carries no link here.
    Err(ApiError::Unknown(UnknownError {
        status: response.status,
        detail: format!("unexpected status {}", response.status),
        ..UnknownError::default()
    }))
}

/// Map a non-success response to the matching `ApiError`.
///
/// 200 and 201 map to `Ok(())`. A body that does not decode into the shape
/// its status promises yields `ApiError::Deserialization` instead.
pub fn handle_common_errors(response: &HttpResponse) -> Result<()> {
    match response.status {
        200 | 201 => Ok(()),
        400 => Err(ApiError::InvalidData(
            decode::<InvalidShortlinkDataError>(&response.body)?,
        )),
        404 => Err(ApiError::NotFound(decode::<ShortcodeNotFoundError>(
            &response.body,
        )?)),
        422 => Err(ApiError::DeleteBlocked(decode::<CannotDeleteShortlink>(
            &response.body,
        )?)),
        _ => Err(ApiError::Unknown(decode::<UnknownError>(&response.body)?)),
    }
}

//! Async client executing short-url operations against a Shlink server.
//!
//! # Design
//! `Client` owns the transport (`reqwest::Client`), the API key, the parsed
//! base URL, and a `Lifetime`. It carries no per-call state, so one value can
//! serve concurrent calls from many tasks. Operations reuse the pure
//! `shortlink::build_*` / `parse_*` pairs and only add the round-trip.
//!
//! Every request races against the lifetime: cancelling it (or dropping the
//! client) fails in-flight and later calls with `ApiError::Cancelled`.

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::lifetime::Lifetime;
use crate::shortlink;
use crate::types::{CreateShortlinkRequest, ModifyShortlinkRequest, ShortLink};

pub const API_KEY_HEADER: &str = "X-Api-Key";

pub struct Client {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    lifetime: Lifetime,
}

impl Client {
    /// Create a client for the API at `base_url`.
    ///
    /// The client's lifetime is a child of `parent`, or a fresh root when
    /// `parent` is `None`.
    pub fn new(parent: Option<&Lifetime>, api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        let api_key = api_key.into();
        let lifetime = parent.map(Lifetime::child).unwrap_or_default();

        debug!(base_url = %base_url, api_key = %mask_api_key(&api_key), "creating shlink client");

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            lifetime,
        })
    }

    pub fn from_config(parent: Option<&Lifetime>, config: &ClientConfig) -> Result<Self> {
        Self::new(parent, config.api_key.clone(), &config.base_url)
    }

    /// Replace the default transport, e.g. to set timeouts or proxies.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Abort in-flight requests and refuse new ones.
    pub fn cancel(&self) {
        self.lifetime.cancel();
    }

    /// Append `path` to the base URL's path.
    fn url_for(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Issue one request and read the whole response.
    ///
    /// Any status is returned as data; interpreting it is the caller's job.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse> {
        if self.lifetime.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let url = self.url_for(path)?;
        debug!(%method, %url, "sending request");
        trace!(
            "headers: {}: {}, Content-Type: application/json",
            API_KEY_HEADER,
            mask_api_key(&self.api_key)
        );

        let mut builder = self
            .http
            .request(method.into(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, self.api_key.as_str());
        if let Some(body) = body {
            trace!("request body: {body}");
            builder = builder.body(body);
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response.text().await?;
            Ok::<_, ApiError>(HttpResponse {
                status,
                headers,
                body,
            })
        };

        let response = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => return Err(ApiError::Cancelled),
            result = exchange => result?,
        };

        debug!(status = response.status, "received response");
        trace!("response body: {}", response.body);
        Ok(response)
    }

    /// Run a request produced by one of the `shortlink::build_*` functions.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.request(request.method, &request.path, request.body)
            .await
    }

    pub async fn create_shortlink(&self, request: &CreateShortlinkRequest) -> Result<ShortLink> {
        let response = self.execute(shortlink::build_create_shortlink(request)?).await?;
        shortlink::parse_create_shortlink(&response)
    }

    pub async fn get_shortlink(&self, short_code: &str) -> Result<ShortLink> {
        let response = self.execute(shortlink::build_get_shortlink(short_code)?).await?;
        shortlink::parse_get_shortlink(&response)
    }

    pub async fn update_shortlink(
        &self,
        short_code: &str,
        request: &ModifyShortlinkRequest,
    ) -> Result<ShortLink> {
        let response = self
            .execute(shortlink::build_update_shortlink(short_code, request)?)
            .await?;
        shortlink::parse_update_shortlink(&response)
    }

    pub async fn delete_shortlink(&self, short_code: &str) -> Result<()> {
        let response = self.execute(shortlink::build_delete_shortlink(short_code)?).await?;
        shortlink::parse_delete_shortlink(&response)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url.as_str())
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Keep only the first and last four characters of a key for logs.
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_base_url_is_rejected() {
        let err = Client::new(None, "key", "not a url").unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn base_url_without_path_support_is_rejected() {
        let err = Client::new(None, "key", "mailto:admin@example.com").unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn path_is_appended_to_base_path() {
        let client = Client::new(None, "key", "https://sho.rt/api/").unwrap();
        let url = client.url_for("/rest/v3/short-urls/abc123").unwrap();
        assert_eq!(url.as_str(), "https://sho.rt/api/rest/v3/short-urls/abc123");
    }

    #[test]
    fn path_is_appended_to_bare_host() {
        let client = Client::new(None, "key", "http://localhost:8080").unwrap();
        let url = client.url_for("/rest/v3/short-urls").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/rest/v3/short-urls");
    }

    #[test]
    fn short_code_segment_is_percent_encoded() {
        let client = Client::new(None, "key", "http://localhost:8080").unwrap();
        let url = client.url_for("/rest/v3/short-urls/a b").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/rest/v3/short-urls/a%20b");
    }

    #[test]
    fn client_lifetime_follows_parent() {
        let parent = Lifetime::background();
        let client = Client::new(Some(&parent), "key", "http://localhost:8080").unwrap();
        parent.cancel();
        assert!(client.lifetime().is_cancelled());
    }

    #[test]
    fn dropping_client_cancels_its_lifetime() {
        let client = Client::new(None, "key", "http://localhost:8080").unwrap();
        let lifetime = client.lifetime().clone();
        drop(client);
        assert!(lifetime.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_client_refuses_requests() {
        // Port 9 (discard) is never contacted: the lifetime check comes first.
        let client = Client::new(None, "key", "http://127.0.0.1:9").unwrap();
        client.cancel();
        let err = client.get_shortlink("abc123").await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
    }

    #[test]
    fn debug_output_masks_api_key() {
        let client = Client::new(None, "super-secret-key-123456", "http://localhost:8080").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret-key-123456"));
        assert!(debug.contains("supe...3456"));
        assert!(debug.contains("http://localhost:8080/"));
    }

    #[test]
    fn api_key_is_masked() {
        assert_eq!(mask_api_key("0123456789abcdef"), "0123...cdef");
        assert_eq!(mask_api_key("short"), "*****");
    }
}

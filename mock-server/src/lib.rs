use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{
        header::{CONTENT_TYPE, LOCATION, USER_AGENT},
        HeaderMap, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;
use woothee::parser::Parser;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_API_KEY: &str = "test-api-key";
pub const DEFAULT_DOMAIN: &str = "s.test";
/// Links with more visits than this cannot be deleted.
pub const DELETE_VISITS_THRESHOLD: u64 = 15;

const DEFAULT_SHORT_CODE_LENGTH: usize = 5;
const MIN_SHORT_CODE_LENGTH: i64 = 4;
/// Generated codes are cut from a simple-format UUID.
const MAX_SHORT_CODE_LENGTH: i64 = 32;
const PROBLEM_BASE: &str = "https://shlink.io/api/error";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceLongUrls {
    pub android: Option<String>,
    pub ios: Option<String>,
    pub desktop: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitsSummary {
    pub total: u64,
    pub non_bots: u64,
    pub bots: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub valid_since: Option<DateTime<FixedOffset>>,
    pub valid_until: Option<DateTime<FixedOffset>>,
    pub max_visits: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrl {
    pub short_code: String,
    pub short_url: String,
    pub long_url: String,
    pub device_long_urls: DeviceLongUrls,
    pub date_created: DateTime<FixedOffset>,
    pub visits_summary: VisitsSummary,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub domain: Option<String>,
    pub title: Option<String>,
    pub crawlable: bool,
    pub forward_query: bool,
    pub visits_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateShortUrl {
    pub long_url: Option<String>,
    pub device_long_urls: Option<DeviceLongUrls>,
    pub valid_since: Option<DateTime<FixedOffset>>,
    pub valid_until: Option<DateTime<FixedOffset>>,
    pub max_visits: Option<i64>,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub crawlable: bool,
    pub forward_query: bool,
    pub custom_slug: Option<String>,
    pub find_if_exists: bool,
    pub domain: Option<String>,
    pub short_code_length: Option<i64>,
}

/// Edit payload. Fields absent from the JSON keep their current value; a
/// null long URL does too, every other null clears.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditShortUrl {
    #[serde(default)]
    pub long_url: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub device_long_urls: Option<Option<DeviceLongUrls>>,
    #[serde(default, deserialize_with = "present")]
    pub valid_since: Option<Option<DateTime<FixedOffset>>>,
    #[serde(default, deserialize_with = "present")]
    pub valid_until: Option<Option<DateTime<FixedOffset>>>,
    #[serde(default, deserialize_with = "present")]
    pub max_visits: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default)]
    pub crawlable: Option<bool>,
    #[serde(default)]
    pub forward_query: Option<bool>,
}

/// Distinguish "field present, maybe null" from "field absent".
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// RFC 7807 problem details, shaped like the real server's.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_elements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
}

impl Problem {
    fn new(kind: &str, title: &str, detail: String, status: StatusCode) -> Self {
        Self {
            kind: format!("{PROBLEM_BASE}/{kind}"),
            title: title.to_string(),
            detail,
            status: status.as_u16(),
            invalid_elements: None,
            short_code: None,
            threshold: None,
        }
    }

    pub fn invalid_data(elements: Vec<String>) -> Self {
        Self {
            invalid_elements: Some(elements),
            ..Self::new(
                "invalid-data",
                "Invalid data",
                "Provided data is not valid".to_string(),
                StatusCode::BAD_REQUEST,
            )
        }
    }

    pub fn non_unique_slug(slug: &str) -> Self {
        Self::new(
            "non-unique-slug",
            "Invalid custom slug",
            format!("Provided slug \"{slug}\" is already in use."),
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn not_found(short_code: &str) -> Self {
        Self {
            short_code: Some(short_code.to_string()),
            ..Self::new(
                "short-url-not-found",
                "Short URL not found",
                format!("No URL found with short code \"{short_code}\""),
                StatusCode::NOT_FOUND,
            )
        }
    }

    pub fn deletion_blocked(short_code: &str, threshold: u64) -> Self {
        Self {
            short_code: Some(short_code.to_string()),
            threshold: Some(threshold),
            ..Self::new(
                "invalid-short-url-deletion",
                "Cannot delete short URL",
                format!(
                    "It is not possible to delete URL with short code \"{short_code}\" because it has reached more than \"{threshold}\" visits."
                ),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
        }
    }

    pub fn invalid_api_key() -> Self {
        Self::new(
            "invalid-api-key",
            "Invalid API key",
            "Provided API key does not exist or is invalid.".to_string(),
            StatusCode::UNAUTHORIZED,
        )
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(CONTENT_TYPE, "application/problem+json")],
            Json(self),
        )
            .into_response()
    }
}

/// In-memory server state. Links are keyed by short code alone.
#[derive(Debug)]
pub struct Store {
    api_key: String,
    default_domain: String,
    links: RwLock<HashMap<String, ShortUrl>>,
}

impl Store {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            default_domain: DEFAULT_DOMAIN.to_string(),
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Count visits without going through the redirect route.
    /// Returns false when the code is unknown.
    pub async fn record_visits(&self, short_code: &str, non_bots: u64, bots: u64) -> bool {
        let mut links = self.links.write().await;
        match links.get_mut(short_code) {
            Some(link) => {
                add_visits(link, non_bots, bots);
                true
            }
            None => false,
        }
    }
}

pub type Db = Arc<Store>;

pub fn app() -> Router {
    router(Arc::new(Store::new(DEFAULT_API_KEY)))
}

pub fn router(db: Db) -> Router {
    let rest = Router::new()
        .route("/rest/v3/short-urls", post(create_short_url))
        .route(
            "/rest/v3/short-urls/{short_code}",
            get(get_short_url)
                .patch(edit_short_url)
                .delete(delete_short_url),
        )
        .route_layer(middleware::from_fn_with_state(db.clone(), require_api_key));

    Router::new()
        .merge(rest)
        .route("/{short_code}", get(redirect))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, router(db)).await
}

async fn require_api_key(State(db): State<Db>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(db.api_key.as_str()) {
        debug!("rejecting request with missing or wrong api key");
        return Problem::invalid_api_key().into_response();
    }
    next.run(request).await
}

fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

fn invalid_device_urls(urls: &DeviceLongUrls) -> bool {
    [&urls.android, &urls.ios, &urls.desktop]
        .into_iter()
        .flatten()
        .any(|url| !is_valid_url(url))
}

fn invalid_window(
    since: Option<DateTime<FixedOffset>>,
    until: Option<DateTime<FixedOffset>>,
) -> bool {
    matches!((since, until), (Some(since), Some(until)) if until < since)
}

fn generate_short_code(links: &HashMap<String, ShortUrl>, length: usize) -> String {
    loop {
        let code: String = Uuid::new_v4().simple().to_string().chars().take(length).collect();
        if !links.contains_key(&code) {
            return code;
        }
    }
}

fn add_visits(link: &mut ShortUrl, non_bots: u64, bots: u64) {
    link.visits_summary.non_bots += non_bots;
    link.visits_summary.bots += bots;
    link.visits_summary.total += non_bots + bots;
    link.visits_count = link.visits_summary.total;
}

async fn create_short_url(
    State(db): State<Db>,
    Json(input): Json<CreateShortUrl>,
) -> Result<Json<ShortUrl>, Problem> {
    let long_url = input.long_url.unwrap_or_default();
    let device_long_urls = input.device_long_urls.unwrap_or_default();

    let mut invalid = Vec::new();
    if !is_valid_url(&long_url) {
        invalid.push("longUrl");
    }
    if invalid_device_urls(&device_long_urls) {
        invalid.push("deviceLongUrls");
    }
    if invalid_window(input.valid_since, input.valid_until) {
        invalid.push("validUntil");
    }
    if input.max_visits.is_some_and(|max| max < 1) {
        invalid.push("maxVisits");
    }
    if input.custom_slug.as_deref().is_some_and(|slug| slug.trim().is_empty()) {
        invalid.push("customSlug");
    }
    if input
        .short_code_length
        .is_some_and(|length| !(MIN_SHORT_CODE_LENGTH..=MAX_SHORT_CODE_LENGTH).contains(&length))
    {
        invalid.push("shortCodeLength");
    }
    if !invalid.is_empty() {
        return Err(Problem::invalid_data(
            invalid.into_iter().map(String::from).collect(),
        ));
    }

    let mut links = db.links.write().await;

    if input.find_if_exists {
        if let Some(existing) = links
            .values()
            .find(|link| link.long_url == long_url && link.domain == input.domain)
        {
            debug!(short_code = %existing.short_code, "returning existing short url");
            return Ok(Json(existing.clone()));
        }
    }

    let short_code = match input.custom_slug {
        Some(slug) if links.contains_key(&slug) => return Err(Problem::non_unique_slug(&slug)),
        Some(slug) => slug,
        None => {
            let length = input
                .short_code_length
                .map_or(DEFAULT_SHORT_CODE_LENGTH, |length| length as usize);
            generate_short_code(&links, length)
        }
    };

    let host = input.domain.as_deref().unwrap_or(&db.default_domain);
    let link = ShortUrl {
        short_url: format!("https://{host}/{short_code}"),
        short_code: short_code.clone(),
        long_url,
        device_long_urls,
        date_created: Utc::now().fixed_offset(),
        visits_summary: VisitsSummary::default(),
        tags: input.tags,
        meta: Meta {
            valid_since: input.valid_since,
            valid_until: input.valid_until,
            max_visits: input.max_visits,
        },
        domain: input.domain,
        title: input.title,
        crawlable: input.crawlable,
        forward_query: input.forward_query,
        visits_count: 0,
    };
    info!(%short_code, long_url = %link.long_url, "created short url");
    links.insert(short_code, link.clone());
    Ok(Json(link))
}

async fn get_short_url(
    State(db): State<Db>,
    Path(short_code): Path<String>,
) -> Result<Json<ShortUrl>, Problem> {
    let links = db.links.read().await;
    links
        .get(&short_code)
        .cloned()
        .map(Json)
        .ok_or_else(|| Problem::not_found(&short_code))
}

async fn edit_short_url(
    State(db): State<Db>,
    Path(short_code): Path<String>,
    Json(input): Json<EditShortUrl>,
) -> Result<Json<ShortUrl>, Problem> {
    let mut links = db.links.write().await;
    let link = links
        .get_mut(&short_code)
        .ok_or_else(|| Problem::not_found(&short_code))?;

    let since = input.valid_since.unwrap_or(link.meta.valid_since);
    let until = input.valid_until.unwrap_or(link.meta.valid_until);
    let max_visits = input.max_visits.unwrap_or(link.meta.max_visits);
    let device_long_urls = match input.device_long_urls {
        Some(urls) => urls.unwrap_or_default(),
        None => link.device_long_urls.clone(),
    };

    let mut invalid = Vec::new();
    if input.long_url.as_deref().is_some_and(|url| !is_valid_url(url)) {
        invalid.push("longUrl");
    }
    if invalid_device_urls(&device_long_urls) {
        invalid.push("deviceLongUrls");
    }
    if invalid_window(since, until) {
        invalid.push("validUntil");
    }
    if max_visits.is_some_and(|max| max < 1) {
        invalid.push("maxVisits");
    }
    if !invalid.is_empty() {
        return Err(Problem::invalid_data(
            invalid.into_iter().map(String::from).collect(),
        ));
    }

    if let Some(long_url) = input.long_url {
        link.long_url = long_url;
    }
    link.device_long_urls = device_long_urls;
    link.meta = Meta {
        valid_since: since,
        valid_until: until,
        max_visits,
    };
    if let Some(tags) = input.tags {
        link.tags = tags.unwrap_or_default();
    }
    if let Some(title) = input.title {
        link.title = title;
    }
    if let Some(crawlable) = input.crawlable {
        link.crawlable = crawlable;
    }
    if let Some(forward_query) = input.forward_query {
        link.forward_query = forward_query;
    }
    info!(%short_code, "edited short url");
    Ok(Json(link.clone()))
}

async fn delete_short_url(
    State(db): State<Db>,
    Path(short_code): Path<String>,
) -> Result<StatusCode, Problem> {
    let mut links = db.links.write().await;
    let link = links
        .get(&short_code)
        .ok_or_else(|| Problem::not_found(&short_code))?;
    if link.visits_summary.total > DELETE_VISITS_THRESHOLD {
        return Err(Problem::deletion_blocked(&short_code, DELETE_VISITS_THRESHOLD));
    }
    links.remove(&short_code);
    info!(%short_code, "deleted short url");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Device {
    Android,
    Ios,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visitor {
    is_bot: bool,
    device: Option<Device>,
}

fn classify_visitor(user_agent: &str) -> Visitor {
    let result = Parser::new().parse(user_agent).unwrap_or_default();
    let device = match result.os {
        "Android" => Some(Device::Android),
        "iPhone" | "iPad" | "iPod" => Some(Device::Ios),
        _ if result.category == "pc" => Some(Device::Desktop),
        _ => None,
    };
    Visitor {
        is_bot: result.category == "crawler",
        device,
    }
}

/// Public redirect: resolve the code, count the visit, send the visitor on.
async fn redirect(
    State(db): State<Db>,
    Path(short_code): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let visitor = classify_visitor(user_agent);

    let mut links = db.links.write().await;
    let Some(link) = links.get_mut(&short_code) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let now = Utc::now().fixed_offset();
    let expired = link.meta.valid_since.is_some_and(|since| now < since)
        || link.meta.valid_until.is_some_and(|until| now > until)
        || link
            .meta
            .max_visits
            .is_some_and(|max| link.visits_summary.total >= max as u64);
    if expired {
        return StatusCode::NOT_FOUND.into_response();
    }

    if visitor.is_bot {
        add_visits(link, 0, 1);
    } else {
        add_visits(link, 1, 0);
    }

    let device_url = match visitor.device {
        Some(Device::Android) => link.device_long_urls.android.clone(),
        Some(Device::Ios) => link.device_long_urls.ios.clone(),
        Some(Device::Desktop) => link.device_long_urls.desktop.clone(),
        None => None,
    };
    let target = device_url.unwrap_or_else(|| link.long_url.clone());
    (StatusCode::FOUND, [(LOCATION, target)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShortUrl {
        ShortUrl {
            short_code: "abc12".to_string(),
            short_url: "https://s.test/abc12".to_string(),
            long_url: "https://example.com".to_string(),
            device_long_urls: DeviceLongUrls::default(),
            date_created: Utc::now().fixed_offset(),
            visits_summary: VisitsSummary::default(),
            tags: Vec::new(),
            meta: Meta::default(),
            domain: None,
            title: None,
            crawlable: false,
            forward_query: false,
            visits_count: 0,
        }
    }

    #[test]
    fn short_url_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["shortCode"], "abc12");
        assert_eq!(json["visitsSummary"]["nonBots"], 0);
        assert!(json["deviceLongUrls"]["android"].is_null());
        assert!(json["domain"].is_null());
    }

    #[test]
    fn create_payload_fields_are_optional() {
        let input: CreateShortUrl = serde_json::from_str("{}").unwrap();
        assert!(input.long_url.is_none());
        assert!(!input.find_if_exists);
    }

    #[test]
    fn edit_payload_tells_null_from_absent() {
        let input: EditShortUrl = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert_eq!(input.title, Some(None));
        assert!(input.tags.is_none());
        assert!(input.long_url.is_none());
    }

    #[test]
    fn problem_omits_unused_members() {
        let json = serde_json::to_value(Problem::invalid_api_key()).unwrap();
        assert_eq!(json["status"], 401);
        assert!(json.get("invalidElements").is_none());
        assert!(json.get("threshold").is_none());
    }

    #[test]
    fn url_validation_requires_http_scheme_and_host() {
        assert!(is_valid_url("https://example.com"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("https://exa mple.com"));
        assert!(!is_valid_url("http://[::1"));
        assert!(!is_valid_url("https://a b c/<>"));
        assert!(!is_valid_url("mailto:someone@example.com"));
    }

    #[test]
    fn crawler_user_agent_counts_as_bot() {
        let visitor = classify_visitor(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        );
        assert!(visitor.is_bot);
    }

    #[test]
    fn mobile_user_agents_pick_device() {
        let android = classify_visitor(
            "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36",
        );
        assert_eq!(android.device, Some(Device::Android));
        assert!(!android.is_bot);

        let iphone = classify_visitor(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(iphone.device, Some(Device::Ios));
    }

    #[test]
    fn desktop_and_unknown_user_agents() {
        let desktop = classify_visitor(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        );
        assert_eq!(desktop.device, Some(Device::Desktop));

        let unknown = classify_visitor("");
        assert_eq!(unknown, Visitor { is_bot: false, device: None });
    }

    #[test]
    fn visits_accumulate_into_summary() {
        let mut link = sample();
        add_visits(&mut link, 3, 1);
        assert_eq!(link.visits_summary.total, 4);
        assert_eq!(link.visits_count, 4);
    }
}

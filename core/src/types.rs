//! Domain DTOs for the Shlink REST v3 short-url endpoints.
//!
//! # Design
//! These types mirror the server's JSON schema but are defined independently
//! of the mock-server crate; integration tests catch schema drift.
//!
//! Creation payloads leave out every field at its empty value so the server
//! applies its own defaults. Modification payloads always carry every field:
//! the server treats the body as the new state of the editable attributes,
//! and an explicit `null` is how a value gets cleared.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Per-platform destinations overriding the long URL for matching devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLongUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
}

impl DeviceLongUrls {
    pub fn is_empty(&self) -> bool {
        self.android.is_none() && self.ios.is_none() && self.desktop.is_none()
    }
}

/// Request payload for `POST /rest/v3/short-urls`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateShortlinkRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub long_url: String,
    #[serde(skip_serializing_if = "DeviceLongUrls::is_empty")]
    pub device_long_urls: DeviceLongUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_since: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_visits: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub crawlable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub forward_query: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_slug: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub find_if_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code_length: Option<u32>,
}

impl CreateShortlinkRequest {
    pub fn new(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            ..Self::default()
        }
    }
}

/// Request payload for `PATCH /rest/v3/short-urls/{shortCode}`.
///
/// The slug, domain and code length cannot change after creation, so they
/// have no counterpart here. A `None` long URL keeps the current one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifyShortlinkRequest {
    pub long_url: Option<String>,
    pub device_long_urls: DeviceLongUrls,
    pub valid_since: Option<DateTime<FixedOffset>>,
    pub valid_until: Option<DateTime<FixedOffset>>,
    pub max_visits: Option<u32>,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub crawlable: bool,
    pub forward_query: bool,
}

impl From<&ShortLink> for ModifyShortlinkRequest {
    /// Start an edit from the link's current state.
    fn from(link: &ShortLink) -> Self {
        Self {
            long_url: Some(link.long_url.clone()),
            device_long_urls: link.device_long_urls.clone(),
            valid_since: link.meta.valid_since,
            valid_until: link.meta.valid_until,
            max_visits: link.meta.max_visits,
            tags: link.tags.clone(),
            title: link.title.clone(),
            crawlable: link.crawlable,
            forward_query: link.forward_query,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitsSummary {
    pub total: u64,
    pub non_bots: u64,
    pub bots: u64,
}

/// Validity window and visit cap attached to a short link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShortLinkMeta {
    pub valid_since: Option<DateTime<FixedOffset>>,
    pub valid_until: Option<DateTime<FixedOffset>>,
    pub max_visits: Option<u32>,
}

/// A short link as returned by the API.
///
/// Identified by `short_code` within `domain` (`None` is the server's
/// default domain). Every field tolerates being absent from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShortLink {
    pub short_code: String,
    pub short_url: String,
    pub long_url: String,
    pub device_long_urls: DeviceLongUrls,
    pub date_created: Option<DateTime<FixedOffset>>,
    pub visits_summary: VisitsSummary,
    pub tags: Vec<String>,
    pub meta: ShortLinkMeta,
    pub domain: Option<String>,
    pub title: Option<String>,
    pub crawlable: bool,
    pub forward_query: bool,
    pub visits_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_omits_empty_fields() {
        let request = CreateShortlinkRequest {
            find_if_exists: true,
            ..CreateShortlinkRequest::new("https://example.com")
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"longUrl": "https://example.com", "findIfExists": true})
        );
    }

    #[test]
    fn create_request_keeps_set_device_urls_only() {
        let request = CreateShortlinkRequest {
            device_long_urls: DeviceLongUrls {
                ios: Some("https://apps.apple.com/x".to_string()),
                ..DeviceLongUrls::default()
            },
            ..CreateShortlinkRequest::new("https://example.com")
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["deviceLongUrls"], serde_json::json!({"ios": "https://apps.apple.com/x"}));
    }

    #[test]
    fn modify_request_emits_every_field() {
        let json = serde_json::to_value(ModifyShortlinkRequest::default()).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "longUrl",
            "deviceLongUrls",
            "validSince",
            "validUntil",
            "maxVisits",
            "tags",
            "title",
            "crawlable",
            "forwardQuery",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert!(json["title"].is_null());
        assert_eq!(json["crawlable"], false);
    }

    #[test]
    fn short_link_decodes_sparse_payload() {
        let link: ShortLink = serde_json::from_str(
            r#"{"shortCode":"abc123","shortUrl":"https://sho.rt/abc123","longUrl":"https://example.com"}"#,
        )
        .unwrap();
        assert_eq!(link.short_code, "abc123");
        assert!(link.tags.is_empty());
        assert!(link.date_created.is_none());
        assert_eq!(link.visits_summary, VisitsSummary::default());
    }

    #[test]
    fn short_link_decodes_full_payload() {
        let link: ShortLink = serde_json::from_str(
            r#"{
                "shortCode": "12C18",
                "shortUrl": "https://s.test/12C18",
                "longUrl": "https://store.steampowered.com",
                "deviceLongUrls": {"android": null, "ios": null, "desktop": "https://desk.example"},
                "dateCreated": "2016-08-21T20:34:16+02:00",
                "visitsSummary": {"total": 328, "nonBots": 329, "bots": 1},
                "tags": ["games", "tech"],
                "meta": {"validSince": "2017-01-21T00:00:00+02:00", "validUntil": null, "maxVisits": 100},
                "domain": null,
                "title": "Welcome to Steam",
                "crawlable": false,
                "visitsCount": 328
            }"#,
        )
        .unwrap();
        assert_eq!(link.device_long_urls.desktop.as_deref(), Some("https://desk.example"));
        assert_eq!(link.date_created.unwrap().offset().local_minus_utc(), 7200);
        assert_eq!(link.meta.max_visits, Some(100));
        assert_eq!(link.visits_summary.bots, 1);
        assert_eq!(link.title.as_deref(), Some("Welcome to Steam"));
    }

    #[test]
    fn modify_request_starts_from_link_state() {
        let link = ShortLink {
            long_url: "https://example.com".to_string(),
            tags: vec!["a".to_string()],
            crawlable: true,
            ..ShortLink::default()
        };
        let request = ModifyShortlinkRequest::from(&link);
        assert_eq!(request.long_url.as_deref(), Some("https://example.com"));
        assert_eq!(request.tags, vec!["a".to_string()]);
        assert!(request.crawlable);
    }

    #[test]
    fn modify_request_keeps_forward_query() {
        let link: ShortLink = serde_json::from_str(
            r#"{"shortCode":"abc12","longUrl":"https://example.com","forwardQuery":true}"#,
        )
        .unwrap();
        assert!(link.forward_query);

        let request = ModifyShortlinkRequest::from(&link);
        assert!(request.forward_query);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["forwardQuery"], true);
    }
}

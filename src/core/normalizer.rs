//! Turns arbitrary provider payloads into canonical records.
//!
//! Providers change their response shapes without notice, so nothing here
//! assumes a schema. Each lookup is an ordered chain of strategies and the
//! first one that produces a valid `http`/`https` link wins.

use crate::core::{Dialect, MediaType, NormalizedMedia, RawBody, SearchCandidate};
use crate::utils::{http_link, watch_url};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const DEFAULT_TITLE: &str = "Media";

/// Containers providers wrap their payload in.
const ENVELOPES: &[&str] = &["result", "data"];
/// Keys looked at when a link field holds an object instead of a string.
const LINK_KEYS: &[&str] = &["url", "link", "href"];
const DOWNLOAD_KEYS: &[&str] = &["download_url", "downloadUrl", "download"];
const DOWNLOAD_ALIASES: &[&str] = &["downloadUrl", "downloadLink", "download_link", "dl_url", "link"];
const TYPE_KEYS: &[&str] = &["type", "mediaType", "format"];
const LIST_KEYS: &[&str] = &["results", "videos", "items", "data", "result"];

/// One way of finding a download link in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStrategy {
    /// `url` at the top level.
    TopLevel,
    /// `result.url` / `data.url`, or the envelope itself when it is a string.
    Envelope,
    /// `result.download_url` and friends.
    EnvelopeDownload,
    /// `downloadUrl`, `downloadLink`, ... at the top level or in an envelope.
    DownloadAlias,
    /// First link found in a plain-text body.
    RawText,
}

const GENERIC_CHAIN: &[UrlStrategy] = &[
    UrlStrategy::TopLevel,
    UrlStrategy::Envelope,
    UrlStrategy::EnvelopeDownload,
    UrlStrategy::DownloadAlias,
    UrlStrategy::RawText,
];

impl UrlStrategy {
    pub fn extract(self, body: &RawBody) -> Option<String> {
        let root = match body {
            RawBody::Json(Value::String(text)) | RawBody::Text(text) => {
                return match self {
                    UrlStrategy::RawText => first_link_in_text(text),
                    _ => None,
                };
            }
            RawBody::Json(value) => value,
        };

        match self {
            UrlStrategy::TopLevel => root.get("url").and_then(link_from_value),
            UrlStrategy::Envelope => envelopes(root).find_map(link_from_value),
            UrlStrategy::EnvelopeDownload => envelopes(root)
                .find_map(|env| DOWNLOAD_KEYS.iter().find_map(|k| env.get(*k).and_then(link_from_value))),
            UrlStrategy::DownloadAlias => std::iter::once(root)
                .chain(envelopes(root))
                .find_map(|obj| DOWNLOAD_ALIASES.iter().find_map(|k| obj.get(*k).and_then(link_from_value))),
            UrlStrategy::RawText => None,
        }
    }
}

/// The strategy order for a dialect: its preferred strategies, then the
/// generic chain.
pub fn strategy_chain(dialect: Dialect) -> Vec<UrlStrategy> {
    let preferred: &[UrlStrategy] = match dialect {
        Dialect::Generic => &[],
        Dialect::Flat => &[UrlStrategy::TopLevel, UrlStrategy::DownloadAlias],
        Dialect::Nested => &[UrlStrategy::EnvelopeDownload, UrlStrategy::Envelope],
        Dialect::Text => &[UrlStrategy::RawText],
    };

    let mut chain = Vec::with_capacity(GENERIC_CHAIN.len());
    for strategy in preferred.iter().chain(GENERIC_CHAIN) {
        if !chain.contains(strategy) {
            chain.push(*strategy);
        }
    }
    chain
}

/// Extracts a canonical record from one provider body.
///
/// `None` means the payload held no usable link. That is an expected
/// outcome, not an error.
pub fn normalize(body: &RawBody, dialect: Dialect) -> Option<NormalizedMedia> {
    let url = strategy_chain(dialect)
        .into_iter()
        .find_map(|strategy| strategy.extract(body))?;

    let (title, media_type) = match body {
        RawBody::Json(value) => (extract_title(value), extract_media_type(value)),
        RawBody::Text(_) => (None, None),
    };

    Some(NormalizedMedia {
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        url,
        media_type,
    })
}

/// Pulls the candidate list out of a search provider's payload.
///
/// `None` when no list could be found at all, `Some(vec![])` when the
/// provider answered with an empty list.
pub fn extract_candidates(body: &RawBody) -> Option<Vec<SearchCandidate>> {
    let RawBody::Json(root) = body else {
        return None;
    };

    let list = find_list(root)?;
    Some(list.iter().filter_map(candidate_from_value).collect())
}

fn find_list(root: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = root {
        return Some(items);
    }

    for key in LIST_KEYS {
        match root.get(*key) {
            Some(Value::Array(items)) => return Some(items),
            Some(nested @ Value::Object(_)) => {
                if let Some(items) = LIST_KEYS
                    .iter()
                    .find_map(|k| nested.get(*k).and_then(Value::as_array))
                {
                    return Some(items);
                }
            }
            _ => {}
        }
    }

    None
}

fn candidate_from_value(item: &Value) -> Option<SearchCandidate> {
    let url = ["url", "link"]
        .iter()
        .find_map(|k| item.get(*k).and_then(link_from_value))
        .or_else(|| {
            ["videoId", "video_id", "id"]
                .iter()
                .find_map(|k| item.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|id| !id.is_empty() && !id.contains(char::is_whitespace))
                .map(watch_url)
        })?;

    let title = ["title", "name"]
        .iter()
        .find_map(|k| non_empty_str(item.get(*k)))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let thumbnail = ["thumbnail", "image", "thumb"]
        .iter()
        .find_map(|k| item.get(*k).and_then(link_from_value))
        .or_else(|| {
            item.get("thumbnails")
                .and_then(Value::as_array)
                .and_then(|thumbs| thumbs.first())
                .and_then(link_from_value)
        });

    Some(SearchCandidate {
        title,
        url,
        thumbnail,
    })
}

fn envelopes(root: &Value) -> impl Iterator<Item = &Value> {
    ENVELOPES.iter().filter_map(move |k| root.get(*k))
}

/// A string link, or an object holding one under `url`/`link`/`href`.
/// Objects are looked into one level deep only.
fn link_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => http_link(s),
        Value::Object(_) => LINK_KEYS
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .and_then(http_link),
        _ => None,
    }
}

fn first_link_in_text(text: &str) -> Option<String> {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let pattern = LINK.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>]+"#).expect("valid link regex")
    });
    pattern
        .find_iter(text)
        .find_map(|m| http_link(m.as_str().trim_end_matches(['.', ',', ')', ';'])))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_title(root: &Value) -> Option<String> {
    envelopes(root)
        .find_map(|env| non_empty_str(env.get("title")))
        .or_else(|| non_empty_str(root.get("title")))
}

fn extract_media_type(root: &Value) -> Option<MediaType> {
    envelopes(root)
        .chain(std::iter::once(root))
        .find_map(|obj| TYPE_KEYS.iter().find_map(|k| non_empty_str(obj.get(*k))))
        .map(|label| MediaType::from_label(&label))
}

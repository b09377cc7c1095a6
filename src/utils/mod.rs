use crate::core::ResolveError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{3,64}$").expect("valid video id regex"))
}

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL_PREFIX, video_id)
}

/// Returns the trimmed input if it is an absolute `http`/`https` URL with a host.
pub fn http_link(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let lower = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Some(trimmed.to_string())
        }
        _ => None,
    }
}

pub fn extract_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        return url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
            return Some(v.to_string()).filter(|v| !v.is_empty());
        }

        let mut segments = url.path_segments()?;
        if let (Some("shorts" | "embed" | "live"), Some(id)) = (segments.next(), segments.next()) {
            return Some(id.to_string()).filter(|id| !id.is_empty());
        }
    }

    None
}

/// Turns user input into the URL handed to resolve providers.
///
/// YouTube links collapse to their watch URL, other links pass through
/// trimmed, and a bare video id becomes a watch URL.
pub fn canonical_target(input: &str) -> Result<String, ResolveError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidInput(
            "target must not be empty".to_string(),
        ));
    }

    if let Some(link) = http_link(trimmed) {
        let url = Url::parse(&link)
            .map_err(|e| ResolveError::InvalidInput(format!("{}: {}", trimmed, e)))?;
        return Ok(match extract_video_id(&url) {
            Some(id) => watch_url(&id),
            None => link,
        });
    }

    if video_id_pattern().is_match(trimmed) {
        return Ok(watch_url(trimmed));
    }

    // Host-like input without a scheme, e.g. `youtu.be/abc123`.
    if !trimmed.contains("://") {
        if let Some(link) = http_link(&format!("https://{}", trimmed)) {
            if let Ok(url) = Url::parse(&link) {
                if url.host_str().is_some_and(|h| h.contains('.')) {
                    return Ok(match extract_video_id(&url) {
                        Some(id) => watch_url(&id),
                        None => link,
                    });
                }
            }
        }
    }

    Err(ResolveError::InvalidInput(format!(
        "'{}' is neither a media URL nor a video id",
        trimmed
    )))
}

/// Cuts `text` to at most `max` characters, marking the cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max).collect();
    cut.push('…');
    cut
}

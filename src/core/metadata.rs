use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Unknown,
}

impl MediaType {
    /// Maps the loose labels providers use (`mp3`, `mp4`, `audio`, ...).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "audio" | "mp3" | "m4a" | "opus" | "aac" | "ytmp3" => MediaType::Audio,
            "video" | "mp4" | "webm" | "mkv" | "ytmp4" => MediaType::Video,
            _ => MediaType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match MediaType::from_label(s) {
            MediaType::Unknown => Err(format!("unknown media type '{}', expected audio or video", s)),
            known => Ok(known),
        }
    }
}

/// What the normalizer pulls out of one provider payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMedia {
    pub title: String,
    pub url: String,
    pub media_type: Option<MediaType>,
}

/// A canonical download link, attributed to the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub title: String,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(rename = "source")]
    pub source_provider: String,
}

impl MediaResult {
    pub fn from_normalized(media: NormalizedMedia, provider: &str) -> Self {
        Self {
            title: media.title,
            url: media.url,
            media_type: media.media_type,
            source_provider: provider.to_string(),
        }
    }
}

/// One video found by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

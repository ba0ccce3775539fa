use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media types accepted by the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }

    /// Infers the media type from a MIME declaration such as `image/jpeg`.
    /// Unrecognised declarations fall back to PNG.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.contains("jpeg") || mime.contains("jpg") {
            MediaType::Jpeg
        } else if mime.contains("gif") {
            MediaType::Gif
        } else if mime.contains("webp") {
            MediaType::Webp
        } else {
            MediaType::Png
        }
    }

    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => MediaType::Jpeg,
            Some("gif") => MediaType::Gif,
            Some("webp") => MediaType::Webp,
            _ => MediaType::Png,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A self-contained, base64-encoded screen capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub media_type: MediaType,
    /// Base64 payload without any `data:` prefix.
    pub data: String,
}

impl ImageRef {
    pub fn new(media_type: MediaType, data: impl Into<String>) -> Self {
        Self {
            media_type,
            data: data.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], media_type: MediaType) -> Self {
        Self::new(media_type, STANDARD.encode(bytes))
    }

    /// Normalises an image reference as streamed by the agent.
    ///
    /// Accepts either a `data:<mime>;base64,<payload>` URL or a bare base64
    /// payload. The prefix is stripped and the media type is taken from the
    /// declared MIME segment, defaulting to PNG.
    pub fn from_data_url(url: &str) -> Self {
        let Some(rest) = url.strip_prefix("data:") else {
            return Self::new(MediaType::Png, url);
        };
        match rest.split_once(',') {
            Some((header, payload)) => {
                let mime = header.split(';').next().unwrap_or_default();
                Self::new(MediaType::from_mime(mime), payload)
            }
            None => Self::new(MediaType::Png, url),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

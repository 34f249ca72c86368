use super::ContainerRef;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaState {
    #[default]
    Visible,
    Moderated,
    Deleted,
}

impl FromStr for MediaState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visible" => Ok(Self::Visible),
            "moderated" => Ok(Self::Moderated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visible => write!(f, "visible"),
            Self::Moderated => write!(f, "moderated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()? {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub media_id: u32,
    pub container: ContainerRef,
    pub attachment_id: u32,
    pub title: String,
    pub description: String,
    pub media_type: MediaType,
    pub media_state: MediaState,
    pub user_id: u32,
    pub rating_avg: f64,
    pub comment_count: u32,
    /// Unix seconds.
    pub media_date: i64,
}

/// Everything needed to insert a media item; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub container: ContainerRef,
    pub attachment_id: u32,
    pub temp_hash: String,
    pub title: String,
    pub description: String,
    pub media_type: MediaType,
    pub media_state: MediaState,
    pub user_id: u32,
    pub media_date: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_follows_mime_family() {
        assert_eq!(MediaType::from_mime("image/png"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("video/webm"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime("audio/ogg"), Some(MediaType::Audio));
        assert_eq!(MediaType::from_mime("application/pdf"), None);
    }

    #[test]
    fn media_state_parses_stored_values() {
        assert_eq!("moderated".parse(), Ok(MediaState::Moderated));
        assert_eq!("VISIBLE".parse(), Ok(MediaState::Visible));
        assert!("gone".parse::<MediaState>().is_err());
    }
}

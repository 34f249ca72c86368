use super::MediaType;
use serde::Serialize;

/// Attachment type tag for files uploaded into the gallery.
pub const MEDIA_ATTACHMENT_TYPE: &str = "xfmg_media";

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub attachment_id: u32,
    #[serde(skip_serializing)]
    pub data_path: String,
    pub filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub content_type: String,
    /// Owning content id, 0 while the upload is still staged.
    pub content_id: u32,
    #[serde(skip_serializing)]
    pub temp_hash: String,
    pub user_id: u32,
    pub upload_date: i64,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub data_path: String,
    pub filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub content_type: String,
    pub temp_hash: String,
    pub user_id: u32,
    pub upload_date: i64,
}

/// Staging row for a gallery upload that has not become a media item yet.
#[derive(Debug, Clone)]
pub struct MediaTemp {
    pub media_temp_id: u32,
    pub attachment_id: u32,
    pub media_type: MediaType,
    pub title: String,
    pub temp_hash: String,
    pub user_id: u32,
}

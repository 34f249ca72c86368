//! Public JSON representation of media items.

use crate::models::{ContainerRef, MediaItem, MediaState, MediaType, Visitor};
use crate::services::entity::EntityStore;
use crate::services::permission::PermissionOracle;
use anyhow::Result;
use serde::ser::{Error as _, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cell::Cell;

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub media_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u32>,
    pub media_title: String,
    pub media_description: String,
    pub media_date: i64,
    pub media_type: MediaType,
    pub media_state: MediaState,
    pub user_id: u32,
    pub rating_avg: f64,
    pub comment_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentView>,
    pub links: MediaLinks,
    pub permissions: MediaPermissions,
}

#[derive(Debug, Serialize)]
pub struct AttachmentView {
    pub attachment_id: u32,
    pub filename: String,
    pub file_size: u64,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct MediaLinks {
    pub permalink: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct MediaPermissions {
    pub view: bool,
    pub edit: bool,
}

/// Turns entities into [`MediaView`]s for one visitor.
pub struct MediaTransformer<'a> {
    store: &'a dyn EntityStore,
    permissions: &'a dyn PermissionOracle,
    visitor: &'a Visitor,
    base_url: &'a str,
    transformed: Cell<usize>,
}

impl<'a> MediaTransformer<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        permissions: &'a dyn PermissionOracle,
        visitor: &'a Visitor,
        base_url: &'a str,
    ) -> Self {
        Self {
            store,
            permissions,
            visitor,
            base_url,
            transformed: Cell::new(0),
        }
    }

    pub fn transform(&self, item: &MediaItem) -> Result<MediaView> {
        self.transformed.set(self.transformed.get() + 1);

        let attachment = self
            .store
            .find_attachment(item.attachment_id)?
            .map(|a| AttachmentView {
                attachment_id: a.attachment_id,
                filename: a.filename,
                file_size: a.file_size,
                mime_type: a.mime_type,
            });

        let (album_id, category_id) = match item.container {
            ContainerRef::Album(id) => (Some(id), None),
            ContainerRef::Category(id) => (None, Some(id)),
        };

        let permalink = format!("{}/media/{}", self.base_url, item.media_id);
        Ok(MediaView {
            media_id: item.media_id,
            album_id,
            category_id,
            media_title: item.title.clone(),
            media_description: item.description.clone(),
            media_date: item.media_date,
            media_type: item.media_type,
            media_state: item.media_state,
            user_id: item.user_id,
            rating_avg: item.rating_avg,
            comment_count: item.comment_count,
            attachment,
            links: MediaLinks {
                data: format!("{}/data", permalink),
                permalink,
            },
            permissions: MediaPermissions {
                view: self
                    .permissions
                    .can_view_media(self.visitor, item)?
                    .is_granted(),
                edit: self
                    .permissions
                    .can_edit_media(self.visitor, item)
                    .is_granted(),
            },
        })
    }

    /// How many items have been transformed so far.
    pub fn transformed(&self) -> usize {
        self.transformed.get()
    }

    /// Defers transformation of `items` until the returned value is serialized.
    pub fn lazily(&self, items: Vec<MediaItem>) -> LazyMedia<'_> {
        LazyMedia {
            transformer: self,
            items,
        }
    }
}

/// A list of entities that becomes a JSON array of [`MediaView`]s as it is serialized.
pub struct LazyMedia<'a> {
    transformer: &'a MediaTransformer<'a>,
    items: Vec<MediaItem>,
}

impl Serialize for LazyMedia<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            let view = self.transformer.transform(item).map_err(S::Error::custom)?;
            seq.serialize_element(&view)?;
        }
        seq.end()
    }
}

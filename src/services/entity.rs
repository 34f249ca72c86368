//! Entity lookups and persistence for the gallery, fronted by an in-process cache.
//!
//! Handlers only see [`EntityStore`]; [`SqliteEntityStore`] is the implementation
//! wired up at startup. Entities loaded through the store are cached by key in a
//! bounded cache (least recently used entries are evicted, and every entry expires
//! after [`ENTITY_CACHE_TTL`]). Callers that change rows behind the store's back
//! (or through related records) must call [`EntityStore::detach`] afterwards.

use crate::models::{
    Album, Attachment, Category, ContainerRef, MediaItem, MediaState, MediaTemp, MediaType,
    NewAttachment, NewMediaItem, Visitor,
};
use crate::Database;
use anyhow::{bail, Result};
use moka::sync::Cache;
use rusqlite::types::Type;
use rusqlite::{named_params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENTITY_CACHE_CAPACITY: u64 = 10_000;
pub const ENTITY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Sort orders accepted by the media list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaOrder {
    #[default]
    Natural,
    NaturalReverse,
    MediaRating,
    MediaRatingReverse,
    MediaCommentCount,
    MediaCommentCountReverse,
}

impl MediaOrder {
    pub const ALL: [MediaOrder; 6] = [
        Self::Natural,
        Self::NaturalReverse,
        Self::MediaRating,
        Self::MediaRatingReverse,
        Self::MediaCommentCount,
        Self::MediaCommentCountReverse,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Natural | Self::NaturalReverse => "media_date",
            Self::MediaRating | Self::MediaRatingReverse => "rating_avg",
            Self::MediaCommentCount | Self::MediaCommentCountReverse => "comment_count",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(
            self,
            Self::NaturalReverse | Self::MediaRatingReverse | Self::MediaCommentCountReverse
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::NaturalReverse => "natural_reverse",
            Self::MediaRating => "media_rating",
            Self::MediaRatingReverse => "media_rating_reverse",
            Self::MediaCommentCount => "media_comment_count",
            Self::MediaCommentCountReverse => "media_comment_count_reverse",
        }
    }

    fn order_by(&self) -> String {
        let direction = if self.is_descending() { "DESC" } else { "ASC" };
        format!("{col} {dir}, media_id {dir}", col = self.column(), dir = direction)
    }
}

/// Who is looking at the media list. Only visible items whose container the
/// viewer may see are included, mirroring the permission oracle's album rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaScope {
    pub viewer_id: u32,
    pub registered: bool,
    pub staff: bool,
}

impl MediaScope {
    pub fn for_visitor(visitor: &Visitor) -> Self {
        Self {
            viewer_id: visitor.user_id(),
            registered: visitor.is_registered(),
            staff: visitor.is_staff(),
        }
    }
}

/// One page of the default-scoped media list.
#[derive(Debug, Clone, Copy)]
pub struct MediaQuery {
    pub scope: MediaScope,
    pub order: MediaOrder,
    pub limit: usize,
    pub offset: usize,
}

/// Visible media in categories, or in albums the viewer may see.
const SCOPED_MEDIA: &str = "FROM media_items m
     WHERE m.media_state = 'visible'
       AND (m.category_id > 0 OR EXISTS (
           SELECT 1 FROM albums a
           WHERE a.album_id = m.album_id
             AND (:staff
                  OR (:viewer_id > 0 AND a.user_id = :viewer_id)
                  OR a.view_privacy = 'public'
                  OR (a.view_privacy = 'members' AND :registered))))";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Media(u32),
    Album(u32),
    Category(u32),
    Attachment(u32),
}

#[derive(Debug, Clone)]
enum CachedEntity {
    Media(MediaItem),
    Album(Album),
    Category(Category),
    Attachment(Attachment),
}

pub trait EntityStore: Send + Sync {
    fn find_media(&self, media_id: u32) -> Result<Option<MediaItem>>;
    fn find_album(&self, album_id: u32) -> Result<Option<Album>>;
    fn find_category(&self, category_id: u32) -> Result<Option<Category>>;
    fn find_attachment(&self, attachment_id: u32) -> Result<Option<Attachment>>;
    fn find_media_temp(&self, attachment_id: u32) -> Result<Option<MediaTemp>>;

    /// Total of the default-scoped media list, ignoring any page window.
    fn count_media(&self, scope: &MediaScope) -> Result<u64>;
    fn fetch_media(&self, query: &MediaQuery) -> Result<Vec<MediaItem>>;

    fn insert_attachment(&self, new: NewAttachment) -> Result<Attachment>;
    fn insert_media_temp(
        &self,
        attachment: &Attachment,
        media_type: MediaType,
        title: &str,
    ) -> Result<MediaTemp>;
    /// Inserts the item, claims its staged attachment and drops the staging row.
    fn insert_media(&self, new: &NewMediaItem) -> Result<MediaItem>;
    fn update_media(&self, item: &MediaItem) -> Result<()>;
    /// Deletes an attachment that was never claimed by a media item, along with its
    /// staging row. Returns `false` when there was nothing unclaimed to delete.
    fn discard_attachment(&self, attachment_id: u32) -> Result<bool>;

    /// Drops any cached copy of the entity so the next lookup reads the database.
    fn detach(&self, key: EntityKey);
}

const MEDIA_COLUMNS: &str = "media_id, album_id, category_id, attachment_id, title, description, \
     media_type, media_state, user_id, rating_avg, comment_count, media_date";

const ATTACHMENT_COLUMNS: &str = "attachment_id, data_path, filename, file_size, mime_type, \
     content_type, content_id, temp_hash, user_id, upload_date";

pub struct SqliteEntityStore {
    db: Database,
    cache: Cache<EntityKey, CachedEntity>,
}

impl SqliteEntityStore {
    pub fn new(db: Database) -> Self {
        Self::with_capacity(db, ENTITY_CACHE_CAPACITY)
    }

    pub fn with_capacity(db: Database, capacity: u64) -> Self {
        Self {
            db,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ENTITY_CACHE_TTL)
                .build(),
        }
    }

    fn cached(&self, key: EntityKey) -> Option<CachedEntity> {
        self.cache.get(&key)
    }

    fn attach(&self, key: EntityKey, entity: CachedEntity) {
        self.cache.insert(key, entity);
    }

    #[cfg(test)]
    fn is_cached(&self, key: EntityKey) -> bool {
        self.cached(key).is_some()
    }

    #[cfg(test)]
    fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl EntityStore for SqliteEntityStore {
    fn find_media(&self, media_id: u32) -> Result<Option<MediaItem>> {
        if let Some(CachedEntity::Media(item)) = self.cached(EntityKey::Media(media_id)) {
            return Ok(Some(item));
        }

        let conn = self.db.get()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM media_items WHERE media_id = ?", MEDIA_COLUMNS),
                [media_id],
                row_to_media,
            )
            .optional()?;

        if let Some(ref item) = item {
            self.attach(EntityKey::Media(media_id), CachedEntity::Media(item.clone()));
        }
        Ok(item)
    }

    fn find_album(&self, album_id: u32) -> Result<Option<Album>> {
        if let Some(CachedEntity::Album(album)) = self.cached(EntityKey::Album(album_id)) {
            return Ok(Some(album));
        }

        let conn = self.db.get()?;
        let album = conn
            .query_row(
                "SELECT album_id, title, user_id, view_privacy, add_privacy FROM albums WHERE album_id = ?",
                [album_id],
                row_to_album,
            )
            .optional()?;

        if let Some(ref album) = album {
            self.attach(EntityKey::Album(album_id), CachedEntity::Album(album.clone()));
        }
        Ok(album)
    }

    fn find_category(&self, category_id: u32) -> Result<Option<Category>> {
        if let Some(CachedEntity::Category(category)) =
            self.cached(EntityKey::Category(category_id))
        {
            return Ok(Some(category));
        }

        let conn = self.db.get()?;
        let category = conn
            .query_row(
                "SELECT category_id, title, category_type FROM categories WHERE category_id = ?",
                [category_id],
                row_to_category,
            )
            .optional()?;

        if let Some(ref category) = category {
            self.attach(
                EntityKey::Category(category_id),
                CachedEntity::Category(category.clone()),
            );
        }
        Ok(category)
    }

    fn find_attachment(&self, attachment_id: u32) -> Result<Option<Attachment>> {
        if let Some(CachedEntity::Attachment(attachment)) =
            self.cached(EntityKey::Attachment(attachment_id))
        {
            return Ok(Some(attachment));
        }

        let conn = self.db.get()?;
        let attachment = conn
            .query_row(
                &format!(
                    "SELECT {} FROM attachments WHERE attachment_id = ?",
                    ATTACHMENT_COLUMNS
                ),
                [attachment_id],
                row_to_attachment,
            )
            .optional()?;

        if let Some(ref attachment) = attachment {
            self.attach(
                EntityKey::Attachment(attachment_id),
                CachedEntity::Attachment(attachment.clone()),
            );
        }
        Ok(attachment)
    }

    fn find_media_temp(&self, attachment_id: u32) -> Result<Option<MediaTemp>> {
        let conn = self.db.get()?;
        let temp = conn
            .query_row(
                "SELECT media_temp_id, attachment_id, media_type, title, temp_hash, user_id
                 FROM media_temp WHERE attachment_id = ?",
                [attachment_id],
                row_to_media_temp,
            )
            .optional()?;
        Ok(temp)
    }

    fn count_media(&self, scope: &MediaScope) -> Result<u64> {
        let conn = self.db.get()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) {}", SCOPED_MEDIA),
            named_params! {
                ":staff": scope.staff,
                ":viewer_id": scope.viewer_id,
                ":registered": scope.registered,
            },
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total)?)
    }

    fn fetch_media(&self, query: &MediaQuery) -> Result<Vec<MediaItem>> {
        let limit = i64::try_from(query.limit)?;
        let offset = i64::try_from(query.offset)?;

        let conn = self.db.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} {} ORDER BY {} LIMIT :limit OFFSET :offset",
            MEDIA_COLUMNS,
            SCOPED_MEDIA,
            query.order.order_by()
        ))?;
        let items = stmt
            .query_map(
                named_params! {
                    ":staff": query.scope.staff,
                    ":viewer_id": query.scope.viewer_id,
                    ":registered": query.scope.registered,
                    ":limit": limit,
                    ":offset": offset,
                },
                row_to_media,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for item in &items {
            self.attach(EntityKey::Media(item.media_id), CachedEntity::Media(item.clone()));
        }
        Ok(items)
    }

    fn insert_attachment(&self, new: NewAttachment) -> Result<Attachment> {
        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO attachments (data_path, filename, file_size, mime_type, content_type, temp_hash, user_id, upload_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                new.data_path,
                new.filename,
                new.file_size as i64,
                new.mime_type,
                new.content_type,
                new.temp_hash,
                new.user_id,
                new.upload_date
            ],
        )?;

        let attachment = Attachment {
            attachment_id: conn.last_insert_rowid() as u32,
            data_path: new.data_path,
            filename: new.filename,
            file_size: new.file_size,
            mime_type: new.mime_type,
            content_type: new.content_type,
            content_id: 0,
            temp_hash: new.temp_hash,
            user_id: new.user_id,
            upload_date: new.upload_date,
        };
        self.attach(
            EntityKey::Attachment(attachment.attachment_id),
            CachedEntity::Attachment(attachment.clone()),
        );
        Ok(attachment)
    }

    fn insert_media_temp(
        &self,
        attachment: &Attachment,
        media_type: MediaType,
        title: &str,
    ) -> Result<MediaTemp> {
        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO media_temp (attachment_id, media_type, title, temp_hash, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                attachment.attachment_id,
                media_type.to_string(),
                title,
                attachment.temp_hash,
                attachment.user_id
            ],
        )?;

        Ok(MediaTemp {
            media_temp_id: conn.last_insert_rowid() as u32,
            attachment_id: attachment.attachment_id,
            media_type,
            title: title.to_string(),
            temp_hash: attachment.temp_hash.clone(),
            user_id: attachment.user_id,
        })
    }

    fn insert_media(&self, new: &NewMediaItem) -> Result<MediaItem> {
        let (album_id, category_id) = new.container.columns();

        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO media_items (album_id, category_id, attachment_id, title, description, media_type, media_state, user_id, media_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                album_id,
                category_id,
                new.attachment_id,
                new.title,
                new.description,
                new.media_type.to_string(),
                new.media_state.to_string(),
                new.user_id,
                new.media_date
            ],
        )?;
        let media_id = tx.last_insert_rowid() as u32;

        let claimed = tx.execute(
            "UPDATE attachments SET content_id = ?1, temp_hash = ''
             WHERE attachment_id = ?2 AND temp_hash = ?3 AND content_id = 0",
            rusqlite::params![media_id, new.attachment_id, new.temp_hash],
        )?;
        if claimed != 1 {
            bail!(
                "Attachment {} is not a pending upload for this temp hash",
                new.attachment_id
            );
        }

        tx.execute(
            "DELETE FROM media_temp WHERE attachment_id = ?",
            [new.attachment_id],
        )?;
        tx.commit()?;

        let item = MediaItem {
            media_id,
            container: new.container,
            attachment_id: new.attachment_id,
            title: new.title.clone(),
            description: new.description.clone(),
            media_type: new.media_type,
            media_state: new.media_state,
            user_id: new.user_id,
            rating_avg: 0.0,
            comment_count: 0,
            media_date: new.media_date,
        };
        self.attach(EntityKey::Media(media_id), CachedEntity::Media(item.clone()));
        Ok(item)
    }

    fn update_media(&self, item: &MediaItem) -> Result<()> {
        let conn = self.db.get()?;
        let updated = conn.execute(
            "UPDATE media_items SET title = ?1, description = ?2, media_state = ?3 WHERE media_id = ?4",
            rusqlite::params![
                item.title,
                item.description,
                item.media_state.to_string(),
                item.media_id
            ],
        )?;
        if updated == 0 {
            bail!("Media item {} no longer exists", item.media_id);
        }
        self.attach(EntityKey::Media(item.media_id), CachedEntity::Media(item.clone()));
        Ok(())
    }

    fn discard_attachment(&self, attachment_id: u32) -> Result<bool> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM media_temp WHERE attachment_id = ?",
            [attachment_id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM attachments WHERE attachment_id = ? AND content_id = 0",
            [attachment_id],
        )?;
        tx.commit()?;

        self.detach(EntityKey::Attachment(attachment_id));
        Ok(deleted == 1)
    }

    fn detach(&self, key: EntityKey) {
        self.cache.invalidate(&key);
    }
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaItem> {
    let album_id: u32 = row.get(1)?;
    let category_id: u32 = row.get(2)?;
    let container = ContainerRef::from_columns(album_id, category_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Integer,
            "media item must belong to exactly one container".into(),
        )
    })?;

    Ok(MediaItem {
        media_id: row.get(0)?,
        container,
        attachment_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        media_type: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(MediaType::Image),
        media_state: row
            .get::<_, String>(7)?
            .parse()
            .unwrap_or(MediaState::Moderated),
        user_id: row.get(8)?,
        rating_avg: row.get(9)?,
        comment_count: row.get(10)?,
        media_date: row.get(11)?,
    })
}

fn row_to_album(row: &rusqlite::Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        album_id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        view_privacy: row.get::<_, String>(3)?.parse().unwrap_or_default(),
        add_privacy: row.get::<_, String>(4)?.parse().unwrap_or_default(),
    })
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        category_id: row.get(0)?,
        title: row.get(1)?,
        category_type: row.get::<_, String>(2)?.parse().unwrap_or_default(),
    })
}

fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        attachment_id: row.get(0)?,
        data_path: row.get(1)?,
        filename: row.get(2)?,
        file_size: row.get::<_, i64>(3)?.max(0) as u64,
        mime_type: row.get(4)?,
        content_type: row.get(5)?,
        content_id: row.get(6)?,
        temp_hash: row.get(7)?,
        user_id: row.get(8)?,
        upload_date: row.get(9)?,
    })
}

fn row_to_media_temp(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaTemp> {
    Ok(MediaTemp {
        media_temp_id: row.get(0)?,
        attachment_id: row.get(1)?,
        media_type: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(MediaType::Image),
        title: row.get(3)?,
        temp_hash: row.get(4)?,
        user_id: row.get(5)?,
    })
}

use crate::config::MediaConfig;
use crate::models::{Attachment, ContainerRef, MediaType, NewAttachment, Visitor, MEDIA_ATTACHMENT_TYPE};
use crate::services::entity::EntityStore;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("The uploaded file is empty.")]
    Empty,
    #[error("The uploaded file is too large ({size} bytes, the limit is {max} bytes).")]
    TooLarge { size: usize, max: usize },
    #[error("Files of type {0} cannot be uploaded here.")]
    UnsupportedType(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl UploadError {
    /// True when the upload was refused because of the file itself rather than a server fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::TooLarge { .. } | Self::UnsupportedType(_)
        )
    }
}

/// Key/value bag naming what an upload is destined for, e.g. `media_album_id = 3`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadContext(BTreeMap<&'static str, u32>);

impl UploadContext {
    pub fn for_container(container: ContainerRef) -> Self {
        let mut entries = BTreeMap::new();
        match container {
            ContainerRef::Album(id) => entries.insert("media_album_id", id),
            ContainerRef::Category(id) => entries.insert("media_category_id", id),
        };
        Self(entries)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

pub trait AttachmentService: Send + Sync {
    /// A fresh token tying an upload in progress to its eventual owner.
    fn temp_hash(&self, context: &UploadContext) -> String;

    /// Stores the file as a pending attachment of `content_type` under `temp_hash`.
    fn upload(
        &self,
        visitor: &Visitor,
        temp_hash: &str,
        content_type: &str,
        context: &UploadContext,
        file: UploadedFile,
    ) -> Result<Attachment, UploadError>;

    /// Where the bytes of an attachment live.
    fn data_path(&self, attachment: &Attachment) -> PathBuf;

    /// Throws away a pending upload: its row, its staging row and its bytes.
    /// Attachments already claimed by content are left untouched.
    fn discard(&self, attachment: &Attachment) -> anyhow::Result<()>;
}

/// Keeps attachment bytes as flat files under the configured upload directory.
pub struct DiskAttachmentService {
    store: Arc<dyn EntityStore>,
    upload_dir: PathBuf,
    max_bytes: usize,
    allowed_types: Vec<String>,
}

impl DiskAttachmentService {
    pub fn new(store: Arc<dyn EntityStore>, config: &MediaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            upload_dir: PathBuf::from(&config.upload_dir),
            max_bytes: config.max_upload_bytes()?,
            allowed_types: config.allowed_types.clone(),
        })
    }

    fn detect_mime(file: &UploadedFile) -> String {
        if let Some(kind) = infer::get(&file.data) {
            return kind.mime_type().to_string();
        }
        if let Some(declared) = file
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        {
            return declared.to_string();
        }
        mime_guess::from_path(&file.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

fn sanitize_filename(raw: &str) -> String {
    let name = Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

impl AttachmentService for DiskAttachmentService {
    fn temp_hash(&self, context: &UploadContext) -> String {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill(&mut salt);

        let mut hasher = Sha256::new();
        for (key, value) in context.entries() {
            hasher.update(format!("{}={};", key, value).as_bytes());
        }
        hasher.update(salt);
        hasher.update(chrono::Utc::now().timestamp_micros().to_le_bytes());
        hex::encode(hasher.finalize())
    }

    fn upload(
        &self,
        visitor: &Visitor,
        temp_hash: &str,
        content_type: &str,
        context: &UploadContext,
        file: UploadedFile,
    ) -> Result<Attachment, UploadError> {
        if file.data.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: file.data.len(),
                max: self.max_bytes,
            });
        }

        let mime_type = Self::detect_mime(&file);
        if !self.allowed_types.iter().any(|t| t == &mime_type) {
            return Err(UploadError::UnsupportedType(mime_type));
        }
        let media_type = MediaType::from_mime(&mime_type);
        if content_type == MEDIA_ATTACHMENT_TYPE && media_type.is_none() {
            return Err(UploadError::UnsupportedType(mime_type));
        }

        let filename = sanitize_filename(&file.filename);
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let stored_name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension.to_lowercase())
        };

        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::write(self.upload_dir.join(&stored_name), &file.data)?;

        let attachment = self.store.insert_attachment(NewAttachment {
            data_path: stored_name,
            filename: filename.clone(),
            file_size: file.data.len() as u64,
            mime_type,
            content_type: content_type.to_string(),
            temp_hash: temp_hash.to_string(),
            user_id: visitor.user_id(),
            upload_date: chrono::Utc::now().timestamp(),
        })?;

        if let (MEDIA_ATTACHMENT_TYPE, Some(media_type)) = (content_type, media_type) {
            self.store
                .insert_media_temp(&attachment, media_type, &file_stem(&filename))?;
        }

        tracing::info!(
            attachment_id = attachment.attachment_id,
            size = attachment.file_size,
            mime = %attachment.mime_type,
            context = ?context,
            "Stored upload"
        );

        Ok(attachment)
    }

    fn data_path(&self, attachment: &Attachment) -> PathBuf {
        self.upload_dir.join(&attachment.data_path)
    }

    fn discard(&self, attachment: &Attachment) -> anyhow::Result<()> {
        if !self.store.discard_attachment(attachment.attachment_id)? {
            return Ok(());
        }

        let path = self.data_path(attachment);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            attachment_id = attachment.attachment_id,
            "Discarded pending upload"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity::SqliteEntityStore;
    use crate::Database;

    // Smallest valid PNG header is enough for content sniffing.
    const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    fn service(name: &str, dir: &Path) -> (Arc<SqliteEntityStore>, DiskAttachmentService) {
        let db = Database::open_memory(name).unwrap();
        db.migrate().unwrap();
        let store = Arc::new(SqliteEntityStore::new(db));
        let config = MediaConfig {
            upload_dir: dir.to_string_lossy().to_string(),
            max_upload_size: "64".to_string(),
            ..MediaConfig::default()
        };
        let service = DiskAttachmentService::new(store.clone(), &config).unwrap();
        (store, service)
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: None,
            data: PNG_BYTES.to_vec(),
        }
    }

    #[test]
    fn temp_hashes_are_unique_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = service("attach_temp_hash", dir.path());
        let context = UploadContext::for_container(ContainerRef::Album(3));

        let a = service.temp_hash(&context);
        let b = service.temp_hash(&context);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn gallery_upload_writes_file_and_stages_media() {
        let dir = tempfile::tempdir().unwrap();
        let (store, service) = service("attach_stage", dir.path());
        let context = UploadContext::for_container(ContainerRef::Category(1));

        let attachment = service
            .upload(&Visitor::Guest, "hash", MEDIA_ATTACHMENT_TYPE, &context, png("../../Beach Day.PNG"))
            .unwrap();

        assert_eq!(attachment.filename, "Beach Day.PNG");
        assert_eq!(attachment.mime_type, "image/png");
        assert!(service.data_path(&attachment).exists());
        assert!(attachment.data_path.ends_with(".png"));

        let temp = store
            .find_media_temp(attachment.attachment_id)
            .unwrap()
            .expect("staging row");
        assert_eq!(temp.title, "Beach Day");
        assert_eq!(temp.media_type, MediaType::Image);
        assert_eq!(temp.temp_hash, "hash");
    }

    #[test]
    fn discard_removes_pending_upload_and_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, service) = service("attach_discard", dir.path());
        let context = UploadContext::for_container(ContainerRef::Category(1));

        let attachment = service
            .upload(&Visitor::Guest, "hash", MEDIA_ATTACHMENT_TYPE, &context, png("a.png"))
            .unwrap();
        let path = service.data_path(&attachment);
        assert!(path.exists());

        service.discard(&attachment).unwrap();

        assert!(!path.exists());
        assert!(store.find_attachment(attachment.attachment_id).unwrap().is_none());
        assert!(store.find_media_temp(attachment.attachment_id).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn rejects_empty_large_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = service("attach_reject", dir.path());
        let context = UploadContext::default();

        let empty = UploadedFile {
            filename: "a.png".to_string(),
            content_type: None,
            data: Vec::new(),
        };
        let large = UploadedFile {
            data: vec![0u8; 65],
            ..png("a.png")
        };
        let pdf = UploadedFile {
            filename: "doc.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            data: b"%PDF-1.4 hello".to_vec(),
        };

        for file in [empty, large, pdf] {
            let err = service
                .upload(&Visitor::Guest, "h", MEDIA_ATTACHMENT_TYPE, &context, file)
                .unwrap_err();
            assert!(err.is_rejection(), "unexpected error {:?}", err);
        }
    }

    #[test]
    fn context_names_the_container() {
        let album = UploadContext::for_container(ContainerRef::Album(5));
        assert_eq!(album.entries().collect::<Vec<_>>(), vec![("media_album_id", 5)]);
        let category = UploadContext::for_container(ContainerRef::Category(8));
        assert_eq!(
            category.entries().collect::<Vec<_>>(),
            vec![("media_category_id", 8)]
        );
    }
}

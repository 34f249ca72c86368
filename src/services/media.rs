//! Creating and editing media items.
//!
//! Both services follow the same sequence: set fields, run the spam check,
//! [`validate`](MediaCreator::validate) to collect every field error, then `save`.
//! Nothing touches the database before `save`.

use crate::config::MediaConfig;
use crate::models::{
    Container, ContainerRef, MediaItem, MediaState, MediaTemp, NewMediaItem, Visitor,
};
use crate::services::entity::EntityStore;
use crate::services::spam::{SpamChecker, SpamDecision};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Field name to message. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

const SPAM_MESSAGE: &str =
    "Your content cannot be submitted because it has been identified as spam.";

/// Length rules shared by the creator and the editor.
#[derive(Debug, Clone, Copy)]
pub struct MediaLimits {
    pub max_title_length: usize,
    pub max_description_length: usize,
}

impl From<&MediaConfig> for MediaLimits {
    fn from(config: &MediaConfig) -> Self {
        Self {
            max_title_length: config.max_title_length,
            max_description_length: config.max_description_length,
        }
    }
}

impl MediaLimits {
    fn check(&self, title: &str, description: &str, errors: &mut FieldErrors) {
        if title.trim().is_empty() {
            errors.insert("title".to_string(), "Please enter a valid title.".to_string());
        } else if title.chars().count() > self.max_title_length {
            errors.insert(
                "title".to_string(),
                format!(
                    "Please enter a title using {} characters or fewer.",
                    self.max_title_length
                ),
            );
        }

        if description.chars().count() > self.max_description_length {
            errors.insert(
                "description".to_string(),
                format!(
                    "Please enter a description using {} characters or fewer.",
                    self.max_description_length
                ),
            );
        }
    }
}

pub struct MediaCreator<'a> {
    store: &'a dyn EntityStore,
    spam: &'a dyn SpamChecker,
    limits: MediaLimits,
    visitor: &'a Visitor,
    temp: MediaTemp,
    container: Option<ContainerRef>,
    title: String,
    description: String,
    attachment: Option<(u32, String)>,
    state: MediaState,
    spam_denied: bool,
}

impl<'a> MediaCreator<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        spam: &'a dyn SpamChecker,
        limits: MediaLimits,
        visitor: &'a Visitor,
        temp: MediaTemp,
    ) -> Self {
        let title = temp.title.clone();
        Self {
            store,
            spam,
            limits,
            visitor,
            temp,
            container: None,
            title,
            description: String::new(),
            attachment: None,
            state: MediaState::Visible,
            spam_denied: false,
        }
    }

    pub fn set_container(&mut self, container: &Container) {
        self.container = Some(container.reference());
    }

    /// An empty title keeps the staged default (the uploaded file's name).
    pub fn set_title(&mut self, title: &str, description: &str) {
        let title = title.trim();
        if !title.is_empty() {
            self.title = title.to_string();
        }
        self.description = description.trim().to_string();
    }

    pub fn set_attachment(&mut self, attachment_id: u32, temp_hash: &str) {
        self.attachment = Some((attachment_id, temp_hash.to_string()));
    }

    pub fn check_for_spam(&mut self) {
        match self.spam.check(self.visitor, &self.title, &self.description) {
            SpamDecision::Allowed => {}
            SpamDecision::Moderated => self.state = MediaState::Moderated,
            SpamDecision::Denied => self.spam_denied = true,
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.limits.check(&self.title, &self.description, &mut errors);

        if self.container.is_none() {
            errors.insert(
                "container".to_string(),
                "Please choose an album or category.".to_string(),
            );
        }

        match &self.attachment {
            Some((id, hash)) if *id == self.temp.attachment_id && *hash == self.temp.temp_hash => {}
            _ => {
                errors.insert(
                    "file".to_string(),
                    "The uploaded file could not be matched to this media item.".to_string(),
                );
            }
        }

        if self.spam_denied {
            errors.insert("spam".to_string(), SPAM_MESSAGE.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn state(&self) -> MediaState {
        self.state
    }

    pub fn save(self) -> Result<MediaItem> {
        if let Err(errors) = self.validate() {
            bail!("Refusing to save an invalid media item: {:?}", errors);
        }
        let (Some(container), Some((attachment_id, temp_hash))) = (self.container, self.attachment)
        else {
            bail!("Media item is missing its container or attachment");
        };

        let item = self.store.insert_media(&NewMediaItem {
            container,
            attachment_id,
            temp_hash,
            title: self.title,
            description: self.description,
            media_type: self.temp.media_type,
            media_state: self.state,
            user_id: self.visitor.user_id(),
            media_date: chrono::Utc::now().timestamp(),
        })?;

        tracing::info!(
            media_id = item.media_id,
            user_id = item.user_id,
            state = %item.media_state,
            "Created media item"
        );
        Ok(item)
    }
}

pub struct MediaEditor<'a> {
    store: &'a dyn EntityStore,
    spam: &'a dyn SpamChecker,
    limits: MediaLimits,
    visitor: &'a Visitor,
    item: MediaItem,
    spam_denied: bool,
}

impl<'a> MediaEditor<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        spam: &'a dyn SpamChecker,
        limits: MediaLimits,
        visitor: &'a Visitor,
        item: MediaItem,
    ) -> Self {
        Self {
            store,
            spam,
            limits,
            visitor,
            item,
            spam_denied: false,
        }
    }

    /// Only the fields that were supplied are changed.
    pub fn set_title(&mut self, title: Option<&str>, description: Option<&str>) {
        if let Some(title) = title {
            self.item.title = title.trim().to_string();
        }
        if let Some(description) = description {
            self.item.description = description.trim().to_string();
        }
    }

    pub fn check_for_spam(&mut self) {
        match self
            .spam
            .check(self.visitor, &self.item.title, &self.item.description)
        {
            SpamDecision::Allowed => {}
            SpamDecision::Moderated => {
                if self.item.media_state == MediaState::Visible {
                    self.item.media_state = MediaState::Moderated;
                }
            }
            SpamDecision::Denied => self.spam_denied = true,
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.limits
            .check(&self.item.title, &self.item.description, &mut errors);
        if self.spam_denied {
            errors.insert("spam".to_string(), SPAM_MESSAGE.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn save(self) -> Result<MediaItem> {
        if let Err(errors) = self.validate() {
            bail!("Refusing to save an invalid media item: {:?}", errors);
        }
        self.store.update_media(&self.item)?;
        tracing::info!(
            media_id = self.item.media_id,
            editor_id = self.visitor.user_id(),
            "Updated media item"
        );
        Ok(self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpamConfig;
    use crate::models::{
        Attachment, Category, CategoryType, MediaType, NewAttachment, User, UserRole,
        MEDIA_ATTACHMENT_TYPE,
    };
    use crate::services::entity::{MediaScope, SqliteEntityStore};
    use crate::services::spam::PhraseSpamChecker;
    use crate::Database;

    const LIMITS: MediaLimits = MediaLimits {
        max_title_length: 10,
        max_description_length: 20,
    };

    struct Fixture {
        store: SqliteEntityStore,
        spam: PhraseSpamChecker,
        visitor: Visitor,
    }

    fn fixture(name: &str) -> Fixture {
        let db = Database::open_memory(name).unwrap();
        db.migrate().unwrap();
        {
            let conn = db.get().unwrap();
            conn.execute_batch(
                "INSERT INTO users (username) VALUES ('poster');
                 INSERT INTO categories (title) VALUES ('Open');",
            )
            .unwrap();
        }
        Fixture {
            store: SqliteEntityStore::new(db),
            spam: PhraseSpamChecker::new(&SpamConfig {
                blocked_phrases: vec!["spam".to_string()],
                moderated_phrases: vec!["review".to_string()],
                max_links: 0,
            }),
            visitor: Visitor::User(User {
                user_id: 1,
                username: "poster".to_string(),
                role: UserRole::Member,
                created_at: String::new(),
            }),
        }
    }

    fn category() -> Container {
        Container::Category(Category {
            category_id: 1,
            title: "Open".to_string(),
            category_type: CategoryType::Media,
        })
    }

    fn stage(store: &SqliteEntityStore) -> (Attachment, MediaTemp) {
        let attachment = store
            .insert_attachment(NewAttachment {
                data_path: "a.png".to_string(),
                filename: "harbour.png".to_string(),
                file_size: 3,
                mime_type: "image/png".to_string(),
                content_type: MEDIA_ATTACHMENT_TYPE.to_string(),
                temp_hash: "th".to_string(),
                user_id: 1,
                upload_date: 0,
            })
            .unwrap();
        let temp = store
            .insert_media_temp(&attachment, MediaType::Image, "harbour")
            .unwrap();
        (attachment, temp)
    }

    #[test]
    fn creator_collects_every_field_error() {
        let f = fixture("media_creator_errors");
        let (_, temp) = stage(&f.store);

        let mut creator = MediaCreator::new(&f.store, &f.spam, LIMITS, &f.visitor, temp);
        creator.set_title("A title that is far too long", "spam spam spam spam spam spam");
        creator.check_for_spam();

        let errors = creator.validate().unwrap_err();
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("description"));
        assert!(errors.contains_key("container"));
        assert!(errors.contains_key("file"));
        assert!(errors.contains_key("spam"));
        assert_eq!(f.store.count_media(&MediaScope::for_visitor(&f.visitor)).unwrap(), 0);
    }

    #[test]
    fn creator_defaults_title_to_file_stem() {
        let f = fixture("media_creator_default_title");
        let (attachment, temp) = stage(&f.store);

        let mut creator = MediaCreator::new(&f.store, &f.spam, LIMITS, &f.visitor, temp);
        creator.set_container(&category());
        creator.set_title("   ", "");
        creator.set_attachment(attachment.attachment_id, &attachment.temp_hash);
        creator.check_for_spam();
        assert!(creator.validate().is_ok());

        let item = creator.save().unwrap();
        assert_eq!(item.title, "harbour");
        assert_eq!(item.container, ContainerRef::Category(1));
        assert_eq!(item.media_state, MediaState::Visible);
        assert_eq!(item.user_id, 1);
    }

    #[test]
    fn moderated_spam_decision_holds_new_item() {
        let f = fixture("media_creator_moderated");
        let (attachment, temp) = stage(&f.store);

        let mut creator = MediaCreator::new(&f.store, &f.spam, LIMITS, &f.visitor, temp);
        creator.set_container(&category());
        creator.set_title("Pier", "needs review");
        creator.set_attachment(attachment.attachment_id, &attachment.temp_hash);
        creator.check_for_spam();
        assert_eq!(creator.state(), MediaState::Moderated);

        let item = creator.save().unwrap();
        assert_eq!(item.media_state, MediaState::Moderated);
    }

    #[test]
    fn editor_applies_only_supplied_fields() {
        let f = fixture("media_editor_partial");
        let (attachment, temp) = stage(&f.store);
        let mut creator = MediaCreator::new(&f.store, &f.spam, LIMITS, &f.visitor, temp);
        creator.set_container(&category());
        creator.set_title("Pier", "at dusk");
        creator.set_attachment(attachment.attachment_id, &attachment.temp_hash);
        let item = creator.save().unwrap();

        let mut editor = MediaEditor::new(&f.store, &f.spam, LIMITS, &f.visitor, item);
        editor.set_title(Some("Jetty"), None);
        editor.check_for_spam();
        let saved = editor.save().unwrap();
        assert_eq!(saved.title, "Jetty");
        assert_eq!(saved.description, "at dusk");

        let reloaded = f.store.find_media(saved.media_id).unwrap().unwrap();
        assert_eq!(reloaded.title, "Jetty");
    }

    #[test]
    fn editor_rejects_empty_title() {
        let f = fixture("media_editor_empty");
        let (attachment, temp) = stage(&f.store);
        let mut creator = MediaCreator::new(&f.store, &f.spam, LIMITS, &f.visitor, temp);
        creator.set_container(&category());
        creator.set_attachment(attachment.attachment_id, &attachment.temp_hash);
        let item = creator.save().unwrap();

        let mut editor = MediaEditor::new(&f.store, &f.spam, LIMITS, &f.visitor, item);
        editor.set_title(Some(""), Some("fine"));
        let errors = editor.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("title"));
        assert!(editor.save().is_err());
    }
}

use crate::models::{
    AddPrivacy, Album, Category, CategoryType, Container, ContainerRef, MediaItem, MediaState,
    ViewPrivacy, Visitor,
};
use crate::services::entity::EntityStore;
use anyhow::Result;
use std::sync::Arc;

/// Outcome of a capability check. A denial may carry a reason fit to show the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied(Option<String>),
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    fn denied(reason: &str) -> Self {
        Self::Denied(Some(reason.to_string()))
    }
}

pub trait PermissionOracle: Send + Sync {
    fn can_view_album(&self, visitor: &Visitor, album: &Album) -> Access;
    fn can_view_category(&self, visitor: &Visitor, category: &Category) -> Access;
    fn can_add_media(&self, visitor: &Visitor, container: &Container) -> Access;
    fn can_view_media(&self, visitor: &Visitor, item: &MediaItem) -> Result<Access>;
    fn can_edit_media(&self, visitor: &Visitor, item: &MediaItem) -> Access;
}

/// Role and privacy based rules: staff see and edit everything, owners manage their own media.
pub struct RolePermissionOracle {
    store: Arc<dyn EntityStore>,
}

impl RolePermissionOracle {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

impl PermissionOracle for RolePermissionOracle {
    fn can_view_album(&self, visitor: &Visitor, album: &Album) -> Access {
        if visitor.is_staff() || visitor.owns(album.user_id) {
            return Access::Granted;
        }
        match album.view_privacy {
            ViewPrivacy::Public => Access::Granted,
            ViewPrivacy::Members if visitor.is_registered() => Access::Granted,
            ViewPrivacy::Members => Access::denied("You must be logged in to view this album."),
            ViewPrivacy::Private => Access::Denied(None),
        }
    }

    fn can_view_category(&self, _visitor: &Visitor, _category: &Category) -> Access {
        Access::Granted
    }

    fn can_add_media(&self, visitor: &Visitor, container: &Container) -> Access {
        if !visitor.is_registered() {
            return Access::denied("You must be logged in to add media.");
        }

        match container {
            Container::Album(album) => {
                if visitor.is_staff() || visitor.owns(album.user_id) {
                    return Access::Granted;
                }
                match album.add_privacy {
                    AddPrivacy::Members => Access::Granted,
                    AddPrivacy::Owner => {
                        Access::denied("Only the owner of this album can add media to it.")
                    }
                }
            }
            Container::Category(category) => match category.category_type {
                CategoryType::Media => Access::Granted,
                CategoryType::Container => {
                    Access::denied("Media cannot be added directly to this category.")
                }
            },
        }
    }

    fn can_view_media(&self, visitor: &Visitor, item: &MediaItem) -> Result<Access> {
        match item.media_state {
            MediaState::Visible => {}
            MediaState::Moderated if visitor.is_staff() || visitor.owns(item.user_id) => {}
            MediaState::Deleted if visitor.is_staff() => {}
            _ => return Ok(Access::Denied(None)),
        }

        let access = match item.container {
            ContainerRef::Album(album_id) => match self.store.find_album(album_id)? {
                Some(album) => self.can_view_album(visitor, &album),
                None => Access::Denied(None),
            },
            ContainerRef::Category(category_id) => match self.store.find_category(category_id)? {
                Some(category) => self.can_view_category(visitor, &category),
                None => Access::Denied(None),
            },
        };
        Ok(access)
    }

    fn can_edit_media(&self, visitor: &Visitor, item: &MediaItem) -> Access {
        if visitor.is_staff() {
            return Access::Granted;
        }
        if visitor.owns(item.user_id) && item.media_state != MediaState::Deleted {
            return Access::Granted;
        }
        Access::denied("You do not have permission to edit this media item.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, User, UserRole};
    use crate::services::entity::SqliteEntityStore;
    use crate::Database;

    fn oracle(name: &str) -> RolePermissionOracle {
        let db = Database::open_memory(name).unwrap();
        db.migrate().unwrap();
        {
            let conn = db.get().unwrap();
            conn.execute_batch(
                "INSERT INTO users (username, role) VALUES ('owner', 'member');
                 INSERT INTO albums (title, user_id, view_privacy) VALUES ('Private', 1, 'private');
                 INSERT INTO albums (title, user_id, view_privacy) VALUES ('Members', 1, 'members');
                 INSERT INTO categories (title) VALUES ('Open');",
            )
            .unwrap();
        }
        RolePermissionOracle::new(Arc::new(SqliteEntityStore::new(db)))
    }

    fn user(user_id: u32, role: UserRole) -> Visitor {
        Visitor::User(User {
            user_id,
            username: format!("user{}", user_id),
            role,
            created_at: String::new(),
        })
    }

    fn album(view_privacy: ViewPrivacy, add_privacy: AddPrivacy) -> Album {
        Album {
            album_id: 1,
            title: "Trip".to_string(),
            user_id: 1,
            view_privacy,
            add_privacy,
        }
    }

    fn item(container: ContainerRef, state: MediaState) -> MediaItem {
        MediaItem {
            media_id: 9,
            container,
            attachment_id: 1,
            title: "t".to_string(),
            description: String::new(),
            media_type: MediaType::Image,
            media_state: state,
            user_id: 1,
            rating_avg: 0.0,
            comment_count: 0,
            media_date: 0,
        }
    }

    #[test]
    fn album_privacy_levels() {
        let oracle = oracle("perm_album_privacy");
        let members = album(ViewPrivacy::Members, AddPrivacy::Owner);
        let private = album(ViewPrivacy::Private, AddPrivacy::Owner);

        assert!(!oracle.can_view_album(&Visitor::Guest, &members).is_granted());
        assert!(oracle.can_view_album(&user(2, UserRole::Member), &members).is_granted());
        assert_eq!(
            oracle.can_view_album(&user(2, UserRole::Member), &private),
            Access::Denied(None)
        );
        assert!(oracle.can_view_album(&user(1, UserRole::Member), &private).is_granted());
        assert!(oracle.can_view_album(&user(3, UserRole::Moderator), &private).is_granted());
    }

    #[test]
    fn adding_media_needs_an_account_and_the_right_container() {
        let oracle = oracle("perm_add_media");
        let owner_only = Container::Album(album(ViewPrivacy::Public, AddPrivacy::Owner));
        let open = Container::Album(album(ViewPrivacy::Public, AddPrivacy::Members));
        let grouping = Container::Category(Category {
            category_id: 2,
            title: "Group".to_string(),
            category_type: CategoryType::Container,
        });

        assert!(matches!(
            oracle.can_add_media(&Visitor::Guest, &open),
            Access::Denied(Some(_))
        ));
        assert!(!oracle.can_add_media(&user(2, UserRole::Member), &owner_only).is_granted());
        assert!(oracle.can_add_media(&user(1, UserRole::Member), &owner_only).is_granted());
        assert!(oracle.can_add_media(&user(2, UserRole::Member), &open).is_granted());
        assert!(!oracle.can_add_media(&user(2, UserRole::Admin), &grouping).is_granted());
    }

    #[test]
    fn media_visibility_follows_state_and_container() {
        let oracle = oracle("perm_media_view");
        let stranger = user(2, UserRole::Member);

        let visible = item(ContainerRef::Category(1), MediaState::Visible);
        assert!(oracle.can_view_media(&Visitor::Guest, &visible).unwrap().is_granted());

        let moderated = item(ContainerRef::Category(1), MediaState::Moderated);
        assert!(!oracle.can_view_media(&stranger, &moderated).unwrap().is_granted());
        assert!(oracle.can_view_media(&user(1, UserRole::Member), &moderated).unwrap().is_granted());

        let in_private = item(ContainerRef::Album(1), MediaState::Visible);
        assert!(!oracle.can_view_media(&stranger, &in_private).unwrap().is_granted());

        let orphan = item(ContainerRef::Album(404), MediaState::Visible);
        assert!(!oracle.can_view_media(&Visitor::Guest, &orphan).unwrap().is_granted());
    }

    #[test]
    fn only_owner_or_staff_can_edit() {
        let oracle = oracle("perm_media_edit");
        let visible = item(ContainerRef::Category(1), MediaState::Visible);

        assert!(oracle.can_edit_media(&user(1, UserRole::Member), &visible).is_granted());
        assert!(oracle.can_edit_media(&user(5, UserRole::Moderator), &visible).is_granted());
        assert_eq!(
            oracle.can_edit_media(&user(2, UserRole::Member), &visible),
            Access::Denied(Some("You do not have permission to edit this media item.".to_string()))
        );

        let deleted = item(ContainerRef::Category(1), MediaState::Deleted);
        assert!(!oracle.can_edit_media(&user(1, UserRole::Member), &deleted).is_granted());
    }
}

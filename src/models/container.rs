use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewPrivacy {
    #[default]
    Public,
    Members,
    Private,
}

impl FromStr for ViewPrivacy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "members" => Ok(Self::Members),
            "private" => Ok(Self::Private),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ViewPrivacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Members => write!(f, "members"),
            Self::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddPrivacy {
    #[default]
    Owner,
    Members,
}

impl FromStr for AddPrivacy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "members" => Ok(Self::Members),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for AddPrivacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Members => write!(f, "members"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    #[default]
    Media,
    /// Groups other categories; cannot hold media directly.
    Container,
}

impl FromStr for CategoryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "media" => Ok(Self::Media),
            "container" => Ok(Self::Container),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Media => write!(f, "media"),
            Self::Container => write!(f, "container"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub album_id: u32,
    pub title: String,
    pub user_id: u32,
    pub view_privacy: ViewPrivacy,
    pub add_privacy: AddPrivacy,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub category_id: u32,
    pub title: String,
    pub category_type: CategoryType,
}

/// A loaded container, either side of the album/category split.
#[derive(Debug, Clone)]
pub enum Container {
    Album(Album),
    Category(Category),
}

impl Container {
    pub fn reference(&self) -> ContainerRef {
        match self {
            Self::Album(album) => ContainerRef::Album(album.album_id),
            Self::Category(category) => ContainerRef::Category(category.category_id),
        }
    }
}

/// Which container a media item lives in. Exactly one, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRef {
    Album(u32),
    Category(u32),
}

impl ContainerRef {
    /// Builds a reference from the two nullable-by-zero columns; `None` unless exactly one is set.
    pub fn from_columns(album_id: u32, category_id: u32) -> Option<Self> {
        match (album_id, category_id) {
            (0, 0) => None,
            (album_id, 0) => Some(Self::Album(album_id)),
            (0, category_id) => Some(Self::Category(category_id)),
            _ => None,
        }
    }

    /// `(album_id, category_id)` with the unused side set to 0.
    pub fn columns(&self) -> (u32, u32) {
        match *self {
            Self::Album(id) => (id, 0),
            Self::Category(id) => (0, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_ref_round_trips_columns() {
        assert_eq!(ContainerRef::from_columns(3, 0), Some(ContainerRef::Album(3)));
        assert_eq!(ContainerRef::from_columns(0, 7), Some(ContainerRef::Category(7)));
        assert_eq!(ContainerRef::Category(7).columns(), (0, 7));
    }

    #[test]
    fn container_ref_requires_exactly_one() {
        assert_eq!(ContainerRef::from_columns(0, 0), None);
        assert_eq!(ContainerRef::from_columns(1, 2), None);
    }
}

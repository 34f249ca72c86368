pub mod attachment;
pub mod auth;
pub mod containers;
pub mod entity;
pub mod media;
pub mod page_nav;
pub mod permission;
pub mod spam;
pub mod transform;

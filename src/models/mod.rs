mod attachment;
mod container;
mod media;
mod user;

pub use attachment::*;
pub use container::*;
pub use media::*;
pub use user::*;

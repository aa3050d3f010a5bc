use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

pub mod content;
pub mod feed;
pub mod link;
pub mod notification;
pub mod profile;
pub mod tag;
pub mod user;

pub use content::ContentItem;
pub use feed::{FeedEntry, FeedFilter};
pub use link::{Guardianship, LinkStatus, ParentChildLink};
pub use notification::{Notification, NotificationKind, NotificationView};
pub use profile::{GuardedProfile, UserTagProfile};
pub use tag::{Tag, TagKind, TagSet};
pub use user::User;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifier of a user account
    UserId
);
id_type!(
    /// Identifier of a parent-child link
    LinkId
);
id_type!(
    /// Identifier of a notification
    NotificationId
);
id_type!(
    /// Identifier of a published content item
    ContentId
);

pub mod feed;
pub mod links;
pub mod notifications;
pub mod tags;
pub mod users;

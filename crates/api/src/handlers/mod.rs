pub mod achievements;
pub mod admin;
pub mod analytics;
pub mod events;
pub mod notifications;
pub mod players;

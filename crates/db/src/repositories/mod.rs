//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod achievement_repo;
pub mod dependency_repo;
pub mod notification_repo;
pub mod player_repo;
pub mod progress_repo;

pub use achievement_repo::AchievementRepo;
pub use dependency_repo::DependencyRepo;
pub use notification_repo::NotificationRepo;
pub use player_repo::PlayerRepo;
pub use progress_repo::ProgressRepo;

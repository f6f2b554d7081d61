//! Row types for the achievement engine tables.
//!
//! Each row converts into its `podium_core` domain type. Stored enum columns
//! are TEXT, so the conversions are fallible.

pub mod achievement;
pub mod notification;
pub mod player;
pub mod progress;

//! Podium achievement engine: domain logic.
//!
//! Everything in this crate is pure logic with no database or network
//! access. Persistence lives in `podium-db`, orchestration in
//! `podium-events`.
//!
//! - [`criteria`]: typed unlock rules and their event-type classification.
//! - [`dependency_graph`]: REQUIRED / UNLOCKS / SUGGESTED edges with cycle
//!   prevention and eligibility / visibility predicates.
//! - [`trigger_index`]: (event type, game type) to candidate achievements.
//! - [`evaluators`]: the evaluator registry and built-in rule evaluators.
//! - [`progress`]: the per-(player, achievement) state machine.
//! - [`notification`]: notification status and retry rules.
//! - [`catalog_config`]: declarative achievement configuration.
//! - [`store`]: storage traits implemented by the database and in-memory
//!   backends.

pub mod achievement;
pub mod catalog_config;
pub mod channels;
pub mod context;
pub mod criteria;
pub mod dependency_graph;
pub mod error;
pub mod evaluators;
pub mod notification;
pub mod progress;
pub mod store;
pub mod trigger_index;
pub mod types;

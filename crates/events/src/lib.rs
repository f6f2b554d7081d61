//! Podium achievement engine runtime.
//!
//! This crate wires the pure logic of `podium-core` into a running engine:
//!
//! - [`EventBus`]: in-process publish/subscribe hub for [`GameEvent`]s.
//! - [`AchievementRegistry`]: atomically swapped catalog snapshot holding
//!   the dependency graph and trigger index.
//! - [`ProgressLedger`]: evaluates candidates for one player, applies
//!   progress and cascades unlocks through dependents.
//! - [`EventDispatcher`]: bounded queue plus worker pool with per-player
//!   isolation.
//! - [`NotificationPipeline`]: notification creation, delivery, retry and
//!   cleanup; [`NotificationSweeps`] runs the three periodic sweeps.
//! - [`delivery`]: channel adapters (chat webhook, in-app feed).
//! - [`MemoryStore`]: in-process storage for tests and development.
//! - [`AchievementEngine`]: query and administrative facade.

pub mod bus;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod sweeps;

pub use bus::EventBus;
pub use config::EngineConfig;
pub use dispatcher::{DispatchError, EventDispatcher};
pub use engine::{AchievementEngine, EngineStores};
pub use ledger::ProgressLedger;
pub use memory::MemoryStore;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use pipeline::NotificationPipeline;
pub use podium_core::context::GameEvent;
pub use registry::{AchievementRegistry, CatalogSnapshot};
pub use sweeps::NotificationSweeps;

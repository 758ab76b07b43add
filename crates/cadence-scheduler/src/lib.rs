//! # Cadence Scheduler
//!
//! Local reminder scheduling for a planning app: events, goals and tasks.
//! Decides when a reminder fires, whether the user's settings let it through,
//! what it says, and remembers which backend handles belong to which
//! planning object so they can be cancelled by that object later.
//!
//! ## Design Principles
//! - No timers of its own: the notification backend fires, the engine only arms
//! - Every registry change is persisted before it becomes visible
//! - One async lock per entity; different entities never wait on each other
//! - Settings are read as `Arc` snapshots, never blocked by a save
//!
//! ## Architecture
//! ```text
//! SchedulingEngine
//!   ├── SettingsStore ── SettingsPersistence (JSON file | SQLite)
//!   ├── schedule(request)
//!   │     ├── suppression: category → priority → quiet hours
//!   │     ├── timing: fire_at | recurrence::next_fire_instant
//!   │     ├── compose: {{key}} template → title/body
//!   │     ├── NotificationBackend (log | memory) → handle
//!   │     └── NotificationRegistry.register(entity, handle)
//!   └── cancel_all_for_entity(kind, id)
//!         ├── backend.cancel(each handle)
//!         └── NotificationRegistry.clear(entity)
//!                 └── RegistryPersistence (JSON file | SQLite)
//! ```

pub mod backend;
pub mod clock;
pub mod compose;
pub mod engine;
pub mod locks;
pub mod persistence;
pub mod recurrence;
pub mod registry;
pub mod request;
pub mod settings;
pub mod store;
pub mod suppression;

pub use backend::{ArmedNotification, Dispatch, LogBackend, MemoryBackend, NotificationBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{CancelReport, EngineBuilder, ScheduleOutcome, SchedulingEngine};
pub use persistence::SqliteStore;
pub use recurrence::{RecurrencePattern, next_fire_instant};
pub use registry::{NotificationRegistry, RegistryMap, RegistryPersistence};
pub use request::{Category, EntityKey, EntityKind, NotificationHandle, NotificationRequest, Priority, Timing};
pub use settings::{NotificationSettings, SettingsPersistence, SettingsStore};
pub use store::JsonFileStore;
pub use suppression::{SuppressReason, should_suppress};

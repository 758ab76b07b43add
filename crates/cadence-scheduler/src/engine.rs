//! Scheduling engine: suppression → timing → compose → dispatch → register.
//!
//! Callers schedule and cancel reminders by the planning object they belong
//! to. The engine never keeps a timer of its own; the backend fires
//! notifications and the registry remembers which handles to cancel later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use cadence_core::{CadenceConfig, CadenceError, Result, StoreKind};

use crate::backend::{Dispatch, NotificationBackend, backend_from_config};
use crate::clock::{Clock, SystemClock};
use crate::compose;
use crate::locks::EntityLocks;
use crate::persistence::SqliteStore;
use crate::recurrence;
use crate::registry::{NotificationRegistry, RegistryPersistence};
use crate::request::{Category, EntityKey, EntityKind, NotificationHandle, NotificationRequest, Timing};
use crate::settings::{NotificationSettings, SettingsPersistence, SettingsStore};
use crate::store::JsonFileStore;
use crate::suppression::{self, SuppressReason};

/// What happened to a schedule request that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// Armed on the backend and recorded in the registry.
    Scheduled(NotificationHandle),
    /// Blocked by the user's settings.
    Suppressed(SuppressReason),
    /// The fire instant is not in the future.
    PastDue,
    /// The backend refused; nothing was recorded.
    BackendUnavailable(String),
}

impl ScheduleOutcome {
    /// The handle when scheduled, `None` otherwise.
    pub fn handle(&self) -> Option<&NotificationHandle> {
        match self {
            ScheduleOutcome::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_handle(self) -> Option<NotificationHandle> {
        match self {
            ScheduleOutcome::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, ScheduleOutcome::Scheduled(_))
    }
}

/// Result of a cancel sweep. Backend failures are warnings: the registry
/// entry is cleared regardless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    pub cancelled: Vec<NotificationHandle>,
    pub failures: Vec<(NotificationHandle, String)>,
}

impl CancelReport {
    /// `true` when every handle was cancelled at the backend.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of handles the sweep touched.
    pub fn total(&self) -> usize {
        self.cancelled.len() + self.failures.len()
    }

    fn merge(&mut self, other: CancelReport) {
        self.cancelled.extend(other.cancelled);
        self.failures.extend(other.failures);
    }
}

/// Outcome of the synchronous checks that run before any I/O.
enum Gate {
    Suppressed(SuppressReason),
    PastDue,
    Fire(DateTime<Utc>),
}

pub struct SchedulingEngine<C: Clock> {
    clock: C,
    settings: Arc<SettingsStore>,
    registry: Arc<NotificationRegistry>,
    backend: Arc<dyn NotificationBackend>,
    locks: EntityLocks,
}

impl<C: Clock> SchedulingEngine<C> {
    pub fn builder(clock: C) -> EngineBuilder<C> {
        EngineBuilder::new(clock)
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn registry(&self) -> &NotificationRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &dyn NotificationBackend {
        self.backend.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Lead time for event reminders when the caller does not pick one.
    pub fn event_lead_minutes(&self) -> u32 {
        self.settings.current().event_reminders.default_minutes_before
    }

    /// Schedule a one-shot reminder.
    pub async fn schedule_one_shot(&self, request: NotificationRequest) -> Result<ScheduleOutcome> {
        if !matches!(request.timing, Timing::At(_)) {
            return Err(CadenceError::request(format!(
                "recurring request for {} passed to schedule_one_shot",
                request.entity
            )));
        }
        self.schedule_locked(request).await
    }

    /// Schedule a recurring reminder; the backend re-arms it on the pattern.
    pub async fn schedule_recurring(&self, request: NotificationRequest) -> Result<ScheduleOutcome> {
        if !matches!(request.timing, Timing::Recurring(_)) {
            return Err(CadenceError::request(format!(
                "one-shot request for {} passed to schedule_recurring",
                request.entity
            )));
        }
        self.schedule_locked(request).await
    }

    /// Schedule by whatever timing the request carries.
    pub async fn schedule(&self, request: NotificationRequest) -> Result<ScheduleOutcome> {
        self.schedule_locked(request).await
    }

    async fn schedule_locked(&self, request: NotificationRequest) -> Result<ScheduleOutcome> {
        let _guard = self.locks.acquire(&request.entity).await;
        let settings = self.settings.current();

        let fire_at = match self.gate(&request, &settings) {
            Gate::Suppressed(reason) => {
                tracing::debug!(
                    "🔕 {:?} for {} suppressed: {reason}",
                    request.category,
                    request.entity
                );
                return Ok(ScheduleOutcome::Suppressed(reason));
            }
            Gate::PastDue => {
                tracing::debug!("⏭️ {:?} for {} is past due", request.category, request.entity);
                return Ok(ScheduleOutcome::PastDue);
            }
            Gate::Fire(at) => at,
        };

        let dispatch = build_dispatch(&request, &settings, fire_at);
        let dispatched = match &request.timing {
            Timing::At(_) => self.backend.dispatch_one_shot(&dispatch).await,
            Timing::Recurring(pattern) => self.backend.dispatch_recurring(&dispatch, pattern).await,
        };
        let handle = match dispatched {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Backend '{}' rejected {} for {}: {e}",
                    self.backend.name(),
                    dispatch.id,
                    request.entity
                );
                return Ok(ScheduleOutcome::BackendUnavailable(e.to_string()));
            }
        };

        let mut recorded = Ok(());
        if request.category == Category::EventReminder && !settings.event_reminders.allow_multiple {
            recorded = self.withdraw_others(&request.entity, &handle).await;
        }
        if recorded.is_ok() {
            recorded = self.registry.register(&request.entity, handle.clone()).await;
        }
        if let Err(e) = recorded {
            // The notification is armed but unrecorded; take it back.
            if let Err(cancel_err) = self.backend.cancel(&handle).await {
                tracing::warn!("⚠️ Could not withdraw unrecorded {handle}: {cancel_err}");
            }
            return Err(e);
        }

        tracing::info!(
            "📅 Scheduled {:?} for {} at {} ({handle})",
            request.category,
            request.entity,
            fire_at.to_rfc3339()
        );
        Ok(ScheduleOutcome::Scheduled(handle))
    }

    /// Suppression and timing checks against a single clock reading.
    fn gate(&self, request: &NotificationRequest, settings: &NotificationSettings) -> Gate {
        let now = self.clock.now();
        if let Some(reason) =
            suppression::evaluate(request.category, request.priority, settings, &now)
        {
            return Gate::Suppressed(reason);
        }
        match &request.timing {
            Timing::At(at) => {
                if *at <= now.with_timezone(&Utc) {
                    Gate::PastDue
                } else {
                    Gate::Fire(*at)
                }
            }
            Timing::Recurring(pattern) => {
                Gate::Fire(recurrence::next_fire_instant(pattern, &now).with_timezone(&Utc))
            }
        }
    }

    /// Cancel every outstanding notification of one entity and forget them.
    pub async fn cancel_all_for_entity(&self, kind: EntityKind, id: &str) -> Result<CancelReport> {
        self.cancel_entity(&EntityKey::new(kind, id)).await
    }

    /// Cancel everything the registry knows about.
    pub async fn cancel_everything(&self) -> Result<CancelReport> {
        let mut report = CancelReport::default();
        for key in self.registry.entities().await {
            report.merge(self.cancel_entity(&key).await?);
        }
        tracing::info!(
            "🧹 Cancelled {} notifications ({} warnings)",
            report.cancelled.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn cancel_entity(&self, key: &EntityKey) -> Result<CancelReport> {
        let _guard = self.locks.acquire(key).await;
        let mut report = CancelReport::default();

        for handle in self.registry.list_handles(key).await {
            match self.backend.cancel(&handle).await {
                Ok(()) => report.cancelled.push(handle),
                Err(e) => {
                    tracing::warn!("⚠️ Backend could not cancel {handle} for {key}: {e}");
                    report.failures.push((handle, e.to_string()));
                }
            }
        }

        if self.registry.clear(key).await? {
            tracing::info!("🗑️ Cancelled {} notifications for {key}", report.total());
        }
        Ok(report)
    }

    /// Replace whatever `key` had armed with `keep`. Caller holds the entity lock.
    async fn withdraw_others(&self, key: &EntityKey, keep: &NotificationHandle) -> Result<()> {
        let earlier: Vec<_> = self
            .registry
            .list_handles(key)
            .await
            .into_iter()
            .filter(|h| h != keep)
            .collect();
        for handle in &earlier {
            if let Err(e) = self.backend.cancel(handle).await {
                tracing::warn!("⚠️ Backend could not cancel {handle} for {key}: {e}");
            }
        }
        if self.registry.clear(key).await? && !earlier.is_empty() {
            tracing::info!("🔁 Replaced {} earlier reminders for {key}", earlier.len());
        }
        Ok(())
    }

    pub async fn has_outstanding(&self, kind: EntityKind, id: &str) -> bool {
        self.registry.contains(&EntityKey::new(kind, id)).await
    }

    pub async fn list_handles(&self, kind: EntityKind, id: &str) -> Vec<NotificationHandle> {
        self.registry.list_handles(&EntityKey::new(kind, id)).await
    }
}

impl SchedulingEngine<SystemClock> {
    /// Wire an engine from configuration: pick the store and backend, then
    /// load settings and the registry.
    pub async fn open(config: &CadenceConfig) -> Result<Self> {
        let data_dir = config.data_path();
        let (settings_io, registry_io) = match config.store {
            StoreKind::Json => split_store(Arc::new(JsonFileStore::new(&data_dir))),
            StoreKind::Sqlite => split_store(Arc::new(SqliteStore::open(&data_dir.join("cadence.db"))?)),
        };

        let settings = Arc::new(SettingsStore::new(settings_io));
        settings.load().await?;
        let registry = Arc::new(NotificationRegistry::load(registry_io).await?);
        let backend = backend_from_config(config.backend);
        tracing::info!(
            "⏰ Cadence engine ready ({:?} store at {}, {} backend)",
            config.store,
            data_dir.display(),
            backend.name()
        );

        Self::builder(SystemClock)
            .settings(settings)
            .registry(registry)
            .backend(backend)
            .build()
    }
}

/// One store serving both persistence roles.
fn split_store<S>(store: Arc<S>) -> (Arc<dyn SettingsPersistence>, Arc<dyn RegistryPersistence>)
where
    S: SettingsPersistence + RegistryPersistence + 'static,
{
    let settings_io: Arc<dyn SettingsPersistence> = store.clone();
    let registry_io: Arc<dyn RegistryPersistence> = store;
    (settings_io, registry_io)
}

fn build_dispatch(
    request: &NotificationRequest,
    settings: &NotificationSettings,
    fire_at: DateTime<Utc>,
) -> Dispatch {
    let message = compose::render(request.category, &request.payload, settings);
    Dispatch {
        id: request.notification_id(),
        entity: request.entity.clone(),
        category: request.category,
        priority: request.priority,
        title: message.title,
        body: message.body,
        fire_at,
        channel: request.category.channel().to_string(),
        sound: settings.sound.sound_for(request.category),
        vibration_ms: settings.sound.vibration_ms(),
    }
}

/// Assembles a [`SchedulingEngine`] from its collaborators.
pub struct EngineBuilder<C: Clock> {
    clock: C,
    settings: Option<Arc<SettingsStore>>,
    registry: Option<Arc<NotificationRegistry>>,
    backend: Option<Arc<dyn NotificationBackend>>,
}

impl<C: Clock> EngineBuilder<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            settings: None,
            registry: None,
            backend: None,
        }
    }

    pub fn settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn registry(mut self, registry: Arc<NotificationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn NotificationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<SchedulingEngine<C>> {
        Ok(SchedulingEngine {
            clock: self.clock,
            settings: self
                .settings
                .ok_or_else(|| CadenceError::config("engine needs a settings store"))?,
            registry: self
                .registry
                .ok_or_else(|| CadenceError::config("engine needs a registry"))?,
            backend: self
                .backend
                .ok_or_else(|| CadenceError::config("engine needs a notification backend"))?,
            locks: EntityLocks::new(),
        })
    }
}

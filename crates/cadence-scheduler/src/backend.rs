//! Notification backends: the platform side that actually shows reminders.
//! The engine only ever talks to [`NotificationBackend`]; which implementation
//! sits behind it is decided once at startup.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_core::{BackendKind, CadenceError, Result};

use crate::recurrence::RecurrencePattern;
use crate::request::{Category, EntityKey, NotificationHandle, Priority};

/// Everything a backend needs to arm one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Engine-chosen notification id.
    pub id: String,
    pub entity: EntityKey,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    /// First (or only) fire instant.
    pub fire_at: DateTime<Utc>,
    /// Backend channel: events, goals, tasks or achievements.
    pub channel: String,
    /// `None` when sound is turned off.
    pub sound: Option<String>,
    /// `None` when vibration is turned off.
    pub vibration_ms: Option<u32>,
}

/// Platform notification capability.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch_one_shot(&self, dispatch: &Dispatch) -> Result<NotificationHandle>;

    /// Arm a notification the backend re-fires on `recurrence` by itself.
    async fn dispatch_recurring(
        &self,
        dispatch: &Dispatch,
        recurrence: &RecurrencePattern,
    ) -> Result<NotificationHandle>;

    async fn cancel(&self, handle: &NotificationHandle) -> Result<()>;

    /// Notifications this backend currently has armed, ordered by handle.
    async fn list_scheduled(&self) -> Result<Vec<ArmedNotification>>;
}

/// Build the backend selected in configuration.
pub fn backend_from_config(kind: BackendKind) -> Arc<dyn NotificationBackend> {
    match kind {
        BackendKind::Log => Arc::new(LogBackend::new()),
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}

/// Writes every dispatch to the log; the handle is the notification id.
/// What it armed is remembered for the life of the process so it can be
/// listed.
#[derive(Default, Clone)]
pub struct LogBackend {
    armed: MemoryBackend,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationBackend for LogBackend {
    fn name(&self) -> &str {
        "log"
    }

    async fn dispatch_one_shot(&self, dispatch: &Dispatch) -> Result<NotificationHandle> {
        tracing::info!(
            "🔔 [{}] {} — {} @ {}",
            dispatch.channel,
            dispatch.title,
            dispatch.body,
            dispatch.fire_at.to_rfc3339()
        );
        self.armed.arm(dispatch, None)
    }

    async fn dispatch_recurring(
        &self,
        dispatch: &Dispatch,
        recurrence: &RecurrencePattern,
    ) -> Result<NotificationHandle> {
        tracing::info!(
            "🔁 [{}] {} — {} from {} ({recurrence})",
            dispatch.channel,
            dispatch.title,
            dispatch.body,
            dispatch.fire_at.to_rfc3339()
        );
        self.armed.arm(dispatch, Some(*recurrence))
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        tracing::info!("🗑️ Notification cancelled: {handle}");
        self.armed.cancel(handle).await
    }

    async fn list_scheduled(&self) -> Result<Vec<ArmedNotification>> {
        self.armed.list_scheduled().await
    }
}

/// A notification a backend has armed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmedNotification {
    pub handle: NotificationHandle,
    pub dispatch: Dispatch,
    pub recurrence: Option<RecurrencePattern>,
}

#[derive(Default)]
struct MemoryState {
    armed: BTreeMap<NotificationHandle, ArmedNotification>,
    fail_dispatch: bool,
    fail_cancel: Vec<NotificationHandle>,
}

/// In-process backend: keeps armed notifications in a table that can be
/// listed. Failures can be forced for exercising error paths.
#[derive(Default, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every dispatch fail until switched back.
    pub fn set_fail_dispatch(&self, fail: bool) {
        self.lock().fail_dispatch = fail;
    }

    /// Make cancelling `handle` fail.
    pub fn fail_cancel_for(&self, handle: NotificationHandle) {
        self.lock().fail_cancel.push(handle);
    }

    pub fn get(&self, handle: &NotificationHandle) -> Option<ArmedNotification> {
        self.lock().armed.get(handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn arm(&self, dispatch: &Dispatch, recurrence: Option<RecurrencePattern>) -> Result<NotificationHandle> {
        let mut state = self.lock();
        if state.fail_dispatch {
            return Err(CadenceError::backend("memory backend set to fail"));
        }
        let handle = NotificationHandle::new(dispatch.id.clone());
        state.armed.insert(
            handle.clone(),
            ArmedNotification {
                handle: handle.clone(),
                dispatch: dispatch.clone(),
                recurrence,
            },
        );
        Ok(handle)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn dispatch_one_shot(&self, dispatch: &Dispatch) -> Result<NotificationHandle> {
        self.arm(dispatch, None)
    }

    async fn dispatch_recurring(
        &self,
        dispatch: &Dispatch,
        recurrence: &RecurrencePattern,
    ) -> Result<NotificationHandle> {
        self.arm(dispatch, Some(*recurrence))
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        let mut state = self.lock();
        if state.fail_cancel.contains(handle) {
            return Err(CadenceError::backend(format!("cannot cancel {handle}")));
        }
        // Cancelling something already gone is fine.
        state.armed.remove(handle);
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ArmedNotification>> {
        Ok(self.lock().armed.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(id: &str) -> Dispatch {
        Dispatch {
            id: id.into(),
            entity: EntityKey::task("t1"),
            category: Category::TaskDue,
            priority: Priority::Medium,
            title: "📋 Task due".into(),
            body: "Task \"Edit\" is due today".into(),
            fire_at: Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap(),
            channel: "tasks".into(),
            sound: Some("reminder".into()),
            vibration_ms: Some(300),
        }
    }

    #[tokio::test]
    async fn test_memory_backend_arm_and_cancel() {
        let backend = MemoryBackend::new();
        let handle = backend.dispatch_one_shot(&sample("task_t1_a")).await.unwrap();
        assert_eq!(handle.as_str(), "task_t1_a");
        assert_eq!(backend.len(), 1);

        let pattern = RecurrencePattern::daily(9, 0).unwrap();
        let recurring = backend.dispatch_recurring(&sample("task_t1_b"), &pattern).await.unwrap();
        assert_eq!(backend.get(&recurring).unwrap().recurrence, Some(pattern));

        backend.cancel(&handle).await.unwrap();
        backend.cancel(&handle).await.unwrap();
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_backend_forced_failures() {
        let backend = MemoryBackend::new();
        backend.set_fail_dispatch(true);
        assert!(matches!(
            backend.dispatch_one_shot(&sample("x")).await,
            Err(CadenceError::Backend(_))
        ));
        assert!(backend.is_empty());

        backend.set_fail_dispatch(false);
        let handle = backend.dispatch_one_shot(&sample("x")).await.unwrap();
        backend.fail_cancel_for(handle.clone());
        assert!(backend.cancel(&handle).await.is_err());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_log_backend_returns_id_as_handle() {
        let backend = backend_from_config(BackendKind::Log);
        assert_eq!(backend.name(), "log");
        let handle = backend.dispatch_one_shot(&sample("event_e1_15")).await.unwrap();
        assert_eq!(handle, NotificationHandle::new("event_e1_15"));
        assert!(backend.cancel(&handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_scheduled_tracks_arm_and_cancel() {
        for kind in [BackendKind::Log, BackendKind::Memory] {
            let backend = backend_from_config(kind);
            assert!(backend.list_scheduled().await.unwrap().is_empty());

            let pattern = RecurrencePattern::weekly(1, 9, 0).unwrap();
            let b = backend.dispatch_recurring(&sample("task_t1_b"), &pattern).await.unwrap();
            let a = backend.dispatch_one_shot(&sample("task_t1_a")).await.unwrap();

            let listed = backend.list_scheduled().await.unwrap();
            let handles: Vec<_> = listed.iter().map(|n| n.handle.clone()).collect();
            assert_eq!(handles, vec![a.clone(), b.clone()], "{}", backend.name());
            assert_eq!(listed[0].recurrence, None);
            assert_eq!(listed[1].recurrence, Some(pattern));
            assert_eq!(listed[1].dispatch.channel, "tasks");

            backend.cancel(&a).await.unwrap();
            let listed = backend.list_scheduled().await.unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].handle, b);
        }
    }
}

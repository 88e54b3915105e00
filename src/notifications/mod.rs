//! Ephemeral operator notifications
//!
//! One [`NotificationScheduler`] exists per session. Components receive a
//! cloned handle and report outcomes through [`NotificationScheduler::enqueue`].
//! Every notification expires on its own after its duration, measured from
//! enqueue time; [`NotificationScheduler::dismiss`] removes it early.
//! Renderers either poll [`NotificationScheduler::currently_visible`] or
//! follow the live sequence through [`NotificationScheduler::subscribe`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Notification identifier, increasing with creation order
pub type NotificationId = u64;

/// Default lifetime of a notification
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        };
        f.write_str(s)
    }
}

/// A notification currently shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub message: Option<String>,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind.to_string().to_uppercase())?;
        match (&self.title, &self.message) {
            (Some(title), Some(message)) => write!(f, " {}: {}", title, message),
            (Some(text), None) | (None, Some(text)) => write!(f, " {}", text),
            (None, None) => Ok(()),
        }
    }
}

/// A notification waiting to be enqueued
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub id: Option<NotificationId>,
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

impl NotificationRequest {
    pub fn new(kind: NotificationKind) -> Self {
        NotificationRequest {
            id: None,
            kind,
            title: None,
            message: None,
            duration: None,
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success).title(title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error).title(title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning).title(title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info).title(title)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_id(mut self, id: NotificationId) -> Self {
        self.id = Some(id);
        self
    }
}

struct SchedulerState {
    visible: Vec<Notification>,
    next_id: NotificationId,
    timers: HashMap<NotificationId, CancellationToken>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    updates: watch::Sender<Vec<Notification>>,
    default_duration: Duration,
}

/// Ordered queue of visible notifications with automatic expiry
#[derive(Clone)]
pub struct NotificationScheduler {
    shared: Arc<Shared>,
}

impl NotificationScheduler {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_DURATION)
    }

    /// Create a scheduler whose notifications live `duration` unless they
    /// set their own
    pub fn with_default_duration(duration: Duration) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        NotificationScheduler {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    visible: Vec::new(),
                    next_id: 1,
                    timers: HashMap::new(),
                }),
                updates,
                default_duration: duration,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SchedulerState) {
        self.shared.updates.send_replace(state.visible.clone());
    }

    /// Append a notification and schedule its expiry. Returns its id.
    pub fn enqueue(&self, request: NotificationRequest) -> NotificationId {
        let duration = request.duration.unwrap_or(self.shared.default_duration);
        let mut state = self.lock();

        let id = request.id.unwrap_or(state.next_id);
        state.next_id = state.next_id.max(id.saturating_add(1));

        // A caller-supplied id replaces whatever still carries it
        if let Some(pos) = state.visible.iter().position(|n| n.id == id) {
            state.visible.remove(pos);
            if let Some(timer) = state.timers.remove(&id) {
                timer.cancel();
            }
        }

        let notification = Notification {
            id,
            kind: request.kind,
            title: request.title,
            message: request.message,
            duration,
            created_at: Utc::now(),
        };
        log::info!("Notification #{} {}", id, notification);
        state.visible.push(notification);

        if let Some(timer) = self.schedule_expiry(id, duration) {
            state.timers.insert(id, timer);
        }

        self.publish(&state);
        id
    }

    fn schedule_expiry(&self, id: NotificationId, duration: Duration) -> Option<CancellationToken> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("No async runtime; notification #{} will not expire", id);
                return None;
            }
        };

        let deadline = tokio::time::Instant::now() + duration;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(shared) = shared.upgrade() {
                        NotificationScheduler { shared }.expire(id, &cancelled);
                    }
                }
            }
        });

        Some(token)
    }

    /// Timer-driven removal. A timer whose token was cancelled after it fired
    /// no longer owns the id and must not touch whatever carries it now.
    fn expire(&self, id: NotificationId, token: &CancellationToken) {
        let mut state = self.lock();
        if token.is_cancelled() {
            log::trace!("Stale expiry for notification #{} ignored", id);
            return;
        }

        state.timers.remove(&id);
        if let Some(pos) = state.visible.iter().position(|n| n.id == id) {
            state.visible.remove(pos);
            log::debug!("Notification #{} expired", id);
            self.publish(&state);
        }
    }

    /// Remove a notification. Unknown or already dismissed ids are ignored.
    pub fn dismiss(&self, id: NotificationId) {
        let mut state = self.lock();

        if let Some(timer) = state.timers.remove(&id) {
            timer.cancel();
        }

        match state.visible.iter().position(|n| n.id == id) {
            Some(pos) => {
                state.visible.remove(pos);
                log::debug!("Notification #{} dismissed", id);
                self.publish(&state);
            }
            None => log::trace!("Notification #{} already gone", id),
        }
    }

    /// Snapshot of the visible notifications in insertion order
    pub fn currently_visible(&self) -> Vec<Notification> {
        self.lock().visible.clone()
    }

    /// Follow the visible sequence as it changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.shared.updates.subscribe()
    }

    pub fn success(&self, title: &str, message: impl Into<String>) -> NotificationId {
        self.enqueue(NotificationRequest::success(title).message(message))
    }

    pub fn error(&self, title: &str, message: impl Into<String>) -> NotificationId {
        self.enqueue(NotificationRequest::error(title).message(message))
    }

    pub fn warning(&self, title: &str, message: impl Into<String>) -> NotificationId {
        self.enqueue(NotificationRequest::warning(title).message(message))
    }
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

use contracts::usecases::u601_sync_catalog::progress::{
    SyncProgress, SyncProgressUpdate, SyncStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Сколько последних фрагментов журнала хранить в сессии
const MAX_LOG_DETAILS: usize = 200;

/// Получатель обновлений прогресса
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: SyncProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(SyncProgressUpdate) + Send + Sync,
{
    fn report(&self, update: SyncProgressUpdate) {
        self(update)
    }
}

/// Ничего не делает
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _update: SyncProgressUpdate) {}
}

/// Переводит 0..=100 вложенного этапа в диапазон `from..=to` общего прогресса
pub struct ScaledSink<'a> {
    inner: &'a dyn ProgressSink,
    from: u8,
    to: u8,
}

impl<'a> ScaledSink<'a> {
    pub fn new(inner: &'a dyn ProgressSink, from: u8, to: u8) -> Self {
        Self { inner, from, to }
    }

    fn scale(&self, progress: u8) -> u8 {
        let span = self.to.saturating_sub(self.from) as u32;
        (self.from as u32 + span * progress.min(100) as u32 / 100) as u8
    }
}

impl ProgressSink for ScaledSink<'_> {
    fn report(&self, mut update: SyncProgressUpdate) {
        update.progress = update.progress.map(|p| self.scale(p));
        self.inner.report(update);
    }
}

/// Пишет прогресс в tracing (для CLI)
pub struct LoggingSink;

impl ProgressSink for LoggingSink {
    fn report(&self, update: SyncProgressUpdate) {
        match (update.progress, update.message.as_deref()) {
            (Some(progress), Some(message)) => tracing::info!("[{:>3}%] {}", progress, message),
            (None, Some(message)) => tracing::info!("{}", message),
            _ => {}
        }
        if let Some(detail) = update.log_detail.as_deref() {
            tracing::debug!("{}", detail);
        }
    }
}

/// Трекер прогресса синхронизации (in-memory, для real-time мониторинга)
#[derive(Clone, Default)]
pub struct ProgressTracker {
    sessions: Arc<RwLock<HashMap<String, SyncProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создать новую сессию синхронизации
    pub fn create_session(&self, session_id: String) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session_id.clone(), SyncProgress::new(session_id));
    }

    /// Получить текущий прогресс сессии
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    /// Применить инкрементальное обновление
    pub fn apply(&self, session_id: &str, update: SyncProgressUpdate) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(progress) = sessions.get_mut(session_id) {
            if let Some(message) = update.message {
                progress.message = Some(message);
            }
            if let Some(percent) = update.progress {
                progress.progress = percent.min(100);
            }
            if let Some(stats) = update.stats {
                progress.stats = stats;
            }
            if let Some(detail) = update.log_detail {
                progress.log_details.push(detail);
                if progress.log_details.len() > MAX_LOG_DETAILS {
                    let overflow = progress.log_details.len() - MAX_LOG_DETAILS;
                    progress.log_details.drain(..overflow);
                }
            }
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Добавить ошибку
    pub fn add_error(&self, session_id: &str, message: String) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(progress) = sessions.get_mut(session_id) {
            progress.error_messages.push(message);
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Завершить сессию синхронизации
    pub fn complete_session(&self, session_id: &str, status: SyncStatus) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(progress) = sessions.get_mut(session_id) {
            if status == SyncStatus::Completed {
                progress.progress = 100;
            }
            progress.status = status;
            progress.completed_at = Some(chrono::Utc::now());
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Удалить старые завершенные сессии
    pub fn cleanup_old_sessions(&self, max_age: chrono::Duration) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = chrono::Utc::now();
        sessions.retain(|_, progress| match progress.completed_at {
            Some(completed_at) => now - completed_at < max_age,
            None => true,
        });
    }

    /// Sink, который пишет в сессию
    pub fn sink(&self, session_id: &str) -> SessionSink {
        SessionSink {
            tracker: self.clone(),
            session_id: session_id.to_string(),
        }
    }
}

pub struct SessionSink {
    tracker: ProgressTracker,
    session_id: String,
}

impl ProgressSink for SessionSink {
    fn report(&self, update: SyncProgressUpdate) {
        self.tracker.apply(&self.session_id, update);
    }
}

use super::response::SyncStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Инкрементальное обновление для внешнего слоя отображения.
/// Все поля необязательны: приходит только то, что изменилось.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncProgressUpdate {
    pub message: Option<String>,
    /// 0..=100
    pub progress: Option<u8>,
    pub stats: Option<SyncStats>,
    /// HTML-фрагмент журнала
    pub log_detail: Option<String>,
}

impl SyncProgressUpdate {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn step(progress: u8, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            progress: Some(progress.min(100)),
            ..Default::default()
        }
    }

    pub fn log(log_detail: impl Into<String>) -> Self {
        Self {
            log_detail: Some(log_detail.into()),
            ..Default::default()
        }
    }

    pub fn with_stats(mut self, stats: SyncStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    /// Остановлено по запросу пользователя
    Cancelled,
    Failed,
}

/// Снимок прогресса сессии синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub session_id: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    pub progress: u8,
    pub message: Option<String>,
    pub stats: SyncStats,

    /// Последние фрагменты журнала
    pub log_details: Vec<String>,
    pub error_messages: Vec<String>,
}

impl SyncProgress {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            status: SyncStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            updated_at: Utc::now(),
            progress: 0,
            message: None,
            stats: SyncStats::default(),
            log_details: Vec::new(),
            error_messages: Vec::new(),
        }
    }
}

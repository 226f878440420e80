use std::time::Duration;

/// Жесткий предел числа воркеров
pub const MAX_WORKERS: usize = 10;

/// Товаров в тестовом режиме
pub const TEST_MODE_LIMIT: usize = 20;

/// Задержки и размеры пакетов прогона синхронизации.
/// В тестах их уменьшают до нуля.
#[derive(Debug, Clone)]
pub struct SyncTimings {
    /// Ожидание после создания вариантов
    pub variant_settle: Duration,
    /// Ожидание обработки медиа перед сортировкой
    pub media_settle: Duration,
    pub media_batch_size: usize,
    pub media_batch_pause: Duration,
    /// Предел удаляемых за раз медиа
    pub max_media_deletions: usize,
    /// Товаров в одном пакете
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub product_timeout: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            variant_settle: Duration::from_secs(3),
            media_settle: Duration::from_secs(10),
            media_batch_size: 10,
            media_batch_pause: Duration::from_secs(1),
            max_media_deletions: 20,
            batch_size: 10,
            batch_pause: Duration::from_secs(1),
            product_timeout: Duration::from_secs(60),
        }
    }
}

impl SyncTimings {
    /// Без пауз (для тестов и локальных фейков)
    pub fn immediate() -> Self {
        Self {
            variant_settle: Duration::ZERO,
            media_settle: Duration::ZERO,
            media_batch_pause: Duration::ZERO,
            batch_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Применить настройки из секции `[sync]`
    pub fn from_config(sync: &crate::shared::config::SyncConfig) -> Self {
        Self {
            batch_size: sync.batch_size.max(1),
            batch_pause: sync.batch_pause(),
            product_timeout: sync.product_timeout(),
            ..Self::default()
        }
    }
}

/// Число воркеров с учетом предела
pub fn effective_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKERS)
}

use serde::{Deserialize, Serialize};

/// Итоговый статус обработки одного товара
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSyncStatus {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// Счетчики прогона
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub processed: usize,
}

impl SyncStats {
    /// Учесть результат одного товара
    pub fn record(&mut self, status: ProductSyncStatus) {
        match status {
            ProductSyncStatus::Created => self.created += 1,
            ProductSyncStatus::Updated => self.updated += 1,
            ProductSyncStatus::Skipped => self.skipped += 1,
            ProductSyncStatus::Failed => self.failed += 1,
        }
        self.processed += 1;
    }
}

/// Запись журнала по одному товару
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSyncDetail {
    pub sku: String,
    pub name: String,
    pub status: ProductSyncStatus,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Результат прогона синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub stats: SyncStats,
    pub details: Vec<ProductSyncDetail>,
    /// Длительность в формате H:MM:SS
    pub duration: String,
    #[serde(default)]
    pub cancelled: bool,
}

/// Результат синхронизации одного товара по SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleSkuSyncResponse {
    pub success: bool,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SingleSkuSyncResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            product_name: None,
            changes: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_processed() {
        let mut stats = SyncStats::default();
        stats.record(ProductSyncStatus::Created);
        stats.record(ProductSyncStatus::Failed);
        stats.record(ProductSyncStatus::Failed);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed, 3);
    }
}

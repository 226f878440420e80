use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUpdateStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdateDetail {
    pub status: PriceUpdateStatus,
    pub variant_id: String,
    pub sku: Option<String>,
    pub price: String,
    pub reason: String,
}

/// Результат выгрузки пакета цен
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkPriceResult {
    pub success: usize,
    pub failed: usize,
    /// Применены, но без подтверждения построчно
    #[serde(default)]
    pub unverified: usize,
    pub errors: Vec<String>,
    #[serde(default)]
    pub details: Vec<PriceUpdateDetail>,
}

impl BulkPriceResult {
    /// Весь пакет не применен
    pub fn all_failed(total: usize, error: impl Into<String>) -> Self {
        Self {
            success: 0,
            failed: total,
            unverified: 0,
            errors: vec![error.into()],
            details: Vec::new(),
        }
    }
}

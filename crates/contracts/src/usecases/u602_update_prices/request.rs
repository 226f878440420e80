use crate::usecases::u601_sync_catalog::ShopifyCredentials;
use serde::{Deserialize, Serialize};

/// Новая цена для варианта с указанным SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub sku: String,
    pub price: f64,
    #[serde(default)]
    pub compare_at_price: Option<f64>,
}

/// Запрос на выгрузку цен
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdateRequest {
    pub shopify: ShopifyCredentials,
    pub updates: Vec<PriceUpdate>,
    /// Обновлять по одному варианту вместо bulk operation
    #[serde(default)]
    pub use_fallback: bool,
}

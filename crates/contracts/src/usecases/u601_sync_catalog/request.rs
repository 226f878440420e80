use crate::enums::SyncMode;
use serde::{Deserialize, Serialize};

/// Доступ к Shopify Admin API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShopifyCredentials {
    /// Домен магазина (с протоколом или без)
    pub store_url: String,
    pub access_token: String,
}

/// Доступ к Sentos API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SentosCredentials {
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Cookie сессии панели. Нужен только для порядка картинок.
    #[serde(default)]
    pub cookie: Option<String>,
}

/// Запрос на запуск синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub shopify: ShopifyCredentials,
    pub sentos: SentosCredentials,

    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Количество параллельных воркеров (ограничивается сверху)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Обработать только первые 20 товаров источника
    #[serde(default)]
    pub test_mode: bool,

    /// Удалять медиа витрины, даже если порядок картинок источника недоступен
    #[serde(default)]
    pub force_media_override: bool,

    /// Vendor для создаваемых товаров
    #[serde(default)]
    pub vendor: Option<String>,
}

fn default_max_workers() -> usize {
    2
}

impl SyncRequest {
    pub fn new(
        shopify: ShopifyCredentials,
        sentos: SentosCredentials,
        sync_mode: SyncMode,
    ) -> Self {
        Self {
            shopify,
            sentos,
            sync_mode,
            max_workers: default_max_workers(),
            test_mode: false,
            force_media_override: false,
            vendor: None,
        }
    }
}

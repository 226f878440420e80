pub mod sentos;
pub mod shopify;

use async_trait::async_trait;
use contracts::enums::CatalogSystem;
use contracts::usecases::u601_sync_catalog::{SentosCredentials, ShopifyCredentials};

/// Результат тестирования подключения к каталогу
#[derive(Debug, Clone)]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

impl TestConnectionResult {
    pub fn failed(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
        }
    }
}

/// Трейт для клиента каталога
#[async_trait]
pub trait CatalogConnection {
    type Credentials: Sync;

    /// Тестирование подключения (легкий запрос с авторизацией)
    async fn test_connection(credentials: &Self::Credentials) -> TestConnectionResult;
}

/// Основная функция для тестирования подключения к каталогу
pub async fn test_catalog_connection(
    system: CatalogSystem,
    shopify: &ShopifyCredentials,
    sentos: &SentosCredentials,
) -> TestConnectionResult {
    match system {
        CatalogSystem::Sentos => sentos::SentosConnection::test_connection(sentos).await,
        CatalogSystem::Shopify => shopify::ShopifyConnection::test_connection(shopify).await,
    }
}

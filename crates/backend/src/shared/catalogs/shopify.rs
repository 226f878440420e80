use super::{CatalogConnection, TestConnectionResult};
use crate::shared::request_log::RequestLog;
use crate::usecases::u601_sync_catalog::shopify_api_client::ShopifyApiClient;
use async_trait::async_trait;
use contracts::usecases::u601_sync_catalog::ShopifyCredentials;

pub struct ShopifyConnection;

#[async_trait]
impl CatalogConnection for ShopifyConnection {
    type Credentials = ShopifyCredentials;

    async fn test_connection(credentials: &ShopifyCredentials) -> TestConnectionResult {
        let client = match ShopifyApiClient::new(credentials, RequestLog::disabled()) {
            Ok(client) => client,
            Err(e) => {
                return TestConnectionResult::failed(
                    "Некорректные настройки Shopify",
                    Some(e.to_string()),
                )
            }
        };

        match client.shop_info().await {
            Ok(shop) => TestConnectionResult {
                success: true,
                message: format!("Подключение к магазину '{}' успешно установлено", shop.name),
                details: Some(format!(
                    "URL: {}, валюта: {}",
                    shop.url.unwrap_or_else(|| client.store_url().to_string()),
                    shop.currency_code.unwrap_or_else(|| "-".into())
                )),
            },
            Err(e) => TestConnectionResult::failed(
                format!("Не удалось подключиться к {}", client.store_url()),
                Some(e.to_string()),
            ),
        }
    }
}

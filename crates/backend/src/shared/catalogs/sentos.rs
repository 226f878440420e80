use super::{CatalogConnection, TestConnectionResult};
use crate::shared::errors::CatalogError;
use crate::shared::request_log::RequestLog;
use crate::usecases::u601_sync_catalog::sentos_api_client::SentosApiClient;
use async_trait::async_trait;
use contracts::usecases::u601_sync_catalog::SentosCredentials;

pub struct SentosConnection;

#[async_trait]
impl CatalogConnection for SentosConnection {
    type Credentials = SentosCredentials;

    async fn test_connection(credentials: &SentosCredentials) -> TestConnectionResult {
        if credentials.api_key.trim().is_empty() || credentials.api_secret.trim().is_empty() {
            return TestConnectionResult::failed("API Key и API Secret не могут быть пустыми", None);
        }

        let client = match SentosApiClient::new(credentials, RequestLog::disabled()) {
            Ok(client) => client,
            Err(e) => {
                return TestConnectionResult::failed(
                    "Некорректные настройки Sentos",
                    Some(e.to_string()),
                )
            }
        };

        match client.fetch_page(1, 1).await {
            Ok(page) => TestConnectionResult {
                success: true,
                message: "Подключение к Sentos успешно установлено".into(),
                details: Some(match page.total_elements {
                    Some(total) => format!("Товаров в каталоге: {}", total),
                    None => "API ключи валидны".into(),
                }),
            },
            Err(CatalogError::Http {
                status: 401 | 403,
                body,
            }) => TestConnectionResult::failed("Sentos отклонил ключи API", Some(body)),
            Err(e) => TestConnectionResult::failed(
                "Не удалось получить данные из Sentos",
                Some(e.to_string()),
            ),
        }
    }
}

use super::models::{MediaOrder, SourceProduct};
use super::ports::SourceCatalog;
use super::progress_tracker::ProgressSink;
use crate::shared::errors::{CatalogError, CatalogResult};
use crate::shared::request_log::RequestLog;
use crate::shared::retry::RetryPolicy;
use async_trait::async_trait;
use contracts::usecases::u601_sync_catalog::{SentosCredentials, SyncProgressUpdate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const IMAGE_ORDER_PATH: &str = "/urun_sayfalari/include/ajax/fetch_urunresimler.php";
const DEFAULT_PAGE_SIZE: usize = 100;

/// Ссылка на оригинал картинки в HTML-ячейке таблицы картинок
static IMAGE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="(https?://[^"]+/o_[^"]+)""#).expect("image href pattern is valid")
});

/// Страница списка товаров Sentos
#[derive(Debug, Deserialize)]
pub struct SentosPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub total_elements: Option<u64>,
}

/// Ответ таблицы картинок (формат DataTables)
#[derive(Debug, Deserialize)]
struct ImageTableResponse {
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
}

/// HTTP-клиент для работы с Sentos API
pub struct SentosApiClient {
    client: reqwest::Client,
    api_url: String,
    /// scheme://host панели (для внутренних ajax-эндпоинтов)
    origin: String,
    api_key: String,
    api_secret: String,
    cookie: Option<String>,
    retry: RetryPolicy,
    page_size: usize,
    page_pause: Duration,
    request_log: RequestLog,
}

impl SentosApiClient {
    pub fn new(credentials: &SentosCredentials, request_log: RequestLog) -> CatalogResult<Self> {
        let api_url = credentials.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(CatalogError::Validation("Sentos API URL is required".into()));
        }
        let parsed = reqwest::Url::parse(&api_url)
            .map_err(|e| CatalogError::Validation(format!("Invalid Sentos API URL: {}", e)))?;
        let origin = parsed.origin().ascii_serialization();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            origin,
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            cookie: credentials
                .cookie
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            retry: RetryPolicy::sentos(),
            page_size: DEFAULT_PAGE_SIZE,
            page_pause: Duration::from_millis(500),
            request_log,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_pause(mut self, page_pause: Duration) -> Self {
        self.page_pause = page_pause;
        self
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    /// 500 и 429 повторяются, остальное сразу наверх
    fn is_retryable(error: &CatalogError) -> bool {
        matches!(error.http_status(), Some(500) | Some(429))
    }

    /// GET с basic auth и повторами
    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> CatalogResult<String> {
        self.retry
            .execute("sentos_get", Self::is_retryable, || async move {
                self.request_log.write(&format!(
                    "=== REQUEST ===\nGET {} {:?}\nAuthorization: Basic ****",
                    url, query
                ));
                let response = self
                    .client
                    .get(url)
                    .basic_auth(&self.api_key, Some(&self.api_secret))
                    .header("Accept", "application/json")
                    .query(query)
                    .send()
                    .await?;
                self.read_body(url, response).await
            })
            .await
    }

    async fn read_body(&self, url: &str, response: reqwest::Response) -> CatalogResult<String> {
        let status = response.status();
        self.request_log.write(&format!("Response status: {}", status));

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.request_log.write(&format!("ERROR Response body:\n{}", body));
            tracing::warn!("Sentos API request {} failed with status {}", url, status);
            return Err(CatalogError::Http {
                status: status.as_u16(),
                body: RequestLog::preview(&body, 500),
            });
        }

        let body = response.text().await?;
        self.request_log
            .write(&format!("=== RESPONSE BODY ===\n{}\n", RequestLog::preview(&body, 4000)));
        Ok(body)
    }

    /// Одна страница списка товаров
    pub async fn fetch_page(&self, page: usize, size: usize) -> CatalogResult<SentosPage> {
        let url = format!("{}/products", self.api_url);
        let body = self
            .get_text(&url, &[("page", page.to_string()), ("size", size.to_string())])
            .await?;
        serde_json::from_str::<SentosPage>(&body).map_err(|e| {
            tracing::error!("Failed to parse Sentos products page {}: {}", page, e);
            CatalogError::Parse(format!(
                "Failed to parse Sentos products page {}: {}. Response: {}",
                page,
                e,
                RequestLog::preview(&body, 500)
            ))
        })
    }

    /// Загрузить все товары, страница за страницей
    pub async fn fetch_all_products(
        &self,
        sink: &dyn ProgressSink,
    ) -> CatalogResult<Vec<SourceProduct>> {
        let mut products = Vec::new();
        let mut total_elements: Option<u64> = None;
        let mut page = 1;

        loop {
            let response = self.fetch_page(page, self.page_size).await.map_err(|e| {
                tracing::error!("Failed to fetch Sentos page {}: {}", page, e);
                e
            })?;
            let page_len = response.data.len();

            if page_len == 0 && page > 1 {
                break;
            }
            if total_elements.is_none() {
                total_elements = response.total_elements;
            }
            products.extend(parse_products(response.data, page));

            let progress = match total_elements {
                Some(total) if total > 0 => ((products.len() as u64 * 100) / total).min(100) as u8,
                _ => 0,
            };
            let total_label = total_elements
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".into());
            sink.report(SyncProgressUpdate::step(
                progress,
                format!(
                    "Загрузка товаров Sentos ({} / {})...",
                    products.len(),
                    total_label
                ),
            ));

            if page_len < self.page_size {
                break;
            }
            page += 1;
            tokio::time::sleep(self.page_pause).await;
        }

        tracing::info!("Fetched {} products from Sentos", products.len());
        Ok(products)
    }

    /// Найти товар по SKU
    pub async fn fetch_product_by_sku(&self, sku: &str) -> CatalogResult<Option<SourceProduct>> {
        let sku = sku.trim();
        if sku.is_empty() {
            return Err(CatalogError::Validation("SKU must not be empty".into()));
        }

        let url = format!("{}/products", self.api_url);
        let body = self.get_text(&url, &[("sku", sku.to_string())]).await?;
        let page: SentosPage = serde_json::from_str(&body)?;

        match page.data.into_iter().next() {
            Some(raw) => {
                tracing::info!("Found Sentos product for SKU '{}'", sku);
                Ok(Some(serde_json::from_value(raw)?))
            }
            None => {
                tracing::warn!("No Sentos product found for SKU '{}'", sku);
                Ok(None)
            }
        }
    }

    /// Упорядоченные URL картинок товара из таблицы картинок панели.
    /// Требует cookie сессии; любая неопределенность дает `Unavailable`.
    pub async fn fetch_ordered_image_urls(&self, product_id: &str) -> MediaOrder {
        let Some(cookie) = self.cookie.as_deref() else {
            tracing::warn!(
                "Sentos cookie is not configured, image order unavailable (product id {})",
                product_id
            );
            return MediaOrder::Unavailable;
        };

        let image_url = format!("{}{}", self.origin, IMAGE_ORDER_PATH);
        let url = image_url.as_str();
        let form = [
            ("draw", "1"),
            ("start", "0"),
            ("length", "100"),
            ("urun", product_id),
            ("model", "0"),
            ("renk", "0"),
            ("order[0][column]", "0"),
            ("order[0][dir]", "desc"),
        ];

        let result = self
            .retry
            .execute("sentos_image_order", Self::is_retryable, || async move {
                self.request_log.write(&format!(
                    "=== REQUEST ===\nPOST {}\nCookie: ****\nurun={}",
                    url, product_id
                ));
                let response = self
                    .client
                    .post(url)
                    .header("Cookie", cookie)
                    .form(&form)
                    .send()
                    .await?;
                self.read_body(url, response).await
            })
            .await;

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to fetch image order for product {}: {}", product_id, e);
                return MediaOrder::Unavailable;
            }
        };

        parse_image_order(&body, product_id)
    }
}

/// Разобрать ответ таблицы картинок
pub fn parse_image_order(body: &str, product_id: &str) -> MediaOrder {
    let table: ImageTableResponse = match serde_json::from_str(body) {
        Ok(table) => table,
        Err(e) => {
            // Обычно это страница логина вместо JSON (cookie истек)
            tracing::error!(
                "Image order response for product {} is not valid JSON: {}",
                product_id,
                e
            );
            return MediaOrder::Unavailable;
        }
    };

    let Some(rows) = table.data else {
        tracing::warn!("Image table for product {} has no data field", product_id);
        return MediaOrder::Unavailable;
    };
    if rows.is_empty() {
        return MediaOrder::Empty;
    }

    let urls: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get(2).and_then(Value::as_str))
        .filter_map(|cell| IMAGE_HREF.captures(cell))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if urls.is_empty() {
        tracing::warn!(
            "Image table for product {} has {} rows but no image links",
            product_id,
            rows.len()
        );
        return MediaOrder::Unavailable;
    }

    tracing::info!("Found {} ordered image URLs for product {}", urls.len(), product_id);
    MediaOrder::List(urls)
}

fn parse_products(raw: Vec<Value>, page: usize) -> Vec<SourceProduct> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<SourceProduct>(value) {
            Ok(product) => Some(product),
            Err(e) => {
                tracing::warn!("Skipping malformed Sentos product on page {}: {}", page, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl SourceCatalog for SentosApiClient {
    async fn fetch_all(&self, sink: &dyn ProgressSink) -> CatalogResult<Vec<SourceProduct>> {
        self.fetch_all_products(sink).await
    }

    async fn fetch_one(&self, sku: &str) -> CatalogResult<Option<SourceProduct>> {
        self.fetch_product_by_sku(sku).await
    }

    async fn resolve_media_order(&self, product_id: &str) -> MediaOrder {
        self.fetch_ordered_image_urls(product_id).await
    }
}

use super::models::{
    numeric_id, product_gid, CreatedVariants, DestinationVariant, InventoryAdjustment,
    ListedProduct, MediaAsset, NewMedia, NewVariant, OptionOrder, ProductCreateInput,
    ProductFieldsUpdate, ProductRef, VariantRef,
};
use super::ports::{DestinationCatalog, UserErrors};
use super::progress_tracker::ProgressSink;
use crate::shared::errors::{CatalogError, CatalogResult};
use crate::shared::format::format_price;
use crate::shared::request_log::RequestLog;
use crate::shared::retry::RetryPolicy;
use async_trait::async_trait;
use contracts::usecases::u601_sync_catalog::{ShopifyCredentials, SyncProgressUpdate};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::time::Duration;

pub const API_VERSION: &str = "2024-04";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const SKU_LOOKUP_BATCH: usize = 50;

/// `<url>; rel="next"` в заголовке Link
static NEXT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("link header pattern is valid")
});

// ============================================================================
// Ответы API
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

#[derive(Debug, Deserialize)]
struct UserError {
    #[serde(default)]
    field: Option<Vec<String>>,
    #[serde(default)]
    message: String,
}

fn format_user_errors(errors: &[UserError]) -> Vec<String> {
    errors
        .iter()
        .map(|e| match e.field.as_ref().filter(|f| !f.is_empty()) {
            Some(field) => format!("{}: {}", field.join("."), e.message),
            None => e.message.clone(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryItemNode {
    id: Option<String>,
    #[serde(default)]
    sku: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    id: String,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    inventory_item: Option<InventoryItemNode>,
}

impl From<VariantNode> for DestinationVariant {
    fn from(node: VariantNode) -> Self {
        let item_sku = node.inventory_item.as_ref().and_then(|i| i.sku.clone());
        DestinationVariant {
            id: node.id,
            sku: node.sku.filter(|s| !s.is_empty()).or(item_sku),
            inventory_item_id: node.inventory_item.and_then(|i| i.id),
            price: node.price,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageNode {
    #[serde(rename = "originalSrc")]
    original_src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaNode {
    id: String,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    image: Option<ImageNode>,
}

#[derive(Debug, Deserialize)]
struct RestProductsPage {
    #[serde(default)]
    products: Vec<RestProduct>,
}

#[derive(Debug, Deserialize)]
struct RestProduct {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    variants: Vec<RestVariant>,
}

#[derive(Debug, Deserialize)]
struct RestVariant {
    #[serde(default)]
    sku: Option<String>,
}

/// Сведения о магазине (проверка подключения)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopInfo {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

/// Цель staged upload
#[derive(Debug, Clone, PartialEq)]
pub struct StagedTarget {
    pub url: String,
    pub parameters: Vec<(String, String)>,
}

impl StagedTarget {
    /// Путь загруженного файла для bulkOperationRunMutation
    pub fn staged_path(&self) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(name, _)| name == "key")
            .map(|(_, value)| value.as_str())
    }
}

/// Состояние bulk operation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub object_count: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub partial_data_url: Option<String>,
}

/// Цена одного варианта для productVariantsBulkUpdate / REST
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPriceInput {
    pub variant_id: String,
    pub price: f64,
    pub compare_at_price: Option<f64>,
}

// ============================================================================
// Клиент
// ============================================================================

/// HTTP-клиент для работы с Shopify Admin API
pub struct ShopifyApiClient {
    client: reqwest::Client,
    store_url: String,
    graphql_url: String,
    rest_base_url: String,
    access_token: String,
    throttle_retry: RetryPolicy,
    /// Минимальный интервал между запросами
    spacing: Option<DefaultDirectRateLimiter>,
    /// Ожидание при 429 без Retry-After
    default_rate_limit_wait: Duration,
    max_rate_limit_wait: Duration,
    max_rate_limit_waits: u32,
    location_id: tokio::sync::OnceCell<String>,
    request_log: RequestLog,
}

impl ShopifyApiClient {
    pub fn new(credentials: &ShopifyCredentials, request_log: RequestLog) -> CatalogResult<Self> {
        let store = credentials.store_url.trim().trim_end_matches('/');
        if store.is_empty() {
            return Err(CatalogError::Validation("Shopify store URL is required".into()));
        }
        if credentials.access_token.trim().is_empty() {
            return Err(CatalogError::Validation("Shopify access token is required".into()));
        }
        let store_url = if store.starts_with("http") {
            store.to_string()
        } else {
            format!("https://{}", store)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .user_agent("catalog-sync/0.1")
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            graphql_url: format!("{}/admin/api/{}/graphql.json", store_url, API_VERSION),
            rest_base_url: format!("{}/admin/api/{}", store_url, API_VERSION),
            store_url,
            access_token: credentials.access_token.trim().to_string(),
            throttle_retry: RetryPolicy::shopify_throttle(),
            spacing: Some(spacing_limiter(Duration::from_millis(500))),
            default_rate_limit_wait: Duration::from_secs(10),
            max_rate_limit_wait: Duration::from_secs(60),
            max_rate_limit_waits: 5,
            location_id: tokio::sync::OnceCell::new(),
            request_log,
        })
    }

    pub fn with_throttle_retry(mut self, retry: RetryPolicy) -> Self {
        self.throttle_retry = retry;
        self
    }

    /// Нулевой интервал отключает проактивную паузу
    pub fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = (!spacing.is_zero()).then(|| spacing_limiter(spacing));
        self
    }

    pub fn with_rate_limit_wait(mut self, default_wait: Duration, max_wait: Duration) -> Self {
        self.default_rate_limit_wait = default_wait;
        self.max_rate_limit_wait = max_wait;
        self
    }

    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    /// Отправить запрос: пауза между запросами, ожидание при 429, проверка статуса.
    /// `build` вызывается заново для каждой попытки.
    async fn send<F>(&self, operation: &str, build: F) -> CatalogResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut waits = 0;
        loop {
            if let Some(limiter) = &self.spacing {
                limiter.until_ready().await;
            }

            let response = build().send().await.map_err(|e| {
                tracing::error!("Shopify API connection error ({}): {}", operation, e);
                self.request_log
                    .write(&format!("TRANSPORT ERROR ({}): {}", operation, e));
                CatalogError::from(e)
            })?;
            let status = response.status();
            self.request_log
                .write(&format!("Response status ({}): {}", operation, status));

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if waits >= self.max_rate_limit_waits {
                    return Err(CatalogError::RateLimit(format!(
                        "{}: HTTP 429 after {} waits",
                        operation, waits
                    )));
                }
                let wait = retry_after(response.headers())
                    .unwrap_or(self.default_rate_limit_wait)
                    .min(self.max_rate_limit_wait);
                tracing::warn!(
                    "Shopify API rate limit hit ({}), waiting {:?}",
                    operation,
                    wait
                );
                tokio::time::sleep(wait).await;
                waits += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                self.request_log
                    .write(&format!("ERROR Response body:\n{}", body));
                tracing::error!(
                    "Shopify API request failed ({}): HTTP {}",
                    operation,
                    status
                );
                return Err(CatalogError::Http {
                    status: status.as_u16(),
                    body: RequestLog::preview(&body, 500),
                });
            }

            return Ok(response);
        }
    }

    /// Один GraphQL-вызов без повторов
    async fn graphql_once(&self, query: &str, variables: &Value) -> CatalogResult<Value> {
        let payload = json!({ "query": query, "variables": variables });
        self.request_log.write(&format!(
            "=== REQUEST ===\nPOST {}\n{}: ****\nBody: {}",
            self.graphql_url,
            ACCESS_TOKEN_HEADER,
            RequestLog::preview(&payload.to_string(), 4000)
        ));

        let response = self
            .send("graphql", || {
                self.client
                    .post(&self.graphql_url)
                    .header(ACCESS_TOKEN_HEADER, &self.access_token)
                    .json(&payload)
            })
            .await?;

        let body = response.text().await?;
        self.request_log
            .write(&format!("=== RESPONSE BODY ===\n{}\n", RequestLog::preview(&body, 4000)));

        let envelope: GraphQlEnvelope = serde_json::from_str(&body).map_err(|e| {
            CatalogError::Parse(format!(
                "Failed to parse Shopify GraphQL response: {}. Response: {}",
                e,
                RequestLog::preview(&body, 500)
            ))
        })?;

        if let Some(errors) = envelope.errors.as_ref() {
            let (messages, throttled) = collect_graphql_errors(errors);
            if !messages.is_empty() {
                let joined = messages.join(", ");
                if throttled {
                    return Err(CatalogError::Throttled(joined));
                }
                tracing::error!("GraphQL query returned errors: {}", errors);
                return Err(CatalogError::RemoteApi(format!("GraphQL Error: {}", joined)));
            }
        }

        Ok(envelope.data.unwrap_or_else(|| json!({})))
    }

    /// GraphQL-запрос; повторяются только ответы с THROTTLED
    pub async fn execute(&self, query: &str, variables: Value) -> CatalogResult<Value> {
        let variables = &variables;
        self.throttle_retry
            .execute("graphql", CatalogError::is_throttled, || async move {
                self.graphql_once(query, variables).await
            })
            .await
    }

    /// GraphQL-запрос с разбором `data` в тип
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> CatalogResult<T> {
        let data = self.execute(query, variables).await?;
        serde_json::from_value(data).map_err(|e| {
            CatalogError::Parse(format!("Unexpected Shopify GraphQL data shape: {}", e))
        })
    }

    /// Проверка доступа к магазину
    pub async fn shop_info(&self) -> CatalogResult<ShopInfo> {
        #[derive(Deserialize)]
        struct Data {
            shop: ShopInfo,
        }
        let data: Data = self
            .execute_as("query { shop { name url currencyCode } }", json!({}))
            .await?;
        Ok(data.shop)
    }

    /// Облегченный список всех товаров (REST, пагинация по Link)
    pub async fn list_products_for_cache(
        &self,
        sink: &dyn ProgressSink,
    ) -> CatalogResult<Vec<ListedProduct>> {
        let mut products = Vec::new();
        let mut next = Some(format!(
            "{}/products.json?limit=250&fields=id,title,variants",
            self.rest_base_url
        ));

        while let Some(url) = next.take() {
            sink.report(SyncProgressUpdate::message(format!(
                "Кэширование товаров Shopify... найдено {}",
                products.len()
            )));
            self.request_log
                .write(&format!("=== REQUEST ===\nGET {}", url));

            let response = self
                .send("products_list", || {
                    self.client
                        .get(&url)
                        .header(ACCESS_TOKEN_HEADER, &self.access_token)
                })
                .await?;
            let link = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response.text().await?;
            let page: RestProductsPage = serde_json::from_str(&body)?;
            products.extend(page.products.into_iter().map(|p| ListedProduct {
                id: p.id,
                gid: product_gid(p.id),
                title: p.title.unwrap_or_default(),
                variant_skus: p
                    .variants
                    .into_iter()
                    .filter_map(|v| v.sku)
                    .filter(|s| !s.trim().is_empty())
                    .collect(),
            }));

            next = link.as_deref().and_then(parse_next_link);
        }

        tracing::info!("Cached {} Shopify products", products.len());
        Ok(products)
    }

    /// SKU → (вариант, товар), пакетами по 50. Ненайденные SKU только логируются.
    pub async fn resolve_variant_ids_by_sku(
        &self,
        skus: &[String],
    ) -> HashMap<String, VariantRef> {
        #[derive(Deserialize)]
        struct ProductIdNode {
            id: String,
        }
        #[derive(Deserialize)]
        struct SkuVariantNode {
            id: String,
            #[serde(default)]
            sku: Option<String>,
            product: ProductIdNode,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            product_variants: Connection<SkuVariantNode>,
        }

        const QUERY: &str = r#"
            query variantsBySku($query: String!) {
              productVariants(first: 250, query: $query) {
                edges { node { id sku product { id } } }
              }
            }"#;

        let wanted: Vec<String> = skus
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let wanted_set: HashSet<&str> = wanted.iter().map(String::as_str).collect();
        let mut map = HashMap::new();

        for (batch_index, chunk) in wanted.chunks(SKU_LOOKUP_BATCH).enumerate() {
            let filter = chunk
                .iter()
                .map(|sku| format!("sku:{}", Value::String(sku.clone())))
                .collect::<Vec<_>>()
                .join(" OR ");

            match self
                .execute_as::<Data>(QUERY, json!({ "query": filter }))
                .await
            {
                Ok(data) => {
                    for node in data.product_variants.into_nodes() {
                        let Some(sku) = node.sku.map(|s| s.trim().to_string()) else {
                            continue;
                        };
                        if wanted_set.contains(sku.as_str()) {
                            map.insert(
                                sku,
                                VariantRef {
                                    variant_id: node.id,
                                    product_id: node.product.id,
                                },
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to resolve variant ids for SKU batch {}: {}",
                        batch_index + 1,
                        e
                    );
                }
            }
        }

        let unmatched = wanted.len() - map.len();
        if unmatched > 0 {
            tracing::warn!("{} SKUs have no matching Shopify variant", unmatched);
        }
        tracing::info!("Resolved {} of {} SKUs", map.len(), wanted.len());
        map
    }

    pub async fn fetch_product_variants(
        &self,
        product_gid: &str,
    ) -> CatalogResult<Vec<DestinationVariant>> {
        #[derive(Deserialize)]
        struct ProductNode {
            variants: Connection<VariantNode>,
        }
        #[derive(Deserialize)]
        struct Data {
            product: Option<ProductNode>,
        }

        const QUERY: &str = r#"
            query productVariants($id: ID!) {
              product(id: $id) {
                variants(first: 250) {
                  edges { node { id sku price inventoryItem { id sku } } }
                }
              }
            }"#;

        let data: Data = self.execute_as(QUERY, json!({ "id": product_gid })).await?;
        let product = data
            .product
            .ok_or_else(|| CatalogError::RemoteApi(format!("Product {} not found", product_gid)))?;
        Ok(product
            .variants
            .into_nodes()
            .into_iter()
            .map(DestinationVariant::from)
            .collect())
    }

    pub async fn fetch_product_media(&self, product_gid: &str) -> CatalogResult<Vec<MediaAsset>> {
        #[derive(Deserialize)]
        struct ProductNode {
            media: Connection<MediaNode>,
        }
        #[derive(Deserialize)]
        struct Data {
            product: Option<ProductNode>,
        }

        const QUERY: &str = r#"
            query productMedia($id: ID!) {
              product(id: $id) {
                media(first: 250) {
                  edges { node { id alt ... on MediaImage { image { originalSrc } } } }
                }
              }
            }"#;

        let data: Data = self.execute_as(QUERY, json!({ "id": product_gid })).await?;
        let product = data
            .product
            .ok_or_else(|| CatalogError::RemoteApi(format!("Product {} not found", product_gid)))?;
        let media: Vec<MediaAsset> = product
            .media
            .into_nodes()
            .into_iter()
            .map(|node| MediaAsset {
                id: node.id,
                source_url: node.image.and_then(|i| i.original_src),
                alt: node.alt.filter(|a| !a.is_empty()),
            })
            .collect();
        tracing::debug!("Product {} has {} media", product_gid, media.len());
        Ok(media)
    }

    /// Выполнить мутацию и вернуть userErrors из `data.<field>.<errors_key>`
    async fn mutate(
        &self,
        query: &str,
        variables: Value,
        field: &str,
        errors_key: &str,
    ) -> CatalogResult<(Value, UserErrors)> {
        let mut data = self.execute(query, variables).await?;
        let payload = data.get_mut(field).map(Value::take).unwrap_or(Value::Null);
        let errors: Vec<UserError> = match payload.get(errors_key) {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => Vec::new(),
        };
        let errors = format_user_errors(&errors);
        if !errors.is_empty() {
            tracing::warn!("{} returned user errors: {}", field, errors.join("; "));
        }
        Ok((payload, errors))
    }

    pub async fn update_product_fields(
        &self,
        product_gid: &str,
        update: &ProductFieldsUpdate,
    ) -> CatalogResult<UserErrors> {
        let mut input = serde_json::Map::new();
        input.insert("id".into(), json!(product_gid));
        if let Some(title) = &update.title {
            input.insert("title".into(), json!(title));
        }
        if let Some(description) = &update.description_html {
            input.insert("descriptionHtml".into(), json!(description));
        }
        if let Some(product_type) = &update.product_type {
            input.insert("productType".into(), json!(product_type));
        }

        let (_, errors) = self
            .mutate(
                "mutation productUpdate($input: ProductInput!) { productUpdate(input: $input) { product { id } userErrors { field message } } }",
                json!({ "input": input }),
                "productUpdate",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    pub async fn create_product_with_options(
        &self,
        input: &ProductCreateInput,
    ) -> CatalogResult<ProductRef> {
        let mut product = serde_json::Map::new();
        product.insert("title".into(), json!(input.title));
        product.insert("descriptionHtml".into(), json!(input.description_html));
        product.insert("status".into(), json!("ACTIVE"));
        product.insert("tags".into(), json!(input.tags));
        if let Some(vendor) = &input.vendor {
            product.insert("vendor".into(), json!(vendor));
        }
        if let Some(product_type) = &input.product_type {
            product.insert("productType".into(), json!(product_type));
        }
        if !input.options.is_empty() {
            product.insert("productOptions".into(), options_json(&input.options));
        }

        let (payload, errors) = self
            .mutate(
                "mutation productCreate($input: ProductInput!) { productCreate(input: $input) { product { id } userErrors { field message } } }",
                json!({ "input": product }),
                "productCreate",
                "userErrors",
            )
            .await?;

        let gid = payload
            .pointer("/product/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CatalogError::RemoteApi(format!(
                    "Product was not created: {}",
                    errors.join(", ")
                ))
            })?;
        tracing::info!("Created Shopify product {} ('{}')", gid, input.title);
        Ok(ProductRef {
            id: numeric_id(&gid).unwrap_or_default(),
            gid,
        })
    }

    pub async fn bulk_create_variants(
        &self,
        product_gid: &str,
        variants: &[NewVariant],
        replace_standalone: bool,
    ) -> CatalogResult<CreatedVariants> {
        let strategy = if replace_standalone {
            ", strategy: REMOVE_STANDALONE_VARIANT"
        } else {
            ""
        };
        let query = format!(
            "mutation productVariantsBulkCreate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {{ productVariantsBulkCreate(productId: $productId, variants: $variants{}) {{ productVariants {{ id sku price inventoryItem {{ id sku }} }} userErrors {{ field message }} }} }}",
            strategy
        );
        let inputs: Vec<Value> = variants.iter().map(variant_input_json).collect();

        let (payload, user_errors) = self
            .mutate(
                &query,
                json!({ "productId": product_gid, "variants": inputs }),
                "productVariantsBulkCreate",
                "userErrors",
            )
            .await?;

        let created: Vec<VariantNode> = match payload.get("productVariants") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => Vec::new(),
        };
        tracing::info!(
            "Created {} variants for product {}",
            created.len(),
            product_gid
        );
        Ok(CreatedVariants {
            variants: created.into_iter().map(DestinationVariant::from).collect(),
            user_errors,
        })
    }

    /// Первая активная локация (кэшируется на время жизни клиента)
    pub async fn default_location_id(&self) -> CatalogResult<String> {
        #[derive(Deserialize)]
        struct LocationNode {
            id: String,
        }
        #[derive(Deserialize)]
        struct Data {
            locations: Connection<LocationNode>,
        }

        self.location_id
            .get_or_try_init(|| async {
                let data: Data = self
                    .execute_as(
                        r#"query { locations(first: 1, query: "status:active") { edges { node { id } } } }"#,
                        json!({}),
                    )
                    .await?;
                let id = data
                    .locations
                    .into_nodes()
                    .into_iter()
                    .next()
                    .map(|l| l.id)
                    .ok_or_else(|| {
                        CatalogError::RemoteApi(
                            "No active inventory location found in the Shopify store".into(),
                        )
                    })?;
                tracing::info!("Using Shopify location {}", id);
                Ok(id)
            })
            .await
            .cloned()
    }

    /// Активировать складские позиции на локации (по одной позиции за вызов)
    pub async fn activate_inventory_items(
        &self,
        inventory_item_ids: &[String],
        location_id: &str,
    ) -> CatalogResult<UserErrors> {
        let mut all_errors = Vec::new();
        for item_id in inventory_item_ids {
            let (_, errors) = self
                .mutate(
                    "mutation inventoryBulkToggleActivation($inventoryItemId: ID!, $inventoryItemUpdates: [InventoryBulkToggleActivationInput!]!) { inventoryBulkToggleActivation(inventoryItemId: $inventoryItemId, inventoryItemUpdates: $inventoryItemUpdates) { inventoryLevels { id } userErrors { field message } } }",
                    json!({
                        "inventoryItemId": item_id,
                        "inventoryItemUpdates": [{ "locationId": location_id, "activate": true }],
                    }),
                    "inventoryBulkToggleActivation",
                    "userErrors",
                )
                .await?;
            all_errors.extend(errors);
        }
        Ok(all_errors)
    }

    pub async fn set_on_hand(
        &self,
        adjustments: &[InventoryAdjustment],
        location_id: &str,
    ) -> CatalogResult<UserErrors> {
        let quantities: Vec<Value> = adjustments
            .iter()
            .map(|a| {
                json!({
                    "inventoryItemId": a.inventory_item_id,
                    "locationId": location_id,
                    "quantity": a.quantity,
                })
            })
            .collect();
        let (_, errors) = self
            .mutate(
                "mutation inventorySetOnHandQuantities($input: InventorySetOnHandQuantitiesInput!) { inventorySetOnHandQuantities(input: $input) { userErrors { field message code } } }",
                json!({ "input": { "reason": "correction", "setQuantities": quantities } }),
                "inventorySetOnHandQuantities",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    pub async fn reorder_product_options(
        &self,
        product_gid: &str,
        options: &[OptionOrder],
    ) -> CatalogResult<UserErrors> {
        let (_, errors) = self
            .mutate(
                "mutation productOptionsReorder($productId: ID!, $options: [OptionReorderInput!]!) { productOptionsReorder(productId: $productId, options: $options) { userErrors { field message } } }",
                json!({ "productId": product_gid, "options": options_json(options) }),
                "productOptionsReorder",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    pub async fn create_product_media(
        &self,
        product_gid: &str,
        media: &[NewMedia],
    ) -> CatalogResult<UserErrors> {
        let inputs: Vec<Value> = media
            .iter()
            .map(|m| {
                json!({
                    "originalSource": m.source_url,
                    "alt": m.alt,
                    "mediaContentType": "IMAGE",
                })
            })
            .collect();
        let (_, errors) = self
            .mutate(
                "mutation productCreateMedia($productId: ID!, $media: [CreateMediaInput!]!) { productCreateMedia(productId: $productId, media: $media) { media { id } mediaUserErrors { field message } } }",
                json!({ "productId": product_gid, "media": inputs }),
                "productCreateMedia",
                "mediaUserErrors",
            )
            .await?;
        Ok(errors)
    }

    pub async fn delete_product_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        let (_, errors) = self
            .mutate(
                "mutation productDeleteMedia($productId: ID!, $mediaIds: [ID!]!) { productDeleteMedia(productId: $productId, mediaIds: $mediaIds) { deletedMediaIds userErrors { field message } } }",
                json!({ "productId": product_gid, "mediaIds": media_ids }),
                "productDeleteMedia",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    pub async fn reorder_product_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        let moves: Vec<Value> = media_ids
            .iter()
            .enumerate()
            .map(|(i, id)| json!({ "id": id, "newPosition": i.to_string() }))
            .collect();
        let (_, errors) = self
            .mutate(
                "mutation productReorderMedia($id: ID!, $moves: [MoveInput!]!) { productReorderMedia(id: $id, moves: $moves) { job { id } userErrors { field message } } }",
                json!({ "id": product_gid, "moves": moves }),
                "productReorderMedia",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    // ------------------------------------------------------------------------
    // Цены
    // ------------------------------------------------------------------------

    /// Обновить цены вариантов одного товара
    pub async fn update_variant_prices(
        &self,
        product_id: &str,
        prices: &[VariantPriceInput],
    ) -> CatalogResult<UserErrors> {
        let variants: Vec<Value> = prices.iter().map(price_input_json).collect();
        let (_, errors) = self
            .mutate(
                "mutation productVariantsBulkUpdate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) { productVariantsBulkUpdate(productId: $productId, variants: $variants) { productVariants { id price compareAtPrice } userErrors { field message } } }",
                json!({ "productId": product_id, "variants": variants }),
                "productVariantsBulkUpdate",
                "userErrors",
            )
            .await?;
        Ok(errors)
    }

    /// Обновить цену варианта через REST (запасной путь)
    pub async fn update_variant_price_rest(&self, price: &VariantPriceInput) -> CatalogResult<()> {
        let id = numeric_id(&price.variant_id).ok_or_else(|| {
            CatalogError::Validation(format!("Invalid variant id: {}", price.variant_id))
        })?;
        let mut variant = json!({ "id": id, "price": format_price(price.price) });
        if let Some(compare_at) = price.compare_at_price {
            variant["compare_at_price"] = json!(format_price(compare_at));
        }
        let body = json!({ "variant": variant });
        let url = format!("{}/variants/{}.json", self.rest_base_url, id);
        self.request_log
            .write(&format!("=== REQUEST ===\nPUT {}\nBody: {}", url, body));

        let response = self
            .send("variant_update_rest", || {
                self.client
                    .put(&url)
                    .header(ACCESS_TOKEN_HEADER, &self.access_token)
                    .json(&body)
            })
            .await?;
        let response: Value = serde_json::from_str(&response.text().await?)?;
        if response.get("variant").is_none() {
            return Err(CatalogError::RemoteApi(
                "REST variant update returned no variant".into(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Bulk operations
    // ------------------------------------------------------------------------

    /// Запросить staged upload для JSONL-файла переменных bulk-мутации
    pub async fn create_staged_upload(&self, filename: &str) -> CatalogResult<StagedTarget> {
        #[derive(Deserialize)]
        struct Parameter {
            name: String,
            value: String,
        }
        #[derive(Deserialize)]
        struct Target {
            url: String,
            #[serde(default)]
            parameters: Vec<Parameter>,
        }

        let (payload, errors) = self
            .mutate(
                "mutation stagedUploadsCreate($input: [StagedUploadInput!]!) { stagedUploadsCreate(input: $input) { stagedTargets { url resourceUrl parameters { name value } } userErrors { field message } } }",
                json!({
                    "input": [{
                        "resource": "BULK_MUTATION_VARIABLES",
                        "filename": filename,
                        "mimeType": "text/jsonl",
                        "httpMethod": "POST",
                    }]
                }),
                "stagedUploadsCreate",
                "userErrors",
            )
            .await?;
        if !errors.is_empty() {
            return Err(CatalogError::RemoteApi(format!(
                "stagedUploadsCreate failed: {}",
                errors.join(", ")
            )));
        }

        let targets: Vec<Target> = match payload.get("stagedTargets") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => Vec::new(),
        };
        let target = targets
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::RemoteApi("No staged upload target returned".into()))?;
        Ok(StagedTarget {
            url: target.url,
            parameters: target
                .parameters
                .into_iter()
                .map(|p| (p.name, p.value))
                .collect(),
        })
    }

    /// Загрузить файл по параметрам staged upload; возвращает staged path
    pub async fn upload_staged_file(
        &self,
        target: &StagedTarget,
        filename: &str,
        contents: &[u8],
    ) -> CatalogResult<String> {
        let staged_path = target
            .staged_path()
            .ok_or_else(|| {
                CatalogError::RemoteApi("Staged upload target has no 'key' parameter".into())
            })?
            .to_string();

        self.request_log.write(&format!(
            "=== UPLOAD ===\nPOST {} ({} bytes)",
            target.url,
            contents.len()
        ));
        self.send("staged_upload", || {
            let mut form = reqwest::multipart::Form::new();
            for (name, value) in &target.parameters {
                form = form.text(name.clone(), value.clone());
            }
            form = form.part(
                "file",
                reqwest::multipart::Part::bytes(contents.to_vec()).file_name(filename.to_string()),
            );
            self.client.post(&target.url).multipart(form)
        })
        .await?;

        Ok(staged_path)
    }

    /// Запустить bulk-мутацию; возвращает id операции
    pub async fn run_bulk_mutation(
        &self,
        mutation: &str,
        staged_path: &str,
    ) -> CatalogResult<String> {
        let (payload, errors) = self
            .mutate(
                "mutation bulkOperationRunMutation($mutation: String!, $stagedUploadPath: String!) { bulkOperationRunMutation(mutation: $mutation, stagedUploadPath: $stagedUploadPath) { bulkOperation { id status } userErrors { field message } } }",
                json!({ "mutation": mutation, "stagedUploadPath": staged_path }),
                "bulkOperationRunMutation",
                "userErrors",
            )
            .await?;
        if !errors.is_empty() {
            return Err(CatalogError::RemoteApi(format!(
                "bulkOperationRunMutation failed: {}",
                errors.join(", ")
            )));
        }
        payload
            .pointer("/bulkOperation/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CatalogError::RemoteApi("Bulk operation was not started".into()))
    }

    pub async fn bulk_operation_status(
        &self,
        operation_id: &str,
    ) -> CatalogResult<BulkOperationStatus> {
        #[derive(Deserialize)]
        struct Data {
            node: Option<BulkOperationStatus>,
        }
        let data: Data = self
            .execute_as(
                "query bulkOperation($id: ID!) { node(id: $id) { ... on BulkOperation { id status errorCode objectCount url partialDataUrl } } }",
                json!({ "id": operation_id }),
            )
            .await?;
        data.node.ok_or_else(|| {
            CatalogError::RemoteApi(format!("Bulk operation {} not found", operation_id))
        })
    }

    /// Скачать файл результата bulk operation
    pub async fn download_text(&self, url: &str) -> CatalogResult<String> {
        let response = self.send("download", || self.client.get(url)).await?;
        Ok(response.text().await?)
    }
}

fn spacing_limiter(spacing: Duration) -> DefaultDirectRateLimiter {
    let quota = Quota::with_period(spacing).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Retry-After в секундах (Shopify присылает "2.0")
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// URL следующей страницы из заголовка Link
pub fn parse_next_link(header: &str) -> Option<String> {
    NEXT_LINK
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Сообщения ошибок GraphQL и признак THROTTLED
fn collect_graphql_errors(errors: &Value) -> (Vec<String>, bool) {
    match errors {
        Value::Array(items) => {
            let throttled = items.iter().any(|e| {
                e.pointer("/extensions/code").and_then(Value::as_str) == Some("THROTTLED")
            });
            let messages = items
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown GraphQL error")
                        .to_string()
                })
                .collect();
            (messages, throttled)
        }
        Value::String(message) => (vec![message.clone()], false),
        Value::Null => (Vec::new(), false),
        other => (vec![other.to_string()], false),
    }
}

fn options_json(options: &[OptionOrder]) -> Value {
    Value::Array(
        options
            .iter()
            .map(|o| {
                json!({
                    "name": o.name,
                    "values": o.values.iter().map(|v| json!({ "name": v })).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn variant_input_json(variant: &NewVariant) -> Value {
    let mut input = json!({
        "price": format_price(variant.price),
        "inventoryItem": { "tracked": true, "sku": variant.sku },
    });
    if !variant.option_values.is_empty() {
        input["optionValues"] = Value::Array(
            variant
                .option_values
                .iter()
                .map(|o| json!({ "optionName": o.option_name, "name": o.name }))
                .collect(),
        );
    }
    if let Some(barcode) = variant.barcode.as_ref().filter(|b| !b.trim().is_empty()) {
        input["barcode"] = json!(barcode);
    }
    input
}

fn price_input_json(price: &VariantPriceInput) -> Value {
    let mut input = json!({ "id": price.variant_id, "price": format_price(price.price) });
    if let Some(compare_at) = price.compare_at_price {
        input["compareAtPrice"] = json!(format_price(compare_at));
    }
    input
}

#[async_trait]
impl DestinationCatalog for ShopifyApiClient {
    async fn fetch_all(&self, sink: &dyn ProgressSink) -> CatalogResult<Vec<ListedProduct>> {
        self.list_products_for_cache(sink).await
    }

    async fn product_variants(&self, product_gid: &str) -> CatalogResult<Vec<DestinationVariant>> {
        self.fetch_product_variants(product_gid).await
    }

    async fn product_media(&self, product_gid: &str) -> CatalogResult<Vec<MediaAsset>> {
        self.fetch_product_media(product_gid).await
    }

    async fn update_product(
        &self,
        product_gid: &str,
        update: &ProductFieldsUpdate,
    ) -> CatalogResult<UserErrors> {
        self.update_product_fields(product_gid, update).await
    }

    async fn create_product(&self, input: &ProductCreateInput) -> CatalogResult<ProductRef> {
        self.create_product_with_options(input).await
    }

    async fn create_variants(
        &self,
        product_gid: &str,
        variants: &[NewVariant],
        replace_standalone: bool,
    ) -> CatalogResult<CreatedVariants> {
        self.bulk_create_variants(product_gid, variants, replace_standalone)
            .await
    }

    async fn default_location(&self) -> CatalogResult<String> {
        self.default_location_id().await
    }

    async fn activate_inventory(
        &self,
        inventory_item_ids: &[String],
        location_id: &str,
    ) -> CatalogResult<UserErrors> {
        self.activate_inventory_items(inventory_item_ids, location_id)
            .await
    }

    async fn set_on_hand_quantities(
        &self,
        adjustments: &[InventoryAdjustment],
        location_id: &str,
    ) -> CatalogResult<UserErrors> {
        self.set_on_hand(adjustments, location_id).await
    }

    async fn reorder_options(
        &self,
        product_gid: &str,
        options: &[OptionOrder],
    ) -> CatalogResult<UserErrors> {
        self.reorder_product_options(product_gid, options).await
    }

    async fn create_media(
        &self,
        product_gid: &str,
        media: &[NewMedia],
    ) -> CatalogResult<UserErrors> {
        self.create_product_media(product_gid, media).await
    }

    async fn delete_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        self.delete_product_media(product_gid, media_ids).await
    }

    async fn reorder_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        self.reorder_product_media(product_gid, media_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::models::OptionValue;
    use super::*;

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://shop.myshopify.com/admin/api/2024-04/products.json?limit=250&page_info=prev>; rel="previous", <https://shop.myshopify.com/admin/api/2024-04/products.json?limit=250&page_info=abc>; rel="next""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://shop.myshopify.com/admin/api/2024-04/products.json?limit=250&page_info=abc")
        );
        assert_eq!(
            parse_next_link(r#"<https://x/products.json?page_info=p>; rel="previous""#),
            None
        );
    }

    #[test]
    fn test_collect_graphql_errors() {
        let (messages, throttled) = collect_graphql_errors(&json!([
            { "message": "Throttled", "extensions": { "code": "THROTTLED" } }
        ]));
        assert_eq!(messages, vec!["Throttled".to_string()]);
        assert!(throttled);

        let (messages, throttled) = collect_graphql_errors(&json!([
            { "message": "Field 'x' doesn't exist" }, { "message": "Bad id" }
        ]));
        assert_eq!(messages.join(", "), "Field 'x' doesn't exist, Bad id");
        assert!(!throttled);

        let (messages, _) = collect_graphql_errors(&json!("[API] Invalid API key"));
        assert_eq!(messages, vec!["[API] Invalid API key".to_string()]);
    }

    #[test]
    fn test_store_url_normalization() {
        let client = ShopifyApiClient::new(
            &ShopifyCredentials {
                store_url: " demo.myshopify.com/ ".into(),
                access_token: "shpat_x".into(),
            },
            RequestLog::disabled(),
        )
        .unwrap();
        assert_eq!(client.store_url(), "https://demo.myshopify.com");
        assert_eq!(
            client.graphql_url,
            "https://demo.myshopify.com/admin/api/2024-04/graphql.json"
        );
    }

    #[test]
    fn test_missing_token_is_validation_error() {
        let err = ShopifyApiClient::new(
            &ShopifyCredentials {
                store_url: "demo.myshopify.com".into(),
                access_token: " ".into(),
            },
            RequestLog::disabled(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[test]
    fn test_variant_input_shape() {
        let input = variant_input_json(&NewVariant {
            sku: "A-1-RED-M".into(),
            price: 0.0,
            barcode: Some(" ".into()),
            option_values: vec![
                OptionValue { option_name: "Renk".into(), name: "RED".into() },
                OptionValue { option_name: "Beden".into(), name: "M".into() },
            ],
        });
        assert_eq!(
            input,
            json!({
                "price": "0.00",
                "inventoryItem": { "tracked": true, "sku": "A-1-RED-M" },
                "optionValues": [
                    { "optionName": "Renk", "name": "RED" },
                    { "optionName": "Beden", "name": "M" }
                ]
            })
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "2.0".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
        assert_eq!(retry_after(&reqwest::header::HeaderMap::new()), None);

        headers.insert(reqwest::header::RETRY_AFTER, "1e30".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "-1".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_staged_path_is_key_parameter() {
        let target = StagedTarget {
            url: "https://shopify-staged-uploads.storage.googleapis.com/".into(),
            parameters: vec![
                ("Content-Type".into(), "text/jsonl".into()),
                ("key".into(), "tmp/21759409/bulk/abc/bulk_op_vars.jsonl".into()),
            ],
        };
        assert_eq!(target.staged_path(), Some("tmp/21759409/bulk/abc/bulk_op_vars.jsonl"));
    }
}

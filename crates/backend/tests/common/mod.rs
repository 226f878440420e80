//! In-memory каталоги для тестов движка синхронизации.

#![allow(dead_code)]

use async_trait::async_trait;
use backend::shared::errors::{CatalogError, CatalogResult};
use backend::usecases::u601_sync_catalog::models::{
    product_gid, CreatedVariants, DestinationVariant, InventoryAdjustment, ListedProduct,
    MediaAsset, MediaOrder, NewMedia, NewVariant, OptionOrder, ProductCreateInput,
    ProductFieldsUpdate, ProductRef, SourceProduct,
};
use backend::usecases::u601_sync_catalog::ports::{DestinationCatalog, SourceCatalog, UserErrors};
use backend::usecases::u601_sync_catalog::progress_tracker::ProgressSink;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

pub const LOCATION: &str = "gid://shopify/Location/1";

pub fn source_product(value: Value) -> SourceProduct {
    serde_json::from_value(value).expect("valid source product fixture")
}

// ============================================================================
// Источник
// ============================================================================

#[derive(Default)]
pub struct FakeSource {
    pub products: Vec<SourceProduct>,
    /// id товара → порядок картинок; по умолчанию Unavailable
    pub media: HashMap<String, MediaOrder>,
}

impl FakeSource {
    pub fn new(products: Vec<SourceProduct>) -> Self {
        Self {
            products,
            media: HashMap::new(),
        }
    }

    pub fn with_media(mut self, product_id: &str, order: MediaOrder) -> Self {
        self.media.insert(product_id.to_string(), order);
        self
    }
}

#[async_trait]
impl SourceCatalog for FakeSource {
    async fn fetch_all(&self, _sink: &dyn ProgressSink) -> CatalogResult<Vec<SourceProduct>> {
        Ok(self.products.clone())
    }

    async fn fetch_one(&self, sku: &str) -> CatalogResult<Option<SourceProduct>> {
        Ok(self
            .products
            .iter()
            .find(|p| p.trimmed_sku() == sku.trim())
            .cloned())
    }

    async fn resolve_media_order(&self, product_id: &str) -> MediaOrder {
        self.media
            .get(product_id)
            .cloned()
            .unwrap_or(MediaOrder::Unavailable)
    }
}

// ============================================================================
// Витрина
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeProduct {
    pub id: i64,
    pub title: String,
    pub description_html: String,
    pub product_type: Option<String>,
    pub variants: Vec<DestinationVariant>,
    pub media: Vec<MediaAsset>,
}

impl FakeProduct {
    pub fn gid(&self) -> String {
        product_gid(self.id)
    }

    pub fn variant_skus(&self) -> Vec<String> {
        let mut skus: Vec<String> = self
            .variants
            .iter()
            .filter_map(|v| v.trimmed_sku().map(str::to_string))
            .collect();
        skus.sort();
        skus
    }

    /// alt картинок в текущем порядке
    pub fn media_alts(&self) -> Vec<String> {
        self.media.iter().filter_map(|m| m.alt.clone()).collect()
    }
}

#[derive(Default)]
pub struct DestinationState {
    pub products: BTreeMap<String, FakeProduct>,
    pub on_hand: HashMap<String, i64>,
    pub location: Option<String>,
    /// Журнал мутаций: "<операция>:<gid>"
    pub calls: Vec<String>,
    pub fail_listing: bool,
    next_id: i64,
}

pub struct FakeDestination {
    pub state: Mutex<DestinationState>,
    /// Задержка чтения вариантов (для проверки таймаута товара)
    pub variants_delay: Duration,
}

impl Default for FakeDestination {
    fn default() -> Self {
        Self {
            state: Mutex::new(DestinationState {
                location: Some(LOCATION.to_string()),
                next_id: 1000,
                ..Default::default()
            }),
            variants_delay: Duration::ZERO,
        }
    }
}

impl FakeDestination {
    /// Добавить товар с вариантами `(sku, inventory item)` и картинками `(id, alt)`
    pub fn add_product(
        &self,
        id: i64,
        title: &str,
        variants: &[(&str, &str)],
        media: &[(&str, &str)],
    ) -> String {
        let product = FakeProduct {
            id,
            title: title.to_string(),
            variants: variants
                .iter()
                .map(|(sku, item)| DestinationVariant {
                    id: format!("gid://shopify/ProductVariant/{}", item),
                    sku: Some(sku.to_string()),
                    inventory_item_id: Some(format!("gid://shopify/InventoryItem/{}", item)),
                    price: Some("0.00".into()),
                })
                .collect(),
            media: media
                .iter()
                .map(|(media_id, alt)| MediaAsset {
                    id: media_id.to_string(),
                    source_url: Some(format!("https://cdn.shopify.com/s/files/{}.jpg", media_id)),
                    alt: Some(alt.to_string()),
                })
                .collect(),
            ..Default::default()
        };
        let gid = product.gid();
        self.state.lock().unwrap().products.insert(gid.clone(), product);
        gid
    }

    pub fn product(&self, gid: &str) -> FakeProduct {
        self.state.lock().unwrap().products[gid].clone()
    }

    pub fn products(&self) -> Vec<FakeProduct> {
        self.state.lock().unwrap().products.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Мутации указанного типа
    pub fn calls_of(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn on_hand(&self, inventory_item: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .on_hand
            .get(&format!("gid://shopify/InventoryItem/{}", inventory_item))
            .copied()
    }

    pub fn on_hand_by_sku(&self, sku: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state
            .products
            .values()
            .flat_map(|p| p.variants.iter())
            .find(|v| v.trimmed_sku() == Some(sku))
            .and_then(|v| v.inventory_item_id.as_ref())
            .and_then(|item| state.on_hand.get(item).copied())
    }

    fn log(state: &mut DestinationState, operation: &str, gid: &str) {
        state.calls.push(format!("{}:{}", operation, gid));
    }

    fn with_product<T>(
        &self,
        operation: &str,
        gid: &str,
        f: impl FnOnce(&mut FakeProduct, &mut i64) -> T,
    ) -> CatalogResult<T> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, operation, gid);
        let DestinationState { products, next_id, .. } = &mut *state;
        let product = products
            .get_mut(gid)
            .ok_or_else(|| CatalogError::RemoteApi(format!("Product {} not found", gid)))?;
        Ok(f(product, next_id))
    }
}

#[async_trait]
impl DestinationCatalog for FakeDestination {
    async fn fetch_all(&self, _sink: &dyn ProgressSink) -> CatalogResult<Vec<ListedProduct>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(CatalogError::Http {
                status: 401,
                body: "Invalid API key or access token".into(),
            });
        }
        Ok(state
            .products
            .values()
            .map(|p| ListedProduct {
                id: p.id,
                gid: p.gid(),
                title: p.title.clone(),
                variant_skus: p.variants.iter().filter_map(|v| v.sku.clone()).collect(),
            })
            .collect())
    }

    async fn product_variants(&self, product_gid: &str) -> CatalogResult<Vec<DestinationVariant>> {
        if !self.variants_delay.is_zero() {
            tokio::time::sleep(self.variants_delay).await;
        }
        let state = self.state.lock().unwrap();
        state
            .products
            .get(product_gid)
            .map(|p| p.variants.clone())
            .ok_or_else(|| CatalogError::RemoteApi(format!("Product {} not found", product_gid)))
    }

    async fn product_media(&self, product_gid: &str) -> CatalogResult<Vec<MediaAsset>> {
        let state = self.state.lock().unwrap();
        state
            .products
            .get(product_gid)
            .map(|p| p.media.clone())
            .ok_or_else(|| CatalogError::RemoteApi(format!("Product {} not found", product_gid)))
    }

    async fn update_product(
        &self,
        product_gid: &str,
        update: &ProductFieldsUpdate,
    ) -> CatalogResult<UserErrors> {
        self.with_product("update_product", product_gid, |product, _| {
            if let Some(title) = &update.title {
                product.title = title.clone();
            }
            if let Some(description) = &update.description_html {
                product.description_html = description.clone();
            }
            if let Some(product_type) = &update.product_type {
                product.product_type = Some(product_type.clone());
            }
            Vec::new()
        })
    }

    async fn create_product(&self, input: &ProductCreateInput) -> CatalogResult<ProductRef> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let product = FakeProduct {
            id,
            title: input.title.clone(),
            description_html: input.description_html.clone(),
            product_type: input.product_type.clone(),
            // Shopify создает вариант по умолчанию без SKU
            variants: vec![DestinationVariant {
                id: format!("gid://shopify/ProductVariant/default-{}", id),
                sku: None,
                inventory_item_id: Some(format!("gid://shopify/InventoryItem/default-{}", id)),
                price: Some("0.00".into()),
            }],
            media: Vec::new(),
        };
        let gid = product.gid();
        Self::log(&mut state, "create_product", &gid);
        state.products.insert(gid.clone(), product);
        Ok(ProductRef { id, gid })
    }

    async fn create_variants(
        &self,
        product_gid: &str,
        variants: &[NewVariant],
        replace_standalone: bool,
    ) -> CatalogResult<CreatedVariants> {
        self.with_product("create_variants", product_gid, |product, next_id| {
            if replace_standalone {
                product.variants.retain(|v| v.sku.is_some());
            }
            let created: Vec<DestinationVariant> = variants
                .iter()
                .map(|v| {
                    *next_id += 1;
                    DestinationVariant {
                        id: format!("gid://shopify/ProductVariant/{}", next_id),
                        sku: Some(v.sku.clone()),
                        inventory_item_id: Some(format!("gid://shopify/InventoryItem/{}", next_id)),
                        price: Some(format!("{:.2}", v.price)),
                    }
                })
                .collect();
            product.variants.extend(created.iter().cloned());
            CreatedVariants {
                variants: created,
                user_errors: Vec::new(),
            }
        })
    }

    async fn default_location(&self) -> CatalogResult<String> {
        self.state
            .lock()
            .unwrap()
            .location
            .clone()
            .ok_or_else(|| CatalogError::RemoteApi("No active inventory location".into()))
    }

    async fn activate_inventory(
        &self,
        inventory_item_ids: &[String],
        _location_id: &str,
    ) -> CatalogResult<UserErrors> {
        let mut state = self.state.lock().unwrap();
        for item in inventory_item_ids {
            Self::log(&mut state, "activate_inventory", item);
        }
        Ok(Vec::new())
    }

    async fn set_on_hand_quantities(
        &self,
        adjustments: &[InventoryAdjustment],
        location_id: &str,
    ) -> CatalogResult<UserErrors> {
        let mut state = self.state.lock().unwrap();
        Self::log(&mut state, "set_on_hand", location_id);
        for adjustment in adjustments {
            state
                .on_hand
                .insert(adjustment.inventory_item_id.clone(), adjustment.quantity);
        }
        Ok(Vec::new())
    }

    async fn reorder_options(
        &self,
        product_gid: &str,
        _options: &[OptionOrder],
    ) -> CatalogResult<UserErrors> {
        self.with_product("reorder_options", product_gid, |_, _| Vec::new())
    }

    async fn create_media(
        &self,
        product_gid: &str,
        media: &[NewMedia],
    ) -> CatalogResult<UserErrors> {
        self.with_product("create_media", product_gid, |product, next_id| {
            for item in media {
                *next_id += 1;
                product.media.push(MediaAsset {
                    id: format!("gid://shopify/MediaImage/{}", next_id),
                    source_url: Some(format!("https://cdn.shopify.com/s/files/{}.jpg", next_id)),
                    alt: Some(item.alt.clone()),
                });
            }
            Vec::new()
        })
    }

    async fn delete_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        self.with_product("delete_media", product_gid, |product, _| {
            product.media.retain(|m| !media_ids.contains(&m.id));
            Vec::new()
        })
    }

    async fn reorder_media(
        &self,
        product_gid: &str,
        media_ids: &[String],
    ) -> CatalogResult<UserErrors> {
        self.with_product("reorder_media", product_gid, |product, _| {
            let mut ordered: Vec<MediaAsset> = media_ids
                .iter()
                .filter_map(|id| product.media.iter().find(|m| &m.id == id).cloned())
                .collect();
            let rest: Vec<MediaAsset> = product
                .media
                .iter()
                .filter(|m| !media_ids.contains(&m.id))
                .cloned()
                .collect();
            ordered.extend(rest);
            product.media = ordered;
            Vec::new()
        })
    }
}

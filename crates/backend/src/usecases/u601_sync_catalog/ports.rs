use super::models::{
    CreatedVariants, DestinationVariant, InventoryAdjustment, ListedProduct, MediaAsset,
    MediaOrder, NewMedia, NewVariant, OptionOrder, ProductCreateInput, ProductFieldsUpdate,
    ProductRef, SourceProduct,
};
use super::progress_tracker::ProgressSink;
use crate::shared::errors::CatalogResult;
use async_trait::async_trait;

/// userErrors мутации в виде "field: message"
pub type UserErrors = Vec<String>;

/// Каталог-источник (Sentos)
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Все товары, постранично
    async fn fetch_all(&self, sink: &dyn ProgressSink) -> CatalogResult<Vec<SourceProduct>>;

    /// Один товар по SKU; `None`, если не найден
    async fn fetch_one(&self, sku: &str) -> CatalogResult<Option<SourceProduct>>;

    /// Порядок картинок товара
    async fn resolve_media_order(&self, product_id: &str) -> MediaOrder;
}

/// Витрина (Shopify): операции, которые нужны синхронизации
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Облегченный список всех товаров для индекса
    async fn fetch_all(&self, sink: &dyn ProgressSink) -> CatalogResult<Vec<ListedProduct>>;

    async fn product_variants(&self, product_gid: &str) -> CatalogResult<Vec<DestinationVariant>>;

    async fn product_media(&self, product_gid: &str) -> CatalogResult<Vec<MediaAsset>>;

    async fn update_product(
        &self,
        product_gid: &str,
        update: &ProductFieldsUpdate,
    ) -> CatalogResult<UserErrors>;

    /// Создать товар; userErrors без товара считаются ошибкой
    async fn create_product(&self, input: &ProductCreateInput) -> CatalogResult<ProductRef>;

    /// `replace_standalone`: заменить вариант по умолчанию, созданный вместе с товаром
    async fn create_variants(
        &self,
        product_gid: &str,
        variants: &[NewVariant],
        replace_standalone: bool,
    ) -> CatalogResult<CreatedVariants>;

    /// Первая активная локация склада
    async fn default_location(&self) -> CatalogResult<String>;

    async fn activate_inventory(
        &self,
        inventory_item_ids: &[String],
        location_id: &str,
    ) -> CatalogResult<UserErrors>;

    async fn set_on_hand_quantities(
        &self,
        adjustments: &[InventoryAdjustment],
        location_id: &str,
    ) -> CatalogResult<UserErrors>;

    async fn reorder_options(
        &self,
        product_gid: &str,
        options: &[OptionOrder],
    ) -> CatalogResult<UserErrors>;

    async fn create_media(
        &self,
        product_gid: &str,
        media: &[NewMedia],
    ) -> CatalogResult<UserErrors>;

    async fn delete_media(&self, product_gid: &str, media_ids: &[String])
        -> CatalogResult<UserErrors>;

    /// Переставить медиа в указанном порядке
    async fn reorder_media(&self, product_gid: &str, media_ids: &[String])
        -> CatalogResult<UserErrors>;
}

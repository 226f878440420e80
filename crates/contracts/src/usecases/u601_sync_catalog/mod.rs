pub mod progress;
pub mod request;
pub mod response;

pub use progress::{SyncProgress, SyncProgressUpdate, SyncStatus};
pub use request::{SentosCredentials, ShopifyCredentials, SyncRequest};
pub use response::{
    ProductSyncDetail, ProductSyncStatus, SingleSkuSyncResponse, SyncResult, SyncStats,
};

use crate::usecases::common::UseCaseMetadata;

pub struct SyncCatalog;

impl UseCaseMetadata for SyncCatalog {
    fn usecase_index() -> &'static str {
        "u601"
    }

    fn usecase_name() -> &'static str {
        "sync_catalog"
    }

    fn display_name() -> &'static str {
        "Синхронизация Sentos → Shopify"
    }

    fn description() -> &'static str {
        "Сопоставление товаров, обновление описаний, категорий, вариантов, остатков и картинок витрины"
    }
}

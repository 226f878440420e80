use super::models::{ProductRef, SourceProduct};
use super::processors::{category, create, details, media, variants, ProcessorContext};
use contracts::enums::{SyncConcern, SyncMode};
use contracts::usecases::u601_sync_catalog::{ProductSyncDetail, ProductSyncStatus};

fn detail(
    product: &SourceProduct,
    status: ProductSyncStatus,
    changes: Vec<String>,
    reason: Option<String>,
) -> ProductSyncDetail {
    ProductSyncDetail {
        sku: product.trimmed_sku().to_string(),
        name: product.trimmed_name().to_string(),
        status,
        changes,
        reason,
    }
}

/// Обработать один товар источника.
///
/// Товар без названия пропускается. Найденный товар: аспекты режима по
/// порядку; ошибка аспекта прерывает оставшиеся и помечает товар failed.
/// Ненайденный товар с SKU создается (режимы full и missing_only), иначе
/// пропускается.
pub async fn reconcile(
    ctx: &ProcessorContext<'_>,
    mode: SyncMode,
    product: &SourceProduct,
    matched: Option<&ProductRef>,
) -> ProductSyncDetail {
    if product.trimmed_name().is_empty() {
        return detail(
            product,
            ProductSyncStatus::Skipped,
            Vec::new(),
            Some("Название не задано".to_string()),
        );
    }

    let mut changes = Vec::new();

    let Some(target) = matched else {
        if !mode.creates_missing() {
            return detail(
                product,
                ProductSyncStatus::Skipped,
                changes,
                Some("Товар не найден на витрине".to_string()),
            );
        }
        // Без SKU товар не создается
        if product.trimmed_sku().is_empty() {
            return detail(
                product,
                ProductSyncStatus::Skipped,
                changes,
                Some("SKU не задан".to_string()),
            );
        }
        return match create::create_product(ctx, product, &mut changes).await {
            Ok(created) => {
                tracing::info!("Created {} as {}", product.trimmed_sku(), created.gid);
                detail(product, ProductSyncStatus::Created, changes, None)
            }
            Err(e) => {
                tracing::error!("Failed to create {}: {}", product.trimmed_sku(), e);
                detail(product, ProductSyncStatus::Failed, changes, Some(e.to_string()))
            }
        };
    };

    if !mode.updates_existing() {
        return detail(
            product,
            ProductSyncStatus::Skipped,
            changes,
            Some("Товар уже есть на витрине".to_string()),
        );
    }

    for concern in mode.concerns() {
        let result = match concern {
            SyncConcern::Details => details::sync_details(ctx, product, target, &mut changes).await,
            SyncConcern::Category => {
                category::sync_category(ctx, product, target, &mut changes).await
            }
            SyncConcern::VariantsAndStock => {
                variants::sync_variants_and_stock(ctx, product, target, &mut changes).await
            }
            SyncConcern::Media => media::sync_media(ctx, product, target, &mut changes).await,
        };
        if let Err(e) = result {
            tracing::error!(
                "Sync of {} failed at {:?}: {}",
                product.trimmed_sku(),
                concern,
                e
            );
            return detail(product, ProductSyncStatus::Failed, changes, Some(e.to_string()));
        }
    }

    detail(product, ProductSyncStatus::Updated, changes, None)
}

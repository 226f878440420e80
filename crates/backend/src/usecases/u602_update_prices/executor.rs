use super::bulk_operation::{BulkPriceOperation, BulkState};
use crate::shared::format::format_price;
use crate::shared::request_log::RequestLog;
use crate::usecases::u601_sync_catalog::progress_tracker::ProgressSink;
use crate::usecases::u601_sync_catalog::shopify_api_client::{ShopifyApiClient, VariantPriceInput};
use anyhow::Result;
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u601_sync_catalog::SyncProgressUpdate;
use contracts::usecases::u602_update_prices::{
    BulkPriceResult, PriceUpdate, PriceUpdateDetail, PriceUpdateRequest, PriceUpdateStatus,
    UpdatePrices,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executor для UseCase выгрузки цен
pub struct PriceUpdateExecutor {
    client: Arc<ShopifyApiClient>,
    poll_interval: Duration,
    max_wait: Duration,
}

/// Цена, привязанная к варианту витрины
struct ResolvedPrice {
    sku: String,
    product_id: String,
    input: VariantPriceInput,
}

impl PriceUpdateExecutor {
    pub fn new(client: Arc<ShopifyApiClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(30 * 60),
        }
    }

    pub fn from_request(request: &PriceUpdateRequest, request_log: bool) -> Result<Self> {
        let client = ShopifyApiClient::new(
            &request.shopify,
            RequestLog::in_log_dir(request_log, "shopify_api_requests.log"),
        )?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Выгрузить цены: bulk operation или поштучно (`use_fallback`)
    pub async fn execute(
        &self,
        updates: &[PriceUpdate],
        use_fallback: bool,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BulkPriceResult {
        tracing::info!(
            "{}: updating {} prices (fallback: {})",
            UpdatePrices::full_name(),
            updates.len(),
            use_fallback
        );
        sink.report(SyncProgressUpdate::step(0, "Поиск вариантов по SKU..."));

        let skus: Vec<String> = updates.iter().map(|u| u.sku.clone()).collect();
        let variant_map = self.client.resolve_variant_ids_by_sku(&skus).await;

        let mut resolved = Vec::new();
        let mut unmatched = 0;
        for update in updates {
            let sku = update.sku.trim();
            match variant_map.get(sku) {
                Some(variant) => resolved.push(ResolvedPrice {
                    sku: sku.to_string(),
                    product_id: variant.product_id.clone(),
                    input: VariantPriceInput {
                        variant_id: variant.variant_id.clone(),
                        price: update.price,
                        compare_at_price: update.compare_at_price,
                    },
                }),
                None => {
                    tracing::warn!("SKU '{}' not found in Shopify, price skipped", sku);
                    unmatched += 1;
                }
            }
        }

        let mut result = if resolved.is_empty() {
            BulkPriceResult::default()
        } else if use_fallback {
            self.update_individually(&resolved, sink).await
        } else {
            self.update_in_bulk(&resolved, sink, cancel).await
        };

        if unmatched > 0 {
            result.errors.push(format!("{} SKU не найдены в Shopify", unmatched));
        }
        sink.report(SyncProgressUpdate::step(
            100,
            format!("Цены обновлены: {}, ошибок: {}", result.success, result.failed),
        ));
        result
    }

    async fn update_in_bulk(
        &self,
        resolved: &[ResolvedPrice],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BulkPriceResult {
        let inputs: Vec<VariantPriceInput> = resolved.iter().map(|r| r.input.clone()).collect();
        let state = BulkPriceOperation::new(&self.client, &inputs)
            .with_polling(self.poll_interval, self.max_wait)
            .run(sink, cancel)
            .await;

        match state {
            BulkState::Completed(summary) => BulkPriceResult {
                success: summary.success,
                failed: summary.failed,
                unverified: summary.unverified,
                errors: summary.errors,
                details: Vec::new(),
            },
            BulkState::Failed(error) => BulkPriceResult::all_failed(resolved.len(), error),
            other => BulkPriceResult::all_failed(
                resolved.len(),
                format!("Bulk operation stopped in state {:?}", other),
            ),
        }
    }

    /// Поштучно: productVariantsBulkUpdate по товару, при ошибке REST по варианту
    async fn update_individually(
        &self,
        resolved: &[ResolvedPrice],
        sink: &dyn ProgressSink,
    ) -> BulkPriceResult {
        let mut by_product: BTreeMap<&str, Vec<&ResolvedPrice>> = BTreeMap::new();
        for price in resolved {
            by_product.entry(price.product_id.as_str()).or_default().push(price);
        }

        let mut result = BulkPriceResult::default();
        let total_products = by_product.len();
        for (i, (product_id, prices)) in by_product.into_iter().enumerate() {
            let inputs: Vec<VariantPriceInput> = prices.iter().map(|p| p.input.clone()).collect();
            let graphql_ok = match self.client.update_variant_prices(product_id, &inputs).await {
                Ok(errors) if errors.is_empty() => true,
                Ok(errors) => {
                    tracing::warn!(
                        "Price update for {} returned: {}",
                        product_id,
                        errors.join("; ")
                    );
                    false
                }
                Err(e) => {
                    tracing::warn!("Price update for {} failed: {}", product_id, e);
                    false
                }
            };

            for price in prices {
                let outcome = if graphql_ok {
                    Ok("GraphQL")
                } else {
                    self.client
                        .update_variant_price_rest(&price.input)
                        .await
                        .map(|_| "REST")
                };
                let (status, reason) = match outcome {
                    Ok(path) => {
                        result.success += 1;
                        (PriceUpdateStatus::Success, path.to_string())
                    }
                    Err(e) => {
                        result.failed += 1;
                        result.errors.push(format!("{}: {}", price.sku, e));
                        (PriceUpdateStatus::Failed, e.to_string())
                    }
                };
                result.details.push(PriceUpdateDetail {
                    status,
                    variant_id: price.input.variant_id.clone(),
                    sku: Some(price.sku.clone()),
                    price: format_price(price.input.price),
                    reason,
                });
            }

            let percent = (100 * (i + 1) / total_products.max(1)) as u8;
            sink.report(SyncProgressUpdate::step(
                percent.min(99),
                format!("Обновлено товаров: {}/{}", i + 1, total_products),
            ));
        }
        result
    }
}

use super::match_index::MatchIndex;
use super::models::{ProductRef, SourceProduct};
use super::ports::{DestinationCatalog, SourceCatalog};
use super::processors::{settle, ProcessorContext};
use super::progress_tracker::{LoggingSink, NoopSink, ProgressSink, ProgressTracker, ScaledSink};
use super::reconciler::reconcile;
use super::sentos_api_client::SentosApiClient;
use super::shopify_api_client::ShopifyApiClient;
use super::timings::{effective_workers, SyncTimings, TEST_MODE_LIMIT};
use crate::shared::errors::{CatalogError, CatalogResult};
use crate::shared::format::format_duration;
use crate::shared::request_log::RequestLog;
use anyhow::Result;
use contracts::enums::{SyncConcern, SyncMode};
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u601_sync_catalog::{
    ProductSyncDetail, ProductSyncStatus, SingleSkuSyncResponse, SyncCatalog, SyncProgress,
    SyncProgressUpdate, SyncRequest, SyncResult, SyncStats, SyncStatus,
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Параметры одного прогона
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub max_workers: usize,
    pub test_mode: bool,
    pub force_media_override: bool,
    pub vendor: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Full,
            max_workers: 2,
            test_mode: false,
            force_media_override: false,
            vendor: None,
        }
    }
}

impl From<&SyncRequest> for SyncOptions {
    fn from(request: &SyncRequest) -> Self {
        Self {
            mode: request.sync_mode,
            max_workers: request.max_workers,
            test_mode: request.test_mode,
            force_media_override: request.force_media_override,
            vendor: request.vendor.clone().filter(|v| !v.trim().is_empty()),
        }
    }
}

/// Запущенная в фоне синхронизация
pub struct SyncHandle {
    pub session_id: String,
    pub join: JoinHandle<Result<SyncResult>>,
}

/// Executor для UseCase синхронизации Sentos → Shopify
pub struct SyncExecutor {
    source: Arc<dyn SourceCatalog>,
    destination: Arc<dyn DestinationCatalog>,
    timings: SyncTimings,
    progress_tracker: ProgressTracker,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

impl SyncExecutor {
    pub fn new(
        source: Arc<dyn SourceCatalog>,
        destination: Arc<dyn DestinationCatalog>,
        timings: SyncTimings,
    ) -> Self {
        Self {
            source,
            destination,
            timings,
            progress_tracker: ProgressTracker::new(),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Собрать executor с реальными клиентами API
    pub fn from_request(
        request: &SyncRequest,
        timings: SyncTimings,
        request_log: bool,
    ) -> Result<Self> {
        let sentos = SentosApiClient::new(
            &request.sentos,
            RequestLog::in_log_dir(request_log, "sentos_api_requests.log"),
        )?;
        if !sentos.has_cookie() {
            tracing::warn!("Sentos cookie is not configured, image order will be unavailable");
        }
        let shopify = ShopifyApiClient::new(
            &request.shopify,
            RequestLog::in_log_dir(request_log, "shopify_api_requests.log"),
        )?;
        Ok(Self::new(Arc::new(sentos), Arc::new(shopify), timings))
    }

    pub fn progress_tracker(&self) -> &ProgressTracker {
        &self.progress_tracker
    }

    /// Запустить синхронизацию в фоне (создает сессию и возвращает её id)
    pub fn start_sync(self: &Arc<Self>, options: SyncOptions) -> SyncHandle {
        let session_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        self.progress_tracker.cleanup_old_sessions(chrono::Duration::hours(24));
        self.progress_tracker.create_session(session_id.clone());
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), token.clone());

        tracing::info!(
            "Starting {} session {} (mode: {}, workers: {})",
            SyncCatalog::full_name(),
            session_id,
            options.mode,
            options.max_workers
        );

        let executor = Arc::clone(self);
        let session = session_id.clone();
        let join = tokio::spawn(async move {
            let session_sink = executor.progress_tracker.sink(&session);
            let sink = |update: SyncProgressUpdate| {
                LoggingSink.report(update.clone());
                session_sink.report(update);
            };

            let outcome = executor.run(&options, &sink, &token).await;
            executor
                .cancellations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&session);

            match outcome {
                Ok(result) => {
                    let status = if result.cancelled {
                        SyncStatus::Cancelled
                    } else {
                        SyncStatus::Completed
                    };
                    executor.progress_tracker.complete_session(&session, status);
                    Ok(result)
                }
                Err(e) => {
                    tracing::error!("Sync session {} failed: {}", session, e);
                    executor
                        .progress_tracker
                        .add_error(&session, format!("Sync failed: {}", e));
                    executor
                        .progress_tracker
                        .complete_session(&session, SyncStatus::Failed);
                    Err(e.into())
                }
            }
        });

        SyncHandle { session_id, join }
    }

    /// Запросить остановку сессии. Товары в работе доделываются.
    pub fn cancel(&self, session_id: &str) -> bool {
        let cancellations = self
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match cancellations.get(session_id) {
            Some(token) => {
                tracing::info!("Cancellation requested for sync session {}", session_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.progress_tracker.get_progress(session_id)
    }

    fn context<'a>(&'a self, options: &'a SyncOptions) -> ProcessorContext<'a> {
        ProcessorContext {
            source: self.source.as_ref(),
            destination: self.destination.as_ref(),
            timings: &self.timings,
            alt_from_title: options.mode.sets_alt_text(),
            force_media_override: options.force_media_override,
            vendor: options.vendor.as_deref(),
        }
    }

    /// Полный прогон: кэш витрины, товары источника, параллельная обработка
    pub async fn run(
        &self,
        options: &SyncOptions,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CatalogResult<SyncResult> {
        let started = std::time::Instant::now();
        let mode = options.mode;

        // 1. Кэш витрины и индекс
        sink.report(SyncProgressUpdate::step(5, "Кэширование товаров Shopify..."));
        let listed = self
            .destination
            .fetch_all(sink)
            .await
            .map_err(|e| e.into_critical("Shopify product cache preload failed"))?;
        let index = MatchIndex::build(&listed);

        if cancel.is_cancelled() {
            return Ok(Self::finish(SyncStats::default(), Vec::new(), started, true));
        }

        // 2. Товары источника
        sink.report(SyncProgressUpdate::step(15, "Загрузка товаров Sentos..."));
        let mut products = self
            .source
            .fetch_all(&ScaledSink::new(sink, 15, 55))
            .await
            .map_err(|e| e.into_critical("Sentos product fetch failed"))?;

        if options.test_mode && products.len() > TEST_MODE_LIMIT {
            tracing::info!("Test mode: processing first {} products", TEST_MODE_LIMIT);
            products.truncate(TEST_MODE_LIMIT);
        }
        if mode == SyncMode::MissingOnly {
            products.retain(|p| index.find(p).is_none());
            tracing::info!("{} source products are missing in Shopify", products.len());
        }

        // 3. Локация склада нужна до параллельной обработки
        let needs_location =
            mode.creates_missing() || mode.concerns().contains(&SyncConcern::VariantsAndStock);
        if needs_location && !products.is_empty() {
            self.destination
                .default_location()
                .await
                .map_err(|e| e.into_critical("Inventory location bootstrap failed"))?;
        }

        // 4. Обработка пакетами
        let total = products.len();
        let workers = effective_workers(options.max_workers);
        let ctx = self.context(options);
        let mut stats = SyncStats {
            total,
            ..Default::default()
        };
        let mut details = Vec::with_capacity(total);

        sink.report(
            SyncProgressUpdate::step(55, format!("Обработка {} товаров...", total))
                .with_stats(stats.clone()),
        );
        tracing::info!("Processing {} products with {} workers", total, workers);

        for (batch_index, batch) in products.chunks(self.timings.batch_size.max(1)).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if batch_index > 0 {
                settle(self.timings.batch_pause).await;
            }

            let ctx = &ctx;
            let index = &index;
            let pending: Vec<_> = batch
                .iter()
                .map(|product| async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.process_one(ctx, mode, product, index.find(product)).await)
                })
                .collect();
            let mut results = stream::iter(pending).buffer_unordered(workers);

            // Единственный редьюсер статистики и журнала
            while let Some(outcome) = results.next().await {
                let Some(detail) = outcome else { continue };
                stats.record(detail.status);
                if detail.status == ProductSyncStatus::Failed {
                    tracing::warn!(
                        "Product {} failed: {}",
                        detail.sku,
                        detail.reason.as_deref().unwrap_or("unknown error")
                    );
                }

                let percent = 55 + (45 * stats.processed / total.max(1)) as u8;
                sink.report(
                    SyncProgressUpdate::step(
                        percent,
                        format!("Обработано: {}/{}", stats.processed, total),
                    )
                    .with_stats(stats.clone()),
                );
                sink.report(SyncProgressUpdate::log(log_detail_html(&detail)));
                details.push(detail);
            }
        }

        let cancelled = cancel.is_cancelled() && stats.processed < total;
        if cancelled {
            tracing::info!("Sync cancelled after {} of {} products", stats.processed, total);
        }
        let result = Self::finish(stats, details, started, cancelled);
        tracing::info!(
            "Sync finished in {}: created {}, updated {}, skipped {}, failed {}",
            result.duration,
            result.stats.created,
            result.stats.updated,
            result.stats.skipped,
            result.stats.failed
        );
        Ok(result)
    }

    /// Один товар с ограничением по времени
    async fn process_one(
        &self,
        ctx: &ProcessorContext<'_>,
        mode: SyncMode,
        product: &SourceProduct,
        matched: Option<&ProductRef>,
    ) -> ProductSyncDetail {
        let limit = self.timings.product_timeout;
        match tokio::time::timeout(limit, reconcile(ctx, mode, product, matched)).await {
            Ok(detail) => detail,
            Err(_) => ProductSyncDetail {
                sku: product.trimmed_sku().to_string(),
                name: product.trimmed_name().to_string(),
                status: ProductSyncStatus::Failed,
                changes: Vec::new(),
                reason: Some(format!(
                    "Превышено время обработки товара ({} с)",
                    limit.as_secs()
                )),
            },
        }
    }

    fn finish(
        stats: SyncStats,
        details: Vec<ProductSyncDetail>,
        started: std::time::Instant,
        cancelled: bool,
    ) -> SyncResult {
        SyncResult {
            stats,
            details,
            duration: format_duration(started.elapsed()),
            cancelled,
        }
    }

    /// Синхронизировать один товар по SKU (полное обновление)
    pub async fn sync_single_sku(&self, sku: &str) -> SingleSkuSyncResponse {
        match self.try_sync_single_sku(sku).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Single SKU sync for '{}' failed: {}", sku, e);
                SingleSkuSyncResponse::failed(e.to_string())
            }
        }
    }

    async fn try_sync_single_sku(&self, sku: &str) -> CatalogResult<SingleSkuSyncResponse> {
        let sku = sku.trim();
        let Some(product) = self.source.fetch_one(sku).await? else {
            return Ok(SingleSkuSyncResponse::failed(format!(
                "Товар с SKU '{}' не найден в Sentos",
                sku
            )));
        };

        let listed = self.destination.fetch_all(&NoopSink).await?;
        let index = MatchIndex::build(&listed);
        let Some(target) = index.find(&product) else {
            return Ok(SingleSkuSyncResponse::failed(format!(
                "Товар '{}' не найден в Shopify",
                product.trimmed_name()
            )));
        };

        let options = SyncOptions::default();
        let ctx = self.context(&options);
        let detail = reconcile(&ctx, SyncMode::Full, &product, Some(target)).await;
        if detail.status == ProductSyncStatus::Failed {
            return Err(CatalogError::RemoteApi(
                detail.reason.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(SingleSkuSyncResponse {
            success: true,
            product_name: Some(detail.name),
            changes: detail.changes,
            message: None,
        })
    }
}

/// HTML-фрагмент журнала по одному товару
fn log_detail_html(detail: &ProductSyncDetail) -> String {
    let (color, label) = match detail.status {
        ProductSyncStatus::Created => ("#1e8e3e", "Создан"),
        ProductSyncStatus::Updated => ("#1a73e8", "Обновлен"),
        ProductSyncStatus::Skipped => ("#80868b", "Пропущен"),
        ProductSyncStatus::Failed => ("#d93025", "Ошибка"),
    };
    let mut html = format!(
        "<div style='border-bottom:1px solid #eee;padding:4px 0'><strong style='color:{}'>{}</strong> {} <small>({})</small>",
        color,
        label,
        ammonia::clean_text(&detail.name),
        ammonia::clean_text(&detail.sku)
    );
    if !detail.changes.is_empty() {
        html.push_str("<ul style='margin:2px 0 0 16px'>");
        for change in &detail.changes {
            html.push_str(&format!("<li>{}</li>", ammonia::clean_text(change)));
        }
        html.push_str("</ul>");
    }
    if let Some(reason) = &detail.reason {
        html.push_str(&format!(
            "<div style='color:{}'>{}</div>",
            color,
            ammonia::clean_text(reason)
        ));
    }
    html.push_str("</div>");
    html
}

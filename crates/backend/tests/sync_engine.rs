//! Прогоны движка синхронизации на in-memory каталогах.

mod common;

use backend::shared::errors::CatalogError;
use backend::usecases::u601_sync_catalog::models::MediaOrder;
use backend::usecases::u601_sync_catalog::progress_tracker::NoopSink;
use backend::usecases::u601_sync_catalog::timings::SyncTimings;
use backend::usecases::u601_sync_catalog::{SyncExecutor, SyncOptions};
use common::{source_product, FakeDestination, FakeSource};
use contracts::enums::SyncMode;
use contracts::usecases::u601_sync_catalog::{
    ProductSyncStatus, SyncProgressUpdate, SyncResult, SyncStatus,
};
use maplit::hashset;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const U1: &str = "https://img.sentos.com.tr/a-1/1.jpg";
const U2: &str = "https://img.sentos.com.tr/a-1/2.jpg";
const U3: &str = "https://img.sentos.com.tr/a-1/3.jpg";
const U4: &str = "https://img.sentos.com.tr/a-1/4.jpg";

/// Товар "A" с вариантами A-1-RED-S (остаток 5) и A-1-RED-M (0)
fn product_a() -> serde_json::Value {
    json!({
        "id": 1,
        "sku": "A-1",
        "name": "A",
        "description_detail": "<p>Хлопок</p>",
        "category": {"id": 7, "name": "Tişört"},
        "prices": {"shopify": {"sale_price": "149,90"}},
        "variants": [
            {"sku": "A-1-RED-S", "color": "Red", "model": {"value": "S"}, "stocks": [{"stock": 5}]},
            {"sku": "A-1-RED-M", "color": "Red", "model": {"value": "M"}, "stocks": [{"stock": 0}, null]}
        ]
    })
}

fn mode(mode: SyncMode) -> SyncOptions {
    SyncOptions {
        mode,
        ..Default::default()
    }
}

fn executor(source: FakeSource, destination: &Arc<FakeDestination>) -> SyncExecutor {
    executor_with(source, destination, SyncTimings::immediate())
}

fn executor_with(
    source: FakeSource,
    destination: &Arc<FakeDestination>,
    timings: SyncTimings,
) -> SyncExecutor {
    SyncExecutor::new(Arc::new(source), destination.clone(), timings)
}

async fn run(executor: &SyncExecutor, options: SyncOptions) -> SyncResult {
    executor
        .run(&options, &NoopSink, &CancellationToken::new())
        .await
        .expect("sync run")
}

fn skus(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_missing_variant_is_created_and_stock_set() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let result = run(&executor, mode(SyncMode::StockAndVariantsOnly)).await;

    assert_eq!(result.stats.total, 1);
    assert_eq!(result.stats.updated, 1);
    assert_eq!(result.stats.failed, 0);
    assert_eq!(
        destination.product(&gid).variant_skus(),
        skus(&["A-1-RED-M", "A-1-RED-S"])
    );
    assert_eq!(destination.on_hand_by_sku("A-1-RED-S"), Some(5));
    assert_eq!(destination.on_hand_by_sku("A-1-RED-M"), Some(0));
    assert_eq!(destination.calls_of("create_variants"), 1);
    assert_eq!(destination.calls_of("update_product"), 0);

    let detail = &result.details[0];
    assert!(detail.changes.iter().any(|c| c == "Добавлено вариантов: 1"));
}

#[tokio::test]
async fn test_media_follow_source_order() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(
        10,
        "A",
        &[("A-1-RED-S", "11")],
        &[("m1", U1), ("m2", U2), ("m3", U3)],
    );
    let source = FakeSource::new(vec![source_product(product_a())])
        .with_media("1", MediaOrder::List(skus(&[U2, U3, U4])));
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::ImagesOnly)).await;

    assert_eq!(result.stats.updated, 1);
    let product = destination.product(&gid);
    assert_eq!(product.media_alts(), skus(&[U2, U3, U4]));
    assert!(!product.media.iter().any(|m| m.id == "m1"));
    assert_eq!(destination.calls_of("create_media"), 1);
    assert_eq!(destination.calls_of("delete_media"), 1);
    assert_eq!(destination.calls_of("reorder_media"), 1);
}

#[tokio::test]
async fn test_unavailable_media_order_keeps_storefront_media() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[("m1", U1), ("m2", U2)]);
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let result = run(&executor, mode(SyncMode::ImagesOnly)).await;

    assert_eq!(result.stats.updated, 1);
    assert_eq!(destination.product(&gid).media_alts(), skus(&[U1, U2]));
    assert_eq!(destination.calls_of("create_media"), 0);
    assert_eq!(destination.calls_of("delete_media"), 0);
    assert_eq!(destination.calls_of("reorder_media"), 0);
    assert!(result.details[0]
        .changes
        .iter()
        .any(|c| c.starts_with("Картинки пропущены")));
}

#[tokio::test]
async fn test_force_override_clears_media_when_order_unavailable() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[("m1", U1), ("m2", U2)]);
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let options = SyncOptions {
        mode: SyncMode::ImagesOnly,
        force_media_override: true,
        ..Default::default()
    };
    run(&executor, options).await;

    assert!(destination.product(&gid).media.is_empty());
}

#[tokio::test]
async fn test_confirmed_empty_order_removes_all_media() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[("m1", U1)]);
    let source =
        FakeSource::new(vec![source_product(product_a())]).with_media("1", MediaOrder::Empty);
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::ImagesOnly)).await;

    assert!(destination.product(&gid).media.is_empty());
    assert!(result.details[0].changes.iter().any(|c| c == "Удалено картинок: 1"));
}

#[tokio::test]
async fn test_details_mode_touches_only_product_fields() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[("m1", U1)]);
    let source = FakeSource::new(vec![source_product(product_a())])
        .with_media("1", MediaOrder::List(skus(&[U2])));
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::DetailsOnly)).await;

    assert_eq!(result.stats.updated, 1);
    let calls = destination.calls();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|c| c.starts_with("update_product:")), "{:?}", calls);

    let product = destination.product(&gid);
    assert_eq!(product.description_html, "<p>Хлопок</p>");
    assert_eq!(product.product_type, None);
    assert_eq!(product.variant_skus(), skus(&["A-1-RED-S"]));
    assert_eq!(product.media_alts(), skus(&[U1]));
}

#[tokio::test]
async fn test_category_mode_sets_product_type() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    run(&executor, mode(SyncMode::CategoryOnly)).await;

    assert_eq!(destination.product(&gid).product_type.as_deref(), Some("Tişört"));
    assert_eq!(destination.calls_of("create_variants"), 0);
}

#[tokio::test]
async fn test_second_full_run_changes_nothing_structural() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[("m1", U1)]);
    let source = FakeSource::new(vec![source_product(product_a())])
        .with_media("1", MediaOrder::List(skus(&[U2, U3])));
    let executor = executor(source, &destination);

    run(&executor, mode(SyncMode::Full)).await;
    let after_first = destination.product(&gid);
    let calls_before = destination.calls().len();

    let second = run(&executor, mode(SyncMode::Full)).await;
    let structural: Vec<String> = destination.calls()[calls_before..]
        .iter()
        .filter(|c| {
            [
                "create_product:",
                "create_variants:",
                "create_media:",
                "delete_media:",
                "reorder_media:",
            ]
            .iter()
            .any(|prefix| c.starts_with(prefix))
        })
        .cloned()
        .collect();

    assert!(structural.is_empty(), "{:?}", structural);
    assert_eq!(second.stats.updated, 1);
    let after_second = destination.product(&gid);
    assert_eq!(after_second.variant_skus(), after_first.variant_skus());
    assert_eq!(after_second.media_alts(), skus(&[U2, U3]));
    assert!(second.details[0].changes.iter().any(|c| c == "Картинки без изменений"));
}

#[tokio::test]
async fn test_unmatched_product_is_created_with_all_variants() {
    let destination = Arc::new(FakeDestination::default());
    let source = FakeSource::new(vec![source_product(product_a())])
        .with_media("1", MediaOrder::List(skus(&[U1, U2])));
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::Full)).await;

    assert_eq!(result.stats.created, 1);
    assert_eq!(result.details[0].status, ProductSyncStatus::Created);
    let products = destination.products();
    assert_eq!(products.len(), 1);
    let created = &products[0];
    assert_eq!(created.title, "A");
    assert_eq!(created.variant_skus(), skus(&["A-1-RED-M", "A-1-RED-S"]));
    assert!(created.variants.iter().all(|v| v.price.as_deref() == Some("149.90")));
    assert_eq!(created.media_alts(), skus(&[U1, U2]));
    assert_eq!(destination.on_hand_by_sku("A-1-RED-S"), Some(5));
    assert_eq!(destination.on_hand_by_sku("A-1-RED-M"), Some(0));
}

#[tokio::test]
async fn test_update_modes_skip_unmatched_products() {
    let destination = Arc::new(FakeDestination::default());
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let result = run(&executor, mode(SyncMode::DetailsOnly)).await;

    assert_eq!(result.stats.skipped, 1);
    assert!(destination.products().is_empty());
    assert_eq!(
        result.details[0].reason.as_deref(),
        Some("Товар не найден на витрине")
    );
}

#[tokio::test]
async fn test_missing_only_leaves_existing_products_alone() {
    let destination = Arc::new(FakeDestination::default());
    let existing = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let product_b = json!({
        "id": 2,
        "sku": "B-1",
        "name": "B",
        "sale_price": 99,
        "stocks": [{"stock": 3}]
    });
    let source = FakeSource::new(vec![source_product(product_a()), source_product(product_b)]);
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::MissingOnly)).await;

    assert_eq!(result.stats.total, 1);
    assert_eq!(result.stats.created, 1);
    assert_eq!(destination.products().len(), 2);
    let touched: HashSet<String> = destination
        .calls()
        .iter()
        .filter_map(|c| c.split_once(':').map(|(_, target)| target.to_string()))
        .collect();
    assert!(!touched.contains(&existing));

    let created = destination
        .products()
        .into_iter()
        .find(|p| p.title == "B")
        .expect("product B created");
    assert_eq!(created.variant_skus(), skus(&["B-1"]));
    assert_eq!(destination.on_hand_by_sku("B-1"), Some(3));
}

#[tokio::test]
async fn test_product_without_sku_matches_by_title() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "Ceket", &[("C-1", "11")], &[]);
    let source = FakeSource::new(vec![source_product(json!({
        "id": 5,
        "sku": "",
        "name": " Ceket ",
        "description_detail": "<p>Yün</p>"
    }))]);
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::DetailsOnly)).await;

    assert_eq!(result.stats.updated, 1);
    assert_eq!(result.stats.skipped, 0);
    assert_eq!(destination.calls_of("update_product"), 1);
    assert_eq!(destination.product(&gid).description_html, "<p>Yün</p>");
}

#[tokio::test]
async fn test_unmatched_product_without_sku_is_not_created() {
    let destination = Arc::new(FakeDestination::default());
    let source = FakeSource::new(vec![source_product(json!({
        "id": 5,
        "sku": "  ",
        "name": "Без SKU"
    }))]);
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::Full)).await;

    assert_eq!(result.stats.skipped, 1);
    assert_eq!(result.details[0].reason.as_deref(), Some("SKU не задан"));
    assert_eq!(destination.calls_of("create_product"), 0);
}

#[tokio::test]
async fn test_product_without_name_is_skipped() {
    let destination = Arc::new(FakeDestination::default());
    let source = FakeSource::new(vec![source_product(json!({
        "id": 6,
        "sku": "N-1",
        "name": "  "
    }))]);
    let executor = executor(source, &destination);

    let result = run(&executor, mode(SyncMode::Full)).await;

    assert_eq!(result.stats.skipped, 1);
    assert_eq!(result.details[0].reason.as_deref(), Some("Название не задано"));
    assert!(destination.calls().is_empty());
    assert!(destination.products().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_before_next_batch() {
    let destination = Arc::new(FakeDestination::default());
    let products = (1..=5)
        .map(|i| {
            source_product(json!({"id": i, "sku": format!("S-{}", i), "name": format!("P{}", i)}))
        })
        .collect();
    let timings = SyncTimings {
        batch_size: 1,
        ..SyncTimings::immediate()
    };
    let executor = executor_with(FakeSource::new(products), &destination, timings);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let sink = move |update: SyncProgressUpdate| {
        if update.stats.as_ref().is_some_and(|s| s.processed >= 2) {
            trigger.cancel();
        }
    };
    let options = SyncOptions {
        mode: SyncMode::DetailsOnly,
        max_workers: 1,
        ..Default::default()
    };
    let result = executor.run(&options, &sink, &cancel).await.expect("sync run");

    assert!(result.cancelled);
    assert_eq!(result.stats.total, 5);
    assert_eq!(result.stats.processed, 2);
    assert_eq!(result.details.len(), 2);
}

#[tokio::test]
async fn test_cache_failure_aborts_run() {
    let destination = Arc::new(FakeDestination::default());
    destination.state.lock().unwrap().fail_listing = true;
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let err = executor
        .run(&mode(SyncMode::Full), &NoopSink, &CancellationToken::new())
        .await
        .expect_err("cache failure is critical");

    assert!(matches!(err, CatalogError::Critical(_)), "{:?}", err);
    assert!(destination.calls().is_empty());
}

#[tokio::test]
async fn test_missing_location_aborts_stock_run() {
    let destination = Arc::new(FakeDestination::default());
    destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    destination.state.lock().unwrap().location = None;
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let err = executor
        .run(&mode(SyncMode::StockAndVariantsOnly), &NoopSink, &CancellationToken::new())
        .await
        .expect_err("location bootstrap is critical");

    assert!(matches!(err, CatalogError::Critical(_)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_product_fails_with_timeout() {
    let destination = Arc::new(FakeDestination {
        variants_delay: Duration::from_secs(120),
        ..Default::default()
    });
    destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let timings = SyncTimings {
        product_timeout: Duration::from_secs(60),
        ..SyncTimings::immediate()
    };
    let source = FakeSource::new(vec![source_product(product_a())]);
    let executor = executor_with(source, &destination, timings);

    let result = run(&executor, mode(SyncMode::StockAndVariantsOnly)).await;

    assert_eq!(result.stats.failed, 1);
    let reason = result.details[0].reason.as_deref().unwrap_or_default();
    assert!(reason.contains("Превышено время"), "{}", reason);
}

#[tokio::test]
async fn test_sessions_complete_with_final_status() {
    let destination = Arc::new(FakeDestination::default());
    destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let executor = Arc::new(executor(
        FakeSource::new(vec![
            source_product(product_a()),
            source_product(json!({"id": 2, "sku": "B-1", "name": "B"})),
        ]),
        &destination,
    ));

    let handle = executor.start_sync(mode(SyncMode::DetailsOnly));
    let session_id = handle.session_id.clone();
    let result = handle.join.await.expect("join").expect("sync");

    assert_eq!(result.stats.processed, 2);
    assert_eq!(result.stats.updated, 1);
    assert_eq!(result.stats.skipped, 1);
    let progress = executor.get_progress(&session_id).expect("session exists");
    assert_eq!(progress.status, SyncStatus::Completed);
    assert_eq!(progress.progress, 100);
    assert!(!progress.log_details.is_empty());
    assert!(!executor.cancel("unknown-session"));
}

#[tokio::test]
async fn test_single_sku_sync() {
    let destination = Arc::new(FakeDestination::default());
    let gid = destination.add_product(10, "A", &[("A-1-RED-S", "11")], &[]);
    let executor = executor(FakeSource::new(vec![source_product(product_a())]), &destination);

    let response = executor.sync_single_sku(" A-1 ").await;
    assert!(response.success, "{:?}", response.message);
    assert_eq!(response.product_name.as_deref(), Some("A"));
    assert!(!response.changes.is_empty());
    assert_eq!(destination.product(&gid).variant_skus().len(), 2);

    let missing = executor.sync_single_sku("NOPE").await;
    assert!(!missing.success);
    assert!(missing.message.unwrap_or_default().contains("не найден в Sentos"));
}

#[tokio::test]
async fn test_mode_flags() {
    let creating: HashSet<SyncMode> = SyncMode::all()
        .iter()
        .copied()
        .filter(|m| m.creates_missing())
        .collect();
    assert_eq!(creating, hashset! {SyncMode::Full, SyncMode::MissingOnly});
}

//! catalog-sync: синхронизация каталога Sentos → Shopify из командной строки.
//!
//! Команды:
//! - `sync` - полный прогон (или выбранный режим)
//! - `sync-missing` - только создать отсутствующие товары
//! - `sync-sku` - обновить один товар по SKU
//! - `update-prices` - выгрузить цены из JSON-файла
//! - `test-connection` - проверить доступ к обоим API

use anyhow::{Context, Result};
use backend::shared::catalogs::test_catalog_connection;
use backend::shared::config::{load_config, Config};
use backend::shared::format::format_number;
use backend::system;
use backend::usecases::u601_sync_catalog::progress_tracker::LoggingSink;
use backend::usecases::u601_sync_catalog::timings::SyncTimings;
use backend::usecases::u601_sync_catalog::{SyncExecutor, SyncOptions};
use backend::usecases::u602_update_prices::PriceUpdateExecutor;
use clap::{Args, Parser, Subcommand};
use contracts::enums::{CatalogSystem, SyncMode};
use contracts::usecases::u601_sync_catalog::{ProductSyncStatus, SyncRequest, SyncResult};
use contracts::usecases::u602_update_prices::{PriceUpdate, PriceUpdateRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Синхронизация каталога Sentos → Shopify
#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Синхронизировать каталог
    Sync(SyncArgs),

    /// Создать на витрине товары, которых там нет
    SyncMissing(RunArgs),

    /// Обновить один товар по SKU
    SyncSku {
        sku: String,
    },

    /// Выгрузить цены из JSON-файла `[{"sku", "price", "compare_at_price"?}]`
    UpdatePrices {
        file: PathBuf,

        /// Обновлять по товарам вместо bulk operation
        #[arg(long)]
        fallback: bool,
    },

    /// Проверить подключение к Sentos и Shopify
    TestConnection,
}

#[derive(Args)]
struct SyncArgs {
    /// full, details_only, category_only, stock_and_variants_only,
    /// images_only, images_with_alt_text, missing_only
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<SyncMode>,

    #[command(flatten)]
    run: RunArgs,

    /// Удалять картинки витрины, даже если порядок картинок Sentos недоступен
    #[arg(long)]
    force_media: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Число параллельных воркеров (не больше 10)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Обработать только первые 20 товаров
    #[arg(long)]
    test_mode: bool,
}

fn parse_mode(value: &str) -> Result<SyncMode, String> {
    SyncMode::from_code(value).ok_or_else(|| {
        let known: Vec<&str> = SyncMode::all().iter().map(|m| m.code()).collect();
        format!("unknown mode '{}', expected one of: {}", value, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    system::tracing::initialize()?;
    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Sync(args) => {
            let mode = args.mode.unwrap_or(config.sync.mode);
            run_sync(&config, mode, &args.run, args.force_media).await
        }
        Commands::SyncMissing(args) => run_sync(&config, SyncMode::MissingOnly, &args, false).await,
        Commands::SyncSku { sku } => run_single_sku(&config, &sku).await,
        Commands::UpdatePrices { file, fallback } => {
            run_update_prices(&config, &file, fallback).await
        }
        Commands::TestConnection => run_test_connection(&config).await,
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn sync_request(config: &Config, mode: SyncMode, args: &RunArgs, force_media: bool) -> SyncRequest {
    let mut request = SyncRequest::new(
        config.shopify_credentials(),
        config.sentos_credentials(),
        mode,
    );
    request.max_workers = args.workers.unwrap_or(config.sync.max_workers);
    request.test_mode = args.test_mode || config.sync.test_mode;
    request.force_media_override = force_media;
    request.vendor = config.shopify.vendor.clone();
    request
}

/// Ctrl+C отменяет токен; текущие товары доделываются
fn cancel_on_ctrl_c(on_cancel: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, finishing products in progress...");
            on_cancel();
        }
    });
}

async fn run_sync(
    config: &Config,
    mode: SyncMode,
    args: &RunArgs,
    force_media: bool,
) -> Result<()> {
    let request = sync_request(config, mode, args, force_media);
    let executor = Arc::new(SyncExecutor::from_request(
        &request,
        SyncTimings::from_config(&config.sync),
        config.logging.request_log,
    )?);

    let handle = executor.start_sync(SyncOptions::from(&request));
    let canceller = Arc::clone(&executor);
    let session_id = handle.session_id.clone();
    cancel_on_ctrl_c(move || {
        canceller.cancel(&session_id);
    });

    let result = handle.join.await.context("Sync task panicked")??;
    print_summary(&result);
    Ok(())
}

fn print_summary(result: &SyncResult) {
    let stats = &result.stats;
    println!();
    println!(
        "{} за {}",
        if result.cancelled { "Синхронизация остановлена" } else { "Синхронизация завершена" },
        result.duration
    );
    println!("  Всего:      {}", format_number(stats.total));
    println!("  Создано:    {}", format_number(stats.created));
    println!("  Обновлено:  {}", format_number(stats.updated));
    println!("  Пропущено:  {}", format_number(stats.skipped));
    println!("  Ошибок:     {}", format_number(stats.failed));

    let failed: Vec<_> = result
        .details
        .iter()
        .filter(|d| d.status == ProductSyncStatus::Failed)
        .collect();
    if !failed.is_empty() {
        println!();
        println!("Товары с ошибками:");
        for detail in failed {
            println!(
                "  {} ({}): {}",
                detail.sku,
                detail.name,
                detail.reason.as_deref().unwrap_or("-")
            );
        }
    }
}

async fn run_single_sku(config: &Config, sku: &str) -> Result<()> {
    let args = RunArgs {
        workers: None,
        test_mode: false,
    };
    let request = sync_request(config, SyncMode::Full, &args, false);
    let executor = SyncExecutor::from_request(
        &request,
        SyncTimings::from_config(&config.sync),
        config.logging.request_log,
    )?;

    let response = executor.sync_single_sku(sku).await;
    if !response.success {
        anyhow::bail!(
            "{}",
            response.message.unwrap_or_else(|| format!("Sync of SKU '{}' failed", sku))
        );
    }
    println!("✓ {}", response.product_name.as_deref().unwrap_or(sku));
    for change in &response.changes {
        println!("  - {}", change);
    }
    Ok(())
}

async fn run_update_prices(config: &Config, file: &std::path::Path, fallback: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read price file {}", file.display()))?;
    let updates: Vec<PriceUpdate> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse price file {}", file.display()))?;

    let request = PriceUpdateRequest {
        shopify: config.shopify_credentials(),
        updates,
        use_fallback: fallback,
    };
    let executor = PriceUpdateExecutor::from_request(&request, config.logging.request_log)?;

    let token = CancellationToken::new();
    let canceller = token.clone();
    cancel_on_ctrl_c(move || canceller.cancel());

    let result = executor
        .execute(&request.updates, request.use_fallback, &LoggingSink, &token)
        .await;
    println!(
        "Цены: успешно {}, ошибок {}",
        format_number(result.success),
        format_number(result.failed)
    );
    if result.unverified > 0 {
        println!(
            "  Без подтверждения: {}",
            format_number(result.unverified)
        );
    }
    for error in result.errors.iter().take(20) {
        println!("  - {}", error);
    }
    if result.success == 0 && result.failed > 0 {
        anyhow::bail!("No prices were updated");
    }
    Ok(())
}

async fn run_test_connection(config: &Config) -> Result<()> {
    let shopify = config.shopify_credentials();
    let sentos = config.sentos_credentials();
    let mut all_ok = true;

    for system in CatalogSystem::all() {
        let result = test_catalog_connection(system, &shopify, &sentos).await;
        let mark = if result.success { "✓" } else { "✗" };
        println!("{} {}: {}", mark, system.display_name(), result.message);
        if let Some(details) = result.details {
            println!("    {}", details);
        }
        all_ok &= result.success;
    }

    if !all_ok {
        anyhow::bail!("Connection test failed");
    }
    Ok(())
}

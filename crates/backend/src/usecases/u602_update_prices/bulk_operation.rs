use crate::shared::errors::{CatalogError, CatalogResult};
use crate::shared::format::format_price;
use crate::usecases::u601_sync_catalog::progress_tracker::ProgressSink;
use crate::usecases::u601_sync_catalog::shopify_api_client::{ShopifyApiClient, VariantPriceInput};
use contracts::usecases::u601_sync_catalog::SyncProgressUpdate;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const VARIABLES_FILENAME: &str = "bulk_op_vars.jsonl";

/// Мутация, которую bulk operation выполняет для каждой строки JSONL
pub const PRICE_MUTATION_TEMPLATE: &str = "mutation call($input: ProductVariantInput!) { productVariantUpdate(input: $input) { productVariant { id price } userErrors { field message } } }";

/// Состояние bulk operation
#[derive(Debug, Clone, PartialEq)]
pub enum BulkState {
    /// JSONL собран, ничего не отправлено
    Prepared { payload: String, rows: usize },
    /// Файл загружен
    Staged { staged_path: String, rows: usize },
    Running { operation_id: String, rows: usize },
    Completed(BulkSummary),
    Failed(String),
}

impl BulkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BulkState::Completed(_) | BulkState::Failed(_))
    }
}

/// Итог по файлу результата
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub success: usize,
    pub failed: usize,
    /// Строки без файла результата: Shopify не сообщил их исход
    pub unverified: usize,
    pub errors: Vec<String>,
}

/// Одна строка JSONL на вариант
pub fn build_jsonl(prices: &[VariantPriceInput]) -> String {
    prices
        .iter()
        .map(|p| {
            let mut input = json!({ "id": p.variant_id, "price": format_price(p.price) });
            if let Some(compare_at) = p.compare_at_price {
                input["compareAtPrice"] = json!(format_price(compare_at));
            }
            json!({ "input": input }).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Разобрать JSONL результата: строка с userErrors или errors считается неуспешной
pub fn summarize_results(jsonl: &str) -> BulkSummary {
    let mut summary = BulkSummary::default();
    for line in jsonl.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(row) = serde_json::from_str::<Value>(line) else {
            summary.failed += 1;
            summary.errors.push(format!("Unreadable result line: {}", line));
            continue;
        };

        let mut messages: Vec<String> = row
            .pointer("/data/productVariantUpdate/userErrors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(errors) = row.get("errors").and_then(Value::as_array) {
            messages.extend(
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string),
            );
        }

        if messages.is_empty() {
            summary.success += 1;
        } else {
            summary.failed += 1;
            summary.errors.push(messages.join("; "));
        }
    }
    summary
}

/// Bulk operation обновления цен: Prepared → Staged → Running → Completed | Failed
pub struct BulkPriceOperation<'a> {
    client: &'a ShopifyApiClient,
    state: BulkState,
    poll_interval: Duration,
    max_wait: Duration,
}

impl<'a> BulkPriceOperation<'a> {
    pub fn new(client: &'a ShopifyApiClient, prices: &[VariantPriceInput]) -> Self {
        Self {
            client,
            state: BulkState::Prepared {
                payload: build_jsonl(prices),
                rows: prices.len(),
            },
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Довести операцию до конечного состояния
    pub async fn run(
        mut self,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BulkState {
        while !self.state.is_terminal() {
            if let Err(e) = self.advance(sink, cancel).await {
                tracing::error!("Bulk price operation failed: {}", e);
                self.state = BulkState::Failed(e.to_string());
            }
        }
        self.state
    }

    /// Один переход состояния
    async fn advance(
        &mut self,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CatalogResult<()> {
        let next = match &self.state {
            BulkState::Prepared { payload, rows } => {
                sink.report(SyncProgressUpdate::step(10, "Загрузка файла цен в Shopify..."));
                let target = self.client.create_staged_upload(VARIABLES_FILENAME).await?;
                let staged_path = self
                    .client
                    .upload_staged_file(&target, VARIABLES_FILENAME, payload.as_bytes())
                    .await?;
                tracing::info!("Staged {} price rows at {}", rows, staged_path);
                BulkState::Staged {
                    staged_path,
                    rows: *rows,
                }
            }
            BulkState::Staged { staged_path, rows } => {
                sink.report(SyncProgressUpdate::step(20, "Запуск bulk operation..."));
                let operation_id = self
                    .client
                    .run_bulk_mutation(PRICE_MUTATION_TEMPLATE, staged_path)
                    .await?;
                tracing::info!("Bulk operation {} started", operation_id);
                BulkState::Running {
                    operation_id,
                    rows: *rows,
                }
            }
            BulkState::Running { operation_id, rows } => {
                self.poll(operation_id, *rows, sink, cancel).await?
            }
            BulkState::Completed(_) | BulkState::Failed(_) => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    async fn poll(
        &self,
        operation_id: &str,
        rows: usize,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CatalogResult<BulkState> {
        let started = tokio::time::Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }
            if started.elapsed() > self.max_wait {
                return Ok(BulkState::Failed(format!(
                    "Bulk operation {} did not finish within {:?}",
                    operation_id, self.max_wait
                )));
            }

            let status = self.client.bulk_operation_status(operation_id).await?;
            let done: usize = status
                .object_count
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            tracing::debug!(
                "Bulk operation {}: {} ({} objects)",
                operation_id,
                status.status,
                done
            );

            match status.status.as_str() {
                "COMPLETED" => {
                    sink.report(SyncProgressUpdate::step(95, "Загрузка результата..."));
                    let summary = match status.url.as_deref() {
                        Some(url) => summarize_results(&self.client.download_text(url).await?),
                        None => {
                            tracing::warn!(
                                "Bulk operation {} completed without result file ({} rows)",
                                operation_id,
                                rows
                            );
                            BulkSummary {
                                unverified: rows,
                                ..Default::default()
                            }
                        }
                    };
                    return Ok(BulkState::Completed(summary));
                }
                "FAILED" | "CANCELED" | "CANCELLED" | "EXPIRED" => {
                    return Ok(BulkState::Failed(format!(
                        "Bulk operation {} ended with status {} ({})",
                        operation_id,
                        status.status,
                        status.error_code.as_deref().unwrap_or("no error code")
                    )));
                }
                _ => {
                    let percent = 20 + (70 * done.min(rows) / rows.max(1)) as u8;
                    sink.report(SyncProgressUpdate::step(
                        percent,
                        format!("Shopify обрабатывает цены: {}/{}", done.min(rows), rows),
                    ));
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_rows() {
        let jsonl = build_jsonl(&[
            VariantPriceInput {
                variant_id: "gid://shopify/ProductVariant/1".into(),
                price: 149.9,
                compare_at_price: Some(199.0),
            },
            VariantPriceInput {
                variant_id: "gid://shopify/ProductVariant/2".into(),
                price: 10.0,
                compare_at_price: None,
            },
        ]);
        let lines: Vec<Value> = jsonl.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            json!({"input": {
                "id": "gid://shopify/ProductVariant/1",
                "price": "149.90",
                "compareAtPrice": "199.00"
            }})
        );
        assert!(lines[1]["input"].get("compareAtPrice").is_none());
    }

    #[test]
    fn test_summarize_counts_user_errors() {
        let jsonl = r#"
{"data":{"productVariantUpdate":{"productVariant":{"id":"gid://shopify/ProductVariant/1","price":"10.00"},"userErrors":[]}},"__lineNumber":0}
{"data":{"productVariantUpdate":{"productVariant":null,"userErrors":[{"field":["price"],"message":"Price must be positive"}]}},"__lineNumber":1}
{"errors":[{"message":"Internal error"}],"__lineNumber":2}
"#;
        let summary = summarize_results(jsonl);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(
            summary.errors,
            vec!["Price must be positive".to_string(), "Internal error".to_string()]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(BulkState::Failed("x".into()).is_terminal());
        assert!(BulkState::Completed(BulkSummary::default()).is_terminal());
        assert!(!BulkState::Staged { staged_path: "p".into(), rows: 1 }.is_terminal());
    }
}

//! Аспекты синхронизации одного товара.
//!
//! Каждый аспект пишет в `changes` человекочитаемые записи. Ошибки мутаций
//! (userErrors) попадают в `changes` и не прерывают остальные аспекты;
//! `Err` из аспекта помечает товар как failed.

pub mod category;
pub mod create;
pub mod details;
pub mod media;
pub mod options;
pub mod variants;

use super::ports::{DestinationCatalog, SourceCatalog, UserErrors};
use super::timings::SyncTimings;

/// Общие зависимости аспектов
#[derive(Clone, Copy)]
pub struct ProcessorContext<'a> {
    pub source: &'a dyn SourceCatalog,
    pub destination: &'a dyn DestinationCatalog,
    pub timings: &'a SyncTimings,
    /// Alt-текст новых картинок = название товара
    pub alt_from_title: bool,
    /// Удалять медиа, даже если порядок картинок источника недоступен
    pub force_media_override: bool,
    /// Vendor для создаваемых товаров
    pub vendor: Option<&'a str>,
}

/// Записать userErrors мутации в журнал товара
pub(crate) fn record_user_errors(
    changes: &mut Vec<String>,
    action: &str,
    errors: &UserErrors,
) -> bool {
    if errors.is_empty() {
        return false;
    }
    changes.push(format!("Ошибка ({}): {}", action, errors.join("; ")));
    true
}

pub(crate) async fn settle(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

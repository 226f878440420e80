use super::super::models::{ProductFieldsUpdate, ProductRef, SourceProduct};
use super::{record_user_errors, ProcessorContext};
use crate::shared::errors::CatalogResult;

/// Перезаписать productType, если категория задана в источнике
pub async fn sync_category(
    ctx: &ProcessorContext<'_>,
    product: &SourceProduct,
    target: &ProductRef,
    changes: &mut Vec<String>,
) -> CatalogResult<()> {
    let Some(category) = product.category_label() else {
        tracing::debug!("Product {} has no category", product.trimmed_sku());
        return Ok(());
    };

    let update = ProductFieldsUpdate {
        product_type: Some(category.clone()),
        ..Default::default()
    };
    let errors = ctx.destination.update_product(&target.gid, &update).await?;
    if !record_user_errors(changes, "категория", &errors) {
        changes.push(format!("Категория: '{}'", category));
    }
    tracing::info!("Product type of {} set to '{}'", target.gid, category);
    Ok(())
}

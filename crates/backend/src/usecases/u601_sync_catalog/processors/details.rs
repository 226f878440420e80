use super::super::models::{ProductFieldsUpdate, ProductRef, SourceProduct};
use super::{record_user_errors, ProcessorContext};
use crate::shared::errors::CatalogResult;

/// Перезаписать название и описание товара
pub async fn sync_details(
    ctx: &ProcessorContext<'_>,
    product: &SourceProduct,
    target: &ProductRef,
    changes: &mut Vec<String>,
) -> CatalogResult<()> {
    let title = product.trimmed_name();
    let update = ProductFieldsUpdate {
        title: (!title.is_empty()).then(|| title.to_string()),
        description_html: Some(product.description_html()),
        product_type: None,
    };

    let errors = ctx.destination.update_product(&target.gid, &update).await?;
    if !record_user_errors(changes, "описание", &errors) {
        changes.push("Название и описание обновлены".to_string());
    }
    tracing::info!("Details updated for product {}", target.gid);
    Ok(())
}

use super::super::models::{ProductCreateInput, ProductRef, SourceProduct};
use super::media::sync_media;
use super::options::{new_variant, option_orders};
use super::variants::{activate_created, reorder_options, stock_adjustments};
use super::{record_user_errors, ProcessorContext};
use crate::shared::errors::CatalogResult;

/// Теги нового товара: vendor и категория
fn product_tags(vendor: Option<&str>, category: Option<&str>) -> Vec<String> {
    [vendor, category]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Создать товар витрины со всеми вариантами, остатками и картинками
pub async fn create_product(
    ctx: &ProcessorContext<'_>,
    product: &SourceProduct,
    changes: &mut Vec<String>,
) -> CatalogResult<ProductRef> {
    let variants = product.effective_variants();
    let category = product.category_label();

    let input = ProductCreateInput {
        title: product.trimmed_name().to_string(),
        description_html: product.description_html(),
        vendor: ctx.vendor.map(str::to_string),
        product_type: category.clone(),
        tags: product_tags(ctx.vendor, category.as_deref()),
        options: option_orders(&variants),
    };
    let target = ctx.destination.create_product(&input).await?;
    changes.push("Товар создан".to_string());

    let price = product.storefront_price();
    let inputs: Vec<_> = variants
        .iter()
        .filter(|v| !v.trimmed_sku().is_empty())
        .map(|v| new_variant(v, price))
        .collect();
    let created = ctx
        .destination
        .create_variants(&target.gid, &inputs, true)
        .await?;
    record_user_errors(changes, "создание вариантов", &created.user_errors);
    changes.push(format!("Вариантов: {}", created.variants.len()));

    activate_created(ctx, &created.variants, changes).await?;

    let adjustments = stock_adjustments(&variants, &created.variants);
    if !adjustments.is_empty() {
        let location = ctx.destination.default_location().await?;
        let errors = ctx
            .destination
            .set_on_hand_quantities(&adjustments, &location)
            .await?;
        if !record_user_errors(changes, "остатки", &errors) {
            changes.push(format!("Остатки выставлены: {} вариантов", adjustments.len()));
        }
    }

    reorder_options(ctx, &variants, &target, changes).await;

    // Товар уже создан: ошибка картинок не меняет итог
    if let Err(e) = sync_media(ctx, product, &target, changes).await {
        tracing::warn!("Media sync failed for new product {}: {}", target.gid, e);
        changes.push(format!("Ошибка (картинки): {}", e));
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_tags_skip_empty() {
        assert_eq!(product_tags(Some("Marka"), Some(" Elbise ")), vec!["Marka", "Elbise"]);
        assert_eq!(product_tags(None, Some("")), Vec::<String>::new());
    }
}

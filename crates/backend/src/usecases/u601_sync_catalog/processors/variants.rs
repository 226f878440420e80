use super::super::models::{
    DestinationVariant, InventoryAdjustment, ProductRef, SourceProduct, SourceVariant,
};
use super::options::{new_variant, option_orders};
use super::{record_user_errors, settle, ProcessorContext};
use crate::shared::errors::CatalogResult;
use std::collections::{HashMap, HashSet};

/// Создать недостающие варианты, выставить остатки, упорядочить опции
pub async fn sync_variants_and_stock(
    ctx: &ProcessorContext<'_>,
    product: &SourceProduct,
    target: &ProductRef,
    changes: &mut Vec<String>,
) -> CatalogResult<()> {
    let source_variants = product.effective_variants();
    let existing = ctx.destination.product_variants(&target.gid).await?;
    let existing_skus: HashSet<&str> = existing
        .iter()
        .filter_map(DestinationVariant::trimmed_sku)
        .collect();

    let missing: Vec<&SourceVariant> = source_variants
        .iter()
        .filter(|v| !v.trimmed_sku().is_empty() && !existing_skus.contains(v.trimmed_sku()))
        .collect();

    let mut created_count = 0;
    let variants_now = if missing.is_empty() {
        existing
    } else {
        let inputs: Vec<_> = missing.iter().map(|v| new_variant(v, 0.0)).collect();
        let created = ctx
            .destination
            .create_variants(&target.gid, &inputs, false)
            .await?;
        record_user_errors(changes, "создание вариантов", &created.user_errors);
        created_count = created.variants.len();
        if created_count > 0 {
            changes.push(format!("Добавлено вариантов: {}", created_count));
            activate_created(ctx, &created.variants, changes).await?;
        }

        settle(ctx.timings.variant_settle).await;
        ctx.destination.product_variants(&target.gid).await?
    };

    let adjustments = stock_adjustments(&source_variants, &variants_now);
    if !adjustments.is_empty() {
        let location = ctx.destination.default_location().await?;
        let errors = ctx
            .destination
            .set_on_hand_quantities(&adjustments, &location)
            .await?;
        if !record_user_errors(changes, "остатки", &errors) {
            changes.push(format!("Остатки обновлены: {} вариантов", adjustments.len()));
        }
    }

    reorder_options(ctx, &source_variants, target, changes).await;

    if created_count == 0 && adjustments.is_empty() {
        changes.push("Варианты и остатки без изменений".to_string());
    }
    Ok(())
}

/// По одной корректировке на вариант витрины, чей SKU есть в источнике.
/// Количество = сумма остатков варианта источника по всем складам.
pub fn stock_adjustments(
    source_variants: &[SourceVariant],
    destination_variants: &[DestinationVariant],
) -> Vec<InventoryAdjustment> {
    let inventory_by_sku: HashMap<&str, &str> = destination_variants
        .iter()
        .filter_map(|v| Some((v.trimmed_sku()?, v.inventory_item_id.as_deref()?)))
        .collect();

    let mut seen = HashSet::new();
    source_variants
        .iter()
        .filter_map(|variant| {
            let sku = variant.trimmed_sku();
            let item_id = *inventory_by_sku.get(sku)?;
            seen.insert(item_id).then(|| InventoryAdjustment {
                inventory_item_id: item_id.to_string(),
                quantity: variant.stock_total(),
            })
        })
        .collect()
}

/// Активировать новые складские позиции на основной локации
pub(super) async fn activate_created(
    ctx: &ProcessorContext<'_>,
    created: &[DestinationVariant],
    changes: &mut Vec<String>,
) -> CatalogResult<()> {
    let item_ids: Vec<String> = created
        .iter()
        .filter_map(|v| v.inventory_item_id.clone())
        .collect();
    if item_ids.is_empty() {
        return Ok(());
    }

    let location = ctx.destination.default_location().await?;
    match ctx.destination.activate_inventory(&item_ids, &location).await {
        Ok(errors) => {
            record_user_errors(changes, "активация склада", &errors);
        }
        Err(e) => {
            tracing::warn!("Inventory activation failed: {}", e);
            changes.push(format!("Ошибка (активация склада): {}", e));
        }
    }
    Ok(())
}

/// Порядок значений опций; косметика, ошибки только логируются
pub(super) async fn reorder_options(
    ctx: &ProcessorContext<'_>,
    source_variants: &[SourceVariant],
    target: &ProductRef,
    changes: &mut Vec<String>,
) {
    let options = option_orders(source_variants);
    if options.is_empty() {
        return;
    }
    match ctx.destination.reorder_options(&target.gid, &options).await {
        Ok(errors) => {
            record_user_errors(changes, "порядок опций", &errors);
        }
        Err(e) => tracing::warn!("Option reorder failed for {}: {}", target.gid, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dest(sku: &str, item: &str) -> DestinationVariant {
        DestinationVariant {
            id: format!("gid://shopify/ProductVariant/{}", item),
            sku: Some(sku.to_string()),
            inventory_item_id: Some(format!("gid://shopify/InventoryItem/{}", item)),
            price: None,
        }
    }

    #[test]
    fn test_adjustments_sum_stock_entries() {
        let source: Vec<SourceVariant> = serde_json::from_value(json!([
            {"sku": "A-1-RED-S", "stocks": [{"stock": 3}, {"stock": 2}]},
            {"sku": "A-1-RED-M", "stocks": [{"stock": 0}]},
            {"sku": "A-1-RED-L", "stocks": [{"stock": 9}]}
        ]))
        .unwrap();
        let adjustments = stock_adjustments(
            &source,
            &[dest("A-1-RED-S", "1"), dest(" A-1-RED-M ", "2"), dest("OTHER", "3")],
        );
        assert_eq!(
            adjustments,
            vec![
                InventoryAdjustment {
                    inventory_item_id: "gid://shopify/InventoryItem/1".into(),
                    quantity: 5,
                },
                InventoryAdjustment {
                    inventory_item_id: "gid://shopify/InventoryItem/2".into(),
                    quantity: 0,
                },
            ]
        );
    }
}

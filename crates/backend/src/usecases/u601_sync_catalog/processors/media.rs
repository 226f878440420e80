use super::super::models::{MediaAsset, MediaOrder, NewMedia, ProductRef, SourceProduct};
use super::{record_user_errors, settle, ProcessorContext};
use crate::shared::errors::CatalogResult;
use std::collections::{HashMap, HashSet};

/// Что нужно сделать с картинками товара
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaPlan {
    /// URL источника в исходном порядке
    pub additions: Vec<String>,
    /// id медиа витрины
    pub deletions: Vec<String>,
    /// Сколько кандидатов на удаление отброшено пределом
    pub deferred_deletions: usize,
}

impl MediaPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

fn asset_matches(asset: &MediaAsset, url: &str) -> bool {
    asset.source_url.as_deref() == Some(url) || asset.alt.as_deref() == Some(url)
}

/// Симметричная разница по строковому совпадению URL.
/// Картинка витрины совпадает с URL, если совпадает её исходный URL или alt.
pub fn plan_media_changes(
    source_urls: &[String],
    existing: &[MediaAsset],
    max_deletions: usize,
) -> MediaPlan {
    let mut seen = HashSet::new();
    let additions: Vec<String> = source_urls
        .iter()
        .filter(|url| seen.insert(url.as_str()))
        .filter(|url| !existing.iter().any(|asset| asset_matches(asset, url)))
        .cloned()
        .collect();

    let candidates: Vec<String> = existing
        .iter()
        .filter(|asset| !source_urls.iter().any(|url| asset_matches(asset, url)))
        .map(|asset| asset.id.clone())
        .collect();
    let deferred_deletions = candidates.len().saturating_sub(max_deletions);
    let deletions = candidates.into_iter().take(max_deletions).collect();

    MediaPlan {
        additions,
        deletions,
        deferred_deletions,
    }
}

/// id медиа в порядке источника; неразрешенные URL пропускаются
pub fn ordered_media_ids(source_urls: &[String], media: &[MediaAsset]) -> Vec<String> {
    let mut by_key: HashMap<&str, &str> = HashMap::new();
    for asset in media {
        if let Some(url) = asset.source_url.as_deref() {
            by_key.insert(url, &asset.id);
        }
        if let Some(alt) = asset.alt.as_deref() {
            by_key.insert(alt, &asset.id);
        }
    }
    let mut seen = HashSet::new();
    source_urls
        .iter()
        .filter_map(|url| by_key.get(url.as_str()).copied())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Синхронизировать картинки товара с порядком источника
pub async fn sync_media(
    ctx: &ProcessorContext<'_>,
    product: &SourceProduct,
    target: &ProductRef,
    changes: &mut Vec<String>,
) -> CatalogResult<()> {
    let order = ctx.source.resolve_media_order(&product.id).await;
    let urls = match order {
        MediaOrder::Unavailable if !ctx.force_media_override => {
            tracing::info!(
                "Media order unavailable for {}, media left untouched",
                product.trimmed_sku()
            );
            changes.push("Картинки пропущены: порядок источника недоступен".to_string());
            return Ok(());
        }
        MediaOrder::Unavailable | MediaOrder::Empty => Vec::new(),
        MediaOrder::List(urls) => urls,
    };

    let existing = ctx.destination.product_media(&target.gid).await?;

    if urls.is_empty() {
        let ids: Vec<String> = existing.into_iter().map(|m| m.id).collect();
        if ids.is_empty() {
            changes.push("Картинки без изменений".to_string());
            return Ok(());
        }
        let errors = ctx.destination.delete_media(&target.gid, &ids).await?;
        if !record_user_errors(changes, "удаление картинок", &errors) {
            changes.push(format!("Удалено картинок: {}", ids.len()));
        }
        return Ok(());
    }

    let plan = plan_media_changes(&urls, &existing, ctx.timings.max_media_deletions);
    if plan.deferred_deletions > 0 {
        tracing::warn!(
            "Product {}: {} media deletions deferred to the next run",
            target.gid,
            plan.deferred_deletions
        );
    }
    if plan.is_empty() {
        changes.push("Картинки без изменений".to_string());
        return Ok(());
    }

    let mut changed = false;
    let mut additions_ok = true;
    let mut added = 0;
    let title = product.trimmed_name();

    for (i, chunk) in plan.additions.chunks(ctx.timings.media_batch_size.max(1)).enumerate() {
        if i > 0 {
            settle(ctx.timings.media_batch_pause).await;
        }
        let batch: Vec<NewMedia> = chunk
            .iter()
            .map(|url| NewMedia {
                source_url: url.clone(),
                alt: if ctx.alt_from_title && !title.is_empty() {
                    title.to_string()
                } else {
                    url.clone()
                },
            })
            .collect();

        match ctx.destination.create_media(&target.gid, &batch).await {
            Ok(errors) if errors.is_empty() => added += batch.len(),
            Ok(errors) => {
                additions_ok = false;
                record_user_errors(changes, "добавление картинок", &errors);
            }
            Err(e) => {
                additions_ok = false;
                tracing::error!("Media batch {} failed for {}: {}", i + 1, target.gid, e);
                changes.push(format!("Ошибка (добавление картинок): {}", e));
            }
        }
    }
    if added > 0 {
        changes.push(format!("Добавлено картинок: {}", added));
        changed = true;
    }

    if !plan.deletions.is_empty() {
        if additions_ok {
            match ctx.destination.delete_media(&target.gid, &plan.deletions).await {
                Ok(errors) => {
                    if !record_user_errors(changes, "удаление картинок", &errors) {
                        changes.push(format!("Удалено картинок: {}", plan.deletions.len()));
                        changed = true;
                    }
                }
                Err(e) => {
                    tracing::error!("Media deletion failed for {}: {}", target.gid, e);
                    changes.push(format!("Ошибка (удаление картинок): {}", e));
                }
            }
        } else {
            changes.push(
                "Удаление картинок отложено: добавление завершилось с ошибками".to_string(),
            );
        }
    }

    if changed {
        settle(ctx.timings.media_settle).await;
        let media = ctx.destination.product_media(&target.gid).await?;
        let ordered = ordered_media_ids(&urls, &media);
        if ordered.len() >= 2 {
            let errors = ctx.destination.reorder_media(&target.gid, &ordered).await?;
            if !record_user_errors(changes, "порядок картинок", &errors) {
                changes.push("Порядок картинок обновлен".to_string());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, alt: &str) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            source_url: Some(format!("https://cdn.shopify.com/{}.jpg", id)),
            alt: Some(alt.to_string()),
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_symmetric_diff_by_alt() {
        let existing = vec![asset("m1", "u1"), asset("m2", "u2"), asset("m3", "u3")];
        let plan = plan_media_changes(&urls(&["u2", "u3", "u4"]), &existing, 20);
        assert_eq!(plan.additions, urls(&["u4"]));
        assert_eq!(plan.deletions, urls(&["m1"]));
        assert_eq!(plan.deferred_deletions, 0);
    }

    #[test]
    fn test_deletions_are_capped() {
        let existing: Vec<MediaAsset> = (0..25)
            .map(|i| asset(&format!("m{}", i), &format!("old{}", i)))
            .collect();
        let plan = plan_media_changes(&urls(&["new"]), &existing, 20);
        assert_eq!(plan.deletions.len(), 20);
        assert_eq!(plan.deferred_deletions, 5);
    }

    #[test]
    fn test_duplicate_source_urls_added_once() {
        let plan = plan_media_changes(&urls(&["u1", "u1"]), &[], 20);
        assert_eq!(plan.additions, urls(&["u1"]));
    }

    #[test]
    fn test_ordered_ids_skip_unresolved() {
        let media = vec![asset("m4", "u4"), asset("m2", "u2")];
        assert_eq!(
            ordered_media_ids(&urls(&["u2", "u3", "u4"]), &media),
            urls(&["m2", "m4"])
        );
    }
}

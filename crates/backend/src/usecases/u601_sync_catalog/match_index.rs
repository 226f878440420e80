use super::models::{ListedProduct, ProductRef, SourceProduct};
use std::collections::HashMap;

/// Индекс `sku:<значение>` / `title:<значение>` → товар витрины.
/// Строится один раз перед параллельной обработкой и далее только читается.
#[derive(Debug, Default, Clone)]
pub struct MatchIndex {
    entries: HashMap<String, ProductRef>,
    collisions: usize,
}

fn sku_key(sku: &str) -> String {
    format!("sku:{}", sku.trim())
}

fn title_key(title: &str) -> String {
    format!("title:{}", title.trim())
}

impl MatchIndex {
    /// Построить индекс. При совпадении ключей побеждает последний товар.
    pub fn build(products: &[ListedProduct]) -> Self {
        let start = std::time::Instant::now();
        let mut index = Self::default();

        for product in products {
            let product_ref = product.product_ref();
            if !product.title.trim().is_empty() {
                index.insert(title_key(&product.title), &product_ref);
            }
            for sku in &product.variant_skus {
                if !sku.trim().is_empty() {
                    index.insert(sku_key(sku), &product_ref);
                }
            }
        }

        if index.collisions > 0 {
            tracing::warn!(
                "Match index: {} duplicate keys resolved by last write",
                index.collisions
            );
        }
        tracing::info!(
            "Built match index in {:?}ms: {} keys from {} products",
            start.elapsed().as_millis(),
            index.entries.len(),
            products.len()
        );
        index
    }

    fn insert(&mut self, key: String, product_ref: &ProductRef) {
        if let Some(previous) = self.entries.insert(key, product_ref.clone()) {
            if previous.gid != product_ref.gid {
                self.collisions += 1;
            }
        }
    }

    /// Найти товар: сначала по SKU, затем по названию
    pub fn find(&self, product: &SourceProduct) -> Option<&ProductRef> {
        let sku = product.trimmed_sku();
        if !sku.is_empty() {
            if let Some(found) = self.entries.get(&sku_key(sku)) {
                return Some(found);
            }
        }
        let name = product.trimmed_name();
        if name.is_empty() {
            return None;
        }
        self.entries.get(&title_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Сколько ключей указывало на разные товары
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

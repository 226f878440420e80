use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Sentos (источник)
// ============================================================================

/// Товар Sentos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceProduct {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub sku: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// HTML-описание
    #[serde(default)]
    pub description_detail: Option<String>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default, deserialize_with = "de_vec")]
    pub variants: Vec<SourceVariant>,
    #[serde(default)]
    pub prices: Option<SourcePrices>,
    #[serde(default)]
    pub sale_price: Option<Value>,

    // Поля товара без вариантов
    #[serde(default, deserialize_with = "de_vec")]
    pub stocks: Vec<Option<StockEntry>>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub model: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcePrices {
    #[serde(default)]
    pub shopify: Option<ChannelPrices>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelPrices {
    #[serde(default)]
    pub sale_price: Option<Value>,
    #[serde(default)]
    pub list_price: Option<Value>,
}

/// Вариант товара Sentos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceVariant {
    #[serde(default, deserialize_with = "de_string")]
    pub sku: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Размер: строка или объект `{ "value": ... }`
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default, deserialize_with = "de_vec")]
    pub stocks: Vec<Option<StockEntry>>,
}

/// Остаток на одном складе
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockEntry {
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub stock: Option<f64>,
}

impl SourceProduct {
    pub fn trimmed_sku(&self) -> &str {
        self.sku.trim()
    }

    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }

    /// Варианты товара; товар без вариантов сам является единственным вариантом
    pub fn effective_variants(&self) -> Vec<SourceVariant> {
        if !self.variants.is_empty() {
            return self.variants.clone();
        }
        vec![SourceVariant {
            sku: self.sku.clone(),
            color: self.color.clone(),
            model: self.model.clone(),
            barcode: self.barcode.clone(),
            stocks: self.stocks.clone(),
        }]
    }

    /// HTML-описание, иначе обычное описание
    pub fn description_html(&self) -> String {
        self.description_detail
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.description.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// Название категории, если оно задано
    pub fn category_label(&self) -> Option<String> {
        let label = match self.category.as_ref()? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Object(map) => map
                .get("name")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        (!label.is_empty()).then_some(label)
    }

    /// Цена для витрины: `prices.shopify.sale_price`, затем `list_price`
    /// (только положительные), затем `sale_price` товара, иначе 0
    pub fn storefront_price(&self) -> f64 {
        if let Some(channel) = self.prices.as_ref().and_then(|p| p.shopify.as_ref()) {
            for value in [&channel.sale_price, &channel.list_price] {
                if let Some(price) = value.as_ref().and_then(parse_price) {
                    if price > 0.0 {
                        return price;
                    }
                }
            }
        }
        self.sale_price
            .as_ref()
            .and_then(parse_price)
            .unwrap_or(0.0)
    }
}

impl SourceVariant {
    pub fn trimmed_sku(&self) -> &str {
        self.sku.trim()
    }

    /// Сумма остатков по всем складам (пустые значения считаются нулем)
    pub fn stock_total(&self) -> i64 {
        self.stocks
            .iter()
            .flatten()
            .filter_map(|entry| entry.stock)
            .sum::<f64>() as i64
    }

    pub fn color_label(&self) -> Option<String> {
        let color = self.color.as_deref()?.trim();
        (!color.is_empty()).then(|| color.to_string())
    }

    pub fn size_label(&self) -> Option<String> {
        let label = match self.model.as_ref()? {
            Value::Object(map) => match map.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            },
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        let label = label.trim();
        (!label.is_empty()).then(|| label.to_string())
    }
}

/// "149,90" / "149.90" / 149.9
fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

/// Порядок картинок товара в источнике
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOrder {
    /// Нет данных (нет cookie, ошибка запроса, неразборчивый ответ)
    Unavailable,
    /// Источник подтвердил, что картинок нет
    Empty,
    List(Vec<String>),
}

// ============================================================================
// Shopify (витрина)
// ============================================================================

/// Товар витрины из облегченного списка для индекса
#[derive(Debug, Clone, PartialEq)]
pub struct ListedProduct {
    pub id: i64,
    pub gid: String,
    pub title: String,
    pub variant_skus: Vec<String>,
}

impl ListedProduct {
    pub fn product_ref(&self) -> ProductRef {
        ProductRef {
            id: self.id,
            gid: self.gid.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductRef {
    pub id: i64,
    pub gid: String,
}

pub fn product_gid(id: i64) -> String {
    format!("gid://shopify/Product/{}", id)
}

/// Числовой id из gid (`gid://shopify/ProductVariant/42` → 42)
pub fn numeric_id(gid: &str) -> Option<i64> {
    gid.rsplit('/').next()?.parse().ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestinationVariant {
    pub id: String,
    pub sku: Option<String>,
    pub inventory_item_id: Option<String>,
    pub price: Option<String>,
}

impl DestinationVariant {
    pub fn trimmed_sku(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub id: String,
    /// URL исходной картинки (originalSrc)
    pub source_url: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionValue {
    pub option_name: String,
    pub name: String,
}

/// Новый вариант для productVariantsBulkCreate
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub sku: String,
    pub price: f64,
    pub barcode: Option<String>,
    pub option_values: Vec<OptionValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub source_url: String,
    pub alt: String,
}

/// Опция товара с желаемым порядком значений
#[derive(Debug, Clone, PartialEq)]
pub struct OptionOrder {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryAdjustment {
    pub inventory_item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductCreateInput {
    pub title: String,
    pub description_html: String,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub options: Vec<OptionOrder>,
}

/// Частичное обновление полей товара (None = не трогать)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFieldsUpdate {
    pub title: Option<String>,
    pub description_html: Option<String>,
    pub product_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreatedVariants {
    pub variants: Vec<DestinationVariant>,
    pub user_errors: Vec<String>,
}

/// Вариант, найденный по SKU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRef {
    pub variant_id: String,
    pub product_id: String,
}

// ============================================================================
// Лояльная десериализация полей Sentos
// ============================================================================

fn de_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn de_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(parse_price))
}

use super::super::models::{NewVariant, OptionOrder, OptionValue, SourceVariant};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const COLOR_OPTION: &str = "Renk";
pub const SIZE_OPTION: &str = "Beden";

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("number pattern is valid"));

/// Ключ сортировки размеров: буквенные (XXS…5XL, затем "единый размер"),
/// потом числовые по первому числу, потом остальные
pub fn apparel_sort_key(size: &str) -> (u8, u32, String) {
    let upper = size.trim().to_uppercase();
    let rank = match upper.as_str() {
        "XXS" => Some(0),
        "XS" => Some(1),
        "S" => Some(2),
        "M" => Some(3),
        "L" => Some(4),
        "XL" => Some(5),
        "XXL" | "2XL" => Some(6),
        "XXXL" | "3XL" => Some(7),
        "XXXXL" | "4XL" => Some(8),
        "XXXXXL" | "5XL" => Some(9),
        "TEK EBAT" | "STANDART" => Some(100),
        _ => None,
    };
    if let Some(rank) = rank {
        return (1, rank, size.to_string());
    }
    if let Some(number) = FIRST_NUMBER
        .find(size)
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return (2, number, size.to_string());
    }
    (3, 9999, size.to_string())
}

/// Опции товара: цвета по алфавиту, размеры в порядке одежды
pub fn option_orders(variants: &[SourceVariant]) -> Vec<OptionOrder> {
    let colors: BTreeSet<String> = variants.iter().filter_map(SourceVariant::color_label).collect();
    let mut sizes: Vec<String> = variants
        .iter()
        .filter_map(SourceVariant::size_label)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    sizes.sort_by_key(|s| apparel_sort_key(s));

    let mut options = Vec::new();
    if !colors.is_empty() {
        options.push(OptionOrder {
            name: COLOR_OPTION.to_string(),
            values: colors.into_iter().collect(),
        });
    }
    if !sizes.is_empty() {
        options.push(OptionOrder {
            name: SIZE_OPTION.to_string(),
            values: sizes,
        });
    }
    options
}

/// Вариант витрины для варианта источника
pub fn new_variant(variant: &SourceVariant, price: f64) -> NewVariant {
    let mut option_values = Vec::new();
    if let Some(color) = variant.color_label() {
        option_values.push(OptionValue {
            option_name: COLOR_OPTION.to_string(),
            name: color,
        });
    }
    if let Some(size) = variant.size_label() {
        option_values.push(OptionValue {
            option_name: SIZE_OPTION.to_string(),
            name: size,
        });
    }
    NewVariant {
        sku: variant.trimmed_sku().to_string(),
        price,
        barcode: variant.barcode.clone().filter(|b| !b.trim().is_empty()),
        option_values,
    }
}

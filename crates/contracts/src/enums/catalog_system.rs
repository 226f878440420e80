use serde::{Deserialize, Serialize};

/// Каталоги, участвующие в синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSystem {
    /// Источник: остатки, цены, описания
    Sentos,
    /// Витрина, которая повторяет источник
    Shopify,
}

impl CatalogSystem {
    /// Получить код каталога
    pub fn code(&self) -> &'static str {
        match self {
            CatalogSystem::Sentos => "cat-sentos",
            CatalogSystem::Shopify => "cat-shopify",
        }
    }

    /// Получить человекочитаемое название
    pub fn display_name(&self) -> &'static str {
        match self {
            CatalogSystem::Sentos => "Sentos",
            CatalogSystem::Shopify => "Shopify",
        }
    }

    pub fn all() -> Vec<CatalogSystem> {
        vec![CatalogSystem::Sentos, CatalogSystem::Shopify]
    }

    /// Парсинг из строки
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "cat-sentos" => Some(CatalogSystem::Sentos),
            "cat-shopify" => Some(CatalogSystem::Shopify),
            _ => None,
        }
    }
}

impl std::fmt::Display for CatalogSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

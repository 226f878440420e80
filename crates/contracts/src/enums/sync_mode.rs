use serde::{Deserialize, Serialize};

/// Независимые аспекты синхронизации одного товара.
/// Порядок вариантов совпадает с порядком выполнения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncConcern {
    Details,
    Category,
    VariantsAndStock,
    Media,
}

/// Режим синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Создать недостающие и обновить все аспекты
    #[default]
    Full,
    DetailsOnly,
    CategoryOnly,
    StockAndVariantsOnly,
    ImagesOnly,
    /// Картинки с alt-текстом из названия товара
    ImagesWithAltText,
    /// Только создать отсутствующие на витрине товары
    MissingOnly,
}

impl SyncMode {
    pub fn code(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::DetailsOnly => "details_only",
            SyncMode::CategoryOnly => "category_only",
            SyncMode::StockAndVariantsOnly => "stock_and_variants_only",
            SyncMode::ImagesOnly => "images_only",
            SyncMode::ImagesWithAltText => "images_with_alt_text",
            SyncMode::MissingOnly => "missing_only",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SyncMode::Full => "Full Sync (Create & Update All)",
            SyncMode::DetailsOnly => "Descriptions Only",
            SyncMode::CategoryOnly => "Categories (Product Type) Only",
            SyncMode::StockAndVariantsOnly => "Stock & Variants Only",
            SyncMode::ImagesOnly => "Images Only",
            SyncMode::ImagesWithAltText => "Images with SEO Alt Text",
            SyncMode::MissingOnly => "Create Missing Products Only",
        }
    }

    pub fn all() -> Vec<SyncMode> {
        vec![
            SyncMode::Full,
            SyncMode::DetailsOnly,
            SyncMode::CategoryOnly,
            SyncMode::StockAndVariantsOnly,
            SyncMode::ImagesOnly,
            SyncMode::ImagesWithAltText,
            SyncMode::MissingOnly,
        ]
    }

    /// Парсинг из строки
    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().into_iter().find(|m| m.code() == code)
    }

    /// Аспекты, которые режим применяет к уже существующему товару
    pub fn concerns(&self) -> &'static [SyncConcern] {
        match self {
            SyncMode::Full => &[
                SyncConcern::Details,
                SyncConcern::Category,
                SyncConcern::VariantsAndStock,
                SyncConcern::Media,
            ],
            SyncMode::DetailsOnly => &[SyncConcern::Details],
            SyncMode::CategoryOnly => &[SyncConcern::Category],
            SyncMode::StockAndVariantsOnly => &[SyncConcern::VariantsAndStock],
            SyncMode::ImagesOnly | SyncMode::ImagesWithAltText => &[SyncConcern::Media],
            SyncMode::MissingOnly => &[],
        }
    }

    /// Создавать ли товары, которых нет на витрине
    pub fn creates_missing(&self) -> bool {
        matches!(self, SyncMode::Full | SyncMode::MissingOnly)
    }

    /// Обновлять ли найденные товары
    pub fn updates_existing(&self) -> bool {
        !matches!(self, SyncMode::MissingOnly)
    }

    /// Alt-текст новых картинок = название товара (иначе URL источника)
    pub fn sets_alt_text(&self) -> bool {
        matches!(self, SyncMode::ImagesWithAltText)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

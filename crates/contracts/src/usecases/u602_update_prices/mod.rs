pub mod request;
pub mod response;

pub use request::{PriceUpdate, PriceUpdateRequest};
pub use response::{BulkPriceResult, PriceUpdateDetail, PriceUpdateStatus};

use crate::usecases::common::UseCaseMetadata;

pub struct UpdatePrices;

impl UseCaseMetadata for UpdatePrices {
    fn usecase_index() -> &'static str {
        "u602"
    }

    fn usecase_name() -> &'static str {
        "update_prices"
    }

    fn display_name() -> &'static str {
        "Выгрузка цен в Shopify"
    }

    fn description() -> &'static str {
        "Массовое обновление цен вариантов через bulk operation"
    }
}

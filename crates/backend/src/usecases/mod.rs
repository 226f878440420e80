pub mod u601_sync_catalog;
pub mod u602_update_prices;

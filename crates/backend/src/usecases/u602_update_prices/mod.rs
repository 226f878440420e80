pub mod bulk_operation;
pub mod executor;

pub use executor::PriceUpdateExecutor;

pub mod catalog_system;
pub mod sync_mode;

pub use catalog_system::CatalogSystem;
pub use sync_mode::{SyncConcern, SyncMode};

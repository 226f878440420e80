pub mod executor;
pub mod match_index;
pub mod models;
pub mod ports;
pub mod processors;
pub mod progress_tracker;
pub mod reconciler;
pub mod sentos_api_client;
pub mod shopify_api_client;
pub mod timings;

pub use executor::{SyncExecutor, SyncHandle, SyncOptions};
pub use progress_tracker::ProgressTracker;

pub mod config;
pub mod errors;
pub mod format;
pub mod catalogs;
pub mod request_log;
pub mod retry;

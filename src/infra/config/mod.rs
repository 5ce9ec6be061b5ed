pub mod app_config;
pub mod sessions_file;

pub use app_config::{AppConfig, ConfigError, StoreSettings};

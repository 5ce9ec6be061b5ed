pub mod adapters;
pub mod config;

pub use adapters::{ManagerSettings, PgConnectionFactory, PgConnectionManager, TomlSessionStore};
pub use config::AppConfig;

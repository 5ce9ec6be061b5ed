pub mod postgres;
pub mod session_store;

pub use postgres::{ManagerSettings, PgConnectionFactory, PgConnectionManager};
pub use session_store::TomlSessionStore;

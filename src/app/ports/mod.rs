pub mod session_store;
pub mod target;

pub use session_store::{MAX_LISTED_SESSIONS, SessionStore, SessionStoreError};
pub use target::{ConnectionFactory, TargetConnection, TargetError};

#[cfg(test)]
pub use session_store::MockSessionStore;

pub mod cache;
pub mod config;
pub mod connection_error;
pub mod error;
pub mod metadata_cache;
pub mod ports;
pub mod query;
pub mod reaper;
pub mod registry;
pub mod workbench;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{ErrorKind, ErrorReport, WorkbenchError};
pub use workbench::{ConnectResult, Workbench};

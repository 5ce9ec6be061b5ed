pub use vecbench_app as app;
pub use vecbench_domain as domain;
pub use vecbench_infra as infra;

pub mod error;
pub mod logging;

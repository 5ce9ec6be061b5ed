use serde::{Deserialize, Serialize};

use vecbench_domain::SessionRecord;

pub const CURRENT_VERSION: u32 = 1;

/// On-disk layout of the session store.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsFile {
    pub version: u32,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

impl Default for SessionsFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            sessions: Vec::new(),
        }
    }
}

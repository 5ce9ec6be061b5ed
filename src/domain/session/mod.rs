mod id;
mod name;
mod record;

pub use id::{SessionId, SessionKey, UserId};
pub use name::{SessionName, SessionNameError};
pub use record::{SessionRecord, SessionSummary};

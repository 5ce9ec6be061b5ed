pub mod column;
pub mod database;
pub mod identifier;
pub mod index;
pub mod metadata;
pub mod metric;
pub mod query_result;
pub mod session;
pub mod sort;
pub mod table;
pub mod vector;

pub use column::{Column, VECTOR_UDT, VectorColumn};
pub use database::{ConnectionCheck, DatabaseInfo, PoolStats};
pub use identifier::{Identifier, IdentifierError, QualifiedTable, is_safe_identifier};
pub use index::{Index, IndexMethod};
pub use metadata::{TableMetadata, use_row_estimate};
pub use metric::DistanceMetric;
pub use query_result::{
    CollectionInfo, Row, SIMILARITY_SCORE, SearchInfo, SearchResult, TablePage,
    decode_vector_strings,
};
pub use session::{
    SessionId, SessionKey, SessionName, SessionNameError, SessionRecord, SessionSummary, UserId,
};
pub use sort::SortOrder;
pub use table::{Collection, ColumnRef, Relationship, VectorTable};
pub use vector::{QueryVector, VectorError};

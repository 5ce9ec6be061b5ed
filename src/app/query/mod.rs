pub mod builder;
pub mod descriptor;

pub use builder::{BuiltQuery, ROW_COLUMN, SqlParam, count_query, page_query, search_query};
pub use descriptor::{
    EqualityFilter, PageRequest, QueryLimits, SearchParams, SearchRequest, SortSpec,
    TableDataParams, TextFilter, VectorFilter,
};

use serde::Serialize;

use super::column::VectorColumn;

/// A table holding at least one pgvector column, as reported by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorTable {
    pub schema: String,
    #[serde(rename = "table")]
    pub name: String,
    pub vector_columns: Vec<VectorColumn>,
    pub collections: Vec<Collection>,
    pub relationships: Vec<Relationship>,
}

impl VectorTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            vector_columns: Vec::new(),
            collections: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// A distinct `collection_id` group inside a vector table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub document_count: i64,
}

impl Collection {
    /// Display name used when the collection registry table has no entry:
    /// derived from a sample `source` metadata value, else from the id.
    ///
    /// `"OP30.15.md"` becomes `"OP30 Collection"`; a source without a
    /// recognizable code keeps its full text.
    pub fn fallback_name(id: &str, sample_source: Option<&str>) -> String {
        match sample_source.filter(|s| !s.is_empty()) {
            Some(source) => match source.split_once('.') {
                Some((base, _))
                    if base.chars().count() >= 3 && base.chars().any(|c| c.is_ascii_digit()) =>
                {
                    format!("{} Collection", base)
                }
                _ => format!("{} Collection", source),
            },
            None => {
                let short: String = id.chars().take(8).collect();
                format!("Collection {}", short)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relationship {
    /// Foreign key into another vector table.
    ForeignKey {
        column: String,
        references: ColumnRef,
        #[serde(rename = "nameColumn")]
        name_column: Option<String>,
    },
    /// Column that looks like a collection reference but has no constraint.
    CollectionReference {
        column: String,
        #[serde(rename = "dataType")]
        data_type: String,
        #[serde(rename = "nameColumn")]
        name_column: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("OP30.15.md"), "OP30 Collection")]
    #[case(Some("CH01.md"), "CH01 Collection")]
    #[case(Some("readme.md"), "readme.md Collection")]
    #[case(Some("notes"), "notes Collection")]
    #[case(None, "Collection 550e8400")]
    #[case(Some(""), "Collection 550e8400")]
    fn fallback_name(#[case] source: Option<&str>, #[case] expected: &str) {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(Collection::fallback_name(id, source), expected);
    }

    #[test]
    fn relationship_serializes_with_type_tag() {
        let rel = Relationship::CollectionReference {
            column: "collection_name".to_string(),
            data_type: "text".to_string(),
            name_column: Some("collection_name".to_string()),
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "collection_reference");
        assert_eq!(json["nameColumn"], "collection_name");
    }

    #[test]
    fn qualified_name() {
        let table = VectorTable::new("public", "docs");
        assert_eq!(table.qualified_name(), "public.docs");
    }
}

use serde::{Deserialize, Serialize};

pub const VECTOR_UDT: &str = "vector";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub nullable: bool,
    pub ordinal_position: i32,
}

impl Column {
    pub fn is_vector(&self) -> bool {
        self.udt_name == VECTOR_UDT
    }

    pub fn type_display(&self) -> String {
        let base = if self.data_type == "USER-DEFINED" {
            &self.udt_name
        } else {
            &self.data_type
        };
        if self.nullable {
            base.clone()
        } else {
            format!("{} NOT NULL", base)
        }
    }
}

/// A column whose UDT is pgvector's `vector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: &str, udt: &str, nullable: bool) -> Column {
        Column {
            name: "embedding".to_string(),
            data_type: data_type.to_string(),
            udt_name: udt.to_string(),
            nullable,
            ordinal_position: 1,
        }
    }

    #[test]
    fn user_defined_types_display_their_udt() {
        let col = column("USER-DEFINED", "vector", true);
        assert!(col.is_vector());
        assert_eq!(col.type_display(), "vector");
    }

    #[test]
    fn not_null_is_appended() {
        let col = column("text", "text", false);
        assert!(!col.is_vector());
        assert_eq!(col.type_display(), "text NOT NULL");
    }
}

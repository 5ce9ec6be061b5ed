//! SQL identifiers that are safe to embed directly in statement text.
//!
//! Schema, table, and column names cannot be bound as parameters, so every
//! one of them must pass through [`Identifier::parse`] before it reaches a
//! query string. Values (search terms, tenant ids, vectors) never do; they are
//! always bound.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier {value:?} contains unsupported character {ch:?}")]
    UnsafeCharacter { value: String, ch: char },
}

/// Returns true iff `candidate` is non-empty and made only of `[A-Za-z0-9_]`.
pub fn is_safe_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(candidate: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let candidate = candidate.as_ref();
        if candidate.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some(ch) = candidate
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(IdentifierError::UnsafeCharacter {
                value: candidate.to_string(),
                ch,
            });
        }
        Ok(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form. Quoting keeps mixed-case names intact; the
    /// character set admitted by `parse` never needs escaping.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `schema.table` pair whose halves are both validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedTable {
    pub schema: Identifier,
    pub table: Identifier,
}

impl QualifiedTable {
    pub fn parse(schema: &str, table: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            schema: Identifier::parse(schema)?,
            table: Identifier::parse(table)?,
        })
    }

    pub fn quoted(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

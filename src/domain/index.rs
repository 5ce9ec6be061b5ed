use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: String,
    pub definition: String,
    pub method: IndexMethod,
    pub vector_index_type: Option<IndexMethod>,
}

impl Index {
    pub fn from_definition(name: impl Into<String>, definition: impl Into<String>) -> Self {
        let definition = definition.into();
        let method = IndexMethod::from_definition(&definition);
        let vector_index_type = method.is_vector().then(|| method.clone());
        Self {
            name: name.into(),
            definition,
            method,
            vector_index_type,
        }
    }
}

/// Access method taken from the `USING <method>` clause of an index definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexMethod {
    #[default]
    BTree,
    Hash,
    Gist,
    Gin,
    Brin,
    IvfFlat,
    Hnsw,
    Other(String),
}

impl IndexMethod {
    pub fn from_definition(definition: &str) -> Self {
        let lower = definition.to_lowercase();
        let Some(pos) = lower.find(" using ") else {
            return IndexMethod::default();
        };
        let method = lower[pos + " using ".len()..]
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();

        match method {
            "btree" => IndexMethod::BTree,
            "hash" => IndexMethod::Hash,
            "gist" => IndexMethod::Gist,
            "gin" => IndexMethod::Gin,
            "brin" => IndexMethod::Brin,
            "ivfflat" => IndexMethod::IvfFlat,
            "hnsw" => IndexMethod::Hnsw,
            "" => IndexMethod::default(),
            other => IndexMethod::Other(other.to_string()),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, IndexMethod::IvfFlat | IndexMethod::Hnsw)
    }
}

impl std::fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexMethod::BTree => write!(f, "btree"),
            IndexMethod::Hash => write!(f, "hash"),
            IndexMethod::Gist => write!(f, "gist"),
            IndexMethod::Gin => write!(f, "gin"),
            IndexMethod::Brin => write!(f, "brin"),
            IndexMethod::IvfFlat => write!(f, "ivfflat"),
            IndexMethod::Hnsw => write!(f, "hnsw"),
            IndexMethod::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for IndexMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

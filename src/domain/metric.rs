use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vector distance function used to rank similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "l2", alias = "euclidean")]
    L2,
    #[serde(rename = "ip", alias = "inner", alias = "inner_product")]
    InnerProduct,
}

impl DistanceMetric {
    pub fn all_variants() -> &'static [DistanceMetric] {
        &[
            DistanceMetric::Cosine,
            DistanceMetric::L2,
            DistanceMetric::InnerProduct,
        ]
    }

    /// pgvector distance operator. Smaller results are always closer.
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::L2 => "<->",
            DistanceMetric::InnerProduct => "<#>",
        }
    }

    /// Wraps a raw distance expression so that higher means more similar.
    pub fn similarity_sql(&self, distance_expr: &str) -> String {
        match self {
            DistanceMetric::Cosine => format!("(1 - ({}))", distance_expr),
            DistanceMetric::L2 => format!("(1 / (1 + ({})))", distance_expr),
            // <#> already returns the negated inner product
            DistanceMetric::InnerProduct => format!("(-({}))", distance_expr),
        }
    }

    /// Same transform as `similarity_sql`, applied to a distance value.
    pub fn similarity_from_distance(&self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::L2 => 1.0 / (1.0 + distance),
            DistanceMetric::InnerProduct => -distance,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::InnerProduct => write!(f, "ip"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "inner" | "inner_product" | "inner-product" => {
                Ok(DistanceMetric::InnerProduct)
            }
            _ => Err(format!(
                "Unknown distance metric: {} (expected cosine, l2, euclidean or ip)",
                s
            )),
        }
    }
}

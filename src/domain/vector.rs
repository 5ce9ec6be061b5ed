use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
    #[error("query vector cannot be empty")]
    Empty,
    #[error("query vector component {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
    #[error("query vector component {index} is not a number: {raw:?}")]
    Unparsable { index: usize, raw: String },
}

/// A query embedding that is safe to bind as a single `float8[]` parameter.
///
/// Construction rejects empty input and any NaN or infinite component, so
/// every value of this type serializes to a well-formed pgvector literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryVector(Vec<f64>);

impl QueryVector {
    pub fn new(values: Vec<f64>) -> Result<Self, VectorError> {
        if values.is_empty() {
            return Err(VectorError::Empty);
        }
        if let Some((index, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(VectorError::NonFinite {
                index,
                value: *value,
            });
        }
        Ok(Self(values))
    }

    /// Accepts `[0.1, 0.2]` as well as the bare `0.1,0.2` form.
    pub fn parse_literal(input: &str) -> Result<Self, VectorError> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        if inner.trim().is_empty() {
            return Err(VectorError::Empty);
        }

        let values = inner
            .split(',')
            .enumerate()
            .map(|(index, raw)| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| VectorError::Unparsable {
                        index,
                        raw: raw.trim().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(values)
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl fmt::Display for QueryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn keeps_component_order() {
        let v = QueryVector::new(vec![0.5, -1.0, 3.25]).unwrap();
        assert_eq!(v.as_slice(), &[0.5, -1.0, 3.25]);
        assert_eq!(v.dimensions(), 3);
        assert_eq!(v.to_string(), "[0.5,-1,3.25]");
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(QueryVector::new(vec![]), Err(VectorError::Empty));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn non_finite_is_rejected(#[case] bad: f64) {
        match QueryVector::new(vec![1.0, bad]) {
            Err(VectorError::NonFinite { index: 1, .. }) => {}
            other => panic!("expected NonFinite at index 1, got {:?}", other),
        }
    }

    mod literal {
        use super::*;

        #[rstest]
        #[case("[1,2,3]")]
        #[case(" [1, 2, 3] ")]
        #[case("1,2,3")]
        fn parses_both_forms(#[case] input: &str) {
            let v = QueryVector::parse_literal(input).unwrap();
            assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
        }

        #[rstest]
        #[case("[]")]
        #[case("")]
        #[case("  ")]
        fn blank_is_empty(#[case] input: &str) {
            assert_eq!(QueryVector::parse_literal(input), Err(VectorError::Empty));
        }

        #[test]
        fn garbage_component_reports_position() {
            match QueryVector::parse_literal("[1,abc,3]") {
                Err(VectorError::Unparsable { index: 1, raw }) => assert_eq!(raw, "abc"),
                other => panic!("expected Unparsable, got {:?}", other),
            }
        }

        #[test]
        fn textual_nan_is_rejected() {
            assert!(matches!(
                QueryVector::parse_literal("[1, NaN]"),
                Err(VectorError::NonFinite { index: 1, .. })
            ));
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A three-state feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ternary {
    Negative,
    Undefined,
    Positive,
}

impl Ternary {
    /// Numeric projection used by vector metrics: -1, 0, +1
    #[inline]
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Ternary::Negative => -1.0,
            Ternary::Undefined => 0.0,
            Ternary::Positive => 1.0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_defined(self) -> bool {
        !matches!(self, Ternary::Undefined)
    }

    #[inline]
    #[must_use]
    pub fn is_positive(self) -> bool {
        matches!(self, Ternary::Positive)
    }

    /// Table cell representation
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Ternary::Negative => "-",
            Ternary::Undefined => "0",
            Ternary::Positive => "+",
        }
    }

    /// Parse a table cell. Blank, `0` and `n/a` are undefined.
    pub fn from_cell(cell: &str) -> Option<Self> {
        match cell.trim() {
            "+" | "1" | "+1" => Some(Ternary::Positive),
            "-" | "-1" | "\u{2212}" => Some(Ternary::Negative),
            "" | "0" | "n/a" | "NA" => Some(Ternary::Undefined),
            _ => None,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Ternary::Positive
        } else {
            Ternary::Negative
        }
    }
}

impl From<Option<bool>> for Ternary {
    fn from(value: Option<bool>) -> Self {
        value.map(Ternary::from).unwrap_or(Ternary::Undefined)
    }
}

impl fmt::Display for Ternary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Ternary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Ternary::from_cell(s) {
            Some(value) => Ok(value),
            None => match s.trim().to_ascii_lowercase().as_str() {
                "positive" | "true" => Ok(Ternary::Positive),
                "negative" | "false" => Ok(Ternary::Negative),
                "undefined" | "none" => Ok(Ternary::Undefined),
                other => Err(format!("invalid ternary value '{}'", other)),
            },
        }
    }
}

/// Ordered ternary values of one symbol, laid out in its feature system's column order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<Ternary>,
}

impl FeatureVector {
    #[inline]
    #[must_use]
    pub fn new(values: Vec<Ternary>) -> Self {
        Self { values }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(values: &[Ternary]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Ternary] {
        &self.values
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Ternary> {
        self.values.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ternary> + '_ {
        self.values.iter().copied()
    }

    /// Numeric projection (-1/0/+1 per position)
    #[must_use]
    pub fn to_numeric(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.as_f64()).collect()
    }

    /// Indices of positive-valued features
    pub fn positive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_positive())
            .map(|(i, _)| i)
    }

    /// Euclidean norm of the numeric projection
    #[inline]
    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|v| v.as_f64() * v.as_f64())
            .sum::<f64>()
            .sqrt()
    }

    /// Dot product of the numeric projections
    #[inline]
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a.as_f64() * b.as_f64())
            .sum()
    }
}

impl From<Vec<Ternary>> for FeatureVector {
    fn from(values: Vec<Ternary>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in &self.values {
            f.write_str(value.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parsing() {
        assert_eq!(Ternary::from_cell("+"), Some(Ternary::Positive));
        assert_eq!(Ternary::from_cell("-"), Some(Ternary::Negative));
        assert_eq!(Ternary::from_cell(""), Some(Ternary::Undefined));
        assert_eq!(Ternary::from_cell(" 0 "), Some(Ternary::Undefined));
        assert_eq!(Ternary::from_cell("maybe"), None);
    }

    #[test]
    fn test_ternary_is_not_bool() {
        assert_ne!(Ternary::Undefined, Ternary::Negative);
        assert_eq!(Ternary::from(None), Ternary::Undefined);
        assert_eq!(Ternary::from(Some(false)), Ternary::Negative);
        assert_eq!("positive".parse::<Ternary>().unwrap(), Ternary::Positive);
    }

    #[test]
    fn test_numeric_projection() {
        let v = FeatureVector::new(vec![Ternary::Positive, Ternary::Undefined, Ternary::Negative]);
        assert_eq!(v.to_numeric(), vec![1.0, 0.0, -1.0]);
        assert!((v.norm() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(v.positive_indices().collect::<Vec<_>>(), vec![0]);
        assert_eq!(v.to_string(), "+0-");
    }
}

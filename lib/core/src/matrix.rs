//! Square distance matrix over an ordered label list

use crate::error::{FormatError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct DistanceMatrix {
    labels: Vec<String>,
    /// Row-major, `labels.len()²` entries
    data: Vec<f64>,
}

// Unchecked wire form, validated into a `DistanceMatrix`
#[derive(Deserialize)]
struct RawMatrix {
    labels: Vec<String>,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for DistanceMatrix {
    type Error = FormatError;

    fn try_from(raw: RawMatrix) -> std::result::Result<Self, FormatError> {
        let n = raw.labels.len();
        if raw.data.len() != n * n {
            return Err(FormatError::NotSquare {
                labels: n,
                rows: if n == 0 { 0 } else { raw.data.len() / n },
                width: n,
            });
        }
        Ok(Self {
            labels: raw.labels,
            data: raw.data,
        })
    }
}

impl DistanceMatrix {
    /// All-zero matrix over `labels`
    pub fn zeros(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            data: vec![0.0; n * n],
        }
    }

    /// Build from rows; fails unless there is one row of `labels.len()` values per label
    pub fn from_rows(labels: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = labels.len();
        if rows.len() != n || rows.iter().any(|row| row.len() != n) {
            return Err(FormatError::NotSquare {
                labels: n,
                rows: rows.len(),
                width: rows.iter().map(|row| row.len()).max().unwrap_or(0),
            }
            .into());
        }
        Ok(Self {
            labels,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// # Panics
    /// If either index is out of bounds. See [`DistanceMatrix::try_get`].
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let n = self.len();
        assert!(row < n && col < n, "index ({}, {}) out of bounds for {}x{} matrix", row, col, n, n);
        self.data[row * n + col]
    }

    /// Value at `(row, col)`, or `None` when either index is out of bounds
    pub fn try_get(&self, row: usize, col: usize) -> Option<f64> {
        let n = self.len();
        if row < n && col < n {
            Some(self.data[row * n + col])
        } else {
            None
        }
    }

    /// # Panics
    /// If either index is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let n = self.len();
        assert!(row < n && col < n, "index ({}, {}) out of bounds for {}x{} matrix", row, col, n, n);
        self.data[row * n + col] = value;
    }

    /// Set both `(row, col)` and `(col, row)`
    pub fn set_symmetric(&mut self, row: usize, col: usize, value: f64) {
        self.set(row, col, value);
        self.set(col, row, value);
    }

    pub fn get_by_label(&self, a: &str, b: &str) -> Option<f64> {
        self.try_get(self.index_of(a)?, self.index_of(b)?)
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.len();
        &self.data[row * n..(row + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, so an empty matrix yields no rows
        self.data.chunks(self.len().max(1))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let n = self.len();
        (0..n).all(|i| (i + 1..n).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tolerance))
    }

    /// Smallest off-diagonal value
    pub fn min(&self) -> Option<f64> {
        self.off_diagonal().reduce(f64::min)
    }

    /// Largest off-diagonal value
    pub fn max(&self) -> Option<f64> {
        self.off_diagonal().reduce(f64::max)
    }

    /// Mean off-diagonal value
    pub fn mean(&self) -> Option<f64> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        let sum: f64 = self.off_diagonal().sum();
        Some(sum / (n * (n - 1)) as f64)
    }

    fn off_diagonal(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.len();
        self.data
            .iter()
            .enumerate()
            .filter(move |(idx, _)| idx / n != idx % n)
            .map(|(_, value)| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_symmetric_fill() {
        let mut matrix = DistanceMatrix::zeros(labels(&["p", "b", "t"]));
        matrix.set_symmetric(0, 1, 0.25);
        matrix.set_symmetric(0, 2, 0.5);
        matrix.set_symmetric(1, 2, 0.75);

        assert!(matrix.is_symmetric(0.0));
        assert_eq!(matrix.get_by_label("t", "b"), Some(0.75));
        assert_eq!(matrix.row(0), &[0.0, 0.25, 0.5]);
        assert_eq!(matrix.min(), Some(0.25));
        assert_eq!(matrix.max(), Some(0.75));
        assert!((matrix.mean().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(matrix.rows().count(), 3);
    }

    #[test]
    fn test_from_rows_requires_square() {
        let err = DistanceMatrix::from_rows(labels(&["a", "b"]), vec![vec![0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::NotSquare { labels: 2, rows: 1, width: 2 })));

        let ok = DistanceMatrix::from_rows(labels(&["a", "b"]), vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn test_checked_access() {
        let matrix = DistanceMatrix::zeros(labels(&["a", "b"]));
        assert_eq!(matrix.try_get(1, 1), Some(0.0));
        assert_eq!(matrix.try_get(0, 2), None);
        assert_eq!(matrix.try_get(2, 0), None);
    }

    #[test]
    #[should_panic]
    fn test_get_rejects_column_overflow() {
        // (0, 2) would otherwise land on (1, 0)
        DistanceMatrix::zeros(labels(&["a", "b"])).get(0, 2);
    }

    #[test]
    fn test_deserialize_validates_shape() {
        let matrix = DistanceMatrix::from_rows(labels(&["a", "b"]), vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let json = serde_json::to_string(&matrix).unwrap();
        let back: DistanceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, matrix);

        let ragged = r#"{"labels": ["a", "b"], "data": [0.0, 1.0, 1.0]}"#;
        let err = serde_json::from_str::<DistanceMatrix>(ragged).unwrap_err();
        assert!(err.to_string().contains("square"), "{}", err);
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = DistanceMatrix::zeros(Vec::new());
        assert!(matrix.is_empty());
        assert_eq!(matrix.rows().count(), 0);
        assert_eq!(matrix.max(), None);
        assert_eq!(matrix.mean(), None);
    }
}

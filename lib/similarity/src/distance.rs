//! Distance metrics between feature vectors
//!
//! Every metric works on the numeric projection of ternary values
//! (`+1 / -1 / 0`) or on the set of positive-valued features. How each one
//! treats undefined values is fixed here and covered by tests:
//!
//! | Metric      | Undefined values                          | `normalize`      |
//! |-------------|-------------------------------------------|------------------|
//! | `hamming`   | a position counts only if both are defined | ÷ feature count  |
//! | `jaccard`   | never positive                            | already in [0,1] |
//! | `euclidean` | projected to 0                            | ÷ 2·√n           |
//! | `manhattan` | projected to 0                            | ÷ 2·n            |
//! | `cosine`    | projected to 0                            | already bounded  |
//! | `kmeans`    | projected to 0                            | already in [0,1] |

use crate::kmeans::ClusterModel;
use phonodist_core::{FeatureVector, RegistryError, Result};

/// Per-call parameters handed to a metric
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricParams<'a> {
    pub normalize: bool,
    /// Trained model, present for metrics that require training
    pub model: Option<&'a ClusterModel>,
}

impl<'a> MetricParams<'a> {
    pub fn new(normalize: bool) -> Self {
        Self {
            normalize,
            model: None,
        }
    }

    pub fn with_model(mut self, model: &'a ClusterModel) -> Self {
        self.model = Some(model);
        self
    }
}

/// A distance function over vectors of one feature system
pub trait DistanceMetric: Send + Sync {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64>;

    /// Whether a [`ClusterModel`] must be trained before use
    fn requires_training(&self) -> bool {
        false
    }

    /// Whether `distance(a, b) == distance(b, a)` is guaranteed
    fn is_symmetric(&self) -> bool {
        true
    }
}

/// Count of positions where both values are defined and differ
///
/// # Arguments
/// * `a` - First feature vector
/// * `b` - Second feature vector
/// * `normalize` - Divide by the total feature count
pub fn hamming_distance(a: &FeatureVector, b: &FeatureVector, normalize: bool) -> f64 {
    let count = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_defined() && y.is_defined() && x != y)
        .count() as f64;
    if normalize {
        scale(count, a.dim() as f64)
    } else {
        count
    }
}

/// 1 − |A∩B| / |A∪B| over positive-valued features, 0 when the union is empty
pub fn jaccard_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let (mut intersection, mut union) = (0usize, 0usize);
    for (x, y) in a.iter().zip(b.iter()) {
        match (x.is_positive(), y.is_positive()) {
            (true, true) => {
                intersection += 1;
                union += 1;
            }
            (true, false) | (false, true) => union += 1,
            (false, false) => {}
        }
    }
    if union == 0 {
        0.0
    } else {
        1.0 - intersection as f64 / union as f64
    }
}

/// L2 norm of the numeric difference
pub fn euclidean_distance(a: &FeatureVector, b: &FeatureVector, normalize: bool) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x.as_f64() - y.as_f64();
            d * d
        })
        .sum();
    let dist = sum.sqrt();
    if normalize {
        scale(dist, 2.0 * (a.dim() as f64).sqrt())
    } else {
        dist
    }
}

/// L1 norm of the numeric difference
pub fn manhattan_distance(a: &FeatureVector, b: &FeatureVector, normalize: bool) -> f64 {
    let dist: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x.as_f64() - y.as_f64()).abs())
        .sum();
    if normalize {
        scale(dist, 2.0 * a.dim() as f64)
    } else {
        dist
    }
}

/// 1 − cosine similarity.
///
/// Identical vectors are at distance 0 even when both are all-undefined; a
/// zero-norm vector is at distance 1 from anything different.
pub fn cosine_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    if a == b {
        return 0.0;
    }
    let (norm_a, norm_b) = (a.norm(), b.norm());
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - a.dot(b) / (norm_a * norm_b)).max(0.0)
}

fn scale(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hamming;

impl DistanceMetric for Hamming {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64> {
        Ok(hamming_distance(a, b, params.normalize))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl DistanceMetric for Jaccard {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, _params: &MetricParams<'_>) -> Result<f64> {
        Ok(jaccard_distance(a, b))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl DistanceMetric for Euclidean {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64> {
        Ok(euclidean_distance(a, b, params.normalize))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl DistanceMetric for Manhattan {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64> {
        Ok(manhattan_distance(a, b, params.normalize))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl DistanceMetric for Cosine {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, _params: &MetricParams<'_>) -> Result<f64> {
        Ok(cosine_distance(a, b))
    }
}

/// Centroid separation of the clusters two vectors fall into
#[derive(Debug, Clone, Copy, Default)]
pub struct KMeansDistance;

impl DistanceMetric for KMeansDistance {
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64> {
        let model = params
            .model
            .ok_or_else(|| RegistryError::Untrained("kmeans".to_string()))?;
        Ok(model.distance(a, b))
    }

    fn requires_training(&self) -> bool {
        true
    }
}

/// A plain closure registered as a metric.
///
/// With `normalize` the raw value is divided by the feature count. Closures
/// are not assumed symmetric.
pub struct FnMetric<F> {
    func: F,
}

impl<F> FnMetric<F>
where
    F: Fn(&FeatureVector, &FeatureVector) -> f64 + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> DistanceMetric for FnMetric<F>
where
    F: Fn(&FeatureVector, &FeatureVector) -> f64 + Send + Sync,
{
    fn distance(&self, a: &FeatureVector, b: &FeatureVector, params: &MetricParams<'_>) -> Result<f64> {
        let raw = (self.func)(a, b);
        Ok(if params.normalize {
            scale(raw, a.dim() as f64)
        } else {
            raw
        })
    }

    fn is_symmetric(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonodist_core::{Error, Ternary};

    fn vector(cells: &str) -> FeatureVector {
        FeatureVector::new(
            cells
                .chars()
                .map(|c| match c {
                    '+' => Ternary::Positive,
                    '-' => Ternary::Negative,
                    _ => Ternary::Undefined,
                })
                .collect(),
        )
    }

    #[test]
    fn test_hamming_ignores_undefined() {
        let a = vector("++-0");
        let b = vector("+--+");
        assert_eq!(hamming_distance(&a, &b, false), 1.0);
        assert_eq!(hamming_distance(&a, &b, true), 0.25);
        assert_eq!(hamming_distance(&a, &vector("0000"), false), 0.0);
    }

    #[test]
    fn test_jaccard_positive_sets() {
        assert_eq!(jaccard_distance(&vector("++-"), &vector("+-+")), 1.0 - 1.0 / 3.0);
        // No positive values anywhere
        assert_eq!(jaccard_distance(&vector("--0"), &vector("-0-")), 0.0);
        assert_eq!(jaccard_distance(&vector("+0-"), &vector("+--")), 0.0);
    }

    #[test]
    fn test_euclidean_and_manhattan_bounds() {
        let a = vector("++++");
        let b = vector("----");
        assert_eq!(euclidean_distance(&a, &b, false), 4.0);
        assert_eq!(euclidean_distance(&a, &b, true), 1.0);
        assert_eq!(manhattan_distance(&a, &b, false), 8.0);
        assert_eq!(manhattan_distance(&a, &b, true), 1.0);

        // Undefined sits halfway
        let c = vector("0000");
        assert_eq!(manhattan_distance(&a, &c, true), 0.5);
    }

    #[test]
    fn test_cosine_edge_cases() {
        let zero = vector("000");
        assert_eq!(cosine_distance(&zero, &zero), 0.0);
        assert_eq!(cosine_distance(&zero, &vector("+00")), 1.0);
        assert_eq!(cosine_distance(&vector("+-+"), &vector("+-+")), 0.0);
        assert!((cosine_distance(&vector("+0"), &vector("0+")) - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&vector("+"), &vector("-")) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_kmeans_requires_model() {
        let err = KMeansDistance
            .distance(&vector("+"), &vector("-"), &MetricParams::new(true))
            .unwrap_err();
        assert_eq!(err, Error::Registry(RegistryError::Untrained("kmeans".to_string())));
        assert!(KMeansDistance.requires_training());
    }

    #[test]
    fn test_fn_metric_normalizes_by_dim() {
        let metric = FnMetric::new(|a: &FeatureVector, b: &FeatureVector| {
            a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as f64
        });
        let a = vector("+-0+");
        let b = vector("+--+");
        assert_eq!(metric.distance(&a, &b, &MetricParams::new(false)).unwrap(), 1.0);
        assert_eq!(metric.distance(&a, &b, &MetricParams::new(true)).unwrap(), 0.25);
        assert!(!metric.is_symmetric());
    }
}

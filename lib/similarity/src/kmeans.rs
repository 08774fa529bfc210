//! K-means clustering over a feature system
//!
//! Training runs Lloyd's algorithm from k-means++ seeds several times with a
//! seeded `StdRng` and keeps the lowest-inertia run, so the same system and
//! cluster count always give the same model.

use ahash::AHashMap;
use parking_lot::Mutex;
use phonodist_core::{DataError, FeatureSystem, FeatureVector, InitStatus, Result, SingleFlight};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_RESTARTS: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KMeansOptions {
    pub clusters: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
}

impl KMeansOptions {
    pub fn new(clusters: usize) -> Self {
        Self {
            clusters,
            seed: DEFAULT_SEED,
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Trained centroids plus the largest distance between any two of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    centroids: Vec<Vec<f64>>,
    max_separation: f64,
    inertia: f64,
}

impl ClusterModel {
    /// Train on every vector of `system` with `min(clusters, system.len())` clusters
    pub fn train(system: &FeatureSystem, clusters: usize) -> Result<Self> {
        let points: Vec<Vec<f64>> = system.iter().map(|(_, v)| v.to_numeric()).collect();
        let model = Self::fit(&points, &KMeansOptions::new(clusters)).ok_or_else(|| {
            DataError::EmptySystem {
                system: system.name().to_string(),
            }
        })?;
        tracing::info!(
            "Trained k-means model for '{}': k={}, inertia={:.4}",
            system.name(),
            model.k(),
            model.inertia
        );
        Ok(model)
    }

    /// Fit raw points; `None` when there are no points
    pub fn fit(points: &[Vec<f64>], options: &KMeansOptions) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let k = options.clusters.clamp(1, points.len());
        let mut rng = StdRng::seed_from_u64(options.seed);

        let mut best: Option<(Vec<Vec<f64>>, f64)> = None;
        for _ in 0..options.restarts.max(1) {
            let seeds = seed_centroids(points, k, &mut rng);
            let (centroids, inertia) = lloyd(points, seeds, options.max_iterations);
            if best.as_ref().map_or(true, |(_, b)| inertia < *b) {
                best = Some((centroids, inertia));
            }
        }
        let (centroids, inertia) = best?;

        let mut max_separation: f64 = 0.0;
        for i in 0..centroids.len() {
            for j in i + 1..centroids.len() {
                max_separation = max_separation.max(squared_distance(&centroids[i], &centroids[j]).sqrt());
            }
        }

        Some(Self {
            centroids,
            max_separation,
            inertia,
        })
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Nearest centroid; ties go to the lowest index
    pub fn predict(&self, vector: &FeatureVector) -> usize {
        nearest(&self.centroids, &vector.to_numeric()).0
    }

    /// Centroid distance of the two vectors' clusters, scaled by the largest
    /// centroid separation (0 when every centroid coincides)
    pub fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        let (ca, cb) = (self.predict(a), self.predict(b));
        if ca == cb || self.max_separation == 0.0 {
            return 0.0;
        }
        squared_distance(&self.centroids[ca], &self.centroids[cb]).sqrt() / self.max_separation
    }
}

// k-means++: first seed uniform, then proportional to squared distance
fn seed_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.random_range(0..points.len())].clone()];
    let mut weights: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.random_range(0..points.len())
        };
        centroids.push(points[next].clone());
        for (w, p) in weights.iter_mut().zip(points) {
            *w = w.min(squared_distance(p, &centroids[centroids.len() - 1]));
        }
    }
    centroids
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iterations: usize) -> (Vec<Vec<f64>>, f64) {
    let dim = points[0].len();
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(&centroids, p).0).collect();

    for _ in 0..max_iterations {
        let mut sums = vec![vec![0.0; dim]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (p, &c) in points.iter().zip(&assignments) {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(p) {
                *s += x;
            }
        }
        // An emptied cluster keeps its previous centroid
        for (c, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
            if count > 0 {
                centroids[c] = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(&centroids, p).0).collect();
        if next == assignments {
            break;
        }
        assignments = next;
    }

    let inertia: f64 = points.iter().map(|p| nearest(&centroids, p).1).sum();
    (centroids, inertia)
}

fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, point);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Trained models keyed by (system identity, cluster count).
///
/// Each key owns a [`SingleFlight`] cell, so concurrent first requests for
/// the same key train once.
#[derive(Default)]
pub struct ModelStore {
    models: Mutex<AHashMap<(Uuid, usize), Arc<SingleFlight<ClusterModel>>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for `system` with `min(clusters, system.len())` clusters
    pub fn get_or_train(&self, system: &FeatureSystem, clusters: usize) -> Result<Arc<ClusterModel>> {
        let cell = self.cell(system, clusters);
        cell.get_or_try_init(|| ClusterModel::train(system, clusters))
    }

    pub fn status(&self, system: &FeatureSystem, clusters: usize) -> InitStatus {
        let key = (system.id(), effective_clusters(system, clusters));
        self.models
            .lock()
            .get(&key)
            .map_or(InitStatus::Uninitialized, |cell| cell.status())
    }

    pub fn len(&self) -> usize {
        self.models.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.lock().is_empty()
    }

    pub fn clear(&self) {
        self.models.lock().clear();
    }

    /// Drop every model trained for the system with identity `system_id`
    pub fn evict(&self, system_id: Uuid) -> usize {
        let mut models = self.models.lock();
        let before = models.len();
        models.retain(|(id, _), _| *id != system_id);
        before - models.len()
    }

    fn cell(&self, system: &FeatureSystem, clusters: usize) -> Arc<SingleFlight<ClusterModel>> {
        let key = (system.id(), effective_clusters(system, clusters));
        self.models.lock().entry(key).or_default().clone()
    }
}

/// Cluster count actually trained for `system`
pub fn effective_clusters(system: &FeatureSystem, clusters: usize) -> usize {
    clusters.clamp(1, system.len().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonodist_core::{Ternary, TableFormat};

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![-1.0, -1.0],
            vec![-0.9, -1.0],
            vec![-1.0, -0.9],
            vec![1.0, 1.0],
            vec![0.9, 1.0],
            vec![1.0, 0.9],
        ]
    }

    #[test]
    fn test_fit_separates_blobs() {
        let model = ClusterModel::fit(&blobs(), &KMeansOptions::new(2)).unwrap();
        assert_eq!(model.k(), 2);
        let near = FeatureVector::new(vec![Ternary::Negative, Ternary::Negative]);
        let far = FeatureVector::new(vec![Ternary::Positive, Ternary::Positive]);
        assert_ne!(model.predict(&near), model.predict(&far));
        assert_eq!(model.distance(&near, &far), 1.0);
        assert_eq!(model.distance(&near, &near), 0.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let options = KMeansOptions::new(3);
        let first = ClusterModel::fit(&blobs(), &options).unwrap();
        let second = ClusterModel::fit(&blobs(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clusters_clamped_to_points() {
        let model = ClusterModel::fit(&blobs()[..2], &KMeansOptions::new(12)).unwrap();
        assert_eq!(model.k(), 2);
        assert!(ClusterModel::fit(&[], &KMeansOptions::new(2)).is_none());
    }

    #[test]
    fn test_store_trains_once_per_key() {
        let system = FeatureSystem::bundled().unwrap();
        let store = ModelStore::new();
        assert_eq!(store.status(&system, 4), InitStatus::Uninitialized);

        let a = store.get_or_train(&system, 4).unwrap();
        let b = store.get_or_train(&system, 4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.status(&system, 4), InitStatus::Ready);

        let c = store.get_or_train(&system, 5).unwrap();
        assert_eq!(c.k(), 5);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_clamps_small_systems() {
        let text = "sound\tvoice\np\t-\nb\t+\n";
        let system = FeatureSystem::parse("pair", text, &TableFormat::tsv()).unwrap();
        let store = ModelStore::new();
        let model = store.get_or_train(&system, 12).unwrap();
        assert_eq!(model.k(), 2);
        // 12 and 2 resolve to the same trained model
        assert!(Arc::ptr_eq(&model, &store.get_or_train(&system, 2).unwrap()));
    }

    #[test]
    fn test_store_evicts_one_system() {
        let text = "sound\tvoice\tnasal\np\t-\t-\nb\t+\t-\nm\t+\t+\n";
        let kept = FeatureSystem::parse("kept", text, &TableFormat::tsv()).unwrap();
        let dropped = FeatureSystem::parse("dropped", text, &TableFormat::tsv()).unwrap();
        let store = ModelStore::new();
        store.get_or_train(&kept, 2).unwrap();
        store.get_or_train(&dropped, 2).unwrap();
        store.get_or_train(&dropped, 3).unwrap();

        assert_eq!(store.evict(dropped.id()), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.status(&kept, 2), InitStatus::Ready);
        assert_eq!(store.status(&dropped, 2), InitStatus::Uninitialized);
    }
}

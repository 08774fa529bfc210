//! Named distance metrics
//!
//! Every registration is stamped with a revision from a counter that only
//! grows, so cached results computed with a replaced metric can never be
//! mistaken for results of its successor.

use crate::distance::{Cosine, DistanceMetric, Euclidean, FnMetric, Hamming, Jaccard, KMeansDistance, Manhattan};
use ahash::AHashMap;
use parking_lot::RwLock;
use phonodist_core::{FeatureVector, RegistryError, Result};
use std::sync::Arc;

pub const BUILTIN_METHODS: [&str; 6] = ["hamming", "jaccard", "euclidean", "manhattan", "cosine", "kmeans"];

/// A metric as stored in the registry
#[derive(Clone)]
pub struct RegisteredMetric {
    pub name: String,
    pub metric: Arc<dyn DistanceMetric>,
    pub revision: u64,
}

impl std::fmt::Debug for RegisteredMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredMetric")
            .field("name", &self.name)
            .field("revision", &self.revision)
            .field("requires_training", &self.metric.requires_training())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    metrics: AHashMap<String, RegisteredMetric>,
    next_revision: u64,
}

#[derive(Default)]
pub struct MetricRegistry {
    inner: RwLock<Inner>,
}

impl MetricRegistry {
    /// Registry holding the built-in metrics
    pub fn new() -> Self {
        let registry = Self::empty();
        let builtins: [(&str, Arc<dyn DistanceMetric>); 6] = [
            ("hamming", Arc::new(Hamming)),
            ("jaccard", Arc::new(Jaccard)),
            ("euclidean", Arc::new(Euclidean)),
            ("manhattan", Arc::new(Manhattan)),
            ("cosine", Arc::new(Cosine)),
            ("kmeans", Arc::new(KMeansDistance)),
        ];
        {
            let mut inner = registry.inner.write();
            for (name, metric) in builtins {
                insert(&mut inner, name, metric);
            }
        }
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a metric under `name`.
    ///
    /// # Errors
    /// [`RegistryError::Conflict`] if the name is taken and `replace` is false.
    ///
    /// # Returns
    /// The revision assigned to this registration
    pub fn register(&self, name: &str, metric: Arc<dyn DistanceMetric>, replace: bool) -> Result<u64> {
        let mut inner = self.inner.write();
        if inner.metrics.contains_key(name) && !replace {
            return Err(RegistryError::Conflict(name.to_string()).into());
        }
        let revision = insert(&mut inner, name, metric);
        tracing::debug!("Registered distance method '{}' (revision {})", name, revision);
        Ok(revision)
    }

    /// Register a plain function of two vectors
    pub fn register_fn<F>(&self, name: &str, func: F, replace: bool) -> Result<u64>
    where
        F: Fn(&FeatureVector, &FeatureVector) -> f64 + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnMetric::new(func)), replace)
    }

    pub fn get(&self, name: &str) -> Result<RegisteredMetric> {
        self.inner
            .read()
            .metrics
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().metrics.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<RegisteredMetric> {
        self.inner.write().metrics.remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().metrics.keys().cloned().collect();
        names.sort();
        names
    }
}

fn insert(inner: &mut Inner, name: &str, metric: Arc<dyn DistanceMetric>) -> u64 {
    inner.next_revision += 1;
    let revision = inner.next_revision;
    inner.metrics.insert(
        name.to_string(),
        RegisteredMetric {
            name: name.to_string(),
            metric,
            revision,
        },
    );
    revision
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonodist_core::Error;

    #[test]
    fn test_builtins_registered() {
        let registry = MetricRegistry::new();
        let mut expected: Vec<String> = BUILTIN_METHODS.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(registry.names(), expected);
        assert!(registry.get("kmeans").unwrap().metric.requires_training());
    }

    #[test]
    fn test_conflict_without_replace() {
        let registry = MetricRegistry::new();
        let err = registry.register_fn("hamming", |_, _| 0.0, false).unwrap_err();
        assert_eq!(err, Error::Registry(RegistryError::Conflict("hamming".to_string())));

        let before = registry.get("hamming").unwrap().revision;
        let after = registry.register_fn("hamming", |_, _| 0.0, true).unwrap();
        assert!(after > before);
        assert_eq!(registry.get("hamming").unwrap().revision, after);
    }

    #[test]
    fn test_unknown_method() {
        let registry = MetricRegistry::empty();
        assert!(matches!(
            registry.get("hamming"),
            Err(Error::Registry(RegistryError::Unknown(name))) if name == "hamming"
        ));
        registry.register_fn("constant", |_, _| 1.0, false).unwrap();
        assert_eq!(registry.names(), vec!["constant"]);
    }
}

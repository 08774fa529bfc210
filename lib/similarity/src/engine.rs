//! Pairwise distance engine
//!
//! A [`DistanceEngine`] binds one feature system to a configuration, a
//! metric registry and a model store. Those three are shared (`Arc`) so that
//! several engines of one context see the same settings and registrations.

use crate::cache::{CacheStats, PairCache, PairKey};
use crate::distance::{DistanceMetric, MetricParams};
use crate::kmeans::{effective_clusters, ClusterModel, ModelStore};
use crate::registry::MetricRegistry;
use phonodist_core::{ConfigStore, FeatureSystem, FeatureVector, Result};
use std::sync::Arc;

/// A metric resolved against the current configuration, ready to run.
///
/// Trained metrics carry their model, so preparing once before a batch keeps
/// training out of the hot loop.
#[derive(Clone)]
pub struct PreparedMetric {
    method: String,
    metric: Arc<dyn DistanceMetric>,
    revision: u64,
    normalize: bool,
    model: Option<Arc<ClusterModel>>,
}

impl PreparedMetric {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn is_symmetric(&self) -> bool {
        self.metric.is_symmetric()
    }

    pub fn model(&self) -> Option<&ClusterModel> {
        self.model.as_deref()
    }

    fn key(&self, a: &str, b: &str) -> PairKey {
        PairKey::new(
            a,
            b,
            &self.method,
            self.revision,
            self.normalize,
            self.model.as_ref().map(|m| m.k()),
            self.is_symmetric(),
        )
    }
}

pub struct DistanceEngine {
    system: Arc<FeatureSystem>,
    config: Arc<ConfigStore>,
    registry: Arc<MetricRegistry>,
    models: Arc<ModelStore>,
    cache: PairCache,
}

impl DistanceEngine {
    pub fn new(
        system: Arc<FeatureSystem>,
        config: Arc<ConfigStore>,
        registry: Arc<MetricRegistry>,
        models: Arc<ModelStore>,
    ) -> Self {
        let cache = PairCache::new(config.cache_size());
        Self {
            system,
            config,
            registry,
            models,
            cache,
        }
    }

    /// Engine with its own default configuration and built-in metrics
    pub fn standalone(system: Arc<FeatureSystem>) -> Self {
        Self::new(
            system,
            Arc::new(ConfigStore::new()),
            Arc::new(MetricRegistry::new()),
            Arc::new(ModelStore::new()),
        )
    }

    pub fn system(&self) -> &Arc<FeatureSystem> {
        &self.system
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Distance between two symbols.
    ///
    /// # Arguments
    /// * `a`, `b` - Raw symbols, normalized before lookup
    /// * `method` - Registered metric name; the configured default when `None`
    /// * `normalize` - Scale into [0, 1]; the configured default when `None`
    ///
    /// # Returns
    /// `Ok(None)` when a symbol is unknown and `on_error` is `warn` or `ignore`
    pub fn calculate_distance(
        &self,
        a: &str,
        b: &str,
        method: Option<&str>,
        normalize: Option<bool>,
    ) -> Result<Option<f64>> {
        let prepared = self.prepare(method, normalize)?;
        let on_error = self.config.on_error();
        let Some(left) = self.system.entry(a, on_error)? else {
            return Ok(None);
        };
        let Some(right) = self.system.entry(b, on_error)? else {
            return Ok(None);
        };
        self.distance_prepared(&prepared, left, right).map(Some)
    }

    /// Resolve `method` and `normalize` against the configuration and train
    /// the clustering model if the metric needs one
    pub fn prepare(&self, method: Option<&str>, normalize: Option<bool>) -> Result<PreparedMetric> {
        self.cache.resize(self.config.cache_size());

        let method = match method {
            Some(method) => method.to_string(),
            None => self.config.default_distance_method(),
        };
        let normalize = normalize.unwrap_or_else(|| self.config.default_normalize());
        let registered = self.registry.get(&method)?;
        let model = if registered.metric.requires_training() {
            Some(self.model()?)
        } else {
            None
        };

        Ok(PreparedMetric {
            method,
            metric: registered.metric,
            revision: registered.revision,
            normalize,
            model,
        })
    }

    /// Distance between two canonical entries of this engine's system.
    /// A symbol is always at distance 0 from itself, whatever the metric.
    pub fn distance_prepared(
        &self,
        prepared: &PreparedMetric,
        a: (&str, &FeatureVector),
        b: (&str, &FeatureVector),
    ) -> Result<f64> {
        if a.0 == b.0 {
            return Ok(0.0);
        }
        let key = prepared.key(a.0, b.0);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let mut params = MetricParams::new(prepared.normalize);
        if let Some(model) = prepared.model() {
            params = params.with_model(model);
        }
        let value = prepared.metric.distance(a.1, b.1, &params)?;
        self.cache.put(key, value);
        Ok(value)
    }

    /// The clustering model for the configured cluster count
    pub fn model(&self) -> Result<Arc<ClusterModel>> {
        self.models
            .get_or_train(&self.system, self.config.kmeans_clusters())
    }

    /// Cluster count a trained metric would use right now
    pub fn effective_clusters(&self) -> usize {
        effective_clusters(&self.system, self.config.kmeans_clusters())
    }

    pub fn register_distance_method<F>(&self, name: &str, func: F, replace: bool) -> Result<u64>
    where
        F: Fn(&FeatureVector, &FeatureVector) -> f64 + Send + Sync + 'static,
    {
        self.registry.register_fn(name, func, replace)
    }

    pub fn register_metric(&self, name: &str, metric: Arc<dyn DistanceMetric>, replace: bool) -> Result<u64> {
        self.registry.register(name, metric, replace)
    }

    pub fn available_methods(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

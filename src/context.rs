//! The `Phonodist` context
//!
//! One context owns a configuration, a metric registry, a catalog of feature
//! systems and the trained models and engines built from them. Nothing is
//! global: two contexts with different settings can live side by side.

use ahash::AHashMap;
use parking_lot::Mutex;
use phonodist_core::{
    class_features, minimal_matrix, Config, ConfigStore, DistanceMatrix, FeatureAssignment, FeatureSystem,
    FeatureVector, MinimalMatrix, Result, SystemCatalog, Ternary,
};
use phonodist_similarity::{build_distance_matrix, CacheStats, DistanceEngine, DistanceMetric, MetricRegistry, ModelStore};
use phonodist_storage::{load_config, load_distance_matrix, save_config, save_distance_matrix, MatrixFormat};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub struct Phonodist {
    config: Arc<ConfigStore>,
    registry: Arc<MetricRegistry>,
    catalog: SystemCatalog,
    models: Arc<ModelStore>,
    engines: Mutex<AHashMap<Uuid, Arc<DistanceEngine>>>,
}

impl Default for Phonodist {
    fn default() -> Self {
        Self::new()
    }
}

impl Phonodist {
    /// Context with default configuration and the bundled feature table
    pub fn new() -> Self {
        Self::from_parts(ConfigStore::new(), SystemCatalog::new())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self::from_parts(ConfigStore::with_config(config)?, SystemCatalog::new()))
    }

    /// Context whose default system comes from `loader` instead of the bundled table
    pub fn with_default_system<F>(loader: F) -> Self
    where
        F: Fn() -> Result<FeatureSystem> + Send + Sync + 'static,
    {
        Self::from_parts(ConfigStore::new(), SystemCatalog::with_default_loader(loader))
    }

    fn from_parts(config: ConfigStore, catalog: SystemCatalog) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(MetricRegistry::new()),
            catalog,
            models: Arc::new(ModelStore::new()),
            engines: Mutex::new(AHashMap::new()),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &SystemCatalog {
        &self.catalog
    }

    /// A feature system by name; the default one for `None`
    pub fn system(&self, name: Option<&str>) -> Result<Arc<FeatureSystem>> {
        self.catalog.get(name)
    }

    /// Load a custom feature table and register it under `name`.
    ///
    /// Replacing a system drops the engine and models built for the old one.
    pub fn load_feature_system<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        delimiter: char,
        symbol_column: Option<&str>,
    ) -> Result<Arc<FeatureSystem>> {
        let system = SystemCatalog::read_table(name, path, delimiter, symbol_column)?;
        self.register_feature_system(system)
    }

    pub fn register_feature_system(&self, system: FeatureSystem) -> Result<Arc<FeatureSystem>> {
        let (system, replaced) = self.catalog.swap(system)?;
        if let Some(old) = replaced {
            self.evict(&old);
        }
        Ok(system)
    }

    /// Unregister a custom system along with its engine and models
    pub fn remove_feature_system(&self, name: &str) -> Option<Arc<FeatureSystem>> {
        let removed = self.catalog.remove(name)?;
        self.evict(&removed);
        Some(removed)
    }

    fn evict(&self, system: &FeatureSystem) {
        let engine = self.engines.lock().remove(&system.id());
        let models = self.models.evict(system.id());
        tracing::debug!(
            "Evicted feature system '{}' ({} engine, {} models)",
            system.name(),
            usize::from(engine.is_some()),
            models
        );
    }

    /// Distance engine for a system, created on first use
    pub fn engine(&self, system: Option<&str>) -> Result<Arc<DistanceEngine>> {
        let system = self.system(system)?;
        let mut engines = self.engines.lock();
        let engine = engines.entry(system.id()).or_insert_with(|| {
            tracing::debug!("Creating distance engine for feature system '{}'", system.name());
            Arc::new(DistanceEngine::new(
                system.clone(),
                self.config.clone(),
                self.registry.clone(),
                self.models.clone(),
            ))
        });
        Ok(engine.clone())
    }

    /// Canonical form of a symbol under the default system's normalizer
    pub fn normalize(&self, symbol: &str) -> Result<String> {
        Ok(self.system(None)?.canonical(symbol))
    }

    /// Feature vector of a symbol in the default system, per the `on_error` setting
    pub fn lookup(&self, symbol: &str) -> Result<Option<FeatureVector>> {
        let system = self.system(None)?;
        Ok(system.lookup(symbol, self.config.on_error())?.cloned())
    }

    pub fn reverse_lookup<K: AsRef<str>>(&self, constraints: &[(K, Ternary)], drop_undefined: bool) -> Result<Vec<String>> {
        self.system(None)?.reverse_lookup(constraints, drop_undefined)
    }

    pub fn calculate_distance(
        &self,
        a: &str,
        b: &str,
        method: Option<&str>,
        normalize: Option<bool>,
    ) -> Result<Option<f64>> {
        self.engine(None)?.calculate_distance(a, b, method, normalize)
    }

    pub fn build_distance_matrix<S: AsRef<str>>(
        &self,
        symbols: Option<&[S]>,
        method: Option<&str>,
        normalize: Option<bool>,
    ) -> Result<DistanceMatrix> {
        build_distance_matrix(&*self.engine(None)?, symbols, method, normalize)
    }

    /// Save a matrix atomically.
    ///
    /// `precision = None` writes full precision, so a load gives back the
    /// same values. Use [`Phonodist::export_distance_matrix`] for rounded
    /// output.
    pub fn save_distance_matrix<P: AsRef<Path>>(
        &self,
        matrix: &DistanceMatrix,
        path: P,
        format: Option<MatrixFormat>,
        precision: Option<usize>,
    ) -> Result<()> {
        save_distance_matrix(matrix, path, format, precision)
    }

    /// Save a matrix rounded to the configured `default_precision`
    pub fn export_distance_matrix<P: AsRef<Path>>(
        &self,
        matrix: &DistanceMatrix,
        path: P,
        format: Option<MatrixFormat>,
    ) -> Result<()> {
        save_distance_matrix(matrix, path, format, Some(self.config.default_precision()))
    }

    pub fn load_distance_matrix<P: AsRef<Path>>(&self, path: P, format: Option<MatrixFormat>) -> Result<DistanceMatrix> {
        load_distance_matrix(path, format)
    }

    pub fn minimal_matrix<S: AsRef<str>>(&self, symbols: &[S], drop_undefined: bool) -> Result<MinimalMatrix> {
        minimal_matrix(&*self.system(None)?, symbols, drop_undefined, self.config.on_error())
    }

    pub fn class_features<S: AsRef<str>>(&self, symbols: &[S], drop_undefined: bool) -> Result<FeatureAssignment> {
        class_features(&*self.system(None)?, symbols, drop_undefined, self.config.on_error())
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

    pub fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.engine(None)?.cache_stats())
    }

    /// Drop cached distances of every engine and all trained models
    pub fn clear_caches(&self) {
        for engine in self.engines.lock().values() {
            engine.clear_cache();
        }
        self.models.clear();
    }

    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_config(&self.config, path)
    }

    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        load_config(&self.config, path)
    }
}

//! Named feature systems
//!
//! The catalog owns the lazily loaded default system plus any custom tables
//! loaded at runtime. Systems are handed out as `Arc`s and never mutated.

use crate::error::{DataError, LookupError, Result};
use crate::features::{FeatureSystem, TableFormat, DEFAULT_SYSTEM};
use crate::lazy::{InitStatus, SingleFlight};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

type Loader = Box<dyn Fn() -> Result<FeatureSystem> + Send + Sync>;

pub struct SystemCatalog {
    default: SingleFlight<FeatureSystem>,
    loader: Loader,
    custom: RwLock<AHashMap<String, Arc<FeatureSystem>>>,
}

impl Default for SystemCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemCatalog")
            .field("default", &self.default.status())
            .field("custom", &self.custom.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SystemCatalog {
    /// Catalog whose default system is the bundled table
    pub fn new() -> Self {
        Self::with_default_loader(FeatureSystem::bundled)
    }

    /// Catalog with a custom source for the default system
    pub fn with_default_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<FeatureSystem> + Send + Sync + 'static,
    {
        Self {
            default: SingleFlight::new(),
            loader: Box::new(loader),
            custom: RwLock::new(AHashMap::new()),
        }
    }

    /// The default system, loaded on first use
    pub fn default_system(&self) -> Result<Arc<FeatureSystem>> {
        self.default.get_or_try_init(|| {
            tracing::debug!("Loading default feature system");
            (self.loader)()
        })
    }

    pub fn default_status(&self) -> InitStatus {
        self.default.status()
    }

    /// Resolve a system by name; `None` and `"default"` give the default
    pub fn get(&self, name: Option<&str>) -> Result<Arc<FeatureSystem>> {
        match name {
            None | Some(DEFAULT_SYSTEM) => self.default_system(),
            Some(name) => self
                .custom
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| LookupError::UnknownSystem(name.to_string()).into()),
        }
    }

    /// Add or replace a custom system under its own name
    pub fn register(&self, system: FeatureSystem) -> Result<Arc<FeatureSystem>> {
        self.swap(system).map(|(system, _)| system)
    }

    /// Register `system` and hand back the one it replaced, if any.
    ///
    /// The default system's name is reserved: a custom table registered under
    /// it could never be reached through [`SystemCatalog::get`].
    pub fn swap(&self, system: FeatureSystem) -> Result<(Arc<FeatureSystem>, Option<Arc<FeatureSystem>>)> {
        if system.name() == DEFAULT_SYSTEM {
            return Err(DataError::ReservedName {
                system: system.name().to_string(),
            }
            .into());
        }
        let system = Arc::new(system);
        let replaced = self
            .custom
            .write()
            .insert(system.name().to_string(), system.clone());
        if replaced.is_some() {
            tracing::info!("Replaced feature system '{}'", system.name());
        }
        Ok((system, replaced))
    }

    /// Parse a table from disk and register it
    pub fn load_custom<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        delimiter: char,
        symbol_column: Option<&str>,
    ) -> Result<Arc<FeatureSystem>> {
        let system = Self::read_table(name, path, delimiter, symbol_column)?;
        self.register(system)
    }

    /// Parse a custom table without registering it
    pub fn read_table<P: AsRef<Path>>(
        name: &str,
        path: P,
        delimiter: char,
        symbol_column: Option<&str>,
    ) -> Result<FeatureSystem> {
        if name == DEFAULT_SYSTEM {
            return Err(DataError::ReservedName {
                system: name.to_string(),
            }
            .into());
        }
        let mut format = TableFormat::tsv().with_delimiter(delimiter);
        if let Some(column) = symbol_column {
            format = format.with_symbol_column(column);
        }
        FeatureSystem::from_path(name, path, &format)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<FeatureSystem>> {
        self.custom.write().remove(name)
    }

    /// Registered names, sorted, including the default
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.custom.read().keys().cloned().collect();
        names.push(DEFAULT_SYSTEM.to_string());
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataError, Error};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let catalog = SystemCatalog::with_default_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            FeatureSystem::bundled()
        });
        assert_eq!(catalog.default_status(), InitStatus::Uninitialized);

        let first = catalog.get(None).unwrap();
        let second = catalog.get(Some("default")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.default_status(), InitStatus::Ready);
    }

    #[test]
    fn test_default_failure_is_reported() {
        let catalog = SystemCatalog::with_default_loader(|| {
            Err(DataError::EmptySource { system: "default".into() }.into())
        });
        assert!(matches!(catalog.get(None), Err(Error::Data(_))));
        assert_eq!(catalog.default_status(), InitStatus::Failed);
    }

    #[test]
    fn test_load_custom_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "phoneme,voice,nasal").unwrap();
        writeln!(file, "m,+,+").unwrap();
        writeln!(file, "p,-,-").unwrap();
        file.flush().unwrap();

        let catalog = SystemCatalog::new();
        let system = catalog
            .load_custom("tiny", file.path(), ',', Some("phoneme"))
            .unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(catalog.names(), vec!["default", "tiny"]);
        assert!(Arc::ptr_eq(&system, &catalog.get(Some("tiny")).unwrap()));
        assert!(matches!(
            catalog.get(Some("missing")),
            Err(Error::Lookup(LookupError::UnknownSystem(_)))
        ));
    }

    #[test]
    fn test_default_name_is_reserved() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sound\tvoice").unwrap();
        writeln!(file, "p\t-").unwrap();
        file.flush().unwrap();

        let catalog = SystemCatalog::new();
        assert!(matches!(
            catalog.load_custom(DEFAULT_SYSTEM, file.path(), '\t', None),
            Err(Error::Data(DataError::ReservedName { .. }))
        ));
        let shadow = FeatureSystem::parse(DEFAULT_SYSTEM, "sound\tvoice\np\t-\n", &TableFormat::tsv()).unwrap();
        assert!(matches!(
            catalog.register(shadow),
            Err(Error::Data(DataError::ReservedName { .. }))
        ));
        assert_eq!(catalog.get(Some(DEFAULT_SYSTEM)).unwrap().dim(), 23);
        assert_eq!(catalog.names(), vec![DEFAULT_SYSTEM]);
    }

    #[test]
    fn test_swap_returns_replaced_system() {
        let catalog = SystemCatalog::new();
        let first = FeatureSystem::parse("tiny", "sound\tvoice\np\t-\n", &TableFormat::tsv()).unwrap();
        let first_id = first.id();
        let (_, replaced) = catalog.swap(first).unwrap();
        assert!(replaced.is_none());

        let second = FeatureSystem::parse("tiny", "sound\tvoice\nb\t+\n", &TableFormat::tsv()).unwrap();
        let (current, replaced) = catalog.swap(second).unwrap();
        assert_eq!(replaced.map(|old| old.id()), Some(first_id));
        assert!(Arc::ptr_eq(&current, &catalog.get(Some("tiny")).unwrap()));
    }
}

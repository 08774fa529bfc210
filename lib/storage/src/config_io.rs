// Configuration documents on disk.

use crate::matrix_io::write_atomic;
use phonodist_core::{ConfigStore, Result};
use std::path::Path;

/// Atomically write the current configuration as a JSON object
pub fn save_config<P: AsRef<Path>>(store: &ConfigStore, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut document = store.to_json()?;
    document.push('\n');
    write_atomic(path, document.as_bytes())?;
    tracing::info!("Saved configuration to {:?}", path);
    Ok(())
}

/// Apply a JSON configuration document; all-or-nothing
pub fn load_config<P: AsRef<Path>>(store: &ConfigStore, path: P) -> Result<()> {
    store.load_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonodist_core::{ConfigError, Error, OnError};
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phonodist.json");

        let store = ConfigStore::new();
        store.set("default_distance_method", "cosine").unwrap();
        store.set("on_error", "ignore").unwrap();
        save_config(&store, &path).unwrap();

        let restored = ConfigStore::new();
        load_config(&restored, &path).unwrap();
        assert_eq!(restored.snapshot(), store.snapshot());
        assert_eq!(restored.on_error(), OnError::Ignore);
    }

    #[test]
    fn test_invalid_document_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"cache_size": 16, "kmeans_clusters": 0}"#).unwrap();

        let store = ConfigStore::new();
        let err = load_config(&store, &path).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { ref key, .. }) if key == "kmeans_clusters"));
        assert_eq!(store.cache_size(), 1024);
    }
}

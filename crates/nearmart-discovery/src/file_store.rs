//! Listings store backed by a YAML file, re-read on every fetch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nearmart_core::{load_listings, Listing};

use crate::error::StoreError;
use crate::ports::ListingsStore;

#[derive(Debug, Clone)]
pub struct FileListingsStore {
    path: PathBuf,
}

impl FileListingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ListingsStore for FileListingsStore {
    async fn get_active_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || load_listings(&path))
            .await
            .map_err(|e| StoreError::Unavailable(format!("listings loader task failed: {e}")))?
            .map_err(|e| StoreError::Transport(Box::new(e)))?;

        let listings = file.active_listings();
        tracing::debug!(
            path = %self.path.display(),
            total = file.listings.len(),
            active = listings.len(),
            "loaded listings file"
        );
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "nearmart-{}-{name}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn returns_active_listings_with_coordinates() {
        let path = write_temp(
            "active",
            r#"
listings:
  - { id: "1", name: Milk, price: "50", status: active, coordinates: { lat: 28.71, lng: 77.10 } }
  - { id: "2", name: Rice, price: "80", status: expired, coordinates: { lat: 28.70, lng: 77.09 } }
"#,
        );
        let store = FileListingsStore::new(&path);
        let listings = store.get_active_listings().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, "1");
    }

    #[tokio::test]
    async fn missing_file_is_a_transport_error() {
        let store = FileListingsStore::new("/nonexistent/nearmart/listings.yaml");
        let err = store.get_active_listings().await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)), "got {err:?}");
    }
}

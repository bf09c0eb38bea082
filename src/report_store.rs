use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::settings::Backend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store error: {0}")]
    Object(#[from] object_store::Error),
    #[error("invalid store root for container {container}: {reason}")]
    InvalidRoot { container: String, reason: String },
    #[error("blob operation cancelled: {0}")]
    Cancelled(String),
}

/// Whole-blob get/put against one (connection, container) pair. Report
/// archives are small enough to buffer fully.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Bytes, StoreError>;

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}

/// `ReportStore` over any `object_store` backend, with an optional key
/// prefix for URL-resolved stores.
pub struct ObjectReportStore {
    inner: Arc<dyn ObjectStore>,
    prefix: Option<ObjectPath>,
}

impl ObjectReportStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            prefix: None,
        }
    }

    pub fn with_prefix(inner: Arc<dyn ObjectStore>, prefix: ObjectPath) -> Self {
        Self {
            inner,
            prefix: Some(prefix),
        }
    }

    fn location(&self, path: &str) -> ObjectPath {
        match &self.prefix {
            Some(prefix) if !prefix.as_ref().is_empty() => {
                ObjectPath::from(format!("{}/{}", prefix, path))
            }
            _ => ObjectPath::from(path),
        }
    }
}

#[async_trait]
impl ReportStore for ObjectReportStore {
    async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Bytes, StoreError> {
        let location = self.location(path);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled(path.to_string())),
            result = async { self.inner.get(&location).await?.bytes().await } => Ok(result?),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let location = self.location(path);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled(path.to_string())),
            result = self.inner.put(&location, PutPayload::from(data)) => {
                result?;
                Ok(())
            }
        }
    }
}

/// Opens the store handle for a container. Injected into the registry so
/// tests can substitute in-memory stores.
#[async_trait]
pub trait ReportStoreFactory: Send + Sync {
    async fn open(&self, container: &str) -> Result<Arc<dyn ReportStore>, StoreError>;
}

/// Resolves a container against the configured backend.
pub struct ObjectStoreFactory {
    backend: Backend,
    root: String,
}

impl ObjectStoreFactory {
    pub fn new(backend: Backend, root: impl Into<String>) -> Self {
        Self {
            backend,
            root: root.into(),
        }
    }
}

#[async_trait]
impl ReportStoreFactory for ObjectStoreFactory {
    async fn open(&self, container: &str) -> Result<Arc<dyn ReportStore>, StoreError> {
        match self.backend {
            Backend::Fs => {
                let dir = Path::new(&self.root).join(container);
                fs::create_dir_all(&dir).map_err(|e| StoreError::InvalidRoot {
                    container: container.to_string(),
                    reason: e.to_string(),
                })?;
                let store =
                    LocalFileSystem::new_with_prefix(&dir).map_err(|e| StoreError::InvalidRoot {
                        container: container.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Arc::new(ObjectReportStore::new(Arc::new(store))))
            }
            Backend::Memory => Ok(Arc::new(ObjectReportStore::new(Arc::new(InMemory::new())))),
            Backend::Url => {
                let url = url::Url::parse(&format!(
                    "{}/{}",
                    self.root.trim_end_matches('/'),
                    container
                ))
                .map_err(|e| StoreError::InvalidRoot {
                    container: container.to_string(),
                    reason: e.to_string(),
                })?;
                let (store, prefix) = object_store::parse_url(&url)?;
                Ok(Arc::new(ObjectReportStore::with_prefix(
                    Arc::from(store),
                    prefix,
                )))
            }
        }
    }
}

/// Process-lifetime cache of container store handles. Get-or-create is
/// atomic per container key; entries are never evicted, which is fine at
/// the small, bounded number of containers this system sees.
pub struct StoreRegistry {
    factory: Arc<dyn ReportStoreFactory>,
    stores: Mutex<HashMap<String, Arc<dyn ReportStore>>>,
}

impl StoreRegistry {
    pub fn new(factory: Arc<dyn ReportStoreFactory>) -> Self {
        Self {
            factory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, container: &str) -> Result<Arc<dyn ReportStore>, StoreError> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(container) {
            return Ok(store.clone());
        }
        let store = self.factory.open(container).await?;
        stores.insert(container.to_string(), store.clone());
        Ok(store)
    }
}

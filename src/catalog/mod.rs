// External content catalog: the document store holding project records and
// the blob store serving uploaded media. Both are consumed collaborators;
// this module defines their interfaces plus the HTTP/JSON client the shell
// uses in production.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("malformed record: {0}")]
    Decode(String),
}

/// One photo attached to a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoRecord {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub thumb_url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// One project/product record from the content catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
}

/// Read/subscribe/write access to the remote document store
pub trait DocumentStore: Send + Sync {
    fn read_collection(
        &self,
        name: &str,
    ) -> BoxFuture<'static, Result<Vec<ProjectRecord>, CatalogError>>;

    fn create(
        &self,
        name: &str,
        record: ProjectRecord,
    ) -> BoxFuture<'static, Result<(), CatalogError>>;

    fn update(
        &self,
        name: &str,
        id: &str,
        record: ProjectRecord,
    ) -> BoxFuture<'static, Result<(), CatalogError>>;

    fn delete(&self, name: &str, id: &str) -> BoxFuture<'static, Result<(), CatalogError>>;
}

/// Upload/removal access to the blob store backing photo URLs
pub trait BlobStore: Send + Sync {
    /// Resolves to a publicly-fetchable URL
    fn upload(&self, path: &str, bytes: Vec<u8>) -> BoxFuture<'static, Result<String, CatalogError>>;

    /// Best-effort removal
    fn delete(&self, url: &str) -> BoxFuture<'static, Result<(), CatalogError>>;
}

/// HTTP/JSON client for the managed backend
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/{}.json", self.base_url, name)
    }
}

impl DocumentStore for HttpCatalog {
    fn read_collection(
        &self,
        name: &str,
    ) -> BoxFuture<'static, Result<Vec<ProjectRecord>, CatalogError>> {
        let client = self.client.clone();
        let url = self.collection_url(name);
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| CatalogError::Request(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CatalogError::Status(response.status().as_u16()));
            }
            response
                .json::<Vec<ProjectRecord>>()
                .await
                .map_err(|e| CatalogError::Decode(e.to_string()))
        })
    }

    fn create(
        &self,
        name: &str,
        record: ProjectRecord,
    ) -> BoxFuture<'static, Result<(), CatalogError>> {
        let client = self.client.clone();
        let url = self.collection_url(name);
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&record)
                .send()
                .await
                .map_err(|e| CatalogError::Request(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CatalogError::Status(response.status().as_u16()));
            }
            Ok(())
        })
    }

    fn update(
        &self,
        name: &str,
        id: &str,
        record: ProjectRecord,
    ) -> BoxFuture<'static, Result<(), CatalogError>> {
        let client = self.client.clone();
        let url = format!("{}/{}/{}.json", self.base_url, name, id);
        Box::pin(async move {
            let response = client
                .patch(&url)
                .json(&record)
                .send()
                .await
                .map_err(|e| CatalogError::Request(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CatalogError::Status(response.status().as_u16()));
            }
            Ok(())
        })
    }

    fn delete(&self, name: &str, id: &str) -> BoxFuture<'static, Result<(), CatalogError>> {
        let client = self.client.clone();
        let url = format!("{}/{}/{}.json", self.base_url, name, id);
        Box::pin(async move {
            let response = client
                .delete(&url)
                .send()
                .await
                .map_err(|e| CatalogError::Request(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CatalogError::Status(response.status().as_u16()));
            }
            Ok(())
        })
    }
}

/// Poll a collection into a watch channel of full snapshots. Failures are
/// logged and the previous snapshot stands; cancellation stops the task.
pub fn subscribe_collection(
    store: Arc<dyn DocumentStore>,
    name: &str,
    interval: Duration,
    cancel: CancellationToken,
) -> watch::Receiver<Vec<ProjectRecord>> {
    let (tx, rx) = watch::channel(Vec::new());
    let name = name.to_string();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(collection = %name, "catalog subscription stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.read_collection(&name).await {
                        Ok(records) => {
                            if tx.send(records).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(collection = %name, error = %e, "catalog refresh failed");
                        }
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        collections: Mutex<HashMap<String, Vec<ProjectRecord>>>,
        fail_reads: bool,
    }

    impl DocumentStore for MemoryStore {
        fn read_collection(
            &self,
            name: &str,
        ) -> BoxFuture<'static, Result<Vec<ProjectRecord>, CatalogError>> {
            if self.fail_reads {
                return Box::pin(async { Err(CatalogError::Status(503)) });
            }
            let records = self
                .collections
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_default();
            Box::pin(async move { Ok(records) })
        }

        fn create(
            &self,
            name: &str,
            record: ProjectRecord,
        ) -> BoxFuture<'static, Result<(), CatalogError>> {
            self.collections
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default()
                .push(record);
            Box::pin(async { Ok(()) })
        }

        fn update(
            &self,
            name: &str,
            id: &str,
            record: ProjectRecord,
        ) -> BoxFuture<'static, Result<(), CatalogError>> {
            let mut collections = self.collections.lock().unwrap();
            let found = collections
                .get_mut(name)
                .and_then(|records| records.iter_mut().find(|r| r.id == id))
                .map(|slot| *slot = record)
                .is_some();
            Box::pin(async move {
                if found {
                    Ok(())
                } else {
                    Err(CatalogError::Status(404))
                }
            })
        }

        fn delete(&self, name: &str, id: &str) -> BoxFuture<'static, Result<(), CatalogError>> {
            let mut collections = self.collections.lock().unwrap();
            if let Some(records) = collections.get_mut(name) {
                records.retain(|r| r.id != id);
            }
            Box::pin(async { Ok(()) })
        }
    }

    fn project(id: &str) -> ProjectRecord {
        ProjectRecord {
            id: id.to_string(),
            name: format!("project {id}"),
            category: "design".to_string(),
            status: "live".to_string(),
            cover_image_url: None,
            photos: vec![PhotoRecord {
                id: format!("{id}-p1"),
                url: format!("https://cdn/{id}.jpg"),
                thumb_url: None,
                width: Some(400),
                height: Some(300),
            }],
        }
    }

    #[test]
    fn test_record_decodes_with_missing_optionals() {
        let json = r#"{"id":"p1","name":"n","category":"c","status":"s"}"#;
        let record: ProjectRecord = serde_json::from_str(json).unwrap();
        assert!(record.photos.is_empty());
        assert!(record.cover_image_url.is_none());
    }

    #[tokio::test]
    async fn test_subscription_delivers_snapshots() {
        let store = Arc::new(MemoryStore::default());
        store
            .create("projects", project("p1"))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let mut rx = subscribe_collection(
            store.clone(),
            "projects",
            Duration::from_millis(20),
            cancel.clone(),
        );

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        store.create("projects", project("p2")).await.unwrap();
        rx.changed().await.unwrap();
        // Full-collection snapshots, not deltas
        assert_eq!(rx.borrow().len(), 2);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_subscription_survives_read_failures() {
        let store = Arc::new(MemoryStore {
            fail_reads: true,
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        let rx = subscribe_collection(
            store,
            "projects",
            Duration::from_millis(10),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Failures keep the previous (empty) snapshot; nothing panics
        assert!(rx.borrow().is_empty());
        cancel.cancel();
    }
}

//! Destination search index: identity snapshot reads and batch upserts.

use crate::error::{Result, SyncError};
use crate::http::check_ok;
use crate::identity::IdentitySnapshot;
use crate::types::Brevet;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// Objects per upsert request
pub const SAVE_CHUNK_SIZE: usize = 1000;

const BROWSE_PAGE_SIZE: usize = 1000;

/// Callback receiving one page of browsed objects
pub type BatchCallback<'a> = dyn FnMut(Vec<Value>) + Send + 'a;

#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Stream every object of the index, restricted to `attributes` when non-empty.
    /// Returns the number of objects seen.
    async fn browse_all(&self, attributes: &[&str], on_batch: &mut BatchCallback<'_>) -> Result<usize>;

    /// Upsert `brevets` keyed by `objectID`; returns the number of objects written.
    async fn save_objects(&self, brevets: &[Brevet]) -> Result<usize>;
}

/// Every `objectID` currently in the index.
pub async fn identity_snapshot(index: &dyn SearchIndex) -> Result<IdentitySnapshot> {
    let mut snapshot = IdentitySnapshot::new();
    let mut on_batch = |objects: Vec<Value>| {
        for object in objects {
            if let Some(id) = object.get("objectID").and_then(Value::as_str) {
                snapshot.insert(id);
            }
        }
    };
    index.browse_all(&["objectID"], &mut on_batch).await?;
    info!("Loaded {} identities from index", snapshot.len());
    Ok(snapshot)
}

/// Every full record in the index that still decodes as a brevet.
pub async fn browse_brevets(index: &dyn SearchIndex) -> Result<Vec<Brevet>> {
    let mut brevets = Vec::new();
    let mut on_batch = |objects: Vec<Value>| {
        for object in objects {
            match serde_json::from_value::<Brevet>(object) {
                Ok(brevet) => brevets.push(brevet),
                Err(e) => debug!("Skipping index record that is not a brevet: {}", e),
            }
        }
    };
    index.browse_all(&[], &mut on_batch).await?;
    Ok(brevets)
}

#[derive(Debug, Deserialize)]
struct BrowsePage {
    #[serde(default)]
    hits: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Algolia REST client for a single index
pub struct AlgoliaIndex {
    client: reqwest::Client,
    app_id: String,
    read_key: String,
    write_key: String,
    index_name: String,
    read_host: String,
    write_host: String,
}

impl AlgoliaIndex {
    pub fn new(
        client: reqwest::Client,
        app_id: impl Into<String>,
        read_key: impl Into<String>,
        write_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        let app_id = app_id.into();
        Self {
            read_host: format!("https://{}-dsn.algolia.net", app_id),
            write_host: format!("https://{}.algolia.net", app_id),
            client,
            app_id,
            read_key: read_key.into(),
            write_key: write_key.into(),
            index_name: index_name.into(),
        }
    }

    fn index_url(&self, host: &str, action: &str) -> String {
        format!("{}/1/indexes/{}/{}", host, self.index_name, action)
    }
}

/// Request body of one `/batch` call
fn batch_body(chunk: &[Brevet]) -> Result<Value> {
    let requests = chunk
        .iter()
        .map(|brevet| -> Result<Value> {
            Ok(json!({ "action": "updateObject", "body": serde_json::to_value(brevet)? }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({ "requests": requests }))
}

#[async_trait::async_trait]
impl SearchIndex for AlgoliaIndex {
    #[instrument(skip(self, on_batch), fields(index = %self.index_name))]
    async fn browse_all(&self, attributes: &[&str], on_batch: &mut BatchCallback<'_>) -> Result<usize> {
        let url = self.index_url(&self.read_host, "browse");
        let mut cursor: Option<String> = None;
        let mut seen = 0;
        loop {
            let body = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None if attributes.is_empty() => json!({ "hitsPerPage": BROWSE_PAGE_SIZE }),
                None => json!({ "hitsPerPage": BROWSE_PAGE_SIZE, "attributesToRetrieve": attributes }),
            };
            let response = self
                .client
                .post(&url)
                .header("X-Algolia-Application-Id", &self.app_id)
                .header("X-Algolia-API-Key", &self.read_key)
                .json(&body)
                .send()
                .await?;
            let page: BrowsePage = check_ok(response, "algolia")?.json().await?;
            seen += page.hits.len();
            debug!(hits = page.hits.len(), "Browsed index page");
            on_batch(page.hits);

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(seen)
    }

    #[instrument(skip(self, brevets), fields(index = %self.index_name, objects = brevets.len()))]
    async fn save_objects(&self, brevets: &[Brevet]) -> Result<usize> {
        let url = self.index_url(&self.write_host, "batch");
        let mut written = 0;
        for chunk in brevets.chunks(SAVE_CHUNK_SIZE) {
            let response = self
                .client
                .post(&url)
                .header("X-Algolia-Application-Id", &self.app_id)
                .header("X-Algolia-API-Key", &self.write_key)
                .json(&batch_body(chunk)?)
                .send()
                .await?;
            let body: Value = check_ok(response, "algolia")?.json().await?;
            if body.get("taskID").is_none() {
                return Err(SyncError::Index {
                    message: format!("batch response without taskID: {}", body),
                });
            }
            written += chunk.len();
            debug!(written, "Saved index chunk");
        }
        Ok(written)
    }
}

/// Index kept in process memory, for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    objects: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_brevets(brevets: &[Brevet]) -> Result<Self> {
        let index = Self::new();
        {
            let mut objects = index.objects.lock().unwrap();
            for brevet in brevets {
                objects.insert(brevet.object_id.clone(), serde_json::to_value(brevet)?);
            }
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, object_id: &str) -> Option<Value> {
        self.objects.lock().unwrap().get(object_id).cloned()
    }
}

#[async_trait::async_trait]
impl SearchIndex for InMemoryIndex {
    async fn browse_all(&self, attributes: &[&str], on_batch: &mut BatchCallback<'_>) -> Result<usize> {
        let objects: Vec<Value> = self.objects.lock().unwrap().values().cloned().collect();
        let seen = objects.len();
        for page in objects.chunks(BROWSE_PAGE_SIZE) {
            let page = page
                .iter()
                .map(|object| {
                    if attributes.is_empty() {
                        return object.clone();
                    }
                    let mut projected = serde_json::Map::new();
                    for key in std::iter::once(&"objectID").chain(attributes) {
                        if let Some(value) = object.get(*key) {
                            projected.insert(key.to_string(), value.clone());
                        }
                    }
                    Value::Object(projected)
                })
                .collect();
            on_batch(page);
        }
        Ok(seen)
    }

    async fn save_objects(&self, brevets: &[Brevet]) -> Result<usize> {
        let mut objects = self.objects.lock().unwrap();
        for brevet in brevets {
            objects.insert(brevet.object_id.clone(), serde_json::to_value(brevet)?);
        }
        Ok(brevets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brevet(id: &str) -> Brevet {
        let mut b = Brevet::new(id.to_string(), 20250412, json!({"raw": true}));
        b.name = Some(format!("name {id}"));
        b
    }

    #[tokio::test]
    async fn test_snapshot_from_memory_index() {
        let index = InMemoryIndex::with_brevets(&[brevet("a"), brevet("b")]).unwrap();
        let snapshot = identity_snapshot(&index).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a"));
    }

    #[tokio::test]
    async fn test_browse_projects_attributes() {
        let index = InMemoryIndex::with_brevets(&[brevet("a")]).unwrap();
        let mut pages = Vec::new();
        let mut collect = |page: Vec<Value>| pages.extend(page);
        index.browse_all(&["objectID"], &mut collect).await.unwrap();
        assert_eq!(pages, vec![json!({"objectID": "a"})]);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let index = InMemoryIndex::with_brevets(&[brevet("a")]).unwrap();
        let mut changed = brevet("a");
        changed.name = Some("renamed".into());

        let written = index.save_objects(&[changed, brevet("b")]).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a").unwrap()["name"], "renamed");
        assert_eq!(browse_brevets(&index).await.unwrap().len(), 2);
    }

    #[test]
    fn test_batch_body_uses_update_object() {
        let body = batch_body(&[brevet("a")]).unwrap();
        assert_eq!(body["requests"][0]["action"], "updateObject");
        assert_eq!(body["requests"][0]["body"]["objectID"], "a");
    }

    #[test]
    fn test_algolia_urls() {
        let index = AlgoliaIndex::new(reqwest::Client::new(), "APP1", "r", "w", "brevets");
        assert_eq!(
            index.index_url(&index.read_host, "browse"),
            "https://APP1-dsn.algolia.net/1/indexes/brevets/browse"
        );
        assert_eq!(
            index.index_url(&index.write_host, "batch"),
            "https://APP1.algolia.net/1/indexes/brevets/batch"
        );
    }
}

//! The in-process document store.
//!
//! One auto-increment-keyed document map per collection, each behind its
//! own lock. When opened with a path, the whole store is rewritten to that
//! file after every mutation:
//!
//! ```json
//! {
//!   "collections": { "Player": { "1": { "id": 1, "userName": "alice", ... } }, ... },
//!   "next_ids":    { "Player": 2, "Developer": 1, "Game": 1 }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::request::{COLLECTIONS, matches};
use crate::{Datastore, StoreAction, StoreError, StoreRequest};

#[derive(Debug, Default)]
struct Collection {
    docs: BTreeMap<u64, Value>,
    next_id: u64,
}

/// On-disk form of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    collections: BTreeMap<String, BTreeMap<u64, Value>>,
    #[serde(default)]
    next_ids: BTreeMap<String, u64>,
}

/// A small JSON document store with exact-match queries.
pub struct DocumentStore {
    collections: HashMap<&'static str, Mutex<Collection>>,
    path: Option<PathBuf>,
    /// Serializes snapshot writes so two mutations never interleave bytes
    /// in the file.
    persist: Mutex<()>,
}

impl DocumentStore {
    /// Creates an empty store that never touches disk.
    pub fn in_memory() -> Self {
        Self::from_snapshot(Snapshot::default(), None)
    }

    /// Opens a store persisted at `path`, loading the existing snapshot if
    /// there is one.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(StoreError::CorruptSnapshot)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Snapshot::default()
            }
            Err(e) => return Err(StoreError::Persist(e)),
        };
        tracing::info!(path = %path.display(), "document store opened");
        Ok(Self::from_snapshot(snapshot, Some(path)))
    }

    fn from_snapshot(mut snapshot: Snapshot, path: Option<PathBuf>) -> Self {
        let collections = COLLECTIONS
            .iter()
            .map(|&name| {
                let docs =
                    snapshot.collections.remove(name).unwrap_or_default();
                // Never hand out an id already in use, even if `next_ids`
                // was lost or edited by hand.
                let floor = docs.keys().next_back().map_or(1, |max| max + 1);
                let next_id = snapshot
                    .next_ids
                    .get(name)
                    .copied()
                    .unwrap_or(1)
                    .max(floor);
                (name, Mutex::new(Collection { docs, next_id }))
            })
            .collect();

        Self {
            collections,
            path,
            persist: Mutex::new(()),
        }
    }

    fn collection(
        &self,
        name: &str,
    ) -> Result<&Mutex<Collection>, StoreError> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    /// Inserts `document` and returns it with its assigned `id`.
    pub async fn insert(
        &self,
        collection: &str,
        document: Value,
    ) -> Result<Value, StoreError> {
        let Value::Object(fields) = document else {
            return Err(StoreError::BadRequest(
                "document must be a JSON object".into(),
            ));
        };

        let stored = {
            let mut coll = self.collection(collection)?.lock().await;
            let id = coll.next_id;
            coll.next_id += 1;

            let mut doc = fields;
            doc.insert("id".into(), Value::from(id));
            let doc = Value::Object(doc);
            coll.docs.insert(id, doc.clone());
            doc
        };

        self.persist().await?;
        tracing::debug!(collection, id = %stored["id"], "document created");
        Ok(stored)
    }

    /// Returns every document matching `filter`, in id order.
    pub async fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let coll = self.collection(collection)?.lock().await;
        Ok(coll
            .docs
            .values()
            .filter(|doc| matches(doc, filter))
            .cloned()
            .collect())
    }

    /// Removes every document matching `filter` and returns them.
    pub async fn remove(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let removed: Vec<Value> = {
            let mut coll = self.collection(collection)?.lock().await;
            let ids: Vec<u64> = coll
                .docs
                .iter()
                .filter(|(_, doc)| matches(doc, filter))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| coll.docs.remove(id)).collect()
        };

        if !removed.is_empty() {
            self.persist().await?;
        }
        tracing::debug!(collection, count = removed.len(), "documents deleted");
        Ok(removed)
    }

    /// Rewrites the snapshot file, if this store has one.
    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _writing = self.persist.lock().await;

        let mut snapshot = Snapshot::default();
        // Fixed order: every path that takes more than one collection lock
        // goes through here.
        for name in COLLECTIONS {
            if let Some(lock) = self.collections.get(name) {
                let coll = lock.lock().await;
                snapshot.collections.insert(name.into(), coll.docs.clone());
                snapshot.next_ids.insert(name.into(), coll.next_id);
            }
        }

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(StoreError::CorruptSnapshot)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(StoreError::Persist)
    }
}

impl Datastore for DocumentStore {
    async fn execute(&self, request: StoreRequest) -> Result<Value, StoreError> {
        match request.action {
            StoreAction::Create => {
                self.insert(&request.collection, request.data).await
            }
            StoreAction::Query => {
                let filter = request.filter()?;
                let docs = self.find(&request.collection, &filter).await?;
                Ok(Value::Array(docs))
            }
            StoreAction::Delete => {
                let filter = request.filter()?;
                let docs = self.remove(&request.collection, &filter).await?;
                Ok(Value::Array(docs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GAME, PLAYER};
    use serde_json::json;

    fn filter(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = DocumentStore::in_memory();

        let a = store.insert(PLAYER, json!({"userName": "a"})).await.unwrap();
        let b = store.insert(PLAYER, json!({"userName": "b"})).await.unwrap();

        assert_eq!(a["id"], 1);
        assert_eq!(b["id"], 2);
        assert_eq!(b["userName"], "b");
    }

    #[tokio::test]
    async fn test_ids_are_per_collection() {
        let store = DocumentStore::in_memory();

        store.insert(PLAYER, json!({"userName": "a"})).await.unwrap();
        let game = store.insert(GAME, json!({"name": "Duel"})).await.unwrap();

        assert_eq!(game["id"], 1);
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let store = DocumentStore::in_memory();
        let result = store.insert(PLAYER, json!("alice")).await;
        assert!(matches!(result, Err(StoreError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_rejected() {
        let store = DocumentStore::in_memory();
        let result = store.insert("Users", json!({})).await;
        assert!(matches!(result, Err(StoreError::UnknownCollection(_))));
    }

    #[tokio::test]
    async fn test_query_exact_match_conjunction() {
        let store = DocumentStore::in_memory();
        store
            .insert(GAME, json!({"name": "Duel", "version": "1.0.0"}))
            .await
            .unwrap();
        store
            .insert(GAME, json!({"name": "Duel", "version": "2.0.0"}))
            .await
            .unwrap();

        let all = store.find(GAME, &filter(json!({"name": "Duel"}))).await;
        let one = store
            .find(GAME, &filter(json!({"name": "Duel", "version": "2.0.0"})))
            .await;

        assert_eq!(all.unwrap().len(), 2);
        let one = one.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0]["version"], "2.0.0");
    }

    #[tokio::test]
    async fn test_delete_removes_matches_only() {
        let store = DocumentStore::in_memory();
        store.insert(GAME, json!({"name": "A"})).await.unwrap();
        store.insert(GAME, json!({"name": "B"})).await.unwrap();

        let removed =
            store.remove(GAME, &filter(json!({"name": "A"}))).await.unwrap();
        let left = store.find(GAME, &Map::new()).await.unwrap();

        assert_eq!(removed.len(), 1);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["name"], "B");
    }

    #[tokio::test]
    async fn test_execute_dispatches_by_action() {
        let store = DocumentStore::in_memory();
        store
            .execute(StoreRequest::create(PLAYER, json!({"userName": "a"})))
            .await
            .unwrap();

        let docs = store
            .find(PLAYER, &filter(json!({"userName": "a"})))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);

        let found = Datastore::query(&store, PLAYER, json!({"userName": "a"}))
            .await
            .unwrap();
        assert_eq!(found, docs);
    }

    #[tokio::test]
    async fn test_snapshot_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");

        {
            let store = DocumentStore::open(&path).await.unwrap();
            store.insert(PLAYER, json!({"userName": "a"})).await.unwrap();
            store.insert(PLAYER, json!({"userName": "b"})).await.unwrap();
            store
                .remove(PLAYER, &filter(json!({"userName": "b"})))
                .await
                .unwrap();
        }

        let reopened = DocumentStore::open(&path).await.unwrap();
        let docs = reopened.find(PLAYER, &Map::new()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["userName"], "a");

        // The deleted id is not handed out again.
        let c = reopened
            .insert(PLAYER, json!({"userName": "c"}))
            .await
            .unwrap();
        assert_eq!(c["id"], 3);
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        std::fs::write(&path, b"not json").unwrap();

        let result = DocumentStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::CorruptSnapshot(_))));
    }
}

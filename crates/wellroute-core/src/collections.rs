//! In-memory collection store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use wellroute_types::config::CollectionSeed;
use wellroute_types::errors::RouterError;
use wellroute_types::model::ActiveCollection;
use wellroute_types::traits::CollectionStore;

/// Session → collection bindings held in memory. Seeded from config or bound at runtime.
#[derive(Debug, Default)]
pub struct InMemoryCollectionStore {
    sessions: RwLock<HashMap<String, ActiveCollection>>,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from `collections/*.yaml`.
    pub fn from_seeds(seeds: &[CollectionSeed]) -> Self {
        let sessions = seeds
            .iter()
            .flat_map(|seed| {
                seed.session_ids
                    .iter()
                    .map(move |session| (session.clone(), seed.collection.clone()))
            })
            .collect();
        Self {
            sessions: RwLock::new(sessions),
        }
    }

    /// Bind a session to a collection, replacing any previous binding.
    pub async fn bind(&self, session_id: impl Into<String>, collection: ActiveCollection) {
        let session_id = session_id.into();
        info!(session_id = %session_id, collection_id = %collection.id, "bound session to collection");
        self.sessions.write().await.insert(session_id, collection);
    }

    /// Remove a session's binding. Returns the collection it was bound to.
    pub async fn unbind(&self, session_id: &str) -> Option<ActiveCollection> {
        self.sessions.write().await.remove(session_id)
    }
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn get_active_collection(
        &self,
        session_id: &str,
    ) -> Result<Option<ActiveCollection>, RouterError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}

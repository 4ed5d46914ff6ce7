//! The species store: one unified, locally cached collection of trees and
//! animals kept consistent with the backend.
//!
//! # Design
//! - `load_all` fetches both collections concurrently and settles each one
//!   independently, so a failing collection never hides the other.
//! - Mutations are confirmed by the server before local state changes:
//!   create appends the returned record, update replaces by composite id,
//!   delete removes by composite id. A failed call leaves the collection
//!   untouched and hands the error back to the caller.
//! - When an update's response cannot be turned into a full record, the
//!   submitted payload is merged onto the previous entity instead.
//! - Updates and deletes on the same composite id are serialized through a
//!   per-id async lock; the state lock itself is never held across `.await`.
//! - A `load_all` excludes mutations for its whole duration, so a confirmed
//!   create, update or delete is never overwritten by an older listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock as AsyncRwLock};
use tracing::{debug, info, warn};

use crate::client::CatalogClient;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::id::{self, Kind};
use crate::image::ImageResolver;
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{AnimalForm, Species, TreeForm};

/// Load problem visible to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "severity", rename_all = "lowercase")]
pub enum CatalogIssue {
    /// One collection failed; the other one is shown.
    Partial { failed: Kind, reason: String },
    /// Both collections failed. Retry with `load_all`.
    Unavailable { reason: String },
}

impl CatalogIssue {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogIssue::Unavailable { .. })
    }
}

/// Owned copy of the store state handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub species: Vec<Species>,
    pub is_loading: bool,
    pub issue: Option<CatalogIssue>,
}

/// What a `load_all` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub trees: usize,
    pub animals: usize,
    pub failed: Vec<Kind>,
}

#[derive(Debug)]
struct StoreState {
    species: Vec<Species>,
    is_loading: bool,
    issue: Option<CatalogIssue>,
}

pub struct SpeciesStore<T> {
    client: CatalogClient,
    images: ImageResolver,
    transport: T,
    state: RwLock<StoreState>,
    /// Held exclusively by `load_all`, shared by mutations.
    load_gate: AsyncRwLock<()>,
    entity_locks: EntityLocks,
}

type EntityLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Exclusive hold on one composite id. Dropping it releases the lock and
/// removes the map entry once nobody else is holding or waiting on it.
struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    composite_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        if locks
            .get(&self.composite_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.composite_id);
        }
    }
}

impl<T: Transport> SpeciesStore<T> {
    pub fn new(client: CatalogClient, images: ImageResolver, transport: T) -> Self {
        Self {
            client,
            images,
            transport,
            state: RwLock::new(StoreState {
                species: Vec::new(),
                is_loading: true,
                issue: None,
            }),
            load_gate: AsyncRwLock::new(()),
            entity_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CatalogConfig, transport: T) -> Self {
        let session = match &config.token {
            Some(token) => Session::with_token(token.clone()),
            None => Session::new(),
        };
        Self::new(
            CatalogClient::with_session(&config.base_url, session),
            ImageResolver::new(&config.base_url, &config.placeholder_image),
            transport,
        )
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.read();
        CatalogSnapshot {
            species: state.species.clone(),
            is_loading: state.is_loading,
            issue: state.issue.clone(),
        }
    }

    pub fn species(&self) -> Vec<Species> {
        self.state.read().species.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn issue(&self) -> Option<CatalogIssue> {
        self.state.read().issue.clone()
    }

    pub fn get_by_id(&self, composite_id: &str) -> Option<Species> {
        self.state
            .read()
            .species
            .iter()
            .find(|species| species.id == composite_id)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Fetches both collections concurrently and replaces the local
    /// collection. Calling it again is the retry path after a failure.
    pub async fn load_all(&self) -> LoadSummary {
        let _exclusive = self.load_gate.write().await;
        self.state.write().is_loading = true;

        let (trees, animals) = tokio::join!(self.fetch_trees(), self.fetch_animals());

        let mut failed = Vec::new();
        let mut reasons = Vec::new();
        let mut collected = Vec::new();
        let mut counts = [0usize; 2];
        for (slot, (kind, outcome)) in [(Kind::Tree, trees), (Kind::Animal, animals)]
            .into_iter()
            .enumerate()
        {
            match outcome {
                Ok(species) => {
                    counts[slot] = species.len();
                    collected.extend(species);
                }
                Err(e) => {
                    warn!(%kind, error = %e, "failed to load collection");
                    failed.push(kind);
                    reasons.push(e.to_string());
                }
            }
        }

        let species = dedupe(collected);
        let issue = match failed.as_slice() {
            [] => None,
            [kind] => Some(CatalogIssue::Partial {
                failed: *kind,
                reason: reasons.join("; "),
            }),
            _ => Some(CatalogIssue::Unavailable {
                reason: reasons.join("; "),
            }),
        };
        info!(trees = counts[0], animals = counts[1], failed = failed.len(), "catalog loaded");

        let mut state = self.state.write();
        state.species = species;
        state.issue = issue;
        state.is_loading = false;

        LoadSummary {
            trees: counts[0],
            animals: counts[1],
            failed,
        }
    }

    async fn fetch_trees(&self) -> Result<Vec<Species>> {
        let response = self.transport.execute(self.client.build_list_plants()).await?;
        let records = self.client.parse_list_plants(response)?;
        Ok(records
            .into_iter()
            .map(|record| record.into_species(&self.images))
            .collect())
    }

    async fn fetch_animals(&self) -> Result<Vec<Species>> {
        let response = self.transport.execute(self.client.build_list_animals()).await?;
        let records = self.client.parse_list_animals(response)?;
        Ok(records
            .into_iter()
            .map(|record| record.into_species(&self.images))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub async fn add_tree(&self, form: &TreeForm) -> Result<Species> {
        let _shared = self.load_gate.read().await;
        let response = self.transport.execute(self.client.build_create_tree(form)).await?;
        let species = self.client.parse_plant(response)?.into_species(&self.images);
        self.append(species.clone());
        Ok(species)
    }

    pub async fn add_animal(&self, form: &AnimalForm) -> Result<Species> {
        let _shared = self.load_gate.read().await;
        let response = self.transport.execute(self.client.build_create_animal(form)).await?;
        let species = self.client.parse_animal(response)?.into_species(&self.images);
        self.append(species.clone());
        Ok(species)
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    pub async fn update_tree(&self, composite_id: &str, form: &TreeForm) -> Result<Species> {
        let backend_id = id::decode_for(Kind::Tree, composite_id)?;
        let _shared = self.load_gate.read().await;
        let _guard = self.lock_entity(composite_id).await;

        let request = self.client.build_update_tree(backend_id, form);
        let response = self.transport.execute(request).await?;
        let parsed = self
            .client
            .parse_plant(response)
            .map(|record| record.into_species(&self.images));
        let species = self.reconcile_update(composite_id, parsed, |previous| form.merge_onto(previous))?;
        self.upsert(species.clone());
        Ok(species)
    }

    pub async fn update_animal(&self, composite_id: &str, form: &AnimalForm) -> Result<Species> {
        let backend_id = id::decode_for(Kind::Animal, composite_id)?;
        let _shared = self.load_gate.read().await;
        let _guard = self.lock_entity(composite_id).await;

        let request = self.client.build_update_animal(backend_id, form);
        let response = self.transport.execute(request).await?;
        let parsed = self
            .client
            .parse_animal(response)
            .map(|record| record.into_species(&self.images));
        let species = self.reconcile_update(composite_id, parsed, |previous| form.merge_onto(previous))?;
        self.upsert(species.clone());
        Ok(species)
    }

    /// Picks the entity to store after a successful update round-trip.
    fn reconcile_update(
        &self,
        composite_id: &str,
        parsed: Result<Species>,
        merge: impl FnOnce(&Species) -> Species,
    ) -> Result<Species> {
        let mismatch = match parsed {
            Ok(species) if species.id == composite_id => return Ok(species),
            Ok(species) => CatalogError::ReconciliationMismatch {
                path: composite_id.to_string(),
                reason: format!("response describes {} instead", species.id),
            },
            Err(e @ CatalogError::ReconciliationMismatch { .. }) => e,
            Err(e) => return Err(e),
        };
        match self.get_by_id(composite_id) {
            Some(previous) => {
                warn!(id = composite_id, error = %mismatch, "update response incomplete, merging locally");
                Ok(merge(&previous))
            }
            None => Err(mismatch),
        }
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    pub async fn delete(&self, kind: Kind, composite_id: &str) -> Result<()> {
        let backend_id = id::decode_for(kind, composite_id)?;
        let _shared = self.load_gate.read().await;
        let _guard = self.lock_entity(composite_id).await;

        let response = self
            .transport
            .execute(self.client.build_delete(kind, backend_id))
            .await?;
        self.client.parse_delete(response)?;

        self.state
            .write()
            .species
            .retain(|species| species.id != composite_id);
        debug!(id = composite_id, "species deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Appends a freshly created entity. A server that hands out an id already
    /// held replaces the stale entry instead of duplicating it.
    fn append(&self, species: Species) {
        let mut state = self.state.write();
        match state.species.iter_mut().find(|existing| existing.id == species.id) {
            Some(existing) => {
                warn!(id = %species.id, "create returned an id already held, replacing it");
                *existing = species;
            }
            None => state.species.push(species),
        }
    }

    /// Replaces the entity with the same composite id, or appends.
    fn upsert(&self, species: Species) {
        let mut state = self.state.write();
        match state.species.iter_mut().find(|existing| existing.id == species.id) {
            Some(existing) => *existing = species,
            None => state.species.push(species),
        }
    }

    async fn lock_entity(&self, composite_id: &str) -> EntityGuard<'_> {
        let lock = self
            .entity_locks
            .lock()
            .entry(composite_id.to_string())
            .or_default()
            .clone();
        let mut entity = EntityGuard {
            locks: &self.entity_locks,
            composite_id: composite_id.to_string(),
            guard: None,
        };
        entity.guard = Some(lock.lock_owned().await);
        entity
    }
}

/// Drops repeated composite ids, keeping the first occurrence.
fn dedupe(species: Vec<Species>) -> Vec<Species> {
    let mut seen = HashSet::new();
    species
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.id.clone());
            if !fresh {
                warn!(id = %entry.id, "duplicate id in backend listing dropped");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::future::{poll_fn, Future};
    use std::pin::{pin, Pin};
    use std::task::Poll;

    use super::*;
    use crate::http::{HttpRequest, HttpResponse};

    /// Answers every request with the same status and an empty body.
    struct StatusTransport(u16);

    impl Transport for StatusTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: self.0,
                path: request.path,
                headers: Vec::new(),
                body: String::new(),
            })
        }
    }

    fn store(status: u16) -> SpeciesStore<StatusTransport> {
        SpeciesStore::new(
            CatalogClient::new("http://api.test"),
            ImageResolver::new("http://api.test", "/placeholder.svg"),
            StatusTransport(status),
        )
    }

    fn form() -> TreeForm {
        TreeForm {
            common_name: "Ipê".into(),
            scientific_name: "Handroanthus albus".into(),
            ..TreeForm::default()
        }
    }

    #[tokio::test]
    async fn entity_locks_are_released_on_every_path() {
        let failing = store(500);
        for n in 0..100 {
            let id = format!("tree_{n}");
            assert!(failing.update_tree(&id, &form()).await.is_err());
            assert!(failing.delete(Kind::Tree, &id).await.is_err());
        }
        assert!(failing.entity_locks.lock().is_empty());

        // 204 with no entity held: update ends in a mismatch, delete succeeds.
        let empty = store(204);
        for n in 0..100 {
            let id = format!("tree_{n}");
            assert!(empty.update_tree(&id, &form()).await.is_err());
            empty.delete(Kind::Tree, &id).await.unwrap();
        }
        assert!(empty.entity_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn waiting_holder_keeps_the_entry_alive() {
        let store = store(204);
        let first = store.lock_entity("tree_1").await;
        let mut second = pin!(store.lock_entity("tree_1"));

        assert!(poll_once(second.as_mut()).await.is_none());
        drop(first);
        assert_eq!(store.entity_locks.lock().len(), 1);

        drop(second.await);
        assert!(store.entity_locks.lock().is_empty());
    }

    /// Polls `fut` once, returning its output if it was already ready.
    async fn poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        poll_fn(|cx| match Pin::new(&mut fut).poll(cx) {
            Poll::Ready(out) => Poll::Ready(Some(out)),
            Poll::Pending => Poll::Ready(None),
        })
        .await
    }
}

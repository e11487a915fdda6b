use anyhow::{Context, Result};
use async_trait::async_trait;
use board_core::RecordStore;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{DestinationCatalog, OfferCatalog, PointId, RoutePoint, RoutePointDraft},
    error::StoreError,
    protocol::{ModelUpdate, UpdateSignal},
};
use std::{
    future::Future,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENTS_CAPACITY: usize = 256;
const BUILTIN_SEED: &str = include_str!("../seed/demo.json");

/// Everything the store serves, as read from a seed file or a backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub points: Vec<RoutePoint>,
    #[serde(default)]
    pub offers: OfferCatalog,
    #[serde(default)]
    pub destinations: DestinationCatalog,
}

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse route point snapshot")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file '{}'", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid seed file '{}'", path.display()))
    }

    /// Demo trip shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SEED)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Delay applied before every mutation resolves.
    pub latency: Duration,
    /// Reject every mutation with a network error.
    pub fail_mutations: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    loaded: bool,
    points: Vec<RoutePoint>,
    offers: Arc<OfferCatalog>,
    destinations: Arc<DestinationCatalog>,
    next_id: i64,
    fail_next: Option<StoreError>,
    fail_mutations: bool,
}

impl StoreState {
    fn check_available(&mut self) -> Result<(), StoreError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        if self.fail_mutations {
            return Err(StoreError::network("mutations are configured to fail"));
        }
        if !self.loaded {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn validate(&self, point: &RoutePointDraft) -> Result<(), StoreError> {
        if point.date_to < point.date_from {
            return Err(StoreError::validation("end date precedes start date"));
        }
        if self.destinations.get(point.destination).is_none() {
            return Err(StoreError::validation(format!(
                "unknown destination {}",
                point.destination
            )));
        }
        let allowed = self.offers.offers_for(point.kind);
        if let Some(offer) = point
            .offers
            .iter()
            .find(|id| !allowed.iter().any(|offer| offer.id == **id))
        {
            return Err(StoreError::validation(format!(
                "offer {offer} is not available for {}",
                point.kind.label()
            )));
        }
        Ok(())
    }
}

/// In-memory [`RecordStore`] with the latency and failure modes of a remote backend.
///
/// Every accepted mutation is applied before its call resolves and announced to
/// subscribers with the caller's signal. Rejected mutations leave the points untouched
/// and announce nothing.
#[derive(Debug)]
pub struct InMemoryPointStore {
    state: Mutex<StoreState>,
    events: broadcast::Sender<ModelUpdate>,
    latency: Duration,
}

impl Default for InMemoryPointStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl InMemoryPointStore {
    pub fn new(options: StoreOptions) -> Self {
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        Self {
            state: Mutex::new(StoreState {
                fail_mutations: options.fail_mutations,
                next_id: 1,
                ..StoreState::default()
            }),
            events,
            latency: options.latency,
        }
    }

    /// Runs the initial load and announces its outcome with `Init` or `Error`.
    pub async fn init<F>(&self, load: F)
    where
        F: Future<Output = Result<Snapshot>>,
    {
        match load.await {
            Ok(snapshot) => {
                let points = snapshot.points.len();
                {
                    let mut state = self.lock();
                    state.next_id = snapshot
                        .points
                        .iter()
                        .map(|point| point.id.0)
                        .max()
                        .unwrap_or(0)
                        + 1;
                    state.points = snapshot.points;
                    state.offers = Arc::new(snapshot.offers);
                    state.destinations = Arc::new(snapshot.destinations);
                    state.loaded = true;
                }
                info!(points, "store: loaded");
                self.notify(ModelUpdate::bare(UpdateSignal::Init));
            }
            Err(err) => {
                warn!(error = ?err, "store: initial load failed");
                self.notify(ModelUpdate::bare(UpdateSignal::Error));
            }
        }
    }

    /// Rejects the next mutation with `err`.
    pub fn fail_next(&self, err: StoreError) {
        self.lock().fail_next = Some(err);
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.lock().fail_mutations = fail;
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn point(&self, id: PointId) -> Option<RoutePoint> {
        self.lock().points.iter().find(|point| point.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, update: ModelUpdate) {
        if self.events.send(update).is_err() {
            debug!("store: no subscribers for update");
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryPointStore {
    fn points(&self) -> Vec<RoutePoint> {
        self.lock().points.clone()
    }

    fn offers(&self) -> Arc<OfferCatalog> {
        Arc::clone(&self.lock().offers)
    }

    fn destinations(&self) -> Arc<DestinationCatalog> {
        Arc::clone(&self.lock().destinations)
    }

    fn subscribe(&self) -> broadcast::Receiver<ModelUpdate> {
        self.events.subscribe()
    }

    async fn update_point(
        &self,
        signal: UpdateSignal,
        point: RoutePoint,
    ) -> Result<RoutePoint, StoreError> {
        self.simulate_latency().await;
        {
            let mut state = self.lock();
            state.check_available()?;
            state.validate(&point.to_draft())?;
            let slot = state
                .points
                .iter_mut()
                .find(|existing| existing.id == point.id)
                .ok_or(StoreError::NotFound(point.id))?;
            *slot = point.clone();
        }
        debug!(point_id = point.id.0, ?signal, "store: point updated");
        self.notify(ModelUpdate::new(signal, Some(point.clone())));
        Ok(point)
    }

    async fn add_point(
        &self,
        signal: UpdateSignal,
        draft: RoutePointDraft,
    ) -> Result<RoutePoint, StoreError> {
        self.simulate_latency().await;
        let point = {
            let mut state = self.lock();
            state.check_available()?;
            state.validate(&draft)?;
            let id = PointId(state.next_id);
            state.next_id += 1;
            let point = draft.into_point(id);
            state.points.push(point.clone());
            point
        };
        debug!(point_id = point.id.0, ?signal, "store: point added");
        self.notify(ModelUpdate::new(signal, Some(point.clone())));
        Ok(point)
    }

    async fn delete_point(&self, signal: UpdateSignal, id: PointId) -> Result<(), StoreError> {
        self.simulate_latency().await;
        {
            let mut state = self.lock();
            state.check_available()?;
            let index = state
                .points
                .iter()
                .position(|point| point.id == id)
                .ok_or(StoreError::NotFound(id))?;
            state.points.remove(index);
        }
        debug!(point_id = id.0, ?signal, "store: point deleted");
        self.notify(ModelUpdate::bare(signal));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

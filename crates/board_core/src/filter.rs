//! Filter predicates and the shared filter selection.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use shared::{
    domain::RoutePoint,
    protocol::{FilterKey, ModelUpdate, UpdateSignal},
};
use tokio::sync::broadcast;
use tracing::debug;

const FILTER_EVENTS_CAPACITY: usize = 16;

pub fn matches(filter: FilterKey, point: &RoutePoint, now: DateTime<Utc>) -> bool {
    match filter {
        FilterKey::Everything => true,
        FilterKey::Future => point.date_from > now,
        FilterKey::Present => point.date_from <= now && point.date_to >= now,
        FilterKey::Past => point.date_to < now,
    }
}

pub fn apply(filter: FilterKey, points: Vec<RoutePoint>, now: DateTime<Utc>) -> Vec<RoutePoint> {
    points
        .into_iter()
        .filter(|point| matches(filter, point, now))
        .collect()
}

/// Every filter paired with whether it would currently select anything.
pub fn availability(points: &[RoutePoint], now: DateTime<Utc>) -> Vec<(FilterKey, bool)> {
    FilterKey::ALL
        .iter()
        .map(|filter| {
            (
                *filter,
                points.iter().any(|point| matches(*filter, point, now)),
            )
        })
        .collect()
}

/// Active filter, shared between the filter controls and the board.
///
/// Every [`FilterModel::set_filter`] notifies subscribers, even when the key is unchanged.
#[derive(Debug, Clone)]
pub struct FilterModel {
    current: Arc<Mutex<FilterKey>>,
    events: broadcast::Sender<ModelUpdate>,
}

impl Default for FilterModel {
    fn default() -> Self {
        Self::new(FilterKey::default())
    }
}

impl FilterModel {
    pub fn new(initial: FilterKey) -> Self {
        let (events, _) = broadcast::channel(FILTER_EVENTS_CAPACITY);
        Self {
            current: Arc::new(Mutex::new(initial)),
            events,
        }
    }

    pub fn filter(&self) -> FilterKey {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_filter(&self, signal: UpdateSignal, filter: FilterKey) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = filter;
        debug!(?filter, ?signal, "filter: changed");
        let _ = self.events.send(ModelUpdate::bare(signal));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelUpdate> {
        self.events.subscribe()
    }
}

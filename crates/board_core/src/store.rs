use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{DestinationCatalog, OfferCatalog, PointId, RoutePoint, RoutePointDraft},
    error::StoreError,
    protocol::{ModelUpdate, UpdateSignal},
};
use tokio::sync::broadcast;

/// Backing store of route points.
///
/// Reads are synchronous snapshots. Each successful mutation is applied before the call
/// resolves and is announced to subscribers as a [`ModelUpdate`] carrying the caller's
/// `signal`; failed mutations announce nothing.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn points(&self) -> Vec<RoutePoint>;
    fn offers(&self) -> Arc<OfferCatalog>;
    fn destinations(&self) -> Arc<DestinationCatalog>;
    fn subscribe(&self) -> broadcast::Receiver<ModelUpdate>;

    async fn update_point(
        &self,
        signal: UpdateSignal,
        point: RoutePoint,
    ) -> Result<RoutePoint, StoreError>;
    async fn add_point(
        &self,
        signal: UpdateSignal,
        draft: RoutePointDraft,
    ) -> Result<RoutePoint, StoreError>;
    async fn delete_point(&self, signal: UpdateSignal, id: PointId) -> Result<(), StoreError>;
}

//! Boundary between the presenters and whatever draws the board.
//!
//! Presenters describe views as [`ViewSpec`] values and move them around with the
//! structural primitives of [`ViewTree`]; templating is the implementor's concern.

use std::sync::Arc;

use shared::{
    domain::{DestinationCatalog, Offer, OfferCatalog, PointId, RoutePoint, RoutePointDraft},
    protocol::{FilterKey, SortKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Where a view is mounted: above the point list, or inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Header,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    End,
}

/// Everything the summary row of a point shows, resolved against the catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCard {
    pub point: RoutePoint,
    pub destination_name: Option<String>,
    pub offers: Vec<Offer>,
}

impl PointCard {
    pub fn resolve(
        point: &RoutePoint,
        offers: &OfferCatalog,
        destinations: &DestinationCatalog,
    ) -> Self {
        Self {
            point: point.clone(),
            destination_name: destinations
                .get(point.destination)
                .map(|destination| destination.name.clone()),
            offers: offers.selected_for(point),
        }
    }
}

/// Transient state of an open edit form. `draft` holds the user's unsaved edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditFormState {
    pub point_id: Option<PointId>,
    pub draft: RoutePointDraft,
    pub is_disabled: bool,
    pub is_saving: bool,
    pub is_deleting: bool,
}

impl EditFormState {
    pub fn for_point(point: &RoutePoint) -> Self {
        Self {
            point_id: Some(point.id),
            draft: point.to_draft(),
            is_disabled: false,
            is_saving: false,
            is_deleting: false,
        }
    }

    pub fn for_new(draft: RoutePointDraft) -> Self {
        Self {
            point_id: None,
            draft,
            is_disabled: false,
            is_saving: false,
            is_deleting: false,
        }
    }

    pub fn is_new(&self) -> bool {
        self.point_id.is_none()
    }

    pub fn mark_saving(&mut self) {
        self.is_disabled = true;
        self.is_saving = true;
    }

    pub fn mark_deleting(&mut self) {
        self.is_disabled = true;
        self.is_deleting = true;
    }

    /// Re-enables the form after a failed mutation. The draft is left untouched.
    pub fn clear_pending(&mut self) {
        self.is_disabled = false;
        self.is_saving = false;
        self.is_deleting = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSpec {
    Loading,
    LoadFailed,
    Empty {
        filter: FilterKey,
    },
    SortBar {
        active: SortKey,
    },
    Summary(PointCard),
    EditForm {
        form: EditFormState,
        offers: Arc<OfferCatalog>,
        destinations: Arc<DestinationCatalog>,
    },
}

/// Structural view operations. `unmount` also disposes the view and must be idempotent.
pub trait ViewTree: Send {
    fn create(&mut self, spec: ViewSpec) -> ViewId;
    fn mount(&mut self, view: ViewId, slot: Slot, position: Position);
    /// Puts `new` where `old` is mounted; `old` stays alive but detached.
    fn swap(&mut self, new: ViewId, old: ViewId);
    fn unmount(&mut self, view: ViewId);
    fn update(&mut self, view: ViewId, spec: ViewSpec);
    fn shake(&mut self, view: ViewId);
}

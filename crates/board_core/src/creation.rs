//! The new-point form the board opens from "New event".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::domain::{DestinationCatalog, DestinationId, OfferCatalog, PointType, RoutePointDraft};
use tracing::debug;

use crate::{
    keys::{KeyListeners, KeySubscription, KeyTarget},
    view::{EditFormState, Position, Slot, ViewId, ViewSpec, ViewTree},
};

/// Input addressed to the creation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationInput {
    Edited(RoutePointDraft),
    Submitted,
    Cancelled,
}

/// Creation form driven by the board. Implementations own their own view.
pub trait CreationForm: Send {
    /// Opens the form; a no-op while it is already open.
    fn init(
        &mut self,
        offers: Arc<OfferCatalog>,
        destinations: Arc<DestinationCatalog>,
        keys: &KeyListeners,
        tree: &mut dyn ViewTree,
    );
    /// Closes the form. Returns `true` if it was open.
    fn destroy(&mut self, tree: &mut dyn ViewTree) -> bool;
    fn set_saving(&mut self, tree: &mut dyn ViewTree);
    fn set_aborting(&mut self, tree: &mut dyn ViewTree);
    fn edit(&mut self, draft: RoutePointDraft, tree: &mut dyn ViewTree);
    /// The draft to submit, if the form is open and accepting input.
    fn submission(&self) -> Option<RoutePointDraft>;
    fn is_open(&self) -> bool;
}

#[derive(Debug)]
struct OpenForm {
    view: ViewId,
    state: EditFormState,
    offers: Arc<OfferCatalog>,
    destinations: Arc<DestinationCatalog>,
    _escape: KeySubscription,
}

impl OpenForm {
    fn spec(&self) -> ViewSpec {
        ViewSpec::EditForm {
            form: self.state.clone(),
            offers: Arc::clone(&self.offers),
            destinations: Arc::clone(&self.destinations),
        }
    }
}

/// Default creation form: a blank flight to the first known destination.
#[derive(Debug)]
pub struct NewPointForm {
    default_kind: PointType,
    now: fn() -> DateTime<Utc>,
    open: Option<OpenForm>,
}

impl Default for NewPointForm {
    fn default() -> Self {
        Self::new(PointType::Flight)
    }
}

impl NewPointForm {
    pub fn new(default_kind: PointType) -> Self {
        Self {
            default_kind,
            now: Utc::now,
            open: None,
        }
    }

    pub fn with_clock(mut self, now: fn() -> DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn state(&self) -> Option<&EditFormState> {
        self.open.as_ref().map(|open| &open.state)
    }

    pub fn view(&self) -> Option<ViewId> {
        self.open.as_ref().map(|open| open.view)
    }

    fn update(&mut self, tree: &mut dyn ViewTree, change: impl FnOnce(&mut EditFormState)) {
        if let Some(open) = self.open.as_mut() {
            change(&mut open.state);
            tree.update(open.view, open.spec());
        }
    }
}

impl CreationForm for NewPointForm {
    fn init(
        &mut self,
        offers: Arc<OfferCatalog>,
        destinations: Arc<DestinationCatalog>,
        keys: &KeyListeners,
        tree: &mut dyn ViewTree,
    ) {
        if self.open.is_some() {
            return;
        }

        let destination = destinations
            .0
            .first()
            .map_or(DestinationId(0), |destination| destination.id);
        let state = EditFormState::for_new(RoutePointDraft::blank(
            self.default_kind,
            destination,
            (self.now)(),
        ));
        let view = tree.create(ViewSpec::EditForm {
            form: state.clone(),
            offers: Arc::clone(&offers),
            destinations: Arc::clone(&destinations),
        });
        tree.mount(view, Slot::List, Position::Start);
        debug!("creation: form opened");
        self.open = Some(OpenForm {
            view,
            state,
            offers,
            destinations,
            _escape: keys.subscribe(KeyTarget::CreationForm),
        });
    }

    fn destroy(&mut self, tree: &mut dyn ViewTree) -> bool {
        match self.open.take() {
            Some(open) => {
                tree.unmount(open.view);
                debug!("creation: form closed");
                true
            }
            None => false,
        }
    }

    fn set_saving(&mut self, tree: &mut dyn ViewTree) {
        self.update(tree, EditFormState::mark_saving);
    }

    fn set_aborting(&mut self, tree: &mut dyn ViewTree) {
        if let Some(open) = &self.open {
            tree.shake(open.view);
        }
        self.update(tree, EditFormState::clear_pending);
    }

    fn edit(&mut self, draft: RoutePointDraft, tree: &mut dyn ViewTree) {
        if self.open.as_ref().is_some_and(|open| !open.state.is_disabled) {
            self.update(tree, |state| state.draft = draft);
        }
    }

    fn submission(&self) -> Option<RoutePointDraft> {
        self.open
            .as_ref()
            .filter(|open| !open.state.is_disabled)
            .map(|open| open.state.draft.clone())
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

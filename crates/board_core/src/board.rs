//! Board presenter: owns the collection lifecycle, the visible ordered set of points, the
//! registry of [`PointPresenter`]s, and the dispatch of user mutations to the store.
//!
//! Everything runs on one control flow. The only suspension point is the awaited store
//! call inside [`BoardPresenter::handle_user_action`]; the `&mut self` receiver keeps a
//! second dispatch from starting while one is in flight. Store and filter notifications
//! arrive over broadcast channels and are applied by
//! [`BoardPresenter::process_pending_updates`], which the board also calls after every
//! awaited mutation.

use std::{collections::HashMap, mem, sync::Arc};

use chrono::{DateTime, Utc};
use shared::{
    domain::{DestinationCatalog, OfferCatalog, PointId, RoutePoint},
    protocol::{FilterKey, ModelUpdate, SortKey, UpdateSignal, UserAction},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    creation::{CreationForm, CreationInput, NewPointForm},
    filter::{self, FilterModel},
    gate::ConcurrencyGate,
    keys::{Key, KeyListeners, KeyTarget},
    point_presenter::{Mode, PointHost, PointInput, PointPresenter},
    sort,
    store::RecordStore,
    view::{Position, Slot, ViewId, ViewSpec, ViewTree},
};

/// Source of "now" for the time-based filters.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Loading,
    /// The initial load failed. Terminal for this board.
    Failed,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoardContent {
    Blank,
    Loading(ViewId),
    Failed(ViewId),
    Empty(ViewId),
    Populated { sort_bar: ViewId },
}

#[derive(Debug)]
enum HostRequest {
    ModeChanged(PointId, Mode),
    Action(UserAction, UpdateSignal),
}

#[derive(Debug, Default)]
struct Outbox {
    requests: Vec<HostRequest>,
}

impl PointHost for Outbox {
    fn mode_changed(&mut self, id: PointId, mode: Mode) {
        self.requests.push(HostRequest::ModeChanged(id, mode));
    }

    fn data_changed(&mut self, action: UserAction, signal: UpdateSignal) {
        self.requests.push(HostRequest::Action(action, signal));
    }
}

pub struct BoardPresenter<T: ViewTree> {
    store: Arc<dyn RecordStore>,
    filter: FilterModel,
    tree: T,
    creation: Box<dyn CreationForm>,
    gate: ConcurrencyGate,
    keys: KeyListeners,
    clock: Clock,
    on_creation_closed: Option<Box<dyn FnMut() + Send>>,
    store_events: broadcast::Receiver<ModelUpdate>,
    filter_events: broadcast::Receiver<ModelUpdate>,
    presenters: HashMap<PointId, PointPresenter>,
    outbox: Outbox,
    offers: Arc<OfferCatalog>,
    destinations: Arc<DestinationCatalog>,
    sort: SortKey,
    state: BoardState,
    content: BoardContent,
    editing: Option<PointId>,
}

impl<T: ViewTree> BoardPresenter<T> {
    /// Subscribes to the store and the filter immediately; build the board before the
    /// store starts its initial load so the `Init`/`Error` notification is not missed.
    pub fn new(store: Arc<dyn RecordStore>, filter: FilterModel, tree: T) -> Self {
        let store_events = store.subscribe();
        let filter_events = filter.subscribe();
        Self {
            store,
            filter,
            tree,
            creation: Box::new(NewPointForm::default()),
            gate: ConcurrencyGate::default(),
            keys: KeyListeners::new(),
            clock: Arc::new(Utc::now),
            on_creation_closed: None,
            store_events,
            filter_events,
            presenters: HashMap::new(),
            outbox: Outbox::default(),
            offers: Arc::default(),
            destinations: Arc::default(),
            sort: SortKey::default(),
            state: BoardState::Loading,
            content: BoardContent::Blank,
            editing: None,
        }
    }

    pub fn with_gate(mut self, gate: ConcurrencyGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_creation_form(mut self, form: Box<dyn CreationForm>) -> Self {
        self.creation = form;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Called whenever an open creation form closes, for any reason.
    pub fn on_creation_closed(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_creation_closed = Some(Box::new(callback));
        self
    }

    pub fn init(&mut self) {
        self.render_board();
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort
    }

    pub fn filter_key(&self) -> FilterKey {
        self.filter.filter()
    }

    pub fn editing_id(&self) -> Option<PointId> {
        self.editing
    }

    pub fn presenter(&self, id: PointId) -> Option<&PointPresenter> {
        self.presenters.get(&id)
    }

    pub fn registry_ids(&self) -> Vec<PointId> {
        let mut ids: Vec<_> = self.presenters.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn editing_count(&self) -> usize {
        self.presenters
            .values()
            .filter(|presenter| presenter.mode() == Mode::Editing)
            .count()
    }

    pub fn is_empty_message_shown(&self) -> bool {
        matches!(self.content, BoardContent::Empty(_))
    }

    pub fn is_creating(&self) -> bool {
        self.creation.is_open()
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Store points after the active filter, ordered by the active sort.
    pub fn visible_points(&self) -> Vec<RoutePoint> {
        let now = (self.clock)();
        let mut points = filter::apply(self.filter.filter(), self.store.points(), now);
        sort::sort_points(&mut points, self.sort);
        points
    }

    pub fn change_sort(&mut self, sort: SortKey) {
        if self.sort == sort || self.state != BoardState::Loaded {
            return;
        }
        debug!(?sort, "board: sort changed");
        self.sort = sort;
        self.clear_board(false);
        self.render_board();
    }

    /// Opens the creation form over an unfiltered, day-sorted board.
    pub fn create_point(&mut self) {
        if self.state != BoardState::Loaded {
            warn!(state = ?self.state, "board: creation requested before points loaded");
            return;
        }

        self.sort = SortKey::Day;
        self.filter.set_filter(UpdateSignal::Major, FilterKey::Everything);
        self.process_pending_updates();

        if let Some(previous) = self.editing.take() {
            if let Some(presenter) = self.presenters.get_mut(&previous) {
                presenter.reset_view(&mut self.tree);
            }
        }

        self.creation.init(
            Arc::clone(&self.offers),
            Arc::clone(&self.destinations),
            &self.keys,
            &mut self.tree,
        );

        if let BoardContent::Empty(view) = self.content {
            self.tree.unmount(view);
            self.content = BoardContent::Blank;
        }
    }

    pub async fn handle_point_input(&mut self, id: PointId, input: PointInput) {
        let Some(presenter) = self.presenters.get_mut(&id) else {
            debug!(point_id = id.0, ?input, "board: input for unknown point ignored");
            return;
        };
        presenter.handle_input(input, &mut self.tree, &mut self.outbox);
        self.flush_outbox().await;
    }

    pub async fn handle_creation_input(&mut self, input: CreationInput) {
        match input {
            CreationInput::Edited(draft) => self.creation.edit(draft, &mut self.tree),
            CreationInput::Submitted => {
                let Some(draft) = self.creation.submission() else {
                    return;
                };
                if self.gate.is_blocked() {
                    debug!("board: creation submit ignored while busy");
                    return;
                }
                self.handle_user_action(UserAction::AddPoint(draft), UpdateSignal::Minor)
                    .await;
            }
            CreationInput::Cancelled => self.close_creation_form(),
        }
    }

    /// Routes a key press to whichever editor currently listens for it.
    pub async fn handle_key(&mut self, key: Key) {
        if key != Key::Escape {
            return;
        }
        match self.keys.latest() {
            Some(KeyTarget::Point(id)) => {
                self.handle_point_input(id, PointInput::EscapePressed).await
            }
            Some(KeyTarget::CreationForm) => self.close_creation_form(),
            None => {}
        }
    }

    /// Runs one user mutation between block and unblock of the gate.
    ///
    /// Failures never escape: they are logged and turned into abort feedback on the
    /// presenter that issued the action.
    pub async fn handle_user_action(
        &mut self,
        action: UserAction,
        signal: UpdateSignal,
    ) -> ActionOutcome {
        let _busy = self.gate.block();
        let kind = action.kind();
        let target = action.point_id();

        match &action {
            UserAction::UpdatePoint(point) => {
                if let Some(presenter) = self.presenters.get_mut(&point.id) {
                    presenter.set_saving(&mut self.tree);
                }
            }
            UserAction::DeletePoint(point) => {
                if let Some(presenter) = self.presenters.get_mut(&point.id) {
                    presenter.set_deleting(&mut self.tree);
                }
            }
            UserAction::AddPoint(_) => self.creation.set_saving(&mut self.tree),
        }

        let store = Arc::clone(&self.store);
        let result = match action {
            UserAction::UpdatePoint(point) => store.update_point(signal, point).await.map(|_| ()),
            UserAction::AddPoint(draft) => store.add_point(signal, draft).await.map(|_| ()),
            UserAction::DeletePoint(point) => store.delete_point(signal, point.id).await,
        };

        self.process_pending_updates();

        match result {
            Ok(()) => {
                info!(?kind, ?signal, point_id = target.map(|id| id.0), "board: action committed");
                ActionOutcome::Committed
            }
            Err(err) => {
                warn!(
                    ?kind,
                    point_id = target.map(|id| id.0),
                    error = %err,
                    "board: action aborted"
                );
                match target {
                    Some(id) => match self.presenters.get_mut(&id) {
                        Some(presenter) => presenter.set_aborting(&mut self.tree),
                        None => debug!(point_id = id.0, "board: aborted point no longer shown"),
                    },
                    None => self.creation.set_aborting(&mut self.tree),
                }
                ActionOutcome::Aborted
            }
        }
    }

    /// Applies every queued store and filter notification. Returns how many were applied.
    pub fn process_pending_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Some(update) = self.next_pending_update() {
            self.on_update(update);
            applied += 1;
        }
        applied
    }

    pub fn on_update(&mut self, update: ModelUpdate) {
        if self.state == BoardState::Failed {
            warn!(signal = ?update.signal, "board: update ignored after load failure");
            return;
        }

        match update.signal {
            UpdateSignal::Patch => match update.point {
                Some(point) => self.patch_point(point),
                None => warn!("board: patch without a point ignored"),
            },
            UpdateSignal::Minor => {
                self.clear_board(false);
                self.render_board();
            }
            UpdateSignal::Major => {
                self.clear_board(true);
                self.render_board();
            }
            UpdateSignal::Init => {
                info!(points = self.store.points().len(), "board: initial load complete");
                self.state = BoardState::Loaded;
                self.clear_board(false);
                self.render_board();
            }
            UpdateSignal::Error => {
                if self.state == BoardState::Loaded {
                    warn!("board: load error after successful load ignored");
                    return;
                }
                warn!("board: initial load failed");
                self.state = BoardState::Failed;
                self.clear_board(false);
                self.render_board();
            }
        }
    }

    fn next_pending_update(&mut self) -> Option<ModelUpdate> {
        for events in [&mut self.store_events, &mut self.filter_events] {
            match events.try_recv() {
                Ok(update) => return Some(update),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "board: notifications lagged, rebuilding");
                    return Some(ModelUpdate::bare(UpdateSignal::Minor));
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => {}
            }
        }
        None
    }

    async fn flush_outbox(&mut self) {
        for request in mem::take(&mut self.outbox.requests) {
            match request {
                HostRequest::ModeChanged(id, Mode::Editing) => self.enter_editing(id),
                HostRequest::ModeChanged(id, Mode::Default) => {
                    if self.editing == Some(id) {
                        self.editing = None;
                    }
                }
                HostRequest::Action(action, signal) => {
                    if self.gate.is_blocked() {
                        debug!(kind = ?action.kind(), "board: dispatch ignored while busy");
                        continue;
                    }
                    self.handle_user_action(action, signal).await;
                }
            }
        }
    }

    fn enter_editing(&mut self, id: PointId) {
        self.close_creation_form();
        if let Some(previous) = self.editing.replace(id) {
            if previous != id {
                if let Some(presenter) = self.presenters.get_mut(&previous) {
                    presenter.reset_view(&mut self.tree);
                }
            }
        }
    }

    fn patch_point(&mut self, point: RoutePoint) {
        let id = point.id;
        let Some(presenter) = self.presenters.get_mut(&id) else {
            warn!(point_id = id.0, "board: patch for point not on board ignored");
            return;
        };
        presenter.init(
            point,
            Arc::clone(&self.offers),
            Arc::clone(&self.destinations),
            &mut self.tree,
        );
        if self.editing == Some(id) {
            self.editing = None;
        }
    }

    fn close_creation_form(&mut self) {
        if !self.creation.destroy(&mut self.tree) {
            return;
        }
        self.notify_creation_closed();

        if self.state == BoardState::Loaded
            && self.content == BoardContent::Blank
            && self.visible_points().is_empty()
        {
            self.render_empty();
        }
    }

    fn notify_creation_closed(&mut self) {
        if let Some(callback) = self.on_creation_closed.as_mut() {
            callback();
        }
    }

    fn clear_board(&mut self, reset_sort: bool) {
        if self.creation.destroy(&mut self.tree) {
            self.notify_creation_closed();
        }

        for presenter in self.presenters.values_mut() {
            presenter.destroy(&mut self.tree);
        }
        self.presenters.clear();
        self.editing = None;

        match mem::replace(&mut self.content, BoardContent::Blank) {
            BoardContent::Loading(view)
            | BoardContent::Failed(view)
            | BoardContent::Empty(view)
            | BoardContent::Populated { sort_bar: view } => self.tree.unmount(view),
            BoardContent::Blank => {}
        }

        if reset_sort {
            self.sort = SortKey::default();
        }
    }

    fn render_board(&mut self) {
        match self.state {
            BoardState::Failed => {
                let view = self.tree.create(ViewSpec::LoadFailed);
                self.tree.mount(view, Slot::List, Position::Start);
                self.content = BoardContent::Failed(view);
                return;
            }
            BoardState::Loading => {
                let view = self.tree.create(ViewSpec::Loading);
                self.tree.mount(view, Slot::List, Position::Start);
                self.content = BoardContent::Loading(view);
                return;
            }
            BoardState::Loaded => {}
        }

        self.offers = self.store.offers();
        self.destinations = self.store.destinations();

        let points = self.visible_points();
        if points.is_empty() {
            self.render_empty();
            return;
        }

        let sort_bar = self.tree.create(ViewSpec::SortBar { active: self.sort });
        self.tree.mount(sort_bar, Slot::Header, Position::Start);
        self.content = BoardContent::Populated { sort_bar };

        for point in points {
            self.render_point(point);
        }
        debug!(points = self.presenters.len(), sort = ?self.sort, "board: rendered");
    }

    fn render_empty(&mut self) {
        let view = self.tree.create(ViewSpec::Empty {
            filter: self.filter.filter(),
        });
        self.tree.mount(view, Slot::Header, Position::Start);
        self.content = BoardContent::Empty(view);
    }

    fn render_point(&mut self, point: RoutePoint) {
        let id = point.id;
        let mut presenter = PointPresenter::new(self.keys.clone());
        presenter.init(
            point,
            Arc::clone(&self.offers),
            Arc::clone(&self.destinations),
            &mut self.tree,
        );
        if let Some(mut stale) = self.presenters.insert(id, presenter) {
            warn!(point_id = id.0, "board: duplicate point id replaced");
            stale.destroy(&mut self.tree);
        }
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;

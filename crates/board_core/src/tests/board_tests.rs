use super::*;
use crate::memory::MemoryViewTree;
use async_trait::async_trait;
use chrono::TimeZone;
use shared::{
    domain::{Destination, DestinationId, PointType, RoutePointDraft},
    error::StoreError,
    protocol::ActionKind,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

const A: PointId = PointId(1);
const B: PointId = PointId(2);

struct ScriptedStore {
    points: Mutex<Vec<RoutePoint>>,
    destinations: Arc<DestinationCatalog>,
    events: broadcast::Sender<ModelUpdate>,
    failure: Mutex<Option<StoreError>>,
    calls: Mutex<Vec<ActionKind>>,
    gate_blocked_during_call: Mutex<Vec<bool>>,
    gate: ConcurrencyGate,
}

impl ScriptedStore {
    fn new(points: Vec<RoutePoint>, gate: ConcurrencyGate) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            points: Mutex::new(points),
            destinations: Arc::new(DestinationCatalog(vec![
                destination(1, "Amsterdam"),
                destination(2, "Geneva"),
            ])),
            events,
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            gate_blocked_during_call: Mutex::new(Vec::new()),
            gate,
        })
    }

    fn emit(&self, signal: UpdateSignal) {
        let _ = self.events.send(ModelUpdate::bare(signal));
    }

    fn fail_next(&self, err: StoreError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    fn calls(&self) -> Vec<ActionKind> {
        self.calls.lock().unwrap().clone()
    }

    fn begin(&self, kind: ActionKind) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(kind);
        self.gate_blocked_during_call
            .lock()
            .unwrap()
            .push(self.gate.is_blocked());
        match self.failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    fn points(&self) -> Vec<RoutePoint> {
        self.points.lock().unwrap().clone()
    }

    fn offers(&self) -> Arc<OfferCatalog> {
        Arc::default()
    }

    fn destinations(&self) -> Arc<DestinationCatalog> {
        Arc::clone(&self.destinations)
    }

    fn subscribe(&self) -> broadcast::Receiver<ModelUpdate> {
        self.events.subscribe()
    }

    async fn update_point(
        &self,
        signal: UpdateSignal,
        point: RoutePoint,
    ) -> Result<RoutePoint, StoreError> {
        self.begin(ActionKind::Update)?;
        {
            let mut points = self.points.lock().unwrap();
            let slot = points
                .iter_mut()
                .find(|existing| existing.id == point.id)
                .ok_or(StoreError::NotFound(point.id))?;
            *slot = point.clone();
        }
        let _ = self.events.send(ModelUpdate::new(signal, Some(point.clone())));
        Ok(point)
    }

    async fn add_point(
        &self,
        signal: UpdateSignal,
        draft: RoutePointDraft,
    ) -> Result<RoutePoint, StoreError> {
        self.begin(ActionKind::Add)?;
        let point = {
            let mut points = self.points.lock().unwrap();
            let next = points.iter().map(|point| point.id.0).max().unwrap_or(0) + 1;
            let point = draft.into_point(PointId(next));
            points.push(point.clone());
            point
        };
        let _ = self.events.send(ModelUpdate::new(signal, Some(point.clone())));
        Ok(point)
    }

    async fn delete_point(&self, signal: UpdateSignal, id: PointId) -> Result<(), StoreError> {
        self.begin(ActionKind::Delete)?;
        self.points.lock().unwrap().retain(|point| point.id != id);
        self.emit(signal);
        Ok(())
    }
}

struct Harness {
    store: Arc<ScriptedStore>,
    filter: FilterModel,
    board: BoardPresenter<MemoryViewTree>,
    closed: Arc<AtomicUsize>,
}

impl Harness {
    fn new(points: Vec<RoutePoint>) -> Self {
        let gate = ConcurrencyGate::default();
        let store = ScriptedStore::new(points, gate.clone());
        let filter = FilterModel::default();
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let clock: Clock = Arc::new(fixed_now);

        let mut board = BoardPresenter::new(store.clone(), filter.clone(), MemoryViewTree::new())
            .with_gate(gate)
            .with_clock(clock)
            .with_creation_form(Box::new(NewPointForm::default().with_clock(fixed_now)))
            .on_creation_closed(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        board.init();

        Self {
            store,
            filter,
            board,
            closed,
        }
    }

    fn loaded(points: Vec<RoutePoint>) -> Self {
        let mut harness = Self::new(points);
        harness.store.emit(UpdateSignal::Init);
        harness.board.process_pending_updates();
        harness
    }

    fn listed_ids(&self) -> Vec<i64> {
        let tree = self.board.tree();
        tree.mounted(Slot::List)
            .iter()
            .filter_map(|view| match tree.spec(*view) {
                Some(ViewSpec::Summary(card)) => Some(card.point.id.0),
                _ => None,
            })
            .collect()
    }

    fn header_specs(&self) -> Vec<ViewSpec> {
        let tree = self.board.tree();
        tree.mounted(Slot::Header)
            .iter()
            .filter_map(|view| tree.spec(*view).cloned())
            .collect()
    }

    fn displayed(&self, id: PointId) -> ViewId {
        self.board
            .presenter(id)
            .and_then(PointPresenter::displayed_view)
            .expect("point is rendered")
    }

    fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn destination(id: i64, name: &str) -> Destination {
    Destination {
        id: DestinationId(id),
        name: name.into(),
        description: String::new(),
        pictures: Vec::new(),
    }
}

/// Starts on 2024-01-02, after the fixed clock.
fn point_a() -> RoutePoint {
    RoutePoint {
        id: A,
        kind: PointType::Flight,
        base_price: 50,
        date_from: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
        date_to: Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
        destination: DestinationId(1),
        offers: Vec::new(),
        is_favorite: false,
    }
}

/// Ends on 2024-01-01 morning, before the fixed clock.
fn point_b() -> RoutePoint {
    RoutePoint {
        id: B,
        kind: PointType::Train,
        base_price: 200,
        date_from: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        date_to: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        destination: DestinationId(2),
        offers: Vec::new(),
        is_favorite: false,
    }
}

#[tokio::test]
async fn shows_loading_until_the_first_notification() {
    let harness = Harness::new(vec![point_a()]);

    assert_eq!(harness.board.state(), BoardState::Loading);
    assert_eq!(
        harness.board.tree().mounted_specs(),
        vec![&ViewSpec::Loading]
    );
    assert!(harness.board.registry_ids().is_empty());
}

#[tokio::test]
async fn init_renders_points_in_day_order() {
    let harness = Harness::loaded(vec![point_a(), point_b()]);

    assert_eq!(harness.board.state(), BoardState::Loaded);
    assert_eq!(harness.listed_ids(), vec![2, 1]);
    assert_eq!(
        harness.header_specs(),
        vec![ViewSpec::SortBar {
            active: SortKey::Day
        }]
    );
    assert_eq!(harness.board.visible_points(), harness.board.visible_points());
    assert_eq!(harness.board.registry_ids(), vec![A, B]);
}

#[tokio::test]
async fn load_error_is_terminal() {
    let mut harness = Harness::new(vec![point_a()]);
    harness.store.emit(UpdateSignal::Error);
    harness.board.process_pending_updates();

    harness.store.emit(UpdateSignal::Minor);
    harness.store.emit(UpdateSignal::Init);
    harness.board.process_pending_updates();

    assert_eq!(harness.board.state(), BoardState::Failed);
    assert_eq!(
        harness.board.tree().mounted_specs(),
        vec![&ViewSpec::LoadFailed]
    );
    assert!(harness.board.registry_ids().is_empty());
}

#[tokio::test]
async fn load_error_after_success_is_ignored() {
    let mut harness = Harness::loaded(vec![point_a()]);

    harness.store.emit(UpdateSignal::Error);
    harness.board.process_pending_updates();

    assert_eq!(harness.board.state(), BoardState::Loaded);
    assert_eq!(harness.listed_ids(), vec![1]);
}

#[tokio::test]
async fn empty_filter_result_switches_straight_to_populated() {
    let mut harness = Harness::loaded(vec![point_b()]);
    harness
        .filter
        .set_filter(UpdateSignal::Minor, FilterKey::Future);
    harness.board.process_pending_updates();

    assert!(harness.board.is_empty_message_shown());
    assert_eq!(
        harness.header_specs(),
        vec![ViewSpec::Empty {
            filter: FilterKey::Future
        }]
    );

    harness
        .filter
        .set_filter(UpdateSignal::Minor, FilterKey::Past);
    harness.board.process_pending_updates();

    assert_eq!(harness.listed_ids(), vec![2]);
    assert!(!harness
        .board
        .tree()
        .mounted_specs()
        .contains(&&ViewSpec::Loading));
    assert_eq!(harness.board.tree().live_views(), 2);
}

#[tokio::test]
async fn favorite_commit_patches_only_that_point() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);
    let a_before = harness.displayed(A);
    let b_before = harness.displayed(B);

    harness
        .board
        .handle_point_input(A, PointInput::FavoriteClicked)
        .await;

    assert_eq!(harness.store.calls(), vec![ActionKind::Update]);
    assert_eq!(
        *harness.store.gate_blocked_during_call.lock().unwrap(),
        vec![true]
    );
    assert!(!harness.board.gate().is_blocked());
    assert_eq!(harness.board.gate().cycles(), 1);

    let a_after = harness.displayed(A);
    assert_ne!(a_after, a_before);
    assert_eq!(harness.displayed(B), b_before);
    assert_eq!(harness.board.tree().shake_count(a_after), 0);
    assert_eq!(
        harness.board.presenter(A).and_then(|p| p.point()).map(|p| p.is_favorite),
        Some(true)
    );
    assert_eq!(harness.board.tree().live_views(), 3);
}

#[tokio::test]
async fn favorite_rejection_shakes_without_changing_fields() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);
    harness.store.fail_next(StoreError::network("offline"));
    let summary = harness.displayed(A);

    harness
        .board
        .handle_point_input(A, PointInput::FavoriteClicked)
        .await;

    assert!(!harness.board.gate().is_blocked());
    assert_eq!(harness.board.gate().cycles(), 1);
    assert_eq!(harness.displayed(A), summary);
    assert_eq!(harness.board.tree().shake_count(summary), 1);
    assert_eq!(
        harness.board.presenter(A).and_then(|p| p.point()),
        Some(&point_a())
    );
}

#[tokio::test]
async fn dispatch_is_skipped_while_the_gate_is_held() {
    let mut harness = Harness::loaded(vec![point_a()]);
    let _held = harness.board.gate().block();

    harness
        .board
        .handle_point_input(A, PointInput::FavoriteClicked)
        .await;

    assert!(harness.store.calls().is_empty());
}

#[tokio::test]
async fn opening_a_second_editor_collapses_the_first() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);

    harness
        .board
        .handle_point_input(A, PointInput::UnrollClicked)
        .await;
    harness
        .board
        .handle_point_input(B, PointInput::UnrollClicked)
        .await;

    assert_eq!(harness.board.editing_count(), 1);
    assert_eq!(harness.board.editing_id(), Some(B));
    assert_eq!(
        harness.board.presenter(A).map(PointPresenter::mode),
        Some(Mode::Default)
    );

    harness.board.handle_key(Key::Escape).await;

    assert_eq!(harness.board.editing_count(), 0);
    assert_eq!(harness.board.editing_id(), None);
}

#[tokio::test]
async fn failed_submit_keeps_the_edited_draft() {
    let mut harness = Harness::loaded(vec![point_a()]);
    harness
        .board
        .handle_point_input(A, PointInput::UnrollClicked)
        .await;
    let mut draft = point_a().to_draft();
    draft.base_price = 999;
    harness
        .board
        .handle_point_input(A, PointInput::FormEdited(draft.clone()))
        .await;
    harness
        .store
        .fail_next(StoreError::validation("end before start"));

    harness
        .board
        .handle_point_input(A, PointInput::FormSubmitted)
        .await;

    let presenter = harness.board.presenter(A).expect("still listed");
    let state = presenter.form_state().expect("still editing");
    assert_eq!(state.draft, draft);
    assert!(!state.is_disabled && !state.is_saving);
    assert_eq!(harness.board.tree().shake_count(harness.displayed(A)), 1);
    assert!(!harness.board.gate().is_blocked());
}

#[tokio::test]
async fn committed_submit_rebuilds_with_the_saved_point() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);
    harness
        .board
        .handle_point_input(A, PointInput::UnrollClicked)
        .await;
    let mut draft = point_a().to_draft();
    draft.base_price = 75;
    harness
        .board
        .handle_point_input(A, PointInput::FormEdited(draft))
        .await;

    harness
        .board
        .handle_point_input(A, PointInput::FormSubmitted)
        .await;

    assert_eq!(harness.board.editing_id(), None);
    assert_eq!(harness.board.editing_count(), 0);
    assert_eq!(
        harness.board.presenter(A).and_then(|p| p.point()).map(|p| p.base_price),
        Some(75)
    );
    assert_eq!(harness.board.tree().live_views(), 3);
}

#[tokio::test]
async fn delete_removes_the_point_and_its_views() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);
    harness
        .board
        .handle_point_input(A, PointInput::UnrollClicked)
        .await;

    harness
        .board
        .handle_point_input(A, PointInput::DeleteClicked)
        .await;

    assert_eq!(harness.store.calls(), vec![ActionKind::Delete]);
    assert_eq!(harness.board.registry_ids(), vec![B]);
    assert_eq!(harness.listed_ids(), vec![2]);
    assert_eq!(harness.board.tree().live_views(), 2);
}

#[tokio::test]
async fn sort_change_keeps_until_a_major_update() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);

    harness.board.change_sort(SortKey::Price);
    assert_eq!(harness.listed_ids(), vec![2, 1]);
    harness.board.change_sort(SortKey::Time);
    assert_eq!(harness.listed_ids(), vec![2, 1]);

    harness.store.emit(UpdateSignal::Minor);
    harness.board.process_pending_updates();
    assert_eq!(harness.board.sort_key(), SortKey::Time);

    harness.store.emit(UpdateSignal::Major);
    harness.board.process_pending_updates();
    assert_eq!(harness.board.sort_key(), SortKey::Day);
    assert_eq!(harness.board.registry_ids(), vec![A, B]);
}

#[tokio::test]
async fn create_point_resets_the_board_and_collapses_editors() {
    let mut harness = Harness::loaded(vec![point_a(), point_b()]);
    harness
        .filter
        .set_filter(UpdateSignal::Minor, FilterKey::Past);
    harness.board.process_pending_updates();
    harness.board.change_sort(SortKey::Price);
    harness
        .board
        .handle_point_input(B, PointInput::UnrollClicked)
        .await;

    harness.board.create_point();

    assert_eq!(harness.board.sort_key(), SortKey::Day);
    assert_eq!(harness.board.filter_key(), FilterKey::Everything);
    assert_eq!(harness.board.editing_count(), 0);
    assert!(harness.board.is_creating());
    assert_eq!(harness.listed_ids(), vec![2, 1]);

    harness.board.handle_key(Key::Escape).await;

    assert!(!harness.board.is_creating());
    assert_eq!(harness.closed_count(), 1);
}

#[tokio::test]
async fn unrolling_a_point_closes_the_creation_form() {
    let mut harness = Harness::loaded(vec![point_a()]);
    harness.board.create_point();

    harness
        .board
        .handle_point_input(A, PointInput::UnrollClicked)
        .await;

    assert!(!harness.board.is_creating());
    assert_eq!(harness.closed_count(), 1);
    assert_eq!(harness.board.editing_id(), Some(A));
}

#[tokio::test]
async fn empty_message_hides_while_creating_and_returns_on_cancel() {
    let mut harness = Harness::loaded(Vec::new());
    assert!(harness.board.is_empty_message_shown());

    harness.board.create_point();
    assert!(!harness.board.is_empty_message_shown());
    assert!(harness.board.is_creating());

    harness
        .board
        .handle_creation_input(CreationInput::Cancelled)
        .await;

    assert!(harness.board.is_empty_message_shown());
    assert_eq!(harness.closed_count(), 1);
    assert_eq!(harness.board.tree().live_views(), 1);
}

#[tokio::test]
async fn committed_creation_closes_the_form_and_lists_the_new_point() {
    let mut harness = Harness::loaded(Vec::new());
    harness.board.create_point();
    let mut draft = RoutePointDraft::blank(PointType::Bus, DestinationId(2), fixed_now());
    draft.base_price = 70;
    harness
        .board
        .handle_creation_input(CreationInput::Edited(draft))
        .await;

    harness
        .board
        .handle_creation_input(CreationInput::Submitted)
        .await;

    assert_eq!(harness.store.calls(), vec![ActionKind::Add]);
    assert!(!harness.board.is_creating());
    assert_eq!(harness.closed_count(), 1);
    assert_eq!(harness.board.registry_ids(), vec![PointId(1)]);
    assert!(!harness.board.is_empty_message_shown());
}

#[tokio::test]
async fn rejected_creation_shakes_the_form_and_keeps_it_open() {
    let mut harness = Harness::loaded(Vec::new());
    harness.board.create_point();
    harness.store.fail_next(StoreError::Unavailable);

    harness
        .board
        .handle_creation_input(CreationInput::Submitted)
        .await;

    assert!(harness.board.is_creating());
    assert_eq!(harness.closed_count(), 0);
    assert_eq!(harness.board.gate().cycles(), 1);
    let form = harness.board.tree().mounted(Slot::List)[0];
    assert_eq!(harness.board.tree().shake_count(form), 1);
}

#[tokio::test]
async fn actions_on_unknown_points_still_release_the_gate() {
    let mut harness = Harness::loaded(vec![point_a()]);
    let mut ghost = point_a();
    ghost.id = PointId(42);

    let outcome = harness
        .board
        .handle_user_action(UserAction::UpdatePoint(ghost), UpdateSignal::Minor)
        .await;

    assert_eq!(outcome, ActionOutcome::Aborted);
    assert!(!harness.board.gate().is_blocked());
    assert_eq!(harness.board.registry_ids(), vec![A]);
}

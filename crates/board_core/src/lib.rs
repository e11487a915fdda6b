//! Presentation orchestration for the route board.
//!
//! [`BoardPresenter`] owns the collection lifecycle and one [`PointPresenter`] per visible
//! route point. User mutations go through the [`ConcurrencyGate`] to a [`RecordStore`]; the
//! store's [`ModelUpdate`](shared::protocol::ModelUpdate) notifications drive reconciliation.

pub mod board;
pub mod creation;
pub mod filter;
pub mod gate;
pub mod keys;
pub mod memory;
pub mod point_presenter;
pub mod sort;
pub mod store;
pub mod view;

pub use board::{ActionOutcome, BoardPresenter, BoardState, Clock};
pub use creation::{CreationForm, CreationInput, NewPointForm};
pub use filter::FilterModel;
pub use gate::{ConcurrencyGate, GateGuard, GateTimings};
pub use keys::{Key, KeyListeners, KeySubscription, KeyTarget};
pub use memory::MemoryViewTree;
pub use point_presenter::{Mode, PointHost, PointInput, PointPresenter};
pub use store::RecordStore;
pub use view::{EditFormState, PointCard, Position, Slot, ViewId, ViewSpec, ViewTree};

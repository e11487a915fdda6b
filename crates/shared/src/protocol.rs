use serde::{Deserialize, Serialize};

use crate::domain::{PointId, RoutePoint, RoutePointDraft};

/// Scope of a model change, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSignal {
    /// One point changed; only its presenter re-renders.
    Patch,
    /// Rebuild the board, keeping sort and filter.
    Minor,
    /// Rebuild the board and reset the sort.
    Major,
    /// Initial load finished.
    Init,
    /// Initial load failed.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Update,
    Add,
    Delete,
}

/// A mutation requested by the user, carrying its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UserAction {
    UpdatePoint(RoutePoint),
    AddPoint(RoutePointDraft),
    DeletePoint(RoutePoint),
}

impl UserAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::UpdatePoint(_) => ActionKind::Update,
            Self::AddPoint(_) => ActionKind::Add,
            Self::DeletePoint(_) => ActionKind::Delete,
        }
    }

    /// Id of the existing point the action targets; `None` for additions.
    pub fn point_id(&self) -> Option<PointId> {
        match self {
            Self::UpdatePoint(point) | Self::DeletePoint(point) => Some(point.id),
            Self::AddPoint(_) => None,
        }
    }
}

/// The `(signal, data)` pair delivered to model observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUpdate {
    pub signal: UpdateSignal,
    pub point: Option<RoutePoint>,
}

impl ModelUpdate {
    pub fn new(signal: UpdateSignal, point: Option<RoutePoint>) -> Self {
        Self { signal, point }
    }

    pub fn bare(signal: UpdateSignal) -> Self {
        Self {
            signal,
            point: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Day,
    Time,
    Price,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Day, SortKey::Time, SortKey::Price];

    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Time => "Time",
            Self::Price => "Price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    #[default]
    Everything,
    Future,
    Present,
    Past,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Everything,
        FilterKey::Future,
        FilterKey::Present,
        FilterKey::Past,
    ];

    /// Message shown when the filter leaves no points to display.
    pub fn empty_message(self) -> &'static str {
        match self {
            Self::Everything => "Click New Event to create your first point",
            Self::Future => "There are no future events now",
            Self::Present => "There are no present events now",
            Self::Past => "There are no past events now",
        }
    }
}

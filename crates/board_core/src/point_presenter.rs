//! Presenter for a single route point: summary row, edit form, and mutation feedback.

use std::sync::Arc;

use shared::{
    domain::{DestinationCatalog, OfferCatalog, PointId, RoutePoint, RoutePointDraft},
    protocol::{UpdateSignal, UserAction},
};
use tracing::{debug, warn};

use crate::{
    keys::{KeyListeners, KeySubscription, KeyTarget},
    view::{EditFormState, PointCard, Position, Slot, ViewId, ViewSpec, ViewTree},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Default,
    Editing,
}

/// User input addressed to one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointInput {
    UnrollClicked,
    RollupClicked,
    EscapePressed,
    FavoriteClicked,
    FormEdited(RoutePointDraft),
    FormSubmitted,
    DeleteClicked,
}

/// Owner-side hooks a point presenter reports to.
pub trait PointHost {
    fn mode_changed(&mut self, id: PointId, mode: Mode);
    fn data_changed(&mut self, action: UserAction, signal: UpdateSignal);
}

#[derive(Debug)]
struct PointData {
    point: RoutePoint,
    offers: Arc<OfferCatalog>,
    destinations: Arc<DestinationCatalog>,
}

#[derive(Debug)]
enum PointDisplay {
    Summary {
        summary: ViewId,
    },
    Editing {
        summary: ViewId,
        form: ViewId,
        state: EditFormState,
        _escape: KeySubscription,
    },
}

#[derive(Debug)]
pub struct PointPresenter {
    keys: KeyListeners,
    data: Option<PointData>,
    display: Option<PointDisplay>,
}

impl PointPresenter {
    pub fn new(keys: KeyListeners) -> Self {
        Self {
            keys,
            data: None,
            display: None,
        }
    }

    /// (Re)builds the summary from `point`. An open editor is collapsed.
    pub fn init(
        &mut self,
        point: RoutePoint,
        offers: Arc<OfferCatalog>,
        destinations: Arc<DestinationCatalog>,
        tree: &mut dyn ViewTree,
    ) {
        let summary = tree.create(ViewSpec::Summary(PointCard::resolve(
            &point,
            &offers,
            &destinations,
        )));

        match self.display.take() {
            None => tree.mount(summary, Slot::List, Position::End),
            Some(PointDisplay::Summary { summary: previous }) => {
                tree.swap(summary, previous);
                tree.unmount(previous);
            }
            Some(PointDisplay::Editing {
                summary: previous,
                form,
                ..
            }) => {
                debug!(point_id = point.id.0, "point: re-render collapsed open editor");
                tree.swap(summary, form);
                tree.unmount(form);
                tree.unmount(previous);
            }
        }

        self.display = Some(PointDisplay::Summary { summary });
        self.data = Some(PointData {
            point,
            offers,
            destinations,
        });
    }

    /// Abandons an open editor, discarding its draft. No-op in [`Mode::Default`].
    pub fn reset_view(&mut self, tree: &mut dyn ViewTree) {
        self.close_editor(tree);
    }

    pub fn destroy(&mut self, tree: &mut dyn ViewTree) {
        match self.display.take() {
            Some(PointDisplay::Summary { summary }) => tree.unmount(summary),
            Some(PointDisplay::Editing { summary, form, .. }) => {
                tree.unmount(form);
                tree.unmount(summary);
            }
            None => {}
        }
    }

    pub fn set_saving(&mut self, tree: &mut dyn ViewTree) {
        self.update_form(tree, EditFormState::mark_saving);
    }

    pub fn set_deleting(&mut self, tree: &mut dyn ViewTree) {
        self.update_form(tree, EditFormState::mark_deleting);
    }

    /// Shakes the displayed view after a failed mutation; an open form is re-enabled with
    /// the user's edits intact.
    pub fn set_aborting(&mut self, tree: &mut dyn ViewTree) {
        match self.display {
            Some(PointDisplay::Summary { summary }) => tree.shake(summary),
            Some(PointDisplay::Editing { form, .. }) => {
                tree.shake(form);
                self.update_form(tree, EditFormState::clear_pending);
            }
            None => warn!("point: abort feedback requested before render"),
        }
    }

    pub fn handle_input(
        &mut self,
        input: PointInput,
        tree: &mut dyn ViewTree,
        host: &mut dyn PointHost,
    ) {
        let Some(id) = self.id() else {
            warn!(?input, "point: input before render ignored");
            return;
        };

        match input {
            PointInput::UnrollClicked => {
                if self.mode() == Mode::Default {
                    host.mode_changed(id, Mode::Editing);
                    self.open_editor(tree);
                }
            }
            PointInput::RollupClicked | PointInput::EscapePressed => {
                if self.close_editor(tree) {
                    host.mode_changed(id, Mode::Default);
                }
            }
            PointInput::FavoriteClicked => match (&self.display, &self.data) {
                (Some(PointDisplay::Summary { .. }), Some(data)) => {
                    let toggled = data.point.with_favorite(!data.point.is_favorite);
                    host.data_changed(UserAction::UpdatePoint(toggled), UpdateSignal::Patch);
                }
                _ => debug!(point_id = id.0, "point: favorite toggle ignored while editing"),
            },
            PointInput::FormEdited(draft) => {
                if self.form_accepts_input() {
                    self.update_form(tree, |state| state.draft = draft);
                }
            }
            PointInput::FormSubmitted => {
                if let Some(state) = self.form_state().filter(|state| !state.is_disabled) {
                    let edited = state.draft.clone().into_point(id);
                    host.data_changed(UserAction::UpdatePoint(edited), UpdateSignal::Minor);
                }
            }
            PointInput::DeleteClicked => {
                if self.form_accepts_input() {
                    if let Some(data) = &self.data {
                        host.data_changed(
                            UserAction::DeletePoint(data.point.clone()),
                            UpdateSignal::Minor,
                        );
                    }
                }
            }
        }
    }

    pub fn id(&self) -> Option<PointId> {
        self.data.as_ref().map(|data| data.point.id)
    }

    pub fn point(&self) -> Option<&RoutePoint> {
        self.data.as_ref().map(|data| &data.point)
    }

    pub fn mode(&self) -> Mode {
        match self.display {
            Some(PointDisplay::Editing { .. }) => Mode::Editing,
            _ => Mode::Default,
        }
    }

    pub fn form_state(&self) -> Option<&EditFormState> {
        match &self.display {
            Some(PointDisplay::Editing { state, .. }) => Some(state),
            _ => None,
        }
    }

    /// The view currently mounted for this point.
    pub fn displayed_view(&self) -> Option<ViewId> {
        match self.display {
            Some(PointDisplay::Summary { summary }) => Some(summary),
            Some(PointDisplay::Editing { form, .. }) => Some(form),
            None => None,
        }
    }

    /// Every view this presenter owns, mounted or detached.
    pub fn owned_views(&self) -> Vec<ViewId> {
        match self.display {
            Some(PointDisplay::Summary { summary }) => vec![summary],
            Some(PointDisplay::Editing { summary, form, .. }) => vec![summary, form],
            None => Vec::new(),
        }
    }

    fn form_accepts_input(&self) -> bool {
        self.form_state().is_some_and(|state| !state.is_disabled)
    }

    fn open_editor(&mut self, tree: &mut dyn ViewTree) {
        let (Some(PointDisplay::Summary { summary }), Some(data)) = (&self.display, &self.data)
        else {
            return;
        };
        let summary = *summary;
        let state = EditFormState::for_point(&data.point);
        let form = tree.create(form_spec(data, &state));
        tree.swap(form, summary);

        self.display = Some(PointDisplay::Editing {
            summary,
            form,
            state,
            _escape: self.keys.subscribe(KeyTarget::Point(data.point.id)),
        });
    }

    /// Returns `true` if an editor was open.
    fn close_editor(&mut self, tree: &mut dyn ViewTree) -> bool {
        match self.display.take() {
            Some(PointDisplay::Editing { summary, form, .. }) => {
                tree.swap(summary, form);
                tree.unmount(form);
                self.display = Some(PointDisplay::Summary { summary });
                true
            }
            other => {
                self.display = other;
                false
            }
        }
    }

    fn update_form(&mut self, tree: &mut dyn ViewTree, change: impl FnOnce(&mut EditFormState)) {
        let (Some(PointDisplay::Editing { form, state, .. }), Some(data)) =
            (&mut self.display, &self.data)
        else {
            return;
        };
        change(state);
        tree.update(*form, form_spec(data, state));
    }
}

fn form_spec(data: &PointData, state: &EditFormState) -> ViewSpec {
    ViewSpec::EditForm {
        form: state.clone(),
        offers: Arc::clone(&data.offers),
        destinations: Arc::clone(&data.destinations),
    }
}

#[cfg(test)]
#[path = "tests/point_presenter_tests.rs"]
mod tests;

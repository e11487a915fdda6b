//! In-memory [`ViewTree`] that records structure instead of drawing it.

use std::collections::HashMap;

use shared::domain::format_duration;
use tracing::warn;

use crate::view::{Position, Slot, ViewId, ViewSpec, ViewTree};

#[derive(Debug)]
struct ViewEntry {
    spec: ViewSpec,
    shakes: u32,
}

#[derive(Debug, Default)]
pub struct MemoryViewTree {
    next_id: u64,
    views: HashMap<ViewId, ViewEntry>,
    header: Vec<ViewId>,
    list: Vec<ViewId>,
}

impl MemoryViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spec(&self, view: ViewId) -> Option<&ViewSpec> {
        self.views.get(&view).map(|entry| &entry.spec)
    }

    pub fn is_alive(&self, view: ViewId) -> bool {
        self.views.contains_key(&view)
    }

    pub fn is_mounted(&self, view: ViewId) -> bool {
        self.slot_of(view).is_some()
    }

    pub fn mounted(&self, slot: Slot) -> &[ViewId] {
        match slot {
            Slot::Header => &self.header,
            Slot::List => &self.list,
        }
    }

    /// Specs of every mounted view, header first.
    pub fn mounted_specs(&self) -> Vec<&ViewSpec> {
        self.header
            .iter()
            .chain(self.list.iter())
            .filter_map(|view| self.spec(*view))
            .collect()
    }

    pub fn shake_count(&self, view: ViewId) -> u32 {
        self.views.get(&view).map_or(0, |entry| entry.shakes)
    }

    /// Views created and not yet disposed, mounted or not.
    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    /// One line of text per mounted view, header first.
    pub fn render_lines(&self) -> Vec<String> {
        self.mounted_specs().into_iter().map(describe).collect()
    }

    fn slot_of(&self, view: ViewId) -> Option<(Slot, usize)> {
        if let Some(index) = self.header.iter().position(|id| *id == view) {
            return Some((Slot::Header, index));
        }
        self.list
            .iter()
            .position(|id| *id == view)
            .map(|index| (Slot::List, index))
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Vec<ViewId> {
        match slot {
            Slot::Header => &mut self.header,
            Slot::List => &mut self.list,
        }
    }

    fn detach(&mut self, view: ViewId) {
        if let Some((slot, index)) = self.slot_of(view) {
            self.slot_mut(slot).remove(index);
        }
    }
}

impl ViewTree for MemoryViewTree {
    fn create(&mut self, spec: ViewSpec) -> ViewId {
        self.next_id += 1;
        let view = ViewId(self.next_id);
        self.views.insert(view, ViewEntry { spec, shakes: 0 });
        view
    }

    fn mount(&mut self, view: ViewId, slot: Slot, position: Position) {
        if !self.is_alive(view) {
            warn!(view = view.0, "view: mount of unknown view ignored");
            return;
        }
        self.detach(view);
        let views = self.slot_mut(slot);
        match position {
            Position::Start => views.insert(0, view),
            Position::End => views.push(view),
        }
    }

    fn swap(&mut self, new: ViewId, old: ViewId) {
        if !self.is_alive(new) {
            warn!(view = new.0, "view: swap with unknown view ignored");
            return;
        }
        self.detach(new);
        let Some((slot, index)) = self.slot_of(old) else {
            warn!(old = old.0, new = new.0, "view: swap target is not mounted");
            return;
        };
        if let Some(entry) = self.slot_mut(slot).get_mut(index) {
            *entry = new;
        }
    }

    fn unmount(&mut self, view: ViewId) {
        self.detach(view);
        self.views.remove(&view);
    }

    fn update(&mut self, view: ViewId, spec: ViewSpec) {
        match self.views.get_mut(&view) {
            Some(entry) => entry.spec = spec,
            None => warn!(view = view.0, "view: update of unknown view ignored"),
        }
    }

    fn shake(&mut self, view: ViewId) {
        if let Some(entry) = self.views.get_mut(&view) {
            entry.shakes += 1;
        }
    }
}

fn describe(spec: &ViewSpec) -> String {
    match spec {
        ViewSpec::Loading => "Loading...".to_string(),
        ViewSpec::LoadFailed => "Failed to load latest route information".to_string(),
        ViewSpec::Empty { filter } => filter.empty_message().to_string(),
        ViewSpec::SortBar { active } => format!("[sort: {}]", active.label()),
        ViewSpec::Summary(card) => {
            let point = &card.point;
            let mut line = format!(
                "{} {} {} {}-{} ({}) EUR {}",
                if point.is_favorite { "*" } else { " " },
                point.date_from.format("%b %d"),
                point.kind.label(),
                point.date_from.format("%H:%M"),
                point.date_to.format("%H:%M"),
                format_duration(point.duration()),
                point.base_price,
            );
            if let Some(name) = &card.destination_name {
                line.push_str(&format!(" @ {name}"));
            }
            for offer in &card.offers {
                line.push_str(&format!(" +{} EUR {}", offer.title, offer.price));
            }
            line
        }
        ViewSpec::EditForm { form, destinations, .. } => {
            let destination = destinations
                .get(form.draft.destination)
                .map_or("?", |destination| destination.name.as_str());
            let status = if form.is_saving {
                " (saving...)"
            } else if form.is_deleting {
                " (deleting...)"
            } else {
                ""
            };
            format!(
                "[{}] {} {} EUR {}{}",
                if form.is_new() { "new" } else { "edit" },
                form.draft.kind.label(),
                destination,
                form.draft.base_price,
                status,
            )
        }
    }
}

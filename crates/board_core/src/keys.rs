//! Scoped keyboard subscriptions.
//!
//! An open editor subscribes for Escape while it is open; the subscription is released
//! when the [`KeySubscription`] is dropped, so repeated edit/cancel cycles never leak a
//! listener.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use shared::domain::PointId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTarget {
    Point(PointId),
    CreationForm,
}

#[derive(Debug, Default)]
struct Registry {
    next_token: u64,
    entries: Vec<(u64, KeyTarget)>,
}

#[derive(Debug, Clone, Default)]
pub struct KeyListeners {
    registry: Arc<Mutex<Registry>>,
}

impl KeyListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, target: KeyTarget) -> KeySubscription {
        let mut registry = lock(&self.registry);
        registry.next_token += 1;
        let token = registry.next_token;
        registry.entries.push((token, target));
        KeySubscription {
            token,
            target,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// The most recently subscribed target still listening.
    pub fn latest(&self) -> Option<KeyTarget> {
        lock(&self.registry)
            .entries
            .last()
            .map(|(_, target)| *target)
    }

    pub fn active(&self) -> Vec<KeyTarget> {
        lock(&self.registry)
            .entries
            .iter()
            .map(|(_, target)| *target)
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[must_use = "the listener is removed as soon as the subscription is dropped"]
#[derive(Debug)]
pub struct KeySubscription {
    token: u64,
    target: KeyTarget,
    registry: Weak<Mutex<Registry>>,
}

impl KeySubscription {
    pub fn target(&self) -> KeyTarget {
        self.target
    }
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry)
                .entries
                .retain(|(token, _)| *token != self.token);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

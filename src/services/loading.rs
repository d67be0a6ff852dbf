use log::warn;
use parking_lot::Mutex;

use crate::channel::{ReplaySubject, Subject};

/// Aggregate progress of every load started through the asset service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingState {
    /// Whether any load is still in flight.
    pub active: bool,
    pub loaded: usize,
    pub total: usize,
    pub errors: usize,
}

impl LoadingState {
    pub fn in_flight(&self) -> usize {
        self.total - self.loaded - self.errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub url: String,
    pub message: String,
}

/// Shared loading-progress tracker.
///
/// Counters reset once everything in flight has settled and a new item
/// starts, so `total` describes the current batch.
pub struct LoadingManager {
    state: Mutex<LoadingState>,
    progress: ReplaySubject<LoadingState>,
    failures: Subject<LoadFailure>,
}

impl Default for LoadingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoadingState::default()),
            progress: ReplaySubject::with_value(LoadingState::default()),
            failures: Subject::new(),
        }
    }

    pub fn progress(&self) -> ReplaySubject<LoadingState> {
        self.progress.clone()
    }

    pub fn failures(&self) -> Subject<LoadFailure> {
        self.failures.clone()
    }

    pub fn state(&self) -> LoadingState {
        *self.state.lock()
    }

    pub fn item_start(&self, _url: &str) {
        self.update(|state| {
            if !state.active {
                *state = LoadingState::default();
            }
            state.total += 1;
        });
    }

    pub fn item_end(&self, _url: &str) {
        self.update(|state| state.loaded += 1);
    }

    pub fn item_error(&self, url: &str, message: &str) {
        warn!("failed to load {url}: {message}");
        self.update(|state| state.errors += 1);
        self.failures.publish(LoadFailure {
            url: url.to_string(),
            message: message.to_string(),
        });
    }

    fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut LoadingState),
    {
        let snapshot = {
            let mut state = self.state.lock();
            edit(&mut state);
            state.active = state.in_flight() > 0;
            *state
        };
        self.progress.publish(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_batches() {
        let manager = LoadingManager::new();
        manager.item_start("a.json");
        manager.item_start("b.json");
        assert_eq!(manager.state().in_flight(), 2);
        manager.item_end("a.json");
        manager.item_error("b.json", "boom");
        let state = manager.state();
        assert!(!state.active);
        assert_eq!((state.loaded, state.errors, state.total), (1, 1, 2));

        manager.item_start("c.json");
        let state = manager.state();
        assert!(state.active);
        assert_eq!((state.loaded, state.errors, state.total), (0, 0, 1));
    }
}

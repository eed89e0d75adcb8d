// State management module
//
// This module provides the SessionManager which wraps SessionState with thread-safe
// access using Arc<RwLock<T>> and emits change events for the front end.

use crate::models::{ConfigurationModel, SessionState};
use crate::services::ServerStatus;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when session state is modified
///
/// These events let the front end refresh only what changed instead of
/// re-reading the whole state after every command.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionChange {
    /// Game or server directory changed
    PathsChanged {
        game_path: Option<Utf8PathBuf>,
        server_path: Option<Utf8PathBuf>,
        is_fully_configured: bool,
    },

    /// One or more configuration fields changed value
    FieldsChanged {
        fields: Vec<&'static str>,
    },

    /// The car grid changed
    GridChanged {
        entries: usize,
        total_slots: u32,
    },

    /// Track, layout or the selected layout's pit boxes changed
    TrackChanged {
        track: String,
        layout: String,
        pit_boxes: u32,
    },

    /// Car or track catalogue was rescanned
    CatalogueChanged {
        cars: usize,
        tracks: usize,
    },

    /// Server process state changed
    ServerStatusChanged {
        status: ServerStatus,
    },

    /// A message for the operator
    StatusMessage {
        message: String,
    },
}

/// Thread-safe session state with event emission
///
/// - [`read()`](Self::read) for reading state inside a closure
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to changes
pub struct SessionManager {
    state: Arc<RwLock<SessionState>>,
    state_tx: broadcast::Sender<SessionChange>,
}

impl SessionManager {
    /// Create a new SessionManager with default state
    ///
    /// # Returns
    /// A new SessionManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_state(SessionState::default())
    }

    pub fn with_state(state: SessionState) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(state)),
            state_tx,
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone of the whole current state
    pub fn snapshot(&self) -> SessionState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let slots = session.read(|state| state.model.total_slots());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.read_guard();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Returns
    /// The SessionChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SessionChange>
    where
        F: FnOnce(&mut SessionState),
    {
        self.update_with(update_fn).1
    }

    /// Like [`update()`](Self::update), also returning the closure's result
    ///
    /// # Example
    /// ```ignore
    /// let (result, _) = session.update_with(|state| state.model.add_car("abarth500", 2));
    /// result?;
    /// ```
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<SessionChange>)
    where
        F: FnOnce(&mut SessionState) -> R,
    {
        let mut state = self.write_guard();
        let old_state = state.clone();

        let result = update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        for change in &changes {
            // No subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        (result, changes)
    }

    /// Subscribe to session change events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.state_tx.subscribe()
    }

    // Convenience methods for common updates

    pub fn set_paths(&self, game_path: Option<Utf8PathBuf>, server_path: Option<Utf8PathBuf>) -> Vec<SessionChange> {
        self.update(|state| {
            state.game_path = game_path;
            state.server_path = server_path;
        })
    }

    /// Replace the configuration model wholesale (startup and reload)
    pub fn replace_model(&self, model: ConfigurationModel) -> Vec<SessionChange> {
        self.update(|state| state.model = model)
    }

    pub fn set_catalogue(&self, cars: Vec<String>, tracks: Vec<String>) -> Vec<SessionChange> {
        self.update(|state| {
            state.available_cars = cars;
            state.available_tracks = tracks;
        })
    }

    /// Select a track with its discovered layouts
    pub fn set_track(&self, track: String, layout: String, layouts: IndexMap<String, u32>) -> Vec<SessionChange> {
        self.update(|state| {
            state.model.track = track;
            state.model.layout = layout;
            state.track_layouts = layouts;
        })
    }

    pub fn set_server_status(&self, status: ServerStatus) -> Vec<SessionChange> {
        self.update(|state| state.server_status = status)
    }

    /// Show a message to the operator, even if it repeats the previous one
    pub fn post_status(&self, message: impl Into<String>) -> SessionChange {
        let message = message.into();
        tracing::info!("{}", message);
        self.update(|state| state.status_message = message.clone());

        let event = SessionChange::StatusMessage { message };
        let _ = self.state_tx.send(event.clone());
        event
    }
}

/// Work out which events describe the difference between two states
fn detect_changes(old: &SessionState, new: &SessionState) -> Vec<SessionChange> {
    let mut changes = Vec::new();

    if old.game_path != new.game_path || old.server_path != new.server_path {
        changes.push(SessionChange::PathsChanged {
            game_path: new.game_path.clone(),
            server_path: new.server_path.clone(),
            is_fully_configured: new.is_fully_configured(),
        });
    }

    let fields = new.model.changed_fields(&old.model);
    if !fields.is_empty() {
        changes.push(SessionChange::FieldsChanged { fields });
    }

    if old.model.car_grid != new.model.car_grid {
        changes.push(SessionChange::GridChanged {
            entries: new.model.car_grid.len(),
            total_slots: new.model.total_slots(),
        });
    }

    if old.model.track != new.model.track
        || old.model.layout != new.model.layout
        || old.pit_boxes() != new.pit_boxes()
    {
        changes.push(SessionChange::TrackChanged {
            track: new.model.track.clone(),
            layout: new.model.layout.clone(),
            pit_boxes: new.pit_boxes(),
        });
    }

    if old.available_cars != new.available_cars || old.available_tracks != new.available_tracks {
        changes.push(SessionChange::CatalogueChanged {
            cars: new.available_cars.len(),
            tracks: new.available_tracks.len(),
        });
    }

    if old.server_status != new.server_status {
        changes.push(SessionChange::ServerStatusChanged {
            status: new.server_status.clone(),
        });
    }

    changes
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

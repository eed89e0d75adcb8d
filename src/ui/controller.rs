// Session Controller - one method per operator action
//
// This module contains the SessionController which coordinates between:
// - SessionManager (session state and change events)
// - SettingsManager (the tool's own settings file)
// - the configuration services (server cfg, entry list, tracks, content)
// - ServerSupervisor and Installer (the dedicated server itself)
//
// The shell only parses commands and prints; every state change goes through here.

use crate::config::SettingsManager;
use crate::metrics::Metrics;
use crate::models::{CapacityMismatch, ConfigurationModel, GridEntry, ToolSettings, schema};
use crate::services::content::{self, ContentSource, LinkOutcome, LocalContent};
use crate::services::installer::{InstallError, InstallSummary, Installer};
use crate::services::process::{STOP_GRACE, ServerStatus, ServerSupervisor};
use crate::services::server_config::{self, ENTRY_LIST, LoadReport};
use crate::services::{entry_list, tracks};
use crate::state::SessionManager;
use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::process::Command;
use std::sync::Arc;

/// Result of a successful save, shown to the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub track: String,
    pub layout: String,
    pub unique_models: usize,
    pub total_slots: u32,
    pub max_clients: i64,
    pub pit_speed_limit: i64,
    /// Set when MAX_CLIENTS was raised to fit the grid.
    pub corrected_max_clients: Option<i64>,
    pub files: Vec<Utf8PathBuf>,
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = if self.layout.is_empty() { "-" } else { self.layout.as_str() };
        write!(
            f,
            "Saved: track {} ({}), {} models, {} slots, max clients {}, pit speed {} km/h",
            self.track, layout, self.unique_models, self.total_slots, self.max_clients, self.pit_speed_limit
        )?;
        if let Some(value) = self.corrected_max_clients {
            write!(f, " (MAX_CLIENTS raised to {})", value)?;
        }
        Ok(())
    }
}

/// Drives every operator action against the shared session.
///
/// # Example
/// ```ignore
/// let session = Arc::new(SessionManager::new());
/// let mut controller = SessionController::new(session, SettingsManager::new("ac_manager_config.json"), metrics);
/// controller.startup(settings)?;
/// controller.add_car("ks_mazda_mx5_cup", 8)?;
/// controller.save_all(true)?;
/// ```
pub struct SessionController {
    /// Shared session state
    session: Arc<SessionManager>,

    /// Persists paths and field values between sessions
    settings: SettingsManager,

    content: LocalContent,

    supervisor: ServerSupervisor,

    metrics: Arc<Metrics>,
}

impl SessionController {
    pub fn new(session: Arc<SessionManager>, settings: SettingsManager, metrics: Arc<Metrics>) -> Self {
        Self {
            session,
            settings,
            content: LocalContent,
            supervisor: ServerSupervisor::new(),
            metrics,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn game_path(&self) -> Option<Utf8PathBuf> {
        self.session.read(|state| state.game_path.clone())
    }

    fn server_path(&self) -> Option<Utf8PathBuf> {
        self.session.read(|state| state.server_path.clone())
    }

    fn require_game_path(&self) -> Result<Utf8PathBuf> {
        self.game_path()
            .ok_or_else(|| anyhow!("Game folder is not set; use `paths --game <dir>`"))
    }

    fn require_server_path(&self) -> Result<Utf8PathBuf> {
        self.server_path()
            .ok_or_else(|| anyhow!("Server folder is not set; use `paths --server <dir>`"))
    }

    /// Build the session from persisted settings.
    ///
    /// Defaults first, then the settings snapshot, then the server's own cfg files
    /// (which win over the snapshot), then the content catalogue.
    pub fn startup(&mut self, settings: ToolSettings) -> Result<()> {
        let mut model = ConfigurationModel::new();
        let outcome = settings.apply_to(&mut model);
        if !outcome.failures.is_empty() {
            tracing::warn!(
                "{} settings could not be applied and keep their defaults",
                outcome.failures.len()
            );
            self.metrics.record_conversion_failures(outcome.failures.len());
        }
        tracing::info!("Applied {} fields from {}", outcome.applied, self.settings.path());

        let game_path = non_empty_path(&settings.game_path);
        let server_path = non_empty_path(&settings.server_path);
        self.session.update(|state| {
            state.model = model;
            state.game_path = game_path;
            state.server_path = server_path;
            state.debug_mode = settings.debug_mode;
        });

        self.refresh_catalogue();
        if self.server_path().is_some() {
            self.load_server_config();
        }
        Ok(())
    }

    /// Rescan cars and tracks of the game installation and re-resolve the
    /// selected track's layouts.
    pub fn refresh_catalogue(&self) {
        let Some(game) = self.game_path() else {
            self.session.set_catalogue(Vec::new(), Vec::new());
            return;
        };

        let cars = content::list_cars(&self.content, &game);
        let track_names = tracks::list_tracks(&self.content, &game);
        let (car_count, track_count) = (cars.len(), track_names.len());
        self.session.set_catalogue(cars, track_names);

        let (track, layout) = self.session.read(|state| (state.model.track.clone(), state.model.layout.clone()));
        if !track.is_empty() {
            self.resolve_track(&game, &track, Some(layout.as_str()));
        }

        self.session
            .post_status(format!("Found {} cars and {} tracks in {}", car_count, track_count, game));
    }

    /// Rescan content, then reload the server's cfg files.
    pub fn refresh(&self) {
        self.refresh_catalogue();
        if self.server_path().is_some() {
            self.load_server_config();
        }
    }

    /// Overlay the server's cfg files on the session model.
    pub fn load_server_config(&self) -> Option<LoadReport> {
        let server = self.server_path()?;

        let mut model = self.session.read(|state| state.model.clone());
        let report = server_config::load_from_server_directory(&self.content, &server, &mut model);
        self.session.replace_model(model);
        self.metrics.record_conversion_failures(report.failures.len());

        if report.track_restored
            && let Some(game) = self.game_path()
        {
            let (track, layout) = self.session.read(|state| (state.model.track.clone(), state.model.layout.clone()));
            self.resolve_track(&game, &track, Some(layout.as_str()));
        }

        self.session.post_status(report.summary());
        Some(report)
    }

    /// Change the game and/or server folder and persist the settings.
    pub fn set_paths(&self, game: Option<Utf8PathBuf>, server: Option<Utf8PathBuf>) -> Result<()> {
        for dir in game.iter().chain(server.iter()) {
            if !dir.is_dir() {
                bail!("Not a directory: {}", dir);
            }
        }

        let server_changed = server.is_some();
        self.session.update(|state| {
            if let Some(game) = game {
                state.game_path = Some(game);
            }
            if let Some(server) = server {
                state.server_path = Some(server);
            }
        });

        self.persist_settings()?;
        self.refresh_catalogue();
        if server_changed {
            self.load_server_config();
        }
        Ok(())
    }

    /// Write the session's persisted subset to the settings file.
    pub fn persist_settings(&self) -> Result<()> {
        let settings = self.session.read(|state| {
            let mut settings = ToolSettings::capture(&state.model);
            settings.game_path = path_text(&state.game_path);
            settings.server_path = path_text(&state.server_path);
            settings.debug_mode = state.debug_mode;
            settings
        });
        self.settings.save(&settings)
    }

    /// Set one field from operator input.
    pub fn set_field(&self, name: &str, input: &str) -> Result<String> {
        let def = schema::field(name).ok_or_else(|| anyhow!("Unknown field: {}", name))?;
        let (result, _) = self.session.update_with(|state| state.model.set_from_input(name, input));
        result?;

        let shown = self.field_display(name)?;
        self.session.post_status(format!("{} = {}", def.name, shown));
        Ok(shown)
    }

    /// Display form of a field's current value.
    pub fn field_display(&self, name: &str) -> Result<String> {
        let def = schema::field(name).ok_or_else(|| anyhow!("Unknown field: {}", name))?;
        self.session.read(|state| {
            state
                .model
                .get(def.name)
                .map(|value| def.display(value))
                .ok_or_else(|| anyhow!("Field has no value: {}", name))
        })
    }

    /// Add a car to the grid and make its content available to the server.
    pub fn add_car(&self, model: &str, quantity: u32) -> Result<()> {
        let (result, _) = self.session.update_with(|state| state.model.add_car(model, quantity));
        result?;

        let model = model.trim();
        if let (Some(game), Some(server)) = (self.game_path(), self.server_path()) {
            let src = content::cars_dir(&game).join(model);
            let dst = content::cars_dir(&server).join(model);
            match content::link_or_copy(&src, &dst) {
                Ok(LinkOutcome::AlreadyPresent) => {}
                Ok(outcome) => tracing::info!("{:?} {} into the server content", outcome, model),
                Err(e) => tracing::warn!("Could not place {} in the server content: {:#}", model, e),
            }
        }

        let total = self.session.read(|state| state.model.total_slots());
        self.session
            .post_status(format!("Added {}x {} ({} slots)", quantity, model, total));
        Ok(())
    }

    /// Remove the grid row at `index` (0-based).
    pub fn remove_car(&self, index: usize) -> Result<GridEntry> {
        let (result, _) = self.session.update_with(|state| state.model.remove_car(index));
        let removed = result?;
        self.session
            .post_status(format!("Removed {}x {}", removed.quantity, removed.model));
        Ok(removed)
    }

    pub fn clear_grid(&self) {
        self.session.update(|state| state.model.clear_grid());
        self.session.post_status("Grid cleared");
    }

    /// Resolve `track`'s layouts and select one: `preferred` when it exists,
    /// otherwise the first layout found.
    fn resolve_track(&self, game: &Utf8Path, track: &str, preferred: Option<&str>) -> String {
        let layouts = tracks::list_layouts(&self.content, game, track);
        let layout = preferred
            .filter(|name| layouts.contains_key(*name))
            .map(str::to_string)
            .or_else(|| layouts.keys().next().cloned())
            .unwrap_or_default();

        self.session.set_track(track.to_string(), layout.clone(), layouts);
        layout
    }

    /// Select a track of the game installation.
    pub fn select_track(&self, track: &str, preferred_layout: Option<&str>) -> Result<()> {
        let game = self.require_game_path()?;
        let known = self.session.read(|state| state.available_tracks.iter().any(|t| t == track));
        if !known {
            bail!("Unknown track: {} (see `tracks`)", track);
        }

        let layout = self.resolve_track(&game, track, preferred_layout);
        if let Some(wanted) = preferred_layout
            && wanted != layout
        {
            tracing::warn!("Track {} has no layout {}; selected {:?}", track, wanted, layout);
        }
        self.post_track_status();
        Ok(())
    }

    /// Select one of the current track's layouts.
    pub fn select_layout(&self, layout: &str) -> Result<()> {
        let known = self.session.read(|state| state.track_layouts.contains_key(layout));
        if !known {
            bail!("Unknown layout: {} (see `tracks`)", layout);
        }
        self.session.update(|state| state.model.layout = layout.to_string());
        self.post_track_status();
        Ok(())
    }

    fn post_track_status(&self) {
        let message = self.session.read(|state| {
            format!(
                "Track {}, layout {}, pit boxes {}",
                state.model.track,
                if state.model.layout.is_empty() { "-" } else { state.model.layout.as_str() },
                tracks::pit_boxes_label(state.pit_boxes())
            )
        });
        self.session.post_status(message);
    }

    /// Write both cfg files, link the track content and persist the settings.
    ///
    /// # Arguments
    /// * `fix_capacity` - Raise MAX_CLIENTS when the grid has more slots; when
    ///   false a mismatch refuses the save
    pub fn save_all(&self, fix_capacity: bool) -> Result<SaveSummary> {
        let server = self.require_server_path()?;

        let mut corrected_max_clients = None;
        if let Err(mismatch) = self.session.read(|state| state.model.check_capacity()) {
            if !fix_capacity {
                return Err(capacity_error(&mismatch));
            }
            let (stored, _) = self
                .session
                .update_with(|state| state.model.apply_capacity_correction(&mismatch));
            tracing::warn!("{}; MAX_CLIENTS raised to {}", mismatch, stored);
            if i64::from(mismatch.total_slots) > stored {
                return Err(capacity_error(&CapacityMismatch {
                    total_slots: mismatch.total_slots,
                    max_clients: stored,
                }));
            }
            corrected_max_clients = Some(stored);
        }

        let model = self.session.read(|state| state.model.clone());
        let rendered = server_config::render(&model);
        let files = server_config::write_to_server_directory(&self.content, &server, &rendered)
            .with_context(|| format!("Failed to write the configuration in {}", server))?;

        if !model.track.is_empty()
            && let Some(game) = self.game_path()
        {
            let src = tracks::track_dir(&game, &model.track);
            let dst = tracks::track_dir(&server, &model.track);
            if let Err(e) = content::link_or_copy(&src, &dst) {
                tracing::warn!("Could not place track {} in the server content: {:#}", model.track, e);
            }
        }

        self.persist_settings()?;
        self.metrics.record_config_saved();

        let summary = SaveSummary {
            track: model.track.clone(),
            layout: model.layout.clone(),
            unique_models: model.unique_models().len(),
            total_slots: model.total_slots(),
            max_clients: model.max_clients(),
            pit_speed_limit: model.integer("pit_speed_limit").unwrap_or(0),
            corrected_max_clients,
            files,
        };
        self.session.post_status(summary.to_string());
        Ok(summary)
    }

    /// Expand the grid into `cfg/entry_list.ini`, returning the slot count.
    pub fn generate_entry_list(&self) -> Result<usize> {
        let server = self.require_server_path()?;
        let grid = self.session.read(|state| state.model.car_grid.clone());

        let slots = entry_list::generate(&grid, |model| content::list_skins(&self.content, &server, model))?;
        let path = server_config::cfg_path(&server, ENTRY_LIST);
        self.content.write_text(&path, &entry_list::render(&slots))?;

        self.metrics.record_entry_list();
        self.session
            .post_status(format!("Entry list written with {} slots to {}", slots.len(), path));
        Ok(slots.len())
    }

    /// Download and unpack the latest AssettoServer into the server folder.
    pub async fn install_server(&self, clean: bool) -> Result<InstallSummary> {
        let (Some(game), Some(server)) = (self.game_path(), self.server_path()) else {
            return Err(InstallError::MissingPaths.into());
        };

        self.session.post_status(format!("Installing AssettoServer into {}...", server));
        let summary = Installer::new()?.install(&server, &game, clean).await?;

        let legacy = match &summary.legacy_exe {
            Some(_) => ", acServer.exe copied",
            None => "",
        };
        self.session
            .post_status(format!("Installed AssettoServer {} ({}){}", summary.release, summary.asset, legacy));
        Ok(summary)
    }

    pub async fn start_server(&mut self) -> Result<ServerStatus> {
        let server = self.require_server_path()?;
        let status = self.supervisor.start(&server).await?;
        self.metrics.record_server_start();
        self.session.set_server_status(status.clone());
        Ok(status)
    }

    /// Stop the tracked server. `false` when nothing tracked was running.
    pub async fn stop_server(&mut self) -> Result<bool> {
        let result = self.supervisor.stop(STOP_GRACE).await;
        self.session.set_server_status(self.supervisor.snapshot());

        let stopped = result?;
        if stopped {
            self.metrics.record_server_stop();
            self.session.post_status("Server stopped");
        } else {
            self.session.post_status("No tracked server process to stop");
        }
        Ok(stopped)
    }

    /// Kill server processes by executable name.
    pub async fn kill_server(&mut self) -> Vec<&'static str> {
        let killed = self.supervisor.kill_by_name().await;
        self.session.set_server_status(self.supervisor.snapshot());

        if killed.is_empty() {
            self.session.post_status("No server processes found");
        } else {
            self.metrics.record_server_stop();
            self.session.post_status(format!("Killed {}", killed.join(", ")));
        }
        killed
    }

    pub async fn restart_server(&mut self) -> Result<ServerStatus> {
        let server = self.require_server_path()?;
        let result = self.supervisor.restart(&server).await;
        self.session.set_server_status(self.supervisor.snapshot());

        let status = result?;
        self.metrics.record_server_start();
        Ok(status)
    }

    /// Poll the server process and publish its state.
    pub fn server_status(&mut self) -> ServerStatus {
        let status = self.supervisor.status();
        self.session.set_server_status(status.clone());
        status
    }

    /// Open the server folder in the platform file browser.
    pub fn open_folder(&self) -> Result<()> {
        let server = self.require_server_path()?;
        let opener = if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };

        Command::new(opener)
            .arg(server.as_str())
            .spawn()
            .with_context(|| format!("Failed to run {} for {}", opener, server))?;
        Ok(())
    }
}

fn capacity_error(mismatch: &CapacityMismatch) -> anyhow::Error {
    anyhow!(
        "{}; raise max_clients to at least {} or save without --keep-max-clients",
        mismatch,
        mismatch.suggested_max_clients()
    )
}

fn non_empty_path(text: &str) -> Option<Utf8PathBuf> {
    let text = text.trim();
    (!text.is_empty()).then(|| Utf8PathBuf::from(text))
}

fn path_text(path: &Option<Utf8PathBuf>) -> String {
    path.as_ref().map(|p| p.to_string()).unwrap_or_default()
}

use crate::models::ConfigurationModel;
use crate::services::ServerStatus;
use camino::Utf8PathBuf;
use indexmap::IndexMap;

/// Everything the interactive session shows and edits.
///
/// Wrapped in `Arc<RwLock<_>>` by [`crate::state::SessionManager`]; mutate it only
/// through [`update()`](crate::state::SessionManager::update) so change events fire.
///
/// # Related Types
///
/// - [`crate::state::SessionChange`]: events emitted on mutation
/// - [`crate::models::ToolSettings`]: persisted subset of this state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub model: ConfigurationModel,

    // Installation paths
    pub game_path: Option<Utf8PathBuf>,
    pub server_path: Option<Utf8PathBuf>,

    pub debug_mode: bool,

    // Content discovered in the game installation
    pub available_cars: Vec<String>,
    pub available_tracks: Vec<String>,
    /// Layouts of the selected track with their pit-box counts.
    pub track_layouts: IndexMap<String, u32>,

    pub server_status: ServerStatus,

    /// Last message shown to the operator.
    pub status_message: String,
}

impl SessionState {
    /// Both the game and the server directory are set.
    pub fn is_fully_configured(&self) -> bool {
        self.game_path.is_some() && self.server_path.is_some()
    }

    /// Pit boxes of the selected layout, `0` when unknown.
    pub fn pit_boxes(&self) -> u32 {
        self.track_layouts.get(&self.model.layout).copied().unwrap_or(0)
    }

    /// Grid rows as shown to the operator: `"<qty>x | <model>"`.
    pub fn grid_lines(&self) -> Vec<String> {
        self.model
            .car_grid
            .iter()
            .map(|entry| format!("{}x | {}", entry.quantity, entry.model))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = SessionState::default();
        assert!(!state.is_fully_configured());
        assert_eq!(state.server_status, ServerStatus::NotStarted);
        assert_eq!(state.pit_boxes(), 0);
    }

    #[test]
    fn test_pit_boxes_for_selected_layout() {
        let mut state = SessionState::default();
        state.track_layouts.insert("layout_gp".into(), 36);
        state.track_layouts.insert("layout_short".into(), 12);
        state.model.layout = "layout_short".into();
        assert_eq!(state.pit_boxes(), 12);
    }

    #[test]
    fn test_grid_lines() {
        let mut state = SessionState::default();
        state.model.add_car("ks_mazda_mx5_cup", 8).unwrap();
        assert_eq!(state.grid_lines(), vec!["8x | ks_mazda_mx5_cup"]);
    }
}

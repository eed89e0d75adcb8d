use crate::models::ToolSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Default settings file name, resolved against the working directory.
pub const SETTINGS_FILE: &str = "ac_manager_config.json";

/// Loads and saves the tool's own settings file.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: Utf8PathBuf,
}

impl SettingsManager {
    /// Create a SettingsManager for the given settings file.
    ///
    /// # Arguments
    /// * `settings_path` - Path of the JSON settings file (need not exist yet)
    pub fn new<P: AsRef<Utf8Path>>(settings_path: P) -> Self {
        Self {
            settings_path: settings_path.as_ref().to_path_buf(),
        }
    }

    /// Load the settings file.
    ///
    /// # Returns
    /// The stored settings, or defaults when the file is missing or not valid JSON.
    /// A key with an unusable value keeps its default on its own. Only an unreadable
    /// file is an error.
    pub fn load(&self) -> Result<ToolSettings> {
        if !self.settings_path.exists() {
            tracing::warn!("Settings file not found at {}, using defaults", self.settings_path);
            return Ok(ToolSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        match serde_json::from_str::<ToolSettings>(&file_contents) {
            Ok(settings) => {
                if !settings.rejected.is_empty() {
                    tracing::warn!(
                        "{} stored settings in {} are unusable and keep their defaults",
                        settings.rejected.len(),
                        self.settings_path
                    );
                }
                tracing::info!("Loaded settings from {}", self.settings_path);
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!(
                    "Settings file {} is not valid ({}), using defaults",
                    self.settings_path,
                    e
                );
                Ok(ToolSettings::default())
            }
        }
    }

    /// Save the settings file.
    ///
    /// # Arguments
    /// * `settings` - The ToolSettings to save
    pub fn save(&self, settings: &ToolSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings to JSON")?;

        if let Some(parent) = self.settings_path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {}", parent))?;
        }

        fs::write(&self.settings_path, json)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the settings file path.
    pub fn path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new(SETTINGS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_settings_manager() -> (SettingsManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = SettingsManager::new(dir.join(SETTINGS_FILE));
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();
        assert_eq!(manager.load().unwrap(), ToolSettings::default());
    }

    #[test]
    fn test_load_save_settings() {
        let (manager, _temp_dir) = create_test_settings_manager();

        let settings = ToolSettings {
            game_path: "C:/Steam/steamapps/common/assettocorsa".to_string(),
            debug_mode: true,
            ..ToolSettings::default()
        };
        manager.save(&settings).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_invalid_json_gives_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();
        fs::write(manager.path(), "{ not json").unwrap();
        assert_eq!(manager.load().unwrap(), ToolSettings::default());
    }
}

use std::path::{Path, PathBuf};

use crate::settings::{self, AppSettings};

/// The three reachable views of the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Settings,
    Upload,
    Library,
}

/// View routing and the configuration-required gate. Settings are loaded
/// once here and threaded explicitly into whatever needs them; there is no
/// ambient global.
pub struct App {
    settings: AppSettings,
    settings_path: PathBuf,
    view: AppView,
}

impl App {
    /// Load persisted settings from `root` and pick the starting view.
    /// Missing or unreadable settings, or a missing AI key, start the app
    /// in the configuration-required state.
    pub fn start(root: &Path) -> Self {
        let settings_path = settings::default_settings_path(root);
        let loaded = match settings::load_settings(&settings_path) {
            Ok(loaded) => loaded,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    eprintln!("[app] could not read settings: {}", err);
                }
                AppSettings::default()
            }
        };
        let view = if loaded.has_api_key() {
            AppView::Upload
        } else {
            AppView::Settings
        };
        Self {
            settings: loaded,
            settings_path,
            view,
        }
    }

    pub fn view(&self) -> AppView {
        self.view
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Only the settings form is reachable until an AI key exists.
    pub fn requires_configuration(&self) -> bool {
        !self.settings.has_api_key()
    }

    pub fn library_enabled(&self) -> bool {
        self.settings.library_enabled()
    }

    pub fn navigate(&mut self, view: AppView) -> Result<(), String> {
        if self.requires_configuration() && view != AppView::Settings {
            return Err("Configure an AI API key in Settings first.".to_string());
        }
        if view == AppView::Library && !self.library_enabled() {
            return Err("Storage credentials are not configured.".to_string());
        }
        self.view = view;
        Ok(())
    }

    /// Normalize, validate, and persist new settings. Leaves the settings
    /// view automatically once an AI key is present.
    pub fn save_settings(&mut self, new_settings: AppSettings) -> Result<(), String> {
        let new_settings = new_settings.normalize();
        new_settings.validate().map_err(|err| err.to_string())?;
        settings::save_settings(&self.settings_path, &new_settings)
            .map_err(|err| format!("Could not save settings: {}", err))?;
        self.settings = new_settings;
        if self.view == AppView::Settings && self.settings.has_api_key() {
            self.view = AppView::Upload;
        }
        Ok(())
    }
}

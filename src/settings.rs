use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// User-supplied credentials, loaded once at startup and written only on an
/// explicit save. The AI key gates identification from images; the storage
/// pair gates every library feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("the storage URL is not a valid URL: {0}")]
    InvalidStorageUrl(String),
}

impl AppSettings {
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The library features need both halves of the storage credential.
    pub fn library_enabled(&self) -> bool {
        self.storage_url.is_some() && self.storage_key.is_some()
    }

    /// Trim every field and drop the ones left empty.
    pub fn normalize(mut self) -> Self {
        let clean = |value: Option<String>| -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        self.api_key = clean(self.api_key);
        self.storage_url = clean(self.storage_url);
        self.storage_key = clean(self.storage_key);
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(raw) = &self.storage_url {
            Url::parse(raw).map_err(|_| SettingsError::InvalidStorageUrl(raw.clone()))?;
        }
        Ok(())
    }

    /// Returns a redacted clone that replaces each secret with a masked form
    /// when non-empty.
    pub fn masked(&self) -> Self {
        let mask = |value: &Option<String>| -> Option<String> {
            value.as_ref().map(|secret| {
                let prefix: String = secret.chars().take(2).collect();
                format!("{}****", prefix)
            })
        };
        Self {
            api_key: mask(&self.api_key),
            storage_url: self.storage_url.clone(),
            storage_key: mask(&self.storage_key),
        }
    }
}

pub fn load_settings(path: &Path) -> io::Result<AppSettings> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(settings)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, json)
}

pub fn default_settings_path(root: &Path) -> PathBuf {
    root.join("shelfscan_settings.json")
}

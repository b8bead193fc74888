use std::sync::Mutex;

use thiserror::Error;

use crate::types::CollectionEntry;

/// Every collection lives inside this one bucket-like namespace.
pub const LIBRARY_BUCKET: &str = "library";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage credentials are not configured, set them in Settings")]
    CredentialsMissing,
    #[error("collection \"{0}\" was not found")]
    NotFound(String),
    #[error("storage bucket \"library\" was not found in the storage project")]
    BucketMissing,
    #[error("storage request failed: {0}")]
    Transport(String),
}

/// Seam to the object-storage backend holding the persisted library.
/// Uploads carry upsert semantics: create the file or overwrite it.
pub trait LibraryStore: Send + Sync {
    fn list(&self) -> Result<Vec<CollectionEntry>, StorageError>;
    fn download(&self, name: &str) -> Result<String, StorageError>;
    fn upload(&self, name: &str, contents: &str) -> Result<(), StorageError>;
    fn delete(&self, name: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct InMemoryLibraryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    seq: u64,
    files: Vec<StoredFile>,
}

struct StoredFile {
    seq: u64,
    entry: CollectionEntry,
    contents: String,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(seq: &mut u64) -> String {
        *seq += 1;
        let now_ms = chrono::Utc::now().timestamp_millis();
        format!("col-{}-{}", now_ms, *seq)
    }
}

impl LibraryStore for InMemoryLibraryStore {
    fn list(&self) -> Result<Vec<CollectionEntry>, StorageError> {
        let guard = self.inner.lock().expect("poisoned");
        let mut files: Vec<_> = guard
            .files
            .iter()
            .map(|f| (f.entry.created_at, f.seq, f.entry.clone()))
            .collect();
        // Newest first, matching the backend's created_at desc listing;
        // the sequence number breaks same-millisecond ties.
        files.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(files.into_iter().map(|(_, _, entry)| entry).collect())
    }

    fn download(&self, name: &str) -> Result<String, StorageError> {
        let guard = self.inner.lock().expect("poisoned");
        guard
            .files
            .iter()
            .find(|f| f.entry.name == name)
            .map(|f| f.contents.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn upload(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        let mut guard = self.inner.lock().expect("poisoned");
        if let Some(file) = guard.files.iter_mut().find(|f| f.entry.name == name) {
            file.contents = contents.to_string();
            return Ok(());
        }
        let id = Self::next_id(&mut guard.seq);
        let seq = guard.seq;
        guard.files.push(StoredFile {
            seq,
            entry: CollectionEntry {
                name: name.to_string(),
                id,
                created_at: Some(chrono::Utc::now().timestamp_millis()),
            },
            contents: contents.to_string(),
        });
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut guard = self.inner.lock().expect("poisoned");
        let before = guard.files.len();
        guard.files.retain(|f| f.entry.name != name);
        if guard.files.len() == before {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(feature = "supabase-http")]
pub use http::SupabaseLibraryStore;

#[cfg(feature = "supabase-http")]
mod http {
    use serde_json::{json, Value};

    use super::{CollectionEntry, LibraryStore, StorageError, LIBRARY_BUCKET};
    use crate::settings::AppSettings;

    /// Client for the Supabase Storage object REST API, scoped to the
    /// `library` bucket.
    pub struct SupabaseLibraryStore {
        base_url: String,
        api_key: String,
    }

    impl SupabaseLibraryStore {
        pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_key: api_key.into(),
            }
        }

        /// Build a store from persisted settings; both halves of the
        /// credential must be present.
        pub fn from_settings(settings: &AppSettings) -> Result<Self, StorageError> {
            match (&settings.storage_url, &settings.storage_key) {
                (Some(url), Some(key)) => Ok(Self::new(url.clone(), key.clone())),
                _ => Err(StorageError::CredentialsMissing),
            }
        }

        fn client() -> reqwest::blocking::Client {
            reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("build client")
        }

        fn object_url(&self, name: &str) -> String {
            format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, LIBRARY_BUCKET, name
            )
        }

        fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
            req.header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", self.api_key))
        }

        fn failure(name: Option<&str>, status: reqwest::StatusCode, body: &str) -> StorageError {
            if body.contains("Bucket not found") {
                return StorageError::BucketMissing;
            }
            if status.as_u16() == 404 {
                if let Some(name) = name {
                    return StorageError::NotFound(name.to_string());
                }
            }
            StorageError::Transport(format!("HTTP {}", status))
        }
    }

    impl LibraryStore for SupabaseLibraryStore {
        fn list(&self) -> Result<Vec<CollectionEntry>, StorageError> {
            let url = format!("{}/storage/v1/object/list/{}", self.base_url, LIBRARY_BUCKET);
            let payload = json!({
                "prefix": "",
                "sortBy": {"column": "created_at", "order": "desc"}
            });
            let resp = self
                .authed(Self::client().post(url))
                .json(&payload)
                .send()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(Self::failure(None, status, &body));
            }
            let rows: Vec<Value> = resp
                .json()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let entries = rows
                .iter()
                .filter_map(|row| {
                    let name = row.get("name")?.as_str()?.to_string();
                    let id = row
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let created_at = row
                        .get("created_at")
                        .and_then(Value::as_str)
                        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
                        .map(|ts| ts.timestamp_millis());
                    Some(CollectionEntry {
                        name,
                        id,
                        created_at,
                    })
                })
                .collect();
            Ok(entries)
        }

        fn download(&self, name: &str) -> Result<String, StorageError> {
            let resp = self
                .authed(Self::client().get(self.object_url(name)))
                .send()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(Self::failure(Some(name), status, &body));
            }
            resp.text().map_err(|e| StorageError::Transport(e.to_string()))
        }

        fn upload(&self, name: &str, contents: &str) -> Result<(), StorageError> {
            let resp = self
                .authed(Self::client().post(self.object_url(name)))
                .header("x-upsert", "true")
                .header("Content-Type", "text/csv")
                .body(contents.to_string())
                .send()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(Self::failure(None, status, &body));
            }
            Ok(())
        }

        fn delete(&self, name: &str) -> Result<(), StorageError> {
            let resp = self
                .authed(Self::client().delete(self.object_url(name)))
                .send()
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(Self::failure(Some(name), status, &body));
            }
            Ok(())
        }
    }
}

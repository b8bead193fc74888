use serde::{Deserialize, Serialize};

/// Placeholder written wherever a source (the AI model, a CSV cell) could
/// not supply a value.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// One identified book. There is no identity field; two records are "the
/// same book" when their normalized (title, author) pairs match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub title: String,
    pub author: String,
    pub publication_year: String,
    pub genre: String,
    pub description: String,
}

impl Book {
    /// Case-insensitive, whitespace-trimmed (title, author) pair used for
    /// duplicate detection at merge time.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.author.trim().to_lowercase(),
        )
    }
}

/// One stored collection as reported by the storage backend listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub name: String,
    pub id: String,
    /// Unix milliseconds; None when the backend did not report a time.
    pub created_at: Option<i64>,
}

/// A user-selected file handed to the upload workflow: the declared mime
/// type drives classification, the bytes are passed through untouched.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

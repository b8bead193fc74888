use std::sync::Arc;
use std::time::Duration;

use crate::codec;
use crate::merge;
use crate::storage::LibraryStore;
use crate::types::{Book, CollectionEntry};

/// How long the host should display the success message before returning
/// the upload workflow to Idle. The crate has no event loop; the host owns
/// the timer.
pub const SAVE_SUCCESS_RESET_DELAY: Duration = Duration::from_secs(2);

/// Result of a completed save, reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub collection: String,
    pub added: usize,
}

impl SaveOutcome {
    pub fn message(&self) -> String {
        if self.added == 0 {
            format!("\"{}\" is already up to date.", self.collection)
        } else {
            format!("Added {} book(s) to \"{}\".", self.added, self.collection)
        }
    }
}

/// The save-to-library panel, entered from Results. Opening it fetches the
/// collection list fresh; a list failure is recorded but does not block
/// saving under a new name.
pub struct SavePanel {
    store: Arc<dyn LibraryStore>,
    collections: Vec<CollectionEntry>,
    list_error: Option<String>,
}

impl SavePanel {
    pub fn open(store: Arc<dyn LibraryStore>) -> Self {
        let (collections, list_error) = match store.list() {
            Ok(collections) => (collections, None),
            Err(err) => (
                Vec::new(),
                Some(format!("Could not list existing collections: {}", err)),
            ),
        };
        Self {
            store,
            collections,
            list_error,
        }
    }

    pub fn collections(&self) -> &[CollectionEntry] {
        &self.collections
    }

    pub fn list_error(&self) -> Option<&str> {
        self.list_error.as_deref()
    }

    /// Serialize the result set under a new name, `.csv`-suffixed when the
    /// caller left it off. Overwrites any existing file of the same name.
    pub fn save_new(&self, name: &str, books: &[Book]) -> Result<SaveOutcome, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Collection name is required.".to_string());
        }
        let file_name = ensure_csv_suffix(name);
        self.store
            .upload(&file_name, &codec::serialize(books))
            .map_err(|err| err.to_string())?;
        Ok(SaveOutcome {
            collection: file_name,
            added: books.len(),
        })
    }

    /// Merge the result set into an existing collection and re-upload it
    /// under the same name.
    pub fn save_existing(&self, name: &str, books: &[Book]) -> Result<SaveOutcome, String> {
        let current = self.store.download(name).map_err(|err| err.to_string())?;
        let existing = codec::parse(&current).map_err(|err| err.to_string())?;
        let outcome = merge::merge(&existing, books);
        self.store
            .upload(name, &codec::serialize(&outcome.merged))
            .map_err(|err| err.to_string())?;
        Ok(SaveOutcome {
            collection: name.to_string(),
            added: outcome.added,
        })
    }
}

fn ensure_csv_suffix(name: &str) -> String {
    if name.to_lowercase().ends_with(".csv") {
        name.to_string()
    } else {
        format!("{}.csv", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryLibraryStore, StorageError};
    use crate::types::UNKNOWN_FIELD;

    fn book(title: &str, author: &str) -> Book {
        Book {
            title: title.into(),
            author: author.into(),
            publication_year: UNKNOWN_FIELD.into(),
            genre: UNKNOWN_FIELD.into(),
            description: UNKNOWN_FIELD.into(),
        }
    }

    /// Store double whose downloads always fail with a transport error.
    struct BrokenDownloadStore;
    impl LibraryStore for BrokenDownloadStore {
        fn list(&self) -> Result<Vec<CollectionEntry>, StorageError> {
            Ok(vec![CollectionEntry {
                name: "shelf.csv".into(),
                id: "1".into(),
                created_at: None,
            }])
        }
        fn download(&self, _: &str) -> Result<String, StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        fn upload(&self, _: &str, _: &str) -> Result<(), StorageError> {
            panic!("upload must not run after a failed download");
        }
        fn delete(&self, _: &str) -> Result<(), StorageError> {
            unimplemented!()
        }
    }

    struct BrokenListStore(InMemoryLibraryStore);
    impl LibraryStore for BrokenListStore {
        fn list(&self) -> Result<Vec<CollectionEntry>, StorageError> {
            Err(StorageError::Transport("timed out".into()))
        }
        fn download(&self, name: &str) -> Result<String, StorageError> {
            self.0.download(name)
        }
        fn upload(&self, name: &str, contents: &str) -> Result<(), StorageError> {
            self.0.upload(name, contents)
        }
        fn delete(&self, name: &str) -> Result<(), StorageError> {
            self.0.delete(name)
        }
    }

    #[test]
    fn save_new_appends_csv_suffix_and_uploads() {
        let store = Arc::new(InMemoryLibraryStore::new());
        let panel = SavePanel::open(store.clone());
        let outcome = panel
            .save_new("my shelf", &[book("Dune", "Frank Herbert")])
            .expect("save");
        assert_eq!(outcome.collection, "my shelf.csv");
        assert_eq!(outcome.added, 1);
        let stored = store.download("my shelf.csv").expect("stored");
        assert!(stored.contains("\"Dune\""));
    }

    #[test]
    fn save_new_keeps_an_existing_suffix() {
        let store = Arc::new(InMemoryLibraryStore::new());
        let panel = SavePanel::open(store);
        let outcome = panel.save_new("Shelf.CSV", &[]).expect("save");
        assert_eq!(outcome.collection, "Shelf.CSV");
    }

    #[test]
    fn save_new_rejects_an_empty_name() {
        let panel = SavePanel::open(Arc::new(InMemoryLibraryStore::new()));
        assert!(panel.save_new("   ", &[]).is_err());
    }

    #[test]
    fn save_new_overwrites_a_same_named_collection() {
        let store = Arc::new(InMemoryLibraryStore::new());
        store.upload("shelf.csv", "old contents").expect("seed");
        let panel = SavePanel::open(store.clone());
        panel
            .save_new("shelf", &[book("Emma", "Jane Austen")])
            .expect("save");
        let stored = store.download("shelf.csv").expect("stored");
        assert!(stored.contains("\"Emma\""));
        assert!(!stored.contains("old contents"));
    }

    #[test]
    fn save_existing_merges_and_reports_added_count() {
        let store = Arc::new(InMemoryLibraryStore::new());
        store
            .upload(
                "shelf.csv",
                &codec::serialize(&[book("Dune", "Frank Herbert")]),
            )
            .expect("seed");

        let panel = SavePanel::open(store.clone());
        let outcome = panel
            .save_existing(
                "shelf.csv",
                &[book("dune", " Frank Herbert "), book("Emma", "Jane Austen")],
            )
            .expect("save");

        assert_eq!(outcome.added, 1);
        let merged = codec::parse(&store.download("shelf.csv").expect("stored")).expect("parse");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "Dune");
        assert_eq!(merged[1].title, "Emma");
    }

    #[test]
    fn zero_added_reads_as_up_to_date() {
        let outcome = SaveOutcome {
            collection: "shelf.csv".into(),
            added: 0,
        };
        assert!(outcome.message().contains("already up to date"));
        let outcome = SaveOutcome {
            collection: "shelf.csv".into(),
            added: 2,
        };
        assert!(outcome.message().contains("Added 2 book(s)"));
    }

    #[test]
    fn failed_download_aborts_save_existing_before_upload() {
        let panel = SavePanel::open(Arc::new(BrokenDownloadStore));
        let err = panel
            .save_existing("shelf.csv", &[book("Dune", "Frank Herbert")])
            .expect_err("should fail");
        assert!(err.contains("connection reset"));
    }

    #[test]
    fn list_failure_does_not_block_the_new_collection_path() {
        let panel = SavePanel::open(Arc::new(BrokenListStore(InMemoryLibraryStore::new())));
        assert!(panel.list_error().is_some());
        assert!(panel.collections().is_empty());
        let outcome = panel
            .save_new("shelf", &[book("Dune", "Frank Herbert")])
            .expect("save still works");
        assert_eq!(outcome.added, 1);
    }
}

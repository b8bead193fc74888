use std::sync::Arc;

use futures_util::future;

use crate::codec;
use crate::storage::LibraryStore;
use crate::types::{Book, CollectionEntry};

/// Name of the downloadable CSV export.
pub const EXPORT_FILE_NAME: &str = "book_data.csv";

/// A ready-to-download CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub contents: String,
}

pub fn export_books(books: &[Book]) -> CsvExport {
    CsvExport {
        file_name: EXPORT_FILE_NAME.to_string(),
        contents: codec::serialize(books),
    }
}

pub fn list_collections(store: &dyn LibraryStore) -> Result<Vec<CollectionEntry>, String> {
    store
        .list()
        .map_err(|err| format!("Failed to load library: {}", err))
}

pub fn view_collection(store: &dyn LibraryStore, name: &str) -> Result<Vec<Book>, String> {
    let contents = store
        .download(name)
        .map_err(|err| format!("Failed to load file content: {}", err))?;
    codec::parse(&contents).map_err(|err| format!("Failed to load file content: {}", err))
}

pub fn delete_collection(store: &dyn LibraryStore, name: &str) -> Result<(), String> {
    store
        .delete(name)
        .map_err(|err| format!("Failed to delete file: {}", err))
}

/// Download every known collection concurrently and concatenate the decoded
/// records in listing order. The first failed download fails the whole
/// aggregate.
pub async fn view_all(store: Arc<dyn LibraryStore>) -> Result<Vec<Book>, String> {
    let entries = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || store.list())
            .await
            .map_err(|err| err.to_string())?
            .map_err(|err| format!("Failed to load library: {}", err))?
    };

    let downloads = entries.into_iter().map(|entry| {
        let store = Arc::clone(&store);
        async move {
            tokio::task::spawn_blocking(move || -> Result<Vec<Book>, String> {
                let contents = store
                    .download(&entry.name)
                    .map_err(|err| format!("Failed to load all collections: {}", err))?;
                codec::parse(&contents)
                    .map_err(|err| format!("Failed to load all collections: {}", err))
            })
            .await
            .map_err(|err| err.to_string())?
        }
    });

    let per_collection = future::try_join_all(downloads).await?;
    Ok(per_collection.into_iter().flatten().collect())
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

    #[test]
    fn export_uses_the_fixed_file_name_and_header() {
        let export = export_books(&[book("Dune", "Frank Herbert")]);
        assert_eq!(export.file_name, "book_data.csv");
        assert!(export.contents.starts_with(codec::CSV_HEADER));
        assert!(export.contents.contains("\"Dune\""));
    }

    #[test]
    fn view_collection_downloads_and_parses() {
        let store = InMemoryLibraryStore::new();
        store
            .upload("shelf.csv", &codec::serialize(&[book("Emma", "Jane Austen")]))
            .expect("seed");
        let books = view_collection(&store, "shelf.csv").expect("view");
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Emma");
    }

    #[tokio::test]
    async fn view_all_concatenates_in_listing_order() {
        let store = Arc::new(InMemoryLibraryStore::new());
        store
            .upload("first.csv", &codec::serialize(&[book("A", "X")]))
            .expect("seed");
        store
            .upload("second.csv", &codec::serialize(&[book("B", "Y"), book("C", "Z")]))
            .expect("seed");

        let listing = store.list().expect("list");
        let all = view_all(store.clone()).await.expect("view all");

        assert_eq!(all.len(), 3);
        // Concatenation follows the listing order, newest first.
        assert_eq!(listing[0].name, "second.csv");
        assert_eq!(all[0].title, "B");
        assert_eq!(all[2].title, "A");
    }

    #[tokio::test]
    async fn view_all_fails_when_any_download_fails() {
        struct HalfBrokenStore(InMemoryLibraryStore);
        impl LibraryStore for HalfBrokenStore {
            fn list(&self) -> Result<Vec<CollectionEntry>, StorageError> {
                self.0.list()
            }
            fn download(&self, name: &str) -> Result<String, StorageError> {
                if name == "broken.csv" {
                    return Err(StorageError::Transport("connection reset".into()));
                }
                self.0.download(name)
            }
            fn upload(&self, name: &str, contents: &str) -> Result<(), StorageError> {
                self.0.upload(name, contents)
            }
            fn delete(&self, name: &str) -> Result<(), StorageError> {
                self.0.delete(name)
            }
        }

        let inner = InMemoryLibraryStore::new();
        inner
            .upload("ok.csv", &codec::serialize(&[book("A", "X")]))
            .expect("seed");
        inner.upload("broken.csv", "whatever").expect("seed");

        let err = view_all(Arc::new(HalfBrokenStore(inner)))
            .await
            .expect_err("should fail");
        assert!(err.contains("connection reset"));
    }

    #[test]
    fn delete_forwards_storage_errors_as_messages() {
        let store = InMemoryLibraryStore::new();
        let err = delete_collection(&store, "missing.csv").expect_err("should fail");
        assert!(err.contains("Failed to delete"));
    }
}

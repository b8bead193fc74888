use csv::ReaderBuilder;
use thiserror::Error;

use crate::types::{Book, UNKNOWN_FIELD};

/// Fixed header of every serialized collection and of the CSV export.
pub const CSV_HEADER: &str = "Title,Author,First Published Year,Genre,Description";

const TITLE_COLUMNS: &[&str] = &["title", "name"];
const AUTHOR_COLUMNS: &[&str] = &["author", "authors"];
const YEAR_COLUMNS: &[&str] = &["publicationyear", "first published year", "published", "year"];
const GENRE_COLUMNS: &[&str] = &["genre", "category"];
const DESCRIPTION_COLUMNS: &[&str] = &["description", "summary", "desc"];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("CSV must contain 'Title' and 'Author' columns")]
    MissingColumns,
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|candidate| headers.iter().position(|h| h.to_lowercase() == *candidate))
}

/// Parse free-form CSV text into book records.
///
/// The first line is the header; column names are matched case-insensitively
/// against synonym sets (e.g. `name` for title, `authors` for author). The
/// whole parse fails when no title or no author column exists. Per-row gaps
/// are tolerated: any missing or empty cell becomes "Unknown".
pub fn parse(text: &str) -> Result<Vec<Book>, CodecError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let title_idx = find_column(&headers, TITLE_COLUMNS);
    let author_idx = find_column(&headers, AUTHOR_COLUMNS);
    let (title_idx, author_idx) = match (title_idx, author_idx) {
        (Some(title), Some(author)) => (title, author),
        _ => return Err(CodecError::MissingColumns),
    };
    let year_idx = find_column(&headers, YEAR_COLUMNS);
    let genre_idx = find_column(&headers, GENRE_COLUMNS);
    let description_idx = find_column(&headers, DESCRIPTION_COLUMNS);

    let mut books = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(String::from)
                .unwrap_or_else(|| UNKNOWN_FIELD.to_string())
        };
        books.push(Book {
            title: cell(Some(title_idx)),
            author: cell(Some(author_idx)),
            publication_year: cell(year_idx),
            genre: cell(genre_idx),
            description: cell(description_idx),
        });
    }
    Ok(books)
}

/// Serialize book records under the fixed header. Title, author, genre, and
/// description are individually quoted with internal quotes doubled; the
/// publication year is written raw. An empty list yields the header only.
pub fn serialize(books: &[Book]) -> String {
    let mut out = String::from(CSV_HEADER);
    for book in books {
        out.push('\n');
        out.push_str(&quote(&book.title));
        out.push(',');
        out.push_str(&quote(&book.author));
        out.push(',');
        out.push_str(&book.publication_year);
        out.push(',');
        out.push_str(&quote(&book.genre));
        out.push(',');
        out.push_str(&quote(&book.description));
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

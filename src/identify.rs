use thiserror::Error;

use crate::types::{Book, UNKNOWN_FIELD};

#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("the AI service rejected the configured API key")]
    Auth,
    #[error("the AI service quota is exhausted, try again later")]
    Quota,
    #[error("the AI service returned an unreadable response: {0}")]
    Format(String),
    #[error("could not reach the AI service: {0}")]
    Transport(String),
}

/// Seam to the external multimodal identification service: image bytes plus
/// declared mime type plus a caller-supplied key, out comes a book list.
pub trait BookIdentifier: Send + Sync {
    fn identify(
        &self,
        image: &[u8],
        mime_type: &str,
        api_key: &str,
    ) -> Result<Vec<Book>, IdentifyError>;
}

/// A placeholder identifier that does not perform network calls. It allows
/// wiring the workflows and tests without requiring network or credentials.
pub struct MockBookIdentifier;

impl BookIdentifier for MockBookIdentifier {
    fn identify(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _api_key: &str,
    ) -> Result<Vec<Book>, IdentifyError> {
        let shelf = [
            ("Dune", "Frank Herbert", "1965", "Sci-Fi"),
            ("Emma", "Jane Austen", "1815", "Romance"),
            ("The Hobbit", "J.R.R. Tolkien", "1937", "Fantasy"),
        ];
        Ok(shelf
            .iter()
            .map(|(title, author, year, genre)| Book {
                title: (*title).into(),
                author: (*author).into(),
                publication_year: (*year).into(),
                genre: (*genre).into(),
                description: UNKNOWN_FIELD.into(),
            })
            .collect())
    }
}

#[cfg(feature = "gemini-http")]
pub use http::GeminiBookIdentifier;

#[cfg(feature = "gemini-http")]
mod http {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};

    use super::{Book, BookIdentifier, IdentifyError, UNKNOWN_FIELD};

    const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
    const GEMINI_MODEL: &str = "gemini-2.5-flash";

    const IDENTIFY_PROMPT: &str = "Analyze the provided image containing books. \
Identify each distinct book visible. For each book, extract the following details \
with high accuracy:\n\
1. The full title of the book.\n\
2. The full name of the author.\n\
3. The year the book was FIRST published.\n\
4. The primary literary genre of the book (e.g., Fiction, Sci-Fi, History).\n\
5. A concise, one-sentence description of the book's content or plot.\n\n\
If any piece of information cannot be determined, use the string \"Unknown\". \
Return the data for all identified books in the specified JSON format.";

    pub struct GeminiBookIdentifier {
        base_url: String,
    }

    impl GeminiBookIdentifier {
        pub fn new() -> Self {
            Self {
                base_url: GEMINI_BASE_URL.to_string(),
            }
        }

        /// Point the identifier at a different host, e.g. a mock server.
        pub fn with_base_url(base_url: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into(),
            }
        }

        fn client() -> reqwest::blocking::Client {
            reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("build client")
        }

        fn request_payload(image: &[u8], mime_type: &str) -> Value {
            let book_schema = json!({
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "author": {"type": "STRING"},
                    "publicationYear": {"type": "STRING"},
                    "authorGenre": {"type": "STRING"},
                    "description": {"type": "STRING"}
                },
                "required": ["title", "author", "publicationYear", "authorGenre", "description"]
            });
            json!({
                "contents": [{
                    "parts": [
                        {"inlineData": {"mimeType": mime_type, "data": STANDARD.encode(image)}},
                        {"text": IDENTIFY_PROMPT}
                    ]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "ARRAY", "items": book_schema}
                }
            })
        }
    }

    impl Default for GeminiBookIdentifier {
        fn default() -> Self {
            Self::new()
        }
    }

    impl BookIdentifier for GeminiBookIdentifier {
        fn identify(
            &self,
            image: &[u8],
            mime_type: &str,
            api_key: &str,
        ) -> Result<Vec<Book>, IdentifyError> {
            let url = format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, GEMINI_MODEL, api_key
            );
            let resp = Self::client()
                .post(url)
                .json(&Self::request_payload(image, mime_type))
                .send()
                .map_err(|e| IdentifyError::Transport(e.to_string()))?;

            let status = resp.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(IdentifyError::Auth);
            }
            if status.as_u16() == 429 {
                return Err(IdentifyError::Quota);
            }
            if !status.is_success() {
                return Err(IdentifyError::Transport(format!("HTTP {}", status)));
            }

            let body: Value = resp
                .json()
                .map_err(|e| IdentifyError::Format(e.to_string()))?;
            let text = extract_text(&body)
                .ok_or_else(|| IdentifyError::Format("response carried no content".into()))?;
            let raw: Vec<Value> = serde_json::from_str(text.trim())
                .map_err(|e| IdentifyError::Format(e.to_string()))?;
            Ok(raw.iter().map(book_from_value).collect())
        }
    }

    // Concatenate the text fragments of the first candidate.
    fn extract_text(body: &Value) -> Option<String> {
        let parts = body
            .get("candidates")?
            .as_array()?
            .first()?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let mut text = String::new();
        for part in parts {
            if let Some(fragment) = part.get("text").and_then(Value::as_str) {
                text.push_str(fragment);
            }
        }
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn book_from_value(value: &Value) -> Book {
        let field = |key: &str| -> String {
            match value.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => UNKNOWN_FIELD.to_string(),
            }
        };
        Book {
            title: field("title"),
            author: field("author"),
            publication_year: field("publicationYear"),
            // The model reports genre under `authorGenre`.
            genre: field("authorGenre"),
            description: field("description"),
        }
    }
}


#[cfg(all(test, feature = "gemini-http"))]
mod http_tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gemini_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]}
            }]
        })
    }

    #[test]
    fn identify_posts_inline_image_and_parses_books() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash:generateContent")
                .query_param("key", "test-key");
            then.status(200).json_body(gemini_reply(
                r#"[{"title":"Dune","author":"Frank Herbert","publicationYear":1965,"authorGenre":"Sci-Fi","description":"Epic"}]"#,
            ));
        });

        let identifier = GeminiBookIdentifier::with_base_url(server.url(""));
        let books = identifier
            .identify(b"raw-image", "image/jpeg", "test-key")
            .expect("identify");

        mock.assert();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Dune");
        assert_eq!(books[0].publication_year, "1965");
        assert_eq!(books[0].genre, "Sci-Fi");
    }

    #[test]
    fn missing_fields_become_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(gemini_reply(r#"[{"title":"Dune","author":""}]"#));
        });

        let books = GeminiBookIdentifier::with_base_url(server.url(""))
            .identify(b"img", "image/png", "k")
            .expect("identify");
        assert_eq!(books[0].author, UNKNOWN_FIELD);
        assert_eq!(books[0].genre, UNKNOWN_FIELD);
    }

    #[test]
    fn auth_and_quota_statuses_map_to_typed_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(403);
        });
        let err = GeminiBookIdentifier::with_base_url(server.url(""))
            .identify(b"img", "image/png", "bad-key")
            .expect_err("should fail");
        assert!(matches!(err, IdentifyError::Auth));

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(429);
        });
        let err = GeminiBookIdentifier::with_base_url(server.url(""))
            .identify(b"img", "image/png", "k")
            .expect_err("should fail");
        assert!(matches!(err, IdentifyError::Quota));
    }

    #[test]
    fn unparsable_model_text_is_a_format_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(gemini_reply("not json at all"));
        });
        let err = GeminiBookIdentifier::with_base_url(server.url(""))
            .identify(b"img", "image/png", "k")
            .expect_err("should fail");
        assert!(matches!(err, IdentifyError::Format(_)));
    }

    #[test]
    fn empty_candidates_is_a_format_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({"candidates": []}));
        });
        let err = GeminiBookIdentifier::with_base_url(server.url(""))
            .identify(b"img", "image/png", "k")
            .expect_err("should fail");
        assert!(matches!(err, IdentifyError::Format(_)));
    }
}

use std::sync::Arc;

use crate::camera::{CameraDevice, CameraStream};
use crate::codec;
use crate::identify::BookIdentifier;
use crate::settings::AppSettings;
use crate::types::{Book, SubmittedFile};

/// How a submitted file is routed: by declared mime type first, then by
/// filename suffix for the text path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Text,
    Unsupported,
}

pub fn classify_file(mime_type: &str, file_name: &str) -> FileKind {
    if mime_type.starts_with("image/") {
        return FileKind::Image;
    }
    if mime_type == "text/csv"
        || mime_type == "text/plain"
        || file_name.ends_with(".csv")
        || file_name.ends_with(".txt")
    {
        return FileKind::Text;
    }
    FileKind::Unsupported
}

/// The original image kept alongside identification results for display.
#[derive(Debug, Clone)]
pub struct ImagePreview {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct ResultSet {
    pub books: Vec<Book>,
    pub image: Option<ImagePreview>,
}

/// Lifecycle of one identify-books operation. A single tagged state —
/// no parallel flags, so no invalid combinations.
#[derive(Debug)]
pub enum UploadState {
    Idle,
    TakingPicture,
    Processing,
    Results(ResultSet),
    Error(String),
}

pub struct UploadWorkflow {
    state: UploadState,
    identifier: Arc<dyn BookIdentifier>,
    camera: Arc<dyn CameraDevice>,
    // Held exactly while `state` is TakingPicture; dropping it releases
    // the camera on every exit path.
    stream: Option<Box<dyn CameraStream>>,
    last_saved_collection: Option<String>,
}

impl UploadWorkflow {
    pub fn new(identifier: Arc<dyn BookIdentifier>, camera: Arc<dyn CameraDevice>) -> Self {
        Self {
            state: UploadState::Idle,
            identifier,
            camera,
            stream: None,
            last_saved_collection: None,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Collection chosen by the most recent successful save; survives
    /// reset so the save panel can pre-select it next time.
    pub fn last_saved_collection(&self) -> Option<&str> {
        self.last_saved_collection.as_deref()
    }

    pub fn record_saved(&mut self, collection: impl Into<String>) {
        self.last_saved_collection = Some(collection.into());
    }

    /// Submit a user-selected file. Only acts from Idle.
    pub fn submit(&mut self, settings: &AppSettings, file: SubmittedFile) {
        if !matches!(self.state, UploadState::Idle) {
            return;
        }
        match classify_file(&file.mime_type, &file.name) {
            FileKind::Image => self.submit_image(settings, file.bytes, file.mime_type),
            FileKind::Text => self.submit_text(file.bytes),
            FileKind::Unsupported => {
                self.state = UploadState::Error(format!(
                    "Unsupported file type: {}. Please upload an image, CSV, or TXT file.",
                    file.mime_type
                ));
            }
        }
    }

    fn submit_image(&mut self, settings: &AppSettings, bytes: Vec<u8>, mime_type: String) {
        let Some(api_key) = settings.api_key.as_deref() else {
            // No network call is attempted without a key.
            self.state = UploadState::Error(
                "AI API key is not configured. Please go to Settings.".to_string(),
            );
            return;
        };
        if bytes.is_empty() {
            self.state = UploadState::Error("Failed to read the uploaded file.".to_string());
            return;
        }
        self.state = UploadState::Processing;
        self.state = match self.identifier.identify(&bytes, &mime_type, api_key) {
            Ok(books) if books.is_empty() => UploadState::Error(
                "No books could be identified in the image. Please try another one.".to_string(),
            ),
            Ok(books) => UploadState::Results(ResultSet {
                books,
                image: Some(ImagePreview { bytes, mime_type }),
            }),
            Err(err) => UploadState::Error(format!(
                "An error occurred while analyzing the image: {}",
                err
            )),
        };
    }

    // CSV/TXT import works without an AI key.
    fn submit_text(&mut self, bytes: Vec<u8>) {
        self.state = UploadState::Processing;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                self.state = UploadState::Error("Failed to read the uploaded file.".to_string());
                return;
            }
        };
        self.state = match codec::parse(&text) {
            Ok(books) if books.is_empty() => UploadState::Error(
                "Could not parse any books from the file. Please check the format.".to_string(),
            ),
            Ok(books) => UploadState::Results(ResultSet { books, image: None }),
            Err(err) => {
                UploadState::Error(format!("An error occurred while parsing the file: {}", err))
            }
        };
    }

    /// Enter the camera sub-flow, acquiring the exclusive stream.
    pub fn request_capture(&mut self) {
        if !matches!(self.state, UploadState::Idle) {
            return;
        }
        match self.camera.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = UploadState::TakingPicture;
            }
            Err(err) => self.state = UploadState::Error(err.to_string()),
        }
    }

    /// Capture a frame and hand it to identification. The stream is
    /// released before any processing happens.
    pub fn confirm_capture(&mut self, settings: &AppSettings) {
        if !matches!(self.state, UploadState::TakingPicture) {
            return;
        }
        let Some(mut stream) = self.stream.take() else {
            self.state = UploadState::Idle;
            return;
        };
        let frame = stream.capture();
        drop(stream);
        match frame {
            Ok(frame) => self.submit_image(settings, frame.bytes, frame.mime_type),
            Err(err) => self.state = UploadState::Error(err.to_string()),
        }
    }

    /// Discard the current stream and acquire a fresh one.
    pub fn retake(&mut self) {
        if !matches!(self.state, UploadState::TakingPicture) {
            return;
        }
        self.stream = None;
        match self.camera.open() {
            Ok(stream) => self.stream = Some(stream),
            Err(err) => self.state = UploadState::Error(err.to_string()),
        }
    }

    pub fn cancel_capture(&mut self) {
        if !matches!(self.state, UploadState::TakingPicture) {
            return;
        }
        self.stream = None;
        self.state = UploadState::Idle;
    }

    /// Return to Idle from any state, dropping session data but keeping
    /// the last-saved collection name.
    pub fn reset(&mut self) {
        self.stream = None;
        self.state = UploadState::Idle;
    }
}

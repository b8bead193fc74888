use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("could not access the camera: {0}")]
    Unavailable(String),
    #[error("the camera is already in use")]
    Busy,
    #[error("capture failed: {0}")]
    Capture(String),
}

/// One captured frame, handed to the upload workflow exactly like an
/// uploaded image file.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Seam to the host's camera hardware. `open` acquires the exclusive
/// stream; dropping the returned stream releases it.
pub trait CameraDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// An acquired camera stream. The device stays locked until this value is
/// dropped, so every workflow exit path releases it deterministically.
pub trait CameraStream: Send {
    fn capture(&mut self) -> Result<CapturedFrame, CameraError>;
}

/// In-process camera double. Enforces real exclusivity through a busy flag
/// so tests can observe that streams are released on every exit path.
#[derive(Default)]
pub struct MockCamera {
    busy: Arc<AtomicBool>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

impl CameraDevice for MockCamera {
    fn open(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(CameraError::Busy);
        }
        Ok(Box::new(MockCameraStream {
            busy: Arc::clone(&self.busy),
        }))
    }
}

struct MockCameraStream {
    busy: Arc<AtomicBool>,
}

impl CameraStream for MockCameraStream {
    fn capture(&mut self) -> Result<CapturedFrame, CameraError> {
        Ok(CapturedFrame {
            bytes: b"mock-jpeg-frame".to_vec(),
            mime_type: "image/jpeg".to_string(),
        })
    }
}

impl Drop for MockCameraStream {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

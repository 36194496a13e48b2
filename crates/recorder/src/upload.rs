use crate::errors::UploadError;
use std::path::Path;
use std::time::Duration;

/// Transport for finished segment files. The caller decides what happens to
/// the local file based on the result; an `Err` must never trigger deletion.
pub trait Uploader: Send {
    fn upload(&self, path: &Path) -> Result<(), UploadError>;
}

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Multipart POST of a segment file to the configured endpoint.
pub struct HttpUploader {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: String) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, path: &Path) -> Result<(), UploadError> {
        let form = reqwest::blocking::multipart::Form::new()
            .file("segment", path)
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected(format!("HTTP {status}")));
        }

        tracing::debug!("Uploaded {} ({})", path.display(), status);
        Ok(())
    }
}

/// Local-cache mode: no endpoint configured, segments stay on disk.
pub struct NullUploader;

impl Uploader for NullUploader {
    fn upload(&self, path: &Path) -> Result<(), UploadError> {
        tracing::info!("No upload endpoint configured, keeping {}", path.display());
        Ok(())
    }
}

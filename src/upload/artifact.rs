use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Local copy of a generated report.
///
/// The backing temp file lives exactly as long as the handle: dropping it
/// (or calling [`ArtifactHandle::release`]) deletes the file, which
/// invalidates the URL handed out by [`ArtifactHandle::url`].
#[derive(Debug)]
pub struct ArtifactHandle {
    file: NamedTempFile,
    url: String,
    size: u64,
}

impl ArtifactHandle {
    pub fn create(bytes: &[u8]) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("anomaly-report-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let url = format!("file://{}", file.path().display());
        tracing::debug!(%url, size = bytes.len(), "created report artifact");

        Ok(Self {
            file,
            url,
            size: bytes.len() as u64,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copies the report to a user-chosen location.
    pub fn save_as(&self, destination: &Path) -> io::Result<u64> {
        let written = fs::copy(self.file.path(), destination)?;
        tracing::info!(destination = %destination.display(), bytes = written, "saved report");
        Ok(written)
    }

    /// Deletes the backing file now instead of waiting for drop.
    pub fn release(self) {
        let url = self.url;
        if let Err(e) = self.file.close() {
            tracing::warn!(%url, error = %e, "failed to release report artifact");
        } else {
            tracing::debug!(%url, "released report artifact");
        }
    }
}

use reqwest::StatusCode;

/// Shown for every transport failure; the underlying cause only goes to the log.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing the file.";

/// Problems caught before anything is sent over the network.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The picked file is not an Excel workbook.
    #[error("Please upload a valid Excel file (.xlsx, .xls)")]
    UnsupportedType { mime: String },

    /// Submit was triggered without a selected file.
    #[error("Please select a file.")]
    NoFileSelected,

    /// The picked file could not be read from disk.
    #[error("Could not read {name}: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the upload request itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload failed with status: {0}")]
    Status(StatusCode),

    #[error("failed to store report: {0}")]
    Artifact(#[from] std::io::Error),
}

/// Pre-submission workbook inspection failures. Logged only.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("failed to parse workbook: {0}")]
    Parse(#[from] calamine::Error),

    #[error("workbook contains no sheets")]
    NoSheets,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl UploadError {
    /// Text rendered inline in the form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::Unreadable { name, .. }) => {
                format!("Could not read the selected file: {name}")
            }
            Self::Validation(err) => err.to_string(),
            Self::Transport(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

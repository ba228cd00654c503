use crate::upload::REPORT_FILE_NAME;

/// Where the form is in a single upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Validating,
    Uploading,
    /// Carries the URL of the artifact produced by this attempt.
    Success(String),
    Failed(String),
}

impl UploadPhase {
    pub fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    pub url: String,
    pub file_name: &'static str,
    pub size: u64,
}

impl DownloadLink {
    pub fn new(url: impl Into<String>, size: u64) -> Self {
        Self {
            url: url.into(),
            file_name: REPORT_FILE_NAME,
            size,
        }
    }
}

/// Everything the renderer needs, derived from the form on every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub picker_label: String,
    pub file_size: Option<u64>,
    pub submit_enabled: bool,
    pub busy: bool,
    pub error: Option<String>,
    pub download: Option<DownloadLink>,
    pub note: Option<String>,
}

impl FormView {
    pub fn submit_label(&self) -> &'static str {
        if self.busy {
            "Generating report..."
        } else {
            "Upload and Generate Report"
        }
    }
}

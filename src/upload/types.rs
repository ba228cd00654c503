use super::error::ValidationError;
use std::fs;
use std::path::Path;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME: &str = "application/vnd.ms-excel";

pub const ACCEPTED_MIME_TYPES: [&str; 2] = [XLSX_MIME, XLS_MIME];
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Name the downloaded report is saved under.
pub const REPORT_FILE_NAME: &str = "anomaly_detection_report.pdf";

/// A spreadsheet picked by the user, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub content: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            content,
        }
    }

    /// Reads a file from disk, deriving its MIME type from the extension.
    ///
    /// Files outside the allow-list are rejected before anything is read.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let mime = mime_for_path(path);
        if !ACCEPTED_MIME_TYPES.contains(&mime) {
            return Err(ValidationError::UnsupportedType {
                mime: mime.to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let content = fs::read(path).map_err(|source| ValidationError::Unreadable {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            mime: mime.to_string(),
            name,
            content,
        })
    }

    pub fn is_accepted(&self) -> bool {
        ACCEPTED_MIME_TYPES.contains(&self.mime.as_str())
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Maps a file extension to a MIME type the way a browser file input would.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" => XLSX_MIME,
        "xls" => XLS_MIME,
        "csv" => "text/csv",
        "txt" | "log" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

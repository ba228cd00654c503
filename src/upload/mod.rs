mod artifact;
mod client;
mod error;
mod inspect;
mod types;

pub use artifact::ArtifactHandle;
pub use client::{ReportClient, ReportTransport, FILE_FIELD};
pub use error::{
    InspectError, TransportError, UploadError, ValidationError, GENERIC_FAILURE_MESSAGE,
};
pub use inspect::{log_inspection, CalamineInspector, WorkbookInspector, WorkbookSummary};
pub use types::{
    format_size, mime_for_path, SelectedFile, ACCEPTED_EXTENSIONS, ACCEPTED_MIME_TYPES,
    REPORT_FILE_NAME, XLSX_MIME, XLS_MIME,
};

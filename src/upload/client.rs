use super::error::TransportError;
use super::types::SelectedFile;
use crate::config::UploaderConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

/// Name of the multipart field the backend reads the spreadsheet from.
pub const FILE_FIELD: &str = "file";

/// Sends a spreadsheet to the report backend and hands back the PDF body.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn upload(&self, file: SelectedFile) -> Result<Bytes, TransportError>;
}

#[derive(Clone)]
pub struct ReportClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ReportClient {
    pub fn new(config: &UploaderConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportTransport for ReportClient {
    async fn upload(&self, file: SelectedFile) -> Result<Bytes, TransportError> {
        let size = file.content.len();
        let part = Part::bytes(file.content)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = Form::new().part(FILE_FIELD, part);

        tracing::info!(endpoint = %self.endpoint, file = %file.name, size, "uploading spreadsheet");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(file = %file.name, %status, "report request rejected");
            return Err(TransportError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok());
        let is_pdf = content_type
            .as_ref()
            .is_some_and(|m| m.essence_str() == mime::APPLICATION_PDF.essence_str());
        if !is_pdf {
            tracing::warn!(
                file = %file.name,
                content_type = ?content_type,
                "response is not declared as a PDF, using it anyway"
            );
        }

        let body = response.bytes().await?;
        tracing::info!(file = %file.name, %status, bytes = body.len(), "received report");
        Ok(body)
    }
}

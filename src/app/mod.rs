mod form;
mod state;
mod ui;

use crate::config::UploaderConfig;
use crate::upload::{CalamineInspector, ReportClient, WorkbookInspector, ACCEPTED_EXTENSIONS};
use crate::upload::REPORT_FILE_NAME;
use eframe::{egui, App};
pub use form::UploadForm;
use rfd::FileDialog;
pub use state::{DownloadLink, FormView, UploadPhase};
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct ReportUploader {
    form: UploadForm,
    runtime: Handle,
    endpoint: String,
}

impl ReportUploader {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: &UploaderConfig,
        client: ReportClient,
        runtime: Handle,
    ) -> Self {
        let endpoint = client.endpoint().to_string();
        let inspector: Option<Arc<dyn WorkbookInspector>> = if config.inspect_before_upload {
            Some(Arc::new(CalamineInspector))
        } else {
            None
        };
        tracing::info!(%endpoint, inspect = config.inspect_before_upload, "initializing report uploader");

        Self {
            form: UploadForm::new(Arc::new(client), inspector),
            runtime,
            endpoint,
        }
    }

    pub fn choose_file(&mut self) {
        if let Some(path) = FileDialog::new()
            .set_title("Choose Excel File")
            .add_filter("Excel", &ACCEPTED_EXTENSIONS[..])
            .pick_file()
        {
            self.form.select_path(&path);
        }
    }

    pub fn submit(&mut self) {
        self.form.start_upload(&self.runtime);
    }

    pub fn download_report(&mut self) {
        if self.form.artifact().is_none() {
            return;
        }
        if let Some(path) = FileDialog::new()
            .set_title("Save PDF Report")
            .set_file_name(REPORT_FILE_NAME)
            .add_filter("PDF", &["pdf"])
            .save_file()
        {
            self.form.save_report(&path);
        }
    }

    pub fn open_report(&self) {
        if let Some(artifact) = self.form.artifact() {
            if let Err(e) = open::that(artifact.path()) {
                tracing::warn!(path = %artifact.path().display(), error = %e, "failed to open report");
            }
        }
    }

    pub fn reset(&mut self) {
        self.form.reset();
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        if self.form.poll_completion() {
            ctx.request_repaint();
        }
        // Keep polling while the request is out; egui only repaints on input otherwise.
        if self.form.phase().is_uploading() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

impl App for ReportUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}

use super::state::{DownloadLink, FormView, UploadPhase};
use crate::upload::{
    log_inspection, ArtifactHandle, ReportTransport, SelectedFile, TransportError, UploadError,
    ValidationError, WorkbookInspector,
};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

struct Completion {
    attempt: u64,
    result: Result<Bytes, TransportError>,
}

/// Upload form controller: holds the picked file, the current phase and the
/// last generated report.
///
/// Every submission gets an attempt id. Completions that arrive for an
/// attempt other than the current one are dropped, which covers resets and
/// a form torn down while its request is still in flight.
pub struct UploadForm {
    transport: Arc<dyn ReportTransport>,
    inspector: Option<Arc<dyn WorkbookInspector>>,
    selected: Option<SelectedFile>,
    phase: UploadPhase,
    artifact: Option<ArtifactHandle>,
    note: Option<String>,
    attempt: u64,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl UploadForm {
    pub fn new(
        transport: Arc<dyn ReportTransport>,
        inspector: Option<Arc<dyn WorkbookInspector>>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            inspector,
            selected: None,
            phase: UploadPhase::Idle,
            artifact: None,
            note: None,
            attempt: 0,
            completion_tx,
            completion_rx,
        }
    }

    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        self.artifact.as_ref()
    }

    pub fn can_submit(&self) -> bool {
        self.selected.is_some() && !self.phase.is_uploading()
    }

    /// Accepts or rejects a picked file based on its MIME type.
    pub fn select_file(&mut self, file: SelectedFile) {
        let uploading = self.phase.is_uploading();
        if !uploading {
            self.phase = UploadPhase::Validating;
        }

        if file.is_accepted() {
            tracing::info!(file = %file.name, mime = %file.mime, size = file.size(), "file selected");
            self.selected = Some(file);
            self.note = None;
            if !uploading {
                self.phase = UploadPhase::Idle;
            }
        } else {
            tracing::info!(file = %file.name, "file rejected");
            self.reject(ValidationError::UnsupportedType { mime: file.mime });
        }
    }

    /// Reads a file picked from disk and hands it to [`Self::select_file`].
    pub fn select_path(&mut self, path: &Path) {
        match SelectedFile::from_path(path) {
            Ok(file) => self.select_file(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read selected file");
                self.reject(e);
            }
        }
    }

    fn reject(&mut self, err: ValidationError) {
        if let ValidationError::UnsupportedType { mime } = &err {
            tracing::debug!(%mime, "mime type not in allow-list");
        }
        self.selected = None;
        let message = UploadError::from(err).user_message();
        // The in-flight attempt keeps its phase; the problem is surfaced as a note.
        if self.phase.is_uploading() {
            self.note = Some(message);
        } else {
            self.phase = UploadPhase::Failed(message);
        }
    }

    /// Moves into `Uploading` and returns the id and file for the new attempt.
    ///
    /// `Ok(None)` means an upload is already in flight and nothing was started.
    fn begin_attempt(&mut self) -> Result<Option<(u64, SelectedFile)>, ValidationError> {
        if self.phase.is_uploading() {
            tracing::debug!(attempt = self.attempt, "upload already in flight, ignoring submit");
            return Ok(None);
        }

        let Some(file) = self.selected.clone() else {
            let err = ValidationError::NoFileSelected;
            self.phase = UploadPhase::Failed(err.to_string());
            return Err(err);
        };

        self.attempt += 1;
        self.phase = UploadPhase::Uploading;
        self.note = None;
        tracing::info!(attempt = self.attempt, file = %file.name, "starting upload");
        Ok(Some((self.attempt, file)))
    }

    fn spawn_inspection(&self, runtime: &Handle, file: &SelectedFile) {
        if let Some(inspector) = &self.inspector {
            let inspector = Arc::clone(inspector);
            let file = file.clone();
            runtime.spawn_blocking(move || {
                log_inspection(inspector.as_ref(), &file);
            });
        }
    }

    /// Applies the outcome of an attempt. `None` when the attempt is no longer current.
    fn settle(
        &mut self,
        attempt: u64,
        result: Result<Bytes, TransportError>,
    ) -> Option<Result<(), UploadError>> {
        if attempt != self.attempt || !self.phase.is_uploading() {
            tracing::debug!(attempt, current = self.attempt, "discarding stale upload completion");
            return None;
        }

        let outcome = result.and_then(|body| Ok(ArtifactHandle::create(&body)?));
        match outcome {
            Ok(artifact) => {
                let url = artifact.url().to_string();
                tracing::info!(attempt, %url, size = artifact.size(), "report ready");
                if let Some(previous) = self.artifact.replace(artifact) {
                    previous.release();
                }
                self.phase = UploadPhase::Success(url);
                Some(Ok(()))
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "upload failed");
                let err = UploadError::from(e);
                self.phase = UploadPhase::Failed(err.user_message());
                Some(Err(err))
            }
        }
    }

    /// Submits the selected file and waits for the report.
    ///
    /// If the returned future is dropped before it completes, the form leaves
    /// `Uploading` and returns to `Idle`.
    pub async fn submit_upload(&mut self) -> Result<(), UploadError> {
        let Some((attempt, file)) = self.begin_attempt()? else {
            return Ok(());
        };
        if let Ok(runtime) = Handle::try_current() {
            self.spawn_inspection(&runtime, &file);
        }

        let transport = Arc::clone(&self.transport);
        let mut pending = PendingAttempt {
            form: self,
            attempt,
            settled: false,
        };
        let result = transport.upload(file).await;
        pending.settled = true;
        pending.form.settle(attempt, result).unwrap_or(Ok(()))
    }

    /// Starts an upload on `runtime` without blocking the caller. The result
    /// is picked up by [`Self::poll_completion`] or [`Self::wait_for_completion`].
    pub fn start_upload(&mut self, runtime: &Handle) {
        let Ok(Some((attempt, file))) = self.begin_attempt() else {
            return;
        };
        self.spawn_inspection(runtime, &file);

        let transport = Arc::clone(&self.transport);
        let tx = self.completion_tx.clone();
        runtime.spawn(async move {
            let result = transport.upload(file).await;
            if tx.send(Completion { attempt, result }).is_err() {
                tracing::debug!(attempt, "form closed before upload completed");
            }
        });
    }

    /// Drains finished uploads. Returns true if anything arrived.
    pub fn poll_completion(&mut self) -> bool {
        let mut received = false;
        while let Ok(Completion { attempt, result }) = self.completion_rx.try_recv() {
            received = true;
            self.settle(attempt, result);
        }
        received
    }

    pub async fn wait_for_completion(&mut self) {
        while self.phase.is_uploading() {
            match self.completion_rx.recv().await {
                Some(Completion { attempt, result }) => {
                    self.settle(attempt, result);
                }
                None => break,
            }
        }
    }

    /// Writes the current report to `destination`.
    pub fn save_report(&mut self, destination: &Path) {
        let Some(artifact) = &self.artifact else {
            return;
        };
        self.note = Some(match artifact.save_as(destination) {
            Ok(_) => format!("Saved report to {}", destination.display()),
            Err(e) => {
                tracing::error!(destination = %destination.display(), error = %e, "failed to save report");
                format!("Could not save report: {e}")
            }
        });
    }

    /// Clears the selection and the report. Any upload still in flight becomes stale.
    pub fn reset(&mut self) {
        tracing::info!("resetting upload form");
        self.attempt += 1;
        self.selected = None;
        self.phase = UploadPhase::Idle;
        self.note = None;
        if let Some(artifact) = self.artifact.take() {
            artifact.release();
        }
    }

    pub fn view(&self) -> FormView {
        FormView {
            picker_label: self
                .selected
                .as_ref()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "Choose Excel File".to_string()),
            file_size: self.selected.as_ref().map(SelectedFile::size),
            submit_enabled: self.can_submit(),
            busy: self.phase.is_uploading(),
            error: self.phase.error_message().map(str::to_string),
            download: self
                .artifact
                .as_ref()
                .map(|a| DownloadLink::new(a.url(), a.size())),
            note: self.note.clone(),
        }
    }
}

impl Drop for UploadForm {
    fn drop(&mut self) {
        if self.phase.is_uploading() {
            tracing::debug!(attempt = self.attempt, "upload form dropped with upload in flight");
        }
        if let Some(artifact) = self.artifact.take() {
            artifact.release();
        }
    }
}

/// Returns the form to `Idle` if an awaited upload is abandoned.
struct PendingAttempt<'a> {
    form: &'a mut UploadForm,
    attempt: u64,
    settled: bool,
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled && self.form.attempt == self.attempt && self.form.phase.is_uploading() {
            tracing::debug!(attempt = self.attempt, "upload abandoned before completion");
            self.form.phase = UploadPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{
        InspectError, WorkbookSummary, GENERIC_FAILURE_MESSAGE, REPORT_FILE_NAME, XLSX_MIME,
        XLS_MIME,
    };
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const PDF: &[u8] = b"%PDF-1.4 anomaly report";

    enum Scripted {
        Pdf(&'static [u8]),
        Status(u16),
        StoreFailure,
        Gated(oneshot::Receiver<Bytes>),
    }

    #[derive(Default)]
    struct ScriptedTransport {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Scripted>>,
    }

    impl ScriptedTransport {
        fn with(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReportTransport for ScriptedTransport {
        async fn upload(&self, _file: SelectedFile) -> Result<Bytes, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Pdf(body)) => Ok(Bytes::from_static(body)),
                Some(Scripted::Status(code)) => Err(TransportError::Status(
                    StatusCode::from_u16(code).unwrap(),
                )),
                Some(Scripted::StoreFailure) => Err(TransportError::Artifact(
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                )),
                Some(Scripted::Gated(rx)) => Ok(rx.await.unwrap_or_default()),
                None => panic!("unexpected upload"),
            }
        }
    }

    struct FailingInspector {
        calls: AtomicUsize,
    }

    impl WorkbookInspector for FailingInspector {
        fn inspect(&self, _file: &SelectedFile) -> Result<WorkbookSummary, InspectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InspectError::NoSheets)
        }
    }

    fn form(transport: &Arc<ScriptedTransport>) -> UploadForm {
        UploadForm::new(transport.clone(), None)
    }

    fn report_xlsx() -> SelectedFile {
        SelectedFile::new("report.xlsx", XLSX_MIME, b"PK\x03\x04sheet".to_vec())
    }

    #[test]
    fn rejects_files_outside_allow_list() {
        let transport = ScriptedTransport::with(vec![]);
        let mut form = form(&transport);

        form.select_file(SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec()));

        let view = form.view();
        assert_eq!(
            form.phase(),
            &UploadPhase::Failed("Please upload a valid Excel file (.xlsx, .xls)".into())
        );
        assert_eq!(
            view.error.as_deref(),
            Some("Please upload a valid Excel file (.xlsx, .xls)")
        );
        assert!(form.selected().is_none());
        assert!(!view.submit_enabled);
        assert_eq!(view.picker_label, "Choose Excel File");
    }

    #[test]
    fn valid_pick_replaces_invalid_one_and_clears_error() {
        let transport = ScriptedTransport::with(vec![]);
        let mut form = form(&transport);

        form.select_file(SelectedFile::new("image.png", "image/png", vec![1]));
        form.select_file(SelectedFile::new("legacy.xls", XLS_MIME, vec![0xD0, 0xCF]));

        let view = form.view();
        assert_eq!(form.phase(), &UploadPhase::Idle);
        assert_eq!(view.error, None);
        assert_eq!(view.picker_label, "legacy.xls");
        assert_eq!(view.file_size, Some(2));
        assert!(view.submit_enabled);
    }

    #[test]
    fn unreadable_path_clears_selection() {
        let transport = ScriptedTransport::with(vec![]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());

        form.select_path(Path::new("/no/such/dir/missing.xlsx"));

        assert!(form.selected().is_none());
        assert!(matches!(form.phase(), UploadPhase::Failed(msg) if msg.contains("missing.xlsx")));
    }

    #[tokio::test]
    async fn submit_without_file_never_touches_network() {
        let transport = ScriptedTransport::with(vec![]);
        let mut form = form(&transport);

        let err = form.submit_upload().await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::NoFileSelected)
        ));

        form.start_upload(&Handle::current());

        assert_eq!(transport.calls(), 0);
        assert_eq!(
            form.phase(),
            &UploadPhase::Failed("Please select a file.".into())
        );
    }

    #[tokio::test]
    async fn successful_upload_offers_report_download() {
        let transport = ScriptedTransport::with(vec![Scripted::Pdf(PDF)]);
        let mut form = form(&transport);

        form.select_file(report_xlsx());
        form.submit_upload().await.unwrap();

        let view = form.view();
        let link = view.download.expect("download link");
        assert_eq!(link.file_name, REPORT_FILE_NAME);
        assert_eq!(form.phase(), &UploadPhase::Success(link.url.clone()));
        assert_eq!(link.size, PDF.len() as u64);

        let artifact = form.artifact().unwrap();
        assert_eq!(std::fs::read(artifact.path()).unwrap(), PDF);
        assert!(!view.busy);
        assert!(view.submit_enabled);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn submit_stays_disabled_while_request_is_pending() {
        let (release, gate) = oneshot::channel();
        let transport = ScriptedTransport::with(vec![Scripted::Gated(gate)]);
        let mut form = form(&transport);
        let runtime = Handle::current();

        form.select_file(report_xlsx());
        form.start_upload(&runtime);

        let view = form.view();
        assert!(view.busy);
        assert!(!view.submit_enabled);
        assert_eq!(view.submit_label(), "Generating report...");

        // A second submit while pending is ignored.
        form.start_upload(&runtime);
        // Re-picking a file stays possible and keeps the upload running.
        form.select_file(SelectedFile::new("next.xlsx", XLSX_MIME, vec![7]));
        assert!(form.phase().is_uploading());
        assert!(!form.view().submit_enabled);
        assert!(!form.poll_completion());

        release.send(Bytes::from_static(PDF)).unwrap();
        form.wait_for_completion().await;

        assert!(matches!(form.phase(), UploadPhase::Success(_)));
        assert!(form.view().submit_enabled);
        assert_eq!(form.view().picker_label, "next.xlsx");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn rejected_request_reports_generic_failure() {
        let transport = ScriptedTransport::with(vec![Scripted::Status(500)]);
        let mut form = form(&transport);

        form.select_file(report_xlsx());
        let err = form.submit_upload().await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(TransportError::Status(_))));

        let view = form.view();
        assert_eq!(view.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(!view.busy);
        assert!(view.submit_enabled);
        assert!(view.download.is_none());
    }

    #[tokio::test]
    async fn second_success_replaces_and_releases_first_report() {
        let transport =
            ScriptedTransport::with(vec![Scripted::Pdf(PDF), Scripted::Pdf(b"%PDF-second")]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());

        form.submit_upload().await.unwrap();
        let first = form.artifact().unwrap().path().to_path_buf();
        assert!(first.exists());

        form.submit_upload().await.unwrap();
        let second = form.artifact().unwrap().path().to_path_buf();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert_eq!(std::fs::read(&second).unwrap(), b"%PDF-second");
        assert_eq!(
            form.phase(),
            &UploadPhase::Success(form.artifact().unwrap().url().to_string())
        );
    }

    #[tokio::test]
    async fn failed_retry_keeps_previous_report() {
        let transport = ScriptedTransport::with(vec![Scripted::Pdf(PDF), Scripted::Status(404)]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());

        form.submit_upload().await.unwrap();
        let _ = form.submit_upload().await;

        let view = form.view();
        assert!(view.error.is_some());
        assert!(view.download.is_some());
    }

    #[tokio::test]
    async fn report_store_failure_is_generic_and_keeps_previous_report() {
        let transport =
            ScriptedTransport::with(vec![Scripted::Pdf(PDF), Scripted::StoreFailure]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());

        form.submit_upload().await.unwrap();
        let first = form.artifact().unwrap().path().to_path_buf();

        let err = form.submit_upload().await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(TransportError::Artifact(_))));
        assert_eq!(
            form.phase(),
            &UploadPhase::Failed(GENERIC_FAILURE_MESSAGE.to_string())
        );
        assert_eq!(form.artifact().unwrap().path(), first.as_path());
        assert!(first.exists());
        assert!(form.view().download.is_some());
    }

    #[tokio::test]
    async fn completion_after_reset_is_ignored() {
        let (release, gate) = oneshot::channel();
        let transport = ScriptedTransport::with(vec![Scripted::Gated(gate)]);
        let mut form = form(&transport);

        form.select_file(report_xlsx());
        form.start_upload(&Handle::current());
        form.reset();
        release.send(Bytes::from_static(PDF)).unwrap();

        let mut arrived = false;
        for _ in 0..100 {
            if form.poll_completion() {
                arrived = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(arrived);
        assert_eq!(form.phase(), &UploadPhase::Idle);
        assert!(form.artifact().is_none());
    }

    #[tokio::test]
    async fn dropping_form_mid_request_is_harmless() {
        let (release, gate) = oneshot::channel();
        let transport = ScriptedTransport::with(vec![Scripted::Gated(gate)]);
        let mut form = form(&transport);

        form.select_file(report_xlsx());
        form.start_upload(&Handle::current());
        drop(form);
        let _ = release.send(Bytes::from_static(PDF));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn dropping_form_releases_report() {
        let transport = ScriptedTransport::with(vec![Scripted::Pdf(PDF)]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());
        form.submit_upload().await.unwrap();
        let path = form.artifact().unwrap().path().to_path_buf();

        drop(form);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn abandoned_submit_leaves_uploading() {
        let (_release, gate) = oneshot::channel::<Bytes>();
        let transport = ScriptedTransport::with(vec![Scripted::Gated(gate)]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), form.submit_upload())
            .await
            .is_err();

        assert!(timed_out);
        assert_eq!(form.phase(), &UploadPhase::Idle);
        assert!(form.can_submit());
    }

    #[tokio::test]
    async fn inspection_failure_does_not_change_outcome() {
        let transport = ScriptedTransport::with(vec![Scripted::Pdf(PDF)]);
        let inspector = Arc::new(FailingInspector {
            calls: AtomicUsize::new(0),
        });
        let shared: Arc<dyn WorkbookInspector> = inspector.clone();
        let mut form = UploadForm::new(transport.clone(), Some(shared));

        form.select_file(report_xlsx());
        form.submit_upload().await.unwrap();
        assert!(matches!(form.phase(), UploadPhase::Success(_)));

        for _ in 0..100 {
            if inspector.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(inspector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn save_report_copies_to_destination() {
        let transport = ScriptedTransport::with(vec![Scripted::Pdf(PDF)]);
        let mut form = form(&transport);
        form.select_file(report_xlsx());
        form.submit_upload().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(REPORT_FILE_NAME);
        form.save_report(&target);

        assert_eq!(std::fs::read(&target).unwrap(), PDF);
        assert!(form.view().note.unwrap().starts_with("Saved report to"));
    }
}

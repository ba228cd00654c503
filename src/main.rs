use clap::Parser;
use eframe::CreationContext;
use report_uploader::app::ReportUploader;
use report_uploader::config::{Args, UploaderConfig};
use report_uploader::upload::ReportClient;
use tracing_subscriber::EnvFilter;

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("report_uploader={}", args.log_level())));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args);
    let config = UploaderConfig::from(&args);
    let client = ReportClient::new(&config)?;

    // Uploads run here; the UI thread only polls for their results.
    let runtime = tokio::runtime::Runtime::new()?;
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([520.0, 560.0])
            .with_min_inner_size([400.0, 460.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Anomaly Detection Report",
        options,
        Box::new(move |cc: &CreationContext| {
            Box::new(ReportUploader::new(cc, &config, client, handle))
        }),
    )?;

    tracing::info!("report uploader closed");
    Ok(())
}

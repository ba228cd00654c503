use clap::Parser;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const UPLOAD_PATH: &str = "/api/upload";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Parser, Debug, Clone)]
#[command(name = "report_uploader", about = "Upload an Excel workbook and fetch its anomaly detection report")]
pub struct Args {
    /// Base URL of the report backend
    #[arg(long, env = "REPORT_UPLOADER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Seconds to wait for the report to be generated
    #[arg(long, env = "REPORT_UPLOADER_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Seconds to wait for the connection to the backend
    #[arg(long, env = "REPORT_UPLOADER_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Skip parsing the workbook locally before it is uploaded
    #[arg(long)]
    pub no_inspect: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub inspect_before_upload: bool,
}

impl UploaderConfig {
    /// Full URL of the report generation endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), UPLOAD_PATH)
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            inspect_before_upload: true,
        }
    }
}

impl From<&Args> for UploaderConfig {
    fn from(args: &Args) -> Self {
        Self {
            base_url: args.base_url.trim().to_string(),
            request_timeout: Duration::from_secs(args.timeout_secs),
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            inspect_before_upload: !args.no_inspect,
        }
    }
}

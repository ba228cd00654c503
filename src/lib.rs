//! Desktop client that uploads an Excel workbook to an anomaly detection
//! backend and offers the returned PDF report for download.

pub mod app;
pub mod config;
pub mod upload;

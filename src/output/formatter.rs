//! Output formatting

use crate::bucket::{BucketRecord, PortBinding};
use crate::bundle::ExportReport;
use crate::catalog::CoreImage;
use crate::output::human::format_human;
use crate::output::json::format_json;
use crate::session::SessionAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Result of one command, ready to be rendered
#[derive(Debug, Clone)]
pub enum Report {
    Buckets(Vec<BucketRecord>),
    BucketNames(Vec<String>),
    Bucket(BucketRecord),
    Images(Vec<CoreImage>),
    Port(PortBinding),
    Session(SessionAccess),
    Export(ExportReport),
    Message(String),
}

pub fn format_output(report: &Report, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}

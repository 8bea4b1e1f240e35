//! JSON output formatting

use crate::output::formatter::Report;
use serde_json::{json, Value};

pub fn format_json(report: &Report) -> String {
    let data: Value = match report {
        Report::Buckets(buckets) => serde_json::to_value(buckets).unwrap_or(json!(null)),
        Report::BucketNames(names) => json!({ "buckets": names }),
        Report::Bucket(bucket) => serde_json::to_value(bucket).unwrap_or(json!(null)),
        Report::Images(images) => serde_json::to_value(images).unwrap_or(json!(null)),
        Report::Port(port) => serde_json::to_value(port).unwrap_or(json!(null)),
        Report::Session(access) => json!({
            "host": access.host,
            "port": access.port,
            "token": access.token,
            "url": access.url(),
        }),
        Report::Export(report) => serde_json::to_value(report).unwrap_or(json!(null)),
        Report::Message(s) => json!({ "message": s }),
    };

    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

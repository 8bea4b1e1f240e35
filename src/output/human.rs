//! Human-readable output formatting

use crate::bucket::BucketRecord;
use crate::output::formatter::Report;
use bytesize::ByteSize;

pub fn format_human(report: &Report) -> String {
    match report {
        Report::Buckets(buckets) => {
            let mut output = format!("{:<20}{:<25}{:<25}\n", "Bucket Name", "Docker Image", "Status");
            for bucket in buckets {
                let image = bucket
                    .image
                    .as_ref()
                    .map(|i| i.version.as_str())
                    .unwrap_or("None");
                output.push_str(&format!(
                    "{:<20}{:<25}{:<25}\n",
                    truncate(&bucket.name, 18),
                    truncate(image, 23),
                    truncate(&bucket.status.to_string(), 23)
                ));
            }
            output
        }
        Report::BucketNames(names) => {
            let mut output = String::from("Bucket Name\n");
            for name in names {
                output.push_str(name);
                output.push('\n');
            }
            output
        }
        Report::Bucket(bucket) => format_bucket(bucket),
        Report::Images(images) => {
            let mut output = format!("{:<15}{:<35}{}\n", "Version", "Repository", "Image ID");
            for image in images {
                output.push_str(&format!(
                    "{:<15}{:<35}{}\n",
                    image.version,
                    format!("{}/{}", image.org, image.repo),
                    truncate(&image.image_id, 19)
                ));
            }
            output
        }
        Report::Port(port) => format!(
            "Bound local port {} to container port {}/{}",
            port.local,
            port.container,
            if port.tcp { "tcp" } else { "udp" }
        ),
        Report::Session(access) => format!(
            "Jupyter lab can be accessed in a browser at: {}",
            access.url()
        ),
        Report::Export(report) => format!(
            "Exported {} mount(s) to {} ({})",
            report.mounts,
            report.path.display(),
            ByteSize(report.size)
        ),
        Report::Message(msg) => msg.clone(),
    }
}

fn format_bucket(bucket: &BucketRecord) -> String {
    let mut output = format!("Bucket: {}\n", bucket.name);
    output.push_str(&"-".repeat(bucket.name.len() + 8));
    output.push('\n');
    match &bucket.image {
        Some(image) => output.push_str(&format!("Image:     {} ({})\n", image.version, image.image_id)),
        None => output.push_str("Image:     None\n"),
    }
    output.push_str(&format!("Status:    {}\n", bucket.status));
    output.push_str(&format!(
        "Container: {}\n",
        bucket.container_ref.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!("Created:   {}\n", bucket.created_at.format("%Y-%m-%d %H:%M:%S")));

    if !bucket.ports.is_empty() {
        output.push_str("\nPorts\n");
        for port in &bucket.ports {
            output.push_str(&format!(
                "  {} -> {}/{}\n",
                port.local,
                port.container,
                if port.tcp { "tcp" } else { "udp" }
            ));
        }
    }
    if !bucket.storage.is_empty() {
        output.push_str("\nStorage\n");
        for mount in &bucket.storage {
            output.push_str(&format!(
                "  {} -> {} ({})\n",
                mount.local.display(),
                mount.container.display(),
                mount.permission
            ));
        }
    }
    if let Some(session) = &bucket.jupyter_session {
        output.push_str(&format!(
            "\nJupyter:   http://localhost:{}/?token={}\n",
            session.local_port, session.token
        ));
    }
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 18), "short");
        assert_eq!(truncate("a-very-long-bucket-name", 18), "a-very-long-buc...");
    }

    #[test]
    fn test_bucket_table() {
        let report = Report::Buckets(vec![BucketRecord::new("lab")]);
        let output = format_human(&report);
        assert!(output.starts_with("Bucket Name"));
        assert!(output.contains("lab"));
        assert!(output.contains("unset"));
    }

    #[test]
    fn test_bucket_detail() {
        let output = format_human(&Report::Bucket(BucketRecord::new("lab")));
        assert!(output.contains("Bucket: lab"));
        assert!(output.contains("Image:     None"));
    }
}

//! Subcommand dispatch against a bucket manager

use crate::error::{ResenError, Result};
use crate::manager::BucketManager;
use crate::output::Report;
use crate::runtime::ContainerRuntime;

use super::SubCommand;

/// Run one subcommand and describe its outcome.
pub fn dispatch<R: ContainerRuntime>(manager: &mut BucketManager<R>, command: SubCommand) -> Result<Report> {
    match command {
        SubCommand::Create { bucket } => {
            manager.create_bucket(&bucket)?;
            Ok(Report::Message(format!("Created bucket '{}'", bucket)))
        }
        SubCommand::List { bucket: Some(bucket), .. } => {
            manager.refresh_all()?;
            Ok(Report::Bucket(manager.get_bucket(&bucket)?.clone()))
        }
        SubCommand::List { bucket: None, names } => {
            manager.refresh_all()?;
            let buckets = manager.list_buckets();
            if names {
                Ok(Report::BucketNames(buckets.iter().map(|b| b.name.clone()).collect()))
            } else {
                Ok(Report::Buckets(buckets.to_vec()))
            }
        }
        SubCommand::Remove { bucket } => {
            manager.remove_bucket(&bucket)?;
            Ok(Report::Message(format!("Removed bucket '{}'", bucket)))
        }
        SubCommand::Images => Ok(Report::Images(manager.list_images().to_vec())),
        SubCommand::SetImage { bucket, version } => {
            manager.set_image(&bucket, &version)?;
            Ok(Report::Message(format!("Bucket '{}' uses image {}", bucket, version)))
        }
        SubCommand::AddStorage { bucket, local, container, permission } => {
            manager.add_storage(&bucket, &local, &container, &permission)?;
            Ok(Report::Message(format!(
                "Mounted {} at {} in bucket '{}'",
                local.display(),
                container.display(),
                bucket
            )))
        }
        SubCommand::RemoveStorage { bucket, local } => {
            let removed = manager.remove_storage(&bucket, &local)?;
            Ok(Report::Message(format!(
                "Unmounted {} from bucket '{}'",
                removed.local.display(),
                bucket
            )))
        }
        SubCommand::AddPort { bucket, local, container, udp } => {
            Ok(Report::Port(manager.add_port(&bucket, local, container, !udp)?))
        }
        SubCommand::RemovePort { bucket, local } => {
            let removed = manager.remove_port(&bucket, local)?;
            Ok(Report::Message(format!(
                "Removed port {} from bucket '{}'",
                removed.local, bucket
            )))
        }
        SubCommand::Start { bucket } => {
            manager.start_bucket(&bucket)?;
            Ok(Report::Message(format!("Bucket '{}' is running", bucket)))
        }
        SubCommand::Stop { bucket } => {
            manager.stop_bucket(&bucket)?;
            Ok(Report::Message(format!("Bucket '{}' is stopped", bucket)))
        }
        SubCommand::Status { bucket } => {
            let status = manager.refresh_status(&bucket)?;
            Ok(Report::Message(format!("{}: {}", bucket, status)))
        }
        SubCommand::Exec { bucket, command, detach } => {
            let output = manager.execute(&bucket, &command, detach)?;
            Ok(Report::Message(output.text()))
        }
        SubCommand::StartJupyter { bucket, local, container } => {
            Ok(Report::Session(manager.start_session(&bucket, local, container)?))
        }
        SubCommand::StopJupyter { bucket } => {
            manager.stop_session(&bucket)?;
            Ok(Report::Message(format!("Jupyter lab stopped in bucket '{}'", bucket)))
        }
        SubCommand::Export { bucket, output, exclude } => {
            Ok(Report::Export(manager.export_bucket(&bucket, &output, &exclude)?))
        }
        SubCommand::Import { bucket, input, mounts_dir } => {
            let record = manager.import_bucket(&bucket, &input, mounts_dir.as_deref())?;
            Ok(Report::Bucket(record.clone()))
        }
        SubCommand::Shell => Err(ResenError::InvalidState(
            "Already in interactive mode".to_string(),
        )),
    }
}

//! Resen CLI - manage container-backed development buckets

use anyhow::Context;
use clap::Parser;
use resen::cli::{dispatch, Args, SubCommand};
use resen::{config, format_output, BucketManager, DockerCli, OutputFormat};

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    resen::telemetry::init_tracing(args.verbose)?;

    let dir = config::config_dir(args.config_dir.as_deref())
        .context("could not prepare the configuration directory")?;
    let mut manager = BucketManager::open(&dir, DockerCli::default())?;

    let lock_path = manager.lock_path().to_path_buf();
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_file(&lock_path);
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let format = if args.json { OutputFormat::Json } else { OutputFormat::Human };
    let outcome = match args.command {
        SubCommand::Shell => resen::repl::run_repl(&mut manager, &format),
        command => dispatch(&mut manager, command).map(|report| {
            let output = format_output(&report, &format);
            if !output.is_empty() {
                println!("{}", output);
            }
        }),
    };

    let closed = manager.close();
    outcome?;
    closed?;
    Ok(())
}

//! NetCopy CLI - Verified SCP file transfer for network devices

use anyhow::Context;
use clap::Parser;
use netcopy::channel::{ChannelSession, ScpChannel, TransferChannel};
use netcopy::config::{CliArgs, Commands, OutputFormat, RemoteConfig};
use netcopy::error::FileCopyError;
use netcopy::hash::hash_file;
use netcopy::progress::ProgressReporter;
use netcopy::transfer::{device_path, FileCopy, TransferRequest};
use serde_json::json;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Exit status for a transfer whose MD5 did not verify
const EXIT_VERIFICATION_FAILED: i32 = 2;

fn main() {
    let args = CliArgs::parse();
    init_logging(&args);

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        let code = match e.downcast_ref::<FileCopyError>() {
            Some(FileCopyError::VerificationFailed { .. }) => EXIT_VERIFICATION_FAILED,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn init_logging(args: &CliArgs) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    match &args.command {
        Commands::Put { source, destination } => {
            cmd_transfer(args, TransferRequest::upload(source, destination.clone()))
        }
        Commands::Get { source, destination } => {
            cmd_transfer(args, TransferRequest::download(source.clone(), destination))
        }
        Commands::Md5 { file } => cmd_md5(file, args.output_format),
        Commands::RemoteMd5 { path } => cmd_remote_md5(args, path),
        Commands::Space => cmd_space(args),
        Commands::DetectFs => cmd_detect_fs(args),
    }
}

fn device_config(args: &CliArgs) -> anyhow::Result<RemoteConfig> {
    RemoteConfig::from_cli(args).context("Invalid device settings")
}

fn cmd_transfer(args: &CliArgs, request: TransferRequest) -> anyhow::Result<()> {
    let config = device_config(args)?;
    let request = match &config.file_system {
        Some(fs) => request.with_file_system(fs.clone()),
        None => request,
    };

    let progress = if args.quiet || args.output_format == OutputFormat::Json {
        ProgressReporter::disabled()
    } else {
        ProgressReporter::new()
    };

    let channel = ScpChannel::new(config).with_progress(progress);
    let mut copy = FileCopy::new(request, channel)?;
    let report = copy.run()?;

    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text if !args.quiet => report.print_summary(),
        OutputFormat::Text => {}
    }

    Ok(())
}

fn cmd_md5(file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let result = hash_file(file)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "path": file, "md5": result.digest, "size": result.size })
        ),
        OutputFormat::Text => println!("{}  {}", result.digest, file.display()),
    }

    Ok(())
}

/// Connect, resolve the file system and hand the session to `f`
fn with_device<T>(
    args: &CliArgs,
    f: impl FnOnce(&mut ScpChannel, &str) -> netcopy::Result<T>,
) -> anyhow::Result<T> {
    let config = device_config(args)?;
    let explicit_fs = config.file_system.clone();
    let mut channel = ScpChannel::new(config);

    let mut session = ChannelSession::open(&mut channel)?;
    let file_system = match explicit_fs {
        Some(fs) => fs,
        None => session.autodetect_filesystem_root()?,
    };

    let value = f(&mut *session, &file_system)?;
    Ok(value)
}

fn cmd_remote_md5(args: &CliArgs, path: &str) -> anyhow::Result<()> {
    let (full_path, digest) = with_device(args, |channel, fs| {
        let full_path = device_path(fs, path);
        let digest = channel.remote_md5(&full_path)?;
        Ok((full_path, digest))
    })?;

    match args.output_format {
        OutputFormat::Json => println!("{}", json!({ "path": full_path, "md5": digest })),
        OutputFormat::Text => println!("{}  {}", digest, full_path),
    }

    Ok(())
}

fn cmd_space(args: &CliArgs) -> anyhow::Result<()> {
    let (file_system, free) = with_device(args, |channel, fs| {
        let free = channel.remote_space_available(fs)?;
        Ok((fs.to_string(), free))
    })?;

    match args.output_format {
        OutputFormat::Json => println!("{}", json!({ "file_system": file_system, "free_bytes": free })),
        OutputFormat::Text => println!(
            "{}: {} free ({} bytes)",
            file_system,
            humansize::format_size(free, humansize::BINARY),
            free
        ),
    }

    Ok(())
}

fn cmd_detect_fs(args: &CliArgs) -> anyhow::Result<()> {
    let file_system = with_device(args, |_, fs| Ok(fs.to_string()))?;

    match args.output_format {
        OutputFormat::Json => println!("{}", json!({ "file_system": file_system })),
        OutputFormat::Text => println!("{}", file_system),
    }

    Ok(())
}

use anyhow::Context;
use colored::Colorize;
use ferry_core::{cancel_pair, Replicator, RetryingReplicator};
use ferry_store::FsObjectStore;
use ferry_types::{ObjectLocation, TransferOutcome};

use crate::cli::*;
use crate::config::FerryConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = FerryConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Replicate(args) => cmd_replicate(config, args, cli.format).await,
        Command::CheckConfig(_) => cmd_check_config(config, cli.format),
    }
}

async fn cmd_replicate(
    mut config: FerryConfig,
    args: ReplicateArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    config.apply_overrides(&args);
    config.validate()?;

    let source_root = config.source.root.clone().context("source.root is not set")?;
    let dest_root = config.destination.root.clone().context("destination.root is not set")?;
    let dest_bucket = config
        .destination
        .bucket
        .clone()
        .context("destination.bucket is not set")?;

    let source = FsObjectStore::new(&config.source.name, source_root);
    let destination =
        FsObjectStore::new(&config.destination.name, dest_root).destination(dest_bucket);
    let replicator = RetryingReplicator::new(Replicator::new(
        source,
        destination,
        config.replication.clone(),
    )?);

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });

    let location = ObjectLocation::new(config.source.name.clone(), args.bucket, args.key);
    match replicator.replicate_with_cancel(&location, &signal).await {
        Ok(outcome) => print_outcome(&outcome, format),
        Err(e) => {
            if let OutputFormat::Json = format {
                let body = serde_json::json!({
                    "status": "failed",
                    "key": location.key,
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(e.into())
        }
    }
}

fn print_outcome(outcome: &TransferOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => match outcome {
            TransferOutcome::Skipped { key, digest } => {
                println!("{} {} already up to date", "✓".green().bold(), key.bold());
                match digest {
                    Some(d) => println!("  Digest: {}", d.to_string().cyan()),
                    None => println!("  Digest: {}", "composite (existence trusted)".yellow()),
                }
            }
            TransferOutcome::Replicated { key, bytes, digest } => {
                println!("{} Replicated {}", "✓".green().bold(), key.bold());
                println!("  Bytes: {bytes}");
                println!("  Digest: {}", digest.to_string().cyan());
            }
        },
    }
    Ok(())
}

fn cmd_check_config(config: FerryConfig, format: OutputFormat) -> anyhow::Result<()> {
    let problems = config.problems();
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "valid": problems.is_empty(),
                "problems": problems,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text if problems.is_empty() => {
            println!("{} Configuration valid", "✓".green().bold());
            println!("  Source: {}", config.source.name.bold());
            println!(
                "  Destination: {}/{}",
                config.destination.name.bold(),
                config.destination.bucket.as_deref().unwrap_or_default().yellow()
            );
            println!(
                "  Retry: {} attempts, {}ms initial backoff",
                config.replication.retry.max_attempts, config.replication.retry.initial_backoff_ms
            );
        }
        OutputFormat::Text => {
            for problem in &problems {
                println!("  {} {}", "✗".red(), problem);
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} configuration problem(s)", problems.len())
    }
}

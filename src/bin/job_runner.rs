use std::path::PathBuf;

use clap::Parser;
use g2post::config::job::{ErrorPolicy, JobConfig};
use g2post::utils::{logger, validation::Validate};
use g2post::run_command;

/// Runs a TOML job file: a named sequence of g2post steps executed in order.
#[derive(Debug, Parser)]
#[command(name = "g2post-job")]
#[command(version)]
struct JobCli {
    /// Path to the TOML job file
    job_file: PathBuf,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(long, help = "Append log output to this file")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = JobCli::parse();

    // 初始化日誌
    match &cli.log_file {
        Some(path) => logger::init_cli_logger_with_file(cli.verbose, path)?,
        None => logger::init_cli_logger(cli.verbose),
    }

    let config = match JobConfig::from_file(&cli.job_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Could not load job file: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting job '{}' with {} steps",
        config.job.name,
        config.steps.len()
    );
    if let Some(description) = &config.job.description {
        tracing::info!("{}", description);
    }

    // 先驗證所有步驟再執行
    for (i, step) in config.steps.iter().enumerate() {
        if let Err(e) = step.validate() {
            tracing::error!("❌ Step {} ({}) is invalid: {}", i + 1, step.kind(), e);
            eprintln!("❌ Step {} ({}): {}", i + 1, step.kind(), e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }

    let total = config.steps.len();
    let mut failed = 0usize;
    for (i, step) in config.steps.into_iter().enumerate() {
        let kind = step.kind();
        tracing::info!("▶ Step {}/{} - {}", i + 1, total, kind);
        match run_command(step.into()) {
            Ok(report) => {
                tracing::info!(
                    "✅ Step {}/{} ({}) done: {} records, {} outputs",
                    i + 1,
                    total,
                    kind,
                    report.records,
                    report.outputs.len()
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!("❌ Step {}/{} ({}) failed: {}", i + 1, total, kind, e);
                eprintln!("❌ Step {}/{} ({}): {}", i + 1, total, kind, e.user_friendly_message());
                if config.job.on_error == ErrorPolicy::Abort {
                    eprintln!("💡 {}", e.recovery_suggestion());
                    std::process::exit(1);
                }
            }
        }
    }

    if failed > 0 {
        tracing::warn!("Job '{}' finished with {} failed steps", config.job.name, failed);
        println!("⚠️ Job '{}' finished with {} of {} steps failed", config.job.name, failed, total);
        std::process::exit(1);
    }

    tracing::info!("✅ Job '{}' completed successfully!", config.job.name);
    println!("✅ Job '{}' completed successfully!", config.job.name);
    Ok(())
}

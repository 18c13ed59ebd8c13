use clap::Parser;
use g2post::utils::{logger, validation::Validate};
use g2post::{run_command, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 初始化日誌
    match &cli.log_file {
        Some(path) => logger::init_cli_logger_with_file(cli.verbose, path)?,
        None => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("Starting g2post CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli.command);
    }

    // 驗證配置
    if let Err(e) = cli.command.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run_command(cli.command) {
        Ok(report) => {
            tracing::info!("✅ Post-processing completed successfully!");
            println!("✅ Post-processing completed successfully!");
            println!("📊 Records processed: {}", report.records);
            for output in &report.outputs {
                println!("📁 Output saved to: {}", output.display());
            }
        }
        Err(e) => {
            tracing::error!("❌ Post-processing failed: {}", e);
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }

    Ok(())
}

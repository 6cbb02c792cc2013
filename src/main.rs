use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{CloudProvider, Commands, QueueCommands};

use archeval::config::Config;
use archeval::eval::{OpenAiClient, OpenAiConfig};
use archeval::queue::{MessageQueue, ServiceBusConfig, ServiceBusQueue};
use archeval::runner::{
    AttemptOutcome, EvaluationOutcome, EvaluationRun, FeedbackLoop, FeedbackLoopConfig,
};
use archeval::telemetry::{
    AzureMonitorCollector, AzureMonitorConfig, CloudWatchCollector, CloudWatchConfig, LogCollector,
};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("archeval")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("archeval.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Some(Commands::Queue { command }) => handle_queue_command(command, config).await,
        None => {
            let Some(text) = cli.text.as_deref() else {
                bail!("missing architecture description; run `archeval --help`");
            };
            run_evaluation(text, cli, config).await
        }
    }
}

/// Build the telemetry collector for the selected provider, or none for the
/// local variant
fn build_collector(cli: &Cli, config: &Config) -> Result<Option<Arc<dyn LogCollector>>> {
    if cli.no_telemetry {
        return Ok(None);
    }

    let timeout = Duration::from_millis(config.telemetry.timeout_ms);
    match cli.cloud_provider {
        Some(CloudProvider::Aws) => {
            let collector = CloudWatchCollector::new(CloudWatchConfig::from_env(timeout)?)
                .context("Failed to create CloudWatch collector")?;
            Ok(Some(Arc::new(collector)))
        }
        Some(CloudProvider::Azure) => {
            let collector = AzureMonitorCollector::new(AzureMonitorConfig::from_env(timeout)?)
                .context("Failed to create Azure Monitor collector")?;
            Ok(Some(Arc::new(collector)))
        }
        None => bail!("--cloud-provider is required unless --no-telemetry is set"),
    }
}

async fn run_evaluation(text: &str, cli: &Cli, config: &Config) -> Result<()> {
    let collector = build_collector(cli, config)?;

    let eval = OpenAiClient::new(OpenAiConfig {
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        timeout: Duration::from_millis(config.llm.timeout_ms),
    })
    .context("Failed to create evaluation client")?;

    let log_query = match cli.cloud_provider {
        Some(CloudProvider::Aws) => Some(config.telemetry.aws_filter_pattern.clone()),
        Some(CloudProvider::Azure) => Some(config.telemetry.azure_log_query.clone()),
        None => None,
    };

    let loop_config = FeedbackLoopConfig {
        max_attempts: cli.max_attempts.unwrap_or(config.feedback.max_attempts),
        log_query,
        metric_name: config.telemetry.metric_name.clone(),
        span: Duration::from_secs(config.telemetry.lookback_secs),
    };

    let runner = FeedbackLoop::with_config(Arc::new(eval), collector, loop_config);

    let mut evaluation = EvaluationRun::new(text);
    let outcome = runner.run(&mut evaluation).await;

    for attempt in &evaluation.attempts {
        match &attempt.outcome {
            AttemptOutcome::Success(_) => {
                println!("{} {} succeeded", "Attempt".green(), attempt.index);
            }
            AttemptOutcome::Failure { kind, message } => {
                println!(
                    "{} {} failed ({}): {}",
                    "Attempt".red(),
                    attempt.index,
                    kind,
                    message
                );
            }
        }
    }

    match outcome {
        EvaluationOutcome::Success(result) => {
            println!("{} {}", "Final result:".green(), result);
        }
        EvaluationOutcome::Exhausted(last_error) => {
            println!(
                "{} {}",
                "Attempt budget exhausted; best available:".yellow(),
                last_error
            );
        }
        EvaluationOutcome::Cancelled(last) => {
            println!(
                "{} {}",
                "Cancelled; last known result:".yellow(),
                last.unwrap_or_else(|| "(none)".to_string())
            );
        }
    }

    Ok(())
}

async fn handle_queue_command(command: &QueueCommands, config: &Config) -> Result<()> {
    info!("Handling queue command: {:?}", command);

    let queue = ServiceBusQueue::new(ServiceBusConfig::from_env(Duration::from_millis(
        config.queue.timeout_ms,
    ))?)
    .context("Failed to create queue client")?;

    match command {
        QueueCommands::Send { content } => {
            queue.send(content).await?;
            println!("{} {}", "Sent:".green(), content);
        }
        QueueCommands::Receive { max_count, max_wait_secs } => {
            let messages = queue
                .receive(*max_count, Duration::from_secs(*max_wait_secs))
                .await?;
            if messages.is_empty() {
                println!("{}", "No messages available".yellow());
            }
            for message in messages {
                println!("{} {}", "Received:".cyan(), message.body);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

mod demo;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use task_client::{HttpTaskClient, TaskApi, TaskflowConfig};
use task_core::{TaskSnapshot, TaskStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use workflow_system::flows::{shahid, video_book};
use workflow_system::{
    StepInput, StepOutput, WorkflowDefinition, WorkflowEvent, WorkflowStepController,
};

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Run multi-step content workflows against the task service")]
#[command(version)]
struct Cli {
    /// Base URL of the task service (overrides TASKFLOW_API_BASE)
    #[arg(long)]
    api_base: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Use the built-in simulated backend instead of HTTP
    #[arg(long, default_value = "false")]
    simulate: bool,

    /// Ask the service to cancel the task when interrupted
    #[arg(long, default_value = "false")]
    cancel_remote: bool,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a video into a book: extract, clean, generate
    VideoBook {
        #[arg(long)]
        video_url: String,
        /// Transcript language hint
        #[arg(long)]
        language: Option<String>,
    },
    /// Turn an idea into scenes: analyse, narrate, build scenes
    Shahid {
        #[arg(long)]
        idea: String,
        #[arg(long)]
        genre: Option<String>,
    },
    /// Read the status of a task once
    Status { task_id: String },
    /// Ask the service to cancel a task
    Cancel { task_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let mut config = TaskflowConfig::new();
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    if cli.cancel_remote {
        config.cancel_remote_on_abort = true;
    }
    log::debug!(
        "api base {}, poll every {}ms, {} failures tolerated",
        config.api_base,
        config.poll_interval_ms,
        config.max_poll_failures
    );

    let api: Arc<dyn TaskApi> = if cli.simulate {
        if cli.interval_ms.is_none() {
            config.poll_interval_ms = 500;
        }
        println!("{}", "🧪 Using simulated backend".yellow());
        Arc::new(demo::simulated_backend())
    } else {
        let client = HttpTaskClient::new(&config)?;
        if cli.debug {
            eprintln!(
                "{}",
                format!("[DEBUG] API base: {}", client.base_url()).dimmed()
            );
        }
        Arc::new(client)
    };

    match cli.command {
        Commands::VideoBook {
            video_url,
            language,
        } => {
            let input = video_book::VideoBookInput::ExtractTranscript {
                video_url,
                language,
            };
            run_workflow(video_book::definition()?, input, api, &config).await
        }
        Commands::Shahid { idea, genre } => {
            let input = shahid::ShahidInput::Analyze { idea, genre };
            run_workflow(shahid::definition()?, input, api, &config).await
        }
        Commands::Status { task_id } => {
            let snapshot = api.task_status(&task_id).await?;
            print_snapshot(&snapshot);
            if let Some(result) = &snapshot.result {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        Commands::Cancel { task_id } => {
            api.cancel_task(&task_id).await?;
            println!("{}", format!("🛑 Cancelled task {}", task_id).yellow());
            Ok(())
        }
    }
}

async fn run_workflow<I, O>(
    definition: WorkflowDefinition<I, O>,
    input: I,
    api: Arc<dyn TaskApi>,
    config: &TaskflowConfig,
) -> anyhow::Result<()>
where
    I: StepInput,
    O: StepOutput + Serialize,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let mut controller = WorkflowStepController::new(definition, api, config.poll_config())
        .with_events(tx)
        .with_remote_cancel(config.cancel_remote_on_abort);
    println!(
        "{}",
        format!(
            "🚀 Running {} ({} steps)",
            controller.definition().name(),
            controller.definition().len()
        )
        .cyan()
    );
    controller.start(input)?;

    let token = controller.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let started = tokio::time::Instant::now();
    let outcome = controller.run_to_completion().await;
    interrupt.abort();

    let last_result = controller
        .definition()
        .steps()
        .last()
        .and_then(|step| controller.result(&step.name))
        .cloned();
    drop(controller);
    wait_for_printer(printer).await;

    match outcome {
        Ok(runs) => {
            println!("{}", "─".repeat(50).dimmed());
            println!(
                "{}",
                format!(
                    "✅ Completed {} steps in {}",
                    runs.len(),
                    format_elapsed(started.elapsed())
                )
                .green()
            );
            if let Some(project_id) = runs.iter().rev().find_map(|run| run.project_id.as_deref()) {
                println!("{}", format!("📁 Project: {}", project_id).green());
            }
            if let Some(result) = last_result {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("{}", "🛑 Interrupted; the step was cancelled".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Waits for the event printer to drain. Returns `false` if it panicked.
async fn wait_for_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            log::error!("event printer stopped abnormally: {}", e);
            false
        }
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<WorkflowEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            WorkflowEvent::StepSubmitted { step, task_id } => {
                println!();
                println!("{}", format!("📤 {} submitted as {}", step, task_id).cyan());
            }
            WorkflowEvent::StepProgress { snapshot, .. } => print_snapshot(&snapshot),
            WorkflowEvent::StepCompleted { step, .. } => {
                println!("{}", format!("✅ {} done", step).green());
            }
            WorkflowEvent::StepReady { step } => {
                println!("{}", format!("➡️  Next: {}", step).dimmed());
            }
            WorkflowEvent::StepFailed { step, message } => {
                println!("{}", format!("❌ {} failed: {}", step, message).red());
            }
            WorkflowEvent::StepCancelled { step } => {
                println!("{}", format!("🛑 {} cancelled", step).yellow());
            }
            WorkflowEvent::WorkflowCompleted { workflow } => {
                println!("{}", format!("🏁 {} complete", workflow).green());
            }
        }
    }
}

fn print_snapshot(snapshot: &TaskSnapshot) {
    let progress = match snapshot.progress.percent() {
        Some(percent) => format!("{:>3}%", percent),
        None => "  --".to_string(),
    };
    let line = format!(
        "   [{}] {} {}",
        progress, snapshot.status, snapshot.message
    );
    match snapshot.status {
        TaskStatus::Success => println!("{}", line.green()),
        TaskStatus::Failure => println!("{}", line.red()),
        TaskStatus::Pending | TaskStatus::Running => println!("{}", line.dimmed()),
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn printer_panic_is_reported() {
        let printer = tokio::spawn(async { panic!("broken terminal") });
        assert!(!wait_for_printer(printer).await);
    }

    #[tokio::test]
    async fn printer_drains_until_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(rx));
        tx.send(WorkflowEvent::StepReady {
            step: "clean-transcript".to_string(),
        })
        .unwrap();
        drop(tx);
        assert!(wait_for_printer(printer).await);
    }

    #[test]
    fn elapsed_is_formatted_in_minutes_past_a_minute() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    }
}

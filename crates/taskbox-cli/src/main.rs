//! Taskbox CLI - list, inspect and run the built-in tasks.

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use taskbox_runtime::{InvocationHandle, InvocationUpdate, ProgressEvent, Runtime, TerminalResult};

mod config;
mod json_output;

use config::RunConfig;

/// Taskbox CLI - run tasks locally
#[derive(Parser)]
#[command(name = "taskbox")]
#[command(about = "Run taskbox tasks from the command line", long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `taskbox_runtime=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tasks
    List,

    /// Print a task's input and output schema
    Schema {
        /// Task name
        task: String,
    },

    /// Run a task and stream its progress
    Run {
        /// Task name
        task: String,

        /// Input JSON for the task
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Keep at most this many unread progress updates
        #[arg(long)]
        progress_capacity: Option<usize>,

        /// Emit JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(cli.log_level.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => {
            list_tasks()?;
        }
        Commands::Schema { task } => {
            print_schema(&task)?;
        }
        Commands::Run {
            task,
            input,
            timeout_ms,
            progress_capacity,
            json,
        } => {
            if json {
                json_output::enable_json_mode();
            }
            let config = RunConfig {
                timeout_ms,
                progress_capacity,
            };
            if !run_task(&task, &input, &config).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn list_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let registry = taskbox_tasks::builtin_registry()?;

    println!("Tasks ({}):", registry.len());
    println!("{:<20}  {:<12}  {}", "NAME", "ENTRY", "DESCRIPTION");
    println!("{}", "-".repeat(80));

    for descriptor in registry.descriptors() {
        println!(
            "{:<20}  {:<12}  {}",
            descriptor.name().as_str(),
            descriptor.entry().kind_name(),
            descriptor.description()
        );
    }

    Ok(())
}

fn print_schema(task: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = taskbox_tasks::builtin_registry()?;
    let descriptor = registry
        .get(task)
        .ok_or_else(|| format!("Unknown task '{task}'"))?;

    let schemas = serde_json::json!({
        "input": descriptor.input_schema(),
        "output": descriptor.output_schema(),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);

    Ok(())
}

/// Run one invocation to completion. Returns whether it succeeded.
async fn run_task(
    task: &str,
    input: &str,
    config: &RunConfig,
) -> Result<bool, Box<dyn std::error::Error>> {
    let input: Value = serde_json::from_str(input)?;
    let registry = taskbox_tasks::builtin_registry()?;
    let runtime = Runtime::new(registry, config.runtime_config())?;

    let mut handle = runtime.submit(task, input)?;
    info!(invocation_id = %handle.id(), task = %handle.task(), "Invocation submitted");
    if json_output::is_json_mode() {
        json_output::emit_invocation_started(handle.id(), handle.task());
    } else {
        println!("Invocation {} ({})", handle.id(), handle.task());
    }

    let result = stream_updates(&mut handle).await;
    let report = handle.wait().await;
    if let Some(ms) = report.duration_ms() {
        info!(duration_ms = ms, events = report.events.len(), "Invocation finished");
    }

    Ok(result.is_some_and(|r| r.is_ok()))
}

enum Step {
    Update(Option<InvocationUpdate>),
    Interrupted,
}

/// Print updates until the terminal result. Ctrl-C cancels the invocation.
async fn stream_updates(handle: &mut InvocationHandle) -> Option<TerminalResult> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut result = None;

    loop {
        let step = tokio::select! {
            update = handle.next() => Step::Update(update),
            _ = &mut ctrl_c, if !interrupted => Step::Interrupted,
        };

        match step {
            Step::Interrupted => {
                warn!("Interrupted, cancelling invocation");
                interrupted = true;
                handle.cancel();
            }
            Step::Update(None) => break,
            Step::Update(Some(InvocationUpdate::Progress(event))) => print_progress(&event),
            Step::Update(Some(InvocationUpdate::Lagged { skipped })) => print_lagged(skipped),
            Step::Update(Some(InvocationUpdate::Finished(terminal))) => {
                print_result(&terminal);
                result = Some(terminal);
            }
        }
    }

    result
}

fn print_progress(event: &ProgressEvent) {
    if json_output::is_json_mode() {
        json_output::emit_progress(event);
        return;
    }
    println!(
        "[{:>3.0}%] {:<20} {}",
        event.progress * 100.0,
        event.step,
        event.message
    );
}

fn print_lagged(skipped: u64) {
    if json_output::is_json_mode() {
        json_output::emit_lagged(skipped);
        return;
    }
    println!("  ... {skipped} update(s) skipped");
}

fn print_result(result: &TerminalResult) {
    if json_output::is_json_mode() {
        json_output::emit_finished(result);
        return;
    }
    match result {
        TerminalResult::Ok(output) => {
            println!("Succeeded:");
            println!(
                "{}",
                serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string())
            );
        }
        TerminalResult::Error(error) => {
            println!("Failed: {} ({})", error.message(), error.kind().as_str());
            if let Ok(details) = serde_json::to_string_pretty(error) {
                println!("{details}");
            }
        }
    }
}

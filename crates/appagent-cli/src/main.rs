//! AppAgent CLI - run mobile automation tasks from the terminal.

mod config;
mod display;
mod json_output;

use std::io::{self, BufRead};
use std::process::ExitCode;

use appagent_core::TaskRequest;
use appagent_runner::{LogBuffer, Orchestrator, StreamSanitizer};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::RunArgs;
use display::{JsonSink, TerminalSink};

/// AppAgent CLI - mobile automation task runner
#[derive(Parser)]
#[command(name = "appagent")]
#[command(about = "Run AppAgent tasks on the mobile automation worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task on the worker
    Run(RunArgs),

    /// Sanitize worker output read from stdin
    Sanitize {
        /// Keep single-character output lines as they are
        #[arg(long)]
        no_repair: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the task display.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("appagent=info".parse()?))
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    match cli.command {
        Commands::Run(args) => run_task(args).await,
        Commands::Sanitize { no_repair } => sanitize_stdin(no_repair),
    }
}

async fn run_task(args: RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let request = TaskRequest::new(&args.description, args.privacy)?;
    let orchestrator = Orchestrator::new(args.orchestrator_config())?;

    info!(
        workspace = %orchestrator.config().workspace_root.display(),
        program = %orchestrator.config().worker.program,
        "Starting AppAgent task"
    );

    let result = if args.json {
        json_output::emit_run_started(request.description(), request.privacy_protection())?;
        let result = orchestrator.execute(request, &JsonSink).await;
        json_output::emit_run_finished(&result)?;
        result
    } else {
        println!("Executing task: {}", request.description());
        let sink = TerminalSink::new();
        let result = orchestrator.execute(request, &sink).await;

        println!();
        println!("{}", result.message);
        if let Some(path) = &result.artifact_path {
            println!();
            println!("Screenshot: {}", path.display());
        }
        result
    };

    Ok(if result.succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn sanitize_stdin(no_repair: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let sanitizer = StreamSanitizer::new().with_fragment_repair(!no_repair);
    let mut log = LogBuffer::new();

    let mut stdin = io::stdin().lock();
    let mut line = String::new();
    while stdin.read_line(&mut line)? > 0 {
        log.append(&sanitizer.sanitize(&line));
        line.clear();
    }

    println!("{}", log.as_str());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["appagent", "run", "open app and tap button"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };

        let config = args.orchestrator_config();
        assert_eq!(args.description, "open app and tap button");
        assert!(!args.privacy);
        assert!(!args.json);
        assert_eq!(config.worker.program, "python3");
        assert_eq!(
            config.worker.args,
            vec!["scripts/task_executor.py", "--app", "general"]
        );
        assert_eq!(config.workspace_root.to_str(), Some("./tasks"));
        assert!(config.repair_fragmented_output);
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "appagent",
            "run",
            "play music",
            "--privacy",
            "--workspace",
            "/tmp/tasks",
            "--program",
            "/usr/bin/python3",
            "--arg",
            "worker.py",
            "--arg",
            "--app",
            "--arg",
            "music",
            "--description-file-env",
            "TASK_FILE",
            "--no-repair",
            "--json",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected run command");
        };

        let config = args.orchestrator_config();
        assert!(args.privacy);
        assert!(args.json);
        assert_eq!(config.worker.program, "/usr/bin/python3");
        assert_eq!(config.worker.args, vec!["worker.py", "--app", "music"]);
        assert_eq!(config.description_file_env_var.as_deref(), Some("TASK_FILE"));
        assert!(!config.repair_fragmented_output);
    }

    #[test]
    fn test_parse_sanitize() {
        let cli = Cli::try_parse_from(["appagent", "sanitize", "--no-repair"]).unwrap();
        assert!(matches!(cli.command, Commands::Sanitize { no_repair: true }));
    }
}

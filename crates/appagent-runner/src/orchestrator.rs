//! Task orchestration around the external worker process.
//!
//! One call to [`Orchestrator::execute`] runs the worker once:
//!
//! 1. write the task description to a temporary file
//! 2. snapshot the workspace
//! 3. spawn the worker with the privacy flag in its environment
//! 4. send the description on stdin and close it
//! 5. stream merged stdout/stderr through the sanitizer into the run log
//! 6. wait for exit, diff the workspace and locate the artifact
//!
//! Both output streams of the worker share one OS pipe, so lines reach the
//! log in the order the worker wrote them.
//!
//! Failures never escape `execute`; they come back as a failed
//! [`ExecutionResult`] carrying whatever log was accumulated.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use appagent_core::{ExecutionResult, RunId, RunOutcome, TaskRequest};
use os_pipe::PipeWriter;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::OrchestratorConfig;
use crate::error::RunnerError;
use crate::locator::ArtifactLocator;
use crate::log::{LogBuffer, LogSink};
use crate::sanitize::StreamSanitizer;
use crate::workspace::WorkspaceSnapshot;

/// Lines buffered between the pipe readers and the log loop.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Runs tasks on the worker, one at a time.
///
/// # Example
///
/// ```rust,no_run
/// use appagent_core::TaskRequest;
/// use appagent_runner::{NullSink, Orchestrator, OrchestratorConfig};
///
/// async fn run() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::new(OrchestratorConfig::default())?;
///     let request = TaskRequest::new("Open music app and play my favorite playlist", false)?;
///
///     let result = orchestrator.execute(request, &NullSink).await;
///
///     println!("{}", result.message);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    sanitizer: StreamSanitizer,
    locator: ArtifactLocator,
    in_flight: AtomicBool,
}

/// Worker exit plus what it left in the workspace.
struct WorkerExit {
    exit_code: i32,
    artifact_path: Option<PathBuf>,
}

impl Orchestrator {
    /// Create an orchestrator from configuration.
    pub fn new(config: OrchestratorConfig) -> Result<Self, RunnerError> {
        let locator = ArtifactLocator::new(&config.artifacts)?;
        let sanitizer =
            StreamSanitizer::new().with_fragment_repair(config.repair_fragmented_output);

        Ok(Self {
            config,
            sanitizer,
            locator,
            in_flight: AtomicBool::new(false),
        })
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute one task and return its result.
    ///
    /// `sink` receives the full sanitized log after every chunk. A call made
    /// while another is in flight on the same orchestrator fails immediately.
    pub async fn execute(&self, request: TaskRequest, sink: &dyn LogSink) -> ExecutionResult {
        let run_id = RunId::generate();
        let description = request.description();

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!(run_id = %run_id, "Rejecting task while another run is in flight");
            return ExecutionResult::errored(
                run_id,
                description,
                RunOutcome::Errored,
                &RunnerError::Busy.to_string(),
                String::new(),
            );
        };

        info!(
            run_id = %run_id,
            description_len = description.len(),
            privacy_protection = request.privacy_protection(),
            "Starting task execution"
        );

        let mut log = LogBuffer::new();
        match self.run(&run_id, &request, sink, &mut log).await {
            Ok(exit) => {
                info!(
                    run_id = %run_id,
                    exit_code = exit.exit_code,
                    artifact = ?exit.artifact_path,
                    "Task execution finished"
                );
                ExecutionResult::exited(
                    run_id,
                    description,
                    exit.exit_code,
                    exit.artifact_path,
                    log.into_string(),
                )
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Task execution failed");
                ExecutionResult::errored(
                    run_id,
                    description,
                    outcome_for(&e),
                    &e.to_string(),
                    log.into_string(),
                )
            }
        }
    }

    async fn run(
        &self,
        run_id: &RunId,
        request: &TaskRequest,
        sink: &dyn LogSink,
        log: &mut LogBuffer,
    ) -> Result<WorkerExit, RunnerError> {
        // Removed from disk when dropped, on every return path.
        let description_file = write_description_file(request.description())?;

        let root = &self.config.workspace_root;
        let before = WorkspaceSnapshot::capture(root)?;

        let (output, output_writer) = os_pipe::pipe().map_err(RunnerError::OutputPipe)?;
        // The command owns the only write ends, so EOF follows worker exit.
        let mut child = self.spawn_worker(request, description_file.path(), output_writer)?;

        let stdin = child.stdin.take().ok_or(RunnerError::MissingPipe("stdin"))?;

        let (line_tx, mut line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        tokio::task::spawn_blocking(move || forward_lines(output, line_tx));

        let payload = format!("{}\n", request.description());
        let stdin_writer = tokio::spawn(write_task(stdin, payload));

        if let Err(e) = self.stream_output(run_id, &mut line_rx, sink, log).await {
            warn!(run_id = %run_id, error = %e, "Stopping worker after output failure");
            if let Err(kill_err) = child.kill().await {
                warn!(run_id = %run_id, error = %kill_err, "Failed to kill worker");
            }
            return Err(e);
        }

        let exit_code = wait_for_exit(&mut child).await?;

        match stdin_writer.await? {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!(run_id = %run_id, "Worker closed its input before reading the task");
            }
            Err(e) => return Err(RunnerError::Stdin(e)),
        }

        let after = WorkspaceSnapshot::capture(root)?;
        let artifact_path = self.locator.locate(&before, &after, root);

        Ok(WorkerExit {
            exit_code,
            artifact_path,
        })
    }

    fn spawn_worker(
        &self,
        request: &TaskRequest,
        description_file: &Path,
        output: PipeWriter,
    ) -> Result<Child, RunnerError> {
        let worker = &self.config.worker;
        let errors = output.try_clone().map_err(RunnerError::OutputPipe)?;

        let mut cmd = Command::new(&worker.program);
        cmd.args(&worker.args)
            .current_dir(&worker.working_dir)
            .env(
                &self.config.privacy_env_var,
                privacy_flag(request.privacy_protection()),
            )
            .stdin(Stdio::piped())
            .stdout(output)
            .stderr(errors)
            .kill_on_drop(true);

        if let Some(name) = &self.config.description_file_env_var {
            cmd.env(name, description_file);
        }

        info!(
            program = %worker.program,
            args = ?worker.args,
            working_dir = %worker.working_dir.display(),
            "Spawning worker process"
        );
        debug!("Full command: {:?}", cmd);

        cmd.spawn().map_err(|source| {
            error!(program = %worker.program, error = %source, "Failed to spawn worker process");
            RunnerError::Launch {
                program: worker.program.clone(),
                source,
            }
        })
    }

    /// Consume merged output until the pipe closes.
    async fn stream_output(
        &self,
        run_id: &RunId,
        lines: &mut mpsc::Receiver<io::Result<String>>,
        sink: &dyn LogSink,
        log: &mut LogBuffer,
    ) -> Result<(), RunnerError> {
        let mut chunk_count = 0u64;

        while let Some(line) = lines.recv().await {
            let line = line.map_err(RunnerError::Stream)?;
            if line.trim().is_empty() {
                trace!(run_id = %run_id, "Skipping blank output line");
                continue;
            }

            chunk_count += 1;
            let sanitized = self.sanitizer.sanitize(&line);
            log.append(&sanitized);
            trace!(
                run_id = %run_id,
                chunk = chunk_count,
                chunk_len = line.len(),
                log_len = log.as_str().len(),
                "Appended worker output"
            );

            if let Err(e) = sink.on_update(log.as_str()).await {
                warn!(run_id = %run_id, error = %e, "Display sink rejected log update");
            }
        }

        info!(run_id = %run_id, chunks = chunk_count, "Worker output closed (EOF)");
        Ok(())
    }
}

/// Clears the in-flight flag when the run ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn outcome_for(error: &RunnerError) -> RunOutcome {
    match error {
        RunnerError::Launch { .. } => RunOutcome::LaunchFailed,
        RunnerError::Stream(_) => RunOutcome::StreamFailed,
        _ => RunOutcome::Errored,
    }
}

/// Environment value of the privacy flag.
fn privacy_flag(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

fn write_description_file(description: &str) -> Result<NamedTempFile, RunnerError> {
    let mut file = tempfile::Builder::new()
        .prefix("appagent-task-")
        .suffix(".txt")
        .tempfile()
        .map_err(RunnerError::DescriptionFile)?;
    file.write_all(description.as_bytes())
        .and_then(|()| file.flush())
        .map_err(RunnerError::DescriptionFile)?;
    debug!(path = %file.path().display(), "Wrote task description file");
    Ok(file)
}

/// Decode one raw output line, normalizing CRLF endings.
fn decode_line(raw: &[u8]) -> String {
    let line = String::from_utf8_lossy(raw);
    match line.strip_suffix("\r\n") {
        Some(body) => format!("{}\n", body),
        None => line.into_owned(),
    }
}

/// Read the merged output line by line into `tx` until EOF or a read error.
///
/// Blocking; runs on the blocking pool.
fn forward_lines<R: Read>(reader: R, tx: mpsc::Sender<io::Result<String>>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("Worker output pipe closed (EOF)");
                break;
            }
            Ok(_) => {
                if tx.blocking_send(Ok(decode_line(&buf))).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Error reading worker output");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
}

async fn write_task(mut stdin: ChildStdin, payload: String) -> io::Result<()> {
    stdin.write_all(payload.as_bytes()).await?;
    stdin.flush().await?;
    // Dropping stdin closes the pipe and signals end of input.
    Ok(())
}

async fn wait_for_exit(child: &mut Child) -> Result<i32, RunnerError> {
    info!("Waiting for worker process to complete...");
    let status = child.wait().await.map_err(RunnerError::Wait)?;

    // No code means the worker was terminated by a signal.
    let exit_code = status.code().unwrap_or(-1);
    info!(exit_code, success = status.success(), "Worker process exited");
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::ChannelSink;
    use std::fs;

    #[test]
    fn test_privacy_flag_literals() {
        assert_eq!(privacy_flag(true), "true");
        assert_eq!(privacy_flag(false), "false");
    }

    #[test]
    fn test_description_file_removed_on_drop() {
        let file = write_description_file("open app and tap button").unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(fs::read_to_string(&path).unwrap(), "open app and tap button");

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"step1\r\n"), "step1\n");
        assert_eq!(decode_line(b"step1\n"), "step1\n");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"bad \xff\n"), "bad \u{FFFD}\n");
    }

    #[test]
    fn test_in_flight_guard() {
        let flag = AtomicBool::new(false);

        let guard = InFlightGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlightGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_forward_lines_keeps_order() {
        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(&b"one\ntwo\r\nthree"[..], tx);

        let mut lines = Vec::new();
        while let Some(line) = rx.blocking_recv() {
            lines.push(line.unwrap());
        }
        assert_eq!(lines, vec!["one\n", "two\n", "three"]);
    }

    #[test]
    fn test_forward_lines_reads_shared_pipe_in_write_order() {
        let (reader, mut writer) = os_pipe::pipe().unwrap();
        let mut errors = writer.try_clone().unwrap();
        writer.write_all(b"out0\n").unwrap();
        errors.write_all(b"err0\n").unwrap();
        writer.write_all(b"out1\n").unwrap();
        drop(writer);
        drop(errors);

        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(reader, tx);

        let mut lines = Vec::new();
        while let Some(line) = rx.blocking_recv() {
            lines.push(line.unwrap());
        }
        assert_eq!(lines, vec!["out0\n", "err0\n", "out1\n"]);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_partial_log() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(Ok("partial\n".to_string())).await.unwrap();
        tx.send(Err(io::Error::other("connection reset"))).await.unwrap();
        tx.send(Ok("never shown\n".to_string())).await.unwrap();
        drop(tx);

        let (sink, mut updates) = ChannelSink::new();
        let mut log = LogBuffer::new();
        let err = orchestrator
            .stream_output(&RunId::generate(), &mut rx, &sink, &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Stream(_)));
        assert_eq!(outcome_for(&err), RunOutcome::StreamFailed);
        assert_eq!(log.as_str(), "partial<br>");
        assert_eq!(updates.recv().await.unwrap(), "partial<br>");
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_outcome_for_errors() {
        let launch = RunnerError::Launch {
            program: "worker".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(outcome_for(&launch), RunOutcome::LaunchFailed);
        assert_eq!(outcome_for(&RunnerError::Busy), RunOutcome::Errored);
        assert_eq!(
            outcome_for(&RunnerError::OutputPipe(io::Error::other("no fds"))),
            RunOutcome::Errored
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = OrchestratorConfig::default();
        config.artifacts.image_pattern = "[".to_string();
        assert!(matches!(
            Orchestrator::new(config),
            Err(RunnerError::Pattern(_))
        ));
    }
}

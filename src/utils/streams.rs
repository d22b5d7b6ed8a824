// src/utils/streams.rs
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::config::defs::PipelineError;

/// Lines of stderr carried into a ToolExecution error.
const STDERR_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}


/// Drains a child stream line by line.
///
/// # Arguments
///
/// * `child` - Spawned child with the requested stream piped.
/// * `stream` - Which of stdout/stderr to read.
///
/// # Returns
/// All lines until EOF.
pub async fn read_child_output_to_vec(child: &mut Child, stream: ChildStream) -> Result<Vec<String>> {
    match stream {
        ChildStream::Stdout => {
            let out = child.stdout.take().ok_or_else(|| anyhow!("Child stdout not piped"))?;
            read_lines(out).await
        }
        ChildStream::Stderr => {
            let err = child.stderr.take().ok_or_else(|| anyhow!("Child stderr not piped"))?;
            read_lines(err).await
        }
    }
}

async fn read_lines<R: AsyncRead + Unpin>(reader: R) -> Result<Vec<String>> {
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    let mut collected = Vec::new();
    while let Some(line) = lines.next().await {
        collected.push(line?);
    }
    Ok(collected)
}


/// Spawns `program` (reported as `tool`) with stdout/stderr piped and stdin closed.
pub fn spawn_tool(tool: &str, program: &Path, args: &[String]) -> Result<Child, PipelineError> {
    debug!("{} {}", program.display(), args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!("Failed to spawn {}: {}. Is {} installed?", program.display(), e, tool),
        })
}


/// Runs a tool to completion and returns (stdout lines, stderr lines).
///
/// stderr is drained on its own task so a chatty tool cannot block on a full pipe.
/// A non-zero exit is returned as ToolExecution with the tail of stderr.
pub async fn run_tool_output(tool: &str, program: &Path, args: &[String]) -> Result<(Vec<String>, Vec<String>), PipelineError> {
    let exec_err = |e: anyhow::Error| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    };

    let mut child = spawn_tool(tool, program, args)?;

    let stderr = child.stderr.take().ok_or_else(|| exec_err(anyhow!("stderr not piped")))?;
    let err_task: JoinHandle<Result<Vec<String>>> = tokio::spawn(read_lines(stderr));

    let stdout_lines = read_child_output_to_vec(&mut child, ChildStream::Stdout)
        .await
        .map_err(exec_err)?;

    let status = child.wait().await.map_err(|e| exec_err(e.into()))?;

    let stderr_lines = err_task
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
        .map_err(exec_err)?;
    for line in &stderr_lines {
        debug!("[{}] {}", tool, line);
    }

    check_status(tool, status, &stderr_lines)?;
    Ok((stdout_lines, stderr_lines))
}


/// Runs an external tool to completion and returns its stdout lines.
///
/// # Arguments
///
/// * `tool` - Tool tag used in logs and errors, e.g. SAMTOOLS_TAG.
/// * `program` - Executable to launch, from RunConfig::program.
/// * `args` - Argument vector from utils::command::generate_cli.
/// * `description` - Human readable step name for the log.
pub async fn run_tool_capture(tool: &str, program: &Path, args: &[String], description: &str) -> Result<Vec<String>, PipelineError> {
    info!("Running: {}", description);
    let (stdout_lines, _) = run_tool_output(tool, program, args).await?;
    info!("Done: {}", description);
    Ok(stdout_lines)
}


/// Runs an external tool to completion, discarding its output.
pub async fn run_tool(tool: &str, program: &Path, args: &[String], description: &str) -> Result<(), PipelineError> {
    run_tool_capture(tool, program, args, description).await.map(|_| ())
}


fn check_status(tool: &str, status: ExitStatus, stderr_lines: &[String]) -> Result<(), PipelineError> {
    if status.success() {
        return Ok(());
    }
    let start = stderr_lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = stderr_lines[start..].join("\n");
    Err(PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("exited with {}{}", status, if tail.is_empty() { String::new() } else { format!(":\n{}", tail) }),
    })
}

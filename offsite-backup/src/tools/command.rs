//! Child process plumbing shared by every tool adapter.
//!
//! Children are spawned with `kill_on_drop`, so dropping a stage future on
//! cancellation also stops the tool it was waiting on.

use crate::utils::errors::ToolError;
use nix::unistd::{access, AccessFlags};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Lines of stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Where a tool's output lines end up in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Quiet,
    Debug,
    Info,
}

#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr_tail: Vec<String>,
}

/// Run `program` to completion. A non-zero exit becomes `ToolError::Failed`
/// carrying the tail of stderr.
pub async fn run<I, S>(
    program: &str,
    args: I,
    stdin: Option<&str>,
    echo: Echo,
) -> Result<CommandOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let input = child.stdin.take();
    let write_stdin = async move {
        if let (Some(mut pipe), Some(body)) = (input, stdin) {
            if let Err(e) = pipe.write_all(body.as_bytes()).await {
                debug!(tool = %program, error = %e, "Failed to write stdin");
            }
        }
    };

    let ((), stdout, stderr) = tokio::join!(
        write_stdin,
        read_lines(child.stdout.take(), program, echo, usize::MAX),
        read_lines(child.stderr.take(), program, echo, STDERR_TAIL_LINES),
    );

    let status = child.wait().await?;
    if !status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: status.to_string(),
            code: status.code(),
            stderr: stderr.join(" | "),
        });
    }

    Ok(CommandOutput {
        stdout: stdout.join("\n"),
        stderr_tail: stderr,
    })
}

async fn read_lines<R>(reader: Option<R>, program: &str, echo: Echo, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };

    // Raw bytes so a non-UTF-8 line does not stop the drain and leave the
    // child blocked or killed by SIGPIPE
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut kept = VecDeque::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(tool = %program, error = %e, "Output stream closed");
                break;
            }
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        match echo {
            Echo::Info => info!(tool = %program, "{}", line),
            Echo::Debug => debug!(tool = %program, "{}", line),
            Echo::Quiet => {}
        }
        if kept.len() == keep {
            kept.pop_front();
        }
        kept.push_back(line);
    }
    kept.into()
}

/// Resolve `program` the way a shell would: paths are checked as given,
/// bare names are searched on `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

pub fn require_executable(program: &str) -> Result<PathBuf, ToolError> {
    find_executable(program).ok_or_else(|| ToolError::NotFound {
        program: program.to_string(),
    })
}

fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;

use crate::model::CommitRecord;

/// `%H|%an|%ad|%s`: hash, author, date, subject. Only the subject may contain `|`.
const LOG_FORMAT: &str = "--pretty=format:%H|%an|%ad|%s";

/// Why no commit history could be produced. The `Display` text is the user-facing warning.
#[derive(Debug, Error)]
pub enum HistoryUnavailable {
    #[error("Git not installed.")]
    ToolMissing,

    #[error("No git history found. Maybe not a git repo? ({stderr})")]
    LogFailed { stderr: String },

    #[error("git log did not finish within {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Something that can list the commits of a working copy, most recent first.
pub trait HistorySource {
    fn commits(&self, dir: &Path) -> Result<Vec<CommitRecord>, HistoryUnavailable>;
}

/// Parse `git log` output in [`LOG_FORMAT`]. Lines without four fields are dropped.
pub fn parse_log_output(stdout: &str) -> Vec<CommitRecord> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.splitn(4, '|').collect();
            let [hash, author, date, message] = parts.as_slice() else {
                return None;
            };
            Some(CommitRecord {
                hash: hash.to_string(),
                author: author.to_string(),
                date: date.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}

/// Shells out to the `git` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct GitCli {
    pub timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Run `cmd` to completion on a private runtime, killing it if `timeout` expires first.
fn run_with_timeout(mut cmd: tokio::process::Command, timeout: Duration) -> Result<Output, HistoryUnavailable> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(HistoryUnavailable::Spawn)?;

    // Dropping the timed-out future drops the child, which kills it.
    let output = rt.block_on(async { tokio::time::timeout(timeout, cmd.output()).await });

    match output {
        Err(_) => Err(HistoryUnavailable::TimedOut {
            secs: timeout.as_secs(),
        }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(HistoryUnavailable::ToolMissing),
        Ok(Err(e)) => Err(HistoryUnavailable::Spawn(e)),
        Ok(Ok(o)) => Ok(o),
    }
}

impl HistorySource for GitCli {
    fn commits(&self, dir: &Path) -> Result<Vec<CommitRecord>, HistoryUnavailable> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C")
            .arg(dir)
            .args(["log", "--no-color", LOG_FORMAT, "--date=iso"]);

        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.status.success() {
            return Err(HistoryUnavailable::LogFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_log_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

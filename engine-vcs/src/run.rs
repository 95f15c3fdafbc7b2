//! Subprocess invocation of the `git` binary, for operations that must run
//! hooks or otherwise can't be expressed through `git2` alone (`rebase`,
//! `checkout`, `rebase --continue/--abort/--skip`, `push`). Every call is
//! wrapped in a timeout.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::error::VcsError;

/// How often the parent re-checks a still-running child against the
/// deadline.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Where to find the `git` executable and what working directory/environment
/// to run it in.
#[derive(Clone, Debug)]
pub struct GitRunInfo {
    pub path_to_git: PathBuf,
    pub env: HashMap<OsString, OsString>,
    pub timeout: Duration,
}

impl Default for GitRunInfo {
    fn default() -> Self {
        Self {
            path_to_git: PathBuf::from("git"),
            env: HashMap::new(),
            timeout: crate::types::DEFAULT_ADAPTER_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct GitRunResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Drains a child's output pipe to completion on a helper thread, so the
/// child can never block on a full pipe while the parent waits on it.
fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf);
        }
        buf
    })
}

impl GitRunInfo {
    /// Run `git` with `args` in `working_directory`, returning once the
    /// process exits or the configured timeout elapses. On timeout the child
    /// process is killed and `VcsError::Timeout` is returned; the engine
    /// never relies on the external tool terminating promptly.
    #[instrument(skip(self, args))]
    pub fn run(
        &self,
        working_directory: &Path,
        operation: &str,
        args: &[&OsStr],
    ) -> Result<GitRunResult, VcsError> {
        let mut command = Command::new(&self.path_to_git);
        command
            .current_dir(working_directory)
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // The child handle stays in the parent so a hung process can be
        // killed; the deadline is enforced by polling `try_wait` rather than
        // blocking on a non-cancellable `wait`.
        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VcsError::Timeout {
                    operation: operation.to_string(),
                });
            }
            thread::sleep(WAIT_POLL);
        };

        Ok(GitRunResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

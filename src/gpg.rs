use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::gnupg_ring;

/// Exit code gpg uses when `--list-key` finds no matching key.
pub const KEY_NOT_FOUND_EXIT_CODE: i32 = 2;

const LOCALE: &str = "C.UTF-8";

/// Captured result of one keyring tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Standard output followed by standard error.
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code with signal terminations reported as `-1`.
    pub fn status(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// The keyring operations the key manager needs from a GPG-compatible tool.
///
/// Implementations report non-zero exits through [`ToolOutput`] rather than
/// as errors, leaving interpretation to the caller. `Err` is reserved for
/// failures to run the tool at all.
#[async_trait]
pub trait KeyTool: Send + Sync {
    /// `--list-key <key_id>` against `keyring`.
    async fn list_key(&self, keyring: &Path, key_id: &str) -> Result<ToolOutput>;

    /// `--list-keys --with-colons` against `keyring`.
    async fn list_keys(&self, keyring: &Path, homedir: Option<&Path>) -> Result<ToolOutput>;

    /// `--import -` into `keyring`, with `key` fed on standard input.
    async fn import_key(
        &self,
        keyring: &Path,
        key: &[u8],
        homedir: Option<&Path>,
    ) -> Result<ToolOutput>;

    /// `--recv-keys <key_id>` from `key_server` into `keyring`.
    async fn receive_key(
        &self,
        homedir: &Path,
        keyring: &Path,
        key_server: &str,
        key_id: &str,
    ) -> Result<ToolOutput>;
}

/// [`KeyTool`] backed by the system `gpg` binary.
///
/// Every invocation starts with `--batch --no-default-keyring` and runs
/// with the locale forced to `C.UTF-8` so output stays parseable.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpg {
    /// Uses `gpg` from `PATH` with no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            timeout: None,
        }
    }

    /// Uses a custom gpg binary.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Bounds each invocation; the child is killed once `timeout` elapses.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("LANG", LOCALE)
            .env("LC_ALL", LOCALE)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv: Vec<OsString> = vec!["--batch".into(), "--no-default-keyring".into()];
        argv.extend(args.into_iter().map(Into::into));

        debug!(program = %self.program.display(), args = ?argv, "executing command");

        let mut cmd = self.base_command();
        cmd.args(argv);
        cmd
    }

    /// Runs gpg with the baseline options plus `args`, optionally feeding `stdin`.
    pub async fn run<I, S>(&self, args: I, stdin: Option<&[u8]>) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.execute(self.command(args), stdin).await
    }

    async fn execute(&self, mut cmd: Command, stdin: Option<&[u8]>) -> Result<ToolOutput> {
        let run = run_to_completion(&mut cmd, stdin);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => run.await,
        }
    }
}

async fn run_to_completion(cmd: &mut Command, stdin: Option<&[u8]>) -> Result<ToolOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn()?;

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(data).await?;
        pipe.shutdown().await?;
    }

    let output = child.wait_with_output().await?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ToolOutput {
        code: output.status.code(),
        output: combined,
    })
}

fn homedir_args(homedir: Option<&Path>) -> Vec<OsString> {
    match homedir {
        Some(dir) => vec!["--homedir".into(), dir.as_os_str().to_owned()],
        None => Vec::new(),
    }
}

#[async_trait]
impl KeyTool for Gpg {
    async fn list_key(&self, keyring: &Path, key_id: &str) -> Result<ToolOutput> {
        let ring = gnupg_ring(keyring);
        let args = ["--keyring", ring.as_str(), "--list-key", key_id];
        self.run(args, None).await
    }

    async fn list_keys(&self, keyring: &Path, homedir: Option<&Path>) -> Result<ToolOutput> {
        let ring = gnupg_ring(keyring);
        let mut args = homedir_args(homedir);
        args.extend(
            ["--keyring", ring.as_str(), "--list-keys", "--with-colons"].map(OsString::from),
        );
        self.run(args, None).await
    }

    async fn import_key(
        &self,
        keyring: &Path,
        key: &[u8],
        homedir: Option<&Path>,
    ) -> Result<ToolOutput> {
        let ring = gnupg_ring(keyring);
        let mut args = homedir_args(homedir);
        args.extend(["--keyring", ring.as_str(), "--import", "-"].map(OsString::from));
        self.run(args, Some(key)).await
    }

    async fn receive_key(
        &self,
        homedir: &Path,
        keyring: &Path,
        key_server: &str,
        key_id: &str,
    ) -> Result<ToolOutput> {
        let ring = gnupg_ring(keyring);
        let mut args = homedir_args(Some(homedir));
        args.extend(
            [
                "--keyring",
                ring.as_str(),
                "--keyserver",
                key_server,
                "--recv-keys",
                key_id,
            ]
            .map(OsString::from),
        );
        self.run(args, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_status() {
        let ok = ToolOutput {
            code: Some(0),
            output: String::new(),
        };
        assert!(ok.success());
        assert_eq!(ok.status(), 0);

        let killed = ToolOutput {
            code: None,
            output: String::new(),
        };
        assert!(!killed.success());
        assert_eq!(killed.status(), -1);
    }

    #[tokio::test]
    async fn test_run_missing_program_is_command_error() {
        let gpg = Gpg::with_program("/nonexistent/bin/gpg");
        let result = gpg.run(["--version"], None).await;
        assert!(matches!(result, Err(Error::Command(_))));
    }

    #[tokio::test]
    async fn test_run_prepends_baseline_options() {
        let result = Gpg::with_program("echo")
            .run(["--list-key", "DEADBEEF"], None)
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(
            result.output,
            "--batch --no-default-keyring --list-key DEADBEEF\n"
        );
    }

    fn script(gpg: &Gpg, body: &str) -> Command {
        let mut cmd = gpg.base_command();
        cmd.args(["-c", body]);
        cmd
    }

    #[tokio::test]
    async fn test_execute_merges_output_and_reports_exit_code() {
        let gpg = Gpg::with_program("sh");
        let result = gpg
            .execute(script(&gpg, "echo out; echo err >&2; exit 3"), None)
            .await
            .unwrap();
        assert_eq!(result.code, Some(3));
        assert_eq!(result.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_execute_feeds_stdin() {
        let gpg = Gpg::with_program("sh");
        let result = gpg
            .execute(script(&gpg, "cat"), Some(b"armored key material".as_slice()))
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.output, "armored key material");
    }

    #[tokio::test]
    async fn test_execute_forces_utf8_locale() {
        let gpg = Gpg::with_program("sh");
        let result = gpg
            .execute(script(&gpg, "printf '%s %s' \"$LANG\" \"$LC_ALL\""), None)
            .await
            .unwrap();
        assert_eq!(result.output, "C.UTF-8 C.UTF-8");
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let gpg = Gpg::with_program("sh").timeout(Some(Duration::from_millis(100)));
        let result = gpg.execute(script(&gpg, "sleep 5"), None).await;
        assert!(matches!(
            result,
            Err(Error::Timeout(limit)) if limit == Duration::from_millis(100)
        ));
    }
}

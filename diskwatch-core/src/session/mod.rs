//! SSH session establishment and remote command execution
//!
//! Sessions are backed by the OpenSSH client with connection multiplexing:
//! [`SshSession::connect`] starts a control master (authenticating once),
//! [`SshSession::execute`] runs commands over the established control
//! connection, and the session is torn down explicitly via
//! [`SshSession::close`] or implicitly on drop. Password authentication goes
//! through `sshpass -e` so the password never appears on the command line.

mod retry;

pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::config::{AuthMethod, ServerTarget};

/// Errors raised while establishing a session
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The server has neither a key file nor a password configured.
    /// This is a configuration problem, surfaced before any attempt is made.
    #[error("No authentication method configured for {host}")]
    NoAuthMethod {
        /// Target host
        host: String,
    },

    /// The remote host rejected the supplied credentials
    #[error("Authentication rejected by {host}")]
    AuthRejected {
        /// Target host
        host: String,
    },

    /// The connection attempt did not complete within the timeout
    #[error("Connection to {host} timed out after {secs}s")]
    Timeout {
        /// Target host
        host: String,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// A network or protocol failure during connection
    #[error("Connection to {host} failed: {detail}")]
    Transport {
        /// Target host
        host: String,
        /// Underlying failure detail
        detail: String,
    },

    /// All attempts in the retry budget failed
    #[error("Failed to connect to {host} after {attempts} attempts: {last}")]
    Exhausted {
        /// Target host
        host: String,
        /// Number of attempts made
        attempts: u32,
        /// Classified cause of the final attempt
        last: Box<ConnectError>,
    },
}

/// Errors raised while executing a command over an established session
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The ssh client process could not be spawned
    #[error("Failed to spawn ssh process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command did not complete within the timeout
    #[error("Command on {host} timed out after {secs}s")]
    Timeout {
        /// Target host
        host: String,
        /// Timeout in seconds
        secs: u64,
    },
}

/// Output of one remote command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// True iff the remote exit status was zero
    pub success: bool,
    /// Captured standard output, trimmed
    pub stdout: String,
    /// Captured standard error, trimmed
    pub stderr: String,
}

/// Fully resolved invocation of the ssh client
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandSpec {
    program: &'static str,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
}

impl CommandSpec {
    fn into_command(self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(self.program);
        cmd.args(self.args);
        for (key, value) in self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Classifies a failed connection attempt from the ssh client's stderr
fn classify_connect_failure(host: &str, stderr: &str) -> ConnectError {
    let auth_rejected = stderr.contains("Permission denied")
        || stderr.contains("Too many authentication failures")
        || stderr.contains("Authentication failed");
    if auth_rejected {
        ConnectError::AuthRejected {
            host: host.to_string(),
        }
    } else {
        ConnectError::Transport {
            host: host.to_string(),
            detail: stderr.trim().to_string(),
        }
    }
}

/// One authenticated SSH session to a single host
///
/// Owns an OpenSSH control master. The control connection is released on
/// [`close`](Self::close); a `Drop` impl performs best-effort teardown so the
/// master does not outlive the check on any exit path.
#[derive(Debug)]
pub struct SshSession {
    host: String,
    destination: String,
    control_path: PathBuf,
    timeout: Duration,
    closed: bool,
}

impl SshSession {
    /// Establishes one authenticated session to the target.
    ///
    /// Key-based authentication is used when a key file is configured,
    /// password authentication otherwise. The attempt is bounded by
    /// `timeout` both at the OpenSSH level (`ConnectTimeout`) and as an
    /// overall deadline on the spawned process.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NoAuthMethod`] when the target has no
    /// credentials, and a classified [`ConnectError`] for rejected
    /// authentication, timeouts, and transport failures.
    pub async fn connect(target: &ServerTarget, timeout: Duration) -> Result<Self, ConnectError> {
        let auth = target
            .auth_method()
            .ok_or_else(|| ConnectError::NoAuthMethod {
                host: target.host.clone(),
            })?;

        let destination = format!("{}@{}", target.user, target.host);
        let control_path = std::env::temp_dir().join(format!(
            "diskwatch-{}-{}.sock",
            std::process::id(),
            target.host
        ));

        let spec = Self::connect_spec(&auth, &destination, &control_path, timeout);
        tracing::debug!(host = %target.host, auth = auth_name(&auth), "Connecting");

        let output = match tokio::time::timeout(timeout, spec.into_command().output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConnectError::Transport {
                    host: target.host.clone(),
                    detail: format!("Failed to spawn ssh process: {e}"),
                });
            }
            Err(_) => {
                return Err(ConnectError::Timeout {
                    host: target.host.clone(),
                    secs: timeout.as_secs(),
                });
            }
        };

        if output.status.success() {
            tracing::info!(host = %target.host, "Session established");
            Ok(Self {
                host: target.host.clone(),
                destination,
                control_path,
                timeout,
                closed: false,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_connect_failure(&target.host, &stderr))
        }
    }

    /// Executes exactly one command over the established session.
    ///
    /// Never retries internally; retries apply only to session
    /// establishment, not command execution.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Timeout`] when the command does not finish in
    /// time and [`ExecError::Spawn`] when the ssh client cannot be started.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        tracing::debug!(host = %self.host, command, "Executing remote command");
        let spec = self.exec_spec(command);

        let output = tokio::time::timeout(self.timeout, spec.into_command().output())
            .await
            .map_err(|_| ExecError::Timeout {
                host: self.host.clone(),
                secs: self.timeout.as_secs(),
            })??;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if result.success {
            tracing::debug!(host = %self.host, "Command succeeded");
        } else {
            tracing::warn!(
                host = %self.host,
                status = %output.status,
                "Command exited with non-zero status"
            );
        }
        Ok(result)
    }

    /// Releases the session by stopping the control master.
    pub async fn close(mut self) {
        self.closed = true;
        let spec = close_spec(&self.destination, &self.control_path);
        let _ = spec.into_command().output().await;
        tracing::debug!(host = %self.host, "Session closed");
    }

    /// Target host this session is bound to
    pub fn host(&self) -> &str {
        &self.host
    }

    fn connect_spec(
        auth: &AuthMethod,
        destination: &str,
        control_path: &Path,
        timeout: Duration,
    ) -> CommandSpec {
        let mut args = Vec::new();
        let mut env = Vec::new();
        let program = match auth {
            AuthMethod::Password(password) => {
                // sshpass reads the password from SSHPASS with -e
                args.push("-e".to_string());
                args.push("ssh".to_string());
                env.push(("SSHPASS", password.expose_secret().to_string()));
                "sshpass"
            }
            AuthMethod::KeyFile(key_path) => {
                args.push("-o".to_string());
                args.push("BatchMode=yes".to_string());
                args.push("-i".to_string());
                args.push(key_path.clone());
                "ssh"
            }
        };
        args.extend(common_ssh_options(control_path, timeout));
        args.push("-o".to_string());
        args.push("ControlMaster=auto".to_string());
        args.push(destination.to_string());
        // No-op command; its only purpose is to authenticate and leave the
        // control master running.
        args.push("true".to_string());
        CommandSpec { program, args, env }
    }

    fn exec_spec(&self, command: &str) -> CommandSpec {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        args.extend(common_ssh_options(&self.control_path, self.timeout));
        args.push(self.destination.clone());
        args.push(command.to_string());
        CommandSpec {
            program: "ssh",
            args,
            env: Vec::new(),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Fire-and-forget teardown; ControlPersist expires the master anyway
        // if this fails.
        let spec = close_spec(&self.destination, &self.control_path);
        let mut cmd = std::process::Command::new(spec.program);
        cmd.args(spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let _ = cmd.spawn();
    }
}

fn common_ssh_options(control_path: &Path, timeout: Duration) -> Vec<String> {
    vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", timeout.as_secs().max(1)),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
        "-o".to_string(),
        "ControlPersist=60".to_string(),
    ]
}

fn close_spec(destination: &str, control_path: &Path) -> CommandSpec {
    CommandSpec {
        program: "ssh",
        args: vec![
            "-O".to_string(),
            "exit".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", control_path.display()),
            destination.to_string(),
        ],
        env: Vec::new(),
    }
}

fn auth_name(auth: &AuthMethod) -> &'static str {
    match auth {
        AuthMethod::KeyFile(_) => "key",
        AuthMethod::Password(_) => "password",
    }
}

/// Runs an establishment attempt up to the policy's budget.
///
/// Returns on the first successful attempt; attempts are strictly
/// sequential with no delay between them. The `attempt` callback receives
/// the 1-indexed attempt number.
///
/// # Errors
///
/// Returns [`ConnectError::Exhausted`] carrying the host identity, the
/// number of attempts made, and the final classified cause.
pub async fn with_retry<T, F, Fut>(
    host: &str,
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<T, ConnectError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ConnectError>>,
{
    let mut last: Option<ConnectError> = None;
    for attempt_number in 1..=policy.max_attempts() {
        match attempt(attempt_number).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(
                    host,
                    attempt = attempt_number,
                    max_attempts = policy.max_attempts(),
                    error = %err,
                    "Connection attempt failed"
                );
                last = Some(err);
            }
        }
    }

    let last = last.unwrap_or_else(|| ConnectError::Transport {
        host: host.to_string(),
        detail: "no attempt made".to_string(),
    });
    Err(ConnectError::Exhausted {
        host: host.to_string(),
        attempts: policy.max_attempts(),
        last: Box::new(last),
    })
}

/// Establishes a session with a bounded number of sequential attempts.
///
/// A target with no authentication method fails fast without consuming any
/// of the retry budget.
///
/// # Errors
///
/// Returns [`ConnectError::NoAuthMethod`] for unconfigured credentials and
/// [`ConnectError::Exhausted`] once all attempts have failed.
pub async fn connect_with_retry(
    target: &ServerTarget,
    policy: RetryPolicy,
    timeout: Duration,
) -> Result<SshSession, ConnectError> {
    if target.auth_method().is_none() {
        return Err(ConnectError::NoAuthMethod {
            host: target.host.clone(),
        });
    }
    with_retry(&target.host, policy, |_| SshSession::connect(target, timeout)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn target_with_key() -> ServerTarget {
        ServerTarget {
            host: "db1.example.com".to_string(),
            user: "admin".to_string(),
            key_file: Some("/tmp/id_rsa".to_string()),
            password: None,
            timeout: None,
        }
    }

    fn target_with_password() -> ServerTarget {
        ServerTarget {
            host: "db2.example.com".to_string(),
            user: "admin".to_string(),
            key_file: None,
            password: Some(SecretString::from("hunter2".to_string())),
            timeout: None,
        }
    }

    #[test]
    fn test_connect_spec_key_auth() {
        let target = target_with_key();
        let auth = target.auth_method().unwrap();
        let spec = SshSession::connect_spec(
            &auth,
            "admin@db1.example.com",
            &PathBuf::from("/tmp/cp.sock"),
            Duration::from_secs(10),
        );
        assert_eq!(spec.program, "ssh");
        assert!(spec.args.contains(&"-i".to_string()));
        assert!(spec.args.contains(&"/tmp/id_rsa".to_string()));
        assert!(spec.args.contains(&"BatchMode=yes".to_string()));
        assert!(spec.args.contains(&"ControlMaster=auto".to_string()));
        assert!(spec.args.contains(&"ConnectTimeout=10".to_string()));
        assert_eq!(spec.args.last(), Some(&"true".to_string()));
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_connect_spec_password_auth_uses_sshpass() {
        let target = target_with_password();
        let auth = target.auth_method().unwrap();
        let spec = SshSession::connect_spec(
            &auth,
            "admin@db2.example.com",
            &PathBuf::from("/tmp/cp.sock"),
            Duration::from_secs(5),
        );
        assert_eq!(spec.program, "sshpass");
        assert_eq!(spec.args[0], "-e");
        assert_eq!(spec.args[1], "ssh");
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.env[0].0, "SSHPASS");
        assert_eq!(spec.env[0].1, "hunter2");
        // Password auth must not force batch mode, sshpass needs the prompt
        assert!(!spec.args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn test_classify_auth_rejection() {
        let err = classify_connect_failure("h", "admin@h: Permission denied (publickey).");
        assert!(matches!(err, ConnectError::AuthRejected { .. }));
    }

    #[test]
    fn test_classify_transport_failure() {
        let err = classify_connect_failure("h", "ssh: connect to host h port 22: No route");
        match err {
            ConnectError::Transport { detail, .. } => assert!(detail.contains("No route")),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_budget() {
        let mut attempts = 0_u32;
        let result: Result<(), ConnectError> = with_retry("h", RetryPolicy::new(3), |n| {
            attempts += 1;
            assert_eq!(n, attempts);
            async {
                Err(ConnectError::Transport {
                    host: "h".to_string(),
                    detail: "refused".to_string(),
                })
            }
        })
        .await;

        assert_eq!(attempts, 3);
        match result.unwrap_err() {
            ConnectError::Exhausted {
                host,
                attempts,
                last,
            } => {
                assert_eq!(host, "h");
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ConnectError::Transport { .. }));
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_first_success() {
        let mut attempts = 0_u32;
        let result = with_retry("h", RetryPolicy::new(5), |_| {
            attempts += 1;
            let outcome = if attempts >= 2 {
                Ok(42)
            } else {
                Err(ConnectError::Timeout {
                    host: "h".to_string(),
                    secs: 1,
                })
            };
            async move { outcome }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_with_retry_single_attempt() {
        let mut attempts = 0_u32;
        let result = with_retry("h", RetryPolicy::new(1), |_| {
            attempts += 1;
            async { Ok(()) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_connect_without_auth_fails_fast() {
        let target = ServerTarget {
            host: "h".to_string(),
            user: "u".to_string(),
            key_file: None,
            password: None,
            timeout: None,
        };
        let err = connect_with_retry(&target, RetryPolicy::new(3), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::NoAuthMethod { .. }));
    }
}

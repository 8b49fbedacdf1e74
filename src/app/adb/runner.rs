use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::app::error::AppError;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined for classification; adb spreads failure
    /// detail across both streams depending on the subcommand.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout.trim(), self.stderr.trim())
    }

    /// Preferred single-line failure detail: stderr when present.
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

pub fn run_command(
    program: &str,
    args: &[String],
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    run_command_with_timeout(program, args, DEFAULT_COMMAND_TIMEOUT, trace_id)
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            AppError::system(format!("Failed to spawn {program}: {err}"), trace_id)
        })?;

    // Both pipes must be drained while the child runs; a chatty child
    // blocks once a pipe buffer fills and would then ride out the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_drain = drain_in_background(stdout);
    let stderr_drain = drain_in_background(stderr);

    let exit_code = match wait_with_timeout(&mut child, timeout) {
        Ok(code) => code,
        Err(err) => {
            let _ = stdout_drain.join();
            let _ = stderr_drain.join();
            return Err(match err {
                WaitError::TimedOut => AppError::system(
                    format!("{program} timed out after {}s", timeout.as_secs()),
                    trace_id,
                ),
                WaitError::Poll(detail) => {
                    AppError::system(format!("Failed to poll {program}: {detail}"), trace_id)
                }
            });
        }
    };

    let stdout_bytes = stdout_drain.join().unwrap_or_default();
    let stderr_bytes = stderr_drain.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

enum WaitError {
    TimedOut,
    Poll(String),
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<i32>, WaitError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(WaitError::TimedOut);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => return Err(WaitError::Poll(err.to_string())),
        }
    }
}

fn drain_in_background<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&chunk[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn large_stdout_does_not_deadlock_against_the_timeout() {
        // Emits well over a pipe buffer's worth of stdout; the command must
        // finish quickly instead of blocking until the timeout kills it.
        let args = vec![
            "-c".to_string(),
            "i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done".to_string(),
        ];
        let output =
            run_command_with_timeout("sh", &args, Duration::from_secs(10), "test-large-output")
                .expect("command should complete");
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[test]
    #[cfg(unix)]
    fn slow_command_is_killed_with_a_timeout_error() {
        let args = vec!["5".to_string()];
        let err = run_command_with_timeout("sleep", &args, Duration::from_millis(200), "test-slow")
            .unwrap_err();
        assert!(err.error.contains("timed out"), "{}", err.error);
    }

    #[test]
    #[cfg(unix)]
    fn chatty_then_stuck_command_still_times_out() {
        // Output is produced before the hang, so the drain threads are live
        // when the timeout fires and must be joined on the error path.
        let args = vec![
            "-c".to_string(),
            "echo some output; sleep 5".to_string(),
        ];
        let err = run_command_with_timeout("sh", &args, Duration::from_millis(200), "test-chatty")
            .unwrap_err();
        assert!(err.error.contains("timed out"), "{}", err.error);
    }

    #[test]
    fn missing_program_is_a_system_error() {
        let err = run_command("definitely-not-a-real-binary-7f3a", &[], "test-missing")
            .unwrap_err();
        assert_eq!(err.code, "ERR_SYSTEM");
    }

    #[test]
    fn detail_prefers_stderr() {
        let output = CommandOutput {
            stdout: "ignored\n".to_string(),
            stderr: " real problem \n".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(output.detail(), "real problem");
        let output = CommandOutput {
            stdout: "only stdout".to_string(),
            stderr: String::new(),
            exit_code: Some(1),
        };
        assert_eq!(output.detail(), "only stdout");
    }
}

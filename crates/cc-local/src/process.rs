use std::io::{self, Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Kill and reap, ignoring a child that already exited.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Run a command, capturing its output. A command still running after
/// `timeout_secs` is killed and reported as `TimedOut`.
pub fn run_with_timeout(mut cmd: Command, timeout_secs: u64) -> io::Result<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());
    let mut child = cmd.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                reap(&mut child);
                return Err(io::Error::new(io::ErrorKind::TimedOut, format!("command timed out after {}s", timeout_secs)));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                reap(&mut child);
                return Err(e);
            }
        }
    };
    Ok(Output { status, stdout: stdout.join().unwrap_or_default(), stderr: stderr.join().unwrap_or_default() })
}

/// Spawn `cmd`, write `input` to its stdin and wait for it to exit. If the
/// write fails the child is killed before the error is returned.
pub fn pipe_into(mut cmd: Command, input: &str) -> io::Result<Output> {
    cmd.stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            drop(stdin);
            reap(&mut child);
            return Err(e);
        }
    }
    child.wait_with_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn is_running(pid_file: &Path) -> bool {
        let pid = fs::read_to_string(pid_file).expect("pid file");
        Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; echo oops >&2"]);
        let out = run_with_timeout(cmd, 5).expect("run");
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "oops");
    }

    #[test]
    fn timed_out_child_is_killed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("pid");
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &format!("echo $$ > {}; exec sleep 30", pid_file.display())]);

        let started = Instant::now();
        let err = run_with_timeout(cmd, 1).expect_err("should time out");
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!is_running(&pid_file));
    }

    #[test]
    fn pipes_stdin() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat > /dev/null"]);
        let out = pipe_into(cmd, "payload").expect("pipe");
        assert!(out.status.success());
    }

    #[test]
    fn failed_write_kills_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("pid");
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &format!("echo $$ > {}; exec 0<&-; exec sleep 30", pid_file.display())]);

        let started = Instant::now();
        let input = "x".repeat(1 << 20);
        let err = pipe_into(cmd, &input).expect_err("stdin closed");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!is_running(&pid_file));
    }
}

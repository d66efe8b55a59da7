//! Runs the `licensegate` binary: exit codes, CLI overrides, shutdown.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

#[cfg(unix)]
use std::io::{BufRead, BufReader};
#[cfg(unix)]
use std::process::{Child, Stdio};
#[cfg(unix)]
use std::time::{Duration, Instant};

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_licensegate"))
}

/// Config with nothing reachable: no authority, no-op lifecycle, no delay
/// unless `extra` sets one.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let extra = if extra.contains("startup_delay_ms") {
        extra.to_string()
    } else {
        format!("startup_delay_ms = 0\n{}", extra)
    };
    let path = dir.join("licensegate.toml");
    let config = format!(
        r#"
authority_base_url = "http://127.0.0.1:9/backend_api"
authority_timeout_ms = 1000
license_file_path = "{license}"
lifecycle = "none"
listen_addr = "127.0.0.1:0"
upstream_url = "http://127.0.0.1:9"
{extra}
"#,
        license = dir.join("license.lic").display(),
        extra = extra,
    );
    std::fs::write(&path, config).unwrap();
    path
}

fn command(config: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(binary());
    command
        .env("RUST_LOG", "info")
        .arg("--config")
        .arg(config)
        .args(args);
    command
}

fn run(config: &Path, args: &[&str]) -> Output {
    command(config, args).output().unwrap()
}

fn logs(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn agent_exits_1_when_license_file_missing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&config, &["agent"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("License file not found"));
}

#[test]
fn agent_exits_1_when_license_file_empty() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    std::fs::write(dir.path().join("license.lic"), "").unwrap();

    let output = run(&config, &["agent"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    let logs = logs(&output);
    assert!(logs.contains("License file malformed"));
    assert!(!logs.contains("Licensing authority unreachable"));
}

#[test]
fn agent_exits_1_when_authority_unreachable() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    std::fs::write(dir.path().join("license.lic"), "KEY-1\ninstance-a\n").unwrap();

    let output = run(&config, &["agent"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("Licensing authority unreachable"));
}

#[test]
fn license_file_override_wins_over_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    std::fs::write(dir.path().join("license.lic"), "KEY-1\ninstance-a\n").unwrap();
    let elsewhere = dir.path().join("other.lic");

    let output = run(
        &config,
        &["--license-file", elsewhere.to_str().unwrap(), "agent"],
    );

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    let logs = logs(&output);
    assert!(logs.contains("License file not found"));
    assert!(logs.contains("other.lic"));
}

#[test]
fn authority_url_override_is_used() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&config, &["--authority-url", "not a url", "agent"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("authority_base_url"));
}

#[test]
fn bad_listen_override_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&config, &["gateway", "--listen", "localhost"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("listen_addr"));
}

#[test]
fn bad_upstream_override_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&config, &["gateway", "--upstream", "ftp://backend"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("upstream_url"));
}

#[test]
fn unknown_config_field_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "check_intervall_ms = 5");

    let output = run(&config, &["agent"]);

    assert_eq!(output.status.code(), Some(1), "{}", logs(&output));
    assert!(logs(&output).contains("Invalid TOML"));
}

/// Wait for a log line containing `marker` on the child's stdout.
#[cfg(unix)]
fn wait_for_line(child: &mut Child, marker: &str) {
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next() {
            Some(Ok(line)) if line.contains(marker) => break,
            Some(Ok(_)) => continue,
            _ => panic!("process exited before logging {:?}", marker),
        }
    }
    // Keep draining so the child never blocks on a full pipe.
    std::thread::spawn(move || for _ in lines {});
}

#[cfg(unix)]
fn terminate_and_wait(child: &mut Child) -> std::process::ExitStatus {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("process did not exit after SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(unix)]
#[test]
fn agent_exits_0_on_sigterm() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "startup_delay_ms = 600000");

    let mut child = command(&config, &["agent"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    wait_for_line(&mut child, "License agent started");

    let status = terminate_and_wait(&mut child);
    assert_eq!(status.code(), Some(0));
}

#[cfg(unix)]
#[test]
fn gateway_exits_0_on_sigterm() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let mut child = command(&config, &["gateway"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    wait_for_line(&mut child, "Gateway listening");

    let status = terminate_and_wait(&mut child);
    assert_eq!(status.code(), Some(0));
}

#![cfg(unix)]

mod common;

use common::{spawn_mock, start_mock, wait_until, MockServer, ECHO_BODY};
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const PROXY_VARS: [&str; 8] = [
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

fn sieve() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_proxy-sieve"));
    for var in PROXY_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--quiet").stdin(Stdio::null()).kill_on_drop(true);
    cmd
}

async fn send_signal(pid: u32, signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(pid.to_string())
        .status()
        .await
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn exits_non_zero_when_no_candidates_are_found() {
    let broken = spawn_mock(Some((500, "", Duration::ZERO))).await;

    let output = sieve()
        .arg("-t")
        .arg("5")
        .arg("-s")
        .arg(format!("http://127.0.0.1:{broken}/list.txt"))
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no proxy candidates"), "stderr: {stderr}");
}

async fn interrupted_run_keeps_confirmed_proxies(signal: &str) {
    let mut working: Vec<MockServer> = Vec::new();
    for _ in 0..3 {
        working.push(start_mock(Some((200, ECHO_BODY, Duration::ZERO))).await);
    }
    let hanging = start_mock(None).await;

    let mut list: String = working
        .iter()
        .map(|proxy| format!("127.0.0.1:{}\n", proxy.port))
        .collect();
    list.push_str(&format!("127.0.0.1:{}\n", hanging.port));
    let source = spawn_mock(Some((200, list.as_str(), Duration::ZERO))).await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("working.txt");
    let mut child = sieve()
        .arg("-t")
        .arg("30")
        .arg("-c")
        .arg("8")
        .arg("-o")
        .arg(&out)
        .arg("-s")
        .arg(format!("http://127.0.0.1:{source}/list.txt"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let reached = wait_until(Duration::from_secs(10), || {
        working.iter().all(|proxy| proxy.hits() >= 1) && hanging.hits() >= 1
    })
    .await;
    assert!(reached, "run never reached the hanging candidate");
    tokio::time::sleep(Duration::from_millis(300)).await;

    send_signal(child.id().unwrap(), signal).await;
    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("process kept running after the signal")
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let content = std::fs::read_to_string(&out).unwrap();
    let saved: HashSet<String> = content.lines().map(str::to_string).collect();
    let expected: HashSet<String> = working
        .iter()
        .map(|proxy| format!("http://127.0.0.1:{}", proxy.port))
        .collect();
    assert_eq!(content.lines().count(), 3);
    assert_eq!(saved, expected);
}

#[tokio::test]
async fn sigint_saves_confirmed_proxies_and_exits_zero() {
    interrupted_run_keeps_confirmed_proxies("INT").await;
}

#[tokio::test]
async fn sigterm_saves_confirmed_proxies_and_exits_zero() {
    interrupted_run_keeps_confirmed_proxies("TERM").await;
}

#[tokio::test]
async fn sigint_while_fetching_leaves_output_untouched() {
    let source = start_mock(None).await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("working.txt");
    std::fs::write(&out, "http://10.0.0.1:8080\n").unwrap();

    let mut child = sieve()
        .arg("-t")
        .arg("30")
        .arg("-o")
        .arg(&out)
        .arg("-s")
        .arg(format!("http://127.0.0.1:{}/list.txt", source.port))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let fetching = wait_until(Duration::from_secs(10), || source.hits() >= 1).await;
    assert!(fetching, "source was never requested");

    send_signal(child.id().unwrap(), "INT").await;
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("fetch was not interrupted")
        .unwrap();
    assert_eq!(status.code(), Some(0));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "http://10.0.0.1:8080\n");
}

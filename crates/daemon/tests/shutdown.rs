//! Daemon process lifecycle

#![cfg(unix)]

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[test]
fn test_interrupt_exits_while_stdin_is_open() {
    let mut daemon = Command::new(env!("CARGO_BIN_EXE_reconbridge-daemon"))
        .env_remove("RECONBRIDGE_CONFIG")
        .env("RUST_LOG", "info")
        .env("RECONBRIDGE_LOG_FORMAT", "json")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Held until the end, so the daemon never sees EOF
    let stdin = daemon.stdin.take().unwrap();
    let mut logs = BufReader::new(daemon.stderr.take().unwrap()).lines();

    let ready = logs
        .by_ref()
        .map_while(Result::ok)
        .any(|line| line.contains("System ready"));
    assert!(ready, "daemon exited before becoming ready");
    std::thread::spawn(move || logs.for_each(drop));

    // Let the bus install its signal handler
    std::thread::sleep(Duration::from_millis(300));
    let status = Command::new("kill")
        .args(["-INT", &daemon.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let started = Instant::now();
    let exited = loop {
        if let Some(status) = daemon.try_wait().unwrap() {
            break Some(status);
        }
        if started.elapsed() > Duration::from_secs(5) {
            break None;
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    if exited.is_none() {
        let _ = daemon.kill();
        let _ = daemon.wait();
    }
    drop(stdin);
    assert!(exited.is_some(), "daemon still running 5s after SIGINT");
}

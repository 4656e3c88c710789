//! Stub tools for end-to-end tests
//!
//! Each stub is a small shell script dropped into a temp dir under the
//! binary name the adapter expects.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reconbridge_infra_system::SubprocessRunner;
use reconbridge_core::port::ProcessRunner;

pub fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn read_pid(path: &Path) -> u32 {
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

/// Wait up to two seconds for `pid` to disappear
pub async fn wait_until_gone(runner: &SubprocessRunner, pid: u32) -> bool {
    for _ in 0..40 {
        if !runner.is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Wait up to two seconds for a file to show up
pub async fn wait_for_file(path: &Path) -> bool {
    for _ in 0..40 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=VCAM_HOST_VERSION");

    // Packagers may pin the version
    let version = std::env::var("VCAM_HOST_VERSION").unwrap_or_else(|_| build_version());
    println!("cargo::rustc-env=BUILD_VERSION={version}");
}

/// Package version with the commit appended when built from git
///
/// "0.1.0-abcdef1" on a release tag, "0.1.0-dirty-abcdef1" after it, and
/// the bare package version outside of a checkout.
fn build_version() -> String {
    let package = env!("CARGO_PKG_VERSION");
    let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) else {
        return package.to_string();
    };

    match git(&["describe", "--tags", "--exact-match", "--match", "v*"]) {
        Some(tag) => format!("{}-{hash}", tag.strip_prefix('v').unwrap_or(&tag)),
        None => format!("{package}-dirty-{hash}"),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

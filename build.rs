//! Embeds the git hash and commit date of the build into the binary.
//!
//! Exposed to the crate as `FLUXREAD_GIT_HASH` and `FLUXREAD_GIT_DATE`.
//! Builds outside a git checkout fall back to `dev` and the build time.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn main() {
    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "dev".to_string());
    let date = git(&["log", "-1", "--format=%cd", "--date=iso"]).unwrap_or_else(|| {
        // Unix seconds; the version module accepts numeric timestamps too
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_default()
    });

    println!("cargo:rustc-env=FLUXREAD_GIT_HASH={hash}");
    println!("cargo:rustc-env=FLUXREAD_GIT_DATE={date}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
}

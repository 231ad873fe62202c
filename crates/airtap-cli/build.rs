use std::env;
use std::process::Command;

/// Emits `AIRTAP_LONG_VERSION` for `airtap --version`: package version, commit,
/// commit date and whether live capture is compiled in.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");

    let commit = env::var("GITHUB_SHA")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| git(&["rev-parse", "HEAD"]))
        .map(|full| full.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());
    let date = git(&["log", "-1", "--format=%cs"]).unwrap_or_else(|| "unknown".to_string());
    let live = if env::var_os("CARGO_FEATURE_LIVE").is_some() {
        "live capture enabled"
    } else {
        "replay only"
    };
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();

    println!("cargo:rustc-env=AIRTAP_LONG_VERSION={version} ({commit} {date}, {live})");
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

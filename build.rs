use std::process::Command;

/// Run a git command and return its trimmed stdout when it succeeds.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    // Prefer HARDN_VERSION env var if set (e.g., by a release workflow),
    // otherwise fall back to git describe for local development builds.
    if let Ok(version) = std::env::var("HARDN_VERSION") {
        println!("cargo:rustc-env=HARDN_VERSION={version}");
    } else {
        let version = git(&["describe", "--tags", "--always", "--dirty"])
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        println!("cargo:rustc-env=HARDN_VERSION={version}");
    }

    let commit = std::env::var("HARDN_COMMIT")
        .ok()
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=HARDN_COMMIT={commit}");

    let build_date = std::env::var("HARDN_BUILD_DATE").unwrap_or_else(|_| {
        chrono_free_date().unwrap_or_else(|| "unknown".to_string())
    });
    println!("cargo:rustc-env=HARDN_BUILD_DATE={build_date}");

    // Re-run if git HEAD changes or env vars change
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=HARDN_VERSION");
    println!("cargo:rerun-if-env-changed=HARDN_COMMIT");
    println!("cargo:rerun-if-env-changed=HARDN_BUILD_DATE");
}

/// Build scripts cannot use the crate's dependencies, so ask `date` instead.
fn chrono_free_date() -> Option<String> {
    let output = Command::new("date").args(["-u", "+%Y-%m-%d"]).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

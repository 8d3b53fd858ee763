use std::process::Command;

/// Short git hash of the build, `unknown` outside a checkout.
fn git_hash() -> String {
    let Some(output) = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
    else {
        return "unknown".to_string();
    };

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let dirty = Command::new("git")
        .args(["diff", "--quiet"])
        .status()
        .map(|s| !s.success())
        .unwrap_or(false);

    if dirty { format!("{}-dirty", hash) } else { hash }
}

fn main() {
    // Reported by GET /api/v1/health
    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}

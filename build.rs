use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=NODE_COMMIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");

    if let Ok(sha) = env::var("NODE_COMMIT_SHA") {
        println!("cargo:rustc-env=NODE_COMMIT_SHA={sha}");
        return;
    }

    // Builds outside a git checkout (crate tarballs, vendored sources) get "unset".
    let sha = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unset".to_string());

    println!("cargo:rustc-env=NODE_COMMIT_SHA={sha}");
}

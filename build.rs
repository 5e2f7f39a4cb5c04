// RustLiveCaption - Build Script
//
// Emits ESP-IDF environment and version info before compilation.

use std::process::Command;

fn main() {
    // ESP-IDF environment setup (MUST be first!). Host builds skip it.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    // Get git version info
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=VERSION_STRING=LiveCaption v{}-g{}", version, git_hash);

    // Build-time Wi-Fi/server defaults
    println!("cargo:rerun-if-env-changed=CAPTION_SSID");
    println!("cargo:rerun-if-env-changed=CAPTION_PASSWORD");
    println!("cargo:rerun-if-env-changed=CAPTION_SERVER");

    // Rebuild if git HEAD changes
    println!("cargo:rerun-if-changed=.git/HEAD");
}

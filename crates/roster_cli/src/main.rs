//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `roster_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    // Why: keep a tiny CLI probe to validate core crate wiring independently
    // from any embedding UI runtime.
    println!("roster_core ping={}", roster_core::ping());
    println!("roster_core version={}", roster_core::core_version());
    println!(
        "roster_core schema_version={}",
        roster_core::db::migrations::latest_version()
    );
}

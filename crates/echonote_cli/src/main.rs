//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `echonote_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    // Why: keep a tiny CLI probe to validate core crate wiring independently
    // from the mobile runtime setup.
    println!("echonote_core ping={}", echonote_core::ping());
    println!("echonote_core version={}", echonote_core::core_version());
    println!(
        "echonote_core latest_schema_version={}",
        echonote_core::latest_version()
    );
}

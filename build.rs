//! Build script for rulepipe
//!
//! Embeds the version and target triple for `rulepipe --version` style
//! diagnostics.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(version) = env::var("CARGO_PKG_VERSION") {
        println!("cargo:rustc-env=RULEPIPE_VERSION={}", version);
    }

    if let Ok(target) = env::var("TARGET") {
        println!("cargo:rustc-env=RULEPIPE_TARGET={}", target);
    }
}

//! Build script for awslbc-infra
//!
//! Reads the pinned controller image and CRD ref from the workspace
//! `versions.toml` and exposes them as compile-time environment variables.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Versions {
    controller: Controller,
    crds: Crds,
}

#[derive(Debug, Deserialize)]
struct Controller {
    image: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct Crds {
    #[serde(rename = "ref")]
    git_ref: String,
    base_url: String,
}

fn main() {
    let manifest_dir =
        std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR should be set");
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .and_then(|p| p.parent())
        .expect("crate should live two levels below the workspace root");

    let versions_path = workspace_root.join("versions.toml");
    println!("cargo:rerun-if-changed={}", versions_path.display());
    println!("cargo:rerun-if-changed=assets");

    let content = std::fs::read_to_string(&versions_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", versions_path.display(), e));
    let versions: Versions = toml::from_str(&content).expect("versions.toml should be valid TOML");

    println!(
        "cargo:rustc-env=CONTROLLER_IMAGE={}:{}",
        versions.controller.image, versions.controller.version
    );
    println!(
        "cargo:rustc-env=CONTROLLER_VERSION={}",
        versions.controller.version
    );
    println!("cargo:rustc-env=CRD_REF={}", versions.crds.git_ref);
    println!(
        "cargo:rustc-env=CRD_BASE_URL={}",
        versions.crds.base_url.trim_end_matches('/')
    );
}

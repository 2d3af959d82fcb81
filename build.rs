use anyhow::{Context, Result};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "iec61937";

fn main() -> Result<()> {
    // Generate git information
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Reproducible builds pin the timestamp
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val
                .parse::<i64>()
                .context("SOURCE_DATE_EPOCH is not an integer")?;
            chrono::Utc
                .timestamp_opt(secs, 0)
                .single()
                .context("SOURCE_DATE_EPOCH is out of range")?
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let version = library_version_from_metadata().unwrap_or_else(|_| {
        read_library_version_fallback().unwrap_or_else(|_| "unknown".to_string())
    });
    println!("cargo:rustc-env=IEC61937_VERSION={version}");
    println!("cargo:rerun-if-changed={LIBRARY}/Cargo.toml");

    Ok(())
}

/// Library version from `cargo metadata`, for both path and registry dependencies.
fn library_version_from_metadata() -> Result<String> {
    let output = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let from_packages = metadata["packages"].as_array().and_then(|packages| {
        packages
            .iter()
            .find(|package| package["name"].as_str() == Some(LIBRARY))
            .and_then(|package| package["version"].as_str())
    });
    if let Some(version) = from_packages {
        return Ok(version.to_string());
    }

    // Node ids look like "iec61937 0.1.0 (registry+...)"
    let from_resolve = metadata["resolve"]["nodes"].as_array().and_then(|nodes| {
        nodes
            .iter()
            .filter_map(|node| node["id"].as_str())
            .find_map(|id| {
                let mut parts = id.split(' ');
                (parts.next() == Some(LIBRARY))
                    .then(|| parts.next())
                    .flatten()
            })
    });
    match from_resolve {
        Some(version) => Ok(version.to_string()),
        None => anyhow::bail!("{LIBRARY} package not found in metadata"),
    }
}

fn read_library_version_fallback() -> Result<String> {
    let toml_content = fs::read_to_string(format!("{LIBRARY}/Cargo.toml"))?;

    toml_content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("version"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .with_context(|| format!("Could not find version in {LIBRARY}/Cargo.toml"))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scaffold writer for the `example` command.
//!
//! Grounded on `netcfgbu/cli/example.py::copy_example_files`, which copies a
//! package-bundled `examples/` directory into the current working directory.
//! Rust has no runtime package-resource directory to copy from, so the two
//! starter files are embedded at compile time with `include_str!` instead.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

const EXAMPLE_CONFIG: &str = include_str!("../demos/netcfgbu.example.yaml");
const EXAMPLE_INVENTORY: &str = include_str!("../demos/inventory.example.csv");

/// Writes `netcfgbu.example.yaml` and `inventory.example.csv` into `dir`,
/// refusing to overwrite files that already exist.
pub fn write_into(dir: &Path) -> Result<()> {
    write_one(dir, "netcfgbu.example.yaml", EXAMPLE_CONFIG)?;
    write_one(dir, "inventory.example.csv", EXAMPLE_INVENTORY)?;
    Ok(())
}

fn write_one(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    if path.exists() {
        bail!("refusing to overwrite existing file: {}", path.display());
    }
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(file = %path.display(), "wrote example file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn writes_both_example_files() {
        let dir = tempdir().expect("tmp dir");
        write_into(dir.path()).expect("write");
        assert!(dir.path().join("netcfgbu.example.yaml").is_file());
        assert!(dir.path().join("inventory.example.csv").is_file());
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempdir().expect("tmp dir");
        write_into(dir.path()).expect("write");
        assert!(write_into(dir.path()).is_err());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CSV-backed host inventory loading.
//!
//! Grounded on `netcfgbu/filetypes.py::CommentedCsvReader` (comment-row
//! skipping) and `netcfgbu/inventory.py::load`.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, bail};

use crate::inventory::filter::{FilterMode, build_filter};

/// A single inventory record. Field set is inventory-defined; the loader
/// only requires `host` to be present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Host {
    pub fields: BTreeMap<String, String>,
}

impl Host {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The address to dial: `ipaddr` if present, else `host`.
    pub fn dial_target(&self) -> Option<&str> {
        self.field("ipaddr").or_else(|| self.field("host"))
    }

    pub fn name(&self) -> &str {
        self.field("host")
            .or_else(|| self.field("ipaddr"))
            .unwrap_or("")
    }

    pub fn os_name(&self) -> &str {
        self.field("os_name").unwrap_or_default()
    }
}

/// Reads every non-comment row of a CSV inventory file into [`Host`] records.
/// A row is a comment when its first column starts with `#`, mirroring
/// `CommentedCsvReader`.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Host>> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("inventory file does not exist: {}", path.display());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open inventory file {}", path.display()))?;

    let headers = reader.headers()?.clone();
    ensure_has_host_column(&headers)?;

    let mut hosts = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.get(0).is_some_and(|first| first.starts_with('#')) {
            continue;
        }
        let mut fields = BTreeMap::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            if !value.is_empty() {
                fields.insert(key.to_string(), value.to_string());
            }
        }
        hosts.push(Host { fields });
    }

    Ok(hosts)
}

fn ensure_has_host_column(headers: &csv::StringRecord) -> Result<()> {
    if headers.iter().any(|h| h == "host") {
        Ok(())
    } else {
        bail!("inventory file is missing required 'host' column")
    }
}

pub fn field_names(hosts: &[Host]) -> Vec<String> {
    let mut names: Vec<String> = hosts
        .iter()
        .flat_map(|h| h.fields.keys().cloned())
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Loads and filters an inventory file the way `netcfgbu/inventory.py::load`
/// does: limits (include) applied first, then excludes.
pub fn load<P: AsRef<Path>>(
    path: P,
    limits: &[String],
    excludes: &[String],
) -> Result<Vec<Host>> {
    let mut hosts = read_csv(path)?;
    let names = field_names(&hosts);

    if !limits.is_empty() {
        let filter = build_filter(limits, &names, FilterMode::Include)?;
        hosts.retain(|h| filter(h));
    }
    if !excludes.is_empty() {
        let filter = build_filter(excludes, &names, FilterMode::Exclude)?;
        hosts.retain(|h| filter(h));
    }

    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("tmp file");
        f.write_all(contents.as_bytes()).expect("write");
        f
    }

    #[test]
    fn skips_comment_rows() {
        let f = write_csv(
            "host,os_name\n#disabled.example,eos\nswitch1,eos\nswitch2,ios\n",
        );
        let hosts = read_csv(f.path()).expect("read");
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].name(), "switch1");
    }

    #[test]
    fn missing_host_column_is_rejected() {
        let f = write_csv("ipaddr\n10.0.0.1\n");
        assert!(read_csv(f.path()).is_err());
    }

    #[test]
    fn load_applies_limits_then_excludes() {
        let f = write_csv(
            "host,os_name\nsw1,eos\nsw2,ios\nsw3,eos\n",
        );
        let hosts = load(
            f.path(),
            &["os_name=eos".to_string()],
            &["host=sw3".to_string()],
        )
        .expect("load");
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name(), "sw1");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Inventory constraint grammar and the include/exclude composition law.
//!
//! Grounded on `netcfgbu/filtering.py`. The composition law below is taken
//! from the actual boolean algebra of `create_filter_function` /
//! `create_filter`, verified against `tests/test_filtering.py`'s vectors
//! rather than inventory-filter prose summaries, which turn out to describe
//! the same law less precisely:
//!
//! - `include` mode keeps a record iff **every** constraint matches (AND).
//! - `exclude` mode keeps a record iff **no** constraint matches (NOR).

use std::{net::IpAddr, path::Path, str::FromStr};

use anyhow::{Context, Result, bail};
use ipnet::IpNet;
use regex::Regex;

use crate::inventory::loader::Host;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Include,
    Exclude,
}

enum Constraint {
    Regex { field: String, regex: Regex },
    IpNet { field: String, net: IpNet },
    HostFile { hosts: Vec<String> },
}

impl Constraint {
    fn matches(&self, host: &Host) -> bool {
        match self {
            Constraint::Regex { field, regex } => host
                .field(field)
                .is_some_and(|value| regex.is_match(value)),
            Constraint::IpNet { field, net } => host
                .field(field)
                .and_then(|value| IpAddr::from_str(value).ok())
                .is_some_and(|ip| net.contains(&ip)),
            Constraint::HostFile { hosts } => {
                host.field("host").is_some_and(|h| hosts.iter().any(|x| x == h))
            },
        }
    }
}

/// Parses one `<field>=<value>`, `@<file>.csv`, or bare IP/CIDR constraint.
fn parse_constraint(constraint: &str, field_names: &[String]) -> Result<Constraint> {
    if let Some(path) = constraint.strip_prefix('@') {
        return parse_host_file(path);
    }

    let (field, value) = constraint
        .split_once('=')
        .with_context(|| format!("Invalid filter expression: {constraint}"))?;

    if !field_names.iter().any(|f| f == field) {
        bail!("Invalid filter expression: {constraint}");
    }

    if field.eq_ignore_ascii_case("ipaddr") {
        if let Ok(net) = parse_ip_or_cidr(value) {
            return Ok(Constraint::IpNet {
                field: field.to_string(),
                net,
            });
        }
    }

    let regex = Regex::new(&format!("(?i)^{value}$"))
        .with_context(|| format!("Invalid filter regular-expression: {value:?}"))?;
    Ok(Constraint::Regex {
        field: field.to_string(),
        regex,
    })
}

fn parse_ip_or_cidr(value: &str) -> Result<IpNet> {
    if let Ok(net) = value.parse::<IpNet>() {
        return Ok(net);
    }
    let ip: IpAddr = value.parse()?;
    Ok(IpNet::new(ip, if ip.is_ipv4() { 32 } else { 128 })?)
}

fn parse_host_file(path: &str) -> Result<Constraint> {
    if !path.ends_with(".csv") {
        bail!("File '{path}' not a CSV file. Only CSV files are supported.");
    }
    if !Path::new(path).exists() {
        bail!("File not found: {path}");
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open filter file {path}"))?;

    let headers = reader.headers()?.clone();
    let host_idx = headers
        .iter()
        .position(|h| h == "host")
        .with_context(|| format!("File '{path}' does not contain host content as expected"))?;

    let mut hosts = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(host_idx) {
            if !value.is_empty() {
                hosts.push(value.to_string());
            }
        }
    }

    Ok(Constraint::HostFile { hosts })
}

/// Builds a predicate over host records implementing the include/exclude
/// composition law described above.
pub fn build_filter(
    constraints: &[String],
    field_names: &[String],
    mode: FilterMode,
) -> Result<impl Fn(&Host) -> bool> {
    let parsed: Vec<Constraint> = constraints
        .iter()
        .map(|c| parse_constraint(c, field_names))
        .collect::<Result<_>>()?;

    Ok(move |host: &Host| match mode {
        FilterMode::Include => parsed.iter().all(|c| c.matches(host)),
        FilterMode::Exclude => parsed.iter().all(|c| !c.matches(host)),
    })
}

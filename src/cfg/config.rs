// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fleet configuration: the `Config` value the core consumes.
//!
//! Grounded on `netcfgbu/config_model.py::AppConfig` for the field set and
//! `netcfgbu/config.py::load` for the load/validate/directory-creation
//! sequence. `$VAR`/`${VAR}` expansion is a direct port of
//! `config_model.py::expand_env_str`.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail, ensure};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    cfg::logger::LogConfig,
    credentials::{Credential, DefaultCredential, Secret},
    inventory::builder::InventorySpec,
    jumphost::JumpHostSpec,
    linter::LinterSpec,
};

static VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\{(?P<b>[a-z0-9_]+)\}|\$(?P<n>[a-z_][a-z0-9_]*)").expect("valid regex")
});

/// Expands every `$VAR`/`${VAR}` reference in `value` from the process
/// environment. A referenced variable that is unset or empty is a load-time
/// error naming the variable, matching `config_model.py::expand_env_str`.
pub fn expand_env_str(value: &str) -> Result<String> {
    if !VAR_RE.is_match(value) {
        return Ok(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in VAR_RE.captures_iter(value) {
        let whole = caps.get(0).expect("match 0 always present");
        out.push_str(&value[last..whole.start()]);

        let name = caps
            .name("b")
            .or_else(|| caps.name("n"))
            .expect("one of the two groups always matches")
            .as_str();

        match std::env::var(name) {
            Ok(v) if !v.is_empty() => out.push_str(&v),
            Ok(_) => bail!("Environment variable \"{name}\" empty."),
            Err(_) => bail!("Environment variable \"{name}\" missing."),
        }

        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

/// Names the session variant a device's `connection` field selects.
/// Grounded on `netcfgbu/connectors/__init__.py::get_connector_class`: the
/// set is closed (basic plus one prompt-driven alternative), so this is
/// modeled as a sum type rather than an open registry.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionVariant {
    #[default]
    Basic,
    PromptLogin,
}

/// Accepts either a single command string or a list of commands, the way
/// `pre_get_config: Optional[Union[str, List[str]]]` does in
/// `config_model.py::OSNameSpec`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl From<StringOrList> for Vec<String> {
    fn from(value: StringOrList) -> Self {
        match value {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

fn default_get_config() -> String {
    "show running-config".to_string()
}

fn default_os_timeout() -> u64 {
    crate::cfg::enums::DEFAULT_GETCONFIG_TIMEOUT
}

/// Per-`os_name` capture behavior. Grounded on
/// `netcfgbu/config_model.py::OSNameSpec`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OsProfile {
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pre_get_config: Option<StringOrList>,
    #[serde(default = "default_get_config")]
    pub get_config: String,
    #[serde(default)]
    pub connection: ConnectionVariant,
    #[serde(default)]
    pub linter: Option<String>,
    #[serde(default = "default_os_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub ssh_configs: HashMap<String, String>,
    #[serde(default)]
    pub prompt_pattern: Option<String>,
}

impl OsProfile {
    /// The paging-disable commands, if any. Presence of this field (not its
    /// emptiness) is what switches the session into PTY mode.
    pub fn pre_get_config(&self) -> Option<Vec<String>> {
        self.pre_get_config.clone().map(Into::into)
    }
}

/// Git repository the `vcs` subcommand and `git_report` hook operate on.
/// Grounded on `netcfgbu/config_model.py::GitSpec`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GitSpec {
    pub name: Option<String>,
    pub repo: String,
    #[serde(default)]
    pub add_tag: bool,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<Secret>,
    pub deploy_key: Option<PathBuf>,
    pub deploy_passphrase: Option<Secret>,
}

impl GitSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.repo)
    }

    /// Validates the repo URL scheme and the "exactly one auth method" rule
    /// enforced by `GitSpec.ensure_proper_auth`.
    fn validate(&self) -> Result<()> {
        if !(self.repo.starts_with("https:") || self.repo.starts_with("git@")) {
            bail!(
                "Bad repo URL [{}]: expected to start with \"https:\" or \"git@\".",
                self.repo
            );
        }

        let auth_count = [
            self.token.is_some(),
            self.deploy_key.is_some(),
            self.password.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        ensure!(
            auth_count != 0,
            "Missing one of required auth method fields: token|deploy_key|password"
        );
        ensure!(
            auth_count <= 1,
            "Only one of token|deploy_key|password allowed"
        );
        ensure!(
            self.deploy_passphrase.is_none() || self.deploy_key.is_some(),
            "deploy_key required when using deploy_passphrase"
        );

        Ok(())
    }
}

/// Top-level `defaults:` block. Grounded on
/// `netcfgbu/config_model.py::Defaults`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Defaults {
    pub configs_dir: String,
    #[serde(default)]
    pub plugins_dir: Option<String>,
    pub inventory: String,
    #[serde(default)]
    pub credentials: Option<PartialDefaultCredential>,
}

/// The default credential, each half independently overridable by
/// `NETCFGBU_DEFAULT_USERNAME`/`NETCFGBU_DEFAULT_PASSWORD`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PartialDefaultCredential {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The validated, fully-resolved fleet configuration. Grounded on
/// `netcfgbu/config_model.py::AppConfig`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub defaults: Defaults,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub linters: HashMap<String, LinterSpec>,
    #[serde(default)]
    pub os_name: HashMap<String, OsProfile>,
    #[serde(default)]
    pub inventory: Vec<InventorySpec>,
    #[serde(default)]
    pub logging: Option<LogConfig>,
    #[serde(default)]
    pub ssh_configs: HashMap<String, String>,
    #[serde(default)]
    pub git: Vec<GitSpec>,
    #[serde(default)]
    pub jumphost: Vec<JumpHostSpec>,

    /// Resolved after load: `defaults.credentials` merged with the
    /// `NETCFGBU_DEFAULT_USERNAME`/`_PASSWORD` environment variables.
    #[serde(skip)]
    pub default_credential: Option<DefaultCredential>,
}

impl Config {
    /// Loads the configuration from YAML, expands environment references,
    /// validates cross-field invariants, and creates the configured
    /// directories, mirroring `netcfgbu/config.py::load`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut cfg: Config =
            serde_yaml::from_str(&raw).context("failed to parse config YAML")?;
        cfg.expand_env_vars()?;
        cfg.resolve_default_credential()?;
        cfg.validate()?;
        cfg.create_directories()?;
        Ok(cfg)
    }

    fn expand_env_vars(&mut self) -> Result<()> {
        self.defaults.configs_dir = expand_env_str(&self.defaults.configs_dir)?;
        if let Some(dir) = &self.defaults.plugins_dir {
            self.defaults.plugins_dir = Some(expand_env_str(dir)?);
        }
        self.defaults.inventory = expand_env_str(&self.defaults.inventory)?;
        ensure!(
            !self.defaults.inventory.is_empty(),
            "inventory empty value not allowed"
        );

        if let Some(partial) = &mut self.defaults.credentials {
            if let Some(u) = &partial.username {
                partial.username = Some(expand_env_str(u)?);
            }
            if let Some(p) = &partial.password {
                partial.password = Some(expand_env_str(p)?);
            }
        }

        for cred in &mut self.credentials {
            cred.username = expand_env_str(&cred.username)?;
            cred.password = Secret::new(expand_env_str(cred.password.expose())?);
        }
        for profile in self.os_name.values_mut() {
            for cred in &mut profile.credentials {
                cred.username = expand_env_str(&cred.username)?;
                cred.password = Secret::new(expand_env_str(cred.password.expose())?);
            }
        }
        for spec in &mut self.inventory {
            spec.script = expand_env_str(&spec.script)?;
        }
        for git in &mut self.git {
            git.repo = expand_env_str(&git.repo)?;
        }

        Ok(())
    }

    /// Combines the config-file default credential with the
    /// `NETCFGBU_DEFAULT_USERNAME`/`_PASSWORD` environment variables, env
    /// vars winning when both are present (matches pydantic-settings'
    /// validation-alias precedence over a plain field default).
    fn resolve_default_credential(&mut self) -> Result<()> {
        let partial = self.defaults.credentials.clone().unwrap_or_default();

        let username = std::env::var("NETCFGBU_DEFAULT_USERNAME")
            .ok()
            .filter(|v| !v.is_empty())
            .or(partial.username)
            .context(
                "default credential username not set (config defaults.credentials.username or \
                 NETCFGBU_DEFAULT_USERNAME)",
            )?;
        let password = std::env::var("NETCFGBU_DEFAULT_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())
            .or(partial.password)
            .context(
                "default credential password not set (config defaults.credentials.password or \
                 NETCFGBU_DEFAULT_PASSWORD)",
            )?;

        self.default_credential = Some(DefaultCredential(Credential {
            username,
            password: Secret::new(password),
        }));
        Ok(())
    }

    /// Cross-field validation: `os_name` linter references must exist, git
    /// specs must have exactly one auth method, jump-host specs need a
    /// proxy.
    fn validate(&self) -> Result<()> {
        for (os_name, profile) in &self.os_name {
            if let Some(linter_name) = &profile.linter {
                ensure!(
                    self.linters.contains_key(linter_name),
                    "OS spec \"{os_name}\" using undefined linter \"{linter_name}\""
                );
            }
        }

        for git in &self.git {
            git.validate()
                .with_context(|| format!("git spec \"{}\"", git.display_name()))?;
        }

        for jh in &self.jumphost {
            ensure!(!jh.proxy.is_empty(), "jumphost spec is missing a proxy");
        }

        Ok(())
    }

    fn create_directories(&self) -> Result<()> {
        let configs_dir = Path::new(&self.defaults.configs_dir);
        if !configs_dir.is_dir() {
            fs::create_dir_all(configs_dir).with_context(|| {
                format!("failed to create configs_dir {}", configs_dir.display())
            })?;
        }

        if let Some(plugins_dir) = &self.defaults.plugins_dir {
            let plugins_dir = Path::new(plugins_dir);
            if !plugins_dir.is_dir() {
                fs::create_dir_all(plugins_dir).with_context(|| {
                    format!("failed to create plugins_dir {}", plugins_dir.display())
                })?;
            }
        }

        Ok(())
    }

    pub fn os_profile(&self, os_name: &str) -> OsProfile {
        self.os_name.get(os_name).cloned().unwrap_or_default()
    }

    pub fn linter_for(&self, profile: &OsProfile) -> Option<&LinterSpec> {
        profile
            .linter
            .as_ref()
            .and_then(|name| self.linters.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_str_substitutes_braced_and_bare_forms() {
        // SAFETY: test-only, single-threaded access to a process-unique var name.
        unsafe {
            std::env::set_var("NETCFGBU_RS_TEST_VAR", "hello");
        }
        assert_eq!(
            expand_env_str("${NETCFGBU_RS_TEST_VAR}_world").unwrap(),
            "hello_world"
        );
        assert_eq!(
            expand_env_str("$NETCFGBU_RS_TEST_VAR-ish").unwrap(),
            "hello-ish"
        );
        unsafe {
            std::env::remove_var("NETCFGBU_RS_TEST_VAR");
        }
    }

    #[test]
    fn expand_env_str_fails_on_missing_var() {
        let err = expand_env_str("$NETCFGBU_RS_DEFINITELY_MISSING").unwrap_err();
        assert!(err.to_string().contains("NETCFGBU_RS_DEFINITELY_MISSING"));
    }

    #[test]
    fn expand_env_str_passes_through_plain_text() {
        assert_eq!(expand_env_str("no vars here").unwrap(), "no vars here");
    }
}

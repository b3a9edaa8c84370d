// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Credential model and the fallback resolver described in the fleet
//! config's credential section.
//!
//! Grounded on `netcfgbu/config_model.py::Credential`/`DefaultCredential` and
//! the ordered assembly in `netcfgbu/connectors/basic.py::_setup_creds`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::inventory::loader::Host;

/// A password-like value whose `Debug`/`Display` never print the contents.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("**redacted**")
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct Credential {
    pub username: String,
    pub password: Secret,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password)
            .finish()
    }
}

/// Global default credential, sourced from `NETCFGBU_DEFAULT_USERNAME` /
/// `NETCFGBU_DEFAULT_PASSWORD` or the equivalent config-file defaults block.
#[derive(Clone, Debug)]
pub struct DefaultCredential(pub Credential);

/// Assembles the ordered credential-trial list for one host record, per
/// SS4.B: host record, then OS-profile credentials, then the global
/// default, then global extras.
pub fn resolve(
    host: &Host,
    os_profile_credentials: &[Credential],
    default_credential: &DefaultCredential,
    global_extra_credentials: &[Credential],
) -> Vec<Credential> {
    let mut creds = Vec::with_capacity(
        1 + os_profile_credentials.len() + 1 + global_extra_credentials.len(),
    );

    if let (Some(username), Some(password)) =
        (host.fields.get("username"), host.fields.get("password"))
    {
        creds.push(Credential {
            username: username.clone(),
            password: Secret::new(password.clone()),
        });
    }

    creds.extend(os_profile_credentials.iter().cloned());
    creds.push(default_credential.0.clone());
    creds.extend(global_extra_credentials.iter().cloned());

    creds
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn host(fields: &[(&str, &str)]) -> Host {
        Host {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn cred(user: &str) -> Credential {
        Credential {
            username: user.to_string(),
            password: Secret::new("x"),
        }
    }

    #[test]
    fn host_credential_is_tried_first() {
        let h = host(&[("host", "r1"), ("username", "alice"), ("password", "p")]);
        let default = DefaultCredential(cred("default-user"));
        let resolved = resolve(&h, &[cred("os-user")], &default, &[cred("extra-user")]);
        let names: Vec<_> = resolved.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "os-user", "default-user", "extra-user"]);
    }

    #[test]
    fn missing_host_credential_falls_back_to_default_chain() {
        let h = host(&[("host", "r1")]);
        let default = DefaultCredential(cred("default-user"));
        let resolved = resolve(&h, &[], &default, &[]);
        let names: Vec<_> = resolved.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["default-user"]);
    }

    #[test]
    fn secret_debug_never_leaks_password() {
        let s = Secret::new("hunter2");
        assert!(!format!("{s:?}").contains("hunter2"));
        assert!(!format!("{s}").contains("hunter2"));
    }
}

// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order, later wins: compiled defaults, `/etc/scamguard/scamguard.toml`,
//! `~/.config/scamguard/scamguard.toml`, `./scamguard.toml`, then `SCAMGUARD_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use tracing::debug;

use crate::model::ScamguardConfig;

/// Config sections that may be addressed from the environment.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "gateway",
    "classifier",
    "policy",
    "debounce",
    "push",
    "storage",
    "prometheus",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/scamguard/scamguard.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "scamguard.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("scamguard/scamguard.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ScamguardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the defaults. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<ScamguardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ScamguardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file, still honouring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<ScamguardConfig, figment::Error> {
    debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(ScamguardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full provider chain, before extraction.
pub fn build_figment() -> Figment {
    let files = [
        PathBuf::from(SYSTEM_CONFIG_PATH),
        user_config_path(),
        PathBuf::from(LOCAL_CONFIG_PATH),
    ];
    let mut figment = Figment::new().merge(Serialized::defaults(ScamguardConfig::default()));
    for path in files {
        debug!(path = %path.display(), found = path.is_file(), "config source");
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Maps `SCAMGUARD_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `SCAMGUARD_PUSH_PRIVATE_KEY_PATH` lands on `push.private_key_path`.
fn env_provider() -> Env {
    Env::prefixed("SCAMGUARD_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.into()
    })
}

// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lifeline.toml` > `~/.config/lifeline/lifeline.toml` > `/etc/lifeline/lifeline.toml`
//! with environment variable overrides via `LIFELINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LifelineConfig;

/// Top-level sections an env var key may address.
const SECTIONS: &[&str] = &["server", "gateway", "storage", "delivery", "routing"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lifeline/lifeline.toml` (system-wide)
/// 3. `~/.config/lifeline/lifeline.toml` (user XDG config)
/// 4. `./lifeline.toml` (local directory)
/// 5. `LIFELINE_*` environment variables
pub fn load_config() -> Result<LifelineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LifelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LifelineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LifelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LifelineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LifelineConfig::default()))
        .merge(Toml::file("/etc/lifeline/lifeline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lifeline/lifeline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("lifeline.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `LIFELINE_GATEWAY_BEARER_TOKEN` must
/// map to `gateway.bearer_token`, not `gateway.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("LIFELINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: LIFELINE_GATEWAY_BEARER_TOKEN -> "gateway_bearer_token"
        let key_str = key.as_str();
        let mapped = SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

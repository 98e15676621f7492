// src/config/env.rs
//! Generate `configuration.json` from a `.env` file for local runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Copy every `KEY=value` pair of `env_path` into a JSON object at `out`.
/// Returns the number of keys written.
pub fn generate_from_env_file(env_path: &Path, out: &Path) -> Result<usize> {
    let mut values = BTreeMap::new();
    let iter = dotenvy::from_path_iter(env_path)
        .with_context(|| format!("opening {}", env_path.display()))?;
    for item in iter {
        let (key, value) = item.with_context(|| format!("parsing {}", env_path.display()))?;
        values.insert(key, value);
    }
    let json = serde_json::to_string_pretty(&values)?;
    fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    Ok(values.len())
}

/// Generate `config_path` from `env_path` when it does not exist yet.
/// Returns `true` when a file was generated.
pub fn ensure_configuration(config_path: &Path, env_path: &Path) -> Result<bool> {
    if config_path.exists() || !env_path.exists() {
        return Ok(false);
    }
    let n = generate_from_env_file(env_path, config_path)?;
    tracing::info!(
        keys = n,
        from = %env_path.display(),
        to = %config_path.display(),
        "generated configuration from env file"
    );
    Ok(true)
}

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use board_core::GateTimings;
use serde::Deserialize;
use storage::StoreOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gate_lower_limit_ms: u64,
    pub gate_upper_limit_ms: u64,
    pub gate_force_clear_ms: u64,
    pub store_latency_ms: u64,
    pub seed_path: Option<PathBuf>,
    pub fail_mutations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let timings = GateTimings::default();
        Self {
            gate_lower_limit_ms: timings.lower_limit.as_millis() as u64,
            gate_upper_limit_ms: timings.upper_limit.as_millis() as u64,
            gate_force_clear_ms: timings.force_clear_after.as_millis() as u64,
            store_latency_ms: 0,
            seed_path: None,
            fail_mutations: false,
        }
    }
}

impl Settings {
    pub fn gate_timings(&self) -> GateTimings {
        GateTimings {
            lower_limit: Duration::from_millis(self.gate_lower_limit_ms),
            upper_limit: Duration::from_millis(self.gate_upper_limit_ms),
            force_clear_after: Duration::from_millis(self.gate_force_clear_ms),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            latency: Duration::from_millis(self.store_latency_ms),
            fail_mutations: self.fail_mutations,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    gate_lower_limit_ms: Option<u64>,
    gate_upper_limit_ms: Option<u64>,
    gate_force_clear_ms: Option<u64>,
    store_latency_ms: Option<u64>,
    seed_path: Option<PathBuf>,
    fail_mutations: Option<bool>,
}

/// Defaults, then `path` if it exists, then `APP__*` environment overrides.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings =
                toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.gate_lower_limit_ms {
        settings.gate_lower_limit_ms = v;
    }
    if let Some(v) = file_cfg.gate_upper_limit_ms {
        settings.gate_upper_limit_ms = v;
    }
    if let Some(v) = file_cfg.gate_force_clear_ms {
        settings.gate_force_clear_ms = v;
    }
    if let Some(v) = file_cfg.store_latency_ms {
        settings.store_latency_ms = v;
    }
    if let Some(v) = file_cfg.seed_path {
        settings.seed_path = Some(v);
    }
    if let Some(v) = file_cfg.fail_mutations {
        settings.fail_mutations = v;
    }
}

fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    if let Some(v) = var("APP__GATE_LOWER_LIMIT_MS") {
        settings.gate_lower_limit_ms = parse_millis("APP__GATE_LOWER_LIMIT_MS", v)?;
    }
    if let Some(v) = var("APP__GATE_UPPER_LIMIT_MS") {
        settings.gate_upper_limit_ms = parse_millis("APP__GATE_UPPER_LIMIT_MS", v)?;
    }
    if let Some(v) = var("APP__GATE_FORCE_CLEAR_MS") {
        settings.gate_force_clear_ms = parse_millis("APP__GATE_FORCE_CLEAR_MS", v)?;
    }
    if let Some(v) = var("APP__STORE_LATENCY_MS") {
        settings.store_latency_ms = parse_millis("APP__STORE_LATENCY_MS", v)?;
    }
    if let Some(v) = var("APP__SEED_PATH") {
        settings.seed_path = Some(PathBuf::from(v));
    }
    if let Some(v) = var("APP__FAIL_MUTATIONS") {
        settings.fail_mutations = match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(SettingsError::InvalidValue {
                    key: "APP__FAIL_MUTATIONS",
                    value: v,
                })
            }
        };
    }
    Ok(())
}

fn parse_millis(key: &'static str, value: String) -> Result<u64, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue { key, value })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

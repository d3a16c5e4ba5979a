//! Service configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `STROKEGUARD_MODEL_DIR` | `ml_assets` |
//! | `STROKEGUARD_REQUIRE_MANIFEST` | `false` |
//! | `STROKEGUARD_EXPOSE_ERROR_DETAIL` | `false` |
//! | `STROKEGUARD_MAX_SIGNAL_LEN` | `100000` |
//! | `STROKEGUARD_LOG_MODE` | `auto` (`file` when stderr is a terminal) |
//! | `STROKEGUARD_LOG_FILE` | `strokeguard.log` |

use std::path::PathBuf;

use crate::domain::signal::DEFAULT_MAX_SIGNAL_LEN;

pub const MODEL_DIR_ENV: &str = "STROKEGUARD_MODEL_DIR";
pub const REQUIRE_MANIFEST_ENV: &str = "STROKEGUARD_REQUIRE_MANIFEST";
pub const EXPOSE_ERROR_DETAIL_ENV: &str = "STROKEGUARD_EXPOSE_ERROR_DETAIL";
pub const MAX_SIGNAL_LEN_ENV: &str = "STROKEGUARD_MAX_SIGNAL_LEN";
pub const LOG_MODE_ENV: &str = "STROKEGUARD_LOG_MODE";
pub const LOG_FILE_ENV: &str = "STROKEGUARD_LOG_FILE";

pub const DEFAULT_MODEL_DIR: &str = "ml_assets";
pub const DEFAULT_LOG_FILE: &str = "strokeguard.log";

/// Where the CLI sends log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when attached to a terminal, stderr otherwise.
    Auto,
    File,
    Stderr,
}

impl LogMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "stderr" | "stdout" => Self::Stderr,
            _ => Self::Auto,
        }
    }
}

/// Options the dispatcher needs per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Include the underlying cause in caller-facing inference errors.
    pub expose_error_detail: bool,
    /// Upper bound on raw signal samples per request.
    pub max_signal_len: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            expose_error_detail: false,
            max_signal_len: DEFAULT_MAX_SIGNAL_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub model_dir: PathBuf,
    pub require_manifest: bool,
    pub dispatch: DispatchConfig,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
    /// Problems found while reading the environment. Logging is not yet
    /// installed at that point, so the caller reports them afterwards.
    pub warnings: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            require_manifest: false,
            dispatch: DispatchConfig::default(),
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            warnings: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut warnings = Vec::new();

        let max_signal_len = match lookup(MAX_SIGNAL_LEN_ENV) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warnings.push(format!(
                        "Ignoring invalid {MAX_SIGNAL_LEN_ENV}={raw:?}, using {DEFAULT_MAX_SIGNAL_LEN}"
                    ));
                    DEFAULT_MAX_SIGNAL_LEN
                }
            },
            None => DEFAULT_MAX_SIGNAL_LEN,
        };

        Self {
            model_dir: lookup(MODEL_DIR_ENV)
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.model_dir, PathBuf::from),
            require_manifest: parse_bool(lookup(REQUIRE_MANIFEST_ENV)),
            dispatch: DispatchConfig {
                expose_error_detail: parse_bool(lookup(EXPOSE_ERROR_DETAIL_ENV)),
                max_signal_len,
            },
            log_mode: lookup(LOG_MODE_ENV).map_or(LogMode::Auto, |v| LogMode::parse(&v)),
            log_file: lookup(LOG_FILE_ENV)
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.log_file, PathBuf::from),
            warnings,
        }
    }
}

fn parse_bool(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.model_dir, PathBuf::from("ml_assets"));
        assert_eq!(config.dispatch.max_signal_len, 100_000);
        assert!(!config.require_manifest);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (MODEL_DIR_ENV, "/srv/models"),
            (REQUIRE_MANIFEST_ENV, "yes"),
            (EXPOSE_ERROR_DETAIL_ENV, "1"),
            (MAX_SIGNAL_LEN_ENV, "5000"),
            (LOG_MODE_ENV, "FILE"),
        ]);
        assert_eq!(config.model_dir, PathBuf::from("/srv/models"));
        assert!(config.require_manifest);
        assert!(config.dispatch.expose_error_detail);
        assert_eq!(config.dispatch.max_signal_len, 5000);
        assert_eq!(config.log_mode, LogMode::File);
    }

    #[test]
    fn test_bool_parsing_is_strict() {
        assert!(!config_from(&[(REQUIRE_MANIFEST_ENV, "on")]).require_manifest);
        assert!(!config_from(&[(REQUIRE_MANIFEST_ENV, "True")]).require_manifest);
        assert!(config_from(&[(REQUIRE_MANIFEST_ENV, "TRUE")]).require_manifest);
    }

    #[test]
    fn test_invalid_signal_cap_falls_back() {
        assert_eq!(
            config_from(&[(MAX_SIGNAL_LEN_ENV, "0")]).dispatch.max_signal_len,
            DEFAULT_MAX_SIGNAL_LEN
        );
        let config = config_from(&[(MAX_SIGNAL_LEN_ENV, "lots")]);
        assert_eq!(config.dispatch.max_signal_len, DEFAULT_MAX_SIGNAL_LEN);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains(MAX_SIGNAL_LEN_ENV));
        assert!(config.warnings[0].contains("\"lots\""));

        assert!(config_from(&[(MAX_SIGNAL_LEN_ENV, "5000")]).warnings.is_empty());
    }
}

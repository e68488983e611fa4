//! Runtime configuration for the store location and the compile pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File name of the database inside the per-user data directory.
pub const DATABASE_FILE_NAME: &str = "datatex_v2.db";

pub const DEFAULT_ENGINE: &str = "pdflatex";
pub const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_COMPILES: usize = 2;

/// Resolve the per-user database path (e.g. `~/.local/share/datatex/datatex_v2.db`).
///
/// Falls back to the current directory when no home directory can be determined.
pub fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "datatex", "datatex")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

/// What happens to a compile's working directory once the run is over.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never delete working directories.
    KeepAll,
    /// Keep directories of failed runs for inspection, delete successful ones.
    #[default]
    KeepFailures,
    /// Delete every working directory.
    KeepNone,
    /// Keep the newest `n` working directories under the work root.
    KeepLast(usize),
}

impl RetentionPolicy {
    /// Parse `all`, `failures`, `none` or `last:N`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "all" => Some(Self::KeepAll),
            "failures" => Some(Self::KeepFailures),
            "none" => Some(Self::KeepNone),
            other => other
                .strip_prefix("last:")
                .and_then(|n| n.parse().ok())
                .map(Self::KeepLast),
        }
    }
}

/// Settings for [`crate::Compiler`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Typesetting executable, resolved through `PATH` when not absolute.
    pub engine: String,
    /// Arguments placed before the standard engine flags.
    #[serde(default)]
    pub engine_args: Vec<String>,
    pub timeout: Duration,
    pub max_concurrent: usize,
    /// Parent directory for per-compile working directories.
    pub work_root: PathBuf,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            engine: DEFAULT_ENGINE.to_string(),
            engine_args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT_COMPILES,
            work_root: std::env::temp_dir(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl CompilerConfig {
    /// Defaults overridden by `DATATEX_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(engine) = lookup("DATATEX_ENGINE").filter(|v| !v.trim().is_empty()) {
            config.engine = engine;
        }
        if let Some(raw) = lookup("DATATEX_COMPILE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!("Ignoring invalid DATATEX_COMPILE_TIMEOUT_SECS={}", raw),
            }
        }
        if let Some(raw) = lookup("DATATEX_MAX_COMPILES") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.max_concurrent = n,
                _ => tracing::warn!("Ignoring invalid DATATEX_MAX_COMPILES={}", raw),
            }
        }
        if let Some(dir) = lookup("DATATEX_WORK_DIR").filter(|v| !v.trim().is_empty()) {
            config.work_root = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("DATATEX_RETENTION") {
            match RetentionPolicy::parse(&raw) {
                Some(policy) => config.retention = policy,
                None => tracing::warn!("Ignoring invalid DATATEX_RETENTION={}", raw),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn retention_policy_parses_all_forms() {
        assert_eq!(RetentionPolicy::parse("all"), Some(RetentionPolicy::KeepAll));
        assert_eq!(
            RetentionPolicy::parse("failures"),
            Some(RetentionPolicy::KeepFailures)
        );
        assert_eq!(RetentionPolicy::parse("none"), Some(RetentionPolicy::KeepNone));
        assert_eq!(
            RetentionPolicy::parse("last:5"),
            Some(RetentionPolicy::KeepLast(5))
        );
        assert_eq!(RetentionPolicy::parse("last:x"), None);
        assert_eq!(RetentionPolicy::parse("forever"), None);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = CompilerConfig::from_lookup(lookup_from(&[
            ("DATATEX_ENGINE", "xelatex"),
            ("DATATEX_COMPILE_TIMEOUT_SECS", "5"),
            ("DATATEX_MAX_COMPILES", "4"),
            ("DATATEX_RETENTION", "last:3"),
        ]));

        assert_eq!(config.engine, "xelatex");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.retention, RetentionPolicy::KeepLast(3));
    }

    #[test]
    fn invalid_env_values_keep_defaults() {
        let config = CompilerConfig::from_lookup(lookup_from(&[
            ("DATATEX_COMPILE_TIMEOUT_SECS", "0"),
            ("DATATEX_MAX_COMPILES", "many"),
        ]));

        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS));
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT_COMPILES);
    }

    #[test]
    fn default_database_path_uses_file_name() {
        assert!(default_database_path().ends_with(DATABASE_FILE_NAME));
    }
}

use crate::error::{Error, Result};
use crate::hasher::HashAlgorithm;
use crate::normalize::NormalizationRules;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings read from `Config.toml` and `DIFFSANITY_*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub hash_algorithm: HashAlgorithm,
    /// Leave camera raw files out of both scans.
    pub skip_raw_files: bool,
    /// Fraction of source files to verify, in (0, 1].
    pub sample_rate: f64,
    /// Read `filehash.sum` manifests.
    pub use_manifest: bool,
    /// Rewrite `filehash.sum` after a clean scan.
    pub rewrite_manifest: bool,
    /// Scan source and backup at the same time.
    pub parallel_scans: bool,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            skip_raw_files: false,
            sample_rate: 1.0,
            use_manifest: true,
            rewrite_manifest: true,
            parallel_scans: true,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Load configuration, layering an optional config file under the environment.
///
/// Without an explicit `config_file`, `Config.toml` in the working directory
/// is used when present.
pub fn load_configuration(config_file: Option<&Path>) -> std::result::Result<AppConfig, ConfigError> {
    let file_source = match config_file {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };

    let builder = Config::builder()
        .add_source(file_source)
        .add_source(
            Environment::with_prefix("DIFFSANITY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Validated, ready-to-use scan settings.
#[derive(Debug)]
pub struct ScanOptions {
    pub algorithm: HashAlgorithm,
    pub rules: NormalizationRules,
    pub skip_raw_files: bool,
    pub sample_rate: f64,
    pub use_manifest: bool,
    pub rewrite_manifest: bool,
    pub parallel_scans: bool,
    pub ignore_patterns: Vec<String>,
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if !(config.sample_rate > 0.0 && config.sample_rate <= 1.0) {
            return Err(Error::InvalidSampleRate(config.sample_rate));
        }
        for pattern in &config.ignore_patterns {
            Pattern::new(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        Ok(Self {
            algorithm: config.hash_algorithm,
            rules: NormalizationRules::standard(),
            skip_raw_files: config.skip_raw_files,
            sample_rate: config.sample_rate,
            use_manifest: config.use_manifest,
            rewrite_manifest: config.rewrite_manifest,
            parallel_scans: config.parallel_scans,
            ignore_patterns: config.ignore_patterns.clone(),
        })
    }

    pub fn with_rules(mut self, rules: NormalizationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn is_sampled(&self) -> bool {
        self.sample_rate < 1.0
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            rules: NormalizationRules::standard(),
            skip_raw_files: false,
            sample_rate: 1.0,
            use_manifest: true,
            rewrite_manifest: true,
            parallel_scans: true,
            ignore_patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let options = ScanOptions::from_config(&AppConfig::default()).unwrap();
        assert_eq!(options.algorithm, HashAlgorithm::Md5);
        assert!(options.use_manifest);
        assert!(options.rewrite_manifest);
        assert!(!options.is_sampled());
    }

    #[test]
    fn test_sample_rate_bounds() {
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            let config = AppConfig {
                sample_rate: rate,
                ..AppConfig::default()
            };
            assert!(matches!(
                ScanOptions::from_config(&config),
                Err(Error::InvalidSampleRate(_))
            ));
        }
        let config = AppConfig {
            sample_rate: 0.25,
            ..AppConfig::default()
        };
        assert!(ScanOptions::from_config(&config).unwrap().is_sampled());
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let config = AppConfig {
            ignore_patterns: vec!["[unclosed".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(
            ScanOptions::from_config(&config),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("diffsanity.toml");
        fs::write(
            &path,
            "hash_algorithm = \"sha256\"\nskip_raw_files = true\nignore_patterns = [\"**/.DS_Store\"]\n",
        )
        .unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert!(config.skip_raw_files);
        assert_eq!(config.ignore_patterns, vec!["**/.DS_Store".to_string()]);
        assert_eq!(config.sample_rate, 1.0);
    }
}

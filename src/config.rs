//! Classifier settings and exception rules.
//!
//! Settings are loaded from a TOML file and then overridden by environment
//! variables (a `.env` file is honoured by the binary). The `[exceptions]`
//! table lists files the classifier must leave where they are:
//! - Exact filename matching
//! - Glob pattern matching
//! - File extension matching
//! - Regex pattern matching
//! - Include patterns that override every exclusion
//!
//! # Configuration File Format
//!
//! ```toml
//! root_dir = "/srv/videos"
//!
//! [baseline]
//! width = 1280
//! height = 720
//! bitrate_kbps = 1550
//!
//! [thresholds]
//! optimal_bitrate_rate = 1.5
//! ratio_diff = 0.05
//! keyframe_interval = 2.0
//!
//! [display]
//! filename_max_width = 40
//! float_precision = 3
//!
//! [probe]
//! ffprobe_path = "ffprobe"
//! threads = 0
//!
//! [exceptions]
//! enable_hidden_files = false
//!
//! [exceptions.exclude]
//! filenames = ["keep-me.mp4"]
//! patterns = ["*.part"]
//! extensions = ["srt", "nfo"]
//! regex = ["^sample_"]
//!
//! [exceptions.include]
//! patterns = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// A value is present but outside its allowed range.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    Io(String),
}

/// All settings consumed by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory to classify when none is given on the command line.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub exceptions: ExceptionRules,
}

/// Reference resolution and the bitrate it should be encoded at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default = "default_base_width")]
    pub width: u32,
    #[serde(default = "default_base_height")]
    pub height: u32,
    #[serde(default = "default_base_bitrate")]
    pub bitrate_kbps: u32,
}

fn default_base_width() -> u32 {
    1280
}

fn default_base_height() -> u32 {
    720
}

fn default_base_bitrate() -> u32 {
    1550
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            width: default_base_width(),
            height: default_base_height(),
            bitrate_kbps: default_base_bitrate(),
        }
    }
}

/// Decision thresholds for the classification strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Current/optimal bitrate ratio above which a small video is over-encoded.
    #[serde(default = "default_optimal_bitrate_rate")]
    pub optimal_bitrate_rate: f64,
    /// Largest distance to a ratio bucket that still counts as a match.
    #[serde(default = "default_ratio_diff")]
    pub ratio_diff: f64,
    /// Keyframe intervals (seconds) above this are flagged.
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: f64,
}

fn default_optimal_bitrate_rate() -> f64 {
    1.5
}

fn default_ratio_diff() -> f64 {
    0.05
}

fn default_keyframe_interval() -> f64 {
    2.0
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            optimal_bitrate_rate: default_optimal_bitrate_rate(),
            ratio_diff: default_ratio_diff(),
            keyframe_interval: default_keyframe_interval(),
        }
    }
}

/// Table rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Filenames wider than this (in terminal columns) are truncated.
    #[serde(default = "default_filename_max_width")]
    pub filename_max_width: usize,
    #[serde(default = "default_float_precision")]
    pub float_precision: usize,
}

fn default_filename_max_width() -> usize {
    40
}

fn default_float_precision() -> usize {
    3
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            filename_max_width: default_filename_max_width(),
            float_precision: default_float_precision(),
        }
    }
}

/// How files are probed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Worker threads for probing; 0 lets rayon decide.
    #[serde(default)]
    pub threads: usize,
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
            threads: 0,
        }
    }
}

/// Files the classifier must never move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRules {
    /// Whether hidden files (starting with ".") may be classified. Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules that override every exclusion.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude.
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, case-insensitive.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the filename.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Glob patterns that always allow classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Settings {
    /// Load settings from a file, with fallback to defaults, then apply
    /// environment overrides.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.vidtidyrc.toml` in the current directory
    /// 3. Look for `~/.config/vidtidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file cannot be read, if any
    /// file found is malformed, or if the resulting values are out of range.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Self::load_file(config_path)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    fn load_file(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".vidtidyrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("vidtidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file, without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Overrides file values with process environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overrides file values using `lookup` as the variable source.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("ROOT_DIR") {
            self.root_dir = Some(PathBuf::from(root));
        }
        override_parsed(&lookup, "BASE_RESOLUTION_WIDTH", &mut self.baseline.width);
        override_parsed(&lookup, "BASE_RESOLUTION_HEIGHT", &mut self.baseline.height);
        override_parsed(&lookup, "BASE_TARGET_BITRATE", &mut self.baseline.bitrate_kbps);
        override_parsed(
            &lookup,
            "THRESHOLD_OPTIMAL_BITRATE_RATE",
            &mut self.thresholds.optimal_bitrate_rate,
        );
        override_parsed(&lookup, "THRESHOLD_RATIO_DIFF", &mut self.thresholds.ratio_diff);
        override_parsed(
            &lookup,
            "THRESHOLD_KEYFRAME_INTERVAL",
            &mut self.thresholds.keyframe_interval,
        );
        override_parsed(
            &lookup,
            "TABULATE_FILENAME_MAXLEN",
            &mut self.display.filename_max_width,
        );
        override_parsed(
            &lookup,
            "TABULATE_FLOAT_PRECISION",
            &mut self.display.float_precision,
        );
        if let Some(path) = lookup("FFPROBE_PATH") {
            self.probe.ffprobe_path = path;
        }
        override_parsed(&lookup, "PROBE_THREADS", &mut self.probe.threads);
    }

    /// Rejects values the bitrate model and strategies cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("baseline.width", self.baseline.width),
            ("baseline.height", self.baseline.height),
            ("baseline.bitrate_kbps", self.baseline.bitrate_kbps),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        let non_negative = [
            ("thresholds.optimal_bitrate_rate", self.thresholds.optimal_bitrate_rate),
            ("thresholds.ratio_diff", self.thresholds.ratio_diff),
            ("thresholds.keyframe_interval", self.thresholds.keyframe_interval),
        ];
        for (key, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("must be a non-negative number, got {}", value),
                });
            }
        }

        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparsable environment override"),
    }
}

impl ExceptionRules {
    /// Compile the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<ExceptionFilters, ConfigError> {
        ExceptionFilters::new(self)
    }
}

/// Compiled exception rules, ready to test filenames against.
#[derive(Debug, Clone)]
pub struct ExceptionFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl ExceptionFilters {
    fn new(rules: &ExceptionRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns[..])?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns[..])?,
        })
    }

    /// Returns true if the file must be left out of classification.
    ///
    /// Checks run in this order, with early termination:
    /// 1. Include patterns - if matched, never excepted
    /// 2. Hidden file filter
    /// 3. Exact filename match
    /// 4. File extension match
    /// 5. Glob pattern match
    /// 6. Regex match on the filename
    pub fn is_excepted(&self, filename: &str) -> bool {
        let path = Path::new(filename);

        if self.include_patterns.iter().any(|p| p.matches_path(path)) {
            return false;
        }

        if !self.enable_hidden_files && filename.starts_with('.') {
            return true;
        }

        if self.exclude_filenames.contains(filename) {
            return true;
        }

        if let Some(ext) = path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return true;
        }

        if self.exclude_patterns.iter().any(|p| p.matches_path(path)) {
            return true;
        }

        self.exclude_regexes.iter().any(|r| r.is_match(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rules_with(exclude: ExcludeRules) -> ExceptionRules {
        ExceptionRules {
            enable_hidden_files: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.baseline.width, 1280);
        assert_eq!(settings.baseline.height, 720);
        assert_eq!(settings.baseline.bitrate_kbps, 1550);
        assert_eq!(settings.thresholds.ratio_diff, 0.05);
        assert_eq!(settings.display.filename_max_width, 40);
        assert_eq!(settings.probe.ffprobe_path, "ffprobe");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let settings = Settings::parse_toml(
            r#"
            root_dir = "/srv/videos"

            [thresholds]
            ratio_diff = 0.2

            [exceptions.exclude]
            extensions = ["srt"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.root_dir, Some(PathBuf::from("/srv/videos")));
        assert_eq!(settings.thresholds.ratio_diff, 0.2);
        assert_eq!(settings.thresholds.keyframe_interval, 2.0);
        assert_eq!(settings.baseline.bitrate_kbps, 1550);
        assert_eq!(settings.exceptions.exclude.extensions, vec!["srt"]);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Settings::parse_toml("[thresholds\nratio_diff = ");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        let result = Settings::load_from_file(Path::new("/no/such/vidtidy.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_env_overrides_apply_and_skip_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ROOT_DIR", "/data/clips"),
            ("BASE_TARGET_BITRATE", "2000"),
            ("THRESHOLD_RATIO_DIFF", "0.1"),
            ("THRESHOLD_KEYFRAME_INTERVAL", "not-a-number"),
            ("TABULATE_FILENAME_MAXLEN", "24"),
        ]);

        let mut settings = Settings::default();
        settings.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.root_dir, Some(PathBuf::from("/data/clips")));
        assert_eq!(settings.baseline.bitrate_kbps, 2000);
        assert_eq!(settings.thresholds.ratio_diff, 0.1);
        assert_eq!(settings.thresholds.keyframe_interval, 2.0);
        assert_eq!(settings.display.filename_max_width, 24);
    }

    #[test]
    fn test_validate_rejects_zero_baseline() {
        let mut settings = Settings::default();
        settings.baseline.height = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut settings = Settings::default();
        settings.thresholds.keyframe_interval = -1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_hidden_files_excepted_by_default() {
        let filters = ExceptionRules::default().compile().unwrap();
        assert!(filters.is_excepted(".DS_Store"));
        assert!(!filters.is_excepted("clip.mp4"));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let filters = rules_with(ExcludeRules {
            filenames: vec!["keep.mp4".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(filters.is_excepted("keep.mp4"));
        assert!(!filters.is_excepted("move.mp4"));
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let filters = rules_with(ExcludeRules {
            extensions: vec!["srt".to_string(), ".nfo".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(filters.is_excepted("movie.srt"));
        assert!(filters.is_excepted("movie.SRT"));
        assert!(filters.is_excepted("movie.nfo"));
        assert!(!filters.is_excepted("movie.mkv"));
    }

    #[test]
    fn test_exclude_glob_and_regex() {
        let filters = rules_with(ExcludeRules {
            patterns: vec!["*.part".to_string(), "[0-9]*.mp4".to_string()],
            regex: vec![r"^sample_.*\.mkv$".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(filters.is_excepted("download.part"));
        assert!(filters.is_excepted("2024-trip.mp4"));
        assert!(filters.is_excepted("sample_01.mkv"));
        assert!(!filters.is_excepted("trip-2024.mp4"));
        assert!(!filters.is_excepted("my_sample_01.mkv"));
    }

    #[test]
    fn test_include_overrides_exclusions() {
        let rules = ExceptionRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["mov".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["keep-*.mov".to_string(), ".important*".to_string()],
            },
        };
        let filters = rules.compile().unwrap();

        assert!(!filters.is_excepted("keep-holiday.mov"));
        assert!(filters.is_excepted("holiday.mov"));
        assert!(!filters.is_excepted(".important.mp4"));
        assert!(filters.is_excepted(".other.mp4"));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = rules_with(ExcludeRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = rules_with(ExcludeRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}

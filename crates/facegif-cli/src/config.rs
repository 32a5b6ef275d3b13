use facegif_core::{DetectionFailurePolicy, DetectorModel, ReplaceStrategy, ReplacerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// CLI configuration: `FACEGIF_*` environment variables, then an optional
/// TOML file, then command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Which SCRFD model to load.
    pub detector_model: DetectorModel,
    /// Minimum SCRFD score for a detection.
    pub confidence_threshold: f32,
    pub replacer: ReplacerConfig,
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model_dir: Option<PathBuf>,
    pub detector_model: Option<DetectorModel>,
    pub confidence_threshold: Option<f32>,
    pub blend_strength: Option<f32>,
    pub strategy: Option<ReplaceStrategy>,
    pub source_padding: Option<f32>,
    pub on_detection_failure: Option<DetectionFailurePolicy>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Load configuration from `FACEGIF_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ReplacerConfig::default();
        let model_dir = lookup("FACEGIF_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facegif_core::default_model_dir);

        Self {
            model_dir,
            detector_model: parsed(&lookup, "FACEGIF_DETECTOR_MODEL", DetectorModel::default()),
            confidence_threshold: parsed(&lookup, "FACEGIF_CONFIDENCE_THRESHOLD", 0.5),
            replacer: ReplacerConfig {
                strategy: parsed(&lookup, "FACEGIF_STRATEGY", defaults.strategy),
                blend_strength: parsed(&lookup, "FACEGIF_BLEND_STRENGTH", defaults.blend_strength),
                source_padding: parsed(&lookup, "FACEGIF_SOURCE_PADDING", defaults.source_padding),
                on_detection_failure: parsed(
                    &lookup,
                    "FACEGIF_ON_DETECTION_FAILURE",
                    defaults.on_detection_failure,
                ),
            },
        }
    }

    /// Override with whatever the file sets.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(dir) = file.model_dir {
            self.model_dir = dir;
        }
        if let Some(model) = file.detector_model {
            self.detector_model = model;
        }
        if let Some(threshold) = file.confidence_threshold {
            self.confidence_threshold = threshold;
        }
        if let Some(blend) = file.blend_strength {
            self.replacer.blend_strength = blend;
        }
        if let Some(strategy) = file.strategy {
            self.replacer.strategy = strategy;
        }
        if let Some(padding) = file.source_padding {
            self.replacer.source_padding = padding;
        }
        if let Some(policy) = file.on_detection_failure {
            self.replacer.on_detection_failure = policy;
        }
    }

    /// Path to the selected SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(self.detector_model.file_name())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[("FACEGIF_MODEL_DIR", "/models")]);
        assert_eq!(config.model_dir, PathBuf::from("/models"));
        assert_eq!(config.detector_model, DetectorModel::Accurate);
        assert_eq!(config.replacer, ReplacerConfig::default());
        assert_eq!(config.detector_model_path(), PathBuf::from("/models/det_10g.onnx"));
    }

    #[test]
    fn test_env_overrides() {
        let config = from_vars(&[
            ("FACEGIF_DETECTOR_MODEL", "fast"),
            ("FACEGIF_BLEND_STRENGTH", "0.5"),
            ("FACEGIF_STRATEGY", "plain"),
            ("FACEGIF_ON_DETECTION_FAILURE", "abort"),
            ("FACEGIF_CONFIDENCE_THRESHOLD", "0.7"),
        ]);
        assert_eq!(config.detector_model, DetectorModel::Fast);
        assert_eq!(config.replacer.strategy, ReplaceStrategy::Plain);
        assert_eq!(config.replacer.on_detection_failure, DetectionFailurePolicy::Abort);
        assert!((config.replacer.blend_strength - 0.5).abs() < f32::EPSILON);
        assert!((config.confidence_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bad_env_value_falls_back() {
        let config = from_vars(&[("FACEGIF_BLEND_STRENGTH", "lots"), ("FACEGIF_STRATEGY", "magic")]);
        assert!((config.replacer.blend_strength - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.replacer.strategy, ReplaceStrategy::Harmonized);
    }

    #[test]
    fn test_file_overrides_env() {
        let mut config = from_vars(&[("FACEGIF_STRATEGY", "plain"), ("FACEGIF_BLEND_STRENGTH", "0.3")]);
        let file: FileConfig = toml::from_str(
            r#"
            strategy = "harmonized"
            detector_model = "fast"
            on_detection_failure = "abort"
            "#,
        )
        .unwrap();
        config.apply_file(file);
        assert_eq!(config.replacer.strategy, ReplaceStrategy::Harmonized);
        assert_eq!(config.detector_model, DetectorModel::Fast);
        assert_eq!(config.replacer.on_detection_failure, DetectionFailurePolicy::Abort);
        // Untouched by the file.
        assert!((config.replacer.blend_strength - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_file_rejects_unknown_keys() {
        assert!(toml::from_str::<FileConfig>("blend = 0.4").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/facegif.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

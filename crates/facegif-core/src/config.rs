use crate::source::SOURCE_PADDING;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How detected faces are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceStrategy {
    /// Fit, mask and composite only.
    Plain,
    /// Also match the target region's colors and coast over frames where
    /// detection comes back empty.
    #[default]
    Harmonized,
}

impl ReplaceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplaceStrategy::Plain => "plain",
            ReplaceStrategy::Harmonized => "harmonized",
        }
    }
}

impl fmt::Display for ReplaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplaceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "basic" => Ok(ReplaceStrategy::Plain),
            "harmonized" | "improved" => Ok(ReplaceStrategy::Harmonized),
            other => Err(format!("unknown replace strategy: {other}")),
        }
    }
}

/// What a per-frame detection failure does to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionFailurePolicy {
    /// Treat the frame as having no faces.
    #[default]
    Skip,
    /// Fail the whole job.
    Abort,
}

impl fmt::Display for DetectionFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectionFailurePolicy::Skip => "skip",
            DetectionFailurePolicy::Abort => "abort",
        })
    }
}

impl FromStr for DetectionFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(DetectionFailurePolicy::Skip),
            "abort" => Ok(DetectionFailurePolicy::Abort),
            other => Err(format!("unknown detection failure policy: {other}")),
        }
    }
}

/// Replacement tunables. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacerConfig {
    pub strategy: ReplaceStrategy,
    /// Weight of the composited face, 0.0 keeps the frame as-is.
    pub blend_strength: f32,
    /// Margin around the source face as a fraction of its box.
    pub source_padding: f32,
    pub on_detection_failure: DetectionFailurePolicy,
}

impl Default for ReplacerConfig {
    fn default() -> Self {
        Self {
            strategy: ReplaceStrategy::default(),
            blend_strength: 0.9,
            source_padding: SOURCE_PADDING,
            on_detection_failure: DetectionFailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplacerConfig::default();
        assert_eq!(config.strategy, ReplaceStrategy::Harmonized);
        assert_eq!(config.on_detection_failure, DetectionFailurePolicy::Skip);
        assert!((config.blend_strength - 0.9).abs() < f32::EPSILON);
        assert!((config.source_padding - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ReplacerConfig =
            serde_json::from_str(r#"{"strategy": "plain", "on_detection_failure": "abort"}"#).unwrap();
        assert_eq!(config.strategy, ReplaceStrategy::Plain);
        assert_eq!(config.on_detection_failure, DetectionFailurePolicy::Abort);
        assert!((config.blend_strength - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("Plain".parse::<ReplaceStrategy>().unwrap(), ReplaceStrategy::Plain);
        assert_eq!("improved".parse::<ReplaceStrategy>().unwrap(), ReplaceStrategy::Harmonized);
        assert!("fancy".parse::<ReplaceStrategy>().is_err());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("ABORT".parse::<DetectionFailurePolicy>().unwrap(), DetectionFailurePolicy::Abort);
        assert!("retry".parse::<DetectionFailurePolicy>().is_err());
    }
}

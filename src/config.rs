use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alert::DEFAULT_COOLDOWN;
use crate::danger::DEFAULT_CLOSE_AREA_FRACTION;
use crate::decoder::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE, DEFAULT_RELEVANCE_AREA_FRACTION,
};
use crate::nms::DEFAULT_IOU_THRESHOLD;

const DEFAULT_MIN_FRAME_INTERVAL_MS: u64 = 500;

/// Largest accepted model input side; each frame allocates `3 * S * S` floats.
pub const MAX_INPUT_SIZE: u32 = 4096;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    model: Option<ModelConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    danger: Option<DangerConfigFile>,
    timing: Option<TimingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    confidence: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DangerConfigFile {
    relevance_area_fraction: Option<f32>,
    close_area_fraction: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    min_frame_interval_ms: Option<u64>,
    alert_cooldown_ms: Option<u64>,
}

/// Tunables for the detection pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// ONNX model to load at startup, if any.
    pub model_path: Option<PathBuf>,
    /// Side of the model's square input.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Low-priority classes are reported only above this fraction of the frame.
    pub relevance_area_fraction: f32,
    /// Boxes above this fraction of the model input escalate one tier.
    pub close_area_fraction: f32,
    /// Frames arriving sooner than this after the last processed one are dropped.
    pub min_frame_interval: Duration,
    pub alert_cooldown: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            relevance_area_fraction: DEFAULT_RELEVANCE_AREA_FRACTION,
            close_area_fraction: DEFAULT_CLOSE_AREA_FRACTION,
            min_frame_interval: Duration::from_millis(DEFAULT_MIN_FRAME_INTERVAL_MS),
            alert_cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl PipelineConfig {
    /// Load from `OBSTACLE_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OBSTACLE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (JSON, or TOML by extension), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        let thresholds = file.thresholds.unwrap_or_default();
        let danger = file.danger.unwrap_or_default();
        let timing = file.timing.unwrap_or_default();
        Self {
            model_path: model.path,
            input_size: model.input_size.unwrap_or(defaults.input_size),
            confidence_threshold: thresholds
                .confidence
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: thresholds.iou.unwrap_or(defaults.iou_threshold),
            relevance_area_fraction: danger
                .relevance_area_fraction
                .unwrap_or(defaults.relevance_area_fraction),
            close_area_fraction: danger
                .close_area_fraction
                .unwrap_or(defaults.close_area_fraction),
            min_frame_interval: timing
                .min_frame_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_frame_interval),
            alert_cooldown: timing
                .alert_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.alert_cooldown),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("OBSTACLE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Some(value) = env_parse::<f32>("OBSTACLE_CONFIDENCE_THRESHOLD")? {
            self.confidence_threshold = value;
        }
        if let Some(value) = env_parse::<f32>("OBSTACLE_IOU_THRESHOLD")? {
            self.iou_threshold = value;
        }
        if let Some(ms) = env_parse::<u64>("OBSTACLE_MIN_INTERVAL_MS")? {
            self.min_frame_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("OBSTACLE_COOLDOWN_MS")? {
            self.alert_cooldown = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size > MAX_INPUT_SIZE {
            return Err(anyhow!(
                "model input size must be within 1..={}, got {}",
                MAX_INPUT_SIZE,
                self.input_size
            ));
        }
        for (name, value) in [
            ("confidence threshold", self.confidence_threshold),
            ("iou threshold", self.iou_threshold),
            ("relevance area fraction", self.relevance_area_fraction),
            ("close area fraction", self.close_area_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
            }
        }
        if self.alert_cooldown.is_zero() {
            return Err(anyhow!("alert cooldown must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, value)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.input_size, 640);
        assert_eq!(cfg.min_frame_interval, Duration::from_millis(500));
        assert_eq!(cfg.alert_cooldown, Duration::from_secs(3));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let cfg = PipelineConfig {
            confidence_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            iou_threshold: f32::NAN,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            alert_cooldown: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn input_size_is_bounded() {
        let at_limit = PipelineConfig {
            input_size: MAX_INPUT_SIZE,
            ..PipelineConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        for input_size in [0, MAX_INPUT_SIZE + 1, 64_000] {
            let cfg = PipelineConfig {
                input_size,
                ..PipelineConfig::default()
            };
            assert!(cfg.validate().is_err(), "accepted input size {}", input_size);
        }
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file: PipelineConfigFile =
            serde_json::from_str(r#"{ "thresholds": { "confidence": 0.35 } }"#).unwrap();
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.confidence_threshold, 0.35);
        assert_eq!(cfg.iou_threshold, DEFAULT_IOU_THRESHOLD);
        assert_eq!(cfg.model_path, None);
    }
}

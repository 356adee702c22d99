use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{EvalResult, EvaluationError};
use crate::indicators::DEFAULT_PRECISION;

use super::profiles::ModelSelection;

/// Tunables of one evaluation run, optionally read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub pipeline: PipelineSettings,
    pub model: ModelSelection,
    pub timeouts: TimeoutSettings,
}

impl EvaluationConfig {
    /// Reads `path` if it exists, otherwise falls back to defaults.
    pub fn load(path: &Path) -> EvalResult<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EvaluationError::Configuration(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&raw)?;
        info!("Loaded evaluation config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> EvalResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EvaluationError::Configuration(e.to_string()))?;
        config
            .validate()
            .map_err(|errors| EvaluationError::Configuration(errors.join(", ")))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let p = &self.pipeline;

        let [h_fast, h_mid, h_slow] = p.hourly_windows;
        if !(0 < h_fast && h_fast < h_mid && h_mid < h_slow) {
            errors.push("hourly_windows must be strictly increasing and > 0".to_string());
        }
        let [d_fast, d_slow] = p.daily_windows;
        if !(0 < d_fast && d_fast < d_slow) {
            errors.push("daily_windows must be strictly increasing and > 0".to_string());
        }
        if p.normalization_window < 2 {
            errors.push("normalization_window must be >= 2".to_string());
        }
        if p.horizon_minutes == 0 {
            errors.push("horizon_minutes must be > 0".to_string());
        }
        if p.precision > 15 {
            errors.push("precision must be <= 15".to_string());
        }
        if self.timeouts.request_secs == 0 || self.timeouts.connect_secs == 0 {
            errors.push("timeouts must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Window sizes and rounding of the indicator transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub precision: u32,
    /// Fast, mid and slow hourly windows (`ma7_25h`, `ma25_99h`).
    pub hourly_windows: [usize; 3],
    /// Fast and slow daily windows (`ma7_25d`).
    pub daily_windows: [usize; 2],
    /// Samples in the min-max window (~26 days of minutes).
    pub normalization_window: usize,
    /// Minutes between an anchor and its realized-growth reference.
    pub horizon_minutes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            hourly_windows: [7, 25, 99],
            daily_windows: [7, 25],
            normalization_window: 37_500,
            horizon_minutes: 1440,
        }
    }
}

impl PipelineSettings {
    /// Smallest row count that still labels at least one anchor.
    pub fn min_rows(&self) -> usize {
        self.horizon_minutes + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Whole-request timeout on the prediction call.
    pub request_secs: u64,
    /// Connect timeout for HTTP and pool acquire timeout for the database.
    pub connect_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            request_secs: 120,
            connect_secs: 30,
        }
    }
}

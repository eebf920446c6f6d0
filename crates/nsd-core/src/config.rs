//! # Configuration System
//!
//! YAML configuration for NSD analyses: sample frequency, segment length,
//! window, crop, smoothing, fitting and logging. Every section is optional
//! and falls back to the library defaults.
//!
//! ## Configuration Search Path
//!
//! [`NsdConfig::load`] reads the first file found:
//! 1. Path specified via the `NSD_CONFIG` environment variable
//! 2. `./nsd.yaml` (current directory)
//! 3. `config.yaml` in the user config directory (e.g. `~/.config/nsd/`)
//!
//! ## Example Configuration
//!
//! ```yaml
//! sample_frequency: 50.0
//! bins: 262144          # omit for a quarter of the series
//! window:
//!   kind: hft90d
//!   overlap_ratio: 0.76
//! crop:
//!   leading: 3
//!   trailing: 1
//! detrend: none
//! smoothing:
//!   bins: 64
//!   aggregate: median
//! fit:
//!   space: loglog
//! logging:
//!   level: debug
//!   format: compact
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fit::{fit_in, FitResult, FitSpace};
use crate::logging::LogConfig;
use crate::nsd::NsdEstimator;
use crate::smooth::{smooth, Aggregate, DEFAULT_SMOOTH_BINS};
use crate::types::{Crop, NsdError, NsdResult, SpectralEstimate};
use crate::welch::Detrend;
use crate::windows::{SpectralWindow, WindowKind, DEFAULT_OVERLAP_RATIO, MIN_WINDOW_LENGTH};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "NSD_CONFIG";

/// Window section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub kind: WindowKind,
    pub overlap_ratio: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            kind: WindowKind::Hft90d,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
        }
    }
}

/// Smoothing section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothConfig {
    /// Geometric edges; the output has one point fewer
    pub bins: usize,
    pub aggregate: Aggregate,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            bins: DEFAULT_SMOOTH_BINS,
            aggregate: Aggregate::Mean,
        }
    }
}

/// Fitting section.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub space: FitSpace,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NsdConfig {
    /// Samples per second
    pub sample_frequency: f64,
    /// Welch segment length; `None` uses a quarter of the series
    pub bins: Option<usize>,
    pub window: WindowConfig,
    pub crop: Crop,
    pub detrend: Detrend,
    pub smoothing: SmoothConfig,
    pub fit: FitConfig,
    pub logging: LogConfig,
}

impl Default for NsdConfig {
    fn default() -> Self {
        Self {
            sample_frequency: 1.0,
            bins: None,
            window: WindowConfig::default(),
            crop: Crop::default(),
            detrend: Detrend::None,
            smoothing: SmoothConfig::default(),
            fit: FitConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl NsdConfig {
    /// Load configuration from the standard locations.
    ///
    /// Returns the default config if no file is found.
    pub fn load() -> NsdResult<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> NsdResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NsdError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loading configuration");
        Self::parse(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> NsdResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| NsdError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> NsdResult<String> {
        serde_yaml::to_string(self).map_err(|e| NsdError::Config(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> NsdResult<()> {
        let content = self.to_yaml()?;
        std::fs::write(path, content)
            .map_err(|e| NsdError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Candidate config files after the environment variable.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./nsd.yaml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "nsd") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> NsdResult<()> {
        if !(self.sample_frequency.is_finite() && self.sample_frequency > 0.0) {
            return Err(NsdError::Config(format!(
                "sample_frequency must be positive, got {}",
                self.sample_frequency
            )));
        }
        if let Some(bins) = self.bins {
            if bins < MIN_WINDOW_LENGTH {
                return Err(NsdError::Config(format!(
                    "bins must be at least {}, got {}",
                    MIN_WINDOW_LENGTH, bins
                )));
            }
        }
        if !(0.0..1.0).contains(&self.window.overlap_ratio) {
            return Err(NsdError::Config(format!(
                "window.overlap_ratio must be in [0, 1), got {}",
                self.window.overlap_ratio
            )));
        }
        if self.smoothing.bins < 2 {
            return Err(NsdError::Config(format!(
                "smoothing.bins must be at least 2, got {}",
                self.smoothing.bins
            )));
        }
        Ok(())
    }

    pub fn spectral_window(&self) -> NsdResult<SpectralWindow> {
        SpectralWindow::new(self.window.kind).with_overlap_ratio(self.window.overlap_ratio)
    }

    /// Estimator carrying every estimation setting of this config.
    pub fn estimator(&self) -> NsdResult<NsdEstimator> {
        self.validate()?;
        let mut estimator = NsdEstimator::new(self.sample_frequency)
            .with_window(self.spectral_window()?)
            .with_crop(self.crop)
            .with_detrend(self.detrend);
        if let Some(bins) = self.bins {
            estimator = estimator.with_bins(bins);
        }
        Ok(estimator)
    }

    /// Smooth with the configured bins and aggregate.
    pub fn smooth(&self, estimate: &SpectralEstimate) -> NsdResult<SpectralEstimate> {
        smooth(estimate, self.smoothing.bins, &self.smoothing.aggregate)
    }

    /// Fit in the configured space.
    pub fn fit(&self, estimate: &SpectralEstimate) -> NsdResult<FitResult> {
        fit_in(estimate, self.fit.space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};

    #[test]
    fn test_default_config() {
        let config = NsdConfig::default();
        assert_eq!(config.sample_frequency, 1.0);
        assert_eq!(config.bins, None);
        assert_eq!(config.window.kind, WindowKind::Hft90d);
        assert_eq!(config.crop, Crop::new(3, 1));
        assert_eq!(config.smoothing.bins, 64);
        assert_eq!(config.fit.space, FitSpace::LogLog);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
sample_frequency: 50.0
bins: 4096
window:
  kind: flattop
crop:
  leading: 5
detrend: constant
smoothing:
  aggregate: median
fit:
  space: linear
logging:
  level: debug
  format: json
"#;
        let config = NsdConfig::parse(yaml).unwrap();
        assert_eq!(config.sample_frequency, 50.0);
        assert_eq!(config.bins, Some(4096));
        assert_eq!(config.window.kind, WindowKind::Flattop);
        assert_eq!(config.window.overlap_ratio, DEFAULT_OVERLAP_RATIO);
        assert_eq!(config.crop, Crop::new(5, 1));
        assert_eq!(config.detrend, Detrend::Constant);
        assert_eq!(config.smoothing.aggregate, Aggregate::Median);
        assert_eq!(config.smoothing.bins, 64);
        assert_eq!(config.fit.space, FitSpace::Linear);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(NsdConfig::parse("{}").unwrap(), NsdConfig::default());
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert!(NsdConfig::parse("smoothing:\n  aggregate: mode\n").is_err());
        assert!(NsdConfig::parse("window:\n  kind: hann\n").is_err());
    }

    #[test]
    fn test_validation() {
        for yaml in [
            "sample_frequency: 0.0",
            "sample_frequency: -3.0",
            "bins: 2",
            "window:\n  overlap_ratio: 1.0",
            "smoothing:\n  bins: 1",
        ] {
            let err = NsdConfig::parse(yaml).unwrap_err();
            assert!(matches!(err, NsdError::Config(_)), "{}", yaml);
        }
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = NsdConfig::default();
        config.sample_frequency = 1e4;
        config.bins = Some(1 << 14);
        config.smoothing.aggregate = Aggregate::Max;
        let yaml = config.to_yaml().unwrap();
        assert_eq!(NsdConfig::parse(&yaml).unwrap(), config);
    }

    #[test]
    fn test_estimator_from_config() {
        let config = NsdConfig::parse("sample_frequency: 8.0\nbins: 64\n").unwrap();
        let estimator = config.estimator().unwrap();
        assert_eq!(estimator.sample_frequency(), 8.0);
        assert_eq!(estimator.bins_for(10_000), 64);
        assert_eq!(estimator.window().kind(), WindowKind::Hft90d);

        let series: Vec<f64> = (0..512).map(|i| (i as f64 * 0.9).sin()).collect();
        let nsd = estimator.estimate(&series).unwrap();
        assert_eq!(nsd.len(), 33 - 4);
        let smoothed = config.smooth(&nsd).unwrap();
        assert_eq!(smoothed.len(), 63);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("nsd-config-{}.yaml", std::process::id()));
        let config = NsdConfig {
            sample_frequency: 50.0,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = NsdConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);

        assert!(NsdConfig::load_from(Path::new("/nonexistent/nsd.yaml")).is_err());
    }

    #[test]
    fn test_search_paths() {
        let paths = NsdConfig::config_search_paths();
        assert_eq!(paths[0], PathBuf::from("./nsd.yaml"));
    }
}

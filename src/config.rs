//! Aggregated configuration.
//!
//! Every tunable of every stage lives in one [`ConstellationConfig`], which
//! can be loaded from TOML (missing keys keep their defaults) and then
//! adjusted from the environment.
//!
//! ```toml
//! [detection]
//! fallback_thresholds = [210, 180, 150]
//!
//! [layout]
//! clearance = 48.0
//!
//! [pipeline]
//! max_labels = 12
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compositor::RenderConfig;
use crate::detection::DetectionConfig;
use crate::layout::LayoutConfig;
use crate::pipeline::PipelineConfig;
use crate::scoring::ScoringConfig;

pub const ENV_DAILY_QUOTA: &str = "CONSTELLATION_DAILY_QUOTA";
pub const ENV_MAX_LABELS: &str = "CONSTELLATION_MAX_LABELS";
pub const ENV_LOG_LEVEL: &str = "CONSTELLATION_LOG_LEVEL";

/// Finest Hough angle step accepted, in degrees. The accumulator grows as
/// `180 / step`.
pub const MIN_HOUGH_THETA_DEG: f32 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstellationConfig {
    pub scoring: ScoringConfig,
    pub detection: DetectionConfig,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
    /// Log filter directive for the binary (e.g. `info`, `constellation=debug`).
    pub log_level: Option<String>,
}

impl ConstellationConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse configuration TOML")
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&text).with_context(|| format!("In {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `CONSTELLATION_*` environment variables from the process
    /// environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_DAILY_QUOTA) {
            self.pipeline.daily_quota = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_DAILY_QUOTA}={v} is not a non-negative integer"))?;
        }
        if let Some(v) = get(ENV_MAX_LABELS) {
            self.pipeline.max_labels = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_LABELS}={v} is not a non-negative integer"))?;
        }
        if let Some(v) = get(ENV_LOG_LEVEL) {
            self.log_level = Some(v.trim().to_string());
        }
        Ok(())
    }

    /// Reject settings no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if s.min_visible_score > 100 {
            bail!("scoring.min_visible_score must be at most 100");
        }
        if !is_ascending(&s.size_thresholds) {
            bail!("scoring.size_thresholds must be ascending");
        }
        if !is_ascending(&s.level_thresholds) {
            bail!("scoring.level_thresholds must be ascending");
        }
        if s.fullstack_min_categories == 0 {
            bail!("scoring.fullstack_min_categories must be positive");
        }

        let d = &self.detection;
        if d.fallback_thresholds.is_empty() {
            bail!("detection.fallback_thresholds must not be empty");
        }
        if d.fallback_thresholds.windows(2).any(|w| w[1] >= w[0]) {
            bail!("detection.fallback_thresholds must be strictly decreasing");
        }
        if d.hough_rho <= 0.0 {
            bail!("detection.hough_rho must be positive");
        }
        if d.hough_theta_deg.is_nan() || d.hough_theta_deg < MIN_HOUGH_THETA_DEG {
            bail!(
                "detection.hough_theta_deg must be at least {} degrees, got {}",
                MIN_HOUGH_THETA_DEG,
                d.hough_theta_deg
            );
        }
        if d.min_blob_pixels > d.max_blob_pixels {
            bail!("detection.min_blob_pixels exceeds max_blob_pixels");
        }
        if d.cluster_radius < 0.0 {
            bail!("detection.cluster_radius must not be negative");
        }

        let l = &self.layout;
        if l.clearance <= 0.0 {
            bail!("layout.clearance must be positive");
        }
        if l.candidate_count == 0 {
            bail!("layout.candidate_count must be positive");
        }
        if l.style.font_size <= 0.0 {
            bail!("layout.style.font_size must be positive");
        }

        if !(0.0..=1.0).contains(&self.render.panel_opacity) {
            bail!("render.panel_opacity must be within 0..=1");
        }

        let p = &self.pipeline;
        if p.generation.timeout_ms == 0 || p.upload.timeout_ms == 0 {
            bail!("pipeline timeouts must be positive");
        }
        Ok(())
    }
}

fn is_ascending<T: PartialOrd>(v: &[T]) -> bool {
    v.windows(2).all(|w| w[0] <= w[1])
}

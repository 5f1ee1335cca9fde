//! Constellation star detection.
//!
//! Detection is an ordered chain of strategies, each a pure function from a
//! [`Frame`] to candidate stars:
//!
//! 1. **Line endpoints** (primary): bilateral smoothing, Canny edges and
//!    Hough segment extraction find the drawn constellation lines; the
//!    brightest pixel near each segment endpoint is a star candidate.
//! 2. **Brightness threshold** (fallback): connected bright blobs, at a
//!    ladder of decreasing thresholds.
//!
//! Each strategy's candidates are clustered (nearby detections merged). The
//! first strategy whose clustered output satisfies the sufficiency predicate
//! wins; if none does, the attempt with the most stars is used. Detection
//! never fails: blank or saturated images simply yield no stars.

pub mod cluster;
pub mod edges;
pub mod filters;
pub mod hough;
pub mod threshold;

use std::fmt;
use std::time::Instant;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::star::{sort_by_brightness, Rgb, StarPosition};
use hough::{HoughParams, LineSegment};
use threshold::BlobParams;

// ── Configuration ───────────────────────────────────────────────────────────

/// Configuration for [`StarDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Bilateral filter neighborhood radius in pixels.
    /// Default: 2
    pub bilateral_radius: u32,
    /// Bilateral filter intensity sigma.
    /// Default: 75.0
    pub bilateral_sigma_color: f32,
    /// Bilateral filter spatial sigma.
    /// Default: 75.0
    pub bilateral_sigma_space: f32,

    /// Canny hysteresis thresholds on the L1 gradient magnitude.
    /// Default: 50.0 / 150.0
    pub canny_low: f32,
    pub canny_high: f32,

    /// Hough distance resolution in pixels.
    /// Default: 1.0
    pub hough_rho: f32,
    /// Hough angle resolution in degrees.
    /// Default: 1.0
    pub hough_theta_deg: f32,
    /// Minimum accumulator votes for a line.
    /// Default: 50
    pub hough_votes: u32,
    /// Segments shorter than this are nebula texture.
    /// Default: 50.0
    pub min_line_length: f32,
    /// Gaps up to this many pixels are bridged within a segment.
    /// Default: 10.0
    pub max_line_gap: f32,
    /// Cap on extracted segments.
    /// Default: 200
    pub max_lines: usize,

    /// Radius searched around each segment endpoint for the brightest pixel.
    /// Default: 15
    pub endpoint_search_radius: u32,
    /// Minimum luminance for an endpoint peak to count as a star.
    /// Default: 180
    pub endpoint_brightness: u8,

    /// Decreasing brightness thresholds tried by the fallback strategy.
    /// Default: [200, 170, 140]
    pub fallback_thresholds: Vec<u8>,
    /// Accepted blob size range in pixels.
    /// Default: 3 ..= 5000
    pub min_blob_pixels: usize,
    pub max_blob_pixels: usize,
    /// Reject blobs with a major/minor axis ratio above this. `None` disables.
    /// Default: Some(4.0)
    pub max_blob_elongation: Option<f32>,

    /// A strategy is sufficient when it finds at least `target - tolerance`
    /// stars (and at least one when the target is non-zero).
    /// Default: 2
    pub target_tolerance: usize,
    /// Detections closer than this are the same star.
    /// Default: 20.0
    pub cluster_radius: f32,
    /// Keep at most this many stars (brightest first).
    /// Default: 20
    pub max_stars: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            bilateral_radius: 2,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_rho: 1.0,
            hough_theta_deg: 1.0,
            hough_votes: 50,
            min_line_length: 50.0,
            max_line_gap: 10.0,
            max_lines: 200,
            endpoint_search_radius: 15,
            endpoint_brightness: 180,
            fallback_thresholds: vec![200, 170, 140],
            min_blob_pixels: 3,
            max_blob_pixels: 5000,
            max_blob_elongation: Some(4.0),
            target_tolerance: 2,
            cluster_radius: 20.0,
            max_stars: 20,
        }
    }
}

impl DetectionConfig {
    fn hough_params(&self) -> HoughParams {
        HoughParams {
            rho: self.hough_rho,
            theta: self.hough_theta_deg.to_radians(),
            votes: self.hough_votes,
            min_line_length: self.min_line_length,
            max_line_gap: self.max_line_gap,
            max_lines: self.max_lines,
        }
    }

    fn blob_params(&self, threshold: u8) -> BlobParams {
        BlobParams {
            threshold,
            min_pixels: self.min_blob_pixels,
            max_pixels: self.max_blob_pixels,
            max_elongation: self.max_blob_elongation,
        }
    }
}

// ── Result types ────────────────────────────────────────────────────────────

/// Which strategy produced a set of stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    LineEndpoints,
    /// Blob detection at the given luminance threshold.
    BrightnessThreshold(u8),
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::LineEndpoints => write!(f, "line_endpoints"),
            DetectionMethod::BrightnessThreshold(t) => write!(f, "brightness_threshold({t})"),
        }
    }
}

impl Serialize for DetectionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one strategy in the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub method: DetectionMethod,
    /// Stars after clustering.
    pub candidates: usize,
}

/// Result of star detection.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    /// Detected stars, brightness descending.
    pub stars: Vec<StarPosition>,
    /// Strategy the stars came from.
    pub method: DetectionMethod,
    /// True when the primary line strategy was not the one used.
    pub degraded: bool,
    /// Every strategy tried, in order.
    pub attempts: Vec<StrategyAttempt>,
    /// Wall-clock detection time in milliseconds.
    pub elapsed_ms: f32,
    pub image_width: u32,
    pub image_height: u32,
}

// ── Strategies ──────────────────────────────────────────────────────────────

/// An image prepared for detection: the RGB pixels and their luminance.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rgb: RgbImage,
    /// Row-major luminance in `0.0..=255.0`.
    pub gray: Vec<f32>,
}

impl Frame {
    pub fn from_image(img: &DynamicImage) -> Self {
        Self::from_rgb(img.to_rgb8())
    }

    pub fn from_rgb(rgb: RgbImage) -> Self {
        let gray = filters::to_grayscale_f32(&rgb);
        Self { rgb, gray }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    fn luma(&self, x: u32, y: u32) -> f32 {
        self.gray[(y * self.width() + x) as usize]
    }
}

/// One link of the detection chain.
pub trait DetectionStrategy: Send + Sync {
    fn method(&self) -> DetectionMethod;

    /// Raw (unclustered) star candidates.
    fn detect(&self, frame: &Frame) -> Vec<StarPosition>;
}

/// Stars at the endpoints of drawn constellation lines.
#[derive(Debug, Clone)]
pub struct LineEndpointStrategy {
    config: DetectionConfig,
}

impl LineEndpointStrategy {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Straight segments found in the frame.
    pub fn segments(&self, frame: &Frame) -> Vec<LineSegment> {
        let (w, h) = (frame.width(), frame.height());
        let c = &self.config;
        let smoothed = filters::bilateral_filter(
            &frame.gray,
            w,
            h,
            c.bilateral_radius,
            c.bilateral_sigma_color,
            c.bilateral_sigma_space,
        );
        let edges = edges::canny(&smoothed, w, h, c.canny_low, c.canny_high);
        hough::detect_segments(&edges, w, h, &c.hough_params())
    }

    /// Brightest pixel within the search radius of `(x, y)`, if bright enough.
    fn star_near(&self, frame: &Frame, x: f32, y: f32) -> Option<StarPosition> {
        let (w, h) = (frame.width() as i64, frame.height() as i64);
        let r = self.config.endpoint_search_radius as i64;
        let (cx, cy) = (x.round() as i64, y.round() as i64);

        // Peak search; first pixel in row-major order wins ties
        let mut peak: Option<(u32, u32, f32)> = None;
        for py in (cy - r).max(0)..=(cy + r).min(h - 1) {
            for px in (cx - r).max(0)..=(cx + r).min(w - 1) {
                if (px - cx).pow(2) + (py - cy).pow(2) > r * r {
                    continue;
                }
                let v = frame.luma(px as u32, py as u32);
                if peak.map_or(true, |(_, _, best)| v > best) {
                    peak = Some((px as u32, py as u32, v));
                }
            }
        }
        let (px, py, peak_val) = peak?;
        if peak_val < self.config.endpoint_brightness as f32 {
            return None;
        }

        // Refine to the centroid of the bright core around the peak
        let core = 0.75 * peak_val;
        let core_r: i64 = 5;
        let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0usize);
        for qy in (py as i64 - core_r).max(0)..=(py as i64 + core_r).min(h - 1) {
            for qx in (px as i64 - core_r).max(0)..=(px as i64 + core_r).min(w - 1) {
                if frame.luma(qx as u32, qy as u32) >= core {
                    sx += qx as f64;
                    sy += qy as f64;
                    n += 1;
                }
            }
        }
        let (sx, sy) = if n > 0 {
            ((sx / n as f64).round() as u32, (sy / n as f64).round() as u32)
        } else {
            (px, py)
        };

        Some(StarPosition {
            x: sx,
            y: sy,
            brightness: peak_val.round().clamp(0.0, 255.0) as u8,
            estimated_radius: (n.max(1) as f32 / std::f32::consts::PI).sqrt(),
            color: Rgb(frame.rgb.get_pixel(px, py).0),
        })
    }
}

impl DetectionStrategy for LineEndpointStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::LineEndpoints
    }

    fn detect(&self, frame: &Frame) -> Vec<StarPosition> {
        if frame.width() < 3 || frame.height() < 3 {
            return Vec::new();
        }
        let segments = self.segments(frame);
        debug!("Line strategy: {} segments", segments.len());
        segments
            .iter()
            .flat_map(|s| s.endpoints())
            .filter_map(|(x, y)| self.star_near(frame, x, y))
            .collect()
    }
}

/// Bright connected blobs at a fixed luminance threshold.
#[derive(Debug, Clone)]
pub struct BrightnessThresholdStrategy {
    params: BlobParams,
}

impl BrightnessThresholdStrategy {
    pub fn new(params: BlobParams) -> Self {
        Self { params }
    }
}

impl DetectionStrategy for BrightnessThresholdStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::BrightnessThreshold(self.params.threshold)
    }

    fn detect(&self, frame: &Frame) -> Vec<StarPosition> {
        threshold::detect_bright_blobs(&frame.gray, &frame.rgb, &self.params)
    }
}

// ── Detector ────────────────────────────────────────────────────────────────

/// Runs the strategy chain over an image.
pub struct StarDetector {
    config: DetectionConfig,
    strategies: Vec<Box<dyn DetectionStrategy>>,
}

impl StarDetector {
    /// The standard chain: line endpoints, then each fallback threshold.
    pub fn new(config: DetectionConfig) -> Self {
        let mut strategies: Vec<Box<dyn DetectionStrategy>> =
            vec![Box::new(LineEndpointStrategy::new(config.clone()))];
        for &t in &config.fallback_thresholds {
            strategies.push(Box::new(BrightnessThresholdStrategy::new(config.blob_params(t))));
        }
        Self { config, strategies }
    }

    /// A detector with a custom chain.
    pub fn with_strategies(config: DetectionConfig, strategies: Vec<Box<dyn DetectionStrategy>>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Whether `found` stars satisfy a request for `target`.
    pub fn is_sufficient(&self, found: usize, target: usize) -> bool {
        let needed = target
            .saturating_sub(self.config.target_tolerance)
            .max(target.min(1));
        found >= needed
    }

    /// Detect stars in `image`, aiming for `target` of them.
    pub fn detect(&self, image: &DynamicImage, target: usize) -> DetectionResult {
        self.detect_frame(&Frame::from_image(image), target)
    }

    pub fn detect_frame(&self, frame: &Frame, target: usize) -> DetectionResult {
        let t0 = Instant::now();
        let mut attempts = Vec::with_capacity(self.strategies.len());
        // Best insufficient attempt so far: most stars, earliest on ties
        let mut best: Option<(DetectionMethod, Vec<StarPosition>)> = None;
        let mut chosen: Option<(DetectionMethod, Vec<StarPosition>)> = None;

        for strategy in &self.strategies {
            let method = strategy.method();
            let raw = strategy.detect(frame);
            let stars = cluster::merge_nearby(&raw, self.config.cluster_radius);
            debug!("{}: {} raw candidates, {} after clustering", method, raw.len(), stars.len());
            attempts.push(StrategyAttempt {
                method,
                candidates: stars.len(),
            });

            if self.is_sufficient(stars.len(), target) {
                chosen = Some((method, stars));
                break;
            }
            if best.as_ref().map_or(true, |(_, b)| stars.len() > b.len()) {
                best = Some((method, stars));
            }
        }

        let (method, mut stars) = chosen
            .or(best)
            .unwrap_or((DetectionMethod::LineEndpoints, Vec::new()));
        sort_by_brightness(&mut stars);
        stars.truncate(self.config.max_stars);

        let degraded = method != DetectionMethod::LineEndpoints;
        if degraded {
            warn!(
                "Detection degraded: line strategy insufficient, using {} ({} stars, target {})",
                method,
                stars.len(),
                target
            );
        }
        let elapsed_ms = t0.elapsed().as_secs_f32() * 1000.0;
        info!("Detected {} stars via {} in {:.1} ms", stars.len(), method, elapsed_ms);

        DetectionResult {
            stars,
            method,
            degraded,
            attempts,
            elapsed_ms,
            image_width: frame.width(),
            image_height: frame.height(),
        }
    }
}

impl Default for StarDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

//! # constellation
//!
//! Turn a generated star-field image into a labelled **technology
//! constellation**: find the stars that belong to the drawn constellation,
//! bind each one to a ranked entity, and place readable labels without
//! collisions.
//!
//! Given raw `(term, count)` observations from a document and a star-field
//! image from a generative model, `constellation` scores the terms, detects
//! the constellation's stars, pairs entities with stars by rank and renders
//! the labelled composite.
//!
//! ## Features
//!
//! - **Deterministic scoring** — per-category normalization, size buckets,
//!   an explicit Fullstack rule and configurable level thresholds
//! - **Two-strategy star detection** — stars at the endpoints of the drawn
//!   constellation lines (bilateral filter, Canny, Hough), falling back to
//!   brightness-threshold blobs at decreasing thresholds
//! - **Angular-gap label placement** — labels point into the emptiest
//!   direction around each star and are dropped rather than overlapped
//! - **SVG compositing** — title, label panels and watermark rendered with
//!   resvg onto a copy of the image
//! - **Async orchestration** — quota, deadlines, one retry per external call
//!   and cancellation at every stage boundary
//!
//! ## Example
//!
//! ```no_run
//! use constellation::{
//!     EntityScorer, LabelPlacer, ScoringConfig, StarDetector, TermLookup,
//!     TermObservation, map_entities_to_stars,
//! };
//!
//! let scorer = EntityScorer::new(TermLookup::builtin(), ScoringConfig::default());
//! let scored = scorer.score(&[
//!     TermObservation::new("Angular", 12),
//!     TermObservation::new("Python", 9),
//!     TermObservation::new("Docker", 4),
//! ]);
//! println!("Profile: {} / {}", scored.stats.dominant_category, scored.stats.level);
//!
//! let image = image::open("starfield.png").unwrap();
//! let detection = StarDetector::default().detect(&image, scored.entities.len());
//! let assignments = map_entities_to_stars(&scored.entities, &detection.stars, 15);
//! let report = LabelPlacer::default().place(
//!     &assignments,
//!     &detection.stars,
//!     image.width(),
//!     image.height(),
//! );
//! println!("{} labels placed, {} dropped", report.placements.len(), report.dropped);
//! ```
//!
//! ## Pipeline overview
//!
//! 1. **Scoring** — resolve terms against the lookup table, merge synonyms,
//!    normalize per category, classify the profile
//! 2. **Image generation** — external; prompt built from the profile
//! 3. **Star detection** — strategy chain with clustering of nearby detections
//! 4. **Mapping** — highest score to brightest star
//! 5. **Labeling** — greedy placement in brightness order
//! 6. **Compositing and upload** — external storage returns the URL
//!

pub mod catalogs;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod entity;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod pipeline;
pub mod scoring;
pub mod star;

pub use catalogs::{read_observations_csv, read_term_table_csv, TermEntry, TermLookup};
pub use compositor::{Compositor, RenderConfig, RenderError};
pub use config::ConstellationConfig;
pub use detection::{
    DetectionConfig, DetectionMethod, DetectionResult, DetectionStrategy, StarDetector,
};
pub use entity::{Category, DisplaySize, DominantCategory, Entity, Level, ProfileStats};
pub use error::{ExternalError, PipelineError};
pub use layout::{LabelPlacement, LabelPlacer, LabelStyle, LayoutConfig, PlacementReport, Rect};
pub use mapping::{map_entities_to_stars, Assignment};
pub use pipeline::external::{
    BlobStorage, FileSystemStorage, ImageGenerator, RetryPolicy, StaticImageGenerator,
};
pub use pipeline::quota::{QuotaCounter, QuotaStatus};
pub use pipeline::stage::PipelineStage;
pub use pipeline::{
    ConstellationPipeline, ConstellationRequest, ConstellationResult, PipelineConfig,
};
pub use scoring::{EntityScorer, ScoringConfig, ScoringResult, TermObservation};
pub use star::{Rgb, StarPosition};

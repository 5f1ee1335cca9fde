//! End-to-end orchestration of one constellation request.
//!
//! ```text
//! RECEIVED → SCORING → IMAGE_REQUESTED → STAR_DETECTION
//!          → MAPPING_AND_LABELING → UPLOADING → DONE
//! ```
//!
//! Any stage can end in `ERRORED`. An empty observation list is not an
//! error: it scores to an empty profile and yields an unlabelled image. The
//! daily quota is taken once, just before the image is requested. The two
//! external calls (generation and upload) get a deadline and a retry budget;
//! detection, mapping and layout run inline and never retry. A failed overlay
//! render uploads the plain image with every label counted as dropped.
//! Cancellation is honoured at every stage boundary and while waiting on an
//! external call.

pub mod external;
pub mod prompt;
pub mod quota;
pub mod stage;
pub mod title;

use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalogs::TermLookup;
use crate::compositor::{Compositor, RenderError};
use crate::config::ConstellationConfig;
use crate::detection::{DetectionMethod, StarDetector};
use crate::entity::{Entity, ProfileStats};
use crate::error::{ExternalError, PipelineError};
use crate::layout::{LabelPlacement, LabelPlacer, PlacementReport};
use crate::mapping::map_entities_to_stars;
use crate::scoring::{EntityScorer, TermObservation};
use external::{call_with_retry, validate_generated_image, BlobStorage, ImageGenerator, RetryPolicy};
use quota::{QuotaCounter, QuotaStatus};
use stage::{PipelineStage, StageTiming, StageTrace};

const GENERATION_SERVICE: &str = "image generation";
const STORAGE_SERVICE: &str = "storage";

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on labelled stars per image.
    /// Default: 15
    pub max_labels: usize,
    /// Generations allowed per UTC day.
    /// Default: 100
    pub daily_quota: u32,
    /// Default: 60 s deadline, one retry after 500 ms
    pub generation: RetryPolicy,
    /// Default: 30 s deadline, one retry after 500 ms
    pub upload: RetryPolicy,
    /// Which closing style line the prompt uses.
    /// Default: 0
    pub prompt_style: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_labels: 15,
            daily_quota: 100,
            generation: RetryPolicy::with_timeout_ms(60_000),
            upload: RetryPolicy::with_timeout_ms(30_000),
            prompt_style: 0,
        }
    }
}

/// Input of one run: raw `(term, count)` observations from a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstellationRequest {
    pub observations: Vec<TermObservation>,
}

impl ConstellationRequest {
    pub fn new(observations: Vec<TermObservation>) -> Self {
        Self { observations }
    }
}

/// Outcome of a successful run, shaped for the HTTP response.
#[derive(Debug, Clone, Serialize)]
pub struct ConstellationResult {
    pub image_url: String,
    pub title: String,
    /// Every scored entity, labelled or not.
    pub technologies: Vec<Entity>,
    pub stats: ProfileStats,
    /// Wall-clock seconds for the whole run.
    pub generation_time: f32,
    pub stars_detected: usize,
    pub labels_placed: usize,
    pub labels_dropped: usize,
    pub detection_method: DetectionMethod,
    pub detection_degraded: bool,
    pub stage_timings_ms: Vec<StageTiming>,
    /// Quota after this run took its slot.
    pub quota: QuotaStatus,
    /// Final label layout.
    #[serde(skip)]
    pub placements: Vec<LabelPlacement>,
}

/// Runs requests end to end. Shareable across concurrent requests; each run
/// owns its intermediate state and only the quota counter is shared.
pub struct ConstellationPipeline {
    scorer: EntityScorer,
    detector: StarDetector,
    placer: LabelPlacer,
    compositor: Compositor,
    config: PipelineConfig,
    quota: Arc<QuotaCounter>,
    generator: Arc<dyn ImageGenerator>,
    storage: Arc<dyn BlobStorage>,
}

impl ConstellationPipeline {
    pub fn new(
        config: &ConstellationConfig,
        lookup: TermLookup,
        quota: Arc<QuotaCounter>,
        generator: Arc<dyn ImageGenerator>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            scorer: EntityScorer::new(lookup, config.scoring.clone()),
            detector: StarDetector::new(config.detection.clone()),
            placer: LabelPlacer::new(config.layout.clone()),
            compositor: Compositor::new(config.render.clone(), config.layout.style.clone()),
            config: config.pipeline.clone(),
            quota,
            generator,
            storage,
        }
    }

    pub fn quota_status(&self) -> QuotaStatus {
        self.quota.status()
    }

    /// Run without external cancellation.
    pub async fn run(&self, request: &ConstellationRequest) -> Result<ConstellationResult, PipelineError> {
        self.run_with_cancel(request, &CancellationToken::new()).await
    }

    /// Run, abandoning work once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        request: &ConstellationRequest,
        cancel: &CancellationToken,
    ) -> Result<ConstellationResult, PipelineError> {
        let mut trace = StageTrace::new();
        let result = self.run_stages(request, cancel, &mut trace).await;
        if let Err(e) = &result {
            info!("Request failed in {}: {}", trace.current(), e);
            trace.fail();
        }
        result
    }

    async fn run_stages(
        &self,
        request: &ConstellationRequest,
        cancel: &CancellationToken,
        trace: &mut StageTrace,
    ) -> Result<ConstellationResult, PipelineError> {
        // ── SCORING ──
        advance(trace, cancel)?;
        let scored = self.scorer.score(&request.observations);
        let title = title::generate_title(scored.stats.dominant_category, &scored.entities);
        let target = scored.entities.len().min(self.config.max_labels);
        let prompt = prompt::build_prompt(
            target,
            self.config.max_labels,
            scored.stats.dominant_category,
            self.config.prompt_style,
        );
        info!(
            "Scored {} entities ({}, {}), title '{}'",
            scored.entities.len(),
            scored.stats.dominant_category,
            scored.stats.level,
            title
        );

        let quota = self.quota.try_acquire()?;
        debug!("Quota {}/{}", quota.current_count, quota.max_quota);

        // ── IMAGE_REQUESTED ──
        advance(trace, cancel)?;
        let image = with_cancel(
            cancel,
            PipelineStage::ImageRequested,
            call_with_retry(GENERATION_SERVICE, &self.config.generation, || {
                let generator = self.generator.clone();
                let prompt = prompt.clone();
                async move {
                    let img = generator.generate(&prompt).await?;
                    validate_generated_image(&img)?;
                    Ok::<_, ExternalError>(img)
                }
            }),
        )
        .await?;

        // ── STAR_DETECTION ──
        advance(trace, cancel)?;
        let detection = self.detector.detect(&image, target);

        // ── MAPPING_AND_LABELING ──
        advance(trace, cancel)?;
        let assignments = map_entities_to_stars(&scored.entities, &detection.stars, self.config.max_labels);
        let mut report = self
            .placer
            .place(&assignments, &detection.stars, image.width(), image.height());
        let rendered = self.compositor.compose(&image, &title, &report.placements);
        let composite = overlay_or_plain(rendered, &image, &mut report);
        info!(
            "{} assignments, {} labels placed, {} dropped",
            assignments.len(),
            report.placements.len(),
            report.dropped
        );

        // ── UPLOADING ──
        advance(trace, cancel)?;
        let image_url = with_cancel(
            cancel,
            PipelineStage::Uploading,
            call_with_retry(STORAGE_SERVICE, &self.config.upload, || {
                let storage = self.storage.clone();
                let composite = composite.clone();
                async move { storage.upload(&composite).await }
            }),
        )
        .await?;

        // ── DONE ──
        advance(trace, cancel)?;
        let generation_time = trace.total_ms() / 1000.0;
        info!("Constellation ready in {:.2} s: {}", generation_time, image_url);

        Ok(ConstellationResult {
            image_url,
            title,
            technologies: scored.entities,
            stats: scored.stats,
            generation_time,
            stars_detected: detection.stars.len(),
            labels_placed: report.placements.len(),
            labels_dropped: report.dropped,
            detection_method: detection.method,
            detection_degraded: detection.degraded,
            stage_timings_ms: trace.timings().to_vec(),
            quota,
            placements: report.placements,
        })
    }
}

/// The rendered composite, or the plain image with every label counted as
/// dropped when the overlay could not be rendered.
fn overlay_or_plain(
    rendered: Result<DynamicImage, RenderError>,
    image: &DynamicImage,
    report: &mut PlacementReport,
) -> DynamicImage {
    match rendered {
        Ok(composite) => composite,
        Err(e) => {
            warn!("Overlay failed, uploading the unlabelled image: {}", e);
            report.dropped += report.placements.len();
            report.placements.clear();
            image.clone()
        }
    }
}

/// Move to the next stage unless the caller has gone away.
fn advance(trace: &mut StageTrace, cancel: &CancellationToken) -> Result<PipelineStage, PipelineError> {
    if cancel.is_cancelled() {
        let stage = trace.current().next().unwrap_or(PipelineStage::Done);
        return Err(PipelineError::Cancelled { stage });
    }
    Ok(trace.advance())
}

async fn with_cancel<T>(
    cancel: &CancellationToken,
    stage: PipelineStage,
    call: impl std::future::Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    tokio::select! {
        result = call => result,
        _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
    }
}

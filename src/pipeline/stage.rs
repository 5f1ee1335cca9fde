//! Request state machine and per-stage timing.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

/// States of one pipeline run, in order. `Errored` is reachable from any
/// state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Received,
    Scoring,
    ImageRequested,
    StarDetection,
    MappingAndLabeling,
    Uploading,
    Done,
    Errored,
}

impl PipelineStage {
    /// The following state on the success path.
    pub fn next(self) -> Option<PipelineStage> {
        use PipelineStage::*;
        match self {
            Received => Some(Scoring),
            Scoring => Some(ImageRequested),
            ImageRequested => Some(StarDetection),
            StarDetection => Some(MappingAndLabeling),
            MappingAndLabeling => Some(Uploading),
            Uploading => Some(Done),
            Done | Errored => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Errored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Received => "RECEIVED",
            PipelineStage::Scoring => "SCORING",
            PipelineStage::ImageRequested => "IMAGE_REQUESTED",
            PipelineStage::StarDetection => "STAR_DETECTION",
            PipelineStage::MappingAndLabeling => "MAPPING_AND_LABELING",
            PipelineStage::Uploading => "UPLOADING",
            PipelineStage::Done => "DONE",
            PipelineStage::Errored => "ERRORED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time spent in one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: f32,
}

/// Tracks the current stage of a run and how long each stage took.
#[derive(Debug)]
pub struct StageTrace {
    current: PipelineStage,
    started: Instant,
    stage_started: Instant,
    timings: Vec<StageTiming>,
}

impl StageTrace {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            current: PipelineStage::Received,
            started: now,
            stage_started: now,
            timings: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Close the current stage and enter the next one. No-op once terminal.
    pub fn advance(&mut self) -> PipelineStage {
        if let Some(next) = self.current.next() {
            let elapsed_ms = self.close_current();
            info!("{} -> {} ({:.1} ms)", self.current, next, elapsed_ms);
            self.current = next;
        }
        self.current
    }

    /// Close the current stage and enter `Errored`.
    pub fn fail(&mut self) {
        if self.current.is_terminal() {
            return;
        }
        let elapsed_ms = self.close_current();
        warn!("{} -> {} ({:.1} ms)", self.current, PipelineStage::Errored, elapsed_ms);
        self.current = PipelineStage::Errored;
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Milliseconds since the run was received.
    pub fn total_ms(&self) -> f32 {
        self.started.elapsed().as_secs_f32() * 1000.0
    }

    fn close_current(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed_ms = (now - self.stage_started).as_secs_f32() * 1000.0;
        self.timings.push(StageTiming {
            stage: self.current,
            elapsed_ms,
        });
        self.stage_started = now;
        elapsed_ms
    }
}

impl Default for StageTrace {
    fn default() -> Self {
        Self::new()
    }
}

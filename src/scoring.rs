//! Turn raw term observations into ranked, categorized entities.
//!
//! 1. Resolve every observed term against the lookup table; unknown terms
//!    are ignored and synonyms sharing a display name are merged.
//! 2. Normalize each accumulated count against the largest count in the same
//!    category, flooring at a minimum visible score.
//! 3. Bucket scores into display sizes.
//! 4. Derive the profile: per-category counts, dominant category and level.
//!
//! The scorer is a pure function of its input: running it twice on the same
//! observations yields identical entities and stats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalogs::TermLookup;
use crate::entity::{Category, DisplaySize, DominantCategory, Entity, Level, ProfileStats};

/// One raw `(term, count)` observation from the document source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermObservation {
    pub term: String,
    pub count: u32,
}

impl TermObservation {
    pub fn new(term: impl Into<String>, count: u32) -> Self {
        Self {
            term: term.into(),
            count,
        }
    }
}

/// Tunables for entity scoring and profile classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Scores never drop below this value so every entity stays displayable.
    /// Default: 10
    pub min_visible_score: u8,

    /// Lower score bounds for `[small, medium, large]`; anything below
    /// `small` is `tiny`.
    /// Default: [20, 50, 80]
    pub size_thresholds: [u8; 3],

    /// Exclusive upper entity counts for `[Junior, Intermediate, Senior]`;
    /// anything at or above the last bound is `Expert`.
    /// Default: [5, 12, 25]
    pub level_thresholds: [usize; 3],

    /// Number of distinct non-empty categories from which the profile is
    /// classified as Fullstack regardless of category sizes.
    /// Default: 3
    pub fullstack_min_categories: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_visible_score: 10,
            size_thresholds: [20, 50, 80],
            level_thresholds: [5, 12, 25],
            fullstack_min_categories: 3,
        }
    }
}

/// Scored entities (score descending, then name ascending) and the profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub entities: Vec<Entity>,
    pub stats: ProfileStats,
}

/// Scores raw observations against a term lookup table.
#[derive(Debug, Clone)]
pub struct EntityScorer {
    lookup: TermLookup,
    config: ScoringConfig,
}

impl EntityScorer {
    pub fn new(lookup: TermLookup, config: ScoringConfig) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn lookup(&self) -> &TermLookup {
        &self.lookup
    }

    /// Score the observations. Never fails; empty or unknown input yields
    /// an empty entity list with default stats.
    pub fn score(&self, observations: &[TermObservation]) -> ScoringResult {
        // display name -> (category, accumulated count)
        let mut accum: BTreeMap<String, (Category, u32)> = BTreeMap::new();
        for obs in observations {
            if obs.count == 0 {
                continue;
            }
            let Some(entry) = self.lookup.get(&obs.term) else {
                debug!("Ignoring unknown term '{}'", obs.term);
                continue;
            };
            let slot = accum
                .entry(entry.display.clone())
                .or_insert((entry.category, 0));
            slot.1 = slot.1.saturating_add(obs.count);
        }

        let mut max_per_category: BTreeMap<Category, u32> = BTreeMap::new();
        for (category, count) in accum.values() {
            let max = max_per_category.entry(*category).or_insert(0);
            *max = (*max).max(*count);
        }

        let mut entities: Vec<Entity> = accum
            .into_iter()
            .map(|(name, (category, raw_count))| {
                let max = max_per_category.get(&category).copied().unwrap_or(raw_count);
                let score = self.normalize(raw_count, max);
                Entity {
                    name,
                    category,
                    raw_count,
                    score,
                    display_size: self.display_size(score),
                }
            })
            .collect();

        entities.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

        let stats = self.profile(&entities);
        debug!(
            "Scored {} entities (dominant: {}, level: {})",
            stats.total_entities, stats.dominant_category, stats.level
        );
        ScoringResult { entities, stats }
    }

    fn normalize(&self, count: u32, max_in_category: u32) -> u8 {
        if max_in_category == 0 {
            return self.config.min_visible_score.min(100);
        }
        let raw = (100.0 * count as f64 / max_in_category as f64).round();
        (raw as u8).clamp(self.config.min_visible_score.min(100), 100)
    }

    fn display_size(&self, score: u8) -> DisplaySize {
        let [small, medium, large] = self.config.size_thresholds;
        if score >= large {
            DisplaySize::Large
        } else if score >= medium {
            DisplaySize::Medium
        } else if score >= small {
            DisplaySize::Small
        } else {
            DisplaySize::Tiny
        }
    }

    fn level(&self, total: usize) -> Level {
        let [junior, intermediate, senior] = self.config.level_thresholds;
        if total < junior {
            Level::Junior
        } else if total < intermediate {
            Level::Intermediate
        } else if total < senior {
            Level::Senior
        } else {
            Level::Expert
        }
    }

    fn profile(&self, entities: &[Entity]) -> ProfileStats {
        if entities.is_empty() {
            return ProfileStats::empty();
        }

        let mut category_counts: BTreeMap<Category, usize> = BTreeMap::new();
        for e in entities {
            *category_counts.entry(e.category).or_insert(0) += 1;
        }

        ProfileStats {
            total_entities: entities.len(),
            dominant_category: self.dominant_category(&category_counts),
            category_counts,
            level: self.level(entities.len()),
        }
    }

    fn dominant_category(&self, counts: &BTreeMap<Category, usize>) -> DominantCategory {
        let non_empty = counts.values().filter(|&&n| n > 0).count();
        if non_empty >= self.config.fullstack_min_categories {
            return DominantCategory::Fullstack;
        }

        // Strict comparison in priority order: ties keep the earlier category.
        let mut best: Option<(Category, usize)> = None;
        for category in Category::ALL {
            let n = counts.get(&category).copied().unwrap_or(0);
            if n == 0 {
                continue;
            }
            match best {
                Some((_, best_n)) if n <= best_n => {}
                _ => best = Some((category, n)),
            }
        }
        DominantCategory::Category(best.map(|(c, _)| c).unwrap_or(Category::Other))
    }
}

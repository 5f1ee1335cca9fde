//! Rank-based pairing of entities with stars.
//!
//! The highest-scored entity goes to the brightest star, the second to the
//! second brightest, and so on. No semantic matching is attempted.

use serde::Serialize;

use crate::entity::Entity;
use crate::star::{sort_by_brightness, StarPosition};

/// One (star, entity) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub star: StarPosition,
    pub entity: Entity,
}

/// Pair entities with stars by rank.
///
/// Both inputs are sorted first (entities by score descending then name,
/// stars by brightness descending), so the result does not depend on input
/// order. The output has `min(entities, stars, max_labels)` entries in rank
/// order.
pub fn map_entities_to_stars(entities: &[Entity], stars: &[StarPosition], max_labels: usize) -> Vec<Assignment> {
    let mut entities = entities.to_vec();
    entities.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    let mut stars = stars.to_vec();
    sort_by_brightness(&mut stars);

    stars
        .into_iter()
        .zip(entities)
        .take(max_labels)
        .map(|(star, entity)| Assignment { star, entity })
        .collect()
}

//! Collision-free label placement around detected stars.
//!
//! For every assignment (processed in order, i.e. brightest star first):
//!
//! 1. Survey the bearings from the target star to every other star within
//!    the influence radius and take the midpoint of the widest angular gap
//!    as the optimal direction.
//! 2. Generate candidate anchors at the clearance distance: the optimal
//!    direction first, then alternating offsets `+k·step`, `-k·step`.
//! 3. Accept the first candidate whose anchor and text box are in bounds,
//!    whose anchor keeps the clearance distance from every star (and whose box
//!    covers no star), and whose box does not overlap an earlier label.
//! 4. If none passes, the label is dropped.
//!
//! Placement is deterministic and never produces overlapping or off-canvas
//! boxes; it degrades by omission.

use std::f32::consts::{PI, TAU};

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mapping::Assignment;
use crate::star::StarPosition;

/// Cosine/sine magnitude above which a box is aligned to one side of its
/// anchor rather than centered on it (roughly 22.5° off-axis).
const ALIGN_THRESHOLD: f32 = 0.38;

/// Clearance comparisons tolerate float error in the anchor position.
const CLEARANCE_EPS: f32 = 1e-3;

/// Label text metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    /// Font size in pixels.
    /// Default: 16.0
    pub font_size: f32,
    /// Average glyph advance as a fraction of the font size.
    /// Default: 0.6
    pub char_width: f32,
    /// Line height as a fraction of the font size.
    /// Default: 1.25
    pub line_height: f32,
    /// Panel padding around the text in pixels.
    /// Default: 4.0
    pub padding: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            char_width: 0.6,
            line_height: 1.25,
            padding: 4.0,
        }
    }
}

impl LabelStyle {
    /// Panel size `(width, height)` for the given text lines, padding included.
    pub fn measure(&self, lines: &[&str]) -> (f32, f32) {
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = longest as f32 * self.font_size * self.char_width + 2.0 * self.padding;
        let height = lines.len() as f32 * self.font_size * self.line_height + 2.0 * self.padding;
        (width, height)
    }
}

/// Configuration for [`LabelPlacer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Stars further than this from the target do not affect its direction.
    /// Default: 150.0
    pub influence_radius: f32,
    /// Minimum distance from a label anchor to any star.
    /// Default: 60.0
    pub clearance: f32,
    /// Number of candidate directions tried per label.
    /// Default: 8
    pub candidate_count: usize,
    /// Extra spacing required between label boxes.
    /// Default: 4.0
    pub label_gap: f32,
    pub style: LabelStyle,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            influence_radius: 150.0,
            clearance: 60.0,
            candidate_count: 8,
            label_gap: 4.0,
            style: LabelStyle::default(),
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// True when the interiors overlap; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn expanded(&self, margin: f32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    pub fn within(&self, width: f32, height: f32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= width && self.bottom() <= height
    }
}

/// The two text lines of a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelText {
    pub name: String,
    pub weight: String,
}

impl LabelText {
    pub fn for_assignment(assignment: &Assignment) -> Self {
        Self {
            name: assignment.entity.name.clone(),
            weight: format!("{}%", assignment.entity.score),
        }
    }
}

/// A placed label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub assignment: Assignment,
    pub text: LabelText,
    /// Point at the clearance distance from the star the box hangs off.
    pub anchor: Point2<f32>,
    /// Panel rectangle, padding included.
    pub text_box: Rect,
    /// Direction from the star to the anchor, radians in image coordinates.
    pub angle: f32,
}

/// Placed labels and the number dropped for lack of room.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlacementReport {
    pub placements: Vec<LabelPlacement>,
    pub dropped: usize,
}

/// Greedy, priority-ordered label placer.
#[derive(Debug, Clone, Default)]
pub struct LabelPlacer {
    config: LayoutConfig,
}

impl LabelPlacer {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Place a label for each assignment on a `width × height` canvas.
    ///
    /// `stars` is every detected star, assigned or not; all of them are
    /// obstacles and all of them shape the neighbor survey.
    pub fn place(&self, assignments: &[Assignment], stars: &[StarPosition], width: u32, height: u32) -> PlacementReport {
        let mut report = PlacementReport::default();
        let mut placed_boxes: Vec<Rect> = Vec::new();

        for assignment in assignments {
            let text = LabelText::for_assignment(assignment);
            let size = self.config.style.measure(&[&text.name, &text.weight]);
            let optimal = self.optimal_direction(&assignment.star, stars);

            let accepted = self
                .candidate_angles(optimal)
                .into_iter()
                .enumerate()
                .find_map(|(i, angle)| {
                    let (anchor, text_box) = self.candidate(&assignment.star, angle, size);
                    if self.accepts(anchor, &text_box, stars, &placed_boxes, width, height) {
                        debug!("Placed '{}' at candidate {} ({:.0}°)", text.name, i, angle.to_degrees());
                        Some((anchor, text_box, angle))
                    } else {
                        None
                    }
                });

            match accepted {
                Some((anchor, text_box, angle)) => {
                    placed_boxes.push(text_box);
                    report.placements.push(LabelPlacement {
                        assignment: assignment.clone(),
                        text,
                        anchor,
                        text_box,
                        angle,
                    });
                }
                None => {
                    warn!(
                        "Label dropped: no free position for '{}' near ({}, {})",
                        text.name, assignment.star.x, assignment.star.y
                    );
                    report.dropped += 1;
                }
            }
        }
        report
    }

    /// Midpoint of the widest gap between bearings to neighboring stars.
    ///
    /// Returns 0 (pointing right) when no other star is within the influence
    /// radius. Result is in `(-π, π]`.
    pub fn optimal_direction(&self, target: &StarPosition, stars: &[StarPosition]) -> f32 {
        let origin = target.point();
        let mut bearings: Vec<f32> = stars
            .iter()
            .filter(|s| !(s.x == target.x && s.y == target.y))
            .map(|s| s.point() - origin)
            .filter(|d| d.norm() <= self.config.influence_radius)
            .map(|d| d.y.atan2(d.x))
            .collect();
        if bearings.is_empty() {
            return 0.0;
        }
        bearings.sort_by(|a, b| a.total_cmp(b));

        // Gap i runs from bearing i to bearing i+1; the last wraps around
        let n = bearings.len();
        let mut best_start = bearings[n - 1];
        let mut best_gap = bearings[0] + TAU - bearings[n - 1];
        for i in 0..n - 1 {
            let gap = bearings[i + 1] - bearings[i];
            if gap > best_gap {
                best_gap = gap;
                best_start = bearings[i];
            }
        }
        normalize_angle(best_start + best_gap / 2.0)
    }

    /// Candidate directions: the optimal one, then `+step, -step, +2·step, …`.
    pub fn candidate_angles(&self, optimal: f32) -> Vec<f32> {
        let count = self.config.candidate_count.max(1);
        let step = TAU / count as f32;
        (0..count)
            .map(|k| {
                let magnitude = k.div_ceil(2) as f32 * step;
                let offset = if k % 2 == 1 { magnitude } else { -magnitude };
                normalize_angle(optimal + offset)
            })
            .collect()
    }

    /// Anchor and box for a candidate direction. The box hangs off the anchor
    /// on the side facing away from the star.
    fn candidate(&self, star: &StarPosition, angle: f32, (w, h): (f32, f32)) -> (Point2<f32>, Rect) {
        let dir = Vector2::new(angle.cos(), angle.sin());
        let anchor = star.point() + dir * self.config.clearance;

        let x = if dir.x > ALIGN_THRESHOLD {
            anchor.x
        } else if dir.x < -ALIGN_THRESHOLD {
            anchor.x - w
        } else {
            anchor.x - w / 2.0
        };
        let y = if dir.y > ALIGN_THRESHOLD {
            anchor.y
        } else if dir.y < -ALIGN_THRESHOLD {
            anchor.y - h
        } else {
            anchor.y - h / 2.0
        };
        (
            anchor,
            Rect {
                x,
                y,
                width: w,
                height: h,
            },
        )
    }

    fn accepts(
        &self,
        anchor: Point2<f32>,
        text_box: &Rect,
        stars: &[StarPosition],
        placed: &[Rect],
        width: u32,
        height: u32,
    ) -> bool {
        let (w, h) = (width as f32, height as f32);
        // (a) in bounds
        if anchor.x < 0.0 || anchor.y < 0.0 || anchor.x > w || anchor.y > h || !text_box.within(w, h) {
            return false;
        }
        // (b) clearance from every star, and no star under the box
        let min_dist = self.config.clearance - CLEARANCE_EPS;
        if stars
            .iter()
            .any(|s| nalgebra::distance(&anchor, &s.point()) < min_dist || text_box.contains(s.x as f32, s.y as f32))
        {
            return false;
        }
        // (c) no overlap with earlier labels
        let padded = text_box.expanded(self.config.label_gap / 2.0);
        !placed
            .iter()
            .any(|b| padded.intersects(&b.expanded(self.config.label_gap / 2.0)))
    }
}

fn normalize_angle(a: f32) -> f32 {
    let mut a = a % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Category, DisplaySize, Entity};
    use crate::star::Rgb;

    fn star(x: u32, y: u32) -> StarPosition {
        StarPosition {
            x,
            y,
            brightness: 200,
            estimated_radius: 2.0,
            color: Rgb::WHITE,
        }
    }

    fn assignment(s: &StarPosition, name: &str) -> Assignment {
        Assignment {
            star: s.clone(),
            entity: Entity {
                name: name.to_string(),
                category: Category::Backend,
                raw_count: 3,
                score: 75,
                display_size: DisplaySize::Medium,
            },
        }
    }

    fn angle_close(a: f32, b: f32) -> bool {
        normalize_angle(a - b).abs() < 1e-3
    }

    #[test]
    fn test_isolated_star_points_right() {
        let placer = LabelPlacer::default();
        let s = star(500, 500);
        assert_eq!(placer.optimal_direction(&s, &[s.clone()]), 0.0);
    }

    #[test]
    fn test_single_neighbor_opposite() {
        let placer = LabelPlacer::default();
        let s = star(500, 500);
        // Neighbor straight above (negative y); label should go down
        let dir = placer.optimal_direction(&s, &[s.clone(), star(500, 420)]);
        assert!(angle_close(dir, PI / 2.0), "dir {dir}");
    }

    #[test]
    fn test_widest_gap_midpoint() {
        let placer = LabelPlacer::default();
        let s = star(500, 500);
        // Neighbors right (0), down (π/2), left (π): widest gap is the upper half
        let others = [s.clone(), star(600, 500), star(500, 600), star(400, 500)];
        let dir = placer.optimal_direction(&s, &others);
        assert!(angle_close(dir, -PI / 2.0), "dir {dir}");
    }

    #[test]
    fn test_far_neighbors_ignored() {
        let placer = LabelPlacer::default();
        let s = star(500, 500);
        let dir = placer.optimal_direction(&s, &[s.clone(), star(900, 500)]);
        assert_eq!(dir, 0.0);
    }

    #[test]
    fn test_candidate_angles_alternate() {
        let placer = LabelPlacer::default();
        let angles = placer.candidate_angles(0.0);
        assert_eq!(angles.len(), 8);
        let step = PI / 4.0;
        let expected = [0.0, step, -step, 2.0 * step, -2.0 * step, 3.0 * step, -3.0 * step, PI];
        for (a, e) in angles.iter().zip(expected) {
            assert!(angle_close(*a, e), "{a} vs {e}");
        }
    }

    #[test]
    fn test_single_label_placed_right() {
        let placer = LabelPlacer::default();
        let s = star(300, 300);
        let report = placer.place(&[assignment(&s, "Rust")], &[s.clone()], 1024, 1024);
        assert_eq!(report.placements.len(), 1);
        assert_eq!(report.dropped, 0);
        let p = &report.placements[0];
        assert!((p.anchor.x - 360.0).abs() < 1e-3);
        assert!((p.anchor.y - 300.0).abs() < 1e-3);
        assert!((p.text_box.x - 360.0).abs() < 1e-3);
    }

    #[test]
    fn test_edge_star_flips_direction() {
        let placer = LabelPlacer::default();
        let s = star(1000, 500);
        let report = placer.place(&[assignment(&s, "Kubernetes")], &[s.clone()], 1024, 1024);
        assert_eq!(report.placements.len(), 1);
        let p = &report.placements[0];
        assert!(p.text_box.within(1024.0, 1024.0));
        assert!(p.anchor.x < 1000.0);
    }

    #[test]
    fn test_tiny_canvas_drops_label() {
        let placer = LabelPlacer::default();
        let s = star(20, 20);
        let report = placer.place(&[assignment(&s, "PostgreSQL")], &[s.clone()], 40, 40);
        assert!(report.placements.is_empty());
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_labels_do_not_overlap() {
        let placer = LabelPlacer::default();
        let stars = vec![star(400, 400), star(480, 400), star(440, 470)];
        let assignments: Vec<Assignment> = stars
            .iter()
            .enumerate()
            .map(|(i, s)| assignment(s, &format!("Technology{i}")))
            .collect();
        let report = placer.place(&assignments, &stars, 1024, 1024);
        assert_eq!(report.placements.len() + report.dropped, 3);
        for (i, a) in report.placements.iter().enumerate() {
            for b in &report.placements[i + 1..] {
                assert!(!a.text_box.intersects(&b.text_box));
            }
        }
    }

    #[test]
    fn test_rect_touching_does_not_intersect() {
        let a = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = Rect { x: 10.0, y: 0.0, width: 10.0, height: 10.0 };
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect { x: 9.0, ..b }));
    }

    #[test]
    fn test_measure() {
        let style = LabelStyle::default();
        let (w, h) = style.measure(&["Rust", "75%"]);
        assert!((w - (4.0 * 16.0 * 0.6 + 8.0)).abs() < 1e-3);
        assert!((h - (2.0 * 20.0 + 8.0)).abs() < 1e-3);
    }
}

//! Merge detections that belong to the same physical star.
//!
//! Two line endpoints meeting at a star, or a star split across two blobs,
//! show up as separate detections a few pixels apart. Detections within the
//! clustering radius are joined (single linkage) and replaced by one star at
//! the mean position, carrying the peak brightness and the color of the
//! brightest member. Merging repeats until no two outputs are closer than
//! the radius.

use crate::star::{sort_by_brightness, StarPosition};

/// Merge `stars` so that no two results lie within `radius` pixels.
///
/// The result is sorted by brightness (descending).
pub fn merge_nearby(stars: &[StarPosition], radius: f32) -> Vec<StarPosition> {
    // Each group keeps the raw detections it stands for.
    let mut groups: Vec<Vec<StarPosition>> = stars.iter().map(|s| vec![s.clone()]).collect();

    loop {
        let merged = merge_pass(&groups, radius);
        let changed = merged.len() != groups.len();
        groups = merged;
        if !changed {
            break;
        }
    }

    let mut out: Vec<StarPosition> = groups.iter().filter_map(|g| combine(g)).collect();
    sort_by_brightness(&mut out);
    out
}

fn merge_pass(groups: &[Vec<StarPosition>], radius: f32) -> Vec<Vec<StarPosition>> {
    let reps: Vec<StarPosition> = groups.iter().filter_map(|g| combine(g)).collect();
    let n = reps.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if reps[i].distance_to(&reps[j]) <= radius {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut out: Vec<Vec<StarPosition>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for (i, group) in groups.iter().enumerate() {
        let root = find(&mut parent, i);
        let slot = match slot_of_root[root] {
            Some(s) => s,
            None => {
                out.push(Vec::new());
                slot_of_root[root] = Some(out.len() - 1);
                out.len() - 1
            }
        };
        out[slot].extend(group.iter().cloned());
    }
    out
}

/// Collapse a group of member detections into one star.
fn combine(members: &[StarPosition]) -> Option<StarPosition> {
    let brightest = members.iter().reduce(|best, s| {
        if s.brightness > best.brightness {
            s
        } else {
            best
        }
    })?;
    let n = members.len() as f64;
    let mean_x = members.iter().map(|s| s.x as f64).sum::<f64>() / n;
    let mean_y = members.iter().map(|s| s.y as f64).sum::<f64>() / n;
    let radius = members
        .iter()
        .map(|s| s.estimated_radius)
        .fold(0.0f32, f32::max);

    Some(StarPosition {
        x: mean_x.round() as u32,
        y: mean_y.round() as u32,
        brightness: brightest.brightness,
        estimated_radius: radius,
        color: brightest.color,
    })
}

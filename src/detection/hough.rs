//! Straight line segment extraction from an edge mask.
//!
//! A Hough accumulator over `(rho, theta)` finds candidate lines; each peak
//! (strongest first) is then walked across the image to split it into
//! segments, bridging gaps up to `max_line_gap` pixels. Segments shorter than
//! `min_line_length` are discarded as nebula texture. Edge pixels claimed by
//! an accepted segment are removed so later, weaker peaks cannot report the
//! same segment twice.

use serde::Serialize;

/// A straight segment between two pixel positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineSegment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        ((self.x1 - self.x0).powi(2) + (self.y1 - self.y0).powi(2)).sqrt()
    }

    pub fn endpoints(&self) -> [(f32, f32); 2] {
        [(self.x0, self.y0), (self.x1, self.y1)]
    }
}

/// Parameters for segment extraction.
#[derive(Debug, Clone, Copy)]
pub struct HoughParams {
    /// Distance resolution of the accumulator in pixels.
    pub rho: f32,
    /// Angle resolution of the accumulator in radians.
    pub theta: f32,
    /// Minimum accumulator votes for a line.
    pub votes: u32,
    pub min_line_length: f32,
    pub max_line_gap: f32,
    /// Stop after this many segments.
    pub max_lines: usize,
}

/// Extract line segments from a row-major edge mask.
pub fn detect_segments(edges: &[bool], width: u32, height: u32, params: &HoughParams) -> Vec<LineSegment> {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || params.rho <= 0.0 || params.theta <= 0.0 || params.max_lines == 0 {
        return Vec::new();
    }

    let n_theta = ((std::f32::consts::PI / params.theta).round() as usize).max(1);
    let diag = ((w * w + h * h) as f32).sqrt();
    let rho_offset = (diag / params.rho).ceil() as usize;
    let n_rho = 2 * rho_offset + 1;

    let trig: Vec<(f32, f32)> = (0..n_theta)
        .map(|t| {
            let angle = t as f32 * params.theta;
            (angle.cos(), angle.sin())
        })
        .collect();

    // ── Voting ──
    let mut acc = vec![0u32; n_theta * n_rho];
    for (idx, _) in edges.iter().enumerate().filter(|(_, &e)| e) {
        let x = (idx % w) as f32;
        let y = (idx / w) as f32;
        for (t, &(c, s)) in trig.iter().enumerate() {
            let r = ((x * c + y * s) / params.rho).round() as isize + rho_offset as isize;
            acc[t * n_rho + r as usize] += 1;
        }
    }

    // ── Peaks: local maxima above the vote threshold, strongest first ──
    let mut peaks: Vec<(u32, usize, usize)> = Vec::new();
    for t in 0..n_theta {
        for r in 0..n_rho {
            let v = acc[t * n_rho + r];
            if v < params.votes.max(1) {
                continue;
            }
            let mut is_max = true;
            'neigh: for dt in -1isize..=1 {
                for dr in -1isize..=1 {
                    if dt == 0 && dr == 0 {
                        continue;
                    }
                    let tt = t as isize + dt;
                    let rr = r as isize + dr;
                    if tt < 0 || rr < 0 || tt >= n_theta as isize || rr >= n_rho as isize {
                        continue;
                    }
                    let nv = acc[tt as usize * n_rho + rr as usize];
                    // Plateaus resolve to the first cell in scan order.
                    if nv > v || (nv == v && (tt, rr) < (t as isize, r as isize)) {
                        is_max = false;
                        break 'neigh;
                    }
                }
            }
            if is_max {
                peaks.push((v, t, r));
            }
        }
    }
    peaks.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| (a.1, a.2).cmp(&(b.1, b.2))));

    // ── Walk each peak line and split into segments ──
    let mut remaining = edges.to_vec();
    let mut segments = Vec::new();
    for &(_, t, r) in &peaks {
        let (c, s) = trig[t];
        let rho_val = (r as f32 - rho_offset as f32) * params.rho;
        for seg in walk_line(&mut remaining, w, h, rho_val, c, s, diag, params) {
            segments.push(seg);
            if segments.len() >= params.max_lines {
                return segments;
            }
        }
    }
    segments
}

/// Walk the line `x·cos + y·sin = rho` across the image, collecting runs of
/// edge pixels. Pixels of accepted segments are cleared from `remaining`.
#[allow(clippy::too_many_arguments)]
fn walk_line(
    remaining: &mut [bool],
    w: usize,
    h: usize,
    rho: f32,
    c: f32,
    s: f32,
    diag: f32,
    params: &HoughParams,
) -> Vec<LineSegment> {
    let (px, py) = (rho * c, rho * s);
    let (dx, dy) = (-s, c);

    let pixel_at = |t: f32, off: f32| -> Option<usize> {
        let x = (px + t * dx + off * c).round();
        let y = (py + t * dy + off * s).round();
        if x < 0.0 || y < 0.0 || x >= w as f32 || y >= h as f32 {
            None
        } else {
            Some(y as usize * w + x as usize)
        }
    };

    struct Run {
        start_t: f32,
        last_t: f32,
        pixels: Vec<usize>,
    }

    let mut out = Vec::new();
    let mut current: Option<Run> = None;

    let close = |run: Run, remaining: &mut [bool], out: &mut Vec<LineSegment>| {
        let seg = LineSegment {
            x0: px + run.start_t * dx,
            y0: py + run.start_t * dy,
            x1: px + run.last_t * dx,
            y1: py + run.last_t * dy,
        };
        if seg.length() >= params.min_line_length {
            for idx in run.pixels {
                remaining[idx] = false;
            }
            out.push(seg);
        }
    };

    let steps = (2.0 * diag).ceil() as usize;
    for i in 0..=steps {
        let t = -diag + i as f32;
        let hits: Vec<usize> = [0.0f32, -1.0, 1.0]
            .iter()
            .filter_map(|&off| pixel_at(t, off))
            .filter(|&idx| remaining[idx])
            .collect();
        if hits.is_empty() {
            continue;
        }
        match current.as_mut() {
            Some(run) if t - run.last_t <= params.max_line_gap => {
                run.last_t = t;
                run.pixels.extend(hits);
            }
            _ => {
                if let Some(run) = current.take() {
                    close(run, remaining, &mut out);
                }
                current = Some(Run {
                    start_t: t,
                    last_t: t,
                    pixels: hits,
                });
            }
        }
    }
    if let Some(run) = current.take() {
        close(run, remaining, &mut out);
    }
    out
}

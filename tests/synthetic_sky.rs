//! Synthetic star fields shared by the integration tests.
//!
//! Stars are gray Gaussian spots and constellation lines are flat gray
//! strokes, both blended with `max` so a star's peak luminance is exactly
//! the requested value.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A star drawn into a synthetic sky.
#[derive(Debug, Clone, Copy)]
pub struct TrueStar {
    pub x: f32,
    pub y: f32,
    pub peak: u8,
}

/// Dark background with uniform per-pixel noise in `0..=max_noise`.
pub fn noisy_background(width: u32, height: u32, max_noise: u8, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| {
        let v: u8 = rng.gen_range(0..=max_noise);
        Rgb([v, v, v])
    })
}

fn blend_max(img: &mut RgbImage, x: u32, y: u32, v: u8) {
    let p = img.get_pixel_mut(x, y);
    for c in p.0.iter_mut() {
        *c = (*c).max(v);
    }
}

/// Gaussian spot with peak `star.peak` at its center.
pub fn draw_star(img: &mut RgbImage, star: TrueStar, sigma: f32) {
    let reach = (4.0 * sigma).ceil() as i64;
    let (cx, cy) = (star.x.round() as i64, star.y.round() as i64);
    for y in (cy - reach).max(0)..=(cy + reach).min(img.height() as i64 - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(img.width() as i64 - 1) {
            let d2 = ((x - cx).pow(2) + (y - cy).pow(2)) as f32;
            let v = star.peak as f32 * (-d2 / (2.0 * sigma * sigma)).exp();
            blend_max(img, x as u32, y as u32, v.round() as u8);
        }
    }
}

/// Flat stroke of the given width between two points.
pub fn draw_line(img: &mut RgbImage, a: (f32, f32), b: (f32, f32), width: f32, value: u8) {
    let half = width / 2.0;
    let x_lo = (a.0.min(b.0) - half).floor().max(0.0) as u32;
    let x_hi = ((a.0.max(b.0) + half).ceil() as u32).min(img.width() - 1);
    let y_lo = (a.1.min(b.1) - half).floor().max(0.0) as u32;
    let y_hi = ((a.1.max(b.1) + half).ceil() as u32).min(img.height() - 1);
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let (px, py) = (x as f32, y as f32);
            let t = if len2 > 0.0 {
                (((px - a.0) * dx + (py - a.1) * dy) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (qx, qy) = (a.0 + t * dx, a.1 + t * dy);
            if (px - qx).powi(2) + (py - qy).powi(2) <= half * half {
                blend_max(img, x, y, value);
            }
        }
    }
}

/// Five stars joined in a chain by faint lines, on a 512×512 noisy sky.
pub fn constellation_sky(seed: u64) -> (DynamicImage, Vec<TrueStar>) {
    let stars = vec![
        TrueStar { x: 80.0, y: 100.0, peak: 250 },
        TrueStar { x: 230.0, y: 70.0, peak: 245 },
        TrueStar { x: 380.0, y: 160.0, peak: 240 },
        TrueStar { x: 300.0, y: 330.0, peak: 235 },
        TrueStar { x: 120.0, y: 400.0, peak: 230 },
    ];
    let mut img = noisy_background(512, 512, 30, seed);
    for pair in stars.windows(2) {
        draw_line(&mut img, (pair[0].x, pair[0].y), (pair[1].x, pair[1].y), 3.0, 140);
    }
    for s in &stars {
        draw_star(&mut img, *s, 3.0);
    }
    (DynamicImage::ImageRgb8(img), stars)
}

/// Isolated stars with no lines.
pub fn starfield(width: u32, height: u32, stars: &[TrueStar], seed: u64) -> DynamicImage {
    let mut img = noisy_background(width, height, 30, seed);
    for s in stars {
        draw_star(&mut img, *s, 3.0);
    }
    DynamicImage::ImageRgb8(img)
}

/// Distance from a detection to the nearest drawn star.
pub fn nearest_true_star(x: u32, y: u32, stars: &[TrueStar]) -> f32 {
    stars
        .iter()
        .map(|s| ((x as f32 - s.x).powi(2) + (y as f32 - s.y).powi(2)).sqrt())
        .fold(f32::INFINITY, f32::min)
}

//! Grayscale conversion and edge-preserving smoothing.

use image::RgbImage;

/// Convert an RGB image to row-major luminance values in `0.0..=255.0`
/// using Rec. 709 weights.
pub fn to_grayscale_f32(img: &RgbImage) -> Vec<f32> {
    img.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
        })
        .collect()
}

/// Bilateral filter over a grayscale plane.
///
/// Each output pixel is the average of its `(2r+1)²` neighborhood weighted
/// by both spatial distance (`sigma_space`) and intensity difference
/// (`sigma_color`). Flat nebula texture is smoothed while the sharp edges of
/// constellation lines survive, which keeps the edge detector from firing on
/// background noise.
///
/// Pixels outside the image are skipped rather than padded.
pub fn bilateral_filter(
    gray: &[f32],
    width: u32,
    height: u32,
    radius: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> Vec<f32> {
    let w = width as usize;
    let h = height as usize;
    if radius == 0 || w == 0 || h == 0 || sigma_color <= 0.0 || sigma_space <= 0.0 {
        return gray.to_vec();
    }
    let r = radius as isize;
    let side = (2 * radius + 1) as usize;

    // Spatial kernel, row-major over (dy, dx)
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut spatial = Vec::with_capacity(side * side);
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dx * dx + dy * dy) as f32;
            spatial.push((d2 * space_coeff).exp());
        }
    }

    // Range kernel on integer intensity differences
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let range: Vec<f32> = (0..=255)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let center = gray[y * w + x];
            let mut sum = 0.0f32;
            let mut norm = 0.0f32;
            let mut k = 0;
            for dy in -r..=r {
                let yy = y as isize + dy;
                for dx in -r..=r {
                    let xx = x as isize + dx;
                    if yy < 0 || xx < 0 || yy >= h as isize || xx >= w as isize {
                        k += 1;
                        continue;
                    }
                    let v = gray[yy as usize * w + xx as usize];
                    let diff = ((v - center).abs().round() as usize).min(255);
                    let weight = spatial[k] * range[diff];
                    sum += weight * v;
                    norm += weight;
                    k += 1;
                }
            }
            out[y * w + x] = if norm > 0.0 { sum / norm } else { center };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale_weights() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        let gray = to_grayscale_f32(&img);
        assert!((gray[0] - 255.0).abs() < 0.1);
        assert!((gray[1] - 0.7152 * 255.0).abs() < 0.1);
    }

    #[test]
    fn test_bilateral_flat_image_unchanged() {
        let gray = vec![42.0f32; 16 * 16];
        let out = bilateral_filter(&gray, 16, 16, 2, 75.0, 75.0);
        assert!(out.iter().all(|&v| (v - 42.0).abs() < 1e-3));
    }

    #[test]
    fn test_bilateral_preserves_step_edge() {
        // Left half dark, right half bright
        let (w, h) = (20u32, 10u32);
        let gray: Vec<f32> = (0..w * h)
            .map(|i| if i % w < w / 2 { 10.0 } else { 240.0 })
            .collect();
        let out = bilateral_filter(&gray, w, h, 2, 30.0, 5.0);
        let row = 5 * w as usize;
        // Pixels adjacent to the edge keep most of their contrast
        assert!(out[row + 9] < 30.0, "dark side bled: {}", out[row + 9]);
        assert!(out[row + 10] > 220.0, "bright side bled: {}", out[row + 10]);
    }
}

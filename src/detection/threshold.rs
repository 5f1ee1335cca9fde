//! Brightness-threshold blob detection.
//!
//! Pixels at or above a luminance threshold are grouped into 8-connected
//! components. Each component whose size falls inside the accepted range and
//! which is not strongly elongated (line fragments, nebula filaments) becomes
//! one star at its intensity-weighted centroid.

use image::RgbImage;

use crate::star::{Rgb, StarPosition};

/// Parameters for a single threshold pass.
#[derive(Debug, Clone, Copy)]
pub struct BlobParams {
    /// Minimum luminance (inclusive) for a pixel to belong to a blob.
    pub threshold: u8,
    /// Smallest accepted blob, in pixels.
    pub min_pixels: usize,
    /// Largest accepted blob, in pixels.
    pub max_pixels: usize,
    /// Reject blobs whose major/minor axis ratio exceeds this.
    pub max_elongation: Option<f32>,
}

/// Find bright blobs in `gray` and return one star per accepted blob.
///
/// `rgb` supplies the color at each blob's peak pixel. Output order follows
/// component label order (row-major by first pixel); callers sort.
pub fn detect_bright_blobs(gray: &[f32], rgb: &RgbImage, params: &BlobParams) -> Vec<StarPosition> {
    let (width, height) = rgb.dimensions();
    let threshold = params.threshold as f32;
    let mask: Vec<bool> = gray.iter().map(|&v| v >= threshold).collect();
    if !mask.iter().any(|&m| m) {
        return Vec::new();
    }

    let labels = label_connected_components(&mask, width, height);
    let num_labels = labels.iter().copied().max().unwrap_or(0) as usize;
    blob_stars(gray, rgb, &labels, num_labels, threshold, params)
}

/// Label 8-connected components in a binary mask using two-pass union-find.
///
/// Labels are sequential from 1 in order of each component's first pixel;
/// background is 0.
pub(crate) fn label_connected_components(mask: &[bool], width: u32, height: u32) -> Vec<u32> {
    let w = width as usize;
    let h = height as usize;

    let mut labels = vec![0u32; w * h];
    // Index 0 is background
    let mut parent: Vec<u32> = vec![0];
    let mut next_label = 1u32;

    fn find(parent: &mut [u32], mut x: u32) -> u32 {
        while parent[x as usize] != x {
            parent[x as usize] = parent[parent[x as usize] as usize];
            x = parent[x as usize];
        }
        x
    }

    fn union(parent: &mut [u32], a: u32, b: u32) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra < rb {
            parent[rb as usize] = ra;
        } else if rb < ra {
            parent[ra as usize] = rb;
        }
    }

    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            if !mask[idx] {
                continue;
            }

            // Already-visited neighbors: left, above-left, above, above-right
            let mut neighbors = [0u32; 4];
            if col > 0 {
                neighbors[0] = labels[idx - 1];
            }
            if row > 0 {
                if col > 0 {
                    neighbors[1] = labels[idx - w - 1];
                }
                neighbors[2] = labels[idx - w];
                if col + 1 < w {
                    neighbors[3] = labels[idx - w + 1];
                }
            }

            match neighbors.iter().copied().filter(|&l| l > 0).min() {
                None => {
                    parent.push(next_label);
                    labels[idx] = next_label;
                    next_label += 1;
                }
                Some(min_label) => {
                    labels[idx] = min_label;
                    for &nl in neighbors.iter().filter(|&&l| l > 0) {
                        union(&mut parent, min_label, nl);
                    }
                }
            }
        }
    }

    // Flatten roots into sequential labels
    let mut root_to_seq = vec![0u32; parent.len()];
    let mut seq = 0u32;
    for label in labels.iter_mut() {
        if *label == 0 {
            continue;
        }
        let root = find(&mut parent, *label) as usize;
        if root_to_seq[root] == 0 {
            seq += 1;
            root_to_seq[root] = seq;
        }
        *label = root_to_seq[root];
    }
    labels
}

#[derive(Default)]
struct BlobAccum {
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
    sum_weight: f64,
    pixel_count: usize,
    peak_idx: usize,
    peak_val: f32,
}

fn blob_stars(
    gray: &[f32],
    rgb: &RgbImage,
    labels: &[u32],
    num_labels: usize,
    threshold: f32,
    params: &BlobParams,
) -> Vec<StarPosition> {
    let w = rgb.width() as usize;
    let mut accums: Vec<BlobAccum> = (0..=num_labels).map(|_| BlobAccum::default()).collect();

    for (idx, (&label, &val)) in labels.iter().zip(gray.iter()).enumerate() {
        if label == 0 {
            continue;
        }
        let x = (idx % w) as f64;
        let y = (idx / w) as f64;
        // Weight by how far the pixel rises above the threshold, so the
        // centroid leans toward the core.
        let weight = (val - threshold) as f64 + 1.0;

        let acc = &mut accums[label as usize];
        acc.sum_x += x * weight;
        acc.sum_y += y * weight;
        acc.sum_xx += x * x * weight;
        acc.sum_yy += y * y * weight;
        acc.sum_xy += x * y * weight;
        acc.sum_weight += weight;
        if acc.pixel_count == 0 || val > acc.peak_val {
            acc.peak_val = val;
            acc.peak_idx = idx;
        }
        acc.pixel_count += 1;
    }

    accums
        .into_iter()
        .skip(1)
        .filter_map(|acc| {
            if acc.pixel_count < params.min_pixels
                || acc.pixel_count > params.max_pixels
                || acc.sum_weight <= 0.0
            {
                return None;
            }

            let cx = acc.sum_x / acc.sum_weight;
            let cy = acc.sum_y / acc.sum_weight;

            if let Some(max_elong) = params.max_elongation {
                let cxx = acc.sum_xx / acc.sum_weight - cx * cx;
                let cyy = acc.sum_yy / acc.sum_weight - cy * cy;
                let cxy = acc.sum_xy / acc.sum_weight - cx * cy;
                let trace = cxx + cyy;
                let det = cxx * cyy - cxy * cxy;
                let disc = (trace * trace - 4.0 * det).max(0.0).sqrt();
                let lambda_max = (trace + disc) / 2.0;
                let lambda_min = (trace - disc).max(1e-12) / 2.0;
                let elongation = (lambda_max / lambda_min).sqrt() as f32;
                if lambda_max > 1e-9 && elongation > max_elong {
                    return None;
                }
            }

            let peak_x = (acc.peak_idx % w) as u32;
            let peak_y = (acc.peak_idx / w) as u32;
            Some(StarPosition {
                x: cx.round().max(0.0) as u32,
                y: cy.round().max(0.0) as u32,
                brightness: acc.peak_val.round().clamp(0.0, 255.0) as u8,
                estimated_radius: (acc.pixel_count as f32 / std::f32::consts::PI).sqrt(),
                color: Rgb(rgb.get_pixel(peak_x, peak_y).0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::filters::to_grayscale_f32;
    use image::Rgb as PixelRgb;

    fn params(threshold: u8) -> BlobParams {
        BlobParams {
            threshold,
            min_pixels: 3,
            max_pixels: 5000,
            max_elongation: Some(4.0),
        }
    }

    fn disk(img: &mut RgbImage, cx: i32, cy: i32, r: i32, value: u8) {
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r
                    && x >= 0
                    && y >= 0
                    && (x as u32) < img.width()
                    && (y as u32) < img.height()
                {
                    img.put_pixel(x as u32, y as u32, PixelRgb([value, value, value]));
                }
            }
        }
    }

    #[test]
    fn test_connected_components_8conn() {
        #[rustfmt::skip]
        let mask = vec![
            true,  false, false, false,
            false, true,  false, true,
            false, false, false, true,
        ];
        let labels = label_connected_components(&mask, 4, 3);
        // Diagonal neighbors join under 8-connectivity
        assert_eq!(labels[0], labels[5]);
        assert_eq!(labels[7], labels[11]);
        assert_ne!(labels[0], labels[7]);
        assert_eq!(labels.iter().copied().max(), Some(2));
    }

    #[test]
    fn test_u_shape_merges() {
        #[rustfmt::skip]
        let mask = vec![
            true,  false, true,
            true,  false, true,
            true,  true,  true,
        ];
        let labels = label_connected_components(&mask, 3, 3);
        assert!(labels.iter().filter(|&&l| l > 0).all(|&l| l == 1));
    }

    #[test]
    fn test_two_disks_found() {
        let mut img = RgbImage::new(64, 64);
        disk(&mut img, 15, 20, 3, 230);
        disk(&mut img, 45, 40, 2, 210);
        let gray = to_grayscale_f32(&img);
        let stars = detect_bright_blobs(&gray, &img, &params(200));
        assert_eq!(stars.len(), 2);
        assert_eq!((stars[0].x, stars[0].y), (15, 20));
        assert_eq!((stars[1].x, stars[1].y), (45, 40));
        assert_eq!(stars[0].brightness, 230);
        assert!(stars[0].estimated_radius > stars[1].estimated_radius);
    }

    #[test]
    fn test_threshold_excludes_dim() {
        let mut img = RgbImage::new(32, 32);
        disk(&mut img, 16, 16, 2, 150);
        let gray = to_grayscale_f32(&img);
        assert!(detect_bright_blobs(&gray, &img, &params(200)).is_empty());
        assert_eq!(detect_bright_blobs(&gray, &img, &params(140)).len(), 1);
    }

    #[test]
    fn test_single_pixels_below_min_size() {
        let mut img = RgbImage::new(16, 16);
        img.put_pixel(4, 4, PixelRgb([255, 255, 255]));
        img.put_pixel(10, 10, PixelRgb([255, 255, 255]));
        let gray = to_grayscale_f32(&img);
        assert!(detect_bright_blobs(&gray, &img, &params(200)).is_empty());
    }

    #[test]
    fn test_elongated_blob_rejected() {
        let mut img = RgbImage::new(64, 16);
        for x in 5..50 {
            img.put_pixel(x, 8, PixelRgb([255, 255, 255]));
        }
        let gray = to_grayscale_f32(&img);
        assert!(detect_bright_blobs(&gray, &img, &params(200)).is_empty());
    }

    #[test]
    fn test_color_sampled_at_peak() {
        let mut img = RgbImage::new(32, 32);
        disk(&mut img, 10, 10, 2, 220);
        img.put_pixel(10, 10, PixelRgb([255, 240, 200]));
        let gray = to_grayscale_f32(&img);
        let stars = detect_bright_blobs(&gray, &img, &params(200));
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].color, Rgb([255, 240, 200]));
    }

    #[test]
    fn test_all_white_image_is_one_oversized_blob() {
        let img = RgbImage::from_pixel(100, 100, PixelRgb([255, 255, 255]));
        let gray = to_grayscale_f32(&img);
        assert!(detect_bright_blobs(&gray, &img, &params(200)).is_empty());
    }
}

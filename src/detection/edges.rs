//! Canny edge detection on a pre-smoothed grayscale plane.
//!
//! 1. Sobel gradients (L1 magnitude `|gx| + |gy|`)
//! 2. Non-maximum suppression along the quantized gradient direction
//! 3. Double threshold and hysteresis: weak edges survive only when
//!    8-connected to a strong edge

/// tan(22.5°) and tan(67.5°), the sector boundaries for direction quantization.
const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Run Canny on `gray` and return a row-major edge mask.
///
/// Border pixels never carry edges.
pub fn canny(gray: &[f32], width: u32, height: u32, low: f32, high: f32) -> Vec<bool> {
    let w = width as usize;
    let h = height as usize;
    let mut edges = vec![false; w * h];
    if w < 3 || h < 3 {
        return edges;
    }
    let (low, high) = if low <= high { (low, high) } else { (high, low) };

    // ── Step 1: Sobel gradients ──
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    let mut mag = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: isize, dy: isize| -> f32 {
                gray[(y as isize + dy) as usize * w + (x as isize + dx) as usize]
            };
            let sx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let sy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            let idx = y * w + x;
            gx[idx] = sx;
            gy[idx] = sy;
            mag[idx] = sx.abs() + sy.abs();
        }
    }

    // ── Step 2: non-maximum suppression ──
    let mut thin = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let m = mag[idx];
            if m <= low {
                continue;
            }
            let ax = gx[idx].abs();
            let ay = gy[idx].abs();
            let (prev, next) = if ay <= ax * TAN_22_5 {
                (idx - 1, idx + 1)
            } else if ay >= ax * TAN_67_5 {
                (idx - w, idx + w)
            } else if gx[idx] * gy[idx] > 0.0 {
                (idx - w - 1, idx + w + 1)
            } else {
                (idx - w + 1, idx + w - 1)
            };
            if m > mag[prev] && m >= mag[next] {
                thin[idx] = m;
            }
        }
    }

    // ── Step 3: hysteresis ──
    let mut stack: Vec<usize> = Vec::new();
    for (idx, &m) in thin.iter().enumerate() {
        if m > high {
            edges[idx] = true;
            stack.push(idx);
        }
    }
    while let Some(idx) = stack.pop() {
        let x = idx % w;
        let y = idx / w;
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let nidx = ny as usize * w + nx as usize;
                if !edges[nidx] && thin[nidx] > low {
                    edges[nidx] = true;
                    stack.push(nidx);
                }
            }
        }
    }

    edges
}

use serde::Serialize;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// A star detected in the generated image.
///
/// Positions are in pixel coordinates with the origin at the top-left corner,
/// +X right and +Y down. A star has no identity beyond its position: two
/// detections closer than the clustering radius are the same physical star.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarPosition {
    pub x: u32,
    pub y: u32,
    /// Peak luminance in `0..=255`.
    pub brightness: u8,
    /// Approximate radius of the bright core, in pixels.
    pub estimated_radius: f32,
    /// Color sampled at the peak pixel.
    pub color: Rgb,
}

impl StarPosition {
    /// Position as a floating point vector, for geometry.
    pub fn point(&self) -> nalgebra::Point2<f32> {
        nalgebra::Point2::new(self.x as f32, self.y as f32)
    }

    /// Euclidean distance in pixels to another star.
    pub fn distance_to(&self, other: &StarPosition) -> f32 {
        nalgebra::distance(&self.point(), &other.point())
    }
}

/// Sort stars by brightness (descending), breaking ties by position so the
/// order is fully deterministic.
pub fn sort_by_brightness(stars: &mut [StarPosition]) {
    stars.sort_by(|a, b| {
        b.brightness
            .cmp(&a.brightness)
            .then_with(|| a.y.cmp(&b.y))
            .then_with(|| a.x.cmp(&b.x))
    });
}

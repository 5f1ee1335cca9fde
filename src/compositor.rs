//! Text overlay rendering.
//!
//! The title, label panels and watermark are described as one SVG document,
//! rendered with resvg onto a transparent pixmap the size of the base image,
//! then alpha-blended onto an RGB copy of the base. The base image itself is
//! never modified.

use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_skia::{Pixmap, Transform};
use tracing::debug;
use usvg::{fontdb, Options, Tree};

use crate::layout::{LabelPlacement, LabelStyle};

/// Rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("overlay SVG rejected: {0}")]
    Svg(String),
}

/// Appearance of the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Default: "DejaVu Sans"
    pub font_family: String,
    /// Default: 48.0
    pub title_font_size: f32,
    /// Distance from the top edge to the top of the title.
    /// Default: 50.0
    pub title_top: f32,
    /// Default: 12.0
    pub watermark_font_size: f32,
    /// Default: "constellation.tech"
    pub watermark_text: String,
    /// Distance of the watermark from the bottom-right corner.
    /// Default: 20.0
    pub watermark_margin: f32,
    /// Default: 0.39
    pub watermark_opacity: f32,
    /// Opacity of the black panel behind each label.
    /// Default: 0.6
    pub panel_opacity: f32,
    /// Tint the entity name with its category color instead of white.
    /// Default: true
    pub tint_names: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_family: "DejaVu Sans".to_string(),
            title_font_size: 48.0,
            title_top: 50.0,
            watermark_font_size: 12.0,
            watermark_text: "constellation.tech".to_string(),
            watermark_margin: 20.0,
            watermark_opacity: 0.39,
            panel_opacity: 0.6,
            tint_names: true,
        }
    }
}

/// Renders overlays onto base images.
///
/// System fonts are loaded once at construction.
#[derive(Clone)]
pub struct Compositor {
    config: RenderConfig,
    style: LabelStyle,
    fontdb: Arc<fontdb::Database>,
}

impl Compositor {
    pub fn new(config: RenderConfig, style: LabelStyle) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("Compositor loaded {} font faces", db.len());
        Self {
            config,
            style,
            fontdb: Arc::new(db),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `title`, one panel per placement, and the watermark onto a copy
    /// of `base`.
    pub fn compose(&self, base: &DynamicImage, title: &str, placements: &[LabelPlacement]) -> Result<DynamicImage, RenderError> {
        let (width, height) = (base.width(), base.height());
        let svg = self.build_svg(width, height, title, placements);

        let options = Options {
            fontdb: self.fontdb.clone(),
            font_family: self.config.font_family.clone(),
            ..Default::default()
        };
        let tree = Tree::from_str(&svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;
        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Canvas { width, height })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

        let mut out: RgbImage = base.to_rgb8();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let Some(overlay) = pixmap.pixel(x, y) else {
                continue;
            };
            if overlay.alpha() == 0 {
                continue;
            }
            let c = overlay.demultiply();
            let a = c.alpha();
            *pixel = Rgb([
                blend_channel(pixel[0], c.red(), a),
                blend_channel(pixel[1], c.green(), a),
                blend_channel(pixel[2], c.blue(), a),
            ]);
        }
        debug!("Composited {} labels onto {}x{} image", placements.len(), width, height);
        Ok(DynamicImage::ImageRgb8(out))
    }

    /// The overlay as an SVG document.
    pub fn build_svg(&self, width: u32, height: u32, title: &str, placements: &[LabelPlacement]) -> String {
        let c = &self.config;
        let s = &self.style;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="{}">"#,
            escape_xml(&c.font_family)
        );

        // Title with drop shadow
        if !title.is_empty() {
            let cx = width as f32 / 2.0;
            let baseline = c.title_top + c.title_font_size;
            let text = escape_xml(title);
            svg.push_str(&format!(
                r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" font-weight="bold" text-anchor="middle" fill="black" fill-opacity="0.5">{text}</text>"#,
                cx + 2.0,
                baseline + 2.0,
                c.title_font_size
            ));
            svg.push_str(&format!(
                r#"<text x="{cx:.1}" y="{baseline:.1}" font-size="{:.1}" font-weight="bold" text-anchor="middle" fill="white">{text}</text>"#,
                c.title_font_size
            ));
        }

        for p in placements {
            let b = &p.text_box;
            let line = s.font_size * s.line_height;
            let text_x = b.x + s.padding;
            // Baselines sit at ~80% of each line box
            let name_y = b.y + s.padding + 0.8 * line;
            let weight_y = name_y + line;
            let name_fill = if c.tint_names {
                p.assignment.entity.color()
            } else {
                "white"
            };
            svg.push_str(&format!(
                r#"<g><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="black" fill-opacity="{:.2}"/>"#,
                b.x, b.y, b.width, b.height, c.panel_opacity
            ));
            svg.push_str(&format!(
                r#"<text x="{text_x:.1}" y="{name_y:.1}" font-size="{:.1}" fill="{name_fill}">{}</text>"#,
                s.font_size,
                escape_xml(&p.text.name)
            ));
            svg.push_str(&format!(
                r#"<text x="{text_x:.1}" y="{weight_y:.1}" font-size="{:.1}" fill="white">{}</text></g>"#,
                s.font_size,
                escape_xml(&p.text.weight)
            ));
        }

        if !c.watermark_text.is_empty() {
            svg.push_str(&format!(
                r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" text-anchor="end" fill="white" fill-opacity="{:.2}">{}</text>"#,
                width as f32 - c.watermark_margin,
                height as f32 - c.watermark_margin,
                c.watermark_font_size,
                c.watermark_opacity,
                escape_xml(&c.watermark_text)
            ));
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(RenderConfig::default(), LabelStyle::default())
    }
}

fn blend_channel(base: u8, overlay: u8, alpha: u8) -> u8 {
    let a = alpha as f32 / 255.0;
    (base as f32 * (1.0 - a) + overlay as f32 * a).round() as u8
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

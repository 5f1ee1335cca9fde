//! Prompt text for the external image generator.

use tracing::{debug, warn};

use crate::entity::{Category, DominantCategory};

/// Generators draw clean constellations only from this many stars up.
const MIN_PROMPT_STARS: usize = 3;

const STYLE_VARIATIONS: [&str; 4] = [
    "Professional, stunning, captivating, high quality.",
    "Breathtaking, elegant, professional quality.",
    "Impressive, sophisticated, premium quality.",
    "Stunning professional visualization, high quality.",
];

/// Palette hint for the dominant category.
pub fn color_hint(dominant: DominantCategory) -> &'static str {
    match dominant {
        DominantCategory::Fullstack => "multicolor spectrum",
        DominantCategory::Category(c) => match c {
            Category::Frontend => "warm colors (red, orange, gold)",
            Category::Backend => "cool colors (blue, teal, cyan)",
            Category::Database => "structured colors (blue, purple, silver)",
            Category::DevOps => "technical colors (blue, green, cyan)",
            Category::AiMl => "vibrant colors (purple, magenta, pink)",
            Category::Mobile => "dynamic colors (blue, green, orange)",
            Category::Testing => "precise colors (green, blue, white)",
            Category::Cloud => "ethereal colors (white, blue, cyan)",
            Category::Other => "multicolor spectrum",
        },
    }
}

/// Build the generation prompt for `star_count` stars.
///
/// The count is clamped to `3..=max_stars` (the label cap); `style_index`
/// picks one of a few closing style lines.
pub fn build_prompt(star_count: usize, max_stars: usize, dominant: DominantCategory, style_index: usize) -> String {
    let stars = star_count.clamp(MIN_PROMPT_STARS, max_stars.max(MIN_PROMPT_STARS));
    if stars != star_count {
        warn!("Prompt star count {} clamped to {}", star_count, stars);
    }
    let style = STYLE_VARIATIONS[style_index % STYLE_VARIATIONS.len()];
    let prompt = format!(
        "Beautiful cosmic constellation with {stars} bright stars.\n\
         Stars of various sizes, connected with thin elegant luminous lines.\n\
         Colors: {}.\n\
         Magnificent deep space nebula background.\n\
         {style}",
        color_hint(dominant)
    );
    debug!("Prompt for {} stars ({}): {} chars", stars, dominant, prompt.len());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_star_count_and_hint() {
        let p = build_prompt(8, 15, DominantCategory::Category(Category::Backend), 0);
        assert!(p.contains("8 bright stars"));
        assert!(p.contains("cool colors"));
        assert!(p.ends_with("high quality."));
    }

    #[test]
    fn test_count_clamped() {
        assert!(build_prompt(1, 15, DominantCategory::Fullstack, 0).contains("3 bright stars"));
        assert!(build_prompt(40, 15, DominantCategory::Fullstack, 0).contains("15 bright stars"));
        assert!(build_prompt(2, 2, DominantCategory::Fullstack, 0).contains("3 bright stars"));
    }

    #[test]
    fn test_raised_label_cap_raises_prompt_count() {
        let p = build_prompt(20, 20, DominantCategory::Fullstack, 0);
        assert!(p.starts_with("Beautiful cosmic constellation with 20 bright stars."));
        assert!(build_prompt(25, 20, DominantCategory::Fullstack, 0).contains("20 bright stars"));
    }

    #[test]
    fn test_style_wraps() {
        let d = DominantCategory::Category(Category::Other);
        assert_eq!(build_prompt(5, 15, d, 1), build_prompt(5, 15, d, 5));
    }
}

//! Scored, categorized entities and the profile derived from them.
//!
//! Entities are produced once per request by [`crate::scoring::EntityScorer`]
//! and never mutated afterward. Everything downstream (mapping, layout,
//! compositing) only reads them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Technology category.
///
/// Declaration order is the fixed priority order used to break ties when
/// picking a dominant category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Frontend,
    Backend,
    Database,
    DevOps,
    #[serde(rename = "AI_ML")]
    AiMl,
    Mobile,
    Testing,
    Cloud,
    Other,
}

impl Category {
    /// All categories in priority order.
    pub const ALL: [Category; 9] = [
        Category::Frontend,
        Category::Backend,
        Category::Database,
        Category::DevOps,
        Category::AiMl,
        Category::Mobile,
        Category::Testing,
        Category::Cloud,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Frontend => "Frontend",
            Category::Backend => "Backend",
            Category::Database => "Database",
            Category::DevOps => "DevOps",
            Category::AiMl => "AI_ML",
            Category::Mobile => "Mobile",
            Category::Testing => "Testing",
            Category::Cloud => "Cloud",
            Category::Other => "Other",
        }
    }

    /// Hex color associated with the category, used to tint labels.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Frontend => "#DD0031",
            Category::Backend => "#009688",
            Category::Database => "#4479A1",
            Category::DevOps => "#326CE5",
            Category::AiMl => "#FF6F00",
            Category::Mobile => "#02569B",
            Category::Testing => "#99425B",
            Category::Cloud => "#FF9900",
            Category::Other => "#808080",
        }
    }

    /// Case-insensitive parse accepting the display names plus a few aliases.
    pub fn parse(s: &str) -> Option<Category> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let cat = match normalized.as_str() {
            "frontend" => Category::Frontend,
            "backend" => Category::Backend,
            "database" | "db" => Category::Database,
            "devops" => Category::DevOps,
            "ai_ml" | "aiml" | "ai" | "ml" => Category::AiMl,
            "mobile" => Category::Mobile,
            "testing" | "test" => Category::Testing,
            "cloud" => Category::Cloud,
            "other" => Category::Other,
            _ => return None,
        };
        Some(cat)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual size bucket derived from the score quartile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySize {
    Tiny,
    Small,
    Medium,
    Large,
}

/// Experience level derived from the number of distinct entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Junior,
    Intermediate,
    Senior,
    Expert,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Junior => "Junior",
            Level::Intermediate => "Intermediate",
            Level::Senior => "Senior",
            Level::Expert => "Expert",
        };
        f.write_str(s)
    }
}

/// A scored, categorized entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// Display name (canonical spelling).
    pub name: String,
    pub category: Category,
    /// Accumulated occurrence count over all raw observations of this term.
    pub raw_count: u32,
    /// Relevance score in `0..=100`.
    pub score: u8,
    #[serde(rename = "size")]
    pub display_size: DisplaySize,
}

impl Entity {
    /// Category color, for UI consumers.
    pub fn color(&self) -> &'static str {
        self.category.color()
    }
}

/// Dominant profile classification: a single category or the breadth-oriented
/// "Fullstack" classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominantCategory {
    Fullstack,
    Category(Category),
}

impl fmt::Display for DominantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DominantCategory::Fullstack => f.write_str("Fullstack"),
            DominantCategory::Category(c) => f.write_str(c.as_str()),
        }
    }
}

impl Serialize for DominantCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Profile classification computed once from the entity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub total_entities: usize,
    /// Entity count per category; only non-zero categories are present.
    pub category_counts: BTreeMap<Category, usize>,
    pub dominant_category: DominantCategory,
    pub level: Level,
}

impl ProfileStats {
    /// Stats for an empty entity list.
    pub fn empty() -> Self {
        Self {
            total_entities: 0,
            category_counts: BTreeMap::new(),
            dominant_category: DominantCategory::Category(Category::Other),
            level: Level::Junior,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_aliases() {
        assert_eq!(Category::parse("AI_ML"), Some(Category::AiMl));
        assert_eq!(Category::parse("ai-ml"), Some(Category::AiMl));
        assert_eq!(Category::parse(" DevOps "), Some(Category::DevOps));
        assert_eq!(Category::parse("astrology"), None);
    }

    #[test]
    fn test_dominant_category_serializes_as_string() {
        let json = serde_json::to_string(&DominantCategory::Fullstack).unwrap();
        assert_eq!(json, "\"Fullstack\"");
        let json = serde_json::to_string(&DominantCategory::Category(Category::AiMl)).unwrap();
        assert_eq!(json, "\"AI_ML\"");
    }

    #[test]
    fn test_priority_order_matches_declaration() {
        let mut sorted = Category::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Category::ALL.to_vec());
    }
}

//! Constellation titles.
//!
//! Each dominant category has a bank of invented constellation names. The
//! pick is a stable hash of the profile, so identical input always gets the
//! identical title.

use tracing::debug;

use crate::entity::{Category, DominantCategory, Entity};

pub const FALLBACK_TITLE: &str = "La Constellation du Code Universel";

/// Profiles with at least this many entities get the count appended.
const ENRICH_MIN_ENTITIES: usize = 10;

const FULLSTACK: &[&str] = &[
    "L'Architecte des Deux Mondes",
    "La Constellation Complète",
    "Le Pont Entre les Étoiles",
    "L'Équilibre Parfait du Code",
    "La Symphonie Full-Stack",
    "Le Tisseur d'Architectures",
    "Le Maître des Galaxies Connectées",
    "Le Nexus des Compétences Infinies",
];

const FRONTEND: &[&str] = &[
    "La Constellation du Pixel Parfait",
    "L'Étoile d'Argent des Interfaces",
    "La Nebula de l'Expérience Visuelle",
    "Les Forges Lumineuses du Frontend",
    "Le Sanctuaire des Écrans Enchantés",
    "La Galaxie des Pixels Animés",
    "Les Artisans du Rendu Visuel",
];

const BACKEND: &[&str] = &[
    "Les Forges d'Orion Backend",
    "La Nebula des Architectures Invisibles",
    "Le Gardien de la Constellation Serveur",
    "L'Anneau Stellaire des API",
    "Les Piliers Cosmiques du Code",
    "La Citadelle des Serveurs",
    "La Matrice des Traitements Asynchrones",
];

const DATABASE: &[&str] = &[
    "Le Sanctuaire des Données Éternelles",
    "La Constellation des Schémas Sacrés",
    "Les Coffres Stellaires de l'Information",
    "La Nebula des Requêtes Infinies",
    "L'Univers des Transactions ACID",
    "La Forteresse des Données Persistantes",
];

const DEVOPS: &[&str] = &[
    "La Chaîne Stellaire DevOps",
    "Le Gardien des Voies Cosmiques",
    "La Constellation du Déploiement Continu",
    "Les Sentinelles de l'Infrastructure",
    "L'Anneau des Pipelines Automatiques",
    "La Voie de la Livraison Continue",
];

const AI_ML: &[&str] = &[
    "La Nebula de l'Intelligence Artificielle",
    "Les Forges d'Algorithmes Quantiques",
    "La Constellation des Modèles Prédictifs",
    "Le Sanctuaire de l'Apprentissage Machine",
    "Les Architectes des Réseaux Neuronaux",
    "La Galaxie des Modèles Génératifs",
];

const MOBILE: &[&str] = &[
    "La Constellation des Interfaces Nomades",
    "L'Étoile Tactile du Mobile",
    "Les Navigateurs de l'Espace Portable",
    "La Nebula des Applications Mobiles",
    "Les Architectes Cross-Platform",
];

const TESTING: &[&str] = &[
    "Le Gardien de la Qualité Stellaire",
    "La Constellation des Tests Infaillibles",
    "Les Sentinelles de la Fiabilité",
    "L'Anneau de Validation Continue",
    "Les Gardiens de la Non-Régression",
];

const CLOUD: &[&str] = &[
    "La Nebula des Nuages Infinis",
    "Les Maîtres de l'Infrastructure Céleste",
    "La Constellation de l'Échelle Cosmique",
    "Les Gardiens de la Voûte Cloud",
    "La Galaxie des Serverless Functions",
];

const OTHER: &[&str] = &[
    FALLBACK_TITLE,
    "Les Forges de l'Innovation Numérique",
    "La Nebula des Solutions Hybrides",
    "Le Sanctuaire Technologique",
    "Les Navigateurs du Cosmos Digital",
    "Les Pionniers des Technologies Émergentes",
];

/// The title bank for a dominant category.
pub fn metaphors(dominant: DominantCategory) -> &'static [&'static str] {
    match dominant {
        DominantCategory::Fullstack => FULLSTACK,
        DominantCategory::Category(c) => match c {
            Category::Frontend => FRONTEND,
            Category::Backend => BACKEND,
            Category::Database => DATABASE,
            Category::DevOps => DEVOPS,
            Category::AiMl => AI_ML,
            Category::Mobile => MOBILE,
            Category::Testing => TESTING,
            Category::Cloud => CLOUD,
            Category::Other => OTHER,
        },
    }
}

/// Pick a title for the profile.
///
/// Large profiles get the entity count appended, e.g.
/// `"La Constellation Complète (12 Technologies)"`.
pub fn generate_title(dominant: DominantCategory, entities: &[Entity]) -> String {
    let bank = metaphors(dominant);
    let base = if bank.is_empty() {
        FALLBACK_TITLE
    } else {
        bank[(profile_hash(dominant, entities) % bank.len() as u64) as usize]
    };
    let title = if entities.len() >= ENRICH_MIN_ENTITIES {
        format!("{} ({} Technologies)", base, entities.len())
    } else {
        base.to_string()
    };
    debug!("Title for {}: {}", dominant, title);
    title
}

/// FNV-1a over the dominant category and the sorted entity names.
fn profile_hash(dominant: DominantCategory, entities: &[Entity]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();

    let mut hash = OFFSET;
    let dominant = dominant.to_string();
    for part in std::iter::once(dominant.as_str()).chain(names) {
        for byte in part.bytes().chain(std::iter::once(0u8)) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DisplaySize;

    fn entity(name: &str) -> Entity {
        Entity {
            name: name.to_string(),
            category: Category::Frontend,
            raw_count: 1,
            score: 50,
            display_size: DisplaySize::Medium,
        }
    }

    #[test]
    fn test_deterministic() {
        let es = vec![entity("Angular"), entity("React")];
        let d = DominantCategory::Category(Category::Frontend);
        assert_eq!(generate_title(d, &es), generate_title(d, &es));
        assert!(FRONTEND.contains(&generate_title(d, &es).as_str()));
    }

    #[test]
    fn test_order_independent() {
        let d = DominantCategory::Fullstack;
        let a = vec![entity("Angular"), entity("Python"), entity("Docker")];
        let b = vec![entity("Docker"), entity("Angular"), entity("Python")];
        assert_eq!(generate_title(d, &a), generate_title(d, &b));
    }

    #[test]
    fn test_enriched_with_count() {
        let es: Vec<Entity> = (0..12).map(|i| entity(&format!("T{i}"))).collect();
        let title = generate_title(DominantCategory::Fullstack, &es);
        assert!(title.ends_with("(12 Technologies)"));
    }

    #[test]
    fn test_every_bank_non_empty() {
        assert!(!metaphors(DominantCategory::Fullstack).is_empty());
        for c in Category::ALL {
            assert!(!metaphors(DominantCategory::Category(c)).is_empty());
        }
    }
}

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// The six fixed catalog categories. Serialized with the studio's own labels.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
    strum::AsRefStr,
)]
pub enum ServiceCategory {
    #[serde(rename = "ILUSTRACIÓN DIGITAL")]
    #[strum(serialize = "ILUSTRACIÓN DIGITAL")]
    DigitalIllustration,
    #[serde(rename = "ANIMACIÓN 2D")]
    #[strum(serialize = "ANIMACIÓN 2D")]
    Animation2d,
    #[serde(rename = "ANIMACIÓN 3D")]
    #[strum(serialize = "ANIMACIÓN 3D")]
    Animation3d,
    #[serde(rename = "MOTION GRAPHICS")]
    #[strum(serialize = "MOTION GRAPHICS")]
    MotionGraphics,
    #[serde(rename = "CHARACTER DESIGN")]
    #[strum(serialize = "CHARACTER DESIGN")]
    CharacterDesign,
    #[serde(rename = "STORYBOARDS")]
    #[strum(serialize = "STORYBOARDS")]
    Storyboards,
}

impl ServiceCategory {
    pub fn all() -> Vec<ServiceCategory> {
        ServiceCategory::iter().collect()
    }
}

/// A sellable catalog offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: ServiceCategory,
    pub description: String,
    pub price: Decimal,
    /// Billing unit, e.g. "proyecto", "minuto", "frame".
    pub unit: String,
    pub delivery_time: String,
    pub image: String,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Service {
    /// Case-insensitive match against name or category label.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.category.as_ref().to_lowercase().contains(&needle)
    }
}

#[allow(clippy::too_many_arguments)]
fn service(
    id: &str,
    name: &str,
    category: ServiceCategory,
    description: &str,
    price: Decimal,
    unit: &str,
    delivery_time: &str,
    variations: &[&str],
    image_seed: &str,
) -> Service {
    Service {
        id: id.to_string(),
        name: name.to_string(),
        category,
        description: description.to_string(),
        price,
        unit: unit.to_string(),
        delivery_time: delivery_time.to_string(),
        image: format!("https://picsum.photos/seed/{}/800/600", image_seed),
        variations: variations.iter().map(|v| v.to_string()).collect(),
        active: true,
    }
}

/// Catalog used to seed an empty cache.
pub fn default_catalog() -> Vec<Service> {
    vec![
        service(
            "1",
            "Ilustración Digital Full Color",
            ServiceCategory::DigitalIllustration,
            "Ilustración detallada de alta resolución ideal para portadas, posters o publicidad.",
            dec!(250),
            "proyecto",
            "5-7 días",
            &["Retrato", "Paisaje", "Concept Art"],
            "art1",
        ),
        service(
            "2",
            "Animación Explainer 2D",
            ServiceCategory::Animation2d,
            "Video explicativo en motion graphics para empresas y startups.",
            dec!(150),
            "minuto",
            "10-15 días",
            &["Vectorial", "Cut-out"],
            "anim2",
        ),
        service(
            "3",
            "Modelado y Render 3D",
            ServiceCategory::Animation3d,
            "Creación de assets 3D de alta fidelidad con texturas PBR.",
            dec!(400),
            "asset",
            "7-10 días",
            &["Low Poly", "High Poly", "Fotorealista"],
            "3dmodel",
        ),
        service(
            "4",
            "Diseño de Personajes",
            ServiceCategory::CharacterDesign,
            "Hoja de personaje completa con vistas frontal, lateral y expresiones.",
            dec!(300),
            "personaje",
            "5 días",
            &["Cartoon", "Anime", "Semi-realista"],
            "character",
        ),
        service(
            "5",
            "Logo Animation",
            ServiceCategory::MotionGraphics,
            "Animación de logotipo para intros de video y redes sociales.",
            dec!(120),
            "proyecto",
            "3 días",
            &["Glitch", "Clean", "Liquid"],
            "motion",
        ),
        service(
            "6",
            "Storyboard Profesional",
            ServiceCategory::Storyboards,
            "Visualización secuencial para cine, tv o publicidad.",
            dec!(50),
            "frame",
            "2-4 días",
            &["Boceto", "Clean Line", "Tono"],
            "story",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip_through_json() {
        let json = serde_json::to_string(&ServiceCategory::DigitalIllustration).unwrap();
        assert_eq!(json, "\"ILUSTRACIÓN DIGITAL\"");
        let back: ServiceCategory = serde_json::from_str("\"ANIMACIÓN 3D\"").unwrap();
        assert_eq!(back, ServiceCategory::Animation3d);
    }

    #[test]
    fn default_catalog_covers_every_category_once() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 6);
        for category in ServiceCategory::all() {
            assert_eq!(catalog.iter().filter(|s| s.category == category).count(), 1);
        }
    }

    #[test]
    fn matches_name_or_category_ignoring_case() {
        let catalog = default_catalog();
        let storyboard = &catalog[5];
        assert!(storyboard.matches("STORY"));
        assert!(storyboard.matches("profesional"));
        assert!(!storyboard.matches("3d"));
        assert!(storyboard.matches("   "));
    }
}

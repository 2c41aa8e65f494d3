//! Photorealistic translation of a massing model: what the reference
//! building teaches, which materials it shows, and the three fixed
//! interpretation variants the renders are produced under.

use crate::error::{ConceptaError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Used when the model analysis comes back blank.
pub const DEFAULT_MODEL_DESCRIPTION: &str = "Standard architectural massing model.";

/// Eight-module system reading of a reference building.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ArchitecturalIntelligence {
    #[schemars(description = "Concise description of the overall architectural system")]
    pub description: String,

    #[schemars(description = "Vertical/horizontal hierarchy, podium vs tower, stepping or terracing")]
    pub massing_hierarchy: String,

    #[schemars(description = "Ground floor vs upper levels, typical floor repetition, balcony differentiation")]
    pub facade_zoning: String,

    #[schemars(description = "Line orientation, curvature vs orthogonality, corner typology, rhythm")]
    pub geometric_language: String,

    #[schemars(description = "Role of beams, beam-railing-slab relationships, structural readability")]
    pub element_logic: String,

    #[schemars(description = "Dominance, contrast strategy, field continuity, reflectivity")]
    pub material_system: String,

    #[schemars(description = "Balcony depth, visual permeability, transition softness")]
    pub indoor_outdoor: String,

    #[schemars(description = "Greenery as architectural layer or decoration, rhythm alignment")]
    pub green_integration: String,

    #[schemars(description = "Transparency, human scale cues, ground engagement depth")]
    pub human_scale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DetectedMaterial {
    /// Assigned after detection (`detected-0`, ...), never by the model.
    #[serde(default)]
    #[schemars(skip)]
    pub id: String,

    pub name: String,

    #[schemars(description = "Technical description: texture, finish, behaviour")]
    pub description: String,

    #[schemars(description = "Hex colour, e.g. #E8DCC4")]
    pub hex_color: String,

    #[serde(default)]
    #[schemars(skip)]
    pub is_custom: bool,
}

impl DetectedMaterial {
    /// Placeholder for a texture image the user supplied themselves.
    pub fn custom(index: usize) -> Self {
        Self {
            id: format!("custom-{}", index),
            name: format!("Custom Ref {}", index + 1),
            description: "User provided reference image texture.".to_string(),
            hex_color: String::new(),
            is_custom: true,
        }
    }
}

/// Result of analysing a reference building image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingReference {
    pub intelligence: ArchitecturalIntelligence,
    pub materials: Vec<DetectedMaterial>,
}

impl BuildingReference {
    pub fn new(intelligence: ArchitecturalIntelligence, mut materials: Vec<DetectedMaterial>) -> Self {
        for (i, m) in materials.iter_mut().enumerate() {
            m.id = format!("detected-{}", i);
            if !m.hex_color.is_empty() && !m.hex_color.starts_with('#') {
                m.hex_color.insert(0, '#');
            }
        }
        Self {
            intelligence,
            materials,
        }
    }

    /// Detected materials whose id is in `ids`, in detection order.
    pub fn selected_materials<S: AsRef<str>>(&self, ids: &[S]) -> Vec<DetectedMaterial> {
        self.materials
            .iter()
            .filter(|m| ids.iter().any(|id| id.as_ref() == m.id))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRationale {
    pub dominance: String,
    pub softened: String,
    pub emphasis: String,
}

/// The three fixed readings every model is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderVariant {
    StructureLed,
    MaterialLed,
    SpatialHuman,
}

impl RenderVariant {
    pub const ALL: [RenderVariant; 3] = [
        RenderVariant::StructureLed,
        RenderVariant::MaterialLed,
        RenderVariant::SpatialHuman,
    ];

    pub const fn id(&self) -> &'static str {
        match self {
            Self::StructureLed => "v1",
            Self::MaterialLed => "v2",
            Self::SpatialHuman => "v3",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::StructureLed => "Alternative A: Structure-Led",
            Self::MaterialLed => "Alternative B: Material-Led",
            Self::SpatialHuman => "Alternative C: Spatial & Human",
        }
    }

    /// Interpretation brief injected into the render prompt.
    pub const fn logic(&self) -> &'static str {
        match self {
            Self::StructureLed => {
                "Structure-Led: Façade reads through beams, slabs, and horizontal articulation. \
                 Strong expression of construction logic. Clear hierarchy between podium, terraces, and upper masses."
            }
            Self::MaterialLed => {
                "Material-Led: Façade reads as continuous material fields. Softer transitions between zones. \
                 Reduced visibility of structural articulation to favor material surface behavior."
            }
            Self::SpatialHuman => {
                "Spatial & Human: Emphasis on balconies, terraces, and indoor-outdoor relationships. \
                 Stronger presence of greenery and human-scale elements. Porous and layered façade reading."
            }
        }
    }

    pub fn rationale(&self) -> VariantRationale {
        let (dominance, softened, emphasis) = match self {
            Self::StructureLed => (
                "Structural beams, slabs, and tectonic articulation",
                "Visual material continuity and surface fluidity",
                "Rational, architectural, and \"constructed\" logic",
            ),
            Self::MaterialLed => (
                "Continuous material fields and surface textures",
                "Visibility of beams and structural skeletons",
                "Calm, elegant, and materially-driven translation",
            ),
            Self::SpatialHuman => (
                "Balcony depth, visual permeability, and green layers",
                "Rigid mass transitions and structural coldness",
                "Vibrant, livable, and human-scaled architectural interface",
            ),
        };
        VariantRationale {
            dominance: dominance.to_string(),
            softened: softened.to_string(),
            emphasis: emphasis.to_string(),
        }
    }
}

impl fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundFloorUse {
    #[default]
    Lobby,
    Retail,
    Other,
}

impl fmt::Display for GroundFloorUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "Lobby",
            Self::Retail => "Retail",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingPreset {
    pub name: &'static str,
    pub time: &'static str,
    pub azimuth: f64,
    pub intensity: f64,
    pub haze: f64,
}

pub const LIGHTING_PRESETS: [LightingPreset; 5] = [
    LightingPreset { name: "Golden Hour", time: "18:30", azimuth: 240.0, intensity: 85.0, haze: 20.0 },
    LightingPreset { name: "High Noon", time: "12:00", azimuth: 180.0, intensity: 100.0, haze: 5.0 },
    LightingPreset { name: "Overcast", time: "14:00", azimuth: 0.0, intensity: 40.0, haze: 60.0 },
    LightingPreset { name: "Blue Hour", time: "06:00", azimuth: 60.0, intensity: 30.0, haze: 15.0 },
    LightingPreset { name: "Night City", time: "22:00", azimuth: 0.0, intensity: 10.0, haze: 10.0 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CONTEXT_PRESETS: [ContextPreset; 5] = [
    ContextPreset { id: "dense-urban", name: "Dense Urban", description: "Metropolitan street with tight neighboring buildings." },
    ContextPreset { id: "park-landscape", name: "Park Setting", description: "Lush greenery and soft landscaping elements." },
    ContextPreset { id: "business-park", name: "Modern Business Park", description: "Campus-style setting with glass neighbors." },
    ContextPreset { id: "residential-hood", name: "Residential Neighborhood", description: "Low-rise context with domestic scales." },
    ContextPreset { id: "minimal-neutral", name: "Minimal Context", description: "Abstract environment focusing on mass." },
];

pub fn context_preset(id: &str) -> Option<&'static ContextPreset> {
    CONTEXT_PRESETS.iter().find(|c| c.id == id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    pub preset: String,
    pub time_of_day: String,
    pub sun_azimuth: f64,
    pub sun_intensity: f64,
    pub haze: f64,
}

impl LightingConfig {
    pub fn from_preset(preset: &LightingPreset) -> Self {
        Self {
            preset: preset.name.to_string(),
            time_of_day: preset.time.to_string(),
            sun_azimuth: preset.azimuth,
            sun_intensity: preset.intensity,
            haze: preset.haze,
        }
    }

    /// Looks up a preset by name, ignoring case.
    pub fn preset(name: &str) -> Result<Self> {
        LIGHTING_PRESETS
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .map(Self::from_preset)
            .ok_or_else(|| {
                let known: Vec<&str> = LIGHTING_PRESETS.iter().map(|p| p.name).collect();
                ConceptaError::validation(
                    "$.lighting.preset",
                    format!("unknown preset '{}' (available: [{}])", name, known.join(", ")),
                )
            })
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self::from_preset(&LIGHTING_PRESETS[0])
    }
}

/// Everything besides the model and the reference that shapes a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub context: String,
    pub lighting: LightingConfig,
    pub ground_floor: GroundFloorUse,
    pub ground_floor_description: String,
    /// Materials to harmonise, detected or custom.
    pub materials: Vec<DetectedMaterial>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            context: CONTEXT_PRESETS[0].name.to_string(),
            lighting: LightingConfig::default(),
            ground_floor: GroundFloorUse::default(),
            ground_floor_description: String::new(),
            materials: Vec::new(),
        }
    }
}

impl RenderSettings {
    /// `- name: description`, one line per material.
    pub fn material_lines(&self) -> String {
        self.materials
            .iter()
            .map(|m| format!("- {}: {}", m.name, m.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Base64 image returned by an image-capable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub mime_type: String,
    pub data: String,
}

impl RenderedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedAlternative {
    pub id: String,
    pub variant: RenderVariant,
    pub label: String,
    pub description: String,
    pub rationale: VariantRationale,
    pub image: RenderedImage,
}

impl RenderedAlternative {
    pub fn new(variant: RenderVariant, image: RenderedImage) -> Self {
        Self {
            id: variant.id().to_string(),
            variant,
            label: variant.label().to_string(),
            description: variant.logic().to_string(),
            rationale: variant.rationale(),
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_structured;

    #[test]
    fn test_variants_are_fixed_and_ordered() {
        let ids: Vec<&str> = RenderVariant::ALL.iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(RenderVariant::MaterialLed.logic().starts_with("Material-Led:"));
        assert_eq!(
            RenderVariant::SpatialHuman.rationale().softened,
            "Rigid mass transitions and structural coldness"
        );
        assert_eq!(RenderVariant::StructureLed.to_string(), "Alternative A: Structure-Led");
    }

    #[test]
    fn test_reference_assigns_ids_and_selects() {
        let materials = vec![
            DetectedMaterial {
                id: String::new(),
                name: "Travertine".to_string(),
                description: "Honed, warm".to_string(),
                hex_color: "E8DCC4".to_string(),
                is_custom: false,
            },
            DetectedMaterial {
                id: "model-made-this-up".to_string(),
                name: "Bronze".to_string(),
                description: "Brushed fins".to_string(),
                hex_color: "#8C6A3F".to_string(),
                is_custom: false,
            },
        ];
        let reference = BuildingReference::new(ArchitecturalIntelligence::default(), materials);
        assert_eq!(reference.materials[0].id, "detected-0");
        assert_eq!(reference.materials[0].hex_color, "#E8DCC4");
        assert_eq!(reference.materials[1].id, "detected-1");

        let kept = reference.selected_materials(&["detected-1", "detected-7"]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Bronze");
    }

    #[test]
    fn test_material_lines_include_custom_refs() {
        let settings = RenderSettings {
            materials: vec![DetectedMaterial::custom(0), DetectedMaterial::custom(1)],
            ..Default::default()
        };
        assert_eq!(
            settings.material_lines(),
            "- Custom Ref 1: User provided reference image texture.\n\
             - Custom Ref 2: User provided reference image texture."
        );
        assert!(settings.materials.iter().all(|m| m.is_custom));
    }

    #[test]
    fn test_lighting_presets() {
        let noon = LightingConfig::preset("high noon").unwrap();
        assert_eq!(noon.time_of_day, "12:00");
        assert_eq!(noon.sun_intensity, 100.0);
        assert_eq!(LightingConfig::default().preset, "Golden Hour");

        let err = LightingConfig::preset("Aurora").unwrap_err();
        assert!(matches!(err, ConceptaError::Validation { ref path, .. } if path == "$.lighting.preset"));
        assert_eq!(context_preset("park-landscape").map(|c| c.name), Some("Park Setting"));
        assert!(context_preset("moon").is_none());
    }

    #[test]
    fn test_intelligence_from_model_text() {
        let raw = r#"Analysis complete.
{"description": "Stepped podium with a slender tower",
 "massing_hierarchy": "podium + tower", "facade_zoning": "double-height base",
 "geometric_language": "orthogonal", "element_logic": "expressed slabs",
 "material_system": "stone field, glass infill", "indoor_outdoor": "deep loggias",
 "green_integration": "planted terraces", "human_scale": "arcade"}"#;
        let intel = extract_structured::<ArchitecturalIntelligence>(raw).unwrap();
        assert_eq!(intel.value.massing_hierarchy, "podium + tower");
        assert!(intel.is_consistent());

        let missing = extract_structured::<ArchitecturalIntelligence>(r#"{"description": "x"}"#);
        assert!(matches!(missing, Err(ConceptaError::Validation { .. })));
    }

    #[test]
    fn test_empty_material_detection_is_rejected() {
        let err = extract_structured::<Vec<DetectedMaterial>>("[]").unwrap_err();
        assert!(matches!(err, ConceptaError::Validation { ref path, .. } if path == "$"));
    }

    #[test]
    fn test_alternative_carries_variant_text() {
        let image = RenderedImage {
            mime_type: "image/png".to_string(),
            data: "iVBORw0=".to_string(),
        };
        let alt = RenderedAlternative::new(RenderVariant::MaterialLed, image);
        assert_eq!(alt.id, "v2");
        assert_eq!(alt.label, "Alternative B: Material-Led");
        assert_eq!(alt.image.data_url(), "data:image/png;base64,iVBORw0=");
    }
}

use crate::schema::ParcelRights;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Point3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Dimensions {
    #[schemars(range(min = 0))]
    pub width: f64,
    #[schemars(range(min = 0))]
    pub depth: f64,
    #[schemars(range(min = 0))]
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TowerFloor {
    pub floor_number: u32,

    #[serde(default)]
    #[schemars(description = "Unit count keyed by unit size in sqm, e.g. {\"81\": 4}")]
    pub units_by_size: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Tower {
    pub name: String,

    #[serde(default)]
    pub position: Point3,

    pub dimensions: Dimensions,

    #[serde(default)]
    pub floors: Vec<TowerFloor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MassingMetrics {
    pub total_floors: u32,

    #[schemars(description = "Floor Space Index: gross floor area / parcel area")]
    pub fsi: f64,

    #[serde(default)]
    pub density_units_per_hectare: f64,
}

/// Coarse building form used for visualisation only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MassingAlternative {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[schemars(range(min = 0))]
    pub height_m: f64,

    #[serde(default)]
    pub coverage_percent: f64,

    #[serde(default)]
    pub setback_front_m: f64,

    #[serde(default)]
    pub setback_sides_m: f64,

    #[serde(default)]
    pub towers: Vec<Tower>,

    pub key_metrics: MassingMetrics,

    #[serde(default)]
    pub design_rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MassingNote {
    HeightExceedsLimit {
        alternative: String,
        height_m: f64,
        limit_m: f64,
    },
    FloorsExceedLimit {
        alternative: String,
        floors: u32,
        limit: u32,
    },
}

impl MassingAlternative {
    /// Informational envelope checks against the parcel rights. Never enforced.
    pub fn check_envelope(&self, rights: &ParcelRights) -> Vec<MassingNote> {
        let mut notes = Vec::new();
        let limit_m = rights.rights.height_max_m;
        if limit_m > 0.0 && self.height_m > limit_m {
            notes.push(MassingNote::HeightExceedsLimit {
                alternative: self.id.clone(),
                height_m: self.height_m,
                limit_m,
            });
        }
        let limit = rights.rights.floors_max;
        if limit > 0 && self.key_metrics.total_floors > limit {
            notes.push(MassingNote::FloorsExceedLimit {
                alternative: self.id.clone(),
                floors: self.key_metrics.total_floors,
                limit,
            });
        }
        notes
    }

    pub fn tower_count(&self) -> usize {
        self.towers.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ColorScheme {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub accent: String,
}

/// Design language extracted from a reference building image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DesignDna {
    pub architectural_style: String,

    #[serde(default)]
    pub facade_language: String,

    #[serde(default)]
    pub material_palette: Vec<String>,

    #[serde(default)]
    pub color_scheme: ColorScheme,

    #[serde(default)]
    pub proportional_logic: String,

    #[serde(default)]
    pub fenestration_pattern: String,

    #[serde(default)]
    pub vertical_rhythm: String,

    #[serde(default)]
    pub horizontal_banding: String,

    #[serde(default)]
    pub surface_articulation: String,

    #[serde(default)]
    pub human_scale_elements: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Material {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub texture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SecondaryMaterial {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub texture: String,
    #[serde(default)]
    pub area_percent: f64,
}

/// Palette returned by the styling stage for a single massing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct StyledMaterials {
    pub primary_material: Material,

    #[serde(default)]
    pub secondary_materials: Vec<SecondaryMaterial>,

    #[serde(default)]
    pub accent_color: String,

    #[serde(default)]
    pub design_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyledMassing {
    pub id: String,
    pub massing_geometry: MassingAlternative,
    pub design_dna: DesignDna,
    pub styled_materials: StyledMaterials,
    pub design_description: String,
    pub generated_at: DateTime<Utc>,
}

impl StyledMassing {
    pub fn new(massing: MassingAlternative, dna: DesignDna, materials: StyledMaterials) -> Self {
        Self {
            id: massing.id.clone(),
            design_description: materials.design_description.clone(),
            massing_geometry: massing,
            design_dna: dna,
            styled_materials: materials,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;

    fn rights(height: f64, floors: u32) -> ParcelRights {
        ParcelRights {
            parcel: ParcelIdentity {
                gush: "1".to_string(),
                helka: "2".to_string(),
                area_net_sqm: 4000.0,
            },
            zoning: ZoningDesignation::default(),
            rights: BuildingRights {
                max_units: 150,
                main_area_sqm: 14_700.0,
                service_area_sqm: 0.0,
                balcony_area_sqm: 0.0,
                floors_max: floors,
                floors_below_ground: 0,
                height_max_m: height,
                coverage_percent: 0.0,
            },
            constraints: PlanningConstraints::default(),
            confidence_level: ConfidenceLevel::Medium,
            risk_notes: vec![],
            extracted_at: None,
        }
    }

    fn alternative(height: f64, floors: u32) -> MassingAlternative {
        MassingAlternative {
            id: "A".to_string(),
            name: "Compact Tower".to_string(),
            description: String::new(),
            height_m: height,
            coverage_percent: 35.0,
            setback_front_m: 8.0,
            setback_sides_m: 5.0,
            towers: vec![],
            key_metrics: MassingMetrics {
                total_floors: floors,
                fsi: 2.5,
                density_units_per_hectare: 180.0,
            },
            design_rationale: String::new(),
        }
    }

    #[test]
    fn test_envelope_within_limits() {
        assert!(alternative(45.0, 15)
            .check_envelope(&rights(75.0, 17))
            .is_empty());
    }

    #[test]
    fn test_envelope_reports_both_limits() {
        let notes = alternative(80.0, 20).check_envelope(&rights(75.0, 17));
        assert_eq!(notes.len(), 2);
        assert!(matches!(
            notes[0],
            MassingNote::HeightExceedsLimit { limit_m, .. } if limit_m == 75.0
        ));
        assert!(matches!(
            notes[1],
            MassingNote::FloorsExceedLimit { floors: 20, limit: 17, .. }
        ));
    }

    #[test]
    fn test_styled_massing_carries_description() {
        let styled = StyledMassing::new(
            alternative(45.0, 15),
            DesignDna {
                architectural_style: "Modern".to_string(),
                facade_language: String::new(),
                material_palette: vec!["concrete".to_string()],
                color_scheme: ColorScheme::default(),
                proportional_logic: String::new(),
                fenestration_pattern: String::new(),
                vertical_rhythm: String::new(),
                horizontal_banding: String::new(),
                surface_articulation: String::new(),
                human_scale_elements: String::new(),
            },
            StyledMaterials {
                primary_material: Material {
                    name: "Exposed concrete".to_string(),
                    color: "#B0B0B0".to_string(),
                    texture: "board-formed".to_string(),
                },
                secondary_materials: vec![],
                accent_color: "#C0392B".to_string(),
                design_description: "Board-formed concrete podium".to_string(),
            },
        );
        assert_eq!(styled.id, "A");
        assert_eq!(styled.design_description, "Board-formed concrete podium");
    }
}

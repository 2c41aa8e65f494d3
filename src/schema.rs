use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ParcelIdentity {
    #[schemars(description = "Cadastral block number (Gush)")]
    pub gush: String,

    #[schemars(description = "Parcel / plot number (Helka or Migrash)")]
    pub helka: String,

    #[schemars(description = "Net parcel area in square metres", range(min = 0))]
    pub area_net_sqm: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ZoningDesignation {
    #[serde(default)]
    #[schemars(description = "Primary land use: residential, commercial, mixed or employment")]
    pub primary_use: String,

    #[serde(default)]
    #[schemars(description = "Secondary uses the plan allows on the parcel")]
    pub allowed_secondary_uses: Vec<String>,

    #[schemars(description = "Statutory plan number, e.g. 408-0872473")]
    pub plan_number: Option<String>,

    #[schemars(description = "Statutory plan name")]
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BuildingRights {
    #[schemars(
        description = "TOTAL housing units for the whole parcel. Never a per-building split."
    )]
    pub max_units: u32,

    #[schemars(description = "Main (primary) residential area in sqm", range(min = 0))]
    pub main_area_sqm: f64,

    #[serde(default)]
    #[schemars(description = "Above-ground service area in sqm", range(min = 0))]
    pub service_area_sqm: f64,

    #[serde(default)]
    #[schemars(description = "Balcony area in sqm", range(min = 0))]
    pub balcony_area_sqm: f64,

    #[schemars(description = "Number of floors above ground, counting the commercial floor")]
    pub floors_max: u32,

    #[serde(default)]
    #[schemars(description = "Number of floors below ground")]
    pub floors_below_ground: u32,

    #[schemars(
        description = "Building height above the determining entrance, in metres",
        range(min = 0)
    )]
    pub height_max_m: f64,

    #[serde(default)]
    #[schemars(description = "Maximum ground coverage in percent", range(min = 0))]
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BuildingLines {
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub front_m: f64,

    #[serde(default)]
    #[schemars(range(min = 0))]
    pub side_m: f64,

    #[serde(default)]
    #[schemars(range(min = 0))]
    pub rear_m: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PlanningConstraints {
    #[serde(default)]
    #[schemars(description = "Setback distances from the parcel boundary")]
    pub building_lines: BuildingLines,

    #[serde(default)]
    #[schemars(description = "Parking ratio as written in the plan, e.g. '1:1'")]
    pub parking_ratio: String,

    #[serde(default)]
    #[schemars(description = "Total parking spaces")]
    pub parking_spaces: u32,

    #[serde(default)]
    #[schemars(description = "Whether the plan requires a commercial street frontage")]
    pub commercial_frontage: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RiskNote {
    #[serde(rename = "type", default)]
    #[schemars(description = "ambiguity, conflict, missing or interpretation")]
    pub kind: String,

    #[schemars(description = "The risk in plain English")]
    pub description: String,

    #[serde(default)]
    pub clause_reference: Option<String>,
}

/// Building envelope extracted for one parcel from a TABA document.
///
/// `(gush, helka)` is the natural key. The value is immutable once
/// extracted and feeds the unit-mix stage as a hard constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ParcelRights {
    pub parcel: ParcelIdentity,

    #[serde(default)]
    pub zoning: ZoningDesignation,

    pub rights: BuildingRights,

    #[serde(default)]
    pub constraints: PlanningConstraints,

    #[serde(default)]
    pub confidence_level: ConfidenceLevel,

    #[serde(default)]
    pub risk_notes: Vec<RiskNote>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl ParcelRights {
    pub fn key(&self) -> (&str, &str) {
        (&self.parcel.gush, &self.parcel.helka)
    }

    /// Gross floor area over net parcel area. `None` when the parcel area is unknown.
    pub fn fsi(&self) -> Option<f64> {
        if self.parcel.area_net_sqm > 0.0 {
            Some(
                (self.rights.main_area_sqm + self.rights.service_area_sqm)
                    / self.parcel.area_net_sqm,
            )
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FloorType {
    Ground,
    Typical,
    Penthouse,
    Technical,
    Roof,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FloorUnit {
    #[schemars(description = "Unit type tag from the catalogue, e.g. n3, n4, n5, mini_ph, ph")]
    pub unit_type: String,

    #[schemars(description = "Unit area in sqm", range(min = 0))]
    pub area_sqm: f64,

    #[schemars(description = "Number of identical units of this type and size on the floor")]
    pub count: u32,

    #[serde(default)]
    #[schemars(description = "Display colour as a hex code")]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FloorPlan {
    #[schemars(description = "Floor index, 0 is the ground floor")]
    pub floor_number: u32,

    pub floor_type: FloorType,

    #[serde(default)]
    pub floor_label: Option<String>,

    #[serde(default)]
    pub units: Vec<FloorUnit>,

    #[schemars(description = "Residential units on this floor")]
    pub total_units: u32,
}

impl FloorPlan {
    /// Units counted from the detail rows, independent of `total_units`.
    ///
    /// Widened to `u64`: counts come from model output and may overflow `u32`.
    pub fn counted_units(&self) -> u64 {
        self.units.iter().map(|u| u64::from(u.count)).sum()
    }

    pub fn counted_area_sqm(&self) -> f64 {
        self.units.iter().map(|u| u.area_sqm * f64::from(u.count)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UnitMixSummaryEntry {
    pub unit_type: String,

    #[serde(default)]
    pub label: Option<String>,

    #[schemars(description = "Units of this type across all floors")]
    pub total_count: u32,

    #[schemars(description = "Share of the grand total, in percent", range(min = 0))]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProjectInfo {
    #[serde(default)]
    pub gush: String,

    #[serde(default)]
    pub helka: String,

    #[serde(default)]
    pub plan_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BuildingSummary {
    #[serde(default)]
    pub num_buildings: Option<u32>,

    pub total_floors: u32,

    #[serde(default)]
    pub floors_below_ground: Option<u32>,

    #[serde(default)]
    pub floors_above_ground: Option<u32>,

    pub total_units: u32,

    #[schemars(range(min = 0))]
    pub total_main_area_sqm: f64,

    #[serde(default)]
    pub average_unit_size_sqm: Option<f64>,
}

/// Floor-by-floor unit plan (Tamhil) derived from a [`ParcelRights`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UnitMixPlan {
    #[serde(default)]
    pub project_info: Option<ProjectInfo>,

    pub building_summary: BuildingSummary,

    pub floor_plans: Vec<FloorPlan>,

    pub unit_mix_summary: Vec<UnitMixSummaryEntry>,

    #[serde(default)]
    pub design_notes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl UnitMixPlan {
    pub fn declared_floor_units(&self) -> u64 {
        self.floor_plans.iter().map(|f| u64::from(f.total_units)).sum()
    }

    pub fn summary_units(&self) -> u64 {
        self.unit_mix_summary.iter().map(|s| u64::from(s.total_count)).sum()
    }

    pub fn counted_area_sqm(&self) -> f64 {
        self.floor_plans.iter().map(FloorPlan::counted_area_sqm).sum()
    }

    pub fn top_floor(&self) -> Option<u32> {
        self.floor_plans.iter().map(|f| f.floor_number).max()
    }
}

// Stage prompts for the zoning → unit mix → massing → styling pipeline,
// plus the model-to-photograph rendering flow

use crate::catalogue::UnitTypeCatalogue;
use crate::error::{Result, TemplateError};
use crate::massing::{DesignDna, MassingAlternative};
use crate::planner::apportion;
use crate::prompt::{BindingValue, Bindings, PromptTemplate};
use crate::rendering::{ArchitecturalIntelligence, RenderSettings, RenderVariant};
use crate::schema::ParcelRights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const ZONING_ANALYSIS_PROMPT: &str = include_str!("../../prompts/zoning_analysis.md");
pub const RIGHTS_REPORT_PROMPT: &str = include_str!("../../prompts/rights_report.md");
pub const UNIT_MIX_PROMPT: &str = include_str!("../../prompts/unit_mix.md");
pub const MASSING_ALTERNATIVES_PROMPT: &str = include_str!("../../prompts/massing_alternatives.md");
pub const REFERENCE_ANALYSIS_PROMPT: &str = include_str!("../../prompts/reference_analysis.md");
pub const MASSING_STYLING_PROMPT: &str = include_str!("../../prompts/massing_styling.md");
pub const MODEL_ANALYSIS_PROMPT: &str = include_str!("../../prompts/model_analysis.md");
pub const BUILDING_INTELLIGENCE_PROMPT: &str = include_str!("../../prompts/building_intelligence.md");
pub const MATERIAL_DETECTION_PROMPT: &str = include_str!("../../prompts/material_detection.md");
pub const RENDERING_PROMPT: &str = include_str!("../../prompts/rendering.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ZoningAnalysis,
    RightsReport,
    UnitMix,
    MassingAlternatives,
    ReferenceAnalysis,
    MassingStyling,
    ModelAnalysis,
    BuildingIntelligence,
    MaterialDetection,
    Rendering,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::ZoningAnalysis,
        Stage::RightsReport,
        Stage::UnitMix,
        Stage::MassingAlternatives,
        Stage::ReferenceAnalysis,
        Stage::MassingStyling,
        Stage::ModelAnalysis,
        Stage::BuildingIntelligence,
        Stage::MaterialDetection,
        Stage::Rendering,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::ZoningAnalysis => "zoning_analysis",
            Self::RightsReport => "rights_report",
            Self::UnitMix => "unit_mix",
            Self::MassingAlternatives => "massing_alternatives",
            Self::ReferenceAnalysis => "reference_analysis",
            Self::MassingStyling => "massing_styling",
            Self::ModelAnalysis => "model_analysis",
            Self::BuildingIntelligence => "building_intelligence",
            Self::MaterialDetection => "material_detection",
            Self::Rendering => "rendering",
        }
    }

    pub const fn default_body(&self) -> &'static str {
        match self {
            Self::ZoningAnalysis => ZONING_ANALYSIS_PROMPT,
            Self::RightsReport => RIGHTS_REPORT_PROMPT,
            Self::UnitMix => UNIT_MIX_PROMPT,
            Self::MassingAlternatives => MASSING_ALTERNATIVES_PROMPT,
            Self::ReferenceAnalysis => REFERENCE_ANALYSIS_PROMPT,
            Self::MassingStyling => MASSING_STYLING_PROMPT,
            Self::ModelAnalysis => MODEL_ANALYSIS_PROMPT,
            Self::BuildingIntelligence => BUILDING_INTELLIGENCE_PROMPT,
            Self::MaterialDetection => MATERIAL_DETECTION_PROMPT,
            Self::Rendering => RENDERING_PROMPT,
        }
    }

    /// Document-reading stages run on the document model, the rest on the
    /// generation model.
    pub const fn reads_documents(&self) -> bool {
        matches!(self, Self::ZoningAnalysis | Self::RightsReport)
    }

    /// Answered with images rather than text, on the image model.
    pub const fn renders_images(&self) -> bool {
        matches!(self, Self::Rendering)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = TemplateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| TemplateError::UnknownTemplate(s.to_string()))
    }
}

/// The canonical template per stage, with optional caller overrides.
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    overrides: BTreeMap<Stage, String>,
}

impl PromptSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the template for one stage (e.g. a tuned prompt for another municipality).
    pub fn with_override(mut self, stage: Stage, body: impl Into<String>) -> Self {
        self.overrides.insert(stage, body.into());
        self
    }

    pub fn template(&self, stage: Stage) -> PromptTemplate {
        let body = self
            .overrides
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| stage.default_body());
        PromptTemplate::new(stage.name(), body)
    }

    pub fn render(&self, stage: Stage, bindings: &Bindings) -> std::result::Result<String, TemplateError> {
        self.template(stage).render(bindings)
    }
}

pub fn zoning_analysis_bindings(gush: &str, helka: &str) -> Bindings {
    Bindings::new().with("GUSH", gush).with("HELKA", helka)
}

pub fn rights_report_bindings(rights: &ParcelRights) -> Result<Bindings> {
    Ok(Bindings::new().with("PLANNING_RIGHTS", BindingValue::json(rights)?))
}

/// Target counts per unit type for the parcel total, one line per type.
fn unit_targets(catalogue: &UnitTypeCatalogue, total: u32) -> String {
    let shares: Vec<f64> = catalogue.entries.iter().map(|e| e.target_share).collect();
    catalogue
        .entries
        .iter()
        .zip(apportion(&shares, total))
        .map(|(e, count)| format!("- {}: {} units ({}%)", e.tag, count, e.target_share))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn unit_mix_bindings(rights: &ParcelRights, catalogue: &UnitTypeCatalogue) -> Result<Bindings> {
    let r = &rights.rights;
    Ok(Bindings::new()
        .with("PLANNING_RIGHTS", BindingValue::json(rights)?)
        .with("MAX_UNITS", r.max_units)
        .with("MAIN_AREA_SQM", r.main_area_sqm)
        .with("FLOORS_MAX", r.floors_max)
        .with("TOP_FLOOR", r.floors_max.saturating_sub(1))
        .with("UNIT_CATALOGUE", catalogue.to_prompt_lines())
        .with("UNIT_TARGETS", unit_targets(catalogue, r.max_units)))
}

pub fn massing_bindings(rights: &ParcelRights) -> Bindings {
    let r = &rights.rights;
    Bindings::new()
        .with("MAX_UNITS", r.max_units)
        .with("HEIGHT_MAX", r.height_max_m)
        .with("FLOORS_MAX", r.floors_max)
        .with("MAIN_AREA", r.main_area_sqm)
}

pub fn styling_bindings(massing: &MassingAlternative, dna: &DesignDna) -> Bindings {
    Bindings::new()
        .with("MASSING_NAME", massing.name.as_str())
        .with("MASSING_DESCRIPTION", massing.description.as_str())
        .with("HEIGHT_M", massing.height_m)
        .with("COVERAGE_PERCENT", massing.coverage_percent)
        .with("TOTAL_FLOORS", massing.key_metrics.total_floors)
        .with("TOWER_COUNT", massing.tower_count() as i64)
        .with("ARCHITECTURAL_STYLE", dna.architectural_style.as_str())
        .with("FACADE_LANGUAGE", dna.facade_language.as_str())
        .with("MATERIAL_PALETTE", dna.material_palette.clone())
        .with("PRIMARY_COLOR", dna.color_scheme.primary.as_str())
        .with("FENESTRATION_PATTERN", dna.fenestration_pattern.as_str())
        .with("SURFACE_ARTICULATION", dna.surface_articulation.as_str())
}

pub fn rendering_bindings(
    model_description: &str,
    intelligence: &ArchitecturalIntelligence,
    variant: RenderVariant,
    settings: &RenderSettings,
) -> Bindings {
    let materials = if settings.materials.is_empty() {
        "- none selected".to_string()
    } else {
        settings.material_lines()
    };
    Bindings::new()
        .with("MODEL_DESCRIPTION", model_description)
        .with("MASSING_HIERARCHY", intelligence.massing_hierarchy.as_str())
        .with("FACADE_ZONING", intelligence.facade_zoning.as_str())
        .with("GEOMETRIC_LANGUAGE", intelligence.geometric_language.as_str())
        .with("ELEMENT_LOGIC", intelligence.element_logic.as_str())
        .with("INDOOR_OUTDOOR", intelligence.indoor_outdoor.as_str())
        .with("GREEN_INTEGRATION", intelligence.green_integration.as_str())
        .with("HUMAN_SCALE", intelligence.human_scale.as_str())
        .with("VARIANT_LOGIC", variant.logic())
        .with("MATERIALS", materials)
        .with("CONTEXT", settings.context.as_str())
        .with("LIGHTING_PRESET", settings.lighting.preset.as_str())
        .with("TIME_OF_DAY", settings.lighting.time_of_day.as_str())
        .with("GROUND_FLOOR_TYPE", settings.ground_floor.to_string())
        .with("GROUND_FLOOR_DESCRIPTION", settings.ground_floor_description.as_str())
}

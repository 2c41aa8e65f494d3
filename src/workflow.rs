//! Stage sequencing for the rights → unit mix → massing → export flow.

use crate::error::{ConceptaError, Result};
use crate::extract::Extracted;
use crate::massing::{MassingAlternative, StyledMassing};
use crate::schema::{ParcelRights, UnitMixPlan};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Waiting for parcel identity and documents.
    #[default]
    Input,
    RightsExtracted,
    UnitMixGenerated,
    MassingSelected,
    Visualized,
    Exported,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::RightsExtracted => "rights_extracted",
            Self::UnitMixGenerated => "unit_mix_generated",
            Self::MassingSelected => "massing_selected",
            Self::Visualized => "visualized",
            Self::Exported => "exported",
        }
    }

    /// Forward transitions only; going back is [`Workflow::step_back`].
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Input, Self::RightsExtracted)
                | (Self::RightsExtracted, Self::UnitMixGenerated)
                | (Self::UnitMixGenerated, Self::MassingSelected)
                | (Self::MassingSelected, Self::Visualized)
                | (Self::Visualized, Self::Exported)
        )
    }

    #[must_use]
    pub const fn previous(&self) -> Option<Self> {
        match self {
            Self::Input => None,
            Self::RightsExtracted => Some(Self::Input),
            Self::UnitMixGenerated => Some(Self::RightsExtracted),
            Self::MassingSelected => Some(Self::UnitMixGenerated),
            Self::Visualized => Some(Self::MassingSelected),
            Self::Exported => Some(Self::Visualized),
        }
    }
}

/// Data accumulated by each stage, guarded by the current [`WorkflowStage`].
///
/// Deserialisation re-checks that the stored data matches the stored stage,
/// so a saved workflow cannot be loaded into a state `advance` would refuse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "SavedWorkflow")]
pub struct Workflow {
    stage: WorkflowStage,
    rights: Option<ParcelRights>,
    rights_report: Option<String>,
    unit_mix: Option<Extracted<UnitMixPlan>>,
    massing_alternatives: Vec<MassingAlternative>,
    selected_massing: Option<String>,
    styled: Vec<StyledMassing>,
    exported_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct SavedWorkflow {
    stage: WorkflowStage,
    rights: Option<ParcelRights>,
    rights_report: Option<String>,
    unit_mix: Option<Extracted<UnitMixPlan>>,
    #[serde(default)]
    massing_alternatives: Vec<MassingAlternative>,
    selected_massing: Option<String>,
    #[serde(default)]
    styled: Vec<StyledMassing>,
    exported_at: Option<DateTime<Utc>>,
}

impl TryFrom<SavedWorkflow> for Workflow {
    type Error = ConceptaError;

    fn try_from(saved: SavedWorkflow) -> Result<Self> {
        let workflow = Self {
            stage: saved.stage,
            rights: saved.rights,
            rights_report: saved.rights_report,
            unit_mix: saved.unit_mix,
            massing_alternatives: saved.massing_alternatives,
            selected_massing: saved.selected_massing,
            styled: saved.styled,
            exported_at: saved.exported_at,
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn rights(&self) -> Option<&ParcelRights> {
        self.rights.as_ref()
    }

    pub fn rights_report(&self) -> Option<&str> {
        self.rights_report.as_deref()
    }

    pub fn unit_mix(&self) -> Option<&Extracted<UnitMixPlan>> {
        self.unit_mix.as_ref()
    }

    pub fn massing_alternatives(&self) -> &[MassingAlternative] {
        &self.massing_alternatives
    }

    pub fn selected_massing(&self) -> Option<&MassingAlternative> {
        let id = self.selected_massing.as_deref()?;
        self.massing_alternatives.iter().find(|m| m.id == id)
    }

    pub fn styled(&self) -> &[StyledMassing] {
        &self.styled
    }

    pub fn exported_at(&self) -> Option<DateTime<Utc>> {
        self.exported_at
    }

    /// Checks that each stage's data is present exactly when the stage has
    /// been reached.
    pub fn validate(&self) -> Result<()> {
        use WorkflowStage::*;

        let reached = |stage: WorkflowStage| self.stage >= stage;
        let expect = |ok: bool, path: &str, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(ConceptaError::validation(
                    path,
                    format!("{} at stage {}", what, self.stage),
                ))
            }
        };

        expect(
            reached(RightsExtracted) == self.rights.is_some(),
            "$.rights",
            "rights present only from rights_extracted",
        )?;
        expect(
            reached(RightsExtracted) || self.rights_report.is_none(),
            "$.rights_report",
            "report without rights",
        )?;
        expect(
            reached(UnitMixGenerated) == self.unit_mix.is_some(),
            "$.unit_mix",
            "unit mix present only from unit_mix_generated",
        )?;
        expect(
            reached(UnitMixGenerated) || self.massing_alternatives.is_empty(),
            "$.massing_alternatives",
            "massing alternatives before a unit mix",
        )?;
        expect(
            reached(MassingSelected) == self.selected_massing.is_some(),
            "$.selected_massing",
            "selection present only from massing_selected",
        )?;
        if let Some(id) = self.selected_massing.as_deref() {
            expect(
                self.massing_alternatives.iter().any(|m| m.id == id),
                "$.selected_massing",
                "selected massing is not among the alternatives",
            )?;
        }
        expect(
            reached(Visualized) != self.styled.is_empty(),
            "$.styled",
            "styled massings present only from visualized",
        )?;
        if reached(Visualized) {
            let id = self.selected_massing.as_deref().unwrap_or_default();
            expect(
                self.styled.iter().any(|s| s.id == id),
                "$.styled",
                "selected massing was not styled",
            )?;
        }
        expect(
            reached(Exported) == self.exported_at.is_some(),
            "$.exported_at",
            "export time present only from exported",
        )
    }

    fn advance(&mut self, target: WorkflowStage) -> Result<()> {
        if !self.stage.can_transition_to(target) {
            return Err(ConceptaError::InvalidTransition {
                from: self.stage.to_string(),
                to: target.to_string(),
            });
        }
        info!("Workflow: {} -> {}", self.stage, target);
        self.stage = target;
        Ok(())
    }

    pub fn record_rights(&mut self, rights: ParcelRights, report: Option<String>) -> Result<()> {
        self.advance(WorkflowStage::RightsExtracted)?;
        self.rights = Some(rights);
        self.rights_report = report;
        Ok(())
    }

    pub fn record_unit_mix(&mut self, plan: Extracted<UnitMixPlan>) -> Result<()> {
        self.advance(WorkflowStage::UnitMixGenerated)?;
        self.unit_mix = Some(plan);
        Ok(())
    }

    /// Stores the candidates to choose from. Only valid once a unit mix
    /// exists and before a selection is made; replaces earlier candidates.
    pub fn record_massing_alternatives(&mut self, alternatives: Vec<MassingAlternative>) -> Result<()> {
        if self.stage != WorkflowStage::UnitMixGenerated {
            return Err(ConceptaError::InvalidTransition {
                from: self.stage.to_string(),
                to: WorkflowStage::MassingSelected.to_string(),
            });
        }
        self.massing_alternatives = alternatives;
        Ok(())
    }

    pub fn select_massing(&mut self, id: &str) -> Result<()> {
        if !self.stage.can_transition_to(WorkflowStage::MassingSelected) {
            return Err(ConceptaError::InvalidTransition {
                from: self.stage.to_string(),
                to: WorkflowStage::MassingSelected.to_string(),
            });
        }
        if !self.massing_alternatives.iter().any(|m| m.id == id) {
            let known: Vec<&str> = self.massing_alternatives.iter().map(|m| m.id.as_str()).collect();
            return Err(ConceptaError::validation(
                "$.massing_id",
                format!("unknown massing '{}' (available: [{}])", id, known.join(", ")),
            ));
        }
        self.advance(WorkflowStage::MassingSelected)?;
        self.selected_massing = Some(id.to_string());
        Ok(())
    }

    pub fn record_visualization(&mut self, styled: Vec<StyledMassing>) -> Result<()> {
        if !self.stage.can_transition_to(WorkflowStage::Visualized) {
            return Err(ConceptaError::InvalidTransition {
                from: self.stage.to_string(),
                to: WorkflowStage::Visualized.to_string(),
            });
        }
        if styled.is_empty() {
            return Err(ConceptaError::validation(
                "$.styled",
                "expected at least one styled massing",
            ));
        }
        let selected = self.selected_massing.as_deref().unwrap_or_default();
        if !styled.iter().any(|s| s.id == selected) {
            let ids: Vec<&str> = styled.iter().map(|s| s.id.as_str()).collect();
            return Err(ConceptaError::validation(
                "$.styled",
                format!("selected massing '{}' missing from [{}]", selected, ids.join(", ")),
            ));
        }
        self.advance(WorkflowStage::Visualized)?;
        self.styled = styled;
        Ok(())
    }

    pub fn mark_exported(&mut self) -> Result<DateTime<Utc>> {
        self.advance(WorkflowStage::Exported)?;
        let now = Utc::now();
        self.exported_at = Some(now);
        Ok(now)
    }

    /// Returns to the previous stage, discarding what the current stage produced.
    pub fn step_back(&mut self) -> Result<WorkflowStage> {
        let Some(previous) = self.stage.previous() else {
            return Err(ConceptaError::InvalidTransition {
                from: self.stage.to_string(),
                to: "previous stage".to_string(),
            });
        };

        match self.stage {
            WorkflowStage::Input => {}
            WorkflowStage::RightsExtracted => {
                self.rights = None;
                self.rights_report = None;
            }
            WorkflowStage::UnitMixGenerated => {
                self.unit_mix = None;
                self.massing_alternatives.clear();
            }
            WorkflowStage::MassingSelected => self.selected_massing = None,
            WorkflowStage::Visualized => self.styled.clear(),
            WorkflowStage::Exported => self.exported_at = None,
        }

        info!("Workflow: {} -> {} (back)", self.stage, previous);
        self.stage = previous;
        Ok(previous)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::UnitTypeCatalogue;
    use crate::massing::{DesignDna, Dimensions, Material, MassingMetrics, StyledMaterials};
    use crate::planner::draft_unit_mix;
    use crate::schema::*;

    fn rights() -> ParcelRights {
        ParcelRights {
            parcel: ParcelIdentity {
                gush: "6666".to_string(),
                helka: "102".to_string(),
                area_net_sqm: 4006.0,
            },
            zoning: ZoningDesignation::default(),
            rights: BuildingRights {
                max_units: 40,
                main_area_sqm: 4_000.0,
                service_area_sqm: 0.0,
                balcony_area_sqm: 0.0,
                floors_max: 6,
                floors_below_ground: 0,
                height_max_m: 25.0,
                coverage_percent: 0.0,
            },
            constraints: PlanningConstraints::default(),
            confidence_level: ConfidenceLevel::Medium,
            risk_notes: vec![],
            extracted_at: None,
        }
    }

    fn massing(id: &str) -> MassingAlternative {
        MassingAlternative {
            id: id.to_string(),
            name: format!("Option {}", id),
            description: String::new(),
            height_m: 22.0,
            coverage_percent: 40.0,
            setback_front_m: 5.0,
            setback_sides_m: 3.0,
            towers: vec![crate::massing::Tower {
                name: "T1".to_string(),
                position: Default::default(),
                dimensions: Dimensions {
                    width: 20.0,
                    depth: 15.0,
                    height: 22.0,
                },
                floors: vec![],
            }],
            key_metrics: MassingMetrics {
                total_floors: 6,
                fsi: 1.0,
                density_units_per_hectare: 100.0,
            },
            design_rationale: String::new(),
        }
    }

    fn styled(id: &str) -> StyledMassing {
        StyledMassing::new(
            massing(id),
            DesignDna {
                architectural_style: "Modernist".to_string(),
                facade_language: String::new(),
                material_palette: vec![],
                color_scheme: Default::default(),
                proportional_logic: String::new(),
                fenestration_pattern: String::new(),
                vertical_rhythm: String::new(),
                horizontal_banding: String::new(),
                surface_articulation: String::new(),
                human_scale_elements: String::new(),
            },
            StyledMaterials {
                primary_material: Material {
                    name: "Limestone".to_string(),
                    color: "#E8DCC4".to_string(),
                    texture: String::new(),
                },
                secondary_materials: vec![],
                accent_color: "#333333".to_string(),
                design_description: "Stone base with glazed upper floors".to_string(),
            },
        )
    }

    fn at_unit_mix() -> Workflow {
        let r = rights();
        let plan = draft_unit_mix(&r, &UnitTypeCatalogue::default()).unwrap();
        let mut wf = Workflow::new();
        wf.record_rights(r, Some("report".to_string())).unwrap();
        wf.record_unit_mix(Extracted {
            value: plan,
            discrepancies: vec![],
        })
        .unwrap();
        wf
    }

    #[test]
    fn test_full_forward_path() {
        let mut wf = at_unit_mix();
        wf.record_massing_alternatives(vec![massing("A"), massing("B"), massing("C")])
            .unwrap();
        wf.select_massing("B").unwrap();
        assert_eq!(wf.selected_massing().map(|m| m.name.as_str()), Some("Option B"));
        wf.record_visualization(vec![styled("B")]).unwrap();
        wf.mark_exported().unwrap();
        assert_eq!(wf.stage(), WorkflowStage::Exported);
        assert!(wf.exported_at().is_some());
    }

    #[test]
    fn test_unit_mix_requires_rights() {
        let mut wf = Workflow::new();
        let plan = draft_unit_mix(&rights(), &UnitTypeCatalogue::default()).unwrap();
        let err = wf
            .record_unit_mix(Extracted {
                value: plan,
                discrepancies: vec![],
            })
            .unwrap_err();
        match err {
            ConceptaError::InvalidTransition { from, to } => {
                assert_eq!(from, "input");
                assert_eq!(to, "unit_mix_generated");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wf.stage(), WorkflowStage::Input);
    }

    #[test]
    fn test_select_unknown_massing() {
        let mut wf = at_unit_mix();
        wf.record_massing_alternatives(vec![massing("A")]).unwrap();
        let err = wf.select_massing("Z").unwrap_err();
        assert!(matches!(err, ConceptaError::Validation { ref path, .. } if path == "$.massing_id"));
        assert_eq!(wf.stage(), WorkflowStage::UnitMixGenerated);
    }

    #[test]
    fn test_cannot_skip_stages() {
        let mut wf = Workflow::new();
        assert!(wf.record_massing_alternatives(vec![massing("A")]).is_err());
        assert!(wf.select_massing("A").is_err());
        assert!(wf.record_visualization(vec![styled("A")]).is_err());
        assert!(wf.mark_exported().is_err());

        let mut wf = at_unit_mix();
        assert!(wf.record_rights(rights(), None).is_err());
    }

    #[test]
    fn test_step_back_drops_downstream_data() {
        let mut wf = at_unit_mix();
        wf.record_massing_alternatives(vec![massing("A")]).unwrap();
        wf.select_massing("A").unwrap();

        assert_eq!(wf.step_back().unwrap(), WorkflowStage::UnitMixGenerated);
        assert!(wf.selected_massing().is_none());
        assert_eq!(wf.massing_alternatives().len(), 1);

        assert_eq!(wf.step_back().unwrap(), WorkflowStage::RightsExtracted);
        assert!(wf.unit_mix().is_none());
        assert!(wf.massing_alternatives().is_empty());
        assert!(wf.rights().is_some());

        assert_eq!(wf.step_back().unwrap(), WorkflowStage::Input);
        assert!(wf.rights().is_none());
        assert!(wf.step_back().is_err());
    }

    #[test]
    fn test_reset() {
        let mut wf = at_unit_mix();
        wf.reset();
        assert_eq!(wf.stage(), WorkflowStage::Input);
        assert!(wf.rights().is_none());
        assert!(wf.rights_report().is_none());
    }

    #[test]
    fn test_visualization_must_cover_selection() {
        let mut wf = at_unit_mix();
        wf.record_massing_alternatives(vec![massing("A"), massing("B")])
            .unwrap();
        wf.select_massing("B").unwrap();

        let err = wf.record_visualization(vec![styled("A")]).unwrap_err();
        assert!(matches!(err, ConceptaError::Validation { ref path, .. } if path == "$.styled"));
        assert_eq!(wf.stage(), WorkflowStage::MassingSelected);
        assert!(wf.styled().is_empty());

        wf.record_visualization(vec![styled("A"), styled("B")]).unwrap();
        assert_eq!(wf.stage(), WorkflowStage::Visualized);
    }

    #[test]
    fn test_saved_workflow_round_trips() {
        let mut wf = at_unit_mix();
        wf.record_massing_alternatives(vec![massing("A")]).unwrap();
        wf.select_massing("A").unwrap();
        wf.record_visualization(vec![styled("A")]).unwrap();

        let json = serde_json::to_string(&wf).unwrap();
        let loaded: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.stage(), WorkflowStage::Visualized);
        assert_eq!(loaded.selected_massing().map(|m| m.id.as_str()), Some("A"));
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_inconsistent_saved_workflow_is_rejected() {
        let wf = at_unit_mix();
        let mut value = serde_json::to_value(&wf).unwrap();

        // Claims export with no massing, selection or styling behind it.
        value["stage"] = serde_json::json!("exported");
        assert!(serde_json::from_value::<Workflow>(value.clone()).is_err());

        // Selection pointing at an alternative that does not exist.
        value["stage"] = serde_json::json!("massing_selected");
        value["massing_alternatives"] = serde_json::to_value(vec![massing("A")]).unwrap();
        value["selected_massing"] = serde_json::json!("Z");
        let err = serde_json::from_value::<Workflow>(value.clone()).unwrap_err();
        assert!(err.to_string().contains("$.selected_massing"));

        value["selected_massing"] = serde_json::json!("A");
        let loaded: Workflow = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.stage(), WorkflowStage::MassingSelected);

        let mut early = serde_json::to_value(Workflow::new()).unwrap();
        early["rights"] = serde_json::to_value(rights()).unwrap();
        assert!(serde_json::from_value::<Workflow>(early).is_err());
    }

    #[test]
    fn test_stage_serialisation() {
        assert_eq!(
            serde_json::to_value(WorkflowStage::UnitMixGenerated).unwrap(),
            serde_json::json!("unit_mix_generated")
        );
        assert_eq!(WorkflowStage::MassingSelected.to_string(), "massing_selected");
    }
}

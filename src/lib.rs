//! # Concepta
//!
//! Zoning-document extraction and unit-mix reconciliation for LLM-assisted
//! architectural massing.
//!
//! ## Core Concepts
//!
//! - **Parcel Rights**: the building envelope of one parcel (units, areas, floors,
//!   height) read out of a statutory zoning plan (TABA) by the model
//! - **Unit Mix (Tamhil)**: a floor-by-floor apartment plan that must add up to the
//!   parcel's rights
//! - **Reconciliation**: the model's arithmetic is never trusted; every plan is
//!   re-counted from its floor detail and mismatches are reported as discrepancies
//! - **Massing**: coarse building forms, optionally restyled after a reference image
//! - **Rendering**: a massing model image translated into three photorealistic
//!   alternatives, one per fixed interpretation variant
//!
//! ## Example
//!
//! ```rust,ignore
//! use concepta::*;
//!
//! let raw = provider_output(); // free-form text with a JSON block somewhere in it
//! let plan = extract_structured::<UnitMixPlan>(&raw)?;
//!
//! for d in &plan.discrepancies {
//!     println!("{:?}: expected {}, got {}", d.invariant, d.expected, d.actual);
//! }
//!
//! let baseline = draft_unit_mix(&rights, &UnitTypeCatalogue::default())?;
//! println!("{}", unit_mix_markdown(&baseline));
//! ```

pub mod catalogue;
pub mod coerce;
pub mod error;
pub mod extract;
pub mod massing;
pub mod planner;
pub mod prompt;
pub mod reconcile;
pub mod rendering;
pub mod report;
pub mod schema;
pub mod workflow;

#[cfg(feature = "gemini")]
pub mod llm;

pub use catalogue::{UnitTypeCatalogue, UnitTypeSpec};
pub use error::{ConceptaError, Result, TemplateError};
pub use extract::{extract_structured, locate_json, Extractable, Extracted, SchemaKind};
pub use massing::*;
pub use planner::{apportion, draft_unit_mix, summarize_floors, MAX_PLANNED_FLOORS};
pub use prompt::{render, BindingValue, Bindings, PromptTemplate};
pub use reconcile::{reconcile_plan, reconcile_with_rights, Discrepancy, Invariant};
pub use rendering::*;
pub use report::{discrepancy_markdown, rights_markdown, unit_mix_csv, unit_mix_markdown};
pub use schema::*;
pub use workflow::{Workflow, WorkflowStage};

use log::{debug, info};

/// Full consistency review of a unit mix: its own totals against the
/// catalogue and, when given, against the parcel rights it was built for.
pub fn review_unit_mix(
    plan: &UnitMixPlan,
    rights: Option<&ParcelRights>,
    catalogue: &UnitTypeCatalogue,
) -> Vec<Discrepancy> {
    info!(
        "Reviewing unit mix: {} floors, {} units declared",
        plan.floor_plans.len(),
        plan.building_summary.total_units
    );

    let mut found = reconcile_plan(plan, catalogue);
    if let Some(rights) = rights {
        found.extend(reconcile_with_rights(plan, rights));
    }

    for d in &found {
        debug!("{:?}: {}", d.invariant, d.detail);
    }
    found
}

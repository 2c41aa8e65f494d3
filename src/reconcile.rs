//! Arithmetic reconciliation of unit-mix plans.
//!
//! The model cannot be trusted to add up, so every plan is re-counted from
//! its floor detail. Violations come back as [`Discrepancy`] values and the
//! caller decides whether to reject the plan or accept it with a warning.

use crate::catalogue::UnitTypeCatalogue;
use crate::schema::{FloorType, ParcelRights, UnitMixPlan};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Relative tolerance on declared main area against the parcel rights.
pub const MAIN_AREA_TOLERANCE: f64 = 0.02;

/// Allowed drift of a single summary percentage from its exact share.
pub const PERCENTAGE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    /// Floor totals do not add up to the building total.
    TotalUnitsMismatch,
    /// Summary table total differs from the floor totals.
    SummaryTotalMismatch,
    /// Summary percentages do not add up to 100.
    PercentageSumMismatch,
    /// A unit type's summary count differs from the floor-by-floor count.
    UnitTypeCountMismatch,
    /// The ground floor holds residential units.
    GroundFloorUnits,
    /// A penthouse type sits below a floor with regular units.
    PenthouseBelowTop,
    /// A floor's declared total differs from its unit rows.
    FloorTotalMismatch,
    DuplicateFloorNumber,
    /// A summary percentage does not match its count.
    PercentageMismatch,
    UnknownUnitType,
    UnitAreaOutOfBand,
    /// Building total differs from the parcel's maximum units.
    MaxUnitsMismatch,
    MainAreaOutOfTolerance,
    FloorCountExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub invariant: Invariant,
    pub expected: f64,
    pub actual: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub detail: String,
}

impl Discrepancy {
    fn new(invariant: Invariant, expected: f64, actual: f64, detail: impl Into<String>) -> Self {
        Self {
            invariant,
            expected,
            actual,
            scope: None,
            detail: detail.into(),
        }
    }

    fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn magnitude(&self) -> f64 {
        (self.expected - self.actual).abs()
    }
}

/// Runs every plan-internal check against `catalogue`.
pub fn reconcile_plan(plan: &UnitMixPlan, catalogue: &UnitTypeCatalogue) -> Vec<Discrepancy> {
    let mut found = Vec::new();

    check_totals(plan, &mut found);
    check_floor_rows(plan, &mut found);
    check_type_counts(plan, &mut found);
    check_percentages(plan, &mut found);
    check_ground_floor(plan, &mut found);
    check_penthouse_placement(plan, catalogue, &mut found);
    check_catalogue(plan, catalogue, &mut found);

    debug!(
        "Reconciled plan with {} floors: {} discrepancies",
        plan.floor_plans.len(),
        found.len()
    );
    found
}

/// Checks the plan against the envelope it was generated from.
pub fn reconcile_with_rights(plan: &UnitMixPlan, rights: &ParcelRights) -> Vec<Discrepancy> {
    let mut found = Vec::new();
    let summary = &plan.building_summary;

    if summary.total_units != rights.rights.max_units {
        found.push(Discrepancy::new(
            Invariant::MaxUnitsMismatch,
            f64::from(rights.rights.max_units),
            f64::from(summary.total_units),
            format!(
                "plan declares {} units, parcel allows exactly {}",
                summary.total_units, rights.rights.max_units
            ),
        ));
    }

    let target_area = rights.rights.main_area_sqm;
    if target_area > 0.0 {
        let drift = (summary.total_main_area_sqm - target_area).abs() / target_area;
        if drift > MAIN_AREA_TOLERANCE {
            found.push(Discrepancy::new(
                Invariant::MainAreaOutOfTolerance,
                target_area,
                summary.total_main_area_sqm,
                format!("main area off by {:.1}%", drift * 100.0),
            ));
        }
    }

    let floors = summary.total_floors.max(plan.floor_plans.len() as u32);
    if rights.rights.floors_max > 0 && floors > rights.rights.floors_max {
        found.push(Discrepancy::new(
            Invariant::FloorCountExceeded,
            f64::from(rights.rights.floors_max),
            f64::from(floors),
            format!(
                "plan has {} floors, rights allow {}",
                floors, rights.rights.floors_max
            ),
        ));
    }

    found
}

fn check_totals(plan: &UnitMixPlan, found: &mut Vec<Discrepancy>) {
    let floor_total = plan.declared_floor_units();
    let declared = plan.building_summary.total_units;
    if floor_total != u64::from(declared) {
        found.push(Discrepancy::new(
            Invariant::TotalUnitsMismatch,
            floor_total as f64,
            f64::from(declared),
            format!(
                "floors add up to {} units, building summary reports {}",
                floor_total, declared
            ),
        ));
    }

    let summary_total = plan.summary_units();
    if summary_total != floor_total {
        found.push(Discrepancy::new(
            Invariant::SummaryTotalMismatch,
            floor_total as f64,
            summary_total as f64,
            format!(
                "unit mix summary counts {} units, floors add up to {}",
                summary_total, floor_total
            ),
        ));
    }
}

fn check_floor_rows(plan: &UnitMixPlan, found: &mut Vec<Discrepancy>) {
    let mut seen = BTreeSet::new();
    for floor in &plan.floor_plans {
        if !seen.insert(floor.floor_number) {
            found.push(
                Discrepancy::new(
                    Invariant::DuplicateFloorNumber,
                    1.0,
                    plan.floor_plans
                        .iter()
                        .filter(|f| f.floor_number == floor.floor_number)
                        .count() as f64,
                    format!("floor {} is listed more than once", floor.floor_number),
                )
                .scoped(format!("floor {}", floor.floor_number)),
            );
        }

        let counted = floor.counted_units();
        if counted != u64::from(floor.total_units) {
            found.push(
                Discrepancy::new(
                    Invariant::FloorTotalMismatch,
                    counted as f64,
                    f64::from(floor.total_units),
                    format!(
                        "unit rows add up to {}, floor declares {}",
                        counted, floor.total_units
                    ),
                )
                .scoped(format!("floor {}", floor.floor_number)),
            );
        }
    }
}

fn counts_by_type(plan: &UnitMixPlan) -> BTreeMap<&str, u64> {
    let mut counts = BTreeMap::new();
    for unit in plan.floor_plans.iter().flat_map(|f| &f.units) {
        *counts.entry(unit.unit_type.as_str()).or_insert(0) += u64::from(unit.count);
    }
    counts
}

fn check_type_counts(plan: &UnitMixPlan, found: &mut Vec<Discrepancy>) {
    let detail = counts_by_type(plan);

    let mut summary: BTreeMap<&str, u64> = BTreeMap::new();
    for entry in &plan.unit_mix_summary {
        *summary.entry(entry.unit_type.as_str()).or_insert(0) += u64::from(entry.total_count);
    }

    let tags: BTreeSet<&str> = detail.keys().chain(summary.keys()).copied().collect();
    for tag in tags {
        let counted = detail.get(tag).copied().unwrap_or(0);
        let reported = summary.get(tag).copied().unwrap_or(0);
        if counted != reported {
            found.push(
                Discrepancy::new(
                    Invariant::UnitTypeCountMismatch,
                    counted as f64,
                    reported as f64,
                    format!(
                        "floors contain {} units of type {}, summary reports {}",
                        counted, tag, reported
                    ),
                )
                .scoped(format!("unit type {}", tag)),
            );
        }
    }
}

fn check_percentages(plan: &UnitMixPlan, found: &mut Vec<Discrepancy>) {
    if plan.unit_mix_summary.is_empty() {
        return;
    }

    let sum: f64 = plan.unit_mix_summary.iter().map(|e| e.percentage).sum();
    let tolerance = (0.5 * plan.unit_mix_summary.len() as f64).max(1.0);
    if (sum - 100.0).abs() > tolerance {
        found.push(Discrepancy::new(
            Invariant::PercentageSumMismatch,
            100.0,
            sum,
            format!("percentages add up to {}", sum),
        ));
    }

    let total = plan.summary_units();
    if total == 0 {
        return;
    }
    for entry in &plan.unit_mix_summary {
        let exact = f64::from(entry.total_count) * 100.0 / total as f64;
        if (entry.percentage - exact).abs() > PERCENTAGE_TOLERANCE {
            found.push(
                Discrepancy::new(
                    Invariant::PercentageMismatch,
                    exact,
                    entry.percentage,
                    format!(
                        "{} of {} units is {:.1}%, summary reports {}%",
                        entry.total_count, total, exact, entry.percentage
                    ),
                )
                .scoped(format!("unit type {}", entry.unit_type)),
            );
        }
    }
}

fn check_ground_floor(plan: &UnitMixPlan, found: &mut Vec<Discrepancy>) {
    for floor in plan
        .floor_plans
        .iter()
        .filter(|f| f.floor_type == FloorType::Ground)
    {
        let units = u64::from(floor.total_units).max(floor.counted_units());
        if units > 0 {
            found.push(
                Discrepancy::new(
                    Invariant::GroundFloorUnits,
                    0.0,
                    units as f64,
                    "ground floor must not contain residential units",
                )
                .scoped(format!("floor {}", floor.floor_number)),
            );
        }
    }
}

fn check_penthouse_placement(
    plan: &UnitMixPlan,
    catalogue: &UnitTypeCatalogue,
    found: &mut Vec<Discrepancy>,
) {
    let highest_regular = plan
        .floor_plans
        .iter()
        .filter(|f| {
            f.units
                .iter()
                .any(|u| u.count > 0 && !catalogue.is_penthouse(&u.unit_type))
        })
        .map(|f| f.floor_number)
        .max();
    let Some(highest_regular) = highest_regular else {
        return;
    };

    for floor in &plan.floor_plans {
        if floor.floor_number >= highest_regular {
            continue;
        }
        for unit in floor
            .units
            .iter()
            .filter(|u| u.count > 0 && catalogue.is_penthouse(&u.unit_type))
        {
            found.push(
                Discrepancy::new(
                    Invariant::PenthouseBelowTop,
                    f64::from(highest_regular),
                    f64::from(floor.floor_number),
                    format!(
                        "{} on floor {} sits below regular units on floor {}",
                        unit.unit_type, floor.floor_number, highest_regular
                    ),
                )
                .scoped(format!("floor {}", floor.floor_number)),
            );
        }
    }
}

fn check_catalogue(plan: &UnitMixPlan, catalogue: &UnitTypeCatalogue, found: &mut Vec<Discrepancy>) {
    for floor in &plan.floor_plans {
        for unit in &floor.units {
            let scope = format!("floor {}", floor.floor_number);
            match catalogue.get(&unit.unit_type) {
                None => found.push(
                    Discrepancy::new(
                        Invariant::UnknownUnitType,
                        0.0,
                        f64::from(unit.count),
                        format!(
                            "unit type {} is not one of [{}]",
                            unit.unit_type,
                            catalogue.tags().join(", ")
                        ),
                    )
                    .scoped(scope),
                ),
                Some(spec) if !spec.contains_area(unit.area_sqm) => found.push(
                    Discrepancy::new(
                        Invariant::UnitAreaOutOfBand,
                        spec.min_sqm,
                        unit.area_sqm,
                        format!(
                            "{} is {} sqm, catalogue band is {}",
                            unit.unit_type,
                            unit.area_sqm,
                            spec.band_label()
                        ),
                    )
                    .scoped(scope),
                ),
                Some(_) => {}
            }
        }
    }
}

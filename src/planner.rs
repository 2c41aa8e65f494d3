//! Deterministic baseline unit mix.
//!
//! Produces a plan straight from the catalogue shares without calling the
//! model. The result satisfies every reconciliation invariant by
//! construction, which makes it a reference to compare generated plans with.

use crate::catalogue::{UnitTypeCatalogue, UnitTypeSpec};
use crate::error::{ConceptaError, Result};
use crate::schema::{
    BuildingSummary, FloorPlan, FloorType, FloorUnit, ParcelRights, ProjectInfo, UnitMixPlan,
    UnitMixSummaryEntry,
};
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Highest `floors_max` the planner will lay out. Israel's tallest
/// residential towers are under 100 storeys.
pub const MAX_PLANNED_FLOORS: u32 = 200;

/// Splits `total` into integer parts proportional to `weights`.
///
/// Largest-remainder method: the parts always sum to `total` (unless every
/// weight is zero). Ties go to the earlier weight.
pub fn apportion(weights: &[f64], total: u32) -> Vec<u32> {
    largest_remainder(weights, total, false)
}

fn largest_remainder(weights: &[f64], total: u32, lift_zeros: bool) -> Vec<u32> {
    let weight_sum: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if weight_sum <= 0.0 {
        return vec![0; weights.len()];
    }

    let exact: Vec<f64> = weights
        .iter()
        .map(|w| w.max(0.0) * f64::from(total) / weight_sum)
        .collect();
    let mut parts: Vec<u32> = exact.iter().map(|e| e.floor() as u32).collect();
    let assigned: u32 = parts.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
    order.sort_by(|&a, &b| {
        // With lift_zeros, a non-zero weight never ends up with a zero part
        // while there is remainder left to hand out.
        let lifted = |i: usize| lift_zeros && parts[i] == 0;
        lifted(b)
            .cmp(&lifted(a))
            .then_with(|| {
                let fa = exact[a] - exact[a].floor();
                let fb = exact[b] - exact[b].floor();
                fb.partial_cmp(&fa).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.cmp(&b))
    });

    let remainder = total.saturating_sub(assigned) as usize;
    for &i in order.iter().cycle().take(remainder) {
        parts[i] += 1;
    }
    parts
}

/// Integer percentages summing to exactly 100.
fn whole_percentages(counts: &[u64]) -> Vec<u32> {
    let weights: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
    largest_remainder(&weights, 100, true)
}

/// Recomputes the summary table from floor detail.
///
/// Catalogue types come first in catalogue order, unknown tags after them
/// alphabetically. Types with no units are omitted.
pub fn summarize_floors(
    floors: &[FloorPlan],
    catalogue: &UnitTypeCatalogue,
) -> Vec<UnitMixSummaryEntry> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for unit in floors.iter().flat_map(|f| &f.units) {
        *counts.entry(unit.unit_type.as_str()).or_insert(0) += u64::from(unit.count);
    }

    let mut ordered: Vec<(&str, u64)> = catalogue
        .entries
        .iter()
        .filter_map(|e| counts.remove(e.tag.as_str()).map(|c| (e.tag.as_str(), c)))
        .collect();
    ordered.extend(counts);
    ordered.retain(|(_, count)| *count > 0);

    let tallies: Vec<u64> = ordered.iter().map(|(_, c)| *c).collect();
    let percentages = whole_percentages(&tallies);

    ordered
        .into_iter()
        .zip(percentages)
        .map(|((tag, count), pct)| UnitMixSummaryEntry {
            unit_type: tag.to_string(),
            label: catalogue.get(tag).map(|e| e.label.clone()),
            total_count: u32::try_from(count).unwrap_or(u32::MAX),
            percentage: f64::from(pct),
        })
        .collect()
}

/// Unit rows for `count` units of one type on one floor.
///
/// Banded types are split between the bottom and top of the band.
fn unit_rows(spec: &UnitTypeSpec, count: u32) -> Vec<FloorUnit> {
    let row = |area_sqm: f64, count: u32| FloorUnit {
        unit_type: spec.tag.clone(),
        area_sqm,
        count,
        color: spec.color.clone(),
    };

    if (spec.max_sqm - spec.min_sqm).abs() < f64::EPSILON || count < 2 {
        return vec![row(spec.min_sqm, count)];
    }
    let lower = count.div_ceil(2);
    vec![row(spec.min_sqm, lower), row(spec.max_sqm, count - lower)]
}

fn floor_label(number: u32, floor_type: FloorType) -> String {
    match floor_type {
        FloorType::Ground => "Ground floor (commercial)".to_string(),
        FloorType::Penthouse => format!("Floor {} (penthouse)", number),
        _ => format!("Floor {}", number),
    }
}

/// Drafts a unit mix for `rights` from the catalogue's target shares.
pub fn draft_unit_mix(rights: &ParcelRights, catalogue: &UnitTypeCatalogue) -> Result<UnitMixPlan> {
    let total = rights.rights.max_units;
    let floors = rights.rights.floors_max;
    if floors < 2 {
        return Err(ConceptaError::validation(
            "$.rights.floors_max",
            "need a ground floor and at least one residential floor",
        ));
    }
    if floors > MAX_PLANNED_FLOORS {
        return Err(ConceptaError::validation(
            "$.rights.floors_max",
            format!("{} floors exceeds the planner limit of {}", floors, MAX_PLANNED_FLOORS),
        ));
    }
    if u64::from(floors) > u64::from(total) + 1 {
        return Err(ConceptaError::validation(
            "$.rights.floors_max",
            format!("{} floors cannot all be used by {} units", floors, total),
        ));
    }

    let shares: Vec<f64> = catalogue.entries.iter().map(|e| e.target_share).collect();
    if total > 0 && shares.iter().all(|s| *s <= 0.0) {
        return Err(ConceptaError::validation(
            "$",
            "unit type catalogue has no positive target shares",
        ));
    }

    // 1. Split the parcel total between unit types
    let type_counts = apportion(&shares, total);

    // 2. Penthouse types go to the top floor, the rest fill typical floors
    let top = floors - 1;
    let mut per_floor: Vec<Vec<FloorUnit>> = vec![Vec::new(); floors as usize];

    let penthouse_total: u32 = catalogue
        .entries
        .iter()
        .zip(&type_counts)
        .filter(|(e, _)| e.is_penthouse)
        .map(|(_, c)| *c)
        .sum();
    for (spec, count) in catalogue.entries.iter().zip(&type_counts) {
        if spec.is_penthouse && *count > 0 {
            per_floor[top as usize].extend(unit_rows(spec, *count));
        }
    }

    let typical: Vec<u32> = if penthouse_total > 0 && top > 1 {
        (1..top).collect()
    } else {
        (1..=top).collect()
    };

    // 3. Fill typical floors bottom-up, smallest types first
    let mut regular: Vec<(&UnitTypeSpec, u32)> = catalogue
        .entries
        .iter()
        .zip(type_counts.iter().copied())
        .filter(|(e, c)| !e.is_penthouse && *c > 0)
        .collect();
    regular.sort_by(|(a, _), (b, _)| {
        a.min_sqm
            .partial_cmp(&b.min_sqm)
            .unwrap_or(Ordering::Equal)
    });

    let regular_total: u32 = regular.iter().map(|(_, c)| *c).sum();
    let capacities = apportion(&vec![1.0; typical.len()], regular_total);

    let mut queue = regular.into_iter();
    let mut current = queue.next();
    for (floor_number, capacity) in typical.iter().zip(capacities) {
        let mut room = capacity;
        while room > 0 {
            let Some((spec, left)) = current.as_mut() else {
                break;
            };
            let take = room.min(*left);
            per_floor[*floor_number as usize].extend(unit_rows(*spec, take));
            room -= take;
            *left -= take;
            if *left == 0 {
                current = queue.next();
            }
        }
    }

    // 4. Assemble floors, summary and totals
    let floor_plans: Vec<FloorPlan> = per_floor
        .into_iter()
        .enumerate()
        .map(|(i, units)| {
            let number = i as u32;
            let floor_type = if number == 0 {
                FloorType::Ground
            } else if units.iter().any(|u| catalogue.is_penthouse(&u.unit_type)) {
                FloorType::Penthouse
            } else {
                FloorType::Typical
            };
            let total_units = units.iter().map(|u| u.count).sum();
            FloorPlan {
                floor_number: number,
                floor_type,
                floor_label: Some(floor_label(number, floor_type)),
                units,
                total_units,
            }
        })
        .collect();

    let unit_mix_summary = summarize_floors(&floor_plans, catalogue);
    let total_main_area_sqm: f64 = floor_plans.iter().map(FloorPlan::counted_area_sqm).sum();

    debug!(
        "Drafted {} units over {} floors ({} penthouse)",
        total, floors, penthouse_total
    );

    Ok(UnitMixPlan {
        project_info: Some(ProjectInfo {
            gush: rights.parcel.gush.clone(),
            helka: rights.parcel.helka.clone(),
            plan_number: rights.zoning.plan_number.clone(),
        }),
        building_summary: BuildingSummary {
            num_buildings: None,
            total_floors: floors,
            floors_below_ground: Some(rights.rights.floors_below_ground),
            floors_above_ground: Some(floors),
            total_units: total,
            total_main_area_sqm,
            average_unit_size_sqm: (total > 0).then(|| total_main_area_sqm / f64::from(total)),
        },
        floor_plans,
        unit_mix_summary,
        design_notes: vec![format!(
            "Baseline mix from catalogue shares: {} units on {} floors, ground floor commercial",
            total, floors
        )],
        generated_at: None,
    })
}

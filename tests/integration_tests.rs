use concepta::*;
use pretty_assertions::assert_eq;

fn parcel_rights(max_units: u32, main_area_sqm: f64, floors_max: u32) -> ParcelRights {
    ParcelRights {
        parcel: ParcelIdentity {
            gush: "6666".to_string(),
            helka: "102".to_string(),
            area_net_sqm: 4006.0,
        },
        zoning: ZoningDesignation {
            primary_use: "residential".to_string(),
            allowed_secondary_uses: vec!["commercial".to_string()],
            plan_number: Some("408-0872473".to_string()),
            plan_name: None,
        },
        rights: BuildingRights {
            max_units,
            main_area_sqm,
            service_area_sqm: 8550.0,
            balcony_area_sqm: 2250.0,
            floors_max,
            floors_below_ground: 2,
            height_max_m: 75.0,
            coverage_percent: 0.0,
        },
        constraints: PlanningConstraints::default(),
        confidence_level: ConfidenceLevel::High,
        risk_notes: vec![],
        extracted_at: None,
    }
}

fn invariants(found: &[Discrepancy]) -> Vec<Invariant> {
    found.iter().map(|d| d.invariant).collect()
}

#[test]
fn test_draft_for_typical_tower_parcel() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let catalogue = UnitTypeCatalogue::default();
    let plan = draft_unit_mix(&rights, &catalogue).unwrap();

    assert_eq!(plan.building_summary.total_units, 150);
    assert_eq!(plan.floor_plans.len(), 17);
    assert_eq!(plan.top_floor(), Some(16));

    let pct: f64 = plan.unit_mix_summary.iter().map(|e| e.percentage).sum();
    assert_eq!(pct, 100.0);
    assert!(plan.unit_mix_summary.iter().all(|e| e.percentage >= 1.0));

    // Ground floor is commercial only.
    let ground = &plan.floor_plans[0];
    assert_eq!(ground.floor_number, 0);
    assert_eq!(ground.floor_type, FloorType::Ground);
    assert!(ground.units.is_empty());

    let found = review_unit_mix(&plan, Some(&rights), &catalogue);
    assert!(found
        .iter()
        .all(|d| d.invariant == Invariant::MainAreaOutOfTolerance));
}

#[test]
fn test_declared_total_short_of_floor_detail() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let catalogue = UnitTypeCatalogue::default();
    let mut plan = draft_unit_mix(&rights, &catalogue).unwrap();
    plan.building_summary.total_units = 148;

    let found = reconcile_plan(&plan, &catalogue);
    assert_eq!(invariants(&found), vec![Invariant::TotalUnitsMismatch]);
    assert_eq!(found[0].expected, 150.0);
    assert_eq!(found[0].actual, 148.0);
    assert_eq!(found[0].magnitude(), 2.0);

    let against_rights = reconcile_with_rights(&plan, &rights);
    assert!(invariants(&against_rights).contains(&Invariant::MaxUnitsMismatch));
}

#[test]
fn test_residential_units_on_ground_floor() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let catalogue = UnitTypeCatalogue::default();
    let mut plan = draft_unit_mix(&rights, &catalogue).unwrap();

    let moved = plan.floor_plans[1].units[0].clone();
    plan.floor_plans[1].units.remove(0);
    plan.floor_plans[1].total_units -= moved.count;
    plan.floor_plans[0].total_units += moved.count;
    plan.floor_plans[0].units.push(moved);

    let found = reconcile_plan(&plan, &catalogue);
    assert_eq!(invariants(&found), vec![Invariant::GroundFloorUnits]);
    assert_eq!(found[0].scope.as_deref(), Some("floor 0"));
}

#[test]
fn test_unit_mix_round_trips_through_model_text() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let plan = draft_unit_mix(&rights, &UnitTypeCatalogue::default()).unwrap();
    let raw = format!(
        "Here is the plan:\n```json\n{}\n```\nLet me know if you need changes.",
        serde_json::to_string_pretty(&plan).unwrap()
    );

    let extracted = extract_structured::<UnitMixPlan>(&raw).unwrap();
    assert!(extracted.is_consistent());
    assert_eq!(extracted.value.floor_plans, plan.floor_plans);
}

#[test]
fn test_reports_for_drafted_plan() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let catalogue = UnitTypeCatalogue::default();
    let plan = draft_unit_mix(&rights, &catalogue).unwrap();

    let csv = unit_mix_csv(&plan);
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Floor,Floor Type,Label,Unit Type,Area (sqm),Count")
    );
    let units: u32 = lines
        .filter_map(|l| l.rsplit(',').next())
        .filter_map(|c| c.parse::<u32>().ok())
        .sum();
    assert_eq!(units, 150);

    let markdown = unit_mix_markdown(&plan);
    assert!(markdown.contains("150"));

    let found = review_unit_mix(&plan, Some(&rights), &catalogue);
    let table = discrepancy_markdown(&found);
    if found.is_empty() {
        assert_eq!(table, "No discrepancies found.\n");
    } else {
        assert!(table.contains("main_area_out_of_tolerance"));
    }
}

#[test]
fn test_workflow_guards() {
    let rights = parcel_rights(150, 14_700.0, 17);
    let plan = draft_unit_mix(&rights, &UnitTypeCatalogue::default()).unwrap();
    let mut workflow = Workflow::new();

    let err = workflow
        .record_unit_mix(Extracted {
            value: plan.clone(),
            discrepancies: vec![],
        })
        .unwrap_err();
    assert!(matches!(err, ConceptaError::InvalidTransition { .. }));
    assert_eq!(workflow.stage(), WorkflowStage::Input);

    workflow.record_rights(rights, None).unwrap();
    workflow
        .record_unit_mix(Extracted {
            value: plan,
            discrepancies: vec![],
        })
        .unwrap();
    assert_eq!(workflow.stage(), WorkflowStage::UnitMixGenerated);

    assert!(workflow.select_massing("a").is_err());
    assert!(workflow.mark_exported().is_err());

    assert_eq!(workflow.step_back().unwrap(), WorkflowStage::RightsExtracted);
    assert!(workflow.unit_mix().is_none());
    assert!(workflow.rights().is_some());
}

#[test]
fn test_huge_model_counts_become_discrepancies() {
    let raw = r#"```json
{
  "building_summary": {"total_floors": 3, "total_units": 4000000000, "total_main_area_sqm": 14700},
  "floor_plans": [
    {"floor_number": 1, "floor_type": "typical", "total_units": 4000000000,
     "units": [{"unit_type": "n3", "area_sqm": 81, "count": 4000000000}]},
    {"floor_number": 2, "floor_type": "typical", "total_units": 4000000000,
     "units": [{"unit_type": "n3", "area_sqm": 81, "count": 4000000000}]}
  ],
  "unit_mix_summary": [{"unit_type": "n3", "total_count": 4000000000, "percentage": 100}]
}
```"#;

    let extracted = extract_structured::<UnitMixPlan>(raw).unwrap();
    assert_eq!(extracted.value.declared_floor_units(), 8_000_000_000);
    let mismatch = extracted
        .discrepancies
        .iter()
        .find(|d| d.invariant == Invariant::TotalUnitsMismatch)
        .unwrap();
    assert_eq!(mismatch.expected, 8_000_000_000.0);
    assert_eq!(mismatch.actual, 4_000_000_000.0);
}

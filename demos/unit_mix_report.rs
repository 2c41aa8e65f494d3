use anyhow::Context;
use concepta::*;

fn sample_rights() -> ParcelRights {
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
            max_units: 150,
            main_area_sqm: 14_700.0,
            service_area_sqm: 8550.0,
            balcony_area_sqm: 2250.0,
            floors_max: 17,
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

fn main() -> anyhow::Result<()> {
    println!("🏗️  Unit Mix Baseline\n");

    // Optional: path to a rights JSON (as produced by the zoning stage, fences and all).
    let rights = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading rights from {}", path))?;
            extract_structured::<ParcelRights>(&raw)?.value
        }
        None => sample_rights(),
    };

    println!("{}", rights_markdown(&rights));

    let catalogue = UnitTypeCatalogue::default();
    let plan = draft_unit_mix(&rights, &catalogue)?;
    println!("{}", unit_mix_markdown(&plan));

    println!("📋 Review against the parcel rights:\n");
    let found = review_unit_mix(&plan, Some(&rights), &catalogue);
    println!("{}", discrepancy_markdown(&found));

    // A model answer that lost two units in its headline total.
    let mut tampered = plan.clone();
    tampered.building_summary.total_units = tampered.building_summary.total_units.saturating_sub(2);
    println!("📋 Review of a plan declaring {} units:\n", tampered.building_summary.total_units);
    println!("{}", discrepancy_markdown(&review_unit_mix(&tampered, Some(&rights), &catalogue)));

    let csv_path = "unit_mix.csv";
    std::fs::write(csv_path, unit_mix_csv(&plan)).context("writing unit mix CSV")?;
    println!("💾 Wrote {}", csv_path);

    Ok(())
}

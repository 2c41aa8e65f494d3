use crate::reconcile::Discrepancy;
use crate::schema::{ParcelRights, UnitMixPlan};

fn format_area(sqm: f64) -> String {
    if sqm.fract() == 0.0 {
        format!("{}", sqm as i64)
    } else {
        format!("{:.1}", sqm)
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One row per floor and unit type, top floor first.
pub fn unit_mix_csv(plan: &UnitMixPlan) -> String {
    let mut output = String::new();
    output.push_str("Floor,Floor Type,Label,Unit Type,Area (sqm),Count\n");

    let mut floors: Vec<_> = plan.floor_plans.iter().collect();
    floors.sort_by(|a, b| b.floor_number.cmp(&a.floor_number));

    for floor in floors {
        let label = floor.floor_label.as_deref().unwrap_or("");
        if floor.units.is_empty() {
            output.push_str(&format!(
                "{},{:?},{},,,0\n",
                floor.floor_number,
                floor.floor_type,
                escape_csv(label)
            ));
            continue;
        }
        for unit in &floor.units {
            output.push_str(&format!(
                "{},{:?},{},{},{},{}\n",
                floor.floor_number,
                floor.floor_type,
                escape_csv(label),
                escape_csv(&unit.unit_type),
                format_area(unit.area_sqm),
                unit.count
            ));
        }
    }

    output
}

pub fn unit_mix_markdown(plan: &UnitMixPlan) -> String {
    let mut output = String::new();

    output.push_str("# Unit Mix\n\n");
    if let Some(info) = &plan.project_info {
        output.push_str(&format!("**Gush:** {} **Helka:** {}", info.gush, info.helka));
        if let Some(plan_number) = &info.plan_number {
            output.push_str(&format!(" **Plan:** {}", plan_number));
        }
        output.push_str("\n\n");
    }

    let summary = &plan.building_summary;
    output.push_str("## Building Summary\n\n");
    output.push_str(&format!("- **Total units:** {}\n", summary.total_units));
    output.push_str(&format!("- **Total floors:** {}\n", summary.total_floors));
    output.push_str(&format!(
        "- **Main area:** {} sqm\n",
        format_area(summary.total_main_area_sqm)
    ));
    if let Some(avg) = summary.average_unit_size_sqm {
        output.push_str(&format!("- **Average unit:** {} sqm\n", format_area(avg)));
    }
    output.push('\n');

    output.push_str("## Mix\n\n");
    output.push_str("| Type | Units | Share |\n");
    output.push_str("|------|------:|------:|\n");
    for entry in &plan.unit_mix_summary {
        let name = entry.label.as_deref().unwrap_or(&entry.unit_type);
        output.push_str(&format!(
            "| {} | {} | {}% |\n",
            name, entry.total_count, entry.percentage
        ));
    }
    output.push('\n');

    output.push_str("## Floors\n\n");
    output.push_str("| Floor | Type | Units | Detail |\n");
    output.push_str("|------:|------|------:|--------|\n");
    let mut floors: Vec<_> = plan.floor_plans.iter().collect();
    floors.sort_by(|a, b| b.floor_number.cmp(&a.floor_number));
    for floor in floors {
        let detail = floor
            .units
            .iter()
            .map(|u| format!("{}x {} ({} sqm)", u.count, u.unit_type, format_area(u.area_sqm)))
            .collect::<Vec<_>>()
            .join(", ");
        output.push_str(&format!(
            "| {} | {:?} | {} | {} |\n",
            floor.floor_number, floor.floor_type, floor.total_units, detail
        ));
    }

    if !plan.design_notes.is_empty() {
        output.push_str("\n## Design Notes\n\n");
        for note in &plan.design_notes {
            output.push_str(&format!("- {}\n", note));
        }
    }

    output
}

pub fn discrepancy_markdown(discrepancies: &[Discrepancy]) -> String {
    if discrepancies.is_empty() {
        return "No discrepancies found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!("## Discrepancies ({})\n\n", discrepancies.len()));
    output.push_str("| Check | Scope | Expected | Actual | Detail |\n");
    output.push_str("|-------|-------|---------:|-------:|--------|\n");
    for d in discrepancies {
        let check = serde_json::to_value(d.invariant)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", d.invariant));
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            check,
            d.scope.as_deref().unwrap_or("-"),
            format_area(d.expected),
            format_area(d.actual),
            d.detail
        ));
    }
    output
}

/// Short envelope summary shown next to a rights report.
pub fn rights_markdown(rights: &ParcelRights) -> String {
    let r = &rights.rights;
    let mut output = String::new();

    output.push_str(&format!(
        "# Building Rights - Gush {} Helka {}\n\n",
        rights.parcel.gush, rights.parcel.helka
    ));
    if !rights.zoning.primary_use.is_empty() {
        output.push_str(&format!("**Primary use:** {}\n\n", rights.zoning.primary_use));
    }
    output.push_str(&format!("- **Max units:** {}\n", r.max_units));
    output.push_str(&format!("- **Main area:** {} sqm\n", format_area(r.main_area_sqm)));
    output.push_str(&format!(
        "- **Service area:** {} sqm\n",
        format_area(r.service_area_sqm)
    ));
    output.push_str(&format!("- **Floors:** {}\n", r.floors_max));
    output.push_str(&format!("- **Max height:** {} m\n", format_area(r.height_max_m)));
    if let Some(fsi) = rights.fsi() {
        output.push_str(&format!("- **FSI:** {:.2}\n", fsi));
    }
    output.push_str(&format!(
        "- **Confidence:** {:?}\n",
        rights.confidence_level
    ));

    if !rights.risk_notes.is_empty() {
        output.push_str("\n## Risks\n\n");
        for note in &rights.risk_notes {
            output.push_str(&format!("- **{}:** {}", note.kind, note.description));
            if let Some(clause) = &note.clause_reference {
                output.push_str(&format!(" ({})", clause));
            }
            output.push('\n');
        }
    }

    output
}

use serde::{Deserialize, Serialize};

/// One apartment type with its fixed area band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeSpec {
    pub tag: String,
    pub label: String,
    pub min_sqm: f64,
    pub max_sqm: f64,
    pub color: String,
    pub is_penthouse: bool,
    /// Target share of the whole mix, in percent.
    pub target_share: f64,
}

impl UnitTypeSpec {
    pub fn contains_area(&self, area_sqm: f64) -> bool {
        area_sqm >= self.min_sqm - 0.5 && area_sqm <= self.max_sqm + 0.5
    }

    pub fn band_label(&self) -> String {
        if (self.max_sqm - self.min_sqm).abs() < f64::EPSILON {
            format!("{} sqm", self.min_sqm)
        } else {
            format!("{}-{} sqm", self.min_sqm, self.max_sqm)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeCatalogue {
    pub entries: Vec<UnitTypeSpec>,
}

impl UnitTypeCatalogue {
    pub fn new(entries: Vec<UnitTypeSpec>) -> Self {
        Self { entries }
    }

    pub fn get(&self, tag: &str) -> Option<&UnitTypeSpec> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn is_penthouse(&self, tag: &str) -> bool {
        self.get(tag).is_some_and(|e| e.is_penthouse)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tag.as_str()).collect()
    }

    /// Bullet list used by the unit-mix prompt.
    pub fn to_prompt_lines(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- {}: {}", e.tag, e.band_label()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn spec(tag: &str, label: &str, min: f64, max: f64, color: &str, ph: bool, share: f64) -> UnitTypeSpec {
    UnitTypeSpec {
        tag: tag.to_string(),
        label: label.to_string(),
        min_sqm: min,
        max_sqm: max,
        color: color.to_string(),
        is_penthouse: ph,
        target_share: share,
    }
}

impl Default for UnitTypeCatalogue {
    fn default() -> Self {
        Self::new(vec![
            spec("n3", "n3", 81.0, 81.0, "#81C784", false, 21.0),
            spec("n4", "n4", 109.0, 115.0, "#FFD54F", false, 42.0),
            spec("n5", "n5", 135.0, 145.0, "#FF8A65", false, 35.0),
            spec("mini_ph", "mini PH", 154.0, 154.0, "#CE93D8", true, 1.0),
            spec("ph", "PH", 180.0, 180.0, "#4FC3F7", true, 2.0),
        ])
    }
}

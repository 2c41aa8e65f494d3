//! Locating and parsing JSON payloads inside free-form model output.

use crate::catalogue::UnitTypeCatalogue;
use crate::coerce::SchemaValidator;
use crate::error::{ConceptaError, Result};
use crate::massing::{DesignDna, MassingAlternative, StyledMaterials};
use crate::reconcile::{reconcile_plan, Discrepancy};
use crate::rendering::{ArchitecturalIntelligence, DetectedMaterial};
use crate::schema::{ParcelRights, UnitMixPlan};
use log::debug;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    ParcelRights,
    UnitMixPlan,
    MassingAlternatives,
    DesignDna,
    StyledMaterials,
    ArchitecturalIntelligence,
    DetectedMaterials,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ParcelRights => "parcel_rights",
            Self::UnitMixPlan => "unit_mix_plan",
            Self::MassingAlternatives => "massing_alternatives",
            Self::DesignDna => "design_dna",
            Self::StyledMaterials => "styled_materials",
            Self::ArchitecturalIntelligence => "architectural_intelligence",
            Self::DetectedMaterials => "detected_materials",
        };
        f.write_str(name)
    }
}

/// Which rule located the JSON span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSource {
    FencedBlock,
    BracketScan,
    WholeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSpan<'a> {
    pub text: &'a str,
    pub source: SpanSource,
}

/// A type the reconciler knows how to pull out of model output.
pub trait Extractable: DeserializeOwned + JsonSchema {
    const KIND: SchemaKind;

    /// Checks serde cannot express. Runs after deserialisation.
    fn post_validate(&self) -> Result<()> {
        Ok(())
    }

    /// Arithmetic consistency checks. Violations are data, not errors.
    fn reconcile(&self) -> Vec<Discrepancy> {
        Vec::new()
    }
}

impl Extractable for ParcelRights {
    const KIND: SchemaKind = SchemaKind::ParcelRights;

    fn post_validate(&self) -> Result<()> {
        if self.parcel.gush.trim().is_empty() {
            return Err(ConceptaError::validation("$.parcel.gush", "must not be empty"));
        }
        if self.parcel.helka.trim().is_empty() {
            return Err(ConceptaError::validation("$.parcel.helka", "must not be empty"));
        }
        Ok(())
    }
}

impl Extractable for UnitMixPlan {
    const KIND: SchemaKind = SchemaKind::UnitMixPlan;

    fn reconcile(&self) -> Vec<Discrepancy> {
        reconcile_plan(self, &UnitTypeCatalogue::default())
    }
}

impl Extractable for Vec<MassingAlternative> {
    const KIND: SchemaKind = SchemaKind::MassingAlternatives;

    fn post_validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ConceptaError::validation(
                "$",
                "expected at least one massing alternative",
            ));
        }
        Ok(())
    }
}

impl Extractable for DesignDna {
    const KIND: SchemaKind = SchemaKind::DesignDna;
}

impl Extractable for StyledMaterials {
    const KIND: SchemaKind = SchemaKind::StyledMaterials;
}

impl Extractable for ArchitecturalIntelligence {
    const KIND: SchemaKind = SchemaKind::ArchitecturalIntelligence;
}

impl Extractable for Vec<DetectedMaterial> {
    const KIND: SchemaKind = SchemaKind::DetectedMaterials;

    fn post_validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ConceptaError::validation("$", "expected at least one material"));
        }
        Ok(())
    }
}

/// A validated object plus whatever the reconciliation pass found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extracted<T> {
    pub value: T,
    pub discrepancies: Vec<Discrepancy>,
}

impl<T> Extracted<T> {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        Extracted {
            value: f(self.value),
            discrepancies: self.discrepancies,
        }
    }
}

/// Pulls a `T` out of raw model text: locate, parse, validate, reconcile.
pub fn extract_structured<T: Extractable>(raw: &str) -> Result<Extracted<T>> {
    let span = locate_json(raw);
    debug!(
        "Located {} payload via {:?} ({} of {} bytes)",
        T::KIND,
        span.source,
        span.text.len(),
        raw.len()
    );

    let mut value: serde_json::Value =
        serde_json::from_str(span.text).map_err(|e| ConceptaError::Parse {
            message: format!("{} response is not valid JSON: {}", T::KIND, e),
            raw: raw.to_string(),
        })?;

    SchemaValidator::for_type::<T>()?.validate(&mut value)?;

    let parsed: T =
        serde_json::from_value(value).map_err(|e| ConceptaError::validation("$", e.to_string()))?;
    parsed.post_validate()?;

    let discrepancies = parsed.reconcile();
    Ok(Extracted {
        value: parsed,
        discrepancies,
    })
}

/// Finds the most likely JSON payload in `raw`.
///
/// Preference: first ```json fenced block, then the longest balanced
/// top-level bracket span, then the whole trimmed text.
pub fn locate_json(raw: &str) -> JsonSpan<'_> {
    if let Some(text) = first_json_fence(raw) {
        return JsonSpan {
            text,
            source: SpanSource::FencedBlock,
        };
    }
    if let Some(text) = longest_bracket_span(raw) {
        return JsonSpan {
            text,
            source: SpanSource::BracketScan,
        };
    }
    JsonSpan {
        text: raw.trim(),
        source: SpanSource::WholeText,
    }
}

fn first_json_fence(raw: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = raw[search_from..].find("```") {
        let fence = search_from + rel;
        let after_ticks = fence + 3;
        let line_end = raw[after_ticks..]
            .find('\n')
            .map_or(raw.len(), |i| after_ticks + i);
        let label = raw[after_ticks..line_end].trim();

        let close = raw[line_end..].find("```").map(|i| line_end + i);
        match close {
            Some(close) if label.eq_ignore_ascii_case("json") => {
                return Some(raw[line_end..close].trim());
            }
            Some(close) => search_from = close + 3,
            None => return None,
        }
    }
    None
}

/// Longest balanced bracket span, ties to the first. One pass over `raw`.
///
/// Every matched pair is a candidate, so spans nested inside an opener that
/// never closes are still found. A mismatched close drops all open brackets.
/// Quotes only open strings while a bracket is open.
fn longest_bracket_span(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let mut open: Vec<(usize, u8)> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push((i, b'}')),
            b'[' => open.push((i, b']')),
            b'}' | b']' => match open.pop() {
                Some((start, closer)) if closer == b => {
                    let end = i + 1;
                    if best.map_or(true, |(s, e)| end - start > e - s) {
                        best = Some((start, end));
                    }
                }
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
    }

    best.map(|(s, e)| &raw[s..e])
}

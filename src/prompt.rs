//! Placeholder substitution for prompt templates.
//!
//! Templates use `{NAME}` placeholders where `NAME` is upper-case ASCII,
//! digits and underscores. Anything else between braces (JSON examples in
//! the template body, for instance) is copied through untouched.

use crate::error::TemplateError;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub enum BindingValue {
    Text(String),
    Integer(i64),
    /// Rendered without grouping separators; integral values drop the fraction.
    Number(f64),
    /// Rendered with `,` thousands separators.
    GroupedNumber(f64),
    List(Vec<String>),
    Json(serde_json::Value),
}

impl BindingValue {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Number(n) => format_number(*n),
            Self::GroupedNumber(n) => format_grouped(*n),
            Self::List(items) => items.join(", "),
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<u32> for BindingValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<i64> for BindingValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for BindingValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<String>> for BindingValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn format_grouped(n: f64) -> String {
    let plain = format_number(n);
    let (sign, rest) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, BindingValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<BindingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<BindingValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&BindingValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    body: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Distinct placeholder keys, in sorted order.
    pub fn placeholders(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let mut rest = self.body.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match placeholder_at(after) {
                Some(key) => {
                    keys.insert(key.to_string());
                    rest = &after[key.len() + 1..];
                }
                None => rest = after,
            }
        }
        keys
    }

    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        render(self, bindings)
    }
}

/// Returns the key if `s` starts with `NAME}`.
fn placeholder_at(s: &str) -> Option<&str> {
    let end = s.find('}')?;
    let key = &s[..end];
    let mut chars = key.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
        Some(key)
    } else {
        None
    }
}

/// Substitutes every placeholder in a single pass.
///
/// Fails on the first placeholder without a binding; substituted values are
/// never scanned again, so a value containing `{X}` stays literal.
pub fn render(template: &PromptTemplate, bindings: &Bindings) -> Result<String, TemplateError> {
    let placeholders = template.placeholders();
    if let Some(missing) = placeholders.iter().find(|k| bindings.get(k).is_none()) {
        return Err(TemplateError::MissingBinding {
            template: template.name.clone(),
            key: missing.clone(),
        });
    }

    for key in bindings.keys().filter(|k| !placeholders.contains(*k)) {
        debug!("Template '{}' ignores binding {}", template.name, key);
    }

    let rendered: BTreeMap<&str, String> = placeholders
        .iter()
        .filter_map(|k| bindings.get(k).map(|v| (k.as_str(), v.render())))
        .collect();

    let mut out = String::with_capacity(template.body.len());
    let mut rest = template.body.as_str();
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match placeholder_at(after).and_then(|k| rendered.get(k).map(|v| (k, v))) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn has_placeholder_token(s: &str) -> bool {
        !PromptTemplate::new("check", s).placeholders().is_empty()
    }

    #[test]
    fn test_placeholders_ignore_json_braces() {
        let template = PromptTemplate::new(
            "t",
            r#"Units: {MAX_UNITS}. Example: {"total_units": {MAX_UNITS}, "a": {}} {lower} {FLOORS_MAX}"#,
        );
        let keys: Vec<String> = template.placeholders().into_iter().collect();
        assert_eq!(keys, vec!["FLOORS_MAX".to_string(), "MAX_UNITS".to_string()]);
    }

    #[test]
    fn test_render_substitutes_globally() {
        let template = PromptTemplate::new("t", "Parcel {HELKA} in {GUSH}; only {HELKA}!");
        let out = template
            .render(&Bindings::new().with("GUSH", "6666").with("HELKA", "102"))
            .unwrap();
        assert_eq!(out, "Parcel 102 in 6666; only 102!");
        assert!(!has_placeholder_token(&out));
    }

    #[test]
    fn test_missing_binding_fails() {
        let template = PromptTemplate::new("zoning_analysis", "{GUSH}/{HELKA}");
        let err = template
            .render(&Bindings::new().with("GUSH", "1"))
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingBinding {
                template: "zoning_analysis".to_string(),
                key: "HELKA".to_string()
            }
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let template = PromptTemplate::new("t", "{A} {B}");
        let out = template
            .render(&Bindings::new().with("A", "{B}").with("B", "x"))
            .unwrap();
        assert_eq!(out, "{B} x");
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(BindingValue::Number(14700.0).render(), "14700");
        assert_eq!(BindingValue::Number(52.5).render(), "52.5");
        assert_eq!(BindingValue::GroupedNumber(14700.0).render(), "14,700");
        assert_eq!(BindingValue::GroupedNumber(1234567.25).render(), "1,234,567.25");
        assert_eq!(BindingValue::GroupedNumber(-950.0).render(), "-950");
        assert_eq!(BindingValue::Integer(150).render(), "150");
        assert_eq!(
            BindingValue::List(vec!["concrete".into(), "glass".into()]).render(),
            "concrete, glass"
        );
        assert_eq!(
            BindingValue::Json(json!({"a": 1})).render(),
            "{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn test_unused_bindings_are_allowed() {
        let template = PromptTemplate::new("t", "no placeholders");
        let out = template.render(&Bindings::new().with("EXTRA", 1u32)).unwrap();
        assert_eq!(out, "no placeholders");
    }

    #[test]
    fn test_completeness_over_many_placeholders() {
        let keys = ["A", "B_2", "C_LONG_NAME", "D", "E9"];
        let body = keys
            .iter()
            .map(|k| format!("{{{}}} and {{{}}}", k, k))
            .collect::<Vec<_>>()
            .join(" | ");
        let template = PromptTemplate::new("t", body);
        let mut bindings = Bindings::new();
        for (i, k) in keys.iter().enumerate() {
            bindings.insert(*k, format!("value-{}", i));
        }
        let out = template.render(&bindings).unwrap();
        assert!(!has_placeholder_token(&out));
        assert_eq!(out.matches("value-2").count(), 2);
    }
}

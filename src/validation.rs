//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations against a layout, its template
//! dimensions and (when known) the data header.
//! Policy maps violations to actions.

use serde::{Deserialize, Serialize};

use crate::fields::{Alignment, FieldSpec};
use crate::templates::{FailureMode, Layout, Template};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

impl ValidationViolation {
    fn error(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            severity: ViolationSeverity::Error,
            message,
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    fn warning(rule: &str, message: String) -> Self {
        Self { severity: ViolationSeverity::Warning, ..Self::error(rule, message) }
    }

    fn expected(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    fn remediation(mut self, step: &str) -> Self {
        self.remediation.push(step.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub layout_id: String,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(|v| v.severity == ViolationSeverity::Error)
    }
}

/// Input for validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInput {
    pub layout_id: String,
    pub template_width: u32,
    pub template_height: u32,
    /// Data header; `None` when no data source is known yet.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    pub fields: Vec<FieldSpec>,
}

impl LayoutInput {
    pub fn new(layout: &Layout, template: &Template, columns: Option<Vec<String>>) -> Self {
        Self {
            layout_id: layout.id.clone(),
            template_width: template.width(),
            template_height: template.height(),
            columns,
            fields: layout.fields.clone(),
        }
    }

    fn placed(&self) -> impl Iterator<Item = (&FieldSpec, i32, i32)> {
        self.fields
            .iter()
            .filter_map(|f| f.anchor().map(|(x, y)| (f, x, y)))
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct PlacementRule;

impl ValidationRule for PlacementRule {
    fn name(&self) -> &'static str { "placement" }

    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation> {
        if input.placed().next().is_some() {
            return vec![];
        }
        vec![ValidationViolation::error(self.name(), "No field has been placed".to_string())
            .expected("at least 1 placed field", "0")
            .remediation("Select a column and click on the template to place it")]
    }
}

pub struct FontSizeRule;

impl ValidationRule for FontSizeRule {
    fn name(&self) -> &'static str { "font_size" }

    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        for field in &input.fields {
            if field.font_size == 0 {
                violations.push(
                    ValidationViolation::error(self.name(), format!("Field {} has font size 0", field.source_column))
                        .expected("> 0", "0")
                        .remediation("Set a positive fontSize"),
                );
            }
            if field.min_font_size == 0 {
                violations.push(
                    ValidationViolation::error(
                        self.name(),
                        format!("Field {} has minimum font size 0", field.source_column),
                    )
                    .expected("> 0", "0"),
                );
            }
        }
        violations
    }
}

pub struct AnchorBoundsRule;

impl ValidationRule for AnchorBoundsRule {
    fn name(&self) -> &'static str { "anchor_bounds" }

    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation> {
        let (w, h) = (input.template_width as i64, input.template_height as i64);
        input
            .placed()
            .filter(|&(_, x, y)| x < 0 || y < 0 || x as i64 >= w || y as i64 >= h)
            .map(|(field, x, y)| {
                ValidationViolation::error(
                    self.name(),
                    format!("Field {} is anchored outside the template", field.source_column),
                )
                .expected(format!("0..{w} x 0..{h}"), format!("({x}, {y})"))
                .remediation("Re-place the field on the template")
            })
            .collect()
    }
}

pub struct WrapWidthRule;

impl ValidationRule for WrapWidthRule {
    fn name(&self) -> &'static str { "wrap_width" }

    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        for field in &input.fields {
            for (key, width) in [("maxWidth", field.max_width), ("fitWidth", field.fit_width)] {
                if width == Some(0) {
                    violations.push(
                        ValidationViolation::error(
                            self.name(),
                            format!("Field {} has {key} 0", field.source_column),
                        )
                        .expected("> 0", "0"),
                    );
                }
            }
        }

        for (field, x, _) in input.placed() {
            let Some(width) = field.max_width.or(field.fit_width).filter(|w| *w > 0) else {
                continue;
            };
            let right = match field.alignment {
                Alignment::Left => x as i64 + width as i64,
                Alignment::Center => x as i64 + (width / 2) as i64,
            };
            if right > input.template_width as i64 {
                violations.push(
                    ValidationViolation::warning(
                        self.name(),
                        format!("Field {} text block extends past the right edge", field.source_column),
                    )
                    .expected(format!("right edge <= {}", input.template_width), right.to_string())
                    .remediation("Move the anchor left or reduce the width"),
                );
            }
        }
        violations
    }
}

pub struct ColumnPresenceRule;

impl ValidationRule for ColumnPresenceRule {
    fn name(&self) -> &'static str { "column_presence" }

    fn validate(&self, input: &LayoutInput) -> Vec<ValidationViolation> {
        let Some(columns) = &input.columns else {
            return vec![];
        };
        input
            .placed()
            .filter(|(field, _, _)| !columns.contains(&field.source_column))
            .map(|(field, _, _)| {
                ValidationViolation::warning(
                    self.name(),
                    format!("Column {} is not in the data source; the field will render blank", field.source_column),
                )
                .remediation("Check the column name against the spreadsheet header")
            })
            .collect()
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(PlacementRule),
                Box::new(FontSizeRule),
                Box::new(AnchorBoundsRule),
                Box::new(WrapWidthRule),
                Box::new(ColumnPresenceRule),
            ],
        }
    }

    pub fn validate(&self, input: &LayoutInput, failure_mode: FailureMode) -> ValidationResult {
        let violations: Vec<_> = self.rules.iter().flat_map(|rule| rule.validate(input)).collect();

        // Apply failure mode policy
        let has_errors = violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        let valid = match failure_mode {
            FailureMode::Block => !has_errors,
            FailureMode::Warn | FailureMode::Log => true,
        };

        ValidationResult {
            valid,
            violations,
            layout_id: input.layout_id.clone(),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(fields: Vec<FieldSpec>, columns: Option<Vec<&str>>) -> LayoutInput {
        LayoutInput {
            layout_id: "test".into(),
            template_width: 1200,
            template_height: 800,
            columns: columns.map(|c| c.into_iter().map(String::from).collect()),
            fields,
        }
    }

    fn rules(result: &ValidationResult) -> Vec<&str> {
        result.violations.iter().map(|v| v.rule.as_str()).collect()
    }

    #[test]
    fn test_nothing_placed_blocks() {
        let result = Validator::new().validate(&input(vec![FieldSpec::new("Name")], None), FailureMode::Block);
        assert!(!result.valid);
        assert_eq!(rules(&result), vec!["placement"]);
    }

    #[test]
    fn test_valid_layout() {
        let fields = vec![FieldSpec::new("Name").at(400, 300), FieldSpec::new("Grade")];
        let result = Validator::new().validate(&input(fields, Some(vec!["Name", "Grade"])), FailureMode::Block);
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_anchor_outside_template() {
        let fields = vec![FieldSpec::new("Name").at(1200, 10)];
        let result = Validator::new().validate(&input(fields, None), FailureMode::Block);
        assert!(!result.valid);
        assert_eq!(rules(&result), vec!["anchor_bounds"]);
    }

    #[test]
    fn test_zero_sizes_are_errors() {
        let mut field = FieldSpec::new("Name").at(10, 10).with_font_size(0).with_max_width(0);
        field.min_font_size = 0;
        let result = Validator::new().validate(&input(vec![field], None), FailureMode::Block);
        assert_eq!(rules(&result), vec!["font_size", "font_size", "wrap_width"]);
    }

    #[test]
    fn test_overflowing_wrap_block_warns_only() {
        let fields = vec![FieldSpec::new("Course").at(900, 500).with_max_width(580)];
        let result = Validator::new().validate(&input(fields, None), FailureMode::Block);
        assert!(result.valid);
        assert_eq!(result.violations[0].severity, ViolationSeverity::Warning);

        let centered = vec![FieldSpec::new("Course")
            .at(900, 500)
            .with_max_width(580)
            .with_alignment(Alignment::Center)];
        let result = Validator::new().validate(&input(centered, None), FailureMode::Block);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_missing_column_warns() {
        let fields = vec![FieldSpec::new("Name").at(10, 10), FieldSpec::new("Grade").at(10, 50)];
        let result = Validator::new().validate(&input(fields, Some(vec!["Name"])), FailureMode::Block);
        assert!(result.valid);
        assert_eq!(rules(&result), vec!["column_presence"]);
        assert!(result.violations[0].message.contains("Grade"));
    }

    #[test]
    fn test_warn_mode_never_blocks() {
        let result = Validator::new().validate(&input(vec![], None), FailureMode::Warn);
        assert!(result.valid);
        assert!(result.has_errors());
    }
}

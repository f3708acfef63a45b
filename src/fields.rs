//! Field Specifications - Column-to-Position Bindings
//!
//! A field binds one data column to a draw position, font and layout policy.
//! Anchors are always template space; a field without an anchor is inactive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::CellValue;

/// Source patterns recognised by the `date` field kind, tried in order.
pub const ACCEPTED_DATE_PATTERNS: [&str; 2] = ["%d-%m-%Y", "%Y-%m-%d"];

/// Canonical rendering of a date-like value.
pub const CANONICAL_DATE_FORMAT: &str = "%d - %m - %Y";

pub const DEFAULT_FONT_FAMILY: &str = "arial.ttf";
pub const DEFAULT_FONT_SIZE: u32 = 40;
pub const DEFAULT_LINE_SPACING: i32 = 5;
pub const DEFAULT_MIN_FONT_SIZE: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Filled from the layout map key when omitted.
    #[serde(default)]
    pub source_column: String,
    #[serde(default, rename = "x", alias = "anchorX")]
    pub anchor_x: Option<i32>,
    #[serde(default, rename = "y", alias = "anchorY")]
    pub anchor_y: Option<i32>,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: i32,
    #[serde(default)]
    pub color: Rgb,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Shrink a single-line field until it fits this width.
    #[serde(default)]
    pub fit_width: Option<u32>,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_line_spacing() -> i32 {
    DEFAULT_LINE_SPACING
}

fn default_min_font_size() -> u32 {
    DEFAULT_MIN_FONT_SIZE
}

impl FieldSpec {
    /// An unplaced field for `column` with default font and layout.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            source_column: column.into(),
            anchor_x: None,
            anchor_y: None,
            font_family: default_font_family(),
            font_size: DEFAULT_FONT_SIZE,
            alignment: Alignment::Left,
            max_width: None,
            line_spacing: DEFAULT_LINE_SPACING,
            color: Rgb::BLACK,
            kind: FieldKind::Plain,
            required: false,
            fit_width: None,
            min_font_size: DEFAULT_MIN_FONT_SIZE,
        }
    }

    pub fn from_placement(column: impl Into<String>, placement: &Placement) -> Self {
        Self::new(column)
            .at(placement.x, placement.y)
            .with_font_size(placement.font_size)
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.anchor_x = Some(x);
        self.anchor_y = Some(y);
        self
    }

    pub fn with_font(mut self, family: impl Into<String>, size: u32) -> Self {
        self.font_family = family.into();
        self.font_size = size;
        self
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Template-space anchor, present only once both coordinates are placed.
    pub fn anchor(&self) -> Option<(i32, i32)> {
        match (self.anchor_x, self.anchor_y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.anchor().is_some()
    }

    pub fn clear_anchor(&mut self) {
        self.anchor_x = None;
        self.anchor_y = None;
    }
}

/// Minimal placement payload: `{x, y, fontSize}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

/// Convert an ordered `column -> placement` mapping into field specs.
pub fn fields_from_placements<'a, I>(placements: I) -> Vec<FieldSpec>
where
    I: IntoIterator<Item = (&'a String, &'a Placement)>,
{
    placements
        .into_iter()
        .map(|(column, placement)| FieldSpec::from_placement(column.as_str(), placement))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    /// Each line is centered on the anchor x independently.
    Center,
}

/// Text transform applied before measurement and drawing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Plain,
    Upper,
    Date,
}

impl FieldKind {
    pub fn format(&self, value: &CellValue) -> String {
        match (self, value) {
            (FieldKind::Date, CellValue::Date(date)) => date.format(CANONICAL_DATE_FORMAT).to_string(),
            (FieldKind::Date, other) => format_date_text(&other.to_string()),
            (FieldKind::Upper, other) => other.to_string().to_uppercase(),
            (FieldKind::Plain, other) => other.to_string(),
        }
    }
}

/// Reformat `DD-MM-YYYY` / `YYYY-MM-DD` into `DD - MM - YYYY`; anything else is returned verbatim.
pub fn format_date_text(raw: &str) -> String {
    let trimmed = raw.trim();
    ACCEPTED_DATE_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDate::parse_from_str(trimmed, pattern).ok())
        .map(|date| date.format(CANONICAL_DATE_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RgbRepr", into = "[u8; 3]")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(format!("invalid color: {s}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| format!("invalid color: {s}"))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RgbRepr {
    Channels([u8; 3]),
    Hex(String),
}

impl TryFrom<RgbRepr> for Rgb {
    type Error = String;

    fn try_from(repr: RgbRepr) -> Result<Self, Self::Error> {
        match repr {
            RgbRepr::Channels(channels) => Ok(Rgb(channels)),
            RgbRepr::Hex(s) => Rgb::parse_hex(&s),
        }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(color: Rgb) -> Self {
        color.0
    }
}

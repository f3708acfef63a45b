//! Field Rendering - One FieldSpec onto One Raster
//!
//! A `RenderContext` owns the mutable copy of the template for exactly one
//! row. Value transforms run before any measurement.

use image::RgbImage;
use thiserror::Error;

use crate::data::{CellValue, DataRow};
use crate::fields::FieldSpec;
use crate::fonts::FontResolver;
use crate::layout::{draw_multiline, fit_by_size_reduction, wrap};
use crate::templates::Template;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Column {column} holds an error value: {error}")]
    CellError { column: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Field has no anchor.
    Inactive,
    /// Required field whose value is missing.
    Skipped,
    Drawn { lines: usize },
}

pub struct RenderContext {
    canvas: RgbImage,
}

impl RenderContext {
    pub fn new(template: &Template) -> Self {
        Self { canvas: template.image().clone() }
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut RgbImage {
        &mut self.canvas
    }

    pub fn into_image(self) -> RgbImage {
        self.canvas
    }
}

pub struct FieldRenderer {
    fonts: FontResolver,
}

impl FieldRenderer {
    pub fn new(fonts: FontResolver) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontResolver {
        &self.fonts
    }

    pub fn render(&self, ctx: &mut RenderContext, spec: &FieldSpec, row: &DataRow) -> Result<FieldOutcome, RenderError> {
        let Some((x, y)) = spec.anchor() else {
            return Ok(FieldOutcome::Inactive);
        };

        let text = match row.get(&spec.source_column) {
            Some(CellValue::Error { error }) => {
                return Err(RenderError::CellError {
                    column: spec.source_column.clone(),
                    error: error.clone(),
                })
            }
            Some(value) if !value.is_missing() => spec.kind.format(value),
            _ if spec.required => return Ok(FieldOutcome::Skipped),
            _ => String::new(),
        };

        let (lines, font) = match (spec.max_width, spec.fit_width) {
            (Some(max_width), _) => {
                let font = self.fonts.resolve(&spec.font_family, spec.font_size);
                (wrap(&text, &font, max_width), font)
            }
            (None, Some(fit_width)) => {
                let font = fit_by_size_reduction(
                    &self.fonts,
                    &text,
                    &spec.font_family,
                    spec.font_size,
                    fit_width,
                    spec.min_font_size,
                );
                (vec![text], font)
            }
            (None, None) => (vec![text], self.fonts.resolve(&spec.font_family, spec.font_size)),
        };

        draw_multiline(ctx.canvas_mut(), &lines, x, y, &font, spec.alignment, spec.line_spacing, spec.color);
        Ok(FieldOutcome::Drawn { lines: lines.len() })
    }

    /// Render every field; the first field error aborts the row.
    pub fn render_row(&self, ctx: &mut RenderContext, specs: &[FieldSpec], row: &DataRow) -> Result<usize, RenderError> {
        let mut drawn = 0;
        for spec in specs {
            if let FieldOutcome::Drawn { .. } = self.render(ctx, spec, row)? {
                drawn += 1;
            }
        }
        Ok(drawn)
    }
}

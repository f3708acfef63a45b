//! Coordinate Mapping - Preview Canvas <-> Template Pixels
//!
//! The preview shows the template scaled down (never up) and centered in the
//! canvas. Placements are stored in template space only; canvas-space markers
//! are recomputed from the current mapper after every resize.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::FieldSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    template_size: (u32, u32),
    canvas_size: (u32, u32),
    scale: f64,
    display_size: (u32, u32),
    offset: (i32, i32),
}

impl CoordinateMapper {
    pub fn new(template_width: u32, template_height: u32, canvas_width: u32, canvas_height: u32) -> Self {
        let mut mapper = Self {
            template_size: (template_width, template_height),
            canvas_size: (0, 0),
            scale: 1.0,
            display_size: (0, 0),
            offset: (0, 0),
        };
        mapper.resize(canvas_width, canvas_height);
        mapper
    }

    /// Recompute scale and offset for a new canvas size.
    pub fn resize(&mut self, canvas_width: u32, canvas_height: u32) {
        let (tw, th) = self.template_size;
        let scale_w = canvas_width as f64 / tw as f64;
        let scale_h = canvas_height as f64 / th as f64;
        // NaN from a zero-sized template is ignored by f64::min
        self.scale = scale_w.min(scale_h).min(1.0);

        let display_w = (tw as f64 * self.scale).round() as u32;
        let display_h = (th as f64 * self.scale).round() as u32;

        self.canvas_size = (canvas_width, canvas_height);
        self.display_size = (display_w, display_h);
        self.offset = (
            centered_offset(canvas_width, display_w),
            centered_offset(canvas_height, display_h),
        );
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    pub fn template_size(&self) -> (u32, u32) {
        self.template_size
    }

    /// Template-space point for a canvas click, or `None` when the click misses the image.
    ///
    /// Clicks on the far edge of the preview land on the last template pixel.
    pub fn to_template_space(&self, click_x: i32, click_y: i32) -> Option<(i32, i32)> {
        if self.scale <= 0.0 {
            return None;
        }
        let dx = click_x as i64 - self.offset.0 as i64;
        let dy = click_y as i64 - self.offset.1 as i64;
        let (dw, dh) = self.display_size;
        if dx < 0 || dy < 0 || dx > dw as i64 || dy > dh as i64 {
            return None;
        }
        let (tw, th) = self.template_size;
        Some((to_template_axis(dx, self.scale, tw), to_template_axis(dy, self.scale, th)))
    }

    pub fn to_canvas_space(&self, template_x: i32, template_y: i32) -> (i32, i32) {
        (
            ((template_x as f64 * self.scale).round() as i32).saturating_add(self.offset.0),
            ((template_y as f64 * self.scale).round() as i32).saturating_add(self.offset.1),
        )
    }
}

fn to_template_axis(delta: i64, scale: f64, template_len: u32) -> i32 {
    let last = template_len.saturating_sub(1) as i64;
    ((delta as f64 / scale) as i64).min(last) as i32
}

fn centered_offset(canvas: u32, display: u32) -> i32 {
    (canvas as i64 - display as i64).div_euclid(2) as i32
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("No field selected; select a field to place first")]
    NoSelection,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Click at ({0}, {1}) is outside the template preview")]
    OutOfBounds(i32, i32),
}

/// Canvas-space marker for a placed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub column: String,
    pub x: i32,
    pub y: i32,
}

/// Result of a successful placement click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placed {
    pub column: String,
    pub template_x: i32,
    pub template_y: i32,
    pub marker: Marker,
}

/// Explicit state for an interactive placement pass over one template.
#[derive(Debug, Clone)]
pub struct PlacementSession {
    mapper: CoordinateMapper,
    fields: Vec<FieldSpec>,
    selected: Option<String>,
}

impl PlacementSession {
    pub fn new(fields: Vec<FieldSpec>, mapper: CoordinateMapper) -> Self {
        Self { mapper, fields, selected: None }
    }

    /// One unplaced field per data column.
    pub fn for_columns<I, S>(columns: I, mapper: CoordinateMapper) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(columns.into_iter().map(FieldSpec::new).collect(), mapper)
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, column: &str) -> Result<(), PlacementError> {
        self.position(column)?;
        self.selected = Some(column.to_string());
        Ok(())
    }

    /// Place the selected field at a canvas click; the selection is consumed on success.
    pub fn click(&mut self, canvas_x: i32, canvas_y: i32) -> Result<Placed, PlacementError> {
        let column = self.selected.clone().ok_or(PlacementError::NoSelection)?;
        let (x, y) = self
            .mapper
            .to_template_space(canvas_x, canvas_y)
            .ok_or(PlacementError::OutOfBounds(canvas_x, canvas_y))?;

        let index = self.position(&column)?;
        let field = &mut self.fields[index];
        field.anchor_x = Some(x);
        field.anchor_y = Some(y);
        self.selected = None;

        let (mx, my) = self.mapper.to_canvas_space(x, y);
        Ok(Placed {
            column: column.clone(),
            template_x: x,
            template_y: y,
            marker: Marker { column, x: mx, y: my },
        })
    }

    pub fn clear(&mut self, column: &str) -> Result<(), PlacementError> {
        let index = self.position(column)?;
        self.fields[index].clear_anchor();
        Ok(())
    }

    pub fn set_font_size(&mut self, column: &str, size: u32) -> Result<(), PlacementError> {
        let index = self.position(column)?;
        self.fields[index].font_size = size;
        Ok(())
    }

    pub fn resize(&mut self, canvas_width: u32, canvas_height: u32) {
        self.mapper.resize(canvas_width, canvas_height);
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.fields
            .iter()
            .filter_map(|field| {
                let (x, y) = field.anchor()?;
                let (mx, my) = self.mapper.to_canvas_space(x, y);
                Some(Marker { column: field.source_column.clone(), x: mx, y: my })
            })
            .collect()
    }

    pub fn placed_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_active()).count()
    }

    pub fn into_fields(self) -> Vec<FieldSpec> {
        self.fields
    }

    fn position(&self, column: &str) -> Result<usize, PlacementError> {
        self.fields
            .iter()
            .position(|f| f.source_column == column)
            .ok_or_else(|| PlacementError::UnknownField(column.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_never_upscales() {
        let mapper = CoordinateMapper::new(400, 300, 800, 600);
        assert_eq!(mapper.scale_factor(), 1.0);
        assert_eq!(mapper.display_size(), (400, 300));
        assert_eq!(mapper.offset(), (200, 150));
    }

    #[test]
    fn test_scaled_and_centered() {
        let mapper = CoordinateMapper::new(1200, 800, 800, 600);
        let s = mapper.scale_factor();
        assert!((s - 800.0 / 1200.0).abs() < 1e-9);
        assert_eq!(mapper.display_size(), (800, 533));
        assert_eq!(mapper.offset(), (0, 33));
    }

    #[test]
    fn test_click_mapping() {
        let mapper = CoordinateMapper::new(1600, 1000, 800, 600);
        assert_eq!(mapper.scale_factor(), 0.5);
        assert_eq!(mapper.offset(), (0, 50));
        assert_eq!(mapper.to_template_space(0, 50), Some((0, 0)));
        assert_eq!(mapper.to_template_space(400, 200), Some((800, 300)));
        assert_eq!(mapper.to_canvas_space(800, 300), (400, 200));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mapper = CoordinateMapper::new(1200, 800, 800, 600);
        assert_eq!(mapper.to_template_space(10, 20), None);
        assert_eq!(mapper.to_template_space(-1, 100), None);
        assert_eq!(mapper.to_template_space(100, 33 + 534), None);
    }

    #[test]
    fn test_round_trip_within_one_pixel() {
        for (tw, th, cw, ch) in [(1200, 800, 800, 600), (3508, 2480, 1024, 700), (640, 480, 800, 600), (1000, 1000, 333, 777)] {
            let mapper = CoordinateMapper::new(tw, th, cw, ch);
            assert!(mapper.scale_factor() <= 1.0);
            let (ox, oy) = mapper.offset();
            let (dw, dh) = mapper.display_size();
            for cx in (ox..=ox + dw as i32).step_by(7) {
                for cy in (oy..=oy + dh as i32).step_by(11) {
                    let (tx, ty) = mapper.to_template_space(cx, cy).unwrap();
                    let (bx, by) = mapper.to_canvas_space(tx, ty);
                    assert!((bx - cx).abs() <= 1, "x {cx} -> {tx} -> {bx}");
                    assert!((by - cy).abs() <= 1, "y {cy} -> {ty} -> {by}");
                }
            }
        }
    }

    #[test]
    fn test_extreme_clicks_do_not_overflow() {
        let mapper = CoordinateMapper::new(400, 300, 800, 600);
        assert_eq!(mapper.to_template_space(i32::MIN, 0), None);
        assert_eq!(mapper.to_template_space(0, i32::MIN), None);
        assert_eq!(mapper.to_template_space(i32::MAX, i32::MAX), None);
        assert_eq!(mapper.to_canvas_space(i32::MAX, i32::MAX), (i32::MAX, i32::MAX));
    }

    #[test]
    fn test_far_edge_click_stays_inside_template() {
        let mapper = CoordinateMapper::new(1200, 800, 800, 600);
        let (ox, oy) = mapper.offset();
        let (dw, dh) = mapper.display_size();
        let (x, y) = mapper.to_template_space(ox + dw as i32, oy + dh as i32).unwrap();
        assert_eq!((x, y), (1199, 799));
    }

    #[test]
    fn test_zero_canvas_rejects_clicks() {
        let mapper = CoordinateMapper::new(1200, 800, 0, 0);
        assert_eq!(mapper.to_template_space(0, 0), None);
    }

    #[test]
    fn test_session_place_and_resize() {
        let mapper = CoordinateMapper::new(1600, 1000, 800, 600);
        let mut session = PlacementSession::for_columns(["Name", "Course"], mapper);

        assert_eq!(session.click(400, 200), Err(PlacementError::NoSelection));

        session.select("Name").unwrap();
        let placed = session.click(400, 200).unwrap();
        assert_eq!((placed.template_x, placed.template_y), (800, 300));
        assert_eq!((placed.marker.x, placed.marker.y), (400, 200));
        assert_eq!(session.selected(), None);
        assert_eq!(session.placed_count(), 1);

        session.resize(2000, 1000);
        let markers = session.markers();
        assert_eq!(markers, vec![Marker { column: "Name".into(), x: 1000, y: 300 }]);

        let fields = session.into_fields();
        assert_eq!(fields[0].anchor(), Some((800, 300)));
        assert!(!fields[1].is_active());
    }

    #[test]
    fn test_session_rejects_miss_and_unknown() {
        let mapper = CoordinateMapper::new(1200, 800, 800, 600);
        let mut session = PlacementSession::for_columns(["Name"], mapper);
        assert_eq!(session.select("Grade"), Err(PlacementError::UnknownField("Grade".into())));

        session.select("Name").unwrap();
        assert_eq!(session.click(5, 5), Err(PlacementError::OutOfBounds(5, 5)));
        assert_eq!(session.selected(), Some("Name"));

        session.click(100, 100).unwrap();
        session.clear("Name").unwrap();
        assert_eq!(session.placed_count(), 0);
        assert!(session.markers().is_empty());
    }
}

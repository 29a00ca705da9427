//! Montaging of the fields of one well and channel into a single plane.

use crate::domain::image::{Pixel, Plane};
use crate::domain::model::{MetaSeriesMetadata, MontageStrategy};
use crate::utils::error::{HcsError, Result};
use std::cmp::Reverse;

/// A field image together with the metadata it was read with.
pub type Field<T> = (Plane<T>, MetaSeriesMetadata);

pub fn assemble<T: Pixel>(strategy: MontageStrategy, fields: Vec<Field<T>>) -> Result<Plane<T>> {
    match strategy {
        MontageStrategy::Grid => montage_grid_image_yx(&fields),
        MontageStrategy::StagePosition => montage_stage_pos_image_yx(fields),
    }
}

fn pixel_pos_x(meta: &MetaSeriesMetadata) -> f64 {
    (meta.stage_position_x / meta.spatial_calibration_x).round_ties_even()
}

fn pixel_pos_y(meta: &MetaSeriesMetadata) -> f64 {
    (meta.stage_position_y / meta.spatial_calibration_y).round_ties_even()
}

/// Site number of a `"C06 : Site 3"` stage label.
fn site_number(label: &str) -> Option<i64> {
    let (_, site) = label.split_once(':')?;
    site.replace("Site", "").trim().parse().ok()
}

/// Bounding box `(min_y, min_x, max_y, max_x)` of all fields in pixels.
fn well_bbox<T: Pixel>(fields: &[Field<T>]) -> (f64, f64, f64, f64) {
    let mut min_y = f64::INFINITY;
    let mut min_x = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    for (plane, meta) in fields {
        let y = meta.stage_position_y / meta.spatial_calibration_y;
        let x = meta.stage_position_x / meta.spatial_calibration_x;
        min_y = min_y.min(y);
        min_x = min_x.min(x);
        max_y = max_y.max(y + plane.height() as f64);
        max_x = max_x.max(x + plane.width() as f64);
    }
    (min_y, min_x, max_y, max_x)
}

/// Places every field at its stage position.
///
/// Fields are pasted in descending site order, so where fields overlap the
/// lower site number ends up on top.
pub fn montage_stage_pos_image_yx<T: Pixel>(mut fields: Vec<Field<T>>) -> Result<Plane<T>> {
    if fields.is_empty() {
        return Err(HcsError::processing("cannot montage zero fields"));
    }
    fields.sort_by_key(|(_, meta)| {
        Reverse((site_number(&meta.stage_label), meta.stage_label.clone()))
    });

    let (min_y, min_x, max_y, max_x) = well_bbox(&fields);
    let height = (max_y - min_y).round_ties_even() as usize;
    let width = (max_x - min_x).round_ties_even() as usize;

    let mut canvas = Plane::zeros(height, width);
    for (plane, meta) in &fields {
        let y = (meta.stage_position_y / meta.spatial_calibration_y - min_y).round_ties_even();
        let x = (meta.stage_position_x / meta.spatial_calibration_x - min_x).round_ties_even();
        canvas.paste(plane, y.max(0.0) as usize, x.max(0.0) as usize);
    }
    Ok(canvas)
}

/// Snaps fields into a regular grid with cells the size of one field.
pub fn montage_grid_image_yx<T: Pixel>(fields: &[Field<T>]) -> Result<Plane<T>> {
    let (first, _) = fields
        .first()
        .ok_or_else(|| HcsError::processing("cannot montage zero fields"))?;
    let (step_y, step_x) = first.shape();
    if let Some((odd, _)) = fields.iter().find(|(p, _)| p.shape() != first.shape()) {
        return Err(HcsError::shape_mismatch(format!(
            "grid montage needs equally sized fields, got {:?} and {:?}",
            first.shape(),
            odd.shape()
        )));
    }

    let min_y = fields.iter().map(|(_, m)| pixel_pos_y(m)).fold(f64::INFINITY, f64::min);
    let min_x = fields.iter().map(|(_, m)| pixel_pos_x(m)).fold(f64::INFINITY, f64::min);

    // Canvas size follows the largest cell index so no field is clipped.
    let cells: Vec<(usize, usize)> = fields
        .iter()
        .map(|(_, meta)| {
            let row = ((pixel_pos_y(meta) - min_y) / step_y as f64).round_ties_even() as usize;
            let col = ((pixel_pos_x(meta) - min_x) / step_x as f64).round_ties_even() as usize;
            (row, col)
        })
        .collect();
    let rows = cells.iter().map(|(r, _)| r + 1).max().unwrap_or(1);
    let cols = cells.iter().map(|(_, c)| c + 1).max().unwrap_or(1);

    let mut canvas = Plane::zeros(rows * step_y, cols * step_x);
    for ((plane, _), (row, col)) in fields.iter().zip(cells) {
        canvas.paste(plane, row * step_y, col * step_x);
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(x: f64, y: f64, site: u32) -> MetaSeriesMetadata {
        MetaSeriesMetadata {
            illumination_setting: "DAPI".to_string(),
            spatial_calibration_x: 0.5,
            spatial_calibration_y: 0.5,
            spatial_calibration_units: "um".to_string(),
            stage_position_x: x,
            stage_position_y: y,
            z_position: None,
            pixel_type: "uint16".to_string(),
            objective_na: 0.75,
            objective: "20X".to_string(),
            exposure_time: "20 ms".to_string(),
            lumencor_cyan_intensity: 0.0,
            lumencor_green_intensity: 0.0,
            lumencor_red_intensity: 0.0,
            lumencor_violet_intensity: 100.0,
            lumencor_yellow_intensity: 0.0,
            shading_correction: "Off".to_string(),
            stage_label: format!("E07 : Site {}", site),
            site_x: 1,
            site_y: 1,
            wavelength: 447.0,
            z_projection_method: None,
        }
    }

    fn field(value: u16, x: f64, y: f64, site: u32) -> Field<u16> {
        (Plane::new(2, 2, vec![value; 4]).unwrap(), meta(x, y, site))
    }

    #[test]
    fn test_grid_montage_two_by_one() {
        // 2x2 pixel fields, 0.5 um per pixel: 1 um apart is one cell.
        let fields = vec![field(1, 0.0, 0.0, 1), field(2, 1.0, 0.0, 2)];
        let img = montage_grid_image_yx(&fields).unwrap();
        assert_eq!(img.shape(), (2, 4));
        assert_eq!(img.data(), &[1, 1, 2, 2, 1, 1, 2, 2]);
    }

    #[test]
    fn test_grid_montage_snaps_jitter() {
        let fields = vec![
            field(1, 0.0, 0.0, 1),
            field(2, 1.1, 0.0, 2),
            field(3, 0.0, 0.9, 3),
        ];
        let img = montage_grid_image_yx(&fields).unwrap();
        assert_eq!(img.shape(), (4, 4));
        assert_eq!(img.get(0, 2), 2);
        assert_eq!(img.get(2, 0), 3);
        assert_eq!(img.get(3, 3), 0);
    }

    #[test]
    fn test_grid_montage_keeps_fields_on_half_cell_offsets() {
        // 1.5 cells apart rounds to cell 2, the canvas must reach it.
        let fields = vec![field(1, 0.0, 0.0, 1), field(2, 1.5, 0.0, 2)];
        let img = montage_grid_image_yx(&fields).unwrap();
        assert_eq!(img.shape(), (2, 6));
        assert_eq!(img.data(), &[1, 1, 0, 0, 2, 2, 1, 1, 0, 0, 2, 2]);
    }

    #[test]
    fn test_grid_montage_rejects_mixed_shapes() {
        let mut fields = vec![field(1, 0.0, 0.0, 1)];
        fields.push((Plane::zeros(3, 3), meta(1.0, 0.0, 2)));
        assert!(matches!(
            montage_grid_image_yx(&fields),
            Err(HcsError::ShapeMismatchError { .. })
        ));
    }

    #[test]
    fn test_stage_position_overlap_prefers_lower_site() {
        // Second field is shifted by a single pixel.
        let fields = vec![field(1, 0.0, 0.0, 1), field(2, 0.5, 0.0, 2)];
        let img = montage_stage_pos_image_yx(fields).unwrap();
        assert_eq!(img.shape(), (2, 3));
        assert_eq!(img.data(), &[1, 1, 2, 1, 1, 2]);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(assemble::<u16>(MontageStrategy::Grid, vec![]).is_err());
        assert!(assemble::<u16>(MontageStrategy::StagePosition, vec![]).is_err());
    }

    #[test]
    fn test_site_number() {
        assert_eq!(site_number("C06 : Site 12"), Some(12));
        assert_eq!(site_number("C06"), None);
    }
}

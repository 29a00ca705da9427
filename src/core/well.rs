//! Assembly of all files of one well into a CYX or CZYX image.

use crate::core::histogram::UIntHistogram;
use crate::core::montage::{self, Field};
use crate::domain::image::{ImageStack, Plane};
use crate::domain::model::{
    AcquisitionTable, ChannelMetadata, GeneralMetadata, MetaSeriesMetadata, MontageStrategy,
    WellImage,
};
use crate::io::metaseries::load_metaseries_tiff;
use crate::utils::color::wavelength_to_hex;
use crate::utils::error::{HcsError, Result};

/// The single lamp that was switched on, with its power.
fn wavelength_power(meta: &MetaSeriesMetadata) -> Result<(Option<String>, Option<f64>)> {
    let lamps = [
        ("cyan", meta.lumencor_cyan_intensity),
        ("green", meta.lumencor_green_intensity),
        ("red", meta.lumencor_red_intensity),
        ("violet", meta.lumencor_violet_intensity),
        ("yellow", meta.lumencor_yellow_intensity),
    ];
    let active: Vec<_> = lamps.iter().filter(|(_, power)| *power > 0.0).collect();
    match active.as_slice() {
        [] => Ok((None, None)),
        [(name, power)] => Ok((Some(name.to_string()), Some(*power))),
        many => Err(HcsError::inconsistent(format!(
            "more than one Lumencor lamp is on: {}",
            many.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Splits `"20 ms"` into time and unit.
fn exposure_time_unit(exposure_time: &str) -> Result<(f64, String)> {
    let invalid = |reason: &str| HcsError::InvalidMetadataError {
        key: "Exposure Time".to_string(),
        value: exposure_time.to_string(),
        reason: reason.to_string(),
    };
    let (time, unit) = exposure_time
        .trim()
        .split_once(' ')
        .ok_or_else(|| invalid("expected '<time> <unit>'"))?;
    let time = time.parse().map_err(|_| invalid("time is not a number"))?;
    Ok((time, unit.trim().to_string()))
}

pub fn build_channel_metadata(meta: &MetaSeriesMetadata) -> Result<ChannelMetadata> {
    let (wavelength, power) = wavelength_power(meta)?;
    let (exposure_time, exposure_time_unit) = exposure_time_unit(&meta.exposure_time)?;
    Ok(ChannelMetadata {
        wavelength,
        power,
        exposure_time,
        exposure_time_unit,
        shading_correction: meta.shading_correction == "On",
        channel_name: meta.illumination_setting.clone(),
        objective_na: meta.objective_na,
        objective: meta.objective.clone(),
        display_color: wavelength_to_hex(meta.wavelength),
        z_projection_method: meta.z_projection_method.clone(),
    })
}

fn general_metadata(meta: &MetaSeriesMetadata) -> GeneralMetadata {
    GeneralMetadata {
        spatial_calibration_x: meta.spatial_calibration_x,
        spatial_calibration_y: meta.spatial_calibration_y,
        spatial_calibration_units: meta.spatial_calibration_units.clone(),
        pixel_type: meta.pixel_type.clone(),
        z_position: None,
        z_scaling: None,
    }
}

/// One plane per channel (sorted by channel), fields montaged with `strategy`.
///
/// The z-position of the first file is attached when `include_z_position` is
/// set. Projections may report different z-positions per field, so they are
/// not compared.
pub fn assemble_well_cyx(
    files: &AcquisitionTable,
    strategy: MontageStrategy,
    include_z_position: bool,
) -> Result<WellImage> {
    if files.is_empty() {
        return Err(HcsError::processing("no files to assemble"));
    }

    let mut planes = Vec::new();
    let mut histograms = Vec::new();
    let mut channels = Vec::new();
    let mut general: Option<GeneralMetadata> = None;
    let mut z_position = None;

    for channel in files.channels() {
        let channel_files = files.for_channel(&channel);
        let mut fields: Vec<Field<u16>> = Vec::with_capacity(channel_files.len());
        let mut channel_meta: Option<ChannelMetadata> = None;

        for file in channel_files.iter() {
            let (plane, meta) = load_metaseries_tiff(&file.path)?;
            let field_meta = build_channel_metadata(&meta)?;
            match &channel_meta {
                None => channel_meta = Some(field_meta),
                Some(expected) if *expected != field_meta => {
                    return Err(HcsError::inconsistent(format!(
                        "channel {} metadata differs between fields ({})",
                        channel, file.path
                    )));
                }
                Some(_) => {}
            }
            if general.is_none() {
                general = Some(general_metadata(&meta));
                z_position = meta.z_position;
            }
            fields.push((plane, meta));
        }

        let plane: Plane<u16> = montage::assemble(strategy, fields)?;
        histograms.push(UIntHistogram::from_data(plane.data()));
        planes.push(plane);
        if let Some(meta) = channel_meta {
            channels.push(meta);
        }
    }

    let mut general =
        general.ok_or_else(|| HcsError::processing("no metadata found for well files"))?;
    if include_z_position {
        general.z_position = z_position;
    }

    Ok(WellImage {
        image: ImageStack::from_planes(planes)?,
        histograms,
        channels,
        general,
    })
}

/// Smallest distance between consecutive z-positions.
fn z_step(z_positions: &[f64]) -> Option<f64> {
    z_positions
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
}

/// One CYX image per z-step, stacked to CZYX.
///
/// Channel histograms cover all planes. `z-scaling` is the smallest step
/// between consecutive z-positions and is only set for more than one plane.
pub fn assemble_well_czyx(files: &AcquisitionTable, strategy: MontageStrategy) -> Result<WellImage> {
    let steps = files.z_steps();
    if steps.is_empty() {
        return Err(HcsError::processing("no z-steps to assemble"));
    }

    let mut stacks = Vec::with_capacity(steps.len());
    let mut z_positions = Vec::with_capacity(steps.len());
    let mut histograms: Vec<UIntHistogram> = Vec::new();
    let mut first: Option<(Vec<ChannelMetadata>, GeneralMetadata)> = None;

    for z in &steps {
        let plane = assemble_well_cyx(&files.for_z(z), strategy, true)?;
        if let Some(position) = plane.general.z_position {
            z_positions.push(position);
        }

        if histograms.is_empty() {
            histograms = plane.histograms;
        } else if histograms.len() != plane.histograms.len() {
            return Err(HcsError::inconsistent(format!(
                "z-step {} has {} channels, expected {}",
                z,
                plane.histograms.len(),
                histograms.len()
            )));
        } else {
            for (total, hist) in histograms.iter_mut().zip(&plane.histograms) {
                total.combine(hist);
            }
        }

        if first.is_none() {
            first = Some((plane.channels, plane.general));
        }
        stacks.push(plane.image);
    }

    let (channels, mut general) =
        first.ok_or_else(|| HcsError::processing("no z-steps to assemble"))?;
    if z_positions.len() > 1 && z_positions.len() == steps.len() {
        general.z_scaling = z_step(&z_positions);
    }

    let zcyx = ImageStack::from_stacks(stacks)?;
    Ok(WellImage {
        image: zcyx.swap_leading_axes()?,
        histograms,
        channels,
        general,
    })
}

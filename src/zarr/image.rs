use crate::core::histogram::UIntHistogram;
use crate::domain::image::{pixel_type_range, ImageStack, Pixel};
use crate::domain::model::{ChannelMetadata, GeneralMetadata, WellImage};
use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use crate::zarr::array::{compute_chunks, write_array, MAX_CHUNK_SIZE, MAX_LEVELS};
use crate::zarr::{create_group, join, merge_attrs, read_attrs, NGFF_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Axis {
    fn channel() -> Self {
        Self {
            name: "c".to_string(),
            kind: "channel".to_string(),
            unit: None,
        }
    }

    fn space(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "space".to_string(),
            unit: Some("micrometer".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransformation {
    #[serde(rename = "type")]
    pub kind: String,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub path: String,
    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<CoordinateTransformation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscale {
    pub version: String,
    pub axes: Vec<Axis>,
    pub datasets: Vec<Dataset>,
}

fn spatial_axes(units: &str, names: &[&str]) -> Result<Vec<Axis>> {
    if units != "um" {
        return Err(HcsError::UnsupportedUnitError(units.to_string()));
    }
    Ok(std::iter::once(Axis::channel())
        .chain(names.iter().map(|n| Axis::space(n)))
        .collect())
}

pub fn cyx_axes(units: &str) -> Result<Vec<Axis>> {
    spatial_axes(units, &["y", "x"])
}

pub fn czyx_axes(units: &str) -> Result<Vec<Axis>> {
    spatial_axes(units, &["z", "y", "x"])
}

pub async fn write_multiscales<S: Storage>(
    storage: &S,
    group: &str,
    axes: &[Axis],
    datasets: Vec<Dataset>,
) -> Result<()> {
    let multiscale = Multiscale {
        version: NGFF_VERSION.to_string(),
        axes: axes.to_vec(),
        datasets,
    };
    let mut attrs = Map::new();
    attrs.insert(
        "multiscales".to_string(),
        serde_json::to_value(vec![multiscale])?,
    );
    merge_attrs(storage, group, attrs).await
}

/// First multiscale entry of `group`.
pub async fn read_multiscale<S: Storage>(storage: &S, group: &str) -> Result<Multiscale> {
    let attrs = read_attrs(storage, group).await?;
    let first = attrs
        .get("multiscales")
        .and_then(|m| m.get(0))
        .cloned()
        .ok_or_else(|| HcsError::MissingMetadataError {
            path: group.to_string(),
            key: "multiscales".to_string(),
        })?;
    Ok(serde_json::from_value(first)?)
}

/// Writes `image` and its nearest-neighbour pyramid into `group`, one array
/// per level named `0`, `1`, ... Returns the datasets with the pyramid
/// scale of each level.
pub(crate) async fn write_pyramid<S: Storage, T: Pixel>(
    storage: &S,
    group: &str,
    image: &ImageStack<T>,
    write_empty_chunks: bool,
) -> Result<Vec<Dataset>> {
    let (chunks, max_layer) = compute_chunks(image.shape(), MAX_LEVELS, MAX_CHUNK_SIZE);
    create_group(storage, group).await?;

    let mut datasets = Vec::with_capacity(max_layer + 1);
    let mut level_image = image.clone();
    for (level, level_chunks) in chunks.iter().enumerate().take(max_layer + 1) {
        if level > 0 {
            level_image = level_image.downsample_yx();
        }
        let path = level.to_string();
        write_array(
            storage,
            &join(group, &path),
            &level_image,
            level_chunks,
            write_empty_chunks,
        )
        .await?;

        let factor = (1u64 << level) as f64;
        let ndim = image.ndim();
        let scale = (0..ndim)
            .map(|d| if d + 2 >= ndim { factor } else { 1.0 })
            .collect();
        datasets.push(Dataset {
            path,
            coordinate_transformations: vec![CoordinateTransformation {
                kind: "scale".to_string(),
                scale,
            }],
        });
    }
    Ok(datasets)
}

/// Writes `image` as an OME-NGFF multiscale image with pixel-unit scales.
pub async fn write_image_to_group<S: Storage, T: Pixel>(
    storage: &S,
    group: &str,
    image: &ImageStack<T>,
    axes: &[Axis],
    write_empty_chunks: bool,
) -> Result<()> {
    if axes.len() != image.ndim() {
        return Err(HcsError::shape_mismatch(format!(
            "{} axes for an image with {} dimensions",
            axes.len(),
            image.ndim()
        )));
    }
    let datasets = write_pyramid(storage, group, image, write_empty_chunks).await?;
    write_multiscales(storage, group, axes, datasets).await
}

fn axis_scale(axis: &Axis, general: &GeneralMetadata) -> f64 {
    match axis.name.as_str() {
        "x" => general.spatial_calibration_x,
        "y" => general.spatial_calibration_y,
        "z" => general.z_scaling.unwrap_or_else(|| {
            tracing::warn!("⚠️ No z-scaling known, writing a z scale of 1.0");
            1.0
        }),
        _ => 1.0,
    }
}

/// Multiplies the pyramid scales of `group` by the physical pixel size.
async fn set_multiscale_metadata<S: Storage>(
    storage: &S,
    group: &str,
    general: &GeneralMetadata,
    axes: &[Axis],
) -> Result<()> {
    let mut multiscale = read_multiscale(storage, group).await?;
    let scaling: Vec<f64> = axes.iter().map(|a| axis_scale(a, general)).collect();
    for dataset in &mut multiscale.datasets {
        for transform in &mut dataset.coordinate_transformations {
            for (value, factor) in transform.scale.iter_mut().zip(&scaling) {
                *value *= factor;
            }
        }
    }
    write_multiscales(storage, group, axes, multiscale.datasets).await
}

/// Omero rendering settings: one entry per channel, display window from the
/// 1% and 99% quantiles of the channel histogram.
pub fn build_omero_channel_metadata(
    channels: &[ChannelMetadata],
    pixel_type: &str,
    histograms: &[UIntHistogram],
) -> Result<Value> {
    let (min, max) = pixel_type_range(pixel_type)?;
    let entries: Vec<Value> = channels
        .iter()
        .zip(histograms)
        .enumerate()
        .map(|(i, (ch, hist))| {
            let label = match &ch.z_projection_method {
                Some(method) => {
                    format!("{}-Projection_{}", method.replace(' ', "-"), ch.channel_name)
                }
                None => ch.channel_name.clone(),
            };
            json!({
                "active": true,
                "coefficient": 1,
                "color": ch.display_color,
                "family": "linear",
                "inverted": false,
                "label": label,
                "wavelength_id": format!("C{:02}", i + 1),
                "window": {
                    "min": min,
                    "max": max,
                    "start": hist.quantile(0.01),
                    "end": hist.quantile(0.99),
                },
            })
        })
        .collect();
    Ok(json!({ "channels": entries }))
}

pub fn histogram_file_name(index: usize, channel: &ChannelMetadata) -> String {
    format!(
        "C{:02}_{}_histogram.json",
        index,
        channel.channel_name.replace(' ', "_")
    )
}

async fn add_image_metadata<S: Storage>(
    storage: &S,
    group: &str,
    channels: &[ChannelMetadata],
    pixel_type: &str,
    histograms: &[UIntHistogram],
) -> Result<()> {
    let mut histogram_paths = Vec::with_capacity(histograms.len());
    for (i, (channel, hist)) in channels.iter().zip(histograms).enumerate() {
        let name = histogram_file_name(i, channel);
        hist.save(storage, &join(group, &name)).await?;
        histogram_paths.push(name);
    }

    let mut attrs = Map::new();
    attrs.insert(
        "omero".to_string(),
        build_omero_channel_metadata(channels, pixel_type, histograms)?,
    );
    attrs.insert(
        "acquisition_metadata".to_string(),
        json!({ "channels": channels }),
    );
    attrs.insert("histograms".to_string(), json!(histogram_paths));
    merge_attrs(storage, group, attrs).await
}

/// Writes the image pyramid, physical scales, omero settings, acquisition
/// metadata and channel histograms of one image group.
#[allow(clippy::too_many_arguments)]
pub async fn write_image_and_metadata<S: Storage>(
    storage: &S,
    group: &str,
    image: &ImageStack<u16>,
    axes: &[Axis],
    histograms: &[UIntHistogram],
    channels: &[ChannelMetadata],
    general: &GeneralMetadata,
    write_empty_chunks: bool,
) -> Result<()> {
    if channels.len() != histograms.len() || channels.len() != image.shape()[0] {
        return Err(HcsError::shape_mismatch(format!(
            "{} channels, {} histograms and {} image channels",
            channels.len(),
            histograms.len(),
            image.shape()[0]
        )));
    }
    write_image_to_group(storage, group, image, axes, write_empty_chunks).await?;
    set_multiscale_metadata(storage, group, general, axes).await?;
    add_image_metadata(storage, group, channels, &general.pixel_type, histograms).await
}

pub async fn write_cyx_image_to_well<S: Storage>(
    storage: &S,
    group: &str,
    well: &WellImage,
    write_empty_chunks: bool,
) -> Result<()> {
    let axes = cyx_axes(&well.general.spatial_calibration_units)?;
    write_image_and_metadata(
        storage,
        group,
        &well.image,
        &axes,
        &well.histograms,
        &well.channels,
        &well.general,
        write_empty_chunks,
    )
    .await
}

pub async fn write_czyx_image_to_well<S: Storage>(
    storage: &S,
    group: &str,
    well: &WellImage,
    write_empty_chunks: bool,
) -> Result<()> {
    let axes = czyx_axes(&well.general.spatial_calibration_units)?;
    write_image_and_metadata(
        storage,
        group,
        &well.image,
        &axes,
        &well.histograms,
        &well.channels,
        &well.general,
        write_empty_chunks,
    )
    .await
}

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const PLATE: &str = "Plate1";
pub const DATE: &str = "2023-02-21";
pub const ACQ_ID: &str = "1000";
pub const HEIGHT: u32 = 4;
pub const WIDTH: u32 = 6;
pub const CALIBRATION: f64 = 0.5;

/// One channel as the microscope reports it.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub lamp: &'static str,
    pub wavelength: u32,
}

pub fn dapi() -> ChannelSpec {
    ChannelSpec {
        id: "w1",
        name: "DAPI",
        lamp: "Violet",
        wavelength: 447,
    }
}

pub fn fitc() -> ChannelSpec {
    ChannelSpec {
        id: "w2",
        name: "FITC",
        lamp: "Cyan",
        wavelength: 536,
    }
}

/// ImageDescription of a MetaSeries plane.
pub fn metaseries_description(
    channel: &ChannelSpec,
    well: &str,
    site: u32,
    stage_x: f64,
    stage_y: f64,
    z_position: Option<f64>,
) -> String {
    let lamps = ["Cyan", "Green", "Red", "Violet", "Yellow"]
        .iter()
        .map(|lamp| {
            let power = if *lamp == channel.lamp { 80 } else { 0 };
            format!(
                r#"<prop id="Lumencor {} Intensity" type="float" value="{}"/>"#,
                lamp, power
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let z = z_position
        .map(|z| format!(r#"<prop id="z-position" type="float" value="{}"/>"#, z))
        .unwrap_or_default();

    format!(
        r#"<MetaData>
<prop id="Description" type="string" value="synthetic"/>
<PlaneInfo>
<prop id="spatial-calibration-x" type="float" value="{cal}"/>
<prop id="spatial-calibration-y" type="float" value="{cal}"/>
<prop id="spatial-calibration-units" type="string" value="um"/>
<prop id="stage-position-x" type="float" value="{stage_x}"/>
<prop id="stage-position-y" type="float" value="{stage_y}"/>
{z}
<prop id="_IllumSetting_" type="string" value="{name}"/>
<prop id="_MagNA_" type="float" value="0.75"/>
<prop id="_MagSetting_" type="string" value="20X Plan Apo Lambda"/>
<prop id="Exposure Time" type="string" value="15 ms"/>
{lamps}
<prop id="ShadingCorrection" type="string" value="Off"/>
<prop id="stage-label" type="string" value="{well} : Site {site}"/>
<prop id="SiteX" type="int" value="{site}"/>
<prop id="SiteY" type="int" value="1"/>
<prop id="wavelength" type="int" value="{wavelength}"/>
</PlaneInfo>
</MetaData>"#,
        cal = CALIBRATION,
        name = channel.name,
        wavelength = channel.wavelength,
    )
}

pub fn write_metaseries_tiff(path: &Path, description: &str, data: &[u16]) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray16>(WIDTH, HEIGHT)
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ImageDescription, description)
        .unwrap();
    image.write_data(data).unwrap();
}

pub fn write_metaseries_tiff_u8(path: &Path, description: &str, data: &[u8]) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray8>(WIDTH, HEIGHT)
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ImageDescription, description)
        .unwrap();
    image.write_data(data).unwrap();
}

/// A field placed at an explicit stage position, in micrometres.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub site: u32,
    pub stage_x: f64,
    pub stage_y: f64,
}

pub fn image_name(well: &str, site: u32, channel: &ChannelSpec) -> String {
    format!(
        "{}_{}_s{}_{}{}.tif",
        PLATE, well, site, channel.id, "4B8A9187-2805F4C90506"
    )
}

/// Builds `{root}/{PLATE}/{DATE}/{ACQ_ID}` with two fields per well and
/// channel, placed side by side. Field pixels hold `value_of(channel, site)`.
pub struct Acquisition {
    pub root: PathBuf,
}

impl Acquisition {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.join(PLATE),
        }
    }

    pub fn acquisition_dir(&self) -> PathBuf {
        self.root.join(DATE).join(ACQ_ID)
    }

    pub fn value_of(channel_index: usize, site: u32) -> u16 {
        (channel_index as u16 + 1) * 100 + site as u16
    }

    /// Top-level projections.
    pub fn with_projections(self, wells: &[&str], channels: &[ChannelSpec]) -> Self {
        let dir = self.acquisition_dir();
        self.write_planes(&dir, wells, channels, None);
        self
    }

    /// One `ZStep_{n}` folder per z-position.
    pub fn with_stack(self, wells: &[&str], channels: &[ChannelSpec], z_positions: &[f64]) -> Self {
        for (i, z) in z_positions.iter().enumerate() {
            let dir = self.acquisition_dir().join(format!("ZStep_{}", i + 1));
            self.write_planes(&dir, wells, channels, Some(*z));
        }
        self
    }

    /// Top-level projections of one well and channel at the given stage
    /// positions. Field pixels hold `value_of(0, site)`.
    pub fn with_fields(self, well: &str, channel: &ChannelSpec, fields: &[FieldSpec]) -> Self {
        let dir = self.acquisition_dir();
        std::fs::create_dir_all(&dir).unwrap();
        for field in fields {
            let description = metaseries_description(
                channel,
                well,
                field.site,
                field.stage_x,
                field.stage_y,
                None,
            );
            let data = vec![Self::value_of(0, field.site); (WIDTH * HEIGHT) as usize];
            write_metaseries_tiff(&dir.join(image_name(well, field.site, channel)), &description, &data);
        }
        self
    }

    /// Top-level 8-bit projections, two fields side by side.
    pub fn with_8bit_projections(self, well: &str, channel: &ChannelSpec) -> Self {
        let dir = self.acquisition_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let field_width_um = WIDTH as f64 * CALIBRATION;
        for site in 1..=2u32 {
            let stage_x = 1000.0 + (site - 1) as f64 * field_width_um;
            let description = metaseries_description(channel, well, site, stage_x, 500.0, None);
            let data = vec![(10 * site) as u8; (WIDTH * HEIGHT) as usize];
            write_metaseries_tiff_u8(&dir.join(image_name(well, site, channel)), &description, &data);
        }
        self
    }

    fn write_planes(
        &self,
        dir: &Path,
        wells: &[&str],
        channels: &[ChannelSpec],
        z_position: Option<f64>,
    ) {
        std::fs::create_dir_all(dir).unwrap();
        let field_width_um = WIDTH as f64 * CALIBRATION;
        for well in wells {
            for (c, channel) in channels.iter().enumerate() {
                for site in 1..=2u32 {
                    let stage_x = 1000.0 + (site - 1) as f64 * field_width_um;
                    let description =
                        metaseries_description(channel, well, site, stage_x, 500.0, z_position);
                    let data = vec![Self::value_of(c, site); (WIDTH * HEIGHT) as usize];
                    write_metaseries_tiff(&dir.join(image_name(well, site, channel)), &description, &data);

                    let thumb = format!("{}_{}_s{}_{}_thumbABCD.tif", PLATE, well, site, channel.id);
                    write_metaseries_tiff(&dir.join(thumb), &description, &data);
                }
            }
        }
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

pub fn scale_of(zattrs: &serde_json::Value, level: usize) -> Vec<f64> {
    zattrs["multiscales"][0]["datasets"][level]["coordinateTransformations"][0]["scale"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect()
}

use crate::domain::image::Plane;
use crate::domain::model::MetaSeriesMetadata;
use crate::utils::error::{HcsError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// A typed `<prop>` value of a MetaSeries description.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl MetaValue {
    fn parse(kind: &str, raw: &str) -> Self {
        match kind {
            "float" => raw
                .trim()
                .parse()
                .map(MetaValue::Float)
                .unwrap_or_else(|_| MetaValue::Text(raw.to_string())),
            "int" => raw
                .trim()
                .parse()
                .map(MetaValue::Int)
                .unwrap_or_else(|_| MetaValue::Text(raw.to_string())),
            "bool" => MetaValue::Bool(raw.trim().eq_ignore_ascii_case("on")),
            _ => MetaValue::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(v) => Some(*v),
            MetaValue::Int(v) => Some(*v as f64),
            MetaValue::Text(s) => s.trim().parse().ok(),
            MetaValue::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(v) => Some(*v),
            MetaValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            MetaValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            MetaValue::Text(s) => s.clone(),
            MetaValue::Bool(true) => "On".to_string(),
            MetaValue::Bool(false) => "Off".to_string(),
            MetaValue::Float(v) => v.to_string(),
            MetaValue::Int(v) => v.to_string(),
        }
    }
}

pub type PlaneInfo = BTreeMap<String, MetaValue>;

pub fn is_metaseries_description(description: &str) -> bool {
    description.trim_start().starts_with("<MetaData>")
}

fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Typed `prop` and `custom-prop` values of the `<PlaneInfo>` section.
pub fn parse_plane_info(description: &str) -> Result<PlaneInfo> {
    let section = description
        .find("<PlaneInfo>")
        .and_then(|start| {
            let body = &description[start + "<PlaneInfo>".len()..];
            body.find("</PlaneInfo>").map(|end| &body[..end])
        })
        .ok_or_else(|| HcsError::MissingMetadataError {
            path: "ImageDescription".to_string(),
            key: "PlaneInfo".to_string(),
        })?;

    let prop_re = Regex::new(r"<(?:custom-)?prop\b([^>]*)>")?;
    let attr_re = Regex::new(r#"([A-Za-z_][\w\-]*)\s*=\s*"([^"]*)""#)?;

    let mut info = PlaneInfo::new();
    for prop in prop_re.captures_iter(section) {
        let mut id = None;
        let mut kind = String::from("string");
        let mut value = None;
        for attr in attr_re.captures_iter(&prop[1]) {
            match &attr[1] {
                "id" => id = Some(unescape_xml(&attr[2])),
                "type" => kind = attr[2].to_string(),
                "value" => value = Some(unescape_xml(&attr[2])),
                _ => {}
            }
        }
        if let (Some(id), Some(value)) = (id, value) {
            info.insert(id, MetaValue::parse(&kind, &value));
        }
    }
    Ok(info)
}

struct PlaneInfoReader<'a> {
    path: &'a str,
    info: &'a PlaneInfo,
}

impl PlaneInfoReader<'_> {
    fn value(&self, key: &str) -> Result<&MetaValue> {
        self.info
            .get(key)
            .ok_or_else(|| HcsError::MissingMetadataError {
                path: self.path.to_string(),
                key: key.to_string(),
            })
    }

    fn invalid(key: &str, value: &MetaValue, reason: &str) -> HcsError {
        HcsError::InvalidMetadataError {
            key: key.to_string(),
            value: value.as_text(),
            reason: reason.to_string(),
        }
    }

    fn f64(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        value
            .as_f64()
            .ok_or_else(|| Self::invalid(key, value, "expected a number"))
    }

    fn i64(&self, key: &str) -> Result<i64> {
        let value = self.value(key)?;
        value
            .as_i64()
            .ok_or_else(|| Self::invalid(key, value, "expected an integer"))
    }

    fn text(&self, key: &str) -> Result<String> {
        Ok(self.value(key)?.as_text())
    }

    fn optional_f64(&self, key: &str) -> Option<f64> {
        self.info.get(key).and_then(MetaValue::as_f64)
    }
}

impl MetaSeriesMetadata {
    /// Picks the conversion relevant keys out of a parsed PlaneInfo section.
    /// Lamps that are not reported count as switched off.
    pub fn from_plane_info(path: &str, info: &PlaneInfo, pixel_type: &str) -> Result<Self> {
        let r = PlaneInfoReader { path, info };
        Ok(Self {
            illumination_setting: r.text("_IllumSetting_")?,
            spatial_calibration_x: r.f64("spatial-calibration-x")?,
            spatial_calibration_y: r.f64("spatial-calibration-y")?,
            spatial_calibration_units: r.text("spatial-calibration-units")?,
            stage_position_x: r.f64("stage-position-x")?,
            stage_position_y: r.f64("stage-position-y")?,
            z_position: r.optional_f64("z-position"),
            pixel_type: pixel_type.to_string(),
            objective_na: r.f64("_MagNA_")?,
            objective: r.text("_MagSetting_")?,
            exposure_time: r.text("Exposure Time")?,
            lumencor_cyan_intensity: r.optional_f64("Lumencor Cyan Intensity").unwrap_or(0.0),
            lumencor_green_intensity: r.optional_f64("Lumencor Green Intensity").unwrap_or(0.0),
            lumencor_red_intensity: r.optional_f64("Lumencor Red Intensity").unwrap_or(0.0),
            lumencor_violet_intensity: r
                .optional_f64("Lumencor Violet Intensity")
                .unwrap_or(0.0),
            lumencor_yellow_intensity: r
                .optional_f64("Lumencor Yellow Intensity")
                .unwrap_or(0.0),
            shading_correction: r.text("ShadingCorrection")?,
            stage_label: r.text("stage-label")?,
            site_x: r.i64("SiteX")?,
            site_y: r.i64("SiteY")?,
            wavelength: r.f64("wavelength")?,
            z_projection_method: info.get("Z Projection Method").map(MetaValue::as_text),
        })
    }
}

/// Reads the image data and PlaneInfo metadata of a MetaSeries TIFF.
///
/// 8-bit images are widened to 16 bit; `pixel_type` keeps the original
/// sample type.
pub fn load_metaseries_tiff(path: impl AsRef<Path>) -> Result<(Plane<u16>, MetaSeriesMetadata)> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().into_owned();
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    let description = match decoder.find_tag(Tag::ImageDescription)? {
        Some(value) => value.into_string()?,
        None => return Err(HcsError::NotMetaSeriesError { path: path_str }),
    };
    if !is_metaseries_description(&description) {
        return Err(HcsError::NotMetaSeriesError { path: path_str });
    }
    let info = parse_plane_info(&description).map_err(|e| match e {
        HcsError::MissingMetadataError { key, .. } => HcsError::MissingMetadataError {
            path: path_str.clone(),
            key,
        },
        other => other,
    })?;

    let (width, height) = decoder.dimensions()?;
    let (data, pixel_type) = match decoder.read_image()? {
        DecodingResult::U16(data) => (data, "uint16"),
        DecodingResult::U8(data) => (data.into_iter().map(u16::from).collect(), "uint8"),
        _ => {
            return Err(HcsError::UnsupportedPixelTypeError(format!(
                "{}: only 8 and 16 bit unsigned samples are supported",
                path_str
            )))
        }
    };

    let plane = Plane::new(height as usize, width as usize, data)?;
    let metadata = MetaSeriesMetadata::from_plane_info(&path_str, &info, pixel_type)?;
    tracing::trace!("Loaded {} ({}x{}, {})", path_str, height, width, pixel_type);
    Ok((plane, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<MetaData>
<prop id="Description" type="string" value="Exposure: 20 ms&#13;&#10;Binning: 1 x 1"/>
<prop id="MetaDataVersion" type="float" value="1"/>
<PlaneInfo>
<prop id="plane-type" type="string" value="plane"/>
<prop id="spatial-calibration-x" type="float" value="0.3417"/>
<prop id="spatial-calibration-y" type="float" value="0.3417"/>
<prop id="spatial-calibration-units" type="string" value="um"/>
<prop id="stage-position-x" type="float" value="68918.7"/>
<prop id="stage-position-y" type="float" value="23890.1"/>
<prop id="z-position" type="float" value="9815.32"/>
<prop id="_IllumSetting_" type="string" value="DAPI"/>
<prop id="_MagNA_" type="float" value="0.75"/>
<prop id="_MagSetting_" type="string" value="20X Plan Apo Lambda"/>
<prop id="Exposure Time" type="string" value="20 ms"/>
<prop id="Lumencor Cyan Intensity" type="float" value="0"/>
<prop id="Lumencor Green Intensity" type="float" value="0"/>
<prop id="Lumencor Red Intensity" type="float" value="0"/>
<prop id="Lumencor Violet Intensity" type="float" value="100"/>
<prop id="Lumencor Yellow Intensity" type="float" value="0"/>
<prop id="ShadingCorrection" type="string" value="Off"/>
<prop id="stage-label" type="string" value="C06 : Site 1"/>
<prop id="SiteX" type="int" value="1"/>
<prop id="SiteY" type="int" value="1"/>
<prop id="wavelength" type="int" value="447"/>
<prop id="camera-binning-x" type="int" value="1"/>
<prop id="autofocus" type="bool" value="on"/>
<custom-prop id="Z Projection Method" type="string" value="Maximum"/>
</PlaneInfo>
<SetInfo>
<prop id="number-of-planes" type="int" value="1"/>
</SetInfo>
</MetaData>"#;

    #[test]
    fn test_parse_plane_info_types() {
        let info = parse_plane_info(DESCRIPTION).unwrap();
        assert_eq!(info["spatial-calibration-x"], MetaValue::Float(0.3417));
        assert_eq!(info["SiteX"], MetaValue::Int(1));
        assert_eq!(info["autofocus"], MetaValue::Bool(true));
        assert_eq!(info["stage-label"], MetaValue::Text("C06 : Site 1".to_string()));
        assert!(!info.contains_key("number-of-planes"));
        assert!(!info.contains_key("Description"));
    }

    #[test]
    fn test_metadata_from_plane_info() {
        let info = parse_plane_info(DESCRIPTION).unwrap();
        let meta = MetaSeriesMetadata::from_plane_info("x.tif", &info, "uint16").unwrap();

        assert_eq!(meta.illumination_setting, "DAPI");
        assert_eq!(meta.spatial_calibration_x, 0.3417);
        assert_eq!(meta.spatial_calibration_units, "um");
        assert_eq!(meta.stage_position_x, 68918.7);
        assert_eq!(meta.stage_position_y, 23890.1);
        assert_eq!(meta.z_position, Some(9815.32));
        assert_eq!(meta.objective_na, 0.75);
        assert_eq!(meta.objective, "20X Plan Apo Lambda");
        assert_eq!(meta.exposure_time, "20 ms");
        assert_eq!(meta.lumencor_violet_intensity, 100.0);
        assert_eq!(meta.lumencor_cyan_intensity, 0.0);
        assert_eq!(meta.shading_correction, "Off");
        assert_eq!(meta.site_x, 1);
        assert_eq!(meta.wavelength, 447.0);
        assert_eq!(meta.z_projection_method.as_deref(), Some("Maximum"));
    }

    #[test]
    fn test_missing_key_is_reported() {
        let description = DESCRIPTION.replace("spatial-calibration-x", "spatial-calibration-q");
        let info = parse_plane_info(&description).unwrap();
        let err = MetaSeriesMetadata::from_plane_info("x.tif", &info, "uint16").unwrap_err();
        match err {
            HcsError::MissingMetadataError { key, path } => {
                assert_eq!(key, "spatial-calibration-x");
                assert_eq!(path, "x.tif");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_plane_info() {
        assert!(parse_plane_info("<MetaData></MetaData>").is_err());
        assert!(is_metaseries_description("  <MetaData>"));
        assert!(!is_metaseries_description("ImageJ=1.53"));
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp; b"), "a & b");
        assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
        assert_eq!(unescape_xml("&unknown; x"), "&unknown; x");
        assert_eq!(unescape_xml("dangling &amp"), "dangling &amp");
    }
}

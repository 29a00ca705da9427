//! Display colours for fluorescence channels.

const GAMMA: f64 = 0.8;

/// Approximate RGB colour of a wavelength in nanometres.
///
/// Visible range is 380-750 nm; the intensity falls off towards both ends of
/// the spectrum. Wavelengths outside the range map to black.
pub fn wavelength_to_rgb(wavelength: f64) -> (u8, u8, u8) {
    let (r, g, b) = if (380.0..=440.0).contains(&wavelength) {
        let attenuation = 0.3 + 0.7 * (wavelength - 380.0) / (440.0 - 380.0);
        (
            ((-(wavelength - 440.0) / (440.0 - 380.0)) * attenuation).powf(GAMMA),
            0.0,
            attenuation.powf(GAMMA),
        )
    } else if (440.0..=490.0).contains(&wavelength) {
        (0.0, ((wavelength - 440.0) / (490.0 - 440.0)).powf(GAMMA), 1.0)
    } else if (490.0..=510.0).contains(&wavelength) {
        (0.0, 1.0, (-(wavelength - 510.0) / (510.0 - 490.0)).powf(GAMMA))
    } else if (510.0..=580.0).contains(&wavelength) {
        (((wavelength - 510.0) / (580.0 - 510.0)).powf(GAMMA), 1.0, 0.0)
    } else if (580.0..=645.0).contains(&wavelength) {
        (1.0, (-(wavelength - 645.0) / (645.0 - 580.0)).powf(GAMMA), 0.0)
    } else if (645.0..=750.0).contains(&wavelength) {
        let attenuation = 0.3 + 0.7 * (750.0 - wavelength) / (750.0 - 645.0);
        (attenuation.powf(GAMMA), 0.0, 0.0)
    } else {
        (0.0, 0.0, 0.0)
    };

    (to_byte(r), to_byte(g), to_byte(b))
}

fn to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Six digit hex code without a leading `#`, as stored in omero metadata.
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("{:02X}{:02X}{:02X}", r, g, b)
}

pub fn wavelength_to_hex(wavelength: f64) -> String {
    let (r, g, b) = wavelength_to_rgb(wavelength);
    rgb_to_hex(r, g, b)
}

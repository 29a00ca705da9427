use crate::utils::error::{HcsError, Result};

/// Unsigned sample types that can be stored in a Zarr array.
pub trait Pixel: Copy + Default + PartialEq + Send + Sync + 'static {
    /// Zarr v2 dtype string.
    const DTYPE: &'static str;
    const MIN: u64;
    const MAX: u64;

    fn to_u64(self) -> u64;

    fn write_le(self, out: &mut Vec<u8>);
}

impl Pixel for u8 {
    const DTYPE: &'static str = "|u1";
    const MIN: u64 = 0;
    const MAX: u64 = u8::MAX as u64;

    fn to_u64(self) -> u64 {
        self as u64
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Pixel for u16 {
    const DTYPE: &'static str = "<u2";
    const MIN: u64 = 0;
    const MAX: u64 = u16::MAX as u64;

    fn to_u64(self) -> u64 {
        self as u64
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Pixel for u32 {
    const DTYPE: &'static str = "<u4";
    const MIN: u64 = 0;
    const MAX: u64 = u32::MAX as u64;

    fn to_u64(self) -> u64 {
        self as u64
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Value range of a MetaSeries `PixelType` string.
pub fn pixel_type_range(pixel_type: &str) -> Result<(u64, u64)> {
    match pixel_type {
        "uint8" => Ok((<u8 as Pixel>::MIN, <u8 as Pixel>::MAX)),
        "uint16" => Ok((<u16 as Pixel>::MIN, <u16 as Pixel>::MAX)),
        "uint32" => Ok((<u32 as Pixel>::MIN, <u32 as Pixel>::MAX)),
        other => Err(HcsError::UnsupportedPixelTypeError(other.to_string())),
    }
}

/// A single 2D image, row major.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    height: usize,
    width: usize,
    data: Vec<T>,
}

impl<T: Pixel> Plane<T> {
    pub fn new(height: usize, width: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != height * width {
            return Err(HcsError::shape_mismatch(format!(
                "{} samples do not fill a {}x{} plane",
                data.len(),
                height,
                width
            )));
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![T::default(); height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, y: usize, x: usize) -> T {
        self.data[y * self.width + x]
    }

    /// Copies `other` with its top-left corner at (`y`, `x`); the part that
    /// falls outside this plane is dropped.
    pub fn paste(&mut self, other: &Plane<T>, y: usize, x: usize) {
        if y >= self.height || x >= self.width {
            return;
        }
        let rows = other.height.min(self.height - y);
        let cols = other.width.min(self.width - x);
        for row in 0..rows {
            let dst = (y + row) * self.width + x;
            let src = row * other.width;
            self.data[dst..dst + cols].copy_from_slice(&other.data[src..src + cols]);
        }
    }
}

/// N-dimensional image in C order. The last two axes are always Y and X.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStack<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Pixel> ImageStack<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        if shape.len() < 2 {
            return Err(HcsError::shape_mismatch(format!(
                "an image needs at least two axes, got {:?}",
                shape
            )));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(HcsError::shape_mismatch(format!(
                "{} samples do not fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    /// Stacks equally shaped planes along a new leading axis.
    pub fn from_planes(planes: Vec<Plane<T>>) -> Result<Self> {
        let first = planes
            .first()
            .ok_or_else(|| HcsError::processing("cannot stack zero planes"))?
            .shape();
        let mut data = Vec::with_capacity(planes.len() * first.0 * first.1);
        let count = planes.len();
        for plane in planes {
            if plane.shape() != first {
                return Err(HcsError::shape_mismatch(format!(
                    "plane of shape {:?} cannot be stacked with {:?}",
                    plane.shape(),
                    first
                )));
            }
            data.extend(plane.into_data());
        }
        Ok(Self {
            shape: vec![count, first.0, first.1],
            data,
        })
    }

    /// Stacks equally shaped stacks along a new leading axis.
    pub fn from_stacks(stacks: Vec<ImageStack<T>>) -> Result<Self> {
        let first = stacks
            .first()
            .ok_or_else(|| HcsError::processing("cannot stack zero images"))?
            .shape
            .clone();
        let mut shape = Vec::with_capacity(first.len() + 1);
        shape.push(stacks.len());
        shape.extend_from_slice(&first);

        let mut data = Vec::with_capacity(shape.iter().product());
        for stack in stacks {
            if stack.shape != first {
                return Err(HcsError::shape_mismatch(format!(
                    "image of shape {:?} cannot be stacked with {:?}",
                    stack.shape, first
                )));
            }
            data.extend(stack.data);
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn height(&self) -> usize {
        self.shape[self.shape.len() - 2]
    }

    pub fn width(&self) -> usize {
        self.shape[self.shape.len() - 1]
    }

    /// Number of Y/X planes (product of the leading axes).
    pub fn plane_count(&self) -> usize {
        self.shape[..self.shape.len() - 2].iter().product()
    }

    pub fn plane(&self, index: usize) -> &[T] {
        let size = self.height() * self.width();
        &self.data[index * size..(index + 1) * size]
    }

    /// Swaps the first two axes, e.g. ZCYX into CZYX.
    pub fn swap_leading_axes(&self) -> Result<Self> {
        if self.ndim() < 4 {
            return Err(HcsError::shape_mismatch(format!(
                "cannot swap leading axes of shape {:?}",
                self.shape
            )));
        }
        let (a, b) = (self.shape[0], self.shape[1]);
        let block: usize = self.shape[2..].iter().product();
        let mut data = Vec::with_capacity(self.data.len());
        for j in 0..b {
            for i in 0..a {
                let start = (i * b + j) * block;
                data.extend_from_slice(&self.data[start..start + block]);
            }
        }
        let mut shape = self.shape.clone();
        shape.swap(0, 1);
        Ok(Self { shape, data })
    }

    /// Nearest-neighbour halving of Y and X; leading axes are kept.
    pub fn downsample_yx(&self) -> Self {
        let (h, w) = (self.height(), self.width());
        let (nh, nw) = (h / 2, w / 2);
        let mut data = Vec::with_capacity(self.plane_count() * nh * nw);
        for p in 0..self.plane_count() {
            let plane = self.plane(p);
            for y in 0..nh {
                let row = &plane[(2 * y) * w..(2 * y + 1) * w];
                data.extend(row.iter().step_by(2).take(nw).copied());
            }
        }
        let mut shape = self.shape.clone();
        let n = shape.len();
        shape[n - 2] = nh;
        shape[n - 1] = nw;
        Self { shape, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_paste_clips() {
        let mut canvas: Plane<u16> = Plane::zeros(3, 3);
        let tile = Plane::new(2, 2, vec![1u16, 2, 3, 4]).unwrap();
        canvas.paste(&tile, 2, 2);
        assert_eq!(canvas.get(2, 2), 1);
        assert_eq!(canvas.data().iter().filter(|v| **v != 0).count(), 1);
    }

    #[test]
    fn test_from_planes_rejects_mixed_shapes() {
        let a: Plane<u16> = Plane::zeros(2, 2);
        let b: Plane<u16> = Plane::zeros(2, 3);
        assert!(matches!(
            ImageStack::from_planes(vec![a, b]),
            Err(HcsError::ShapeMismatchError { .. })
        ));
    }

    #[test]
    fn test_swap_leading_axes() {
        // z=2, c=2, 1x1 planes: [z0c0, z0c1, z1c0, z1c1]
        let zc = ImageStack::new(vec![2, 2, 1, 1], vec![1u16, 2, 3, 4]).unwrap();
        let cz = zc.swap_leading_axes().unwrap();
        assert_eq!(cz.shape(), &[2, 2, 1, 1]);
        assert_eq!(cz.data(), &[1, 3, 2, 4]);
    }

    #[test]
    fn test_downsample_yx() {
        let stack = ImageStack::new(
            vec![1, 4, 4],
            (0u16..16).collect::<Vec<_>>(),
        )
        .unwrap();
        let half = stack.downsample_yx();
        assert_eq!(half.shape(), &[1, 2, 2]);
        assert_eq!(half.data(), &[0, 2, 8, 10]);
    }

    #[test]
    fn test_pixel_type_range() {
        assert_eq!(pixel_type_range("uint16").unwrap(), (0, 65535));
        assert_eq!(pixel_type_range("uint8").unwrap(), (0, 255));
        assert!(pixel_type_range("float32").is_err());
    }
}

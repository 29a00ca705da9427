use crate::domain::image::Pixel;
use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use serde::{Deserialize, Serialize};

/// Histogram of unsigned integer data with one bin per integer value.
///
/// Bins start at `offset` (the smallest value seen) and end at the largest
/// value seen. Histograms of different image parts can be merged, so a well
/// or plate histogram is built without holding all pixels at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UIntHistogram {
    offset: Option<u64>,
    frequencies: Vec<u64>,
}

/// On-disk representation. `bins` is kept for readers that expect edges.
#[derive(Debug, Serialize, Deserialize)]
struct HistogramFile {
    frequencies: Vec<u64>,
    offset: u64,
    bins: usize,
}

impl UIntHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data<T: Pixel>(data: &[T]) -> Self {
        let mut iter = data.iter().map(|v| v.to_u64());
        let Some(first) = iter.next() else {
            return Self::new();
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

        let mut frequencies = vec![0u64; (max - min + 1) as usize];
        for v in data {
            frequencies[(v.to_u64() - min) as usize] += 1;
        }

        Self {
            offset: Some(min),
            frequencies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offset.is_none()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn frequencies(&self) -> &[u64] {
        &self.frequencies
    }

    /// Number of bin edges.
    pub fn bins(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.frequencies.len() + 1
        }
    }

    pub fn update<T: Pixel>(&mut self, data: &[T]) {
        let other = Self::from_data(data);
        self.combine(&other);
    }

    pub fn combine(&mut self, other: &UIntHistogram) {
        let Some(other_offset) = other.offset else {
            return;
        };
        let Some(offset) = self.offset else {
            *self = other.clone();
            return;
        };

        let new_offset = offset.min(other_offset);
        let end = (offset + self.frequencies.len() as u64)
            .max(other_offset + other.frequencies.len() as u64);

        let mut merged = vec![0u64; (end - new_offset) as usize];
        for (hist_offset, freqs) in [(offset, &self.frequencies), (other_offset, &other.frequencies)] {
            let start = (hist_offset - new_offset) as usize;
            for (slot, f) in merged[start..start + freqs.len()].iter_mut().zip(freqs) {
                *slot += f;
            }
        }

        self.offset = Some(new_offset);
        self.frequencies = merged;
    }

    fn total(&self) -> u64 {
        self.frequencies.iter().sum()
    }

    fn values(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let offset = self.offset.unwrap_or(0);
        self.frequencies
            .iter()
            .enumerate()
            .map(move |(i, f)| (offset + i as u64, *f))
    }

    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let sum: u128 = self.values().map(|(v, f)| v as u128 * f as u128).sum();
        Some(sum as f64 / total as f64)
    }

    /// Population standard deviation.
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let total = self.total() as f64;
        let squares: f64 = self
            .values()
            .map(|(v, f)| (v as f64 - mean).powi(2) * f as f64)
            .sum();
        Some((squares / total).sqrt())
    }

    /// Smallest value whose cumulative frequency reaches fraction `q`.
    pub fn quantile(&self, q: f64) -> Option<u64> {
        if !(0.0..=1.0).contains(&q) {
            return None;
        }
        let total = self.total();
        if total == 0 {
            return None;
        }
        let mut cumulative = 0u64;
        for (value, f) in self.values() {
            cumulative += f;
            if cumulative as f64 / total as f64 >= q {
                return Some(value);
            }
        }
        self.max()
    }

    pub fn min(&self) -> Option<u64> {
        self.offset
    }

    pub fn max(&self) -> Option<u64> {
        self.offset
            .map(|offset| offset + self.frequencies.len() as u64 - 1)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let offset = self.offset.ok_or_else(|| {
            HcsError::processing("an empty histogram cannot be serialized")
        })?;
        let file = HistogramFile {
            frequencies: self.frequencies.clone(),
            offset,
            bins: self.bins(),
        };
        Ok(serde_json::to_vec(&file)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: HistogramFile = serde_json::from_slice(bytes)?;
        if file.frequencies.is_empty() || file.bins != file.frequencies.len() + 1 {
            return Err(HcsError::ValidationError {
                message: format!(
                    "histogram has {} frequencies but {} bins",
                    file.frequencies.len(),
                    file.bins
                ),
            });
        }
        Ok(Self {
            offset: Some(file.offset),
            frequencies: file.frequencies,
        })
    }

    pub async fn save<S: Storage>(&self, storage: &S, path: &str) -> Result<()> {
        let bytes = self.to_json()?;
        storage.write_file(path, &bytes).await
    }

    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let bytes = storage.read_file(path).await?;
        Self::from_json(&bytes)
    }
}

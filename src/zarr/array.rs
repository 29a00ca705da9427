use crate::domain::image::{ImageStack, Pixel};
use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use crate::zarr::{join, write_json};
use serde::Serialize;

pub const MAX_LEVELS: usize = 4;
pub const MAX_CHUNK_SIZE: usize = 2048;

/// `.zarray` document of an uncompressed array with `/` separated chunk keys.
#[derive(Debug, Serialize)]
struct ArrayMetadata<'a> {
    zarr_format: u8,
    shape: &'a [usize],
    chunks: &'a [usize],
    dtype: &'static str,
    compressor: Option<()>,
    fill_value: u64,
    order: &'static str,
    filters: Option<()>,
    dimension_separator: &'static str,
}

/// Chunk shapes for each pyramid level and the index of the last level.
///
/// Leading axes get chunk size 1, Y and X are halved per level and capped at
/// `max_size`. The pyramid stops at the first level whose chunk covers at
/// most half of `max_size` in both directions.
pub fn compute_chunks(shape: &[usize], max_levels: usize, max_size: usize) -> (Vec<Vec<usize>>, usize) {
    let ndim = shape.len();
    let mut levels = Vec::new();
    let mut chunks = vec![1; ndim];
    for level in 0..=max_levels {
        let h = (shape[ndim - 2] >> level).min(max_size);
        let w = (shape[ndim - 1] >> level).min(max_size);
        chunks[ndim - 2] = h.max(1);
        chunks[ndim - 1] = w.max(1);
        levels.push(chunks.clone());
        if 2 * h <= max_size && 2 * w <= max_size {
            return (levels, level);
        }
    }
    (levels, max_levels)
}

fn c_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

fn unravel(mut index: usize, extents: &[usize], out: &mut [usize]) {
    for d in (0..extents.len()).rev() {
        out[d] = index % extents[d];
        index /= extents[d];
    }
}

/// Chunk `chunk_index` of `image`, padded with the fill value at the borders.
fn chunk_data<T: Pixel>(image: &ImageStack<T>, chunk_index: &[usize], chunks: &[usize]) -> Vec<T> {
    let shape = image.shape();
    let last = shape.len() - 1;
    let strides = c_strides(shape);

    let row_len = chunks[last];
    let x0 = chunk_index[last] * row_len;
    let copy_len = row_len.min(shape[last].saturating_sub(x0));
    let rows: usize = chunks[..last].iter().product();

    let mut out = vec![T::default(); rows * row_len];
    let mut local = vec![0; last];
    'rows: for r in 0..rows {
        unravel(r, &chunks[..last], &mut local);
        let mut src = x0;
        for d in 0..last {
            let global = chunk_index[d] * chunks[d] + local[d];
            if global >= shape[d] {
                continue 'rows;
            }
            src += global * strides[d];
        }
        let dst = r * row_len;
        out[dst..dst + copy_len].copy_from_slice(&image.data()[src..src + copy_len]);
    }
    out
}

/// Writes `image` as a Zarr v2 array at `path`. Returns the number of chunk
/// files written; chunks holding only the fill value are skipped unless
/// `write_empty_chunks` is set.
pub async fn write_array<S: Storage, T: Pixel>(
    storage: &S,
    path: &str,
    image: &ImageStack<T>,
    chunks: &[usize],
    write_empty_chunks: bool,
) -> Result<usize> {
    let shape = image.shape();
    if chunks.len() != shape.len() || chunks.contains(&0) {
        return Err(HcsError::shape_mismatch(format!(
            "chunks {:?} do not fit array of shape {:?}",
            chunks, shape
        )));
    }

    let metadata = ArrayMetadata {
        zarr_format: 2,
        shape,
        chunks,
        dtype: T::DTYPE,
        compressor: None,
        fill_value: 0,
        order: "C",
        filters: None,
        dimension_separator: "/",
    };
    write_json(storage, &join(path, ".zarray"), &serde_json::to_value(&metadata)?).await?;

    let grid: Vec<usize> = shape
        .iter()
        .zip(chunks)
        .map(|(s, c)| s.div_ceil(*c))
        .collect();
    let total: usize = grid.iter().product();

    let mut index = vec![0; shape.len()];
    let mut written = 0;
    let mut bytes = Vec::new();
    for n in 0..total {
        unravel(n, &grid, &mut index);
        let data = chunk_data(image, &index, chunks);
        if !write_empty_chunks && data.iter().all(|v| *v == T::default()) {
            continue;
        }

        bytes.clear();
        bytes.reserve(data.len() * std::mem::size_of::<T>());
        for v in data {
            v.write_le(&mut bytes);
        }
        let key = index
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("/");
        storage.write_file(&join(path, &key), &bytes).await?;
        written += 1;
    }

    tracing::trace!("Wrote {} of {} chunks to {}", written, total, path);
    Ok(written)
}

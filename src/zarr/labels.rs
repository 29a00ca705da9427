use crate::domain::image::ImageStack;
use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use crate::zarr::image::{read_multiscale, write_multiscales, write_pyramid};
use crate::zarr::{create_group, join, merge_attrs, read_attrs, NGFF_VERSION};
use serde_json::{json, Map, Value};

/// Writes a label image below `{parent}/labels/{name}`.
///
/// The label group reuses the axes and scales of the parent image, so the
/// label image must have as many dimensions as the parent. The name is
/// added to the `labels` listing of `{parent}/labels`.
pub async fn write_labels_to_group<S: Storage>(
    storage: &S,
    parent: &str,
    name: &str,
    labels: &ImageStack<u32>,
    write_empty_chunks: bool,
) -> Result<()> {
    let parent_multiscale = read_multiscale(storage, parent).await?;
    if parent_multiscale.axes.len() != labels.ndim() {
        return Err(HcsError::shape_mismatch(format!(
            "group axes don't match label image dimensions: {} <> {}",
            parent_multiscale.axes.len(),
            labels.ndim()
        )));
    }

    let labels_group = join(parent, "labels");
    create_group(storage, &labels_group).await?;
    let mut listing: Vec<Value> = read_attrs(storage, &labels_group)
        .await?
        .get("labels")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !listing.iter().any(|l| l == name) {
        listing.push(json!(name));
    }
    let mut attrs = Map::new();
    attrs.insert("labels".to_string(), Value::Array(listing));
    merge_attrs(storage, &labels_group, attrs).await?;

    let group = join(&labels_group, name);
    write_pyramid(storage, &group, labels, write_empty_chunks).await?;
    write_multiscales(
        storage,
        &group,
        &parent_multiscale.axes,
        parent_multiscale.datasets,
    )
    .await?;

    let mut attrs = Map::new();
    attrs.insert(
        "image-label".to_string(),
        json!({ "version": NGFF_VERSION, "source": { "image": "../../" } }),
    );
    merge_attrs(storage, &group, attrs).await
}

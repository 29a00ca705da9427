//! OME-NGFF 0.4 plate writer on top of a Zarr v2 directory store.
//!
//! Groups are `.zgroup` files, attributes live in `.zattrs` and arrays are a
//! `.zarray` description plus one uncompressed file per chunk. Everything is
//! written through [`Storage`], paths are relative to the storage root.

pub mod array;
pub mod image;
pub mod labels;
pub mod layout;
pub mod plate;

pub use image::{
    build_omero_channel_metadata, write_cyx_image_to_well, write_czyx_image_to_well,
    write_image_and_metadata, write_image_to_group,
};
pub use labels::write_labels_to_group;
pub use layout::{PlateLayout, WellPosition};
pub use plate::{build_zarr_scaffold, check_plate};

use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use serde_json::{json, Map, Value};

pub const NGFF_VERSION: &str = "0.4";

pub(crate) fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), child)
    }
}

pub(crate) async fn write_json<S: Storage>(storage: &S, path: &str, value: &Value) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    storage.write_file(path, &bytes).await
}

pub async fn create_group<S: Storage>(storage: &S, group: &str) -> Result<()> {
    let path = join(group, ".zgroup");
    if storage.exists(&path).await? {
        return Ok(());
    }
    write_json(storage, &path, &json!({ "zarr_format": 2 })).await
}

/// Attributes of `group`, empty when none were written yet.
pub async fn read_attrs<S: Storage>(storage: &S, group: &str) -> Result<Map<String, Value>> {
    let path = join(group, ".zattrs");
    if !storage.exists(&path).await? {
        return Ok(Map::new());
    }
    match serde_json::from_slice(&storage.read_file(&path).await?)? {
        Value::Object(map) => Ok(map),
        _ => Err(HcsError::ValidationError {
            message: format!("{} is not a JSON object", path),
        }),
    }
}

/// Adds `attrs` to the attributes of `group`, replacing keys that exist.
pub async fn merge_attrs<S: Storage>(
    storage: &S,
    group: &str,
    attrs: Map<String, Value>,
) -> Result<()> {
    let mut current = read_attrs(storage, group).await?;
    current.extend(attrs);
    write_json(storage, &join(group, ".zattrs"), &Value::Object(current)).await
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::ports::Storage;
    use crate::utils::error::{HcsError, Result};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// In-memory storage for writer tests.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStorage {
        pub files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    }

    impl MemoryStorage {
        pub async fn json(&self, path: &str) -> serde_json::Value {
            let files = self.files.lock().await;
            serde_json::from_slice(&files[path]).unwrap()
        }

        pub async fn paths(&self) -> Vec<String> {
            self.files.lock().await.keys().cloned().collect()
        }
    }

    impl Storage for MemoryStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .await
                .get(path)
                .cloned()
                .ok_or_else(|| HcsError::processing(format!("no such file: {}", path)))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .await
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            let prefix = format!("{}/", path);
            let files = self.files.lock().await;
            Ok(files.contains_key(path) || files.keys().any(|k| k.starts_with(&prefix)))
        }
    }
}

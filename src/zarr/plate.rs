use crate::domain::model::AcquisitionTable;
use crate::domain::ports::Storage;
use crate::utils::error::{HcsError, Result};
use crate::zarr::layout::{PlateLayout, WellPosition};
use crate::zarr::{create_group, join, merge_attrs, NGFF_VERSION};
use serde_json::{json, Map, Value};

/// Image group of a well inside the plate: `{plate}/{row}/{column}/0`.
pub fn well_image_group(plate: &str, position: &WellPosition) -> String {
    join(&join(plate, &position.path()), "0")
}

fn plate_metadata(name: &str, layout: PlateLayout, wells: &[WellPosition]) -> Value {
    json!({
        "columns": layout.columns().iter().map(|c| json!({ "name": c })).collect::<Vec<_>>(),
        "rows": layout.rows().iter().map(|r| json!({ "name": r })).collect::<Vec<_>>(),
        "wells": wells
            .iter()
            .map(|w| json!({
                "path": w.path(),
                "rowIndex": w.row_index,
                "columnIndex": w.column_index,
            }))
            .collect::<Vec<_>>(),
        "name": name,
        "field_count": 1,
        "version": NGFF_VERSION,
    })
}

/// Name of the plate `files` would be written to. `name` overrides the plate
/// name of the files, but the files must still hold exactly one.
pub fn plate_name(files: &AcquisitionTable, name: Option<&str>) -> Result<String> {
    let names = files.names();
    if names.len() > 1 {
        return Err(HcsError::MultiplePlatesError { names });
    }
    match (names.first(), name) {
        (None, _) => Err(HcsError::processing("no image files to build a plate from")),
        (Some(_), Some(requested)) => Ok(requested.to_string()),
        (Some(found), None) => Ok(found.clone()),
    }
}

/// Checks that `files` can become a new plate: one plate name, every well
/// inside `layout`, and no plate of that name in `storage` yet. Returns the
/// plate path and the well positions.
pub async fn check_plate<S: Storage>(
    storage: &S,
    files: &AcquisitionTable,
    name: Option<&str>,
    layout: PlateLayout,
) -> Result<(String, Vec<WellPosition>)> {
    let plate = format!("{}.zarr", plate_name(files, name)?);
    let wells = files
        .wells()
        .iter()
        .map(|w| layout.well_position(w))
        .collect::<Result<Vec<_>>>()?;
    if storage.exists(&plate).await? {
        return Err(HcsError::PlateExistsError { path: plate });
    }
    Ok((plate, wells))
}

/// Creates the empty OME-NGFF plate `{name}.zarr` with one image group per
/// well of `files`. `name` defaults to the plate name of the files. Returns
/// the plate path.
pub async fn build_zarr_scaffold<S: Storage>(
    storage: &S,
    files: &AcquisitionTable,
    name: Option<&str>,
    layout: PlateLayout,
    order_name: &str,
    barcode: &str,
) -> Result<String> {
    let (plate, wells) = check_plate(storage, files, name, layout).await?;
    let name = plate.trim_end_matches(".zarr");

    create_group(storage, &plate).await?;
    let mut attrs = Map::new();
    attrs.insert("plate".to_string(), plate_metadata(name, layout, &wells));
    attrs.insert("order_name".to_string(), json!(order_name));
    attrs.insert("barcode".to_string(), json!(barcode));
    merge_attrs(storage, &plate, attrs).await?;

    for well in &wells {
        let well_group = join(&plate, &well.path());
        create_group(storage, &join(&plate, &well.row)).await?;
        create_group(storage, &well_group).await?;

        let mut attrs = Map::new();
        attrs.insert(
            "well".to_string(),
            json!({ "images": [{ "path": "0" }], "version": NGFF_VERSION }),
        );
        merge_attrs(storage, &well_group, attrs).await?;
        create_group(storage, &well_image_group(&plate, well)).await?;
    }

    tracing::info!("🧱 Created plate {} with {} wells", plate, wells.len());
    Ok(plate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ImageFile;
    use crate::zarr::testing::MemoryStorage;

    fn table(name: &str, wells: &[&str]) -> AcquisitionTable {
        AcquisitionTable::new(
            wells
                .iter()
                .map(|well| ImageFile {
                    name: name.to_string(),
                    date: "2023-02-21".to_string(),
                    acq_id: "1334".to_string(),
                    z: None,
                    well: well.to_string(),
                    field: "s1".to_string(),
                    channel: "w1".to_string(),
                    md_id: "X".to_string(),
                    ext: ".tif".to_string(),
                    path: format!("{}_{}_s1_w1X.tif", name, well),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_build_zarr_scaffold() {
        let storage = MemoryStorage::default();
        let files = table("Projection-Mix", &["E07", "E08"]);
        let plate = build_zarr_scaffold(
            &storage,
            &files,
            None,
            PlateLayout::I96,
            "example-order",
            "example-barcode",
        )
        .await
        .unwrap();
        assert_eq!(plate, "Projection-Mix.zarr");

        let attrs = storage.json("Projection-Mix.zarr/.zattrs").await;
        assert_eq!(attrs["order_name"], "example-order");
        assert_eq!(attrs["barcode"], "example-barcode");
        assert_eq!(attrs["plate"]["version"], "0.4");
        assert_eq!(attrs["plate"]["field_count"], 1);
        assert_eq!(attrs["plate"]["rows"].as_array().unwrap().len(), 8);
        assert_eq!(attrs["plate"]["columns"].as_array().unwrap().len(), 12);
        assert_eq!(
            attrs["plate"]["wells"],
            json!([
                {"path": "E/7", "rowIndex": 4, "columnIndex": 6},
                {"path": "E/8", "rowIndex": 4, "columnIndex": 7},
            ])
        );

        let well = storage.json("Projection-Mix.zarr/E/7/.zattrs").await;
        assert_eq!(well["well"]["images"], json!([{"path": "0"}]));
        assert!(storage.exists("Projection-Mix.zarr/E/8/0/.zgroup").await.unwrap());
    }

    #[tokio::test]
    async fn test_scaffold_384_and_custom_name() {
        let storage = MemoryStorage::default();
        let files = table("Plate", &["P24"]);
        let plate = build_zarr_scaffold(&storage, &files, Some("renamed"), PlateLayout::I384, "o", "b")
            .await
            .unwrap();
        assert_eq!(plate, "renamed.zarr");
        let attrs = storage.json("renamed.zarr/.zattrs").await;
        assert_eq!(attrs["plate"]["rows"].as_array().unwrap().len(), 16);
        assert_eq!(attrs["plate"]["name"], "renamed");
    }

    #[tokio::test]
    async fn test_scaffold_errors() {
        let storage = MemoryStorage::default();

        let mixed = AcquisitionTable::new(
            table("A", &["E07"])
                .iter()
                .chain(table("B", &["E07"]).iter())
                .cloned()
                .collect(),
        );
        assert!(matches!(
            build_zarr_scaffold(&storage, &mixed, None, PlateLayout::I96, "o", "b").await,
            Err(HcsError::MultiplePlatesError { .. })
        ));

        let outside = table("Plate", &["M13"]);
        assert!(matches!(
            build_zarr_scaffold(&storage, &outside, None, PlateLayout::I96, "o", "b").await,
            Err(HcsError::WellOutOfLayoutError { .. })
        ));

        let files = table("Plate", &["A01"]);
        build_zarr_scaffold(&storage, &files, None, PlateLayout::I96, "o", "b")
            .await
            .unwrap();
        assert!(matches!(
            build_zarr_scaffold(&storage, &files, None, PlateLayout::I96, "o", "b").await,
            Err(HcsError::PlateExistsError { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_plate_writes_nothing() {
        let storage = MemoryStorage::default();
        let files = table("Plate", &["A01", "H12"]);

        let (plate, wells) = check_plate(&storage, &files, Some("renamed"), PlateLayout::I96)
            .await
            .unwrap();
        assert_eq!(plate, "renamed.zarr");
        assert_eq!(wells[1].path(), "H/12");
        assert!(!storage.exists("renamed.zarr").await.unwrap());

        assert!(matches!(
            plate_name(&AcquisitionTable::new(vec![]), None),
            Err(HcsError::ProcessingError { .. })
        ));
    }
}

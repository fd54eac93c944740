//! Store-to-store remapping through the pipeline entry point
use veg_remap_core::{
    restore_field_names, run_remap, FailurePolicy, FieldStore, RemapConfig, RemapError,
    SearchStage, PREVIOUS_YEAR_FRACTION_FIELD,
};

const INPUT: &str = r#"{
  "FRACTIONS OF SURFACE TYPES": {
    "shape": [1, 3, 2],
    "data": [0.75, 0.25, 0.0, 0.0, 0.0, 1.0]
  },
  "SOIL TEMPERATURE": {
    "shape": [2, 1, 3],
    "data": [300.0, null, 280.0, 305.0, null, 290.0]
  },
  "CANOPY WATER KG PER M2": {
    "shape": [2, 1, 3],
    "data": [1.0, 0.0, 3.0, 2.0, 0.0, 9.0]
  }
}"#;

/// New layout: cell 0 all type 2, cell 1 still ocean, cell 2 all type 1
const NEW_VEGETATION: &str = r#"{
  "fraction": {
    "shape": [1, 2, 1, 3],
    "dims": ["time", "veg", "lat", "lon"],
    "data": [0.0, 0.0, 1.0, 1.0, 0.0, 0.0]
  }
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config(extra: &str) -> RemapConfig {
    RemapConfig::from_json_str(&format!(
        r#"{{
          "per_cell": ["SOIL TEMPERATURE"],
          "per_tile": ["CANOPY WATER KG/M2"],
          "tile_count": 2,
          "search_radius": 0,
          "latitude_band": 0{extra}
        }}"#
    ))
    .unwrap()
}

fn stores() -> (FieldStore, FieldStore) {
    (
        FieldStore::from_json_str(INPUT, "input").unwrap(),
        FieldStore::from_json_str(NEW_VEGETATION, "new vegetation").unwrap(),
    )
}

#[test]
fn test_full_run_over_json_stores() {
    init_tracing();
    let (input, new_vegetation) = stores();
    let run = run_remap(&config(""), &input, &new_vegetation, FailurePolicy::FailFast).unwrap();

    let soil = run.output.get("SOIL TEMPERATURE").unwrap();
    assert_eq!(soil.shape, vec![2, 1, 3]);
    // Cell 0: 0.75 * 300 + 0.25 * 305
    assert_eq!(soil.data[0], 301.25);
    assert_eq!(soil.data[3], 301.25);
    // Ocean cell keeps its missing values
    assert!(soil.data[1].is_nan() && soil.data[4].is_nan());
    // Cell 2 is only type 2 in the old distribution
    assert_eq!(soil.data[2], 290.0);
    assert_eq!(soil.data[5], 290.0);

    let water = run.output.get("CANOPY WATER KG PER M2").unwrap();
    // Cell 0 type 2 is found in place, cell 2 type 1 comes from cell 0 in the same row
    assert_eq!(water.data[3], 2.0);
    assert_eq!(water.data[2], 1.0);
    // Slots inactive in the new distribution keep their input values
    assert_eq!(water.data[0], 1.0);
    assert_eq!(water.data[5], 9.0);

    assert_eq!(run.report.resolved_at(SearchStage::ExactCell), 1);
    assert_eq!(run.report.resolved_at(SearchStage::LatitudeBand), 1);
    assert_eq!(run.report.zero_filled, 0);

    let fractions = run.output.get(PREVIOUS_YEAR_FRACTION_FIELD).unwrap();
    assert_eq!(fractions.shape, vec![2, 1, 3]);
    assert_eq!(fractions.data, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    assert_eq!(
        run.output.get("FRACTIONS OF SURFACE TYPES"),
        Some(fractions)
    );
}

#[test]
fn test_config_names_in_store_form_are_found() {
    let (input, new_vegetation) = stores();
    let store_form = RemapConfig::from_json_str(
        r#"{
          "per_cell": ["SOIL TEMPERATURE"],
          "per_tile": ["CANOPY WATER KG PER M2"],
          "tile_count": 2,
          "search_radius": 0,
          "latitude_band": 0
        }"#,
    )
    .unwrap();

    let run = run_remap(&store_form, &input, &new_vegetation, FailurePolicy::FailFast).unwrap();
    let restart_run =
        run_remap(&config(""), &input, &new_vegetation, FailurePolicy::FailFast).unwrap();

    let water = run.output.get("CANOPY WATER KG PER M2").unwrap();
    assert_eq!(water.data, vec![1.0, 0.0, 1.0, 2.0, 0.0, 9.0]);
    assert_eq!(
        Some(water),
        restart_run.output.get("CANOPY WATER KG PER M2")
    );
    assert_eq!(run.report, restart_run.report);
}

#[test]
fn test_zero_inactive_tiles_option() {
    let (input, new_vegetation) = stores();
    let run = run_remap(
        &config(r#", "zero_inactive_tiles": true"#),
        &input,
        &new_vegetation,
        FailurePolicy::FailFast,
    )
    .unwrap();

    let water = run.output.get("CANOPY WATER KG PER M2").unwrap();
    assert_eq!(water.data[0], 0.0);
    assert_eq!(water.data[5], 0.0);
    // Ocean cell is never touched
    assert_eq!(water.data[1], 0.0);
    assert_eq!(water.data[4], 0.0);
}

#[test]
fn test_missing_fields_reported_together() {
    let (mut input, new_vegetation) = stores();
    input.remove("SOIL TEMPERATURE");
    input.remove("CANOPY WATER KG PER M2");

    let err = run_remap(&config(""), &input, &new_vegetation, FailurePolicy::FailFast)
        .unwrap_err();
    match err {
        RemapError::FieldsNotFound(names) => {
            assert_eq!(names, vec!["SOIL TEMPERATURE", "CANOPY WATER KG/M2"]);
        }
        other => panic!("expected a batch of missing fields, got {other}"),
    }
}

#[test]
fn test_keep_going_writes_remaining_fields() {
    let (mut input, new_vegetation) = stores();
    input.remove("SOIL TEMPERATURE");

    let run = run_remap(&config(""), &input, &new_vegetation, FailurePolicy::KeepGoing).unwrap();
    assert_eq!(run.failures.len(), 1);
    assert!(run.output.contains("CANOPY WATER KG PER M2"));
    assert!(!run.output.contains("SOIL TEMPERATURE"));
}

#[test]
fn test_output_survives_save_and_restores_names() {
    let (input, new_vegetation) = stores();
    let run = run_remap(&config(""), &input, &new_vegetation, FailurePolicy::FailFast).unwrap();

    let path = std::env::temp_dir().join(format!("veg-remap-output-{}.json", std::process::id()));
    run.output.save(&path).unwrap();
    let reloaded = FieldStore::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let restored = restore_field_names(reloaded);
    assert!(restored.contains("CANOPY WATER KG/M2"));
    assert!(restored.get("SOIL TEMPERATURE").unwrap().data[1].is_nan());
}

#[test]
fn test_grid_mismatch_is_shape_error() {
    let (input, _) = stores();
    let new_vegetation = FieldStore::from_json_str(
        r#"{ "fraction": { "shape": [2, 1, 2], "data": [1.0, 0.0, 0.0, 1.0] } }"#,
        "new vegetation",
    )
    .unwrap();
    let err = run_remap(&config(""), &input, &new_vegetation, FailurePolicy::KeepGoing)
        .unwrap_err();
    assert!(matches!(err, RemapError::Shape(_)));
}

//! Named-array field store
//!
//! A store maps field names to row-major numeric arrays. It is the hand-off
//! format between the restart conversion tools and the remapping engine, and
//! is persisted as a JSON document:
//!
//! ```json
//! {
//!   "SOIL TEMPERATURE LAYER 1": { "shape": [17, 145, 192], "data": [ ... ] },
//!   "fraction": { "shape": [1, 17, 145, 192], "dims": ["time", "veg", "lat", "lon"], "data": [ ... ] }
//! }
//! ```
//!
//! Missing values are written as `null` and read back as NaN. Field names are
//! kept verbatim.

use crate::error::{RemapError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A row-major array with an explicit shape and optional axis names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArray {
    /// Axis lengths, slowest-varying first
    pub shape: Vec<usize>,
    /// Axis names (`"time"`, `"veg"`, `"lat"`, `"lon"`), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<String>>,
    /// Values in row-major order
    #[serde(deserialize_with = "deserialize_nullable")]
    pub data: Vec<f64>,
}

impl NamedArray {
    /// Create an array, checking that `data` fills `shape` exactly
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the element count does not match.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let array = Self {
            shape,
            dims: None,
            data,
        };
        array.validate("array")?;
        Ok(array)
    }

    /// Attach axis names
    pub fn with_dims<S: Into<String>>(mut self, dims: impl IntoIterator<Item = S>) -> Self {
        self.dims = Some(dims.into_iter().map(Into::into).collect());
        self
    }

    /// Number of elements implied by the shape
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check data length and axis-name count against the shape
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] naming `name` on any mismatch.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.data.len() != self.element_count() {
            return Err(RemapError::shape(format!(
                "'{name}' has shape {:?} ({} elements) but {} values",
                self.shape,
                self.element_count(),
                self.data.len()
            )));
        }
        if let Some(dims) = &self.dims {
            if dims.len() != self.shape.len() {
                return Err(RemapError::shape(format!(
                    "'{name}' names {} axes {:?} for a {}-dimensional shape",
                    dims.len(),
                    dims,
                    self.shape.len()
                )));
            }
        }
        Ok(())
    }
}

fn deserialize_nullable<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Mapping from field name to array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldStore {
    arrays: BTreeMap<String, NamedArray>,
}

impl FieldStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store from JSON text
    ///
    /// # Errors
    /// Returns [`RemapError::Parse`] for malformed JSON and
    /// [`RemapError::Shape`] for an array whose data does not fill its shape.
    pub fn from_json_str(text: &str, what: &str) -> Result<Self> {
        let store: Self = serde_json::from_str(text).map_err(|source| RemapError::Parse {
            what: what.to_string(),
            source,
        })?;
        for (name, array) in &store.arrays {
            array.validate(name)?;
        }
        Ok(store)
    }

    /// Load a store from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RemapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents, &path.display().to_string())
    }

    /// Serialise the store to JSON text
    ///
    /// # Errors
    /// Returns [`RemapError::Parse`] if serialisation fails.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| RemapError::Parse {
            what: "output store".to_string(),
            source,
        })
    }

    /// Write the store to a JSON file
    ///
    /// # Errors
    /// Returns an error if the store cannot be serialised or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(|source| RemapError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up an array by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NamedArray> {
        self.arrays.get(name)
    }

    /// Look up an array by name, failing with [`RemapError::FieldNotFound`]
    ///
    /// # Errors
    /// Returns [`RemapError::FieldNotFound`] if no array has that name.
    pub fn require(&self, name: &str) -> Result<&NamedArray> {
        self.get(name).ok_or_else(|| RemapError::FieldNotFound {
            name: name.to_string(),
        })
    }

    /// Whether an array with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Insert or replace an array, returning the previous one
    pub fn insert(&mut self, name: impl Into<String>, array: NamedArray) -> Option<NamedArray> {
        self.arrays.insert(name.into(), array)
    }

    /// Remove an array by name
    pub fn remove(&mut self, name: &str) -> Option<NamedArray> {
        self.arrays.remove(name)
    }

    /// Field names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Number of arrays in the store
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the store holds no arrays
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Iterate over (name, array) pairs in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NamedArray)> {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, NamedArray)> for FieldStore {
    fn from_iter<I: IntoIterator<Item = (String, NamedArray)>>(iter: I) -> Self {
        Self {
            arrays: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FieldStore {
    type Item = (String, NamedArray);
    type IntoIter = std::collections::btree_map::IntoIter<String, NamedArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.arrays.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_values_read_as_nan() {
        let store = FieldStore::from_json_str(
            r#"{ "CANOPY WATER": { "shape": [3], "data": [1.0, null, 2.5] } }"#,
            "inline",
        )
        .unwrap();

        let array = store.get("CANOPY WATER").unwrap();
        assert_eq!(array.data[0], 1.0);
        assert!(array.data[1].is_nan());
        assert_eq!(array.data[2], 2.5);
    }

    #[test]
    fn test_data_must_fill_shape() {
        let err = FieldStore::from_json_str(
            r#"{ "bad": { "shape": [2, 2], "data": [1.0, 2.0, 3.0] } }"#,
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, RemapError::Shape(msg) if msg.contains("'bad'")));
    }

    #[test]
    fn test_dims_must_match_rank() {
        let array = NamedArray::new(vec![2, 1], vec![0.0, 1.0])
            .unwrap()
            .with_dims(["veg"]);
        assert!(array.validate("x").is_err());
    }

    #[test]
    fn test_missing_field_error() {
        let store = FieldStore::new();
        let err = store.require("SNOW DEPTH").unwrap_err();
        assert!(matches!(err, RemapError::FieldNotFound { name } if name == "SNOW DEPTH"));
    }

    #[test]
    fn test_save_and_load() {
        let mut store = FieldStore::new();
        store.insert(
            "SOIL MOISTURE PER LAYER",
            NamedArray::new(vec![2], vec![0.25, f64::NAN]).unwrap(),
        );

        let path = std::env::temp_dir().join(format!(
            "veg_remap_store_{}.json",
            std::process::id()
        ));
        store.save(&path).unwrap();
        let loaded = FieldStore::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        let array = loaded.get("SOIL MOISTURE PER LAYER").unwrap();
        assert_eq!(array.shape, vec![2]);
        assert_eq!(array.data[0], 0.25);
        assert!(array.data[1].is_nan());
    }
}

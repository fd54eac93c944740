//! Reversible field-name escaping
//!
//! Restart field names may contain `/` (e.g. `"SNOW MASS KG/M2"`), which the
//! field store cannot hold. Stored names replace it with [`SEPARATOR_TOKEN`].
//!
//! Configured names may be written in either form; [`find_field`] accepts both.

use crate::error::{RemapError, Result};
use crate::store::{FieldStore, NamedArray};

/// Token standing in for `/` in stored field names
pub const SEPARATOR_TOKEN: &str = " PER ";

/// Store form of a restart field name
///
/// # Errors
/// Returns [`RemapError::Config`] if the name already contains
/// [`SEPARATOR_TOKEN`], since it could not be restored unambiguously.
pub fn escape_field_name(name: &str) -> Result<String> {
    if name.contains(SEPARATOR_TOKEN) {
        return Err(RemapError::config(format!(
            "field name '{name}' contains the reserved token '{SEPARATOR_TOKEN}'"
        )));
    }
    Ok(name.replace('/', SEPARATOR_TOKEN))
}

/// Restart form of a stored field name
#[must_use]
pub fn unescape_field_name(name: &str) -> String {
    name.replace(SEPARATOR_TOKEN, "/")
}

/// Look up a configured field name in `store`
///
/// The name is tried as written first, then, if it holds a `/`, in store
/// form. Returns the store key that matched along with the array.
#[must_use]
pub fn find_field<'s>(store: &'s FieldStore, name: &str) -> Option<(String, &'s NamedArray)> {
    if let Some(array) = store.get(name) {
        return Some((name.to_string(), array));
    }
    if !name.contains('/') {
        return None;
    }
    let stored = name.replace('/', SEPARATOR_TOKEN);
    store.get(&stored).map(|array| (stored, array))
}

/// Rename every array of `store` to its restart form
#[must_use]
pub fn restore_field_names(store: FieldStore) -> FieldStore {
    store
        .into_iter()
        .map(|(name, array)| (unescape_field_name(&name), array))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NamedArray;

    #[test]
    fn test_slash_round_trips() {
        let escaped = escape_field_name("SNOW MASS KG/M2").unwrap();
        assert_eq!(escaped, "SNOW MASS KG PER M2");
        assert_eq!(unescape_field_name(&escaped), "SNOW MASS KG/M2");
    }

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(escape_field_name("LAI").unwrap(), "LAI");
        assert_eq!(unescape_field_name("LAI"), "LAI");
    }

    #[test]
    fn test_reserved_token_rejected() {
        assert!(matches!(
            escape_field_name("KG PER M2"),
            Err(RemapError::Config(_))
        ));
    }

    #[test]
    fn test_find_field_prefers_name_as_written() {
        let mut store = FieldStore::new();
        store.insert("KG PER M2", NamedArray::new(vec![1], vec![1.0]).unwrap());
        store.insert("A/B", NamedArray::new(vec![1], vec![2.0]).unwrap());
        store.insert("A PER B", NamedArray::new(vec![1], vec![3.0]).unwrap());

        let (key, array) = find_field(&store, "KG PER M2").unwrap();
        assert_eq!(key, "KG PER M2");
        assert_eq!(array.data, vec![1.0]);

        let (key, _) = find_field(&store, "KG/M2").unwrap();
        assert_eq!(key, "KG PER M2");

        let (key, array) = find_field(&store, "A/B").unwrap();
        assert_eq!(key, "A/B");
        assert_eq!(array.data, vec![2.0]);

        assert!(find_field(&store, "MISSING/FIELD").is_none());
        assert!(find_field(&store, "KG").is_none());
    }

    #[test]
    fn test_restore_store_names() {
        let mut store = FieldStore::new();
        store.insert("A PER B", NamedArray::new(vec![1], vec![1.0]).unwrap());
        store.insert("C", NamedArray::new(vec![1], vec![2.0]).unwrap());

        let restored = restore_field_names(store);
        assert!(restored.contains("A/B"));
        assert!(restored.contains("C"));
        assert_eq!(restored.len(), 2);
    }
}

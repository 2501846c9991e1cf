//! The structural dataset model returned by materialization.
//!
//! Chunked I/O and lazy evaluation are owned by the external backend engines, so a
//! [`Dataset`] here is structural: labeled dimensions, shapes, chunk shapes, and
//! metadata. Coordinate variables carry materialized values (they are small and are
//! needed for resolution decisions, e.g. band names); data variables are lazy handles
//! whose chunks live with the engine that produced them.
//!
//! [`BandStack`] is the raw output shape of a band-stacking engine before the
//! [stacker](crate::materialize) normalizes it into one variable per band.

use indexmap::IndexMap;

/// A labeled multidimensional array: dimensions, shape, chunking, and metadata.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DataArray {
    /// Dimension names, one per axis.
    pub dims: Vec<String>,
    /// The array shape, aligned with `dims`.
    pub shape: Vec<u64>,
    /// The chunk shape, aligned with `dims`. `None` means unchunked.
    pub chunks: Option<Vec<u64>>,
    /// Materialized values, present for coordinate variables only.
    pub values: Option<Vec<serde_json::Value>>,
    /// Per-variable metadata.
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

impl DataArray {
    /// Create a lazy array with `dims` and `shape`.
    #[must_use]
    pub fn new(
        dims: impl IntoIterator<Item = impl Into<String>>,
        shape: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
            shape: shape.into_iter().collect(),
            chunks: None,
            values: None,
            attrs: serde_json::Map::new(),
        }
    }

    /// Create a one-dimensional coordinate over `dim` from `values`.
    #[must_use]
    pub fn coordinate(dim: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        let dim = dim.into();
        let len = values.len() as u64;
        Self {
            dims: vec![dim],
            shape: vec![len],
            chunks: None,
            values: Some(values),
            attrs: serde_json::Map::new(),
        }
    }

    /// Create a scalar (zero-dimensional) coordinate holding `value`.
    #[must_use]
    pub fn scalar(value: serde_json::Value) -> Self {
        Self {
            dims: Vec::new(),
            shape: Vec::new(),
            chunks: None,
            values: Some(vec![value]),
            attrs: serde_json::Map::new(),
        }
    }

    /// Set the chunk shape.
    #[must_use]
    pub fn with_chunks(mut self, chunks: impl IntoIterator<Item = u64>) -> Self {
        self.chunks = Some(chunks.into_iter().collect());
        self
    }

    /// Set a metadata attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// The number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Returns true if the array is zero-dimensional.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

/// A chunked, labeled, multidimensional dataset.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Dataset {
    /// Data variables, keyed by name.
    pub data_vars: IndexMap<String, DataArray>,
    /// Coordinate variables, keyed by name.
    pub coords: IndexMap<String, DataArray>,
    /// Global metadata.
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

impl Dataset {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data variable under `name`.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, array: DataArray) -> Self {
        self.data_vars.insert(name.into(), array);
        self
    }

    /// Add a coordinate variable under `name`.
    #[must_use]
    pub fn with_coord(mut self, name: impl Into<String>, array: DataArray) -> Self {
        self.coords.insert(name.into(), array);
        self
    }

    /// Set a global metadata attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// The dataset dimensions: the union of the dimensions of all variables,
    /// in first-seen order.
    #[must_use]
    pub fn dims(&self) -> IndexMap<String, u64> {
        let mut dims = IndexMap::new();
        for array in self.coords.values().chain(self.data_vars.values()) {
            for (dim, size) in array.dims.iter().zip(&array.shape) {
                dims.entry(dim.clone()).or_insert(*size);
            }
        }
        dims
    }

    /// Returns true if any variable or coordinate spans `dim`.
    #[must_use]
    pub fn has_dim(&self, dim: &str) -> bool {
        self.coords
            .values()
            .chain(self.data_vars.values())
            .any(|array| array.dims.iter().any(|d| d == dim))
    }
}

/// The raw output of a band-stacking engine: one labeled array with a band dimension.
///
/// The [stacker](crate::materialize) splits this into one variable per band, hoisting
/// per-band scalar coordinates into variable metadata.
#[derive(Clone, PartialEq, Debug)]
pub struct BandStack {
    /// Dimension names, one per axis (e.g. `time`, `band`, `y`, `x`).
    pub dims: Vec<String>,
    /// The stack shape, aligned with `dims`.
    pub shape: Vec<u64>,
    /// The chunk shape, aligned with `dims`.
    pub chunks: Option<Vec<u64>>,
    /// The name of the band dimension.
    pub band_dim: String,
    /// Coordinates, keyed by name. The coordinate named `band_dim` holds the band names.
    pub coords: IndexMap<String, DataArray>,
    /// Stack-level metadata.
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

impl BandStack {
    /// The band names, from the band coordinate.
    #[must_use]
    pub fn band_names(&self) -> Vec<String> {
        self.coords
            .get(&self.band_dim)
            .and_then(|coord| coord.values.as_ref())
            .map(|values| {
                values
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The position of the band dimension, if present.
    #[must_use]
    pub fn band_axis(&self) -> Option<usize> {
        self.dims.iter().position(|d| d == &self.band_dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_dims_union_in_first_seen_order() {
        let ds = Dataset::new()
            .with_coord(
                "time",
                DataArray::coordinate("time", vec![serde_json::json!("2020-05-01")]),
            )
            .with_variable(
                "red",
                DataArray::new(["time", "y", "x"], [1, 512, 256]).with_chunks([1, 256, 256]),
            );
        let dims = ds.dims();
        assert_eq!(
            dims.keys().collect::<Vec<_>>(),
            ["time", "y", "x"],
            "coordinate dims come first"
        );
        assert_eq!(dims["y"], 512);
        assert!(ds.has_dim("x"));
        assert!(!ds.has_dim("band"));
    }

    #[test]
    fn band_stack_band_names() {
        let stack = BandStack {
            dims: vec!["band".to_string(), "y".to_string(), "x".to_string()],
            shape: vec![2, 512, 512],
            chunks: None,
            band_dim: "band".to_string(),
            coords: IndexMap::from([(
                "band".to_string(),
                DataArray::coordinate(
                    "band",
                    vec![serde_json::json!("red"), serde_json::json!("blue")],
                ),
            )]),
            attrs: serde_json::Map::new(),
        };
        assert_eq!(stack.band_names(), ["red", "blue"]);
        assert_eq!(stack.band_axis(), Some(0));
    }
}

//! Kerchunk-style virtual reference descriptors.
//!
//! A [`ReferenceDescriptor`] is a versioned mapping from chunk key (group metadata key,
//! array metadata key, or `{array}/{chunk-index}` key) to either an inline value or an
//! external-location pointer, enabling chunked-store-style reads of non-native data.
//!
//! Descriptors are produced two ways:
//!  - decoded from fetched reference-file content ([`ReferenceDescriptor::from_json_bytes`]),
//!  - derived deterministically from an item's embedded index metadata
//!    ([`ReferenceDescriptor::from_item`]).
//!
//! [`combine`] merges per-item descriptors along a concatenation axis into one
//! descriptor addressable as a single chunked store.

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{fields, Item};
use crate::engine::UrlPatcher;

/// The reference descriptor wire format version.
pub const KERCHUNK_VERSION: u32 = 1;

/// The array attribute listing an array's dimension names.
const ARRAY_DIMENSIONS: &str = "_ARRAY_DIMENSIONS";

/// A reference translation or combination error.
///
/// Missing index-metadata keys are caller contract violations, not retryable
/// conditions: the catalog metadata is malformed and retrying cannot fix it.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// A required index-metadata key is absent.
    #[error("missing required index-metadata key {key}")]
    MissingKey {
        /// The absent key.
        key: String,
    },
    /// A field has an unexpected shape.
    #[error("index-metadata field {key} is not of the expected type")]
    InvalidField {
        /// The offending key.
        key: String,
    },
    /// A chunk value could not be interpreted as an inline value or pointer.
    #[error("chunk value for {key} is neither an inline value nor a pointer")]
    InvalidChunkValue {
        /// The offending key.
        key: String,
    },
    /// A chunk key does not parse as `{array}/{chunk-index}`.
    #[error("chunk key {key} does not parse as a chunk index")]
    InvalidChunkKey {
        /// The offending key.
        key: String,
    },
    /// No descriptors were supplied to [`combine`].
    #[error("cannot combine an empty set of reference descriptors")]
    Empty,
    /// Combining would overwrite a chunk key.
    #[error("combining reference descriptors collides on key {key}")]
    KeyCollision {
        /// The colliding key.
        key: String,
    },
    /// Chunk shapes disagree along the concatenation axis.
    #[error("chunk shapes for {variable} disagree across combined descriptors")]
    MismatchedChunks {
        /// The offending variable.
        variable: String,
    },
    /// Combined descriptors disagree on the variable set.
    #[error("variable {variable} is not present in every combined descriptor")]
    MismatchedVariables {
        /// The offending variable.
        variable: String,
    },
    /// Undecodable reference content or metadata.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One entry in a reference descriptor.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum RefEntry {
    /// An inline value (JSON metadata or encoded bytes).
    Inline(String),
    /// A pointer to a whole external object.
    Whole([String; 1]),
    /// A pointer to a byte range of an external object: url, offset, length.
    Pointer(String, u64, u64),
}

impl RefEntry {
    /// The external location this entry points at, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Inline(_) => None,
            Self::Whole([url]) | Self::Pointer(url, _, _) => Some(url),
        }
    }

    /// Rewrite the external location through `patcher`. Inline entries are untouched.
    pub fn patch_url(&mut self, patcher: &dyn Fn(&str) -> String) {
        match self {
            Self::Inline(_) => {}
            Self::Whole([url]) | Self::Pointer(url, _, _) => *url = patcher(url),
        }
    }
}

/// Array metadata carried inline in a descriptor.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
struct ZarrayMeta {
    shape: Vec<u64>,
    chunks: Vec<u64>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// A versioned mapping from chunk keys to inline values or external-location pointers.
///
/// Serializes as kerchunk v1 JSON (`{"version": 1, "refs": {...}}`), preserving
/// key order.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ReferenceDescriptor {
    /// The wire format version.
    #[serde(default = "default_version")]
    version: u32,
    /// The reference mapping.
    refs: IndexMap<String, RefEntry>,
}

const fn default_version() -> u32 {
    KERCHUNK_VERSION
}

impl Default for ReferenceDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// The group metadata key.
#[must_use]
pub fn zgroup_key() -> String {
    ".zgroup".to_string()
}

/// The group attributes key.
#[must_use]
pub fn zattrs_key() -> String {
    ".zattrs".to_string()
}

/// The array metadata key for `variable`.
#[must_use]
pub fn array_key(variable: &str) -> String {
    format!("{variable}/.zarray")
}

/// The array attributes key for `variable`.
#[must_use]
pub fn array_attrs_key(variable: &str) -> String {
    format!("{variable}/.zattrs")
}

impl ReferenceDescriptor {
    /// Create an empty descriptor at the current wire format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: KERCHUNK_VERSION,
            refs: IndexMap::new(),
        }
    }

    /// Decode a descriptor from raw reference-file content.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Json`] if the content is not a valid descriptor.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ReferenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Derive a descriptor from an item's embedded index metadata.
    ///
    /// Requires `kerchunk:zgroup` and `kerchunk:zattrs` on the item properties plus,
    /// for every key under `cube:dimensions` and `cube:variables`, a `kerchunk:zarray`,
    /// `kerchunk:zattrs`, and `kerchunk:value` chunk map.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingKey`] if any required key is absent.
    pub fn from_item(item: &Item) -> Result<Self, ReferenceError> {
        let mut descriptor = Self::new();

        let zgroup = required_property(item, fields::KERCHUNK_ZGROUP)?;
        descriptor
            .refs
            .insert(zgroup_key(), RefEntry::Inline(serde_json::to_string(zgroup)?));
        let zattrs = required_property(item, fields::KERCHUNK_ZATTRS)?;
        descriptor
            .refs
            .insert(zattrs_key(), RefEntry::Inline(serde_json::to_string(zattrs)?));

        for attr in [fields::CUBE_DIMENSIONS, fields::CUBE_VARIABLES] {
            let entries = required_property(item, attr)?
                .as_object()
                .ok_or_else(|| ReferenceError::InvalidField {
                    key: attr.to_string(),
                })?;
            for (variable, entry) in entries {
                let entry = entry
                    .as_object()
                    .ok_or_else(|| ReferenceError::InvalidField {
                        key: variable.clone(),
                    })?;
                let zarray = required_entry(entry, variable, fields::KERCHUNK_ZARRAY)?;
                descriptor.refs.insert(
                    array_key(variable),
                    RefEntry::Inline(serde_json::to_string(zarray)?),
                );
                let zattrs = required_entry(entry, variable, fields::KERCHUNK_ZATTRS)?;
                descriptor.refs.insert(
                    array_attrs_key(variable),
                    RefEntry::Inline(serde_json::to_string(zattrs)?),
                );
                let values = required_entry(entry, variable, fields::KERCHUNK_VALUE)?
                    .as_object()
                    .ok_or_else(|| ReferenceError::InvalidField {
                        key: format!("{variable}/{}", fields::KERCHUNK_VALUE),
                    })?;
                for (index, value) in values {
                    let key = format!("{variable}/{index}");
                    let entry = serde_json::from_value(value.clone()).map_err(|_| {
                        ReferenceError::InvalidChunkValue { key: key.clone() }
                    })?;
                    descriptor.refs.insert(key, entry);
                }
            }
        }

        Ok(descriptor)
    }

    /// The wire format version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// The reference mapping.
    #[must_use]
    pub const fn refs(&self) -> &IndexMap<String, RefEntry> {
        &self.refs
    }

    /// The variable names, from the array metadata keys, in key order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.refs
            .keys()
            .filter_map(|key| key.strip_suffix("/.zarray"))
    }

    /// Rewrite the external location of every pointer entry through `patcher`.
    ///
    /// This is the URL-patch point for the reference representation: the hook applies
    /// to parsed pointer entries after the reference content is decoded, never to the
    /// raw bytes and never to the asset href.
    pub fn patch_urls(&mut self, patcher: &UrlPatcher) {
        for entry in self.refs.values_mut() {
            entry.patch_url(&**patcher);
        }
    }

    /// The inline array metadata for `variable`.
    fn zarray(&self, variable: &str) -> Result<ZarrayMeta, ReferenceError> {
        let key = array_key(variable);
        let entry = self
            .refs
            .get(&key)
            .ok_or_else(|| ReferenceError::MissingKey { key: key.clone() })?;
        match entry {
            RefEntry::Inline(json) => Ok(serde_json::from_str(json)?),
            RefEntry::Whole(_) | RefEntry::Pointer(..) => {
                Err(ReferenceError::InvalidField { key })
            }
        }
    }

    /// The dimension names of `variable`, from its inline `_ARRAY_DIMENSIONS` attribute.
    ///
    /// A coordinate variable with no recorded dimensions is assumed to span itself.
    fn array_dimensions(&self, variable: &str) -> Vec<String> {
        let dims = self
            .refs
            .get(&array_attrs_key(variable))
            .and_then(|entry| match entry {
                RefEntry::Inline(json) => {
                    serde_json::from_str::<serde_json::Value>(json).ok()
                }
                _ => None,
            })
            .and_then(|attrs| {
                attrs.get(ARRAY_DIMENSIONS).and_then(|dims| {
                    serde_json::from_value::<Vec<String>>(dims.clone()).ok()
                })
            });
        dims.unwrap_or_else(|| vec![variable.to_string()])
    }

    /// The chunk entries of `variable`: parsed chunk indices and their entries.
    fn chunk_entries(
        &self,
        variable: &str,
    ) -> Result<Vec<(Vec<u64>, &RefEntry)>, ReferenceError> {
        let prefix = format!("{variable}/");
        let mut entries = Vec::new();
        for (key, entry) in &self.refs {
            let Some(index) = key.strip_prefix(&prefix) else {
                continue;
            };
            if index.starts_with('.') {
                continue;
            }
            let indices = index
                .split('.')
                .map(str::parse)
                .collect::<Result<Vec<u64>, _>>()
                .map_err(|_| ReferenceError::InvalidChunkKey { key: key.clone() })?;
            entries.push((indices, entry));
        }
        Ok(entries)
    }
}

fn required_property<'a>(
    item: &'a Item,
    key: &str,
) -> Result<&'a serde_json::Value, ReferenceError> {
    item.property(key).ok_or_else(|| ReferenceError::MissingKey {
        key: key.to_string(),
    })
}

fn required_entry<'a>(
    entry: &'a serde_json::Map<String, serde_json::Value>,
    variable: &str,
    key: &str,
) -> Result<&'a serde_json::Value, ReferenceError> {
    entry.get(key).ok_or_else(|| ReferenceError::MissingKey {
        key: format!("{variable}/{key}"),
    })
}

/// Merge per-item descriptors into one descriptor concatenated along `axis`.
///
/// The order of `descriptors` determines the order along the axis; callers must
/// pre-sort by the desired ordering, this function does not sort.
/// Variables whose dimensions include the axis are concatenated: shapes are summed
/// along the axis and chunk keys re-indexed by chunk offset.
/// Variables without the axis are taken from the first descriptor.
/// Per-item chunk identity is preserved: no key is ever overwritten.
///
/// # Errors
///
/// Returns a [`ReferenceError`] if `descriptors` is empty, required metadata keys are
/// absent, the descriptors disagree on the variable set, chunk shapes disagree along
/// the axis, or re-keying would collide.
pub fn combine(
    descriptors: &[ReferenceDescriptor],
    axis: &str,
) -> Result<ReferenceDescriptor, ReferenceError> {
    let first = descriptors.first().ok_or(ReferenceError::Empty)?;
    if descriptors.len() == 1 {
        return Ok(first.clone());
    }

    let mut combined = ReferenceDescriptor::new();
    for key in [zgroup_key(), zattrs_key()] {
        let entry = first
            .refs
            .get(&key)
            .ok_or_else(|| ReferenceError::MissingKey { key: key.clone() })?;
        combined.refs.insert(key, entry.clone());
    }

    let variables: Vec<String> = first.variables().map(str::to_string).collect();
    // Enumeration comes from the first descriptor, so a set mismatch in either
    // direction must fail instead of silently dropping or truncating a variable.
    for descriptor in &descriptors[1..] {
        let descriptor_variables: Vec<&str> = descriptor.variables().collect();
        for variable in &variables {
            if !descriptor_variables.contains(&variable.as_str()) {
                return Err(ReferenceError::MismatchedVariables {
                    variable: variable.clone(),
                });
            }
        }
        for variable in descriptor_variables {
            if !variables.iter().any(|v| v == variable) {
                return Err(ReferenceError::MismatchedVariables {
                    variable: variable.to_string(),
                });
            }
        }
    }

    for variable in &variables {
        let zarray = first.zarray(variable)?;
        let dims = first.array_dimensions(variable);
        let axis_pos = dims.iter().position(|dim| dim == axis);

        let Some(axis_pos) = axis_pos else {
            // Shared across items along the axis, take the first occurrence.
            copy_variable(&mut combined, first, variable)?;
            continue;
        };

        let mut shape = zarray.shape.clone();
        shape[axis_pos] = 0;
        let mut chunk_offset = 0u64;
        let mut chunk_keys: Vec<(String, RefEntry)> = Vec::new();
        for descriptor in descriptors {
            let d_zarray = descriptor.zarray(variable)?;
            if d_zarray.chunks != zarray.chunks {
                return Err(ReferenceError::MismatchedChunks {
                    variable: variable.clone(),
                });
            }
            shape[axis_pos] += d_zarray.shape[axis_pos];
            for (mut indices, entry) in descriptor.chunk_entries(variable)? {
                if indices.len() != d_zarray.shape.len() {
                    return Err(ReferenceError::InvalidChunkKey {
                        key: format!("{variable}/{}", indices.iter().join(".")),
                    });
                }
                indices[axis_pos] += chunk_offset;
                chunk_keys.push((
                    format!("{variable}/{}", indices.iter().join(".")),
                    entry.clone(),
                ));
            }
            chunk_offset += d_zarray.shape[axis_pos].div_ceil(zarray.chunks[axis_pos]);
        }

        let merged_zarray = ZarrayMeta {
            shape,
            chunks: zarray.chunks.clone(),
            rest: zarray.rest.clone(),
        };
        combined.refs.insert(
            array_key(variable),
            RefEntry::Inline(serde_json::to_string(&merged_zarray)?),
        );
        if let Some(attrs) = first.refs.get(&array_attrs_key(variable)) {
            combined
                .refs
                .insert(array_attrs_key(variable), attrs.clone());
        }
        for (key, entry) in chunk_keys {
            if combined.refs.insert(key.clone(), entry).is_some() {
                return Err(ReferenceError::KeyCollision { key });
            }
        }
    }

    Ok(combined)
}

fn copy_variable(
    combined: &mut ReferenceDescriptor,
    source: &ReferenceDescriptor,
    variable: &str,
) -> Result<(), ReferenceError> {
    let prefix = format!("{variable}/");
    for (key, entry) in &source.refs {
        if key.starts_with(&prefix) {
            if combined.refs.insert(key.clone(), entry.clone()).is_some() {
                return Err(ReferenceError::KeyCollision { key: key.clone() });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn kerchunk_item(id: &str, time_value: &str) -> Item {
        let json = serde_json::json!({
            "type": "Feature",
            "id": id,
            "properties": {
                "kerchunk:zgroup": {"zarr_format": 2},
                "kerchunk:zattrs": {"title": "test cube"},
                "cube:dimensions": {
                    "time": {
                        "kerchunk:zarray": {
                            "shape": [1], "chunks": [1], "dtype": "<M8[ns]",
                            "compressor": null, "fill_value": null,
                            "filters": null, "order": "C", "zarr_format": 2
                        },
                        "kerchunk:zattrs": {"_ARRAY_DIMENSIONS": ["time"]},
                        "kerchunk:value": {"0": time_value}
                    }
                },
                "cube:variables": {
                    "tasmax": {
                        "kerchunk:zarray": {
                            "shape": [1, 600, 1440], "chunks": [1, 600, 1440],
                            "dtype": "<f4", "compressor": null, "fill_value": null,
                            "filters": null, "order": "C", "zarr_format": 2
                        },
                        "kerchunk:zattrs": {"_ARRAY_DIMENSIONS": ["time", "lat", "lon"]},
                        "kerchunk:value": {
                            "0.0.0": [format!("s3://bucket/{id}.nc"), 8192, 3_456_000]
                        }
                    }
                }
            },
            "assets": {}
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn translate_item() {
        let descriptor = ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap();
        assert_eq!(descriptor.version(), KERCHUNK_VERSION);
        let keys: Vec<_> = descriptor.refs().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                ".zgroup",
                ".zattrs",
                "time/.zarray",
                "time/.zattrs",
                "time/0",
                "tasmax/.zarray",
                "tasmax/.zattrs",
                "tasmax/0.0.0",
            ]
        );
        assert_eq!(
            descriptor.refs()["tasmax/0.0.0"],
            RefEntry::Pointer("s3://bucket/scene-0.nc".to_string(), 8192, 3_456_000)
        );
        assert_eq!(descriptor.variables().collect::<Vec<_>>(), ["time", "tasmax"]);
    }

    #[test]
    fn translate_missing_key_is_an_error() {
        let mut item = kerchunk_item("scene-0", "0");
        item.properties.remove(fields::KERCHUNK_ZGROUP);
        let err = ReferenceDescriptor::from_item(&item).unwrap_err();
        assert!(matches!(
            err,
            ReferenceError::MissingKey { ref key } if key == fields::KERCHUNK_ZGROUP
        ));
    }

    #[test]
    fn combine_two_items_along_time() {
        let descriptors = [
            ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap(),
            ReferenceDescriptor::from_item(&kerchunk_item("scene-1", "1")).unwrap(),
        ];
        let combined = combine(&descriptors, "time").unwrap();

        // Per-item chunk identity is preserved.
        assert!(combined.refs().contains_key("tasmax/0.0.0"));
        assert!(combined.refs().contains_key("tasmax/1.0.0"));
        assert_eq!(
            combined.refs()["tasmax/1.0.0"],
            RefEntry::Pointer("s3://bucket/scene-1.nc".to_string(), 8192, 3_456_000)
        );

        // The combined axis coordinate has length 2.
        let time = combined.zarray("time").unwrap();
        assert_eq!(time.shape, [2]);
        let tasmax = combined.zarray("tasmax").unwrap();
        assert_eq!(tasmax.shape, [2, 600, 1440]);
        assert_eq!(tasmax.chunks, [1, 600, 1440]);
    }

    #[test]
    fn combine_empty_is_an_error() {
        assert!(matches!(combine(&[], "time"), Err(ReferenceError::Empty)));
    }

    #[test]
    fn combine_mismatched_variable_sets_is_an_error() {
        let full = ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap();
        let mut item = kerchunk_item("scene-1", "1");
        item.properties
            .get_mut(fields::CUBE_VARIABLES)
            .unwrap()
            .as_object_mut()
            .unwrap()
            .remove("tasmax");
        let partial = ReferenceDescriptor::from_item(&item).unwrap();

        // A variable missing from a later descriptor fails, as does a variable
        // the first descriptor does not enumerate.
        for descriptors in [
            [full.clone(), partial.clone()],
            [partial, full],
        ] {
            let err = combine(&descriptors, "time").unwrap_err();
            assert!(matches!(
                err,
                ReferenceError::MismatchedVariables { ref variable } if variable == "tasmax"
            ));
        }
    }

    #[test]
    fn combine_mismatched_chunks_is_an_error() {
        let a = ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap();
        let mut item = kerchunk_item("scene-1", "1");
        item.properties["cube:variables"]["tasmax"]["kerchunk:zarray"]["chunks"] =
            serde_json::json!([1, 300, 1440]);
        let b = ReferenceDescriptor::from_item(&item).unwrap();
        let err = combine(&[a, b], "time").unwrap_err();
        assert!(matches!(
            err,
            ReferenceError::MismatchedChunks { ref variable } if variable == "tasmax"
        ));
    }

    #[test]
    fn patch_urls_rewrites_pointers_only() {
        let mut descriptor =
            ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap();
        let patcher: UrlPatcher = std::sync::Arc::new(|href: &str| format!("{href}?sig=abc"));
        descriptor.patch_urls(&patcher);
        assert_eq!(
            descriptor.refs()["tasmax/0.0.0"].url(),
            Some("s3://bucket/scene-0.nc?sig=abc")
        );
        assert!(matches!(
            descriptor.refs()[".zgroup"],
            RefEntry::Inline(_)
        ));
    }

    #[test]
    fn descriptor_round_trips_as_kerchunk_json() {
        let descriptor =
            ReferenceDescriptor::from_item(&kerchunk_item("scene-0", "0")).unwrap();
        let json = serde_json::to_string(&descriptor).unwrap();
        let decoded = ReferenceDescriptor::from_json_bytes(json.as_bytes()).unwrap();
        assert_eq!(decoded, descriptor);
        assert!(json.starts_with(r#"{"version":1,"refs":{".zgroup""#));
    }
}

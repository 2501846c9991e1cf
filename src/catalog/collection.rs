//! STAC collections and item collections.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{fields, Asset, Item};

/// A STAC collection.
///
/// Collections own collection-level assets (e.g. a repository asset) and shared
/// metadata such as the `storage:schemes` declarations resolved by
/// [`repository`](crate::repository).
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Collection {
    #[serde(rename = "type")]
    type_: monostate::MustBe!("Collection"),
    /// The collection identifier.
    pub id: String,
    /// Collection-level assets, keyed by name.
    #[serde(default)]
    pub assets: IndexMap<String, Asset>,
    /// Any further fields, including `storage:schemes`.
    #[serde(flatten)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl Collection {
    /// Create a new collection with no assets.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            type_: monostate::MustBe!("Collection"),
            id: id.into(),
            assets: IndexMap::new(),
            extra_fields: serde_json::Map::new(),
        }
    }

    /// Add an asset under `name`.
    #[must_use]
    pub fn with_asset(mut self, name: impl Into<String>, asset: Asset) -> Self {
        self.assets.insert(name.into(), asset);
        self
    }

    /// Set an extra field.
    #[must_use]
    pub fn with_extra_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_fields.insert(key.into(), value);
        self
    }

    /// Look up an asset by name.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    /// The collection's declared storage schemes (`storage:schemes`), if any.
    #[must_use]
    pub fn storage_schemes(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.extra_fields
            .get(fields::STORAGE_SCHEMES)
            .and_then(serde_json::Value::as_object)
    }
}

/// An ordered collection of [`Item`]s, e.g. the result of a catalog search.
///
/// Iteration order is meaningful: it becomes the stacking axis order.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ItemCollection {
    #[serde(rename = "type")]
    type_: monostate::MustBe!("FeatureCollection"),
    /// The items, in stacking order.
    pub features: Vec<Item>,
    /// Any further fields, passed through untouched.
    #[serde(flatten)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl ItemCollection {
    /// Create an item collection from `items`, preserving their order.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            type_: monostate::MustBe!("FeatureCollection"),
            features: items,
            extra_fields: serde_json::Map::new(),
        }
    }

    /// The items, in stacking order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.features
    }

    /// The number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl From<Vec<Item>> for ItemCollection {
    fn from(items: Vec<Item>) -> Self {
        Self::new(items)
    }
}

impl<'a> IntoIterator for &'a ItemCollection {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

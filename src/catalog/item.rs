//! STAC items.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{fields, Asset};

/// A STAC item: a group of co-registered assets (e.g. one satellite scene).
///
/// Asset names are unique and their order is preserved.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Item {
    #[serde(rename = "type")]
    type_: monostate::MustBe!("Feature"),
    /// The item identifier.
    pub id: String,
    /// Item properties, including any embedded kerchunk index metadata.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// The item's assets, keyed by name.
    #[serde(default)]
    pub assets: IndexMap<String, Asset>,
    /// Any further fields (geometry, bbox, links, ...), passed through untouched.
    #[serde(flatten)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    /// Create a new item with no properties or assets.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            type_: monostate::MustBe!("Feature"),
            id: id.into(),
            properties: serde_json::Map::new(),
            assets: IndexMap::new(),
            extra_fields: serde_json::Map::new(),
        }
    }

    /// Set a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add an asset under `name`.
    #[must_use]
    pub fn with_asset(mut self, name: impl Into<String>, asset: Asset) -> Self {
        self.assets.insert(name.into(), asset);
        self
    }

    /// Look up a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Returns true if the item carries embedded kerchunk index metadata.
    #[must_use]
    pub fn has_kerchunk_metadata(&self) -> bool {
        self.properties.contains_key(fields::KERCHUNK_ZGROUP)
    }

    /// Rewrite every asset href through `patcher`.
    ///
    /// Used by stacking backends that resolve hrefs eagerly, where URL signing
    /// must happen before the stack call.
    pub fn patch_asset_hrefs(&mut self, patcher: &dyn Fn(&str) -> String) {
        for asset in self.assets.values_mut() {
            asset.href = patcher(&asset.href);
        }
    }
}

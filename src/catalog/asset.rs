//! STAC assets.

use serde::{Deserialize, Serialize};

use crate::catalog::{fields, Collection};

/// Media types dispatched on by the [materializer](crate::materialize).
pub mod media_type {
    /// Cloud-optimized GeoTIFF.
    pub const COG: &str = "image/tiff; application=geotiff; profile=cloud-optimized";
    /// JSON, the media type of kerchunk reference files.
    pub const JSON: &str = "application/json";
    /// GeoJSON, also accepted for reference files.
    pub const GEOJSON: &str = "application/geo+json";
    /// A chunked array store.
    pub const ZARR: &str = "application/vnd+zarr";
    /// A versioned virtual-chunk repository.
    pub const REPOSITORY: &str = "application/vnd.icechunk";
}

/// Role tags dispatched on by the [materializer](crate::materialize).
pub mod role {
    /// Marks a reference-file asset.
    pub const INDEX: &str = "index";
    /// Marks a reference-file asset.
    pub const REFERENCES: &str = "references";
    /// Marks a repository asset whose chunks point into another asset's storage.
    pub const VIRTUAL: &str = "virtual";
}

/// A STAC asset: one retrievable data file and its format metadata.
///
/// Extra fields are captured verbatim; the keys in [`fields`](crate::catalog::fields)
/// are the ones this crate interprets.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Asset {
    /// The asset locator.
    pub href: String,
    /// The declared media type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// The declared role tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// A displayable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Any further fields, including the reserved keys in [`fields`](crate::catalog::fields).
    #[serde(flatten)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl Asset {
    /// Create a new asset pointing at `href` with no media type or roles.
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: None,
            roles: Vec::new(),
            title: None,
            extra_fields: serde_json::Map::new(),
        }
    }

    /// Set the media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Set the role tags.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set an extra field.
    #[must_use]
    pub fn with_extra_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_fields.insert(key.into(), value);
        self
    }

    /// Returns true if the asset declares `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The asset's declared open options (`xarray:open_kwargs`), empty if absent.
    #[must_use]
    pub fn open_kwargs(&self) -> serde_json::Map<String, serde_json::Value> {
        self.extra_fields
            .get(fields::OPEN_KWARGS)
            .and_then(serde_json::Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// The asset's declared storage options (`xarray:storage_options`), if any.
    #[must_use]
    pub fn storage_options(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.extra_fields
            .get(fields::STORAGE_OPTIONS)
            .and_then(serde_json::Value::as_object)
    }
}

/// A non-owning pairing of an [`Asset`] with the [`Collection`] that owns it.
///
/// The owner is used only for metadata lookup (storage schemes, sibling assets);
/// it is a borrow into a collection owned elsewhere, never an owning back-reference.
#[derive(Clone, Copy)]
pub struct AssetRef<'a> {
    owner: Option<&'a Collection>,
    asset: &'a Asset,
}

impl<'a> AssetRef<'a> {
    /// An asset with no reachable owner.
    #[must_use]
    pub fn standalone(asset: &'a Asset) -> Self {
        Self { owner: None, asset }
    }

    /// An asset owned by `collection`.
    #[must_use]
    pub fn owned(collection: &'a Collection, asset: &'a Asset) -> Self {
        Self {
            owner: Some(collection),
            asset,
        }
    }

    /// The asset.
    #[must_use]
    pub fn asset(&self) -> &'a Asset {
        self.asset
    }

    /// The owning collection, if reachable.
    #[must_use]
    pub fn owner(&self) -> Option<&'a Collection> {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_deserializes_extra_fields() {
        let asset: Asset = serde_json::from_str(
            r#"{
                "href": "s3://bucket/prefix/data",
                "type": "application/vnd+zarr",
                "roles": ["data"],
                "xarray:open_kwargs": {"chunks": {}},
                "storage:refs": ["scheme-a"]
            }"#,
        )
        .unwrap();
        assert_eq!(asset.media_type.as_deref(), Some(media_type::ZARR));
        assert!(asset.has_role("data"));
        assert!(!asset.has_role(role::VIRTUAL));
        assert_eq!(
            asset.open_kwargs().get("chunks"),
            Some(&serde_json::json!({}))
        );
        assert!(asset.extra_fields.contains_key(fields::STORAGE_REFS));
    }

    #[test]
    fn asset_open_kwargs_default_to_empty() {
        let asset = Asset::new("https://example.com/data.tif");
        assert!(asset.open_kwargs().is_empty());
        assert!(asset.storage_options().is_none());
    }
}

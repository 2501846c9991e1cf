//! A read-only view of the STAC object model.
//!
//! The catalog metadata model itself is an external collaborator; this module consumes it
//! as a tree with named child lookup and arbitrary key/value side-channel metadata per node
//! (see [`fields`] for the reserved keys this crate interprets).
//!
//! [`StacInput`] is the closed union of values accepted by
//! [`to_dataset`](crate::materialize::to_dataset) and [`classify`] determines which
//! catalog node kind an input is.
//! Classification is total and side-effect free; an unrecognised input classifies as
//! [`NodeKind::Unknown`] and it is the dispatch facade that converts that into a type error.

mod asset;
mod collection;
mod item;
mod search;

pub use asset::{media_type, role, Asset, AssetRef};
pub use collection::{Collection, ItemCollection};
pub use item::Item;
pub use search::ItemSearch;

/// Reserved extra-field keys interpreted by this crate.
///
/// Everything else in an object's extra fields is passed through untouched.
pub mod fields {
    /// Open options forwarded to the opening engine.
    pub const OPEN_KWARGS: &str = "xarray:open_kwargs";
    /// Storage options merged into the open options under the `storage_options` key.
    pub const STORAGE_OPTIONS: &str = "xarray:storage_options";
    /// Storage-scheme references declared on an asset.
    pub const STORAGE_REFS: &str = "storage:refs";
    /// Storage schemes declared on a collection.
    pub const STORAGE_SCHEMES: &str = "storage:schemes";
    /// Virtual-chunk pointers declared on a `"virtual"` asset.
    pub const VIRTUAL_HREFS: &str = "vrt:hrefs";
    /// Version selector on a repository-backed asset.
    pub const VERSION: &str = "version";
    /// Kerchunk group metadata on an item.
    pub const KERCHUNK_ZGROUP: &str = "kerchunk:zgroup";
    /// Kerchunk group attributes on an item, or array attributes on a datacube entry.
    pub const KERCHUNK_ZATTRS: &str = "kerchunk:zattrs";
    /// Kerchunk array metadata on a datacube entry.
    pub const KERCHUNK_ZARRAY: &str = "kerchunk:zarray";
    /// Kerchunk chunk-index to value mapping on a datacube entry.
    pub const KERCHUNK_VALUE: &str = "kerchunk:value";
    /// Datacube dimensions.
    pub const CUBE_DIMENSIONS: &str = "cube:dimensions";
    /// Datacube variables.
    pub const CUBE_VARIABLES: &str = "cube:variables";
    /// The engine selector within merged open options.
    pub const ENGINE: &str = "engine";
    /// The chunking selector within merged open options.
    pub const CHUNKS: &str = "chunks";
    /// The consolidated-metadata flag within merged open options.
    pub const CONSOLIDATED: &str = "consolidated";
    /// The key storage options are forwarded under within merged open options.
    pub const STORAGE_OPTIONS_KWARG: &str = "storage_options";
}

/// Any value accepted by [`to_dataset`](crate::materialize::to_dataset).
///
/// All variants are non-owning views; nothing is cached or mutated by this crate.
#[derive(Clone, Copy)]
#[non_exhaustive]
pub enum StacInput<'a> {
    /// A single asset, optionally paired with its owning collection.
    Asset(AssetRef<'a>),
    /// A single item.
    Item(&'a Item),
    /// An ordered collection of items.
    ItemCollection(&'a ItemCollection),
    /// A lazily-searchable query.
    Search(&'a dyn ItemSearch),
    /// An unclassified JSON value, classified nominally by its declared type.
    Value(&'a serde_json::Value),
}

impl<'a> From<AssetRef<'a>> for StacInput<'a> {
    fn from(asset: AssetRef<'a>) -> Self {
        Self::Asset(asset)
    }
}

impl<'a> From<&'a Item> for StacInput<'a> {
    fn from(item: &'a Item) -> Self {
        Self::Item(item)
    }
}

impl<'a> From<&'a ItemCollection> for StacInput<'a> {
    fn from(items: &'a ItemCollection) -> Self {
        Self::ItemCollection(items)
    }
}

impl<'a> From<&'a serde_json::Value> for StacInput<'a> {
    fn from(value: &'a serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// The catalog node kinds distinguished by [`classify`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum NodeKind {
    /// A single asset.
    #[display("asset")]
    Asset,
    /// A single item.
    #[display("item")]
    Item,
    /// A collection of items.
    #[display("item collection")]
    ItemCollection,
    /// A lazily-searchable query.
    #[display("search")]
    Search,
    /// Not a recognised catalog node.
    #[display("unknown")]
    Unknown,
}

/// Classify an input as one of the catalog node kinds.
///
/// Typed inputs classify by their variant.
/// JSON values classify nominally by their declared `type` field
/// (`"Feature"` or `"FeatureCollection"`), or as an asset if they are an object
/// with an `href`. In an asset object the `type` field holds a media type, not
/// a catalog type tag, so any object with an `href` whose `type` is not one of
/// the catalog tags classifies as an asset.
#[must_use]
pub fn classify(input: &StacInput<'_>) -> NodeKind {
    match input {
        StacInput::Asset(_) => NodeKind::Asset,
        StacInput::Item(_) => NodeKind::Item,
        StacInput::ItemCollection(_) => NodeKind::ItemCollection,
        StacInput::Search(_) => NodeKind::Search,
        StacInput::Value(value) => classify_value(value),
    }
}

fn classify_value(value: &serde_json::Value) -> NodeKind {
    let Some(object) = value.as_object() else {
        return NodeKind::Unknown;
    };
    match object.get("type").and_then(serde_json::Value::as_str) {
        Some("Feature") => NodeKind::Item,
        Some("FeatureCollection") => NodeKind::ItemCollection,
        // Unhandled catalog node types, never assets.
        Some("Catalog" | "Collection") => NodeKind::Unknown,
        _ => {
            if object.contains_key("href") {
                NodeKind::Asset
            } else {
                NodeKind::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_typed_inputs() {
        let item: Item = serde_json::from_str(item::tests::ITEM_JSON).unwrap();
        assert_eq!(classify(&StacInput::Item(&item)), NodeKind::Item);
        let asset = Asset::new("https://example.com/data.tif");
        assert_eq!(
            classify(&StacInput::Asset(AssetRef::standalone(&asset))),
            NodeKind::Asset
        );
    }

    #[test]
    fn classify_value_inputs() {
        let item = serde_json::json!({"type": "Feature", "id": "a", "properties": {}, "assets": {}});
        assert_eq!(classify(&StacInput::Value(&item)), NodeKind::Item);

        let items = serde_json::json!({"type": "FeatureCollection", "features": []});
        assert_eq!(classify(&StacInput::Value(&items)), NodeKind::ItemCollection);

        let asset = serde_json::json!({"href": "https://example.com/data.tif"});
        assert_eq!(classify(&StacInput::Value(&asset)), NodeKind::Asset);

        let string = serde_json::json!("foo");
        assert_eq!(classify(&StacInput::Value(&string)), NodeKind::Unknown);

        let collection = serde_json::json!({"type": "Collection", "id": "c"});
        assert_eq!(classify(&StacInput::Value(&collection)), NodeKind::Unknown);
    }

    #[test]
    fn classify_asset_value_with_a_media_type() {
        // An asset's `type` field is a media type, not a catalog type tag.
        let asset = serde_json::json!({
            "href": "https://example.com/data.tif",
            "type": "image/tiff; application=geotiff; profile=cloud-optimized"
        });
        assert_eq!(classify(&StacInput::Value(&asset)), NodeKind::Asset);

        let catalog = serde_json::json!({"type": "Catalog", "id": "c", "href": "x"});
        assert_eq!(classify(&StacInput::Value(&catalog)), NodeKind::Unknown);
    }
}

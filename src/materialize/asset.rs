//! Single-asset materialization.
//!
//! A lone asset resolves to exactly one storage representation, tried in order:
//! reference file, versioned repository, cloud-optimized raster, chunked array
//! store, and finally the default opener. The chosen branch decides where the
//! URL patch hook applies: a reference file is fetched from its unpatched href
//! and the hook rewrites the chunk pointers inside it, a repository ignores the
//! hook entirely, and every direct-open branch patches the href immediately
//! before handing it to the engine.

use serde_json::Value;

use crate::catalog::{fields, media_type, role, Asset, AssetRef};
use crate::dataset::Dataset;
use crate::engine::{EngineRegistry, OpenKwargs};
use crate::reference::ReferenceDescriptor;
use crate::repository;

use super::{ToDatasetError, ToDatasetOptions};

/// Materialize a single asset through the engine matching its storage
/// representation.
///
/// # Errors
///
/// Returns a [`ToDatasetError`] if the asset metadata is malformed, the required
/// engine capability is missing, or the engine fails to open the target.
pub fn materialize_asset(
    registry: &EngineRegistry,
    asset_ref: AssetRef<'_>,
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    let asset = asset_ref.asset();

    if is_reference_asset(asset) {
        return open_reference_asset(registry, asset, options);
    }

    if asset.has_role(role::VIRTUAL) || asset.media_type.as_deref() == Some(media_type::REPOSITORY)
    {
        // Repository access is version-addressed, not URL-addressed: patch_url
        // does not apply on this branch.
        let merged = merge_open_options(OpenKwargs::new(), asset, &options.kwargs);
        return Ok(repository::open_readonly(
            registry,
            asset_ref.owner(),
            asset,
            &merged,
        )?);
    }

    let defaults = match asset.media_type.as_deref() {
        Some(media_type::COG) => direct_open_defaults(Some("raster")),
        Some(media_type::ZARR) => direct_open_defaults(Some("zarr")),
        _ => direct_open_defaults(None),
    };
    let merged = merge_open_options(defaults, asset, &options.kwargs);

    // The final merged `engine` value picks the opener, so a caller kwarg can
    // redirect an asset away from its media-type default.
    let opener = match merged.get(fields::ENGINE).and_then(Value::as_str) {
        Some("raster") => registry.raster()?,
        Some("zarr") => registry.zarr()?,
        _ => registry.default_opener()?,
    };

    let href = patched_href(asset, options);
    Ok(opener.open(&href, &merged)?)
}

/// Whether an asset points at a reference file rather than the data itself.
fn is_reference_asset(asset: &Asset) -> bool {
    matches!(
        asset.media_type.as_deref(),
        Some(media_type::JSON | media_type::GEOJSON)
    ) && (asset.has_role(role::INDEX) || asset.has_role(role::REFERENCES))
}

fn open_reference_asset(
    registry: &EngineRegistry,
    asset: &Asset,
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    // The reference file itself is fetched from the unpatched href; the hook
    // applies to the chunk pointers it contains.
    let bytes = registry.fetch()?.fetch(&asset.href)?;
    let mut references = ReferenceDescriptor::from_json_bytes(&bytes)?;
    if let Some(patch_url) = &options.patch_url {
        references.patch_urls(patch_url);
    }

    let merged = merge_open_options(reference_open_defaults(), asset, &options.kwargs);
    Ok(registry.reference()?.open_references(&references, &merged)?)
}

/// The default open options for a direct-open branch: lazy chunked loading, and
/// the branch engine when the media type names one.
fn direct_open_defaults(engine: Option<&str>) -> OpenKwargs {
    let mut defaults = OpenKwargs::new();
    defaults.insert(fields::CHUNKS.to_string(), Value::Object(OpenKwargs::new()));
    if let Some(engine) = engine {
        defaults.insert(fields::ENGINE.to_string(), Value::String(engine.to_string()));
    }
    defaults
}

pub(super) fn reference_open_defaults() -> OpenKwargs {
    let mut defaults = direct_open_defaults(Some("zarr"));
    defaults.insert(fields::CONSOLIDATED.to_string(), Value::Bool(false));
    defaults
}

/// Merge open options by ascending precedence: branch defaults, then the
/// asset's declared open options, then its storage options (under a
/// `storage_options` key), then the caller's kwargs.
fn merge_open_options(defaults: OpenKwargs, asset: &Asset, kwargs: &OpenKwargs) -> OpenKwargs {
    let mut merged = defaults;
    for (key, value) in asset.open_kwargs() {
        merged.insert(key, value);
    }
    if let Some(storage_options) = asset.storage_options() {
        merged.insert(
            fields::STORAGE_OPTIONS_KWARG.to_string(),
            Value::Object(storage_options.clone()),
        );
    }
    for (key, value) in kwargs {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn patched_href(asset: &Asset, options: &ToDatasetOptions) -> String {
    match &options.patch_url {
        Some(patch_url) => patch_url(&asset.href),
        None => asset.href.clone(),
    }
}

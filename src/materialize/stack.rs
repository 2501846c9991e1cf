//! Multi-item stacking.
//!
//! Items carrying kerchunk metadata bypass the stacking libraries entirely: each
//! item is translated into a reference descriptor, the descriptors are combined
//! along the configured concatenation dimension, and the combined descriptor is
//! opened through the `reference` capability. All other items go through a
//! stacking library, chosen explicitly by the caller or by probing the
//! configured preference order for the first registered capability.
//!
//! The two stacking backends differ structurally (one yields a dataset with one
//! variable per asset key, the other a single array with a band dimension), so
//! the band-stack result is normalized here to the variable-per-asset shape:
//! per-band scalar coordinates become variable attributes and the band
//! dimension disappears.

use indexmap::IndexMap;
use serde_json::Value;

use crate::catalog::{fields, Item, NodeKind};
use crate::config::{global_config, StackingLibrary};
use crate::dataset::{BandStack, DataArray, Dataset};
use crate::engine::{Capability, EngineError, EngineRegistry, MissingCapabilityError, StackParams};
use crate::reference::{combine, ReferenceDescriptor};

use super::{asset::reference_open_defaults, ToDatasetError, ToDatasetOptions};

/// Stack the assets of one or more items into a single dataset.
///
/// `node_kind` names the input for error messages only.
///
/// # Errors
///
/// Returns a [`ToDatasetError`] if `drop_variables` was supplied, the stacking
/// library selection is invalid or unavailable, kerchunk metadata is malformed,
/// or the delegated engine fails.
pub fn materialize_items(
    registry: &EngineRegistry,
    items: &[Item],
    node_kind: NodeKind,
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    if options.drop_variables.is_some() {
        return Err(ToDatasetError::UnsupportedParameter {
            parameter: "drop_variables",
            node_kind,
        });
    }

    if !items.is_empty() && items.iter().all(Item::has_kerchunk_metadata) {
        return open_kerchunk_items(registry, items, options);
    }

    let preference = global_config().stacking_preference().to_vec();
    match select_stacking_library(registry, options.stacking_library.as_deref(), &preference)? {
        StackingLibrary::OdcStac => stack_with_odc(registry, items, options),
        StackingLibrary::Stackstac => stack_with_bands(registry, items, options),
    }
}

/// Translate, combine, and open items that embed their chunk references inline.
fn open_kerchunk_items(
    registry: &EngineRegistry,
    items: &[Item],
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    let descriptors = items
        .iter()
        .map(ReferenceDescriptor::from_item)
        .collect::<Result<Vec<_>, _>>()?;
    let axis = global_config().concat_dimension().to_string();
    let mut references = combine(&descriptors, &axis)?;
    if let Some(patch_url) = &options.patch_url {
        references.patch_urls(patch_url);
    }

    let mut open_options = reference_open_defaults();
    for (key, value) in &options.kwargs {
        open_options.insert(key.clone(), value.clone());
    }
    Ok(registry.reference()?.open_references(&references, &open_options)?)
}

/// Pick the stacking library: an explicit selection must parse, otherwise the
/// first capability registered in `preference` order wins. When nothing is
/// registered the last probed capability is reported missing; an empty
/// preference never probed anything and is its own error.
fn select_stacking_library(
    registry: &EngineRegistry,
    explicit: Option<&str>,
    preference: &[StackingLibrary],
) -> Result<StackingLibrary, ToDatasetError> {
    if let Some(value) = explicit {
        return value
            .parse()
            .map_err(|()| ToDatasetError::InvalidStackingLibrary {
                value: value.to_string(),
            });
    }
    let mut probed = None;
    for library in preference {
        let capability = match library {
            StackingLibrary::OdcStac => Capability::OdcStac,
            StackingLibrary::Stackstac => Capability::Stackstac,
        };
        if registry.has(capability) {
            return Ok(*library);
        }
        probed = Some(capability);
    }
    match probed {
        Some(capability) => Err(MissingCapabilityError::new(capability).into()),
        None => Err(EngineError::from("the configured stacking preference is empty").into()),
    }
}

fn stack_with_odc(
    registry: &EngineRegistry,
    items: &[Item],
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    let engine = registry.odc_stac()?;

    let size = global_config().spatial_chunk_size();
    let mut chunks: IndexMap<String, u64> =
        IndexMap::from([("x".to_string(), size), ("y".to_string(), size)]);
    let mut kwargs = options.kwargs.clone();
    if let Some(requested) = kwargs.remove(fields::CHUNKS) {
        chunks = parse_chunks(&requested)?;
    }

    let params = StackParams {
        chunks,
        patch_url: options.patch_url.clone(),
        kwargs,
    };
    Ok(engine.load(items, &params)?)
}

fn parse_chunks(requested: &Value) -> Result<IndexMap<String, u64>, ToDatasetError> {
    let object = requested
        .as_object()
        .ok_or_else(|| EngineError::from("chunks must map dimension names to sizes"))?;
    object
        .iter()
        .map(|(dim, size)| {
            let size = size
                .as_u64()
                .ok_or_else(|| EngineError::from(format!("invalid chunk size for {dim}")))?;
            Ok((dim.clone(), size))
        })
        .collect::<Result<_, EngineError>>()
        .map_err(ToDatasetError::Engine)
}

fn stack_with_bands(
    registry: &EngineRegistry,
    items: &[Item],
    options: &ToDatasetOptions,
) -> Result<Dataset, ToDatasetError> {
    let engine = registry.stackstac()?;

    // This backend stacks from item asset hrefs directly, so the patch hook is
    // applied to copies of the items before they are handed over.
    let patched: Vec<Item>;
    let items = match &options.patch_url {
        Some(patch_url) => {
            patched = items
                .iter()
                .cloned()
                .map(|mut item| {
                    item.patch_asset_hrefs(&**patch_url);
                    item
                })
                .collect();
            &patched
        }
        None => items,
    };

    let stack = engine.stack(items, &options.kwargs)?;
    normalize_band_stack(&stack)
}

/// Rotate a band stack into the variable-per-asset dataset shape.
///
/// Each band becomes a data variable spanning the remaining dimensions.
/// Per-band and scalar coordinates (null entries skipped) become attributes on
/// the variable they describe; multi-dimensional coordinates that do not span
/// the band dimension are shared and carry over unchanged.
fn normalize_band_stack(stack: &BandStack) -> Result<Dataset, ToDatasetError> {
    let band_axis = stack
        .band_axis()
        .ok_or_else(|| EngineError::from(format!("stack has no {} dimension", stack.band_dim)))?;
    let band_names = stack.band_names();
    if band_names.is_empty() {
        return Err(
            EngineError::from(format!("stack has no {} coordinate", stack.band_dim)).into(),
        );
    }

    let mut dims = stack.dims.clone();
    dims.remove(band_axis);
    let mut shape = stack.shape.clone();
    shape.remove(band_axis);
    let chunks = stack.chunks.as_ref().map(|chunks| {
        let mut chunks = chunks.clone();
        chunks.remove(band_axis);
        chunks
    });

    let mut dataset = Dataset::new();
    dataset.attrs = stack.attrs.clone();

    for (index, band) in band_names.iter().enumerate() {
        let mut variable = DataArray::new(dims.clone(), shape.clone());
        variable.chunks = chunks.clone();
        for (name, coord) in &stack.coords {
            if name == &stack.band_dim {
                continue;
            }
            let value = if coord.dims == [stack.band_dim.clone()] {
                coord.values.as_ref().and_then(|values| values.get(index))
            } else if coord.is_scalar() {
                coord.values.as_ref().and_then(|values| values.first())
            } else {
                continue;
            };
            match value {
                Some(value) if !value.is_null() => {
                    variable.attrs.insert(name.clone(), value.clone());
                }
                _ => {}
            }
        }
        dataset
            .data_vars
            .insert(band.clone(), variable);
    }

    for (name, coord) in &stack.coords {
        let spans_bands = name == &stack.band_dim || coord.dims.contains(&stack.band_dim);
        if !spans_bands && !coord.is_scalar() {
            dataset.coords.insert(name.clone(), coord.clone());
        }
    }

    Ok(dataset)
}

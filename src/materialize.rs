//! The resolution and materialization dispatcher.
//!
//! [`to_dataset`] is the single entry point: it classifies its input and routes to the
//! [single-asset materializer](materialize_asset) or the
//! [multi-item stacker](materialize_items); a search input is executed and the result
//! re-dispatched with all arguments forwarded unchanged.
//!
//! The behaviour depends on the catalog node kind:
//!  - **Asset**: if the asset points at a reference file, a versioned repository, a
//!    cloud-optimized raster, or a chunked array store, open it through the matching
//!    engine capability (no stacking axis is added).
//!  - **Item**: stack all the assets into a dataset with one more dimension than any
//!    given asset.
//!  - **ItemCollection**: stack all the assets in all the items into a dataset with
//!    two more dimensions than any given asset.
//!
//! Every call is synchronous and stateless: fresh handles are constructed from the
//! input catalog node and discarded once the dataset is returned. Either a fully
//! formed dataset is returned or the call fails; there is no partial-result mode.

mod asset;
mod stack;

pub use asset::materialize_asset;
pub use stack::materialize_items;

use thiserror::Error;

use crate::catalog::{classify, Asset, AssetRef, Item, ItemCollection, NodeKind, StacInput};
use crate::dataset::Dataset;
use crate::engine::{EngineError, EngineRegistry, MissingCapabilityError, OpenKwargs, UrlPatcher};
use crate::reference::ReferenceError;
use crate::repository::RepositoryError;

/// The options accepted by [`to_dataset`].
#[derive(Clone, Default)]
pub struct ToDatasetOptions {
    /// Variables to drop. Not implemented for any catalog node kind: stacking always
    /// yields the full variable set and callers filter afterwards. A non-null value
    /// is rejected with [`ToDatasetError::UnsupportedParameter`].
    pub drop_variables: Option<Vec<String>>,
    /// An explicit stacking library selection, `"odc.stac"` or `"stackstac"`.
    /// When unset, the first available of the configured preference order is used.
    pub stacking_library: Option<String>,
    /// A URL patch/sign hook, applied at the resolution point appropriate to the
    /// chosen storage representation.
    pub patch_url: Option<UrlPatcher>,
    /// Further open options, forwarded to the chosen engine.
    pub kwargs: OpenKwargs,
}

impl ToDatasetOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the variables to drop (rejected at dispatch, see
    /// [`drop_variables`](Self::drop_variables)).
    #[must_use]
    pub fn with_drop_variables(
        mut self,
        drop_variables: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.drop_variables = Some(drop_variables.into_iter().map(Into::into).collect());
        self
    }

    /// Set an explicit stacking library.
    #[must_use]
    pub fn with_stacking_library(mut self, stacking_library: impl Into<String>) -> Self {
        self.stacking_library = Some(stacking_library.into());
        self
    }

    /// Set the URL patch/sign hook.
    #[must_use]
    pub fn with_patch_url(
        mut self,
        patch_url: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.patch_url = Some(std::sync::Arc::new(patch_url));
        self
    }

    /// Set an engine open option.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

impl core::fmt::Debug for ToDatasetOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ToDatasetOptions")
            .field("drop_variables", &self.drop_variables)
            .field("stacking_library", &self.stacking_library)
            .field("patch_url", &self.patch_url.as_ref().map(|_| "..."))
            .field("kwargs", &self.kwargs)
            .finish()
    }
}

/// A materialization error.
///
/// All errors are fatal and surface synchronously; engine failures are propagated
/// unmodified with no retry layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToDatasetError {
    /// The input is not a recognised catalog node or search.
    #[error("cannot materialize a dataset from {0}")]
    UnsupportedType(String),
    /// A parameter was supplied where it is not implemented.
    #[error("{parameter} is not implemented for {node_kind} inputs")]
    UnsupportedParameter {
        /// The offending parameter name.
        parameter: &'static str,
        /// The node kind it was supplied for.
        node_kind: NodeKind,
    },
    /// An explicit stacking library outside the recognised values.
    #[error("stacking_library={value} is not a valid option")]
    InvalidStackingLibrary {
        /// The offending value.
        value: String,
    },
    /// A required engine is not registered.
    #[error(transparent)]
    MissingCapability(#[from] MissingCapabilityError),
    /// A reference translation or combination failure.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    /// A repository resolution failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// A JSON input classified as a catalog node but did not deserialize as one.
    #[error("invalid {kind} object: {source}")]
    Invalid {
        /// The node kind the input classified as.
        kind: NodeKind,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// An engine failure, propagated unmodified.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Materialize any [`StacInput`] as a chunked, labeled, multidimensional dataset.
///
/// # Errors
///
/// Returns a [`ToDatasetError`] if the input is not a recognised catalog node, its
/// metadata is malformed, a required engine capability is missing, or a delegated
/// engine fails.
pub fn to_dataset(
    input: StacInput<'_>,
    options: &ToDatasetOptions,
    registry: &EngineRegistry,
) -> Result<Dataset, ToDatasetError> {
    match input {
        StacInput::Asset(asset) => {
            reject_drop_variables(options, NodeKind::Asset)?;
            materialize_asset(registry, asset, options)
        }
        StacInput::Item(item) => {
            materialize_items(registry, std::slice::from_ref(item), NodeKind::Item, options)
        }
        StacInput::ItemCollection(items) => {
            materialize_items(registry, items.items(), NodeKind::ItemCollection, options)
        }
        StacInput::Search(search) => {
            let items = search.item_collection()?;
            to_dataset(StacInput::ItemCollection(&items), options, registry)
        }
        StacInput::Value(value) => match classify(&input) {
            NodeKind::Item => {
                let item: Item = deserialize_node(value, NodeKind::Item)?;
                to_dataset(StacInput::Item(&item), options, registry)
            }
            NodeKind::ItemCollection => {
                let items: ItemCollection = deserialize_node(value, NodeKind::ItemCollection)?;
                to_dataset(StacInput::ItemCollection(&items), options, registry)
            }
            NodeKind::Asset => {
                let asset: Asset = deserialize_node(value, NodeKind::Asset)?;
                reject_drop_variables(options, NodeKind::Asset)?;
                materialize_asset(registry, AssetRef::standalone(&asset), options)
            }
            NodeKind::Search | NodeKind::Unknown => {
                Err(ToDatasetError::UnsupportedType(value_kind(value)))
            }
        },
    }
}

fn reject_drop_variables(
    options: &ToDatasetOptions,
    node_kind: NodeKind,
) -> Result<(), ToDatasetError> {
    if options.drop_variables.is_some() {
        Err(ToDatasetError::UnsupportedParameter {
            parameter: "drop_variables",
            node_kind,
        })
    } else {
        Ok(())
    }
}

fn deserialize_node<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
    kind: NodeKind,
) -> Result<T, ToDatasetError> {
    serde_json::from_value(value.clone()).map_err(|source| ToDatasetError::Invalid { kind, source })
}

fn value_kind(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "a JSON null".to_string(),
        serde_json::Value::Bool(_) => "a JSON boolean".to_string(),
        serde_json::Value::Number(_) => "a JSON number".to_string(),
        serde_json::Value::String(_) => "a JSON string".to_string(),
        serde_json::Value::Array(_) => "a JSON array".to_string(),
        serde_json::Value::Object(object) => {
            object.get("type").and_then(serde_json::Value::as_str).map_or_else(
                || "a JSON object with no type tag".to_string(),
                |tag| format!("a JSON object of type {tag}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_inputs_fail_with_a_type_error() {
        let registry = EngineRegistry::new();
        let options = ToDatasetOptions::new();

        let string = serde_json::json!("foo");
        let err = to_dataset(StacInput::Value(&string), &options, &registry).unwrap_err();
        assert!(matches!(err, ToDatasetError::UnsupportedType(_)));
        assert_eq!(
            err.to_string(),
            "cannot materialize a dataset from a JSON string"
        );

        let collection = serde_json::json!({"type": "Collection", "id": "c"});
        let err = to_dataset(StacInput::Value(&collection), &options, &registry).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot materialize a dataset from a JSON object of type Collection"
        );
    }

    #[test]
    fn drop_variables_is_rejected_for_assets() {
        let registry = EngineRegistry::new();
        let options = ToDatasetOptions::new().with_drop_variables(["x"]);
        let asset = Asset::new("https://example.com/data.tif");
        let err = to_dataset(
            StacInput::Asset(AssetRef::standalone(&asset)),
            &options,
            &registry,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ToDatasetError::UnsupportedParameter {
                parameter: "drop_variables",
                node_kind: NodeKind::Asset,
            }
        ));
    }

    #[test]
    fn malformed_item_value_is_invalid() {
        let registry = EngineRegistry::new();
        let options = ToDatasetOptions::new();
        // Classifies as an item but `assets` does not deserialize.
        let value = serde_json::json!({"type": "Feature", "id": "a", "assets": 3});
        let err = to_dataset(StacInput::Value(&value), &options, &registry).unwrap_err();
        assert!(matches!(
            err,
            ToDatasetError::Invalid {
                kind: NodeKind::Item,
                ..
            }
        ));
    }
}

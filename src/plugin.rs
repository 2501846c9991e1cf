//! Compile-time registration points.
//!
//! Engines and dataset backends are registered at compile time using the
//! [inventory] crate.
//!
//! An [`EnginePlugin`] contributes one engine capability;
//! [`EngineRegistry::from_plugins`](crate::engine::EngineRegistry::from_plugins)
//! collects every submitted plugin into a registry. A [`BackendPlugin`] exposes a
//! whole-dataset opener to an embedding application: it pairs a cheap
//! can-open guess with an open function, so a host holding a set of backends can
//! route an input to the first backend that claims it. This crate submits its own
//! `stac` backend, which claims every recognised catalog node kind and opens it
//! through [`to_dataset`](crate::materialize::to_dataset).

use std::sync::Arc;

use crate::catalog::{classify, NodeKind, StacInput};
use crate::dataset::Dataset;
use crate::engine::{
    BandStacker, DatasetOpener, Fetcher, ItemStacker, ReferenceOpener, RepositoryEngine,
};
use crate::materialize::{to_dataset, ToDatasetError, ToDatasetOptions};

/// An engine contributed by an [`EnginePlugin`], tagged with the capability slot
/// it fills.
#[non_exhaustive]
pub enum EngineInstance {
    /// An item-sequence stacking engine.
    OdcStac(Arc<dyn ItemStacker>),
    /// A band-stacking engine.
    Stackstac(Arc<dyn BandStacker>),
    /// A cloud-optimized raster opener.
    Raster(Arc<dyn DatasetOpener>),
    /// A chunked-array-store opener.
    Zarr(Arc<dyn DatasetOpener>),
    /// The fallback opener.
    Default(Arc<dyn DatasetOpener>),
    /// A reference-descriptor opener.
    Reference(Arc<dyn ReferenceOpener>),
    /// A versioned-repository engine.
    Repository(Arc<dyn RepositoryEngine>),
    /// A byte fetcher.
    Fetch(Arc<dyn Fetcher>),
}

/// A compile-time engine registration.
pub struct EnginePlugin {
    /// The identifier of the plugin.
    identifier: &'static str,
    /// Create the engine and name its capability slot.
    create_fn: fn() -> EngineInstance,
}

inventory::collect!(EnginePlugin);

impl EnginePlugin {
    /// Create a new engine plugin for registration.
    pub const fn new(identifier: &'static str, create_fn: fn() -> EngineInstance) -> Self {
        Self {
            identifier,
            create_fn,
        }
    }

    /// Create the registered engine.
    #[must_use]
    pub fn create(&self) -> EngineInstance {
        (self.create_fn)()
    }

    /// Returns the identifier of the plugin.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }
}

/// A compile-time dataset backend registration.
pub struct BackendPlugin {
    /// The identifier of the backend.
    identifier: &'static str,
    /// Tests whether the backend claims an input.
    guess_can_open_fn: fn(&StacInput<'_>) -> bool,
    /// Open a claimed input as a dataset.
    open_fn:
        fn(StacInput<'_>, &ToDatasetOptions, &crate::engine::EngineRegistry) -> Result<Dataset, ToDatasetError>,
}

inventory::collect!(BackendPlugin);

impl BackendPlugin {
    /// Create a new backend plugin for registration.
    pub const fn new(
        identifier: &'static str,
        guess_can_open_fn: fn(&StacInput<'_>) -> bool,
        open_fn: fn(
            StacInput<'_>,
            &ToDatasetOptions,
            &crate::engine::EngineRegistry,
        ) -> Result<Dataset, ToDatasetError>,
    ) -> Self {
        Self {
            identifier,
            guess_can_open_fn,
            open_fn,
        }
    }

    /// Returns true if this backend claims `input`.
    #[must_use]
    pub fn guess_can_open(&self, input: &StacInput<'_>) -> bool {
        (self.guess_can_open_fn)(input)
    }

    /// Open `input` as a dataset.
    ///
    /// # Errors
    ///
    /// Returns a [`ToDatasetError`] if the open fails; opening an input the
    /// backend does not claim fails with [`ToDatasetError::UnsupportedType`].
    pub fn open(
        &self,
        input: StacInput<'_>,
        options: &ToDatasetOptions,
        registry: &crate::engine::EngineRegistry,
    ) -> Result<Dataset, ToDatasetError> {
        (self.open_fn)(input, options, registry)
    }

    /// Returns the identifier of the backend.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }
}

/// Returns the registered backend with `identifier`, if any.
#[must_use]
pub fn backend(identifier: &str) -> Option<&'static BackendPlugin> {
    inventory::iter::<BackendPlugin>
        .into_iter()
        .find(|backend| backend.identifier() == identifier)
}

fn stac_guess_can_open(input: &StacInput<'_>) -> bool {
    classify(input) != NodeKind::Unknown
}

inventory::submit! {
    BackendPlugin::new("stac", stac_guess_can_open, to_dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_stac_backend_is_registered() {
        let stac = backend("stac").unwrap();
        assert_eq!(stac.identifier(), "stac");
        assert!(backend("netcdf4").is_none());
    }

    #[test]
    fn the_stac_backend_claims_catalog_nodes_only() {
        let stac = backend("stac").unwrap();

        let item = serde_json::json!({"type": "Feature", "id": "a", "properties": {}, "assets": {}});
        assert!(stac.guess_can_open(&StacInput::Value(&item)));

        let asset = serde_json::json!({"href": "https://example.com/data.tif"});
        assert!(stac.guess_can_open(&StacInput::Value(&asset)));

        let path = serde_json::json!("data/scene.tif");
        assert!(!stac.guess_can_open(&StacInput::Value(&path)));
    }
}

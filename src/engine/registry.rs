//! Engine capability resolution.

use std::sync::Arc;

use thiserror::Error;

use crate::engine::{
    BandStacker, DatasetOpener, Fetcher, ItemStacker, ReferenceOpener, RepositoryEngine,
};
use crate::plugin::EngineInstance;

/// The engine capabilities an [`EngineRegistry`] can resolve.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Capability {
    /// The item-sequence stacking engine.
    OdcStac,
    /// The band-stacking engine.
    Stackstac,
    /// The cloud-optimized raster opener.
    Raster,
    /// The chunked-array-store opener.
    Zarr,
    /// The fallback opener with no forced engine selection.
    Default,
    /// The reference-descriptor virtualization opener.
    Reference,
    /// The versioned virtual-chunk repository engine.
    Repository,
    /// The raw href content fetcher.
    Fetch,
}

impl Capability {
    /// The capability name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OdcStac => "odc.stac",
            Self::Stackstac => "stackstac",
            Self::Raster => "raster",
            Self::Zarr => "zarr",
            Self::Default => "default",
            Self::Reference => "reference",
            Self::Repository => "repository",
            Self::Fetch => "fetch",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A required capability has no registered engine.
///
/// Callers use this failure to drive fallback selection; the registry itself
/// implements no fallback policy.
#[derive(Debug, Clone, Error)]
#[error("missing capability {capability}")]
pub struct MissingCapabilityError {
    capability: Capability,
}

impl MissingCapabilityError {
    /// Create a new [`MissingCapabilityError`] for `capability`.
    #[must_use]
    pub const fn new(capability: Capability) -> Self {
        Self { capability }
    }

    /// The missing capability.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }
}

/// A set of engines, one optional slot per [`Capability`].
///
/// Build one explicitly with the `with_*` methods, or from the compile-time
/// [plugin registrations](crate::plugin) with [`EngineRegistry::from_plugins`].
/// Every accessor returns a typed [`MissingCapabilityError`] when the slot is empty.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    odc_stac: Option<Arc<dyn ItemStacker>>,
    stackstac: Option<Arc<dyn BandStacker>>,
    raster: Option<Arc<dyn DatasetOpener>>,
    zarr: Option<Arc<dyn DatasetOpener>>,
    default: Option<Arc<dyn DatasetOpener>>,
    reference: Option<Arc<dyn ReferenceOpener>>,
    repository: Option<Arc<dyn RepositoryEngine>>,
    fetch: Option<Arc<dyn Fetcher>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from the engines registered at compile time with
    /// [`EnginePlugin`](crate::plugin::EnginePlugin).
    ///
    /// The last registration per capability wins.
    /// With the `http` feature, the `fetch` slot falls back to
    /// [`HttpFetcher`](crate::engine::HttpFetcher) if no fetcher was registered.
    #[must_use]
    pub fn from_plugins() -> Self {
        let mut registry = Self::new();
        for plugin in inventory::iter::<crate::plugin::EnginePlugin> {
            registry.insert(plugin.create());
        }
        #[cfg(feature = "http")]
        if registry.fetch.is_none() {
            registry.fetch = Some(Arc::new(crate::engine::HttpFetcher::new()));
        }
        registry
    }

    fn insert(&mut self, instance: EngineInstance) {
        match instance {
            EngineInstance::OdcStac(engine) => self.odc_stac = Some(engine),
            EngineInstance::Stackstac(engine) => self.stackstac = Some(engine),
            EngineInstance::Raster(engine) => self.raster = Some(engine),
            EngineInstance::Zarr(engine) => self.zarr = Some(engine),
            EngineInstance::Default(engine) => self.default = Some(engine),
            EngineInstance::Reference(engine) => self.reference = Some(engine),
            EngineInstance::Repository(engine) => self.repository = Some(engine),
            EngineInstance::Fetch(engine) => self.fetch = Some(engine),
        }
    }

    /// Set the item-sequence stacking engine.
    #[must_use]
    pub fn with_odc_stac(mut self, engine: Arc<dyn ItemStacker>) -> Self {
        self.odc_stac = Some(engine);
        self
    }

    /// Set the band-stacking engine.
    #[must_use]
    pub fn with_stackstac(mut self, engine: Arc<dyn BandStacker>) -> Self {
        self.stackstac = Some(engine);
        self
    }

    /// Set the raster opener.
    #[must_use]
    pub fn with_raster(mut self, engine: Arc<dyn DatasetOpener>) -> Self {
        self.raster = Some(engine);
        self
    }

    /// Set the chunked-array-store opener.
    #[must_use]
    pub fn with_zarr(mut self, engine: Arc<dyn DatasetOpener>) -> Self {
        self.zarr = Some(engine);
        self
    }

    /// Set the fallback opener.
    #[must_use]
    pub fn with_default(mut self, engine: Arc<dyn DatasetOpener>) -> Self {
        self.default = Some(engine);
        self
    }

    /// Set the reference-descriptor opener.
    #[must_use]
    pub fn with_reference(mut self, engine: Arc<dyn ReferenceOpener>) -> Self {
        self.reference = Some(engine);
        self
    }

    /// Set the repository engine.
    #[must_use]
    pub fn with_repository(mut self, engine: Arc<dyn RepositoryEngine>) -> Self {
        self.repository = Some(engine);
        self
    }

    /// Set the fetcher.
    #[must_use]
    pub fn with_fetch(mut self, engine: Arc<dyn Fetcher>) -> Self {
        self.fetch = Some(engine);
        self
    }

    /// Returns true if `capability` has a registered engine.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::OdcStac => self.odc_stac.is_some(),
            Capability::Stackstac => self.stackstac.is_some(),
            Capability::Raster => self.raster.is_some(),
            Capability::Zarr => self.zarr.is_some(),
            Capability::Default => self.default.is_some(),
            Capability::Reference => self.reference.is_some(),
            Capability::Repository => self.repository.is_some(),
            Capability::Fetch => self.fetch.is_some(),
        }
    }

    /// Resolve the item-sequence stacking engine.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn odc_stac(&self) -> Result<&dyn ItemStacker, MissingCapabilityError> {
        self.odc_stac
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::OdcStac))
    }

    /// Resolve the band-stacking engine.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn stackstac(&self) -> Result<&dyn BandStacker, MissingCapabilityError> {
        self.stackstac
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Stackstac))
    }

    /// Resolve the raster opener.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn raster(&self) -> Result<&dyn DatasetOpener, MissingCapabilityError> {
        self.raster
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Raster))
    }

    /// Resolve the chunked-array-store opener.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn zarr(&self) -> Result<&dyn DatasetOpener, MissingCapabilityError> {
        self.zarr
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Zarr))
    }

    /// Resolve the fallback opener.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn default_opener(&self) -> Result<&dyn DatasetOpener, MissingCapabilityError> {
        self.default
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Default))
    }

    /// Resolve the reference-descriptor opener.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn reference(&self) -> Result<&dyn ReferenceOpener, MissingCapabilityError> {
        self.reference
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Reference))
    }

    /// Resolve the repository engine.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn repository(&self) -> Result<&dyn RepositoryEngine, MissingCapabilityError> {
        self.repository
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Repository))
    }

    /// Resolve the fetcher.
    ///
    /// # Errors
    ///
    /// Returns a [`MissingCapabilityError`] if no engine is registered.
    pub fn fetch(&self) -> Result<&dyn Fetcher, MissingCapabilityError> {
        self.fetch
            .as_deref()
            .ok_or(MissingCapabilityError::new(Capability::Fetch))
    }
}

impl core::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let capabilities = [
            Capability::OdcStac,
            Capability::Stackstac,
            Capability::Raster,
            Capability::Zarr,
            Capability::Default,
            Capability::Reference,
            Capability::Repository,
            Capability::Fetch,
        ];
        f.debug_list()
            .entries(capabilities.iter().filter(|c| self.has(**c)))
            .finish()
    }
}

//! Pluggable backend engine interfaces.
//!
//! This crate decides *which* storage subsystem to invoke and *with what arguments*;
//! the subsystems themselves sit behind the object-safe traits in this module:
//!  - [`Fetcher`]: raw href content retrieval (reference files),
//!  - [`DatasetOpener`]: opening a single href as a dataset (raster, chunked store, or
//!    a default opener with no forced engine),
//!  - [`ReferenceOpener`]: opening a [`ReferenceDescriptor`] as a chunked store,
//!  - [`ItemStacker`] / [`BandStacker`]: the two mutually exclusive stacking engines,
//!  - [`RepositoryEngine`] / [`Repository`] / [`Session`]: versioned virtual-chunk
//!    repositories.
//!
//! Engines are looked up by capability through an [`EngineRegistry`]; a missing
//! capability is a typed failure so callers can choose fallback behaviour
//! instead of crashing.

mod registry;

#[cfg(feature = "http")]
mod http;

use bytes::Bytes;
use indexmap::IndexMap;
use thiserror::Error;

use crate::catalog::Item;
use crate::dataset::{BandStack, Dataset};
use crate::reference::ReferenceDescriptor;
use crate::repository::{RepositoryStorage, VersionRef, VirtualChunkConfig};

pub use registry::{Capability, EngineRegistry, MissingCapabilityError};

#[cfg(feature = "http")]
pub use http::HttpFetcher;

/// Open options forwarded to an engine, as a JSON map.
///
/// Reserved keys interpreted along the way: `engine`, `chunks`, `consolidated`,
/// `zarr_format`, and `storage_options`.
pub type OpenKwargs = serde_json::Map<String, serde_json::Value>;

/// A URL patch/sign hook.
///
/// Takes an href and returns an altered version, normally used to sign URLs before
/// data is read from them.
pub type UrlPatcher = std::sync::Arc<dyn Fn(&str) -> String + Send + Sync>;

/// An error from a delegated engine, propagated unmodified.
///
/// This crate adds no retry layer: engine errors surface synchronously to the caller
/// of the top-level dispatch call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The engine does not support the requested operation.
    #[error("{0}")]
    Unsupported(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for EngineError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for EngineError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        Self::Other(err.to_string())
    }
}

/// Retrieves the raw content of an href.
pub trait Fetcher: Send + Sync {
    /// Fetch the content at `href`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the href is unreachable or the fetch fails.
    fn fetch(&self, href: &str) -> Result<Bytes, EngineError>;
}

/// Opens a single href as a chunked dataset.
///
/// An [`EngineRegistry`] holds up to three openers: one raster-capable, one for
/// chunked array stores, and one default opener with no forced engine selection.
pub trait DatasetOpener: Send + Sync {
    /// Open the dataset at `href` with `options`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the href cannot be opened.
    fn open(&self, href: &str, options: &OpenKwargs) -> Result<Dataset, EngineError>;
}

/// Opens a reference descriptor as a chunked store.
pub trait ReferenceOpener: Send + Sync {
    /// Open `references` as a chunked dataset with `options`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if any referenced location cannot be read.
    fn open_references(
        &self,
        references: &ReferenceDescriptor,
        options: &OpenKwargs,
    ) -> Result<Dataset, EngineError>;
}

/// Parameters passed to an [`ItemStacker`].
#[derive(Clone, Default)]
pub struct StackParams {
    /// Chunk sizes per spatial dimension.
    pub chunks: IndexMap<String, u64>,
    /// URL patch hook, threaded through as a backend-native parameter.
    pub patch_url: Option<UrlPatcher>,
    /// Further backend-native parameters.
    pub kwargs: OpenKwargs,
}

/// A stacking engine taking an ordered item sequence (backend `odc.stac`).
///
/// The output has one variable per band; the item order becomes the order along
/// the scene/time axis.
pub trait ItemStacker: Send + Sync {
    /// Stack `items` into a dataset.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if stacking fails.
    fn load(&self, items: &[Item], params: &StackParams) -> Result<Dataset, EngineError>;
}

/// A stacking engine producing a band-dimension stack (backend `stackstac`).
///
/// This backend resolves hrefs eagerly at stack time, so any URL patching must be
/// applied to the items before calling [`stack`](BandStacker::stack).
pub trait BandStacker: Send + Sync {
    /// Stack `items` into one labeled array with a band dimension.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if stacking fails.
    fn stack(&self, items: &[Item], kwargs: &OpenKwargs) -> Result<BandStack, EngineError>;
}

/// A versioned virtual-chunk repository engine.
pub trait RepositoryEngine: Send + Sync {
    /// Open the repository at `storage`, registering `virtual_config`'s chunk
    /// containers and credentials when present.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the repository cannot be opened.
    fn open(
        &self,
        storage: &RepositoryStorage,
        virtual_config: Option<&VirtualChunkConfig>,
    ) -> Result<Box<dyn Repository>, EngineError>;
}

/// An open versioned repository.
pub trait Repository {
    /// List the repository's branch names.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the listing fails.
    fn list_branches(&self) -> Result<Vec<String>, EngineError>;

    /// List the repository's tag names.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the listing fails.
    fn list_tags(&self) -> Result<Vec<String>, EngineError>;

    /// Create a read-only session at `version`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the version does not resolve or the session
    /// cannot be created.
    fn readonly_session(&self, version: &VersionRef) -> Result<Box<dyn Session>, EngineError>;
}

/// A read-only view of a repository at a resolved branch, tag, or snapshot.
pub trait Session {
    /// Open the session's store as a chunked dataset with `options`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the store cannot be opened.
    fn open_dataset(&self, options: &OpenKwargs) -> Result<Dataset, EngineError>;
}

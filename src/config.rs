//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The two recognised stacking libraries, in the order they are preferred when no
/// explicit selection is made.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StackingLibrary {
    /// The item-sequence stacking engine (`odc.stac`).
    OdcStac,
    /// The band-stacking engine (`stackstac`).
    Stackstac,
}

impl StackingLibrary {
    /// The stacking library name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OdcStac => "odc.stac",
            Self::Stackstac => "stackstac",
        }
    }
}

impl core::fmt::Display for StackingLibrary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StackingLibrary {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "odc.stac" => Ok(Self::OdcStac),
            "stackstac" => Ok(Self::Stackstac),
            _ => Err(()),
        }
    }
}

/// Global configuration options for the `stac-dataset` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with
/// [`global_config_mut`].
///
/// ## Default Branch
/// > default: `"main"`
///
/// The branch a repository asset without a version selector is opened at.
///
/// ## Concatenation Dimension
/// > default: `"time"`
///
/// The axis reference descriptors of multiple items are combined along.
///
/// ## Spatial Chunk Size
/// > default: `1024`
///
/// The default chunk size along the two raster dimensions passed to the
/// item-sequence stacking engine.
///
/// ## Stacking Preference
/// > default: `[odc.stac, stackstac]`
///
/// The order stacking engines are probed in when no explicit selection is made.
#[derive(Debug, Clone)]
pub struct Config {
    default_branch: String,
    concat_dimension: String,
    spatial_chunk_size: u64,
    stacking_preference: Vec<StackingLibrary>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            concat_dimension: "time".to_string(),
            spatial_chunk_size: 1024,
            stacking_preference: vec![StackingLibrary::OdcStac, StackingLibrary::Stackstac],
        }
    }
}

impl Config {
    /// Get the [default branch](#default-branch) configuration.
    #[must_use]
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Set the [default branch](#default-branch) configuration.
    pub fn set_default_branch(&mut self, default_branch: impl Into<String>) {
        self.default_branch = default_branch.into();
    }

    /// Get the [concatenation dimension](#concatenation-dimension) configuration.
    #[must_use]
    pub fn concat_dimension(&self) -> &str {
        &self.concat_dimension
    }

    /// Set the [concatenation dimension](#concatenation-dimension) configuration.
    pub fn set_concat_dimension(&mut self, concat_dimension: impl Into<String>) {
        self.concat_dimension = concat_dimension.into();
    }

    /// Get the [spatial chunk size](#spatial-chunk-size) configuration.
    #[must_use]
    pub const fn spatial_chunk_size(&self) -> u64 {
        self.spatial_chunk_size
    }

    /// Set the [spatial chunk size](#spatial-chunk-size) configuration.
    pub fn set_spatial_chunk_size(&mut self, spatial_chunk_size: u64) {
        self.spatial_chunk_size = spatial_chunk_size;
    }

    /// Get the [stacking preference](#stacking-preference) configuration.
    #[must_use]
    pub fn stacking_preference(&self) -> &[StackingLibrary] {
        &self.stacking_preference
    }

    /// Set the [stacking preference](#stacking-preference) configuration.
    pub fn set_stacking_preference(&mut self, stacking_preference: Vec<StackingLibrary>) {
        self.stacking_preference = stacking_preference;
    }
}

fn global_config_lock() -> &'static RwLock<Config> {
    static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Returns a reference to the global configuration.
///
/// # Panics
///
/// Panics if the underlying lock is poisoned.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    global_config_lock().read().unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
///
/// Panics if the underlying lock is poisoned.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    global_config_lock().write().unwrap()
}

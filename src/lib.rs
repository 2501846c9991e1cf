//! A rust library that resolves [STAC](https://stacspec.org) catalog metadata into lazily loaded, chunked, multidimensional datasets.
//!
//! STAC catalogs describe remotely stored geospatial array data in several shapes:
//! single raster files, chunked array stores, kerchunk-style virtual reference sets,
//! and versioned virtual-chunk repositories.
//! This crate implements the resolution and materialization dispatcher that turns any of
//! those descriptions into one [`Dataset`](crate::dataset::Dataset) abstraction:
//!  - type-directed dispatch over catalog object shapes ([`catalog`]),
//!  - media-type/role-directed dispatch over storage representations ([`materialize`]),
//!  - kerchunk reference translation and combination ([`reference`]),
//!  - versioned-repository configuration resolution ([`repository`]).
//!
//! The crate performs no raster decoding, chunked I/O, or HTTP signing itself.
//! Those concerns live behind the engine traits in [`engine`], which embedders implement
//! and register through [`plugin`] or supply directly via an
//! [`EngineRegistry`](crate::engine::EngineRegistry).
//!
//! ## Example
//! ```rust,ignore
//! use stac_dataset::{catalog::StacInput, engine::EngineRegistry, materialize::to_dataset};
//!
//! let registry = EngineRegistry::from_plugins();
//! let item: stac_dataset::catalog::Item = serde_json::from_str(&item_json)?;
//! let dataset = to_dataset(
//!     StacInput::Item(&item),
//!     &stac_dataset::materialize::ToDatasetOptions::default(),
//!     &registry,
//! )?;
//! println!("{:?}", dataset.dims());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//!  - `http` (default): a blocking HTTP [`Fetcher`](crate::engine::Fetcher) used to
//!    retrieve reference-file content.
//!
//! ## Licence
//! `stac-dataset` is licensed under either of
//!  - the Apache License, Version 2.0 or <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod materialize;
pub mod plugin;
pub mod reference;
pub mod repository;
pub mod version;

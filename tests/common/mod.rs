#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use stac_dataset::catalog::{media_type, Asset, Item, ItemCollection, ItemSearch};
use stac_dataset::dataset::{BandStack, DataArray, Dataset};
use stac_dataset::engine::{
    BandStacker, DatasetOpener, EngineError, Fetcher, ItemStacker, OpenKwargs, ReferenceOpener,
    Repository, RepositoryEngine, Session, StackParams,
};
use stac_dataset::reference::ReferenceDescriptor;
use stac_dataset::repository::{RepositoryStorage, VersionRef, VirtualChunkConfig};

use indexmap::IndexMap;
use serde_json::json;

/// A scene item with `red` and `blue` cloud-optimized raster assets.
pub fn scene(index: usize) -> Item {
    let mut item = Item::new(format!("scene-{index}")).with_property(
        "datetime",
        json!(format!("2024-01-{:02}T00:00:00Z", index + 1)),
    );
    for band in ["red", "blue"] {
        item = item.with_asset(
            band,
            Asset::new(format!("https://example.com/scene-{index}/{band}.tif"))
                .with_media_type(media_type::COG)
                .with_roles(["data"]),
        );
    }
    item
}

/// A dataset opener that records every call and reports which slot answered.
pub struct RecordingOpener {
    name: &'static str,
    /// Recorded `(href, merged options)` pairs, in call order.
    pub calls: Mutex<Vec<(String, OpenKwargs)>>,
}

impl RecordingOpener {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: Mutex::new(Vec::new()),
        })
    }
}

impl DatasetOpener for RecordingOpener {
    fn open(&self, href: &str, options: &OpenKwargs) -> Result<Dataset, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((href.to_string(), options.clone()));
        Ok(Dataset::new()
            .with_variable(
                "data",
                DataArray::new(["y", "x"], [512, 512]).with_chunks([512, 512]),
            )
            .with_attr("opened_by", json!(self.name))
            .with_attr("href", json!(href)))
    }
}

/// A reference opener that records the descriptor it was handed.
#[derive(Default)]
pub struct RecordingReferenceOpener {
    pub calls: Mutex<Vec<(ReferenceDescriptor, OpenKwargs)>>,
}

impl ReferenceOpener for RecordingReferenceOpener {
    fn open_references(
        &self,
        references: &ReferenceDescriptor,
        options: &OpenKwargs,
    ) -> Result<Dataset, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((references.clone(), options.clone()));
        let mut dataset = Dataset::new().with_attr("opened_by", json!("reference"));
        for variable in references.variables() {
            dataset = dataset.with_variable(variable, DataArray::new(["time"], [1]));
        }
        Ok(dataset)
    }
}

/// An item-sequence stacker: one variable per asset key, plus a time dimension.
#[derive(Default)]
pub struct RecordingItemStacker {
    pub calls: Mutex<Vec<(Vec<Item>, StackParams)>>,
}

impl ItemStacker for RecordingItemStacker {
    fn load(&self, items: &[Item], params: &StackParams) -> Result<Dataset, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((items.to_vec(), params.clone()));
        let first = items.first().ok_or("cannot stack zero items")?;
        let times = items
            .iter()
            .map(|item| item.property("datetime").cloned().unwrap_or(serde_json::Value::Null))
            .collect();
        let len = items.len() as u64;
        let spatial = |dim: &str| params.chunks.get(dim).copied().unwrap_or(512);
        let mut dataset = Dataset::new()
            .with_coord("time", DataArray::coordinate("time", times))
            .with_attr("opened_by", json!("odc.stac"));
        for name in first.assets.keys() {
            dataset = dataset.with_variable(
                name,
                DataArray::new(["time", "y", "x"], [len, 2048, 2048])
                    .with_chunks([1, spatial("y"), spatial("x")]),
            );
        }
        Ok(dataset)
    }
}

/// A band stacker: one array spanning `(time, band, y, x)`.
#[derive(Default)]
pub struct RecordingBandStacker {
    pub calls: Mutex<Vec<(Vec<Item>, OpenKwargs)>>,
}

impl BandStacker for RecordingBandStacker {
    fn stack(&self, items: &[Item], kwargs: &OpenKwargs) -> Result<BandStack, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((items.to_vec(), kwargs.clone()));
        let first = items.first().ok_or("cannot stack zero items")?;
        let bands: Vec<serde_json::Value> =
            first.assets.keys().map(|name| json!(name)).collect();
        let times = items
            .iter()
            .map(|item| item.property("datetime").cloned().unwrap_or(serde_json::Value::Null))
            .collect();
        Ok(BandStack {
            dims: ["time", "band", "y", "x"].map(String::from).to_vec(),
            shape: vec![items.len() as u64, bands.len() as u64, 2048, 2048],
            chunks: Some(vec![1, 1, 1024, 1024]),
            band_dim: "band".to_string(),
            coords: IndexMap::from([
                ("band".to_string(), DataArray::coordinate("band", bands)),
                ("time".to_string(), DataArray::coordinate("time", times)),
                ("epsg".to_string(), DataArray::scalar(json!(32633))),
            ]),
            attrs: serde_json::Map::new(),
        })
    }
}

/// A fetcher serving canned content, recording the hrefs it was asked for.
#[derive(Default)]
pub struct CannedFetcher {
    content: IndexMap<String, Vec<u8>>,
    pub fetched: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn serving(href: impl Into<String>, content: impl Into<Vec<u8>>) -> Arc<Self> {
        let mut fetcher = Self::default();
        fetcher.content.insert(href.into(), content.into());
        Arc::new(fetcher)
    }
}

impl Fetcher for CannedFetcher {
    fn fetch(&self, href: &str) -> Result<bytes::Bytes, EngineError> {
        self.fetched.lock().unwrap().push(href.to_string());
        self.content
            .get(href)
            .map(|content| bytes::Bytes::from(content.clone()))
            .ok_or_else(|| EngineError::from(format!("no canned content for {href}")))
    }
}

/// A repository engine recording storage resolution, session versions, and open
/// options.
#[derive(Default)]
pub struct RecordingRepositoryEngine {
    pub opens: Mutex<Vec<(RepositoryStorage, Option<VirtualChunkConfig>)>>,
    pub sessions: Arc<Mutex<Vec<(VersionRef, OpenKwargs)>>>,
}

impl RepositoryEngine for RecordingRepositoryEngine {
    fn open(
        &self,
        storage: &RepositoryStorage,
        virtual_config: Option<&VirtualChunkConfig>,
    ) -> Result<Box<dyn Repository>, EngineError> {
        self.opens
            .lock()
            .unwrap()
            .push((storage.clone(), virtual_config.cloned()));
        Ok(Box::new(FixedRepository {
            sessions: Arc::clone(&self.sessions),
        }))
    }
}

struct FixedRepository {
    sessions: Arc<Mutex<Vec<(VersionRef, OpenKwargs)>>>,
}

impl Repository for FixedRepository {
    fn list_branches(&self) -> Result<Vec<String>, EngineError> {
        Ok(vec!["main".to_string(), "dev".to_string()])
    }

    fn list_tags(&self) -> Result<Vec<String>, EngineError> {
        Ok(vec!["v1.2".to_string()])
    }

    fn readonly_session(&self, version: &VersionRef) -> Result<Box<dyn Session>, EngineError> {
        Ok(Box::new(FixedSession {
            version: version.clone(),
            sessions: Arc::clone(&self.sessions),
        }))
    }
}

struct FixedSession {
    version: VersionRef,
    sessions: Arc<Mutex<Vec<(VersionRef, OpenKwargs)>>>,
}

impl Session for FixedSession {
    fn open_dataset(&self, options: &OpenKwargs) -> Result<Dataset, EngineError> {
        self.sessions
            .lock()
            .unwrap()
            .push((self.version.clone(), options.clone()));
        Ok(Dataset::new()
            .with_variable("tasmax", DataArray::new(["time", "lat", "lon"], [2, 600, 1440]))
            .with_attr("opened_by", json!("repository"))
            .with_attr("version", json!(self.version.to_string())))
    }
}

/// A search that yields a fixed item collection.
pub struct FixedSearch {
    pub items: Vec<Item>,
}

impl ItemSearch for FixedSearch {
    fn item_collection(&self) -> Result<ItemCollection, EngineError> {
        Ok(ItemCollection::from(self.items.clone()))
    }
}

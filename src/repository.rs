//! Versioned virtual-chunk repository resolution.
//!
//! A repository-backed asset is resolved in three stages:
//!  1. [`resolve_storage`]: the storage backend (bucket/prefix/region/credentials) from
//!     the owning collection's `storage:schemes` and the asset's `storage:refs`,
//!  2. [`resolve_virtual_config`]: for assets with the `"virtual"` role, the
//!     virtual-chunk container wiring from `vrt:hrefs` and the pointed-at data asset's
//!     own storage scheme,
//!  3. [`resolve_version`]: the requested version string against the repository's
//!     branches, then tags, then snapshot identifiers.
//!
//! All "exactly one" cardinality violations and unsupported scheme types are fatal
//! configuration errors: they indicate malformed catalog metadata, which retrying
//! cannot fix.
//!
//! [`open_readonly`] drives the three stages and opens the resulting session store as
//! a chunked dataset with the store format pinned to 3 and consolidated metadata
//! disabled (the repository is assumed internally consistent).

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::{fields, role, Asset, Collection};
use crate::config::global_config;
use crate::dataset::Dataset;
use crate::engine::{
    EngineError, EngineRegistry, MissingCapabilityError, OpenKwargs, Repository,
};

/// The one supported storage scheme type.
pub const SCHEME_AWS_S3: &str = "aws-s3";

/// A repository resolution error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The asset has no reachable owner, or the owner declares no `storage:schemes`.
    #[error("the asset's owner declares no storage:schemes")]
    MissingSchemes,
    /// `storage:refs` is not a list of scheme references.
    #[error("storage:refs must be a list of scheme reference strings")]
    InvalidStorageRefs,
    /// An asset must reference exactly one storage scheme.
    #[error("expected exactly one storage:ref per asset, found {count}")]
    StorageRefCardinality {
        /// The number of references found.
        count: usize,
    },
    /// A virtual asset must declare exactly one virtual-chunk pointer.
    #[error("expected exactly one vrt:href per virtual asset, found {count}")]
    VirtualHrefCardinality {
        /// The number of pointers found.
        count: usize,
    },
    /// A referenced scheme is not declared by the owning collection.
    #[error("storage scheme {reference} is not declared by the owning collection")]
    UnknownScheme {
        /// The undeclared scheme reference.
        reference: String,
    },
    /// A declared scheme does not deserialize.
    #[error("storage scheme {reference} is invalid: {source}")]
    InvalidScheme {
        /// The scheme reference.
        reference: String,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Only `aws-s3` buckets are supported.
    #[error("storage scheme type {scheme_type} is not supported, only {SCHEME_AWS_S3} is")]
    UnsupportedSchemeType {
        /// The declared scheme type.
        scheme_type: String,
    },
    /// The scheme declares no bucket.
    #[error("storage scheme {reference} declares no bucket")]
    MissingBucket {
        /// The scheme reference.
        reference: String,
    },
    /// The asset href does not lie inside the scheme's bucket.
    #[error("asset href {href} is not inside bucket {bucket}")]
    HrefOutsideBucket {
        /// The asset href.
        href: String,
        /// The scheme bucket.
        bucket: String,
    },
    /// A virtual-chunk pointer names an asset the owner does not have.
    #[error("virtual asset points at unknown data asset {key}")]
    MissingDataAsset {
        /// The pointed-at asset name.
        key: String,
    },
    /// A required engine is not registered.
    #[error(transparent)]
    MissingCapability(#[from] MissingCapabilityError),
    /// An engine failure, propagated unmodified.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A storage scheme declared under a collection's `storage:schemes`.
#[derive(Deserialize, Clone, PartialEq, Debug)]
pub struct StorageScheme {
    /// The backend type. Only [`SCHEME_AWS_S3`] is supported.
    #[serde(rename = "type")]
    pub scheme_type: String,
    /// The bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// The bucket region.
    pub region: String,
    /// Whether the bucket allows anonymous access.
    #[serde(default)]
    pub anonymous: bool,
}

/// The resolved storage backend of a repository asset.
#[derive(Clone, PartialEq, Debug)]
pub struct RepositoryStorage {
    /// The bucket name.
    pub bucket: String,
    /// The key prefix of the repository within the bucket.
    pub prefix: String,
    /// The bucket region.
    pub region: String,
    /// Whether to access the bucket anonymously.
    pub anonymous: bool,
}

impl RepositoryStorage {
    /// Whether ambient credentials should be loaded from the environment.
    #[must_use]
    pub const fn from_env(&self) -> bool {
        !self.anonymous
    }
}

/// How credentials for a virtual-chunk container are obtained.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CredentialSource {
    /// Anonymous access.
    Anonymous,
    /// Ambient credentials from the environment.
    FromEnv,
}

/// A registered mapping from a logical href prefix to a physical store region.
#[derive(Clone, PartialEq, Debug)]
pub struct VirtualChunkContainer {
    /// The data asset href the container is keyed by.
    pub href: String,
    /// The region of the store the container resolves into.
    pub region: String,
}

/// Virtual-chunk container wiring for a `"virtual"` repository asset.
///
/// The indirection graph has depth and fan-out exactly one: a virtual asset points at
/// one concrete data asset, so the configuration carries one container and one
/// credential entry keyed by the data asset's href.
#[derive(Clone, PartialEq, Debug)]
pub struct VirtualChunkConfig {
    /// The virtual-chunk container.
    pub container: VirtualChunkContainer,
    /// Credentials per container href.
    pub credentials: IndexMap<String, CredentialSource>,
}

/// A resolved repository version: branch, tag, or snapshot identifier.
#[derive(Clone, Eq, PartialEq, Debug, derive_more::Display)]
pub enum VersionRef {
    /// A branch name.
    #[display("branch {_0}")]
    Branch(String),
    /// A tag name.
    #[display("tag {_0}")]
    Tag(String),
    /// A raw snapshot identifier.
    #[display("snapshot {_0}")]
    Snapshot(String),
}

#[derive(Deserialize)]
struct VirtualHref {
    key: String,
}

fn resolve_scheme(
    owner: Option<&Collection>,
    asset: &Asset,
) -> Result<(String, StorageScheme), RepositoryError> {
    let schemes = owner
        .and_then(Collection::storage_schemes)
        .ok_or(RepositoryError::MissingSchemes)?;
    let refs = asset
        .extra_fields
        .get(fields::STORAGE_REFS)
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
    let refs: Vec<String> = serde_json::from_value(refs)
        .map_err(|_| RepositoryError::InvalidStorageRefs)?;
    let [reference] = refs.as_slice() else {
        return Err(RepositoryError::StorageRefCardinality { count: refs.len() });
    };
    let scheme = schemes
        .get(reference)
        .ok_or_else(|| RepositoryError::UnknownScheme {
            reference: reference.clone(),
        })?;
    let scheme: StorageScheme =
        serde_json::from_value(scheme.clone()).map_err(|source| {
            RepositoryError::InvalidScheme {
                reference: reference.clone(),
                source,
            }
        })?;
    if scheme.scheme_type != SCHEME_AWS_S3 {
        return Err(RepositoryError::UnsupportedSchemeType {
            scheme_type: scheme.scheme_type,
        });
    }
    Ok((reference.clone(), scheme))
}

/// Resolve the storage backend of a repository asset.
///
/// The owner must declare `storage:schemes` and the asset must reference exactly one
/// of them via `storage:refs`. The repository prefix is the asset href remainder past
/// `{bucket}/`.
///
/// # Errors
///
/// Returns a [`RepositoryError`] on any cardinality violation, undeclared or invalid
/// scheme, unsupported scheme type, or an href outside the scheme's bucket.
pub fn resolve_storage(
    owner: Option<&Collection>,
    asset: &Asset,
) -> Result<RepositoryStorage, RepositoryError> {
    let (reference, scheme) = resolve_scheme(owner, asset)?;
    let bucket = scheme
        .bucket
        .ok_or(RepositoryError::MissingBucket { reference })?;
    let marker = format!("{bucket}/");
    let (_, prefix) =
        asset
            .href
            .split_once(&marker)
            .ok_or_else(|| RepositoryError::HrefOutsideBucket {
                href: asset.href.clone(),
                bucket: bucket.clone(),
            })?;
    Ok(RepositoryStorage {
        bucket,
        prefix: prefix.to_string(),
        region: scheme.region,
        anonymous: scheme.anonymous,
    })
}

/// Resolve the virtual-chunk container wiring of a `"virtual"` repository asset.
///
/// The asset must declare exactly one `vrt:hrefs` entry naming a sibling data asset on
/// the owner; the data asset's own storage scheme (same exactly-one rule) determines
/// the container region and credential source.
///
/// # Errors
///
/// Returns a [`RepositoryError`] on any cardinality violation, a pointer at an unknown
/// data asset, or an invalid data-asset scheme.
pub fn resolve_virtual_config(
    owner: Option<&Collection>,
    asset: &Asset,
) -> Result<VirtualChunkConfig, RepositoryError> {
    let hrefs = asset
        .extra_fields
        .get(fields::VIRTUAL_HREFS)
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
    let hrefs: Vec<VirtualHref> = serde_json::from_value(hrefs)
        .map_err(|_| RepositoryError::VirtualHrefCardinality { count: 0 })?;
    let [pointer] = hrefs.as_slice() else {
        return Err(RepositoryError::VirtualHrefCardinality { count: hrefs.len() });
    };

    let collection = owner.ok_or(RepositoryError::MissingSchemes)?;
    let data_asset =
        collection
            .asset(&pointer.key)
            .ok_or_else(|| RepositoryError::MissingDataAsset {
                key: pointer.key.clone(),
            })?;
    let (_, data_scheme) = resolve_scheme(owner, data_asset)?;

    let credential = if data_scheme.anonymous {
        CredentialSource::Anonymous
    } else {
        CredentialSource::FromEnv
    };
    Ok(VirtualChunkConfig {
        container: VirtualChunkContainer {
            href: data_asset.href.clone(),
            region: data_scheme.region,
        },
        credentials: IndexMap::from([(data_asset.href.clone(), credential)]),
    })
}

/// Resolve a version selector against a repository.
///
/// The selector is tried against branch names, then tag names, then treated as a raw
/// snapshot identifier. An absent selector opens the default branch
/// ([`Config::default_branch`](crate::config::Config::default_branch)).
///
/// # Errors
///
/// Returns a [`RepositoryError`] if branch or tag listing fails.
pub fn resolve_version(
    repository: &dyn Repository,
    selector: Option<&str>,
) -> Result<VersionRef, RepositoryError> {
    let Some(selector) = selector else {
        return Ok(VersionRef::Branch(global_config().default_branch().to_string()));
    };
    if repository.list_branches()?.iter().any(|b| b == selector) {
        Ok(VersionRef::Branch(selector.to_string()))
    } else if repository.list_tags()?.iter().any(|t| t == selector) {
        Ok(VersionRef::Tag(selector.to_string()))
    } else {
        Ok(VersionRef::Snapshot(selector.to_string()))
    }
}

/// Resolve and open a repository asset as a read-only chunked dataset.
///
/// Runs the three resolution stages, opens a read-only session at the resolved
/// version, and opens the session store with the store format pinned to 3 and
/// consolidated metadata disabled. URL patching does not apply on this path: the
/// repository's own credential model supersedes it.
///
/// # Errors
///
/// Returns a [`RepositoryError`] on any resolution failure, a missing `repository`
/// capability, or an engine failure.
pub fn open_readonly(
    registry: &EngineRegistry,
    owner: Option<&Collection>,
    asset: &Asset,
    options: &OpenKwargs,
) -> Result<Dataset, RepositoryError> {
    let storage = resolve_storage(owner, asset)?;
    let virtual_config = if asset.has_role(role::VIRTUAL) {
        Some(resolve_virtual_config(owner, asset)?)
    } else {
        None
    };

    let repository = registry.repository()?.open(&storage, virtual_config.as_ref())?;

    let selector = asset
        .extra_fields
        .get(fields::VERSION)
        .and_then(serde_json::Value::as_str);
    let version = resolve_version(&*repository, selector)?;
    let session = repository.readonly_session(&version)?;

    let mut options = options.clone();
    options.insert("zarr_format".to_string(), serde_json::json!(3));
    options.insert("consolidated".to_string(), serde_json::json!(false));
    Ok(session.open_dataset(&options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::media_type;

    fn repository_collection() -> Collection {
        serde_json::from_value(serde_json::json!({
            "type": "Collection",
            "id": "nex-gddp",
            "assets": {
                "repo": {
                    "href": "s3://repo-bucket/repos/nex-gddp",
                    "type": media_type::REPOSITORY,
                    "storage:refs": ["repo-scheme"],
                    "version": "v1.2"
                },
                "virtual-repo": {
                    "href": "s3://repo-bucket/repos/nex-gddp-virtual",
                    "type": media_type::REPOSITORY,
                    "roles": ["virtual"],
                    "storage:refs": ["repo-scheme"],
                    "vrt:hrefs": [{"key": "netcdf"}]
                },
                "netcdf": {
                    "href": "s3://data-bucket/nc/",
                    "storage:refs": ["data-scheme"]
                }
            },
            "storage:schemes": {
                "repo-scheme": {"type": "aws-s3", "bucket": "repo-bucket", "region": "us-west-2"},
                "data-scheme": {"type": "aws-s3", "bucket": "data-bucket", "region": "us-east-1", "anonymous": true}
            }
        }))
        .unwrap()
    }

    #[test]
    fn resolve_storage_extracts_prefix() {
        let collection = repository_collection();
        let asset = collection.asset("repo").unwrap();
        let storage = resolve_storage(Some(&collection), asset).unwrap();
        assert_eq!(storage.bucket, "repo-bucket");
        assert_eq!(storage.prefix, "repos/nex-gddp");
        assert_eq!(storage.region, "us-west-2");
        assert!(!storage.anonymous);
        assert!(storage.from_env());
    }

    #[test]
    fn resolve_storage_requires_exactly_one_ref() {
        let collection = repository_collection();
        let mut asset = collection.asset("repo").unwrap().clone();
        asset.extra_fields.insert(
            fields::STORAGE_REFS.to_string(),
            serde_json::json!(["repo-scheme", "data-scheme"]),
        );
        let err = resolve_storage(Some(&collection), &asset).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::StorageRefCardinality { count: 2 }
        ));

        asset
            .extra_fields
            .insert(fields::STORAGE_REFS.to_string(), serde_json::json!([]));
        let err = resolve_storage(Some(&collection), &asset).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::StorageRefCardinality { count: 0 }
        ));
    }

    #[test]
    fn resolve_storage_rejects_unsupported_scheme_type() {
        let mut collection = repository_collection();
        collection.extra_fields[fields::STORAGE_SCHEMES]["repo-scheme"]["type"] =
            serde_json::json!("gcs");
        let asset = collection.asset("repo").unwrap().clone();
        let err = resolve_storage(Some(&collection), &asset).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::UnsupportedSchemeType { ref scheme_type } if scheme_type == "gcs"
        ));
    }

    #[test]
    fn resolve_storage_requires_owner() {
        let collection = repository_collection();
        let asset = collection.asset("repo").unwrap();
        let err = resolve_storage(None, asset).unwrap_err();
        assert!(matches!(err, RepositoryError::MissingSchemes));
    }

    #[test]
    fn resolve_storage_href_must_lie_inside_bucket() {
        let collection = repository_collection();
        let mut asset = collection.asset("repo").unwrap().clone();
        asset.href = "s3://other-bucket/repos/nex-gddp".to_string();
        let err = resolve_storage(Some(&collection), &asset).unwrap_err();
        assert!(matches!(err, RepositoryError::HrefOutsideBucket { .. }));
    }

    #[test]
    fn resolve_virtual_config_wires_the_data_asset() {
        let collection = repository_collection();
        let asset = collection.asset("virtual-repo").unwrap();
        let config = resolve_virtual_config(Some(&collection), asset).unwrap();
        assert_eq!(config.container.href, "s3://data-bucket/nc/");
        assert_eq!(config.container.region, "us-east-1");
        assert_eq!(
            config.credentials["s3://data-bucket/nc/"],
            CredentialSource::Anonymous
        );
    }

    #[test]
    fn resolve_virtual_config_requires_exactly_one_pointer() {
        let collection = repository_collection();
        let mut asset = collection.asset("virtual-repo").unwrap().clone();
        asset.extra_fields.insert(
            fields::VIRTUAL_HREFS.to_string(),
            serde_json::json!([{"key": "netcdf"}, {"key": "netcdf"}]),
        );
        let err = resolve_virtual_config(Some(&collection), &asset).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::VirtualHrefCardinality { count: 2 }
        ));
    }

    #[test]
    fn resolve_virtual_config_requires_known_data_asset() {
        let collection = repository_collection();
        let mut asset = collection.asset("virtual-repo").unwrap().clone();
        asset.extra_fields.insert(
            fields::VIRTUAL_HREFS.to_string(),
            serde_json::json!([{"key": "missing"}]),
        );
        let err = resolve_virtual_config(Some(&collection), &asset).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::MissingDataAsset { ref key } if key == "missing"
        ));
    }

    struct FakeRepository {
        branches: Vec<String>,
        tags: Vec<String>,
    }

    impl Repository for FakeRepository {
        fn list_branches(&self) -> Result<Vec<String>, EngineError> {
            Ok(self.branches.clone())
        }

        fn list_tags(&self) -> Result<Vec<String>, EngineError> {
            Ok(self.tags.clone())
        }

        fn readonly_session(
            &self,
            _version: &VersionRef,
        ) -> Result<Box<dyn crate::engine::Session>, EngineError> {
            Err(EngineError::Unsupported("not needed".to_string()))
        }
    }

    #[test]
    fn resolve_version_prefers_branches_then_tags() {
        let repository = FakeRepository {
            branches: vec!["main".to_string(), "dev".to_string()],
            tags: vec!["v1.2".to_string(), "dev".to_string()],
        };
        assert_eq!(
            resolve_version(&repository, Some("dev")).unwrap(),
            VersionRef::Branch("dev".to_string())
        );
        assert_eq!(
            resolve_version(&repository, Some("v1.2")).unwrap(),
            VersionRef::Tag("v1.2".to_string())
        );
        assert_eq!(
            resolve_version(&repository, Some("G3SNPB2HC1PNBYBMSDA0")).unwrap(),
            VersionRef::Snapshot("G3SNPB2HC1PNBYBMSDA0".to_string())
        );
    }

    #[test]
    fn resolve_version_defaults_to_the_default_branch() {
        let repository = FakeRepository {
            branches: vec!["main".to_string()],
            tags: Vec::new(),
        };
        assert_eq!(
            resolve_version(&repository, None).unwrap(),
            VersionRef::Branch("main".to_string())
        );
    }
}

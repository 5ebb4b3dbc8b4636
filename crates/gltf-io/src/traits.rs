//! Collaborator traits consumed by the loader.
//!
//! The loader never touches the network, the filesystem or a geometry codec
//! directly. Callers inject implementations of these traits:
//!
//! ```ignore
//! use gltf_io::{FsFetcher, GltfLoader, LoadOptions};
//!
//! let loader = GltfLoader::new(LoadOptions::default().with_base_path("assets/"))
//!     .with_fetcher(FsFetcher::new());
//! let bundle = futures::executor::block_on(loader.parse(&bytes, Some("model.gltf")))?;
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use futures::future::BoxFuture;
use gltf_core::accessor::TypedArray;

/// Hints forwarded with every fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub cacheable: bool,
    pub retryable: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cacheable: true,
            retryable: false,
        }
    }
}

/// Byte transport for external buffers and images.
///
/// Errors are surfaced to the caller unchanged; the loader never retries.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: &FetchOptions,
    ) -> BoxFuture<'a, io::Result<Vec<u8>>>;
}

/// Reads URLs as paths on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsFetcher {
    root: Option<PathBuf>,
}

impl FsFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every URL relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl Fetcher for FsFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _options: &FetchOptions,
    ) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        let path = match &self.root {
            Some(root) => root.join(url),
            None => PathBuf::from(url),
        };
        Box::pin(async move {
            log::debug!("reading {}", path.display());
            fs::read(&path)
        })
    }
}

/// One attribute stream produced by a geometry decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttribute {
    pub values: TypedArray,
    pub num_components: usize,
    pub normalized: bool,
}

/// Geometry produced by a [`MeshDecompressor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMesh {
    /// Attribute streams keyed by glTF semantic (`POSITION`, `NORMAL`, ...).
    pub attributes: BTreeMap<String, DecodedAttribute>,
    /// Triangle indices; `None` for point clouds.
    pub indices: Option<Vec<u32>>,
}

impl DecodedMesh {
    pub fn num_vertices(&self) -> usize {
        self.attributes
            .get("POSITION")
            .map(|a| a.values.len() / a.num_components.max(1))
            .unwrap_or(0)
    }
}

/// Decoder for `KHR_draco_mesh_compression` payloads.
///
/// `attributes` maps glTF semantics to the decoder's attribute ids as declared
/// in the extension object.
pub trait MeshDecompressor: Send + Sync {
    fn decode(
        &self,
        data: &[u8],
        attributes: &BTreeMap<String, u32>,
    ) -> std::result::Result<DecodedMesh, String>;
}

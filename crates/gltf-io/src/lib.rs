//! glTF 2.0 / GLB loader.
//!
//! Turns a `.gltf` document or `.glb` container into a [`GltfBundle`]: nodes,
//! scenes, cameras, lights, interleaved geometry, skins, animation tracks,
//! textures and materials, ready to hand to an engine.
//!
//! # Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Container split | [`gltf_core::chunk`] |
//! | Metadata | [`document`] |
//! | Buffers and views | [`buffers`] |
//! | Geometry | [`geometry`] |
//! | Nodes, scenes, skins | [`graph`] |
//! | Materials | [`material`] |
//! | Animations | [`animation`] |
//! | Images and textures | [`texture`] |
//!
//! Byte transport and compressed-geometry decoding are supplied by the caller
//! through the [`Fetcher`] and [`MeshDecompressor`] traits.
//!
//! ```ignore
//! use gltf_io::{FsFetcher, GltfLoader, LoadOptions};
//!
//! let bytes = std::fs::read("assets/duck.glb")?;
//! let loader = GltfLoader::new(LoadOptions::default().with_base_path("assets/"))
//!     .with_fetcher(FsFetcher::new());
//! let bundle = futures::executor::block_on(loader.parse(&bytes, Some("duck.glb")))?;
//! println!("{} nodes, {} meshes", bundle.nodes.len(), bundle.geometry_groups.len());
//! ```

#![allow(clippy::needless_range_loop)]

pub mod animation;
pub mod buffers;
pub mod document;
pub mod geometry;
pub mod graph;
pub mod hooks;
pub mod loader;
pub mod material;
pub mod options;
pub mod texture;
pub mod traits;
pub mod uri;

pub use gltf_core::error::{GltfError, Result};

pub use animation::{AnimCurve, AnimData, AnimTrack, Interpolation, TargetProperty};
pub use document::Document;
pub use geometry::{
    Geometry, GeometryGroup, IndexBuffer, IndexFormat, MeshInstance, Semantic, Topology,
    VertexBuffer, VertexElement, VertexFormat,
};
pub use graph::{Camera, Light, LightKind, Node, Projection, Scene, Skin};
pub use hooks::{AsyncHooks, CategoryHooks, ExtensionTable, GlobalHooks, Hooks};
pub use loader::{GltfBundle, GltfLoader, ParseStage};
pub use material::{AlphaMode, Material, TextureRef};
pub use options::LoadOptions;
pub use texture::{AddressMode, FilterMode, Image, Sampler, Texture};
pub use traits::{DecodedAttribute, DecodedMesh, FetchOptions, Fetcher, FsFetcher, MeshDecompressor};

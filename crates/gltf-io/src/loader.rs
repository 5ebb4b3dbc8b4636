//! Parse orchestration.
//!
//! ```text
//! ReadChunks -> ParseMetadata -> ResolveBuffers -> ResolveBufferViews
//!     -> (LoadTextures || BuildGeometry) -> BuildGraph -> BuildAnimations
//!     -> Assemble -> Done
//! ```
//!
//! Any failure moves the parse to `Failed` and the first error is returned;
//! no partial bundle is produced.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::executor::block_on;
use futures::future::try_join;
use gltf_core::buffer::{BufferSlice, ResolvedView};
use gltf_core::chunk::read_chunks;
use gltf_core::error::{GltfError, Result};

use crate::animation::{build_animation, AnimTrack};
use crate::buffers::{BufferResolver, ExternalSource};
use crate::document::{parse_metadata, Document};
use crate::geometry::{GeometryBuilder, GeometryGroup};
use crate::graph::{
    build_camera, build_light, build_nodes, build_scenes, build_skin, node_models, Camera, Light,
    Node, Scene, Skin,
};
use crate::material::{build_material, Material};
use crate::options::LoadOptions;
use crate::texture::{build_textures, load_images, Texture};
use crate::traits::{Fetcher, MeshDecompressor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    ReadChunks,
    ParseMetadata,
    ResolveBuffers,
    ResolveBufferViews,
    LoadTextures,
    BuildGeometry,
    BuildGraph,
    BuildAnimations,
    Assemble,
    Done,
    Failed,
}

/// The result of one parse.
#[derive(Debug, Clone, Default)]
pub struct GltfBundle {
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub default_scene: Option<usize>,
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,
    pub geometry_groups: Vec<GeometryGroup>,
    /// Geometry group instantiated by each node.
    pub node_models: Vec<Option<usize>>,
    pub skins: Vec<Skin>,
    pub animations: Vec<AnimTrack>,
    /// Animations each node must carry, indexed by node.
    pub node_animations: Vec<Vec<usize>>,
    /// `None` where the texture's image was not loaded.
    pub textures: Vec<Option<Texture>>,
    pub materials: Vec<Material>,
}

impl GltfBundle {
    pub fn model_of(&self, node: usize) -> Option<&GeometryGroup> {
        self.node_models
            .get(node)
            .copied()
            .flatten()
            .and_then(|m| self.geometry_groups.get(m))
    }
}

fn run_stage<T>(stage: ParseStage, work: impl FnOnce() -> Result<T>) -> Result<T> {
    log::debug!("stage {:?}", stage);
    work().map_err(|e| failed(stage, e))
}

async fn run_async_stage<T>(stage: ParseStage, work: impl Future<Output = Result<T>>) -> Result<T> {
    log::debug!("stage {:?}", stage);
    work.await.map_err(|e| failed(stage, e))
}

fn failed(stage: ParseStage, error: GltfError) -> GltfError {
    log::debug!("stage {:?} -> {:?}: {}", stage, ParseStage::Failed, error);
    error
}

/// Loads glTF and GLB documents into [`GltfBundle`]s.
pub struct GltfLoader {
    options: LoadOptions,
    fetcher: Option<Arc<dyn Fetcher>>,
    decompressor: Option<Arc<dyn MeshDecompressor>>,
}

impl GltfLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            fetcher: None,
            decompressor: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn with_decompressor(mut self, decompressor: impl MeshDecompressor + 'static) -> Self {
        self.decompressor = Some(Arc::new(decompressor));
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Parse `data`. `filename`, when given, selects the container format by
    /// extension; otherwise the GLB magic is sniffed.
    pub async fn parse(&self, data: &[u8], filename: Option<&str>) -> Result<GltfBundle> {
        let external = match &self.fetcher {
            Some(fetcher) => ExternalSource::Fetch(fetcher.as_ref()),
            None => ExternalSource::Unavailable,
        };
        self.run(data, filename, external, true).await
    }

    /// Offline structural parse: external buffers resolve to empty and images
    /// are not loaded. Failures are logged and yield `None`.
    pub fn parse_sync(&self, data: &[u8], filename: Option<&str>) -> Option<GltfBundle> {
        match block_on(self.run(data, filename, ExternalSource::Skip, false)) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                log::error!("failed to parse {}: {}", filename.unwrap_or("glTF data"), e);
                None
            }
        }
    }

    async fn run(
        &self,
        data: &[u8],
        filename: Option<&str>,
        external: ExternalSource<'_>,
        with_images: bool,
    ) -> Result<GltfBundle> {
        let hooks = &self.options.hooks;

        let chunks = run_stage(ParseStage::ReadChunks, || read_chunks(data, filename))?;
        let doc = run_stage(ParseStage::ParseMetadata, || {
            let mut doc = parse_metadata(chunks.json)?;
            hooks.preprocess_document(&mut doc);
            Ok(doc)
        })?;

        let resolver = BufferResolver {
            options: &self.options,
            external,
            bin: chunks.bin.map(|b| BufferSlice::from_vec(b.to_vec())),
        };
        let buffers =
            run_async_stage(ParseStage::ResolveBuffers, resolver.resolve_buffers(&doc)).await?;
        let views = run_async_stage(
            ParseStage::ResolveBufferViews,
            resolver.resolve_views(&doc, &buffers),
        )
        .await?;

        let images = run_async_stage(ParseStage::LoadTextures, async {
            if with_images {
                load_images(&doc, &views, &resolver, hooks).await
            } else {
                Ok(BTreeMap::new())
            }
        });
        let geometry = async {
            run_stage(ParseStage::BuildGeometry, || {
                let decompressor = self.decompressor.as_deref();
                let mut builder = GeometryBuilder::new(&doc, &views, &self.options, decompressor);
                let groups = builder.build_groups()?;
                log::debug!(
                    "{} geometry groups, {} unique geometries",
                    groups.len(),
                    builder.unique_geometries()
                );
                Ok(groups)
            })
        };
        let (images, geometry_groups) = try_join(images, geometry).await?;
        let textures = build_textures(&doc, &images, hooks)?;

        let mut bundle = run_stage(ParseStage::BuildGraph, || self.build_graph(&doc, &views))?;
        bundle.geometry_groups = geometry_groups;
        bundle.textures = textures;

        run_stage(ParseStage::BuildAnimations, || {
            bundle.animations = doc
                .animations
                .iter()
                .enumerate()
                .map(|(i, def)| {
                    hooks
                        .animation
                        .construct(def, |def| build_animation(i, def, &doc, &views, &bundle.nodes))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(())
        })?;

        run_stage(ParseStage::Assemble, || {
            bundle.node_animations = vec![Vec::new(); bundle.nodes.len()];
            for (index, track) in bundle.animations.iter().enumerate() {
                for &root in &track.roots {
                    bundle.node_animations[root].push(index);
                }
            }
            if let Some(post) = &hooks.global.postprocess {
                post(&doc, &mut bundle);
            }
            Ok(())
        })?;

        log::debug!("stage {:?}", ParseStage::Done);
        Ok(bundle)
    }

    fn build_graph(&self, doc: &Document, views: &[ResolvedView]) -> Result<GltfBundle> {
        let hooks = &self.options.hooks;

        let materials = doc
            .materials
            .iter()
            .enumerate()
            .map(|(i, def)| hooks.material.construct(def, |def| build_material(i, def)))
            .collect::<Result<Vec<_>>>()?;

        let nodes = build_nodes(doc, hooks)?;
        let (scenes, default_scene) = build_scenes(doc, &nodes, hooks)?;

        let cameras = doc
            .cameras
            .iter()
            .map(|def| hooks.camera.construct(def, build_camera))
            .collect::<Result<Vec<_>>>()?;

        let mut light_defs = doc.lights()?;
        if let Some(pre) = &hooks.light.preprocess {
            light_defs.iter_mut().for_each(|d| pre(d));
        }
        let lights = light_defs
            .iter()
            .map(|def| hooks.light.construct(def, build_light))
            .collect::<Result<Vec<_>>>()?;
        if let Some(bad) = nodes.iter().filter_map(|n| n.light).find(|&l| l >= lights.len()) {
            return Err(GltfError::format(format!("Invalid light index: {}", bad)));
        }

        let skins = doc
            .skins
            .iter()
            .map(|def| build_skin(def, doc, views))
            .collect::<Result<Vec<_>>>()?;

        Ok(GltfBundle {
            node_models: node_models(doc)?,
            nodes,
            scenes,
            default_scene,
            cameras,
            lights,
            skins,
            materials,
            ..Default::default()
        })
    }
}

//! Image loading and texture/sampler construction.
//!
//! Images are loaded once each, concurrently. Textures that reference the same
//! image share its bytes through an `Arc` and carry their own sampler state.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use gltf_core::buffer::{BufferSlice, ResolvedView};
use gltf_core::error::{GltfError, Result};

use crate::buffers::BufferResolver;
use crate::document::{Document, ImageDef, SamplerDef, TextureDef};
use crate::hooks::Hooks;
use crate::uri::{decode_data_uri, is_data_uri, mime_from_extension};

// ============================================================================
// Samplers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl FilterMode {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            9728 => Ok(FilterMode::Nearest),
            9729 => Ok(FilterMode::Linear),
            9984 => Ok(FilterMode::NearestMipmapNearest),
            9985 => Ok(FilterMode::LinearMipmapNearest),
            9986 => Ok(FilterMode::NearestMipmapLinear),
            9987 => Ok(FilterMode::LinearMipmapLinear),
            _ => Err(GltfError::format(format!("Unknown sampler filter: {}", code))),
        }
    }

    pub fn uses_mipmaps(&self) -> bool {
        !matches!(self, FilterMode::Nearest | FilterMode::Linear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl AddressMode {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            33071 => Ok(AddressMode::ClampToEdge),
            33648 => Ok(AddressMode::MirroredRepeat),
            10497 => Ok(AddressMode::Repeat),
            _ => Err(GltfError::format(format!("Unknown sampler wrap mode: {}", code))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
        }
    }
}

pub fn build_sampler(def: &SamplerDef) -> Result<Sampler> {
    let defaults = Sampler::default();
    let mag_filter = match def.mag_filter {
        Some(code @ (9728 | 9729)) => FilterMode::from_code(code)?,
        Some(code) => {
            return Err(GltfError::format(format!("Unknown sampler magFilter: {}", code)));
        }
        None => defaults.mag_filter,
    };
    Ok(Sampler {
        min_filter: def
            .min_filter
            .map(FilterMode::from_code)
            .transpose()?
            .unwrap_or(defaults.min_filter),
        mag_filter,
        address_u: def
            .wrap_s
            .map(AddressMode::from_code)
            .transpose()?
            .unwrap_or(defaults.address_u),
        address_v: def
            .wrap_t
            .map(AddressMode::from_code)
            .transpose()?
            .unwrap_or(defaults.address_v),
    })
}

// ============================================================================
// Images and textures
// ============================================================================

#[derive(Debug, Clone)]
pub struct Image {
    pub name: Option<String>,
    pub mime_type: Option<String>,
    /// Encoded image bytes.
    pub data: BufferSlice,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: Option<String>,
    /// Document image index.
    pub source: usize,
    pub image: Arc<Image>,
    pub sampler: Sampler,
}

/// Load every image referenced by a texture, once each.
pub(crate) async fn load_images(
    doc: &Document,
    views: &[ResolvedView],
    resolver: &BufferResolver<'_>,
    hooks: &Hooks,
) -> Result<BTreeMap<usize, Arc<Image>>> {
    let mut wanted: Vec<usize> = doc.textures.iter().filter_map(TextureDef::image_source).collect();
    wanted.sort_unstable();
    wanted.dedup();

    let loads = wanted.into_iter().map(|index| async move {
        let def = doc
            .images
            .get(index)
            .ok_or_else(|| GltfError::format(format!("Invalid image index: {}", index)))?;
        let image = hooks
            .image
            .construct(def, || load_image(def, views, resolver))
            .await?;
        Ok::<_, GltfError>((index, Arc::new(image)))
    });
    Ok(try_join_all(loads).await?.into_iter().collect())
}

async fn load_image(
    def: &ImageDef,
    views: &[ResolvedView],
    resolver: &BufferResolver<'_>,
) -> Result<Image> {
    let (data, detected) = match (&def.buffer_view, def.uri.as_deref()) {
        (Some(view), _) => {
            let view = views
                .get(*view)
                .ok_or_else(|| GltfError::format(format!("Invalid bufferView index: {}", view)))?;
            (view.data.clone(), None)
        }
        (None, Some(uri)) if is_data_uri(uri) => {
            let decoded = decode_data_uri(uri)?;
            (BufferSlice::from_vec(decoded.data), decoded.mime_type)
        }
        (None, Some(uri)) => (
            BufferSlice::from_vec(resolver.fetch_external(uri).await?),
            mime_from_extension(uri).map(str::to_string),
        ),
        (None, None) => {
            return Err(GltfError::format("Image has neither uri nor bufferView"));
        }
    };
    Ok(Image {
        name: def.name.clone(),
        mime_type: def.mime_type.clone().or(detected),
        data,
    })
}

/// Build textures over already-loaded images. Textures whose image was not
/// loaded are `None`.
pub(crate) fn build_textures(
    doc: &Document,
    images: &BTreeMap<usize, Arc<Image>>,
    hooks: &Hooks,
) -> Result<Vec<Option<Texture>>> {
    let samplers = doc.samplers.iter().map(build_sampler).collect::<Result<Vec<_>>>()?;

    doc.textures
        .iter()
        .map(|def| {
            let loaded = def.image_source().and_then(|i| images.get(&i).map(|img| (i, img)));
            let Some(image) = loaded else {
                return Ok(None);
            };
            let sampler = match def.sampler {
                Some(i) => *samplers
                    .get(i)
                    .ok_or_else(|| GltfError::format(format!("Invalid sampler index: {}", i)))?,
                None => Sampler::default(),
            };
            hooks
                .texture
                .construct(def, |def| {
                    Ok(Texture {
                        name: def.name.clone(),
                        source: image.0,
                        image: Arc::clone(image.1),
                        sampler,
                    })
                })
                .map(Some)
        })
        .collect()
}

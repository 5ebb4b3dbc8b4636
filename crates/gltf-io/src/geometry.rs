//! Geometry builder: vertex/index buffers from mesh primitives.
//!
//! Attribute streams are interleaved into one vertex buffer in a fixed
//! semantic order, regardless of the order the document lists them in.
//! Primitives whose descriptors differ only by material share one
//! [`Geometry`] per parse.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;
use gltf_core::accessor::{read_accessor, AccessorDesc, AccessorView, TypedArray};
use gltf_core::buffer::ResolvedView;
use gltf_core::data_types::ComponentType;
use gltf_core::error::{GltfError, Result};
use gltf_core::hash::structural_hash;

use crate::document::{Document, HasExtensions, MeshDef, PrimitiveDef};
use crate::options::LoadOptions;
use crate::traits::MeshDecompressor;

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

// ============================================================================
// Vertex layout
// ============================================================================

/// Vertex attribute semantic, declared in interleaving order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    Color0,
    Joints0,
    Weights0,
    TexCoord0,
    TexCoord1,
}

impl Semantic {
    pub const ALL: [Semantic; 8] = [
        Semantic::Position,
        Semantic::Normal,
        Semantic::Tangent,
        Semantic::Color0,
        Semantic::Joints0,
        Semantic::Weights0,
        Semantic::TexCoord0,
        Semantic::TexCoord1,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "POSITION" => Some(Semantic::Position),
            "NORMAL" => Some(Semantic::Normal),
            "TANGENT" => Some(Semantic::Tangent),
            "COLOR_0" => Some(Semantic::Color0),
            "JOINTS_0" => Some(Semantic::Joints0),
            "WEIGHTS_0" => Some(Semantic::Weights0),
            "TEXCOORD_0" => Some(Semantic::TexCoord0),
            "TEXCOORD_1" => Some(Semantic::TexCoord1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::Tangent => "TANGENT",
            Semantic::Color0 => "COLOR_0",
            Semantic::Joints0 => "JOINTS_0",
            Semantic::Weights0 => "WEIGHTS_0",
            Semantic::TexCoord0 => "TEXCOORD_0",
            Semantic::TexCoord1 => "TEXCOORD_1",
        }
    }

    pub fn is_tex_coord(&self) -> bool {
        matches!(self, Semantic::TexCoord0 | Semantic::TexCoord1)
    }
}

/// One attribute inside an interleaved vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexElement {
    pub semantic: Semantic,
    pub components: usize,
    pub component_type: ComponentType,
    pub normalize: bool,
    /// Byte offset inside one vertex.
    pub offset: usize,
}

impl VertexElement {
    pub fn size(&self) -> usize {
        self.components * self.component_type.byte_length()
    }
}

/// Ordered element list plus the interleaved stride.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexFormat {
    pub elements: Vec<VertexElement>,
    pub stride: usize,
}

impl VertexFormat {
    /// Lay out `(semantic, components, type, normalize)` tuples, sorted into
    /// semantic order, each element padded to a 4-byte boundary.
    pub fn new(mut attributes: Vec<(Semantic, usize, ComponentType, bool)>) -> Self {
        attributes.sort_by_key(|a| a.0);
        let mut offset = 0;
        let elements = attributes
            .into_iter()
            .map(|(semantic, components, component_type, normalize)| {
                let element = VertexElement {
                    semantic,
                    components,
                    component_type,
                    normalize,
                    offset,
                };
                offset += align4(element.size());
                element
            })
            .collect();
        Self {
            elements,
            stride: offset,
        }
    }

    pub fn element(&self, semantic: Semantic) -> Option<&VertexElement> {
        self.elements.iter().find(|e| e.semantic == semantic)
    }
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Interleaved vertex data ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    pub format: VertexFormat,
    pub num_vertices: usize,
    pub data: Vec<u8>,
}

impl VertexBuffer {
    /// Read one attribute back out as floats.
    pub fn attribute_f32(&self, semantic: Semantic) -> Option<Vec<f32>> {
        let element = self.format.element(semantic)?;
        let view = AccessorView::new(
            &self.data,
            element.offset,
            Some(self.format.stride),
            element.component_type,
            element.components,
            self.num_vertices,
        )
        .ok()?;
        Some(view.read().to_f32(element.normalize))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

impl IndexFormat {
    pub fn byte_length(&self) -> usize {
        match self {
            IndexFormat::U8 => 1,
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuffer {
    pub format: IndexFormat,
    pub count: usize,
    pub data: Vec<u8>,
}

impl IndexBuffer {
    fn from_indices(format: IndexFormat, indices: &[u32]) -> Self {
        let mut data = vec![0u8; indices.len() * format.byte_length()];
        match format {
            IndexFormat::U8 => {
                for (dst, &i) in data.iter_mut().zip(indices) {
                    *dst = i as u8;
                }
            }
            IndexFormat::U16 => {
                for (k, &i) in indices.iter().enumerate() {
                    LittleEndian::write_u16(&mut data[k * 2..], i as u16);
                }
            }
            IndexFormat::U32 => LittleEndian::write_u32_into(indices, &mut data),
        }
        Self {
            format,
            count: indices.len(),
            data,
        }
    }

    pub fn indices(&self) -> Vec<u32> {
        match self.format {
            IndexFormat::U8 => self.data.iter().map(|&i| i as u32).collect(),
            IndexFormat::U16 => self
                .data
                .chunks_exact(2)
                .map(|c| LittleEndian::read_u16(c) as u32)
                .collect(),
            IndexFormat::U32 => self.data.chunks_exact(4).map(LittleEndian::read_u32).collect(),
        }
    }
}

/// Primitive topology from the glTF `mode` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub fn from_mode(mode: u32) -> Result<Self> {
        match mode {
            0 => Ok(Topology::Points),
            1 => Ok(Topology::Lines),
            2 => Ok(Topology::LineLoop),
            3 => Ok(Topology::LineStrip),
            4 => Ok(Topology::Triangles),
            5 => Ok(Topology::TriangleStrip),
            6 => Ok(Topology::TriangleFan),
            _ => Err(GltfError::format(format!(
                "Unknown primitive mode: {} (expected 0-6)",
                mode
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    pub delta_positions: Option<Vec<f32>>,
    pub delta_normals: Option<Vec<f32>>,
}

/// One drawable piece of geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub vertex_buffer: Arc<VertexBuffer>,
    pub index_buffer: Option<Arc<IndexBuffer>>,
    pub topology: Topology,
    pub aabb: Option<Aabb>,
    pub morph_targets: Vec<MorphTarget>,
}

/// A geometry paired with the material of the primitive that produced it.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub geometry: Arc<Geometry>,
    pub material: Option<usize>,
}

/// Everything built from one document mesh.
#[derive(Debug, Clone, Default)]
pub struct GeometryGroup {
    pub name: Option<String>,
    pub primitives: Vec<MeshInstance>,
    /// Default morph weights.
    pub weights: Option<Vec<f32>>,
}

// ============================================================================
// Builder
// ============================================================================

struct Stream {
    semantic: Semantic,
    values: TypedArray,
    components: usize,
    normalized: bool,
    /// `(bufferView, byteOffset)` when the stream is a plain view of a document
    /// buffer.
    source: Option<(usize, usize)>,
}

impl Stream {
    fn count(&self) -> usize {
        self.values.len() / self.components.max(1)
    }
}

pub(crate) struct GeometryBuilder<'a> {
    doc: &'a Document,
    views: &'a [ResolvedView],
    options: &'a LoadOptions,
    decompressor: Option<&'a dyn MeshDecompressor>,
    flip_v: bool,
    cache: HashMap<u64, Arc<Geometry>>,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(
        doc: &'a Document,
        views: &'a [ResolvedView],
        options: &'a LoadOptions,
        decompressor: Option<&'a dyn MeshDecompressor>,
    ) -> Self {
        Self {
            doc,
            views,
            options,
            decompressor,
            flip_v: options.flip_v(doc.asset.generator.as_deref()),
            cache: HashMap::new(),
        }
    }

    pub fn build_groups(&mut self) -> Result<Vec<GeometryGroup>> {
        let doc = self.doc;
        doc.meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| self.build_group(i, mesh))
            .collect()
    }

    /// Number of distinct geometries built so far.
    pub fn unique_geometries(&self) -> usize {
        self.cache.len()
    }

    fn build_group(&mut self, mesh_index: usize, mesh: &MeshDef) -> Result<GeometryGroup> {
        let target_names = mesh.target_names();
        let mut primitives = Vec::with_capacity(mesh.primitives.len());
        for (prim_index, prim) in mesh.primitives.iter().enumerate() {
            let key = structural_hash(&serde_json::to_value(prim)?, &["material"]);
            let geometry = match self.cache.get(&key) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let built = Arc::new(self.build_primitive(
                        mesh_index,
                        prim_index,
                        prim,
                        target_names.as_deref(),
                    )?);
                    self.cache.insert(key, Arc::clone(&built));
                    built
                }
            };
            primitives.push(MeshInstance {
                geometry,
                material: prim.material,
            });
        }
        Ok(GeometryGroup {
            name: mesh.name.clone(),
            primitives,
            weights: mesh.weights.clone(),
        })
    }

    fn build_primitive(
        &self,
        mesh_index: usize,
        prim_index: usize,
        prim: &PrimitiveDef,
        target_names: Option<&[String]>,
    ) -> Result<Geometry> {
        let topology = match prim.mode {
            Some(mode) => Topology::from_mode(mode)?,
            None => Topology::Triangles,
        };

        let decoded = self.decompress(mesh_index, prim_index, prim)?;
        let (mut streams, indices, compressed) = match decoded {
            Some((streams, indices)) => (streams, indices, true),
            None => {
                let (streams, indices) = self.read_streams(prim)?;
                (streams, indices, false)
            }
        };

        let num_vertices = match streams.iter().find(|s| s.semantic == Semantic::Position) {
            Some(position) => position.count(),
            None => streams.first().map(Stream::count).unwrap_or(0),
        };
        if let Some(bad) = streams.iter().find(|s| s.count() != num_vertices) {
            return Err(GltfError::format(format!(
                "Mesh {} primitive {}: {} has {} elements, expected {}",
                mesh_index,
                prim_index,
                bad.semantic.name(),
                bad.count(),
                num_vertices
            )));
        }

        let has_normals = streams.iter().any(|s| s.semantic == Semantic::Normal);
        if !has_normals && topology == Topology::Triangles {
            if let Some(position) = streams.iter().find(|s| s.semantic == Semantic::Position) {
                let positions = position.values.to_f32(position.normalized);
                let normals = match &indices {
                    Some(values) => smooth_normals(&positions, &values.to_u32()),
                    None => smooth_normals(&positions, &sequential_indices(num_vertices)),
                };
                streams.push(Stream {
                    semantic: Semantic::Normal,
                    values: TypedArray::F32(normals),
                    components: 3,
                    normalized: false,
                    source: None,
                });
            }
        }

        let mut vertex_buffer = self.interleave(&streams, num_vertices);
        if self.flip_v {
            flip_tex_coords(&mut vertex_buffer);
        }

        let index_buffer = match indices {
            Some(values) => Some(Arc::new(self.build_indices(&values, num_vertices, compressed))),
            None => None,
        };

        let morph_targets = if compressed {
            Vec::new()
        } else {
            self.build_morph_targets(prim, target_names)?
        };

        Ok(Geometry {
            vertex_buffer: Arc::new(vertex_buffer),
            index_buffer,
            topology,
            aabb: self.position_bounds(prim)?,
            morph_targets,
        })
    }

    fn read_streams(&self, prim: &PrimitiveDef) -> Result<(Vec<Stream>, Option<TypedArray>)> {
        let mut streams = Vec::with_capacity(prim.attributes.len());
        for (name, &accessor) in &prim.attributes {
            let Some(semantic) = Semantic::from_name(name) else {
                log::warn!("skipping unsupported vertex attribute {}", name);
                continue;
            };
            let desc = self.doc.accessor_desc(accessor)?;
            streams.push(Stream {
                semantic,
                values: read_accessor(&desc, self.views)?,
                components: desc.num_components(),
                normalized: desc.normalized,
                source: plain_source(&desc),
            });
        }

        let indices = match prim.indices {
            Some(accessor) => Some(read_accessor(&self.doc.accessor_desc(accessor)?, self.views)?),
            None => None,
        };
        Ok((streams, indices))
    }

    /// Decode a compressed primitive. `None` when the primitive is not
    /// compressed or no decoder is configured.
    fn decompress(
        &self,
        mesh_index: usize,
        prim_index: usize,
        prim: &PrimitiveDef,
    ) -> Result<Option<(Vec<Stream>, Option<TypedArray>)>> {
        let Some(ext) = prim.extension(DRACO_EXTENSION) else {
            return Ok(None);
        };
        let Some(decoder) = self.decompressor else {
            log::warn!(
                "mesh {} primitive {} uses {} but no decoder is configured",
                mesh_index,
                prim_index,
                DRACO_EXTENSION
            );
            return Ok(None);
        };

        let view_index = ext
            .get("bufferView")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| GltfError::format(format!("{} without bufferView", DRACO_EXTENSION)))?
            as usize;
        let view = self.views.get(view_index).ok_or_else(|| {
            GltfError::format(format!("Invalid bufferView index: {}", view_index))
        })?;
        let attribute_ids: BTreeMap<String, u32> = match ext.get("attributes") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => BTreeMap::new(),
        };

        let decoded = decoder
            .decode(view.bytes(), &attribute_ids)
            .map_err(|message| GltfError::Decode {
                mesh: mesh_index,
                primitive: prim_index,
                message,
            })?;

        let streams = decoded
            .attributes
            .into_iter()
            .filter_map(|(name, attr)| {
                Semantic::from_name(&name).map(|semantic| Stream {
                    semantic,
                    values: attr.values,
                    components: attr.num_components,
                    normalized: attr.normalized,
                    source: None,
                })
            })
            .collect();
        Ok(Some((streams, decoded.indices.map(TypedArray::U32))))
    }

    fn interleave(&self, streams: &[Stream], num_vertices: usize) -> VertexBuffer {
        let format = VertexFormat::new(
            streams
                .iter()
                .map(|s| (s.semantic, s.components, s.values.component_type(), s.normalized))
                .collect(),
        );

        if let Some(data) = self.copy_contiguous(streams, &format, num_vertices) {
            return VertexBuffer {
                format,
                num_vertices,
                data,
            };
        }

        let mut data = vec![0u8; format.stride * num_vertices];
        for element in &format.elements {
            let Some(stream) = streams.iter().find(|s| s.semantic == element.semantic) else {
                continue;
            };
            let width = element.component_type.byte_length();
            for v in 0..num_vertices {
                let base = v * format.stride + element.offset;
                for c in 0..element.components {
                    let at = base + c * width;
                    stream
                        .values
                        .write_component_le(v * element.components + c, &mut data[at..at + width]);
                }
            }
        }

        VertexBuffer {
            format,
            num_vertices,
            data,
        }
    }

    /// Fast path: every stream already sits interleaved in one buffer view
    /// with the target stride and offsets.
    fn copy_contiguous(
        &self,
        streams: &[Stream],
        format: &VertexFormat,
        num_vertices: usize,
    ) -> Option<Vec<u8>> {
        let first = format.elements.first()?;
        let (view_index, base) = streams.iter().find(|s| s.semantic == first.semantic)?.source?;
        let view = self.views.get(view_index)?;
        // A packed view only matches when its lone element needs no padding.
        let source_stride = match view.byte_stride.filter(|&s| s > 0) {
            Some(stride) => stride,
            None if format.elements.len() == 1 => first.size(),
            None => return None,
        };
        if source_stride != format.stride {
            return None;
        }
        for element in &format.elements {
            let stream = streams.iter().find(|s| s.semantic == element.semantic)?;
            if stream.source != Some((view_index, base + element.offset)) {
                return None;
            }
        }
        let end = base + format.stride * num_vertices;
        view.bytes().get(base..end).map(<[u8]>::to_vec)
    }

    fn build_indices(
        &self,
        values: &TypedArray,
        num_vertices: usize,
        compressed: bool,
    ) -> IndexBuffer {
        let indices = values.to_u32();
        let mut format = match values.component_type() {
            ComponentType::Uint8 | ComponentType::Int8 => IndexFormat::U8,
            ComponentType::Uint16 | ComponentType::Int16 => IndexFormat::U16,
            _ if compressed && num_vertices <= 0xFFFF => IndexFormat::U16,
            _ => IndexFormat::U32,
        };
        if format == IndexFormat::U32 && !self.options.supports_u32_indices {
            if num_vertices > 0xFFFF {
                log::warn!(
                    "narrowing 32-bit indices to 16 bits for {} vertices; geometry will be corrupt",
                    num_vertices
                );
            }
            format = IndexFormat::U16;
        }
        IndexBuffer::from_indices(format, &indices)
    }

    fn build_morph_targets(
        &self,
        prim: &PrimitiveDef,
        names: Option<&[String]>,
    ) -> Result<Vec<MorphTarget>> {
        let Some(targets) = &prim.targets else {
            return Ok(Vec::new());
        };
        targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let name = names
                    .and_then(|n| n.get(i))
                    .cloned()
                    .unwrap_or_else(|| format!("target{}", i));
                Ok(MorphTarget {
                    name,
                    delta_positions: self.read_f32(target.get("POSITION").copied())?,
                    delta_normals: self.read_f32(target.get("NORMAL").copied())?,
                })
            })
            .collect()
    }

    fn read_f32(&self, accessor: Option<usize>) -> Result<Option<Vec<f32>>> {
        let Some(index) = accessor else {
            return Ok(None);
        };
        let desc = self.doc.accessor_desc(index)?;
        Ok(Some(read_accessor(&desc, self.views)?.to_f32(desc.normalized)))
    }

    fn position_bounds(&self, prim: &PrimitiveDef) -> Result<Option<Aabb>> {
        let Some(&index) = prim.attributes.get("POSITION") else {
            return Ok(None);
        };
        let desc = self.doc.accessor_desc(index)?;
        Ok(match (&desc.min, &desc.max) {
            (Some(min), Some(max)) if min.len() >= 3 && max.len() >= 3 => Some(Aabb {
                min: Vec3::new(min[0] as f32, min[1] as f32, min[2] as f32),
                max: Vec3::new(max[0] as f32, max[1] as f32, max[2] as f32),
            }),
            _ => None,
        })
    }
}

fn plain_source(desc: &AccessorDesc) -> Option<(usize, usize)> {
    match (desc.buffer_view, &desc.sparse) {
        (Some(view), None) => Some((view, desc.byte_offset)),
        _ => None,
    }
}

pub fn sequential_indices(count: usize) -> Vec<u32> {
    (0..count as u32).collect()
}

/// Area-weighted smooth vertex normals for a triangle list.
pub fn smooth_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let num_vertices = positions.len() / 3;
    let mut accum = vec![Vec3::ZERO; num_vertices];
    let vertex = |i: usize| Vec3::from_slice(&positions[i * 3..i * 3 + 3]);

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if a >= num_vertices || b >= num_vertices || c >= num_vertices {
            continue;
        }
        let face = (vertex(b) - vertex(a)).cross(vertex(c) - vertex(a));
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }

    accum
        .into_iter()
        .flat_map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

/// `v' = 1 - v` on every texture coordinate element, in place.
fn flip_tex_coords(vb: &mut VertexBuffer) {
    let stride = vb.format.stride;
    for element in vb.format.elements.iter().filter(|e| e.semantic.is_tex_coord()) {
        if element.components < 2 {
            continue;
        }
        let width = element.component_type.byte_length();
        for v in 0..vb.num_vertices {
            let at = v * stride + element.offset + width;
            let slot = &mut vb.data[at..at + width];
            match (element.component_type, element.normalize) {
                (ComponentType::Float32, _) => {
                    LittleEndian::write_f32(slot, 1.0 - LittleEndian::read_f32(slot));
                }
                (ComponentType::Uint8, true) => slot[0] = u8::MAX - slot[0],
                (ComponentType::Uint16, true) => {
                    LittleEndian::write_u16(slot, u16::MAX - LittleEndian::read_u16(slot));
                }
                (ct, _) => {
                    log::warn!(
                        "cannot flip {:?} texture coordinates of type {:?}",
                        element.semantic,
                        ct
                    );
                    break;
                }
            }
        }
    }
}

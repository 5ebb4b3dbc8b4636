//! Typed, strided and sparse accessor reading.
//!
//! [`AccessorView`] borrows the bytes of a buffer view without copying and
//! reads individual components on demand. [`read_accessor`] materializes an
//! accessor into a [`TypedArray`], applying any sparse patch.

use byteorder::{ByteOrder, LittleEndian};
use num_traits::AsPrimitive;

use crate::buffer::ResolvedView;
use crate::data_types::{ComponentType, ElementType};
use crate::error::{GltfError, Result};

// ============================================================================
// Descriptors
// ============================================================================

/// Typed description of one accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorDesc {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
    pub sparse: Option<SparseDesc>,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
}

impl AccessorDesc {
    pub fn num_components(&self) -> usize {
        self.element_type.num_components()
    }

    pub fn element_size(&self) -> usize {
        self.component_type.byte_length() * self.num_components()
    }
}

/// Sparse patch: `count` rows of `values` written at `indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseDesc {
    pub count: usize,
    pub indices_buffer_view: usize,
    pub indices_byte_offset: usize,
    pub indices_component_type: ComponentType,
    pub values_buffer_view: usize,
    pub values_byte_offset: usize,
}

// ============================================================================
// Component reading
// ============================================================================

/// A numeric type an accessor component can be stored as.
pub trait Component: Copy + Default + AsPrimitive<f32> + AsPrimitive<u32> {
    const COMPONENT_TYPE: ComponentType;

    fn read_le(bytes: &[u8]) -> Self;

    fn read_packed(bytes: &[u8], dst: &mut [Self]);

    fn write_le(self, dst: &mut [u8]);
}

impl Component for i8 {
    const COMPONENT_TYPE: ComponentType = ComponentType::Int8;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn read_packed(bytes: &[u8], dst: &mut [Self]) {
        for (d, &b) in dst.iter_mut().zip(bytes) {
            *d = b as i8;
        }
    }

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self as u8;
    }
}

impl Component for u8 {
    const COMPONENT_TYPE: ComponentType = ComponentType::Uint8;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn read_packed(bytes: &[u8], dst: &mut [Self]) {
        dst.copy_from_slice(&bytes[..dst.len()]);
    }

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self;
    }
}

macro_rules! impl_component {
    ($ty:ty, $variant:ident, $read:ident, $read_into:ident, $write:ident) => {
        impl Component for $ty {
            const COMPONENT_TYPE: ComponentType = ComponentType::$variant;

            fn read_le(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }

            fn read_packed(bytes: &[u8], dst: &mut [Self]) {
                let len = dst.len() * std::mem::size_of::<$ty>();
                LittleEndian::$read_into(&bytes[..len], dst);
            }

            fn write_le(self, dst: &mut [u8]) {
                LittleEndian::$write(dst, self);
            }
        }
    };
}

impl_component!(i16, Int16, read_i16, read_i16_into, write_i16);
impl_component!(u16, Uint16, read_u16, read_u16_into, write_u16);
impl_component!(i32, Int32, read_i32, read_i32_into, write_i32);
impl_component!(u32, Uint32, read_u32, read_u32_into, write_u32);
impl_component!(f32, Float32, read_f32, read_f32_into, write_f32);

// ============================================================================
// TypedArray
// ============================================================================

/// A flat array of accessor components in their storage type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

macro_rules! with_values {
    ($array:expr, $v:ident => $body:expr) => {
        match $array {
            TypedArray::I8($v) => $body,
            TypedArray::U8($v) => $body,
            TypedArray::I16($v) => $body,
            TypedArray::U16($v) => $body,
            TypedArray::I32($v) => $body,
            TypedArray::U32($v) => $body,
            TypedArray::F32($v) => $body,
        }
    };
}

impl TypedArray {
    /// A zero-filled array of `len` components.
    pub fn zeros(component_type: ComponentType, len: usize) -> Self {
        match component_type {
            ComponentType::Int8 => TypedArray::I8(vec![0; len]),
            ComponentType::Uint8 => TypedArray::U8(vec![0; len]),
            ComponentType::Int16 => TypedArray::I16(vec![0; len]),
            ComponentType::Uint16 => TypedArray::U16(vec![0; len]),
            ComponentType::Int32 => TypedArray::I32(vec![0; len]),
            ComponentType::Uint32 => TypedArray::U32(vec![0; len]),
            ComponentType::Float32 => TypedArray::F32(vec![0.0; len]),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            TypedArray::I8(_) => ComponentType::Int8,
            TypedArray::U8(_) => ComponentType::Uint8,
            TypedArray::I16(_) => ComponentType::Int16,
            TypedArray::U16(_) => ComponentType::Uint16,
            TypedArray::I32(_) => ComponentType::Int32,
            TypedArray::U32(_) => ComponentType::Uint32,
            TypedArray::F32(_) => ComponentType::Float32,
        }
    }

    /// Number of components (not elements).
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to `f32`, applying the glTF normalized-integer rules when
    /// `normalized` is set.
    pub fn to_f32(&self, normalized: bool) -> Vec<f32> {
        if !normalized {
            return with_values!(self, v => v.iter().map(|&c| AsPrimitive::<f32>::as_(c)).collect());
        }
        match self {
            TypedArray::I8(v) => v.iter().map(|&c| (c as f32 / 127.0).max(-1.0)).collect(),
            TypedArray::U8(v) => v.iter().map(|&c| c as f32 / 255.0).collect(),
            TypedArray::I16(v) => v.iter().map(|&c| (c as f32 / 32767.0).max(-1.0)).collect(),
            TypedArray::U16(v) => v.iter().map(|&c| c as f32 / 65535.0).collect(),
            other => other.to_f32(false),
        }
    }

    /// Convert to `u32` (index data).
    pub fn to_u32(&self) -> Vec<u32> {
        with_values!(self, v => v.iter().map(|&c| AsPrimitive::<u32>::as_(c)).collect())
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            TypedArray::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            TypedArray::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Little-endian bytes of component `index` written into `dst`.
    pub fn write_component_le(&self, index: usize, dst: &mut [u8]) {
        with_values!(self, v => v[index].write_le(dst))
    }

    /// Overwrite rows `indices[k]` with row `k` of `values`.
    pub fn patch_rows(
        &mut self,
        indices: &[u32],
        values: &TypedArray,
        num_components: usize,
    ) -> Result<()> {
        let rows = self.len() / num_components.max(1);
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= rows) {
            return Err(GltfError::format(format!(
                "Sparse index {} out of range for accessor with {} elements",
                bad, rows
            )));
        }
        if values.len() < indices.len() * num_components {
            return Err(GltfError::format(format!(
                "Sparse values hold {} components, {} required",
                values.len(),
                indices.len() * num_components
            )));
        }

        macro_rules! patch {
            ($dst:ident, $src:ident) => {{
                for (k, &row) in indices.iter().enumerate() {
                    let to = row as usize * num_components;
                    let from = k * num_components;
                    $dst[to..to + num_components]
                        .copy_from_slice(&$src[from..from + num_components]);
                }
                Ok(())
            }};
        }

        match (self, values) {
            (TypedArray::I8(d), TypedArray::I8(s)) => patch!(d, s),
            (TypedArray::U8(d), TypedArray::U8(s)) => patch!(d, s),
            (TypedArray::I16(d), TypedArray::I16(s)) => patch!(d, s),
            (TypedArray::U16(d), TypedArray::U16(s)) => patch!(d, s),
            (TypedArray::I32(d), TypedArray::I32(s)) => patch!(d, s),
            (TypedArray::U32(d), TypedArray::U32(s)) => patch!(d, s),
            (TypedArray::F32(d), TypedArray::F32(s)) => patch!(d, s),
            (d, s) => Err(GltfError::format(format!(
                "Sparse values type {:?} does not match accessor type {:?}",
                s.component_type(),
                d.component_type()
            ))),
        }
    }
}

// ============================================================================
// AccessorView
// ============================================================================

/// A zero-copy, possibly strided view of accessor elements.
#[derive(Debug, Clone, Copy)]
pub struct AccessorView<'a> {
    bytes: &'a [u8],
    stride: usize,
    component_type: ComponentType,
    num_components: usize,
    count: usize,
}

impl<'a> AccessorView<'a> {
    /// Validate that `count` elements of the given shape fit into `bytes`.
    pub fn new(
        bytes: &'a [u8],
        byte_offset: usize,
        byte_stride: Option<usize>,
        component_type: ComponentType,
        num_components: usize,
        count: usize,
    ) -> Result<Self> {
        let element_size = component_type.byte_length() * num_components;
        let stride = byte_stride.filter(|&s| s > 0).unwrap_or(element_size);

        if stride < element_size {
            return Err(GltfError::format(format!(
                "Byte stride {} smaller than element size {}",
                stride, element_size
            )));
        }

        let required = match count.checked_sub(1) {
            None => Some(byte_offset),
            Some(last) => last
                .checked_mul(stride)
                .and_then(|n| n.checked_add(element_size))
                .and_then(|n| n.checked_add(byte_offset)),
        }
        .ok_or_else(|| {
            GltfError::format(format!(
                "Accessor of {} elements with stride {} overflows the address space",
                count, stride
            ))
        })?;
        if required > bytes.len() {
            return Err(GltfError::format(format!(
                "Accessor needs {} bytes but its buffer view holds {}",
                required,
                bytes.len()
            )));
        }

        Ok(Self {
            bytes: &bytes[byte_offset..required],
            stride,
            component_type,
            num_components,
            count,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn element_size(&self) -> usize {
        self.component_type.byte_length() * self.num_components
    }

    /// Elements are contiguous with no padding between them.
    pub fn is_packed(&self) -> bool {
        self.stride == self.element_size()
    }

    /// Raw bytes covered by the view, from the first element to the end of
    /// the last one.
    pub fn raw_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Raw bytes of element `index`.
    pub fn element_bytes(&self, index: usize) -> &'a [u8] {
        let start = index * self.stride;
        &self.bytes[start..start + self.element_size()]
    }

    /// Read component `component` of element `index`.
    pub fn get<T: Component>(&self, index: usize, component: usize) -> T {
        let start = index * self.stride + component * self.component_type.byte_length();
        T::read_le(&self.bytes[start..])
    }

    fn collect<T: Component>(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.count * self.num_components];
        if self.is_packed() {
            T::read_packed(self.bytes, &mut out);
        } else {
            for i in 0..self.count {
                let row = &mut out[i * self.num_components..(i + 1) * self.num_components];
                T::read_packed(self.element_bytes(i), row);
            }
        }
        out
    }

    /// Copy the view into an owned array of its storage type.
    pub fn read(&self) -> TypedArray {
        match self.component_type {
            ComponentType::Int8 => TypedArray::I8(self.collect()),
            ComponentType::Uint8 => TypedArray::U8(self.collect()),
            ComponentType::Int16 => TypedArray::I16(self.collect()),
            ComponentType::Uint16 => TypedArray::U16(self.collect()),
            ComponentType::Int32 => TypedArray::I32(self.collect()),
            ComponentType::Uint32 => TypedArray::U32(self.collect()),
            ComponentType::Float32 => TypedArray::F32(self.collect()),
        }
    }
}

// ============================================================================
// Accessor reading
// ============================================================================

fn view_at(views: &[ResolvedView], index: usize) -> Result<&ResolvedView> {
    views
        .get(index)
        .ok_or_else(|| GltfError::format(format!("Invalid bufferView index: {}", index)))
}

/// Borrow the non-sparse part of an accessor. Returns `None` when the accessor
/// has no buffer view.
pub fn accessor_view<'a>(
    desc: &AccessorDesc,
    views: &'a [ResolvedView],
) -> Result<Option<AccessorView<'a>>> {
    let Some(view_index) = desc.buffer_view else {
        return Ok(None);
    };
    let view = view_at(views, view_index)?;
    AccessorView::new(
        view.bytes(),
        desc.byte_offset,
        view.byte_stride,
        desc.component_type,
        desc.num_components(),
        desc.count,
    )
    .map(Some)
}

/// Largest byte length a buffer can have in a GLB container.
const MAX_BUFFER_BYTES: usize = u32::MAX as usize;

/// Component count of an accessor with no buffer view. Nothing in the
/// document backs these bytes, so the size is capped at the largest buffer a
/// container can hold.
fn unbacked_len(desc: &AccessorDesc) -> Result<usize> {
    desc.count
        .checked_mul(desc.num_components())
        .filter(|&len| {
            len.checked_mul(desc.component_type.byte_length())
                .is_some_and(|bytes| bytes <= MAX_BUFFER_BYTES)
        })
        .ok_or_else(|| {
            GltfError::format(format!(
                "Accessor without bufferView declares {} elements, more than a buffer can hold",
                desc.count
            ))
        })
}

/// Materialize an accessor, applying its sparse patch if present.
pub fn read_accessor(desc: &AccessorDesc, views: &[ResolvedView]) -> Result<TypedArray> {
    let num_components = desc.num_components();

    let mut values = match accessor_view(desc, views)? {
        Some(view) => view.read(),
        None => TypedArray::zeros(desc.component_type, unbacked_len(desc)?),
    };

    if let Some(sparse) = &desc.sparse {
        if !matches!(
            sparse.indices_component_type,
            ComponentType::Uint8 | ComponentType::Uint16 | ComponentType::Uint32
        ) {
            return Err(GltfError::format(format!(
                "Sparse indices must be unsigned integers, found {:?}",
                sparse.indices_component_type
            )));
        }

        let indices_view = view_at(views, sparse.indices_buffer_view)?;
        let indices = AccessorView::new(
            indices_view.bytes(),
            sparse.indices_byte_offset,
            None,
            sparse.indices_component_type,
            1,
            sparse.count,
        )?
        .read()
        .to_u32();

        let values_view = view_at(views, sparse.values_buffer_view)?;
        let patch = AccessorView::new(
            values_view.bytes(),
            sparse.values_byte_offset,
            None,
            desc.component_type,
            num_components,
            sparse.count,
        )?
        .read();

        values.patch_rows(&indices, &patch, num_components)?;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn vec3_desc(buffer_view: Option<usize>, count: usize) -> AccessorDesc {
        AccessorDesc {
            buffer_view,
            byte_offset: 0,
            component_type: ComponentType::Float32,
            element_type: ElementType::Vec3,
            count,
            normalized: false,
            sparse: None,
            min: None,
            max: None,
        }
    }

    #[test]
    fn test_packed_read() {
        let views = vec![ResolvedView::detached(f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), None)];
        let out = read_accessor(&vec3_desc(Some(0), 2), &views).unwrap();
        assert_eq!(out, TypedArray::F32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_strided_read() {
        // Two vec3 elements interleaved with a trailing float each.
        let bytes = f32_bytes(&[1.0, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0, 9.0]);
        let views = vec![ResolvedView::detached(bytes, Some(16))];
        let out = read_accessor(&vec3_desc(Some(0), 2), &views).unwrap();
        assert_eq!(out, TypedArray::F32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));

        let view = accessor_view(&vec3_desc(Some(0), 2), &views).unwrap().unwrap();
        assert!(!view.is_packed());
        assert_eq!(view.get::<f32>(1, 2), 6.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let views = vec![ResolvedView::detached(f32_bytes(&[1.0, 2.0, 3.0]), None)];
        let err = read_accessor(&vec3_desc(Some(0), 2), &views).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_huge_count_over_view() {
        let views = vec![ResolvedView::detached(f32_bytes(&[1.0, 2.0, 3.0]), None)];
        let err = read_accessor(&vec3_desc(Some(0), 1 << 62), &views).unwrap_err();
        assert!(err.is_format_error());

        let err = AccessorView::new(&[0u8; 12], 4, Some(usize::MAX), ComponentType::Uint8, 1, 2)
            .unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_huge_count_without_view() {
        let err = read_accessor(&vec3_desc(None, 6_917_529_027_641_081_856), &[]).unwrap_err();
        assert!(err.is_format_error());

        // Fits in usize, but exceeds any buffer a container can carry.
        let err = read_accessor(&vec3_desc(None, 1 << 31), &[]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_sparse_over_zeros() {
        let indices_view = ResolvedView::detached(1u16.to_le_bytes().to_vec(), None);
        let values_view = ResolvedView::detached(f32_bytes(&[1.0, 2.0, 3.0]), None);
        let mut desc = vec3_desc(None, 2);
        desc.sparse = Some(SparseDesc {
            count: 1,
            indices_buffer_view: 0,
            indices_byte_offset: 0,
            indices_component_type: ComponentType::Uint16,
            values_buffer_view: 1,
            values_byte_offset: 0,
        });

        let out = read_accessor(&desc, &[indices_view, values_view]).unwrap();
        assert_eq!(out, TypedArray::F32(vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_sparse_over_base() {
        let base = ResolvedView::detached(f32_bytes(&[7.0; 9]), None);
        let indices = ResolvedView::detached(vec![2u8, 0u8], None);
        let values = ResolvedView::detached(f32_bytes(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]), None);
        let mut desc = vec3_desc(Some(0), 3);
        desc.sparse = Some(SparseDesc {
            count: 2,
            indices_buffer_view: 1,
            indices_byte_offset: 0,
            indices_component_type: ComponentType::Uint8,
            values_buffer_view: 2,
            values_byte_offset: 0,
        });

        let out = read_accessor(&desc, &[base, indices, values]).unwrap();
        assert_eq!(
            out,
            TypedArray::F32(vec![2.0, 2.0, 2.0, 7.0, 7.0, 7.0, 1.0, 1.0, 1.0])
        );
    }

    #[test]
    fn test_sparse_index_out_of_range() {
        let indices = ResolvedView::detached(vec![5u8], None);
        let values = ResolvedView::detached(f32_bytes(&[1.0, 2.0, 3.0]), None);
        let mut desc = vec3_desc(None, 2);
        desc.sparse = Some(SparseDesc {
            count: 1,
            indices_buffer_view: 0,
            indices_byte_offset: 0,
            indices_component_type: ComponentType::Uint8,
            values_buffer_view: 1,
            values_byte_offset: 0,
        });
        assert!(read_accessor(&desc, &[indices, values]).is_err());
    }

    #[test]
    fn test_normalization() {
        let ints = TypedArray::I8(vec![127, -128, 0]);
        assert_eq!(ints.to_f32(true), vec![1.0, -1.0, 0.0]);
        let shorts = TypedArray::U16(vec![65535, 0]);
        assert_eq!(shorts.to_f32(true), vec![1.0, 0.0]);
        assert_eq!(TypedArray::U8(vec![3]).to_f32(false), vec![3.0]);
    }

    #[test]
    fn test_integer_components() {
        let bytes: Vec<u8> = [1u16, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = AccessorView::new(&bytes, 2, None, ComponentType::Uint16, 1, 2).unwrap();
        assert_eq!(view.read(), TypedArray::U16(vec![2, 3]));
        assert_eq!(view.read().to_u32(), vec![2, 3]);
    }
}

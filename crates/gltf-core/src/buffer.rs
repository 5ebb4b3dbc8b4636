//! Resolved byte storage and buffer-view ranges.
//!
//! A resolved buffer is shared behind an `Arc` so that buffer views, accessor
//! views and the images that reference them slice into it without copying.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{GltfError, Result};

/// An immutable, cheaply clonable byte range.
#[derive(Clone)]
pub struct BufferSlice {
    data: Arc<[u8]>,
    range: Range<usize>,
}

impl BufferSlice {
    /// Take ownership of `bytes` as a whole-buffer slice.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            data: Arc::from(bytes),
            range: 0..len,
        }
    }

    /// A sub-range of this slice. `range` is relative to the slice start.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(GltfError::format(format!(
                "Byte range {}..{} exceeds buffer of {} bytes",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(Self {
            data: Arc::clone(&self.data),
            range: self.range.start + range.start..self.range.start + range.end,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Whether two slices share the same backing allocation.
    pub fn shares_storage(&self, other: &BufferSlice) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for BufferSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlice")
            .field("range", &self.range)
            .finish()
    }
}

impl From<Vec<u8>> for BufferSlice {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

/// A buffer view after its buffer has been resolved.
#[derive(Debug, Clone)]
pub struct ResolvedView {
    /// Source buffer index; `None` when a hook supplied the bytes directly.
    pub buffer: Option<usize>,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Distance between elements; `None` means tightly packed.
    pub byte_stride: Option<usize>,
    pub data: BufferSlice,
}

impl ResolvedView {
    /// Slice `byte_offset..byte_offset + byte_length` out of a resolved buffer.
    pub fn new(
        buffer_index: usize,
        buffer: &BufferSlice,
        byte_offset: usize,
        byte_length: usize,
        byte_stride: Option<usize>,
    ) -> Result<Self> {
        let end = byte_offset.checked_add(byte_length).ok_or_else(|| {
            GltfError::format("Buffer view byte range overflows".to_string())
        })?;
        let data = buffer.slice(byte_offset..end).map_err(|_| {
            GltfError::format(format!(
                "Buffer view range {}..{} exceeds buffer {} ({} bytes)",
                byte_offset,
                end,
                buffer_index,
                buffer.len()
            ))
        })?;
        Ok(Self {
            buffer: Some(buffer_index),
            byte_offset,
            byte_length,
            byte_stride: byte_stride.filter(|&s| s > 0),
            data,
        })
    }

    /// A view over bytes that did not come from a document buffer.
    pub fn detached(bytes: Vec<u8>, byte_stride: Option<usize>) -> Self {
        let byte_length = bytes.len();
        Self {
            buffer: None,
            byte_offset: 0,
            byte_length,
            byte_stride: byte_stride.filter(|&s| s > 0),
            data: BufferSlice::from_vec(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.data.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_shares_storage() {
        let buffer = BufferSlice::from_vec((0u8..16).collect());
        let a = buffer.slice(4..8).unwrap();
        let b = a.slice(1..3).unwrap();
        assert_eq!(a.bytes(), &[4, 5, 6, 7]);
        assert_eq!(b.bytes(), &[5, 6]);
        assert!(a.shares_storage(&buffer));
        assert!(b.shares_storage(&buffer));
    }

    #[test]
    fn test_slice_out_of_range() {
        let buffer = BufferSlice::from_vec(vec![0; 4]);
        assert!(buffer.slice(2..6).is_err());
    }

    #[test]
    fn test_view_bounds() {
        let buffer = BufferSlice::from_vec(vec![0; 10]);
        let view = ResolvedView::new(0, &buffer, 2, 8, Some(0)).unwrap();
        assert_eq!(view.bytes().len(), 8);
        assert_eq!(view.byte_stride, None);
        assert!(ResolvedView::new(0, &buffer, 4, 8, None).is_err());
    }
}

//! Core building blocks for the glTF loader.
//!
//! This crate holds everything that does not need a parsed document or an
//! async runtime:
//!
//! - [`chunk`]: GLB container validation and splitting (plus a writer)
//! - [`accessor`]: typed, strided and sparse accessor reading
//! - [`buffer`]: shared byte slices and resolved buffer views
//! - [`hash`]: order-independent structural hashing used for deduplication
//! - [`error`]: the error taxonomy shared with `gltf-io`
//!
//! ```ignore
//! use gltf_core::chunk::read_chunks;
//!
//! let chunks = read_chunks(&bytes, Some("model.glb"))?;
//! println!("{} bytes of JSON, binary chunk: {}", chunks.json.len(), chunks.bin.is_some());
//! ```

#![allow(clippy::needless_range_loop)]

pub mod accessor;
pub mod buffer;
pub mod chunk;
pub mod data_types;
pub mod error;
pub mod hash;

pub use accessor::{
    accessor_view, read_accessor, AccessorDesc, AccessorView, SparseDesc, TypedArray,
};
pub use buffer::{BufferSlice, ResolvedView};
pub use chunk::{read_chunks, read_glb, write_glb, Chunks};
pub use data_types::{ComponentType, ElementType};
pub use error::{GltfError, Result};
pub use hash::structural_hash;

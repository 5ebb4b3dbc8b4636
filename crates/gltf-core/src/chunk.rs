//! GLB binary container reading and writing.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [magic = 0x46546C67][version = 2][total length]
//! [chunk length][chunk type = JSON][JSON bytes]
//! [chunk length][chunk type = BIN\0][binary bytes]   (optional)
//! ```
//!
//! Exactly one or two chunks are accepted. The first must be JSON and the
//! second, when present, must be BIN.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{GltfError, Result};

// ============================================================================
// GLB Binary Format Constants
// ============================================================================

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF" in little-endian
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// The chunks of a container, borrowed from the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunks<'a> {
    /// JSON metadata bytes.
    pub json: &'a [u8],
    /// Binary payload, if the container carries one.
    pub bin: Option<&'a [u8]>,
}

/// Whether a file name selects the binary container format.
pub fn is_glb_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("glb"))
        .unwrap_or(false)
}

/// Whether `data` starts with the GLB magic.
pub fn has_glb_magic(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == GLB_MAGIC
}

/// Split input bytes into metadata and binary chunks.
///
/// With a file name, the extension alone picks the format: `.glb` is parsed
/// as a container and anything else is treated as a bare JSON document.
/// Without a file name the magic bytes decide.
pub fn read_chunks<'a>(data: &'a [u8], filename: Option<&str>) -> Result<Chunks<'a>> {
    let is_glb = match filename {
        Some(name) => is_glb_filename(name),
        None => has_glb_magic(data),
    };

    if is_glb {
        read_glb(data)
    } else {
        Ok(Chunks {
            json: data,
            bin: None,
        })
    }
}

/// Parse a GLB container.
pub fn read_glb(data: &[u8]) -> Result<Chunks<'_>> {
    if data.len() < HEADER_LEN {
        return Err(GltfError::format(format!(
            "GLB header requires {} bytes, found {}",
            HEADER_LEN,
            data.len()
        )));
    }

    let magic = LittleEndian::read_u32(&data[0..4]);
    let version = LittleEndian::read_u32(&data[4..8]);
    let length = LittleEndian::read_u32(&data[8..12]) as usize;

    if magic != GLB_MAGIC {
        return Err(GltfError::format(format!(
            "Invalid GLB magic: expected 0x{:08X}, found 0x{:08X}",
            GLB_MAGIC, magic
        )));
    }
    if version != GLB_VERSION {
        return Err(GltfError::format(format!(
            "Unsupported GLB version: expected {}, found {}",
            GLB_VERSION, version
        )));
    }
    if length > data.len() {
        return Err(GltfError::format(format!(
            "GLB declares {} bytes but only {} are available",
            length,
            data.len()
        )));
    }

    let mut chunks: Vec<(u32, &[u8])> = Vec::with_capacity(2);
    let mut offset = HEADER_LEN;

    while offset < length {
        if offset + CHUNK_HEADER_LEN > length {
            return Err(GltfError::format(format!(
                "Truncated chunk header at byte {}",
                offset
            )));
        }
        let chunk_length = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
        offset += CHUNK_HEADER_LEN;

        let end = offset
            .checked_add(chunk_length)
            .filter(|&end| end <= length)
            .ok_or_else(|| {
                GltfError::format(format!(
                    "Chunk {} of {} bytes extends past container end ({} bytes)",
                    chunks.len(),
                    chunk_length,
                    length
                ))
            })?;

        chunks.push((chunk_type, &data[offset..end]));
        offset = end;
    }

    if chunks.is_empty() || chunks.len() > 2 {
        return Err(GltfError::format(format!(
            "Invalid GLB chunk count: expected 1 or 2, found {}",
            chunks.len()
        )));
    }

    let (json_type, json) = chunks[0];
    if json_type != GLB_CHUNK_JSON {
        return Err(GltfError::format(format!(
            "Invalid chunk 0 type: expected 0x{:08X} (JSON), found 0x{:08X}",
            GLB_CHUNK_JSON, json_type
        )));
    }

    let bin = match chunks.get(1) {
        Some(&(GLB_CHUNK_BIN, bin)) => Some(bin),
        Some(&(other, _)) => {
            return Err(GltfError::format(format!(
                "Invalid chunk 1 type: expected 0x{:08X} (BIN), found 0x{:08X}",
                GLB_CHUNK_BIN, other
            )));
        }
        None => None,
    };

    Ok(Chunks { json, bin })
}

/// Build a GLB container. The JSON chunk is padded with spaces and the binary
/// chunk with zeros to 4-byte boundaries.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padding = (4 - (json.len() % 4)) % 4;
    let padded_json_len = json.len() + json_padding;

    let padded_bin_len = bin.map(|b| b.len() + (4 - (b.len() % 4)) % 4);

    let total_len = HEADER_LEN
        + CHUNK_HEADER_LEN
        + padded_json_len
        + padded_bin_len.map_or(0, |len| CHUNK_HEADER_LEN + len);

    let mut output = Vec::with_capacity(total_len);

    // Header
    output.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    output.extend_from_slice(&GLB_VERSION.to_le_bytes());
    output.extend_from_slice(&(total_len as u32).to_le_bytes());

    // JSON chunk
    output.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    output.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    output.extend_from_slice(json);
    output.resize(output.len() + json_padding, b' ');

    // BIN chunk
    if let (Some(bin), Some(padded_len)) = (bin, padded_bin_len) {
        output.extend_from_slice(&(padded_len as u32).to_le_bytes());
        output.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        output.extend_from_slice(bin);
        output.resize(output.len() + (padded_len - bin.len()), 0);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_container(magic: u32, version: u32, chunks: &[(u32, &[u8])]) -> Vec<u8> {
        let body: usize = chunks.iter().map(|(_, d)| 8 + d.len()).sum();
        let mut out = Vec::new();
        out.extend_from_slice(&magic.to_le_bytes());
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&((12 + body) as u32).to_le_bytes());
        for (ty, data) in chunks {
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn test_glb_magic() {
        // "glTF" in ASCII = 0x67, 0x6C, 0x54, 0x46
        assert_eq!(u32::from_le_bytes(*b"glTF"), GLB_MAGIC);
        assert_eq!(u32::from_le_bytes(*b"JSON"), GLB_CHUNK_JSON);
        assert_eq!(u32::from_le_bytes(*b"BIN\0"), GLB_CHUNK_BIN);
    }

    #[test]
    fn test_bad_magic_names_expected() {
        let data = raw_container(0, 2, &[(GLB_CHUNK_JSON, b"{}  ")]);
        let err = read_glb(&data).unwrap_err();
        assert!(err.is_format_error());
        let msg = err.to_string();
        assert!(msg.contains("0x46546C67"), "{}", msg);
        assert!(msg.contains("0x00000000"), "{}", msg);
    }

    #[test]
    fn test_bad_version_names_expected() {
        let data = raw_container(GLB_MAGIC, 1, &[(GLB_CHUNK_JSON, b"{}  ")]);
        let msg = read_glb(&data).unwrap_err().to_string();
        assert!(msg.contains("expected 2"), "{}", msg);
        assert!(msg.contains("found 1"), "{}", msg);
    }

    #[test]
    fn test_single_chunk() {
        let data = raw_container(GLB_MAGIC, 2, &[(GLB_CHUNK_JSON, b"{}  ")]);
        let chunks = read_glb(&data).unwrap();
        assert_eq!(chunks.json, b"{}  ");
        assert!(chunks.bin.is_none());
    }

    #[test]
    fn test_three_chunks_rejected() {
        let data = raw_container(
            GLB_MAGIC,
            2,
            &[
                (GLB_CHUNK_JSON, b"{}  "),
                (GLB_CHUNK_BIN, &[0; 4]),
                (GLB_CHUNK_BIN, &[0; 4]),
            ],
        );
        let msg = read_glb(&data).unwrap_err().to_string();
        assert!(msg.contains("found 3"), "{}", msg);
    }

    #[test]
    fn test_zero_chunks_rejected() {
        let data = raw_container(GLB_MAGIC, 2, &[]);
        assert!(read_glb(&data).is_err());
    }

    #[test]
    fn test_first_chunk_must_be_json() {
        let data = raw_container(GLB_MAGIC, 2, &[(GLB_CHUNK_BIN, &[0; 4])]);
        let msg = read_glb(&data).unwrap_err().to_string();
        assert!(msg.contains("0x4E4F534A"), "{}", msg);
    }

    #[test]
    fn test_second_chunk_must_be_bin() {
        let data = raw_container(
            GLB_MAGIC,
            2,
            &[(GLB_CHUNK_JSON, b"{}  "), (GLB_CHUNK_JSON, b"{}  ")],
        );
        let msg = read_glb(&data).unwrap_err().to_string();
        assert!(msg.contains("0x004E4942"), "{}", msg);
    }

    #[test]
    fn test_chunk_past_end() {
        let mut data = raw_container(GLB_MAGIC, 2, &[(GLB_CHUNK_JSON, b"{}  ")]);
        // Inflate the chunk length beyond the container.
        data[12..16].copy_from_slice(&100u32.to_le_bytes());
        assert!(read_glb(&data).is_err());
    }

    #[test]
    fn test_truncated_header() {
        assert!(read_glb(&[0x67, 0x6C, 0x54]).is_err());
    }

    #[test]
    fn test_filename_selects_format() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let chunks = read_chunks(json, Some("model.gltf")).unwrap();
        assert_eq!(chunks.json, json);
        assert!(chunks.bin.is_none());

        // A .glb name forces container parsing even for JSON bytes.
        assert!(read_chunks(json, Some("MODEL.GLB")).is_err());

        let glb = write_glb(json, Some(&[1, 2, 3, 4]));
        let chunks = read_chunks(&glb, None).unwrap();
        assert_eq!(chunks.bin, Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_write_glb_padding() {
        let glb = write_glb(b"{}", Some(&[9]));
        assert_eq!(glb.len() % 4, 0);
        let chunks = read_glb(&glb).unwrap();
        assert_eq!(chunks.json, b"{}  ");
        assert_eq!(chunks.bin, Some(&[9u8, 0, 0, 0][..]));
    }
}

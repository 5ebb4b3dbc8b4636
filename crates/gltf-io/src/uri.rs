//! URI helpers: data URIs, relative path joining and MIME detection.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gltf_core::error::{GltfError, Result};

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Decode `data:[<mediatype>][;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<DataUri> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GltfError::format("Not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GltfError::format("Invalid data URI: no comma".to_string()))?;

    let mut params = header.split(';');
    let mime_type = params
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let is_base64 = params.any(|p| p == "base64");

    let data = if is_base64 {
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| GltfError::format(format!("Invalid base64 in data URI: {}", e)))?
    } else {
        percent_decode(payload)
    };

    Ok(DataUri { mime_type, data })
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
fn percent_decode(input: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut rest = input.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        let escaped = match (byte, tail.get(..2)) {
            (b'%', Some(hex)) if hex.iter().all(u8::is_ascii_hexdigit) => {
                std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok())
            }
            _ => None,
        };
        match escaped {
            Some(decoded) => {
                output.push(decoded);
                rest = &tail[2..];
            }
            None => {
                output.push(byte);
                rest = tail;
            }
        }
    }
    output
}

/// Whether `uri` is absolute and must not be joined with the base path.
pub fn is_absolute(uri: &str) -> bool {
    uri.starts_with('/') || uri.contains("://") || is_data_uri(uri)
}

/// Resolve `uri` against `base_path` and strip `registry_prefix` from the
/// result, so the fetch collaborator does not apply its prefix twice.
pub fn resolve_url(base_path: &str, uri: &str, registry_prefix: Option<&str>) -> String {
    let joined = if is_absolute(uri) || base_path.is_empty() {
        uri.to_string()
    } else if base_path.ends_with('/') {
        format!("{}{}", base_path, uri)
    } else {
        format!("{}/{}", base_path, uri)
    };

    match registry_prefix {
        Some(prefix) if !prefix.is_empty() => joined
            .strip_prefix(prefix)
            .map(str::to_string)
            .unwrap_or(joined),
        _ => joined,
    }
}

/// Directory part of a file path or URL, including the trailing slash.
pub fn base_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

/// MIME type guessed from a file extension.
pub fn mime_from_extension(uri: &str) -> Option<&'static str> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "ktx2" => Some("image/ktx2"),
        "basis" => Some("image/basis"),
        _ => None,
    }
}

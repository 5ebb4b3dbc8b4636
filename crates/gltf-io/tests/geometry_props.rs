//! Property tests for geometry construction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::executor::block_on;
use gltf_io::{GltfLoader, LoadOptions, Semantic};
use proptest::prelude::*;
use serde_json::json;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn point_cloud(positions: &[f32], uvs: &[f32]) -> serde_json::Value {
    let mut bytes = f32_bytes(positions);
    bytes.extend(f32_bytes(uvs));
    let count = positions.len() / 3;
    json!({
        "asset": {"version": "2.0"},
        "buffers": [{
            "byteLength": bytes.len(),
            "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&bytes))
        }],
        "bufferViews": [
            {"buffer": 0, "byteLength": positions.len() * 4},
            {"buffer": 0, "byteOffset": positions.len() * 4, "byteLength": uvs.len() * 4}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": count, "type": "VEC3"},
            {"bufferView": 1, "componentType": 5126, "count": count, "type": "VEC2"}
        ],
        "meshes": [{"primitives": [{"attributes": {"TEXCOORD_0": 1, "POSITION": 0}, "mode": 0}]}]
    })
}

proptest! {
    #[test]
    fn prop_uv_v_flipped_once(
        vertices in prop::collection::vec((-10.0f32..10.0, 0.0f32..1.0, 0.0f32..1.0), 1..32)
    ) {
        let positions: Vec<f32> = vertices.iter().flat_map(|&(x, _, _)| [x, 0.0, 0.0]).collect();
        let uvs: Vec<f32> = vertices.iter().flat_map(|&(_, u, v)| [u, v]).collect();
        let doc = point_cloud(&positions, &uvs);

        let loader = GltfLoader::new(LoadOptions::default());
        let bundle = block_on(loader.parse(doc.to_string().as_bytes(), None)).unwrap();
        let vb = &bundle.geometry_groups[0].primitives[0].geometry.vertex_buffer;

        prop_assert_eq!(vb.num_vertices, vertices.len());
        prop_assert_eq!(vb.attribute_f32(Semantic::Position).unwrap(), positions);
        let read = vb.attribute_f32(Semantic::TexCoord0).unwrap();
        for (i, &(_, u, v)) in vertices.iter().enumerate() {
            prop_assert_eq!(read[i * 2], u);
            prop_assert_eq!(read[i * 2 + 1], 1.0 - v);
        }
    }
}

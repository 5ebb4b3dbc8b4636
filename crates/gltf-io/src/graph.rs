//! Node hierarchy, scenes, cameras, lights and skins.
//!
//! Nodes live in an index arena; `parent` and `children` are indices into the
//! same `Vec<Node>`.

use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Quat, Vec3};
use gltf_core::accessor::read_accessor;
use gltf_core::buffer::ResolvedView;
use gltf_core::error::{GltfError, Result};

use crate::document::{CameraDef, Document, LightDef, NodeDef, SceneDef, SkinDef};
use crate::hooks::Hooks;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub camera: Option<usize>,
    pub light: Option<usize>,
    pub skin: Option<usize>,
    /// Per-node morph weight override.
    pub weights: Option<Vec<f32>>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
            children: Vec::new(),
            camera: None,
            light: None,
            skin: None,
            weights: None,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub name: Option<String>,
    /// Root node indices.
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        yfov: f32,
        aspect_ratio: Option<f32>,
        znear: f32,
        /// `None` means an infinite projection.
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: Option<String>,
    pub projection: Projection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub name: Option<String>,
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub range: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub name: Option<String>,
    /// Bone node indices.
    pub joints: Vec<usize>,
    /// One matrix per joint.
    pub inverse_bind_matrices: Vec<Mat4>,
    pub skeleton: Option<usize>,
}

// ============================================================================
// Nodes
// ============================================================================

/// Build every node, then wire the hierarchy.
pub(crate) fn build_nodes(doc: &Document, hooks: &Hooks) -> Result<Vec<Node>> {
    let mut nodes = doc
        .nodes
        .iter()
        .enumerate()
        .map(|(i, def)| hooks.node.construct(def, |def| build_node(i, def, doc)))
        .collect::<Result<Vec<_>>>()?;
    link_hierarchy(&mut nodes, &doc.nodes)?;
    Ok(nodes)
}

fn build_node(index: usize, def: &NodeDef, doc: &Document) -> Result<Node> {
    let name = match &def.name {
        Some(name) => name.replace('/', "_"),
        None => format!("node_{}", index),
    };
    let mut node = Node::new(name);

    if let Some(m) = &def.matrix {
        let (scale, rotation, translation) =
            Mat4::from_cols_array(m).to_scale_rotation_translation();
        node.translation = translation;
        node.rotation = rotation;
        node.scale = scale;
    }
    // Explicit TRS fields win over a decomposed matrix.
    if let Some(t) = def.translation {
        node.translation = Vec3::from_array(t);
    }
    if let Some(r) = def.rotation {
        node.rotation = Quat::from_array(r);
    }
    if let Some(s) = def.scale {
        node.scale = Vec3::from_array(s);
    }

    node.camera = checked(def.camera, doc.cameras.len(), "camera")?;
    node.skin = checked(def.skin, doc.skins.len(), "skin")?;
    node.light = def.light();
    node.weights = def.weights.clone();
    Ok(node)
}

fn checked(index: Option<usize>, len: usize, what: &str) -> Result<Option<usize>> {
    match index {
        Some(i) if i >= len => Err(GltfError::format(format!("Invalid {} index: {}", what, i))),
        other => Ok(other),
    }
}

/// Attach children to the first parent that claims them. Later claims, and
/// claims that would close a cycle, are ignored.
fn link_hierarchy(nodes: &mut [Node], defs: &[NodeDef]) -> Result<()> {
    for (parent, def) in defs.iter().enumerate() {
        for &child in &def.children {
            if child >= nodes.len() {
                return Err(GltfError::format(format!(
                    "Node {} lists invalid child index {}",
                    parent, child
                )));
            }
            if nodes[child].parent.is_some() || is_ancestor(nodes, child, parent) {
                continue;
            }
            nodes[child].parent = Some(parent);
            nodes[parent].children.push(child);
        }
    }
    Ok(())
}

/// Whether `ancestor` is `node` or one of its ancestors.
fn is_ancestor(nodes: &[Node], ancestor: usize, node: usize) -> bool {
    let mut current = Some(node);
    while let Some(i) = current {
        if i == ancestor {
            return true;
        }
        current = nodes[i].parent;
    }
    false
}

/// Node indices from `node` up to its hierarchy root, inclusive.
pub fn path_to_root(nodes: &[Node], node: usize) -> Vec<usize> {
    let mut path = vec![node];
    let mut current = nodes[node].parent;
    while let Some(i) = current {
        path.push(i);
        current = nodes[i].parent;
    }
    path
}

// ============================================================================
// Scenes
// ============================================================================

/// Build scenes and pick the default. A document without scenes but with
/// nodes gets one synthesized scene of every parentless node.
pub(crate) fn build_scenes(
    doc: &Document,
    nodes: &[Node],
    hooks: &Hooks,
) -> Result<(Vec<Scene>, Option<usize>)> {
    if doc.scenes.is_empty() {
        if nodes.is_empty() {
            return Ok((Vec::new(), None));
        }
        let roots = (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect();
        let scene = Scene {
            name: Some("Scene".to_string()),
            nodes: roots,
        };
        return Ok((vec![scene], Some(0)));
    }

    let scenes = doc
        .scenes
        .iter()
        .map(|def| hooks.scene.construct(def, |def| build_scene(def, nodes.len())))
        .collect::<Result<Vec<_>>>()?;
    let default_scene = checked(Some(doc.scene.unwrap_or(0)), scenes.len(), "scene")?;
    Ok((scenes, default_scene))
}

fn build_scene(def: &SceneDef, num_nodes: usize) -> Result<Scene> {
    for &n in &def.nodes {
        checked(Some(n), num_nodes, "scene node")?;
    }
    Ok(Scene {
        name: def.name.clone(),
        nodes: def.nodes.clone(),
    })
}

// ============================================================================
// Cameras and lights
// ============================================================================

pub(crate) fn build_camera(def: &CameraDef) -> Result<Camera> {
    let projection = match def.camera_type.as_str() {
        "perspective" => {
            let p = def
                .perspective
                .as_ref()
                .ok_or_else(|| {
                    GltfError::format("Perspective camera without perspective properties")
                })?;
            Projection::Perspective {
                yfov: p.yfov,
                aspect_ratio: p.aspect_ratio,
                znear: p.znear,
                zfar: p.zfar,
            }
        }
        "orthographic" => {
            let o = def
                .orthographic
                .as_ref()
                .ok_or_else(|| {
                    GltfError::format("Orthographic camera without orthographic properties")
                })?;
            Projection::Orthographic {
                xmag: o.xmag,
                ymag: o.ymag,
                znear: o.znear,
                zfar: o.zfar,
            }
        }
        other => return Err(GltfError::format(format!("Unknown camera type: {}", other))),
    };
    Ok(Camera {
        name: def.name.clone(),
        projection,
    })
}

pub(crate) fn build_light(def: &LightDef) -> Result<Light> {
    let kind = match def.light_type.as_str() {
        "directional" => LightKind::Directional,
        "point" => LightKind::Point,
        "spot" => {
            let spot = def.spot.clone().unwrap_or_default();
            LightKind::Spot {
                inner_cone_angle: spot.inner_cone_angle.unwrap_or(0.0),
                outer_cone_angle: spot.outer_cone_angle.unwrap_or(FRAC_PI_4),
            }
        }
        other => return Err(GltfError::format(format!("Unknown light type: {}", other))),
    };
    Ok(Light {
        name: def.name.clone(),
        kind,
        color: def.color.map(Vec3::from_array).unwrap_or(Vec3::ONE),
        intensity: def.intensity.unwrap_or(1.0),
        range: def.range,
    })
}

// ============================================================================
// Skins
// ============================================================================

pub(crate) fn build_skin(def: &SkinDef, doc: &Document, views: &[ResolvedView]) -> Result<Skin> {
    for &joint in &def.joints {
        checked(Some(joint), doc.nodes.len(), "joint node")?;
    }

    let inverse_bind_matrices = match def.inverse_bind_matrices {
        Some(accessor) => {
            let desc = doc.accessor_desc(accessor)?;
            let values = read_accessor(&desc, views)?.to_f32(desc.normalized);
            if values.len() < def.joints.len() * 16 {
                return Err(GltfError::format(format!(
                    "Skin has {} joints but only {} inverse bind matrices",
                    def.joints.len(),
                    values.len() / 16
                )));
            }
            values.chunks_exact(16).map(Mat4::from_cols_slice).collect()
        }
        None => vec![Mat4::IDENTITY; def.joints.len()],
    };

    Ok(Skin {
        name: def.name.clone(),
        joints: def.joints.clone(),
        inverse_bind_matrices,
        skeleton: checked(def.skeleton, doc.nodes.len(), "skeleton node")?,
    })
}

/// Geometry group index for every node.
pub(crate) fn node_models(doc: &Document) -> Result<Vec<Option<usize>>> {
    doc.nodes
        .iter()
        .map(|n| checked(n.mesh, doc.meshes.len(), "mesh"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_metadata;

    fn nodes_of(json: &str) -> Vec<Node> {
        let doc = parse_metadata(json.as_bytes()).unwrap();
        build_nodes(&doc, &Hooks::default()).unwrap()
    }

    #[test]
    fn test_names() {
        let nodes = nodes_of(r#"{"nodes": [{"name": "arm/left"}, {}]}"#);
        assert_eq!(nodes[0].name, "arm_left");
        assert_eq!(nodes[1].name, "node_1");
    }

    #[test]
    fn test_explicit_fields_override_matrix() {
        let nodes = nodes_of(
            r#"{"nodes": [{
                "matrix": [2,0,0,0, 0,2,0,0, 0,0,2,0, 5,6,7,1],
                "translation": [1, 2, 3]
            }]}"#,
        );
        assert!(nodes[0].translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert!(nodes[0].scale.abs_diff_eq(Vec3::splat(2.0), 1e-6));
    }

    #[test]
    fn test_first_claim_wins() {
        let nodes = nodes_of(r#"{"nodes": [{"children": [2]}, {"children": [2]}, {}]}"#);
        assert_eq!(nodes[2].parent, Some(0));
        assert_eq!(nodes[0].children, vec![2]);
        assert!(nodes[1].children.is_empty());
    }

    #[test]
    fn test_cycle_claim_ignored() {
        let nodes =
            nodes_of(r#"{"nodes": [{"children": [1]}, {"children": [0]}, {"children": [2]}]}"#);
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[0].parent, None);
        assert_eq!(nodes[2].parent, None);
        assert_eq!(path_to_root(&nodes, 1), vec![1, 0]);
    }

    #[test]
    fn test_invalid_child() {
        let doc = parse_metadata(br#"{"nodes": [{"children": [4]}]}"#).unwrap();
        assert!(build_nodes(&doc, &Hooks::default()).unwrap_err().is_format_error());
    }

    #[test]
    fn test_synthesized_scene() {
        let doc = parse_metadata(br#"{"nodes": [{"children": [1]}, {}, {}]}"#).unwrap();
        let nodes = build_nodes(&doc, &Hooks::default()).unwrap();
        let (scenes, default_scene) = build_scenes(&doc, &nodes, &Hooks::default()).unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].nodes, vec![0, 2]);
        assert_eq!(default_scene, Some(0));
    }

    #[test]
    fn test_declared_default_scene() {
        let doc = parse_metadata(
            br#"{"scene": 1, "scenes": [{"nodes": []}, {"nodes": [0]}], "nodes": [{}]}"#,
        )
        .unwrap();
        let nodes = build_nodes(&doc, &Hooks::default()).unwrap();
        let (scenes, default_scene) = build_scenes(&doc, &nodes, &Hooks::default()).unwrap();
        assert_eq!(scenes[1].nodes, vec![0]);
        assert_eq!(default_scene, Some(1));
    }

    #[test]
    fn test_light_defaults() {
        let def: LightDef = serde_json::from_str(r#"{"type": "spot"}"#).unwrap();
        let light = build_light(&def).unwrap();
        assert_eq!(light.color, Vec3::ONE);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(
            light.kind,
            LightKind::Spot {
                inner_cone_angle: 0.0,
                outer_cone_angle: FRAC_PI_4
            }
        );
        let def: LightDef = serde_json::from_str(r#"{"type": "area"}"#).unwrap();
        assert!(build_light(&def).is_err());
    }

    #[test]
    fn test_camera() {
        let def: CameraDef = serde_json::from_str(
            r#"{"type": "perspective", "perspective": {"yfov": 0.8, "znear": 0.1}}"#,
        )
        .unwrap();
        let camera = build_camera(&def).unwrap();
        assert!(matches!(camera.projection, Projection::Perspective { zfar: None, .. }));
        let def: CameraDef = serde_json::from_str(r#"{"type": "orthographic"}"#).unwrap();
        assert!(build_camera(&def).unwrap_err().is_format_error());
    }

    #[test]
    fn test_skin_identity_default() {
        let doc = parse_metadata(
            br#"{"nodes": [{}, {}], "skins": [{"joints": [0, 1], "skeleton": 0}]}"#,
        )
        .unwrap();
        let skin = build_skin(&doc.skins[0], &doc, &[]).unwrap();
        assert_eq!(skin.inverse_bind_matrices, vec![Mat4::IDENTITY; 2]);
        assert_eq!(skin.skeleton, Some(0));
    }
}

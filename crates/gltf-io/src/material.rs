//! Material construction (metallic-roughness model).

use glam::{Vec2, Vec3, Vec4};
use gltf_core::error::{GltfError, Result};

use crate::document::{HasExtensions, MaterialDef, TextureInfoDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "OPAQUE" => Ok(AlphaMode::Opaque),
            "MASK" => Ok(AlphaMode::Mask),
            "BLEND" => Ok(AlphaMode::Blend),
            _ => Err(GltfError::format(format!("Unknown alphaMode: {}", name))),
        }
    }
}

/// `KHR_texture_transform` on a texture reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub offset: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    /// Overrides the reference's `texCoord` when present.
    pub tex_coord: Option<u32>,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            tex_coord: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    /// Index into the bundle's texture list.
    pub texture: usize,
    pub tex_coord: u32,
    pub transform: Option<TextureTransform>,
}

impl TextureRef {
    fn from_def(def: &TextureInfoDef) -> Self {
        let transform = def.extension("KHR_texture_transform").map(|ext| {
            let pair = |key: &str, default: Vec2| {
                ext.get(key)
                    .and_then(|v| v.as_array())
                    .filter(|a| a.len() >= 2)
                    .map(|a| {
                        Vec2::new(
                            a[0].as_f64().unwrap_or(default.x as f64) as f32,
                            a[1].as_f64().unwrap_or(default.y as f64) as f32,
                        )
                    })
                    .unwrap_or(default)
            };
            TextureTransform {
                offset: pair("offset", Vec2::ZERO),
                rotation: ext.get("rotation").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
                scale: pair("scale", Vec2::ONE),
                tex_coord: ext.get("texCoord").and_then(|v| v.as_u64()).map(|t| t as u32),
            }
        });
        Self {
            texture: def.index,
            tex_coord: def.tex_coord,
            transform,
        }
    }

    /// UV set actually sampled, after any transform override.
    pub fn uv_set(&self) -> u32 {
        self.transform
            .and_then(|t| t.tex_coord)
            .unwrap_or(self.tex_coord)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub base_color_texture: Option<TextureRef>,
    pub metallic: f32,
    pub roughness: f32,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub normal_texture: Option<TextureRef>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
    pub emissive: Vec3,
    pub emissive_texture: Option<TextureRef>,
    pub emissive_strength: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    /// `KHR_materials_unlit`.
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::ONE,
            base_color_texture: None,
            metallic: 1.0,
            roughness: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive: Vec3::ZERO,
            emissive_texture: None,
            emissive_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            unlit: false,
        }
    }
}

pub fn build_material(index: usize, def: &MaterialDef) -> Result<Material> {
    let mut material = Material {
        name: def.name.clone().unwrap_or_else(|| format!("material_{}", index)),
        double_sided: def.double_sided,
        ..Default::default()
    };

    if let Some(pbr) = &def.pbr_metallic_roughness {
        if let Some(c) = pbr.base_color_factor {
            material.base_color = Vec4::from_array(c);
        }
        material.metallic = pbr.metallic_factor.unwrap_or(1.0);
        material.roughness = pbr.roughness_factor.unwrap_or(1.0);
        material.base_color_texture = pbr.base_color_texture.as_ref().map(TextureRef::from_def);
        material.metallic_roughness_texture = pbr
            .metallic_roughness_texture
            .as_ref()
            .map(TextureRef::from_def);
    }

    if let Some(normal) = &def.normal_texture {
        material.normal_scale = normal.scale.unwrap_or(1.0);
        material.normal_texture = Some(TextureRef::from_def(normal));
    }
    if let Some(occlusion) = &def.occlusion_texture {
        material.occlusion_strength = occlusion.strength.unwrap_or(1.0);
        material.occlusion_texture = Some(TextureRef::from_def(occlusion));
    }
    material.emissive_texture = def.emissive_texture.as_ref().map(TextureRef::from_def);
    if let Some(e) = def.emissive_factor {
        material.emissive = Vec3::from_array(e);
    }

    if let Some(mode) = &def.alpha_mode {
        material.alpha_mode = AlphaMode::from_name(mode)?;
    }
    if let Some(cutoff) = def.alpha_cutoff {
        material.alpha_cutoff = cutoff;
    }

    material.unlit = def.extension("KHR_materials_unlit").is_some();
    if let Some(strength) = def
        .extension("KHR_materials_emissive_strength")
        .and_then(|e| e.get("emissiveStrength"))
        .and_then(|v| v.as_f64())
    {
        material.emissive_strength = strength as f32;
    }

    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material_def(json: &str) -> MaterialDef {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let m = build_material(3, &MaterialDef::default()).unwrap();
        assert_eq!(m.name, "material_3");
        assert_eq!(m.base_color, Vec4::ONE);
        assert_eq!(m.metallic, 1.0);
        assert_eq!(m.alpha_mode, AlphaMode::Opaque);
        assert!(!m.unlit);
    }

    #[test]
    fn test_full_material() {
        let def = material_def(
            r#"{
                "name": "Glass",
                "pbrMetallicRoughness": {
                    "baseColorFactor": [1, 0, 0, 0.5],
                    "metallicFactor": 0.0,
                    "baseColorTexture": {"index": 2, "texCoord": 1,
                        "extensions": {"KHR_texture_transform": {
                            "offset": [0.5, 0], "scale": [2, 2], "texCoord": 0
                        }}}
                },
                "normalTexture": {"index": 1, "scale": 0.5},
                "alphaMode": "MASK",
                "alphaCutoff": 0.3,
                "doubleSided": true,
                "extensions": {
                    "KHR_materials_unlit": {},
                    "KHR_materials_emissive_strength": {"emissiveStrength": 4.0}
                }
            }"#,
        );
        let m = build_material(0, &def).unwrap();
        assert_eq!(m.name, "Glass");
        assert_eq!(m.base_color, Vec4::new(1.0, 0.0, 0.0, 0.5));
        assert_eq!(m.metallic, 0.0);
        assert_eq!(m.normal_scale, 0.5);
        assert_eq!(m.alpha_mode, AlphaMode::Mask);
        assert_eq!(m.alpha_cutoff, 0.3);
        assert!(m.double_sided);
        assert!(m.unlit);
        assert_eq!(m.emissive_strength, 4.0);

        let base = m.base_color_texture.unwrap();
        assert_eq!(base.texture, 2);
        assert_eq!(base.uv_set(), 0);
        let transform = base.transform.unwrap();
        assert_eq!(transform.offset, Vec2::new(0.5, 0.0));
        assert_eq!(transform.scale, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_bad_alpha_mode() {
        let def = material_def(r#"{"alphaMode": "GLOW"}"#);
        assert!(build_material(0, &def).unwrap_err().is_format_error());
    }
}

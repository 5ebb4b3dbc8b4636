use crate::error::{GltfError, Result};

/// Accessor component storage type, keyed by the glTF `componentType` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            5120 => Ok(ComponentType::Int8),
            5121 => Ok(ComponentType::Uint8),
            5122 => Ok(ComponentType::Int16),
            5123 => Ok(ComponentType::Uint16),
            5124 => Ok(ComponentType::Int32),
            5125 => Ok(ComponentType::Uint32),
            5126 => Ok(ComponentType::Float32),
            _ => Err(GltfError::format(format!(
                "Unknown accessor componentType: {} (expected 5120-5126)",
                code
            ))),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ComponentType::Int8 => 5120,
            ComponentType::Uint8 => 5121,
            ComponentType::Int16 => 5122,
            ComponentType::Uint16 => 5123,
            ComponentType::Int32 => 5124,
            ComponentType::Uint32 => 5125,
            ComponentType::Float32 => 5126,
        }
    }

    pub fn byte_length(&self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::Uint8 => 1,
            ComponentType::Int16 | ComponentType::Uint16 => 2,
            ComponentType::Int32 | ComponentType::Uint32 | ComponentType::Float32 => 4,
        }
    }

    pub fn is_integral(&self) -> bool {
        !matches!(self, ComponentType::Float32)
    }
}

/// Accessor element shape (`type` in the document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "SCALAR" => Ok(ElementType::Scalar),
            "VEC2" => Ok(ElementType::Vec2),
            "VEC3" => Ok(ElementType::Vec3),
            "VEC4" => Ok(ElementType::Vec4),
            "MAT2" => Ok(ElementType::Mat2),
            "MAT3" => Ok(ElementType::Mat3),
            "MAT4" => Ok(ElementType::Mat4),
            _ => Err(GltfError::format(format!("Unknown accessor type: {}", name))),
        }
    }

    pub fn num_components(&self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 | ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_codes() {
        for code in 5120..=5126 {
            let ty = ComponentType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(ComponentType::from_code(5126).unwrap().byte_length(), 4);
        assert_eq!(ComponentType::from_code(5122).unwrap().byte_length(), 2);
    }

    #[test]
    fn test_unknown_component_code() {
        let err = ComponentType::from_code(5130).unwrap_err();
        assert!(err.is_format_error());
        assert!(ComponentType::from_code(5119).is_err());
    }

    #[test]
    fn test_element_components() {
        assert_eq!(ElementType::from_name("SCALAR").unwrap().num_components(), 1);
        assert_eq!(ElementType::from_name("MAT4").unwrap().num_components(), 16);
        assert!(ElementType::from_name("VEC5").is_err());
    }
}

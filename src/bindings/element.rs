// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Element type descriptors.

A buffer's element type has a fixed host layout.  The descriptor records that layout (size,
and for structures each field's offset and shader type) so the translation layer can declare
a matching type in the shader.

```
use compute_kernels::bindings::{ElementDescriptor, FieldDescriptor, ShaderElement, ShaderType};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Particle {
    position: [f32; 3],
    mass: f32,
    id: u32,
}

impl ShaderElement for Particle {
    fn descriptor() -> ElementDescriptor {
        ElementDescriptor::structure::<Particle>("Particle", vec![
            FieldDescriptor::new("position", 0, ShaderType::vector(compute_kernels::bindings::ScalarType::F32, 3)),
            FieldDescriptor::new("mass", 12, ShaderType::FLOAT),
            FieldDescriptor::new("id", 16, ShaderType::UINT),
        ])
    }
}

assert_eq!(Particle::descriptor().size(), 20);
assert!(Particle::descriptor().validate().is_ok());
```
*/

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    F16,
    F32,
    I32,
    U32,
    /// Only for kernel locals; `bool` has no host layout a buffer can carry.
    Bool,
}

impl ScalarType {
    pub const fn size(self) -> usize {
        match self {
            ScalarType::F16 => 2,
            ScalarType::F32 | ScalarType::I32 | ScalarType::U32 | ScalarType::Bool => 4,
        }
    }
}

/// A scalar or a 2-4 lane vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderType {
    scalar: ScalarType,
    lanes: u8,
}

impl ShaderType {
    pub const FLOAT: ShaderType = ShaderType::scalar(ScalarType::F32);
    pub const HALF: ShaderType = ShaderType::scalar(ScalarType::F16);
    pub const INT: ShaderType = ShaderType::scalar(ScalarType::I32);
    pub const UINT: ShaderType = ShaderType::scalar(ScalarType::U32);
    pub const BOOL: ShaderType = ShaderType::scalar(ScalarType::Bool);

    pub const fn scalar(scalar: ScalarType) -> Self {
        ShaderType { scalar, lanes: 1 }
    }

    /// # Panics
    /// If `lanes` is not 2, 3 or 4.
    pub const fn vector(scalar: ScalarType, lanes: u8) -> Self {
        assert!(lanes >= 2 && lanes <= 4, "vectors have 2 to 4 lanes");
        ShaderType { scalar, lanes }
    }

    pub const fn scalar_type(self) -> ScalarType {
        self.scalar
    }

    pub const fn lanes(self) -> u8 {
        self.lanes
    }

    /// Size in bytes, tightly packed.
    pub const fn size(self) -> usize {
        self.scalar.size() * self.lanes as usize
    }

    pub fn hlsl_name(self) -> String {
        let base = match self.scalar {
            ScalarType::F16 => "half",
            ScalarType::F32 => "float",
            ScalarType::I32 => "int",
            ScalarType::U32 => "uint",
            ScalarType::Bool => "bool",
        };
        if self.lanes == 1 {
            base.to_string()
        } else {
            format!("{base}{}", self.lanes)
        }
    }

    pub fn wgsl_name(self) -> String {
        let base = match self.scalar {
            ScalarType::F16 => "f16",
            ScalarType::F32 => "f32",
            ScalarType::I32 => "i32",
            ScalarType::U32 => "u32",
            ScalarType::Bool => "bool",
        };
        if self.lanes == 1 {
            base.to_string()
        } else {
            format!("vec{}<{base}>", self.lanes)
        }
    }

    /// Alignment WGSL requires for this type in host-shareable memory.
    pub const fn wgsl_align(self) -> usize {
        match self.lanes {
            1 => self.scalar.size(),
            2 => 2 * self.scalar.size(),
            _ => 4 * self.scalar.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    offset: usize,
    ty: ShaderType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, offset: usize, ty: ShaderType) -> Self {
        FieldDescriptor {
            name: name.into(),
            offset,
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ty(&self) -> ShaderType {
        self.ty
    }

    pub fn end(&self) -> usize {
        self.offset + self.ty.size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Primitive(ShaderType),
    Struct {
        name: String,
        fields: Vec<FieldDescriptor>,
    },
}

/// Layout of one element.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    size: usize,
    shape: Shape,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    #[error("Struct {0} has no fields")]
    Empty(String),
    #[error("Field {field} at offset {offset} overlaps the field before it")]
    Overlap { field: String, offset: usize },
    #[error("Field {field} ends at byte {end}, past the element size {size}")]
    OutOfBounds {
        field: String,
        end: usize,
        size: usize,
    },
    #[error("Field {0} is declared twice")]
    DuplicateField(String),
    #[error("Element type has size zero")]
    ZeroSized,
}

impl ElementDescriptor {
    pub fn primitive(ty: ShaderType) -> Self {
        ElementDescriptor {
            size: ty.size(),
            shape: Shape::Primitive(ty),
        }
    }

    /// A structure with the size of `T`.  Fields must be listed in offset order.
    pub fn structure<T>(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        ElementDescriptor {
            size: std::mem::size_of::<T>(),
            shape: Shape::Struct {
                name: name.into(),
                fields,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn primitive_type(&self) -> Option<ShaderType> {
        match &self.shape {
            Shape::Primitive(ty) => Some(*ty),
            Shape::Struct { .. } => None,
        }
    }

    pub fn struct_name(&self) -> Option<&str> {
        match &self.shape {
            Shape::Primitive(_) => None,
            Shape::Struct { name, .. } => Some(name),
        }
    }

    /// Empty for primitives.
    pub fn fields(&self) -> &[FieldDescriptor] {
        match &self.shape {
            Shape::Primitive(_) => &[],
            Shape::Struct { fields, .. } => fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Checks that fields are ordered, disjoint and inside the element.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.size == 0 {
            return Err(LayoutError::ZeroSized);
        }
        let Shape::Struct { name, fields } = &self.shape else {
            return Ok(());
        };
        if fields.is_empty() {
            return Err(LayoutError::Empty(name.clone()));
        }
        let mut seen = HashSet::new();
        let mut cursor = 0;
        for field in fields {
            if !seen.insert(field.name.as_str()) {
                return Err(LayoutError::DuplicateField(field.name.clone()));
            }
            if field.offset < cursor {
                return Err(LayoutError::Overlap {
                    field: field.name.clone(),
                    offset: field.offset,
                });
            }
            if field.end() > self.size {
                return Err(LayoutError::OutOfBounds {
                    field: field.name.clone(),
                    end: field.end(),
                    size: self.size,
                });
            }
            cursor = field.end();
        }
        Ok(())
    }
}

/// A type that can live in a buffer and be declared in a shader.
pub trait ShaderElement: bytemuck::Pod + Send + Sync {
    fn descriptor() -> ElementDescriptor;
}

macro_rules! primitive_elements {
    ($($t:ty => $shader:expr),* $(,)?) => {
        $(
            impl ShaderElement for $t {
                fn descriptor() -> ElementDescriptor {
                    ElementDescriptor::primitive($shader)
                }
            }
        )*
    };
}

primitive_elements! {
    f32 => ShaderType::FLOAT,
    i32 => ShaderType::INT,
    u32 => ShaderType::UINT,
    half::f16 => ShaderType::HALF,
    [f32; 2] => ShaderType::vector(ScalarType::F32, 2),
    [f32; 3] => ShaderType::vector(ScalarType::F32, 3),
    [f32; 4] => ShaderType::vector(ScalarType::F32, 4),
    [i32; 2] => ShaderType::vector(ScalarType::I32, 2),
    [i32; 3] => ShaderType::vector(ScalarType::I32, 3),
    [i32; 4] => ShaderType::vector(ScalarType::I32, 4),
    [u32; 2] => ShaderType::vector(ScalarType::U32, 2),
    [u32; 3] => ShaderType::vector(ScalarType::U32, 3),
    [u32; 4] => ShaderType::vector(ScalarType::U32, 4),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes_match_host() {
        assert_eq!(f32::descriptor().size(), std::mem::size_of::<f32>());
        assert_eq!(half::f16::descriptor().size(), 2);
        assert_eq!(<[f32; 3]>::descriptor().size(), 12);
        assert_eq!(<[u32; 4]>::descriptor().size(), 16);
    }

    #[test]
    fn type_names() {
        let float3 = ShaderType::vector(ScalarType::F32, 3);
        assert_eq!(float3.hlsl_name(), "float3");
        assert_eq!(float3.wgsl_name(), "vec3<f32>");
        assert_eq!(float3.wgsl_align(), 16);
        assert_eq!(ShaderType::UINT.hlsl_name(), "uint");
        assert_eq!(ShaderType::HALF.wgsl_name(), "f16");
    }

    #[test]
    fn overlapping_fields_rejected() {
        let descriptor = ElementDescriptor::structure::<[u32; 2]>(
            "Pair",
            vec![
                FieldDescriptor::new("a", 0, ShaderType::UINT),
                FieldDescriptor::new("b", 2, ShaderType::UINT),
            ],
        );
        assert_eq!(
            descriptor.validate(),
            Err(LayoutError::Overlap {
                field: "b".to_string(),
                offset: 2
            })
        );
    }

    #[test]
    fn field_past_end_rejected() {
        let descriptor = ElementDescriptor::structure::<u32>(
            "Small",
            vec![FieldDescriptor::new("a", 0, ShaderType::vector(ScalarType::F32, 2))],
        );
        assert!(matches!(
            descriptor.validate(),
            Err(LayoutError::OutOfBounds { end: 8, size: 4, .. })
        ));
    }

    #[test]
    fn duplicate_field_rejected() {
        let descriptor = ElementDescriptor::structure::<[u32; 2]>(
            "Pair",
            vec![
                FieldDescriptor::new("a", 0, ShaderType::UINT),
                FieldDescriptor::new("a", 4, ShaderType::UINT),
            ],
        );
        assert_eq!(
            descriptor.validate(),
            Err(LayoutError::DuplicateField("a".to_string()))
        );
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! WGSL output.
//!
//! All bindings live in group 0 and take `@binding` slots in declaration order.  WGSL computes
//! struct member offsets from alignment rules, so a host layout is only accepted when every
//! field sits at an offset WGSL would also accept.  Gaps are absorbed with `@size`.
//! Storage arrays additionally need the WGSL element stride to equal the host element size.

use super::Dialect;
use super::Error;
use super::emit::{Resolved, Syntax};
use super::ir::Intrinsic;
use crate::bindings::{BufferKind, ScalarType, ShaderType};
use crate::keywords::internal_name;

pub(super) struct Wgsl;

const fn round_up(align: usize, size: usize) -> usize {
    size.div_ceil(align) * align
}

impl Syntax for Wgsl {
    const DIALECT: Dialect = Dialect::Wgsl;

    fn type_name(ty: ShaderType) -> String {
        ty.wgsl_name()
    }

    fn int_literal(value: i32) -> String {
        if value == i32::MIN {
            //the suffixed form would overflow before negation
            "i32(-2147483648)".to_string()
        } else {
            format!("{value}i")
        }
    }

    fn uint_literal(value: u32) -> String {
        format!("{value}u")
    }

    fn intrinsic(intrinsic: Intrinsic) -> &'static str {
        intrinsic.wgsl_name()
    }

    fn check_layout(binding: &Resolved<'_>) -> Result<(), Error> {
        let unrepresentable = |reason: String| binding.unrepresentable(Dialect::Wgsl, reason);
        let types: Vec<ShaderType> = match binding.element.primitive_type() {
            Some(ty) => vec![ty],
            None => binding.fields.iter().map(|f| f.descriptor.ty()).collect(),
        };
        if types.iter().any(|ty| ty.scalar_type() == ScalarType::Bool) {
            return Err(unrepresentable("bool has no host-shareable layout".to_string()));
        }
        let mut align = 1;
        for field in &binding.fields {
            let descriptor = field.descriptor;
            let field_align = descriptor.ty().wgsl_align();
            align = align.max(field_align);
            if descriptor.offset() % field_align != 0 {
                return Err(unrepresentable(format!(
                    "field {} at offset {} needs {field_align}-byte alignment",
                    descriptor.name(),
                    descriptor.offset()
                )));
            }
        }
        if let Some(first) = binding.fields.first() {
            let leading = first.descriptor.offset();
            if leading != 0 && leading < 4 {
                return Err(unrepresentable(format!(
                    "leading gap of {leading} bytes is narrower than a padding member"
                )));
            }
        }
        if let Some(ty) = binding.element.primitive_type() {
            align = ty.wgsl_align();
        }
        let size = binding.element.size();
        let wgsl_size = round_up(align, size);
        if binding.kind != BufferKind::Constant && wgsl_size != size {
            return Err(unrepresentable(format!(
                "array stride would be {wgsl_size} bytes but elements are {size} bytes"
            )));
        }
        Ok(())
    }

    fn struct_declaration(binding: &Resolved<'_>) -> String {
        let mut out = format!("struct {} {{\n", binding.type_name);
        let fields = &binding.fields;
        if let Some(first) = fields.first() {
            let leading = first.descriptor.offset();
            if leading > 0 {
                let pad = internal_name(Dialect::Wgsl, "pad0");
                out.push_str(&format!("    @size({leading}) {pad}: u32,\n"));
            }
        }
        for (i, field) in fields.iter().enumerate() {
            let descriptor = field.descriptor;
            let next = fields
                .get(i + 1)
                .map(|f| f.descriptor.offset())
                .unwrap_or(binding.element.size());
            let span = next - descriptor.offset();
            let ty = descriptor.ty().wgsl_name();
            if span > descriptor.ty().size() {
                out.push_str(&format!("    @size({span}) {}: {ty},\n", field.name));
            } else {
                out.push_str(&format!("    {}: {ty},\n", field.name));
            }
        }
        out.push_str("}\n\n");
        out
    }

    fn binding_declaration(binding: &Resolved<'_>) -> String {
        let (ty, name, slot) = (&binding.type_name, &binding.name, binding.slot);
        match binding.kind {
            BufferKind::Constant => {
                format!("@group(0) @binding({slot}) var<uniform> {name}: {ty};\n")
            }
            BufferKind::Structured => {
                format!("@group(0) @binding({slot}) var<storage, read> {name}: array<{ty}>;\n")
            }
            BufferKind::ReadWrite => {
                format!("@group(0) @binding({slot}) var<storage, read_write> {name}: array<{ty}>;\n")
            }
        }
    }

    fn local_declaration(name: &str, ty: ShaderType, value: &str) -> String {
        format!("var {name}: {} = {value};", ty.wgsl_name())
    }

    fn loop_header(counter: &str, start: &str, end: &str) -> String {
        format!("for (var {counter}: u32 = {start}; {counter} < {end}; {counter} = {counter} + 1u)")
    }

    fn entry_point(name: &str, threads: [u32; 3], thread_ids: &str) -> String {
        let [x, y, z] = threads;
        format!(
            "@compute @workgroup_size({x}, {y}, {z})\nfn {name}(@builtin(global_invocation_id) {thread_ids}: vec3<u32>)"
        )
    }

    fn preamble(uses_f16: bool) -> String {
        if uses_f16 {
            "enable f16;\n\n".to_string()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bindings::{BufferKind, ElementDescriptor, FieldDescriptor, ScalarType, ShaderType};
    use crate::translation::{Axis, Binding, Dialect, Error, Expr, Kernel, Stmt};

    #[test]
    fn storage_vec3_rejected() {
        let result = Kernel::new("main")
            .bind(Binding::new::<[f32; 3]>("points", BufferKind::Structured))
            .emit(Dialect::Wgsl);
        assert!(matches!(
            result,
            Err(Error::UnrepresentableLayout { dialect: Dialect::Wgsl, .. })
        ));
        //a uniform holds one element, so the stride does not matter
        let uniform = Kernel::new("main")
            .bind(Binding::new::<[f32; 3]>("points", BufferKind::Constant))
            .emit(Dialect::Wgsl);
        assert!(uniform.is_ok());
    }

    #[test]
    fn bindings_are_numbered_in_order() {
        let source = Kernel::new("main")
            .bind(Binding::new::<f32>("scale", BufferKind::Constant))
            .bind(Binding::new::<f32>("input", BufferKind::Structured))
            .bind(Binding::new::<[f32; 4]>("output", BufferKind::ReadWrite))
            .emit(Dialect::Wgsl)
            .unwrap();
        let text = source.text();
        assert!(text.contains("@group(0) @binding(0) var<uniform> scale: f32;"));
        assert!(text.contains("@group(0) @binding(1) var<storage, read> input: array<f32>;"));
        assert!(text.contains(
            "@group(0) @binding(2) var<storage, read_write> output: array<vec4<f32>>;"
        ));
        assert!(text.contains(
            "@compute @workgroup_size(64, 1, 1)\nfn main(@builtin(global_invocation_id) reserved_ThreadIds: vec3<u32>)"
        ));
    }

    #[test]
    fn gaps_become_size_attributes() {
        let element = ElementDescriptor::structure::<[u32; 4]>(
            "Sparse",
            vec![
                FieldDescriptor::new("a", 0, ShaderType::FLOAT),
                FieldDescriptor::new("b", 8, ShaderType::UINT),
            ],
        );
        let source = Kernel::new("main")
            .bind(Binding::with_descriptor("items", BufferKind::Structured, element))
            .emit(Dialect::Wgsl)
            .unwrap();
        assert!(source.text().contains("struct Sparse {\n    @size(8) a: f32,\n    @size(8) b: u32,\n}"));
    }

    #[test]
    fn f16_enables_extension() {
        let source = Kernel::new("main")
            .bind(Binding::new::<half::f16>("values", BufferKind::ReadWrite))
            .push(Stmt::store(
                "values",
                Expr::thread_id(Axis::X),
                Expr::load("values", Expr::thread_id(Axis::X)) * Expr::from(2.0f32).cast(ShaderType::HALF),
            ))
            .emit(Dialect::Wgsl)
            .unwrap();
        assert!(source.text().starts_with("enable f16;\n"));
        assert!(source.text().contains("f16(2.0)"));
    }

    #[test]
    fn locals_and_loops() {
        let source = Kernel::new("sum")
            .bind(Binding::new::<u32>("data", BufferKind::ReadWrite))
            .push(Stmt::declare("total", ShaderType::UINT, 0u32))
            .push(Stmt::for_range(
                "i",
                0u32,
                4u32,
                [Stmt::set(
                    "total",
                    Expr::local("total") + Expr::load("data", Expr::local("i")),
                )],
            ))
            .push(Stmt::store("data", 0u32, Expr::local("total")))
            .emit(Dialect::Wgsl)
            .unwrap();
        let text = source.text();
        assert!(text.contains("    var total: u32 = 0u;\n"));
        assert!(text.contains("    for (var i: u32 = 0u; i < 4u; i = i + 1u) {\n"));
        assert!(text.contains("        total = (total + data[i]);\n"));
        assert!(text.contains("    data[0u] = total;\n"));
    }

    #[test]
    fn reserved_names_escape_with_legal_prefix() {
        let source = Kernel::new("main")
            .bind(Binding::new::<i32>("r#type", BufferKind::ReadWrite))
            .push(Stmt::declare("__tmp", ShaderType::INT, -1i32))
            .push(Stmt::store("r#type", 0u32, Expr::local("__tmp")))
            .emit(Dialect::Wgsl)
            .unwrap();
        let text = source.text();
        assert!(text.contains("var<storage, read_write> reserved_type: array<i32>;"));
        assert!(text.contains("var reserved___tmp: i32 = -1i;"));
        assert!(text.contains("reserved_type[0u] = reserved___tmp;"));
        assert!(!text.contains(" __"));
    }

    #[test]
    fn constant_struct_is_uniform() {
        let element = ElementDescriptor::structure::<[u32; 5]>(
            "Particle",
            vec![
                FieldDescriptor::new("position", 0, ShaderType::vector(ScalarType::F32, 3)),
                FieldDescriptor::new("mass", 12, ShaderType::FLOAT),
                FieldDescriptor::new("id", 16, ShaderType::UINT),
            ],
        );
        let source = Kernel::new("main")
            .bind(Binding::with_descriptor("params", BufferKind::Constant, element.clone()))
            .emit(Dialect::Wgsl)
            .unwrap();
        assert!(source.text().contains("var<uniform> params: Particle;"));
        let storage = Kernel::new("main")
            .bind(Binding::with_descriptor("params", BufferKind::Structured, element))
            .emit(Dialect::Wgsl);
        assert!(storage.is_err());
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! HLSL output.
//!
//! Constant bindings take `b` registers, structured bindings `t`, read-write bindings `u`.
//! Struct members are packed at 4-byte granularity; gaps in the host layout become `uint`
//! padding members in the escape namespace.

use super::Dialect;
use super::Error;
use super::emit::{Resolved, Syntax};
use super::ir::Intrinsic;
use crate::bindings::{BufferKind, ScalarType, ShaderType};
use crate::keywords::internal_name;

pub(super) struct Hlsl;

const REGISTER_BYTES: usize = 16;

fn pads(count: &mut usize, bytes: usize, out: &mut String) {
    for _ in 0..bytes / 4 {
        let name = internal_name(Dialect::Hlsl, &format!("pad{count}"));
        out.push_str(&format!("    uint {name};\n"));
        *count += 1;
    }
}

impl Syntax for Hlsl {
    const DIALECT: Dialect = Dialect::Hlsl;

    fn type_name(ty: ShaderType) -> String {
        ty.hlsl_name()
    }

    fn int_literal(value: i32) -> String {
        if value == i32::MIN {
            //2147483648 alone is out of range for int
            "(-2147483647 - 1)".to_string()
        } else {
            value.to_string()
        }
    }

    fn uint_literal(value: u32) -> String {
        format!("{value}u")
    }

    fn intrinsic(intrinsic: Intrinsic) -> &'static str {
        intrinsic.hlsl_name()
    }

    fn check_layout(binding: &Resolved<'_>) -> Result<(), Error> {
        let half = match binding.element.primitive_type() {
            Some(ty) => ty.scalar_type() == ScalarType::F16,
            None => binding
                .fields
                .iter()
                .any(|f| f.descriptor.ty().scalar_type() == ScalarType::F16),
        };
        if half {
            //without 16-bit types enabled, DXC stores half in 4 bytes
            return Err(binding.unrepresentable(
                Dialect::Hlsl,
                "half has no 2-byte buffer layout by default".to_string(),
            ));
        }
        let mut cursor = 0;
        for field in &binding.fields {
            let descriptor = field.descriptor;
            let align = descriptor.ty().scalar_type().size();
            if descriptor.offset() % align != 0 {
                return Err(binding.unrepresentable(
                    Dialect::Hlsl,
                    format!(
                        "field {} at offset {} is not {align}-byte aligned",
                        descriptor.name(),
                        descriptor.offset()
                    ),
                ));
            }
            if (descriptor.offset() - cursor) % 4 != 0 {
                return Err(binding.unrepresentable(
                    Dialect::Hlsl,
                    format!(
                        "gap of {} bytes before field {} can't be padded with 4-byte members",
                        descriptor.offset() - cursor,
                        descriptor.name()
                    ),
                ));
            }
            if binding.kind == BufferKind::Constant
                && descriptor.offset() / REGISTER_BYTES != (descriptor.end() - 1) / REGISTER_BYTES
            {
                return Err(binding.unrepresentable(
                    Dialect::Hlsl,
                    format!(
                        "field {} crosses a 16-byte constant register boundary",
                        descriptor.name()
                    ),
                ));
            }
            cursor = descriptor.end();
        }
        if !binding.fields.is_empty() && (binding.element.size() - cursor) % 4 != 0 {
            return Err(binding.unrepresentable(
                Dialect::Hlsl,
                format!(
                    "{} trailing bytes can't be padded with 4-byte members",
                    binding.element.size() - cursor
                ),
            ));
        }
        Ok(())
    }

    fn struct_declaration(binding: &Resolved<'_>) -> String {
        let mut out = format!("struct {}\n{{\n", binding.type_name);
        let mut cursor = 0;
        let mut pad_count = 0;
        for field in &binding.fields {
            let descriptor = field.descriptor;
            pads(&mut pad_count, descriptor.offset() - cursor, &mut out);
            out.push_str(&format!(
                "    {} {};\n",
                descriptor.ty().hlsl_name(),
                field.name
            ));
            cursor = descriptor.end();
        }
        pads(&mut pad_count, binding.element.size() - cursor, &mut out);
        out.push_str("};\n\n");
        out
    }

    fn binding_declaration(binding: &Resolved<'_>) -> String {
        let (ty, name, register) = (&binding.type_name, &binding.name, binding.register);
        match binding.kind {
            BufferKind::Constant if binding.element.primitive_type().is_some() => {
                let block = internal_name(Dialect::Hlsl, &format!("cb_{name}"));
                format!("cbuffer {block} : register(b{register})\n{{\n    {ty} {name};\n}};\n")
            }
            BufferKind::Constant => format!("ConstantBuffer<{ty}> {name} : register(b{register});\n"),
            BufferKind::Structured => {
                format!("StructuredBuffer<{ty}> {name} : register(t{register});\n")
            }
            BufferKind::ReadWrite => {
                format!("RWStructuredBuffer<{ty}> {name} : register(u{register});\n")
            }
        }
    }

    fn local_declaration(name: &str, ty: ShaderType, value: &str) -> String {
        format!("{} {name} = {value};", ty.hlsl_name())
    }

    fn loop_header(counter: &str, start: &str, end: &str) -> String {
        format!("for (uint {counter} = {start}; {counter} < {end}; {counter}++)")
    }

    fn entry_point(name: &str, threads: [u32; 3], thread_ids: &str) -> String {
        let [x, y, z] = threads;
        format!("[numthreads({x}, {y}, {z})]\nvoid {name}(uint3 {thread_ids} : SV_DispatchThreadID)")
    }

    fn preamble(_uses_f16: bool) -> String {
        String::new()
    }
}

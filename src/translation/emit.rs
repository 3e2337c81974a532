// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The shared walker behind every dialect.

The walker resolves names, checks the kernel, and assembles text.  Everything that differs
between dialects (type names, literals, declarations, layout rules) is behind [Syntax].
*/

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use super::ir::{Expr, Intrinsic, Kernel, Place, Stmt, UnaryOp};
use super::{Dialect, Error, ShaderSource};
use crate::bindings::{BufferKind, ElementDescriptor, FieldDescriptor, ScalarType, ShaderType};
use crate::keywords;

pub(super) trait Syntax {
    const DIALECT: Dialect;

    fn type_name(ty: ShaderType) -> String;
    fn int_literal(value: i32) -> String;
    fn uint_literal(value: u32) -> String;
    fn float_literal(value: f32) -> String {
        //Debug always prints a '.' or an exponent, so the literal stays a float
        format!("{value:?}")
    }
    fn intrinsic(intrinsic: Intrinsic) -> &'static str;

    /// Refuses element layouts the dialect can't declare with the host's offsets and stride.
    fn check_layout(binding: &Resolved<'_>) -> Result<(), Error>;
    /// Declares the struct element type of `binding`.  Only called for struct elements.
    fn struct_declaration(binding: &Resolved<'_>) -> String;
    fn binding_declaration(binding: &Resolved<'_>) -> String;

    fn local_declaration(name: &str, ty: ShaderType, value: &str) -> String;
    fn loop_header(counter: &str, start: &str, end: &str) -> String;
    /// Everything before the opening brace of the entry point.
    fn entry_point(name: &str, threads: [u32; 3], thread_ids: &str) -> String;
    fn preamble(uses_f16: bool) -> String;
}

/// A struct field after name mapping.
pub(super) struct MappedField<'k> {
    host: &'k str,
    pub(super) name: String,
    pub(super) descriptor: &'k FieldDescriptor,
}

/// A binding after name mapping and slot assignment.
pub(super) struct Resolved<'k> {
    pub(super) host_name: &'k str,
    pub(super) name: String,
    pub(super) kind: BufferKind,
    pub(super) element: &'k ElementDescriptor,
    /// Mapped struct name or primitive type name.
    pub(super) type_name: String,
    pub(super) fields: Vec<MappedField<'k>>,
    /// Index within the binding's register class.
    pub(super) register: u32,
    /// Index across all bindings.
    pub(super) slot: u32,
}

impl Resolved<'_> {
    fn field(&self, host: &str) -> Option<&str> {
        let host = bare(host);
        self.fields
            .iter()
            .find(|f| f.host == host)
            .map(|f| f.name.as_str())
    }

    pub(super) fn unrepresentable(&self, dialect: Dialect, reason: String) -> Error {
        Error::UnrepresentableLayout {
            binding: self.host_name.to_string(),
            dialect,
            reason,
        }
    }
}

fn bare(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
}

/// Validates `name` as a host identifier and maps it for `dialect`.
pub(super) fn identifier(dialect: Dialect, name: &str) -> Result<String, Error> {
    let stripped = bare(name);
    let mut chars = stripped.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(keywords::map_identifier(dialect, stripped).into_owned())
}

fn uses_f16(element: &ElementDescriptor) -> bool {
    element
        .primitive_type()
        .into_iter()
        .chain(element.fields().iter().map(FieldDescriptor::ty))
        .any(|ty| ty.scalar_type() == ScalarType::F16)
}

pub(super) fn emit<S: Syntax>(kernel: &Kernel) -> Result<ShaderSource, Error> {
    let threads = kernel.thread_group();
    if threads.contains(&0) {
        return Err(Error::EmptyThreadGroup(threads));
    }
    let entry = identifier(S::DIALECT, kernel.name())?;
    let mut globals = HashSet::from([entry.clone()]);
    let mut structs: HashMap<String, &ElementDescriptor> = HashMap::new();
    let mut declarations = String::new();
    let mut bindings = HashMap::new();
    let mut registers = [0u32; 3];
    let mut f16 = false;

    for (slot, binding) in kernel.bindings().iter().enumerate() {
        let element = binding.element();
        element.validate().map_err(|source| Error::InvalidElement {
            binding: binding.name().to_string(),
            source,
        })?;
        let name = identifier(S::DIALECT, binding.name())?;
        if !globals.insert(name.clone()) {
            return Err(Error::DuplicateBinding(binding.name().to_string()));
        }
        let class = match binding.kind() {
            BufferKind::Constant => 0,
            BufferKind::Structured => 1,
            BufferKind::ReadWrite => 2,
        };
        let register = registers[class];
        registers[class] += 1;
        let fields = element
            .fields()
            .iter()
            .map(|descriptor| {
                Ok(MappedField {
                    host: bare(descriptor.name()),
                    name: identifier(S::DIALECT, descriptor.name())?,
                    descriptor,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let struct_name = element
            .struct_name()
            .map(|name| identifier(S::DIALECT, name))
            .transpose()?;
        let type_name = match element.primitive_type() {
            Some(ty) => S::type_name(ty),
            None => struct_name.clone().unwrap_or_default(),
        };
        let resolved = Resolved {
            host_name: binding.name(),
            name,
            kind: binding.kind(),
            element,
            type_name,
            fields,
            register,
            slot: slot as u32,
        };
        S::check_layout(&resolved)?;
        if let Some(struct_name) = struct_name {
            match structs.get(&struct_name) {
                Some(existing) if *existing != element => {
                    return Err(Error::ConflictingStruct(
                        element.struct_name().unwrap_or_default().to_string(),
                    ));
                }
                Some(_) => {}
                None => {
                    if !globals.insert(struct_name.clone()) {
                        return Err(Error::DuplicateBinding(
                            element.struct_name().unwrap_or_default().to_string(),
                        ));
                    }
                    declarations.push_str(&S::struct_declaration(&resolved));
                    structs.insert(struct_name, element);
                }
            }
        }
        f16 |= uses_f16(element);
        bindings.insert(bare(binding.name()), resolved);
    }

    for binding in kernel.bindings() {
        if let Some(resolved) = bindings.get(bare(binding.name())) {
            declarations.push_str(&S::binding_declaration(resolved));
            declarations.push('\n');
        }
    }

    let mut body: Body<'_, '_, S> = Body {
        bindings: &bindings,
        globals: &globals,
        scopes: Vec::new(),
        thread_ids: keywords::internal_name(S::DIALECT, "ThreadIds"),
        out: String::new(),
        depth: 0,
        uses_f16: f16,
        syntax: PhantomData,
    };
    body.block(kernel.statements())?;

    let mut text = S::preamble(body.uses_f16);
    text.push_str(&declarations);
    text.push('\n');
    text.push_str(&S::entry_point(&entry, threads, &body.thread_ids));
    text.push_str("\n{\n");
    text.push_str(&body.out);
    text.push_str("}\n");
    logwise::trace_sync!(
        "Emitted {kernel} as {dialect}",
        kernel = logwise::privacy::LogIt(&kernel.name()),
        dialect = logwise::privacy::LogIt(&S::DIALECT)
    );
    Ok(ShaderSource::new(S::DIALECT, entry, text))
}

struct Body<'a, 'k, S> {
    bindings: &'a HashMap<&'k str, Resolved<'k>>,
    globals: &'a HashSet<String>,
    /// Host name to mapped name, innermost scope last.
    scopes: Vec<HashMap<&'k str, String>>,
    thread_ids: String,
    out: String,
    depth: usize,
    uses_f16: bool,
    syntax: PhantomData<S>,
}

impl<'a, 'k, S: Syntax> Body<'a, 'k, S> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, stmts: &'k [Stmt]) -> Result<(), Error> {
        self.scopes.push(HashMap::new());
        self.indented(stmts)?;
        self.scopes.pop();
        Ok(())
    }

    //one level deeper, in the innermost scope
    fn indented(&mut self, stmts: &'k [Stmt]) -> Result<(), Error> {
        self.depth += 1;
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn binding(&self, name: &str) -> Result<&'a Resolved<'k>, Error> {
        self.bindings
            .get(bare(name))
            .ok_or_else(|| Error::UnknownBinding(name.to_string()))
    }

    fn declare(&mut self, name: &'k str) -> Result<String, Error> {
        let mapped = identifier(S::DIALECT, name)?;
        if self.globals.contains(&mapped) {
            return Err(Error::DuplicateLocal(name.to_string()));
        }
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| Error::UnknownLocal(name.to_string()))?;
        if scope.insert(bare(name), mapped.clone()).is_some() {
            return Err(Error::DuplicateLocal(name.to_string()));
        }
        Ok(mapped)
    }

    fn local(&self, name: &str) -> Result<String, Error> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(bare(name)))
            .cloned()
            .ok_or_else(|| Error::UnknownLocal(name.to_string()))
    }

    fn note_type(&mut self, ty: ShaderType) {
        self.uses_f16 |= ty.scalar_type() == ScalarType::F16;
    }

    fn element(
        &mut self,
        buffer: &str,
        index: &'k Expr,
        field: Option<&str>,
        write: bool,
    ) -> Result<String, Error> {
        let binding = self.binding(buffer)?;
        if binding.kind == BufferKind::Constant {
            return Err(Error::ConstantBufferIndexed {
                buffer: buffer.to_string(),
            });
        }
        if write && !binding.kind.is_writable_by_kernel() {
            return Err(Error::ReadOnlyBinding {
                buffer: buffer.to_string(),
            });
        }
        let field = field
            .map(|field| {
                binding.field(field).ok_or_else(|| Error::UnknownField {
                    buffer: buffer.to_string(),
                    field: field.to_string(),
                })
            })
            .transpose()?;
        let index = self.expr(index)?;
        Ok(match field {
            Some(field) => format!("{}[{index}].{field}", binding.name),
            None => format!("{}[{index}]", binding.name),
        })
    }

    fn constant(&self, buffer: &str, field: Option<&str>) -> Result<String, Error> {
        let binding = self.binding(buffer)?;
        if binding.kind != BufferKind::Constant {
            return Err(Error::NotConstant {
                buffer: buffer.to_string(),
            });
        }
        match field {
            None => Ok(binding.name.clone()),
            Some(field) => {
                let mapped = binding.field(field).ok_or_else(|| Error::UnknownField {
                    buffer: buffer.to_string(),
                    field: field.to_string(),
                })?;
                Ok(format!("{}.{mapped}", binding.name))
            }
        }
    }

    fn expr(&mut self, expr: &'k Expr) -> Result<String, Error> {
        Ok(match expr {
            Expr::Float(value) => {
                if !value.is_finite() {
                    return Err(Error::NonFiniteLiteral(*value));
                }
                S::float_literal(*value)
            }
            Expr::Int(value) => S::int_literal(*value),
            Expr::Uint(value) => S::uint_literal(*value),
            Expr::Bool(value) => value.to_string(),
            Expr::Local(name) => self.local(name)?,
            Expr::ThreadId(axis) => format!("{}.{}", self.thread_ids, axis.swizzle()),
            Expr::Unary(op, inner) => {
                let inner = self.expr(inner)?;
                match op {
                    UnaryOp::Neg => format!("(-{inner})"),
                    UnaryOp::Not => format!("(!{inner})"),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("({lhs} {} {rhs})", op.symbol())
            }
            Expr::Call(intrinsic, args) => {
                if args.len() != intrinsic.arity() {
                    return Err(Error::Arity {
                        intrinsic: S::intrinsic(*intrinsic),
                        expected: intrinsic.arity(),
                        found: args.len(),
                    });
                }
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{}({})", S::intrinsic(*intrinsic), args.join(", "))
            }
            Expr::Load { buffer, index } => self.element(buffer, index, None, false)?,
            Expr::Field(inner, field) => match inner.as_ref() {
                Expr::Load { buffer, index } => {
                    self.element(buffer, index, Some(field.as_str()), false)?
                }
                Expr::Constant {
                    buffer,
                    field: None,
                } => self.constant(buffer, Some(field.as_str()))?,
                _ => return Err(Error::MisplacedField),
            },
            Expr::Constant { buffer, field } => self.constant(buffer, field.as_deref())?,
            Expr::Cast(ty, inner) => {
                self.note_type(*ty);
                let inner = self.expr(inner)?;
                format!("{}({inner})", S::type_name(*ty))
            }
        })
    }

    fn stmt(&mut self, stmt: &'k Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Let { name, ty, value } => {
                //the initializer can't see the local it initializes
                let value = self.expr(value)?;
                let mapped = self.declare(name)?;
                self.note_type(*ty);
                let line = S::local_declaration(&mapped, *ty, &value);
                self.line(&line);
            }
            Stmt::Assign { place, value } => {
                let target = match place {
                    Place::Local(name) => self.local(name)?,
                    Place::Element {
                        buffer,
                        index,
                        field,
                    } => self.element(buffer, index, field.as_deref(), true)?,
                };
                let value = self.expr(value)?;
                self.line(&format!("{target} = {value};"));
            }
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition)?;
                self.line(&format!("if ({condition}) {{"));
                self.block(then)?;
                if !otherwise.is_empty() {
                    self.line("} else {");
                    self.block(otherwise)?;
                }
                self.line("}");
            }
            Stmt::For {
                counter,
                start,
                end,
                body,
            } => {
                let start = self.expr(start)?;
                let end = self.expr(end)?;
                //the counter and the body's top level share one scope
                self.scopes.push(HashMap::new());
                let counter = self.declare(counter)?;
                let header = S::loop_header(&counter, &start, &end);
                self.line(&format!("{header} {{"));
                self.indented(body)?;
                self.line("}");
                self.scopes.pop();
            }
            Stmt::Return => self.line("return;"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_validated_then_mapped() {
        assert_eq!(identifier(Dialect::Hlsl, "sample").unwrap(), "__reserved__sample");
        assert_eq!(identifier(Dialect::Hlsl, "r#type").unwrap(), "type");
        assert_eq!(identifier(Dialect::Wgsl, "r#type").unwrap(), "reserved_type");
        assert_eq!(identifier(Dialect::Hlsl, "x1").unwrap(), "x1");
        for bad in ["", "1x", "a-b", "r#", "naïve"] {
            assert_eq!(
                identifier(Dialect::Hlsl, bad),
                Err(Error::InvalidIdentifier(bad.to_string()))
            );
        }
    }
}

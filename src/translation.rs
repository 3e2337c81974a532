// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Kernel translation.

A kernel is built as a [Kernel] value: buffer bindings plus a body of [Stmt]s.  [Kernel::emit]
checks it and produces [ShaderSource] for one [Dialect].

```
use compute_kernels::bindings::BufferKind;
use compute_kernels::translation::{Axis, Binding, Dialect, Expr, Kernel, Stmt};

let kernel = Kernel::new("double_it")
    .bind(Binding::new::<f32>("sample", BufferKind::ReadWrite))
    .push(Stmt::store(
        "sample",
        Expr::thread_id(Axis::X),
        Expr::load("sample", Expr::thread_id(Axis::X)) * Expr::from(2.0f32),
    ));
let source = kernel.emit(Dialect::Hlsl).unwrap();
assert!(source.text().contains("RWStructuredBuffer<float> __reserved__sample : register(u0);"));
```

Errors are found before any text is produced; a kernel either emits in full or not at all.
*/

use std::fmt::{Display, Formatter};

use crate::bindings::element::LayoutError;
use crate::imp::{CompileError, ShaderCompiler};
use crate::native::Native;

mod emit;
mod hlsl;
pub mod ir;
mod wgsl;

pub use crate::keywords::Dialect;
pub use ir::{Axis, BinaryOp, Binding, Expr, Intrinsic, Kernel, Place, Stmt, UnaryOp};

/// Reasons a kernel can't be translated.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Constant buffers are read through [Expr::Constant], never indexed.
    #[error("Constant buffer {buffer} is indexed; read its fields instead")]
    ConstantBufferIndexed { buffer: String },
    #[error("Buffer {buffer} is read through Expr::Constant but is not a constant buffer")]
    NotConstant { buffer: String },
    #[error("Buffer {buffer} is not writable from kernels")]
    ReadOnlyBinding { buffer: String },
    #[error("No binding named {0}")]
    UnknownBinding(String),
    #[error("No local named {0} in scope")]
    UnknownLocal(String),
    #[error("Name {0} is declared more than once")]
    DuplicateBinding(String),
    #[error("Local {0} is already declared in this scope")]
    DuplicateLocal(String),
    #[error("{0:?} is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("Buffer {buffer} has no field {field}")]
    UnknownField { buffer: String, field: String },
    #[error("Field access is only allowed on buffer reads")]
    MisplacedField,
    #[error("Element of {binding} can't be expressed in {dialect:?}: {reason}")]
    UnrepresentableLayout {
        binding: String,
        dialect: Dialect,
        reason: String,
    },
    #[error("Element of {binding} has an invalid layout")]
    InvalidElement {
        binding: String,
        #[source]
        source: LayoutError,
    },
    #[error("Struct {0} is declared twice with different layouts")]
    ConflictingStruct(String),
    #[error("Literal {0} is not finite")]
    NonFiniteLiteral(f32),
    #[error("{intrinsic} takes {expected} arguments, not {found}")]
    Arity {
        intrinsic: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Thread group {0:?} has a zero dimension")]
    EmptyThreadGroup([u32; 3]),
}

/// Generated shading-language text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    dialect: Dialect,
    entry_point: String,
    text: String,
}

impl ShaderSource {
    pub(crate) fn new(dialect: Dialect, entry_point: String, text: String) -> Self {
        ShaderSource {
            dialect,
            entry_point,
            text,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The emitted (mapped) name of the kernel function.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Compiles this source, handing the result to a [Native] owner.
    pub fn compile<C: ShaderCompiler>(
        &self,
        compiler: &C,
    ) -> Result<Native<C::Handle>, CompileError> {
        let compiled = compiler.compile(self);
        if let Err(err) = &compiled {
            logwise::warn_sync!(
                "Shader compile failed: {err}",
                err = logwise::privacy::LogIt(err)
            );
        }
        compiled
    }
}

impl Display for ShaderSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The kernel IR.

Names in the IR are host names.  The emitter maps them for the target dialect, so a binding
may be called `sample` or `r#type` without any special care.
*/

use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

use super::{Dialect, Error, ShaderSource};
use crate::bindings::{BufferKind, ElementDescriptor, ShaderElement, ShaderType};

/// Component of the dispatch thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub(crate) fn swizzle(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Built-in functions.  These are emitted by their dialect name and never escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    Ceil,
    Clamp,
    Cos,
    Dot,
    Exp,
    Floor,
    Length,
    /// `lerp` in HLSL, `mix` in WGSL.
    Lerp,
    Log,
    Max,
    Min,
    Normalize,
    Pow,
    Saturate,
    Sin,
    Sqrt,
}

impl Intrinsic {
    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Abs
            | Intrinsic::Ceil
            | Intrinsic::Cos
            | Intrinsic::Exp
            | Intrinsic::Floor
            | Intrinsic::Length
            | Intrinsic::Log
            | Intrinsic::Normalize
            | Intrinsic::Saturate
            | Intrinsic::Sin
            | Intrinsic::Sqrt => 1,
            Intrinsic::Dot | Intrinsic::Max | Intrinsic::Min | Intrinsic::Pow => 2,
            Intrinsic::Clamp | Intrinsic::Lerp => 3,
        }
    }

    pub(crate) fn hlsl_name(self) -> &'static str {
        match self {
            Intrinsic::Lerp => "lerp",
            other => other.common_name(),
        }
    }

    pub(crate) fn wgsl_name(self) -> &'static str {
        match self {
            Intrinsic::Lerp => "mix",
            other => other.common_name(),
        }
    }

    fn common_name(self) -> &'static str {
        match self {
            Intrinsic::Abs => "abs",
            Intrinsic::Ceil => "ceil",
            Intrinsic::Clamp => "clamp",
            Intrinsic::Cos => "cos",
            Intrinsic::Dot => "dot",
            Intrinsic::Exp => "exp",
            Intrinsic::Floor => "floor",
            Intrinsic::Length => "length",
            Intrinsic::Lerp => "lerp",
            Intrinsic::Log => "log",
            Intrinsic::Max => "max",
            Intrinsic::Min => "min",
            Intrinsic::Normalize => "normalize",
            Intrinsic::Pow => "pow",
            Intrinsic::Saturate => "saturate",
            Intrinsic::Sin => "sin",
            Intrinsic::Sqrt => "sqrt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
    Local(String),
    ThreadId(Axis),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Intrinsic, Vec<Expr>),
    /// Element `index` of a structured or read-write buffer.
    Load { buffer: String, index: Box<Expr> },
    /// A field of a [Expr::Load] or of a whole [Expr::Constant].
    Field(Box<Expr>, String),
    /// The first element of a constant buffer, or one of its fields.
    Constant { buffer: String, field: Option<String> },
    Cast(ShaderType, Box<Expr>),
}

impl Expr {
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local(name.into())
    }

    pub fn thread_id(axis: Axis) -> Self {
        Expr::ThreadId(axis)
    }

    pub fn load(buffer: impl Into<String>, index: impl Into<Expr>) -> Self {
        Expr::Load {
            buffer: buffer.into(),
            index: Box::new(index.into()),
        }
    }

    pub fn constant(buffer: impl Into<String>) -> Self {
        Expr::Constant {
            buffer: buffer.into(),
            field: None,
        }
    }

    pub fn constant_field(buffer: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::Constant {
            buffer: buffer.into(),
            field: Some(field.into()),
        }
    }

    pub fn field(self, name: impl Into<String>) -> Self {
        Expr::Field(Box::new(self), name.into())
    }

    pub fn call(intrinsic: Intrinsic, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Call(intrinsic, args.into_iter().collect())
    }

    pub fn cast(self, ty: ShaderType) -> Self {
        Expr::Cast(ty, Box::new(self))
    }

    fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Self {
        Expr::Binary(op, Box::new(self), Box::new(rhs.into()))
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }
}

impl From<f32> for Expr {
    fn from(value: f32) -> Self {
        Expr::Float(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Int(value)
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Uint(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Bool(value)
    }
}

macro_rules! binary_operators {
    ($($trait:ident $method:ident => $op:expr),* $(,)?) => {
        $(
            impl<R: Into<Expr>> $trait<R> for Expr {
                type Output = Expr;
                fn $method(self, rhs: R) -> Expr {
                    self.binary($op, rhs)
                }
            }
        )*
    };
}

binary_operators! {
    Add add => BinaryOp::Add,
    Sub sub => BinaryOp::Sub,
    Mul mul => BinaryOp::Mul,
    Div div => BinaryOp::Div,
    Rem rem => BinaryOp::Rem,
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
}

/// Something a kernel can assign to.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Local(String),
    Element {
        buffer: String,
        index: Expr,
        field: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: ShaderType,
        value: Expr,
    },
    Assign {
        place: Place,
        value: Expr,
    },
    If {
        condition: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// `for counter in start..end` with a `u32` counter.
    For {
        counter: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    Return,
}

impl Stmt {
    /// Declares a mutable local.
    pub fn declare(name: impl Into<String>, ty: ShaderType, value: impl Into<Expr>) -> Self {
        Stmt::Let {
            name: name.into(),
            ty,
            value: value.into(),
        }
    }

    pub fn set(local: impl Into<String>, value: impl Into<Expr>) -> Self {
        Stmt::Assign {
            place: Place::Local(local.into()),
            value: value.into(),
        }
    }

    pub fn store(buffer: impl Into<String>, index: impl Into<Expr>, value: impl Into<Expr>) -> Self {
        Stmt::Assign {
            place: Place::Element {
                buffer: buffer.into(),
                index: index.into(),
                field: None,
            },
            value: value.into(),
        }
    }

    pub fn store_field(
        buffer: impl Into<String>,
        index: impl Into<Expr>,
        field: impl Into<String>,
        value: impl Into<Expr>,
    ) -> Self {
        Stmt::Assign {
            place: Place::Element {
                buffer: buffer.into(),
                index: index.into(),
                field: Some(field.into()),
            },
            value: value.into(),
        }
    }

    pub fn if_then(condition: Expr, then: impl IntoIterator<Item = Stmt>) -> Self {
        Stmt::If {
            condition,
            then: then.into_iter().collect(),
            otherwise: Vec::new(),
        }
    }

    pub fn if_else(
        condition: Expr,
        then: impl IntoIterator<Item = Stmt>,
        otherwise: impl IntoIterator<Item = Stmt>,
    ) -> Self {
        Stmt::If {
            condition,
            then: then.into_iter().collect(),
            otherwise: otherwise.into_iter().collect(),
        }
    }

    pub fn for_range(
        counter: impl Into<String>,
        start: impl Into<Expr>,
        end: impl Into<Expr>,
        body: impl IntoIterator<Item = Stmt>,
    ) -> Self {
        Stmt::For {
            counter: counter.into(),
            start: start.into(),
            end: end.into(),
            body: body.into_iter().collect(),
        }
    }
}

/// A buffer parameter of a kernel.  Slots follow declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    name: String,
    kind: BufferKind,
    element: ElementDescriptor,
}

impl Binding {
    pub fn new<T: ShaderElement>(name: impl Into<String>, kind: BufferKind) -> Self {
        Self::with_descriptor(name, kind, T::descriptor())
    }

    pub fn with_descriptor(
        name: impl Into<String>,
        kind: BufferKind,
        element: ElementDescriptor,
    ) -> Self {
        Binding {
            name: name.into(),
            kind,
            element,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn element(&self) -> &ElementDescriptor {
        &self.element
    }
}

/**
A compute kernel.

```
use compute_kernels::translation::Kernel;
let kernel = Kernel::new("main").threads(8, 8, 1);
assert_eq!(kernel.thread_group(), [8, 8, 1]);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    name: String,
    threads: [u32; 3],
    bindings: Vec<Binding>,
    body: Vec<Stmt>,
}

impl Kernel {
    /// A kernel with a 64x1x1 thread group and no bindings.
    pub fn new(name: impl Into<String>) -> Self {
        Kernel {
            name: name.into(),
            threads: [64, 1, 1],
            bindings: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn threads(mut self, x: u32, y: u32, z: u32) -> Self {
        self.threads = [x, y, z];
        self
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn push(mut self, stmt: Stmt) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn body(mut self, stmts: impl IntoIterator<Item = Stmt>) -> Self {
        self.body.extend(stmts);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_group(&self) -> [u32; 3] {
        self.threads
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.body
    }

    /// Checks the kernel and renders it in `dialect`.
    pub fn emit(&self, dialect: Dialect) -> Result<ShaderSource, Error> {
        match dialect {
            Dialect::Hlsl => super::emit::emit::<super::hlsl::Hlsl>(self),
            Dialect::Wgsl => super::emit::emit::<super::wgsl::Wgsl>(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_binary_nodes() {
        let expr = Expr::local("a") + 1.0f32;
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Local("a".to_string())),
                Box::new(Expr::Float(1.0))
            )
        );
        assert!(matches!(-Expr::local("a"), Expr::Unary(UnaryOp::Neg, _)));
    }

    #[test]
    fn intrinsic_names_differ_only_for_lerp() {
        assert_eq!(Intrinsic::Lerp.hlsl_name(), "lerp");
        assert_eq!(Intrinsic::Lerp.wgsl_name(), "mix");
        assert_eq!(Intrinsic::Sqrt.wgsl_name(), "sqrt");
        assert_eq!(Intrinsic::Clamp.arity(), 3);
    }

    #[test]
    fn binding_takes_descriptor_from_element() {
        let binding = Binding::new::<[f32; 4]>("colors", BufferKind::Structured);
        assert_eq!(binding.element().size(), 16);
        assert_eq!(binding.kind(), BufferKind::Structured);
    }
}

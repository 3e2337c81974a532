// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reserved shading-language identifiers, and the escape that makes any host identifier legal.
//!
//! A host identifier is rewritten when it is reserved in the target [Dialect], or when it
//! already begins with the dialect's escape prefix.  The rewrite prepends the prefix:
//!
//! ```
//! use compute_kernels::keywords::{try_map, Dialect};
//!
//! assert_eq!(try_map(Dialect::Hlsl, "sample").as_deref(), Some("__reserved__sample"));
//! assert_eq!(try_map(Dialect::Hlsl, "myVariable"), None);
//! ```
//!
//! Escaping names that already carry the prefix keeps the mapping injective: an escaped name
//! can never coincide with an unescaped one, because every unescaped output lacks the prefix.
//! It also means the emitters can mint their own helper names inside the prefix namespace
//! without colliding with anything a user wrote.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A target shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// HLSL, consumed by DXC-style compilers.
    Hlsl,
    /// WGSL, consumed by wgpu.
    Wgsl,
}

impl Dialect {
    /// Prefix prepended to escaped identifiers.
    ///
    /// WGSL rejects identifiers that begin with two underscores, so the dialects differ.
    pub const fn escape_prefix(self) -> &'static str {
        match self {
            Dialect::Hlsl => "__reserved__",
            Dialect::Wgsl => "reserved_",
        }
    }

    //names the dialect's own lexer refuses, whatever the table says
    fn rejects_lexically(self, name: &str) -> bool {
        match self {
            Dialect::Hlsl => false,
            Dialect::Wgsl => name == "_" || name.starts_with("__"),
        }
    }

    fn reserved(self) -> &'static HashSet<String> {
        match self {
            Dialect::Hlsl => &HLSL_RESERVED,
            Dialect::Wgsl => &WGSL_RESERVED,
        }
    }
}

//scalar type names that also come in `N` vector and `NxM` matrix forms
const HLSL_NUMERIC: [&str; 21] = [
    "bool", "int", "uint", "dword", "half", "float", "double", "min16float", "min10float",
    "min16int", "min12int", "min16uint", "int16_t", "uint16_t", "int32_t", "uint32_t",
    "int64_t", "uint64_t", "float16_t", "float32_t", "float64_t",
];

static HLSL_RESERVED: LazyLock<HashSet<String>> = LazyLock::new(|| {
    let words = [
        // reserved words that no host language filters out
        "asm", "asm_fragment", "cbuffer", "centroid", "column_major",
        "compile", "discard", "export", "fxgroup", "groupshared",
        "inline", "inout", "line", "lineadj", "linear", "matrix",
        "nointerpolation", "noperspective", "NULL", "packoffset", "pass",
        "pixelfragment", "point", "precise", "register", "row_major", "sample",
        "sampler", "shared", "snorm", "stateblock", "stateblock_state", "tbuffer",
        "technique", "typedef", "triangle", "triangleadj", "uniform", "unorm",
        "unsigned", "vector", "vertexfragment", "zero",
        // C-family keywords a host reaches through raw identifiers
        "break", "case", "const", "continue", "default", "do", "else", "enum", "extern",
        "false", "for", "if", "in", "out", "return", "static", "struct", "switch", "true",
        "while", "volatile", "goto", "namespace", "template", "typename", "sizeof", "this",
        "class", "interface", "nullptr", "string", "void", "numthreads",
        // resource and object types
        "texture", "Texture1D", "Texture1DArray", "Texture2D", "Texture2DArray", "Texture3D",
        "TextureCube", "RWTexture1D", "RWTexture2D", "RWTexture3D", "Buffer", "RWBuffer",
        "ByteAddressBuffer", "RWByteAddressBuffer", "StructuredBuffer", "RWStructuredBuffer",
        "AppendStructuredBuffer", "ConsumeStructuredBuffer", "ConstantBuffer", "SamplerState",
        "SamplerComparisonState", "globallycoherent",
        // intrinsics the emitter calls by name
        "abs", "ceil", "clamp", "cos", "dot", "exp", "floor", "length", "lerp", "log",
        "max", "min", "normalize", "pow", "saturate", "sin", "sqrt",
    ];
    let mut reserved: HashSet<String> = words.into_iter().map(str::to_string).collect();
    for base in HLSL_NUMERIC {
        reserved.insert(base.to_string());
        for rows in 1..=4 {
            reserved.insert(format!("{base}{rows}"));
            for columns in 1..=4 {
                reserved.insert(format!("{base}{rows}x{columns}"));
            }
        }
    }
    reserved
});

static WGSL_RESERVED: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        // keywords
        "alias", "break", "case", "const", "const_assert", "continue", "continuing",
        "default", "diagnostic", "discard", "else", "enable", "false", "fn", "for", "if",
        "let", "loop", "override", "requires", "return", "struct", "switch", "true", "var",
        "while",
        // reserved words
        "NULL", "Self", "abstract", "active", "alignas", "alignof", "as", "asm",
        "asm_fragment", "async", "attribute", "auto", "await", "become", "binding_array",
        "cast", "catch", "class", "co_await", "co_return", "co_yield", "coherent",
        "column_major", "common", "compile", "compile_fragment", "concept", "const_cast",
        "consteval", "constexpr", "constinit", "crate", "debugger", "decltype", "delete",
        "demote", "demote_to_helper", "do", "dynamic_cast", "enum", "explicit", "export",
        "extends", "extern", "external", "fallthrough", "filter", "final", "finally",
        "friend", "from", "fxgroup", "get", "goto", "groupshared", "highp", "impl",
        "implements", "import", "inline", "instanceof", "interface", "layout", "lowp",
        "macro", "macro_rules", "match", "mediump", "meta", "mod", "module", "move", "mut",
        "mutable", "namespace", "new", "nil", "noexcept", "noinline", "nointerpolation",
        "non_coherent", "noncoherent", "noperspective", "null", "nullptr", "of", "operator",
        "package", "packoffset", "partition", "pass", "patch", "pixelfragment", "precise",
        "precision", "premerge", "priv", "protected", "pub", "public", "readonly", "ref",
        "regardless", "register", "reinterpret_cast", "require", "resource", "restrict",
        "self", "set", "shared", "sizeof", "smooth", "snorm", "static", "static_assert",
        "static_cast", "std", "subroutine", "super", "target", "template", "this",
        "thread_local", "throw", "trait", "try", "type", "typedef", "typeid", "typename",
        "typeof", "union", "unless", "unorm", "unsafe", "unsized", "use", "using", "varying",
        "virtual", "volatile", "wgsl", "where", "with", "writeonly", "yield",
        // predeclared names the emitter relies on
        "array", "atomic", "bool", "f16", "f32", "i32", "ptr", "u32", "vec2", "vec3", "vec4",
        "abs", "arrayLength", "ceil", "clamp", "cos", "dot", "exp", "floor", "length", "log",
        "max", "min", "mix", "normalize", "pow", "saturate", "sin", "sqrt",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
});

/// Whether `name` is reserved in `dialect`.
pub fn is_reserved(dialect: Dialect, name: &str) -> bool {
    dialect.reserved().contains(name)
}

/// Returns the escaped form of `name` when it cannot be emitted as-is, or `None` when it can.
///
/// Pure and total: the result depends only on the dialect's table and the input.
pub fn try_map(dialect: Dialect, name: &str) -> Option<String> {
    let prefix = dialect.escape_prefix();
    if is_reserved(dialect, name) || name.starts_with(prefix) || dialect.rejects_lexically(name) {
        Some(format!("{prefix}{name}"))
    } else {
        None
    }
}

/// Like [try_map], but always yields the identifier to emit.
pub fn map_identifier(dialect: Dialect, name: &str) -> Cow<'_, str> {
    match try_map(dialect, name) {
        Some(mapped) => Cow::Owned(mapped),
        None => Cow::Borrowed(name),
    }
}

/// A helper name inside the escape namespace; never equal to any mapped user identifier.
pub(crate) fn internal_name(dialect: Dialect, suffix: &str) -> String {
    format!("{}{}", dialect.escape_prefix(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_escaped() {
        let mapped = try_map(Dialect::Hlsl, "sample").unwrap();
        assert_eq!(mapped, "__reserved__sample");
        assert!(!is_reserved(Dialect::Hlsl, &mapped));
    }

    #[test]
    fn ordinary_names_pass_through() {
        assert_eq!(try_map(Dialect::Hlsl, "myVariable"), None);
        assert_eq!(try_map(Dialect::Wgsl, "myVariable"), None);
        assert_eq!(map_identifier(Dialect::Hlsl, "myVariable"), "myVariable");
    }

    #[test]
    fn every_keyword_maps_out_of_the_table() {
        for dialect in [Dialect::Hlsl, Dialect::Wgsl] {
            for keyword in dialect.reserved() {
                let first = try_map(dialect, keyword).unwrap();
                let second = try_map(dialect, keyword).unwrap();
                assert_eq!(first, second);
                assert!(!is_reserved(dialect, &first), "{first} is still reserved");
            }
        }
    }

    #[test]
    fn prefixed_names_are_escaped_again() {
        // a user writing the escaped form of a keyword must not collide with the keyword
        let user = "__reserved__sample";
        let escaped_keyword = try_map(Dialect::Hlsl, "sample").unwrap();
        let escaped_user = try_map(Dialect::Hlsl, user).unwrap();
        assert_ne!(escaped_keyword, escaped_user);
        assert_eq!(escaped_user, "__reserved____reserved__sample");
    }

    #[test]
    fn wgsl_prefix_is_legal_wgsl() {
        let mapped = try_map(Dialect::Wgsl, "type").unwrap();
        assert_eq!(mapped, "reserved_type");
        assert!(!mapped.starts_with("__"));
    }

    #[test]
    fn wgsl_double_underscore_is_escaped() {
        assert_eq!(try_map(Dialect::Wgsl, "__tmp").as_deref(), Some("reserved___tmp"));
        assert_eq!(try_map(Dialect::Wgsl, "_").as_deref(), Some("reserved__"));
        assert_eq!(try_map(Dialect::Hlsl, "__tmp"), None);
    }

    #[test]
    fn hlsl_statement_keywords_and_type_forms() {
        for word in ["struct", "for", "if", "else", "while", "return", "const", "static", "enum", "true"] {
            assert!(is_reserved(Dialect::Hlsl, word), "{word}");
        }
        for ty in ["half2", "half4", "float1", "int1", "uint3x4", "bool2x2", "min16float4", "float16_t2"] {
            assert!(is_reserved(Dialect::Hlsl, ty), "{ty}");
        }
        assert!(!is_reserved(Dialect::Hlsl, "half5"));
    }

    #[test]
    fn dialects_have_separate_tables() {
        assert!(is_reserved(Dialect::Hlsl, "cbuffer"));
        assert!(!is_reserved(Dialect::Wgsl, "cbuffer"));
        assert!(is_reserved(Dialect::Wgsl, "let"));
        assert!(!is_reserved(Dialect::Hlsl, "let"));
    }

    #[test]
    fn internal_names_live_in_the_escape_namespace() {
        let helper = internal_name(Dialect::Hlsl, "ThreadIds");
        assert_eq!(try_map(Dialect::Hlsl, "ThreadIds"), None);
        assert_ne!(map_identifier(Dialect::Hlsl, &helper), helper);
    }
}

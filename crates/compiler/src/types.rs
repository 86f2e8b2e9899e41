//! Type classification and conversion rules
//!
//! Types travel through the front end as canonical strings: `int`, `char*`
//! (no space before `*`), `int[3][4]`, `int &`, `void (*)(int, char*)`.
//! This module owns the predicates over that spelling: classification,
//! array-to-pointer decay, the usual arithmetic conversions and pointer
//! compatibility. Anything that needs the symbol table (typedef resolution,
//! struct sizes) lives on `SymbolTable` instead.

/// Size in bytes of any pointer or reference.
pub const POINTER_SIZE: i64 = 8;

/// char, short, int, long.
pub fn is_integer_type(ty: &str) -> bool {
    matches!(ty, "char" | "short" | "int" | "long")
}

/// Integer types plus float and double.
pub fn is_arithmetic_type(ty: &str) -> bool {
    is_integer_type(ty) || matches!(ty, "float" | "double")
}

pub fn is_float_type(ty: &str) -> bool {
    matches!(ty, "float" | "double")
}

pub fn is_char_type(ty: &str) -> bool {
    ty == "char"
}

pub fn is_void(ty: &str) -> bool {
    ty == "void"
}

/// Array types carry their dimensions in the spelling: `int[3]`.
pub fn is_array_type(ty: &str) -> bool {
    ty.contains('[')
}

pub fn is_pointer_type(ty: &str) -> bool {
    ty.contains('*')
}

/// Reference types are spelled with a trailing `&`: `int &`.
pub fn is_reference_type(ty: &str) -> bool {
    ty.trim_end().ends_with('&')
}

/// Scalar = arithmetic or pointer; what a controlling expression must be.
pub fn is_scalar_type(ty: &str) -> bool {
    is_arithmetic_type(ty) || is_pointer_type(ty)
}

/// Array-to-pointer decay: `int[3][4]` becomes `int*`; non-arrays pass
/// through unchanged. Idempotent on non-array types.
pub fn decay(ty: &str) -> String {
    match ty.find('[') {
        Some(idx) => {
            let mut base = ty[..idx].trim_end().to_string();
            base.push('*');
            base
        }
        None => ty.to_string(),
    }
}

/// The usual arithmetic conversions: the first of double, float, long, int
/// that either operand is.
pub fn usual_arith_conv(a: &str, b: &str) -> &'static str {
    if a == "double" || b == "double" {
        "double"
    } else if a == "float" || b == "float" {
        "float"
    } else if a == "long" || b == "long" {
        "long"
    } else {
        "int"
    }
}

/// Strip one pointer level: `int**` -> `int*`, `struct S*` -> `struct S`.
/// Trailing whitespace is trimmed from the result.
pub fn pointer_base(ty: &str) -> String {
    match ty.rfind('*') {
        Some(idx) => {
            let mut base = ty[..idx].to_string();
            while base.ends_with(' ') {
                base.pop();
            }
            base
        }
        None => ty.to_string(),
    }
}

/// Two pointer types are compatible when one side is `void*` or the base
/// types match exactly.
pub fn pointer_compatible(a: &str, b: &str) -> bool {
    if a == "void*" || b == "void*" {
        return true;
    }
    pointer_base(a) == pointer_base(b)
}

/// Canonical pointer spelling: drop spaces adjacent to `*`, so `int * *`
/// and `int *` become `int**` / `int*`.
pub fn canonical_pointer(ty: &str) -> String {
    let bytes: Vec<char> = ty.chars().collect();
    let mut out = String::with_capacity(ty.len());
    for (i, &c) in bytes.iter().enumerate() {
        if c == ' ' {
            let prev_star = i > 0 && bytes[i - 1] == '*';
            let next_star = bytes.get(i + 1) == Some(&'*');
            if i == 0 || prev_star || next_star {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// `int &` -> `int`. Non-reference types come back unchanged.
pub fn strip_reference(ty: &str) -> String {
    let trimmed = ty.trim_end();
    match trimmed.strip_suffix('&') {
        Some(base) => base.trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Flatten a type for use inside a cast opcode: spaces and punctuation
/// become underscores, so `struct S*` -> `struct_S_` and the resulting
/// `CAST_from_to_to` text stays a single IR token.
pub fn sanitize_for_opcode(ty: &str) -> String {
    ty.chars()
        .map(|c| match c {
            ' ' | '*' | '&' | '[' | ']' | '(' | ')' | ',' => '_',
            other => other,
        })
        .collect()
}

//! Identifier checks shared by the builder, the staging DDL and the loader.

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lowercased form used in generated function names.
pub fn function_suffix(type_name: &str) -> String {
    type_name.to_ascii_lowercase()
}

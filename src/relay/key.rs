//! Session key derivation

/// Whether a character may appear in a session key (`[0-9a-zA-Z._:-]`)
fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')
}

/// Derive the upstream session key from a connection id.
///
/// Strips every character outside the allow-list. Pure: the same id always
/// yields the same key.
pub fn derive_key(connection_id: &str) -> String {
    connection_id.chars().filter(|c| is_key_char(*c)).collect()
}

/// Whether a derived key can scope an upstream session.
///
/// Empty keys and dot-only keys are unusable: `.` and `..` are path dot
/// segments and would be collapsed out of the session URL.
pub fn is_usable_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().all(|c| c == '.')
}

//! Small string helpers used by the pattern compiler and reverse engine.

/// Returns `true` if `s` is a valid identifier: a letter or underscore
/// followed by letters, digits, or underscores.
///
/// Used to validate route parameter names such as the `year` in
/// `<int:year>`.
///
/// # Examples
///
/// ```
/// use urlmap_core::utils::text::is_identifier;
///
/// assert!(is_identifier("year"));
/// assert!(is_identifier("_private2"));
/// assert!(!is_identifier("2fast"));
/// assert!(!is_identifier("with-dash"));
/// assert!(!is_identifier(""));
/// ```
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Replaces a leading `//` with `/%2F` so a reversed URL can never be
/// interpreted as a scheme-relative reference.
///
/// # Examples
///
/// ```
/// use urlmap_core::utils::text::escape_leading_slashes;
///
/// assert_eq!(escape_leading_slashes("//evil.example/x"), "/%2Fevil.example/x");
/// assert_eq!(escape_leading_slashes("/fine/"), "/fine/");
/// ```
pub fn escape_leading_slashes(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("/%2F{rest}")
    } else {
        url.to_string()
    }
}

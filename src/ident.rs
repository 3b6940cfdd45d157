//! Identifier sanitizing and quoting.
//!
//! This is cosmetic cleanup for structural names (tables, columns), not an
//! injection defense. Untrusted values always travel as bind parameters.

/// Characters removed from an identifier before it is quoted.
fn is_stripped(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '-' | ':')
}

/// Strip disallowed characters without quoting.
pub fn strip(raw: &str) -> String {
    raw.chars().filter(|c| !is_stripped(*c)).collect()
}

/// Wrap an identifier in double quotes, doubling any embedded quote.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Strip then quote. The wildcard `*` passes through untouched.
///
/// Returns `None` when nothing usable remains after stripping.
///
/// ```
/// use qfilter::ident::sanitize;
///
/// assert_eq!(sanitize("trim(a)::bigint").as_deref(), Some("\"trimabigint\""));
/// assert_eq!(sanitize("*").as_deref(), Some("*"));
/// assert_eq!(sanitize(" ( ) "), None);
/// ```
pub fn sanitize(raw: &str) -> Option<String> {
    if raw == "*" {
        return Some("*".to_string());
    }
    let cleaned = strip(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(quote(&cleaned))
    }
}

/// Render a field path for a where/order clause.
pub fn field(path: &str, quoted: bool) -> String {
    if quoted {
        quote(path)
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_and_quotes() {
        assert_eq!(sanitize("first name").unwrap(), "\"firstname\"");
        assert_eq!(sanitize("a-b:c").unwrap(), "\"abc\"");
        assert_eq!(sanitize("\tcount(id)\n").unwrap(), "\"countid\"");
    }

    #[test]
    fn test_sanitize_is_stable_on_raw_name() {
        let once = sanitize("a").unwrap();
        assert_eq!(once, "\"a\"");
        assert_eq!(sanitize("a").unwrap(), once);
        assert_eq!(strip(&strip("a b")), strip("a b"));
    }

    #[test]
    fn test_sanitize_wildcard_and_empty() {
        assert_eq!(sanitize("*").unwrap(), "*");
        assert!(sanitize("").is_none());
        assert!(sanitize("--").is_none());
    }

    #[test]
    fn test_quote_escapes_embedded_quote() {
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_field_unquoted() {
        assert_eq!(field("users.id", false), "users.id");
        assert_eq!(field("id", true), "\"id\"");
    }
}

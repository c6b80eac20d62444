//! Sanitizing client-supplied text (names, raw command lines) before it is logged.
//!
//! A hostile client can send control characters or very long lines; both would
//! otherwise forge or flood log lines.

/// Characters kept from one client string.
pub const MAX_LOGGED_CHARS: usize = 160;

/// Escape control characters and backslashes, cut at [`MAX_LOGGED_CHARS`].
pub fn escape_log(s: &str) -> String {
    escape_with_limit(s, MAX_LOGGED_CHARS)
}

pub fn escape_with_limit(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= limit {
            out.push('…');
            break;
        }
        if ch == '\\' || ch.is_control() {
            out.extend(ch.escape_debug());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_characters_are_escaped() {
        assert_eq!(escape_log("ADD 1 2\r\nACCEPT"), "ADD 1 2\\r\\nACCEPT");
        assert_eq!(escape_log("a\\b"), "a\\\\b");
        assert_eq!(escape_log("\u{1b}[31m"), "\\u{1b}[31m");
    }

    #[test]
    fn test_long_lines_are_cut() {
        let long = "x".repeat(500);
        let escaped = escape_with_limit(&long, 10);
        assert_eq!(escaped, format!("{}…", "x".repeat(10)));
        assert_eq!(escape_log("short"), "short");
    }
}

//! Wildcard filename matcher for intermediate-file cleanup.

/// Match `name` against `pattern`, where `*` matches any run of bytes
/// (including none) and `?` matches exactly one.
///
/// Iterative two-cursor scan: on mismatch after a `*`, the name cursor
/// rewinds one past the last star anchor. No recursion, linear in
/// `name.len() * stars`.
#[must_use]
pub fn glob_match(pattern: &[u8], name: &[u8]) -> bool {
    let (mut p, mut n) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        glob_match(pattern.as_bytes(), name.as_bytes())
    }

    #[test]
    fn literal_match() {
        assert!(matches("abc.obj", "abc.obj"));
        assert!(!matches("abc.obj", "abc.exe"));
        assert!(!matches("abc", "abcd"));
    }

    #[test]
    fn question_mark_is_exactly_one() {
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(!matches("a?c", "abbc"));
    }

    #[test]
    fn star_spans_any_run() {
        assert!(matches("abc.*", "abc.obj"));
        assert!(matches("abc.*", "abc."));
        assert!(matches("*", ""));
        assert!(matches("*", "anything"));
        assert!(!matches("abc.*", "abd.obj"));
    }

    #[test]
    fn star_backtracks_through_repeats() {
        assert!(matches("*.obj", "a.b.obj"));
        assert!(matches("a*b*c", "axxbxxbxc"));
        assert!(!matches("a*b*c", "axxbxxbx"));
    }

    #[test]
    fn trailing_stars_match_empty() {
        assert!(matches("abc**", "abc"));
        assert!(!matches("abc*d", "abc"));
    }
}

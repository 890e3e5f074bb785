//! `*` wildcard matching for selector patterns.

/// Match `subject` against a `*`-delimited pattern.
///
/// The empty pattern matches only the empty subject. Without a `*` the
/// pattern must equal the subject. Otherwise the text before the first `*`
/// must be a prefix, each middle segment must occur in order after the
/// previous match, and unless the pattern ends in `*` the last segment must
/// end the subject.
pub fn glob_match(subject: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return subject.is_empty();
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let &[first, ref middle @ .., last] = segments.as_slice() else {
        return subject == pattern;
    };

    let Some(mut rest) = subject.strip_prefix(first) else {
        return false;
    };
    for segment in middle {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

// Local path comparison. Local items are compared case-insensitively with
// either separator accepted.

fn unify(path: &str) -> String {
    path.replace('\\', "/").trim_end_matches('/').to_lowercase()
}

pub fn equals(a: &str, b: &str) -> bool {
    unify(a) == unify(b)
}

/// `item` is `parent` or lives beneath it.
pub fn is_child_or_equal(parent: &str, item: &str) -> bool {
    relative(parent, item).is_some()
}

/// The part of `item` below `parent`, `""` when they are equal.
pub fn relative<'a>(parent: &str, item: &'a str) -> Option<&'a str> {
    let parent_len = parent.replace('\\', "/").trim_end_matches('/').len();
    let head = item.get(..parent_len)?;
    if unify(head) != unify(parent) {
        return None;
    }
    let tail = &item[parent_len..];
    if tail.is_empty() {
        return Some("");
    }
    if tail.starts_with('/') || tail.starts_with('\\') {
        Some(tail.trim_start_matches(['/', '\\']))
    } else {
        None
    }
}

/// Append `relative` (a `/` separated tail) beneath `parent`.
pub fn combine(parent: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        return parent.to_string();
    }
    if parent.ends_with('/') || parent.ends_with('\\') {
        format!("{parent}{relative}")
    } else {
        format!("{parent}/{relative}")
    }
}

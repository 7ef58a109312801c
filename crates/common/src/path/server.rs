// Server path canonicalization: `$/` rooted, `/` separated, 259 char max.

use std::cmp::Ordering;

use thiserror::Error;

/// Root of every server path.
pub const ROOT: &str = "$/";

/// Longest server path the newest protocol generation accepts.
pub const MAX_SERVER_PATH_SIZE: i32 = 259;

const INVALID_CHARS: &[char] = &['"', '<', '>', '|', ':', '\0'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("server path must start with `$/`: {0}")]
    NotRooted(String),

    #[error("path exceeds maximum length of {MAX_SERVER_PATH_SIZE} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),
}

/// Canonicalize a server path.
///
/// Rules:
/// - Must start with `$` followed by a separator (or be exactly `$`)
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip trailing `/` except on the root
/// - Reject `.` and `..` components, whitespace-only components and the
///   characters `" < > | :` and NUL
/// - Enforce the 259 character limit
pub fn canonicalize(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let unified = input.replace('\\', "/");
    let rest = match unified.strip_prefix('$') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest,
        _ => return Err(PathError::NotRooted(input.to_string())),
    };

    let components: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    for component in &components {
        if *component == "." || *component == ".." {
            return Err(PathError::Traversal((*component).to_string()));
        }
        if component.trim().is_empty() {
            return Err(PathError::InvalidComponent(
                "(whitespace-only component)".to_string(),
            ));
        }
        if component.contains(INVALID_CHARS) {
            return Err(PathError::InvalidComponent((*component).to_string()));
        }
    }

    let result = if components.is_empty() {
        ROOT.to_string()
    } else {
        format!("{ROOT}{}", components.join("/"))
    };

    if result.chars().count() > MAX_SERVER_PATH_SIZE as usize {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

/// Whether `s` looks like a server path (as opposed to a local one).
pub fn is_server_path(s: &str) -> bool {
    s == "$" || s.starts_with("$/") || s.starts_with("$\\")
}

/// Case-insensitive equality.
pub fn equals(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Case-insensitive total order used for sorting server items.
pub fn compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// `item` is `parent` or lives beneath it.
pub fn is_child_or_equal(parent: &str, item: &str) -> bool {
    if equals(parent, item) {
        return true;
    }
    let parent = parent.to_lowercase();
    let item = item.to_lowercase();
    let prefix = if parent.ends_with('/') {
        parent
    } else {
        format!("{parent}/")
    };
    item.starts_with(&prefix)
}

/// Number of components below the root: `$/` is 0, `$/Project` is 1.
pub fn depth(path: &str) -> usize {
    path.trim_start_matches('$')
        .split('/')
        .filter(|s| !s.is_empty())
        .count()
}

/// A team project root is exactly one level below `$/`.
pub fn is_team_project_root(path: &str) -> bool {
    depth(path) == 1
}

pub fn parent(path: &str) -> Option<&str> {
    if depth(path) == 0 {
        return None;
    }
    let idx = path.rfind('/')?;
    if idx <= 1 {
        Some(ROOT)
    } else {
        Some(&path[..idx])
    }
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Append `relative` (a `/` or `\` separated tail) beneath `parent`.
pub fn combine(parent: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        return parent.to_string();
    }
    if parent.ends_with('/') {
        format!("{parent}{relative}")
    } else {
        format!("{parent}/{relative}")
    }
}

// Translation between local and server paths through working folders.

use crate::path::{local, server};
use crate::types::{RecursionType, WorkingFolder};

fn depth_allows(folder_depth: RecursionType, levels_below: usize) -> bool {
    match folder_depth {
        RecursionType::None => levels_below == 0,
        RecursionType::OneLevel => levels_below <= 1,
        RecursionType::Full => true,
    }
}

fn levels(tail: &str) -> usize {
    tail.split(['/', '\\']).filter(|s| !s.is_empty()).count()
}

/// Map a local path to its server path using the longest matching mapping.
/// Cloaked folders never map.
pub fn local_to_server(folders: &[WorkingFolder], local_item: &str) -> Option<String> {
    folders
        .iter()
        .filter_map(|folder| {
            let mapped = folder.local_item.as_deref()?;
            let tail = local::relative(mapped, local_item)?;
            depth_allows(folder.depth, levels(tail)).then(|| (mapped.len(), folder, tail))
        })
        .max_by_key(|(len, _, _)| *len)
        .map(|(_, folder, tail)| server::combine(&folder.server_item, tail))
}

/// Map a server path to its local path. A cloak on the closest folder hides it.
pub fn server_to_local(folders: &[WorkingFolder], server_item: &str) -> Option<String> {
    let (folder, tail) = folders
        .iter()
        .filter(|folder| server::is_child_or_equal(&folder.server_item, server_item))
        .max_by_key(|folder| folder.server_item.len())
        .map(|folder| {
            let skip = folder.server_item.trim_end_matches('/').len();
            (folder, server_item.get(skip..).unwrap_or("").trim_start_matches('/'))
        })?;
    let mapped = folder.local_item.as_deref()?;
    if !depth_allows(folder.depth, levels(tail)) {
        return None;
    }
    Some(local::combine(mapped, tail))
}

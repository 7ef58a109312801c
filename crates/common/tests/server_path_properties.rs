use proptest::prelude::*;

use tfvc_common::path::server::{canonicalize, depth, is_child_or_equal, parent};
use tfvc_common::ServiceLevel;

fn component() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_ .-]{1,12}".prop_filter("no traversal or blank", |s| {
        s != "." && s != ".." && !s.trim().is_empty()
    })
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(parts in prop::collection::vec(component(), 0..6)) {
        let raw = format!("$\\{}//", parts.join("\\"));
        let once = canonicalize(&raw).expect("generated path should be valid");
        let twice = canonicalize(&once).expect("canonical path should stay valid");
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.starts_with("$/"));
        prop_assert_eq!(depth(&once), parts.len());
    }

    #[test]
    fn parent_contains_child(parts in prop::collection::vec(component(), 1..6)) {
        let path = canonicalize(&format!("$/{}", parts.join("/"))).expect("valid path");
        let up = parent(&path).expect("non-root path has a parent");
        prop_assert!(is_child_or_equal(up, &path));
        prop_assert_eq!(depth(up) + 1, depth(&path));
    }
}

#[test]
fn service_levels_serialize_as_snake_case() {
    let json = serde_json::to_string(&ServiceLevel::Tfs2012Qu1Update1).expect("serialize level");
    assert_eq!(json, "\"tfs2012_qu1_update1\"");
}

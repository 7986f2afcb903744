//! Canonical path handling.
//!
//! Node identity throughout the VFS is the canonical absolute path: no `.`
//! or `..` components, no doubled or trailing slashes (root stays `"/"`).
//! Everything that touches the node cache funnels through these helpers so
//! the cache never sees two spellings of one entity.

use crate::{VfsError, VfsResult};

/// Upper bound on a full path, matching the fixed node-cache slot width.
pub const MAX_PATH: usize = 256;
/// Upper bound on a single entry name.
pub const MAX_NAME: usize = 64;

/// Canonicalize an absolute path. `..` above root stays at root, the way
/// common shells treat `cd /..`.
pub fn canonicalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        let mut out = String::new();
        for p in &parts {
            out.push('/');
            out.push_str(p);
        }
        out
    }
}

/// Resolve `rel` against the canonical `base`. Absolute `rel` ignores the
/// base entirely.
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        canonicalize(rel)
    } else {
        canonicalize(&format!("{base}/{rel}"))
    }
}

/// Split a canonical path into its parent path and final name. Root has no
/// parent; asking is an invalid argument.
pub fn split_parent(path: &str) -> VfsResult<(String, String)> {
    let canon = canonicalize(path);
    if canon == "/" {
        return Err(VfsError::Invalid);
    }
    match canon.rfind('/') {
        Some(0) => Ok(("/".to_string(), canon[1..].to_string())),
        Some(idx) => Ok((canon[..idx].to_string(), canon[idx + 1..].to_string())),
        None => Err(VfsError::Invalid),
    }
}

/// Validate length limits for a canonical path.
pub fn check_limits(path: &str) -> VfsResult<()> {
    if path.len() >= MAX_PATH {
        return Err(VfsError::NameTooLong);
    }
    for comp in path.split('/') {
        if comp.len() >= MAX_NAME {
            return Err(VfsError::NameTooLong);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_forms() {
        assert_eq!(canonicalize("/"), "/");
        assert_eq!(canonicalize("//"), "/");
        assert_eq!(canonicalize("/a//b/"), "/a/b");
        assert_eq!(canonicalize("/a/./b"), "/a/b");
        assert_eq!(canonicalize("/a/b/.."), "/a");
        assert_eq!(canonicalize("/.."), "/");
        assert_eq!(canonicalize("/../.."), "/");
        assert_eq!(canonicalize("/a/../../b"), "/b");
    }

    #[test]
    fn join_respects_absolute_override() {
        assert_eq!(join("/home/user", "docs"), "/home/user/docs");
        assert_eq!(join("/home/user", "../other"), "/home/other");
        assert_eq!(join("/home/user", "/etc"), "/etc");
        assert_eq!(join("/", ".."), "/");
        assert_eq!(join("/", "."), "/");
    }

    #[test]
    fn parent_split() {
        assert_eq!(
            split_parent("/etc/passwd").unwrap(),
            ("/etc".to_string(), "passwd".to_string())
        );
        assert_eq!(
            split_parent("/x").unwrap(),
            ("/".to_string(), "x".to_string())
        );
        assert_eq!(
            split_parent("/a/b/").unwrap(),
            ("/a".to_string(), "b".to_string())
        );
        assert_eq!(split_parent("/").unwrap_err(), VfsError::Invalid);
    }

    #[test]
    fn limits_enforced() {
        let long_name = "x".repeat(MAX_NAME);
        assert_eq!(
            check_limits(&format!("/{long_name}")).unwrap_err(),
            VfsError::NameTooLong
        );
        let long_path = format!("/{}", "ab/".repeat(MAX_PATH / 3 + 1));
        assert_eq!(check_limits(&long_path).unwrap_err(), VfsError::NameTooLong);
        assert!(check_limits("/etc/passwd").is_ok());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Canonicalization is idempotent and always yields an absolute path
        // with no dot components.
        #[test]
        fn canonicalize_is_idempotent(raw in "[a-z./]{0,40}") {
            let once = canonicalize(&format!("/{raw}"));
            let twice = canonicalize(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.starts_with('/'));
            prop_assert!(!once.split('/').any(|c| c == "." || c == ".."));
            prop_assert!(once == "/" || !once.ends_with('/'));
        }

        // Joining a relative name then taking the parent returns to the base.
        #[test]
        fn join_then_parent_round_trips(name in "[a-z]{1,10}") {
            let base = "/home/user";
            let joined = join(base, &name);
            let (parent, leaf) = split_parent(&joined).unwrap();
            prop_assert_eq!(parent, base.to_string());
            prop_assert_eq!(leaf, name);
        }
    }
}

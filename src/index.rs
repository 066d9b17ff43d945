//! # Header tree codec
//!
//! The archive header is a JSON document mirroring the packed directory:
//! every directory is an object keyed by entry name, every file is the
//! unsigned integer value of its content hash.
//!
//! ```text
//! {
//!   "a.txt": 11831194018420276491,
//!   "sub": {
//!     "c.txt": 4486886446423414130
//!   }
//! }
//! ```
//!
//! [`TreeNode`] is the in-memory model; `serde_json::Value` is only used at
//! this boundary.

use std::collections::{btree_map, BTreeMap};
use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::{is_valid_entry_name, ContentHash, TreeNode};
use crate::error::{ArchiverError, Result};

/// Serializes a tree to pretty-printed JSON (two-space indentation).
pub fn dump(tree: &TreeNode) -> Result<String> {
    write_tree(tree, true)
}

/// Serializes a tree without insignificant whitespace.
pub fn dump_compact(tree: &TreeNode) -> Result<String> {
    write_tree(tree, false)
}

/// Emits the same text as `serde_json`'s pretty/compact formatters, but
/// walks the tree with an explicit stack so nesting depth is unbounded.
fn write_tree(tree: &TreeNode, pretty: bool) -> Result<String> {
    let mut out = String::new();
    // (remaining children, nothing written yet at this level)
    let mut stack: Vec<(btree_map::Iter<'_, String, TreeNode>, bool)> = Vec::new();

    match tree {
        TreeNode::Leaf(hash) => write_hash(&mut out, *hash),
        TreeNode::Directory(children) if children.is_empty() => out.push_str("{}"),
        TreeNode::Directory(children) => {
            out.push('{');
            stack.push((children.iter(), true));
        }
    }

    while let Some((entries, first)) = stack.last_mut() {
        match entries.next() {
            Some((name, child)) => {
                if !*first {
                    out.push(',');
                }
                *first = false;
                if pretty {
                    newline(&mut out, stack.len());
                }
                let key = serde_json::to_string(name)
                    .map_err(|e| ArchiverError::Format(format!("cannot serialize header: {e}")))?;
                out.push_str(&key);
                out.push_str(if pretty { ": " } else { ":" });
                match child {
                    TreeNode::Leaf(hash) => write_hash(&mut out, *hash),
                    TreeNode::Directory(grand) if grand.is_empty() => out.push_str("{}"),
                    TreeNode::Directory(grand) => {
                        out.push('{');
                        stack.push((grand.iter(), true));
                    }
                }
            }
            None => {
                stack.pop();
                if pretty {
                    newline(&mut out, stack.len());
                }
                out.push('}');
            }
        }
    }
    Ok(out)
}

fn write_hash(out: &mut String, hash: ContentHash) {
    let _ = write!(out, "{}", hash.0);
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Parses header text back into a tree. The root must be an object.
///
/// `serde_json`'s nesting limit is lifted and deep documents are parsed on
/// a growable stack, so any tree the writer produced can be read back.
pub fn parse(text: &str) -> Result<TreeNode> {
    let syntax = |e: serde_json::Error| {
        ArchiverError::Format(format!("malformed header at line {} column {}: {e}", e.line(), e.column()))
    };
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let doc = Value::deserialize(serde_stacker::Deserializer::new(&mut de)).map_err(syntax)?;
    de.end().map_err(syntax)?;
    if !doc.is_object() {
        return Err(ArchiverError::Format("header root must be an object".into()));
    }
    from_document(doc)
}

/// Converts the tree into the generic document model.
pub fn to_document(tree: &TreeNode) -> Value {
    let root = match tree {
        TreeNode::Leaf(hash) => return Value::from(hash.0),
        TreeNode::Directory(children) => children,
    };

    // Each frame: the directory being drained, the object being filled,
    // the name under which that object goes into its parent.
    let mut stack: Vec<(btree_map::Iter<'_, String, TreeNode>, Map<String, Value>, &str)> =
        vec![(root.iter(), Map::new(), "")];
    loop {
        let Some((entries, built, _)) = stack.last_mut() else {
            unreachable!("the root frame is only popped on return");
        };
        match entries.next() {
            Some((name, TreeNode::Leaf(hash))) => {
                built.insert(name.clone(), Value::from(hash.0));
            }
            Some((name, TreeNode::Directory(children))) => {
                stack.push((children.iter(), Map::new(), name.as_str()));
            }
            None => {
                let Some((_, done, name)) = stack.pop() else { unreachable!() };
                match stack.last_mut() {
                    Some((_, parent, _)) => {
                        parent.insert(name.to_owned(), Value::Object(done));
                    }
                    None => return Value::Object(done),
                }
            }
        }
    }
}

/// Converts a document into a tree, validating every value and entry name.
///
/// Walks the document with an explicit stack and takes it apart as it goes.
pub fn from_document(doc: Value) -> Result<TreeNode> {
    let Value::Object(root) = doc else {
        return leaf_from_value(&doc, "<root>").map(TreeNode::Leaf);
    };

    // Each frame: the object being drained, the directory being filled,
    // the name under which that directory goes into its parent, its path.
    struct Pending {
        entries: serde_json::map::IntoIter,
        built: BTreeMap<String, TreeNode>,
        name: String,
        path: String,
    }

    let mut stack = vec![Pending {
        entries: root.into_iter(),
        built: BTreeMap::new(),
        name: String::new(),
        path: String::new(),
    }];

    loop {
        let Some(top) = stack.last_mut() else {
            unreachable!("the root frame is only popped on return");
        };
        match top.entries.next() {
            Some((name, value)) => {
                let path = if top.path.is_empty() { name.clone() } else { format!("{}/{}", top.path, name) };
                if !is_valid_entry_name(&name) {
                    return Err(ArchiverError::Format(format!("invalid entry name '{path}'")));
                }
                match value {
                    Value::Object(obj) => stack.push(Pending {
                        entries: obj.into_iter(),
                        built: BTreeMap::new(),
                        name,
                        path,
                    }),
                    other => {
                        let hash = leaf_from_value(&other, &path)?;
                        top.built.insert(name, TreeNode::Leaf(hash));
                    }
                }
            }
            None => {
                let Some(done) = stack.pop() else { unreachable!() };
                let node = TreeNode::Directory(done.built);
                match stack.last_mut() {
                    Some(parent) => {
                        parent.built.insert(done.name, node);
                    }
                    None => return Ok(node),
                }
            }
        }
    }
}

fn leaf_from_value(value: &Value, path: &str) -> Result<ContentHash> {
    match value.as_u64() {
        Some(h) => Ok(ContentHash(h)),
        None => Err(ArchiverError::Format(format!(
            "entry '{path}' must be a content hash (unsigned integer) or a directory, found {}",
            kind_of(value)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a non-hash number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(h: u64) -> TreeNode {
        TreeNode::Leaf(ContentHash(h))
    }

    fn dir(entries: Vec<(&str, TreeNode)>) -> TreeNode {
        TreeNode::Directory(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn dump_is_pretty_and_sorted() {
        let tree = dir(vec![("b.txt", leaf(2)), ("a.txt", leaf(1)), ("sub", dir(vec![("c", leaf(3))]))]);
        let text = dump(&tree).unwrap();
        assert_eq!(text, "{\n  \"a.txt\": 1,\n  \"b.txt\": 2,\n  \"sub\": {\n    \"c\": 3\n  }\n}");
    }

    #[test]
    fn full_width_hashes_survive() {
        let tree = dir(vec![("max", leaf(u64::MAX)), ("basis", leaf(14695981039346656037))]);
        assert_eq!(parse(&dump(&tree).unwrap()).unwrap(), tree);
    }

    #[test]
    fn pretty_and_minified_forms_parse_to_the_same_tree() {
        let tree = dir(vec![
            ("x", dir(vec![("y", dir(vec![("z.bin", leaf(9))])), ("empty", dir(vec![]))])),
            ("name with \"quotes\", tabs\tand ünïcode", leaf(5)),
        ]);
        let pretty = dump(&tree).unwrap();
        let compact = dump_compact(&tree).unwrap();
        assert_ne!(pretty, compact);
        assert_eq!(parse(&pretty).unwrap(), tree);
        assert_eq!(parse(&compact).unwrap(), tree);
        assert_eq!(parse(" {\t\"x\" :\n{ } }\n").unwrap(), dir(vec![("x", dir(vec![]))]));
    }

    #[test]
    fn key_order_is_not_significant() {
        let a = parse(r#"{"b": 2, "a": {"d": 4, "c": 3}}"#).unwrap();
        let b = parse(r#"{"a": {"c": 3, "d": 4}, "b": 2}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn output_matches_serde_json_formatting() {
        let tree = dir(vec![
            ("a\"b", leaf(1)),
            ("empty", dir(vec![])),
            ("nested", dir(vec![("x", leaf(u64::MAX)), ("y", dir(vec![("z", leaf(0))]))])),
        ]);
        let doc = to_document(&tree);
        assert_eq!(dump(&tree).unwrap(), serde_json::to_string_pretty(&doc).unwrap());
        assert_eq!(dump_compact(&tree).unwrap(), serde_json::to_string(&doc).unwrap());
        assert_eq!(dump(&TreeNode::default()).unwrap(), "{}");
    }

    #[test]
    fn deep_nesting_round_trips() {
        let mut tree = leaf(42);
        for depth in 0..300 {
            tree = dir(vec![(if depth % 2 == 0 { "d" } else { "e" }, tree), ("f", leaf(depth))]);
        }
        let text = dump(&tree).unwrap();
        assert_eq!(parse(&text).unwrap(), tree);
        assert_eq!(parse(&dump_compact(&tree).unwrap()).unwrap(), tree);
        assert_eq!(from_document(to_document(&tree)).unwrap(), tree);
        assert_eq!(tree.leaf_count(), 301);
    }

    #[test]
    fn nesting_far_beyond_serde_json_default_limit_parses() {
        let depth = 1_000;
        let text = format!("{}{{\"leaf\": 7}}{}", "{\"d\": ".repeat(depth), "}".repeat(depth));
        let tree = parse(&text).unwrap();
        let mut node = &tree;
        for _ in 0..depth {
            node = &node.as_directory().unwrap()["d"];
        }
        assert_eq!(node.as_directory().unwrap()["leaf"], leaf(7));
        assert_eq!(dump_compact(&tree).unwrap(), text.replace(' ', ""));
    }

    #[test]
    fn syntax_errors_are_format_errors() {
        for bad in [r#"{"a": 1"#, r#"{"a: 1}"#, r#"{"a" 1}"#, r#"{"a": 1,, "b": 2}"#, "", "nul"] {
            let err = parse(bad).unwrap_err();
            assert!(matches!(err, ArchiverError::Format(_)), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn non_hash_values_are_rejected() {
        for bad in [
            r#"{"a": null}"#,
            r#"{"a": true}"#,
            r#"{"a": "123"}"#,
            r#"{"a": [1, 2]}"#,
            r#"{"a": -1}"#,
            r#"{"a": 1.5}"#,
        ] {
            let err = parse(bad).unwrap_err();
            assert!(matches!(err, ArchiverError::Format(ref m) if m.contains("'a'")), "{bad}: {err:?}");
        }
    }

    #[test]
    fn nested_error_names_the_full_path() {
        let err = parse(r#"{"sub": {"deeper": {"bad": false}}}"#).unwrap_err();
        assert!(err.to_string().contains("sub/deeper/bad"), "{err}");
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(matches!(parse("17").unwrap_err(), ArchiverError::Format(_)));
        assert!(matches!(parse("[]").unwrap_err(), ArchiverError::Format(_)));
    }

    #[test]
    fn escaping_names_are_rejected() {
        for bad in [r#"{"..": 1}"#, r#"{"a/b": 1}"#, r#"{"": 1}"#, r#"{"ok": {".": 1}}"#] {
            assert!(matches!(parse(bad).unwrap_err(), ArchiverError::Format(_)), "{bad}");
        }
    }
}

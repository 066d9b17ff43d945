//! Common utilities and types module.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiverError, Result};

/// 64-bit content fingerprint of a file's bytes. Used as the dedup key.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContentHash(pub u64);

impl ContentHash {
    /// Frame encoding of the hash. Little-endian so archives are portable.
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        ContentHash(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One filesystem entry inside the archive header.
///
/// Children of a directory live in a `BTreeMap`, so iteration is always
/// name-sorted and two trees compare equal regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// A regular file, identified by the hash of its full contents.
    Leaf(ContentHash),
    /// A directory and its named children.
    Directory(BTreeMap<String, TreeNode>),
}

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode::Directory(BTreeMap::new())
    }
}

impl TreeNode {
    pub fn as_directory(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Directory(children) => Some(children),
            TreeNode::Leaf(_) => None,
        }
    }

    /// Inserts `node` at the relative path `components`, creating missing
    /// intermediate directories. An existing entry with the same name is replaced.
    pub fn insert(&mut self, components: &[String], node: TreeNode) -> Result<()> {
        let Some((name, parents)) = components.split_last() else {
            return Err(ArchiverError::Format("cannot insert at an empty path".into()));
        };
        let mut dir = match self {
            TreeNode::Directory(children) => children,
            TreeNode::Leaf(_) => return Err(ArchiverError::Format("tree root is not a directory".into())),
        };
        for part in parents {
            let child = dir.entry(part.clone()).or_default();
            dir = match child {
                TreeNode::Directory(children) => children,
                TreeNode::Leaf(_) => {
                    return Err(ArchiverError::Format(format!(
                        "'{}' is a file but is used as a directory",
                        components.join("/")
                    )))
                }
            };
        }
        dir.insert(name.clone(), node);
        Ok(())
    }

    /// Number of file leaves in the subtree.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                TreeNode::Leaf(_) => count += 1,
                TreeNode::Directory(children) => stack.extend(children.values()),
            }
        }
        count
    }
}

/// True if `name` can be stored as a directory entry and safely joined onto
/// an output directory: exactly one normal path component.
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

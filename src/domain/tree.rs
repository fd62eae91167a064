use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::units::UnitRecord;

/// Anything carrying a code and an optional parent code can be arranged into a tree.
pub trait TreeItem {
    fn code(&self) -> &str;

    fn parent_code(&self) -> Option<&str>;
}

impl TreeItem for UnitRecord {
    fn code(&self) -> &str {
        &self.code
    }

    fn parent_code(&self) -> Option<&str> {
        self.parent()
    }
}

/// Loose JSON objects as handed over by callers of the tree endpoint.
/// Accepts both `parentCode` and `parent_code` spellings.
impl TreeItem for serde_json::Map<String, Value> {
    fn code(&self) -> &str {
        self.get("code").and_then(Value::as_str).unwrap_or_default()
    }

    fn parent_code(&self) -> Option<&str> {
        self.get("parentCode")
            .or_else(|| self.get("parent_code"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Total number of nodes in this subtree, the node itself included.
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }
}

impl<T: TreeItem> TreeNode<T> {
    /// Codes in depth-first pre-order.
    pub fn flatten_codes(nodes: &[TreeNode<T>]) -> Vec<String> {
        let mut codes = Vec::new();
        let mut stack: Vec<&TreeNode<T>> = nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            codes.push(node.item.code().to_string());
            stack.extend(node.children.iter().rev());
        }
        codes
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree input must be an array, got {found}")]
    InvalidInput { found: &'static str },
}

/// Arrange a flat list into a forest using `parent_code` → `code` links.
///
/// Linking runs in input order. A node whose parent is absent from the input
/// (or blank) becomes a root. When several items share a code, children attach
/// to the last of them. A link that would close a cycle is skipped and the
/// node stays a root, so every input item appears exactly once.
pub fn build_tree<T: TreeItem>(items: Vec<T>) -> Vec<TreeNode<T>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        index.insert(item.code(), position);
    }

    let mut parent_of: Vec<Option<usize>> = items
        .iter()
        .map(|item| item.parent_code().and_then(|code| index.get(code).copied()))
        .collect();
    drop(index);
    break_cycles(&mut parent_of);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (position, parent) in parent_of.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(position),
            None => roots.push(position),
        }
    }

    assemble(items, &roots, &children)
}

/// Lenient entry point for untyped input.
///
/// `null` and objects are rejected; other scalars yield an empty forest and
/// non-object array elements are skipped.
pub fn build_tree_from_value(
    input: Value,
) -> Result<Vec<TreeNode<serde_json::Map<String, Value>>>, TreeError> {
    match input {
        Value::Null => Err(TreeError::InvalidInput { found: "null" }),
        Value::Object(_) => Err(TreeError::InvalidInput { found: "object" }),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(Vec::new()),
        Value::Array(values) => {
            let items = values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            Ok(build_tree(items))
        }
    }
}

/// Each item has at most one parent, so cycles are disjoint. Linking in input
/// order, the link that closes a cycle belongs to its last member; drop it.
fn break_cycles(parent_of: &mut [Option<usize>]) {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parent_of.len()];
    let mut path = Vec::new();

    for start in 0..parent_of.len() {
        if state[start] != UNSEEN {
            continue;
        }

        let mut cursor = Some(start);
        while let Some(current) = cursor {
            match state[current] {
                UNSEEN => {
                    state[current] = ON_PATH;
                    path.push(current);
                    cursor = parent_of[current];
                }
                ON_PATH => {
                    let entry = path
                        .iter()
                        .position(|&node| node == current)
                        .unwrap_or_default();
                    if let Some(&closing) = path[entry..].iter().max() {
                        parent_of[closing] = None;
                    }
                    cursor = None;
                }
                _ => cursor = None,
            }
        }

        for node in path.drain(..) {
            state[node] = DONE;
        }
    }
}

/// Materialise nodes bottom-up without recursion; chains can be thousands deep.
fn assemble<T>(items: Vec<T>, roots: &[usize], children: &[Vec<usize>]) -> Vec<TreeNode<T>> {
    let mut slots: Vec<Option<TreeNode<T>>> = items
        .into_iter()
        .map(|item| {
            Some(TreeNode {
                item,
                children: Vec::new(),
            })
        })
        .collect();

    let mut order = Vec::with_capacity(slots.len());
    let mut stack: Vec<usize> = roots.to_vec();
    while let Some(position) = stack.pop() {
        order.push(position);
        stack.extend(children[position].iter().copied());
    }

    // Reverse pre-order visits every child before its parent.
    for &position in order.iter().rev() {
        let mut attached = Vec::with_capacity(children[position].len());
        for &child in &children[position] {
            if let Some(node) = slots[child].take() {
                attached.push(node);
            }
        }
        if let Some(node) = slots[position].as_mut() {
            node.children = attached;
        }
    }

    roots
        .iter()
        .filter_map(|&position| slots[position].take())
        .collect()
}

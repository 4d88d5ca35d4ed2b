//! Selection tree built from keys, fields and metadata selections
//!
//! Keys and fields selections are JSON objects mirroring the document shape.
//! A member whose value is a non-empty object descends; any other member value
//! (typically `{}`) marks a leaf. `*` stands for every field of an object and
//! `[*]` for every element of an array. Several selections may name the same
//! node, in which case their requirements are merged.

use crate::metadata::{MetadataRequest, MetadataSelection};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;

/// Child name matching every field of an object
pub const ANY_KEY: &str = "*";

/// Child name matching every element of an array
pub const ANY_INDEX: &str = "[*]";

/// Requirements attached to one location of the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionNode {
    need_all: bool,
    need_keys: bool,
    need_subset_in_children: bool,
    children: Vec<(String, SelectionNode)>,
    value_names: SmallVec<[String; 1]>,
    length_names: SmallVec<[String; 1]>,
}

impl SelectionNode {
    /// Copy the whole value at this location
    pub fn need_all(&self) -> bool {
        self.need_all
    }

    /// Emit the field names of the object at this location
    pub fn need_keys(&self) -> bool {
        self.need_keys
    }

    /// Some descendant produces subset output
    pub fn need_subset_in_children(&self) -> bool {
        self.need_subset_in_children
    }

    /// This node or a descendant produces subset output
    pub fn needs_subset(&self) -> bool {
        self.need_all || self.need_keys || self.need_subset_in_children
    }

    /// Metadata names that want the scalar value here
    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    /// Metadata names that want the length here
    pub fn length_names(&self) -> &[String] {
        &self.length_names
    }

    /// True if the node has named children
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of named children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Children in insertion order
    pub fn children(&self) -> impl Iterator<Item = (&str, &SelectionNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Child names in insertion order
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Child with exactly this name
    pub fn child(&self, name: &str) -> Option<&SelectionNode> {
        self.child_position(name).map(|idx| &self.children[idx].1)
    }

    /// Insertion index of the child with this name
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|(child, _)| child == name)
    }

    /// Child at an insertion index
    pub fn child_at(&self, idx: usize) -> Option<&SelectionNode> {
        self.children.get(idx).map(|(_, node)| node)
    }

    /// True if nothing is requested at or below this node
    pub fn is_empty(&self) -> bool {
        !self.need_all
            && !self.need_keys
            && self.children.is_empty()
            && self.value_names.is_empty()
            && self.length_names.is_empty()
    }

    fn child_or_insert(&mut self, name: &str) -> &mut SelectionNode {
        let idx = match self.child_position(name) {
            Some(idx) => idx,
            None => {
                self.children
                    .push((name.to_string(), SelectionNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[idx].1
    }
}

#[derive(Debug, Clone, Copy)]
enum SubsetMode {
    Keys,
    All,
}

/// Merged requirements of all selections, rooted at the document root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTree {
    root: SelectionNode,
}

impl SelectionTree {
    /// Tree that selects nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge optional keys, fields and metadata selections into one tree
    ///
    /// `None` contributes nothing. An empty keys or fields object selects the
    /// document root itself.
    pub fn build(
        keys: Option<&Map<String, Value>>,
        fields: Option<&Map<String, Value>>,
        metadata: Option<&MetadataSelection>,
    ) -> Self {
        let mut tree = Self::new();
        if let Some(keys) = keys {
            tree.add_keys(keys);
        }
        if let Some(fields) = fields {
            tree.add_fields(fields);
        }
        if let Some(metadata) = metadata {
            tree.add_metadata(metadata);
        }
        tree
    }

    /// Merge a keys-of selection
    pub fn add_keys(&mut self, keys: &Map<String, Value>) -> &mut Self {
        merge_subset(&mut self.root, keys, SubsetMode::Keys);
        self
    }

    /// Merge a full-copy selection
    pub fn add_fields(&mut self, fields: &Map<String, Value>) -> &mut Self {
        merge_subset(&mut self.root, fields, SubsetMode::All);
        self
    }

    /// Merge a metadata selection
    pub fn add_metadata(&mut self, metadata: &MetadataSelection) -> &mut Self {
        for (name, expr) in metadata.iter() {
            let mut node = &mut self.root;
            for segment in &expr.path {
                node = node.child_or_insert(segment);
            }
            match expr.request {
                MetadataRequest::Value => node.value_names.push(name.to_string()),
                MetadataRequest::Length => node.length_names.push(name.to_string()),
            }
        }
        self
    }

    /// Root node
    pub fn root(&self) -> &SelectionNode {
        &self.root
    }

    /// True if the tree selects nothing
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// True if extraction produces a subset document
    pub fn needs_subset(&self) -> bool {
        self.root.needs_subset()
    }
}

fn merge_subset(node: &mut SelectionNode, selection: &Map<String, Value>, mode: SubsetMode) {
    if selection.is_empty() {
        mark_leaf(node, mode);
        return;
    }
    node.need_subset_in_children = true;
    for (name, value) in selection {
        let child = node.child_or_insert(name);
        match value {
            Value::Object(inner) => merge_subset(child, inner, mode),
            _ => mark_leaf(child, mode),
        }
    }
}

fn mark_leaf(node: &mut SelectionNode, mode: SubsetMode) {
    match mode {
        SubsetMode::Keys => node.need_keys = true,
        SubsetMode::All => node.need_all = true,
    }
}

impl fmt::Display for SelectionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, "<root>", &self.root, 0)
    }
}

fn write_node(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    node: &SelectionNode,
    depth: usize,
) -> fmt::Result {
    write!(f, "{:indent$}{}", "", name, indent = depth * 2)?;
    if node.need_all {
        f.write_str(" all")?;
    }
    if node.need_keys {
        f.write_str(" keys")?;
    }
    if node.need_subset_in_children {
        f.write_str(" subset-below")?;
    }
    for value in &node.value_names {
        write!(f, " value({})", value)?;
    }
    for length in &node.length_names {
        write!(f, " length({})", length)?;
    }
    writeln!(f)?;
    for (child_name, child) in &node.children {
        write_node(f, child_name, child, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn empty_inputs_build_empty_tree() {
        let tree = SelectionTree::build(None, None, None);
        assert!(tree.is_empty());
        assert!(!tree.needs_subset());
    }

    #[test]
    fn empty_fields_selects_root() {
        let fields = Map::new();
        let tree = SelectionTree::build(None, Some(&fields), None);
        assert!(tree.root().need_all());
        assert!(!tree.root().has_children());
        assert!(tree.needs_subset());
    }

    #[test]
    fn nested_fields_mark_ancestors() {
        let fields = object(json!({"a": {"b": {}}, "c": {}}));
        let tree = SelectionTree::build(None, Some(&fields), None);

        let root = tree.root();
        assert!(root.need_subset_in_children());
        assert!(!root.need_all());
        assert_eq!(root.child_names(), vec!["a", "c"]);

        let a = root.child("a").unwrap();
        assert!(a.need_subset_in_children());
        assert!(!a.need_all());
        assert!(a.child("b").unwrap().need_all());
        assert!(root.child("c").unwrap().need_all());
    }

    #[test]
    fn non_object_member_is_leaf() {
        let keys = object(json!({"a": true, "b": null}));
        let tree = SelectionTree::build(Some(&keys), None, None);
        assert!(tree.root().child("a").unwrap().need_keys());
        assert!(tree.root().child("b").unwrap().need_keys());
    }

    #[test]
    fn selections_merge_on_shared_nodes() {
        let keys = object(json!({"a": {}}));
        let fields = object(json!({"a": {}}));
        let metadata = MetadataSelection::from_pairs([("n", "a"), ("len", "length(a)")]).unwrap();
        let tree = SelectionTree::build(Some(&keys), Some(&fields), Some(&metadata));

        assert_eq!(tree.root().child_count(), 1);
        let a = tree.root().child("a").unwrap();
        assert!(a.need_keys());
        assert!(a.need_all());
        assert_eq!(a.value_names(), ["n".to_string()]);
        assert_eq!(a.length_names(), ["len".to_string()]);
    }

    #[test]
    fn metadata_branch_does_not_need_subset() {
        let metadata = MetadataSelection::from_pairs([("n", "x.y")]).unwrap();
        let tree = SelectionTree::build(None, None, Some(&metadata));
        assert!(!tree.is_empty());
        assert!(!tree.needs_subset());
        let x = tree.root().child("x").unwrap();
        assert!(!x.need_subset_in_children());
        assert_eq!(x.child("y").unwrap().value_names(), ["n".to_string()]);
    }

    #[test]
    fn display_lists_requirements() {
        let fields = object(json!({"list": {"[*]": {}}}));
        let metadata = MetadataSelection::from_pairs([("count", "length(list)")]).unwrap();
        let tree = SelectionTree::build(None, Some(&fields), Some(&metadata));
        let rendered = tree.to_string();
        assert!(rendered.contains("<root> subset-below"));
        assert!(rendered.contains("  list subset-below length(count)"));
        assert!(rendered.contains("    [*] all"));
    }
}

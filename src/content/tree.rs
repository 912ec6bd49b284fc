//! Persistent content tree.
//!
//! Nodes are reference counted, so cloning a tree is cheap and an update only
//! copies the containers on the edited path. Everything else is shared with
//! the previous tree and keeps its identity:
//!
//! ```text
//!        root ─────────────────┐ (copied)
//!       /    \                 │
//!    home    contact (shared)  │
//!     |  \                     │
//!   hero  features (shared)    │ (copied)
//!     |                        │
//!   title = "B"                │ (replaced)
//! ```

use super::path::{ContentPath, Segment};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

/// Errors raised when an update target cannot be written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("`{path}` does not resolve: no `{missing}`")]
    Unresolved { path: String, missing: String },

    #[error("`{0}` is not a leaf")]
    NotALeaf(String),

    #[error("`{0}` holds text and only accepts text")]
    ShapeMismatch(String),
}

/// Field map of an object node.
pub type Fields = BTreeMap<String, ContentNode>;

/// One node of the content tree.
#[derive(Debug, Clone)]
pub enum ContentNode {
    Text(Arc<str>),
    Object(Arc<Fields>),
    List(Arc<Vec<ContentNode>>),
}

impl ContentNode {
    pub fn text(s: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(s.as_ref()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Child node addressed by one segment.
    pub fn child(&self, segment: &Segment) -> Option<&ContentNode> {
        match (self, segment) {
            (Self::Object(fields), Segment::Field(name)) => fields.get(name),
            (Self::List(items), Segment::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    /// Reference identity: true when both nodes share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert a stored JSON blob into a node.
    ///
    /// Non-string scalars keep their JSON spelling as text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::text(s),
            Value::Object(map) => Self::Object(Arc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            )),
            Value::Array(items) => {
                Self::List(Arc::new(items.iter().map(Self::from_json).collect()))
            }
            Value::Null => Self::text(""),
            other => Self::text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.to_string()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Copy-on-write replacement of the node at `segments`.
    ///
    /// `depth` counts how many segments were already consumed, for error text.
    /// With `create`, missing fields and the next list slot are made on the
    /// way down instead of failing.
    fn with_replaced(
        &self,
        path: &ContentPath,
        depth: usize,
        value: ContentNode,
        create: bool,
    ) -> Result<Self, TreeError> {
        let segments = path.segments();
        let segment = &segments[depth];
        let last = depth + 1 == segments.len();
        let unresolved = || TreeError::Unresolved {
            path: path.to_string(),
            missing: segment.to_string(),
        };

        let replacement = match self.child(segment) {
            Some(current) if last => {
                check_leaf(path, self, current, &value)?;
                value
            }
            Some(current) => current.with_replaced(path, depth + 1, value, create)?,
            None if !create => return Err(unresolved()),
            None if last => value,
            None => Self::empty_for(&segments[depth + 1]).with_replaced(path, depth + 1, value, create)?,
        };

        // Shallow copy of this container: children are Arc clones.
        match (self, segment) {
            (Self::Object(fields), Segment::Field(name)) => {
                let mut fields = Fields::clone(fields);
                fields.insert(name.clone(), replacement);
                Ok(Self::Object(Arc::new(fields)))
            }
            (Self::List(items), Segment::Index(i)) if *i <= items.len() => {
                let mut items = Vec::clone(items);
                if *i == items.len() {
                    items.push(replacement);
                } else {
                    items[*i] = replacement;
                }
                Ok(Self::List(Arc::new(items)))
            }
            _ => Err(unresolved()),
        }
    }

    /// Empty container that `segment` can step into.
    fn empty_for(segment: &Segment) -> Self {
        match segment {
            Segment::Field(_) => Self::Object(Arc::default()),
            Segment::Index(_) => Self::List(Arc::default()),
        }
    }
}

/// A text leaf takes text. A list element takes any node. Containers are not leaves.
fn check_leaf(
    path: &ContentPath,
    parent: &ContentNode,
    current: &ContentNode,
    value: &ContentNode,
) -> Result<(), TreeError> {
    match (parent, current) {
        (ContentNode::List(_), _) => Ok(()),
        (_, ContentNode::Text(_)) if value.is_text() => Ok(()),
        (_, ContentNode::Text(_)) => Err(TreeError::ShapeMismatch(path.to_string())),
        _ => Err(TreeError::NotALeaf(path.to_string())),
    }
}

impl PartialEq for ContentNode {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ContentNode {}

impl From<&str> for ContentNode {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for ContentNode {
    fn from(s: String) -> Self {
        Self::Text(Arc::from(s))
    }
}

/// The whole site content, keyed by section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    sections: Arc<Fields>,
}

impl ContentTree {
    pub fn new(sections: Fields) -> Self {
        Self {
            sections: Arc::new(sections),
        }
    }

    /// Build a tree from a JSON object whose keys are section names.
    pub fn from_json(value: &Value) -> Self {
        let sections = match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), ContentNode::from_json(v)))
                .collect(),
            _ => Fields::new(),
        };
        Self::new(sections)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.sections
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn section(&self, name: &str) -> Option<&ContentNode> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn get(&self, path: &ContentPath) -> Option<&ContentNode> {
        path.segments()
            .iter()
            .try_fold(self.section(path.section())?, |node, segment| {
                node.child(segment)
            })
    }

    /// Text at `path`, or `""` when the path is missing or not text.
    pub fn text(&self, path: &ContentPath) -> &str {
        self.get(path).and_then(ContentNode::as_text).unwrap_or("")
    }

    /// Replace a whole section, sharing every other section.
    pub fn with_section(&self, name: &str, node: ContentNode) -> Self {
        let mut sections = Fields::clone(&self.sections);
        sections.insert(name.to_owned(), node);
        Self::new(sections)
    }

    /// New tree with `value` at `path`; `self` is untouched.
    ///
    /// The root and every container on the path are fresh copies; all other
    /// subtrees are shared with `self`.
    pub fn with_value(&self, path: &ContentPath, value: ContentNode) -> Result<Self, TreeError> {
        let section = self
            .section(path.section())
            .ok_or_else(|| TreeError::Unresolved {
                path: path.to_string(),
                missing: path.section().to_owned(),
            })?;
        let updated = section.with_replaced(path, 0, value, false)?;
        Ok(self.with_section(path.section(), updated))
    }

    /// Like [`with_value`](Self::with_value), but a path missing here that
    /// names a text leaf in `seed` is created, ancestors included.
    ///
    /// Stored sections replace seed sections whole, so a stored row may lack
    /// fields the pages still show.
    pub fn with_value_or_seeded(
        &self,
        seed: &ContentTree,
        path: &ContentPath,
        value: ContentNode,
    ) -> Result<Self, TreeError> {
        let err = match self.with_value(path, value.clone()) {
            Err(err @ TreeError::Unresolved { .. }) => err,
            other => return other,
        };
        let Some(ContentNode::Text(_)) = seed.get(path) else {
            return Err(err);
        };
        let in_list = matches!(path.segments().last(), Some(Segment::Index(_)));
        if !in_list && !value.is_text() {
            return Err(TreeError::ShapeMismatch(path.to_string()));
        }

        let section = self
            .section(path.section())
            .cloned()
            .unwrap_or_else(|| ContentNode::Object(Arc::default()));
        let updated = section.with_replaced(path, 0, value, true)?;
        Ok(self.with_section(path.section(), updated))
    }

    /// Whether [`with_value_or_seeded`](Self::with_value_or_seeded) would take
    /// text at `path`.
    pub fn accepts_text(&self, seed: &ContentTree, path: &ContentPath) -> bool {
        self.with_value_or_seeded(seed, path, ContentNode::text(""))
            .is_ok()
    }

    /// Identity of the root map, for change detection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.sections, &other.sections)
    }

    /// Every text leaf as `(dotted path, text)`, depth first in key order.
    pub fn text_leaves(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        for (name, node) in self.sections.iter() {
            collect_leaves(node, name.clone(), &mut out);
        }
        out
    }
}

fn collect_leaves<'a>(node: &'a ContentNode, prefix: String, out: &mut Vec<(String, &'a str)>) {
    match node {
        ContentNode::Text(text) => out.push((prefix, text.as_ref())),
        ContentNode::Object(fields) => {
            for (key, child) in fields.iter() {
                collect_leaves(child, format!("{prefix}.{key}"), out);
            }
        }
        ContentNode::List(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_leaves(child, format!("{prefix}.{i}"), out);
            }
        }
    }
}

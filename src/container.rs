//! Read-only hierarchical container model
//!
//! The general-purpose group/dataset/attribute format is an external
//! collaborator: this module defines only the navigation surface the decoder
//! needs ([`ContainerReader`]) plus [`MemoryContainer`], a minimal built-in
//! implementation with a magic-framed bincode encoding. Backends for real
//! container formats implement the trait in the consuming application.

use crate::error::{Result, VolumeError};
use crate::CONTAINER_MAGIC;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Attribute value as stored on a container group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    IntVec(Vec<i64>),
    FloatVec(Vec<f64>),
}

impl AttrValue {
    /// Get the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as f64 (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as u64 (rejects negative and fractional values)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Int(v) if *v >= 0 => Some(*v as u64),
            AttrValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Get the value as a vector of f64 (integer vectors widen)
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::FloatVec(v) => Some(v.clone()),
            AttrValue::IntVec(v) => Some(v.iter().map(|&i| i as f64).collect()),
            _ => None,
        }
    }
}

/// One group in the hierarchy: attributes, child groups, and an optional
/// dataset value.
///
/// Attributes and children are stored as ordered pairs; child order is
/// load-bearing because it defines the canonical channel ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    attrs: Vec<(String, AttrValue)>,
    children: Vec<(String, GroupNode)>,
    dataset: Option<Vec<u8>>,
}

impl GroupNode {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute (builder style)
    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.push((name.into(), value));
        self
    }

    /// Append a child group (builder style)
    pub fn with_child(mut self, name: impl Into<String>, node: GroupNode) -> Self {
        self.children.push((name.into(), node));
        self
    }

    /// Set the dataset value (builder style)
    pub fn with_dataset(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.dataset = Some(data.into());
        self
    }

    /// Look up an attribute by name
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Attributes in native order
    pub fn attrs(&self) -> &[(String, AttrValue)] {
        &self.attrs
    }

    /// Look up a child group by name
    pub fn child(&self, name: &str) -> Option<&GroupNode> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g)
    }

    /// Child group names in native order
    pub fn child_names(&self) -> Vec<String> {
        self.children.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Dataset value, if any
    pub fn dataset(&self) -> Option<&[u8]> {
        self.dataset.as_deref()
    }
}

/// Trait for read-only, by-path navigation over an opened container
///
/// Paths are `/`-separated group names relative to the root; `""` and `"/"`
/// address the root group itself. Implementations must preserve the
/// container's native attribute and child ordering.
pub trait ContainerReader: Send + Sync {
    /// Attributes of the group at `path`, in native order
    fn attributes(&self, path: &str) -> Result<Vec<(String, AttrValue)>>;

    /// Child group names at `path`, in native order
    fn child_groups(&self, path: &str) -> Result<Vec<String>>;

    /// Whether a group exists at `path`
    fn has_group(&self, path: &str) -> bool;

    /// Dataset bytes stored at the group at `path`
    fn dataset(&self, path: &str) -> Result<Bytes>;

    /// Look up a single attribute by group path and name
    fn attribute(&self, path: &str, name: &str) -> Result<Option<AttrValue>> {
        Ok(self
            .attributes(path)?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v))
    }
}

/// In-memory container backed by a [`GroupNode`] tree
///
/// The byte encoding is [`CONTAINER_MAGIC`] followed by the bincode-encoded
/// root group. Anything else fails with [`VolumeError::Format`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryContainer {
    root: GroupNode,
}

impl MemoryContainer {
    /// Create a container from a root group
    pub fn new(root: GroupNode) -> Self {
        Self { root }
    }

    /// Open a byte buffer as a container
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONTAINER_MAGIC.len() || &bytes[..CONTAINER_MAGIC.len()] != CONTAINER_MAGIC
        {
            return Err(VolumeError::Format(
                "buffer does not start with the container magic".to_string(),
            ));
        }

        let root: GroupNode = bincode::deserialize(&bytes[CONTAINER_MAGIC.len()..])
            .map_err(|e| VolumeError::Format(format!("container body: {}", e)))?;
        Ok(Self { root })
    }

    /// Serialize the container to its byte encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = CONTAINER_MAGIC.to_vec();
        let body = bincode::serialize(&self.root)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Root group accessor
    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<&GroupNode> {
        let mut node = &self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }

    fn require(&self, path: &str) -> Result<&GroupNode> {
        self.resolve(path)
            .ok_or_else(|| VolumeError::Format(format!("no group at path {:?}", path)))
    }
}

impl ContainerReader for MemoryContainer {
    fn attributes(&self, path: &str) -> Result<Vec<(String, AttrValue)>> {
        Ok(self.require(path)?.attrs().to_vec())
    }

    fn child_groups(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.require(path)?.child_names())
    }

    fn has_group(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    fn dataset(&self, path: &str) -> Result<Bytes> {
        let node = self.require(path)?;
        let data = node
            .dataset()
            .ok_or_else(|| VolumeError::Format(format!("group {:?} has no dataset value", path)))?;
        Ok(Bytes::copy_from_slice(data))
    }
}

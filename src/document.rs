//! Configuration document loading.
//!
//! A configuration document is a tree of object declarations. Each declaration names
//! a runtime object (`id`), declares its type tag (`type`), carries a table of scalar
//! `properties`, and may nest further declarations under `object`:
//!
//! ```toml
//! [[object]]
//! id = "logctl0"
//! type = "controller"
//! properties = { ctype = "log" }
//!
//!   [[object.object]]
//!   id = "log0"
//!   type = "log"
//!   properties = { path = "./", file = "log.dat", format = "%F-%T" }
//!
//!     [[object.object.object]]
//!     id = "col0"
//!     type = "column"
//!     properties = { chref = "ai0" }
//! ```
//!
//! Loading only checks syntax. Whether a type tag exists or a name is unique is decided
//! by the [builder](crate::builder).

use crate::error::{CldError, CldResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    object: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    id: String,
    r#type: String,
    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
    #[serde(default)]
    object: Vec<RawNode>,
}

/// One object declaration in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    type_tag: String,
    name: String,
    parameters: BTreeMap<String, String>,
    children: Vec<ObjectNode>,
}

impl ObjectNode {
    /// The declared type tag.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// The declared object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters as string values.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Nested declarations, in document order.
    pub fn children(&self) -> &[ObjectNode] {
        &self.children
    }

    fn from_raw(raw: RawNode, path: &str) -> CldResult<Self> {
        if raw.id.trim().is_empty() {
            return Err(CldError::ConfigParse(format!(
                "object at '{path}' has an empty id"
            )));
        }
        let node_path = format!("{path}/{}", raw.id);

        let mut parameters = BTreeMap::new();
        for (key, value) in raw.properties {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(CldError::ConfigParse(format!(
                        "property '{key}' of '{node_path}' must be a scalar value"
                    )));
                }
            };
            parameters.insert(key, text);
        }

        let children = raw
            .object
            .into_iter()
            .map(|child| ObjectNode::from_raw(child, &node_path))
            .collect::<CldResult<Vec<_>>>()?;

        Ok(Self {
            type_tag: raw.r#type,
            name: raw.id,
            parameters,
            children,
        })
    }
}

/// Flattened view of one node: type tag, name, parent and parameters.
#[derive(Debug, Clone, Copy)]
pub struct ObjectDescriptor<'a> {
    node: &'a ObjectNode,
    parent: Option<&'a str>,
}

impl<'a> ObjectDescriptor<'a> {
    /// The declared type tag.
    pub fn type_tag(&self) -> &'a str {
        &self.node.type_tag
    }

    /// The declared object name.
    pub fn name(&self) -> &'a str {
        &self.node.name
    }

    /// Name of the enclosing declaration, if any.
    pub fn parent(&self) -> Option<&'a str> {
        self.parent
    }

    /// Parameters as string values.
    pub fn parameters(&self) -> &'a BTreeMap<String, String> {
        &self.node.parameters
    }

    /// Look up a single parameter.
    pub fn parameter(&self, key: &str) -> Option<&'a str> {
        self.node.parameters.get(key).map(String::as_str)
    }

    /// Descriptors of the direct children of this node.
    pub fn children(&self) -> impl Iterator<Item = ObjectDescriptor<'a>> + 'a {
        let node: &'a ObjectNode = self.node;
        let parent = Some(node.name.as_str());
        node.children
            .iter()
            .map(move |node| ObjectDescriptor { node, parent })
    }
}

/// Parsed configuration document. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationDocument {
    roots: Vec<ObjectNode>,
}

impl ConfigurationDocument {
    /// Top-level declarations.
    pub fn roots(&self) -> &[ObjectNode] {
        &self.roots
    }

    /// Every declaration in document order (depth-first, parents before children).
    pub fn descriptors(&self) -> Vec<ObjectDescriptor<'_>> {
        let mut out = Vec::new();
        for root in &self.roots {
            collect(root, None, &mut out);
        }
        out
    }

    /// Total number of declarations in the tree.
    pub fn len(&self) -> usize {
        fn count(node: &ObjectNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    /// True if the document declares no objects.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn collect<'a>(node: &'a ObjectNode, parent: Option<&'a str>, out: &mut Vec<ObjectDescriptor<'a>>) {
    out.push(ObjectDescriptor { node, parent });
    for child in &node.children {
        collect(child, Some(node.name.as_str()), out);
    }
}

/// Parse a document from TOML text.
pub fn load(source: &str) -> CldResult<ConfigurationDocument> {
    let raw: RawDocument =
        toml::from_str(source).map_err(|e| CldError::ConfigParse(e.message().to_string()))?;

    let roots = raw
        .object
        .into_iter()
        .map(|node| ObjectNode::from_raw(node, ""))
        .collect::<CldResult<Vec<_>>>()?;

    let document = ConfigurationDocument { roots };
    debug!(objects = document.len(), "Loaded configuration document");
    Ok(document)
}

/// Parse a document from raw bytes, which must be UTF-8.
pub fn load_bytes(source: &[u8]) -> CldResult<ConfigurationDocument> {
    let text = std::str::from_utf8(source)
        .map_err(|e| CldError::ConfigParse(format!("document is not valid UTF-8: {e}")))?;
    load(text)
}

/// Read and parse a document file.
pub fn load_file(path: impl AsRef<Path>) -> CldResult<ConfigurationDocument> {
    let path = path.as_ref();
    debug!("Loading configuration document from: {}", path.display());
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes)
}

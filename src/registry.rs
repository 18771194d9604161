//! Name-keyed store of runtime objects.
//!
//! The registry is populated by the [builder](crate::builder) and then published,
//! typically behind an `Arc`. Insertion is crate-private, so once built the set of
//! members never changes and any number of threads may read it concurrently.

use crate::core::Named;
use crate::error::{CldError, CldResult};
use crate::log_file::LogComponent;
use crate::object::RuntimeObject;
use std::collections::HashMap;
use std::fmt::Write as _;

struct Entry {
    parent: Option<String>,
    object: RuntimeObject,
}

/// Registry of built objects, iterated in insertion (document) order.
#[derive(Default)]
pub struct ObjectRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.object.name()))
            .finish()
    }
}

impl ObjectRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `object` under its own name.
    pub(crate) fn insert(&mut self, parent: Option<&str>, object: RuntimeObject) -> CldResult<()> {
        let name = object.name().to_string();
        if self.index.contains_key(&name) {
            return Err(CldError::DuplicateName(name));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry {
            parent: parent.map(str::to_string),
            object,
        });
        Ok(())
    }

    /// Look up an object by name.
    pub fn get(&self, name: &str) -> Option<&RuntimeObject> {
        self.index.get(name).map(|&i| &self.entries[i].object)
    }

    /// True if an object with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Name of the object `name` was declared inside, if any.
    pub fn parent(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .and_then(|&i| self.entries[i].parent.as_deref())
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, object)` pairs in insertion order. Call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuntimeObject)> + '_ {
        self.entries.iter().map(|e| (e.object.name(), &e.object))
    }

    /// Every log component, in insertion order.
    pub fn logs(&self) -> impl Iterator<Item = (&str, &LogComponent)> + '_ {
        self.iter()
            .filter_map(|(name, object)| object.as_log().map(|log| (name, log)))
    }

    /// Look up a log component by name.
    pub fn log(&self, name: &str) -> Option<&LogComponent> {
        self.get(name).and_then(RuntimeObject::as_log)
    }

    /// Indented listing of every object, one per line, nested under its parent.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let depth = self.depth(entry);
            let object = &entry.object;
            let _ = writeln!(
                out,
                "{:indent$}{} [{}]",
                "",
                object.name(),
                object.type_tag(),
                indent = depth * 2
            );
        }
        out
    }

    fn depth(&self, entry: &Entry) -> usize {
        let mut depth = 0;
        let mut parent = entry.parent.as_deref();
        while let Some(name) = parent {
            depth += 1;
            parent = self.parent(name);
            if depth > self.entries.len() {
                break;
            }
        }
        depth
    }
}

impl<'a> IntoIterator for &'a ObjectRegistry {
    type Item = (&'a str, &'a RuntimeObject);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a RuntimeObject)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

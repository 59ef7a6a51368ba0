use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::STD_ROOT;
use crate::stdlib::StdLibrary;
use crate::value::{Table, Value};

/// One frame of locally bound names (`let` bindings or arrow parameters).
///
/// Frames are immutable once shared; inner frames link to their parent so lookups walk
/// outward and inner names shadow outer ones.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn new(parent: Option<Arc<Scope>>) -> Self {
        Self {
            bindings: HashMap::new(),
            parent,
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.bindings.get(name) {
                return Some(value);
            }
            scope = scope.parent.as_deref()?;
        }
    }
}

/// The global layers visible to every expression of one evaluation run.
///
/// `nodes` holds committed node results and is write-once per name. `base` holds inputs,
/// tables and the std root; nodes shadow base entries except `std`, which always resolves to
/// the library.
#[derive(Debug, Default)]
pub struct Environment {
    nodes: HashMap<String, Value>,
    base: HashMap<String, Value>,
    std_root: Option<Value>,
}

impl Environment {
    pub fn new(std: &StdLibrary) -> Self {
        Self {
            nodes: HashMap::new(),
            base: HashMap::new(),
            std_root: Some(Value::Record(std.root().clone())),
        }
    }

    pub fn define_input(&mut self, name: impl Into<String>, value: Value) {
        self.base.insert(name.into(), value);
    }

    pub fn define_table(&mut self, table: Table) {
        self.base
            .insert(table.name.clone(), Value::Table(Arc::new(table)));
    }

    /// Commit a node result. Returns `false` (and keeps the first value) if the name was
    /// already committed.
    pub fn commit(&mut self, name: &str, value: Value) -> bool {
        if self.nodes.contains_key(name) {
            log::warn!("node '{name}' was already committed; ignoring the new value");
            return false;
        }
        self.nodes.insert(name.to_string(), value);
        true
    }

    pub fn is_committed(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if name == STD_ROOT {
            return self.std_root.as_ref();
        }
        self.nodes.get(name).or_else(|| self.base.get(name))
    }
}

//! Per-flow variable store with lexical nesting.
//!
//! Each running flow owns a [`DataContext`] layered over its parent's:
//! reads walk the chain outward, writes land in the scope that declares the
//! name (or at the root for undeclared names), and `declare` shadows the
//! parent. The root context holds the project globals.
//!
//! Writes publish the variable name to subscribers registered at the root,
//! which is how watch components observe changes without polling.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::types::VariableDef;

pub struct DataContext {
    parent: Option<Arc<DataContext>>,
    values: RwLock<HashMap<String, Value>>,
    /// Root only. Change subscribers; closed senders are pruned on notify.
    subscribers: RwLock<Vec<mpsc::UnboundedSender<String>>>,
}

impl DataContext {
    /// Root context seeded with the project globals.
    pub fn new_root(globals: &[VariableDef]) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            values: RwLock::new(seed(globals)),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    /// Child scope with its own local variables, chained to `self`.
    pub fn create_with_local_variables(
        self: &Arc<Self>,
        locals: &[VariableDef],
    ) -> Arc<DataContext> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            values: RwLock::new(seed(locals)),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    /// Read a variable through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.read().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Write a variable: lands in the scope that declares the name, or at
    /// the root when no scope does.
    pub fn set(&self, name: &str, value: Value) {
        if self.values.read().contains_key(name) || self.parent.is_none() {
            self.values.write().insert(name.to_string(), value);
        } else if let Some(parent) = &self.parent {
            parent.set(name, value);
            return;
        }
        self.root().notify(name);
    }

    /// Declare (or overwrite) a variable in this scope, shadowing the parent.
    pub fn declare(&self, name: &str, value: Value) {
        self.values.write().insert(name.to_string(), value);
        self.root().notify(name);
    }

    /// Subscribe to variable writes anywhere in this context's chain.
    /// The channel carries the written name; subscribers re-read through
    /// their own scope to get the visible value.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.root().subscribers.write().push(tx);
        rx
    }

    fn root(&self) -> &DataContext {
        let mut ctx = self;
        while let Some(parent) = &ctx.parent {
            ctx = parent;
        }
        ctx
    }

    fn notify(&self, name: &str) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(name.to_string()).is_ok());
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("values", &*self.values.read())
            .field("nested", &self.parent.is_some())
            .finish()
    }
}

fn seed(vars: &[VariableDef]) -> HashMap<String, Value> {
    vars.iter()
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str, value: Value) -> VariableDef {
        VariableDef {
            name: name.into(),
            value,
        }
    }

    #[test]
    fn local_shadows_global() {
        let root = DataContext::new_root(&[var("count", json!(1))]);
        let child = root.create_with_local_variables(&[var("count", json!(10))]);

        assert_eq!(child.get("count"), Some(json!(10)));
        assert_eq!(root.get("count"), Some(json!(1)));
    }

    #[test]
    fn set_lands_in_declaring_scope() {
        let root = DataContext::new_root(&[var("mode", json!("idle"))]);
        let child = root.create_with_local_variables(&[]);
        let grandchild = child.create_with_local_variables(&[]);

        grandchild.set("mode", json!("running"));
        assert_eq!(root.get("mode"), Some(json!("running")));

        // Undeclared names land at the root and become visible everywhere.
        grandchild.set("fresh", json!(true));
        assert_eq!(root.get("fresh"), Some(json!(true)));
        assert_eq!(child.get("fresh"), Some(json!(true)));
    }

    #[test]
    fn declare_does_not_touch_parent() {
        let root = DataContext::new_root(&[var("x", json!(0))]);
        let child = root.create_with_local_variables(&[]);

        child.declare("x", json!(99));
        assert_eq!(child.get("x"), Some(json!(99)));
        assert_eq!(root.get("x"), Some(json!(0)));
    }

    #[tokio::test]
    async fn subscribers_see_writes_from_any_scope() {
        let root = DataContext::new_root(&[var("temp", json!(20))]);
        let child = root.create_with_local_variables(&[]);

        let mut rx = child.subscribe();
        child.set("temp", json!(21));
        assert_eq!(rx.recv().await.as_deref(), Some("temp"));

        root.set("temp", json!(22));
        assert_eq!(rx.recv().await.as_deref(), Some("temp"));
        assert_eq!(child.get("temp"), Some(json!(22)));
    }
}

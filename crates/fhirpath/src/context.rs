//! Evaluation context (§4.6, §6).
//!
//! `Context` is a persistent, immutable value for the `$this`/`$index`/
//! `$total` frames it pushes: every `with_iterator`/`with_total` returns a
//! new `Context` sharing structure with its parent through an `Rc` chain
//! rather than cloning any map, which makes pushing a fresh iteration frame
//! for every element of every `where`/`select`/path step cheap.
//!
//! `defineVariable` bindings are different: the spec gives them forward
//! visibility for "the rest of the expression", not just the subtree that
//! defined them, so they live in a table shared by `Rc<RefCell<_>>` across
//! every `Context` derived from the same evaluation rather than in the
//! parent-pointer chain. Defining `%x` while evaluating the left side of a
//! `Path` is visible when evaluating the right side, and to later siblings
//! reached afterwards in the same top-level `evaluate()` call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fhirpath_support::{Sequence, Value};

enum Frame {
    Root { context_item: Sequence, resource: Option<Rc<serde_json::Value>>, root_resource: Option<Rc<serde_json::Value>> },
    Iteration { this: Value, index: i64 },
    Total { total: Sequence },
}

struct Node {
    parent: Option<Rc<Node>>,
    frame: Frame,
}

#[derive(Clone)]
pub struct Context {
    node: Rc<Node>,
    /// Host-registered external constants (`with_variable`, §6) plus the
    /// `%resource`/`%rootResource`/`%context` reserved roots are resolved
    /// through here; this map is fixed for the whole evaluation and is
    /// never shadowed by `defineVariable` (which lives in the `node` chain).
    env: Rc<HashMap<String, Sequence>>,
    /// `trace()` sink (§6 supplemented `trace` function): shared by every
    /// `Context` derived from the same root, so a label recorded deep inside
    /// a `where`/`select` closure is visible to the caller that kicked off
    /// the top-level evaluation.
    trace_log: Rc<RefCell<Vec<(String, Sequence)>>>,
    /// `defineVariable` bindings, shared by every `Context` derived from the
    /// same root. Forward-visible only: see module docs.
    vars: Rc<RefCell<HashMap<String, Sequence>>>,
}

impl Context {
    /// A fresh root context over `input`, with no resource/env bindings.
    /// Hosts normally go through `FhirPathEngine` rather than this directly.
    pub fn new(input: Sequence) -> Self {
        Context {
            node: Rc::new(Node {
                parent: None,
                frame: Frame::Root { context_item: input, resource: None, root_resource: None },
            }),
            env: Rc::new(HashMap::new()),
            trace_log: Rc::new(RefCell::new(Vec::new())),
            vars: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn with_resource(&self, resource: Rc<serde_json::Value>, root_resource: Rc<serde_json::Value>) -> Self {
        let context_item = self.context_item();
        Context {
            node: Rc::new(Node {
                parent: None,
                frame: Frame::Root { context_item, resource: Some(resource), root_resource: Some(root_resource) },
            }),
            env: self.env.clone(),
            trace_log: self.trace_log.clone(),
            vars: self.vars.clone(),
        }
    }

    pub fn with_env(&self, env: HashMap<String, Sequence>) -> Self {
        Context { node: self.node.clone(), env: Rc::new(env), trace_log: self.trace_log.clone(), vars: self.vars.clone() }
    }

    /// Binds `%name` for the rest of this evaluation (`defineVariable`).
    /// Returns `self.clone()` since the binding is recorded in the shared
    /// table, not in a new frame — re-defining a name simply overwrites it.
    pub fn with_variable(&self, name: impl Into<String>, value: Sequence) -> Self {
        self.vars.borrow_mut().insert(name.into(), value);
        self.clone()
    }

    /// Pushes a `$this`/`$index` frame for one step of an iteration
    /// (`where`, `select`, `all`, `repeat`, ...).
    pub fn with_iterator(&self, this: Value, index: i64) -> Self {
        Context {
            node: Rc::new(Node { parent: Some(self.node.clone()), frame: Frame::Iteration { this, index } }),
            env: self.env.clone(),
            trace_log: self.trace_log.clone(),
            vars: self.vars.clone(),
        }
    }

    /// Pushes a `$total` frame (`aggregate`).
    pub fn with_total(&self, total: Sequence) -> Self {
        Context {
            node: Rc::new(Node { parent: Some(self.node.clone()), frame: Frame::Total { total } }),
            env: self.env.clone(),
            trace_log: self.trace_log.clone(),
            vars: self.vars.clone(),
        }
    }

    /// Records one `trace()` call. `name` is the label argument; `value` is
    /// the (optionally projected) traced sequence.
    pub fn record_trace(&self, name: String, value: Sequence) {
        self.trace_log.borrow_mut().push((name, value));
    }

    /// A snapshot of every `trace()` call recorded so far anywhere in this
    /// evaluation, in call order.
    pub fn trace_log(&self) -> Vec<(String, Sequence)> {
        self.trace_log.borrow().clone()
    }

    fn root(&self) -> &Node {
        let mut node = &*self.node;
        loop {
            match &node.frame {
                Frame::Root { .. } => return node,
                _ => node = node.parent.as_ref().expect("chain always terminates in a Root frame"),
            }
        }
    }

    /// The input to the whole evaluation (`%context`), fixed at the root.
    pub fn context_item(&self) -> Sequence {
        match &self.root().frame {
            Frame::Root { context_item, .. } => context_item.clone(),
            _ => unreachable!(),
        }
    }

    pub fn resource(&self) -> Option<Rc<serde_json::Value>> {
        match &self.root().frame {
            Frame::Root { resource, .. } => resource.clone(),
            _ => unreachable!(),
        }
    }

    pub fn root_resource(&self) -> Option<Rc<serde_json::Value>> {
        match &self.root().frame {
            Frame::Root { root_resource, .. } => root_resource.clone(),
            _ => unreachable!(),
        }
    }

    /// `$this` — the nearest enclosing iteration's current element, falling
    /// back to the whole context item when no iteration is in scope.
    pub fn this(&self) -> Sequence {
        let mut node = &*self.node;
        loop {
            match &node.frame {
                Frame::Iteration { this, .. } => return vec![this.clone()],
                Frame::Root { context_item, .. } => return context_item.clone(),
                _ => node = node.parent.as_ref().expect("chain always terminates in a Root frame"),
            }
        }
    }

    /// `$index` — the nearest enclosing iteration's position, or `None` if
    /// `$index` is referenced outside of any iteration.
    pub fn index(&self) -> Option<i64> {
        let mut node = &*self.node;
        loop {
            match &node.frame {
                Frame::Iteration { index, .. } => return Some(*index),
                Frame::Root { .. } => return None,
                _ => node = node.parent.as_ref().expect("chain always terminates in a Root frame"),
            }
        }
    }

    /// `$total` — the nearest enclosing `aggregate()` accumulator, or `None`
    /// if `$total` is referenced outside of `aggregate()`.
    pub fn total(&self) -> Option<Sequence> {
        let mut node = &*self.node;
        loop {
            match &node.frame {
                Frame::Total { total } => return Some(total.clone()),
                Frame::Root { .. } => return None,
                _ => node = node.parent.as_ref().expect("chain always terminates in a Root frame"),
            }
        }
    }

    /// Variables bound by `defineVariable` so far in this evaluation. Does
    /// not consult `%context`/`%resource`/`%rootResource` or host-registered
    /// env vars — see [`Context::get_env`] and [`Context::get_variable`].
    fn get_user_variable(&self, name: &str) -> Option<Sequence> {
        self.vars.borrow().get(name).cloned()
    }

    /// `%resource`/`%rootResource`/`%context`, or a host-registered external
    /// constant (`with_variable` on the engine builder, §6). Consulted after
    /// `defineVariable` bindings, which always take precedence.
    pub fn get_env(&self, name: &str) -> Option<Sequence> {
        match name {
            "context" => Some(self.context_item()),
            "resource" => self.resource().map(|r| vec![Value::Node(r)]),
            "rootResource" => self.root_resource().map(|r| vec![Value::Node(r)]),
            _ => self.env.get(name).cloned(),
        }
    }

    /// Resolves `%name`: nearest `defineVariable` binding, then the reserved
    /// roots and host-registered externals, else `None` (unbound).
    pub fn get_variable(&self, name: &str) -> Option<Sequence> {
        self.get_user_variable(name).or_else(|| self.get_env(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_variable_is_visible_from_a_clone_taken_before_the_call() {
        // `with_variable` mutates the shared table, so a `Context` cloned
        // *before* the call still sees the binding afterwards — this is what
        // lets `%x` defined partway through a path chain be read by later
        // steps of that same chain.
        let root = Context::new(vec![Value::Integer(1)]);
        let sibling = root.clone();
        root.with_variable("x", vec![Value::Integer(42)]);
        assert_eq!(sibling.get_variable("x"), Some(vec![Value::Integer(42)]));
    }

    #[test]
    fn redefining_a_variable_overwrites_it() {
        let root = Context::new(vec![]);
        root.with_variable("x", vec![Value::Integer(1)]);
        root.with_variable("x", vec![Value::Integer(2)]);
        assert_eq!(root.get_variable("x"), Some(vec![Value::Integer(2)]));
    }

    #[test]
    fn iteration_frame_sets_this_and_index() {
        let root = Context::new(vec![Value::Integer(1), Value::Integer(2)]);
        let iter = root.with_iterator(Value::Integer(2), 1);
        assert_eq!(iter.this(), vec![Value::Integer(2)]);
        assert_eq!(iter.index(), Some(1));
        assert_eq!(root.index(), None);
    }

    #[test]
    fn total_frame_only_visible_inside_aggregate() {
        let root = Context::new(vec![]);
        assert_eq!(root.total(), None);
        let inside = root.with_total(vec![Value::Integer(7)]);
        assert_eq!(inside.total(), Some(vec![Value::Integer(7)]));
    }

    #[test]
    fn context_resolves_to_root_input() {
        let root = Context::new(vec![Value::Boolean(true)]);
        assert_eq!(root.get_variable("context"), Some(vec![Value::Boolean(true)]));
    }
}
